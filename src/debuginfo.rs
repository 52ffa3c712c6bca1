//! `.dsym` debug-info side file (§4.10), grounded on `compiler/debuginfo.c`.
//!
//! Independent of `.AIN`: five length-prefixed sections (`SRCS` source
//! names, `SCNT` one decimal line-count string per source, the `LINE`
//! per-page line table, `FUNC` every function sorted by page/address, and
//! `VARI` global variable names) following a `DSYM` + version header.

use crate::symbol::Label;
use std::collections::HashMap;

const DSYM_VERSION: u32 = 0;

#[derive(Debug, Clone, Copy)]
struct LineInfo {
    line: u32,
    addr: u32,
}

#[derive(Debug, Clone)]
struct FuncInfo {
    name: String,
    page: u32,
    addr: u32,
    is_local: bool,
}

#[derive(Debug)]
pub struct DebugInfo {
    /// Basename -> decimal line-count string, insertion order preserved.
    srcs: Vec<(String, String)>,
    line_section: Vec<u8>,
    nr_files: u32,
    linemap: Option<Vec<LineInfo>>,
    functions: Vec<FuncInfo>,
}

impl DebugInfo {
    /// `sources` is `(basename, source text)`; the per-file line count
    /// recorded in `SCNT` is derived from it.
    pub fn new(sources: &[(String, String)]) -> DebugInfo {
        let srcs = sources
            .iter()
            .map(|(name, text)| (name.clone(), text.lines().count().to_string()))
            .collect();
        DebugInfo { srcs, line_section: Vec::new(), nr_files: 0, linemap: None, functions: Vec::new() }
    }

    pub fn init_page(&mut self, page: u32) {
        if self.line_section.is_empty() {
            self.line_section.extend_from_slice(b"LINE");
            self.line_section.extend_from_slice(&0u32.to_le_bytes()); // section length, patched later
            self.line_section.extend_from_slice(&0u32.to_le_bytes()); // nr_files, patched later
        }
        debug_assert_eq!(page, self.nr_files);
        self.linemap = Some(Vec::new());
    }

    pub fn line_add(&mut self, line: u32, addr: u32) {
        let linemap = self.linemap.as_mut().expect("init_page not called");
        if let Some(last) = linemap.last_mut() {
            debug_assert!(addr >= last.addr);
            debug_assert!(line >= last.line);
            if addr == last.addr {
                last.line = line;
                return;
            }
            if line == last.line {
                return;
            }
        }
        linemap.push(LineInfo { line, addr });
    }

    /// Clears the in-progress page's line map without touching earlier
    /// pages — used by the `pragma address:` directive, which would
    /// otherwise break the monotonic-address invariant `line_add` assumes.
    pub fn line_reset(&mut self) {
        if let Some(linemap) = self.linemap.as_mut() {
            linemap.clear();
        }
    }

    /// `labels`: this page's resolved label table, used to pull in
    /// `\label:`-style local function entries alongside `**name:` globals.
    pub fn finish_page(&mut self, labels: &HashMap<String, Label>) {
        for (name, label) in labels {
            if label.is_function {
                self.functions.push(FuncInfo {
                    name: name.clone(),
                    page: self.nr_files,
                    addr: label.addr,
                    is_local: true,
                });
            }
        }

        let mut linemap = self.linemap.take().expect("init_page not called");
        // Drop the last entry: it marks the page's end address, not a line.
        linemap.pop();

        self.line_section.extend_from_slice(&(linemap.len() as u32).to_le_bytes());
        for li in &linemap {
            self.line_section.extend_from_slice(&li.line.to_le_bytes());
            self.line_section.extend_from_slice(&li.addr.to_le_bytes());
        }
        self.nr_files += 1;

        let len = self.line_section.len() as u32;
        self.line_section[4..8].copy_from_slice(&len.to_le_bytes());
        self.line_section[8..12].copy_from_slice(&self.nr_files.to_le_bytes());
    }

    fn add_global_functions(&mut self, functions: &HashMap<String, crate::symbol::Function>) {
        for f in functions.values() {
            self.functions.push(FuncInfo {
                name: f.name.clone(),
                page: f.page.saturating_sub(1),
                addr: f.addr,
                is_local: false,
            });
        }
    }

    pub fn write(mut self, functions: &HashMap<String, crate::symbol::Function>) -> Vec<u8> {
        self.add_global_functions(functions);

        let mut out = Vec::new();
        out.extend_from_slice(b"DSYM");
        out.extend_from_slice(&DSYM_VERSION.to_le_bytes());
        out.extend_from_slice(&5u32.to_le_bytes()); // nr_sections

        write_string_array_section(&mut out, b"SRCS", self.srcs.iter().map(|(n, _)| n.as_str()));
        write_string_array_section(&mut out, b"SCNT", self.srcs.iter().map(|(_, c)| c.as_str()));
        out.extend_from_slice(&self.line_section);
        write_func_section(&mut out, &mut self.functions);
        write_string_array_section(&mut out, b"VARI", std::iter::empty());
        out
    }
}

fn write_string_array_section<'a>(out: &mut Vec<u8>, tag: &[u8; 4], items: impl Iterator<Item = &'a str> + Clone) {
    let mut section_len = 12u32;
    for s in items.clone() {
        section_len += s.len() as u32 + 1;
    }
    let count = items.clone().count() as u32;
    out.extend_from_slice(tag);
    out.extend_from_slice(&section_len.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    for s in items {
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }
}

fn write_func_section(out: &mut Vec<u8>, functions: &mut [FuncInfo]) {
    out.extend_from_slice(b"FUNC");
    let length_offset = out.len();
    out.extend_from_slice(&0u32.to_le_bytes());

    functions.sort_by_key(|f| (f.page, f.addr));

    out.extend_from_slice(&(functions.len() as u32).to_le_bytes());
    for f in functions.iter() {
        out.extend_from_slice(f.name.as_bytes());
        out.push(0);
        out.extend_from_slice(&(f.page as u16).to_le_bytes());
        out.extend_from_slice(&f.addr.to_le_bytes());
        out.push(f.is_local as u8);
    }

    let section_length = (out.len() - length_offset) as u32;
    out[length_offset..length_offset + 4].copy_from_slice(&section_length.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceLoc;

    fn loc() -> SourceLoc {
        SourceLoc { file: "t.adv".into(), line: 1, column: 1, source_line: String::new() }
    }

    #[test]
    fn line_add_collapses_same_address_and_same_line() {
        let mut di = DebugInfo::new(&[("t.adv".into(), "a\nb\n".into())]);
        di.init_page(0);
        di.line_add(1, 0);
        di.line_add(1, 0); // same addr, keeps line
        di.line_add(2, 4); // new addr and line
        di.line_add(2, 8); // same line as previous entry, dropped
        let linemap = di.linemap.as_ref().unwrap();
        assert_eq!(linemap.len(), 2);
    }

    #[test]
    fn finish_page_drops_trailing_sentinel_entry() {
        let mut di = DebugInfo::new(&[("t.adv".into(), String::new())]);
        di.init_page(0);
        di.line_add(1, 0);
        di.line_add(2, 4);
        di.line_add(3, 8); // the page-end sentinel, dropped by finish_page
        let mut labels = HashMap::new();
        labels.insert("top".to_string(), Label::unresolved(loc()));
        di.finish_page(&labels);
        // nr_files dword patched to 1, and the LINE section now holds 2
        // entries (1, 2) after dropping the sentinel.
        assert_eq!(di.nr_files, 1);
        let count = u32::from_le_bytes(di.line_section[12..16].try_into().unwrap());
        assert_eq!(count, 2);
    }

    #[test]
    fn write_produces_dsym_header() {
        let mut di = DebugInfo::new(&[("t.adv".into(), String::new())]);
        di.init_page(0);
        di.line_add(1, 0);
        di.finish_page(&HashMap::new());
        let bytes = di.write(&HashMap::new());
        assert_eq!(&bytes[0..4], b"DSYM");
    }
}
