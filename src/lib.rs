//! A two-pass compiler and decompiler for AliceSoft's System 3.x adventure
//! scripting language, grounded on `compiler/xsys35c.c` and
//! `decompiler/xsys35dc.c`.
//!
//! [`compile_sources`] mirrors `xsys35c`'s `build_ald`: every source file is
//! preprocessed in order, then compiled in order, producing one `.SCO` page
//! per file plus, optionally, a `.AIN` metadata blob. [`decompile_archive`]
//! mirrors `xsys35dc`'s driver: an `.ALD` archive is read back into pages and
//! each page's bytecode is rendered as pseudo-source.

pub mod ain;
pub mod ald;
pub mod buffer;
pub mod cali;
pub mod command;
pub mod compile;
pub mod config;
pub mod debuginfo;
pub mod decompile;
pub mod error;
pub mod expr;
pub mod hel;
pub mod lexer;
pub mod sco;
pub mod sjis;
pub mod symbol;

pub use config::Config;
pub use error::{Error, Result};

use ald::AldEntry;
use compile::Compiler;
use config::SysVer;

/// One source file to compile, in page order.
pub struct Source {
    /// Name as it should appear in the `.ALD`/`.AIN` output (e.g. `A.ADV`),
    /// used to derive the `.SCO` entry's own name.
    pub name: String,
    pub text: Vec<u8>,
}

/// Everything [`compile_sources`] produced.
pub struct CompileOutput {
    /// One `.SCO` page per input source, in the same order.
    pub ald: Vec<AldEntry>,
    /// Present only for a [`SysVer::System39`] target, mirroring the
    /// reference's `System39.ain` side output.
    pub ain: Option<Vec<u8>>,
}

fn sconame(src_name: &str) -> String {
    if let Some(stem) = src_name.strip_suffix(".adv").or_else(|| src_name.strip_suffix(".ADV")) {
        let ext = if src_name.ends_with(".ADV") { "SCO" } else { "sco" };
        return format!("{stem}.{ext}");
    }
    format!("{src_name}.sco")
}

/// Compiles a whole source list into `.SCO` pages, mirroring `build_ald`.
///
/// `variables` preloads the variable table in declaration order (the
/// reference's `-V`/`--variables` option); `timestamp` is the Unix time
/// stamped on every `.ALD` entry. Every source is preprocessed in order
/// before any is compiled for real, since a function or label declared on a
/// later page must already be known while compiling an earlier one.
pub fn compile_sources(cfg: Config, sources: Vec<Source>, variables: Vec<String>, timestamp: i64) -> Result<CompileOutput> {
    let src_paths: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();
    let text_pairs: Vec<(String, String)> =
        sources.iter().map(|s| (s.name.clone(), String::from_utf8_lossy(&s.text).into_owned())).collect();

    let mut compiler = Compiler::new(cfg, src_paths, &text_pairs);
    compiler.variables = variables;

    for (i, src) in sources.iter().enumerate() {
        compiler.preprocess(&src.text, i as u32, &src.name)?;
    }
    compiler.preprocess_done();

    let mut ald = Vec::with_capacity(sources.len());
    for (i, src) in sources.iter().enumerate() {
        let data = compiler.compile(&src.text, i as u32, &src.name)?;
        ald.push(AldEntry { name: sconame(&src.name), data, timestamp });
    }
    compiler.check_undefined_functions()?;

    let ain = if compiler.cfg.sys_ver == SysVer::System39 {
        let functions = compiler.ain_functions();
        let variables = if compiler.cfg.disable_ain_variable { None } else { Some(compiler.variables.as_slice()) };
        Some(ain::write(&[], &functions, variables, &compiler.messages))
    } else {
        None
    };

    Ok(CompileOutput { ald, ain })
}

/// Decompiles every page of an already-parsed `.ALD` archive, mirroring
/// `xsys35dc`'s driver. The `.AIN` side file, when present, is not
/// consulted by the reference decompiler's own page-rendering pass; callers
/// that want function names instead of page/address pairs in cross-page
/// call sites must cross-reference the parsed `.AIN`'s functions themselves.
pub fn decompile_archive(archive: &ald::Archive) -> Result<Vec<decompile::DecompiledPage>> {
    let mut scos = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.entry(i)?;
        scos.push(sco::Sco::parse(entry.data, i as u32)?);
    }
    decompile::decompile_all(&scos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sconame_swaps_adv_extension_preserving_case() {
        assert_eq!(sconame("A.ADV"), "A.SCO");
        assert_eq!(sconame("a.adv"), "a.sco");
        assert_eq!(sconame("NOEXT"), "NOEXT.sco");
    }

    #[test]
    fn compiles_a_trivial_source_into_one_sco_page() {
        let cfg = Config::default();
        let sources = vec![Source { name: "A.ADV".into(), text: b"\tA\n".to_vec() }];
        let out = compile_sources(cfg, sources, Vec::new(), 0).unwrap();
        assert_eq!(out.ald.len(), 1);
        assert_eq!(out.ald[0].name, "A.SCO");
        assert!(out.ain.is_none());
    }

    #[test]
    fn compile_then_decompile_archive_round_trips_a_page() {
        let cfg = Config::default();
        let sources = vec![Source { name: "A.ADV".into(), text: b"\tA\n".to_vec() }];
        let out = compile_sources(cfg, sources, Vec::new(), 1_600_000_000).unwrap();
        let bytes = ald::write(&out.ald, 1);
        let archive = ald::Archive::parse(bytes).unwrap();
        let pages = decompile_archive(&archive).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source, b"\tA\n");
    }
}
