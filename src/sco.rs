//! `.SCO` page framing (§4.5): the fixed header every compiled page starts
//! with, and the reader half used by the decompiler and the AIN/ALD tools.

use crate::buffer::Buffer;
use crate::config::ScoVer;
use crate::error::{Error, Result};

/// `hdrsize = round_up_16(18 + namelen)`, matching `compiler/sco.c`'s
/// `(18 + namelen + 15) & ~0xf`. The 18 accounts for the 4-byte magic,
/// two dwords (header size, file size), one dword (page number) and one
/// word (name length) preceding the name itself.
pub fn header_size(src_name: &str) -> u32 {
    let namelen = src_name.len() as u32;
    (18 + namelen + 15) & !0xf
}

/// Writes the SCO header into `b` and zero-pads up to `hdrsize`. The file
/// size dword is left at zero; call [`finalize`] once every command has
/// been emitted.
pub fn init(b: &mut Buffer, ver: ScoVer, src_name: &str, pageno: u32) -> Result<()> {
    let namelen = src_name.len();
    if namelen >= 1024 {
        return Err(Error::Malformed(format!("file name too long: {src_name}")));
    }
    let hdrsize = header_size(src_name);
    b.emit_string(ver.magic());
    b.emit_dword(hdrsize);
    b.emit_dword(0);
    b.emit_dword(pageno);
    b.emit_word(namelen as u16);
    b.emit_string(src_name.as_bytes());
    while b.len() < hdrsize as usize {
        b.emit(0);
    }
    Ok(())
}

/// Patches the file-size dword at offset 8 once compilation of the page
/// has finished.
pub fn finalize(b: &mut Buffer) {
    let len = b.len() as u32;
    b.swap_dword(8, len);
}

/// A parsed `.SCO` page, as read back from an ALD archive entry.
#[derive(Debug, Clone)]
pub struct Sco {
    pub data: Vec<u8>,
    pub version: ScoVer,
    pub hdrsize: u32,
    pub filesize: u32,
    pub page: u32,
    pub src_name: String,
}

impl Sco {
    /// Parses a raw ALD entry payload into its header fields. `page` is the
    /// archive index (0-based); it is cross-checked against the header's own
    /// page dword only loosely, since hand-edited/patched SCOs sometimes
    /// disagree and the reference decompiler never treats that as fatal.
    pub fn parse(data: Vec<u8>, page: u32) -> Result<Sco> {
        if data.len() < 18 {
            return Err(Error::Malformed("SCO entry shorter than header".into()));
        }
        let version = match &data[0..4] {
            b"S350" => ScoVer::S350,
            b"S351" => ScoVer::S351,
            b"153S" => ScoVer::Sco153S,
            b"S360" => ScoVer::S360,
            b"S380" => ScoVer::S380,
            other => {
                let mut found = [0u8; 4];
                found.copy_from_slice(other);
                return Err(Error::BadMagic { found });
            }
        };
        let hdrsize = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let filesize = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let file_page = u32::from_le_bytes(data[12..16].try_into().unwrap());
        let namelen = u16::from_le_bytes(data[16..18].try_into().unwrap()) as usize;
        if 18 + namelen > data.len() {
            return Err(Error::Malformed("SCO name runs past header".into()));
        }
        let src_name = String::from_utf8_lossy(&data[18..18 + namelen]).into_owned();
        let _ = file_page;
        Ok(Sco { data, version, hdrsize, filesize, page, src_name })
    }

    pub fn body(&self) -> &[u8] {
        &self.data[self.hdrsize as usize..self.filesize.min(self.data.len() as u32) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_rounds_up_to_16() {
        assert_eq!(header_size(""), 32);
        assert_eq!(header_size("A"), 32);
        assert_eq!(header_size("ABCDEFGHIJKLMN"), 48);
    }

    #[test]
    fn init_pads_to_header_size_and_finalize_patches_filesize() {
        let mut b = Buffer::new();
        init(&mut b, ScoVer::S380, "ADV.SRC", 0).unwrap();
        assert_eq!(b.len(), header_size("ADV.SRC") as usize);
        b.emit(0xff);
        finalize(&mut b);
        let bytes = b.as_bytes();
        let filesize = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(filesize, bytes.len() as u32);
    }

    #[test]
    fn parse_roundtrips_init() {
        let mut b = Buffer::new();
        init(&mut b, ScoVer::S380, "ADV.SRC", 3).unwrap();
        b.emit(b'A');
        finalize(&mut b);
        let sco = Sco::parse(b.into_bytes(), 3).unwrap();
        assert_eq!(sco.version, ScoVer::S380);
        assert_eq!(sco.src_name, "ADV.SRC");
        assert_eq!(sco.body(), &[b'A']);
    }
}
