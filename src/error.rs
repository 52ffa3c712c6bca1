//! Crate-wide error type.
//!
//! Every fatal condition the compiler or decompiler can hit is represented
//! here, grouped the way the reference diagnostics group them: lexical,
//! symbol, argument and structural errors all carry a [`SourceLoc`] so a
//! caller can render the offending line and a caret, the way the original
//! `error_at`/`warn_at` helpers did.

use core::fmt;
use core::result;

/// File + line + column of an offending token, plus the full text of the
/// source line it was found on (so a renderer can print a caret under it
/// without re-opening the file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub source_line: String,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} line {} column {}", self.file, self.line, self.column)
    }
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    #[cfg(feature = "endian_fd")]
    Scroll(scroll::Error),
    /// A container's magic bytes didn't match any known SCO/ALD/AIN header.
    BadMagic { found: [u8; 4] },
    /// A structurally-parsed container had an internal inconsistency
    /// (truncated section, bad offset, ...).
    Malformed(String),
    Lexical { loc: SourceLoc, msg: String },
    Symbol { loc: SourceLoc, msg: String },
    Argument { loc: SourceLoc, msg: String },
    Structural { loc: SourceLoc, msg: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
            #[cfg(feature = "endian_fd")]
            Error::Scroll(e) => write!(f, "{e}"),
            Error::BadMagic { found } => write!(f, "invalid magic number: {found:02x?}"),
            Error::Malformed(msg) => write!(f, "malformed entity: {msg}"),
            Error::Lexical { loc, msg } | Error::Symbol { loc, msg }
            | Error::Argument { loc, msg } | Error::Structural { loc, msg } => {
                writeln!(f, "{loc}: {msg}")?;
                writeln!(f, "{}", loc.source_line)?;
                for _ in 0..loc.column.saturating_sub(1) {
                    write!(f, " ")?;
                }
                write!(f, "^")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            #[cfg(feature = "endian_fd")]
            Error::Scroll(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(feature = "endian_fd")]
impl From<scroll::Error> for Error {
    fn from(e: scroll::Error) -> Self {
        Error::Scroll(e)
    }
}

pub type Result<T> = result::Result<T, Error>;
