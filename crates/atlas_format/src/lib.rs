//! Binary layouts of the sprite atlas.
//!
//! An atlas folder holds one manifest (`Meta.atlas`) describing every sprite and
//! its fragments, plus one `.kyxsheet` file per sheet. All integers are
//! little-endian.
//!
//! Manifest:
//! | magic "KYXATLAS" (8) | sprite_count (4) | sheet_count (4) | version (1) | sprites... |
//!
//! Sprite record:
//! | width (4) | height (4) | fragment_count (4) | name_len (1) | name (name_len) | fragments... |
//!
//! Fragment record (28 bytes):
//! | x f32 (4) | y f32 (4) | sheet / rect.x (4) | rect.y (4) | rect.w (4) | rect.h (4) | unused (4) |
//!
//! Sheet file:
//! | magic "KYXSHEET" (8) | index (4) | byte_size (4) | encoded image payload... |

mod field;
mod manifest;
mod sheet;
mod sprite;

use std::fmt;
use std::io;

pub use manifest::{Manifest, ManifestHeader, decode_manifest};
pub use sheet::{SheetHeader, read_sheet_header};
pub use sprite::{FragmentRecord, SourceRect, SpriteRecord};

pub const ATLAS_MAGIC: [u8; 8] = *b"KYXATLAS";
pub const SHEET_MAGIC: [u8; 8] = *b"KYXSHEET";

pub const MANIFEST_HEADER_LEN: usize = 17;
pub const SPRITE_HEADER_LEN: usize = 13;
pub const FRAGMENT_RECORD_LEN: usize = 28;
pub const SHEET_HEADER_LEN: usize = 16;

/// Byte offset where the encoded image of a sheet file begins.
pub const SHEET_PAYLOAD_OFFSET: u64 = SHEET_HEADER_LEN as u64;

pub const MAX_SPRITE_NAME_LEN: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Manifest,
    Sprite,
    Fragment,
    Sheet,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Manifest => write!(formatter, "manifest"),
            RecordKind::Sprite => write!(formatter, "sprite"),
            RecordKind::Fragment => write!(formatter, "fragment"),
            RecordKind::Sheet => write!(formatter, "sheet"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("{record} magic mismatch: found {found:?}")]
    BadMagic { record: RecordKind, found: [u8; 8] },
    #[error("{record} record truncated")]
    Truncated { record: RecordKind },
    #[error("sprite name is not valid utf-8")]
    InvalidName(#[from] std::string::FromUtf8Error),
    #[error("sprite name of {len} bytes exceeds 255 bytes")]
    NameTooLong { len: usize },
    #[error("i/o error on {record} record")]
    Io {
        record: RecordKind,
        #[source]
        source: io::Error,
    },
}

impl FormatError {
    pub fn is_bad_magic(&self) -> bool {
        matches!(self, FormatError::BadMagic { .. })
    }
}
