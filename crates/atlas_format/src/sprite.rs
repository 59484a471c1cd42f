use std::io::{self, Read, Write};

use crate::field::{f32_at, i32_at, read_array, read_vec, u32_at};
use crate::{
    FRAGMENT_RECORD_LEN, FormatError, MAX_SPRITE_NAME_LEN, RecordKind, SPRITE_HEADER_LEN,
};

// Counts come straight from the file; cap the up-front reservation so a corrupt
// count fails on truncation instead of on allocation.
const MAX_PREALLOCATED_FRAGMENTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One 28-byte fragment record.
///
/// The sheet index and `source.x` are read from the same four bytes, so
/// `source.x` always equals `sheet_index as i32`. Encoding writes only the sheet
/// index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentRecord {
    pub offset_x: f32,
    pub offset_y: f32,
    pub sheet_index: u32,
    /// `x` shares its bytes with `sheet_index` and must stay equal to it.
    pub source: SourceRect,
    pub trailing: [u8; 4],
}

impl FragmentRecord {
    pub fn new(
        offset_x: f32,
        offset_y: f32,
        sheet_index: u32,
        source_y: i32,
        source_width: i32,
        source_height: i32,
    ) -> Self {
        Self {
            offset_x,
            offset_y,
            sheet_index,
            source: SourceRect {
                x: sheet_index as i32,
                y: source_y,
                width: source_width,
                height: source_height,
            },
            trailing: [0; 4],
        }
    }

    pub fn decode(reader: &mut impl Read) -> Result<Self, FormatError> {
        let buffer = read_array::<FRAGMENT_RECORD_LEN>(reader, RecordKind::Fragment)?;
        let mut trailing = [0u8; 4];
        trailing.copy_from_slice(&buffer[24..28]);
        Ok(Self {
            offset_x: f32_at(&buffer, 0),
            offset_y: f32_at(&buffer, 4),
            sheet_index: u32_at(&buffer, 8),
            source: SourceRect {
                x: i32_at(&buffer, 8),
                y: i32_at(&buffer, 12),
                width: i32_at(&buffer, 16),
                height: i32_at(&buffer, 20),
            },
            trailing,
        })
    }

    pub fn encode(&self, writer: &mut impl Write) -> io::Result<()> {
        debug_assert_eq!(
            self.source.x, self.sheet_index as i32,
            "fragment source.x is stored in the sheet index bytes"
        );
        let mut buffer = [0u8; FRAGMENT_RECORD_LEN];
        buffer[0..4].copy_from_slice(&self.offset_x.to_le_bytes());
        buffer[4..8].copy_from_slice(&self.offset_y.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.sheet_index.to_le_bytes());
        buffer[12..16].copy_from_slice(&self.source.y.to_le_bytes());
        buffer[16..20].copy_from_slice(&self.source.width.to_le_bytes());
        buffer[20..24].copy_from_slice(&self.source.height.to_le_bytes());
        buffer[24..28].copy_from_slice(&self.trailing);
        writer.write_all(&buffer)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteRecord {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fragments: Vec<FragmentRecord>,
}

impl SpriteRecord {
    pub fn decode(reader: &mut impl Read) -> Result<Self, FormatError> {
        let header = read_array::<SPRITE_HEADER_LEN>(reader, RecordKind::Sprite)?;
        let width = u32_at(&header, 0);
        let height = u32_at(&header, 4);
        let fragment_count = u32_at(&header, 8) as usize;
        let name_len = header[12] as usize;

        let name = String::from_utf8(read_vec(reader, name_len, RecordKind::Sprite)?)?;

        let mut fragments = Vec::with_capacity(fragment_count.min(MAX_PREALLOCATED_FRAGMENTS));
        for _ in 0..fragment_count {
            fragments.push(FragmentRecord::decode(reader)?);
        }

        Ok(Self {
            name,
            width,
            height,
            fragments,
        })
    }

    pub fn encode(&self, writer: &mut impl Write) -> Result<(), FormatError> {
        let name = self.name.as_bytes();
        if name.len() > MAX_SPRITE_NAME_LEN {
            return Err(FormatError::NameTooLong { len: name.len() });
        }
        let fragment_count = u32::try_from(self.fragments.len()).map_err(|_| FormatError::Io {
            record: RecordKind::Sprite,
            source: io::Error::new(io::ErrorKind::InvalidInput, "fragment count overflow"),
        })?;

        let mut header = [0u8; SPRITE_HEADER_LEN];
        header[0..4].copy_from_slice(&self.width.to_le_bytes());
        header[4..8].copy_from_slice(&self.height.to_le_bytes());
        header[8..12].copy_from_slice(&fragment_count.to_le_bytes());
        header[12] = name.len() as u8;

        let write_error = |source| FormatError::Io {
            record: RecordKind::Sprite,
            source,
        };
        writer.write_all(&header).map_err(write_error)?;
        writer.write_all(name).map_err(write_error)?;
        for fragment in &self.fragments {
            fragment.encode(writer).map_err(|source| FormatError::Io {
                record: RecordKind::Fragment,
                source,
            })?;
        }
        Ok(())
    }
}
