use std::io::{self, Read, Write};

use crate::field::{magic_at, read_array, u32_at};
use crate::{FormatError, RecordKind, SHEET_HEADER_LEN, SHEET_MAGIC};

/// Metadata stored in the first 16 bytes of a `.kyxsheet` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetHeader {
    pub index: u32,
    /// Resident size charged against the cache budget.
    pub byte_size: u32,
}

impl SheetHeader {
    pub fn decode(buffer: &[u8; SHEET_HEADER_LEN]) -> Result<Self, FormatError> {
        let magic = magic_at(buffer, 0);
        if magic != SHEET_MAGIC {
            return Err(FormatError::BadMagic {
                record: RecordKind::Sheet,
                found: magic,
            });
        }
        Ok(Self {
            index: u32_at(buffer, 8),
            byte_size: u32_at(buffer, 12),
        })
    }

    pub fn to_bytes(self) -> [u8; SHEET_HEADER_LEN] {
        let mut buffer = [0u8; SHEET_HEADER_LEN];
        buffer[0..8].copy_from_slice(&SHEET_MAGIC);
        buffer[8..12].copy_from_slice(&self.index.to_le_bytes());
        buffer[12..16].copy_from_slice(&self.byte_size.to_le_bytes());
        buffer
    }

    pub fn encode(self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}

/// Reads and validates the header, leaving `reader` positioned at the payload.
pub fn read_sheet_header(reader: &mut impl Read) -> Result<SheetHeader, FormatError> {
    let buffer = read_array::<SHEET_HEADER_LEN>(reader, RecordKind::Sheet)?;
    SheetHeader::decode(&buffer)
}
