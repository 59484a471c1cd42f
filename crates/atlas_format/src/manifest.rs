use std::io::{self, Read, Write};

use crate::field::{magic_at, read_array, u32_at};
use crate::{ATLAS_MAGIC, FormatError, MANIFEST_HEADER_LEN, RecordKind, SpriteRecord};

const MAX_PREALLOCATED_SPRITES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestHeader {
    pub sprite_count: u32,
    pub sheet_count: u32,
    pub version: u8,
}

impl ManifestHeader {
    pub fn decode(reader: &mut impl Read) -> Result<Self, FormatError> {
        let buffer = read_array::<MANIFEST_HEADER_LEN>(reader, RecordKind::Manifest)?;
        let magic = magic_at(&buffer, 0);
        if magic != ATLAS_MAGIC {
            return Err(FormatError::BadMagic {
                record: RecordKind::Manifest,
                found: magic,
            });
        }
        Ok(Self {
            sprite_count: u32_at(&buffer, 8),
            sheet_count: u32_at(&buffer, 12),
            version: buffer[16],
        })
    }

    pub fn encode(&self, writer: &mut impl Write) -> io::Result<()> {
        let mut buffer = [0u8; MANIFEST_HEADER_LEN];
        buffer[0..8].copy_from_slice(&ATLAS_MAGIC);
        buffer[8..12].copy_from_slice(&self.sprite_count.to_le_bytes());
        buffer[12..16].copy_from_slice(&self.sheet_count.to_le_bytes());
        buffer[16] = self.version;
        writer.write_all(&buffer)
    }
}

/// A decoded `Meta.atlas`: header plus every sprite record in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub version: u8,
    pub sheet_count: u32,
    pub sprites: Vec<SpriteRecord>,
}

impl Manifest {
    pub fn header(&self) -> ManifestHeader {
        ManifestHeader {
            sprite_count: self.sprites.len() as u32,
            sheet_count: self.sheet_count,
            version: self.version,
        }
    }

    pub fn encode(&self, writer: &mut impl Write) -> Result<(), FormatError> {
        self.header()
            .encode(writer)
            .map_err(|source| FormatError::Io {
                record: RecordKind::Manifest,
                source,
            })?;
        for sprite in &self.sprites {
            sprite.encode(writer)?;
        }
        Ok(())
    }
}

pub fn decode_manifest(reader: &mut impl Read) -> Result<Manifest, FormatError> {
    let header = ManifestHeader::decode(reader)?;
    let sprite_count = header.sprite_count as usize;
    let mut sprites = Vec::with_capacity(sprite_count.min(MAX_PREALLOCATED_SPRITES));
    for _ in 0..sprite_count {
        sprites.push(SpriteRecord::decode(reader)?);
    }
    Ok(Manifest {
        version: header.version,
        sheet_count: header.sheet_count,
        sprites,
    })
}
