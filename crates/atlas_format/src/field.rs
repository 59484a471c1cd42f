use std::io::{self, Read};

use crate::{FormatError, RecordKind};

pub(crate) fn read_array<const N: usize>(
    reader: &mut impl Read,
    record: RecordKind,
) -> Result<[u8; N], FormatError> {
    let mut buffer = [0u8; N];
    reader
        .read_exact(&mut buffer)
        .map_err(|source| read_error(record, source))?;
    Ok(buffer)
}

pub(crate) fn read_vec(
    reader: &mut impl Read,
    len: usize,
    record: RecordKind,
) -> Result<Vec<u8>, FormatError> {
    let mut buffer = vec![0u8; len];
    reader
        .read_exact(&mut buffer)
        .map_err(|source| read_error(record, source))?;
    Ok(buffer)
}

fn read_error(record: RecordKind, source: io::Error) -> FormatError {
    if source.kind() == io::ErrorKind::UnexpectedEof {
        FormatError::Truncated { record }
    } else {
        FormatError::Io { record, source }
    }
}

pub(crate) fn magic_at(buffer: &[u8], offset: usize) -> [u8; 8] {
    let mut magic = [0u8; 8];
    magic.copy_from_slice(&buffer[offset..offset + 8]);
    magic
}

pub(crate) fn u32_at(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(word_at(buffer, offset))
}

pub(crate) fn i32_at(buffer: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(word_at(buffer, offset))
}

pub(crate) fn f32_at(buffer: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(word_at(buffer, offset))
}

fn word_at(buffer: &[u8], offset: usize) -> [u8; 4] {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buffer[offset..offset + 4]);
    word
}
