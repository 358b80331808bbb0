//! Fixed-width little-endian reads/writes and the string-pointer primitive.
//!
//! Every multi-byte field in the container is little-endian. Reads are
//! bounds-checked against the buffer they index; writes are append-only onto
//! a `Vec<u8>`, which is how the rebuilder packs a fresh pool without ever
//! editing bytes in place.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::CodecError;

pub const SIZEOF_STRING_POINTER: usize = 8;

/// An (offset, length) pair locating a byte range inside the container's
/// string pool. Zero-length pointers are valid and denote an empty field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StringPointer {
    pub offset: u32,
    pub length: u32,
}

impl StringPointer {
    pub fn read_at(buffer: &[u8], offset: usize) -> Result<Self, CodecError> {
        Ok(Self {
            offset: read_u32_le(buffer, offset)?,
            length: read_u32_le(buffer, offset + 4)?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        write_u32_le(out, self.offset);
        write_u32_le(out, self.length);
    }

    /// Resolve the pointer against the string pool.
    pub fn slice<'a>(&self, pool: &'a [u8]) -> Result<&'a [u8], CodecError> {
        let start = self.offset as usize;
        let end = start + self.length as usize;
        if end > pool.len() {
            return Err(CodecError::InvalidPointer {
                offset: self.offset,
                length: self.length,
                pool_len: pool.len(),
            });
        }
        Ok(&pool[start..end])
    }
}

fn check_bounds(buffer: &[u8], offset: usize, width: usize) -> Result<(), CodecError> {
    if offset.checked_add(width).is_none_or(|end| end > buffer.len()) {
        return Err(CodecError::OutOfBounds {
            offset,
            width,
            len: buffer.len(),
        });
    }
    Ok(())
}

pub fn read_u8(buffer: &[u8], offset: usize) -> Result<u8, CodecError> {
    check_bounds(buffer, offset, 1)?;
    Ok(buffer[offset])
}

pub fn read_u32_le(buffer: &[u8], offset: usize) -> Result<u32, CodecError> {
    check_bounds(buffer, offset, 4)?;
    Ok(LittleEndian::read_u32(&buffer[offset..offset + 4]))
}

pub fn read_u64_le(buffer: &[u8], offset: usize) -> Result<u64, CodecError> {
    check_bounds(buffer, offset, 8)?;
    Ok(LittleEndian::read_u64(&buffer[offset..offset + 8]))
}

pub fn write_u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u64_le(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}
