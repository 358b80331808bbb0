//! The fixed-size footer sitting between the string pool and the trailer.

use crate::error::CodecError;

use super::primitives::{read_u32_le, read_u64_le, StringPointer};

/// Serialized footer size. The fields occupy 28 bytes; the final 4 bytes are
/// reserved and always written as zero.
pub const SIZEOF_FOOTER: usize = 32;

/// Trailing metadata block describing where everything else lives.
///
/// Field contents are *not* validated here; a footer full of garbage parses
/// fine and fails later at the pointer-bounds checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footer {
    /// Length of the pool region preceding this footer (string data, the
    /// module table and the argv string).
    pub byte_count: u64,
    /// Location of the raw module-table bytes inside the pool.
    pub modules_ptr: StringPointer,
    /// Index of the module used as the program entry point. Opaque to this
    /// tool; preserved verbatim on rebuild.
    pub entry_point_id: u32,
    /// Location of the compile-time argv string inside the pool.
    pub compile_exec_argv_ptr: StringPointer,
}

impl Footer {
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != SIZEOF_FOOTER {
            return Err(CodecError::MalformedFooter(format!(
                "expected {SIZEOF_FOOTER} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            byte_count: read_u64_le(bytes, 0)?,
            modules_ptr: StringPointer::read_at(bytes, 8)?,
            entry_point_id: read_u32_le(bytes, 16)?,
            compile_exec_argv_ptr: StringPointer::read_at(bytes, 20)?,
        })
    }

    pub fn serialize(&self) -> [u8; SIZEOF_FOOTER] {
        let mut out = [0u8; SIZEOF_FOOTER];
        out[0..8].copy_from_slice(&self.byte_count.to_le_bytes());
        out[8..12].copy_from_slice(&self.modules_ptr.offset.to_le_bytes());
        out[12..16].copy_from_slice(&self.modules_ptr.length.to_le_bytes());
        out[16..20].copy_from_slice(&self.entry_point_id.to_le_bytes());
        out[20..24].copy_from_slice(&self.compile_exec_argv_ptr.offset.to_le_bytes());
        out[24..28].copy_from_slice(&self.compile_exec_argv_ptr.length.to_le_bytes());
        // bytes 28..32 stay reserved (zero)
        out
    }
}
