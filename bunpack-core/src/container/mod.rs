//! The host-independent container blob and its codec.
//!
//! Canonical layout:
//!
//! ```text
//! pool bytes (byte_count) ++ footer (32) ++ trailer (16)
//! ```
//!
//! The pool holds every module's string fields, the module table itself and
//! the compile-time argv string; all string pointers are offsets into the
//! blob from its start, so the blob doubles as the pool.

mod footer;
mod modules;
mod primitives;
mod rebuild;

pub use footer::{Footer, SIZEOF_FOOTER};
pub use modules::{find, parse_table, Module, ModuleMatcher, ModuleRecord, SIZEOF_MODULE};
pub use primitives::{
    read_u32_le, read_u64_le, write_u32_le, write_u64_le, StringPointer, SIZEOF_STRING_POINTER,
};
pub use rebuild::rebuild;

use bytes::Bytes;

use crate::error::CodecError;

/// Magic byte sequence marking the end of a container.
pub const TRAILER: &[u8; 16] = b"\n---- Bun! ----\n";

/// A parsed container. Immutable once constructed; a repack produces a brand
/// new value (see [`rebuild`]) rather than mutating this one.
#[derive(Clone, Debug)]
pub struct Container {
    bytes: Bytes,
    footer: Footer,
}

impl Container {
    /// Parse a canonical container blob: verifies the trailer magic and that
    /// the footer's pool length matches the blob.
    pub fn parse(bytes: Bytes) -> Result<Self, CodecError> {
        let tail = SIZEOF_FOOTER + TRAILER.len();
        if bytes.len() < tail || !bytes.ends_with(TRAILER) {
            return Err(CodecError::MissingTrailer);
        }
        let footer_start = bytes.len() - tail;
        let footer = Footer::parse(&bytes[footer_start..footer_start + SIZEOF_FOOTER])?;
        if footer.byte_count != footer_start as u64 {
            return Err(CodecError::MalformedFooter(format!(
                "pool length {} disagrees with container length {}",
                footer.byte_count,
                bytes.len()
            )));
        }
        Ok(Self { bytes, footer })
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    /// The pool region every string pointer indexes into.
    pub fn pool(&self) -> &[u8] {
        &self.bytes[..self.footer.byte_count as usize]
    }

    /// Total container length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The canonical serialized form. Parsing these bytes yields an equal
    /// container.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Parse the module table in file order.
    pub fn modules(&self) -> Result<Vec<Module>, CodecError> {
        let table = self.footer.modules_ptr.slice(self.pool())?;
        parse_table(self.pool(), table)
    }

    /// Resolve the contents of the module matched by `matcher`.
    pub fn module_contents(&self, matcher: &ModuleMatcher) -> Result<&[u8], CodecError> {
        let modules = self.modules()?;
        let module = find(&modules, matcher)
            .ok_or_else(|| CodecError::TargetNotFound(matcher.base().to_owned()))?;
        module.record.contents.slice(self.pool())
    }
}
