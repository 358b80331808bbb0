//! bunpack-core
//!
//! Codec for the module-embedding container that `bun build --compile` stores
//! inside a standalone executable, plus the host-side plumbing to locate that
//! container in an ELF overlay or a Mach-O `__BUN` segment and to write a
//! rebuilt container back.
//!
//! The container itself is host-independent: a flat string pool, a table of
//! fixed-size module records pointing into the pool, a 32-byte footer and a
//! 16-byte trailer magic. See [`container`] for the codec and [`host`] for
//! the two wrapper shapes.

pub mod container;
pub mod error;
pub mod host;

pub use container::{Container, ModuleMatcher};
pub use error::{CodecError, HostError};
pub use host::{HostImage, HostKind};

#[cfg(test)]
pub(crate) mod testutil;
