//! The trailing-append wrapper.
//!
//! ELF hosts keep the container past the end of the executable's defined
//! content ("overlay"), followed by one extra u64-LE field holding the
//! container's own length. The length field is a relocation aid only and is
//! not part of the canonical container.

use bytes::Bytes;
use goblin::elf::{section_header::SHT_NOBITS, Elf};

use crate::container::{Container, Footer, SIZEOF_FOOTER, TRAILER};
use crate::error::HostError;

/// File offset one past the last byte any program or section header claims.
/// Extents saturate, so a corrupt header fails the overlay check instead of
/// overflowing.
fn content_end(elf: &Elf) -> u64 {
    let mut end = 0u64;
    for ph in &elf.program_headers {
        end = end.max(ph.p_offset.saturating_add(ph.p_filesz));
    }
    for sh in &elf.section_headers {
        if sh.sh_type != SHT_NOBITS {
            end = end.max(sh.sh_offset.saturating_add(sh.sh_size));
        }
    }
    end
}

pub(super) fn locate(elf: &Elf, data: &[u8]) -> Result<(usize, Container), HostError> {
    let end = content_end(elf);
    if end >= data.len() as u64 {
        return Err(HostError::NoOverlay);
    }
    let end = end as usize;
    let container = container_from_overlay(&data[end..])?;
    Ok((end, container))
}

/// Scan backward from the end of the overlay: 8-byte length field, then the
/// 16-byte trailer, then the 32-byte footer, whose `byte_count` gives the
/// pool start.
pub(super) fn container_from_overlay(overlay: &[u8]) -> Result<Container, HostError> {
    let tail = 8 + TRAILER.len() + SIZEOF_FOOTER;
    if overlay.len() < tail {
        return Err(HostError::NoOverlay);
    }
    let footer_end = overlay.len() - 8 - TRAILER.len();
    let footer = Footer::parse(&overlay[footer_end - SIZEOF_FOOTER..footer_end])?;
    let data_start = (overlay.len() - tail)
        .checked_sub(footer.byte_count as usize)
        .ok_or_else(|| {
            HostError::MalformedHost("overlay shorter than the footer's pool length".into())
        })?;
    let container = Container::parse(Bytes::copy_from_slice(&overlay[data_start..overlay.len() - 8]))?;
    Ok(container)
}

/// Replace the whole overlay with `container ++ u64-le(container length)`.
pub(super) fn embed(data: &[u8], content_end: usize, container: &Container) -> Vec<u8> {
    let mut out = Vec::with_capacity(content_end + container.len() + 8);
    out.extend_from_slice(&data[..content_end]);
    out.extend_from_slice(container.bytes());
    out.extend_from_slice(&(container.len() as u64).to_le_bytes());
    out
}
