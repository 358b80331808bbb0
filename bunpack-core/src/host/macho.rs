//! The segment wrapper.
//!
//! Mach-O hosts store the container inside the `__bun` section of a dedicated
//! `__BUN` segment. The section content begins with a length prefix whose
//! width changed across producing toolchains (4 bytes historically, 8 bytes
//! since Bun 1.3.4); the width is recovered by plausibility-checking the
//! declared length against the section size, tolerating bounded alignment
//! padding.
//!
//! goblin parses the load commands read-only; the handful of writes needed
//! here (section rewrite, one-segment growth, signature removal) are explicit
//! byte splices over the load-command structures.

use bytes::Bytes;
use goblin::mach::load_command::CommandVariant;
use goblin::mach::{Mach, MachO};

use crate::container::{read_u32_le, read_u64_le, Container};
use crate::error::HostError;

const SEGMENT_NAME: &[u8] = b"__BUN";
const SECTION_NAME: &[u8] = b"__bun";
const LINKEDIT_NAME: &[u8] = b"__LINKEDIT";

/// Declared section size may exceed the embedded data by up to this much
/// alignment padding. Empirical constant, not an upstream guarantee.
const PAD_TOLERANCE: usize = 4096;

const SIZEOF_MACH_HEADER: usize = 32;
const SIZEOF_SEGMENT_COMMAND: usize = 72;
const SIZEOF_SECTION_HEADER: usize = 80;

const CPU_TYPE_ARM64: u32 = 0x0100_000C;

const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x2;
const LC_DYSYMTAB: u32 = 0xb;
const LC_CODE_SIGNATURE: u32 = 0x1d;
const LC_DYLD_INFO: u32 = 0x22;
const LC_FUNCTION_STARTS: u32 = 0x26;
const LC_DATA_IN_CODE: u32 = 0x29;
const LC_DYLIB_CODE_SIGN_DRS: u32 = 0x2b;
const LC_LINKER_OPTIMIZATION_HINT: u32 = 0x2d;
const LC_DYLD_INFO_ONLY: u32 = 0x8000_0022;
const LC_DYLD_EXPORTS_TRIE: u32 = 0x8000_001e;
const LC_DYLD_CHAINED_FIXUPS: u32 = 0x8000_0034;

/// Where the `__BUN` segment and its `__bun` section live, in both the load
/// commands and the file body.
struct BunGeometry {
    seg_cmd_off: usize,
    seg_fileoff: u64,
    seg_filesize: u64,
    seg_vmaddr: u64,
    seg_vmsize: u64,
    sect_hdr_off: usize,
    sect_off: usize,
    sect_capacity: usize,
    page_size: usize,
}

fn parse_binary<'a>(data: &'a [u8]) -> Result<MachO<'a>, HostError> {
    match Mach::parse(data)? {
        Mach::Binary(macho) if macho.is_64 => Ok(macho),
        Mach::Binary(_) => Err(HostError::UnsupportedHostFormat("32-bit Mach-O".into())),
        Mach::Fat(_) => Err(HostError::UnsupportedHostFormat(
            "fat (universal) Mach-O".into(),
        )),
    }
}

fn name16(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

fn find_bun(macho: &MachO, data: &[u8]) -> Result<BunGeometry, HostError> {
    let page_size = if macho.header.cputype == CPU_TYPE_ARM64 {
        16384
    } else {
        4096
    };
    for lc in &macho.load_commands {
        let seg = match &lc.command {
            CommandVariant::Segment64(seg) => seg,
            _ => continue,
        };
        if name16(&seg.segname) != SEGMENT_NAME {
            continue;
        }
        for i in 0..seg.nsects as usize {
            let hdr = lc.offset + SIZEOF_SEGMENT_COMMAND + i * SIZEOF_SECTION_HEADER;
            let sect_name = read_name16(data, hdr)?;
            if sect_name != SECTION_NAME {
                continue;
            }
            let sect_capacity = read_u64_le(data, hdr + 40)? as usize;
            let sect_off = read_u32_le(data, hdr + 48)? as usize;
            let seg_end = seg.fileoff.checked_add(seg.filesize);
            let sect_end = sect_off.checked_add(sect_capacity);
            let within_segment = match (sect_end, seg_end) {
                (Some(sect_end), Some(seg_end)) => {
                    sect_end <= data.len() && sect_end as u64 <= seg_end
                }
                _ => false,
            };
            if !within_segment {
                return Err(HostError::MalformedHost(
                    "__bun section extends past its segment".into(),
                ));
            }
            return Ok(BunGeometry {
                seg_cmd_off: lc.offset,
                seg_fileoff: seg.fileoff,
                seg_filesize: seg.filesize,
                seg_vmaddr: seg.vmaddr,
                seg_vmsize: seg.vmsize,
                sect_hdr_off: hdr,
                sect_off,
                sect_capacity,
                page_size,
            });
        }
    }
    Err(HostError::MissingSegment {
        segment: "__BUN",
        section: "__bun",
    })
}

fn read_name16(data: &[u8], offset: usize) -> Result<&[u8], HostError> {
    if offset + 16 > data.len() {
        return Err(HostError::MalformedHost("section header out of file".into()));
    }
    Ok(name16(&data[offset..offset + 16]))
}

/// Split the section content into its length prefix and the container bytes,
/// trying the 8-byte interpretation first, then the 4-byte one. Either is
/// accepted only when the declared length fills the section up to at most
/// [`PAD_TOLERANCE`] bytes of padding.
pub(super) fn split_section_header(section: &[u8]) -> Result<(usize, &[u8]), HostError> {
    let total = section.len();
    if total >= 8 {
        let declared = read_u64_le(section, 0)? as usize;
        if let Some(end) = declared.checked_add(8) {
            if end <= total && end + PAD_TOLERANCE >= total {
                return Ok((8, &section[8..end]));
            }
        }
    }
    if total >= 4 {
        let declared = read_u32_le(section, 0)? as usize;
        if let Some(end) = declared.checked_add(4) {
            if end <= total && end + PAD_TOLERANCE >= total {
                return Ok((4, &section[4..end]));
            }
        }
    }
    Err(HostError::UnrecognizedHeaderFormat)
}

pub(super) fn locate(data: &[u8]) -> Result<(usize, Container), HostError> {
    let macho = parse_binary(data)?;
    let geom = find_bun(&macho, data)?;
    let section = &data[geom.sect_off..geom.sect_off + geom.sect_capacity];
    let (header_width, content) = split_section_header(section)?;
    let container = Container::parse(Bytes::copy_from_slice(content))?;
    Ok((header_width, container))
}

/// Rewrite the `__bun` section with `header ++ container`, growing the
/// `__BUN` segment by a page-aligned delta when the new data no longer fits
/// the section's backing capacity. Any existing code signature is removed
/// first; the structural change invalidates it anyway.
pub(super) fn embed(
    data: &[u8],
    header_width: usize,
    container: &Container,
) -> Result<Vec<u8>, HostError> {
    let mut out = strip_signature(data.to_vec())?;
    let geom = {
        let macho = parse_binary(&out)?;
        find_bun(&macho, &out)?
    };

    let mut section_data = Vec::with_capacity(header_width + container.len());
    if header_width == 8 {
        section_data.extend_from_slice(&(container.len() as u64).to_le_bytes());
    } else {
        section_data.extend_from_slice(&(container.len() as u32).to_le_bytes());
    }
    section_data.extend_from_slice(container.bytes());

    if section_data.len() > geom.sect_capacity {
        let delta = section_data.len() - geom.sect_capacity;
        let aligned = delta.div_ceil(geom.page_size) * geom.page_size;
        grow_segment(&mut out, &geom, aligned)?;
    }

    out[geom.sect_off..geom.sect_off + section_data.len()].copy_from_slice(&section_data);
    if section_data.len() < geom.sect_capacity {
        out[geom.sect_off + section_data.len()..geom.sect_off + geom.sect_capacity].fill(0);
    }
    patch_u64(&mut out, geom.sect_hdr_off + 40, section_data.len() as u64);
    Ok(out)
}

struct RawCommand {
    offset: usize,
    cmd: u32,
    cmdsize: usize,
}

fn walk_commands(data: &[u8]) -> Result<Vec<RawCommand>, HostError> {
    let ncmds = read_u32_le(data, 16)? as usize;
    let sizeofcmds = read_u32_le(data, 20)? as usize;
    let end = SIZEOF_MACH_HEADER + sizeofcmds;
    let mut commands = Vec::with_capacity(ncmds);
    let mut offset = SIZEOF_MACH_HEADER;
    for _ in 0..ncmds {
        if offset + 8 > end {
            return Err(HostError::MalformedHost("load commands overrun".into()));
        }
        let cmd = read_u32_le(data, offset)?;
        let cmdsize = read_u32_le(data, offset + 4)? as usize;
        if cmdsize < 8 || offset + cmdsize > end {
            return Err(HostError::MalformedHost(format!(
                "load command at {offset} has bad size {cmdsize}"
            )));
        }
        commands.push(RawCommand {
            offset,
            cmd,
            cmdsize,
        });
        offset += cmdsize;
    }
    Ok(commands)
}

fn patch_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn patch_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn shift_u32(data: &mut [u8], offset: usize, insert_at: u64, delta: u64) -> Result<(), HostError> {
    let value = read_u32_le(data, offset)?;
    if value != 0 && u64::from(value) >= insert_at {
        patch_u32(data, offset, (u64::from(value) + delta) as u32);
    }
    Ok(())
}

fn shift_u64(data: &mut [u8], offset: usize, insert_at: u64, delta: u64) -> Result<(), HostError> {
    let value = read_u64_le(data, offset)?;
    if value != 0 && value >= insert_at {
        patch_u64(data, offset, value + delta);
    }
    Ok(())
}

/// Insert `aligned` zero bytes at the end of the `__BUN` segment's file
/// region. File offsets are shifted when they lie past the insertion point;
/// vm addresses when they lie past the segment's vm end. The two spaces are
/// unrelated numerically (`__TEXT` maps file offset 0 at a high vm address),
/// so each field is compared in its own space.
fn grow_segment(out: &mut Vec<u8>, geom: &BunGeometry, aligned: usize) -> Result<(), HostError> {
    let insert_at = geom.seg_fileoff + geom.seg_filesize;
    let vm_end = geom
        .seg_vmaddr
        .checked_add(geom.seg_vmsize)
        .ok_or_else(|| HostError::MalformedHost("__BUN segment vm extent overflows".into()))?;
    let delta = aligned as u64;
    out.splice(
        insert_at as usize..insert_at as usize,
        std::iter::repeat(0u8).take(aligned),
    );

    // The grown segment itself.
    let seg_vmsize = read_u64_le(out, geom.seg_cmd_off + 32)?;
    patch_u64(out, geom.seg_cmd_off + 32, seg_vmsize + delta);
    patch_u64(out, geom.seg_cmd_off + 48, geom.seg_filesize + delta);

    for rc in walk_commands(out)? {
        match rc.cmd {
            LC_SEGMENT_64 if rc.offset != geom.seg_cmd_off => {
                shift_u64(out, rc.offset + 24, vm_end, delta)?; // vmaddr
                shift_u64(out, rc.offset + 40, insert_at, delta)?; // fileoff
                let nsects = read_u32_le(out, rc.offset + 64)? as usize;
                for i in 0..nsects {
                    let hdr = rc.offset + SIZEOF_SEGMENT_COMMAND + i * SIZEOF_SECTION_HEADER;
                    shift_u64(out, hdr + 32, vm_end, delta)?; // addr
                    shift_u32(out, hdr + 48, insert_at, delta)?; // offset
                }
            }
            LC_SYMTAB => {
                shift_u32(out, rc.offset + 8, insert_at, delta)?; // symoff
                shift_u32(out, rc.offset + 16, insert_at, delta)?; // stroff
            }
            LC_DYSYMTAB => {
                for field in [32, 40, 48, 56, 64, 72] {
                    shift_u32(out, rc.offset + field, insert_at, delta)?;
                }
            }
            LC_CODE_SIGNATURE
            | LC_FUNCTION_STARTS
            | LC_DATA_IN_CODE
            | LC_DYLIB_CODE_SIGN_DRS
            | LC_LINKER_OPTIMIZATION_HINT
            | LC_DYLD_EXPORTS_TRIE
            | LC_DYLD_CHAINED_FIXUPS => {
                shift_u32(out, rc.offset + 8, insert_at, delta)?; // dataoff
            }
            LC_DYLD_INFO | LC_DYLD_INFO_ONLY => {
                for field in [8, 16, 24, 32, 40] {
                    shift_u32(out, rc.offset + field, insert_at, delta)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Drop an LC_CODE_SIGNATURE load command if present, truncating the
/// signature blob when it sits at end of file and shrinking `__LINKEDIT`
/// accordingly. No-op on unsigned binaries.
fn strip_signature(mut data: Vec<u8>) -> Result<Vec<u8>, HostError> {
    let commands = walk_commands(&data)?;
    let Some(sig) = commands.iter().find(|rc| rc.cmd == LC_CODE_SIGNATURE) else {
        return Ok(data);
    };
    let dataoff = u64::from(read_u32_le(&data, sig.offset + 8)?);
    let datasize = u64::from(read_u32_le(&data, sig.offset + 12)?);

    // Shrink __LINKEDIT when the blob sits at its end.
    for rc in &commands {
        if rc.cmd != LC_SEGMENT_64 {
            continue;
        }
        if name16(&data[rc.offset + 8..rc.offset + 24]) != LINKEDIT_NAME {
            continue;
        }
        let fileoff = read_u64_le(&data, rc.offset + 40)?;
        let filesize = read_u64_le(&data, rc.offset + 48)?;
        if dataoff + datasize == fileoff + filesize {
            patch_u64(&mut data, rc.offset + 48, filesize - datasize);
        }
    }

    // Remove the command itself: slide the following commands down and fix
    // up the header counts.
    let sizeofcmds = read_u32_le(&data, 20)? as usize;
    let cmds_end = SIZEOF_MACH_HEADER + sizeofcmds;
    let sig_end = sig.offset + sig.cmdsize;
    data.copy_within(sig_end..cmds_end, sig.offset);
    data[cmds_end - sig.cmdsize..cmds_end].fill(0);
    let ncmds = read_u32_le(&data, 16)?;
    patch_u32(&mut data, 16, ncmds - 1);
    patch_u32(&mut data, 20, (sizeofcmds - sig.cmdsize) as u32);

    if dataoff + datasize == data.len() as u64 {
        data.truncate(dataoff as usize);
    }
    Ok(data)
}
