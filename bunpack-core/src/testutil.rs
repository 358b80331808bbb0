//! Fixture builders shared across unit tests: a synthetic container packer
//! and minimal-but-parseable ELF / Mach-O images.

use bytes::Bytes;

use crate::container::{Container, Footer, StringPointer, SIZEOF_MODULE, TRAILER};

fn push_field(pool: &mut Vec<u8>, bytes: &[u8]) -> StringPointer {
    let ptr = StringPointer {
        offset: pool.len() as u32,
        length: bytes.len() as u32,
    };
    pool.extend_from_slice(bytes);
    pool.push(0);
    ptr
}

/// Pack a well-formed container from `(name, contents, sourcemap, bytecode,
/// tags)` tuples.
pub(crate) fn build_container(
    modules: &[(&str, &[u8], &[u8], &[u8], [u8; 4])],
    entry_point_id: u32,
    argv: &[u8],
) -> Container {
    let mut pool = Vec::new();
    let mut pointers = Vec::with_capacity(modules.len());
    for (name, contents, sourcemap, bytecode, _) in modules {
        pointers.push([
            push_field(&mut pool, name.as_bytes()),
            push_field(&mut pool, contents),
            push_field(&mut pool, sourcemap),
            push_field(&mut pool, bytecode),
        ]);
    }
    let modules_ptr = StringPointer {
        offset: pool.len() as u32,
        length: (modules.len() * SIZEOF_MODULE) as u32,
    };
    for (ptrs, (_, _, _, _, tags)) in pointers.iter().zip(modules) {
        for ptr in ptrs {
            ptr.write_to(&mut pool);
        }
        pool.extend_from_slice(tags);
    }
    let compile_exec_argv_ptr = push_field(&mut pool, argv);
    let footer = Footer {
        byte_count: pool.len() as u64,
        modules_ptr,
        entry_point_id,
        compile_exec_argv_ptr,
    };
    pool.extend_from_slice(&footer.serialize());
    pool.extend_from_slice(TRAILER);
    Container::parse(Bytes::from(pool)).expect("well-formed test container")
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_name16(out: &mut Vec<u8>, name: &str) {
    let mut buf = [0u8; 16];
    buf[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&buf);
}

/// A 120-byte 64-bit ELF executable with a single PT_LOAD covering the whole
/// file and no section headers. Anything appended past it is overlay.
pub(crate) fn minimal_elf() -> Vec<u8> {
    const LEN: u64 = 120;
    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    out.extend_from_slice(&[0u8; 8]);
    put_u16(&mut out, 2); // ET_EXEC
    put_u16(&mut out, 0x3e); // EM_X86_64
    put_u32(&mut out, 1);
    put_u64(&mut out, 0x400078); // e_entry
    put_u64(&mut out, 64); // e_phoff
    put_u64(&mut out, 0); // e_shoff
    put_u32(&mut out, 0);
    put_u16(&mut out, 64); // e_ehsize
    put_u16(&mut out, 56); // e_phentsize
    put_u16(&mut out, 1); // e_phnum
    put_u16(&mut out, 64); // e_shentsize
    put_u16(&mut out, 0); // e_shnum
    put_u16(&mut out, 0); // e_shstrndx

    // PT_LOAD
    put_u32(&mut out, 1);
    put_u32(&mut out, 5); // r-x
    put_u64(&mut out, 0); // p_offset
    put_u64(&mut out, 0x400000);
    put_u64(&mut out, 0x400000);
    put_u64(&mut out, LEN); // p_filesz
    put_u64(&mut out, LEN); // p_memsz
    put_u64(&mut out, 0x1000);

    assert_eq!(out.len() as u64, LEN);
    out
}

pub(crate) const MACHO_SECT_OFFSET: usize = 512;
pub(crate) const CPU_TYPE_X86_64: u32 = 0x0100_0007;
pub(crate) const CPU_TYPE_ARM64: u32 = 0x0100_000C;

/// A 64-bit Mach-O executable with a `__BUN` segment holding one `__bun`
/// section of `capacity` file bytes (the `payload` is written at its start),
/// a `__LINKEDIT` segment behind it and an LC_SYMTAB pointing into linkedit.
/// Optionally carries an LC_CODE_SIGNATURE whose blob sits at end of file.
pub(crate) fn minimal_macho(
    payload: &[u8],
    capacity: usize,
    cputype: u32,
    with_signature: bool,
) -> Vec<u8> {
    assert!(payload.len() <= capacity);
    let linkedit_off = (MACHO_SECT_OFFSET + capacity) as u64;
    let sig_size: u32 = 16;
    let linkedit_size: u64 = 32 + if with_signature { sig_size as u64 } else { 0 };
    let ncmds: u32 = 3 + u32::from(with_signature);
    let sizeofcmds: u32 = 152 + 72 + 24 + if with_signature { 16 } else { 0 };

    let mut out = Vec::new();
    // mach_header_64
    put_u32(&mut out, 0xFEED_FACF);
    put_u32(&mut out, cputype);
    put_u32(&mut out, 3);
    put_u32(&mut out, 2); // MH_EXECUTE
    put_u32(&mut out, ncmds);
    put_u32(&mut out, sizeofcmds);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);

    // LC_SEGMENT_64 __BUN with one section
    put_u32(&mut out, 0x19);
    put_u32(&mut out, 152);
    put_name16(&mut out, "__BUN");
    put_u64(&mut out, 0x4000); // vmaddr
    put_u64(&mut out, 0x4000); // vmsize
    put_u64(&mut out, MACHO_SECT_OFFSET as u64);
    put_u64(&mut out, capacity as u64); // filesize
    put_u32(&mut out, 3);
    put_u32(&mut out, 3);
    put_u32(&mut out, 1); // nsects
    put_u32(&mut out, 0);
    // section_64 __bun
    put_name16(&mut out, "__bun");
    put_name16(&mut out, "__BUN");
    put_u64(&mut out, 0x4000); // addr
    put_u64(&mut out, capacity as u64); // size
    put_u32(&mut out, MACHO_SECT_OFFSET as u32); // offset
    put_u32(&mut out, 0); // align
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);

    // LC_SEGMENT_64 __LINKEDIT
    put_u32(&mut out, 0x19);
    put_u32(&mut out, 72);
    put_name16(&mut out, "__LINKEDIT");
    put_u64(&mut out, 0x8000);
    put_u64(&mut out, 0x4000);
    put_u64(&mut out, linkedit_off);
    put_u64(&mut out, linkedit_size);
    put_u32(&mut out, 1);
    put_u32(&mut out, 1);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);

    // LC_SYMTAB
    put_u32(&mut out, 0x2);
    put_u32(&mut out, 24);
    put_u32(&mut out, linkedit_off as u32); // symoff
    put_u32(&mut out, 0); // nsyms
    put_u32(&mut out, linkedit_off as u32 + 16); // stroff
    put_u32(&mut out, 8); // strsize

    if with_signature {
        put_u32(&mut out, 0x1d);
        put_u32(&mut out, 16);
        put_u32(&mut out, (linkedit_off + 32) as u32); // dataoff
        put_u32(&mut out, sig_size); // datasize
    }

    out.resize(MACHO_SECT_OFFSET, 0);
    out.extend_from_slice(payload);
    out.resize(MACHO_SECT_OFFSET + capacity, 0);
    out.resize(MACHO_SECT_OFFSET + capacity + 32, 0);
    if with_signature {
        out.extend_from_slice(&[0xCC; 16]);
    }
    out
}

pub(crate) const MACHO_TEXT_VMADDR: u64 = 0x1_0000_0000;
pub(crate) const MACHO_BUN_VMADDR: u64 = 0x1_0000_4000;
pub(crate) const MACHO_LINKEDIT_VMADDR: u64 = 0x1_0000_8000;

/// Like [`minimal_macho`] but with a `__TEXT`-style segment ahead of `__BUN`:
/// file offset 0 under a high vm base, the layout real executables have.
pub(crate) fn macho_with_text(capacity: usize) -> Vec<u8> {
    let linkedit_off = (MACHO_SECT_OFFSET + capacity) as u64;

    let mut out = Vec::new();
    // mach_header_64
    put_u32(&mut out, 0xFEED_FACF);
    put_u32(&mut out, CPU_TYPE_X86_64);
    put_u32(&mut out, 3);
    put_u32(&mut out, 2); // MH_EXECUTE
    put_u32(&mut out, 4); // ncmds
    put_u32(&mut out, 72 + 152 + 72 + 24);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);

    // LC_SEGMENT_64 __TEXT
    put_u32(&mut out, 0x19);
    put_u32(&mut out, 72);
    put_name16(&mut out, "__TEXT");
    put_u64(&mut out, MACHO_TEXT_VMADDR);
    put_u64(&mut out, 0x4000);
    put_u64(&mut out, 0); // fileoff
    put_u64(&mut out, MACHO_SECT_OFFSET as u64);
    put_u32(&mut out, 5);
    put_u32(&mut out, 5);
    put_u32(&mut out, 0); // nsects
    put_u32(&mut out, 0);

    // LC_SEGMENT_64 __BUN with one section
    put_u32(&mut out, 0x19);
    put_u32(&mut out, 152);
    put_name16(&mut out, "__BUN");
    put_u64(&mut out, MACHO_BUN_VMADDR);
    put_u64(&mut out, 0x4000);
    put_u64(&mut out, MACHO_SECT_OFFSET as u64);
    put_u64(&mut out, capacity as u64);
    put_u32(&mut out, 3);
    put_u32(&mut out, 3);
    put_u32(&mut out, 1); // nsects
    put_u32(&mut out, 0);
    // section_64 __bun
    put_name16(&mut out, "__bun");
    put_name16(&mut out, "__BUN");
    put_u64(&mut out, MACHO_BUN_VMADDR); // addr
    put_u64(&mut out, capacity as u64); // size
    put_u32(&mut out, MACHO_SECT_OFFSET as u32); // offset
    put_u32(&mut out, 0); // align
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);

    // LC_SEGMENT_64 __LINKEDIT
    put_u32(&mut out, 0x19);
    put_u32(&mut out, 72);
    put_name16(&mut out, "__LINKEDIT");
    put_u64(&mut out, MACHO_LINKEDIT_VMADDR);
    put_u64(&mut out, 0x4000);
    put_u64(&mut out, linkedit_off);
    put_u64(&mut out, 32);
    put_u32(&mut out, 1);
    put_u32(&mut out, 1);
    put_u32(&mut out, 0);
    put_u32(&mut out, 0);

    // LC_SYMTAB
    put_u32(&mut out, 0x2);
    put_u32(&mut out, 24);
    put_u32(&mut out, linkedit_off as u32); // symoff
    put_u32(&mut out, 0);
    put_u32(&mut out, linkedit_off as u32 + 16); // stroff
    put_u32(&mut out, 8);

    out.resize(MACHO_SECT_OFFSET, 0);
    out.resize(MACHO_SECT_OFFSET + capacity, 0);
    out.resize(MACHO_SECT_OFFSET + capacity + 32, 0);
    out
}
