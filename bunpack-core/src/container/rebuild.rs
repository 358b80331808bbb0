//! Rebuilding a container with one module's contents replaced.

use bytes::Bytes;

use crate::error::CodecError;

use super::{Container, Footer, ModuleMatcher, StringPointer, SIZEOF_MODULE, TRAILER};

/// Append `bytes` to the pool as a NUL-terminated field and record where it
/// landed. The recorded length excludes the terminator.
fn append_field(pool: &mut Vec<u8>, bytes: &[u8]) -> StringPointer {
    let ptr = StringPointer {
        offset: pool.len() as u32,
        length: bytes.len() as u32,
    };
    pool.extend_from_slice(bytes);
    pool.push(0);
    ptr
}

/// Produce a new container in which the module matched by `matcher` carries
/// `new_contents`. Every other module keeps all four fields and all four tag
/// bytes byte-identical; the entry-point id and the argv string are preserved
/// verbatim.
///
/// The pool is packed fresh and append-only: per module its name, contents,
/// sourcemap and bytecode fields in table order, then the module table as one
/// block, then the argv string, then footer and trailer. Pointers are
/// recorded as fields are appended, so nothing previously written is ever
/// touched again.
pub fn rebuild(
    container: &Container,
    matcher: &ModuleMatcher,
    new_contents: &[u8],
) -> Result<Container, CodecError> {
    let pool = container.pool();
    let modules = container.modules()?;
    if !modules.iter().any(|m| matcher.matches(&m.name)) {
        return Err(CodecError::TargetNotFound(matcher.base().to_owned()));
    }

    struct Resolved<'a> {
        fields: [&'a [u8]; 4],
        tags: [u8; 4],
    }

    // Resolve every field against the old pool before any writing starts.
    let mut resolved = Vec::with_capacity(modules.len());
    for module in &modules {
        let record = &module.record;
        let contents = if matcher.matches(&module.name) {
            new_contents
        } else {
            record.contents.slice(pool)?
        };
        resolved.push(Resolved {
            fields: [
                record.name.slice(pool)?,
                contents,
                record.sourcemap.slice(pool)?,
                record.bytecode.slice(pool)?,
            ],
            tags: [
                record.encoding,
                record.loader,
                record.module_format,
                record.side,
            ],
        });
    }
    let argv = container.footer().compile_exec_argv_ptr.slice(pool)?;

    let mut out: Vec<u8> = Vec::new();
    let mut pointers: Vec<[StringPointer; 4]> = Vec::with_capacity(resolved.len());
    for entry in &resolved {
        pointers.push(entry.fields.map(|field| append_field(&mut out, field)));
    }

    let modules_ptr = StringPointer {
        offset: out.len() as u32,
        length: (resolved.len() * SIZEOF_MODULE) as u32,
    };
    for (ptrs, entry) in pointers.iter().zip(&resolved) {
        for ptr in ptrs {
            ptr.write_to(&mut out);
        }
        out.extend_from_slice(&entry.tags);
    }

    let compile_exec_argv_ptr = append_field(&mut out, argv);

    let footer = Footer {
        byte_count: out.len() as u64,
        modules_ptr,
        entry_point_id: container.footer().entry_point_id,
        compile_exec_argv_ptr,
    };
    out.extend_from_slice(&footer.serialize());
    out.extend_from_slice(TRAILER);

    Container::parse(Bytes::from(out))
}
