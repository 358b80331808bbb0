//! The module table: fixed-size records and name matching.

use crate::error::CodecError;

use super::primitives::{read_u8, StringPointer, SIZEOF_STRING_POINTER};

/// Four string pointers plus four tag bytes.
pub const SIZEOF_MODULE: usize = 4 * SIZEOF_STRING_POINTER + 4;

/// One fixed-size module-table record.
///
/// The tag bytes (`encoding`, `loader`, `module_format`, `side`) are opaque
/// to this tool and preserved verbatim on rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleRecord {
    pub name: StringPointer,
    pub contents: StringPointer,
    pub sourcemap: StringPointer,
    pub bytecode: StringPointer,
    pub encoding: u8,
    pub loader: u8,
    pub module_format: u8,
    pub side: u8,
}

impl ModuleRecord {
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self, CodecError> {
        Ok(Self {
            name: StringPointer::read_at(bytes, offset)?,
            contents: StringPointer::read_at(bytes, offset + 8)?,
            sourcemap: StringPointer::read_at(bytes, offset + 16)?,
            bytecode: StringPointer::read_at(bytes, offset + 24)?,
            encoding: read_u8(bytes, offset + 32)?,
            loader: read_u8(bytes, offset + 33)?,
            module_format: read_u8(bytes, offset + 34)?,
            side: read_u8(bytes, offset + 35)?,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.name.write_to(out);
        self.contents.write_to(out);
        self.sourcemap.write_to(out);
        self.bytecode.write_to(out);
        out.push(self.encoding);
        out.push(self.loader);
        out.push(self.module_format);
        out.push(self.side);
    }
}

/// A record plus its eagerly decoded name. The name is the only field decoded
/// up front; everything else resolves lazily through [`StringPointer::slice`].
#[derive(Clone, Debug)]
pub struct Module {
    pub record: ModuleRecord,
    pub name: String,
}

/// Slice `table_bytes` into 36-byte records in file order. Order is
/// semantically significant and preserved on rebuild.
pub fn parse_table(pool: &[u8], table_bytes: &[u8]) -> Result<Vec<Module>, CodecError> {
    if table_bytes.len() % SIZEOF_MODULE != 0 {
        return Err(CodecError::TruncatedTable(table_bytes.len()));
    }
    let mut modules = Vec::with_capacity(table_bytes.len() / SIZEOF_MODULE);
    for offset in (0..table_bytes.len()).step_by(SIZEOF_MODULE) {
        let record = ModuleRecord::parse(table_bytes, offset)?;
        let raw = record.name.slice(pool)?;
        let name = std::str::from_utf8(raw)
            .map_err(|_| CodecError::BadModuleName {
                offset: record.name.offset,
                length: record.name.length,
            })?
            .to_owned();
        modules.push(Module { record, name });
    }
    Ok(modules)
}

pub fn find<'a>(modules: &'a [Module], matcher: &ModuleMatcher) -> Option<&'a Module> {
    modules.iter().find(|m| matcher.matches(&m.name))
}

/// Matches a module by the base name of its embedded path: the name itself,
/// or any path ending in `/<base>`, in both cases with or without a `.exe`
/// extension. Embedded names carry the path the module had at compile time,
/// so matching must be independent of install location.
#[derive(Clone, Debug)]
pub struct ModuleMatcher {
    base: String,
    exe: String,
}

impl ModuleMatcher {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let exe = format!("{base}.exe");
        Self { base, exe }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn matches(&self, name: &str) -> bool {
        [&self.base, &self.exe].iter().any(|candidate| {
            name == candidate.as_str()
                || name
                    .strip_suffix(candidate.as_str())
                    .is_some_and(|prefix| prefix.ends_with('/'))
        })
    }
}
