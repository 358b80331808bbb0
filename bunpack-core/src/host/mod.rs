//! Host executable handling: detect the wrapper shape, locate the embedded
//! container, and write a rebuilt container back.
//!
//! Everything is synchronous and single-pass: load parses the executable and
//! the container once; repack rebuilds, writes a temporary file and renames
//! it into place so a crash mid-write never corrupts anything.

mod elf;
mod macho;
mod signing;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use goblin::Object;

use crate::container::{self, Container, ModuleMatcher};
use crate::error::HostError;

/// How the host executable wraps the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKind {
    /// Container appended past the executable's defined content (ELF),
    /// followed by an 8-byte length field.
    TrailingAppend,
    /// Container inside the `__BUN`/`__bun` segment/section (Mach-O),
    /// preceded by a length prefix of the given width.
    Segment { header_width: usize },
}

enum Wrapper {
    Elf { content_end: usize },
    MachO { header_width: usize },
}

/// A host executable with its embedded container located.
pub struct HostImage {
    path: PathBuf,
    data: Vec<u8>,
    wrapper: Wrapper,
    container: Container,
}

impl HostImage {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;
        let (wrapper, container) = match Object::parse(&data)? {
            Object::Elf(elf) => {
                let (content_end, container) = elf::locate(&elf, &data)?;
                (Wrapper::Elf { content_end }, container)
            }
            Object::Mach(_) => {
                let (header_width, container) = macho::locate(&data)?;
                (Wrapper::MachO { header_width }, container)
            }
            Object::PE(_) => return Err(HostError::UnsupportedHostFormat("PE".into())),
            _ => return Err(HostError::UnsupportedHostFormat("unknown".into())),
        };
        log::debug!(
            "located {} byte container in {}",
            container.len(),
            path.display()
        );
        Ok(Self {
            path,
            data,
            wrapper,
            container,
        })
    }

    pub fn kind(&self) -> HostKind {
        match self.wrapper {
            Wrapper::Elf { .. } => HostKind::TrailingAppend,
            Wrapper::MachO { header_width } => HostKind::Segment { header_width },
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Copy out the contents of the module matched by `matcher`.
    pub fn extract(&self, matcher: &ModuleMatcher) -> Result<Vec<u8>, HostError> {
        Ok(self.container.module_contents(matcher)?.to_vec())
    }

    /// Rebuild the container with the matched module's contents replaced and
    /// write a new executable to `output`. Returns the new container size.
    pub fn repack(
        &self,
        matcher: &ModuleMatcher,
        new_contents: &[u8],
        output: &Path,
    ) -> Result<usize, HostError> {
        let rebuilt = container::rebuild(&self.container, matcher, new_contents)?;
        let out_bytes = match &self.wrapper {
            Wrapper::Elf { content_end } => elf::embed(&self.data, *content_end, &rebuilt),
            Wrapper::MachO { header_width } => macho::embed(&self.data, *header_width, &rebuilt)?,
        };
        let container_len = rebuilt.len();
        write_atomic(&self.path, output, &out_bytes)?;
        if matches!(self.wrapper, Wrapper::MachO { .. }) {
            signing::resign(output);
        }
        Ok(container_len)
    }
}

/// Write to `<output>.tmp` with the original's permission bits, then rename
/// into place.
fn write_atomic(original: &Path, output: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp_name = OsString::from(output.as_os_str());
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, bytes)?;
    let permissions = fs::metadata(original)?.permissions();
    fs::set_permissions(&tmp, permissions)?;
    fs::rename(&tmp, output)?;
    Ok(())
}
