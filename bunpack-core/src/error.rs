use thiserror::Error;

/// Structural errors raised while decoding or rebuilding a container.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("read of {width} bytes at offset {offset} is out of bounds (buffer is {len} bytes)")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("string pointer {offset}+{length} exceeds pool of {pool_len} bytes")]
    InvalidPointer {
        offset: u32,
        length: u32,
        pool_len: usize,
    },

    #[error("malformed footer: {0}")]
    MalformedFooter(String),

    #[error("module table length {0} is not a multiple of the record size")]
    TruncatedTable(usize),

    #[error("module name at {offset}+{length} is not valid UTF-8")]
    BadModuleName { offset: u32, length: u32 },

    #[error("container trailer magic not found")]
    MissingTrailer,

    #[error("no module named {0:?} in the container")]
    TargetNotFound(String),
}

/// Errors raised while locating or rewriting a container inside a host
/// executable.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("failed to parse host executable: {0}")]
    Parse(#[from] goblin::error::Error),

    #[error("unsupported host executable format: {0}")]
    UnsupportedHostFormat(String),

    #[error("executable carries no appended container data")]
    NoOverlay,

    #[error("cannot determine section header format (neither 4- nor 8-byte length is plausible)")]
    UnrecognizedHeaderFormat,

    #[error("{segment} segment or {section} section not found")]
    MissingSegment {
        segment: &'static str,
        section: &'static str,
    },

    #[error("malformed host executable: {0}")]
    MalformedHost(String),
}
