//! Custom error type for the xtask crate.

use thiserror::Error;

pub type XtaskResult<T> = Result<T, XtaskError>;

/// Failure modes of the image tooling.
#[derive(Error, Debug)]
pub enum XtaskError {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors when parsing ELF files.
    #[error("ELF parsing error: {0}")]
    ElfParse(String),

    /// A loadable section is linked outside the code flash range.
    #[error("section at {address:#x}+{size:#x} falls outside code flash")]
    SectionOutOfFlash { address: u64, size: u64 },

    /// The ELF carries no loadable bytes at all.
    #[error("no loadable sections in ELF")]
    EmptyImage,
}
