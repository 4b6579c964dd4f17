use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while archiving or extracting.
///
/// Everything except [`TarError::Checksum`] is an I/O class failure.
/// Neither class is retried.
#[derive(Debug, Error)]
pub enum TarError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("input directory does not exist: {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("output directory cannot be blank")]
    BlankOutputDir,
    #[error("file length mismatch for {}: expected {expected} bytes, copied {copied}", .path.display())]
    LengthMismatch {
        path: PathBuf,
        expected: u64,
        copied: u64,
    },
    #[error("{} is too large for a ustar header ({size} bytes)", .path.display())]
    TooLarge { path: PathBuf, size: u64 },
    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("checksum mismatch (stored: {stored:?}, computed: {computed:o})")]
    Checksum { stored: String, computed: u32 },
}

impl TarError {
    /// True for a header checksum mismatch, false for every I/O class error
    pub fn is_checksum(&self) -> bool {
        matches!(self, TarError::Checksum { .. })
    }
}

pub type TarResult<T> = Result<T, TarError>;
