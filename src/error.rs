use std::io;
use std::path::{Path, PathBuf};

/// Why a document operation was refused or failed.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Invalid file path: must be a .txt file: {0}")]
    InvalidPath(PathBuf),

    #[error("Access denied: path is outside allowed directories: {0}")]
    AccessDenied(PathBuf),

    #[error("Invalid filename: {0:?}")]
    InvalidName(String),

    #[error("File already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, FileError>;

impl FileError {
    /// Attach `path` to an I/O failure, turning the kinds with a dedicated
    /// variant into that variant and passing everything else through.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileError::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => FileError::AlreadyExists(path.to_path_buf()),
            _ => FileError::Io(err),
        }
    }
}
