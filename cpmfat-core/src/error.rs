//! Error types for the FAT bridge.
//!
//! `FsError` is the closed result enumeration every command operation
//! reports. `CpmError` covers the host side: the simulated machine, drive
//! backing stores and configuration loading.

use std::io;

use thiserror::Error;

use crate::diskio::DiskError;

/// Result codes of file operations, one fixed message each.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("Disk I/O Error")]
    Disk,

    #[error("Internal Error - Assertion Failed")]
    Internal,

    #[error("Drive Not Ready")]
    NotReady,

    #[error("File Not Found")]
    NoFile,

    #[error("Path Not Found")]
    NoPath,

    #[error("Invalid Path Name")]
    InvalidName,

    #[error("Access Denied")]
    Denied,

    #[error("Exists")]
    Exists,

    #[error("Invalid Object")]
    InvalidObject,

    #[error("Write Protected")]
    WriteProtected,

    #[error("Invalid Drive")]
    InvalidDrive,

    #[error("Volume Not Mounted")]
    NotEnabled,

    #[error("No Filesystem on Drive")]
    NoFilesystem,

    #[error("Make Filesystem Failed")]
    MkfsAborted,

    #[error("Timeout")]
    Timeout,

    #[error("Locked")]
    Locked,

    #[error("Insufficient Memory")]
    NotEnoughCore,

    #[error("Too Many Open Files")]
    TooManyOpenFiles,

    #[error("Invalid Parameter")]
    InvalidParameter,
}

impl From<DiskError> for FsError {
    fn from(err: DiskError) -> Self {
        match err {
            DiskError::WriteProtected => FsError::WriteProtected,
            DiskError::NotReady => FsError::NotReady,
            DiskError::InvalidParameter => FsError::InvalidParameter,
            DiskError::Error => FsError::Disk,
        }
    }
}

impl From<io::Error> for FsError {
    /// Map an error surfaced by the FAT library.
    ///
    /// Glue failures travel through `io::Error` as an embedded `DiskError`
    /// and keep their meaning; everything else is classified by kind.
    fn from(err: io::Error) -> Self {
        if let Some(disk) = embedded_disk_error(&err) {
            return disk.into();
        }
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NoFile,
            io::ErrorKind::AlreadyExists => FsError::Exists,
            io::ErrorKind::InvalidInput => FsError::InvalidName,
            io::ErrorKind::PermissionDenied => FsError::Denied,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => FsError::Disk,
            io::ErrorKind::InvalidData => FsError::NoFilesystem,
            // fatfs reports "no space" and "directory not empty" as Other
            _ => FsError::Denied,
        }
    }
}

/// Glue failure carried inside an `io::Error`, if any.
pub(crate) fn embedded_disk_error(err: &io::Error) -> Option<DiskError> {
    err.get_ref()
        .and_then(|e| e.downcast_ref::<DiskError>())
        .copied()
}

/// Result type for file operations.
pub type FsResult<T> = Result<T, FsError>;

/// Errors raised by the simulated machine and its setup.
#[derive(Error, Debug)]
pub enum CpmError {
    #[error("Invalid drive: {0}")]
    InvalidDrive(char),

    #[error("Invalid disk unit: {0}")]
    InvalidUnit(u8),

    #[error("Read-only drive")]
    ReadOnly,

    #[error("Disk full")]
    DiskFull,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for host-side operations.
pub type CpmResult<T> = Result<T, CpmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_fixed() {
        assert_eq!(FsError::NoFile.to_string(), "File Not Found");
        assert_eq!(FsError::InvalidObject.to_string(), "Invalid Object");
        assert_eq!(FsError::InvalidParameter.to_string(), "Invalid Parameter");
    }

    #[test]
    fn test_embedded_disk_error_survives_io_error() {
        let err = io::Error::new(io::ErrorKind::Other, DiskError::WriteProtected);
        assert_eq!(FsError::from(err), FsError::WriteProtected);

        let err = io::Error::new(io::ErrorKind::Other, DiskError::Error);
        assert_eq!(FsError::from(err), FsError::Disk);
    }

    #[test]
    fn test_io_kind_mapping() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(FsError::from(err), FsError::NoFile);

        let err = io::Error::new(io::ErrorKind::AlreadyExists, "there");
        assert_eq!(FsError::from(err), FsError::Exists);
    }
}
