//! Backing stores of native drives.
//!
//! - `DriveFS`: one drive (A-P) as a flat set of 8.3 files
//! - `MemoryDriveFS`: in-memory implementation
//! - `HostDriveFS`: files in a host directory

mod drive_fs;
mod host_drive;
mod memory_drive;

pub use drive_fs::{to_8_3, DriveFS};
pub use host_drive::HostDriveFS;
pub use memory_drive::MemoryDriveFS;
