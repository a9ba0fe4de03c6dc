//! CP/M to FAT bridge core
//!
//! Moves files between a native CP/M 2.2 style file system and FAT volumes
//! that live on the same disk units:
//! - `bridge`: the two system-call shapes (narrow file/console call, wide
//!   register-block device call)
//! - `diskio`: block-device glue the FAT library reaches the disks through
//! - `file`: one read/write contract over native and FAT files
//! - `engine`: COPY, DIR, REN, DEL, MD and FORMAT
//!
//! # Architecture
//!
//! Everything above the bridge only talks to the `CallBridge` trait. On a
//! development host the `Machine` simulation implements it: native drives
//! are `DriveFS` stores, disk units are image files, and the firmware
//! signature of the chosen dialect sits at the top of memory.

pub mod archive;
pub mod bdos;
pub mod bridge;
pub mod config;
pub mod console;
pub mod diskio;
pub mod engine;
pub mod error;
pub mod file;
pub mod fs;
pub mod identity;
pub mod machine;
pub mod path;
pub mod volume;

pub use archive::{load_archive, load_archive_from_path};
pub use bridge::{Bridge, CallBridge, RegisterBlock};
pub use config::{BiosKind, DriveConfig, MachineConfig, UnitConfig};
pub use console::{Console, CpmConsole, HeadlessConsole};
pub use diskio::{DiskError, DiskIo, DiskStatus, SectorStream};
pub use engine::{CopyOutcome, FormatMode, Session};
pub use error::{CpmError, CpmResult, FsError, FsResult};
pub use file::{FcbArena, NativeFs, OpenMode, UnifiedFile};
pub use fs::{to_8_3, DriveFS, HostDriveFS, MemoryDriveFS};
pub use identity::{HardwareIdentity, Platform};
pub use machine::{DiskUnit, FileImage, Machine, MediaKind, MemoryImage, NativeDrive, Rtc};
pub use path::{FatPath, NativeName, PathReference};
pub use volume::{FatVolume, Volumes};
