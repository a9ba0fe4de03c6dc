//! Command-level operations across both file systems.
//!
//! A `Session` carries everything a command needs: the detected platform,
//! the disk glue, the console and the native file primitives. FAT units
//! are mounted per command and unmounted when it finishes.

mod copy;
mod dir;
mod format;
mod ops;
mod walk;

use crate::bridge::Bridge;
use crate::console::Console;
use crate::diskio::DiskIo;
use crate::error::FsResult;
use crate::file::NativeFs;
use crate::identity::Platform;
use crate::path::FatPath;
use crate::volume::Volumes;

pub use copy::CopyOutcome;
pub use format::FormatMode;
pub use walk::{DirectoryBatch, BATCH_SIZE};

/// State shared by all commands of one run.
pub struct Session {
    platform: Platform,
    disk: DiskIo,
    console: Console,
    native: NativeFs,
}

impl Session {
    /// Detect the platform behind `bridge` and set up the services.
    pub fn new(bridge: Bridge) -> Self {
        let platform = Platform::detect(&bridge);
        Self {
            platform,
            disk: DiskIo::new(bridge.clone(), platform.identity),
            console: Console::new(bridge.clone()),
            native: NativeFs::new(bridge),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn disk(&self) -> &DiskIo {
        &self.disk
    }

    pub fn native(&self) -> &NativeFs {
        &self.native
    }

    /// Mount the unit named by a FAT path into `volumes`.
    fn mount(&self, volumes: &mut Volumes, path: &str) -> FsResult<FatPath> {
        let fat = FatPath::parse(path)?;
        volumes.mount(fat.unit())?;
        Ok(fat)
    }

    fn volumes(&self) -> Volumes {
        Volumes::new(self.disk.clone())
    }
}

/// Release every mounted unit at the end of a command. Unmount failures
/// do not replace the command's own result.
fn finish<T>(mut volumes: Volumes, result: FsResult<T>) -> FsResult<T> {
    if let Err(e) = volumes.unmount_all() {
        log::debug!("unmount after command: {}", e);
    }
    result
}
