//! FAT volumes mounted through the disk glue.

use std::collections::HashMap;
use std::io;

use fatfs::{Dir, FileSystem, FsOptions};

use crate::diskio::{DiskError, DiskIo, DiskStatus, RtcTimeProvider, SectorStream};
use crate::error::{FsError, FsResult};
use crate::file::{FatFile, OpenMode};

/// Directory handle on a mounted volume.
pub type FatDir<'v> = Dir<'v, SectorStream>;

/// One mounted FAT unit.
pub struct FatVolume {
    unit: u8,
    fs: FileSystem<SectorStream>,
}

impl FatVolume {
    /// Mount the FAT file system on `unit`.
    ///
    /// Timestamps written during this mount come from one clock reading
    /// taken here.
    pub fn mount(disk: &DiskIo, unit: u8) -> FsResult<Self> {
        let status = disk.initialize(unit);
        if status.contains(DiskStatus::NOINIT) {
            return Err(FsError::NotReady);
        }
        let stream = SectorStream::open(disk.clone(), unit)?;

        // fatfs keeps a 'static provider for the life of the file system.
        let clock: &'static RtcTimeProvider =
            Box::leak(Box::new(RtcTimeProvider::new(disk.fat_time())));
        let options = FsOptions::new().time_provider(clock);

        let fs = FileSystem::new(stream, options).map_err(mount_error)?;
        log::debug!("mounted FAT unit {}", unit);
        Ok(Self { unit, fs })
    }

    pub fn unit(&self) -> u8 {
        self.unit
    }

    pub fn root(&self) -> FatDir<'_> {
        self.fs.root_dir()
    }

    /// Open a directory by path relative to the root; empty means root.
    pub fn dir(&self, path: &str) -> FsResult<FatDir<'_>> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(self.root());
        }
        self.root().open_dir(path).map_err(|e| match FsError::from(e) {
            FsError::NoFile => FsError::NoPath,
            other => other,
        })
    }

    pub fn exists(&self, path: &str) -> bool {
        self.root().open_file(path).is_ok()
    }

    /// Open a file for reading, or create/truncate it for writing.
    pub fn open_file(&self, path: &str, mode: OpenMode) -> FsResult<FatFile<'_>> {
        let root = self.root();
        match mode {
            OpenMode::Read => Ok(root.open_file(path)?),
            OpenMode::Write => {
                let mut file = root.create_file(path)?;
                file.truncate()?;
                Ok(file)
            }
        }
    }

    pub fn unmount(self) -> FsResult<()> {
        self.fs.unmount()?;
        Ok(())
    }
}

/// An unreadable boot sector means there is no file system; disk errors
/// pass through.
fn mount_error(err: io::Error) -> FsError {
    if err
        .get_ref()
        .and_then(|e| e.downcast_ref::<DiskError>())
        .is_some()
    {
        FsError::from(err)
    } else {
        FsError::NoFilesystem
    }
}

/// FAT units mounted for the current command.
pub struct Volumes {
    disk: DiskIo,
    mounted: HashMap<u8, FatVolume>,
}

impl Volumes {
    pub fn new(disk: DiskIo) -> Self {
        Self {
            disk,
            mounted: HashMap::new(),
        }
    }

    /// Mount `unit` unless it already is.
    pub fn mount(&mut self, unit: u8) -> FsResult<()> {
        if !self.mounted.contains_key(&unit) {
            let volume = FatVolume::mount(&self.disk, unit)?;
            self.mounted.insert(unit, volume);
        }
        Ok(())
    }

    pub fn get(&self, unit: u8) -> FsResult<&FatVolume> {
        self.mounted.get(&unit).ok_or(FsError::NotEnabled)
    }

    pub fn is_mounted(&self, unit: u8) -> bool {
        self.mounted.contains_key(&unit)
    }

    /// Unmount one unit, flushing its file system.
    pub fn unmount(&mut self, unit: u8) -> FsResult<()> {
        match self.mounted.remove(&unit) {
            Some(volume) => volume.unmount(),
            None => Err(FsError::NotEnabled),
        }
    }

    /// Unmount everything; the first failure is reported.
    pub fn unmount_all(&mut self) -> FsResult<()> {
        let mut result = Ok(());
        for (unit, volume) in self.mounted.drain() {
            if let Err(e) = volume.unmount() {
                log::debug!("unmount of unit {} failed: {}", unit, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    pub fn disk(&self) -> &DiskIo {
        &self.disk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::console::HeadlessConsole;
    use crate::identity::HardwareIdentity;
    use crate::machine::{DiskUnit, Machine, MediaKind, MemoryImage};
    use std::io::{Read, Write};

    fn disk_with(identity: HardwareIdentity, formatted: bool) -> DiskIo {
        let mut image = MemoryImage::new(4096);
        if formatted {
            let mut cursor = io::Cursor::new(vec![0u8; 4096 * 512]);
            fatfs::format_volume(&mut cursor, fatfs::FormatVolumeOptions::new()).unwrap();
            image = MemoryImage::from_bytes(cursor.into_inner());
        }
        let mut machine = Machine::new(HeadlessConsole::new(), identity);
        machine.attach_unit(DiskUnit::new(MediaKind::Fixed, Box::new(image)));
        DiskIo::new(Bridge::from(machine.into_shared()), identity)
    }

    #[test]
    fn test_mount_write_read() {
        let mut volumes = Volumes::new(disk_with(HardwareIdentity::Hbios, true));
        volumes.mount(0).unwrap();
        {
            let volume = volumes.get(0).unwrap();
            let mut file = volume.open_file("HELLO.TXT", OpenMode::Write).unwrap();
            file.write_all(b"hello fat").unwrap();
        }
        volumes.unmount(0).unwrap();

        volumes.mount(0).unwrap();
        let volume = volumes.get(0).unwrap();
        let mut text = String::new();
        volume
            .open_file("HELLO.TXT", OpenMode::Read)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "hello fat");
        assert!(volume.exists("HELLO.TXT"));
        assert!(!volume.exists("OTHER.TXT"));
    }

    #[test]
    fn test_mount_failures() {
        let mut volumes = Volumes::new(disk_with(HardwareIdentity::Hbios, false));
        assert_eq!(volumes.mount(0), Err(FsError::NoFilesystem));
        assert_eq!(volumes.mount(3), Err(FsError::NotReady));
        assert_eq!(volumes.get(0).err(), Some(FsError::NotEnabled));

        let mut volumes = Volumes::new(disk_with(HardwareIdentity::Unknown, true));
        assert_eq!(volumes.mount(0), Err(FsError::NotReady));
    }

    #[test]
    fn test_missing_directory_is_no_path() {
        let mut volumes = Volumes::new(disk_with(HardwareIdentity::Hbios, true));
        volumes.mount(0).unwrap();
        let volume = volumes.get(0).unwrap();
        assert!(volume.dir("/").is_ok());
        assert_eq!(volume.dir("NOPE").err(), Some(FsError::NoPath));
    }
}
