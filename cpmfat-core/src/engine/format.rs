//! FORMAT: lay down a new FAT file system on a unit.

use std::fmt;

use fatfs::{format_volume, FormatVolumeOptions};

use crate::diskio::{DiskStatus, SectorStream};
use crate::error::{FsError, FsResult};
use crate::path::FatPath;

use super::Session;

/// How a unit is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    /// Memory and removable media: one volume, no partition table.
    SuperFloppy,
    /// Fixed disks. Also one volume over the whole unit starting at
    /// sector 0; no partition table is written.
    FixedDisk,
}

impl FormatMode {
    pub fn media(self) -> u8 {
        match self {
            FormatMode::SuperFloppy => 0xF0,
            FormatMode::FixedDisk => 0xF8,
        }
    }

    pub fn drive_num(self) -> u8 {
        match self {
            FormatMode::SuperFloppy => 0x00,
            FormatMode::FixedDisk => 0x80,
        }
    }
}

impl fmt::Display for FormatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormatMode::SuperFloppy => "super-floppy",
            FormatMode::FixedDisk => "fixed disk",
        })
    }
}

impl Session {
    /// Choose the layout for a unit from its device characteristics.
    pub fn format_mode(&self, unit: u8) -> FsResult<FormatMode> {
        let info = self.disk.device_info(unit)?;
        Ok(if info.is_removable_like() {
            FormatMode::SuperFloppy
        } else {
            FormatMode::FixedDisk
        })
    }

    /// Format a unit after confirmation. Returns `false` when the user
    /// declined; nothing is written in that case.
    ///
    /// Both modes put the boot sector at sector 0 and span the whole unit.
    /// Fixed disks get the fixed-disk media byte and drive number but no
    /// MBR, so partitioning tools will not see a partition on them.
    pub fn format(&self, unit_arg: &str) -> FsResult<bool> {
        let spec = if unit_arg.contains(':') {
            unit_arg.to_string()
        } else {
            format!("{}:", unit_arg)
        };
        let unit = FatPath::parse(&spec)?.unit();

        if self.disk.initialize(unit).contains(DiskStatus::NOINIT) {
            return Err(FsError::NotReady);
        }
        let mode = self.format_mode(unit)?;

        let prompt = format!(
            "\nFormat unit {} as {}? All data on it will be lost. (Y/N) ",
            unit, mode
        );
        if !self.console.confirm(&prompt) {
            self.console.print("\nFormat aborted");
            return Ok(false);
        }

        let mut stream = SectorStream::open(self.disk.clone(), unit)?;
        let options = FormatVolumeOptions::new()
            .total_sectors(stream.sector_count())
            .media(mode.media())
            .drive_num(mode.drive_num())
            .volume_label(*b"NO NAME    ");
        format_volume(&mut stream, options).map_err(|e| {
            log::debug!("format of unit {} failed: {}", unit, e);
            FsError::MkfsAborted
        })?;

        self.console.print(&format!("\nUnit {} formatted ({})", unit, mode));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parameters() {
        assert_eq!(FormatMode::SuperFloppy.media(), 0xF0);
        assert_eq!(FormatMode::FixedDisk.media(), 0xF8);
        assert_eq!(FormatMode::FixedDisk.drive_num(), 0x80);
        assert_eq!(FormatMode::SuperFloppy.to_string(), "super-floppy");
    }
}
