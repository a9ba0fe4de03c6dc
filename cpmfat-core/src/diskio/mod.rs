//! Block-device glue between the FAT library and the hardware call.
//!
//! Implements status/initialize/read/write/ioctl and the clock query on
//! top of the wide call. Sector transfers are two-phase: seek to an LBA,
//! then transfer. The hardware reports one status byte per phase, so every
//! failure collapses into one generic error.

mod clock;
mod stream;

use bitflags::bitflags;
use thiserror::Error;

use crate::bdos::addr;
use crate::bridge::{hbios, Bridge, RegisterBlock};
use crate::identity::HardwareIdentity;

pub use clock::{bcd_to_bin, pack_fat_time, unpack_fat_time, FALLBACK_FAT_TIME};
pub(crate) use clock::RtcTimeProvider;
pub use stream::SectorStream;

/// Sector size of every unit.
pub const SECTOR_SIZE: usize = 512;

bitflags! {
    /// Drive status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DiskStatus: u8 {
        /// Drive not initialized.
        const NOINIT = 0x01;
        /// No medium in the drive.
        const NODISK = 0x02;
        /// Medium is write protected.
        const PROTECT = 0x04;
    }
}

/// Failure of a glue operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    #[error("disk I/O error")]
    Error,

    #[error("write protected")]
    WriteProtected,

    #[error("not ready")]
    NotReady,

    #[error("invalid parameter")]
    InvalidParameter,
}

pub type DiskResult<T> = Result<T, DiskError>;

/// Control codes understood by `ioctl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IoctlCommand {
    /// Flush pending writes.
    Sync = 0,
    /// Number of sectors on the unit.
    SectorCount = 1,
    /// Bytes per sector.
    SectorSize = 2,
    /// Erase block size in sectors.
    BlockSize = 3,
    /// Sectors no longer in use.
    Trim = 4,
}

impl TryFrom<u8> for IoctlCommand {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Sync),
            1 => Ok(Self::SectorCount),
            2 => Ok(Self::SectorSize),
            3 => Ok(Self::BlockSize),
            4 => Ok(Self::Trim),
            _ => Err(value),
        }
    }
}

/// Data returned by `ioctl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlReply {
    Done,
    SectorCount(u32),
    SectorSize(u16),
    BlockSize(u32),
}

/// Device characteristics reported by the device query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: u8,
    pub attributes: u8,
}

impl DeviceInfo {
    /// Memory disks and removable media are formatted without partitioning.
    pub fn is_removable_like(&self) -> bool {
        self.device_type == hbios::DEVTYPE_MD || self.attributes & hbios::ATTR_REMOVABLE != 0
    }
}

/// Split a sector number into the DE:HL pair of a seek, LBA flag set.
pub fn split_lba(sector: u32) -> (u16, u16) {
    let high = (sector >> 16) as u16 | ((hbios::LBA_FLAG as u16) << 8);
    let low = sector as u16;
    (high, low)
}

/// Glue for all units reachable through one bridge.
#[derive(Clone)]
pub struct DiskIo {
    bridge: Bridge,
    identity: HardwareIdentity,
}

impl DiskIo {
    pub fn new(bridge: Bridge, identity: HardwareIdentity) -> Self {
        Self { bridge, identity }
    }

    /// Number of disk units attached to the system.
    pub fn unit_count(&self) -> Option<u8> {
        let out = self
            .bridge
            .hbios(RegisterBlock::call(hbios::SYSGET, hbios::SYSGET_DIOCNT));
        (out.a() == 0).then(|| out.e())
    }

    /// Current status of a unit, without media discovery.
    pub fn status(&self, unit: u8) -> DiskStatus {
        self.media_status(unit, false)
    }

    /// Prepare a unit for use, running media discovery.
    pub fn initialize(&self, unit: u8) -> DiskStatus {
        if !self.identity.is_known() {
            log::debug!("disk_initialize({}): no supported BIOS", unit);
            return DiskStatus::NOINIT | DiskStatus::NODISK;
        }
        self.media_status(unit, true)
    }

    fn media_status(&self, unit: u8, discover: bool) -> DiskStatus {
        match self.unit_count() {
            Some(count) if unit < count => {}
            _ => return DiskStatus::NOINIT | DiskStatus::NODISK,
        }

        let out = self.bridge.hbios(
            RegisterBlock::call(hbios::DIOMEDIA, unit).with_de(discover as u16),
        );
        if out.a() != 0 {
            log::debug!("media query unit {} failed: {:#04X}", unit, out.a());
            return DiskStatus::NOINIT;
        }
        DiskStatus::empty()
    }

    /// Read whole sectors starting at `sector` into `buf`.
    pub fn read(&self, unit: u8, buf: &mut [u8], sector: u32) -> DiskResult<()> {
        for (i, chunk) in buf.chunks_mut(addr::STAGING_SECTORS * SECTOR_SIZE).enumerate() {
            let count = sector_count(chunk.len())?;
            let lba = chunk_lba(sector, i)?;
            self.seek(unit, lba)?;
            let out = self.bridge.hbios(
                RegisterBlock::call(hbios::DIOREAD, unit)
                    .with_de(count)
                    .with_hl(addr::DISK_STAGING),
            );
            if out.a() != 0 {
                log::debug!("read unit {} lba {} failed: {:#04X}", unit, lba, out.a());
                return Err(DiskError::Error);
            }
            self.bridge.peek(addr::DISK_STAGING, chunk);
        }
        Ok(())
    }

    /// Write whole sectors starting at `sector` from `buf`.
    pub fn write(&self, unit: u8, buf: &[u8], sector: u32) -> DiskResult<()> {
        for (i, chunk) in buf.chunks(addr::STAGING_SECTORS * SECTOR_SIZE).enumerate() {
            let count = sector_count(chunk.len())?;
            let lba = chunk_lba(sector, i)?;
            self.seek(unit, lba)?;
            self.bridge.poke(addr::DISK_STAGING, chunk);
            let out = self.bridge.hbios(
                RegisterBlock::call(hbios::DIOWRITE, unit)
                    .with_de(count)
                    .with_hl(addr::DISK_STAGING),
            );
            if out.a() != 0 {
                log::debug!("write unit {} lba {} failed: {:#04X}", unit, lba, out.a());
                return Err(DiskError::Error);
            }
        }
        Ok(())
    }

    fn seek(&self, unit: u8, sector: u32) -> DiskResult<()> {
        let (high, low) = split_lba(sector);
        let out = self.bridge.hbios(
            RegisterBlock::call(hbios::DIOSEEK, unit)
                .with_de(high)
                .with_hl(low),
        );
        if out.a() != 0 {
            log::debug!("seek unit {} lba {} failed: {:#04X}", unit, sector, out.a());
            return Err(DiskError::Error);
        }
        Ok(())
    }

    /// Miscellaneous drive controls, by raw control code.
    pub fn ioctl(&self, unit: u8, code: u8) -> DiskResult<IoctlReply> {
        let command = IoctlCommand::try_from(code).map_err(|_| DiskError::InvalidParameter)?;
        match command {
            IoctlCommand::Sync | IoctlCommand::Trim => Ok(IoctlReply::Done),
            IoctlCommand::SectorCount => {
                let out = self.bridge.hbios(RegisterBlock::call(hbios::DIOCAP, unit));
                if out.a() != 0 {
                    return Err(DiskError::InvalidParameter);
                }
                Ok(IoctlReply::SectorCount(((out.de as u32) << 16) + out.hl as u32))
            }
            IoctlCommand::SectorSize => Ok(IoctlReply::SectorSize(SECTOR_SIZE as u16)),
            IoctlCommand::BlockSize => Ok(IoctlReply::BlockSize(1)),
        }
    }

    /// Total sectors of a unit.
    pub fn sector_count(&self, unit: u8) -> DiskResult<u32> {
        match self.ioctl(unit, IoctlCommand::SectorCount as u8)? {
            IoctlReply::SectorCount(count) => Ok(count),
            _ => Err(DiskError::Error),
        }
    }

    /// Device type and attributes of a unit.
    pub fn device_info(&self, unit: u8) -> DiskResult<DeviceInfo> {
        let out = self.bridge.hbios(RegisterBlock::call(hbios::DIODEVICE, unit));
        if out.a() != 0 {
            return Err(DiskError::NotReady);
        }
        Ok(DeviceInfo {
            device_type: out.d(),
            attributes: out.c(),
        })
    }

    /// Current date and time in FAT layout.
    ///
    /// Falls back to a fixed timestamp when the clock cannot be read.
    pub fn fat_time(&self) -> u32 {
        let out = self
            .bridge
            .hbios(RegisterBlock::call(hbios::RTCGETTIM, 0).with_hl(addr::RTC_BUFFER));
        if out.a() != 0 {
            return FALLBACK_FAT_TIME;
        }
        let mut bcd = [0u8; 6];
        self.bridge.peek(addr::RTC_BUFFER, &mut bcd);
        pack_fat_time(&bcd)
    }

    pub fn identity(&self) -> HardwareIdentity {
        self.identity
    }
}

/// First sector of the `chunk`-th staging window after `first`.
fn chunk_lba(first: u32, chunk: usize) -> DiskResult<u32> {
    u32::try_from(chunk * addr::STAGING_SECTORS)
        .ok()
        .and_then(|offset| first.checked_add(offset))
        .ok_or(DiskError::Error)
}

fn sector_count(len: usize) -> DiskResult<u16> {
    if len == 0 || len % SECTOR_SIZE != 0 {
        return Err(DiskError::InvalidParameter);
    }
    Ok((len / SECTOR_SIZE) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::HeadlessConsole;
    use crate::machine::{DiskUnit, Machine, MediaKind, MemoryImage, Rtc};

    fn disk_with(identity: HardwareIdentity, sectors: u32) -> DiskIo {
        let mut machine = Machine::new(HeadlessConsole::new(), identity);
        machine.attach_unit(DiskUnit::new(
            MediaKind::Fixed,
            Box::new(MemoryImage::new(sectors)),
        ));
        let bridge = Bridge::from(machine.into_shared());
        DiskIo::new(bridge, identity)
    }

    #[test]
    fn test_split_lba_sets_flag_in_high_half() {
        assert_eq!(split_lba(0x0012_3456), (0x8012, 0x3456));
        assert_eq!(split_lba(5), (0x8000, 0x0005));
        assert_eq!(split_lba(0x0001_0000), (0x8001, 0x0000));
    }

    #[test]
    fn test_initialize_checks_unit_range() {
        let disk = disk_with(HardwareIdentity::Hbios, 64);
        assert_eq!(disk.unit_count(), Some(1));
        assert!(disk.initialize(0).is_empty());
        assert!(disk.initialize(1).contains(DiskStatus::NOINIT));
        assert!(disk.status(7).contains(DiskStatus::NODISK));
    }

    #[test]
    fn test_unknown_identity_fails_initialize() {
        let disk = disk_with(HardwareIdentity::Unknown, 64);
        assert!(disk.initialize(0).contains(DiskStatus::NOINIT));
    }

    #[test]
    fn test_read_write_sectors() {
        let disk = disk_with(HardwareIdentity::Hbios, 64);
        let data: Vec<u8> = (0..3 * SECTOR_SIZE).map(|i| (i % 251) as u8).collect();
        disk.write(0, &data, 10).unwrap();

        let mut back = vec![0u8; 3 * SECTOR_SIZE];
        disk.read(0, &mut back, 10).unwrap();
        assert_eq!(back, data);

        let mut one = vec![0u8; SECTOR_SIZE];
        disk.read(0, &mut one, 11).unwrap();
        assert_eq!(one, data[SECTOR_SIZE..2 * SECTOR_SIZE]);
    }

    #[test]
    fn test_transfers_larger_than_staging_window() {
        let disk = disk_with(HardwareIdentity::Una, 64);
        let sectors = addr::STAGING_SECTORS + 3;
        let data: Vec<u8> = (0..sectors * SECTOR_SIZE).map(|i| (i / SECTOR_SIZE) as u8).collect();
        disk.write(0, &data, 0).unwrap();

        let mut back = vec![0u8; data.len()];
        disk.read(0, &mut back, 0).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_seek_past_end_is_an_error() {
        let disk = disk_with(HardwareIdentity::Hbios, 8);
        let mut buf = vec![0u8; SECTOR_SIZE];
        assert_eq!(disk.read(0, &mut buf, 8), Err(DiskError::Error));
        assert_eq!(disk.read(0, &mut buf[..100], 0), Err(DiskError::InvalidParameter));
    }

    #[test]
    fn test_chunk_lba_refuses_to_wrap() {
        assert_eq!(chunk_lba(10, 0), Ok(10));
        assert_eq!(chunk_lba(10, 2), Ok(10 + 2 * addr::STAGING_SECTORS as u32));
        assert_eq!(chunk_lba(u32::MAX - 3, 1), Err(DiskError::Error));
    }

    #[test]
    fn test_transfer_crossing_lba_limit_is_an_error() {
        let disk = disk_with(HardwareIdentity::Hbios, 8);
        let data = vec![0u8; (addr::STAGING_SECTORS + 1) * SECTOR_SIZE];
        assert_eq!(disk.write(0, &data, u32::MAX - 1), Err(DiskError::Error));
    }

    #[test]
    fn test_ioctl() {
        let disk = disk_with(HardwareIdentity::Hbios, 0x0002_0010);
        assert_eq!(disk.ioctl(0, 0), Ok(IoctlReply::Done));
        assert_eq!(disk.ioctl(0, 1), Ok(IoctlReply::SectorCount(0x0002_0010)));
        assert_eq!(disk.ioctl(0, 2), Ok(IoctlReply::SectorSize(512)));
        assert_eq!(disk.ioctl(0, 3), Ok(IoctlReply::BlockSize(1)));
        assert_eq!(disk.ioctl(0, 4), Ok(IoctlReply::Done));
        assert_eq!(disk.ioctl(0, 9), Err(DiskError::InvalidParameter));
        assert_eq!(disk.ioctl(3, 1), Err(DiskError::InvalidParameter));
    }

    #[test]
    fn test_fat_time_from_rtc_and_fallback() {
        let mut machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Hbios);
        machine.set_rtc(Rtc::Fixed([0x24, 0x05, 0x17, 0x13, 0x45, 0x31]));
        let disk = DiskIo::new(Bridge::from(machine.into_shared()), HardwareIdentity::Hbios);
        assert_eq!(unpack_fat_time(disk.fat_time()), (2024, 5, 17, 13, 45, 30));

        let mut machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Hbios);
        machine.set_rtc(Rtc::Absent);
        let disk = DiskIo::new(Bridge::from(machine.into_shared()), HardwareIdentity::Hbios);
        assert_eq!(disk.fat_time(), FALLBACK_FAT_TIME);
    }
}
