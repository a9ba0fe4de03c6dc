//! Disk units and the real-time clock of the simulated machine.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::bridge::hbios;
use crate::diskio::SECTOR_SIZE;
use crate::error::{CpmError, CpmResult};

/// Kind of medium behind a unit. Decides the reported device type and
/// whether writes are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// RAM disk.
    Ram,
    /// ROM disk; read-only.
    Rom,
    /// Removable floppy.
    Floppy,
    /// Fixed disk (IDE, CF, SD).
    #[default]
    Fixed,
}

impl MediaKind {
    pub fn device_type(self) -> u8 {
        match self {
            MediaKind::Ram | MediaKind::Rom => hbios::DEVTYPE_MD,
            MediaKind::Floppy => hbios::DEVTYPE_FD,
            MediaKind::Fixed => hbios::DEVTYPE_IDE,
        }
    }

    pub fn attributes(self) -> u8 {
        match self {
            MediaKind::Floppy => hbios::ATTR_REMOVABLE,
            _ => 0,
        }
    }

    /// Media id reported by the media query.
    pub fn media_id(self) -> u8 {
        match self {
            MediaKind::Rom => 1,
            MediaKind::Ram => 2,
            MediaKind::Fixed => 4,
            MediaKind::Floppy => 6,
        }
    }

    pub fn is_read_only(self) -> bool {
        self == MediaKind::Rom
    }
}

impl std::str::FromStr for MediaKind {
    type Err = CpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ram" => Ok(MediaKind::Ram),
            "rom" => Ok(MediaKind::Rom),
            "floppy" | "fd" => Ok(MediaKind::Floppy),
            "fixed" | "hd" => Ok(MediaKind::Fixed),
            other => Err(CpmError::Config(format!("unknown media kind '{}'", other))),
        }
    }
}

/// Sector-addressed storage behind a unit.
pub trait DiskImage {
    fn sector_count(&self) -> u32;

    fn read_sector(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()>;

    fn write_sector(&mut self, lba: u32, data: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn out_of_range(lba: u32) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("sector {} out of range", lba),
    )
}

/// Image held in memory.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    data: Vec<u8>,
}

impl MemoryImage {
    /// Zero-filled image of `sectors` sectors.
    pub fn new(sectors: u32) -> Self {
        Self {
            data: vec![0; sectors as usize * SECTOR_SIZE],
        }
    }

    /// Image over existing bytes, truncated to whole sectors.
    pub fn from_bytes(mut data: Vec<u8>) -> Self {
        data.truncate(data.len() / SECTOR_SIZE * SECTOR_SIZE);
        Self { data }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, lba: u32) -> io::Result<std::ops::Range<usize>> {
        let start = lba as usize * SECTOR_SIZE;
        if start + SECTOR_SIZE > self.data.len() {
            return Err(out_of_range(lba));
        }
        Ok(start..start + SECTOR_SIZE)
    }
}

impl DiskImage for MemoryImage {
    fn sector_count(&self) -> u32 {
        (self.data.len() / SECTOR_SIZE) as u32
    }

    fn read_sector(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()> {
        let range = self.range(lba)?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_sector(&mut self, lba: u32, data: &[u8]) -> io::Result<()> {
        let range = self.range(lba)?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}

/// Image stored in a host file.
#[derive(Debug)]
pub struct FileImage {
    file: File,
    sectors: u32,
}

impl FileImage {
    /// Open an image file. When `create_sectors` is given and the file does
    /// not exist, a zero-filled image of that size is created.
    pub fn open(path: &Path, create_sectors: Option<u32>) -> CpmResult<Self> {
        let exists = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create_sectors.is_some())
            .truncate(false)
            .open(path)?;

        if !exists {
            if let Some(sectors) = create_sectors {
                file.set_len(sectors as u64 * SECTOR_SIZE as u64)?;
            }
        }

        let sectors = (file.metadata()?.len() / SECTOR_SIZE as u64) as u32;
        if sectors == 0 {
            return Err(CpmError::Config(format!(
                "disk image {} is empty",
                path.display()
            )));
        }
        Ok(Self { file, sectors })
    }

    fn position(&mut self, lba: u32) -> io::Result<()> {
        if lba >= self.sectors {
            return Err(out_of_range(lba));
        }
        self.file
            .seek(SeekFrom::Start(lba as u64 * SECTOR_SIZE as u64))?;
        Ok(())
    }
}

impl DiskImage for FileImage {
    fn sector_count(&self) -> u32 {
        self.sectors
    }

    fn read_sector(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()> {
        self.position(lba)?;
        self.file.read_exact(buf)
    }

    fn write_sector(&mut self, lba: u32, data: &[u8]) -> io::Result<()> {
        self.position(lba)?;
        self.file.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// One attached disk unit.
pub struct DiskUnit {
    pub media: MediaKind,
    image: Box<dyn DiskImage>,
    /// Sector selected by the last successful seek.
    position: Option<u32>,
}

impl DiskUnit {
    pub fn new(media: MediaKind, image: Box<dyn DiskImage>) -> Self {
        Self {
            media,
            image,
            position: None,
        }
    }

    pub fn sector_count(&self) -> u32 {
        self.image.sector_count()
    }

    pub(crate) fn seek(&mut self, lba: u32) -> bool {
        if lba < self.image.sector_count() {
            self.position = Some(lba);
            true
        } else {
            false
        }
    }

    pub(crate) fn position(&self) -> Option<u32> {
        self.position
    }

    pub(crate) fn advance(&mut self) {
        self.position = self.position.map(|p| p + 1);
    }

    pub(crate) fn image_mut(&mut self) -> &mut dyn DiskImage {
        self.image.as_mut()
    }

    /// Read a sector directly, bypassing the seek position.
    pub fn read_raw(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()> {
        self.image.read_sector(lba, buf)
    }
}

/// Source of the real-time clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rtc {
    /// Host wall clock (UTC).
    #[default]
    Host,
    /// Fixed BCD record: year, month, day, hour, minute, second.
    Fixed([u8; 6]),
    /// No clock; the time call fails.
    Absent,
}

impl Rtc {
    /// Parse `host`, `none` or `YYYY-MM-DD HH:MM:SS`.
    pub fn parse(text: &str) -> CpmResult<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "host" => return Ok(Rtc::Host),
            "none" | "absent" => return Ok(Rtc::Absent),
            _ => {}
        }
        let bad = || CpmError::Config(format!("invalid clock setting '{}'", text));
        let fields: Vec<u32> = text
            .split(|c: char| c == '-' || c == ' ' || c == ':' || c == 'T')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u32>().map_err(|_| bad()))
            .collect::<CpmResult<_>>()?;
        let [year, month, day, hour, min, sec] = fields[..] else {
            return Err(bad());
        };
        if !(2000..2100).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day)
        {
            return Err(bad());
        }
        Ok(Rtc::Fixed(to_bcd_record(year - 2000, month, day, hour, min, sec)))
    }

    /// Current BCD record, or `None` when there is no clock.
    pub fn read(&self) -> Option<[u8; 6]> {
        match self {
            Rtc::Fixed(record) => Some(*record),
            Rtc::Absent => None,
            Rtc::Host => {
                let secs = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
                let (year, month, day) = civil_from_days((secs / 86_400) as i64);
                let tod = (secs % 86_400) as u32;
                Some(to_bcd_record(
                    year.checked_sub(2000)?,
                    month,
                    day,
                    tod / 3600,
                    tod / 60 % 60,
                    tod % 60,
                ))
            }
        }
    }
}

fn to_bcd(v: u32) -> u8 {
    (((v / 10 % 10) << 4) | (v % 10)) as u8
}

fn to_bcd_record(year: u32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> [u8; 6] {
    [year, month, day, hour, min, sec].map(to_bcd)
}

/// Gregorian date from days since 1970-01-01.
fn civil_from_days(days: i64) -> (u32, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year as u32, month as u32, day as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_image_bounds() {
        let mut image = MemoryImage::new(2);
        let mut buf = [0u8; SECTOR_SIZE];
        image.write_sector(1, &[7; SECTOR_SIZE]).unwrap();
        image.read_sector(1, &mut buf).unwrap();
        assert_eq!(buf, [7; SECTOR_SIZE]);
        assert!(image.read_sector(2, &mut buf).is_err());
    }

    #[test]
    fn test_media_kinds() {
        assert_eq!(MediaKind::Ram.device_type(), hbios::DEVTYPE_MD);
        assert_eq!(MediaKind::Floppy.attributes(), hbios::ATTR_REMOVABLE);
        assert!(MediaKind::Rom.is_read_only());
        assert_eq!("FIXED".parse::<MediaKind>().unwrap(), MediaKind::Fixed);
        assert!("tape".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_rtc_parse() {
        assert_eq!(Rtc::parse("host").unwrap(), Rtc::Host);
        assert_eq!(Rtc::parse("none").unwrap(), Rtc::Absent);
        assert_eq!(
            Rtc::parse("2019-05-02 13:07:59").unwrap(),
            Rtc::Fixed([0x19, 0x05, 0x02, 0x13, 0x07, 0x59])
        );
        assert!(Rtc::parse("1999-01-01 00:00:00").is_err());
        assert!(Rtc::parse("yesterday").is_err());
    }

    #[test]
    fn test_civil_from_days() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_782), (2024, 2, 29));
    }

    #[test]
    fn test_host_clock_reads() {
        let record = Rtc::Host.read().unwrap();
        assert!(record[1] >= 0x01 && record[1] <= 0x12);
    }
}
