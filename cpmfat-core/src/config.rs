//! Machine configuration.
//!
//! Describes the simulated machine a command runs against: the firmware
//! dialect, the clock, native drives and disk units. Loaded from JSON and
//! merged with command-line options.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::archive::load_archive_from_path;
use crate::console::CpmConsole;
use crate::error::{CpmError, CpmResult};
use crate::fs::{HostDriveFS, MemoryDriveFS};
use crate::identity::HardwareIdentity;
use crate::machine::{DiskUnit, FileImage, Machine, MediaKind, NativeDrive, Rtc};

/// Firmware dialect of the simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiosKind {
    #[default]
    Hbios,
    Una,
    None,
}

impl From<BiosKind> for HardwareIdentity {
    fn from(bios: BiosKind) -> Self {
        match bios {
            BiosKind::Hbios => HardwareIdentity::Hbios,
            BiosKind::Una => HardwareIdentity::Una,
            BiosKind::None => HardwareIdentity::Unknown,
        }
    }
}

impl FromStr for BiosKind {
    type Err = CpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hbios" => Ok(BiosKind::Hbios),
            "una" => Ok(BiosKind::Una),
            "none" => Ok(BiosKind::None),
            other => Err(CpmError::Config(format!("unknown bios '{}'", other))),
        }
    }
}

/// One native drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveConfig {
    /// Drive letter (A-P)
    pub letter: char,
    /// Host directory holding the drive's files
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// ZIP archive the drive is seeded from (changes are not saved)
    #[serde(default)]
    pub archive: Option<PathBuf>,
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Bytes the drive may hold
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl DriveConfig {
    /// Parse `L=DIR`.
    pub fn host(arg: &str) -> CpmResult<Self> {
        let (letter, path) = split_assignment(arg)?;
        Ok(Self {
            letter,
            path: Some(path),
            archive: None,
            max_entries: None,
            capacity: None,
        })
    }

    /// Parse `L=ZIP`.
    pub fn archive(arg: &str) -> CpmResult<Self> {
        let (letter, path) = split_assignment(arg)?;
        Ok(Self {
            letter,
            path: None,
            archive: Some(path),
            max_entries: None,
            capacity: None,
        })
    }

    /// Drive index, 0 = A.
    pub fn index(&self) -> CpmResult<u8> {
        let letter = self.letter.to_ascii_uppercase();
        match letter {
            'A'..='P' => Ok(letter as u8 - b'A'),
            _ => Err(CpmError::InvalidDrive(self.letter)),
        }
    }

    fn build(&self) -> CpmResult<NativeDrive> {
        let drive = match (&self.path, &self.archive) {
            (Some(_), Some(_)) => {
                return Err(CpmError::Config(format!(
                    "drive {}: give either a path or an archive",
                    self.letter
                )))
            }
            (Some(path), None) => NativeDrive::new(HostDriveFS::open(path)?),
            (None, Some(archive)) => NativeDrive::new(load_archive_from_path(archive)?),
            (None, None) => NativeDrive::new(MemoryDriveFS::new()),
        };
        let drive = drive.with_max_entries(self.max_entries.unwrap_or(NativeDrive::DEFAULT_ENTRIES));
        Ok(match self.capacity {
            Some(bytes) => drive.with_capacity(bytes),
            None => drive,
        })
    }
}

fn split_assignment(arg: &str) -> CpmResult<(char, PathBuf)> {
    let bad = || CpmError::Config(format!("expected L=PATH, got '{}'", arg));
    let (letter, path) = arg.split_once('=').ok_or_else(bad)?;
    let mut chars = letter.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !path.is_empty() => Ok((c.to_ascii_uppercase(), PathBuf::from(path))),
        _ => Err(bad()),
    }
}

/// One disk unit backed by an image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitConfig {
    pub image: PathBuf,
    #[serde(default)]
    pub media: MediaKind,
    /// Size of the image to create when it does not exist
    #[serde(default)]
    pub sectors: Option<u32>,
}

impl UnitConfig {
    /// Parse `IMAGE[:MEDIA]`.
    pub fn parse(arg: &str) -> CpmResult<Self> {
        if let Some((image, media)) = arg.rsplit_once(':') {
            if let Ok(media) = media.parse::<MediaKind>() {
                return Ok(Self {
                    image: PathBuf::from(image),
                    media,
                    sectors: None,
                });
            }
        }
        Ok(Self {
            image: PathBuf::from(arg),
            media: MediaKind::default(),
            sectors: None,
        })
    }

    fn build(&self) -> CpmResult<DiskUnit> {
        let image = FileImage::open(&self.image, self.sectors)?;
        Ok(DiskUnit::new(self.media, Box::new(image)))
    }
}

/// Complete machine description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    #[serde(default)]
    pub bios: Option<BiosKind>,
    /// `host`, `none` or `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub rtc: Option<String>,
    #[serde(default)]
    pub drives: Vec<DriveConfig>,
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

impl MachineConfig {
    pub fn from_json(text: &str) -> CpmResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration file. Relative paths inside it are taken
    /// relative to the file.
    pub fn load(path: &Path) -> CpmResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CpmError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for drive in &mut self.drives {
            if let Some(path) = drive.path.as_mut() {
                resolve(path);
            }
            if let Some(archive) = drive.archive.as_mut() {
                resolve(archive);
            }
        }
        for unit in &mut self.units {
            resolve(&mut unit.image);
        }
    }

    /// Apply `other` on top: its settings win, drives replace drives with
    /// the same letter and units are appended.
    pub fn merge(&mut self, other: MachineConfig) {
        if other.bios.is_some() {
            self.bios = other.bios;
        }
        if other.rtc.is_some() {
            self.rtc = other.rtc;
        }
        for drive in other.drives {
            let letter = drive.letter.to_ascii_uppercase();
            self.drives.retain(|d| d.letter.to_ascii_uppercase() != letter);
            self.drives.push(drive);
        }
        self.units.extend(other.units);
    }

    pub fn identity(&self) -> HardwareIdentity {
        self.bios.unwrap_or_default().into()
    }

    /// Build the machine. Without any configured drive, drive A is an
    /// empty in-memory drive.
    pub fn build<C: CpmConsole>(&self, console: C) -> CpmResult<Machine<C>> {
        let mut machine = Machine::new(console, self.identity());
        if let Some(rtc) = &self.rtc {
            machine.set_rtc(Rtc::parse(rtc)?);
        }

        if self.drives.is_empty() {
            machine.mount(0, NativeDrive::new(MemoryDriveFS::new()));
        }
        for drive in &self.drives {
            let index = drive.index()?;
            machine.mount(index, drive.build()?);
            log::debug!("drive {}: mounted", drive.letter);
        }

        for unit in &self.units {
            let number = machine.attach_unit(unit.build()?);
            log::debug!("unit {}: {} ({:?})", number, unit.image.display(), unit.media);
        }
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::HeadlessConsole;

    #[test]
    fn test_parse_json() {
        let config = MachineConfig::from_json(
            r#"{
                "bios": "una",
                "rtc": "2019-05-02 13:07:59",
                "drives": [{ "letter": "B", "maxEntries": 8, "capacity": 4096 }],
                "units": [{ "image": "disk0.img", "media": "floppy", "sectors": 2880 }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.bios, Some(BiosKind::Una));
        assert_eq!(config.drives[0].index().unwrap(), 1);
        assert_eq!(config.drives[0].max_entries, Some(8));
        assert_eq!(config.units[0].media, MediaKind::Floppy);
        assert_eq!(config.units[0].sectors, Some(2880));
        assert_eq!(config.identity(), HardwareIdentity::Una);
    }

    #[test]
    fn test_command_line_forms() {
        let drive = DriveConfig::host("c=/tmp/c").unwrap();
        assert_eq!(drive.letter, 'C');
        assert_eq!(drive.path, Some(PathBuf::from("/tmp/c")));
        assert!(DriveConfig::host("cc=/tmp").is_err());
        assert!(DriveConfig::archive("A=").is_err());

        let unit = UnitConfig::parse("disk.img:rom").unwrap();
        assert_eq!((unit.image, unit.media), (PathBuf::from("disk.img"), MediaKind::Rom));
        let unit = UnitConfig::parse("C:\\images\\disk.img").unwrap();
        assert_eq!(unit.image, PathBuf::from("C:\\images\\disk.img"));
        assert_eq!(unit.media, MediaKind::Fixed);
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = MachineConfig {
            bios: Some(BiosKind::Hbios),
            drives: vec![DriveConfig::host("A=/one").unwrap()],
            ..Default::default()
        };
        base.merge(MachineConfig {
            bios: Some(BiosKind::None),
            drives: vec![DriveConfig::archive("a=/two.zip").unwrap()],
            units: vec![UnitConfig::parse("x.img").unwrap()],
            ..Default::default()
        });
        assert_eq!(base.identity(), HardwareIdentity::Unknown);
        assert_eq!(base.drives.len(), 1);
        assert_eq!(base.drives[0].archive, Some(PathBuf::from("/two.zip")));
        assert_eq!(base.units.len(), 1);
    }

    #[test]
    fn test_build_default_machine() {
        let config = MachineConfig {
            rtc: Some("none".into()),
            ..Default::default()
        };
        let machine = config.build(HeadlessConsole::new()).unwrap();
        assert!(machine.drive(0).is_some());
        assert!(machine.drive(1).is_none());
        assert_eq!(machine.identity(), HardwareIdentity::Hbios);
    }

    #[test]
    fn test_bad_drive_letter() {
        let config = MachineConfig {
            drives: vec![DriveConfig {
                letter: 'Q',
                path: None,
                archive: None,
                max_entries: None,
                capacity: None,
            }],
            ..Default::default()
        };
        assert!(matches!(
            config.build(HeadlessConsole::new()),
            Err(CpmError::InvalidDrive('Q'))
        ));
    }
}
