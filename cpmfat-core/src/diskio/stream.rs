//! Byte stream over one disk unit.
//!
//! The FAT library addresses its storage as a seekable byte stream; this
//! adapter turns those accesses into whole-sector glue calls, reading the
//! enclosing sector first when a write covers only part of it.

use std::io::{self, Read, Seek, SeekFrom, Write};

use super::{DiskError, DiskIo, SECTOR_SIZE};

/// Largest run of whole sectors transferred in one glue call.
const MAX_RUN: usize = 64;

pub struct SectorStream {
    disk: DiskIo,
    unit: u8,
    len: u64,
    pos: u64,
}

impl SectorStream {
    /// Open a stream over `unit`, sized from the unit's capacity.
    pub fn open(disk: DiskIo, unit: u8) -> Result<Self, DiskError> {
        let sectors = disk.sector_count(unit)?;
        Ok(Self {
            disk,
            unit,
            len: sectors as u64 * SECTOR_SIZE as u64,
            pos: 0,
        })
    }

    pub fn unit(&self) -> u8 {
        self.unit
    }

    pub fn sector_count(&self) -> u32 {
        (self.len / SECTOR_SIZE as u64) as u32
    }

    fn sector(&self) -> u32 {
        (self.pos / SECTOR_SIZE as u64) as u32
    }

    fn offset(&self) -> usize {
        (self.pos % SECTOR_SIZE as u64) as usize
    }

    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }
}

fn disk_error(err: DiskError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

impl Read for SectorStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = buf.len().min(self.remaining() as usize);
        if want == 0 {
            return Ok(0);
        }

        let offset = self.offset();
        let n = if offset == 0 && want >= SECTOR_SIZE {
            let run = (want / SECTOR_SIZE).min(MAX_RUN) * SECTOR_SIZE;
            self.disk
                .read(self.unit, &mut buf[..run], self.sector())
                .map_err(disk_error)?;
            run
        } else {
            let mut sector = [0u8; SECTOR_SIZE];
            self.disk
                .read(self.unit, &mut sector, self.sector())
                .map_err(disk_error)?;
            let n = want.min(SECTOR_SIZE - offset);
            buf[..n].copy_from_slice(&sector[offset..offset + n]);
            n
        };

        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for SectorStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let avail = buf.len().min(self.remaining() as usize);
        if avail == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write past end of unit",
            ));
        }

        let offset = self.offset();
        let n = if offset == 0 && avail >= SECTOR_SIZE {
            let run = (avail / SECTOR_SIZE).min(MAX_RUN) * SECTOR_SIZE;
            self.disk
                .write(self.unit, &buf[..run], self.sector())
                .map_err(disk_error)?;
            run
        } else {
            let mut sector = [0u8; SECTOR_SIZE];
            self.disk
                .read(self.unit, &mut sector, self.sector())
                .map_err(disk_error)?;
            let n = avail.min(SECTOR_SIZE - offset);
            sector[offset..offset + n].copy_from_slice(&buf[..n]);
            self.disk
                .write(self.unit, &sector, self.sector())
                .map_err(disk_error)?;
            n
        };

        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SectorStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of unit",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::console::HeadlessConsole;
    use crate::identity::HardwareIdentity;
    use crate::machine::{DiskUnit, Machine, MediaKind, MemoryImage};

    fn stream(sectors: u32) -> SectorStream {
        let mut machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Hbios);
        machine.attach_unit(DiskUnit::new(
            MediaKind::Fixed,
            Box::new(MemoryImage::new(sectors)),
        ));
        let disk = DiskIo::new(Bridge::from(machine.into_shared()), HardwareIdentity::Hbios);
        SectorStream::open(disk, 0).unwrap()
    }

    #[test]
    fn test_unaligned_write_preserves_neighbours() {
        let mut s = stream(4);
        s.write_all(&[0xAA; 2048]).unwrap();

        s.seek(SeekFrom::Start(500)).unwrap();
        s.write_all(&[0x55; 20]).unwrap();

        let mut back = vec![0u8; 2048];
        s.seek(SeekFrom::Start(0)).unwrap();
        s.read_exact(&mut back).unwrap();
        assert!(back[..500].iter().all(|&b| b == 0xAA));
        assert!(back[500..520].iter().all(|&b| b == 0x55));
        assert!(back[520..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_seek_end_uses_capacity() {
        let mut s = stream(8);
        assert_eq!(s.seek(SeekFrom::End(0)).unwrap(), 8 * 512);
        assert_eq!(s.seek(SeekFrom::End(-512)).unwrap(), 7 * 512);
        assert!(s.seek(SeekFrom::Current(-10_000)).is_err());
    }

    #[test]
    fn test_reads_stop_at_end_and_writes_fail() {
        let mut s = stream(1);
        s.seek(SeekFrom::Start(500)).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(s.read(&mut buf).unwrap(), 12);
        assert_eq!(s.read(&mut buf).unwrap(), 0);
        assert!(s.write(&buf).is_err());
    }
}
