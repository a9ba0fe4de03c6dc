//! One file contract over native control-block files and FAT files.
//!
//! Native files move exactly one 128-byte record per call through the
//! shared transfer buffer; FAT files accept any length. Which kind a file
//! is gets decided once, at open.

use std::cell::Cell;
use std::io::{Read, Write};
use std::rc::Rc;

use crate::bdos::{addr, BdosFunction, Fcb, DIR_ENTRY_SIZE, FCB_SIZE, NO_MATCH, RECORD_SIZE};
use crate::bridge::Bridge;
use crate::diskio::SectorStream;
use crate::error::{embedded_disk_error, FsError, FsResult};
use crate::path::{NativeName, PathReference};
use crate::volume::Volumes;

/// FAT file handle, borrowed from its mounted volume.
pub type FatFile<'v> = fatfs::File<'v, SectorStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create a new file; FAT files are truncated if they exist.
    Write,
}

/// Control-block slots in the caller's address space.
#[derive(Clone, Default)]
pub struct FcbArena {
    used: Rc<Cell<u8>>,
}

impl FcbArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a free slot, zeroed. Released when the slot is dropped.
    pub fn acquire(&self) -> FsResult<FcbSlot> {
        let used = self.used.get();
        let index = (0..addr::FCB_SLOTS)
            .find(|&i| used & (1 << i) == 0)
            .ok_or(FsError::TooManyOpenFiles)?;
        self.used.set(used | (1 << index));
        Ok(FcbSlot {
            used: Rc::clone(&self.used),
            index,
        })
    }

    pub fn in_use(&self) -> usize {
        self.used.get().count_ones() as usize
    }
}

pub struct FcbSlot {
    used: Rc<Cell<u8>>,
    index: usize,
}

impl FcbSlot {
    pub fn addr(&self) -> u16 {
        addr::FCB_AREA + self.index as u16 * addr::FCB_STRIDE
    }
}

impl Drop for FcbSlot {
    fn drop(&mut self) {
        self.used.set(self.used.get() & !(1 << self.index));
    }
}

/// Native file and directory primitives, reached over the narrow call.
#[derive(Clone)]
pub struct NativeFs {
    bridge: Bridge,
    arena: FcbArena,
}

impl NativeFs {
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge,
            arena: FcbArena::new(),
        }
    }

    pub fn arena(&self) -> &FcbArena {
        &self.arena
    }

    /// Fill a slot's control block with `name`, bookkeeping zeroed.
    fn prepare(&self, slot: &FcbSlot, name: &NativeName) {
        let mut mem = [0u8; FCB_SIZE];
        let mut fcb = Fcb::new(&mut mem);
        name.store(&mut fcb);
        self.bridge.poke(slot.addr(), &mem);
    }

    /// Open a native file. Writing requires that the file does not exist yet.
    pub fn open(&self, name: &NativeName, mode: OpenMode) -> FsResult<NativeFile> {
        let slot = self.arena.acquire()?;
        self.prepare(&slot, name);

        match mode {
            OpenMode::Read => {
                if self.bridge.bdos(BdosFunction::OpenFile, slot.addr()) == NO_MATCH {
                    return Err(FsError::NoFile);
                }
            }
            OpenMode::Write => {
                self.set_transfer_address();
                if self.bridge.bdos(BdosFunction::SearchFirst, slot.addr()) != NO_MATCH {
                    return Err(FsError::Exists);
                }
                // Search may have touched the block; start from a clean one.
                self.prepare(&slot, name);
                if self.bridge.bdos(BdosFunction::MakeFile, slot.addr()) == NO_MATCH {
                    // Directory full or no such drive.
                    return Err(FsError::Disk);
                }
            }
        }

        Ok(NativeFile {
            bridge: self.bridge.clone(),
            slot: Some(slot),
            name: *name,
        })
    }

    /// True when at least one file matches `name`.
    pub fn exists(&self, name: &NativeName) -> FsResult<bool> {
        let slot = self.arena.acquire()?;
        Ok(self.search_first(&slot, name).is_some())
    }

    /// Delete matching files. The primitive's status is not reported.
    pub fn delete(&self, name: &NativeName) -> FsResult<()> {
        let slot = self.arena.acquire()?;
        self.prepare(&slot, name);
        self.bridge.bdos(BdosFunction::DeleteFile, slot.addr());
        Ok(())
    }

    pub fn set_transfer_address(&self) {
        self.bridge.bdos(BdosFunction::SetDmaAddress, addr::TRANSFER);
    }

    /// Start a directory search for `template` using `slot`.
    ///
    /// The matching entry is copied out of the transfer buffer before
    /// returning.
    pub fn search_first(&self, slot: &FcbSlot, template: &NativeName) -> Option<NativeName> {
        self.prepare(slot, template);
        self.set_transfer_address();
        let rc = self.bridge.bdos(BdosFunction::SearchFirst, slot.addr());
        self.capture(rc, template.drive)
    }

    /// Continue the current directory search.
    pub fn search_next(&self, slot: &FcbSlot, drive: u8) -> Option<NativeName> {
        self.set_transfer_address();
        let rc = self.bridge.bdos(BdosFunction::SearchNext, slot.addr());
        self.capture(rc, drive)
    }

    fn capture(&self, rc: u8, drive: u8) -> Option<NativeName> {
        if rc == NO_MATCH || rc > 3 {
            return None;
        }
        let mut entry = [0u8; DIR_ENTRY_SIZE];
        self.bridge.peek(
            addr::TRANSFER + rc as u16 * DIR_ENTRY_SIZE as u16,
            &mut entry,
        );
        let mut name = [b' '; 8];
        let mut ext = [b' '; 3];
        for (dst, src) in name.iter_mut().zip(&entry[1..9]) {
            *dst = src & 0x7F;
        }
        for (dst, src) in ext.iter_mut().zip(&entry[9..12]) {
            *dst = src & 0x7F;
        }
        Some(NativeName::from_entry(drive, name, ext))
    }
}

/// An open native file. Closed on drop if not closed explicitly.
pub struct NativeFile {
    bridge: Bridge,
    slot: Option<FcbSlot>,
    name: NativeName,
}

impl NativeFile {
    pub fn name(&self) -> &NativeName {
        &self.name
    }

    fn fcb_addr(&self) -> FsResult<u16> {
        self.slot
            .as_ref()
            .map(FcbSlot::addr)
            .ok_or(FsError::InvalidObject)
    }

    /// Read one record. Returns 0 at end of file.
    pub fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        if buf.len() != RECORD_SIZE {
            return Err(FsError::InvalidParameter);
        }
        let fcb = self.fcb_addr()?;
        self.bridge.bdos(BdosFunction::SetDmaAddress, addr::TRANSFER);
        if self.bridge.bdos(BdosFunction::ReadSequential, fcb) != 0 {
            return Ok(0);
        }
        self.bridge.peek(addr::TRANSFER, buf);
        Ok(RECORD_SIZE)
    }

    /// Write one record. Any failure is reported as a disk error.
    pub fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        if buf.len() != RECORD_SIZE {
            return Err(FsError::InvalidParameter);
        }
        let fcb = self.fcb_addr()?;
        self.bridge.poke(addr::TRANSFER, buf);
        self.bridge.bdos(BdosFunction::SetDmaAddress, addr::TRANSFER);
        if self.bridge.bdos(BdosFunction::WriteSequential, fcb) != 0 {
            return Err(FsError::Disk);
        }
        Ok(RECORD_SIZE)
    }

    pub fn close(mut self) -> FsResult<()> {
        self.close_slot()
    }

    fn close_slot(&mut self) -> FsResult<()> {
        let slot = self.slot.take().ok_or(FsError::InvalidObject)?;
        if self.bridge.bdos(BdosFunction::CloseFile, slot.addr()) == NO_MATCH {
            return Err(FsError::InvalidObject);
        }
        Ok(())
    }
}

impl Drop for NativeFile {
    fn drop(&mut self) {
        if self.slot.is_some() {
            let _ = self.close_slot();
        }
    }
}

/// A file on either side of the bridge.
pub enum UnifiedFile<'v> {
    Native(NativeFile),
    Fat(FatFile<'v>),
}

impl<'v> UnifiedFile<'v> {
    /// Open `path` on whichever file system its syntax names.
    pub fn open(
        path: &PathReference,
        mode: OpenMode,
        native: &NativeFs,
        volumes: &'v Volumes,
    ) -> FsResult<Self> {
        match path {
            PathReference::Native(name) => native.open(name, mode).map(UnifiedFile::Native),
            PathReference::Fat(fat) => {
                let volume = volumes.get(fat.unit())?;
                volume.open_file(fat.relative(), mode).map(UnifiedFile::Fat)
            }
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, UnifiedFile::Native(_))
    }

    /// Read into `buf`. Native files require a whole record; FAT reads fill
    /// the buffer unless the file ends first.
    pub fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        match self {
            UnifiedFile::Native(file) => file.read(buf),
            UnifiedFile::Fat(file) => {
                let mut total = 0;
                while total < buf.len() {
                    let n = file.read(&mut buf[total..])?;
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                Ok(total)
            }
        }
    }

    /// Write `buf`. Returns fewer bytes than asked when the medium fills
    /// up; glue failures are errors.
    pub fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        match self {
            UnifiedFile::Native(file) => file.write(buf),
            UnifiedFile::Fat(file) => {
                let mut total = 0;
                while total < buf.len() {
                    match file.write(&buf[total..]) {
                        Ok(0) => break,
                        Ok(n) => total += n,
                        Err(e) => {
                            if let Some(disk) = embedded_disk_error(&e) {
                                return Err(disk.into());
                            }
                            log::debug!("FAT write stopped after {} bytes: {}", total, e);
                            break;
                        }
                    }
                }
                Ok(total)
            }
        }
    }

    pub fn close(self) -> FsResult<()> {
        match self {
            UnifiedFile::Native(file) => file.close(),
            UnifiedFile::Fat(mut file) => {
                file.flush()?;
                Ok(())
            }
        }
    }
}
