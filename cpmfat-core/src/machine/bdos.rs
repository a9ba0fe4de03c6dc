//! Native file and console services of the simulated machine.
//!
//! Open files are held in memory until closed; a created file appears in
//! the directory immediately but empty. Like the real system there is one
//! directory-search cursor, and any open, create, close or delete
//! invalidates it.

use crate::bdos::{BdosFunction, Fcb, CTRL_Z, DIR_ENTRY_SIZE, FCB_SIZE, NO_MATCH, RECORD_SIZE};
use crate::console::CpmConsole;
use crate::fs::DriveFS;

use super::Machine;

/// Byte filling unused directory slots.
const EMPTY_ENTRY: u8 = 0xE5;

/// Write result: no free data block.
const WRITE_DISK_FULL: u16 = 0x02;

/// One native drive: backing store plus directory and space limits.
pub struct NativeDrive {
    fs: Box<dyn DriveFS>,
    max_entries: usize,
    capacity: Option<usize>,
}

impl NativeDrive {
    /// Directory entries of a standard 8" disk.
    pub const DEFAULT_ENTRIES: usize = 64;

    pub fn new(fs: impl DriveFS + 'static) -> Self {
        Self {
            fs: Box::new(fs),
            max_entries: Self::DEFAULT_ENTRIES,
            capacity: None,
        }
    }

    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    /// Limit the bytes stored on the drive.
    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    pub fn fs(&self) -> &dyn DriveFS {
        self.fs.as_ref()
    }
}

/// A file opened through a control block.
pub(super) struct FileBuffer {
    drive: u8,
    name: String,
    data: Vec<u8>,
    modified: bool,
}

/// State of the single directory search.
pub(super) struct Search {
    template: [u8; 11],
    entries: Vec<[u8; 11]>,
    index: usize,
}

fn entry_fields(filename: &str) -> [u8; 11] {
    let mut mem = [0u8; FCB_SIZE];
    let mut fcb = Fcb::new(&mut mem);
    fcb.set_filename(filename);
    let mut fields = [b' '; 11];
    fields.copy_from_slice(&mem[1..12]);
    fields
}

fn template_matches(template: &[u8; 11], entry: &[u8; 11]) -> bool {
    template
        .iter()
        .zip(entry.iter())
        .all(|(&p, &c)| p & 0x7F == b'?' || p & 0x7F == c & 0x7F)
}

impl<C: CpmConsole> Machine<C> {
    /// Service one narrow call; the result goes to HL.
    pub(super) fn dispatch_bdos(&mut self, func: BdosFunction, e: u8, de: u16) -> u16 {
        use BdosFunction::*;

        match func {
            SystemReset => {
                self.flush_open_files();
                self.search = None;
                0
            }

            ConsoleInput => {
                let ch = self.console.wait_for_key();
                self.console.write(ch);
                ch as u16
            }

            ConsoleOutput => {
                self.console.write(e);
                0
            }

            DirectConsoleIO => match e {
                // Input, no wait
                0xFF => self.console.get_key().unwrap_or(0) as u16,
                // Status
                0xFE => {
                    if self.console.has_key() {
                        0xFF
                    } else {
                        0
                    }
                }
                // Input, wait
                0xFD => self.console.wait_for_key() as u16,
                _ => {
                    self.console.write(e);
                    0
                }
            },

            PrintString => {
                let mut addr = de;
                loop {
                    let ch = self.memory[addr as usize];
                    if ch == b'$' {
                        break;
                    }
                    self.console.write(ch);
                    addr = addr.wrapping_add(1);
                }
                0
            }

            ConsoleStatus => {
                if self.console.has_key() {
                    0xFF
                } else {
                    0
                }
            }

            // CP/M 2.2
            ReturnVersion => 0x0022,

            SetDmaAddress => {
                self.dma = de;
                0
            }

            OpenFile => self.bdos_open_file(de),
            CloseFile => self.bdos_close_file(de),
            SearchFirst => self.bdos_search_first(de),
            SearchNext => self.bdos_search_next(),
            DeleteFile => self.bdos_delete_file(de),
            ReadSequential => self.bdos_read_sequential(de),
            WriteSequential => self.bdos_write_sequential(de),
            MakeFile => self.bdos_make_file(de),
        }
    }

    fn load_fcb(&self, fcb_addr: u16) -> [u8; FCB_SIZE] {
        let mut mem = [0u8; FCB_SIZE];
        self.read_block(fcb_addr, &mut mem);
        mem
    }

    fn store_fcb(&mut self, fcb_addr: u16, mem: &[u8; FCB_SIZE]) {
        self.write_block(fcb_addr, mem);
    }

    /// Get effective drive for FCB (0 = use current).
    fn effective_drive(&self, fcb_drive: u8) -> u8 {
        if fcb_drive == 0 {
            self.current_drive
        } else {
            fcb_drive - 1
        }
    }

    fn native_drive(&self, drive: u8) -> Option<&NativeDrive> {
        self.drives.get(drive as usize).and_then(Option::as_ref)
    }

    fn native_drive_mut(&mut self, drive: u8) -> Option<&mut NativeDrive> {
        self.drives.get_mut(drive as usize).and_then(Option::as_mut)
    }

    fn allocate_handle(&mut self, file: FileBuffer) -> u16 {
        match self.open_files.iter().position(Option::is_none) {
            Some(idx) => {
                self.open_files[idx] = Some(file);
                idx as u16 + 1
            }
            None => {
                self.open_files.push(Some(file));
                self.open_files.len() as u16
            }
        }
    }

    fn open_file_mut(&mut self, fcb: &Fcb<'_>) -> Option<&mut FileBuffer> {
        let idx = fcb.handle()? as usize - 1;
        self.open_files.get_mut(idx).and_then(Option::as_mut)
    }

    /// Bytes currently stored on a drive, counting unsaved file buffers.
    fn drive_usage(&self, drive: u8) -> usize {
        let Some(native) = self.native_drive(drive) else {
            return 0;
        };
        let pending: Vec<&FileBuffer> = self
            .open_files
            .iter()
            .flatten()
            .filter(|f| f.drive == drive && f.modified)
            .collect();
        let replaced: usize = pending
            .iter()
            .filter_map(|f| native.fs.file_size(&f.name))
            .sum();
        let stored = native.fs.used_bytes().saturating_sub(replaced);
        stored + pending.iter().map(|f| f.data.len()).sum::<usize>()
    }

    /// BDOS 15: Open file.
    fn bdos_open_file(&mut self, fcb_addr: u16) -> u16 {
        self.search = None;
        let mut fcb_mem = self.load_fcb(fcb_addr);
        let mut fcb = Fcb::new(&mut fcb_mem);

        let drive = self.effective_drive(fcb.drive());
        let filename = fcb.filename();

        let Some(data) = self
            .native_drive(drive)
            .and_then(|d| d.fs.read_file(&filename))
        else {
            return NO_MATCH as u16;
        };

        let handle = self.allocate_handle(FileBuffer {
            drive,
            name: filename,
            data,
            modified: false,
        });
        fcb.reset_position();
        fcb.set_handle(handle);
        self.store_fcb(fcb_addr, &fcb_mem);
        0
    }

    /// BDOS 16: Close file.
    fn bdos_close_file(&mut self, fcb_addr: u16) -> u16 {
        self.search = None;
        let mut fcb_mem = self.load_fcb(fcb_addr);
        let mut fcb = Fcb::new(&mut fcb_mem);

        let Some(handle) = fcb.handle() else {
            return NO_MATCH as u16;
        };
        let Some(file) = self
            .open_files
            .get_mut(handle as usize - 1)
            .and_then(Option::take)
        else {
            return NO_MATCH as u16;
        };

        let mut result = 0;
        if file.modified {
            let saved = self
                .native_drive_mut(file.drive)
                .map(|d| d.fs.write_file(&file.name, &file.data));
            if !matches!(saved, Some(Ok(()))) {
                log::trace!("[BDOS] close: write-back of {} failed", file.name);
                result = NO_MATCH as u16;
            }
        }

        fcb.clear_handle();
        self.store_fcb(fcb_addr, &fcb_mem);
        result
    }

    /// BDOS 17: Search for first matching file.
    fn bdos_search_first(&mut self, fcb_addr: u16) -> u16 {
        let fcb_mem = self.load_fcb(fcb_addr);
        let drive = self.effective_drive(fcb_mem[0]);

        let Some(native) = self.native_drive(drive) else {
            self.search = None;
            return NO_MATCH as u16;
        };

        let mut names = native.fs.list_files();
        names.sort();
        let mut template = [b' '; 11];
        template.copy_from_slice(&fcb_mem[1..12]);

        self.search = Some(Search {
            template,
            entries: names.iter().map(|n| entry_fields(n)).collect(),
            index: 0,
        });
        self.bdos_search_next()
    }

    /// BDOS 18: Search for next matching file.
    ///
    /// The match is written into the directory record at the DMA address;
    /// the result is its slot (0-3) within that record.
    fn bdos_search_next(&mut self) -> u16 {
        let Some(search) = self.search.as_mut() else {
            return NO_MATCH as u16;
        };

        while search.index < search.entries.len() {
            let position = search.index;
            let entry = search.entries[position];
            search.index += 1;

            if template_matches(&search.template, &entry) {
                let slot = position % 4;
                let mut record = [EMPTY_ENTRY; RECORD_SIZE];
                let dir = &mut record[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE];
                dir.fill(0);
                dir[1..12].copy_from_slice(&entry);
                let dma = self.dma;
                self.write_block(dma, &record);
                return slot as u16;
            }
        }

        NO_MATCH as u16
    }

    /// BDOS 19: Delete every file matching the control block.
    fn bdos_delete_file(&mut self, fcb_addr: u16) -> u16 {
        self.search = None;
        let fcb_mem = self.load_fcb(fcb_addr);
        let drive = self.effective_drive(fcb_mem[0]);
        let mut template = [b' '; 11];
        template.copy_from_slice(&fcb_mem[1..12]);

        let Some(native) = self.native_drive_mut(drive) else {
            return NO_MATCH as u16;
        };
        let victims: Vec<String> = native
            .fs
            .list_files()
            .into_iter()
            .filter(|name| template_matches(&template, &entry_fields(name)))
            .collect();

        let mut deleted = false;
        for name in &victims {
            deleted |= native.fs.delete_file(name);
        }
        if deleted {
            0
        } else {
            NO_MATCH as u16
        }
    }

    /// BDOS 20: Read sequential. 1 at end of file.
    fn bdos_read_sequential(&mut self, fcb_addr: u16) -> u16 {
        let mut fcb_mem = self.load_fcb(fcb_addr);
        let mut fcb = Fcb::new(&mut fcb_mem);

        let record = fcb.current_record();
        let offset = record as usize * RECORD_SIZE;
        let mut buf = [CTRL_Z; RECORD_SIZE];

        let Some(file) = self.open_file_mut(&fcb) else {
            return NO_MATCH as u16;
        };
        if offset >= file.data.len() {
            return 0x01;
        }
        let end = (offset + RECORD_SIZE).min(file.data.len());
        buf[..end - offset].copy_from_slice(&file.data[offset..end]);

        let dma = self.dma;
        self.write_block(dma, &buf);
        fcb.set_current_record(record + 1);
        self.store_fcb(fcb_addr, &fcb_mem);
        0
    }

    /// BDOS 21: Write sequential. 2 when the drive is full.
    fn bdos_write_sequential(&mut self, fcb_addr: u16) -> u16 {
        let mut fcb_mem = self.load_fcb(fcb_addr);
        let mut fcb = Fcb::new(&mut fcb_mem);

        let record = fcb.current_record();
        let offset = record as usize * RECORD_SIZE;
        let mut buf = [0u8; RECORD_SIZE];
        self.read_block(self.dma, &mut buf);

        let Some((drive, len)) = self.open_file_mut(&fcb).map(|f| (f.drive, f.data.len())) else {
            return NO_MATCH as u16;
        };
        let growth = (offset + RECORD_SIZE).saturating_sub(len);
        let capacity = self.native_drive(drive).and_then(|d| d.capacity);
        if let Some(capacity) = capacity {
            if growth > 0 && self.drive_usage(drive) + growth > capacity {
                return WRITE_DISK_FULL;
            }
        }

        let Some(file) = self.open_file_mut(&fcb) else {
            return NO_MATCH as u16;
        };
        if offset + RECORD_SIZE > file.data.len() {
            file.data.resize(offset + RECORD_SIZE, CTRL_Z);
        }
        file.data[offset..offset + RECORD_SIZE].copy_from_slice(&buf);
        file.modified = true;

        fcb.set_current_record(record + 1);
        self.store_fcb(fcb_addr, &fcb_mem);
        0
    }

    /// BDOS 22: Make (create) file.
    fn bdos_make_file(&mut self, fcb_addr: u16) -> u16 {
        self.search = None;
        let mut fcb_mem = self.load_fcb(fcb_addr);
        let mut fcb = Fcb::new(&mut fcb_mem);

        let drive = self.effective_drive(fcb.drive());
        let filename = fcb.filename();

        let Some(native) = self.native_drive_mut(drive) else {
            return NO_MATCH as u16;
        };
        if !native.fs.exists(&filename) && native.fs.list_files().len() >= native.max_entries {
            return NO_MATCH as u16;
        }
        if native.fs.write_file(&filename, &[]).is_err() {
            return NO_MATCH as u16;
        }

        let handle = self.allocate_handle(FileBuffer {
            drive,
            name: filename,
            data: Vec::new(),
            modified: true,
        });
        fcb.reset_position();
        fcb.set_handle(handle);
        self.store_fcb(fcb_addr, &fcb_mem);
        0
    }

    /// Write back and drop every open file.
    pub fn flush_open_files(&mut self) {
        let files: Vec<FileBuffer> = self.open_files.drain(..).flatten().collect();
        for file in files {
            if file.modified {
                if let Some(native) = self.native_drive_mut(file.drive) {
                    let _ = native.fs.write_file(&file.name, &file.data);
                }
            }
        }
    }
}
