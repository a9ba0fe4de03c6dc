//! Simulated host machine.
//!
//! Provides the call bridge on a development host: a 64K address space, a
//! Z80 register file carrying the calling convention, native file and
//! console services over `DriveFS` drives, and device services over disk
//! images. The firmware signature of the selected dialect is placed at the
//! top of memory so identity detection works unchanged.

mod bdos;
mod disk;
mod hbios;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use z80emu::{Cpu, Prefix, Reg8, StkReg16, Z80NMOS};

use crate::bdos::{addr, BdosFunction};
use crate::bridge::{CallBridge, RegisterBlock};
use crate::console::CpmConsole;
use crate::fs::DriveFS;
use crate::identity::{HardwareIdentity, HBIOS_MARKER};

pub use bdos::NativeDrive;
pub use disk::{DiskImage, DiskUnit, FileImage, MediaKind, MemoryImage, Rtc};

/// Native system entry; a `RET`, calls are intercepted.
const BDOS_ENTRY: u16 = 0xE406;

/// Number of native drives (A-P).
pub const MAX_DRIVES: usize = 16;

/// Simulated machine.
pub struct Machine<C: CpmConsole> {
    /// Register file; only registers are used, no code is executed.
    cpu: Z80NMOS,
    /// 64KB memory.
    memory: Vec<u8>,
    console: C,
    identity: HardwareIdentity,
    /// Drives (A-P).
    drives: Vec<Option<NativeDrive>>,
    /// Current drive (0 = A, 1 = B, ...).
    current_drive: u8,
    /// DMA address for file operations.
    dma: u16,
    search: Option<bdos::Search>,
    open_files: Vec<Option<bdos::FileBuffer>>,
    units: Vec<DiskUnit>,
    rtc: Rtc,
    bdos_calls: HashMap<BdosFunction, usize>,
    hbios_calls: HashMap<u8, usize>,
}

impl<C: CpmConsole> Machine<C> {
    /// Create a machine carrying the firmware of `identity`.
    pub fn new(console: C, identity: HardwareIdentity) -> Self {
        let mut machine = Self {
            cpu: Z80NMOS::default(),
            memory: vec![0; 0x10000],
            console,
            identity,
            drives: (0..MAX_DRIVES).map(|_| None).collect(),
            current_drive: 0,
            dma: addr::TRANSFER,
            search: None,
            open_files: Vec::new(),
            units: Vec::new(),
            rtc: Rtc::default(),
            bdos_calls: HashMap::new(),
            hbios_calls: HashMap::new(),
        };
        machine.init_memory();
        machine
    }

    /// Page zero vectors and the firmware signature.
    fn init_memory(&mut self) {
        // JP 0 at warm boot vector
        self.memory[0x0000..0x0003].copy_from_slice(&[0xC3, 0x00, 0x00]);
        // JP BDOS at 0x0005
        let [lo, hi] = BDOS_ENTRY.to_le_bytes();
        self.memory[0x0005..0x0008].copy_from_slice(&[0xC3, lo, hi]);
        self.memory[BDOS_ENTRY as usize] = 0xC9; // RET

        match self.identity {
            HardwareIdentity::Hbios => {
                self.load_at(addr::SIGNATURE_PTR, &addr::HBIOS_IDENT.to_le_bytes());
                self.load_at(addr::HBIOS_IDENT, &HBIOS_MARKER);
            }
            HardwareIdentity::Una => {
                self.load_at(addr::SIGNATURE_JP, &[0xC3]);
                self.load_at(addr::SIGNATURE_PTR, &addr::UNA_ENTRY.to_le_bytes());
                self.load_at(addr::UNA_ENTRY, &[0xFD, 0xE5]); // PUSH IY
            }
            HardwareIdentity::Unknown => {}
        }
    }

    /// Load binary data into memory at a specific address.
    pub fn load_at(&mut self, address: u16, data: &[u8]) {
        let start = address as usize;
        let end = (start + data.len()).min(self.memory.len());
        self.memory[start..end].copy_from_slice(&data[..end - start]);
    }

    /// Mount a drive (0 = A).
    pub fn mount(&mut self, drive: u8, native: NativeDrive) {
        if let Some(slot) = self.drives.get_mut(drive as usize) {
            *slot = Some(native);
        }
    }

    /// Get a reference to a drive's filesystem.
    pub fn drive(&self, drive: u8) -> Option<&dyn DriveFS> {
        self.drives
            .get(drive as usize)
            .and_then(Option::as_ref)
            .map(NativeDrive::fs)
    }

    /// Attach a disk unit; returns its unit number.
    pub fn attach_unit(&mut self, unit: DiskUnit) -> u8 {
        self.units.push(unit);
        (self.units.len() - 1) as u8
    }

    pub fn unit_mut(&mut self, unit: u8) -> Option<&mut DiskUnit> {
        self.units.get_mut(unit as usize)
    }

    pub fn set_rtc(&mut self, rtc: Rtc) {
        self.rtc = rtc;
    }

    pub fn identity(&self) -> HardwareIdentity {
        self.identity
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Number of narrow calls made to `func` so far.
    pub fn call_count(&self, func: BdosFunction) -> usize {
        self.bdos_calls.get(&func).copied().unwrap_or(0)
    }

    /// Number of wide calls made to `func` so far.
    pub fn hbios_call_count(&self, func: u8) -> usize {
        self.hbios_calls.get(&func).copied().unwrap_or(0)
    }

    pub fn index_registers(&self) -> (u16, u16) {
        (
            self.cpu.get_index16(Prefix::Xdd),
            self.cpu.get_index16(Prefix::Yfd),
        )
    }

    pub fn set_index_registers(&mut self, ix: u16, iy: u16) {
        self.cpu.set_index16(Prefix::Xdd, ix);
        self.cpu.set_index16(Prefix::Yfd, iy);
    }

    /// Share the machine as the process bridge.
    pub fn into_shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    fn read_block(&self, addr: u16, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.memory[(addr as usize + i) & 0xFFFF];
        }
    }

    fn write_block(&mut self, addr: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.memory[(addr as usize + i) & 0xFFFF] = byte;
        }
    }
}

impl<C: CpmConsole> CallBridge for Machine<C> {
    fn bdos(&mut self, function: u8, param: u16) -> u16 {
        self.cpu.set_reg(Reg8::C, None, function);
        self.cpu.set_reg16(StkReg16::DE, param);

        let c = self.cpu.get_reg(Reg8::C, None);
        let e = self.cpu.get_reg(Reg8::E, None);
        let de = self.cpu.get_reg16(StkReg16::DE);

        log::trace!("[BDOS] Function {} (C={:#04X}, DE={:#06X})", c, c, de);

        let result = match BdosFunction::try_from(c) {
            Ok(func) => {
                *self.bdos_calls.entry(func).or_insert(0) += 1;
                self.dispatch_bdos(func, e, de)
            }
            Err(_) => {
                log::trace!("[BDOS] Unknown function: {}", c);
                0
            }
        };

        // Results come back in HL with A = L and B = H.
        self.cpu.set_reg16(StkReg16::HL, result);
        self.cpu.set_reg(Reg8::A, None, result as u8);
        self.cpu.set_reg(Reg8::B, None, (result >> 8) as u8);
        self.cpu.get_reg16(StkReg16::HL)
    }

    fn hbios(&mut self, input: &RegisterBlock) -> RegisterBlock {
        let (ix, iy) = self.index_registers();

        self.cpu.set_reg16(StkReg16::BC, input.bc);
        self.cpu.set_reg16(StkReg16::DE, input.de);
        self.cpu.set_reg16(StkReg16::HL, input.hl);
        self.cpu.set_reg16(StkReg16::AF, input.af);

        log::trace!(
            "[HBIOS] B={:#04X} C={:#04X} DE={:#06X} HL={:#06X}",
            input.b(),
            input.c(),
            input.de,
            input.hl
        );
        *self.hbios_calls.entry(input.b()).or_insert(0) += 1;
        self.dispatch_hbios();

        let output = RegisterBlock {
            bc: self.cpu.get_reg16(StkReg16::BC),
            de: self.cpu.get_reg16(StkReg16::DE),
            hl: self.cpu.get_reg16(StkReg16::HL),
            af: self.cpu.get_reg16(StkReg16::AF),
        };
        self.set_index_registers(ix, iy);
        output
    }

    fn read_memory(&self, addr: u16, buf: &mut [u8]) {
        self.read_block(addr, buf);
    }

    fn write_memory(&mut self, addr: u16, data: &[u8]) {
        self.write_block(addr, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::HeadlessConsole;

    #[test]
    fn test_page_zero_vectors() {
        let machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Hbios);
        assert_eq!(machine.memory[0x0005], 0xC3);
        assert_eq!(machine.memory[0x0006], 0x06);
        assert_eq!(machine.memory[0x0007], 0xE4);
    }

    #[test]
    fn test_narrow_call_result_in_hl_and_a() {
        let mut machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Hbios);
        assert_eq!(machine.bdos(BdosFunction::ReturnVersion as u8, 0), 0x0022);
        assert_eq!(machine.cpu.get_reg(Reg8::A, None), 0x22);
        assert_eq!(machine.call_count(BdosFunction::ReturnVersion), 1);

        machine.bdos(BdosFunction::ConsoleOutput as u8, b'Z' as u16);
        assert_eq!(machine.console().output_string(), "Z");
    }

    #[test]
    fn test_unknown_identity_has_no_device_services() {
        let mut machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Unknown);
        machine.attach_unit(DiskUnit::new(MediaKind::Fixed, Box::new(MemoryImage::new(8))));
        let out = machine.hbios(&RegisterBlock::call(
            crate::bridge::hbios::SYSGET,
            crate::bridge::hbios::SYSGET_DIOCNT,
        ));
        assert_ne!(out.a(), 0);
    }

    #[test]
    fn test_memory_wraps_at_top() {
        let mut machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Unknown);
        machine.write_memory(0xFFFF, &[1, 2]);
        let mut back = [0u8; 2];
        machine.read_memory(0xFFFF, &mut back);
        assert_eq!(back, [1, 2]);
        assert_eq!(machine.memory[0], 2);
    }
}
