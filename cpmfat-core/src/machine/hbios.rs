//! Device services of the simulated machine, reached by the wide call.

use z80emu::{Cpu, Prefix, Reg8, StkReg16};

use crate::bridge::hbios::*;
use crate::console::CpmConsole;
use crate::diskio::SECTOR_SIZE;
use crate::identity::HardwareIdentity;

use super::Machine;

// Status codes returned in A.
const ERR_NOFUNC: u8 = 0xFF;
const ERR_NOUNIT: u8 = 0xFE;
const ERR_IO: u8 = 0xFC;
const ERR_RANGE: u8 = 0xFA;
const ERR_NOHW: u8 = 0xF9;
const ERR_READONLY: u8 = 0xF8;

impl<C: CpmConsole> Machine<C> {
    /// Service one wide call. Inputs are taken from the register file and
    /// results left in it.
    pub(super) fn dispatch_hbios(&mut self) {
        let func = self.cpu.get_reg(Reg8::B, None);
        let unit = self.cpu.get_reg(Reg8::C, None);

        if !self.identity.is_known() {
            self.cpu.set_reg(Reg8::A, None, ERR_NOFUNC);
            return;
        }
        if self.identity == HardwareIdentity::Una {
            // The UNA entry code uses IX and IY as scratch.
            self.cpu.set_index16(Prefix::Xdd, 0xA5A5);
            self.cpu.set_index16(Prefix::Yfd, 0x5A5A);
        }

        let status = match func {
            SYSGET => self.hb_sysget(unit),
            DIOSEEK => self.hb_seek(unit),
            DIOREAD => self.hb_transfer(unit, false),
            DIOWRITE => self.hb_transfer(unit, true),
            DIODEVICE => self.hb_device(unit),
            DIOMEDIA => self.hb_media(unit),
            DIOCAP => self.hb_capacity(unit),
            RTCGETTIM => self.hb_rtc_get(),
            _ => ERR_NOFUNC,
        };

        if status != 0 {
            log::trace!("[HBIOS] function {:#04X} unit {} -> {:#04X}", func, unit, status);
        }
        self.cpu.set_reg(Reg8::A, None, status);
    }

    fn hb_sysget(&mut self, sub: u8) -> u8 {
        match sub {
            SYSGET_DIOCNT => {
                self.cpu.set_reg(Reg8::E, None, self.units.len() as u8);
                0
            }
            _ => ERR_NOFUNC,
        }
    }

    fn hb_seek(&mut self, unit: u8) -> u8 {
        let d = self.cpu.get_reg(Reg8::D, None);
        let e = self.cpu.get_reg(Reg8::E, None);
        let hl = self.cpu.get_reg16(StkReg16::HL);
        let Some(disk) = self.units.get_mut(unit as usize) else {
            return ERR_NOUNIT;
        };
        if d & LBA_FLAG == 0 {
            // CHS addressing is not offered.
            return ERR_NOHW;
        }
        let lba = ((d & 0x7F) as u32) << 24 | (e as u32) << 16 | hl as u32;
        if disk.seek(lba) {
            0
        } else {
            ERR_RANGE
        }
    }

    fn hb_transfer(&mut self, unit: u8, write: bool) -> u8 {
        let count = self.cpu.get_reg(Reg8::E, None) as usize;
        let buffer = self.cpu.get_reg16(StkReg16::HL) as usize;
        if buffer + count * SECTOR_SIZE > self.memory.len() {
            return ERR_RANGE;
        }
        let Some(disk) = self.units.get_mut(unit as usize) else {
            return ERR_NOUNIT;
        };
        if write && disk.media.is_read_only() {
            return ERR_READONLY;
        }

        let mut done = 0;
        let mut status = 0;
        while done < count {
            let Some(lba) = disk.position() else {
                status = ERR_RANGE;
                break;
            };
            let window = buffer + done * SECTOR_SIZE..buffer + (done + 1) * SECTOR_SIZE;
            let result = if write {
                disk.image_mut().write_sector(lba, &self.memory[window])
            } else {
                disk.image_mut().read_sector(lba, &mut self.memory[window])
            };
            if result.is_err() {
                status = ERR_IO;
                break;
            }
            disk.advance();
            done += 1;
        }
        if write && disk.image_mut().flush().is_err() {
            status = ERR_IO;
        }

        self.cpu.set_reg(Reg8::E, None, done as u8);
        status
    }

    fn hb_device(&mut self, unit: u8) -> u8 {
        let Some(disk) = self.units.get(unit as usize) else {
            return ERR_NOUNIT;
        };
        let (device_type, attributes) = (disk.media.device_type(), disk.media.attributes());
        self.cpu.set_reg(Reg8::D, None, device_type);
        self.cpu.set_reg(Reg8::C, None, attributes);
        self.cpu.set_reg(Reg8::E, None, unit);
        0
    }

    fn hb_media(&mut self, unit: u8) -> u8 {
        let Some(disk) = self.units.get(unit as usize) else {
            return ERR_NOUNIT;
        };
        let media_id = disk.media.media_id();
        self.cpu.set_reg(Reg8::E, None, media_id);
        0
    }

    fn hb_capacity(&mut self, unit: u8) -> u8 {
        let Some(disk) = self.units.get(unit as usize) else {
            return ERR_NOUNIT;
        };
        let sectors = disk.sector_count();
        self.cpu.set_reg16(StkReg16::DE, (sectors >> 16) as u16);
        self.cpu.set_reg16(StkReg16::HL, sectors as u16);
        self.cpu.set_reg16(StkReg16::BC, SECTOR_SIZE as u16);
        0
    }

    fn hb_rtc_get(&mut self) -> u8 {
        let buffer = self.cpu.get_reg16(StkReg16::HL);
        match self.rtc.read() {
            Some(record) => {
                self.write_block(buffer, &record);
                0
            }
            None => ERR_NOHW,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bridge::{hbios, CallBridge, RegisterBlock};
    use crate::console::HeadlessConsole;
    use crate::identity::HardwareIdentity;
    use crate::machine::{DiskUnit, Machine, MediaKind, MemoryImage};

    fn machine(identity: HardwareIdentity, media: MediaKind) -> Machine<HeadlessConsole> {
        let mut machine = Machine::new(HeadlessConsole::new(), identity);
        machine.attach_unit(DiskUnit::new(media, Box::new(MemoryImage::new(32))));
        machine
    }

    #[test]
    fn test_index_registers_survive_una_call() {
        let mut m = machine(HardwareIdentity::Una, MediaKind::Fixed);
        m.set_index_registers(0x1234, 0x5678);

        let out = m.hbios(&RegisterBlock::call(hbios::SYSGET, hbios::SYSGET_DIOCNT));
        assert_eq!(out.a(), 0);
        assert_eq!(out.e(), 1);
        assert_eq!(m.index_registers(), (0x1234, 0x5678));
    }

    #[test]
    fn test_seek_requires_lba_and_range() {
        let mut m = machine(HardwareIdentity::Hbios, MediaKind::Fixed);
        let seek = |de, hl| RegisterBlock::call(hbios::DIOSEEK, 0).with_de(de).with_hl(hl);

        assert_eq!(m.hbios(&seek(0x8000, 31)).a(), 0);
        assert_ne!(m.hbios(&seek(0x8000, 32)).a(), 0);
        assert_ne!(m.hbios(&seek(0x0000, 0)).a(), 0);
        assert_ne!(
            m.hbios(&RegisterBlock::call(hbios::DIOSEEK, 4).with_de(0x8000)).a(),
            0
        );
    }

    #[test]
    fn test_rom_rejects_writes() {
        let mut m = machine(HardwareIdentity::Hbios, MediaKind::Rom);
        m.hbios(&RegisterBlock::call(hbios::DIOSEEK, 0).with_de(0x8000));
        let out = m.hbios(
            &RegisterBlock::call(hbios::DIOWRITE, 0)
                .with_de(1)
                .with_hl(0x1000),
        );
        assert_ne!(out.a(), 0);
    }

    #[test]
    fn test_device_and_capacity() {
        let mut m = machine(HardwareIdentity::Hbios, MediaKind::Floppy);
        let out = m.hbios(&RegisterBlock::call(hbios::DIODEVICE, 0));
        assert_eq!(out.d(), hbios::DEVTYPE_FD);
        assert_eq!(out.c(), hbios::ATTR_REMOVABLE);

        let out = m.hbios(&RegisterBlock::call(hbios::DIOCAP, 0));
        assert_eq!((out.de, out.hl), (0, 32));
    }

    #[test]
    fn test_unknown_function() {
        let mut m = machine(HardwareIdentity::Hbios, MediaKind::Fixed);
        assert_eq!(m.hbios(&RegisterBlock::call(0x77, 0)).a(), 0xFF);
    }
}
