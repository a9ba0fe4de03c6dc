//! Hardware identity detection.
//!
//! The two supported firmware dialects leave different signatures at the
//! top of memory. Detection runs once; the result travels in a `Platform`
//! value and is never repeated.

use std::fmt;

use crate::bdos::addr;
use crate::bridge::Bridge;

/// Opcode of an absolute jump (`JP nn`).
const OPCODE_JP: u8 = 0xC3;

/// First two bytes of the UNA entry routine (`PUSH IY`).
const UNA_ENTRY_SIGNATURE: [u8; 2] = [0xFD, 0xE5];

/// HBIOS marker: `'W'` followed by its complement.
pub const HBIOS_MARKER: [u8; 2] = [b'W', !b'W'];

/// Which low-level hardware-call dialect is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareIdentity {
    #[default]
    Unknown,
    /// RomWBW HBIOS.
    Hbios,
    /// UNA BIOS.
    Una,
}

impl HardwareIdentity {
    /// Read the signature locations through the bridge.
    pub fn detect(bridge: &Bridge) -> Self {
        let ptr = bridge.peek_word(addr::SIGNATURE_PTR);

        if bridge.peek_byte(addr::SIGNATURE_JP) == OPCODE_JP {
            let mut entry = [0u8; 2];
            bridge.peek(ptr, &mut entry);
            if entry == UNA_ENTRY_SIGNATURE {
                return HardwareIdentity::Una;
            }
        }

        let mut marker = [0u8; 2];
        bridge.peek(ptr, &mut marker);
        if marker == HBIOS_MARKER {
            return HardwareIdentity::Hbios;
        }

        HardwareIdentity::Unknown
    }

    pub fn is_known(self) -> bool {
        self != HardwareIdentity::Unknown
    }
}

impl fmt::Display for HardwareIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HardwareIdentity::Unknown => "unknown",
            HardwareIdentity::Hbios => "HBIOS",
            HardwareIdentity::Una => "UNA",
        })
    }
}

/// Process-wide facts established once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Platform {
    pub identity: HardwareIdentity,
}

impl Platform {
    /// Detect the hardware and capture the result.
    pub fn detect(bridge: &Bridge) -> Self {
        let identity = HardwareIdentity::detect(bridge);
        log::debug!("hardware identity: {}", identity);
        Self { identity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::HeadlessConsole;
    use crate::machine::Machine;

    fn detect(machine: Machine<HeadlessConsole>) -> HardwareIdentity {
        let bridge = Bridge::from(machine.into_shared());
        HardwareIdentity::detect(&bridge)
    }

    #[test]
    fn test_detects_each_dialect() {
        let console = HeadlessConsole::new();
        assert_eq!(
            detect(Machine::new(console, HardwareIdentity::Hbios)),
            HardwareIdentity::Hbios
        );

        let console = HeadlessConsole::new();
        assert_eq!(
            detect(Machine::new(console, HardwareIdentity::Una)),
            HardwareIdentity::Una
        );

        let console = HeadlessConsole::new();
        assert_eq!(
            detect(Machine::new(console, HardwareIdentity::Unknown)),
            HardwareIdentity::Unknown
        );
    }

    #[test]
    fn test_jump_to_other_code_is_not_una() {
        let mut machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Unknown);
        machine.load_at(addr::SIGNATURE_JP, &[OPCODE_JP, 0x00, 0xF0]);
        machine.load_at(0xF000, &[0xF3, 0xC9]); // DI; RET

        assert_eq!(detect(machine), HardwareIdentity::Unknown);
    }
}
