//! Call bridge: the two ways into privileged system code.
//!
//! The narrow call carries a one-byte function selector and one 16-bit
//! parameter and returns one 16-bit result; it reaches the native file and
//! console primitives. The wide call carries a full register block through a
//! fixed dispatch vector; it reaches device management and block I/O.
//!
//! Both calls are synchronous and block until the routine returns. There is
//! no timeout: an unresponsive device hangs the caller.

mod regs;

use std::cell::RefCell;
use std::rc::Rc;

pub use regs::RegisterBlock;

use crate::bdos::BdosFunction;

/// Wide-call function codes (placed in `B`).
pub mod hbios {
    /// System get; sub-function in `C`.
    pub const SYSGET: u8 = 0xF8;
    /// System get sub-function: disk unit count, returned in `E`.
    pub const SYSGET_DIOCNT: u8 = 0x10;
    /// Seek to the sector in DE:HL.
    pub const DIOSEEK: u8 = 0x12;
    /// Read `E` sectors to the buffer at HL.
    pub const DIOREAD: u8 = 0x13;
    /// Write `E` sectors from the buffer at HL.
    pub const DIOWRITE: u8 = 0x14;
    /// Device characteristics: `D` = device type, `C` = attributes.
    pub const DIODEVICE: u8 = 0x17;
    /// Media query; bit 0 of `E` requests discovery.
    pub const DIOMEDIA: u8 = 0x18;
    /// Capacity in sectors, returned in DE:HL.
    pub const DIOCAP: u8 = 0x1A;
    /// Read the real-time clock into the 6-byte BCD record at HL.
    pub const RTCGETTIM: u8 = 0x20;

    /// Bit in `D` flagging a logical block address during seek.
    pub const LBA_FLAG: u8 = 0x80;

    /// Device type of memory (RAM/ROM) disks.
    pub const DEVTYPE_MD: u8 = 0x00;
    /// Device type of floppy drives.
    pub const DEVTYPE_FD: u8 = 0x10;
    /// Device type of fixed (IDE-class) disks.
    pub const DEVTYPE_IDE: u8 = 0x30;
    /// Attribute bit: removable media.
    pub const ATTR_REMOVABLE: u8 = 0x80;
}

/// Capability to invoke system routines of the host machine.
///
/// Control blocks and transfer buffers are passed by address, so the bridge
/// also exposes the caller's address space.
pub trait CallBridge {
    /// Narrow call: function selector in `C`, parameter in `DE`, result from `HL`.
    fn bdos(&mut self, function: u8, param: u16) -> u16;

    /// Wide call through the fixed dispatch vector.
    ///
    /// Index registers are preserved across the call even if the routine
    /// clobbers them.
    fn hbios(&mut self, input: &RegisterBlock) -> RegisterBlock;

    /// Copy bytes out of the caller's address space.
    fn read_memory(&self, addr: u16, buf: &mut [u8]);

    /// Copy bytes into the caller's address space.
    fn write_memory(&mut self, addr: u16, data: &[u8]);
}

/// Shared handle to the one bridge of the process.
///
/// Every call borrows the bridge for its own duration only.
#[derive(Clone)]
pub struct Bridge {
    inner: Rc<RefCell<dyn CallBridge>>,
}

impl Bridge {
    pub fn new(inner: Rc<RefCell<dyn CallBridge>>) -> Self {
        Self { inner }
    }

    /// Narrow call returning the full 16-bit result.
    pub fn bdos_word(&self, function: BdosFunction, param: u16) -> u16 {
        self.inner.borrow_mut().bdos(function as u8, param)
    }

    /// Narrow call returning the byte result (register `A`).
    pub fn bdos(&self, function: BdosFunction, param: u16) -> u8 {
        self.bdos_word(function, param) as u8
    }

    /// Wide call.
    pub fn hbios(&self, input: RegisterBlock) -> RegisterBlock {
        self.inner.borrow_mut().hbios(&input)
    }

    pub fn peek(&self, addr: u16, buf: &mut [u8]) {
        self.inner.borrow().read_memory(addr, buf);
    }

    pub fn peek_byte(&self, addr: u16) -> u8 {
        let mut byte = [0u8; 1];
        self.peek(addr, &mut byte);
        byte[0]
    }

    pub fn peek_word(&self, addr: u16) -> u16 {
        let mut word = [0u8; 2];
        self.peek(addr, &mut word);
        u16::from_le_bytes(word)
    }

    pub fn poke(&self, addr: u16, data: &[u8]) {
        self.inner.borrow_mut().write_memory(addr, data);
    }
}

impl<B: CallBridge + 'static> From<Rc<RefCell<B>>> for Bridge {
    fn from(inner: Rc<RefCell<B>>) -> Self {
        Self { inner }
    }
}
