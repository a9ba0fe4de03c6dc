//! Native (CP/M 2.2) system interface definitions.
//!
//! Function numbers for the narrow call, the record size, the fixed memory
//! map shared by caller and simulated host, and the File Control Block view.

pub mod fcb;

pub use fcb::{Fcb, FCB_SIZE};

/// BDOS function numbers used over the narrow call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BdosFunction {
    /// 0: System reset / warm boot
    SystemReset = 0,
    /// 1: Console input (blocking, echoed)
    ConsoleInput = 1,
    /// 2: Console output
    ConsoleOutput = 2,
    /// 6: Direct console I/O
    DirectConsoleIO = 6,
    /// 9: Print string ($ terminated)
    PrintString = 9,
    /// 11: Get console status
    ConsoleStatus = 11,
    /// 12: Return version number
    ReturnVersion = 12,
    /// 15: Open file
    OpenFile = 15,
    /// 16: Close file
    CloseFile = 16,
    /// 17: Search for first
    SearchFirst = 17,
    /// 18: Search for next
    SearchNext = 18,
    /// 19: Delete file
    DeleteFile = 19,
    /// 20: Read sequential
    ReadSequential = 20,
    /// 21: Write sequential
    WriteSequential = 21,
    /// 22: Make file (create)
    MakeFile = 22,
    /// 26: Set DMA address
    SetDmaAddress = 26,
}

impl TryFrom<u8> for BdosFunction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SystemReset),
            1 => Ok(Self::ConsoleInput),
            2 => Ok(Self::ConsoleOutput),
            6 => Ok(Self::DirectConsoleIO),
            9 => Ok(Self::PrintString),
            11 => Ok(Self::ConsoleStatus),
            12 => Ok(Self::ReturnVersion),
            15 => Ok(Self::OpenFile),
            16 => Ok(Self::CloseFile),
            17 => Ok(Self::SearchFirst),
            18 => Ok(Self::SearchNext),
            19 => Ok(Self::DeleteFile),
            20 => Ok(Self::ReadSequential),
            21 => Ok(Self::WriteSequential),
            22 => Ok(Self::MakeFile),
            26 => Ok(Self::SetDmaAddress),
            _ => Err(value),
        }
    }
}

/// Record size in CP/M (always 128 bytes).
pub const RECORD_SIZE: usize = 128;

/// Size of one directory entry inside a search result record.
pub const DIR_ENTRY_SIZE: usize = 32;

/// Return code of open/search/make when nothing matched or space ran out.
pub const NO_MATCH: u8 = 0xFF;

/// Direct console I/O parameter: wait for a key, no echo.
pub const DIRIO_WAIT: u16 = 0xFD;

/// End-of-input marker (Ctrl-Z).
pub const CTRL_Z: u8 = 0x1A;

/// Memory addresses shared by the caller and the host.
pub mod addr {
    /// Default DMA buffer; the shared transfer buffer.
    pub const TRANSFER: u16 = 0x0080;
    /// First control-block slot owned by the utility.
    pub const FCB_AREA: u16 = 0x0100;
    /// Distance between control-block slots.
    pub const FCB_STRIDE: u16 = 0x30;
    /// Number of control-block slots.
    pub const FCB_SLOTS: usize = 4;
    /// RTC time record (6 BCD bytes).
    pub const RTC_BUFFER: u16 = 0x01F0;
    /// Staging window for sector transfers.
    pub const DISK_STAGING: u16 = 0x1000;
    /// Sectors that fit in the staging window.
    pub const STAGING_SECTORS: usize = 16;
    /// UNA API entry point (jump target of the signature vector).
    pub const UNA_ENTRY: u16 = 0xFD00;
    /// HBIOS identification marker.
    pub const HBIOS_IDENT: u16 = 0xFE00;
    /// Signature vector: JP opcode byte.
    pub const SIGNATURE_JP: u16 = 0xFFFD;
    /// Signature vector: jump target / ident pointer word.
    pub const SIGNATURE_PTR: u16 = 0xFFFE;
}
