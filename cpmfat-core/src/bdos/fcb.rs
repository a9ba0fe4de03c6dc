//! File control block view.
//!
//! The block lives in the caller's address space and is handed to the
//! native file primitives by address. The utility fills in names and
//! templates; the simulated host keeps its position and handle in it.
//!
//! ```text
//! 0      drive (0 = default, 1 = A)
//! 1..9   name, space padded
//! 9..12  extension, space padded (bit 7 = attribute)
//! 12     EX   extent
//! 13, 14 S1, S2
//! 15     RC   record count
//! 16..32 allocation map
//! 32     CR   current record
//! 33..36 R0-R2 random record
//! ```

/// Size of an FCB in bytes.
pub const FCB_SIZE: usize = 36;

const DRIVE: usize = 0;
const NAME: std::ops::Range<usize> = 1..9;
const EXT: std::ops::Range<usize> = 9..12;
const EX: usize = 12;
const S2: usize = 14;
const MAP: usize = 16;
const CR: usize = 32;

/// Allocation map bytes 16-19 carry a host file handle; the second word is
/// the first XORed with this value.
const HANDLE_SIGNATURE: u16 = 0xBEEF;

/// Mutable view over an FCB in caller memory (at least `FCB_SIZE` bytes).
pub struct Fcb<'a> {
    mem: &'a mut [u8],
}

impl<'a> Fcb<'a> {
    pub fn new(memory: &'a mut [u8]) -> Self {
        debug_assert!(memory.len() >= FCB_SIZE);
        Self { mem: memory }
    }

    pub fn drive(&self) -> u8 {
        self.mem[DRIVE]
    }

    pub fn set_drive(&mut self, drive: u8) {
        self.mem[DRIVE] = drive;
    }

    pub fn set_raw_name(&mut self, name: &[u8; 8]) {
        self.mem[NAME].copy_from_slice(name);
    }

    pub fn set_raw_ext(&mut self, ext: &[u8; 3]) {
        self.mem[EXT].copy_from_slice(ext);
    }

    /// `NAME.EXT`, or `NAME` without an extension. Attribute bits are
    /// ignored.
    pub fn filename(&self) -> String {
        let name = field_text(&self.mem[NAME]);
        let ext = field_text(&self.mem[EXT]);
        if ext.is_empty() {
            name
        } else {
            format!("{}.{}", name, ext)
        }
    }

    /// Fill name and extension from a host 8.3 filename.
    pub fn set_filename(&mut self, filename: &str) {
        let (name, ext) = filename.rsplit_once('.').unwrap_or((filename, ""));
        fill_field(&mut self.mem[NAME], name);
        fill_field(&mut self.mem[EXT], ext);
    }

    /// Sequential record number, kept in CR, EX and S2.
    pub fn current_record(&self) -> u32 {
        self.mem[CR] as u32 | (self.mem[EX] as u32) << 7 | (self.mem[S2] as u32) << 12
    }

    pub fn set_current_record(&mut self, record: u32) {
        self.mem[CR] = (record & 0x7F) as u8;
        self.mem[EX] = ((record >> 7) & 0x1F) as u8;
        self.mem[S2] = (record >> 12) as u8;
    }

    /// Host file handle kept in the allocation map, if the block holds one.
    pub fn handle(&self) -> Option<u16> {
        let word = |at: usize| u16::from_le_bytes([self.mem[at], self.mem[at + 1]]);
        let handle = word(MAP);
        (handle != 0 && handle ^ HANDLE_SIGNATURE == word(MAP + 2)).then_some(handle)
    }

    pub fn set_handle(&mut self, handle: u16) {
        self.mem[MAP..MAP + 2].copy_from_slice(&handle.to_le_bytes());
        self.mem[MAP + 2..MAP + 4].copy_from_slice(&(handle ^ HANDLE_SIGNATURE).to_le_bytes());
    }

    pub fn clear_handle(&mut self) {
        self.mem[MAP..MAP + 4].fill(0);
    }

    /// Zero everything after the extension.
    pub fn reset_position(&mut self) {
        self.mem[EX..FCB_SIZE].fill(0);
    }
}

fn field_text(field: &[u8]) -> String {
    field
        .iter()
        .map(|&b| (b & 0x7F) as char)
        .take_while(|&c| c != ' ')
        .collect()
}

fn fill_field(field: &mut [u8], text: &str) {
    let mut bytes = text.bytes().map(|b| b.to_ascii_uppercase());
    for slot in field.iter_mut() {
        *slot = bytes.next().unwrap_or(b' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_fields() {
        let mut mem = [0u8; FCB_SIZE];
        let mut fcb = Fcb::new(&mut mem);

        fcb.set_filename("dump.bin");
        assert_eq!(fcb.filename(), "DUMP.BIN");
        fcb.set_filename("MAKEFILE");
        assert_eq!(fcb.filename(), "MAKEFILE");
        drop(fcb);
        assert_eq!(&mem[1..12], b"MAKEFILE   ");
    }

    #[test]
    fn test_attribute_bits_ignored() {
        let mut mem = [0u8; FCB_SIZE];
        mem[1..12].copy_from_slice(b"STAT    COM");
        mem[9] |= 0x80;
        assert_eq!(Fcb::new(&mut mem).filename(), "STAT.COM");
    }

    #[test]
    fn test_record_position_spans_extents() {
        let mut mem = [0u8; FCB_SIZE];
        let mut fcb = Fcb::new(&mut mem);

        fcb.set_current_record(130);
        assert_eq!(fcb.current_record(), 130);
        fcb.set_current_record(5000);
        assert_eq!(fcb.current_record(), 5000);
        drop(fcb);
        assert_eq!((mem[CR], mem[EX], mem[S2]), (8, 7, 1));
    }

    #[test]
    fn test_handle_needs_signature() {
        let mut mem = [0u8; FCB_SIZE];
        let mut fcb = Fcb::new(&mut mem);
        assert_eq!(fcb.handle(), None);

        fcb.set_handle(3);
        assert_eq!(fcb.handle(), Some(3));
        fcb.reset_position();
        assert_eq!(fcb.handle(), None);

        fcb.set_handle(4);
        fcb.clear_handle();
        assert_eq!(fcb.handle(), None);
        drop(fcb);

        // A stray map without the signature is not a handle.
        mem[MAP] = 4;
        assert_eq!(Fcb::new(&mut mem).handle(), None);
    }
}
