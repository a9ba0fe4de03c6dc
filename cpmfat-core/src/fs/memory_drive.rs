//! Native drive kept in memory; used for archive-seeded drives and tests.

use std::collections::BTreeMap;

use super::drive_fs::{to_8_3, DriveFS};
use crate::error::CpmResult;

/// Flat 8.3 file store, listed in name order.
#[derive(Default, Clone, Debug)]
pub struct MemoryDriveFS {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryDriveFS {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the drive. Later names overwrite earlier ones that map to the
    /// same 8.3 name.
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let mut drive = Self::new();
        for (name, data) in files {
            drive.add_file(name.as_ref(), data);
        }
        drive
    }

    pub fn add_file(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        self.entries.insert(to_8_3(name), data.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DriveFS for MemoryDriveFS {
    fn read_file(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.get(&to_8_3(name)).cloned()
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> CpmResult<()> {
        self.add_file(name, data);
        Ok(())
    }

    fn delete_file(&mut self, name: &str) -> bool {
        self.entries.remove(&to_8_3(name)).is_some()
    }

    fn list_files(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(&to_8_3(name))
    }

    fn file_size(&self, name: &str) -> Option<usize> {
        self.entries.get(&to_8_3(name)).map(Vec::len)
    }

    fn used_bytes(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_normalized() {
        let mut drive = MemoryDriveFS::new();
        drive.write_file("notes.text", b"abc\x1A").unwrap();

        assert!(drive.exists("NOTES.TEX"));
        assert_eq!(drive.read_file("Notes.Tex"), Some(b"abc\x1A".to_vec()));
        assert!(drive.delete_file("notes.tex"));
        assert!(!drive.delete_file("notes.tex"));
        assert!(drive.is_empty());
    }

    #[test]
    fn test_listing_is_sorted_and_sized() {
        let drive = MemoryDriveFS::with_files([
            ("zz.dat", vec![0u8; 128]),
            ("aa.dat", vec![0u8; 256]),
            ("ZZ.DAT", vec![0u8; 384]),
        ]);

        assert_eq!(drive.list_files(), vec!["AA.DAT", "ZZ.DAT"]);
        assert_eq!(drive.file_size("ZZ.DAT"), Some(384));
        assert_eq!(drive.used_bytes(), 640);
    }
}
