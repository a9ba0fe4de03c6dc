//! Storage behind one simulated native drive.

use crate::error::CpmResult;

/// Backing store of a native drive (A-P): a flat set of files keyed by
/// their 8.3 name. Implementations normalize names with [`to_8_3`].
pub trait DriveFS {
    fn read_file(&self, name: &str) -> Option<Vec<u8>>;

    /// Store `data` under `name`, replacing any earlier content.
    fn write_file(&mut self, name: &str, data: &[u8]) -> CpmResult<()>;

    /// `false` when there was nothing to delete.
    fn delete_file(&mut self, name: &str) -> bool;

    fn list_files(&self) -> Vec<String>;

    fn exists(&self, name: &str) -> bool {
        self.read_file(name).is_some()
    }

    fn file_size(&self, name: &str) -> Option<usize> {
        self.read_file(name).map(|data| data.len())
    }

    /// Bytes held by all files together.
    fn used_bytes(&self) -> usize {
        self.list_files()
            .iter()
            .filter_map(|name| self.file_size(name))
            .sum()
    }
}

/// Characters a native filename may not carry besides the `.` separator.
const REJECTED: &[char] = &[
    '<', '>', ',', ';', ':', '=', '?', '*', '[', ']', '_', '%', '|', '(', ')', '/', '\\',
];

/// Map a host filename onto a native 8.3 name.
///
/// The last `.` separates the extension. Letters are upper-cased, rejected
/// and non-printing characters dropped, then the stem is cut to 8 and the
/// extension to 3 characters. A stem that ends up empty becomes `NONAME`.
///
/// ```
/// use cpmfat_core::to_8_3;
/// assert_eq!(to_8_3("readme.text"), "README.TEX");
/// assert_eq!(to_8_3("dump_2019.bin"), "DUMP2019.BIN");
/// ```
pub fn to_8_3(filename: &str) -> String {
    let keep = |part: &str, width: usize| -> String {
        part.chars()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| c.is_ascii_graphic() && *c != '.' && !REJECTED.contains(c))
            .take(width)
            .collect()
    };

    let (stem, ext) = filename.rsplit_once('.').unwrap_or((filename, ""));
    let mut name = keep(stem, 8);
    if name.is_empty() {
        name.push_str("NONAME");
    }
    let ext = keep(ext, 3);
    if !ext.is_empty() {
        name.push('.');
        name.push_str(&ext);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_8_3_cuts_fields() {
        assert_eq!(to_8_3("pip.com"), "PIP.COM");
        assert_eq!(to_8_3("TRANSFER.PROGRAM"), "TRANSFER.PRO");
        assert_eq!(to_8_3("makefile"), "MAKEFILE");
    }

    #[test]
    fn test_to_8_3_drops_rejected_characters() {
        assert_eq!(to_8_3("disk[1].img"), "DISK1.IMG");
        assert_eq!(to_8_3("a b;c.t_t"), "ABC.TT");
        assert_eq!(to_8_3("backup.tar.gz"), "BACKUPTA.GZ");
    }

    #[test]
    fn test_to_8_3_empty_stem() {
        assert_eq!(to_8_3(".profile"), "NONAME.PRO");
        assert_eq!(to_8_3("___"), "NONAME");
    }
}
