//! Path classification and native filename construction.
//!
//! Two syntaxes share the command line:
//! - Native: `[<A-P>:]NAME[.EXT]`, with `*` and `?` wildcards
//! - FAT: `<unit>:/DIR/NAME.EXT`, where the unit is a decimal disk number
//!
//! A path is FAT-style when it contains a `:` preceded only by digits.

use std::fmt;

use crate::bdos::Fcb;
use crate::error::{FsError, FsResult};

/// Highest FAT unit number accepted on the command line, plus one.
pub const MAX_UNITS: u8 = 16;

/// Characters never allowed in a native filename.
const BAD_CHARS: &[u8] = b"<>.,;:=*[]_%|()/\\";

/// Either kind of path, decided by syntax alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathReference {
    Native(NativeName),
    Fat(FatPath),
}

impl PathReference {
    pub fn parse(path: &str) -> FsResult<Self> {
        if is_fat_path(path) {
            FatPath::parse(path).map(PathReference::Fat)
        } else {
            NativeName::parse(path).map(PathReference::Native)
        }
    }

    pub fn is_fat(&self) -> bool {
        matches!(self, PathReference::Fat(_))
    }
}

/// True when every character before the first `:` is a decimal digit.
pub fn is_fat_path(path: &str) -> bool {
    match path.find(':') {
        Some(colon) => path[..colon].bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// True when the path contains `*` or `?`.
pub fn is_wild(path: &str) -> bool {
    path.contains(['*', '?'])
}

/// Split a path at its last `/`, `\` or `:` into the directory part (with
/// the separator) and the file spec.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind(['/', '\\', ':']) {
        Some(pos) => path.split_at(pos + 1),
        None => ("", path),
    }
}

/// Match a FAT name against a pattern: `?` matches one character, `*`
/// any run. Case-insensitive.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    fn matches(p: &[u8], n: &[u8]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some(b'*'), _) => matches(&p[1..], n) || (!n.is_empty() && matches(p, &n[1..])),
            (Some(b'?'), Some(_)) => matches(&p[1..], &n[1..]),
            (Some(&pc), Some(&nc)) => pc.eq_ignore_ascii_case(&nc) && matches(&p[1..], &n[1..]),
            _ => false,
        }
    }
    // "*.*" matches names without a dot as well.
    if pattern == "*.*" {
        return true;
    }
    matches(pattern.as_bytes(), name.as_bytes())
}

/// A path on a FAT unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatPath {
    unit: u8,
    path: String,
}

impl FatPath {
    /// Parse `<unit>:<path>`. An empty unit means unit 0.
    pub fn parse(path: &str) -> FsResult<Self> {
        let colon = path.find(':').ok_or(FsError::InvalidDrive)?;
        let digits = &path[..colon];
        if digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FsError::InvalidDrive);
        }
        let unit = if digits.is_empty() {
            0
        } else {
            digits.parse::<u8>().map_err(|_| FsError::InvalidDrive)?
        };
        if unit >= MAX_UNITS {
            return Err(FsError::InvalidDrive);
        }
        Ok(Self {
            unit,
            path: path[colon + 1..].replace('\\', "/"),
        })
    }

    pub fn unit(&self) -> u8 {
        self.unit
    }

    /// Path within the volume, without leading or trailing separators.
    pub fn relative(&self) -> &str {
        self.path.trim_matches('/')
    }

    /// Directory part and file spec of the path within the volume.
    pub fn split(&self) -> (&str, &str) {
        let rel = self.relative();
        match rel.rfind('/') {
            Some(pos) => (&rel[..pos], &rel[pos + 1..]),
            None => ("", rel),
        }
    }
}

impl fmt::Display for FatPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unit, self.path)
    }
}

/// A native 8.3 name as stored in a control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeName {
    /// 0 = current drive, 1-16 = A-P.
    pub drive: u8,
    pub name: [u8; 8],
    pub ext: [u8; 3],
}

impl NativeName {
    /// Build a native name from `[d:]NAME[.EXT]`.
    ///
    /// Letters are upper-cased. A `*` fills the rest of its field with `?`,
    /// and a stem ending in `*` with no extension part wildcards the
    /// extension too. Characters beyond the field width are dropped.
    pub fn parse(path: &str) -> FsResult<Self> {
        let upper = path.to_ascii_uppercase();
        let mut rest = upper.as_bytes();

        let drive = if rest.len() >= 2 && rest[1] == b':' {
            match rest[0] {
                d @ b'A'..=b'P' => {
                    rest = &rest[2..];
                    d - b'A' + 1
                }
                _ => return Err(FsError::InvalidName),
            }
        } else {
            0
        };

        let (stem, ext) = match rest.iter().position(|&b| b == b'.') {
            Some(dot) => (&rest[..dot], &rest[dot + 1..]),
            None => (rest, &[][..]),
        };

        let mut result = Self {
            drive,
            name: [b' '; 8],
            ext: [b' '; 3],
        };
        fill_field(&mut result.name, stem)?;
        fill_field(&mut result.ext, ext)?;
        // `NAME*` without a dot matches any extension.
        if ext.is_empty() && !rest.contains(&b'.') && stem.last() == Some(&b'*') {
            result.ext = [b'?'; 3];
        }

        if result.name.iter().all(|&b| b == b' ') {
            return Err(FsError::InvalidName);
        }
        Ok(result)
    }

    /// Name from raw directory-entry fields on the given drive.
    pub fn from_entry(drive: u8, name: [u8; 8], ext: [u8; 3]) -> Self {
        Self { drive, name, ext }
    }

    pub fn is_wild(&self) -> bool {
        self.name.iter().chain(self.ext.iter()).any(|&b| b == b'?')
    }

    /// Load drive, name and extension into a control block.
    pub fn store(&self, fcb: &mut Fcb<'_>) {
        fcb.set_drive(self.drive);
        fcb.set_raw_name(&self.name);
        fcb.set_raw_ext(&self.ext);
    }

    /// `NAME.EXT`, or `NAME` when there is no extension.
    pub fn filename(&self) -> String {
        let name = field_text(&self.name);
        let ext = field_text(&self.ext);
        if ext.is_empty() {
            name
        } else {
            format!("{}.{}", name, ext)
        }
    }
}

impl fmt::Display for NativeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.drive > 0 {
            write!(f, "{}:", (b'A' + self.drive - 1) as char)?;
        }
        f.write_str(&self.filename())
    }
}

fn is_valid_filename_char(c: u8) -> bool {
    c > b' ' && c <= b'~' && !BAD_CHARS.contains(&c)
}

fn fill_field(field: &mut [u8], src: &[u8]) -> FsResult<()> {
    for (i, &c) in src.iter().enumerate() {
        if c == b'*' {
            if i < field.len() {
                field[i..].fill(b'?');
            }
            return Ok(());
        }
        if c != b'?' && !is_valid_filename_char(c) {
            return Err(FsError::InvalidName);
        }
        if i < field.len() {
            field[i] = c;
        }
    }
    Ok(())
}

fn field_text(field: &[u8]) -> String {
    field
        .iter()
        .take_while(|&&b| b != b' ')
        .map(|&b| (b & 0x7F) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(is_fat_path("0:/DIR/FILE.TXT"));
        assert!(is_fat_path("12:FILE"));
        assert!(is_fat_path(":/FILE"));
        assert!(!is_fat_path("C:FILE.TXT"));
        assert!(!is_fat_path("FILE.TXT"));
        assert!(!is_fat_path("1A:FILE"));

        match PathReference::parse("0:/DIR/FILE.TXT").unwrap() {
            PathReference::Fat(p) => {
                assert_eq!(p.unit(), 0);
                assert_eq!(p.relative(), "DIR/FILE.TXT");
                assert_eq!(p.split(), ("DIR", "FILE.TXT"));
            }
            other => panic!("expected FAT path, got {:?}", other),
        }
        match PathReference::parse("C:FILE.TXT").unwrap() {
            PathReference::Native(n) => assert_eq!(n.drive, 3),
            other => panic!("expected native path, got {:?}", other),
        }
    }

    #[test]
    fn test_fat_unit_limits() {
        assert_eq!(FatPath::parse(":/X").unwrap().unit(), 0);
        assert_eq!(FatPath::parse("15:/X").unwrap().unit(), 15);
        assert_eq!(FatPath::parse("16:/X"), Err(FsError::InvalidDrive));
        assert_eq!(FatPath::parse("100:/X"), Err(FsError::InvalidDrive));
    }

    #[test]
    fn test_native_names() {
        let n = NativeName::parse("foo.txt").unwrap();
        assert_eq!(n.drive, 0);
        assert_eq!(&n.name, b"FOO     ");
        assert_eq!(&n.ext, b"TXT");

        let n = NativeName::parse("*.TXT").unwrap();
        assert_eq!(&n.name, b"????????");
        assert_eq!(&n.ext, b"TXT");
        assert!(n.is_wild());

        let n = NativeName::parse("B:AB*.?").unwrap();
        assert_eq!(n.drive, 2);
        assert_eq!(&n.name, b"AB??????");
        assert_eq!(&n.ext, b"?  ");

        let n = NativeName::parse("LONGFILENAME.TEXT").unwrap();
        assert_eq!(&n.name, b"LONGFILE");
        assert_eq!(&n.ext, b"TEX");
    }

    #[test]
    fn test_trailing_star_covers_extension() {
        let n = NativeName::parse("*").unwrap();
        assert_eq!(&n.name, b"????????");
        assert_eq!(&n.ext, b"???");

        let n = NativeName::parse("A:AB*").unwrap();
        assert_eq!(&n.name, b"AB??????");
        assert_eq!(&n.ext, b"???");

        // An explicit empty extension stays empty.
        let n = NativeName::parse("AB*.").unwrap();
        assert_eq!(&n.ext, b"   ");
        assert_eq!(&NativeName::parse("AB").unwrap().ext, b"   ");
    }

    #[test]
    fn test_invalid_native_names() {
        assert_eq!(NativeName::parse(""), Err(FsError::InvalidName));
        assert_eq!(NativeName::parse("A:"), Err(FsError::InvalidName));
        assert_eq!(NativeName::parse(".TXT"), Err(FsError::InvalidName));
        assert_eq!(NativeName::parse("Q:FILE"), Err(FsError::InvalidName));
        assert_eq!(NativeName::parse("A/B.TXT"), Err(FsError::InvalidName));
        assert_eq!(NativeName::parse("FILE_1.TXT"), Err(FsError::InvalidName));
        assert_eq!(NativeName::parse("MY FILE"), Err(FsError::InvalidName));
        assert_eq!(NativeName::parse("OK.T;T"), Err(FsError::InvalidName));
    }

    #[test]
    fn test_display() {
        let n = NativeName::parse("c:readme").unwrap();
        assert_eq!(n.to_string(), "C:README");
        assert_eq!(NativeName::parse("X.Y").unwrap().to_string(), "X.Y");
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("0:/DIR/*.TXT"), ("0:/DIR/", "*.TXT"));
        assert_eq!(split_path("A:*.COM"), ("A:", "*.COM"));
        assert_eq!(split_path("0:"), ("0:", ""));
        assert_eq!(split_path("FILE"), ("", "FILE"));
        assert_eq!(split_path("1:\\X\\Y"), ("1:\\X\\", "Y"));
    }

    #[test]
    fn test_wildcards() {
        assert!(is_wild("*.TXT"));
        assert!(is_wild("A?.TXT"));
        assert!(!is_wild("0:/A.TXT"));

        assert!(wildcard_match("*.TXT", "readme.txt"));
        assert!(wildcard_match("*", "README"));
        assert!(wildcard_match("*.*", "README"));
        assert!(wildcard_match("R?ADME", "README"));
        assert!(!wildcard_match("*.TXT", "README.DOC"));
        assert!(!wildcard_match("A?", "A"));
    }
}
