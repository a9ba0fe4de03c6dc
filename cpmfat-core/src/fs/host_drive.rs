//! Drive backed by a directory on the host.

use std::fs;
use std::path::{Path, PathBuf};

use super::drive_fs::{to_8_3, DriveFS};
use crate::error::CpmResult;

/// Native drive whose files live as regular files in one host directory.
///
/// Host names are mapped to 8.3 form; subdirectories are ignored.
#[derive(Debug, Clone)]
pub struct HostDriveFS {
    root: PathBuf,
}

impl HostDriveFS {
    /// Open `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> CpmResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path of an existing file with the given native name.
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let wanted = to_8_3(name);
        fs::read_dir(&self.root)
            .ok()?
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .find(|e| to_8_3(&e.file_name().to_string_lossy()) == wanted)
            .map(|e| e.path())
    }
}

impl DriveFS for HostDriveFS {
    fn read_file(&self, name: &str) -> Option<Vec<u8>> {
        fs::read(self.locate(name)?).ok()
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> CpmResult<()> {
        let path = self
            .locate(name)
            .unwrap_or_else(|| self.root.join(to_8_3(name)));
        fs::write(path, data)?;
        Ok(())
    }

    fn delete_file(&mut self, name: &str) -> bool {
        match self.locate(name) {
            Some(path) => fs::remove_file(path).is_ok(),
            None => false,
        }
    }

    fn list_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| to_8_3(&e.file_name().to_string_lossy()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn file_size(&self, name: &str) -> Option<usize> {
        let meta = fs::metadata(self.locate(name)?).ok()?;
        Some(meta.len() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_names_map_to_8_3() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path();
        let mut drive = HostDriveFS::open(dir).unwrap();
        fs::write(dir.join("readme.txt"), b"hi").unwrap();
        fs::create_dir(dir.join("subdir")).unwrap();

        assert_eq!(drive.list_files(), vec!["README.TXT".to_string()]);
        assert_eq!(drive.read_file("README.TXT"), Some(b"hi".to_vec()));
        assert_eq!(drive.file_size("readme.txt"), Some(2));

        drive.write_file("README.TXT", b"bye").unwrap();
        assert_eq!(fs::read(dir.join("readme.txt")).unwrap(), b"bye");

        drive.write_file("NEW.DAT", b"x").unwrap();
        assert!(dir.join("NEW.DAT").exists());

        assert!(drive.delete_file("new.dat"));
        assert!(!drive.exists("NEW.DAT"));
    }

    #[test]
    fn test_open_creates_missing_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("drives").join("b");
        let drive = HostDriveFS::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(drive.root(), root.as_path());
        assert!(drive.list_files().is_empty());
    }
}
