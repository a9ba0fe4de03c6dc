//! Native drive contents seeded from ZIP archives.
//!
//! Every file in the archive lands on the drive under its 8.3 name; folder
//! structure inside the archive is dropped. An optional `manifest.mf` JSON
//! file can rename entries on the way in.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::{CpmError, CpmResult};
use crate::fs::{to_8_3, MemoryDriveFS};

const MANIFEST: &str = "MANIFEST.MF";

/// Rename rule in an archive manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub src: String,
    #[serde(default)]
    pub dst: Option<String>,
}

/// Archive manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub files: Vec<ArchiveEntry>,
}

impl ArchiveManifest {
    /// Drive name for an archive member, after any rename.
    fn target(&self, member: &str) -> String {
        let base = base_name(member);
        let rule = self
            .files
            .iter()
            .find(|e| e.src.eq_ignore_ascii_case(member) || e.src.eq_ignore_ascii_case(base));
        match rule.and_then(|e| e.dst.as_deref()) {
            Some(dst) => to_8_3(dst),
            None => to_8_3(base),
        }
    }
}

fn base_name(member: &str) -> &str {
    member.rsplit('/').next().unwrap_or(member)
}

/// Build a drive from ZIP data.
pub fn load_archive<R: Read + Seek>(reader: R) -> CpmResult<MemoryDriveFS> {
    let mut archive = ZipArchive::new(reader)?;
    let mut members: Vec<(String, Vec<u8>)> = Vec::new();
    let mut manifest = ArchiveManifest::default();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if name.starts_with("__MACOSX/") {
            continue;
        }

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;

        if base_name(&name).eq_ignore_ascii_case(MANIFEST) {
            manifest = serde_json::from_slice(&content)?;
        } else {
            members.push((name, content));
        }
    }

    let mut files: HashMap<String, Vec<u8>> = HashMap::new();
    for (member, content) in members {
        let target = manifest.target(&member);
        if files.insert(target.clone(), content).is_some() {
            log::warn!("archive member {} replaces an earlier {}", member, target);
        }
    }

    if let Some(name) = &manifest.name {
        log::debug!("loaded archive '{}' with {} files", name, files.len());
    }
    Ok(MemoryDriveFS::with_files(files))
}

/// Build a drive from a ZIP file on disk.
pub fn load_archive_from_path(path: &Path) -> CpmResult<MemoryDriveFS> {
    let file = std::fs::File::open(path).map_err(|e| {
        CpmError::Config(format!("cannot open archive {}: {}", path.display(), e))
    })?;
    load_archive(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DriveFS;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_of(entries: &[(&str, &[u8])]) -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn test_members_flattened_to_8_3() {
        let data = zip_of(&[("tools/pip.com", b"PIP"), ("readme.text", b"hi")]);
        let drive = load_archive(data).unwrap();
        assert_eq!(drive.read_file("PIP.COM"), Some(b"PIP".to_vec()));
        assert_eq!(drive.read_file("README.TEX"), Some(b"hi".to_vec()));
        assert_eq!(drive.len(), 2);
    }

    #[test]
    fn test_manifest_renames() {
        let manifest = br#"{ "name": "tools", "files": [{ "src": "long-name.bin", "dst": "SHORT.BIN" }] }"#;
        let data = zip_of(&[("manifest.mf", manifest), ("long-name.bin", b"x")]);
        let drive = load_archive(data).unwrap();
        assert!(drive.exists("SHORT.BIN"));
        assert!(!drive.exists("MANIFEST.MF"));
    }

    #[test]
    fn test_bad_manifest_is_an_error() {
        let data = zip_of(&[("manifest.mf", b"{ not json")]);
        assert!(matches!(load_archive(data), Err(CpmError::Json(_))));
    }
}
