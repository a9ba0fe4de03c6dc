//! DEL, REN and MD.

use crate::error::{FsError, FsResult};
use crate::path::{is_fat_path, is_wild, split_path, wildcard_match, FatPath, NativeName};
use crate::volume::{FatDir, Volumes};

use super::{finish, Session};

/// Names in `dir` matching `spec`, collected before anything changes.
fn matching_names(dir: &FatDir<'_>, spec: &str, files_only: bool) -> FsResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in dir.iter() {
        let entry = entry?;
        let name = entry.file_name();
        if name == "." || name == ".." || (files_only && entry.is_dir()) {
            continue;
        }
        if wildcard_match(spec, &name) {
            names.push(name);
        }
    }
    Ok(names)
}

impl Session {
    /// Delete the files matching `path`.
    ///
    /// Native deletes always report success. FAT deletes report the
    /// library's result; wildcards never remove directories.
    pub fn delete(&self, path: &str) -> FsResult<()> {
        if !is_fat_path(path) {
            let name = NativeName::parse(path)?;
            self.native.delete(&name)?;
            self.console.print(&format!("\nDeleted {}", path));
            return Ok(());
        }

        let mut volumes = self.volumes();
        let result = self.delete_fat(&mut volumes, path);
        finish(volumes, result)
    }

    fn delete_fat(&self, volumes: &mut Volumes, path: &str) -> FsResult<()> {
        let (folder, spec) = split_path(path);
        if spec.is_empty() {
            return Err(FsError::InvalidParameter);
        }
        let fat = self.mount(volumes, path)?;
        let dir = volumes
            .get(fat.unit())?
            .dir(FatPath::parse(folder)?.relative())?;

        if !is_wild(spec) {
            dir.remove(spec)?;
            self.console.print(&format!("\nDeleted {}", path));
            return Ok(());
        }

        let names = matching_names(&dir, spec, true)?;
        if names.is_empty() {
            return Err(FsError::NoFile);
        }
        for name in &names {
            dir.remove(name)?;
            self.console.print(&format!("\nDeleted {}{}", folder, name));
        }
        self.console.print(&format!("\n\n    {} File(s) Deleted", names.len()));
        Ok(())
    }

    /// Rename files on one FAT unit. Returns the number renamed.
    ///
    /// The destination follows the copy naming rule: an explicit filename
    /// is used as is, otherwise each file keeps its name in the destination
    /// directory.
    pub fn rename(&self, from: &str, to: &str) -> FsResult<usize> {
        if !is_fat_path(from) || !is_fat_path(to) {
            return Err(FsError::InvalidParameter);
        }
        let (_, from_spec) = split_path(from);
        let (_, to_spec) = split_path(to);
        if from_spec.is_empty() || is_wild(to_spec) {
            return Err(FsError::InvalidParameter);
        }
        if is_wild(from_spec) && !to_spec.is_empty() {
            return Err(FsError::InvalidParameter);
        }
        if FatPath::parse(from)?.unit() != FatPath::parse(to)?.unit() {
            return Err(FsError::InvalidDrive);
        }

        let mut volumes = self.volumes();
        let result = self.rename_fat(&mut volumes, from, to);
        finish(volumes, result)
    }

    fn rename_fat(&self, volumes: &mut Volumes, from: &str, to: &str) -> FsResult<usize> {
        let (from_folder, from_spec) = split_path(from);
        let (to_folder, to_spec) = split_path(to);

        let fat = self.mount(volumes, from)?;
        let volume = volumes.get(fat.unit())?;
        let src_dir = volume.dir(FatPath::parse(from_folder)?.relative())?;
        let dst_dir = volume.dir(FatPath::parse(to_folder)?.relative())?;

        let names = if is_wild(from_spec) {
            matching_names(&src_dir, from_spec, false)?
        } else {
            vec![from_spec.to_string()]
        };
        if names.is_empty() {
            return Err(FsError::NoFile);
        }

        for name in &names {
            let target = if to_spec.is_empty() { name.as_str() } else { to_spec };
            self.console.print(&format!(
                "\n{}{} ==> {}{}",
                from_folder, name, to_folder, target
            ));
            src_dir.rename(name, &dst_dir, target)?;
        }
        if names.len() > 1 {
            self.console.print(&format!("\n\n    {} File(s) Renamed", names.len()));
        }
        Ok(names.len())
    }

    /// Create a directory on a FAT unit.
    pub fn make_dir(&self, path: &str) -> FsResult<()> {
        if !is_fat_path(path) {
            return Err(FsError::InvalidParameter);
        }
        let mut volumes = self.volumes();
        let result = self.make_dir_fat(&mut volumes, path);
        finish(volumes, result)
    }

    fn make_dir_fat(&self, volumes: &mut Volumes, path: &str) -> FsResult<()> {
        let fat = self.mount(volumes, path)?;
        let rel = fat.relative();
        if rel.is_empty() || is_wild(rel) {
            return Err(FsError::InvalidName);
        }
        let volume = volumes.get(fat.unit())?;
        if volume.exists(rel) || volume.dir(rel).is_ok() {
            return Err(FsError::Exists);
        }
        volume.root().create_dir(rel)?;
        Ok(())
    }
}
