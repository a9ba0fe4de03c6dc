//! COPY between any combination of native and FAT paths.

use crate::bdos::{CTRL_Z, RECORD_SIZE};
use crate::error::{FsError, FsResult};
use crate::file::{OpenMode, UnifiedFile};
use crate::path::{is_fat_path, is_wild, split_path, wildcard_match, FatPath, PathReference};
use crate::volume::Volumes;

use super::{finish, Session};

/// Result of copying one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// The destination existed and the user kept it.
    Skipped,
}

impl Session {
    /// Copy every file matching `src` to `dst`. Returns the number of files
    /// copied.
    ///
    /// An explicit destination filename receives every match, so it may
    /// only be combined with a source naming a single file.
    pub fn copy(&self, src: &str, dst: &str) -> FsResult<usize> {
        let (_, src_spec) = split_path(src);
        let (_, dst_spec) = split_path(dst);
        if src_spec.is_empty() || is_wild(dst_spec) {
            return Err(FsError::InvalidParameter);
        }
        if is_wild(src_spec) && !dst_spec.is_empty() {
            return Err(FsError::InvalidParameter);
        }

        let mut volumes = self.volumes();
        let result = self.copy_all(&mut volumes, src, dst);
        let copied = finish(volumes, result)?;

        self.console.print(&format!("\n\n    {} File(s) Copied", copied));
        Ok(copied)
    }

    fn copy_all(&self, volumes: &mut Volumes, src: &str, dst: &str) -> FsResult<usize> {
        let (src_dir, src_spec) = split_path(src);
        let (dst_dir, dst_spec) = split_path(dst);
        let source = PathReference::parse(src)?;
        if let PathReference::Fat(path) = &source {
            volumes.mount(path.unit())?;
        }
        if is_fat_path(dst) {
            self.mount(volumes, dst)?;
        }
        let volumes = &*volumes;

        let target = |name: &str| {
            let file = if dst_spec.is_empty() { name } else { dst_spec };
            format!("{}{}", dst_dir, file)
        };

        let mut matched = 0;
        let mut copied = 0;
        let mut tally = |outcome: CopyOutcome| {
            matched += 1;
            if outcome == CopyOutcome::Copied {
                copied += 1;
            }
        };

        match &source {
            PathReference::Fat(_) => {
                let folder = FatPath::parse(src_dir)?;
                let dir = volumes.get(folder.unit())?.dir(folder.relative())?;
                for entry in dir.iter() {
                    let entry = entry?;
                    let name = entry.file_name();
                    if entry.is_dir() || name == "." || name == ".." {
                        continue;
                    }
                    if !wildcard_match(src_spec, &name) {
                        continue;
                    }
                    let from = format!("{}{}", src_dir, name);
                    tally(self.copy_file(volumes, &from, &target(&name))?);
                }
            }
            PathReference::Native(template) => {
                self.for_each_native(template, |entry| {
                    let to = target(&entry.filename());
                    tally(self.copy_file(volumes, &entry.to_string(), &to)?);
                    Ok(())
                })?;
            }
        }

        if matched == 0 {
            return Err(FsError::NoFile);
        }
        Ok(copied)
    }

    /// Copy one file, asking before an existing destination is replaced.
    /// A file cannot be copied onto itself.
    pub fn copy_file(&self, volumes: &Volumes, src: &str, dst: &str) -> FsResult<CopyOutcome> {
        self.console.print(&format!("\n{} ==> {}", src, dst));

        let from = PathReference::parse(src)?;
        let to = PathReference::parse(dst)?;
        // Replacing a file with itself would delete it before it is read.
        if from == to {
            return Err(FsError::InvalidParameter);
        }

        let mut source = UnifiedFile::open(&from, OpenMode::Read, &self.native, volumes)?;

        if self.destination_exists(volumes, &to)? {
            if !self.console.confirm(" Overwrite (Y/N)? ") {
                self.console.print(" Skipped");
                return Ok(CopyOutcome::Skipped);
            }
            // Native files cannot be created over an existing one; FAT
            // files are truncated on open.
            if let PathReference::Native(name) = &to {
                self.native.delete(name)?;
            }
        }

        let mut dest = UnifiedFile::open(&to, OpenMode::Write, &self.native, volumes)?;
        let transferred = transfer(&mut source, &mut dest);

        let closed = dest.close();
        if let Err(e) = source.close() {
            log::debug!("closing {}: {}", src, e);
        }
        transferred?;
        closed?;
        Ok(CopyOutcome::Copied)
    }

    fn destination_exists(&self, volumes: &Volumes, path: &PathReference) -> FsResult<bool> {
        match path {
            PathReference::Native(name) => self.native.exists(name),
            PathReference::Fat(fat) => Ok(volumes.get(fat.unit())?.exists(fat.relative())),
        }
    }
}

/// Move records from `source` to `dest` until a short read.
///
/// Chunks start out filled with end-of-file markers. Native destinations
/// take whole records; FAT destinations take exactly the bytes read.
fn transfer(source: &mut UnifiedFile<'_>, dest: &mut UnifiedFile<'_>) -> FsResult<()> {
    let mut buf = [CTRL_Z; RECORD_SIZE];
    loop {
        buf.fill(CTRL_Z);
        let n = source.read(&mut buf)?;
        if n > 0 {
            let chunk = if dest.is_native() { &buf[..] } else { &buf[..n] };
            if dest.write(chunk)? < chunk.len() {
                return Err(FsError::Disk);
            }
        }
        if n < RECORD_SIZE {
            return Ok(());
        }
    }
}
