//! DIR listings.

use fatfs::{DateTime, FileAttributes};

use crate::error::{FsError, FsResult};
use crate::path::{is_fat_path, split_path, wildcard_match, FatPath, NativeName};
use crate::volume::Volumes;

use super::{finish, Session};

/// Render one FAT directory line.
pub fn dir_line(name: &str, modified: &DateTime, attributes: FileAttributes, size: u64) -> String {
    let size = if attributes.contains(FileAttributes::DIRECTORY) {
        "  <dir>     ".to_string()
    } else {
        format!("{:>12}", size)
    };
    format!(
        "\n{:02}/{:02}/{:04}  {:02}:{:02}:{:02}  {}  {}  {}",
        modified.date.month,
        modified.date.day,
        modified.date.year,
        modified.time.hour,
        modified.time.min,
        modified.time.sec,
        size,
        attribute_flags(attributes),
        name
    )
}

/// `RHSA`, with `-` for each attribute not set.
fn attribute_flags(attributes: FileAttributes) -> String {
    [
        (FileAttributes::READ_ONLY, 'R'),
        (FileAttributes::HIDDEN, 'H'),
        (FileAttributes::SYSTEM, 'S'),
        (FileAttributes::ARCHIVE, 'A'),
    ]
    .iter()
    .map(|&(flag, c)| if attributes.contains(flag) { c } else { '-' })
    .collect()
}

impl Session {
    /// List the files matching `path`. Returns the number of entries shown.
    pub fn dir(&self, path: &str) -> FsResult<usize> {
        if is_fat_path(path) {
            self.dir_fat(path)
        } else {
            self.dir_native(path)
        }
    }

    fn dir_fat(&self, path: &str) -> FsResult<usize> {
        let mut volumes = self.volumes();
        let result = self.list_fat(&mut volumes, path);
        finish(volumes, result)
    }

    fn list_fat(&self, volumes: &mut Volumes, path: &str) -> FsResult<usize> {
        let (folder, spec) = split_path(path);
        let spec = if spec.is_empty() { "*" } else { spec };

        let fat = self.mount(volumes, path)?;
        let dir = volumes
            .get(fat.unit())?
            .dir(FatPath::parse(folder)?.relative())?;

        self.console.print(&format!("\nDirectory of {}\n", folder));
        let mut shown = 0;
        for entry in dir.iter() {
            let entry = entry?;
            let name = entry.file_name();
            if name == "." || name == ".." || !wildcard_match(spec, &name) {
                continue;
            }
            self.console.print(&dir_line(
                &name,
                &entry.modified(),
                entry.attributes(),
                entry.len(),
            ));
            shown += 1;
        }
        Ok(shown)
    }

    fn dir_native(&self, path: &str) -> FsResult<usize> {
        let (folder, spec) = split_path(path);
        let pattern = if spec.is_empty() {
            format!("{}*.*", folder)
        } else {
            path.to_string()
        };
        let template = NativeName::parse(&pattern)?;

        self.console.print(&format!("\nDirectory of {}\n", folder));
        let shown = self.for_each_native(&template, |entry| {
            self.console.print(&format!("\n{}", entry.filename()));
            Ok(())
        })?;
        if shown == 0 {
            return Err(FsError::NoFile);
        }
        Ok(shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatfs::{Date, Time};

    fn stamp() -> DateTime {
        DateTime {
            date: Date {
                year: 2019,
                month: 5,
                day: 2,
            },
            time: Time {
                hour: 13,
                min: 7,
                sec: 58,
                millis: 0,
            },
        }
    }

    #[test]
    fn test_file_line() {
        let line = dir_line("README.TXT", &stamp(), FileAttributes::ARCHIVE, 1234);
        assert_eq!(line, "\n05/02/2019  13:07:58          1234  ---A  README.TXT");
    }

    #[test]
    fn test_directory_line() {
        let attrs = FileAttributes::DIRECTORY | FileAttributes::READ_ONLY;
        let line = dir_line("SUB", &stamp(), attrs, 0);
        assert_eq!(line, "\n05/02/2019  13:07:58    <dir>       R---  SUB");
    }
}
