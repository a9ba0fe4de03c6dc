//! Native directory enumeration in bounded batches.
//!
//! The native search keeps a single cursor and reports each match in the
//! shared transfer buffer; opening, creating, closing or deleting a file
//! loses the cursor. Matches are therefore captured in batches with no
//! other file activity in between, processed, and the search is started
//! again, skipping everything already handled.

use crate::error::FsResult;
use crate::path::NativeName;

use super::Session;

/// Entries captured per search cycle.
pub const BATCH_SIZE: usize = 32;

/// Names captured from one search cycle.
#[derive(Debug, Default)]
pub struct DirectoryBatch {
    entries: Vec<NativeName>,
    exhausted: bool,
}

impl DirectoryBatch {
    fn push(&mut self, entry: NativeName) {
        self.entries.push(entry);
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= BATCH_SIZE
    }

    /// True when the search reported no further matches.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NativeName> {
        self.entries.iter()
    }
}

impl Session {
    /// Capture up to `BATCH_SIZE` matches of `template`, skipping the first
    /// `skip` of them.
    pub fn native_batch(&self, template: &NativeName, skip: usize) -> FsResult<DirectoryBatch> {
        let slot = self.native.arena().acquire()?;
        let mut batch = DirectoryBatch::default();

        let mut found = self.native.search_first(&slot, template);
        for _ in 0..skip {
            if found.is_none() {
                break;
            }
            found = self.native.search_next(&slot, template.drive);
        }

        loop {
            let Some(entry) = found else {
                batch.exhausted = true;
                break;
            };
            batch.push(entry);
            if batch.is_full() {
                break;
            }
            found = self.native.search_next(&slot, template.drive);
        }
        Ok(batch)
    }

    /// Visit every native file matching `template`, in directory order.
    /// Returns the number of entries visited.
    pub fn for_each_native<F>(&self, template: &NativeName, mut visit: F) -> FsResult<usize>
    where
        F: FnMut(&NativeName) -> FsResult<()>,
    {
        let mut processed = 0;
        let mut cycle = 0;
        loop {
            let batch = self.native_batch(template, processed)?;
            cycle += 1;
            log::debug!(
                "search cycle {} for {}: {} entries",
                cycle,
                template,
                batch.len()
            );

            for entry in batch.iter() {
                visit(entry)?;
                processed += 1;
            }
            if batch.is_exhausted() {
                return Ok(processed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bdos::BdosFunction;
    use crate::bridge::Bridge;
    use crate::console::HeadlessConsole;
    use crate::fs::MemoryDriveFS;
    use crate::identity::HardwareIdentity;
    use crate::machine::{Machine, NativeDrive};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session_with(count: usize) -> (Session, Rc<RefCell<Machine<HeadlessConsole>>>) {
        let mut machine = Machine::new(HeadlessConsole::new(), HardwareIdentity::Hbios);
        let fs = MemoryDriveFS::with_files((0..count).map(|i| (format!("F{:03}.DAT", i), vec![i as u8])));
        machine.mount(0, NativeDrive::new(fs).with_max_entries(256));
        let machine = machine.into_shared();
        (Session::new(Bridge::from(machine.clone())), machine)
    }

    #[test]
    fn test_batch_is_bounded() {
        let (session, _machine) = session_with(40);
        let template = NativeName::parse("A:*.DAT").unwrap();

        let first = session.native_batch(&template, 0).unwrap();
        assert_eq!(first.len(), BATCH_SIZE);
        assert!(!first.is_exhausted());

        let second = session.native_batch(&template, 32).unwrap();
        assert_eq!(second.len(), 8);
        assert!(second.is_exhausted());
        assert_eq!(second.iter().next().unwrap().filename(), "F032.DAT");
    }

    #[test]
    fn test_walk_survives_file_activity() {
        let (session, machine) = session_with(70);
        let template = NativeName::parse("A:*.DAT").unwrap();
        let mut seen = Vec::new();

        let visited = session
            .for_each_native(&template, |entry| {
                // Opening a file loses the search cursor.
                let file = session
                    .native()
                    .open(entry, crate::file::OpenMode::Read)?;
                file.close()?;
                seen.push(entry.filename());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, 70);
        let expected: Vec<String> = (0..70).map(|i| format!("F{:03}.DAT", i)).collect();
        assert_eq!(seen, expected);
        assert_eq!(machine.borrow().call_count(BdosFunction::SearchFirst), 3);
    }

    #[test]
    fn test_no_matches() {
        let (session, _machine) = session_with(3);
        let template = NativeName::parse("A:*.TXT").unwrap();
        assert_eq!(session.for_each_native(&template, |_| Ok(())).unwrap(), 0);
    }
}
