//! Expansion of input patterns into the ordered list of archive members.
//!
//! Each pattern contributes its own entry followed, for directories, by the
//! whole subtree: a directory's direct children are listed first, then each
//! child directory is expanded in turn. Metadata problems drop the affected
//! entry or subtree and the scan continues.

use std::{
    ffi::OsStr,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    entry::Entry,
    error::{Error, Result},
    fs::FilesystemOps,
};

/// Deepest directory level that is still expanded; the pattern is level 0.
pub const MAX_DEPTH: usize = 200;

/// Result of a scan: the entries found and the problems skipped over.
#[derive(Debug, Default)]
pub struct ScanState {
    entries: Vec<Entry>,
    problems: Vec<Error>,
}

impl ScanState {
    /// Entries in discovery order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Non-fatal problems, in the order they were hit.
    pub fn problems(&self) -> &[Error] {
        &self.problems
    }

    /// Hand the entries over to the writer.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    fn problem(&mut self, err: Error) {
        warn!("{err}");
        self.problems.push(err);
    }
}

/// Walks input patterns through a [`FilesystemOps`] implementation.
#[derive(Debug)]
pub struct Scanner<F> {
    fs: F,
    verbose: u8,
}

fn validate_pattern(pattern: &OsStr) -> Result<PathBuf> {
    let bytes = pattern.as_bytes();
    if bytes.is_empty() || bytes.starts_with(b"..") || bytes.starts_with(b"/") {
        return Err(Error::InvalidPattern {
            pattern: pattern.to_string_lossy().into_owned(),
        });
    }

    let trimmed = bytes.len() - bytes.iter().rev().take_while(|&&b| b == b'/').count();
    Ok(PathBuf::from(OsStr::from_bytes(&bytes[..trimmed])))
}

impl<F: FilesystemOps> Scanner<F> {
    /// Create a scanner reading from `fs`.
    pub fn new(fs: F) -> Self {
        Self { fs, verbose: 0 }
    }

    /// Set the diagnostic verbosity.
    ///
    /// Level 1 lists every entry found, level 2 also every pattern and
    /// directory visited. The entries produced do not change.
    #[must_use]
    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    /// Expand `patterns`, in order, into a flat entry list.
    pub fn scan<I>(&self, patterns: I) -> ScanState
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let mut state = ScanState::default();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let name = match validate_pattern(pattern) {
                Ok(name) => name,
                Err(err) => {
                    state.problem(err);
                    continue;
                }
            };

            if self.verbose > 1 {
                info!("scanning '{}'", name.display());
            }

            if self.add_entry(&mut state, name) {
                let index = state.entries.len() - 1;
                let root = state.entries[index].name.clone();
                self.scan_recursive(&mut state, &root, 0);
            }
        }

        state
    }

    /// Stat `name` and append it. Returns whether it is a directory.
    fn add_entry(&self, state: &mut ScanState, name: PathBuf) -> bool {
        match self.fs.lstat(&name) {
            Ok(stat) => {
                let entry = Entry::new(name, stat);
                if self.verbose > 0 {
                    info!("{entry}");
                }
                let is_dir = entry.is_dir();
                state.entries.push(entry);
                is_dir
            }
            Err(source) => {
                state.problem(Error::Stat { path: name, source });
                false
            }
        }
    }

    /// Append the direct children of `dir`. Returns the range they occupy.
    fn scan_directory(&self, state: &mut ScanState, dir: &Path) -> std::ops::Range<usize> {
        let start = state.entries.len();

        if self.verbose > 1 {
            info!("scanning directory '{}'", dir.display());
        }

        let names = match self.fs.list_directory(dir) {
            Ok(names) => names,
            Err(source) => {
                state.problem(Error::ReadDirectory {
                    path: dir.to_path_buf(),
                    source,
                });
                return start..start;
            }
        };

        for name in names {
            self.add_entry(state, dir.join(name));
        }

        start..state.entries.len()
    }

    fn scan_recursive(&self, state: &mut ScanState, dir: &Path, depth: usize) {
        if depth > MAX_DEPTH {
            state.problem(Error::TooDeeplyNested {
                path: dir.to_path_buf(),
            });
            return;
        }

        for index in self.scan_directory(state, dir) {
            if state.entries[index].is_dir() {
                let child = state.entries[index].name.clone();
                self.scan_recursive(state, &child, depth + 1);
            }
        }
    }
}
