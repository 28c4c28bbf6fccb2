//! Streaming entries into USTAR records.
//!
//! Every member is a header record, followed for regular files by
//! `ceil(size / 512)` data records with the last one zero-padded. The archive
//! ends with two zero records.

use std::io::{Read, Write};

use log::{debug, info, warn};
use ustar_header::{Header, HEADER_SIZE};

use crate::{
    entry::{Entry, EntryKind},
    error::{Error, Result},
    fs::FilesystemOps,
    header::build_header,
    identity::{IdentityCache, IdentityResolver},
    util::read_full,
};

const ZERO_RECORD: [u8; HEADER_SIZE] = [0; HEADER_SIZE];

/// Why an entry was left out of the archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The object has no USTAR typeflag.
    UnsupportedType,
}

/// What happened to one entry handed to [`ArchiveWriter::append`].
///
/// Fatal problems are returned as errors instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The header and any data went out.
    Written {
        /// Records emitted for this entry, header included.
        records: u64,
    },
    /// Nothing was written for this entry.
    Skipped(SkipReason),
}

/// Counters describing a finished archive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entries with a header in the archive.
    pub written: usize,
    /// Entries left out because of their type.
    pub skipped: usize,
    /// Patterns and entries dropped while scanning.
    pub scan_problems: usize,
    /// 512-byte records emitted, terminator included.
    pub records: u64,
}

/// Writes entries one by one to a byte sink.
#[derive(Debug)]
pub struct ArchiveWriter<W, F, R> {
    sink: W,
    fs: F,
    identities: IdentityCache<R>,
    summary: ArchiveSummary,
}

impl<W, F, R> ArchiveWriter<W, F, R>
where
    W: Write,
    F: FilesystemOps,
    R: IdentityResolver,
{
    /// Create a writer emitting into `sink`, reading file data through `fs`.
    pub fn new(sink: W, fs: F, resolver: R) -> Self {
        Self {
            sink,
            fs,
            identities: IdentityCache::new(resolver),
            summary: ArchiveSummary::default(),
        }
    }

    fn write_record(&mut self, record: &[u8; HEADER_SIZE]) -> Result<()> {
        self.sink
            .write_all(record)
            .map_err(|source| Error::SinkWrite { source })?;
        self.summary.records += 1;
        Ok(())
    }

    /// Archive one entry.
    ///
    /// # Errors
    ///
    /// Anything except an unsupported type is fatal: the archive is
    /// incomplete and must be discarded.
    pub fn append(&mut self, entry: &Entry) -> Result<EntryOutcome> {
        let header = match build_header(entry, &self.fs, &mut self.identities) {
            Ok(header) => header,
            Err(err @ Error::UnsupportedType { .. }) => {
                warn!("{err}, skipped");
                self.summary.skipped += 1;
                return Ok(EntryOutcome::Skipped(SkipReason::UnsupportedType));
            }
            Err(err) => return Err(err),
        };

        // open first so an unreadable file never leaves a dangling header
        let file = match entry.stat.kind {
            EntryKind::Regular => Some(self.fs.open(&entry.name).map_err(|source| {
                Error::Open {
                    path: entry.name.clone(),
                    source,
                }
            })?),
            _ => None,
        };

        let before = self.summary.records;
        self.write_header(&header)?;
        if let Some(mut file) = file {
            self.write_data(entry, &mut file)?;
        }

        self.summary.written += 1;
        Ok(EntryOutcome::Written {
            records: self.summary.records - before,
        })
    }

    fn write_header(&mut self, header: &Header) -> Result<()> {
        self.write_record(header.as_bytes())
    }

    fn write_data(&mut self, entry: &Entry, file: &mut impl Read) -> Result<()> {
        let size = entry.stat.size;
        let mut remaining = size;
        let mut record = [0u8; HEADER_SIZE];

        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(HEADER_SIZE, |r| r.min(HEADER_SIZE));
            let got = read_full(file, &mut record[..want]).map_err(|source| Error::Read {
                path: entry.name.clone(),
                source,
            })?;
            if got < want {
                return Err(Error::FileShrunk {
                    path: entry.name.clone(),
                    expected: size,
                    actual: size - remaining + got as u64,
                });
            }

            record[want..].fill(0);
            self.write_record(&record)?;
            remaining -= want as u64;
        }

        match read_full(file, &mut [0u8; 1]) {
            Ok(0) => {}
            Ok(_) => info!(
                "note: {} has grown; only {size} bytes archived",
                entry.name.display()
            ),
            Err(err) => debug!("{}: probing past end: {err}", entry.name.display()),
        }

        Ok(())
    }

    /// The counters so far.
    pub fn summary(&self) -> ArchiveSummary {
        self.summary
    }

    /// Write the end-of-archive marker and flush the sink.
    pub fn finish(mut self) -> Result<ArchiveSummary> {
        self.write_record(&ZERO_RECORD)?;
        self.write_record(&ZERO_RECORD)?;
        self.sink
            .flush()
            .map_err(|source| Error::SinkWrite { source })?;
        Ok(self.summary)
    }
}

/// Write `entries`, in order, as a complete archive.
///
/// The entries are consumed whether or not this succeeds. On error nothing
/// after the failing entry is written, including the terminator.
pub fn write_archive<W, F, R>(
    sink: W,
    entries: Vec<Entry>,
    fs: F,
    resolver: R,
) -> Result<ArchiveSummary>
where
    W: Write,
    F: FilesystemOps,
    R: IdentityResolver,
{
    let mut writer = ArchiveWriter::new(sink, fs, resolver);
    for entry in &entries {
        writer.append(entry)?;
    }
    writer.finish()
}
