//! Error types for archive creation.
//!
//! Problems found while scanning (bad patterns, unreadable entries, the
//! nesting limit) are recorded in the [`ScanState`](crate::scan::ScanState)
//! and the scan carries on. Problems found while writing abort the archive,
//! because a record stream cannot be repaired once a bad record is out.
//! [`Error::UnsupportedType`] is the one write-phase error that only skips
//! the entry; the writer reports it as
//! [`EntryOutcome::Skipped`](crate::writer::EntryOutcome::Skipped).

use std::{io, path::PathBuf};

use ustar_header::HeaderError;

/// Result type alias for archive creation.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while creating an archive.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input pattern is empty, absolute or starts with `..`.
    #[error("skipping invalid name {pattern:?}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
    },

    /// Metadata for an entry could not be read.
    #[error("error stat-ing {}: {source}", .path.display())]
    Stat {
        /// The entry that was dropped.
        path: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// A directory could not be listed.
    #[error("error reading directory {}: {source}", .path.display())]
    ReadDirectory {
        /// The directory whose subtree was skipped.
        path: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// The nesting limit was reached below this directory.
    #[error("directories too deeply nested at {}", .path.display())]
    TooDeeplyNested {
        /// The directory that was not expanded.
        path: PathBuf,
    },

    /// The member name cannot be split over the prefix and name fields.
    #[error("error storing file {}: name too long", .path.display())]
    NameTooLong {
        /// The offending entry.
        path: PathBuf,
    },

    /// A numeric field cannot hold the value, not even in base-256.
    #[error("error storing file {}: {field}: {source}", .path.display())]
    FieldOverflow {
        /// The offending entry.
        path: PathBuf,
        /// The header field.
        field: &'static str,
        /// The codec error.
        source: HeaderError,
    },

    /// The entry is a socket or other object with no USTAR typeflag.
    #[error("unsupported file type for {}", .path.display())]
    UnsupportedType {
        /// The skipped entry.
        path: PathBuf,
    },

    /// The target of a symbolic link could not be read.
    #[error("error reading symlink {}: {source}", .path.display())]
    ReadLink {
        /// The symbolic link.
        path: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// A regular file could not be opened for reading.
    #[error("can't open {}: {source}", .path.display())]
    Open {
        /// The file.
        path: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// A regular file ended before its recorded size.
    #[error(
        "error reading file {}: got {actual} of {expected} bytes (file shrunk?)",
        .path.display()
    )]
    FileShrunk {
        /// The file.
        path: PathBuf,
        /// Size recorded at scan time.
        expected: u64,
        /// Bytes actually available.
        actual: u64,
    },

    /// Reading a regular file failed.
    #[error("error reading file {}: {source}", .path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// The output file could not be created.
    #[error("can't create {}: {source}", .path.display())]
    SinkCreate {
        /// The output path.
        path: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// Writing to the output failed.
    #[error("error writing archive: {source}")]
    SinkWrite {
        /// The underlying OS error.
        source: io::Error,
    },

    /// Flushing or closing the output failed.
    #[error("error closing {target}: {source}")]
    SinkClose {
        /// Display name of the output.
        target: String,
        /// The underlying OS error.
        source: io::Error,
    },
}
