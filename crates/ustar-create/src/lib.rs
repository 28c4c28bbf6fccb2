//! Create USTAR tar archives from files on disk.
//!
//! Archive creation runs in two phases. [`scan::Scanner`] expands the input
//! patterns into an ordered list of [`entry::Entry`] values, dropping what
//! it cannot stat. [`writer::ArchiveWriter`] then turns every entry into a
//! header record plus, for regular files, the file data, and ends the
//! archive with two zero records.
//!
//! ```no_run
//! use ustar_create::{create_archive, sink::OutputSink, CreateOptions};
//!
//! let sink = OutputSink::create("out.tar")?;
//! let summary = create_archive(["src"], sink, &CreateOptions::default())?;
//! println!("{} members", summary.written);
//! # Ok::<(), ustar_create::error::Error>(())
//! ```

pub mod entry;
pub mod error;
pub mod fs;
pub mod header;
pub mod identity;
pub mod scan;
pub mod sink;
pub mod util;
pub mod writer;


use std::ffi::OsStr;

use log::{debug, error};

use crate::{
    error::Result,
    fs::{FilesystemOps, HostFilesystem},
    identity::{IdentityResolver, SystemIdentity},
    scan::{ScanState, Scanner},
    sink::OutputSink,
    writer::write_archive,
};

pub use crate::writer::ArchiveSummary;

/// Settings for one archive.
#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    /// Diagnostic verbosity; see [`Scanner::verbose`].
    pub verbose: u8,
}

/// Archive `patterns`, relative to the current directory, into `sink`.
///
/// # Errors
///
/// Any fatal error from the write phase. The sink is discarded in that case,
/// which removes an output file this call created.
pub fn create_archive<I>(
    patterns: I,
    sink: OutputSink<'_>,
    options: &CreateOptions,
) -> Result<ArchiveSummary>
where
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    create_archive_with(HostFilesystem::new(), SystemIdentity, patterns, sink, options)
}

/// Like [`create_archive`], with an explicit filesystem and identity source.
///
/// The sink already exists while the patterns are scanned. When the output
/// file may lie inside an archived directory, call [`scan_patterns`] first
/// and create the sink for [`write_scanned`] afterwards.
pub fn create_archive_with<F, R, I>(
    fs: F,
    resolver: R,
    patterns: I,
    sink: OutputSink<'_>,
    options: &CreateOptions,
) -> Result<ArchiveSummary>
where
    F: FilesystemOps,
    R: IdentityResolver,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let state = scan_patterns(&fs, patterns, options);
    write_scanned(&fs, resolver, state, sink)
}

/// Expand `patterns` into the list of entries to archive.
///
/// Problems with individual patterns or directories are logged and kept in
/// the returned [`ScanState`]; they never stop the scan.
pub fn scan_patterns<F, I>(fs: F, patterns: I, options: &CreateOptions) -> ScanState
where
    F: FilesystemOps,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    Scanner::new(fs).verbose(options.verbose).scan(patterns)
}

/// Write the entries of a finished scan to `sink` and close it.
///
/// # Errors
///
/// Any fatal error from writing or closing. The sink is discarded in that
/// case, which removes an output file it owns.
pub fn write_scanned<F, R>(
    fs: F,
    resolver: R,
    state: ScanState,
    mut sink: OutputSink<'_>,
) -> Result<ArchiveSummary>
where
    F: FilesystemOps,
    R: IdentityResolver,
{
    let scan_problems = state.problems().len();

    match write_archive(&mut sink, state.into_entries(), &fs, resolver) {
        Ok(mut summary) => {
            summary.scan_problems = scan_problems;
            let name = sink.name().to_owned();
            if let Err(err) = sink.close() {
                error!("creating tarball {name} failed: {err}");
                return Err(err);
            }
            debug!("{summary:?}");
            Ok(summary)
        }
        Err(err) => {
            error!("creating tarball {} failed: {err}", sink.name());
            sink.discard();
            Err(err)
        }
    }
}
