//! Where the archive bytes go.

use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::warn;

use crate::error::{Error, Result};

enum SinkKind<'a> {
    /// A file created for this archive; removed again on failure.
    Owned { path: PathBuf, file: BufWriter<File> },
    /// A stream the caller keeps ownership of, such as standard output.
    Borrowed(&'a mut dyn Write),
}

/// The output of one archive.
///
/// Either a freshly created file, which this sink owns and deletes if the
/// archive cannot be completed, or a borrowed stream, which is only ever
/// flushed.
pub struct OutputSink<'a> {
    name: String,
    kind: SinkKind<'a>,
}

impl<'a> OutputSink<'a> {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::SinkCreate {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            name: path.display().to_string(),
            kind: SinkKind::Owned {
                path: path.to_path_buf(),
                file: BufWriter::new(file),
            },
        })
    }

    /// Write to a stream owned by someone else, e.g. `("[stdout]", &mut stdout)`.
    pub fn borrowed(name: impl Into<String>, writer: &'a mut dyn Write) -> Self {
        Self {
            name: name.into(),
            kind: SinkKind::Borrowed(writer),
        }
    }

    /// Name of the target, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this sink created its target.
    pub fn is_owned(&self) -> bool {
        matches!(self.kind, SinkKind::Owned { .. })
    }

    /// Flush and close a completed archive.
    ///
    /// If an owned file cannot be flushed to disk it is removed.
    pub fn close(self) -> Result<()> {
        let name = self.name;
        match self.kind {
            SinkKind::Owned { path, file } => {
                let result = file
                    .into_inner()
                    .map_err(io::IntoInnerError::into_error)
                    .and_then(|file| file.sync_all());
                if let Err(source) = result {
                    remove_output(&path);
                    return Err(Error::SinkClose {
                        target: name,
                        source,
                    });
                }
                Ok(())
            }
            SinkKind::Borrowed(writer) => writer.flush().map_err(|source| Error::SinkClose {
                target: name,
                source,
            }),
        }
    }

    /// Give up on an incomplete archive.
    ///
    /// An owned file is closed and removed, unflushed data is dropped. A
    /// borrowed stream is flushed and left alone.
    pub fn discard(self) {
        match self.kind {
            SinkKind::Owned { path, file } => {
                let (file, _) = file.into_parts();
                drop(file);
                remove_output(&path);
            }
            SinkKind::Borrowed(writer) => {
                if let Err(err) = writer.flush() {
                    warn!("error flushing {}: {err}", self.name);
                }
            }
        }
    }
}

fn remove_output(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!("error removing {}: {err}", path.display());
    }
}

impl Write for OutputSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.kind {
            SinkKind::Owned { file, .. } => file.write(buf),
            SinkKind::Borrowed(writer) => writer.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match &mut self.kind {
            SinkKind::Owned { file, .. } => file.write_all(buf),
            SinkKind::Borrowed(writer) => writer.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.kind {
            SinkKind::Owned { file, .. } => file.flush(),
            SinkKind::Borrowed(writer) => writer.flush(),
        }
    }
}

impl fmt::Debug for OutputSink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("name", &self.name)
            .field("owned", &self.is_owned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_owned_close() -> anyhow::Result<()> {
        let td = tempfile::tempdir()?;
        let path = td.path().join("out.tar");

        let mut sink = OutputSink::create(&path)?;
        assert!(sink.is_owned());
        assert_eq!(sink.name(), path.display().to_string());
        sink.write_all(b"records")?;
        sink.close()?;

        assert_eq!(std::fs::read(&path)?, b"records");
        Ok(())
    }

    #[test]
    fn test_owned_discard_removes() -> anyhow::Result<()> {
        let td = tempfile::tempdir()?;
        let path = td.path().join("out.tar");

        let mut sink = OutputSink::create(&path)?;
        sink.write_all(&[0u8; 10000])?;
        assert!(path.exists());
        sink.discard();
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_create_failure() {
        let td = tempfile::tempdir().unwrap();
        let err = OutputSink::create(td.path().join("missing/out.tar")).unwrap_err();
        assert!(matches!(err, Error::SinkCreate { .. }));
    }

    #[test]
    fn test_borrowed_is_kept() {
        let mut out = vec![];
        {
            let mut sink = OutputSink::borrowed("[stdout]", &mut out);
            assert!(!sink.is_owned());
            assert_eq!(sink.name(), "[stdout]");
            sink.write_all(b"partial").unwrap();
            sink.discard();
        }
        assert_eq!(out, b"partial");
    }
}
