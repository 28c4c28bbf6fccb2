//! Access to the filesystem being archived.
//!
//! The scanner and the writer never touch the host directly: everything
//! goes through [`FilesystemOps`], so the same code runs against the real
//! filesystem ([`HostFilesystem`]) and the in-memory tree used in tests.

use std::{
    ffi::{OsStr, OsString},
    fs::File,
    io::{self, Read},
    os::unix::ffi::OsStrExt,
    path::Path,
};

use rustix::{
    fd::{AsFd, BorrowedFd, OwnedFd},
    fs::{major, minor, openat, readlinkat, statat, AtFlags, Dir, FileType, Mode, OFlags, CWD},
};

use crate::entry::{ustar_mode, EntryKind, Stat};

/// The filesystem operations archive creation depends on.
///
/// All paths are relative to the implementation's root. Symbolic links are
/// never followed.
pub trait FilesystemOps {
    /// Handle returned by [`FilesystemOps::open`].
    type File: Read;

    /// Read the metadata of `path` itself, not of what it may point to.
    fn lstat(&self, path: &Path) -> io::Result<Stat>;

    /// List the names in a directory, without `.` and `..`.
    ///
    /// The order is whatever the filesystem yields.
    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Read the target of a symbolic link.
    fn read_link(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Open a regular file for reading.
    fn open(&self, path: &Path) -> io::Result<Self::File>;
}

impl<T: FilesystemOps + ?Sized> FilesystemOps for &T {
    type File = T::File;

    fn lstat(&self, path: &Path) -> io::Result<Stat> {
        (**self).lstat(path)
    }

    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>> {
        (**self).list_directory(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read_link(path)
    }

    fn open(&self, path: &Path) -> io::Result<Self::File> {
        (**self).open(path)
    }
}

/// The host filesystem, seen from a fixed directory.
#[derive(Debug, Default)]
pub struct HostFilesystem {
    root: Option<OwnedFd>,
}

impl HostFilesystem {
    /// Resolve relative paths against the current working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `path`.
    ///
    /// The directory is opened once, so a later `chdir` has no effect.
    pub fn open_dir(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = openat(
            CWD,
            path.as_ref(),
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
            Mode::empty(),
        )?;
        Ok(Self { root: Some(fd) })
    }

    fn dirfd(&self) -> BorrowedFd<'_> {
        self.root.as_ref().map_or(CWD, |fd| fd.as_fd())
    }
}

fn host_stat(buf: &rustix::fs::Stat) -> Stat {
    let kind = EntryKind::from(FileType::from_raw_mode(buf.st_mode));
    let device = match kind {
        EntryKind::CharDevice | EntryKind::BlockDevice => {
            Some((major(buf.st_rdev), minor(buf.st_rdev)))
        }
        _ => None,
    };

    Stat {
        kind,
        mode: ustar_mode(Mode::from_raw_mode(buf.st_mode)),
        uid: u64::from(buf.st_uid),
        gid: u64::from(buf.st_gid),
        size: u64::try_from(buf.st_size).unwrap_or(0),
        // pre-epoch timestamps are stored as the epoch
        mtime: u64::try_from(buf.st_mtime).unwrap_or(0),
        nlink: u64::from(buf.st_nlink),
        device,
    }
}

impl FilesystemOps for HostFilesystem {
    type File = File;

    fn lstat(&self, path: &Path) -> io::Result<Stat> {
        let buf = statat(self.dirfd(), path, AtFlags::SYMLINK_NOFOLLOW)?;
        Ok(host_stat(&buf))
    }

    fn list_directory(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let fd = openat(
            self.dirfd(),
            path,
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
            Mode::empty(),
        )?;

        let mut names = vec![];
        for item in Dir::read_from(&fd)? {
            let entry = item?;
            let name = OsStr::from_bytes(entry.file_name().to_bytes());

            if name == "." || name == ".." {
                continue;
            }

            names.push(name.to_os_string());
        }

        Ok(names)
    }

    fn read_link(&self, path: &Path) -> io::Result<Vec<u8>> {
        let target = readlinkat(self.dirfd(), path, Vec::new())?;
        Ok(target.into_bytes())
    }

    fn open(&self, path: &Path) -> io::Result<File> {
        let fd = openat(
            self.dirfd(),
            path,
            OFlags::RDONLY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
            Mode::empty(),
        )?;
        Ok(File::from(fd))
    }
}
