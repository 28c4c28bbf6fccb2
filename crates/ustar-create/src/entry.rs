//! Filesystem objects destined for the archive.
//!
//! The scanner produces a flat, ordered list of [`Entry`] values; the
//! writer consumes it. Metadata is captured once, at scan time, in a
//! platform-independent [`Stat`].

use std::{fmt, path::PathBuf};

use rustix::fs::{FileType, Mode};
use ustar_header::EntryType;

/// The kind of filesystem object an entry describes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A regular file; the only kind with archived data.
    #[default]
    Regular,
    /// A directory.
    Directory,
    /// A symbolic link, archived with its target.
    SymbolicLink,
    /// A character device.
    CharDevice,
    /// A block device.
    BlockDevice,
    /// A named pipe.
    Fifo,
    /// A hard link to an earlier member. The scanner never produces this.
    HardLink,
    /// Anything without a USTAR typeflag (sockets, unknown types).
    Unsupported,
}

impl EntryKind {
    /// The typeflag written for this kind, or `None` if it cannot be archived.
    #[must_use]
    pub fn entry_type(self) -> Option<EntryType> {
        match self {
            EntryKind::Regular => Some(EntryType::Regular),
            EntryKind::HardLink => Some(EntryType::Link),
            EntryKind::SymbolicLink => Some(EntryType::Symlink),
            EntryKind::CharDevice => Some(EntryType::Char),
            EntryKind::BlockDevice => Some(EntryType::Block),
            EntryKind::Directory => Some(EntryType::Directory),
            EntryKind::Fifo => Some(EntryType::Fifo),
            EntryKind::Unsupported => None,
        }
    }

    fn listing_char(self) -> char {
        match self {
            EntryKind::Regular => '-',
            EntryKind::Directory => 'd',
            EntryKind::SymbolicLink => 'l',
            EntryKind::CharDevice => 'c',
            EntryKind::BlockDevice => 'b',
            EntryKind::Fifo => 'p',
            EntryKind::HardLink => 'h',
            EntryKind::Unsupported => '?',
        }
    }
}

impl From<FileType> for EntryKind {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::RegularFile => EntryKind::Regular,
            FileType::Directory => EntryKind::Directory,
            FileType::Symlink => EntryKind::SymbolicLink,
            FileType::CharacterDevice => EntryKind::CharDevice,
            FileType::BlockDevice => EntryKind::BlockDevice,
            FileType::Fifo => EntryKind::Fifo,
            FileType::Socket | FileType::Unknown => EntryKind::Unsupported,
        }
    }
}

const MODE_BITS: [(Mode, u32); 12] = [
    (Mode::RUSR, 0o400),
    (Mode::WUSR, 0o200),
    (Mode::XUSR, 0o100),
    (Mode::RGRP, 0o040),
    (Mode::WGRP, 0o020),
    (Mode::XGRP, 0o010),
    (Mode::ROTH, 0o004),
    (Mode::WOTH, 0o002),
    (Mode::XOTH, 0o001),
    (Mode::SUID, 0o4000),
    (Mode::SGID, 0o2000),
    (Mode::SVTX, 0o1000),
];

/// Translate host permission bits into the USTAR mode bits.
///
/// Each bit is mapped individually so the archive never depends on the
/// host's numeric layout of `st_mode`.
#[must_use]
pub fn ustar_mode(mode: Mode) -> u32 {
    MODE_BITS
        .iter()
        .filter(|(flag, _)| mode.contains(*flag))
        .fold(0, |acc, (_, bits)| acc | bits)
}

/// Metadata captured for an entry at scan time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    /// Resolved object kind.
    pub kind: EntryKind,
    /// USTAR permission bits (see [`ustar_mode`]).
    pub mode: u32,
    /// Owner user id.
    pub uid: u64,
    /// Owner group id.
    pub gid: u64,
    /// Byte length; only meaningful for regular files.
    pub size: u64,
    /// Modification time in seconds since the epoch.
    pub mtime: u64,
    /// Hard-link count. Recorded for listings, not archived.
    pub nlink: u64,
    /// Major and minor number of character and block devices.
    pub device: Option<(u32, u32)>,
}

/// One filesystem object destined for the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Relative member name, used verbatim in the archive.
    pub name: PathBuf,
    /// Metadata captured at scan time.
    pub stat: Stat,
}

impl Entry {
    /// Create an entry, clearing the size of anything but regular files.
    #[must_use]
    pub fn new(name: impl Into<PathBuf>, mut stat: Stat) -> Self {
        if stat.kind != EntryKind::Regular {
            stat.size = 0;
        }
        Entry {
            name: name.into(),
            stat,
        }
    }

    /// Whether the scanner descends into this entry.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.stat.kind == EntryKind::Directory
    }
}

fn mode_string(kind: EntryKind, mode: u32) -> String {
    let bit = |mask: u32, c: char| if mode & mask != 0 { c } else { '-' };
    let exec = |x: u32, special: u32, set: char, unset: char| match (mode & x != 0, mode & special != 0) {
        (true, true) => set,
        (false, true) => unset,
        (true, false) => 'x',
        (false, false) => '-',
    };

    [
        kind.listing_char(),
        bit(0o400, 'r'),
        bit(0o200, 'w'),
        exec(0o100, 0o4000, 's', 'S'),
        bit(0o040, 'r'),
        bit(0o020, 'w'),
        exec(0o010, 0o2000, 's', 'S'),
        bit(0o004, 'r'),
        bit(0o002, 'w'),
        exec(0o001, 0o1000, 't', 'T'),
    ]
    .iter()
    .collect()
}

/// A one-line listing in the style of `tar -tv`.
impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stat = &self.stat;
        let mtime = i64::try_from(stat.mtime)
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map_or_else(
                || "????-??-?? ??:??:??".to_string(),
                |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
            );
        write!(
            f,
            "{} {:3} {}/{} {:10} {} {}",
            mode_string(stat.kind, stat.mode),
            stat.nlink,
            stat.uid,
            stat.gid,
            stat.size,
            mtime,
            self.name.display()
        )
    }
}
