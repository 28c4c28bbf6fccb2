//! Building the header record for one entry.

use std::{os::unix::ffi::OsStrExt, path::Path};

use log::{debug, warn};
use ustar_header::{FieldEncoding, Header, HeaderError};

use crate::{
    entry::{Entry, EntryKind},
    error::{Error, Result},
    fs::FilesystemOps,
    identity::{IdentityCache, IdentityResolver},
};

fn numeric_field(
    path: &Path,
    field: &'static str,
    value: u64,
    result: std::result::Result<FieldEncoding, HeaderError>,
) -> Result<()> {
    match result {
        Ok(FieldEncoding::Octal) => Ok(()),
        Ok(FieldEncoding::Binary) => {
            debug!(
                "{}: {field} {value} stored in base-256 encoding",
                path.display()
            );
            Ok(())
        }
        Err(source) => Err(Error::FieldOverflow {
            path: path.to_path_buf(),
            field,
            source,
        }),
    }
}

/// Build the 512-byte USTAR header for `entry`.
///
/// Symbolic link targets are read through `fs`; owner names come from
/// `identities`. The checksum is filled in last.
///
/// # Errors
///
/// [`Error::NameTooLong`] and [`Error::FieldOverflow`] when the entry does
/// not fit the format, [`Error::UnsupportedType`] for objects without a
/// typeflag and [`Error::ReadLink`] when a link target cannot be read.
pub fn build_header<F, R>(
    entry: &Entry,
    fs: &F,
    identities: &mut IdentityCache<R>,
) -> Result<Header>
where
    F: FilesystemOps,
    R: IdentityResolver,
{
    let path = entry.name.as_path();
    let stat = &entry.stat;
    let mut header = Header::new_ustar();

    header
        .set_path(path.as_os_str().as_bytes())
        .map_err(|_| Error::NameTooLong {
            path: path.to_path_buf(),
        })?;

    numeric_field(path, "mode", stat.mode.into(), header.set_mode(stat.mode))?;
    numeric_field(path, "uid", stat.uid, header.set_uid(stat.uid))?;
    numeric_field(path, "gid", stat.gid, header.set_gid(stat.gid))?;
    numeric_field(path, "size", stat.size, header.set_size(stat.size))?;
    numeric_field(path, "mtime", stat.mtime, header.set_mtime(stat.mtime))?;

    let entry_type = stat.kind.entry_type().ok_or_else(|| Error::UnsupportedType {
        path: path.to_path_buf(),
    })?;
    header.set_entry_type(entry_type);

    header.set_username(identities.user_name(stat.uid).as_bytes());
    header.set_groupname(identities.group_name(stat.gid).as_bytes());

    if stat.kind == EntryKind::SymbolicLink {
        let target = fs.read_link(path).map_err(|source| Error::ReadLink {
            path: path.to_path_buf(),
            source,
        })?;
        if header.set_link_name(&target) {
            warn!(
                "{}: symlink target truncated to {} bytes",
                path.display(),
                header.link_name_bytes().len()
            );
        }
    }

    if let Some((major, minor)) = stat.device {
        header
            .set_device(major, minor)
            .map_err(|source| Error::FieldOverflow {
                path: path.to_path_buf(),
                field: "device",
                source,
            })?;
    }

    header.set_checksum();
    Ok(header)
}

#[cfg(test)]
mod tests {
    use ustar_header::EntryType;

    use super::*;
    use crate::{
        entry::Stat,
        test::{MemoryFilesystem, TableIdentity},
    };

    fn regular(size: u64) -> Stat {
        Stat {
            kind: EntryKind::Regular,
            mode: 0o644,
            uid: 1000,
            gid: 100,
            size,
            mtime: 1_700_000_000,
            nlink: 1,
            device: None,
        }
    }

    fn build(entry: &Entry, fs: &MemoryFilesystem) -> Result<Header> {
        let table = TableIdentity::new()
            .user(1000, "alice")
            .group(100, "users");
        build_header(entry, fs, &mut IdentityCache::new(table))
    }

    #[test]
    fn test_regular_file_fields() {
        let fs = MemoryFilesystem::new();
        let header = build(&Entry::new("src/a.txt", regular(10)), &fs).unwrap();

        let bytes = header.as_bytes();
        assert_eq!(&bytes[0..10], b"src/a.txt\0");
        assert_eq!(&bytes[100..108], b"0000644\0");
        assert_eq!(&bytes[108..116], b"0001750\0");
        assert_eq!(&bytes[116..124], b"0000144\0");
        assert_eq!(&bytes[124..136], b"00000000012\0");
        assert_eq!(bytes[156], b'0');
        assert_eq!(&bytes[257..263], b"ustar\0");
        assert_eq!(&bytes[263..265], b"00");
        assert_eq!(header.username(), Some(&b"alice"[..]));
        assert_eq!(header.groupname(), Some(&b"users"[..]));
        assert_eq!(bytes[155], b' ');
        header.verify_checksum().unwrap();

        let parsed = tar::Header::from_byte_slice(bytes);
        assert_eq!(parsed.path().unwrap().to_str(), Some("src/a.txt"));
        assert_eq!(parsed.size().unwrap(), 10);
        assert_eq!(parsed.mtime().unwrap(), 1_700_000_000);
    }

    #[test]
    fn test_long_name_split() {
        let fs = MemoryFilesystem::new();
        let name = format!("{}/{}", "d".repeat(120), "file.txt");
        let header = build(&Entry::new(&name, regular(0)), &fs).unwrap();
        assert_eq!(header.prefix(), Some("d".repeat(120).as_bytes()));
        assert_eq!(header.path_bytes(), b"file.txt");
        assert_eq!(header.path(), name.as_bytes());

        let name = "n".repeat(120);
        assert!(matches!(
            build(&Entry::new(&name, regular(0)), &fs),
            Err(Error::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_large_values_use_base256() {
        let fs = MemoryFilesystem::new();
        let mut stat = regular(8 << 30);
        stat.uid = 0o10000000;
        let header = build(&Entry::new("big", stat), &fs).unwrap();

        let bytes = header.as_bytes();
        assert_eq!(bytes[124] & 0x80, 0x80);
        assert_eq!(bytes[108] & 0x80, 0x80);
        assert_eq!(header.entry_size().unwrap(), 8 << 30);
        assert_eq!(header.uid().unwrap(), 0o10000000);
        assert_eq!(header.username(), Some(&b""[..]));
    }

    #[test]
    fn test_overflow() {
        let fs = MemoryFilesystem::new();
        let mut stat = regular(0);
        stat.gid = 1 << 63;
        match build(&Entry::new("f", stat), &fs) {
            Err(Error::FieldOverflow { field, .. }) => assert_eq!(field, "gid"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_type() {
        let fs = MemoryFilesystem::new();
        let stat = Stat {
            kind: EntryKind::Unsupported,
            ..regular(0)
        };
        assert!(matches!(
            build(&Entry::new("sock", stat), &fs),
            Err(Error::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_symlink_target() {
        let fs = MemoryFilesystem::new()
            .symlink("short", "a.txt")
            .symlink("long", &"t".repeat(150));

        let entry = Entry::new("short", fs.stat_of("short").unwrap());
        let header = build(&entry, &fs).unwrap();
        assert_eq!(header.entry_type(), EntryType::Symlink);
        assert_eq!(header.link_name_bytes(), b"a.txt");
        assert_eq!(header.entry_size().unwrap(), 0);

        let entry = Entry::new("long", fs.stat_of("long").unwrap());
        let header = build(&entry, &fs).unwrap();
        assert_eq!(header.link_name_bytes(), "t".repeat(99).as_bytes());

        let entry = Entry::new("gone", fs.stat_of("short").unwrap());
        assert!(matches!(
            build(&entry, &fs),
            Err(Error::ReadLink { .. })
        ));
    }

    #[test]
    fn test_device_numbers() {
        let fs = MemoryFilesystem::new();
        let stat = Stat {
            kind: EntryKind::CharDevice,
            mode: 0o666,
            device: Some((1, 3)),
            ..Default::default()
        };
        let header = build(&Entry::new("null", stat), &fs).unwrap();
        assert_eq!(header.entry_type(), EntryType::Char);
        assert_eq!(header.device_major().unwrap(), 1);
        assert_eq!(header.device_minor().unwrap(), 3);
        assert_eq!(&header.as_bytes()[329..337], b"0000001\0");
    }

    #[test]
    fn test_typeflags() {
        let fs = MemoryFilesystem::new();
        for (kind, flag) in [
            (EntryKind::Regular, b'0'),
            (EntryKind::HardLink, b'1'),
            (EntryKind::Directory, b'5'),
            (EntryKind::Fifo, b'6'),
            (EntryKind::BlockDevice, b'4'),
        ] {
            let stat = Stat {
                kind,
                ..Default::default()
            };
            let header = build(&Entry::new("x", stat), &fs).unwrap();
            assert_eq!(header.as_bytes()[156], flag);
        }
    }
}
