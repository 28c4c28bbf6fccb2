//! Zerocopy-based USTAR header blocks.
//!
//! This crate provides the on-wire representation of a POSIX.1-1988 UStar
//! header: the raw 512-byte block, a named-field view of it, the numeric
//! field codec (octal with base-256 fallback), checksum arithmetic and the
//! rules for spreading long member names over the `prefix` and `name`
//! fields. It performs no I/O.
//!
//! # Header Field Layout
//!
//! | Offset | Size | Field     | Description                              |
//! |--------|------|-----------|------------------------------------------|
//! | 0      | 100  | name      | File path (null-terminated if < 100)     |
//! | 100    | 8    | mode      | File mode in octal ASCII                 |
//! | 108    | 8    | uid       | Owner user ID in octal ASCII             |
//! | 116    | 8    | gid       | Owner group ID in octal ASCII            |
//! | 124    | 12   | size      | File size in octal ASCII                 |
//! | 136    | 12   | mtime     | Modification time (Unix epoch, octal)    |
//! | 148    | 8    | checksum  | Six octal digits, NUL, space             |
//! | 156    | 1    | typeflag  | Entry type (see [`EntryType`])           |
//! | 157    | 100  | linkname  | Link target for hard/symbolic links      |
//! | 257    | 6    | magic     | "ustar\0"                                |
//! | 263    | 2    | version   | "00"                                     |
//! | 265    | 32   | uname     | Owner user name                          |
//! | 297    | 32   | gname     | Owner group name                         |
//! | 329    | 8    | devmajor  | Device major number                      |
//! | 337    | 8    | devminor  | Device minor number                      |
//! | 345    | 155  | prefix    | Path prefix for long names               |
//!
//! # Example
//!
//! ```
//! use ustar_header::{EntryType, Header};
//!
//! let mut header = Header::new_ustar();
//! header.set_path(b"src/a.txt").unwrap();
//! header.set_entry_type(EntryType::Regular);
//! header.set_mode(0o644).unwrap();
//! header.set_size(10).unwrap();
//! header.set_checksum();
//!
//! assert!(header.verify_checksum().is_ok());
//! assert_eq!(header.entry_size().unwrap(), 10);
//! ```

mod numeric;
mod path;

use std::fmt;

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub use numeric::{encode_checksum, encode_numeric, parse_numeric, parse_octal, FieldEncoding};
pub use path::{split_path, SplitPath};

/// Size of a tar record (header or data block) in bytes.
pub const HEADER_SIZE: usize = 512;

/// Width of the `name` field.
pub const NAME_LEN: usize = 100;

/// Width of the `prefix` field.
pub const PREFIX_LEN: usize = 155;

/// Magic string for UStar format headers ("ustar\0").
pub const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// Version field for UStar format headers ("00").
pub const USTAR_VERSION: &[u8; 2] = b"00";

/// Errors that can occur when encoding or parsing tar headers.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The provided data is too short to contain a header.
    #[error("insufficient data: expected {HEADER_SIZE} bytes, got {0}")]
    InsufficientData(usize),

    /// An octal field contains invalid characters.
    #[error("invalid octal field: {0:?}")]
    InvalidOctal(Vec<u8>),

    /// The header checksum does not match the computed value.
    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// The checksum value stored in the header.
        expected: u64,
        /// The checksum computed from the header bytes.
        computed: u64,
    },

    /// The path cannot be stored in the `prefix` and `name` fields.
    #[error("name too long for a ustar header ({len} bytes)")]
    NameTooLong {
        /// Length of the rejected path.
        len: usize,
    },

    /// A number exceeds even the base-256 range of its field.
    #[error("value {value} does not fit in a {width}-byte field")]
    NumericOverflow {
        /// The rejected value.
        value: u64,
        /// Width of the field in bytes.
        width: usize,
    },
}

/// Result type for header operations.
pub type Result<T> = std::result::Result<T, HeaderError>;

// ============================================================================
// Raw Header Structs
// ============================================================================

/// Raw 512-byte tar header block.
///
/// Use [`Header`] for a higher-level interface with accessor methods.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RawHeader {
    /// The raw header bytes.
    pub bytes: [u8; 512],
}

impl Default for RawHeader {
    fn default() -> Self {
        Self { bytes: [0u8; 512] }
    }
}

impl fmt::Debug for RawHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawHeader")
            .field("name", &truncate_null(&self.bytes[0..100]))
            .finish_non_exhaustive()
    }
}

/// UStar tar header with named fields.
///
/// See module-level documentation for the field layout table.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct UstarHeader {
    /// File path name (null-terminated if shorter than 100 bytes).
    pub name: [u8; 100],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// File size in octal ASCII.
    pub size: [u8; 12],
    /// Modification time as Unix timestamp in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum.
    pub checksum: [u8; 8],
    /// Entry type flag.
    pub typeflag: u8,
    /// Link target name for hard/symbolic links.
    pub linkname: [u8; 100],
    /// Magic string identifying the format ("ustar\0").
    pub magic: [u8; 6],
    /// Format version ("00").
    pub version: [u8; 2],
    /// Owner user name (null-terminated).
    pub uname: [u8; 32],
    /// Owner group name (null-terminated).
    pub gname: [u8; 32],
    /// Device major number in octal ASCII (for special files).
    pub devmajor: [u8; 8],
    /// Device minor number in octal ASCII (for special files).
    pub devminor: [u8; 8],
    /// Path prefix for names longer than 100 bytes.
    pub prefix: [u8; 155],
    /// Padding to fill the 512-byte block.
    pub pad: [u8; 12],
}

impl Default for UstarHeader {
    fn default() -> Self {
        let mut header = Self {
            name: [0u8; 100],
            mode: [0u8; 8],
            uid: [0u8; 8],
            gid: [0u8; 8],
            size: [0u8; 12],
            mtime: [0u8; 12],
            checksum: [0u8; 8],
            typeflag: 0,
            linkname: [0u8; 100],
            magic: [0u8; 6],
            version: [0u8; 2],
            uname: [0u8; 32],
            gname: [0u8; 32],
            devmajor: [0u8; 8],
            devminor: [0u8; 8],
            prefix: [0u8; 155],
            pad: [0u8; 12],
        };
        header.magic.copy_from_slice(USTAR_MAGIC);
        header.version.copy_from_slice(USTAR_VERSION);
        header
    }
}

impl fmt::Debug for UstarHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UstarHeader")
            .field("name", &String::from_utf8_lossy(truncate_null(&self.name)))
            .field("mode", &String::from_utf8_lossy(truncate_null(&self.mode)))
            .field("typeflag", &self.typeflag)
            .field("magic", &self.magic)
            .field(
                "uname",
                &String::from_utf8_lossy(truncate_null(&self.uname)),
            )
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Entry Type
// ============================================================================

/// Tar entry type indicating the kind of file system object.
///
/// Only the single-character USTAR types are produced; anything else read
/// back from a header is reported as [`EntryType::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file (type '0' or '\0' for old tar compatibility).
    Regular,
    /// Hard link to another file in the archive (type '1').
    Link,
    /// Symbolic link (type '2').
    Symlink,
    /// Character device (type '3').
    Char,
    /// Block device (type '4').
    Block,
    /// Directory (type '5').
    Directory,
    /// FIFO/named pipe (type '6').
    Fifo,
    /// Unknown or unsupported entry type.
    Other(u8),
}

impl EntryType {
    /// Parse an entry type from a raw byte value.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' | b'\0' => EntryType::Regular,
            b'1' => EntryType::Link,
            b'2' => EntryType::Symlink,
            b'3' => EntryType::Char,
            b'4' => EntryType::Block,
            b'5' => EntryType::Directory,
            b'6' => EntryType::Fifo,
            other => EntryType::Other(other),
        }
    }

    /// Convert an entry type to its raw byte representation.
    ///
    /// Note that `Regular` is encoded as '0', not '\0'.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            EntryType::Regular => b'0',
            EntryType::Link => b'1',
            EntryType::Symlink => b'2',
            EntryType::Char => b'3',
            EntryType::Block => b'4',
            EntryType::Directory => b'5',
            EntryType::Fifo => b'6',
            EntryType::Other(b) => b,
        }
    }

    /// Returns true if this is a symbolic link entry.
    #[must_use]
    pub fn is_symlink(self) -> bool {
        self == EntryType::Symlink
    }
}

// ============================================================================
// Header Wrapper
// ============================================================================

/// High-level tar header wrapper with accessor methods.
///
/// This struct wraps a [`RawHeader`] and provides setters used when
/// building an archive, plus getters and checksum verification for reading
/// a block back.
///
/// # Example
///
/// ```
/// use ustar_header::Header;
///
/// let header = Header::new_ustar();
/// assert!(header.is_ustar());
/// ```
#[derive(Clone, Copy, FromBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct Header {
    raw: RawHeader,
}

impl Header {
    /// Create a new, otherwise zeroed header with UStar magic and version.
    #[must_use]
    pub fn new_ustar() -> Self {
        let mut header = Self {
            raw: RawHeader::default(),
        };
        header.raw.bytes[257..263].copy_from_slice(USTAR_MAGIC);
        header.raw.bytes[263..265].copy_from_slice(USTAR_VERSION);
        header
    }

    /// Get a reference to the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 512] {
        &self.raw.bytes
    }

    /// Get a mutable reference to the underlying bytes.
    pub fn as_mut_bytes(&mut self) -> &mut [u8; 512] {
        &mut self.raw.bytes
    }

    /// Parse a header from a byte slice.
    ///
    /// Returns a reference to the header if the slice is at least 512 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::InsufficientData`] if the slice is too short.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Header> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::InsufficientData(bytes.len()));
        }
        let raw = RawHeader::ref_from_bytes(&bytes[..HEADER_SIZE])
            .map_err(|_| HeaderError::InsufficientData(bytes.len()))?;
        Ok(zerocopy::transmute_ref!(raw))
    }

    /// Mutable named-field view of this header.
    pub fn as_ustar_mut(&mut self) -> &mut UstarHeader {
        UstarHeader::mut_from_bytes(&mut self.raw.bytes).expect("size is correct")
    }

    /// Check if this header uses UStar format.
    #[must_use]
    pub fn is_ustar(&self) -> bool {
        self.raw.bytes[257..263] == *USTAR_MAGIC && self.raw.bytes[263..265] == *USTAR_VERSION
    }

    /// Get the entry type.
    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_byte(self.raw.bytes[156])
    }

    /// Set the entry type.
    pub fn set_entry_type(&mut self, entry_type: EntryType) {
        self.as_ustar_mut().typeflag = entry_type.to_byte();
    }

    /// Store the member name, using the prefix field when needed.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::NameTooLong`] if the path cannot be split to
    /// fit; the header is left untouched in that case.
    pub fn set_path(&mut self, path: &[u8]) -> Result<()> {
        let split = split_path(path)?;
        let fields = self.as_ustar_mut();
        fields.name.fill(0);
        fields.name[..split.name.len()].copy_from_slice(split.name);
        fields.prefix.fill(0);
        fields.prefix[..split.prefix.len()].copy_from_slice(split.prefix);
        Ok(())
    }

    /// Get the raw bytes of the `name` field.
    ///
    /// For long paths the prefix field (see [`Header::prefix`]) holds the
    /// leading directories; [`Header::path`] joins both.
    #[must_use]
    pub fn path_bytes(&self) -> &[u8] {
        truncate_null(&self.raw.bytes[0..100])
    }

    /// Get the UStar prefix field for long paths.
    ///
    /// Returns `None` for non-UStar headers.
    #[must_use]
    pub fn prefix(&self) -> Option<&[u8]> {
        if !self.is_ustar() {
            return None;
        }
        Some(truncate_null(&self.raw.bytes[345..500]))
    }

    /// Full member name, with the prefix joined back on.
    #[must_use]
    pub fn path(&self) -> Vec<u8> {
        match self.prefix() {
            Some(prefix) if !prefix.is_empty() => {
                let mut path = prefix.to_vec();
                path.push(b'/');
                path.extend_from_slice(self.path_bytes());
                path
            }
            _ => self.path_bytes().to_vec(),
        }
    }

    /// Set the permission bits.
    pub fn set_mode(&mut self, mode: u32) -> Result<FieldEncoding> {
        encode_numeric(&mut self.as_ustar_mut().mode, u64::from(mode))
    }

    /// Get the file mode (permissions).
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::InvalidOctal`] if the mode field is not valid.
    pub fn mode(&self) -> Result<u32> {
        parse_numeric(&self.raw.bytes[100..108]).map(|v| v as u32)
    }

    /// Set the owner user ID.
    pub fn set_uid(&mut self, uid: u64) -> Result<FieldEncoding> {
        encode_numeric(&mut self.as_ustar_mut().uid, uid)
    }

    /// Get the owner user ID.
    pub fn uid(&self) -> Result<u64> {
        parse_numeric(&self.raw.bytes[108..116])
    }

    /// Set the owner group ID.
    pub fn set_gid(&mut self, gid: u64) -> Result<FieldEncoding> {
        encode_numeric(&mut self.as_ustar_mut().gid, gid)
    }

    /// Get the owner group ID.
    pub fn gid(&self) -> Result<u64> {
        parse_numeric(&self.raw.bytes[116..124])
    }

    /// Set the size of the data following the header.
    pub fn set_size(&mut self, size: u64) -> Result<FieldEncoding> {
        encode_numeric(&mut self.as_ustar_mut().size, size)
    }

    /// Get the entry size (file content length) in bytes.
    pub fn entry_size(&self) -> Result<u64> {
        parse_numeric(&self.raw.bytes[124..136])
    }

    /// Set the modification time.
    pub fn set_mtime(&mut self, mtime: u64) -> Result<FieldEncoding> {
        encode_numeric(&mut self.as_ustar_mut().mtime, mtime)
    }

    /// Get the modification time as a Unix timestamp.
    pub fn mtime(&self) -> Result<u64> {
        parse_numeric(&self.raw.bytes[136..148])
    }

    /// Set the device numbers of a character or block device.
    pub fn set_device(&mut self, major: u32, minor: u32) -> Result<()> {
        let fields = self.as_ustar_mut();
        encode_numeric(&mut fields.devmajor, u64::from(major))?;
        encode_numeric(&mut fields.devminor, u64::from(minor))?;
        Ok(())
    }

    /// Get the device major number (for character/block devices).
    pub fn device_major(&self) -> Result<u32> {
        parse_numeric(&self.raw.bytes[329..337]).map(|v| v as u32)
    }

    /// Get the device minor number (for character/block devices).
    pub fn device_minor(&self) -> Result<u32> {
        parse_numeric(&self.raw.bytes[337..345]).map(|v| v as u32)
    }

    /// Store a link target.
    ///
    /// Targets are cut to 99 bytes so the field stays NUL-terminated.
    /// Returns `true` if the target had to be truncated.
    pub fn set_link_name(&mut self, target: &[u8]) -> bool {
        store_str(&mut self.as_ustar_mut().linkname, target)
    }

    /// Get the raw link name bytes.
    #[must_use]
    pub fn link_name_bytes(&self) -> &[u8] {
        truncate_null(&self.raw.bytes[157..257])
    }

    /// Store the owner user name, truncated to 31 bytes.
    ///
    /// Returns `true` if the name had to be truncated.
    pub fn set_username(&mut self, name: &[u8]) -> bool {
        store_str(&mut self.as_ustar_mut().uname, name)
    }

    /// Get the owner user name.
    ///
    /// Returns `None` for non-UStar headers.
    #[must_use]
    pub fn username(&self) -> Option<&[u8]> {
        if !self.is_ustar() {
            return None;
        }
        Some(truncate_null(&self.raw.bytes[265..297]))
    }

    /// Store the owner group name, truncated to 31 bytes.
    ///
    /// Returns `true` if the name had to be truncated.
    pub fn set_groupname(&mut self, name: &[u8]) -> bool {
        store_str(&mut self.as_ustar_mut().gname, name)
    }

    /// Get the owner group name.
    ///
    /// Returns `None` for non-UStar headers.
    #[must_use]
    pub fn groupname(&self) -> Option<&[u8]> {
        if !self.is_ustar() {
            return None;
        }
        Some(truncate_null(&self.raw.bytes[297..329]))
    }

    /// Compute the header checksum.
    ///
    /// This computes the unsigned sum of all header bytes, treating the
    /// checksum field (bytes 148..156) as spaces (0x20).
    #[must_use]
    pub fn compute_checksum(&self) -> u64 {
        let mut sum: u64 = 0;
        for (i, &byte) in self.raw.bytes.iter().enumerate() {
            if (148..156).contains(&i) {
                sum += u64::from(b' ');
            } else {
                sum += u64::from(byte);
            }
        }
        sum
    }

    /// Fill in the checksum field.
    ///
    /// This must be the last modification made to the header.
    pub fn set_checksum(&mut self) {
        let sum = self.compute_checksum();
        let stored = encode_checksum(&mut self.as_ustar_mut().checksum, sum);
        debug_assert!(stored.is_ok(), "checksum {sum} exceeds six octal digits");
    }

    /// Verify the header checksum.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::ChecksumMismatch`] if the checksum is invalid,
    /// or [`HeaderError::InvalidOctal`] if the stored checksum cannot be parsed.
    pub fn verify_checksum(&self) -> Result<()> {
        let expected = parse_octal(&self.raw.bytes[148..156])?;
        let computed = self.compute_checksum();
        if expected == computed {
            Ok(())
        } else {
            Err(HeaderError::ChecksumMismatch { expected, computed })
        }
    }

    /// Check if this header represents an empty block (all zeros).
    ///
    /// Two consecutive empty blocks mark the end of a tar archive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.bytes.iter().all(|&b| b == 0)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new_ustar()
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("path", &String::from_utf8_lossy(&self.path()))
            .field("entry_type", &self.entry_type())
            .field("size", &self.entry_size().ok())
            .field("mode", &self.mode().ok().map(|m| format!("{m:04o}")))
            .field("is_ustar", &self.is_ustar())
            .finish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Copy `value` into a NUL-terminated string field, truncating if needed.
fn store_str(field: &mut [u8], value: &[u8]) -> bool {
    let len = value.len().min(field.len() - 1);
    field.fill(0);
    field[..len].copy_from_slice(&value[..len]);
    len < value.len()
}

/// Truncate a byte slice at the first null byte.
///
/// This is used to extract null-terminated strings from fixed-size fields.
/// If no null byte is found, returns the entire slice.
///
/// # Example
///
/// ```
/// use ustar_header::truncate_null;
///
/// assert_eq!(truncate_null(b"hello\0world"), b"hello");
/// assert_eq!(truncate_null(b"no null here"), b"no null here");
/// assert_eq!(truncate_null(b"\0empty"), b"");
/// ```
#[must_use]
pub fn truncate_null(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}
