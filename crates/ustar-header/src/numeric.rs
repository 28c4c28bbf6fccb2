//! Numeric header fields.
//!
//! USTAR stores numbers as zero-padded octal ASCII followed by a NUL byte.
//! Values that do not fit in the available octal digits fall back to the
//! base-256 extension understood by GNU tar and most other readers: the
//! value is written big-endian, right-aligned in the field, with the high
//! bit of the first byte set as a marker.

use crate::{HeaderError, Result};

/// How a numeric field is (or must be) encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldEncoding {
    /// Zero-padded octal digits followed by a NUL byte.
    Octal,
    /// Big-endian base-256 with the marker bit set in the first byte.
    Binary,
}

impl FieldEncoding {
    /// Decide how `value` has to be stored in a field of `width` bytes.
    ///
    /// Returns `None` if not even the base-256 form can represent it, which
    /// for the fields in a header only happens to 8-byte fields holding a
    /// value with bit 63 set.
    #[must_use]
    pub fn select(width: usize, value: u64) -> Option<Self> {
        if width < 2 {
            return None;
        }
        if fits_in_bits(value, 3 * (width - 1)) {
            Some(FieldEncoding::Octal)
        } else if fits_in_bits(value, 8 * width - 1) {
            Some(FieldEncoding::Binary)
        } else {
            None
        }
    }
}

fn fits_in_bits(value: u64, bits: usize) -> bool {
    bits >= 64 || value >> bits == 0
}

/// Encode `value` into `field`, using octal when possible.
///
/// The whole field is overwritten. In octal form the last byte is always a
/// NUL terminator, leaving `field.len() - 1` digit slots.
///
/// # Errors
///
/// Returns [`HeaderError::NumericOverflow`] if the value cannot be stored in
/// a field of this width at all.
///
/// # Example
///
/// ```
/// use ustar_header::{encode_numeric, FieldEncoding};
///
/// let mut field = [0u8; 8];
/// assert_eq!(encode_numeric(&mut field, 0o644).unwrap(), FieldEncoding::Octal);
/// assert_eq!(&field, b"0000644\0");
/// ```
pub fn encode_numeric(field: &mut [u8], value: u64) -> Result<FieldEncoding> {
    let width = field.len();
    let encoding =
        FieldEncoding::select(width, value).ok_or(HeaderError::NumericOverflow { value, width })?;

    match encoding {
        FieldEncoding::Octal => {
            let (digits, nul) = field.split_at_mut(width - 1);
            let mut rest = value;
            for digit in digits.iter_mut().rev() {
                *digit = b'0' + (rest % 8) as u8;
                rest /= 8;
            }
            nul[0] = 0;
        }
        FieldEncoding::Binary => {
            let mut rest = value;
            for byte in field.iter_mut().rev() {
                *byte = (rest & 0xff) as u8;
                rest >>= 8;
            }
            field[0] |= 0x80;
        }
    }

    Ok(encoding)
}

/// Store a header checksum.
///
/// The checksum field does not use the general layout: it holds six octal
/// digits, a NUL and a trailing space. Readers written against historic
/// tar implementations expect exactly this.
pub fn encode_checksum(field: &mut [u8; 8], sum: u64) -> Result<()> {
    match encode_numeric(&mut field[..7], sum)? {
        FieldEncoding::Octal => {
            field[7] = b' ';
            Ok(())
        }
        // The sum of 512 bytes never exceeds six octal digits.
        FieldEncoding::Binary => Err(HeaderError::NumericOverflow {
            value: sum,
            width: 7,
        }),
    }
}

/// Parse an octal ASCII field into a u64.
///
/// Octal fields are ASCII strings with optional leading spaces and trailing
/// spaces or NUL bytes. For example:
/// - `"0000644\0"` -> 420 (file mode 0644)
/// - `"     123 "` -> 83
///
/// # Errors
///
/// Returns [`HeaderError::InvalidOctal`] if the field contains invalid
/// characters (anything other than spaces, digits 0-7, or NUL bytes).
pub fn parse_octal(bytes: &[u8]) -> Result<u64> {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b' ' || b == b'\0')
        .map_or(bytes.len(), |i| start + i);

    let trimmed = &bytes[start..end];

    if trimmed.is_empty() {
        return Ok(0);
    }

    let mut value: u64 = 0;
    for &byte in trimmed {
        if !byte.is_ascii_digit() || byte > b'7' {
            return Err(HeaderError::InvalidOctal(bytes.to_vec()));
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or_else(|| HeaderError::InvalidOctal(bytes.to_vec()))?;
    }

    Ok(value)
}

/// Parse a numeric field that may be octal ASCII or base-256 encoded.
///
/// This is the inverse of [`encode_numeric`].
///
/// # Errors
///
/// Returns [`HeaderError::InvalidOctal`] if octal parsing fails or a
/// base-256 value does not fit in a u64.
pub fn parse_numeric(bytes: &[u8]) -> Result<u64> {
    if bytes.is_empty() {
        return Ok(0);
    }

    if bytes[0] & 0x80 != 0 {
        let mut value: u64 = 0;
        for (i, &byte) in bytes.iter().enumerate() {
            let b = if i == 0 { byte & 0x7f } else { byte };
            value = value
                .checked_mul(256)
                .and_then(|v| v.checked_add(u64::from(b)))
                .ok_or_else(|| HeaderError::InvalidOctal(bytes.to_vec()))?;
        }
        Ok(value)
    } else {
        parse_octal(bytes)
    }
}
