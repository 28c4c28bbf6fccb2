//! Placement of member names in the `name` and `prefix` fields.

use crate::{HeaderError, Result, NAME_LEN, PREFIX_LEN};

/// A member name divided over the `prefix` and `name` header fields.
///
/// The separating `/` is not part of either half.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitPath<'a> {
    /// Leading directories, empty when the whole path fits in `name`.
    pub prefix: &'a [u8],
    /// Trailing component(s).
    pub name: &'a [u8],
}

/// Split `path` so that it fits the USTAR `prefix` and `name` fields.
///
/// Paths shorter than the name field are stored unchanged. Longer paths are
/// cut at the right-most `/` that still leaves the prefix short enough for
/// its field; both halves keep room for a NUL terminator.
///
/// # Errors
///
/// Returns [`HeaderError::NameTooLong`] if no cut point satisfies both
/// field widths.
///
/// # Example
///
/// ```
/// use ustar_header::split_path;
///
/// let long = format!("{}/file.txt", "d".repeat(120));
/// let split = split_path(long.as_bytes()).unwrap();
/// assert_eq!(split.prefix.len(), 120);
/// assert_eq!(split.name, b"file.txt");
/// ```
pub fn split_path(path: &[u8]) -> Result<SplitPath<'_>> {
    if path.len() < NAME_LEN {
        return Ok(SplitPath {
            prefix: &[],
            name: path,
        });
    }

    let limit = path.len().min(PREFIX_LEN);
    let cut = path[1..limit]
        .iter()
        .rposition(|&b| b == b'/')
        .map(|i| i + 1);

    match cut {
        Some(k) if path.len() - k - 1 < NAME_LEN => Ok(SplitPath {
            prefix: &path[..k],
            name: &path[k + 1..],
        }),
        _ => Err(HeaderError::NameTooLong { len: path.len() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_path_unchanged() {
        let split = split_path(b"src/a.txt").unwrap();
        assert_eq!(split.prefix, b"");
        assert_eq!(split.name, b"src/a.txt");

        let path = "x".repeat(99);
        let split = split_path(path.as_bytes()).unwrap();
        assert_eq!(split.name.len(), 99);
    }

    #[test]
    fn test_exactly_100_bytes_needs_split() {
        let path = format!("{}/{}", "a".repeat(50), "b".repeat(49));
        assert_eq!(path.len(), 100);
        let split = split_path(path.as_bytes()).unwrap();
        assert_eq!(split.prefix, "a".repeat(50).as_bytes());
        assert_eq!(split.name, "b".repeat(49).as_bytes());

        let no_slash = "c".repeat(100);
        assert!(matches!(
            split_path(no_slash.as_bytes()),
            Err(HeaderError::NameTooLong { len: 100 })
        ));
    }

    #[test]
    fn test_rightmost_separator_wins() {
        let path = format!("{}/{}/{}", "a".repeat(60), "b".repeat(60), "leaf");
        let split = split_path(path.as_bytes()).unwrap();
        assert_eq!(split.prefix.len(), 121);
        assert_eq!(split.name, b"leaf");
    }

    #[test]
    fn test_prefix_limit() {
        // separator at index 154 is the last usable one
        let path = format!("{}/{}", "p".repeat(154), "n".repeat(10));
        let split = split_path(path.as_bytes()).unwrap();
        assert_eq!(split.prefix.len(), 154);

        // at index 155 the prefix would need 155 bytes plus a terminator
        let path = format!("{}/{}", "p".repeat(155), "n".repeat(10));
        assert!(split_path(path.as_bytes()).is_err());
    }

    #[test]
    fn test_name_part_too_long() {
        let path = format!("dir/{}", "n".repeat(100));
        assert!(matches!(
            split_path(path.as_bytes()),
            Err(HeaderError::NameTooLong { len: 104 })
        ));

        let path = format!("dir/{}", "n".repeat(99));
        let split = split_path(path.as_bytes()).unwrap();
        assert_eq!(split.prefix, b"dir");
        assert_eq!(split.name.len(), 99);
    }

    #[test]
    fn test_leading_separator_not_used() {
        let path = format!("/{}", "n".repeat(120));
        assert!(split_path(path.as_bytes()).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn test_split_reconstructs(prefix_len in 1usize..200, name_len in 1usize..130) {
            let path = format!("{}/{}", "d".repeat(prefix_len), "f".repeat(name_len));
            let k = prefix_len;
            let total = path.len();

            match split_path(path.as_bytes()) {
                Ok(split) if total < NAME_LEN => {
                    prop_assert!(split.prefix.is_empty());
                    prop_assert_eq!(split.name, path.as_bytes());
                }
                Ok(split) => {
                    prop_assert!(total - k - 1 < NAME_LEN && k < PREFIX_LEN);
                    let mut joined = split.prefix.to_vec();
                    joined.push(b'/');
                    joined.extend_from_slice(split.name);
                    prop_assert_eq!(joined, path.as_bytes());
                }
                Err(HeaderError::NameTooLong { len }) => {
                    prop_assert_eq!(len, total);
                    prop_assert!(total - k - 1 >= NAME_LEN || k >= PREFIX_LEN);
                }
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }
    }
}
