use std::io::{ErrorKind, Read, Result};

/// This function reads until the buffer is full or the reader is exhausted, possibly performing
/// multiple reads to do so (and also retrying if required to deal with EINTR).
///
/// Unlike the standard Read::read_exact() method, a short read is not an error: the caller gets
/// the number of bytes actually read and decides what a missing tail means.
///
/// # Return value
///
///  - the number of bytes placed into the buffer; less than its length only at EOF
///  - in case of underlying errors from the Read implementation, the error is returned directly
pub fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}
