use std::io::{Error, ErrorKind, Result, Write};

/// A source of positioned reads, similar to Go's `io.ReaderAt`.
///
/// Every read names its absolute offset, so no cursor is shared between
/// logical operations and one source can serve interleaved lookups behind
/// `&self`.
pub trait ReaderAt {
    /// Reads up to `buf.len()` bytes into `buf` starting at `offset` and
    /// returns the number of bytes read. Must not depend on, or disturb, any
    /// cursor the underlying source keeps.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Reads exactly `buf.len()` bytes starting at `offset`, retrying short
    /// reads. Returns `ErrorKind::UnexpectedEof` if the source ends first.
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => {
                    return Err(Error::new(
                        ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer in read_exact_at",
                    ));
                }
                Ok(n) => {
                    let tmp = buf;
                    buf = &mut tmp[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
impl ReaderAt for std::fs::File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        use std::os::unix::fs::FileExt;
        FileExt::read_at(self, buf, offset)
    }
}

/// Byte slices are readable at any offset; useful for tests and in-memory
/// databases.
impl ReaderAt for &'_ [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let offset = offset as usize;
        if offset >= self.len() {
            return Ok(0);
        }
        let n = std::cmp::min(buf.len(), self.len() - offset);
        buf[..n].copy_from_slice(&self[offset..offset + n]);
        Ok(n)
    }
}

impl ReaderAt for std::io::Cursor<Vec<u8>> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.get_ref().as_slice().read_at(buf, offset)
    }
}

/// Decodes two little-endian `u32` values from an 8-byte buffer.
///
/// Every fixed pair in the format uses this encoding: header entries,
/// hash-table slots, and record length prefixes.
pub(crate) fn pair_from_bytes(buf: &[u8; 8]) -> (u32, u32) {
    let first = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let second = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    (first, second)
}

/// Writes two `u32` values as little-endian, 4 bytes each.
pub(crate) fn write_pair<W: Write + ?Sized>(writer: &mut W, first: u32, second: u32) -> Result<()> {
    writer.write_all(&first.to_le_bytes())?;
    writer.write_all(&second.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn slice_read_at_full_and_partial() {
        let data: &[u8] = &[1, 2, 3, 4, 5];

        let mut buf = [0u8; 5];
        assert_eq!(data.read_at(&mut buf, 0).unwrap(), 5);
        assert_eq!(buf, [1, 2, 3, 4, 5]);

        let mut buf = [0u8; 3];
        assert_eq!(data.read_at(&mut buf, 2).unwrap(), 3);
        assert_eq!(buf, [3, 4, 5]);

        // Buffer larger than the remaining data reads short.
        let mut buf = [0u8; 5];
        assert_eq!(data.read_at(&mut buf, 3).unwrap(), 2);
        assert_eq!(buf[..2], [4, 5]);
    }

    #[test]
    fn slice_read_at_eof() {
        let data: &[u8] = &[1, 2, 3];
        let mut buf = [0u8; 2];
        assert_eq!(data.read_at(&mut buf, 3).unwrap(), 0);
        assert_eq!(data.read_at(&mut buf, 10).unwrap(), 0);
    }

    #[test]
    fn read_exact_at_success_and_eof() {
        let data: &[u8] = &[10, 20, 30, 40, 50];

        let mut buf = [0u8; 3];
        data.read_exact_at(&mut buf, 1).unwrap();
        assert_eq!(buf, [20, 30, 40]);

        let mut buf = [0u8; 3];
        let err = data.read_exact_at(&mut buf, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    // A reader that trickles bytes out in small chunks, exercising the
    // short-read retry loop of read_exact_at.
    struct ChunkedReader {
        data: Vec<u8>,
        chunk: usize,
    }

    impl ReaderAt for ChunkedReader {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
            let offset = offset as usize;
            if offset >= self.data.len() {
                return Ok(0);
            }
            let n = self.chunk.min(buf.len()).min(self.data.len() - offset);
            buf[..n].copy_from_slice(&self.data[offset..offset + n]);
            Ok(n)
        }
    }

    #[test]
    fn read_exact_at_assembles_short_reads() {
        let reader = ChunkedReader {
            data: (1..=10).collect(),
            chunk: 2,
        };
        let mut buf = [0u8; 5];
        reader.read_exact_at(&mut buf, 1).unwrap();
        assert_eq!(buf, [2, 3, 4, 5, 6]);
    }

    #[test]
    fn cursor_read_at_ignores_position() {
        use std::io::Seek;

        let mut cursor = Cursor::new(vec![7, 8, 9]);
        cursor.seek(std::io::SeekFrom::End(0)).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(cursor.read_at(&mut buf, 1).unwrap(), 2);
        assert_eq!(buf, [8, 9]);
        // Positioned reads leave the cursor where it was.
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn pair_round_trip() {
        let mut buf = Cursor::new(Vec::new());
        write_pair(&mut buf, 0x0506_0708, 0xDEAD_BEEF).unwrap();

        let bytes: [u8; 8] = buf.into_inner().try_into().unwrap();
        assert_eq!(pair_from_bytes(&bytes), (0x0506_0708, 0xDEAD_BEEF));
    }
}
