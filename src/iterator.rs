use std::hash::Hasher;

use crate::Error;
use crate::cdb::{Cdb, HEADER_SIZE};
use crate::util::ReaderAt;

/// Iterates over every record in submission order.
///
/// The record region runs from the end of the header to the start of the
/// first hash table, which is the smallest in-range `table_position` in the
/// header. Duplicate keys appear once per stored record.
pub struct CdbIterator<'cdb, R: ReaderAt, H: Hasher + Default = crate::hash::CdbHash> {
    cdb: &'cdb Cdb<R, H>,
    current_pos: u64,
    end_pos: u64,
}

impl<'cdb, R: ReaderAt, H: Hasher + Default> CdbIterator<'cdb, R, H> {
    pub(crate) fn new(cdb: &'cdb Cdb<R, H>) -> Self {
        let records_start = cdb.header_offset + HEADER_SIZE;

        // Entries below records_start (a writer that zeroes empty buckets)
        // carry no position information and are skipped.
        let end_pos = cdb
            .header
            .iter()
            .map(|entry| u64::from(entry.position))
            .filter(|&position| position >= records_start)
            .min()
            .unwrap_or(records_start);

        CdbIterator {
            cdb,
            current_pos: records_start,
            end_pos,
        }
    }

    fn read_record(&mut self) -> Result<(Vec<u8>, Vec<u8>), Error> {
        let (key_len, value_len) = self.cdb.read_pair_at(self.current_pos)?;
        let record_len = 8 + u64::from(key_len) + u64::from(value_len);

        if self.current_pos.saturating_add(record_len) > self.end_pos {
            return Err(Error::Malformed("record extends into the table region"));
        }

        let mut key = vec![0u8; key_len as usize];
        if key_len > 0 {
            self.cdb.read_exact_at(&mut key, self.current_pos + 8)?;
        }

        let mut value = vec![0u8; value_len as usize];
        if value_len > 0 {
            self.cdb
                .read_exact_at(&mut value, self.current_pos + 8 + u64::from(key_len))?;
        }

        self.current_pos += record_len;
        Ok((key, value))
    }
}

impl<R: ReaderAt, H: Hasher + Default> Iterator for CdbIterator<'_, R, H> {
    type Item = Result<(Vec<u8>, Vec<u8>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_pos >= self.end_pos {
            return None;
        }
        let result = self.read_record();
        if result.is_err() {
            // Stop after surfacing the first error instead of re-reading the
            // same bad record forever.
            self.current_pos = self.end_pos;
        }
        Some(result)
    }
}
