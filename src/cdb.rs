use std::fs::File;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;

use crate::Error;
use crate::util::{ReaderAt, pair_from_bytes};

/// The size of the CDB header in bytes.
///
/// The header is 256 entries, one per bucket, each a `(table_position,
/// slot_count)` pair of little-endian `u32`s: 256 * 8 = 2048 bytes.
pub const HEADER_SIZE: u64 = 256 * 8;

/// One header entry: where bucket `i`'s open-addressed hash table starts and
/// how many slots it has. `slot_count == 0` marks an empty bucket.
#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct TableEntry {
    pub(crate) position: u32,
    pub(crate) slot_count: u32,
}

/// A read-only handle on a finished constant database.
///
/// `Cdb` answers point lookups against an immutable file (or any other
/// [`ReaderAt`] source, such as an in-memory buffer). It never mutates the
/// underlying data; to produce a database, use [`CdbWriter`](crate::CdbWriter)
/// or [`CdbBuilder`](crate::CdbBuilder).
///
/// The header is read once at open time; after that every lookup is a chain
/// of stateless positioned reads, so a `Cdb<File, H>` can be shared behind
/// `&self` without cursor interference.
///
/// The type is generic over the hasher `H` the same way the writer is. The
/// default [`CdbHash`](crate::CdbHash) reads the standard format; a custom
/// hasher reads only files written with that same hasher.
///
/// # Examples
///
/// ```
/// use cdb32::{Cdb, CdbBuilder, CdbHash};
/// use std::fs::File;
///
/// fn main() -> Result<(), cdb32::Error> {
///     let dir = tempfile::tempdir()?;
///     let path = dir.path().join("routes.cdb");
///
///     let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
///     builder.put(b"key", b"value")?;
///     builder.finalize()?;
///
///     let cdb = Cdb::<File, CdbHash>::open(&path)?;
///     if let Some(value) = cdb.get(b"key")? {
///         println!("value: {:?}", value);
///     }
///     Ok(())
/// }
/// ```
pub struct Cdb<R, H> {
    pub(crate) reader: R,
    pub(crate) header: [TableEntry; 256],
    pub(crate) header_offset: u64,
    _hasher: PhantomData<H>,
    #[cfg(feature = "mmap")]
    mmap: Option<Mmap>,
}

impl<H: Hasher + Default> Cdb<File, H> {
    /// Opens a database file whose header starts at offset 0.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::open_at(path, 0)
    }

    /// Opens a database embedded in a file, with its header at
    /// `header_offset`. All positions inside the database are absolute file
    /// offsets, so nothing besides the header location needs translating.
    pub fn open_at<P: AsRef<Path>>(path: P, header_offset: u64) -> Result<Self, Error> {
        let file = File::open(path)?;
        Self::new_at(file, header_offset)
    }

    /// Opens a database file through a memory map instead of `pread` calls.
    ///
    /// The map is kept alive for the lifetime of the handle and serves every
    /// header, slot, and record read. Reads that would run past the end of
    /// the map fail with [`Error::Malformed`].
    #[cfg(feature = "mmap")]
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::open_mmap_at(path, 0)
    }

    /// Memory-mapped variant of [`open_at`](Self::open_at).
    #[cfg(feature = "mmap")]
    pub fn open_mmap_at<P: AsRef<Path>>(path: P, header_offset: u64) -> Result<Self, Error> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let mut cdb = Cdb {
            reader: file,
            header: [TableEntry::default(); 256],
            header_offset,
            _hasher: PhantomData,
            mmap: Some(mmap),
        };
        cdb.read_header()?;
        Ok(cdb)
    }
}

impl<R: ReaderAt, H: Hasher + Default> Cdb<R, H> {
    /// Wraps any [`ReaderAt`] source whose header starts at offset 0.
    pub fn new(reader: R) -> Result<Self, Error> {
        Self::new_at(reader, 0)
    }

    /// Wraps any [`ReaderAt`] source with the header at `header_offset`.
    pub fn new_at(reader: R, header_offset: u64) -> Result<Self, Error> {
        let mut cdb = Cdb {
            reader,
            header: [TableEntry::default(); 256],
            header_offset,
            _hasher: PhantomData,
            #[cfg(feature = "mmap")]
            mmap: None,
        };
        cdb.read_header()?;
        Ok(cdb)
    }

    /// Reads exactly `buf.len()` bytes at `offset`, from the memory map when
    /// one is present, otherwise from the reader.
    pub(crate) fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        #[cfg(feature = "mmap")]
        if let Some(mmap) = self.mmap.as_ref() {
            let start = usize::try_from(offset)
                .map_err(|_| Error::Malformed("offset exceeds addressable memory"))?;
            let end = start
                .checked_add(buf.len())
                .filter(|&end| end <= mmap.len())
                .ok_or(Error::Malformed("read past end of mapped file"))?;
            buf.copy_from_slice(&mmap[start..end]);
            return Ok(());
        }
        self.reader.read_exact_at(buf, offset)?;
        Ok(())
    }

    /// Reads an 8-byte `(u32, u32)` pair at `offset`.
    pub(crate) fn read_pair_at(&self, offset: u64) -> Result<(u32, u32), Error> {
        let mut buf = [0u8; 8];
        self.read_exact_at(&mut buf, offset)?;
        Ok(pair_from_bytes(&buf))
    }

    /// Loads all 256 header entries and sanity-checks them.
    fn read_header(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        self.read_exact_at(&mut buf, self.header_offset)?;

        let tables_start = self.header_offset + HEADER_SIZE;
        for i in 0..256 {
            let mut pair = [0u8; 8];
            pair.copy_from_slice(&buf[i * 8..i * 8 + 8]);
            let (position, slot_count) = pair_from_bytes(&pair);

            if slot_count % 2 != 0 {
                return Err(Error::Malformed("header slot count is odd"));
            }
            if slot_count > 0 && u64::from(position) < tables_start {
                return Err(Error::Malformed("hash table overlaps the header region"));
            }

            self.header[i] = TableEntry {
                position,
                slot_count,
            };
        }
        Ok(())
    }

    /// Looks up `key` and returns its value, or `None` if the key is not in
    /// the database.
    ///
    /// The probe is bounded: the bucket is `hash % 256`, the first slot
    /// inspected is `(hash >> 8) % slot_count`, and at most `slot_count`
    /// slots are visited before the search gives up. An empty slot
    /// (`record_position == 0`) ends the search early, because the writer
    /// only ever stopped its own placement scan at an empty slot.
    ///
    /// If several records were stored under byte-identical keys, the first
    /// one encountered along the probe sequence is returned.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let mut hasher = H::default();
        hasher.write(key);
        let hash = hasher.finish() as u32;

        let table = self.header[(hash & 0xff) as usize];
        if table.slot_count == 0 {
            return Ok(None);
        }

        let start = (hash >> 8) % table.slot_count;
        for i in 0..table.slot_count {
            let slot = (u64::from(start) + u64::from(i)) % u64::from(table.slot_count);
            let (slot_hash, record_position) =
                self.read_pair_at(u64::from(table.position) + slot * 8)?;

            if record_position == 0 {
                return Ok(None);
            }
            if slot_hash == hash {
                if let Some(value) = self.read_record(u64::from(record_position), key)? {
                    return Ok(Some(value));
                }
                // Full 32-bit hash collision with a different key: keep probing.
            }
        }
        Ok(None)
    }

    /// Reads the record at `position` and returns its value if its key is
    /// byte-identical to `expected_key`, `None` otherwise.
    fn read_record(&self, position: u64, expected_key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let (key_len, value_len) = self.read_pair_at(position)?;

        if key_len as usize != expected_key.len() {
            return Ok(None);
        }

        if !expected_key.is_empty() {
            let mut key_buf = vec![0u8; key_len as usize];
            self.read_exact_at(&mut key_buf, position + 8)?;
            if key_buf != expected_key {
                return Ok(None);
            }
        }

        let mut value_buf = vec![0u8; value_len as usize];
        if value_len > 0 {
            self.read_exact_at(&mut value_buf, position + 8 + u64::from(key_len))?;
        }
        Ok(Some(value_buf))
    }

    /// Returns an iterator over all records in submission order.
    ///
    /// The iterator borrows the handle immutably, so lookups remain
    /// available while iterating.
    pub fn iter(&self) -> crate::iterator::CdbIterator<'_, R, H> {
        crate::iterator::CdbIterator::new(self)
    }
}
