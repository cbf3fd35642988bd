use std::{
    fs::File,
    hash::Hasher,
    io::{Seek, SeekFrom, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::{
    Error,
    cdb::{Cdb, HEADER_SIZE, TableEntry},
    hash::CdbHash,
    util::write_pair,
};

/// One accumulated record: its full 32-bit hash and the absolute offset of
/// its length prefix.
#[derive(Debug)]
struct Entry {
    hash: u32,
    position: u32,
}

/// Streams records into a constant database over any seekable sink.
///
/// The writer runs in two phases. While accumulating, each [`put`](Self::put)
/// appends one record and remembers `(hash, position)` in a per-bucket list.
/// [`finalize`](Self::finalize) then lays out the 256 open-addressed hash
/// tables after the records and seeks back to patch the header that was
/// reserved at creation time.
///
/// `CdbWriter` writes wherever the sink points: a plain `File`, an in-memory
/// `Cursor<Vec<u8>>`, or (via [`CdbBuilder`]) a temporary file that is
/// atomically renamed over the target. It makes no atomicity promises of its
/// own.
pub struct CdbWriter<W: Write + Seek, H: Hasher + Default = CdbHash> {
    writer: W,
    buckets: [Vec<Entry>; 256],
    is_finalized: bool,
    header_offset: u64,
    current_offset: u64,
    _hasher: PhantomData<H>,
}

impl<W: Write + Seek, H: Hasher + Default> CdbWriter<W, H> {
    /// Starts a database at the beginning of the sink.
    pub fn new(writer: W) -> Result<Self, Error> {
        Self::new_at(writer, 0)
    }

    /// Starts a database whose header begins at `header_offset`, leaving the
    /// bytes before it untouched. All positions inside the database are
    /// absolute, so a reader opened with the same offset finds its records
    /// without translation. This is how a database is embedded after other
    /// data in a larger file.
    pub fn new_at(mut writer: W, header_offset: u64) -> Result<Self, Error> {
        writer.seek(SeekFrom::Start(header_offset))?;
        writer.write_all(&[0u8; HEADER_SIZE as usize])?;

        Ok(CdbWriter {
            writer,
            buckets: std::array::from_fn(|_| Vec::new()),
            is_finalized: false,
            header_offset,
            current_offset: header_offset + HEADER_SIZE,
            _hasher: PhantomData,
        })
    }

    /// Appends one record. Keys and values are arbitrary byte strings,
    /// including empty ones; duplicate keys are all stored.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        if self.is_finalized {
            return Err(Error::WriterFinalized);
        }

        let record_len = 8 + key.len() as u64 + value.len() as u64;
        if self.current_offset + record_len > u64::from(u32::MAX) {
            return Err(Error::TooLarge);
        }

        self.writer.seek(SeekFrom::Start(self.current_offset))?;
        write_pair(&mut self.writer, key.len() as u32, value.len() as u32)?;
        self.writer.write_all(key)?;
        self.writer.write_all(value)?;

        let mut hasher = H::default();
        hasher.write(key);
        let hash = hasher.finish() as u32;

        self.buckets[(hash & 0xff) as usize].push(Entry {
            hash,
            position: self.current_offset as u32,
        });
        self.current_offset += record_len;
        Ok(())
    }

    fn write_tables_and_header(&mut self) -> Result<(), Error> {
        if self.is_finalized {
            return Ok(());
        }

        let total_slots: u64 = self.buckets.iter().map(|b| b.len() as u64 * 2).sum();
        if self.current_offset + total_slots * 8 > u64::from(u32::MAX) {
            return Err(Error::TooLarge);
        }

        let mut header = [TableEntry::default(); 256];
        let mut table_position = self.current_offset;

        self.writer.seek(SeekFrom::Start(table_position))?;
        for (i, bucket) in self.buckets.iter().enumerate() {
            let slot_count = bucket.len() * 2;

            // Empty buckets still record the running position, matching the
            // reference cdbmake output byte-for-byte.
            header[i] = TableEntry {
                position: table_position as u32,
                slot_count: slot_count as u32,
            };
            if bucket.is_empty() {
                continue;
            }

            // Twice as many slots as entries, so the probe loop always finds
            // an empty slot. A slot is empty while its position is 0; no
            // record can sit at offset 0, that is inside the header.
            let mut slots = vec![(0u32, 0u32); slot_count];
            for entry in bucket {
                let mut idx = (entry.hash >> 8) as usize % slot_count;
                while slots[idx].1 != 0 {
                    idx = (idx + 1) % slot_count;
                }
                slots[idx] = (entry.hash, entry.position);
            }

            for (hash, position) in slots {
                write_pair(&mut self.writer, hash, position)?;
            }
            table_position += slot_count as u64 * 8;
        }

        self.writer.seek(SeekFrom::Start(self.header_offset))?;
        for entry in header.iter() {
            write_pair(&mut self.writer, entry.position, entry.slot_count)?;
        }

        self.is_finalized = true;
        Ok(())
    }

    /// Writes the hash tables, patches the header, and flushes the sink.
    /// After this the writer accepts no further `put` calls.
    pub fn finalize(&mut self) -> Result<(), Error> {
        self.write_tables_and_header()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consumes the writer and returns the underlying sink, for example to
    /// take back the `Vec<u8>` behind an in-memory cursor. The database must
    /// be finalized first.
    pub fn into_inner(mut self) -> Result<W, Error> {
        if !self.is_finalized {
            return Err(Error::WriterNotFinalized);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Builds a constant database and publishes it atomically.
///
/// The builder owns a private temporary file in the target's directory (same
/// filesystem, so the final rename cannot degrade into a copy). `finalize`
/// completes the database, syncs it, and renames it over the target path in
/// one step: a concurrent reader opening the path sees either the previous
/// complete file or the new complete file, never a partial one.
///
/// If the session is dropped without `finalize`, or any step fails, the
/// temporary file is removed and the target path is left untouched.
///
/// # Examples
///
/// ```
/// use cdb32::{CdbBuilder, CdbHash};
///
/// fn main() -> Result<(), cdb32::Error> {
///     let dir = tempfile::tempdir()?;
///     let path = dir.path().join("services.cdb");
///
///     let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
///     builder.put(b"http", b"80")?;
///     builder.put(b"https", b"443")?;
///     builder.finalize()?;
///     Ok(())
/// }
/// ```
pub struct CdbBuilder<H: Hasher + Default = CdbHash> {
    writer: CdbWriter<File, H>,
    temp: NamedTempFile,
    target: PathBuf,
}

impl<H: Hasher + Default> CdbBuilder<H> {
    /// Opens a build session targeting `path`. Nothing is visible at `path`
    /// until [`finalize`](Self::finalize) succeeds.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let target = path.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        let writer = CdbWriter::new(temp.reopen()?)?;
        Ok(CdbBuilder {
            writer,
            temp,
            target,
        })
    }

    /// Appends one record to the session. See [`CdbWriter::put`].
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.writer.put(key, value)
    }

    /// Completes the database and atomically publishes it at the target
    /// path, replacing any existing file there. Consumes the session.
    pub fn finalize(self) -> Result<(), Error> {
        let CdbBuilder {
            mut writer,
            temp,
            target,
        } = self;

        writer.finalize()?;
        let file = writer.into_inner()?;
        file.sync_all()?;

        temp.persist(&target).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Publishes the database and reopens the target path for reading.
    pub fn into_cdb(self) -> Result<Cdb<File, H>, Error> {
        let target = self.target.clone();
        self.finalize()?;
        Cdb::<File, H>::open(target)
    }
}
