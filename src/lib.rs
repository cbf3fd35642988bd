//! # cdb32
//!
//! `cdb32` is a Rust implementation of D. J. Bernstein's cdb (constant
//! database) format: an immutable, disk-resident key-value store with a
//! compact two-level hash index, built once and then read many times with no
//! mutation. Typical uses are service lookup tables and routing maps that
//! are rebuilt wholesale.
//!
//! The crate provides [`CdbBuilder`] for building a database file and
//! publishing it atomically, [`CdbWriter`] for streaming the same format
//! into any seekable sink, [`Cdb`] for bounded-probe lookups, and
//! [`CdbIterator`] for walking all records in submission order.
//!
//! ## Format
//!
//! A database is three contiguous regions starting at a caller-supplied
//! header offset (0 when the builder owns the whole file):
//!
//! 1. a header of 256 `(table_position, slot_count)` pairs, one per bucket;
//! 2. the records, `(key_len, value_len, key, value)` in submission order;
//! 3. 256 open-addressed hash tables of `(hash, record_position)` slots.
//!
//! All integers are little-endian `u32`. A key's bucket is `hash % 256`;
//! within a bucket's table the probe starts at `(hash >> 8) % slot_count`
//! and advances linearly. Tables hold twice as many slots as entries, so a
//! lookup always terminates within `slot_count` probes.
//!
//! ## Building and reading a database
//!
//! ```rust
//! use cdb32::{Cdb, CdbBuilder, CdbHash};
//! use std::fs::File;
//!
//! fn main() -> Result<(), cdb32::Error> {
//!     let dir = tempfile::tempdir()?;
//!     let path = dir.path().join("example.cdb");
//!
//!     // Build and atomically publish.
//!     let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
//!     builder.put(b"hello", b"world")?;
//!     builder.put(b"rust", b"is awesome")?;
//!     builder.finalize()?;
//!
//!     // Look keys up.
//!     let cdb = Cdb::<File, CdbHash>::open(&path)?;
//!     assert_eq!(cdb.get(b"hello")?.as_deref(), Some(b"world".as_ref()));
//!     assert_eq!(cdb.get(b"nonexistent")?, None);
//!     Ok(())
//! }
//! ```
//!
//! ## Iterating over all records
//!
//! ```rust
//! use cdb32::{Cdb, CdbHash, CdbWriter};
//! use std::io::Cursor;
//!
//! fn main() -> Result<(), cdb32::Error> {
//!     let mut writer = CdbWriter::<_, CdbHash>::new(Cursor::new(Vec::new()))?;
//!     writer.put(b"key1", b"value1")?;
//!     writer.put(b"key2", b"value2")?;
//!     writer.finalize()?;
//!
//!     let cdb = Cdb::<_, CdbHash>::new(writer.into_inner()?)?;
//!     for record in cdb.iter() {
//!         let (key, value) = record?;
//!         println!(
//!             "{} => {}",
//!             String::from_utf8_lossy(&key),
//!             String::from_utf8_lossy(&value),
//!         );
//!     }
//!     Ok(())
//! }
//! ```

mod cdb;
mod hash;
mod iterator;
mod util;
mod writer;

// re-exports
pub use cdb::{Cdb, HEADER_SIZE};
pub use hash::CdbHash;
pub use iterator::CdbIterator;
pub use util::ReaderAt;
pub use writer::{CdbBuilder, CdbWriter};

/// Errors that can occur when building or reading a constant database.
///
/// A missing key is not an error: [`Cdb::get`] returns `Ok(None)` for it,
/// keeping the ordinary miss separate from operational faults.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error during open, read, write, seek, or atomic publish.
    /// Never retried internally; always surfaced to the caller.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid database: a header or slot read reported an
    /// internal inconsistency, such as an odd slot count or a table
    /// positioned inside the header region.
    #[error("malformed database: {0}")]
    Malformed(&'static str),

    /// The database would outgrow the format's 32-bit addressing. Writers
    /// report this before writing the offending record instead of silently
    /// truncating offsets.
    #[error("database exceeds the 4 GiB cdb format limit")]
    TooLarge,

    /// A `put` was attempted on a writer that has already been finalized.
    #[error("attempted to operate on a finalized writer")]
    WriterFinalized,

    /// `into_inner` was called before `finalize`; the database structure is
    /// incomplete until finalization.
    #[error("writer has not been finalized yet")]
    WriterNotFinalized,
}
