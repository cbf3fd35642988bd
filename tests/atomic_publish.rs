//! Publish semantics of `CdbBuilder`: the target path only ever holds a
//! complete database, and abandoned sessions leave no trace.

use cdb32::{Cdb, CdbBuilder, CdbHash, Error};
use std::fs;
use std::fs::File;

#[test]
fn finalize_creates_the_target() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fresh.cdb");

    let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
    builder.put(b"key", b"value")?;
    assert!(!path.exists(), "target must not appear before finalize");

    builder.finalize()?;
    assert!(path.exists());

    let cdb = Cdb::<File, CdbHash>::open(&path)?;
    assert_eq!(cdb.get(b"key")?.unwrap(), b"value");
    Ok(())
}

#[test]
fn finalize_replaces_an_existing_database() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("replace.cdb");

    let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
    builder.put(b"generation", b"one")?;
    builder.finalize()?;

    // A reader opened against the old file keeps seeing the old, complete
    // database even after the path is atomically replaced underneath it.
    let old_reader = Cdb::<File, CdbHash>::open(&path)?;

    let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
    builder.put(b"generation", b"two")?;
    builder.put(b"extra", b"record")?;
    builder.finalize()?;

    assert_eq!(old_reader.get(b"generation")?.unwrap(), b"one");
    assert_eq!(old_reader.get(b"extra")?, None);

    let new_reader = Cdb::<File, CdbHash>::open(&path)?;
    assert_eq!(new_reader.get(b"generation")?.unwrap(), b"two");
    assert_eq!(new_reader.get(b"extra")?.unwrap(), b"record");
    Ok(())
}

#[test]
fn dropped_session_leaves_nothing_behind() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("abandoned.cdb");

    {
        let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
        builder.put(b"key", b"value")?;
        // Dropped without finalize.
    }

    assert!(!path.exists(), "target must stay untouched");
    let leftovers = fs::read_dir(dir.path())?.count();
    assert_eq!(leftovers, 0, "the temporary file must be removed");
    Ok(())
}

#[test]
fn abandoned_rebuild_keeps_the_old_database() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kept.cdb");

    let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
    builder.put(b"key", b"original")?;
    builder.finalize()?;

    {
        let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
        builder.put(b"key", b"discarded")?;
        // Dropped without finalize.
    }

    let cdb = Cdb::<File, CdbHash>::open(&path)?;
    assert_eq!(cdb.get(b"key")?.unwrap(), b"original");
    Ok(())
}

#[test]
fn into_cdb_publishes_and_reopens() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("reopened.cdb");

    let mut builder = CdbBuilder::<CdbHash>::create(&path)?;
    builder.put(b"hello", b"world")?;
    let cdb = builder.into_cdb()?;

    assert_eq!(cdb.get(b"hello")?.unwrap(), b"world");
    assert!(path.exists());
    Ok(())
}

#[test]
fn empty_dataset_publishes_a_valid_database() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.cdb");

    CdbBuilder::<CdbHash>::create(&path)?.finalize()?;

    assert_eq!(fs::metadata(&path)?.len(), cdb32::HEADER_SIZE);
    let cdb = Cdb::<File, CdbHash>::open(&path)?;
    assert_eq!(cdb.get(b"anything")?, None);
    assert_eq!(cdb.iter().count(), 0);
    Ok(())
}
