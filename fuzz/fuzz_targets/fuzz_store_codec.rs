//! Fuzz target: typed persistent-store accessors
//!
//! Plants arbitrary bytes under a key and reads them back through every
//! typed accessor, verifying:
//! - No panics under arbitrary stored bytes
//! - Wrong widths and invalid UTF-8 surface as `Corrupted`, never as values
//! - A typed write always reads back as the same value
//!
//! cargo fuzz run fuzz_store_codec

#![no_main]

use libfuzzer_sys::fuzz_target;
use otam::app::ports::{StorageError, StorageExt, StoragePort};
use std::collections::HashMap;

const NS: &str = "otam-store";

// ── In-memory StoragePort for fuzz testing ────────────────────

struct MemStore {
    data: HashMap<String, Vec<u8>>,
}

impl StoragePort for MemStore {
    fn open(&mut self, _namespace: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn read(&self, _namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let v = self.data.get(key).ok_or(StorageError::NotFound)?;
        let n = v.len().min(buf.len());
        buf[..n].copy_from_slice(&v[..n]);
        Ok(n)
    }

    fn write(&mut self, _namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, _namespace: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    fn exists(&self, _namespace: &str, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

fuzz_target!(|data: &[u8]| {
    let mut store = MemStore { data: HashMap::new() };
    store.write(NS, "k", data).unwrap();

    match store.read_i32(NS, "k") {
        Ok(Some(v)) => assert_eq!(data, v.to_le_bytes()),
        Err(e) => assert_eq!(e, StorageError::Corrupted),
        Ok(None) => panic!("present key read as absent"),
    }
    match store.read_bool(NS, "k") {
        Ok(Some(_)) => assert_eq!(data.len(), 1),
        Err(e) => assert_eq!(e, StorageError::Corrupted),
        Ok(None) => panic!("present key read as absent"),
    }
    if let Ok(Some(s)) = store.read_str::<64>(NS, "k") {
        assert_eq!(s.as_bytes(), data);
    }

    if let Ok(text) = core::str::from_utf8(data) {
        if text.len() <= 64 {
            store.write_str(NS, "s", text).unwrap();
            assert_eq!(store.read_str::<64>(NS, "s").unwrap().as_deref(), Some(text));
        }
    }
});
