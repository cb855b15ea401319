//! The record store of a resolver.
//!
//! A [`RecordStore`] is an ordered list of [`Record`]s loaded once when a
//! resolver starts. It answers lookups by name and record type, both
//! compared ignoring case. The store does not check for duplicates:
//! if two records share a key, the one loaded first is found.
//!
//! Records are read from a JSON array such as:
//!
//! ```text
//! [
//!   { "Type": "A", "Name": "www.test.com", "Value": "192.168.1.20",
//!     "TTL": 3600 },
//!   { "Type": "MX", "Name": "example.com", "Value": "mail.example.com",
//!     "Priority": 10, "TTL": 3600 }
//! ]
//! ```

use core::fmt;

use std::error;
use std::fs::File;
use std::io;
use std::path::Path;
use std::slice;
use std::sync::Arc;
use std::vec::Vec;

use tracing::debug;

use crate::base::Record;

//------------ RecordStore ---------------------------------------------------

/// An immutable, ordered set of records.
#[derive(Clone, Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    /// Creates a store from a list of records, keeping their order.
    pub fn from_records(records: Vec<Record>) -> Self {
        RecordStore { records }
    }

    /// Loads the store from a reader providing a JSON array of records.
    pub fn load(reader: impl io::Read) -> Result<Self, LoadError> {
        let records: Vec<Record> = serde_json::from_reader(reader)
            .map_err(|err| {
                if err.is_io() {
                    LoadError::Io(Arc::new(err.into()))
                } else {
                    LoadError::Parse(Arc::new(err))
                }
            })?;
        debug!("Loaded {} records", records.len());
        Ok(Self::from_records(records))
    }

    /// Loads the store from the file at the given path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let file = File::open(path.as_ref())
            .map_err(|err| LoadError::Io(Arc::new(err)))?;
        Self::load(io::BufReader::new(file))
    }

    /// Finds the first record with the given name and record type.
    pub fn find(&self, name: &str, rtype: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|record| record.matches(name, rtype))
    }

    /// Returns the number of records in the store.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the store has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns an iterator over the records in load order.
    pub fn iter(&self) -> slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a Record;
    type IntoIter = slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//------------ LoadError -----------------------------------------------------

/// The record table could not be loaded.
#[derive(Clone, Debug)]
pub enum LoadError {
    /// Reading the source failed.
    Io(Arc<io::Error>),

    /// The source is not a valid list of records.
    Parse(Arc<serde_json::Error>),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Io(err) => {
                write!(f, "failed to read record table: {err}")
            }
            LoadError::Parse(err) => {
                write!(f, "invalid record table: {err}")
            }
        }
    }
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LoadError::Io(err) => Some(err),
            LoadError::Parse(err) => Some(err),
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    const RECORDS: &str = r#"[
        { "Type": "A", "Name": "www.outlook.com", "Value": "192.168.1.10",
          "TTL": 3600 },
        { "Type": "A", "Name": "www.test.com", "Value": "192.168.1.20",
          "TTL": 3600 },
        { "Type": "MX", "Name": "example.com", "Value": "mail.example.com",
          "Priority": 10, "TTL": 3600 },
        { "Type": "A", "Name": "WWW.TEST.COM", "Value": "10.0.0.1" }
    ]"#;

    fn store() -> RecordStore {
        RecordStore::load(RECORDS.as_bytes()).unwrap()
    }

    #[test]
    fn load_keeps_order() {
        let store = store();
        assert_eq!(store.len(), 4);
        let names: Vec<_> = store.iter().map(Record::name).collect();
        assert_eq!(
            names,
            ["www.outlook.com", "www.test.com", "example.com", "WWW.TEST.COM"]
        );
    }

    #[test]
    fn find_ignores_case_and_prefers_first() {
        let store = store();
        let found = store.find("www.test.com", "A").unwrap();
        assert_eq!(found.value(), Some("192.168.1.20"));
        assert_eq!(store.find("WWW.Test.Com", "a"), Some(found));

        let mx = store.find("example.com", "mx").unwrap();
        assert_eq!(mx.priority(), 10);
    }

    #[test]
    fn find_misses() {
        let store = store();
        assert!(store.find("unknown.domain", "A").is_none());
        assert!(store.find("example.com", "A").is_none());
        assert!(RecordStore::default().find("example.com", "MX").is_none());
    }

    #[test]
    fn load_errors() {
        assert!(matches!(
            RecordStore::load(&b"{ \"Type\": \"A\" }"[..]),
            Err(LoadError::Parse(_))
        ));
        assert!(matches!(
            RecordStore::load(&b"[{ \"Name\": \"a\" }]"[..]),
            Err(LoadError::Parse(_))
        ));
        assert!(matches!(
            RecordStore::from_path("/nonexistent/DNSrecords.json"),
            Err(LoadError::Io(_))
        ));
    }
}
