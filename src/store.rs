//! The persistent name → record mapping and the serial counter shared by every issuance.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use bon::Builder;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CaError, Result};
use crate::record::{self, KeyCertRecord, RecordPaths};

/// Where a store lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct StoreConfig {
    /// Directory holding the record file and, by default, one sub-directory per identity.
    #[builder(default = PathBuf::from("out"), into)]
    pub store_dir: PathBuf,
    /// File name of the record file inside `store_dir`.
    #[builder(default = "store.json".to_string(), into)]
    pub record_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::builder().build()
    }
}

impl StoreConfig {
    pub fn record_file_path(&self) -> PathBuf {
        self.store_dir.join(&self.record_file)
    }
}

/// Outcome of [`Store::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The record file existed and every record in it was read.
    Loaded { records: usize },
    /// There was no record file; the store directory was created and the store is empty.
    Initialized,
}

#[derive(Serialize)]
struct PersistedStore<'a> {
    serial: u64,
    cert_info: &'a BTreeMap<String, KeyCertRecord>,
}

/// Every identity issued into one store directory, plus the next serial to assign.
///
/// The store is only written back by an explicit [`Store::save`]; a process that mutates
/// it and exits without saving leaves the record file as it was.
#[derive(Debug, Clone)]
pub struct Store {
    config: StoreConfig,
    serial: u64,
    records: BTreeMap<String, KeyCertRecord>,
}

impl Store {
    /// An empty store with `serial = 0`. Nothing is read from disk.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            serial: 0,
            records: BTreeMap::new(),
        }
    }

    /// Creates a store and loads its record file.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mut store = Self::new(config);
        store.load()?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Reads the record file into this store.
    ///
    /// A missing file creates the store directory and leaves the store empty. Content that
    /// is not JSON leaves the store untouched. Once the document parses, `serial` is set
    /// first and records are added one by one; the first invalid field stops loading with
    /// `MalformedStore` and whatever was read so far stays in place.
    pub fn load(&mut self) -> Result<LoadStatus> {
        let path = self.config.record_file_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                record::create_dir_all(&self.config.store_dir)?;
                log::info!(
                    "no record file at {}, initialized empty store",
                    path.display()
                );
                return Ok(LoadStatus::Initialized);
            }
            Err(e) => return Err(CaError::io(path, e)),
        };

        let document: Value = serde_json::from_str(&contents)
            .map_err(|e| CaError::MalformedStore(format!("{}: {e}", path.display())))?;
        let Value::Object(mut document) = document else {
            return Err(CaError::MalformedStore(format!(
                "{}: expected a JSON object",
                path.display()
            )));
        };

        self.serial = document
            .get("serial")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                CaError::MalformedStore(format!(
                    "{}: `serial` must be a non-negative integer",
                    path.display()
                ))
            })?;

        let cert_info = match document.remove("cert_info") {
            Some(Value::Object(cert_info)) => cert_info,
            _ => {
                return Err(CaError::MalformedStore(format!(
                    "{}: `cert_info` must be an object",
                    path.display()
                )));
            }
        };

        let mut loaded = 0;
        for (name, fields) in cert_info {
            let record: KeyCertRecord = serde_json::from_value(fields).map_err(|e| {
                CaError::MalformedStore(format!("{}: record `{name}`: {e}", path.display()))
            })?;
            if record.name != name {
                return Err(CaError::MalformedStore(format!(
                    "{}: record stored under `{name}` is named `{}`",
                    path.display(),
                    record.name
                )));
            }
            self.records.insert(name, record);
            loaded += 1;
        }

        log::info!(
            "loaded {loaded} records from {} (next serial {})",
            path.display(),
            self.serial
        );
        Ok(LoadStatus::Loaded { records: loaded })
    }

    /// Writes `{serial, cert_info}` to the record file in a single write.
    pub fn save(&self) -> Result<()> {
        let path = self.config.record_file_path();
        let document = PersistedStore {
            serial: self.serial,
            cert_info: &self.records,
        };
        let json = serde_json::to_string(&document)
            .map_err(|e| CaError::EncodingError(format!("store: {e}")))?;

        record::create_dir_all(&self.config.store_dir)?;
        fs::write(&path, json).map_err(|e| CaError::io(&path, e))?;

        log::info!(
            "saved {} records to {} (next serial {})",
            self.records.len(),
            path.display(),
            self.serial
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&KeyCertRecord> {
        self.records
            .get(name)
            .ok_or_else(|| CaError::NotFound(format!("no certificate named `{name}` in the store")))
    }

    /// Inserts `record` under its name, returning the record it replaced.
    ///
    /// Replacing only changes the stored paths; files the old record pointed at stay on
    /// disk.
    pub fn add(&mut self, record: KeyCertRecord) -> Option<KeyCertRecord> {
        let replaced = self.records.insert(record.name.clone(), record);
        if let Some(old) = &replaced {
            log::warn!(
                "replaced existing record `{}` (old files at {} are left in place)",
                old.name,
                old.dir_name.display()
            );
        }
        replaced
    }

    /// Drops the record for `name`. Its files are not deleted.
    pub fn remove(&mut self, name: &str) -> Result<KeyCertRecord> {
        self.records
            .remove(name)
            .ok_or_else(|| CaError::NotFound(format!("no certificate named `{name}` in the store")))
    }

    /// Returns the serial to use for the next certificate and advances the counter.
    ///
    /// The increment is not undone if issuance fails afterwards.
    pub fn next_serial(&mut self) -> u64 {
        let serial = self.serial;
        self.serial += 1;
        log::debug!("allocated serial {serial}");
        serial
    }

    /// The serial the next certificate will get.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// All records, sorted by name.
    pub fn records(&self) -> impl Iterator<Item = &KeyCertRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Derives the record `name` would get in this store.
    pub fn record_for_name(&self, name: &str, paths: RecordPaths) -> Result<KeyCertRecord> {
        KeyCertRecord::derive(&self.config.store_dir, name, paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(dir: &tempfile::TempDir) -> Store {
        Store::new(StoreConfig::builder().store_dir(dir.path()).build())
    }

    fn record(store: &Store, name: &str) -> KeyCertRecord {
        store.record_for_name(name, RecordPaths::default()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.store_dir, PathBuf::from("out"));
        assert_eq!(config.record_file, "store.json");
        assert_eq!(config.record_file_path(), PathBuf::from("out/store.json"));
    }

    #[test]
    fn test_missing_record_file_initializes_store_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = StoreConfig::builder()
            .store_dir(tmp.path().join("nested/out"))
            .build();
        let mut store = Store::new(config.clone());

        assert_eq!(store.load().unwrap(), LoadStatus::Initialized);
        assert!(config.store_dir.is_dir());
        assert_eq!(store.serial(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        for name in ["root", "svc", "web1"] {
            store.next_serial();
            let record = record(&store, name);
            store.add(record);
        }
        store.save().unwrap();

        let mut reloaded = temp_store(&tmp);
        assert_eq!(
            reloaded.load().unwrap(),
            LoadStatus::Loaded { records: 3 }
        );
        assert_eq!(reloaded.serial(), 3);
        assert_eq!(
            reloaded.records().collect::<Vec<_>>(),
            store.records().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_saved_format() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        store.next_serial();
        let root = record(&store, "root");
        store.add(root.clone());
        store.save().unwrap();

        let written: Value =
            serde_json::from_str(&fs::read_to_string(store.config().record_file_path()).unwrap())
                .unwrap();
        assert_eq!(written["serial"], 1);
        assert_eq!(
            written["cert_info"]["root"],
            serde_json::json!([
                "root",
                root.dir_name,
                root.key_file,
                root.cert_file,
                root.ca_file
            ])
        );
    }

    #[test]
    fn test_unparsable_file_leaves_store_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        store.next_serial();
        fs::write(store.config().record_file_path(), "{not json").unwrap();

        assert!(matches!(store.load(), Err(CaError::MalformedStore(_))));
        assert_eq!(store.serial(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_bad_record_keeps_partial_state() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        fs::write(
            store.config().record_file_path(),
            r#"{"serial": 7, "cert_info": {
                "a": ["a", "out/a", "out/a/a.key", "out/a/a.crt", "out/a/a.crt"],
                "b": ["b", "out/b"]
            }}"#,
        )
        .unwrap();

        assert!(matches!(store.load(), Err(CaError::MalformedStore(_))));
        assert_eq!(store.serial(), 7);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().key_file, PathBuf::from("out/a/a.key"));
    }

    #[test]
    fn test_record_key_must_match_record_name() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        fs::write(
            store.config().record_file_path(),
            r#"{"serial": 1, "cert_info": {
                "a": ["b", "out/b", "out/b/b.key", "out/b/b.crt", "out/b/b.crt"]
            }}"#,
        )
        .unwrap();

        assert!(matches!(store.load(), Err(CaError::MalformedStore(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_serial_is_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        fs::write(store.config().record_file_path(), r#"{"cert_info": {}}"#).unwrap();
        assert!(matches!(store.load(), Err(CaError::MalformedStore(_))));
    }

    #[test]
    fn test_unknown_top_level_keys_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        fs::write(
            store.config().record_file_path(),
            r#"{"serial": 4, "cert_info": {}, "comment": "hand edited"}"#,
        )
        .unwrap();
        assert_eq!(store.load().unwrap(), LoadStatus::Loaded { records: 0 });
        assert_eq!(store.serial(), 4);
    }

    #[test]
    fn test_get_and_remove_report_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        let root = record(&store, "root");
        store.add(root.clone());

        assert!(matches!(store.get("missing"), Err(CaError::NotFound(_))));
        assert!(matches!(store.remove("missing"), Err(CaError::NotFound(_))));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove("root").unwrap(), root);
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_returns_replaced_record() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        let first = record(&store, "svc");
        let second = store
            .record_for_name("svc", RecordPaths::builder().dir_name("/elsewhere").build())
            .unwrap();

        assert!(store.add(first.clone()).is_none());
        assert_eq!(store.add(second.clone()), Some(first));
        assert_eq!(store.get("svc").unwrap(), &second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_serials_are_never_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = temp_store(&tmp);
        assert_eq!(store.next_serial(), 0);
        let root = record(&store, "root");
        store.add(root);
        assert_eq!(store.next_serial(), 1);
        store.remove("root").unwrap();
        assert_eq!(store.next_serial(), 2);
        assert_eq!(store.serial(), 3);
    }
}
