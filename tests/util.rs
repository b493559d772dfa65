#![allow(dead_code)]

use localca::authority::{self, IssueParams};
use localca::cert::Certificate;
use localca::key::KeyAlgorithm;
use localca::record::KeyCertRecord;
use localca::store::{Store, StoreConfig};
use tempfile::TempDir;

/// A fresh store in its own temporary directory. Keep the `TempDir` alive for as long as
/// the store is used.
pub fn temp_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(store_config(&dir)).unwrap();
    (dir, store)
}

pub fn store_config(dir: &TempDir) -> StoreConfig {
    StoreConfig::builder().store_dir(dir.path()).build()
}

pub fn p256_params(name: &str) -> IssueParams {
    IssueParams::builder()
        .name(name)
        .key_algorithm(KeyAlgorithm::EcdsaP256)
        .build()
}

pub fn create_ca(store: &mut Store, name: &str) -> KeyCertRecord {
    authority::create_ca(store, &p256_params(name)).unwrap()
}

pub fn create_leaf(store: &mut Store, ca: &str, name: &str) -> KeyCertRecord {
    authority::create_signed_pair(store, ca, &p256_params(name)).unwrap()
}

pub fn read_cert(record: &KeyCertRecord) -> Certificate {
    Certificate::from_pem(&std::fs::read_to_string(&record.cert_file).unwrap()).unwrap()
}

pub fn read_cert_der(record: &KeyCertRecord) -> Vec<u8> {
    read_cert(record).to_der().unwrap()
}
