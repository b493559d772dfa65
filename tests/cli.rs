//! Drives the `localca` binary end to end against a temporary store directory.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn localca(store_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_localca"))
        .arg("--store-dir")
        .arg(store_dir)
        .args(args)
        .env_remove("LOCALCA_STORE_DIR")
        .env_remove("LOCALCA_RECORD_FILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute localca")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "localca failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn read_store(store_dir: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(store_dir.join("store.json")).unwrap()).unwrap()
}

fn create_ca(store_dir: &Path, name: &str) {
    assert_success(&localca(
        store_dir,
        &["create-ca", name, "--key-type", "ecdsa-p256"],
    ));
}

#[test]
fn create_ca_then_list_shows_the_record() {
    let dir = tempfile::tempdir().unwrap();
    create_ca(dir.path(), "root");

    let store = read_store(dir.path());
    assert_eq!(store["serial"], 1);
    let cert_file = dir.path().join("root/root.crt");
    assert_eq!(
        store["cert_info"]["root"],
        serde_json::json!([
            "root",
            dir.path().join("root"),
            dir.path().join("root/root.key"),
            cert_file,
            cert_file
        ])
    );

    let list = localca(dir.path(), &["list"]);
    assert_success(&list);
    let text = stdout(&list);
    assert!(text.contains("root"));
    assert!(text.contains(&cert_file.display().to_string()));
    assert!(text.contains("Next serial: 1"));
}

#[test]
fn signed_pair_and_show() {
    let dir = tempfile::tempdir().unwrap();
    create_ca(dir.path(), "root");
    assert_success(&localca(
        dir.path(),
        &[
            "create-signed-pair",
            "svc",
            "--ca",
            "root",
            "--key-type",
            "ed25519",
            "--alt-names",
            "DNS:svc.local, IP:10.0.0.1",
            "--subject",
            "O=Example Corp",
        ],
    ));

    let store = read_store(dir.path());
    assert_eq!(store["serial"], 2);
    assert_eq!(store["cert_info"]["svc"][4], store["cert_info"]["root"][4]);

    let show = localca(dir.path(), &["show", "svc"]);
    assert_success(&show);
    let text = stdout(&show);
    assert!(text.contains("CN=svc"));
    assert!(text.contains("O=Example Corp"));
    assert!(text.contains("CN=root"));
    assert!(text.contains("Serial:     1"));
    assert!(text.contains("DNS:svc.local, IP:10.0.0.1"));
}

#[test]
fn empty_alt_names_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    assert_success(&localca(
        dir.path(),
        &["create-ca", "root", "--key-type", "ecdsa-p256", "--alt-names", ""],
    ));

    let show = localca(dir.path(), &["show", "root"]);
    assert_success(&show);
    assert!(!stdout(&show).contains("Alt names"));
}

#[test]
fn failed_remove_exits_nonzero_and_leaves_store_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    create_ca(dir.path(), "root");

    // Anything that rewrote the store would normalise this hand-edited layout.
    let record_file = dir.path().join("store.json");
    let edited = serde_json::to_string_pretty(&read_store(dir.path())).unwrap();
    fs::write(&record_file, &edited).unwrap();

    let output = localca(dir.path(), &["remove", "ghost"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ghost"));
    assert_eq!(fs::read_to_string(&record_file).unwrap(), edited);
}

#[test]
fn missing_ca_exits_nonzero_and_registers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    create_ca(dir.path(), "root");
    let before = fs::read_to_string(dir.path().join("store.json")).unwrap();

    let output = localca(
        dir.path(),
        &["create-signed-pair", "svc", "--ca", "nope", "--key-type", "ecdsa-p256"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        fs::read_to_string(dir.path().join("store.json")).unwrap(),
        before
    );
    assert!(!dir.path().join("svc").exists());
}

#[test]
fn remove_keeps_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    create_ca(dir.path(), "root");

    let output = localca(dir.path(), &["remove", "root"]);
    assert_success(&output);

    let store = read_store(dir.path());
    assert_eq!(store["serial"], 1);
    assert_eq!(store["cert_info"], serde_json::json!({}));
    assert!(dir.path().join("root/root.key").is_file());
    assert!(dir.path().join("root/root.crt").is_file());

    // The serial is not handed out again.
    create_ca(dir.path(), "root2");
    assert_eq!(read_store(dir.path())["serial"], 2);
}

#[test]
fn malformed_store_allows_only_read_only_commands() {
    let dir = tempfile::tempdir().unwrap();
    let record_file = dir.path().join("store.json");
    fs::write(&record_file, "{not json").unwrap();

    let list = localca(dir.path(), &["list"]);
    assert_success(&list);
    assert!(stdout(&list).contains("No certificates"));

    let output = localca(dir.path(), &["create-ca", "root", "--key-type", "ecdsa-p256"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(fs::read_to_string(&record_file).unwrap(), "{not json");
    assert!(!dir.path().join("root").exists());
}

#[test]
fn invalid_arguments_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();

    let output = localca(
        dir.path(),
        &["create-ca", "root", "--key-type", "ecdsa-p256", "--years", "10000"],
    );
    assert_eq!(output.status.code(), Some(1));

    let output = localca(
        dir.path(),
        &["create-ca", "root", "--key-type", "ecdsa-p256", "--subject", "favouriteColour=blue"],
    );
    assert_eq!(output.status.code(), Some(1));

    assert!(!dir.path().join("store.json").exists());
}
