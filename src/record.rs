//! The unit of tracked identity: a name and the files that belong to it.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use bon::Builder;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cert::Certificate;
use crate::error::{CaError, Result};
use crate::key::KeyPair;

const DIR_MODE: u32 = 0o755;
const KEY_FILE_MODE: u32 = 0o600;
const CERT_FILE_MODE: u32 = 0o644;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_*@][A-Za-z0-9._@*-]*$").expect("record name pattern is valid")
});

/// Positional on-disk form: `[name, dir_name, key_file, cert_file, ca_file]`.
type RecordFields = (String, PathBuf, PathBuf, PathBuf, PathBuf);

/// One issued identity tracked by the store.
///
/// `ca_file` is the certificate a verifier should treat as the trust anchor for this
/// identity: the certificate itself for a root, the root's certificate for anything it
/// signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordFields", into = "RecordFields")]
pub struct KeyCertRecord {
    pub name: String,
    pub dir_name: PathBuf,
    pub key_file: PathBuf,
    pub cert_file: PathBuf,
    pub ca_file: PathBuf,
}

impl From<RecordFields> for KeyCertRecord {
    fn from((name, dir_name, key_file, cert_file, ca_file): RecordFields) -> Self {
        Self {
            name,
            dir_name,
            key_file,
            cert_file,
            ca_file,
        }
    }
}

impl From<KeyCertRecord> for RecordFields {
    fn from(record: KeyCertRecord) -> Self {
        (
            record.name,
            record.dir_name,
            record.key_file,
            record.cert_file,
            record.ca_file,
        )
    }
}

/// Explicit file locations for a record. Anything left unset is derived from the name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct RecordPaths {
    #[builder(into)]
    pub dir_name: Option<PathBuf>,
    #[builder(into)]
    pub key_file: Option<PathBuf>,
    #[builder(into)]
    pub cert_file: Option<PathBuf>,
    #[builder(into)]
    pub ca_file: Option<PathBuf>,
}

/// Rejects names that are empty, hidden, or would escape the store directory once used
/// as a path component.
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(CaError::InvalidInput(format!(
            "`{name}` is not a valid certificate name (letters, digits, `.`, `_`, `-`, `@`, `*`; no path separators, must not start with `.`)"
        )))
    }
}

impl KeyCertRecord {
    /// Builds the record for `name`, deriving every path not given in `paths`:
    /// `<store_dir>/<name>`, `<dir>/<name>.key`, `<dir>/<name>.crt`, and the certificate
    /// itself as `ca_file`.
    pub fn derive(store_dir: &Path, name: &str, paths: RecordPaths) -> Result<Self> {
        validate_name(name)?;

        let dir_name = paths.dir_name.unwrap_or_else(|| store_dir.join(name));
        let key_file = paths
            .key_file
            .unwrap_or_else(|| dir_name.join(format!("{name}.key")));
        let cert_file = paths
            .cert_file
            .unwrap_or_else(|| dir_name.join(format!("{name}.crt")));
        let ca_file = paths.ca_file.unwrap_or_else(|| cert_file.clone());

        log::debug!(
            "paths for `{name}`: key {}, cert {}, ca {}",
            key_file.display(),
            cert_file.display(),
            ca_file.display()
        );

        Ok(Self {
            name: name.to_string(),
            dir_name,
            key_file,
            cert_file,
            ca_file,
        })
    }

    /// Writes the key (mode 0600) and certificate (mode 0644) as PEM.
    ///
    /// Both documents are encoded before anything touches the disk. If the certificate
    /// cannot be written, the key file just written is removed again.
    pub fn write_key_cert_pair(&self, key: &KeyPair, cert: &Certificate) -> Result<()> {
        let key_pem = key.to_pkcs8_pem()?;
        let cert_pem = cert.to_pem()?;

        create_dir_all(&self.dir_name)?;
        write_file_with_mode(&self.key_file, key_pem.as_bytes(), KEY_FILE_MODE)?;
        if let Err(err) = write_file_with_mode(&self.cert_file, cert_pem.as_bytes(), CERT_FILE_MODE)
        {
            log::warn!(
                "removing {} after failing to write {}",
                self.key_file.display(),
                self.cert_file.display()
            );
            let _ = fs::remove_file(&self.key_file);
            return Err(err);
        }
        Ok(())
    }

    /// Reads back the key and certificate this record points at.
    ///
    /// Missing or undecodable files are an `InvalidState`: the store claims an identity
    /// whose material is not usable.
    pub fn load_key_cert_pair(&self) -> Result<(KeyPair, Certificate)> {
        let key_pem = read_pem_file(&self.key_file)?;
        let key = KeyPair::import_from_pkcs8_pem(&key_pem).map_err(|e| {
            CaError::InvalidState(format!("key file {}: {e}", self.key_file.display()))
        })?;

        let cert_pem = read_pem_file(&self.cert_file)?;
        let cert = Certificate::from_pem(&cert_pem).map_err(|e| {
            CaError::InvalidState(format!(
                "certificate file {}: {e}",
                self.cert_file.display()
            ))
        })?;

        Ok((key, cert))
    }
}

fn read_pem_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            CaError::InvalidState(format!("could not load file {}: {e}", path.display()))
        }
        _ => CaError::io(path, e),
    })
}

pub(crate) fn create_dir_all(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path).map_err(|e| CaError::io(path, e))
}

fn write_file_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut opts = fs::OpenOptions::new();
    opts.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(mode);
    }

    let mut file = opts.open(path).map_err(|e| CaError::io(path, e))?;
    file.write_all(contents).map_err(|e| CaError::io(path, e))?;

    // `mode` only applies on creation; an overwritten file keeps its old permissions.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| CaError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
