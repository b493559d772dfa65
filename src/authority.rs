//! Issuance workflow: self-signed roots and leaf certificates signed by a root in the
//! store.
//!
//! Each operation derives and validates everything it can before a serial is taken or a
//! file is written, and registers the store record only after the key and certificate
//! are on disk. Neither operation saves the store.

use bon::Builder;

use crate::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, Extension, KeyUsage, KeyUsages,
    SubjectAltName,
};
use crate::cert::params::{DistinguishedName, Validity};
use crate::cert::{CertificateWithPrivateKey, SelfIssuer};
use crate::error::{CaError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyAlgorithm, KeyPair};
use crate::record::{KeyCertRecord, RecordPaths};
use crate::request::SigningRequest;
use crate::store::Store;

/// What to issue.
#[derive(Debug, Clone, Builder)]
pub struct IssueParams {
    /// Store name of the new identity. Also its subject common name.
    #[builder(into)]
    pub name: String,
    #[builder(default)]
    pub key_algorithm: KeyAlgorithm,
    /// Validity in years of 365 days.
    #[builder(default = 5)]
    pub years: u32,
    /// OpenSSL-style alt-names, e.g. `DNS:svc.local, IP:10.0.0.1`. Blank means none.
    #[builder(into)]
    pub alt_names: Option<String>,
    /// Extra subject attributes. The common name is always replaced by `name`.
    #[builder(default)]
    pub subject: DistinguishedName,
    #[builder(default)]
    pub paths: RecordPaths,
}

impl IssueParams {
    fn subject_name(&self) -> DistinguishedName {
        DistinguishedName {
            common_name: Some(self.name.clone()),
            ..self.subject.clone()
        }
    }

    /// An empty or blank alt-names string means no subjectAltName at all.
    fn subject_alt_name(&self) -> Result<Option<SubjectAltName>> {
        self.alt_names
            .as_deref()
            .filter(|names| !names.trim().is_empty())
            .map(str::parse)
            .transpose()
    }
}

fn server_and_client_auth() -> ExtendedKeyUsage {
    ExtendedKeyUsage {
        usage: vec![
            ExtendedKeyUsageOption::ServerAuth,
            ExtendedKeyUsageOption::ClientAuth,
        ],
    }
}

/// Creates a self-signed root CA named `params.name` and registers it in `store`.
///
/// The certificate carries `CA:true, pathlen:0`, `keyCertSign, cRLSign` and
/// `serverAuth, clientAuth` (all critical), subject and authority key identifiers, and a
/// non-critical subjectAltName when alt-names are given. The record is its own trust
/// anchor: `ca_file == cert_file`.
pub fn create_ca(store: &mut Store, params: &IssueParams) -> Result<KeyCertRecord> {
    let paths = RecordPaths {
        ca_file: None,
        ..params.paths.clone()
    };
    let record = store.record_for_name(&params.name, paths)?;
    let alt_names = params.subject_alt_name()?;
    let validity = Validity::for_years(params.years)?;

    let key = KeyPair::generate(params.key_algorithm)?;
    let request = SigningRequest::new(&key, &params.subject_name())?;

    let mut extensions = vec![
        Extension::literal(
            BasicConstraints {
                is_ca: true,
                max_path_length: Some(0),
            },
            true,
        )?,
        Extension::literal(KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign), true)?,
        Extension::literal(server_and_client_auth(), true)?,
        Extension::subject_key_identifier(),
        Extension::self_authority_key_identifier(),
    ];
    if let Some(san) = alt_names {
        extensions.push(Extension::literal(san, false)?);
    }

    let issuer = SelfIssuer {
        name: request.subject().clone(),
        key: &key,
    };
    let serial = store.next_serial();
    let cert = issuer.issue(&request, serial, validity, &extensions)?;

    record.write_key_cert_pair(&key, &cert)?;
    log::info!(
        "created CA `{}` ({}, serial {serial}) at {}",
        record.name,
        params.key_algorithm,
        record.cert_file.display()
    );

    store.add(record.clone());
    Ok(record)
}

/// Creates a leaf identity named `params.name`, signed by the CA `ca_name` from `store`.
///
/// The CA is looked up and loaded before any key is generated. The leaf carries a
/// critical `serverAuth, clientAuth` extended key usage and, when alt-names are given, a
/// non-critical subjectAltName; nothing that would let it sign certificates itself. Its
/// record's `ca_file` is the CA record's `ca_file`.
pub fn create_signed_pair(
    store: &mut Store,
    ca_name: &str,
    params: &IssueParams,
) -> Result<KeyCertRecord> {
    let ca_record = store.get(ca_name)?.clone();
    let ca = load_issuer(&ca_record)?;

    let paths = RecordPaths {
        ca_file: Some(ca_record.ca_file.clone()),
        ..params.paths.clone()
    };
    let record = store.record_for_name(&params.name, paths)?;
    let alt_names = params.subject_alt_name()?;
    let validity = Validity::for_years(params.years)?;

    let key = KeyPair::generate(params.key_algorithm)?;
    let request = SigningRequest::new(&key, &params.subject_name())?;

    let mut extensions = vec![Extension::literal(server_and_client_auth(), true)?];
    if let Some(san) = alt_names {
        extensions.push(Extension::literal(san, false)?);
    }

    let serial = store.next_serial();
    let cert = ca.issue(&request, serial, validity, &extensions)?;

    record.write_key_cert_pair(&key, &cert)?;
    log::info!(
        "created `{}` ({}, serial {serial}) signed by `{ca_name}` at {}",
        record.name,
        params.key_algorithm,
        record.cert_file.display()
    );

    store.add(record.clone());
    Ok(record)
}

/// Loads the key and certificate of a store record for signing.
fn load_issuer(record: &KeyCertRecord) -> Result<CertificateWithPrivateKey> {
    let (key, cert) = record.load_key_cert_pair()?;
    let issuer = CertificateWithPrivateKey::new(cert, key).map_err(|e| {
        CaError::InvalidState(format!("cannot sign with `{}`: {e}", record.name))
    })?;

    let is_ca = issuer.cert.is_ca().map_err(|e| {
        CaError::InvalidState(format!("certificate of `{}`: {e}", record.name))
    })?;
    if !is_ca {
        return Err(CaError::InvalidState(format!(
            "`{}` is not a CA certificate and cannot sign",
            record.name
        )));
    }
    Ok(issuer)
}
