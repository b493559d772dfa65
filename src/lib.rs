//! # localca - A Local Certificate Authority Manager
//!
//! localca creates self-signed root CAs, issues leaf certificates signed by them and keeps
//! track of the resulting key and certificate files in a small JSON store. It is built
//! entirely on the RustCrypto libraries; there is no dependency on OpenSSL.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 1024 to 8192-bit keys, signed with SHA-256 (PKCS#1 v1.5)
//! - **ECDSA**: P-256 (SHA-256) and P-384 (SHA-384)
//! - **Ed25519**
//!
//! ## Store Layout
//!
//! ```text
//! <store_dir>/
//!   store.json           # {"serial": N, "cert_info": {name: [name, dir, key, cert, ca]}}
//!   <name>/<name>.key    # PKCS#8 PEM, mode 0600
//!   <name>/<name>.crt    # PEM, mode 0644
//! ```
//!
//! Every certificate issued into one store gets the store's next serial number, starting
//! at 0, whether it is a CA or a leaf. Serials are never reused, even after a record is
//! removed.
//!
//! ## Quick Start
//!
//! ### Creating a CA and a Server Certificate
//!
//! ```rust,no_run
//! use localca::{
//!     authority::{self, IssueParams},
//!     key::KeyAlgorithm,
//!     store::{Store, StoreConfig},
//! };
//!
//! # fn main() -> Result<(), localca::error::CaError> {
//! let mut store = Store::open(StoreConfig::builder().store_dir("out").build())?;
//!
//! let root = authority::create_ca(
//!     &mut store,
//!     &IssueParams::builder().name("root").years(10).build(),
//! )?;
//!
//! let svc = authority::create_signed_pair(
//!     &mut store,
//!     "root",
//!     &IssueParams::builder()
//!         .name("svc")
//!         .key_algorithm(KeyAlgorithm::EcdsaP256)
//!         .alt_names("DNS:svc.local, IP:127.0.0.1")
//!         .build(),
//! )?;
//! assert_eq!(svc.ca_file, root.ca_file);
//!
//! // Nothing is written to store.json until the store is saved.
//! store.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Signing Without a Store
//!
//! ```rust,no_run
//! use localca::{
//!     cert::{
//!         SelfIssuer,
//!         extensions::{BasicConstraints, Extension},
//!         params::{DistinguishedName, Validity},
//!     },
//!     issuer::Issuer,
//!     key::KeyPair,
//!     request::SigningRequest,
//! };
//!
//! # fn main() -> Result<(), localca::error::CaError> {
//! let key = KeyPair::generate_ed25519();
//! let subject = DistinguishedName::builder()
//!     .common_name("Example CA".to_string())
//!     .organization("Example Corp".to_string())
//!     .build();
//! let request = SigningRequest::new(&key, &subject)?;
//!
//! let issuer = SelfIssuer { name: request.subject().clone(), key: &key };
//! let extensions = [
//!     Extension::literal(BasicConstraints { is_ca: true, max_path_length: None }, true)?,
//!     Extension::subject_key_identifier(),
//! ];
//! let cert = issuer.issue(&request, 42, Validity::for_days(30)?, &extensions)?;
//! println!("{}", cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::CaError`]:
//!
//! ```rust
//! use localca::{error::CaError, store::{Store, StoreConfig}};
//!
//! let mut store = Store::new(StoreConfig::default());
//! match store.remove("missing") {
//!     Ok(record) => println!("removed {}", record.name),
//!     Err(CaError::NotFound(msg)) => println!("{msg}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`store`]: The record file, name lookup and serial allocation
//! - [`authority`]: CA and leaf issuance against a store
//! - [`record`]: Per-identity file locations and their PEM files
//! - [`key`]: Key generation, import/export, and cryptographic operations
//! - [`request`]: PKCS#10 signing requests
//! - [`cert`]: Certificates, extensions and subject names
//! - [`issuer`]: The signing primitive shared by self-signed and CA-signed issuance
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod authority;
pub mod cert;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pem_utils;
pub mod record;
pub mod request;
pub mod store;
pub mod tbs_certificate;
