//! Errors reported by the store, the issuance workflow and the crypto layer.

use std::path::PathBuf;

use thiserror::Error;

/// Represents errors that can occur while managing the certificate store or issuing
/// certificates.
///
/// Store-level failures (`NotFound`, `MalformedStore`, `Io`, `InvalidState`) are reported
/// to the caller; none of them leave a half-registered identity behind.
#[derive(Debug, Error)]
pub enum CaError {
    /// A name is absent from the store, or a file it refers to is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record file could not be parsed or does not match the expected schema.
    #[error("Malformed store: {0}")]
    MalformedStore(String),

    /// A path could not be read or written.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store refers to material that cannot be used, e.g. an issuing CA whose key or
    /// certificate cannot be loaded.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Signing or signature verification failed.
    #[error("Signature error: {0}")]
    SignatureError(String),
}

impl CaError {
    /// Wraps an `std::io::Error` together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CaError>;

impl From<der::Error> for CaError {
    /// Converts a `der::Error` into a `CaError`.
    fn from(err: der::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaError {
    fn from(err: rsa::Error) -> Self {
        CaError::KeyGenerationError(err.to_string())
    }
}

impl From<pkcs8::Error> for CaError {
    fn from(err: pkcs8::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<spki::Error> for CaError {
    fn from(err: spki::Error) -> Self {
        CaError::EncodingError(err.to_string())
    }
}

impl From<rsa::signature::Error> for CaError {
    fn from(err: rsa::signature::Error) -> Self {
        CaError::SignatureError(err.to_string())
    }
}

impl From<pem::PemError> for CaError {
    fn from(err: pem::PemError) -> Self {
        CaError::DecodingError(err.to_string())
    }
}
