//! PKCS#10 certificate signing requests.

use der::Encode;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::params::DistinguishedName;
use crate::error::{CaError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils;

/// An unsigned binding of a public key to a subject, self-signed by the key it carries.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub inner: CertReq,
}

impl SigningRequest {
    /// Builds a request for `subject` and signs it with `key`.
    pub fn new(key: &KeyPair, subject: &DistinguishedName) -> Result<Self> {
        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key.as_spki()?,
            attributes: Default::default(),
        };

        let signature = key.sign_data(&info.to_der()?)?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: key.signature_algorithm().into(),
                signature: der::asn1::BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn subject(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    /// Checks the request's self-signature, proving possession of the private key.
    pub fn verify(&self) -> Result<()> {
        let public_key = PublicKey::from_x509spki(self.public_key_info())?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CaError::DecodingError("request signature has unused bits".to_string())
        })?;
        public_key
            .verify(&self.inner.info.to_der()?, signature)
            .map_err(|e| CaError::SignatureError(format!("signing request: {e}")))
    }

    pub fn to_pem(&self) -> Result<String> {
        let der = self
            .inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        Ok(pem_utils::der_to_pem(
            &der,
            pem_utils::CERTIFICATE_REQUEST_LABEL,
        ))
    }
}
