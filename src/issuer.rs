use std::collections::HashSet;

use der::Encode;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::Extension;
use crate::cert::params::Validity;
use crate::error::{CaError, Result};
use crate::key::KeyPair;
use crate::request::SigningRequest;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Issues a certificate for a signing request.
    ///
    /// The certificate takes its subject and public key from the request, its issuer name
    /// from this issuer, and carries `serial`. Extensions are applied in order; derived
    /// extensions see the unsigned certificate with every earlier extension in place.
    /// The request's own signature is verified first.
    fn issue(
        &self,
        request: &SigningRequest,
        serial: u64,
        validity: Validity,
        extensions: &[Extension],
    ) -> Result<Certificate> {
        request.verify()?;

        let signature_algorithm = self.signing_key().signature_algorithm();
        let mut tbs_cert = TbsCertificate {
            serial_number: serial,
            signature_algorithm,
            issuer: self.issuer_name(),
            validity,
            subject: request.subject().clone(),
            subject_public_key_info: request.public_key_info().clone(),
            extensions: Vec::with_capacity(extensions.len()),
        };

        let mut seen = HashSet::new();
        for extension in extensions {
            let param = extension.evaluate(&tbs_cert)?;
            if !seen.insert(param.oid) {
                return Err(CaError::InvalidInput(format!(
                    "extension {} given more than once",
                    param.oid
                )));
            }
            tbs_cert.extensions.push(param);
        }

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}
