use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::name::GeneralName;

use super::params::{DistinguishedName, ExtensionParam};
use crate::error::{CaError, Result};
use crate::tbs_certificate::TbsCertificate;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use localca::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
/// let san: SubjectAltName = "DNS:example.com, IP:10.0.0.1".parse().unwrap();
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// An extension to put on a certificate being signed.
///
/// Most extensions are known up front. Some, like the key identifiers, are a function
/// of the certificate itself and are evaluated against the assembled but unsigned
/// certificate, after every extension before them has been applied.
pub enum Extension {
    Literal(ExtensionParam),
    DerivedFromCertificate(Box<dyn Fn(&TbsCertificate) -> Result<ExtensionParam>>),
}

impl Extension {
    pub fn literal<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Extension::Literal(ExtensionParam::from_extension(
            extension, critical,
        )?))
    }

    pub fn derived<F>(derive: F) -> Self
    where
        F: Fn(&TbsCertificate) -> Result<ExtensionParam> + 'static,
    {
        Extension::DerivedFromCertificate(Box::new(derive))
    }

    /// `subjectKeyIdentifier=hash`: SHA-1 of the certificate's own public key.
    pub fn subject_key_identifier() -> Self {
        Self::derived(|tbs| {
            let key_identifier = crate::key::key_identifier_for_spki(&tbs.subject_public_key_info);
            ExtensionParam::from_extension(SubjectKeyIdentifier { key_identifier }, false)
        })
    }

    /// `authorityKeyIdentifier=keyid:always` for a self-signed certificate: the issuer
    /// is the certificate itself, so the key id is taken from its subject key identifier
    /// (or computed from its own public key when there is none).
    pub fn self_authority_key_identifier() -> Self {
        Self::derived(|tbs| {
            let key_identifier = match tbs.find_extension::<SubjectKeyIdentifier>()? {
                Some(ski) => ski.key_identifier,
                None => crate::key::key_identifier_for_spki(&tbs.subject_public_key_info),
            };
            ExtensionParam::from_extension(
                AuthorityKeyIdentifier {
                    key_identifier: Some(key_identifier),
                    authority_cert_issuer: None,
                    authority_cert_serial_number: None,
                },
                false,
            )
        })
    }

    /// Evaluates this extension against the certificate under construction.
    pub fn evaluate(&self, tbs: &TbsCertificate) -> Result<ExtensionParam> {
        match self {
            Extension::Literal(param) => Ok(param.clone()),
            Extension::DerivedFromCertificate(derive) => derive(tbs),
        }
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extension::Literal(param) => f.debug_tuple("Literal").field(param).finish(),
            Extension::DerivedFromCertificate(_) => f.write_str("DerivedFromCertificate(..)"),
        }
    }
}

/// One entry of a Subject Alternative Name extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltName {
    Dns(String),
    Ip(IpAddr),
    Email(String),
    Uri(String),
}

impl FromStr for AltName {
    type Err = CaError;

    /// Parses one OpenSSL-style entry such as `DNS:example.com` or `IP:10.0.0.1`.
    /// An entry without a type prefix is a DNS name.
    fn from_str(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let Some((kind, value)) = entry.split_once(':') else {
            return Ok(AltName::Dns(entry.to_string()));
        };
        let value = value.trim();
        match kind.trim().to_ascii_uppercase().as_str() {
            "DNS" => Ok(AltName::Dns(value.to_string())),
            "IP" => value.parse::<IpAddr>().map(AltName::Ip).map_err(|e| {
                CaError::InvalidInput(format!("invalid IP alternative name `{value}`: {e}"))
            }),
            "EMAIL" => Ok(AltName::Email(value.to_string())),
            "URI" => Ok(AltName::Uri(value.to_string())),
            other => Err(CaError::InvalidInput(format!(
                "unsupported alternative name type `{other}`"
            ))),
        }
    }
}

impl fmt::Display for AltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltName::Dns(name) => write!(f, "DNS:{name}"),
            AltName::Ip(ip) => write!(f, "IP:{ip}"),
            AltName::Email(email) => write!(f, "email:{email}"),
            AltName::Uri(uri) => write!(f, "URI:{uri}"),
        }
    }
}

impl AltName {
    fn to_general_name(&self) -> Result<GeneralName> {
        let ia5 = |s: &str| {
            Ia5String::try_from(s.to_string()).map_err(|e| CaError::InvalidInput(e.to_string()))
        };
        Ok(match self {
            AltName::Dns(name) => GeneralName::DnsName(ia5(name)?),
            AltName::Email(email) => GeneralName::Rfc822Name(ia5(email)?),
            AltName::Uri(uri) => GeneralName::UniformResourceIdentifier(ia5(uri)?),
            AltName::Ip(IpAddr::V4(ip)) => GeneralName::IpAddress(OctetString::new(ip.octets())?),
            AltName::Ip(IpAddr::V6(ip)) => GeneralName::IpAddress(OctetString::new(ip.octets())?),
        })
    }

    fn from_general_name(name: &GeneralName) -> Result<Self> {
        match name {
            GeneralName::DnsName(dns) => Ok(AltName::Dns(dns.to_string())),
            GeneralName::Rfc822Name(email) => Ok(AltName::Email(email.to_string())),
            GeneralName::UniformResourceIdentifier(uri) => Ok(AltName::Uri(uri.to_string())),
            GeneralName::IpAddress(octets) => match octets.as_bytes() {
                &[a, b, c, d] => Ok(AltName::Ip(IpAddr::from([a, b, c, d]))),
                bytes => <[u8; 16]>::try_from(bytes)
                    .map(|v6| AltName::Ip(IpAddr::from(v6)))
                    .map_err(|_| {
                        CaError::DecodingError("IP alternative name has a bad length".to_string())
                    }),
            },
            _ => Err(CaError::DecodingError(
                "unsupported general name type in subject alternative name".to_string(),
            )),
        }
    }
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// This extension specifies additional identities for the subject of the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<AltName>,
}

impl FromStr for SubjectAltName {
    type Err = CaError;

    /// Parses a comma separated list of entries, e.g.
    /// `DNS:example.com, DNS:www.example.com, IP:127.0.0.1`.
    fn from_str(s: &str) -> Result<Self> {
        let names = s
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(AltName::from_str)
            .collect::<Result<Vec<_>>>()?;
        if names.is_empty() {
            return Err(CaError::InvalidInput(
                "alternative names list is empty".to_string(),
            ));
        }
        Ok(Self { names })
    }
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(AltName::to_general_name)
                .collect::<Result<Vec<_>>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .map(AltName::from_general_name)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension.
///
/// This extension indicates whether the certificate is a CA certificate and its path length.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(X509KeyUsage(self.0).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
///
/// This extension indicates purposes for which the public key may be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .iter()
            .map(|v| match *v {
                const_oid::db::rfc5912::ID_KP_OCSP_SIGNING => {
                    Ok(ExtendedKeyUsageOption::OcspSigning)
                }
                const_oid::db::rfc5912::ID_KP_SERVER_AUTH => Ok(ExtendedKeyUsageOption::ServerAuth),
                const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => Ok(ExtendedKeyUsageOption::ClientAuth),
                const_oid::db::rfc5912::ID_KP_CODE_SIGNING => {
                    Ok(ExtendedKeyUsageOption::CodeSigning)
                }
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION => {
                    Ok(ExtendedKeyUsageOption::EmailProtection)
                }
                const_oid::db::rfc5912::ID_KP_TIME_STAMPING => {
                    Ok(ExtendedKeyUsageOption::TimeStamping)
                }
                _ => Err(CaError::InvalidInput(
                    "Unsupported extended key usage option".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::OcspSigning => const_oid::db::rfc5912::ID_KP_OCSP_SIGNING,
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => const_oid::db::rfc5912::ID_KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => {
                const_oid::db::rfc5912::ID_KP_EMAIL_PROTECTION
            }
            ExtendedKeyUsageOption::TimeStamping => const_oid::db::rfc5912::ID_KP_TIME_STAMPING,
        }
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(
            self.key_identifier.as_slice(),
        )?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self {
            key_identifier: ski.0.as_bytes().to_vec(),
        })
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// This extension identifies the public key corresponding to the private key used to sign the certificate.
///
/// # Fields
/// * `key_identifier` - The key identifier.
/// * `authority_cert_issuer` - The issuer's distinguished name.
/// * `authority_cert_serial_number` - The issuer's certificate serial number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Option<Vec<u8>>,
    pub authority_cert_issuer: Option<DistinguishedName>,
    pub authority_cert_serial_number: Option<Vec<u8>>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let authority_cert_issuer = match &self.authority_cert_issuer {
            Some(dn) => Some(vec![GeneralName::DirectoryName(dn.as_x509_name()?)]),
            None => None,
        };

        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: self
                .key_identifier
                .as_deref()
                .map(OctetString::new)
                .transpose()?,
            authority_cert_issuer,
            authority_cert_serial_number: self
                .authority_cert_serial_number
                .as_deref()
                .map(x509_cert::serial_number::SerialNumber::new)
                .transpose()?,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        let authority_cert_issuer = aki.authority_cert_issuer.as_ref().and_then(|names| {
            names.iter().find_map(|name| match name {
                GeneralName::DirectoryName(dn) => Some(DistinguishedName::from_x509_name(dn)),
                _ => None,
            })
        });

        Ok(Self {
            key_identifier: aki.key_identifier.map(|id| id.as_bytes().to_vec()),
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .map(|sn| sn.as_bytes().to_vec()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_constraints_encoding_decoding() {
        let original = BasicConstraints {
            is_ca: true,
            max_path_length: Some(0),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_authority_key_identifier_key_id_only() {
        let original = AuthorityKeyIdentifier {
            key_identifier: Some(vec![1, 2, 3, 4, 5]),
            ..Default::default()
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = AuthorityKeyIdentifier::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_authority_key_identifier_with_issuer() {
        let original = AuthorityKeyIdentifier {
            key_identifier: Some(vec![9; 20]),
            authority_cert_issuer: Some(DistinguishedName::for_common_name("Test CA")),
            authority_cert_serial_number: Some(vec![6, 7, 8, 9, 10]),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = AuthorityKeyIdentifier::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_key_usage_encoding_decoding() {
        let original = KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign);
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = KeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_extended_key_usage_encoding_decoding() {
        let original = ExtendedKeyUsage {
            usage: vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
            ],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = ExtendedKeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original.usage, decoded.usage);
    }

    #[test]
    fn test_alt_names_openssl_syntax() {
        let san: SubjectAltName =
            "DNS:example.com, www.example.com, IP:127.0.0.1, IP:::1, email:ops@example.com, URI:https://example.com/"
                .parse()
                .unwrap();
        assert_eq!(
            san.names,
            vec![
                AltName::Dns("example.com".to_string()),
                AltName::Dns("www.example.com".to_string()),
                AltName::Ip("127.0.0.1".parse().unwrap()),
                AltName::Ip("::1".parse().unwrap()),
                AltName::Email("ops@example.com".to_string()),
                AltName::Uri("https://example.com/".to_string()),
            ]
        );

        let encoded = san.to_x509_extension_value().unwrap();
        let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(san, decoded);
    }

    #[test]
    fn test_alt_names_rejects_bad_entries() {
        assert!("IP:not-an-ip".parse::<SubjectAltName>().is_err());
        assert!("otherName:foo".parse::<SubjectAltName>().is_err());
        assert!(" , ".parse::<SubjectAltName>().is_err());
    }

    #[test]
    fn test_unsupported_general_name_is_a_decoding_error() {
        let name = DistinguishedName::for_common_name("Directory Entry")
            .as_x509_name()
            .unwrap();
        let san = x509_cert::ext::pkix::SubjectAltName(vec![
            GeneralName::DnsName(Ia5String::new("ok.example").unwrap()),
            GeneralName::DirectoryName(name),
        ]);
        let encoded = san.to_der().unwrap();
        assert!(matches!(
            SubjectAltName::from_x509_extension_value(&encoded),
            Err(CaError::DecodingError(_))
        ));
    }

    #[test]
    fn test_subject_key_identifier_encoding_decoding() {
        let original = SubjectKeyIdentifier {
            key_identifier: vec![0xab; 20],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        assert_eq!(
            SubjectKeyIdentifier::from_x509_extension_value(&encoded).unwrap(),
            original
        );
    }
}
