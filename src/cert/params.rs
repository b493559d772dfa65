use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, Ia5StringRef, PrintableStringRef, SetOfVec, Utf8StringRef};
use der::Tag;
use der::Tagged;
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CaError, Result};

const OID_COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const OID_LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const OID_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_ORGANIZATION_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_EMAIL_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// Distinguished name of a certificate subject or issuer.
///
/// One optional field per recognised attribute. Only the attributes that are set end up
/// in the encoded name, in the order C, ST, L, O, OU, CN, emailAddress.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
    pub common_name: Option<String>,
    pub email_address: Option<String>,
}

impl DistinguishedName {
    /// A name carrying only a common name.
    pub fn for_common_name(common_name: impl Into<String>) -> Self {
        Self {
            common_name: Some(common_name.into()),
            ..Self::default()
        }
    }

    /// Sets one attribute by its short key (`C`, `ST`, `L`, `O`, `OU`, `CN` or
    /// `emailAddress`). Any other key is rejected.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let slot = match key {
            "C" => &mut self.country,
            "ST" => &mut self.state,
            "L" => &mut self.locality,
            "O" => &mut self.organization,
            "OU" => &mut self.organization_unit,
            "CN" => &mut self.common_name,
            "emailAddress" => &mut self.email_address,
            other => {
                return Err(CaError::InvalidInput(format!(
                    "unrecognised subject attribute `{other}` (expected one of C, ST, L, O, OU, CN, emailAddress)"
                )));
            }
        };
        *slot = Some(value.into());
        Ok(())
    }

    /// Parses a `KEY=VALUE` pair and sets the attribute.
    pub fn set_pair(&mut self, pair: &str) -> Result<()> {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            CaError::InvalidInput(format!("subject attribute `{pair}` is not KEY=VALUE"))
        })?;
        self.set(key.trim(), value.trim())
    }

    /// Converts the distinguished name to an X.509-compatible format.
    pub fn as_x509_name(&self) -> Result<Name> {
        let attributes = [
            (OID_COUNTRY, &self.country),
            (OID_STATE, &self.state),
            (OID_LOCALITY, &self.locality),
            (OID_ORGANIZATION, &self.organization),
            (OID_ORGANIZATION_UNIT, &self.organization_unit),
            (OID_COMMON_NAME, &self.common_name),
            (OID_EMAIL_ADDRESS, &self.email_address),
        ];

        let mut rdns = Vec::new();
        for (oid, value) in attributes {
            let Some(value) = value else { continue };
            let value = encode_attribute_value(oid, value)?;
            let atv = AttributeTypeAndValue { oid, value };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes this type does not model are skipped.
    pub fn from_x509_name(x509dn: &Name) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(text) = attribute_text(&attr.value) else {
                    continue;
                };
                let slot = match attr.oid {
                    OID_COUNTRY => &mut dn.country,
                    OID_STATE => &mut dn.state,
                    OID_LOCALITY => &mut dn.locality,
                    OID_ORGANIZATION => &mut dn.organization,
                    OID_ORGANIZATION_UNIT => &mut dn.organization_unit,
                    OID_COMMON_NAME => &mut dn.common_name,
                    OID_EMAIL_ADDRESS => &mut dn.email_address,
                    _ => continue,
                };
                *slot = Some(text);
            }
        }

        dn
    }
}

fn encode_attribute_value(oid: ObjectIdentifier, value: &str) -> Result<Any> {
    let invalid = |e: der::Error| CaError::InvalidInput(format!("subject attribute {oid}: {e}"));
    let any = match oid {
        OID_COUNTRY => Any::encode_from(&PrintableStringRef::new(value).map_err(invalid)?),
        OID_EMAIL_ADDRESS => Any::encode_from(&Ia5StringRef::new(value).map_err(invalid)?),
        _ => Any::encode_from(&Utf8StringRef::new(value).map_err(invalid)?),
    };
    Ok(any?)
}

fn attribute_text(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String => value.decode_as::<Utf8StringRef<'_>>().ok().map(|s| s.to_string()),
        Tag::PrintableString => value
            .decode_as::<PrintableStringRef<'_>>()
            .ok()
            .map(|s| s.to_string()),
        Tag::Ia5String => value.decode_as::<Ia5StringRef<'_>>().ok().map(|s| s.to_string()),
        _ => None,
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    ///
    /// An end date past what a certificate can express is `InvalidInput`.
    pub fn for_days(days: i64) -> Result<Self> {
        let now = OffsetDateTime::now_utc();
        let not_after = days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|seconds| now.checked_add(Duration::seconds(seconds)))
            .ok_or_else(|| {
                CaError::InvalidInput(format!("a validity of {days} days is out of range"))
            })?;
        Ok(Self {
            not_before: now,
            not_after,
        })
    }

    /// Creates a validity period starting now and lasting `years` × 365 days.
    pub fn for_years(years: u32) -> Result<Self> {
        if years == 0 {
            return Err(CaError::InvalidInput(
                "validity must be at least one year".to_string(),
            ));
        }
        Self::for_days(i64::from(years) * 365)
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_accepts_only_known_attributes() {
        let mut dn = DistinguishedName::for_common_name("web1");
        dn.set("O", "Example Corp").unwrap();
        dn.set_pair("emailAddress = ops@example.com").unwrap();
        assert_eq!(dn.organization.as_deref(), Some("Example Corp"));
        assert_eq!(dn.email_address.as_deref(), Some("ops@example.com"));

        assert!(matches!(
            dn.set("favouriteColour", "blue"),
            Err(CaError::InvalidInput(_))
        ));
        assert!(dn.set_pair("no-equals-sign").is_err());
    }

    #[test]
    fn test_x509_name_round_trip() {
        let dn = DistinguishedName::builder()
            .common_name("server.example.com".to_string())
            .organization("Example Corp".to_string())
            .organization_unit("Platform".to_string())
            .country("US".to_string())
            .state("California".to_string())
            .locality("San Francisco".to_string())
            .email_address("ops@example.com".to_string())
            .build();

        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 7);
        assert_eq!(DistinguishedName::from_x509_name(&name), dn);
    }

    #[test]
    fn test_absent_attributes_are_not_encoded() {
        let name = DistinguishedName::for_common_name("root").as_x509_name().unwrap();
        assert_eq!(name.0.len(), 1);
        assert_eq!(name.to_string(), "CN=root");
    }

    #[test]
    fn test_country_must_be_printable() {
        let dn = DistinguishedName::builder().country("U@".to_string()).build();
        assert!(matches!(dn.as_x509_name(), Err(CaError::InvalidInput(_))));
    }

    #[test]
    fn test_validity_in_years() {
        let validity = Validity::for_years(5).unwrap();
        assert_eq!(validity.not_after - validity.not_before, Duration::days(5 * 365));
        assert!(Validity::for_years(0).is_err());
    }

    #[test]
    fn test_validity_past_year_9999_is_rejected() {
        assert!(matches!(
            Validity::for_years(10_000),
            Err(CaError::InvalidInput(_))
        ));
        assert!(matches!(
            Validity::for_days(i64::MAX),
            Err(CaError::InvalidInput(_))
        ));
        assert!(Validity::for_years(100).is_ok());
    }
}
