//! X.500 distinguished names and PKCS#9 attributes.

use crate::der::Asn1Type;
use crate::error::{Result, TrifleError};

pub const OID_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
pub const OID_COUNTRY_NAME: &[u64] = &[2, 5, 4, 6];
pub const OID_LOCALITY_NAME: &[u64] = &[2, 5, 4, 7];
pub const OID_STATE_OR_PROVINCE_NAME: &[u64] = &[2, 5, 4, 8];
pub const OID_ORGANIZATION_NAME: &[u64] = &[2, 5, 4, 10];
pub const OID_ORGANIZATION_UNIT_NAME: &[u64] = &[2, 5, 4, 11];

pub const OID_CHALLENGE_PASSWORD: &[u64] = &[1, 2, 840, 113_549, 1, 9, 7];

/// One component of a subject or issuer name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DistinguishedName {
    CommonName(String),
    CountryName(String),
    Locality(String),
    StateOrProvinceName(String),
    OrganizationName(String),
    OrganizationUnitName(String),
}

impl DistinguishedName {
    pub fn oid(&self) -> &'static [u64] {
        match self {
            DistinguishedName::CommonName(_) => OID_COMMON_NAME,
            DistinguishedName::CountryName(_) => OID_COUNTRY_NAME,
            DistinguishedName::Locality(_) => OID_LOCALITY_NAME,
            DistinguishedName::StateOrProvinceName(_) => OID_STATE_OR_PROVINCE_NAME,
            DistinguishedName::OrganizationName(_) => OID_ORGANIZATION_NAME,
            DistinguishedName::OrganizationUnitName(_) => OID_ORGANIZATION_UNIT_NAME,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            DistinguishedName::CommonName(v)
            | DistinguishedName::CountryName(v)
            | DistinguishedName::Locality(v)
            | DistinguishedName::StateOrProvinceName(v)
            | DistinguishedName::OrganizationName(v)
            | DistinguishedName::OrganizationUnitName(v) => v,
        }
    }

    pub fn attribute_type_value(&self) -> AttributeTypeValue {
        AttributeTypeValue {
            oid: self.oid().to_vec(),
            value: self.value().to_string(),
        }
    }

    /// Parse a `CN=...,O=...,C=...` subject string.
    ///
    /// Recognized keys are `CN`, `C`, `L`, `ST`, `O` and `OU`; any other key
    /// is rejected rather than dropped.
    pub fn parse_list(subject: &str) -> Result<Vec<DistinguishedName>> {
        let mut names = Vec::new();
        for component in subject.split(',') {
            let component = component.trim();
            if component.is_empty() {
                continue;
            }
            let (key, value) = component.split_once('=').ok_or_else(|| {
                TrifleError::InvalidInput(format!("subject component '{component}' has no '='"))
            })?;
            let value = value.trim().to_string();
            let name = match key.trim() {
                "CN" => DistinguishedName::CommonName(value),
                "C" => DistinguishedName::CountryName(value),
                "L" => DistinguishedName::Locality(value),
                "ST" => DistinguishedName::StateOrProvinceName(value),
                "O" => DistinguishedName::OrganizationName(value),
                "OU" => DistinguishedName::OrganizationUnitName(value),
                other => {
                    return Err(TrifleError::InvalidInput(format!(
                        "unsupported subject attribute '{other}'"
                    )))
                }
            };
            names.push(name);
        }
        if names.is_empty() {
            return Err(TrifleError::InvalidInput("empty subject".to_string()));
        }
        Ok(names)
    }
}

/// `AttributeTypeAndValue ::= SEQUENCE { type OID, value PrintableString }`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeTypeValue {
    pub oid: Vec<u64>,
    pub value: String,
}

impl AttributeTypeValue {
    pub fn to_asn1(&self) -> Asn1Type {
        Asn1Type::Sequence(vec![
            Asn1Type::ObjectIdentifier(self.oid.clone()),
            Asn1Type::PrintableString(self.value.clone()),
        ])
    }
}

/// Encode a name as `SEQUENCE { SET { AttributeTypeAndValue... } }`.
///
/// Requests and certificates built here use this single-RDN form so the
/// issuer can copy a request subject into a certificate octet for octet.
pub fn name_to_asn1(names: &[DistinguishedName]) -> Asn1Type {
    Asn1Type::Sequence(vec![Asn1Type::Set(
        names
            .iter()
            .map(|name| name.attribute_type_value().to_asn1())
            .collect(),
    )])
}

/// `Attribute ::= SEQUENCE { type OID, values SET OF ANY }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub oid: Vec<u64>,
    pub values: Vec<Asn1Type>,
}

impl Attribute {
    pub fn new(oid: &[u64], values: Vec<Asn1Type>) -> Self {
        Self {
            oid: oid.to_vec(),
            values,
        }
    }

    /// PKCS#9 challenge password
    pub fn challenge_password(password: impl Into<String>) -> Self {
        Self::new(
            OID_CHALLENGE_PASSWORD,
            vec![Asn1Type::Utf8String(password.into())],
        )
    }

    pub fn to_asn1(&self) -> Asn1Type {
        Asn1Type::Sequence(vec![
            Asn1Type::ObjectIdentifier(self.oid.clone()),
            Asn1Type::Set(self.values.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_name_renders_as_attribute_type_value() {
        let der = DistinguishedName::CommonName("hi".to_string())
            .attribute_type_value()
            .to_asn1()
            .to_der()
            .unwrap();
        assert_eq!(
            der,
            vec![0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x03, 0x13, 0x02, 0x68, 0x69]
        );
    }

    #[test]
    fn parse_list_maps_known_keys() {
        let names = DistinguishedName::parse_list("CN=device 1, O=Trifle, OU=Mobile, C=US").unwrap();
        assert_eq!(
            names,
            vec![
                DistinguishedName::CommonName("device 1".to_string()),
                DistinguishedName::OrganizationName("Trifle".to_string()),
                DistinguishedName::OrganizationUnitName("Mobile".to_string()),
                DistinguishedName::CountryName("US".to_string()),
            ]
        );
    }

    #[test]
    fn parse_list_rejects_unknown_keys() {
        assert!(DistinguishedName::parse_list("CN=x,EMAIL=a@b").is_err());
        assert!(DistinguishedName::parse_list("CN").is_err());
        assert!(DistinguishedName::parse_list("  ").is_err());
    }

    #[test]
    fn name_with_illegal_characters_fails_to_encode() {
        let name = name_to_asn1(&[DistinguishedName::CommonName("hi@me.com".to_string())]);
        assert!(matches!(name.to_der(), Err(TrifleError::InvalidInput(_))));
    }

    #[test]
    fn challenge_password_attribute() {
        let der = Attribute::challenge_password("pw").to_asn1().to_der().unwrap();
        assert_eq!(der[0], 0x30);
        assert_eq!(&der[2..13], &[0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x07]);
        assert_eq!(&der[13..], &[0x31, 0x04, 0x0C, 0x02, b'p', b'w']);
    }
}
