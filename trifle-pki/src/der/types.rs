//! ASN.1 values and their DER encoding.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use super::oid;
use super::reader;
use super::tag::{Tag, TagContext};
use super::value::DerValue;
use crate::error::{Result, TrifleError};

/// BIT STRING content: the bits plus the count of unused trailing bits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitString {
    bytes: Vec<u8>,
    unused_bits: u8,
}

impl BitString {
    /// Every bit of `bytes` is significant (keys, signatures)
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            unused_bits: 0,
        }
    }

    /// Trailing zero bits of the last octet are padding (named bit lists)
    pub fn with_padding(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let unused_bits = match bytes.last() {
            Some(last) if *last != 0 => last.trailing_zeros() as u8,
            _ => 0,
        };
        Self { bytes, unused_bits }
    }

    pub fn new(bytes: impl Into<Vec<u8>>, ignore_padding: bool) -> Self {
        if ignore_padding {
            Self::from_bytes(bytes)
        } else {
            Self::with_padding(bytes)
        }
    }

    pub fn from_parts(bytes: Vec<u8>, unused_bits: u8) -> Result<Self> {
        if unused_bits > 7 || (bytes.is_empty() && unused_bits != 0) {
            return Err(TrifleError::InvalidInput(format!(
                "{unused_bits} unused bits for a {}-octet bit string",
                bytes.len()
            )));
        }
        Ok(Self { bytes, unused_bits })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn unused_bits(&self) -> u8 {
        self.unused_bits
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// An ASN.1 value the codec can encode and decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asn1Type {
    Boolean(bool),
    Integer(i64),
    BitString(BitString),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(Vec<u64>),
    Utf8String(String),
    PrintableString(String),
    Ia5String(String),
    UtcTime(DateTime<Utc>),
    Sequence(Vec<Asn1Type>),
    Set(Vec<Asn1Type>),
    /// A value placed under a context-specific tag inside a constructed value
    Tagged(TagContext, Box<Asn1Type>),
    /// A complete TLV embedded verbatim
    Raw(Vec<u8>),
}

impl Asn1Type {
    pub fn oid(arcs: &[u64]) -> Self {
        Asn1Type::ObjectIdentifier(arcs.to_vec())
    }

    pub fn printable(value: impl Into<String>) -> Self {
        Asn1Type::PrintableString(value.into())
    }

    /// Place this value under `[n] IMPLICIT`
    pub fn implicit(self, n: u8) -> Self {
        Asn1Type::Tagged(TagContext::Implicit(n), Box::new(self))
    }

    /// Place this value under `[n] EXPLICIT`
    pub fn explicit(self, n: u8) -> Self {
        Asn1Type::Tagged(TagContext::Explicit(n), Box::new(self))
    }

    /// Universal tag of this value, `None` for tagged and raw values
    pub fn tag(&self) -> Option<Tag> {
        let tag = match self {
            Asn1Type::Boolean(_) => Tag::Boolean,
            Asn1Type::Integer(_) => Tag::Integer,
            Asn1Type::BitString(_) => Tag::BitString,
            Asn1Type::OctetString(_) => Tag::OctetString,
            Asn1Type::Null => Tag::Null,
            Asn1Type::ObjectIdentifier(_) => Tag::ObjectIdentifier,
            Asn1Type::Utf8String(_) => Tag::Utf8String,
            Asn1Type::PrintableString(_) => Tag::PrintableString,
            Asn1Type::Ia5String(_) => Tag::Ia5String,
            Asn1Type::UtcTime(_) => Tag::UtcTime,
            Asn1Type::Sequence(_) => Tag::Sequence,
            Asn1Type::Set(_) => Tag::Set,
            Asn1Type::Tagged(..) | Asn1Type::Raw(_) => return None,
        };
        Some(tag)
    }

    /// Encode under the universal tag
    pub fn encode(&self) -> Result<DerValue> {
        self.encode_with(TagContext::None)
    }

    /// Encode under `context`
    pub fn encode_with(&self, context: TagContext) -> Result<DerValue> {
        match self {
            Asn1Type::Tagged(inner_context, inner) => {
                if context != TagContext::None {
                    return Err(TrifleError::InvalidInput(
                        "value already carries a tag context".to_string(),
                    ));
                }
                inner.encode_with(*inner_context)
            }
            Asn1Type::Raw(octets) => {
                if context != TagContext::None {
                    return Err(TrifleError::InvalidInput(
                        "raw values cannot be re-tagged".to_string(),
                    ));
                }
                let (tlv, rest) = reader::read_tlv(octets)?;
                if !rest.is_empty() {
                    return Err(TrifleError::InvalidInput(
                        "raw value holds more than one TLV".to_string(),
                    ));
                }
                DerValue::new(tlv.tag, tlv.content.to_vec())
            }
            _ => {
                let tag = self.tag().ok_or_else(|| {
                    TrifleError::InvalidInput("value has no universal tag".to_string())
                })?;
                let universal = DerValue::new(tag.octet(context), self.content()?)?;
                match context {
                    TagContext::Explicit(n) => {
                        DerValue::new(TagContext::explicit_octet(n), universal.into_octets())
                    }
                    _ => Ok(universal),
                }
            }
        }
    }

    /// Encode to the full TLV octets
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.encode()?.into_octets())
    }

    fn content(&self) -> Result<Vec<u8>> {
        match self {
            Asn1Type::Boolean(value) => Ok(vec![if *value { 0xFF } else { 0x00 }]),
            Asn1Type::Integer(value) => Ok(encode_integer(*value)),
            Asn1Type::BitString(bits) => {
                let mut out = Vec::with_capacity(bits.bytes.len() + 1);
                out.push(bits.unused_bits);
                out.extend_from_slice(&bits.bytes);
                Ok(out)
            }
            Asn1Type::OctetString(bytes) => Ok(bytes.clone()),
            Asn1Type::Null => Ok(Vec::new()),
            Asn1Type::ObjectIdentifier(arcs) => oid::encode_arcs(arcs),
            Asn1Type::Utf8String(value) => Ok(value.as_bytes().to_vec()),
            Asn1Type::PrintableString(value) => {
                check_printable(value)?;
                Ok(value.as_bytes().to_vec())
            }
            Asn1Type::Ia5String(value) => {
                check_ia5(value)?;
                Ok(value.as_bytes().to_vec())
            }
            Asn1Type::UtcTime(time) => encode_utc_time(time),
            Asn1Type::Sequence(children) => {
                let mut out = Vec::new();
                for child in children {
                    child.encode()?.write_to(&mut out);
                }
                Ok(out)
            }
            Asn1Type::Set(children) => {
                let mut encoded = children
                    .iter()
                    .enumerate()
                    .map(|(idx, child)| Ok(child.encode()?.with_priority(idx)))
                    .collect::<Result<Vec<_>>>()?;
                sort_set_members(&mut encoded);
                let mut out = Vec::new();
                for member in &encoded {
                    member.write_to(&mut out);
                }
                Ok(out)
            }
            Asn1Type::Tagged(..) | Asn1Type::Raw(_) => Err(TrifleError::InvalidInput(
                "tagged and raw values have no universal content".to_string(),
            )),
        }
    }
}

/// Canonical SET member order: identifier octet first, then the encoded
/// octets, then insertion order. Members with distinct tags therefore keep
/// the `(tag, priority)` order, and equal multisets always encode the same.
pub(crate) fn sort_set_members(members: &mut [DerValue]) {
    members.sort_by(|a, b| {
        a.tag()
            .cmp(&b.tag())
            .then_with(|| a.octets().cmp(&b.octets()))
            .then_with(|| a.priority().cmp(&b.priority()))
    });
}

pub(crate) fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant_zero = bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0;
        let redundant_ones = bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0;
        if !(redundant_zero || redundant_ones) {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

pub(crate) fn is_printable_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '0'..='9'
        | '\'' | '(' | ')' | '+' | ',' | '-' | '.' | '/' | ':' | '=' | '?' | ' ')
}

pub(crate) fn check_printable(value: &str) -> Result<()> {
    match value.chars().find(|c| !is_printable_char(*c)) {
        Some(c) => Err(TrifleError::InvalidInput(format!(
            "character {c:?} is not allowed in a PrintableString"
        ))),
        None => Ok(()),
    }
}

pub(crate) fn check_ia5(value: &str) -> Result<()> {
    if value.is_ascii() {
        Ok(())
    } else {
        Err(TrifleError::InvalidInput(
            "IA5String must be ASCII".to_string(),
        ))
    }
}

fn encode_utc_time(time: &DateTime<Utc>) -> Result<Vec<u8>> {
    if !(1950..=2049).contains(&time.year()) {
        return Err(TrifleError::InvalidInput(format!(
            "year {} cannot be expressed as UTCTime",
            time.year()
        )));
    }
    Ok(time.format("%y%m%d%H%M%SZ").to_string().into_bytes())
}

pub(crate) fn decode_utc_time(content: &[u8]) -> Result<DateTime<Utc>> {
    let invalid = || TrifleError::InvalidInput("malformed UTCTime".to_string());
    if content.len() != 13 || content[12] != b'Z' || !content[..12].iter().all(u8::is_ascii_digit)
    {
        return Err(invalid());
    }
    let field = |idx: usize| ((content[idx] - b'0') * 10 + (content[idx + 1] - b'0')) as u32;

    let yy = field(0) as i32;
    let year = if yy >= 50 { 1900 + yy } else { 2000 + yy };
    Utc.with_ymd_and_hms(year, field(2), field(4), field(6), field(8), field(10))
        .single()
        .ok_or_else(invalid)
}
