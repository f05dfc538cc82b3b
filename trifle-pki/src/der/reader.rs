//! DER decoding: a TLV reader and the inverse of [`Asn1Type::encode`].

use super::oid;
use super::tag::{Tag, TagContext, CONSTRUCTED, CONTEXT_SPECIFIC};
use super::types::{check_ia5, check_printable, decode_utc_time, Asn1Type, BitString};
use super::value::decode_length;
use crate::error::{Result, TrifleError};

/// Deepest constructed nesting [`Asn1Type::from_tlv`] will follow
pub const MAX_DEPTH: usize = 32;

/// One TLV borrowed from an input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Identifier octet
    pub tag: u8,
    /// Value octets
    pub content: &'a [u8],
    /// The complete TLV, identifier and length octets included
    pub raw: &'a [u8],
}

impl<'a> Tlv<'a> {
    pub fn is_constructed(&self) -> bool {
        self.tag & CONSTRUCTED != 0
    }

    /// Fail unless this TLV carries the universal `tag`
    pub fn expect(&self, tag: Tag) -> Result<&Self> {
        if self.tag != tag.octet(TagContext::None) {
            return Err(TrifleError::InvalidInput(format!(
                "expected {tag:?}, found tag 0x{:02x}",
                self.tag
            )));
        }
        Ok(self)
    }

    /// Child TLVs of a constructed value
    pub fn children(&self) -> Result<Vec<Tlv<'a>>> {
        if !self.is_constructed() {
            return Err(TrifleError::InvalidInput(format!(
                "tag 0x{:02x} is not constructed",
                self.tag
            )));
        }
        read_all(self.content)
    }
}

/// Read the first TLV of `input`, returning it and the remaining octets
pub fn read_tlv(input: &[u8]) -> Result<(Tlv<'_>, &[u8])> {
    let tag = *input
        .first()
        .ok_or_else(|| TrifleError::InvalidInput("unexpected end of DER input".to_string()))?;
    if tag & 0x1F == 0x1F {
        return Err(TrifleError::UnsupportedOperation(
            "high tag numbers are not supported".to_string(),
        ));
    }

    let (len, len_octets) = decode_length(&input[1..])?;
    let header = 1 + len_octets;
    let end = header
        .checked_add(len)
        .filter(|end| *end <= input.len())
        .ok_or_else(|| {
            TrifleError::InvalidInput(format!(
                "value of {len} octets overruns the {} available",
                input.len() - header
            ))
        })?;

    Ok((
        Tlv {
            tag,
            content: &input[header..end],
            raw: &input[..end],
        },
        &input[end..],
    ))
}

/// Read exactly one TLV spanning all of `input`
pub fn read_single(input: &[u8]) -> Result<Tlv<'_>> {
    let (tlv, rest) = read_tlv(input)?;
    if !rest.is_empty() {
        return Err(TrifleError::InvalidInput(format!(
            "{} trailing octets after DER value",
            rest.len()
        )));
    }
    Ok(tlv)
}

/// Read consecutive TLVs until `input` is exhausted
pub fn read_all(mut input: &[u8]) -> Result<Vec<Tlv<'_>>> {
    let mut out = Vec::new();
    while !input.is_empty() {
        let (tlv, rest) = read_tlv(input)?;
        out.push(tlv);
        input = rest;
    }
    Ok(out)
}

impl Asn1Type {
    /// Decode a single value spanning all of `input`
    pub fn from_der(input: &[u8]) -> Result<Self> {
        Self::from_tlv(&read_single(input)?)
    }

    /// Decode the first value of `input`, returning the remaining octets
    pub fn decode(input: &[u8]) -> Result<(Self, &[u8])> {
        let (tlv, rest) = read_tlv(input)?;
        Ok((Self::from_tlv(&tlv)?, rest))
    }

    pub fn from_tlv(tlv: &Tlv<'_>) -> Result<Self> {
        Self::from_tlv_at(tlv, 0)
    }

    fn from_tlv_at(tlv: &Tlv<'_>, depth: usize) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(TrifleError::InvalidInput(format!(
                "DER nesting deeper than {MAX_DEPTH} levels"
            )));
        }
        match Tag::from_octet(tlv.tag) {
            Some(tag) => decode_universal(tag, tlv, depth),
            None if tlv.tag & 0xC0 == CONTEXT_SPECIFIC && tlv.is_constructed() => {
                // A single inner TLV reads back as an explicit tag, so a
                // one-element implicit SET/SEQUENCE only round-trips at the
                // octet level. Anything else is kept verbatim since its
                // implicit type is unknown here.
                match read_tlv(tlv.content) {
                    Ok((inner, rest)) if rest.is_empty() => Ok(Asn1Type::Tagged(
                        TagContext::Explicit(tlv.tag & 0x0F),
                        Box::new(Self::from_tlv_at(&inner, depth + 1)?),
                    )),
                    _ => Ok(Asn1Type::Raw(tlv.raw.to_vec())),
                }
            }
            None => Ok(Asn1Type::Raw(tlv.raw.to_vec())),
        }
    }
}

fn decode_universal(tag: Tag, tlv: &Tlv<'_>, depth: usize) -> Result<Asn1Type> {
    let content = tlv.content;
    let value = match tag {
        Tag::Boolean => match content {
            [0xFF] => Asn1Type::Boolean(true),
            [0x00] => Asn1Type::Boolean(false),
            _ => {
                return Err(TrifleError::InvalidInput(
                    "BOOLEAN must be a single 0x00 or 0xFF octet".to_string(),
                ))
            }
        },
        Tag::Integer => Asn1Type::Integer(decode_integer(content)?),
        Tag::BitString => {
            let (unused, bits) = content.split_first().ok_or_else(|| {
                TrifleError::InvalidInput("BIT STRING without unused-bits octet".to_string())
            })?;
            Asn1Type::BitString(BitString::from_parts(bits.to_vec(), *unused)?)
        }
        Tag::OctetString => Asn1Type::OctetString(content.to_vec()),
        Tag::Null => {
            if !content.is_empty() {
                return Err(TrifleError::InvalidInput(
                    "NULL must have empty content".to_string(),
                ));
            }
            Asn1Type::Null
        }
        Tag::ObjectIdentifier => Asn1Type::ObjectIdentifier(oid::decode_arcs(content)?),
        Tag::Utf8String => Asn1Type::Utf8String(utf8(content)?),
        Tag::PrintableString => {
            let value = utf8(content)?;
            check_printable(&value)?;
            Asn1Type::PrintableString(value)
        }
        Tag::Ia5String => {
            let value = utf8(content)?;
            check_ia5(&value)?;
            Asn1Type::Ia5String(value)
        }
        Tag::UtcTime => Asn1Type::UtcTime(decode_utc_time(content)?),
        Tag::Sequence => Asn1Type::Sequence(decode_children(tlv, depth)?),
        Tag::Set => Asn1Type::Set(decode_children(tlv, depth)?),
    };
    Ok(value)
}

fn decode_children(tlv: &Tlv<'_>, depth: usize) -> Result<Vec<Asn1Type>> {
    tlv.children()?
        .iter()
        .map(|child| Asn1Type::from_tlv_at(child, depth + 1))
        .collect()
}

fn decode_integer(content: &[u8]) -> Result<i64> {
    match content {
        [] => Err(TrifleError::InvalidInput("empty INTEGER".to_string())),
        [first, second, ..]
            if (*first == 0x00 && second & 0x80 == 0) || (*first == 0xFF && second & 0x80 != 0) =>
        {
            Err(TrifleError::InvalidInput(
                "INTEGER is not minimally encoded".to_string(),
            ))
        }
        _ if content.len() > 8 => Err(TrifleError::Unhandled(format!(
            "INTEGER of {} octets exceeds 64 bits",
            content.len()
        ))),
        _ => {
            let seed: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
            Ok(content
                .iter()
                .fold(seed, |acc, byte| (acc << 8) | *byte as i64))
        }
    }
}

fn utf8(content: &[u8]) -> Result<String> {
    String::from_utf8(content.to_vec())
        .map_err(|e| TrifleError::InvalidInput(format!("invalid string content: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_decoding_sign_extends() {
        assert_eq!(decode_integer(&[0x00, 0x80]).unwrap(), 128);
        assert_eq!(decode_integer(&[0xFF, 0x7F]).unwrap(), -129);
        assert_eq!(decode_integer(&[0x80]).unwrap(), -128);
        assert_eq!(
            decode_integer(&[0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            i64::MAX
        );
    }

    #[test]
    fn integer_decoding_rejects_padding() {
        assert!(decode_integer(&[0x00, 0x01]).is_err());
        assert!(decode_integer(&[0xFF, 0x80]).is_err());
        assert!(decode_integer(&[]).is_err());
        assert!(decode_integer(&[0x01; 9]).is_err());
    }

    #[test]
    fn reader_exposes_raw_children() {
        let der = [0x30, 0x06, 0x02, 0x01, 0x05, 0x01, 0x01, 0xFF];
        let tlv = read_single(&der).unwrap();
        let children = tlv.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].raw, &[0x02, 0x01, 0x05]);
        assert_eq!(children[1].content, &[0xFF]);
    }

    #[test]
    fn reader_rejects_overruns_and_trailing_data() {
        assert!(read_tlv(&[0x04, 0x05, 0x00]).is_err());
        assert!(read_single(&[0x05, 0x00, 0x00]).is_err());
        assert!(read_tlv(&[0x1F, 0x01, 0x00]).is_err());
    }

    #[test]
    fn explicit_tag_reads_back() {
        let der = [0xA0, 0x03, 0x02, 0x01, 0x02];
        assert_eq!(
            Asn1Type::from_der(&der).unwrap(),
            Asn1Type::Integer(2).explicit(0)
        );
    }

    #[test]
    fn nesting_is_bounded() {
        fn nested(levels: usize) -> Vec<u8> {
            (0..levels).fold(vec![0x05, 0x00], |inner, _| {
                let mut outer = vec![0x30, inner.len() as u8];
                outer.extend_from_slice(&inner);
                outer
            })
        }
        assert!(Asn1Type::from_der(&nested(MAX_DEPTH)).is_ok());
        assert!(matches!(
            Asn1Type::from_der(&nested(MAX_DEPTH + 1)),
            Err(TrifleError::InvalidInput(_))
        ));
    }

    #[test]
    fn primitive_context_tag_stays_raw() {
        let der = [0x81, 0x01, 0x07];
        assert_eq!(Asn1Type::from_der(&der).unwrap(), Asn1Type::Raw(der.to_vec()));
    }
}
