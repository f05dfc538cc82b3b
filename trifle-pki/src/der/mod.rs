//! ASN.1 Distinguished Encoding Rules codec.
//!
//! Covers the tag set needed for X.500 names, PKCS#10 requests and X.509
//! certificates. Values are built as [`Asn1Type`] trees and encoded into
//! [`DerValue`]s; [`reader`] provides the inverse plus raw TLV access for
//! verifying signatures over the exact signed octets.

pub mod oid;
pub mod reader;
pub mod tag;
pub mod types;
pub mod value;

pub use reader::{read_all, read_single, read_tlv, Tlv, MAX_DEPTH};
pub use tag::{Tag, TagContext};
pub use types::{Asn1Type, BitString};
pub use value::DerValue;

use crate::error::Result;

/// Encode `value` under `context`
pub fn encode(value: &Asn1Type, context: TagContext) -> Result<DerValue> {
    value.encode_with(context)
}

/// Decode a single DER value spanning all of `input`
pub fn decode(input: &[u8]) -> Result<Asn1Type> {
    Asn1Type::from_der(input)
}
