//! Encoded TLV values and length octets.

use crate::error::{Result, TrifleError};

/// Largest number of length octets the long form can announce
const MAX_LENGTH_OCTETS: usize = 126;

/// A DER-encoded value split into its tag, length and value octets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerValue {
    tag: u8,
    length: Vec<u8>,
    value: Vec<u8>,
    priority: usize,
}

impl DerValue {
    /// Build a value from its identifier octet and content, computing the length octets
    pub fn new(tag: u8, value: Vec<u8>) -> Result<Self> {
        let length = encode_length(value.len())?;
        Ok(Self {
            tag,
            length,
            value,
            priority: 0,
        })
    }

    /// Insertion order used to keep Set sorting stable
    pub fn with_priority(mut self, priority: usize) -> Self {
        self.priority = priority;
        self
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn length_octets(&self) -> &[u8] {
        &self.length
    }

    pub fn value_octets(&self) -> &[u8] {
        &self.value
    }

    pub fn priority(&self) -> usize {
        self.priority
    }

    /// Total size of the TLV in octets
    pub fn encoded_len(&self) -> usize {
        1 + self.length.len() + self.value.len()
    }

    /// Append the full TLV to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.tag);
        out.extend_from_slice(&self.length);
        out.extend_from_slice(&self.value);
    }

    /// The full TLV
    pub fn octets(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out);
        out
    }

    /// Consume the value and return the full TLV
    pub fn into_octets(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.tag);
        out.extend_from_slice(&self.length);
        out.extend(self.value);
        out
    }
}

/// Encode a content length in short or long form
pub fn encode_length(len: usize) -> Result<Vec<u8>> {
    if len < 0x80 {
        return Ok(vec![len as u8]);
    }

    let bytes = len.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let significant = &bytes[first..];
    if significant.len() > MAX_LENGTH_OCTETS {
        return Err(TrifleError::Unhandled(format!(
            "length {len} needs {} length octets",
            significant.len()
        )));
    }

    let mut out = Vec::with_capacity(significant.len() + 1);
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
    Ok(out)
}

/// Decode length octets at the start of `input`.
///
/// Returns the content length and the number of octets consumed. Only the
/// definite, minimal forms allowed by DER are accepted.
pub fn decode_length(input: &[u8]) -> Result<(usize, usize)> {
    let first = *input
        .first()
        .ok_or_else(|| TrifleError::InvalidInput("missing length octet".to_string()))?;

    if first < 0x80 {
        return Ok((first as usize, 1));
    }
    if first == 0x80 {
        return Err(TrifleError::InvalidInput(
            "indefinite length is not allowed in DER".to_string(),
        ));
    }

    let count = (first & 0x7F) as usize;
    if count > MAX_LENGTH_OCTETS {
        return Err(TrifleError::InvalidInput(format!(
            "reserved length form 0x{first:02x}"
        )));
    }
    if count > std::mem::size_of::<usize>() {
        return Err(TrifleError::Unhandled(format!(
            "length with {count} octets does not fit in memory"
        )));
    }
    let octets = input
        .get(1..1 + count)
        .ok_or_else(|| TrifleError::InvalidInput("truncated length octets".to_string()))?;
    if octets[0] == 0 {
        return Err(TrifleError::InvalidInput(
            "length octets are not minimal".to_string(),
        ));
    }

    let len = octets.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    if len < 0x80 {
        return Err(TrifleError::InvalidInput(
            "long form used for a short length".to_string(),
        ));
    }
    Ok((len, 1 + count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_form_lengths() {
        assert_eq!(encode_length(0).unwrap(), vec![0x00]);
        assert_eq!(encode_length(127).unwrap(), vec![0x7F]);
        assert_eq!(encode_length(128).unwrap(), vec![0x81, 0x80]);
        assert_eq!(encode_length(256).unwrap(), vec![0x82, 0x01, 0x00]);
        assert_eq!(encode_length(0x01_00_00).unwrap(), vec![0x83, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn decode_length_inverts_encode() {
        for len in [0usize, 1, 127, 128, 255, 256, 65_535, 65_536, 1 << 24] {
            let octets = encode_length(len).unwrap();
            assert_eq!(decode_length(&octets).unwrap(), (len, octets.len()));
        }
    }

    #[test]
    fn decode_length_rejects_non_der_forms() {
        assert!(decode_length(&[0x80]).is_err());
        assert!(decode_length(&[0x81, 0x05]).is_err());
        assert!(decode_length(&[0x82, 0x00, 0x90]).is_err());
        assert!(decode_length(&[0x82, 0x01]).is_err());
        assert!(decode_length(&[]).is_err());
    }

    #[test]
    fn value_exposes_tlv_parts() {
        let value = DerValue::new(0x04, vec![0xAA; 130]).unwrap().with_priority(3);
        assert_eq!(value.tag(), 0x04);
        assert_eq!(value.length_octets(), &[0x81, 0x82]);
        assert_eq!(value.value_octets().len(), 130);
        assert_eq!(value.priority(), 3);
        assert_eq!(value.encoded_len(), 133);
        assert_eq!(value.octets()[..3], [0x04, 0x81, 0x82]);
    }
}
