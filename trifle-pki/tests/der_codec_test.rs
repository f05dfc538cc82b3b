//! DER codec tests against known encodings

use chrono::{TimeZone, Utc};
use prost::Message;
use trifle_pki::der::{self, Asn1Type, BitString, TagContext, MAX_DEPTH};
use trifle_pki::protos::EnvelopedDataProto;
use trifle_pki::{AlgorithmIdentifier, EnvelopedData, SigningAlgorithm, TrifleError};

fn encode(value: &Asn1Type) -> Vec<u8> {
    der::encode(value, TagContext::None)
        .expect("value encodes")
        .into_octets()
}

#[test]
fn test_primitive_vectors() {
    assert_eq!(encode(&Asn1Type::Integer(0)), [0x02, 0x01, 0x00]);
    assert_eq!(encode(&Asn1Type::Integer(128)), [0x02, 0x02, 0x00, 0x80]);
    assert_eq!(encode(&Asn1Type::Integer(-129)), [0x02, 0x02, 0xFF, 0x7F]);
    assert_eq!(encode(&Asn1Type::Boolean(true)), [0x01, 0x01, 0xFF]);
    assert_eq!(encode(&Asn1Type::Null), [0x05, 0x00]);
    assert_eq!(
        encode(&Asn1Type::oid(&[1, 2, 840, 113_549, 1, 1, 11])),
        [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B]
    );
    assert_eq!(
        encode(&Asn1Type::printable("hi")),
        [0x13, 0x02, 0x68, 0x69]
    );
    assert_eq!(
        encode(&Asn1Type::BitString(BitString::with_padding(vec![0x80]))),
        [0x03, 0x02, 0x07, 0x80]
    );
}

#[test]
fn test_utc_time_encoding() {
    let time = Utc.with_ymd_and_hms(2026, 10, 16, 8, 30, 5).unwrap();
    let mut expected = vec![0x17, 0x0D];
    expected.extend_from_slice(b"261016083005Z");
    assert_eq!(encode(&Asn1Type::UtcTime(time)), expected);
}

#[test]
fn test_long_form_length() {
    let value = Asn1Type::OctetString(vec![0xAB; 200]);
    let octets = encode(&value);
    assert_eq!(&octets[..3], &[0x04, 0x81, 0xC8]);
    assert_eq!(octets.len(), 203);

    let value = Asn1Type::OctetString(vec![0x00; 300]);
    assert_eq!(&encode(&value)[..4], &[0x04, 0x82, 0x01, 0x2C]);
}

#[test]
fn test_set_encoding_is_order_independent() {
    let a = Asn1Type::Sequence(vec![Asn1Type::oid(&[2, 5, 4, 3]), Asn1Type::printable("a")]);
    let b = Asn1Type::Sequence(vec![Asn1Type::oid(&[2, 5, 4, 10]), Asn1Type::printable("b")]);
    let forward = encode(&Asn1Type::Set(vec![a.clone(), b.clone(), Asn1Type::Null]));
    let backward = encode(&Asn1Type::Set(vec![Asn1Type::Null, b, a]));
    assert_eq!(forward, backward);
    // NULL (0x05) sorts ahead of the sequences (0x30)
    assert_eq!(&forward[2..4], &[0x05, 0x00]);

    // Re-encoding the decoded set is stable
    let decoded = der::decode(&forward).unwrap();
    assert_eq!(encode(&decoded), forward);
}

#[test]
fn test_invalid_inputs_are_rejected() {
    let cases = [
        Asn1Type::ObjectIdentifier(vec![]),
        Asn1Type::ObjectIdentifier(vec![1]),
        Asn1Type::ObjectIdentifier(vec![3, 1]),
        Asn1Type::ObjectIdentifier(vec![1, 40]),
        Asn1Type::printable("hi@me.com"),
        Asn1Type::Ia5String("caf\u{e9}".to_string()),
    ];
    for value in cases {
        assert!(
            matches!(value.to_der(), Err(TrifleError::InvalidInput(_))),
            "{value:?} should be rejected"
        );
    }
    // Second arc is unbounded under joint-iso-itu-t
    assert!(Asn1Type::ObjectIdentifier(vec![2, 999, 3]).to_der().is_ok());
}

#[test]
fn test_tag_contexts() {
    let explicit = der::encode(&Asn1Type::Integer(2), TagContext::Explicit(0))
        .unwrap()
        .into_octets();
    assert_eq!(explicit, [0xA0, 0x03, 0x02, 0x01, 0x02]);

    let implicit = der::encode(&Asn1Type::Set(vec![]), TagContext::Implicit(0))
        .unwrap()
        .into_octets();
    assert_eq!(implicit, [0xA0, 0x00]);

    let primitive = der::encode(&Asn1Type::OctetString(vec![7]), TagContext::Implicit(1))
        .unwrap()
        .into_octets();
    assert_eq!(primitive, [0x81, 0x01, 0x07]);
}

#[test]
fn test_nested_structure_round_trip() {
    let value = Asn1Type::Sequence(vec![
        Asn1Type::Integer(-5),
        Asn1Type::Boolean(false),
        Asn1Type::OctetString(vec![1, 2, 3]),
        Asn1Type::Utf8String("h\u{e9}llo".to_string()),
        Asn1Type::Ia5String("user@example.com".to_string()),
        Asn1Type::UtcTime(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap()),
        Asn1Type::BitString(BitString::from_bytes(vec![0xFF, 0x00])),
        Asn1Type::Sequence(vec![Asn1Type::oid(&[1, 2, 840, 10_045, 2, 1]), Asn1Type::Null]),
        Asn1Type::Integer(i64::MAX).explicit(2),
    ]);
    let octets = encode(&value);
    assert_eq!(der::decode(&octets).unwrap(), value);
}

#[test]
fn test_decoder_rejects_malformed_input() {
    // Indefinite length
    assert!(der::decode(&[0x30, 0x80, 0x00, 0x00]).is_err());
    // Truncated
    assert!(der::decode(&[0x04, 0x03, 0x01]).is_err());
    // Trailing data
    assert!(der::decode(&[0x05, 0x00, 0x05, 0x00]).is_err());
    // Non-minimal length
    assert!(der::decode(&[0x04, 0x81, 0x01, 0x00]).is_err());
    // PrintableString with an illegal character
    assert!(der::decode(&[0x13, 0x01, b'@']).is_err());
}

fn length_octets(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .into_iter()
        .skip_while(|byte| *byte == 0)
        .collect();
    let mut out = vec![0x80 | bytes.len() as u8];
    out.extend(bytes);
    out
}

/// `levels` SEQUENCEs wrapped around a NULL, built without recursion
fn nested_sequences(levels: usize) -> Vec<u8> {
    let mut headers = Vec::with_capacity(levels);
    let mut len = 2;
    for _ in 0..levels {
        let mut header = vec![0x30];
        header.extend(length_octets(len));
        len += header.len();
        headers.push(header);
    }
    let mut out = Vec::with_capacity(len);
    for header in headers.iter().rev() {
        out.extend_from_slice(header);
    }
    out.extend_from_slice(&[0x05, 0x00]);
    out
}

#[test]
fn test_deep_nesting_is_rejected() {
    assert!(der::decode(&nested_sequences(MAX_DEPTH)).is_ok());
    assert!(matches!(
        der::decode(&nested_sequences(MAX_DEPTH + 1)),
        Err(TrifleError::InvalidInput(_))
    ));
    assert!(matches!(
        der::decode(&nested_sequences(200_000)),
        Err(TrifleError::InvalidInput(_))
    ));
}

#[test]
fn test_deep_algorithm_parameters_do_not_exhaust_the_stack() {
    let ecdsa_oid = encode(&Asn1Type::oid(&[1, 2, 840, 10_045, 4, 3, 2]));
    let mut content = ecdsa_oid;
    content.extend(nested_sequences(200_000));
    let mut identifier = vec![0x30];
    identifier.extend(length_octets(content.len()));
    identifier.extend(content);

    // Constructed parameters are carried opaquely
    let decoded = AlgorithmIdentifier::from_der(&identifier).unwrap();
    assert!(matches!(decoded.parameters, Some(Asn1Type::Raw(_))));

    let envelope = EnvelopedDataProto {
        version: 0,
        signing_algorithm: identifier,
        data: b"payload".to_vec(),
    }
    .encode_to_vec();
    assert!(matches!(
        EnvelopedData::deserialize(&envelope),
        Err(TrifleError::InvalidInput(_))
    ));

    // The well-formed identifier still decodes
    let plain = SigningAlgorithm::EcdsaSha256.identifier().to_der().unwrap();
    let decoded = AlgorithmIdentifier::from_der(&plain).unwrap();
    assert_eq!(
        SigningAlgorithm::from_identifier(&decoded).unwrap(),
        SigningAlgorithm::EcdsaSha256
    );
}

#[test]
fn test_single_element_implicit_set_reads_back_as_explicit() {
    let member = Asn1Type::Sequence(vec![Asn1Type::oid(&[2, 5, 4, 3]), Asn1Type::printable("a")]);
    let implicit = Asn1Type::Set(vec![member.clone()]).implicit(0);
    let octets = encode(&implicit);

    // The implicit SET and an explicit tag around its member share an encoding
    let decoded = der::decode(&octets).unwrap();
    assert_eq!(decoded, member.explicit(0));
    assert_ne!(decoded, implicit);
    assert_eq!(encode(&decoded), octets);
}
