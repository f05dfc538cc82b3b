//! PKCS#10 request tests, cross-checked with x509-parser

mod common;

use anyhow::Result;
use trifle_pki::name::OID_CHALLENGE_PASSWORD;
use trifle_pki::{
    Attribute, CertificateRequest, CertificateRequestBuilder, DistinguishedName,
    MobileCertificateRequest, Signer, SoftwareSigner, TrifleError,
};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::prelude::FromDer;

#[test]
fn test_request_parses_with_x509_parser() -> Result<()> {
    let signer = SoftwareSigner::generate();
    let request = CertificateRequestBuilder::new()
        .with_subject(common::subject("device-42"))
        .with_logger(common::test_logger("device-42"))
        .sign(&signer)?;

    let (rest, parsed) = X509CertificationRequest::from_der(request.der())?;
    assert!(rest.is_empty());

    let info = &parsed.certification_request_info;
    assert_eq!(info.version.0, 0);
    let common_name = info
        .subject
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok());
    assert_eq!(common_name, Some("device-42"));
    assert_eq!(
        &*info.subject_pki.subject_public_key.data,
        signer.export_public_key()?.raw_key_bytes.as_slice()
    );
    assert!(info.attributes().is_empty());

    request.verify_signature()?;
    Ok(())
}

#[test]
fn test_challenge_password_is_carried_in_request_info() -> Result<()> {
    let signer = SoftwareSigner::generate();
    let request = CertificateRequestBuilder::new()
        .with_subject(common::subject("device-43"))
        .with_attribute(Attribute::challenge_password("s3cret"))
        .sign(&signer)?;

    let attribute = Attribute::new(
        OID_CHALLENGE_PASSWORD,
        vec![trifle_pki::der::Asn1Type::Utf8String("s3cret".to_string())],
    )
    .to_asn1()
    .to_der()?;
    // [0] IMPLICIT SET OF Attribute
    let mut attributes = vec![0xA0, attribute.len() as u8];
    attributes.extend_from_slice(&attribute);
    assert!(request
        .der()
        .windows(attributes.len())
        .any(|window| window == attributes.as_slice()));

    request.verify_signature()?;
    Ok(())
}

#[test]
fn test_request_accessors_match_signer() -> Result<()> {
    let signer = SoftwareSigner::generate();
    let request = CertificateRequestBuilder::new()
        .with_version(0)
        .with_name(DistinguishedName::CommonName("accessor".to_string()))
        .sign(&signer)?;

    assert_eq!(request.public_key()?, signer.export_public_key()?);
    assert_eq!(request.spki_der()?, signer.export_public_key()?.spki_der()?);
    // SEQUENCE { SET { SEQUENCE { OID 2.5.4.3, PrintableString } } }
    let subject = request.subject_der()?;
    assert_eq!(&subject[..4], &[0x30, 0x13, 0x31, 0x11]);
    assert_eq!(&subject[6..11], &[0x06, 0x03, 0x55, 0x04, 0x03]);
    Ok(())
}

#[test]
fn test_pem_layout() -> Result<()> {
    let device = common::device("pem-device")?;
    let pem = device.request.pem();
    let lines: Vec<&str> = pem.lines().collect();

    assert_eq!(lines.first(), Some(&"-----BEGIN CERTIFICATE REQUEST-----"));
    assert_eq!(lines.last(), Some(&"-----END CERTIFICATE REQUEST-----"));
    let body = &lines[1..lines.len() - 1];
    assert!(body[..body.len() - 1].iter().all(|line| line.len() == 64));
    assert!(body[body.len() - 1].len() <= 64);

    assert_eq!(CertificateRequest::from_pem(&pem)?, device.request);
    Ok(())
}

#[test]
fn test_mobile_request_envelope_round_trip() -> Result<()> {
    let device = common::device("mobile")?;
    let envelope = MobileCertificateRequest::new(device.request.clone());
    assert_eq!(envelope.version(), 0);

    let restored = MobileCertificateRequest::deserialize(&envelope.serialize())?;
    assert_eq!(restored.request(), &device.request);
    Ok(())
}

#[test]
fn test_malformed_requests_are_rejected() {
    assert!(matches!(
        CertificateRequest::from_der(&[0x30, 0x00]),
        Err(TrifleError::InvalidInput(_))
    ));
    assert!(CertificateRequest::from_pem("not a pem").is_err());
    assert!(MobileCertificateRequest::deserialize(&[0xFF, 0xFF]).is_err());
}
