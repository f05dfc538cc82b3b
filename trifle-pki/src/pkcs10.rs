//! PKCS#10 certificate signing requests (RFC 2986).
//!
//! Requests are built with the in-crate DER codec and signed by a
//! [`Signer`]; the private key never leaves the signer.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use prost::Message;
use trifle_common::{Component, Logger};

use crate::algorithm::{AlgorithmIdentifier, SigningAlgorithm, SigningPublicKey};
use crate::der::{read_single, Asn1Type, BitString, Tag, Tlv};
use crate::error::{Result, TrifleError};
use crate::name::{name_to_asn1, Attribute, DistinguishedName};
use crate::protos::MobileCertificateRequestProto;
use crate::signer::{verifier_for, Signer};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE REQUEST-----";
const PEM_END: &str = "-----END CERTIFICATE REQUEST-----";
const PEM_COLUMNS: usize = 64;

/// Consuming builder for a [`CertificateRequest`]
#[derive(Debug, Clone, Default)]
pub struct CertificateRequestBuilder {
    version: u64,
    subject: Vec<DistinguishedName>,
    attributes: Vec<Attribute>,
    logger: Option<Logger>,
}

impl CertificateRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Append one subject component; order is preserved
    pub fn with_name(mut self, name: DistinguishedName) -> Self {
        self.subject.push(name);
        self
    }

    pub fn with_subject(mut self, names: impl IntoIterator<Item = DistinguishedName>) -> Self {
        self.subject.extend(names);
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger.scoped(Component::Request));
        self
    }

    /// Build `CertificationRequestInfo`, have `signer` sign it and assemble
    /// the request
    pub fn sign(self, signer: &dyn Signer) -> Result<CertificateRequest> {
        let version = i64::try_from(self.version).map_err(|_| {
            TrifleError::InvalidInput(format!("request version {} out of range", self.version))
        })?;
        let public_key = signer.export_public_key()?;

        let info = Asn1Type::Sequence(vec![
            Asn1Type::Integer(version),
            name_to_asn1(&self.subject),
            public_key.subject_public_key_info(),
            Asn1Type::Set(self.attributes.iter().map(Attribute::to_asn1).collect()).implicit(0),
        ]);
        let info_der = info.to_der()?;

        let (algorithm, signature) = signer.sign(&info_der)?;
        let der = Asn1Type::Sequence(vec![
            Asn1Type::Raw(info_der),
            algorithm.identifier().to_asn1(),
            Asn1Type::BitString(BitString::from_bytes(signature)),
        ])
        .to_der()?;

        if let Some(logger) = &self.logger {
            logger.debug_args(format_args!(
                "Signed certification request for key {} ({} octets)",
                public_key.fingerprint(),
                der.len()
            ));
        }
        Ok(CertificateRequest { der })
    }
}

/// A DER-encoded PKCS#10 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    der: Vec<u8>,
}

/// Borrowed views into the request structure
struct RequestParts<'a> {
    info: Tlv<'a>,
    version: Tlv<'a>,
    subject: Tlv<'a>,
    spki: Tlv<'a>,
    algorithm: Tlv<'a>,
    signature: Tlv<'a>,
}

impl CertificateRequest {
    /// Parse and structurally check a DER request
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let request = Self { der: der.to_vec() };
        request.parts()?;
        Ok(request)
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let body = pem
            .trim()
            .strip_prefix(PEM_BEGIN)
            .and_then(|rest| rest.trim_end().strip_suffix(PEM_END))
            .ok_or_else(|| {
                TrifleError::InvalidInput("missing CERTIFICATE REQUEST PEM armor".to_string())
            })?;
        let base64: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let der = STANDARD
            .decode(base64)
            .map_err(|e| TrifleError::InvalidInput(format!("Invalid PEM body: {e}")))?;
        Self::from_der(&der)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    /// PEM armor with the body wrapped at 64 columns
    pub fn pem(&self) -> String {
        let encoded = STANDARD.encode(&self.der);
        let mut pem = String::with_capacity(encoded.len() + encoded.len() / PEM_COLUMNS + 80);
        pem.push_str(PEM_BEGIN);
        pem.push('\n');
        for line in encoded.as_bytes().chunks(PEM_COLUMNS) {
            // base64 output is ASCII
            pem.push_str(&String::from_utf8_lossy(line));
            pem.push('\n');
        }
        pem.push_str(PEM_END);
        pem.push('\n');
        pem
    }

    pub fn version(&self) -> Result<i64> {
        match Asn1Type::from_tlv(&self.parts()?.version)? {
            Asn1Type::Integer(version) => Ok(version),
            _ => Err(TrifleError::InvalidInput(
                "request version must be an INTEGER".to_string(),
            )),
        }
    }

    /// The subject Name exactly as encoded in the request
    pub fn subject_der(&self) -> Result<Vec<u8>> {
        Ok(self.parts()?.subject.raw.to_vec())
    }

    /// The SubjectPublicKeyInfo exactly as encoded in the request
    pub fn spki_der(&self) -> Result<Vec<u8>> {
        Ok(self.parts()?.spki.raw.to_vec())
    }

    pub fn public_key(&self) -> Result<SigningPublicKey> {
        SigningPublicKey::from_spki_der(self.parts()?.spki.raw)
    }

    pub fn signature_algorithm(&self) -> Result<SigningAlgorithm> {
        let identifier = AlgorithmIdentifier::from_der(self.parts()?.algorithm.raw)?;
        SigningAlgorithm::from_identifier(&identifier)
    }

    /// Check the self-signature against the enclosed public key
    pub fn verify_signature(&self) -> Result<()> {
        let parts = self.parts()?;
        let algorithm =
            SigningAlgorithm::from_identifier(&AlgorithmIdentifier::from_der(parts.algorithm.raw)?)?;
        let public_key = SigningPublicKey::from_spki_der(parts.spki.raw)?;
        let signature = match Asn1Type::from_tlv(&parts.signature)? {
            Asn1Type::BitString(bits) => bits.into_bytes(),
            _ => return Err(TrifleError::InvalidSignature),
        };

        let verifier = verifier_for(&public_key, algorithm)?;
        if verifier.verify(parts.info.raw, &signature)? {
            Ok(())
        } else {
            Err(TrifleError::InvalidSignature)
        }
    }

    fn parts(&self) -> Result<RequestParts<'_>> {
        let outer = read_single(&self.der)?;
        outer.expect(Tag::Sequence)?;
        let [info, algorithm, signature] = outer.children()?[..] else {
            return Err(TrifleError::InvalidInput(
                "CertificationRequest must have three elements".to_string(),
            ));
        };
        info.expect(Tag::Sequence)?;
        algorithm.expect(Tag::Sequence)?;
        signature.expect(Tag::BitString)?;

        let fields = info.children()?;
        let (version, subject, spki) = match fields[..] {
            [version, subject, spki, attributes] if attributes.tag == 0xA0 => {
                (version, subject, spki)
            }
            _ => {
                return Err(TrifleError::InvalidInput(
                    "malformed CertificationRequestInfo".to_string(),
                ))
            }
        };
        version.expect(Tag::Integer)?;
        subject.expect(Tag::Sequence)?;
        spki.expect(Tag::Sequence)?;

        Ok(RequestParts {
            info,
            version,
            subject,
            spki,
            algorithm,
            signature,
        })
    }
}

/// The only request envelope version this crate reads or writes
pub const MOBILE_REQUEST_VERSION: u32 = 0;

/// A PKCS#10 request as sent from a device to an authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileCertificateRequest {
    version: u32,
    request: CertificateRequest,
}

impl MobileCertificateRequest {
    pub fn new(request: CertificateRequest) -> Self {
        Self {
            version: MOBILE_REQUEST_VERSION,
            request,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn request(&self) -> &CertificateRequest {
        &self.request
    }

    pub fn into_request(self) -> CertificateRequest {
        self.request
    }

    pub fn serialize(&self) -> Vec<u8> {
        MobileCertificateRequestProto {
            version: self.version,
            pkcs10_request: self.request.der.clone(),
        }
        .encode_length_delimited_to_vec()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let proto = MobileCertificateRequestProto::decode_length_delimited(bytes)?;
        if proto.version != MOBILE_REQUEST_VERSION {
            return Err(TrifleError::UnsupportedVersion(proto.version));
        }
        Ok(Self {
            version: proto.version,
            request: CertificateRequest::from_der(&proto.pkcs10_request)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::SoftwareSigner;

    fn request() -> CertificateRequest {
        CertificateRequestBuilder::new()
            .with_name(DistinguishedName::CommonName("device".to_string()))
            .with_name(DistinguishedName::OrganizationName("Trifle".to_string()))
            .sign(&SoftwareSigner::generate())
            .unwrap()
    }

    #[test]
    fn signed_request_verifies() {
        let request = request();
        request.verify_signature().unwrap();
        assert_eq!(request.version().unwrap(), 0);
        assert_eq!(
            request.signature_algorithm().unwrap(),
            SigningAlgorithm::EcdsaSha256
        );
    }

    #[test]
    fn tampered_request_fails_verification() {
        let mut der = request().into_der();
        // Last octet of the signature
        let last = der.len() - 1;
        der[last] ^= 0x01;
        let tampered = CertificateRequest::from_der(&der).unwrap();
        assert!(tampered.verify_signature().is_err());
    }

    #[test]
    fn pem_round_trip() {
        let request = request();
        let pem = request.pem();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----\n"));
        assert!(pem.ends_with("-----END CERTIFICATE REQUEST-----\n"));
        assert!(pem.lines().all(|line| line.len() <= 64 || line.starts_with("-----")));
        assert_eq!(CertificateRequest::from_pem(&pem).unwrap(), request);
    }

    #[test]
    fn illegal_subject_is_invalid_input() {
        let result = CertificateRequestBuilder::new()
            .with_name(DistinguishedName::CommonName("hi@me.com".to_string()))
            .sign(&SoftwareSigner::generate());
        assert!(matches!(result, Err(TrifleError::InvalidInput(_))));
    }

    #[test]
    fn mobile_envelope_rejects_other_versions() {
        let bytes = MobileCertificateRequestProto {
            version: 1,
            pkcs10_request: request().into_der(),
        }
        .encode_length_delimited_to_vec();
        assert!(matches!(
            MobileCertificateRequest::deserialize(&bytes),
            Err(TrifleError::UnsupportedVersion(1))
        ));
    }
}
