//! Signed data bound to a certificate chain.
//!
//! A payload is wrapped in an [`EnvelopedData`] naming the signature
//! algorithm, encoded, and signed by the key of the chain's leaf
//! certificate. The encoded envelope octets are carried verbatim so
//! verification covers exactly what was signed.

use std::fmt;

use chrono::{DateTime, Utc};
use prost::Message;
use trifle_common::Component;
use zeroize::Zeroize;

use crate::algorithm::{AlgorithmIdentifier, SigningAlgorithm};
use crate::certificate::Certificate;
use crate::error::{Result, TrifleError};
use crate::protos::{EnvelopedDataProto, SignedDataProto};
use crate::signer::{verifier_for, Signer};
use crate::validator::CertChainValidator;

/// The only enveloped-data version this crate reads or writes
pub const ENVELOPED_DATA_VERSION: u32 = 0;

const REDACTED: &str = "[REDACTED]";

/// A payload and the algorithm its signature was made with
#[derive(Clone, PartialEq, Eq)]
pub struct EnvelopedData {
    version: u32,
    signing_algorithm: SigningAlgorithm,
    data: Vec<u8>,
}

impl EnvelopedData {
    pub fn new(signing_algorithm: SigningAlgorithm, data: Vec<u8>) -> Self {
        Self {
            version: ENVELOPED_DATA_VERSION,
            signing_algorithm,
            data,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn signing_algorithm(&self) -> SigningAlgorithm {
        self.signing_algorithm
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    fn wipe(&mut self) {
        self.data.zeroize();
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut proto = EnvelopedDataProto {
            version: self.version,
            signing_algorithm: self.signing_algorithm.identifier().to_der()?,
            data: self.data.clone(),
        };
        let encoded = proto.encode_to_vec();
        proto.data.zeroize();
        Ok(encoded)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let proto = EnvelopedDataProto::decode(bytes)?;
        if proto.version != ENVELOPED_DATA_VERSION {
            return Err(TrifleError::UnsupportedVersion(proto.version));
        }
        let identifier = AlgorithmIdentifier::from_der(&proto.signing_algorithm)?;
        Ok(Self {
            version: proto.version,
            signing_algorithm: SigningAlgorithm::from_identifier(&identifier)?,
            data: proto.data,
        })
    }

    /// Render with the payload shown as (lossy) UTF-8
    pub fn to_plaintext_string(&self) -> String {
        self.render(&String::from_utf8_lossy(&self.data))
    }

    fn render(&self, data: &str) -> String {
        format!(
            "EnvelopedData {{ version: {}, signing_algorithm: {:?}, data: {data} }}",
            self.version, self.signing_algorithm
        )
    }
}

impl fmt::Display for EnvelopedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(REDACTED))
    }
}

impl Drop for EnvelopedData {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for EnvelopedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Enveloped data, its signature and the signer's chain (leaf first)
#[derive(Clone, PartialEq, Eq)]
pub struct SignedData {
    enveloped_data: Vec<u8>,
    signature: Vec<u8>,
    certificate_chain: Vec<Certificate>,
}

impl SignedData {
    /// Sign `data` with `signer`, whose key must be the key of `chain[0]`
    pub fn sign(signer: &dyn Signer, data: &[u8], chain: Vec<Certificate>) -> Result<Self> {
        if data.is_empty() {
            return Err(TrifleError::InvalidInput("data to sign is empty".to_string()));
        }
        let leaf = chain.first().ok_or_else(|| {
            TrifleError::InvalidInput("certificate chain is empty".to_string())
        })?;

        let public_key = signer.export_public_key()?;
        if leaf.public_key()? != public_key {
            return Err(TrifleError::InvalidInput(format!(
                "leaf certificate does not carry the signer's key {}",
                public_key.fingerprint()
            )));
        }

        let algorithm = public_key.key_info.algorithm;
        let enveloped_data = EnvelopedData::new(algorithm, data.to_vec()).serialize()?;
        let (used, signature) = signer.sign(&enveloped_data)?;
        if used != algorithm {
            return Err(TrifleError::Signing(
                format!("signer used {used:?} for a {algorithm:?} envelope").into(),
            ));
        }

        Ok(Self {
            enveloped_data,
            signature,
            certificate_chain: chain,
        })
    }

    /// The encoded envelope, exactly as signed
    pub fn enveloped_data_bytes(&self) -> &[u8] {
        &self.enveloped_data
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn certificate_chain(&self) -> &[Certificate] {
        &self.certificate_chain
    }

    /// Validate the chain now against `trust_anchor` and check the signature
    pub fn verify(&self, trust_anchor: &Certificate) -> Result<EnvelopedData> {
        self.verify_at(trust_anchor, None)
    }

    pub fn verify_at(
        &self,
        trust_anchor: &Certificate,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<EnvelopedData> {
        self.verify_with(&CertChainValidator::new(trust_anchor, as_of)?)
    }

    /// Validate the chain with `validator`, then check the signature over the
    /// exact envelope octets with the leaf key
    pub fn verify_with(&self, validator: &CertChainValidator) -> Result<EnvelopedData> {
        validator.validate(&self.certificate_chain)?;

        let envelope = EnvelopedData::deserialize(&self.enveloped_data)?;
        let leaf = self.certificate_chain.first().ok_or_else(|| {
            TrifleError::InvalidInput("certificate chain is empty".to_string())
        })?;
        let public_key = leaf.public_key()?;
        let verifier = verifier_for(&public_key, envelope.signing_algorithm())?;
        let logger = validator.logger().scoped(Component::SignedData);
        match verifier.verify(&self.enveloped_data, &self.signature) {
            Ok(true) => {
                logger.debug_args(format_args!(
                    "Verified signed data from key {}",
                    public_key.fingerprint()
                ));
                Ok(envelope)
            }
            Ok(false) | Err(TrifleError::InvalidInput(_)) => {
                logger.warn_args(format_args!(
                    "Signature over enveloped data does not verify with key {}",
                    public_key.fingerprint()
                ));
                Err(TrifleError::InvalidSignature)
            }
            Err(other) => Err(other),
        }
    }

    pub fn verify_and_extract(&self, trust_anchor: &Certificate) -> Result<VerifiedData> {
        self.verify_and_extract_at(trust_anchor, None)
    }

    pub fn verify_and_extract_at(
        &self,
        trust_anchor: &Certificate,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<VerifiedData> {
        let envelope = self.verify_at(trust_anchor, as_of)?;
        Ok(VerifiedData {
            payload: envelope.into_data(),
            certificate_chain: self.certificate_chain.clone(),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        SignedDataProto {
            enveloped_data: self.enveloped_data.clone(),
            signature: self.signature.clone(),
            certificates: self
                .certificate_chain
                .iter()
                .map(Certificate::to_proto)
                .collect(),
        }
        .encode_length_delimited_to_vec()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let proto = SignedDataProto::decode_length_delimited(bytes)?;
        if proto.certificates.is_empty() {
            return Err(TrifleError::InvalidInput(
                "signed data carries no certificates".to_string(),
            ));
        }
        let certificate_chain = proto
            .certificates
            .into_iter()
            .map(Certificate::from_proto)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            enveloped_data: proto.enveloped_data,
            signature: proto.signature,
            certificate_chain,
        })
    }

    /// Render with the payload shown as (lossy) UTF-8
    pub fn to_plaintext_string(&self) -> String {
        match EnvelopedData::deserialize(&self.enveloped_data) {
            Ok(envelope) => self.render(&envelope.to_plaintext_string()),
            Err(_) => self.render("<undecodable envelope>"),
        }
    }

    fn render(&self, envelope: &str) -> String {
        format!(
            "SignedData {{ enveloped_data: {envelope}, signature: {} octets, certificates: {} }}",
            self.signature.len(),
            self.certificate_chain.len()
        )
    }
}

impl fmt::Display for SignedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let envelope = match EnvelopedData::deserialize(&self.enveloped_data) {
            Ok(envelope) => envelope.to_string(),
            Err(_) => "<undecodable envelope>".to_string(),
        };
        f.write_str(&self.render(&envelope))
    }
}

impl fmt::Debug for SignedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A payload whose signature and chain have been verified
#[derive(Clone, PartialEq, Eq)]
pub struct VerifiedData {
    payload: Vec<u8>,
    certificate_chain: Vec<Certificate>,
}

impl VerifiedData {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn certificate_chain(&self) -> &[Certificate] {
        &self.certificate_chain
    }
}

impl fmt::Debug for VerifiedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedData")
            .field("payload", &REDACTED)
            .field("certificate_chain", &self.certificate_chain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enveloped_data_redacts_by_default() {
        let envelope = EnvelopedData::new(SigningAlgorithm::EcdsaSha256, b"top secret".to_vec());
        assert!(envelope.to_string().contains("[REDACTED]"));
        assert!(!format!("{envelope:?}").contains("top secret"));
        assert!(envelope.to_plaintext_string().contains("top secret"));
    }

    #[test]
    fn enveloped_data_wipes_its_payload() {
        let mut envelope = EnvelopedData::new(SigningAlgorithm::EcdsaSha256, b"pin 1234".to_vec());
        let copy = envelope.clone();
        envelope.wipe();
        assert!(envelope.data().is_empty());
        assert_eq!(copy.into_data(), b"pin 1234");
    }

    #[test]
    fn enveloped_data_round_trip() {
        let envelope = EnvelopedData::new(SigningAlgorithm::EcdsaSha256, vec![1, 2, 3]);
        let decoded = EnvelopedData::deserialize(&envelope.serialize().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn enveloped_data_rejects_other_versions() {
        let bytes = EnvelopedDataProto {
            version: 3,
            signing_algorithm: SigningAlgorithm::EcdsaSha256.identifier().to_der().unwrap(),
            data: vec![1],
        }
        .encode_to_vec();
        assert!(matches!(
            EnvelopedData::deserialize(&bytes),
            Err(TrifleError::UnsupportedVersion(3))
        ));
    }
}
