//! Certificate envelope.
//!
//! A [`Certificate`] pairs a DER X.509 certificate with the envelope version
//! it travels under. Instances are immutable once built.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use prost::Message;

use crate::algorithm::SigningPublicKey;
use crate::error::{Result, TrifleError};
use crate::pkcs10::CertificateRequest;
use crate::protos::CertificateProto;
use crate::trust::{is_ca, parse_certificate, TrustEvaluator};
use crate::validator::CertificateValidator;

/// The only certificate envelope version this crate reads or writes
pub const CERTIFICATE_VERSION: u32 = 0;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    version: u32,
    raw: Vec<u8>,
}

impl Certificate {
    /// Wrap a DER certificate after checking that it parses
    pub fn from_der(der: &[u8]) -> Result<Self> {
        parse_certificate(der)?;
        Ok(Self {
            version: CERTIFICATE_VERSION,
            raw: der.to_vec(),
        })
    }

    /// Wrap a DER certificate under an explicit envelope version.
    ///
    /// No checks are made; validators reject versions they do not know.
    pub fn from_parts(version: u32, der: Vec<u8>) -> Self {
        Self { version, raw: der }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn der(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_der(self) -> Vec<u8> {
        self.raw
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.to_proto().encode_length_delimited_to_vec()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Self::from_proto(CertificateProto::decode_length_delimited(bytes)?)
    }

    pub(crate) fn to_proto(&self) -> CertificateProto {
        CertificateProto {
            version: self.version,
            certificate: self.raw.clone(),
        }
    }

    pub(crate) fn from_proto(proto: CertificateProto) -> Result<Self> {
        if proto.version != CERTIFICATE_VERSION {
            return Err(TrifleError::UnsupportedVersion(proto.version));
        }
        Self::from_der(&proto.certificate)
    }

    /// Subject Name exactly as encoded
    pub fn subject_der(&self) -> Result<Vec<u8>> {
        Ok(parse_certificate(&self.raw)?.subject().as_raw().to_vec())
    }

    /// Issuer Name exactly as encoded
    pub fn issuer_der(&self) -> Result<Vec<u8>> {
        Ok(parse_certificate(&self.raw)?.issuer().as_raw().to_vec())
    }

    /// Subject rendered as `CN=..., O=...`
    pub fn subject(&self) -> Result<String> {
        Ok(parse_certificate(&self.raw)?.subject().to_string())
    }

    /// SubjectPublicKeyInfo exactly as encoded
    pub fn spki_der(&self) -> Result<Vec<u8>> {
        Ok(parse_certificate(&self.raw)?.public_key().raw.to_vec())
    }

    pub fn public_key(&self) -> Result<SigningPublicKey> {
        SigningPublicKey::from_spki_der(parse_certificate(&self.raw)?.public_key().raw)
    }

    pub fn serial_hex(&self) -> Result<String> {
        Ok(hex::encode(parse_certificate(&self.raw)?.raw_serial()))
    }

    pub fn not_before(&self) -> Result<DateTime<Utc>> {
        timestamp_to_datetime(parse_certificate(&self.raw)?.validity().not_before.timestamp())
    }

    pub fn not_after(&self) -> Result<DateTime<Utc>> {
        timestamp_to_datetime(parse_certificate(&self.raw)?.validity().not_after.timestamp())
    }

    pub fn is_ca(&self) -> Result<bool> {
        Ok(is_ca(&parse_certificate(&self.raw)?))
    }

    /// Evaluate `[self] + intermediates + [root]` now.
    ///
    /// A given `root` is pinned as the only anchor; otherwise the
    /// evaluator's own anchors apply. With a `request`, the certificate must
    /// also carry the request's subject and public key.
    pub fn verify(
        &self,
        evaluator: &dyn TrustEvaluator,
        request: Option<&CertificateRequest>,
        intermediates: &[Certificate],
        root: Option<&Certificate>,
    ) -> Result<()> {
        let mut chain = Vec::with_capacity(intermediates.len() + 2);
        chain.push(self.raw.clone());
        chain.extend(intermediates.iter().map(|cert| cert.raw.clone()));
        if let Some(root) = root {
            chain.push(root.raw.clone());
        }

        if !evaluator.evaluate(&chain, root.map(Certificate::der), Utc::now())? {
            return Err(TrifleError::unspecified(
                "trust evaluation rejected the certificate chain",
            ));
        }

        if let Some(request) = request {
            CertificateValidator::for_certificate(self)?.validate_request(request)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.subject().unwrap_or_else(|_| "<unparseable>".to_string());
        f.debug_struct("Certificate")
            .field("version", &self.version)
            .field("subject", &subject)
            .field("len", &self.raw.len())
            .finish()
    }
}

pub(crate) fn timestamp_to_datetime(timestamp: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0).single().ok_or_else(|| {
        TrifleError::InvalidInput(format!("timestamp {timestamp} out of range"))
    })
}
