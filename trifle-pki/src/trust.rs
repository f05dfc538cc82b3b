//! Trust evaluation of ordered certificate chains.
//!
//! [`TrustEvaluator`] is the seam where a platform trust service would plug
//! in. [`PkixTrustEvaluator`] walks the path in-process: the chain must
//! terminate at a pinned or configured anchor, every link must chain by
//! name and signature, and every certificate must be within its validity
//! window at the evaluation time. Revocation is not checked.

use chrono::{DateTime, Utc};
use trifle_common::{Component, Logger};
use x509_parser::prelude::*;

use crate::algorithm::{AlgorithmIdentifier, SigningAlgorithm, SigningPublicKey};
use crate::error::{Result, TrifleError};
use crate::signer::verifier_for;

/// Evaluates a leaf-first chain of DER certificates
pub trait TrustEvaluator: Send + Sync {
    /// `trust_anchor` pins the sole anchor when given; otherwise the
    /// evaluator's own anchor set applies
    fn evaluate(
        &self,
        chain: &[Vec<u8>],
        trust_anchor: Option<&[u8]>,
        as_of: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Why a path failed to validate
#[derive(Debug)]
pub enum PathValidationFailure {
    Expired { depth: usize },
    NotYetValid { depth: usize },
    BadSignature { depth: usize },
    NoTrustAnchor,
    InvalidPath(String),
    Other {
        message: String,
        cause: Option<TrifleError>,
    },
}

impl From<PathValidationFailure> for TrifleError {
    fn from(failure: PathValidationFailure) -> Self {
        match failure {
            PathValidationFailure::Expired { .. } => TrifleError::ExpiredCertificate,
            PathValidationFailure::NotYetValid { .. } => TrifleError::NotValidYetCertificate,
            PathValidationFailure::BadSignature { .. } => TrifleError::InvalidSignature,
            PathValidationFailure::NoTrustAnchor => TrifleError::NoTrustAnchor,
            PathValidationFailure::InvalidPath(reason) => TrifleError::InvalidCertPath(reason),
            PathValidationFailure::Other { message, cause } => match cause {
                Some(cause) => TrifleError::unspecified_with_cause(message, cause),
                None => TrifleError::unspecified(message),
            },
        }
    }
}

/// In-process PKIX path validation
#[derive(Debug, Clone)]
pub struct PkixTrustEvaluator {
    anchors: Vec<Vec<u8>>,
    logger: Logger,
}

impl PkixTrustEvaluator {
    pub fn new(logger: Logger) -> Self {
        Self {
            anchors: Vec::new(),
            logger: logger.scoped(Component::Validator),
        }
    }

    /// Add an anchor used when a caller does not pin one
    pub fn with_anchor(mut self, anchor_der: Vec<u8>) -> Self {
        self.anchors.push(anchor_der);
        self
    }

    fn validate_against(
        &self,
        chain: &[X509Certificate<'_>],
        anchor: &X509Certificate<'_>,
        as_of: DateTime<Utc>,
    ) -> std::result::Result<(), PathValidationFailure> {
        let now = as_of.timestamp();
        let top = chain.len() - 1;

        if chain[top].issuer().as_raw() != anchor.subject().as_raw() {
            return Err(PathValidationFailure::NoTrustAnchor);
        }
        if !is_ca(anchor) {
            return Err(PathValidationFailure::InvalidPath(
                "trust anchor is not a CA".to_string(),
            ));
        }

        for depth in (0..=top).rev() {
            let cert = &chain[depth];
            let issuer = if depth == top {
                anchor
            } else {
                let issuer = &chain[depth + 1];
                if cert.issuer().as_raw() != issuer.subject().as_raw() {
                    return Err(PathValidationFailure::InvalidPath(format!(
                        "certificate at depth {depth} was not issued by {}",
                        issuer.subject()
                    )));
                }
                if !is_ca(issuer) {
                    return Err(PathValidationFailure::InvalidPath(format!(
                        "issuer at depth {} is not a CA",
                        depth + 1
                    )));
                }
                issuer
            };

            match verify_issued_by(cert, issuer) {
                Ok(true) => {}
                Ok(false) if depth == top => return Err(PathValidationFailure::NoTrustAnchor),
                Ok(false) => return Err(PathValidationFailure::BadSignature { depth }),
                Err(cause) => {
                    return Err(PathValidationFailure::Other {
                        message: format!("cannot verify certificate at depth {depth}"),
                        cause: Some(cause),
                    })
                }
            }

            let validity = cert.validity();
            if now < validity.not_before.timestamp() {
                return Err(PathValidationFailure::NotYetValid { depth });
            }
            if now > validity.not_after.timestamp() {
                return Err(PathValidationFailure::Expired { depth });
            }
        }
        Ok(())
    }
}

impl TrustEvaluator for PkixTrustEvaluator {
    fn evaluate(
        &self,
        chain: &[Vec<u8>],
        trust_anchor: Option<&[u8]>,
        as_of: DateTime<Utc>,
    ) -> Result<bool> {
        let anchors: Vec<&[u8]> = match trust_anchor {
            Some(anchor) => vec![anchor],
            None => self.anchors.iter().map(Vec::as_slice).collect(),
        };
        if anchors.is_empty() {
            return Err(TrifleError::NoTrustAnchor);
        }

        // A chain may carry its anchor as the final element
        let path: &[Vec<u8>] = match chain.split_last() {
            Some((last, rest)) if anchors.contains(&last.as_slice()) => rest,
            _ => chain,
        };
        if path.is_empty() {
            return Err(TrifleError::InvalidCertPath(
                "no certificates to evaluate".to_string(),
            ));
        }
        let parsed = path
            .iter()
            .map(|der| parse_certificate(der))
            .collect::<Result<Vec<_>>>()?;

        let mut failure = PathValidationFailure::NoTrustAnchor;
        for anchor_der in anchors {
            let anchor = parse_certificate(anchor_der)?;
            match self.validate_against(&parsed, &anchor, as_of) {
                Ok(()) => {
                    self.logger.debug_args(format_args!(
                        "Chain of {} anchored at {} is valid as of {as_of}",
                        parsed.len(),
                        anchor.subject()
                    ));
                    return Ok(true);
                }
                // Try the next anchor only if this one was not the issuer
                Err(PathValidationFailure::NoTrustAnchor) => continue,
                Err(other) => {
                    failure = other;
                    break;
                }
            }
        }
        self.logger
            .debug_args(format_args!("Chain evaluation failed: {failure:?}"));
        Err(failure.into())
    }
}

pub(crate) fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>> {
    let (rest, cert) = X509Certificate::from_der(der)?;
    if !rest.is_empty() {
        return Err(TrifleError::InvalidInput(format!(
            "{} trailing octets after certificate",
            rest.len()
        )));
    }
    Ok(cert)
}

pub(crate) fn is_ca(cert: &X509Certificate<'_>) -> bool {
    matches!(cert.basic_constraints(), Ok(Some(bc)) if bc.value.ca)
}

pub(crate) fn is_self_signed_root(cert: &X509Certificate<'_>) -> bool {
    cert.subject().as_raw() == cert.issuer().as_raw()
        && matches!(cert.key_usage(), Ok(Some(ku)) if ku.value.key_cert_sign())
}

/// The certificate's signature algorithm from the registry
pub(crate) fn signature_algorithm(cert: &X509Certificate<'_>) -> Result<SigningAlgorithm> {
    let arcs: Vec<u64> = cert
        .signature_algorithm
        .algorithm
        .iter()
        .map(|arcs| arcs.collect())
        .ok_or_else(|| {
            TrifleError::UnsupportedOperation(format!(
                "signature algorithm {} has arcs beyond 64 bits",
                cert.signature_algorithm.algorithm
            ))
        })?;
    SigningAlgorithm::from_identifier(&AlgorithmIdentifier::new(&arcs, None))
}

/// Check `cert`'s signature with `issuer`'s public key
pub(crate) fn verify_issued_by(
    cert: &X509Certificate<'_>,
    issuer: &X509Certificate<'_>,
) -> Result<bool> {
    let public_key = SigningPublicKey::from_spki_der(issuer.public_key().raw)?;
    let verifier = verifier_for(&public_key, signature_algorithm(cert)?)?;
    match verifier.verify(cert.tbs_certificate.as_ref(), &cert.signature_value.data) {
        Ok(valid) => Ok(valid),
        Err(TrifleError::InvalidInput(_)) => Ok(false),
        Err(other) => Err(other),
    }
}
