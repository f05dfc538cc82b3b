use std::sync::Arc;

use chrono::{DateTime, Utc};
use trifle_common::{Component, Logger};

use super::CertificateFormat;
use crate::certificate::Certificate;
use crate::error::{Result, TrifleError};
use crate::trust::{is_self_signed_root, parse_certificate, PkixTrustEvaluator, TrustEvaluator};

/// Validates leaf-first chains against one pinned trust anchor
#[derive(Clone)]
pub enum CertChainValidator {
    X509(X509ChainValidator),
}

impl CertChainValidator {
    /// Validator for chains ending at `trust_anchor`, evaluated at `as_of`
    /// (the current time when `None`)
    pub fn new(trust_anchor: &Certificate, as_of: Option<DateTime<Utc>>) -> Result<Self> {
        match CertificateFormat::for_version(trust_anchor.version())? {
            CertificateFormat::X509 => {
                let logger = Logger::new_root(Component::Validator, "chain");
                Ok(CertChainValidator::X509(X509ChainValidator {
                    trust_anchor: trust_anchor.clone(),
                    as_of,
                    evaluator: Arc::new(PkixTrustEvaluator::new(logger.clone())),
                    logger,
                }))
            }
        }
    }

    pub fn with_logger(self, logger: Logger) -> Self {
        match self {
            CertChainValidator::X509(mut validator) => {
                validator.logger = logger.scoped(Component::Validator);
                validator.evaluator = Arc::new(PkixTrustEvaluator::new(logger));
                CertChainValidator::X509(validator)
            }
        }
    }

    /// Replace the in-process evaluator, e.g. with a platform trust service
    pub fn with_evaluator(self, evaluator: Arc<dyn TrustEvaluator>) -> Self {
        match self {
            CertChainValidator::X509(mut validator) => {
                validator.evaluator = evaluator;
                CertChainValidator::X509(validator)
            }
        }
    }

    pub fn validate(&self, chain: &[Certificate]) -> Result<()> {
        match self {
            CertChainValidator::X509(validator) => validator.validate(chain),
        }
    }

    pub(crate) fn logger(&self) -> &Logger {
        match self {
            CertChainValidator::X509(validator) => &validator.logger,
        }
    }
}

#[derive(Clone)]
pub struct X509ChainValidator {
    trust_anchor: Certificate,
    as_of: Option<DateTime<Utc>>,
    evaluator: Arc<dyn TrustEvaluator>,
    logger: Logger,
}

impl X509ChainValidator {
    pub fn validate(&self, chain: &[Certificate]) -> Result<()> {
        let mut path = Vec::with_capacity(chain.len());
        for (depth, certificate) in chain.iter().enumerate() {
            CertificateFormat::for_version(certificate.version())?;
            let parsed = parse_certificate(certificate.der())?;
            // A self-signed root and anything after it are left to the anchor
            if is_self_signed_root(&parsed) {
                self.logger.debug_args(format_args!(
                    "Dropping self-signed root at depth {depth} and {} after it",
                    chain.len() - depth - 1
                ));
                break;
            }
            path.push(certificate.der().to_vec());
        }
        if path.is_empty() {
            return Err(TrifleError::InvalidCertPath(
                "chain has no certificates below a root".to_string(),
            ));
        }

        let as_of = self.as_of.unwrap_or_else(Utc::now);
        if self
            .evaluator
            .evaluate(&path, Some(self.trust_anchor.der()), as_of)?
        {
            Ok(())
        } else {
            Err(TrifleError::unspecified(
                "trust evaluation rejected the certificate chain",
            ))
        }
    }
}
