use chrono::{DateTime, Utc};

use super::CertificateFormat;
use crate::certificate::Certificate;
use crate::error::{Result, TrifleError};
use crate::pkcs10::CertificateRequest;
use crate::trust::parse_certificate;

/// Checks a single certificate's own attributes
#[derive(Debug, Clone)]
pub enum CertificateValidator {
    X509(X509CertificateValidator),
}

impl CertificateValidator {
    pub fn for_certificate(certificate: &Certificate) -> Result<Self> {
        match CertificateFormat::for_version(certificate.version())? {
            CertificateFormat::X509 => Ok(CertificateValidator::X509(X509CertificateValidator {
                certificate: certificate.clone(),
            })),
        }
    }

    /// Fail unless `date` falls within the certificate's validity window
    pub fn validate_at(&self, date: DateTime<Utc>) -> Result<()> {
        match self {
            CertificateValidator::X509(validator) => validator.validate_at(date),
        }
    }

    /// Fail with `CsrMismatch` unless the certificate carries the request's
    /// subject and public key
    pub fn validate_request(&self, request: &CertificateRequest) -> Result<()> {
        match self {
            CertificateValidator::X509(validator) => validator.validate_request(request),
        }
    }
}

#[derive(Debug, Clone)]
pub struct X509CertificateValidator {
    certificate: Certificate,
}

impl X509CertificateValidator {
    pub fn validate_at(&self, date: DateTime<Utc>) -> Result<()> {
        let cert = parse_certificate(self.certificate.der())?;
        let validity = cert.validity();
        let now = date.timestamp();
        if now < validity.not_before.timestamp() {
            return Err(TrifleError::NotValidYetCertificate);
        }
        if now > validity.not_after.timestamp() {
            return Err(TrifleError::ExpiredCertificate);
        }
        Ok(())
    }

    pub fn validate_request(&self, request: &CertificateRequest) -> Result<()> {
        let cert = parse_certificate(self.certificate.der())?;
        if cert.subject().as_raw() != request.subject_der()?.as_slice() {
            return Err(TrifleError::CsrMismatch(format!(
                "certificate subject {} differs from the request subject",
                cert.subject()
            )));
        }
        if cert.public_key().raw != request.spki_der()?.as_slice() {
            return Err(TrifleError::CsrMismatch(
                "certificate public key differs from the request key".to_string(),
            ));
        }
        Ok(())
    }
}
