//! Certificate validators.
//!
//! Validators are closed enums with one variant per certificate format,
//! chosen from the certificate's envelope version.

mod attributes;
mod chain;

pub use attributes::{CertificateValidator, X509CertificateValidator};
pub use chain::{CertChainValidator, X509ChainValidator};

use crate::certificate::CERTIFICATE_VERSION;
use crate::error::{Result, TrifleError};

/// Certificate formats known to the validators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateFormat {
    X509,
}

impl CertificateFormat {
    pub fn for_version(version: u32) -> Result<Self> {
        match version {
            CERTIFICATE_VERSION => Ok(CertificateFormat::X509),
            other => Err(TrifleError::UnsupportedOperation(format!(
                "no validator for certificate version {other}"
            ))),
        }
    }
}
