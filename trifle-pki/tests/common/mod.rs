//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use trifle_common::{Component, Logger};
use trifle_pki::{
    AuthorityConfig, CertificateAuthority, CertificateRequest, CertificateRequestBuilder,
    DistinguishedName, Result, SoftwareSigner,
};

pub fn test_logger(context: &str) -> Logger {
    Logger::new_root(Component::Custom("Test"), context)
}

pub fn subject(common_name: &str) -> Vec<DistinguishedName> {
    vec![
        DistinguishedName::CommonName(common_name.to_string()),
        DistinguishedName::OrganizationName("Trifle".to_string()),
        DistinguishedName::CountryName("US".to_string()),
    ]
}

pub fn root_authority(common_name: &str) -> Result<CertificateAuthority> {
    CertificateAuthority::new_root(
        Arc::new(SoftwareSigner::generate()),
        &subject(common_name),
        AuthorityConfig::default(),
        test_logger(common_name),
    )
}

/// A device key and a request for it
pub struct Device {
    pub signer: Arc<SoftwareSigner>,
    pub request: CertificateRequest,
}

pub fn device(common_name: &str) -> Result<Device> {
    let signer = Arc::new(SoftwareSigner::generate());
    let request = CertificateRequestBuilder::new()
        .with_subject(subject(common_name))
        .sign(&*signer)?;
    Ok(Device { signer, request })
}
