//! Issuing authority.
//!
//! Builds X.509 v3 certificates with the in-crate DER codec: self-signed
//! roots, subordinate authorities and device certificates issued from
//! verified PKCS#10 requests. The request's subject Name and
//! SubjectPublicKeyInfo are copied octet for octet so the issued
//! certificate matches the request exactly.

use std::sync::Arc;

use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use trifle_common::{Component, Logger};

use crate::algorithm::SigningPublicKey;
use crate::certificate::Certificate;
use crate::config::AuthorityConfig;
use crate::der::{Asn1Type, BitString};
use crate::error::{Result, TrifleError};
use crate::name::{name_to_asn1, DistinguishedName};
use crate::pkcs10::{CertificateRequest, MobileCertificateRequest};
use crate::signer::Signer;

pub const OID_SUBJECT_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 14];
pub const OID_KEY_USAGE: &[u64] = &[2, 5, 29, 15];
pub const OID_BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];
pub const OID_AUTHORITY_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 35];

/// X.509 v3, encoded as 2
const X509_V3: i64 = 2;

// KeyUsage bits, most significant first
const KU_DIGITAL_SIGNATURE: u8 = 0x80;
const KU_KEY_CERT_SIGN: u8 = 0x04;
const KU_CRL_SIGN: u8 = 0x02;

const KEY_IDENTIFIER_LEN: usize = 20;

/// The fields that differ between issued certificates
struct CertificateTemplate {
    subject_der: Vec<u8>,
    spki_der: Vec<u8>,
    subject_key: SigningPublicKey,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    is_authority: bool,
}

/// A signing key plus the certificate that vouches for it
pub struct CertificateAuthority {
    signer: Arc<dyn Signer>,
    certificate: Certificate,
    subject_der: Vec<u8>,
    key_identifier: Vec<u8>,
    config: AuthorityConfig,
    logger: Logger,
}

impl CertificateAuthority {
    /// Create a root authority with a self-signed certificate valid from now
    /// for the configured authority lifetime
    pub fn new_root(
        signer: Arc<dyn Signer>,
        subject: &[DistinguishedName],
        config: AuthorityConfig,
        logger: Logger,
    ) -> Result<Self> {
        config.validate()?;
        let not_before = now()?;
        let not_after = valid_for(not_before, config.authority_validity_days)?;
        Self::new_root_with_validity(signer, subject, not_before, not_after, config, logger)
    }

    pub fn new_root_with_validity(
        signer: Arc<dyn Signer>,
        subject: &[DistinguishedName],
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        config: AuthorityConfig,
        logger: Logger,
    ) -> Result<Self> {
        config.validate()?;
        let logger = logger.scoped(Component::Authority);
        let subject_der = name_to_asn1(subject).to_der()?;
        let public_key = signer.export_public_key()?;
        let key_identifier = key_identifier(&public_key);

        let template = CertificateTemplate {
            subject_der: subject_der.clone(),
            spki_der: public_key.spki_der()?,
            subject_key: public_key,
            not_before,
            not_after,
            is_authority: true,
        };
        let certificate = build_certificate(
            signer.as_ref(),
            &subject_der,
            &key_identifier,
            &template,
        )?;
        logger.info_args(format_args!(
            "Created self-signed root {} (serial {})",
            certificate.subject()?,
            certificate.serial_hex()?
        ));

        Ok(Self {
            signer,
            certificate,
            subject_der,
            key_identifier,
            config,
            logger,
        })
    }

    /// Resume an authority from its certificate and signing key
    pub fn from_certificate(
        signer: Arc<dyn Signer>,
        certificate: Certificate,
        config: AuthorityConfig,
        logger: Logger,
    ) -> Result<Self> {
        config.validate()?;
        let public_key = signer.export_public_key()?;
        if certificate.public_key()? != public_key {
            return Err(TrifleError::InvalidInput(
                "authority certificate does not carry the signer's key".to_string(),
            ));
        }
        if !certificate.is_ca()? {
            return Err(TrifleError::InvalidInput(
                "certificate is not a CA certificate".to_string(),
            ));
        }
        Ok(Self {
            subject_der: certificate.subject_der()?,
            key_identifier: key_identifier(&public_key),
            signer,
            certificate,
            config,
            logger: logger.scoped(Component::Authority),
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Issue a subordinate authority for `signer`'s key, valid for the
    /// configured authority lifetime
    pub fn issue_authority(
        &self,
        signer: Arc<dyn Signer>,
        subject: &[DistinguishedName],
    ) -> Result<CertificateAuthority> {
        let not_before = now()?;
        let not_after = valid_for(not_before, self.config.authority_validity_days)?;
        let subject_der = name_to_asn1(subject).to_der()?;
        let public_key = signer.export_public_key()?;
        let template = CertificateTemplate {
            subject_der: subject_der.clone(),
            spki_der: public_key.spki_der()?,
            subject_key: public_key.clone(),
            not_before,
            not_after,
            is_authority: true,
        };
        let certificate = self.sign_template(&template)?;
        self.logger.info_args(format_args!(
            "Issued subordinate authority {} (serial {})",
            certificate.subject()?,
            certificate.serial_hex()?
        ));

        Ok(CertificateAuthority {
            signer,
            certificate,
            subject_der,
            key_identifier: key_identifier(&public_key),
            config: self.config.clone(),
            logger: self.logger.clone(),
        })
    }

    /// Issue a device certificate valid from now for the configured leaf lifetime
    pub fn issue(&self, request: &CertificateRequest) -> Result<Certificate> {
        let not_before = now()?;
        let not_after = valid_for(not_before, self.config.leaf_validity_days)?;
        self.issue_with_validity(request, not_before, not_after)
    }

    pub fn issue_mobile(&self, request: &MobileCertificateRequest) -> Result<Certificate> {
        self.issue(request.request())
    }

    /// Issue a device certificate for an explicit validity window
    pub fn issue_with_validity(
        &self,
        request: &CertificateRequest,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Certificate> {
        if let Err(e) = request.verify_signature() {
            self.logger
                .warn_args(format_args!("Rejected certification request: {e}"));
            return Err(e);
        }

        let template = CertificateTemplate {
            subject_der: request.subject_der()?,
            spki_der: request.spki_der()?,
            subject_key: request.public_key()?,
            not_before,
            not_after,
            is_authority: false,
        };
        let certificate = self.sign_template(&template)?;
        self.logger.info_args(format_args!(
            "Issued certificate for {} key {} (serial {})",
            certificate.subject()?,
            template.subject_key.fingerprint(),
            certificate.serial_hex()?
        ));
        Ok(certificate)
    }

    fn sign_template(&self, template: &CertificateTemplate) -> Result<Certificate> {
        build_certificate(
            self.signer.as_ref(),
            &self.subject_der,
            &self.key_identifier,
            template,
        )
    }
}

fn build_certificate(
    issuer: &dyn Signer,
    issuer_der: &[u8],
    authority_key_id: &[u8],
    template: &CertificateTemplate,
) -> Result<Certificate> {
    if template.not_after <= template.not_before {
        return Err(TrifleError::InvalidInput(format!(
            "validity ends at {} before it starts at {}",
            template.not_after, template.not_before
        )));
    }
    let algorithm = issuer.export_public_key()?.key_info.algorithm;

    let tbs = Asn1Type::Sequence(vec![
        Asn1Type::Integer(X509_V3).explicit(0),
        Asn1Type::Integer(random_serial()),
        algorithm.identifier().to_asn1(),
        Asn1Type::Raw(issuer_der.to_vec()),
        Asn1Type::Sequence(vec![
            Asn1Type::UtcTime(template.not_before),
            Asn1Type::UtcTime(template.not_after),
        ]),
        Asn1Type::Raw(template.subject_der.clone()),
        Asn1Type::Raw(template.spki_der.clone()),
        Asn1Type::Sequence(extensions(template, authority_key_id)?).explicit(3),
    ])
    .to_der()?;

    let (used, signature) = issuer.sign(&tbs)?;
    if used != algorithm {
        return Err(TrifleError::Signing(
            format!("issuer signed with {used:?} but declares {algorithm:?}").into(),
        ));
    }

    let der = Asn1Type::Sequence(vec![
        Asn1Type::Raw(tbs),
        algorithm.identifier().to_asn1(),
        Asn1Type::BitString(BitString::from_bytes(signature)),
    ])
    .to_der()?;
    Certificate::from_der(&der)
}

fn extensions(template: &CertificateTemplate, authority_key_id: &[u8]) -> Result<Vec<Asn1Type>> {
    let (basic_constraints, key_usage) = if template.is_authority {
        (
            Asn1Type::Sequence(vec![Asn1Type::Boolean(true)]),
            KU_KEY_CERT_SIGN | KU_CRL_SIGN,
        )
    } else {
        (Asn1Type::Sequence(Vec::new()), KU_DIGITAL_SIGNATURE)
    };

    Ok(vec![
        extension(OID_BASIC_CONSTRAINTS, true, &basic_constraints)?,
        extension(
            OID_KEY_USAGE,
            true,
            &Asn1Type::BitString(BitString::with_padding(vec![key_usage])),
        )?,
        extension(
            OID_SUBJECT_KEY_IDENTIFIER,
            false,
            &Asn1Type::OctetString(key_identifier(&template.subject_key)),
        )?,
        extension(
            OID_AUTHORITY_KEY_IDENTIFIER,
            false,
            &Asn1Type::Sequence(vec![
                Asn1Type::OctetString(authority_key_id.to_vec()).implicit(0)
            ]),
        )?,
    ])
}

/// `Extension ::= SEQUENCE { extnID, critical BOOLEAN DEFAULT FALSE, extnValue OCTET STRING }`
fn extension(oid: &[u64], critical: bool, value: &Asn1Type) -> Result<Asn1Type> {
    let mut fields = vec![Asn1Type::oid(oid)];
    if critical {
        fields.push(Asn1Type::Boolean(true));
    }
    fields.push(Asn1Type::OctetString(value.to_der()?));
    Ok(Asn1Type::Sequence(fields))
}

/// Leftmost 160 bits of the SHA-256 of the public key point
fn key_identifier(public_key: &SigningPublicKey) -> Vec<u8> {
    Sha256::digest(&public_key.raw_key_bytes)[..KEY_IDENTIFIER_LEN].to_vec()
}

fn random_serial() -> i64 {
    rand::thread_rng().gen_range(1..i64::MAX)
}

/// End of a validity period of `days` starting at `not_before`
fn valid_for(not_before: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    not_before
        .checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| {
            TrifleError::InvalidInput(format!("validity of {days} days overflows the calendar"))
        })
}

/// The current time at UTCTime (whole second) precision
fn now() -> Result<DateTime<Utc>> {
    Utc::now()
        .duration_trunc(Duration::seconds(1))
        .map_err(|e| TrifleError::unspecified_with_cause("cannot truncate current time", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_end_is_checked() {
        let start = Utc::now();
        assert_eq!(valid_for(start, 1).unwrap(), start + Duration::days(1));
        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        assert!(matches!(
            valid_for(late, 2),
            Err(TrifleError::InvalidInput(_))
        ));
    }
}
