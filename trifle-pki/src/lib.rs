//! Trifle PKI – public API facade

pub mod algorithm;
pub mod authority;
pub mod certificate;
pub mod config;
pub mod der;
pub mod error;
pub mod name;
pub mod pkcs10;
pub mod protos;
pub mod signed_data;
pub mod signer;
pub mod trust;
pub mod validator;

pub use error::{Result, TrifleError};

pub use algorithm::{
    AlgorithmIdentifier, EllipticCurve, KeyInfo, SigningAlgorithm, SigningPublicKey,
};

pub use name::{Attribute, AttributeTypeValue, DistinguishedName};

pub use pkcs10::{CertificateRequest, CertificateRequestBuilder, MobileCertificateRequest};

pub use signer::{
    EcdsaP256Verifier, KeyHandle, KeyManager, Signer, SoftwareKeyManager, SoftwareSigner,
    Verifier,
};

pub use certificate::{Certificate, CERTIFICATE_VERSION};

pub use signed_data::{EnvelopedData, SignedData, VerifiedData, ENVELOPED_DATA_VERSION};

pub use trust::{PathValidationFailure, PkixTrustEvaluator, TrustEvaluator};

pub use validator::{CertChainValidator, CertificateValidator};

pub use authority::CertificateAuthority;

pub use config::AuthorityConfig;
