use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// Error types for the trifle-pki crate
#[derive(Error, Debug)]
pub enum TrifleError {
    /// Malformed builder or codec input: empty OIDs, illegal characters,
    /// empty payloads or chains, undecodable DER
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown algorithm OIDs, unsupported curves or certificate versions
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u32),

    /// Values the codec refuses to encode, such as lengths needing more
    /// than 126 length octets
    #[error("Unhandled: {0}")]
    Unhandled(String),

    #[error("No trust anchor found for certificate chain")]
    NoTrustAnchor,

    #[error("Invalid certificate path: {0}")]
    InvalidCertPath(String),

    #[error("Certificate expired")]
    ExpiredCertificate,

    #[error("Certificate not yet valid")]
    NotValidYetCertificate,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Certificate does not match request: {0}")]
    CsrMismatch(String),

    #[error("Unspecified failure: {message}")]
    UnspecifiedFailure {
        message: String,
        #[source]
        cause: Option<BoxedCause>,
    },

    /// Failure reported by a signer; the collaborator's error is kept as the source
    #[error("Signing error: {0}")]
    Signing(#[source] BoxedCause),

    /// Failure reported by a key manager; the collaborator's error is kept as the source
    #[error("Key store error: {0}")]
    KeyStore(#[source] BoxedCause),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TrifleError {
    pub fn unspecified(message: impl Into<String>) -> Self {
        TrifleError::UnspecifiedFailure {
            message: message.into(),
            cause: None,
        }
    }

    pub fn unspecified_with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TrifleError::UnspecifiedFailure {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

impl From<prost::DecodeError> for TrifleError {
    fn from(err: prost::DecodeError) -> Self {
        TrifleError::Serialization(err.to_string())
    }
}

impl From<prost::EncodeError> for TrifleError {
    fn from(err: prost::EncodeError) -> Self {
        TrifleError::Serialization(err.to_string())
    }
}

impl From<x509_parser::nom::Err<x509_parser::error::X509Error>> for TrifleError {
    fn from(err: x509_parser::nom::Err<x509_parser::error::X509Error>) -> Self {
        TrifleError::InvalidInput(format!("Failed to parse certificate: {err}"))
    }
}

impl From<x509_parser::error::X509Error> for TrifleError {
    fn from(err: x509_parser::error::X509Error) -> Self {
        TrifleError::InvalidInput(format!("Malformed certificate: {err}"))
    }
}

/// Result type for trifle-pki operations
pub type Result<T> = std::result::Result<T, TrifleError>;
