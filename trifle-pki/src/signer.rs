//! Signing and verification capabilities.
//!
//! [`Signer`] and [`KeyManager`] stand in for hardware-backed key storage;
//! [`SoftwareSigner`] and [`SoftwareKeyManager`] are in-process P-256
//! implementations. Callers hold `Arc<dyn Signer>` and never branch on the
//! implementation behind it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use p256::ecdsa::signature::{Signer as _, Verifier as _};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use pkcs8::{DecodePrivateKey, EncodePrivateKey};
use trifle_common::{Component, Logger};
use zeroize::Zeroizing;

use crate::algorithm::{EllipticCurve, KeyInfo, SigningAlgorithm, SigningPublicKey};
use crate::error::{Result, TrifleError};

/// A private key able to sign on behalf of its holder
pub trait Signer: Send + Sync {
    /// Public half of the key, with the metadata needed for a SubjectPublicKeyInfo
    fn export_public_key(&self) -> Result<SigningPublicKey>;

    /// Sign `data`, returning the algorithm used and the DER signature
    fn sign(&self, data: &[u8]) -> Result<(SigningAlgorithm, Vec<u8>)>;
}

/// Opaque reference to a key held by a [`KeyManager`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle {
    alias: String,
}

impl KeyHandle {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)
    }
}

/// Key lifecycle: generation, lookup and removal of signing keys
pub trait KeyManager: Send + Sync {
    fn generate_key(&self, alias: &str) -> Result<KeyHandle>;
    fn key_exists(&self, handle: &KeyHandle) -> Result<bool>;
    fn delete_key(&self, handle: &KeyHandle) -> Result<()>;
    fn signer(&self, handle: &KeyHandle) -> Result<Arc<dyn Signer>>;
}

/// Checks a signature against a fixed public key
pub trait Verifier {
    /// `Ok(false)` for a well-formed signature that does not verify;
    /// `Err` when the signature cannot be parsed at all
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool>;
}

/// Build the verifier matching a public key and a declared algorithm
pub fn verifier_for(
    public_key: &SigningPublicKey,
    algorithm: SigningAlgorithm,
) -> Result<Box<dyn Verifier>> {
    if public_key.key_info.algorithm != algorithm {
        return Err(TrifleError::UnsupportedOperation(format!(
            "key declared for {:?} cannot verify {algorithm:?}",
            public_key.key_info.algorithm
        )));
    }
    match (public_key.key_info.curve, algorithm) {
        (EllipticCurve::P256, SigningAlgorithm::EcdsaSha256) => {
            Ok(Box::new(EcdsaP256Verifier::from_public_key(public_key)?))
        }
    }
}

impl SigningPublicKey {
    pub fn verifier(&self) -> Result<Box<dyn Verifier>> {
        verifier_for(self, self.key_info.algorithm)
    }
}

/// ECDSA P-256 / SHA-256 verifier over DER signatures
#[derive(Debug, Clone)]
pub struct EcdsaP256Verifier {
    verifying_key: VerifyingKey,
}

impl EcdsaP256Verifier {
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        let verifying_key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| TrifleError::InvalidInput(format!("Invalid P-256 public key: {e}")))?;
        Ok(Self { verifying_key })
    }

    pub fn from_public_key(public_key: &SigningPublicKey) -> Result<Self> {
        Self::from_sec1_bytes(&public_key.raw_key_bytes)
    }
}

impl Verifier for EcdsaP256Verifier {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let signature = Signature::from_der(signature)
            .map_err(|e| TrifleError::InvalidInput(format!("Invalid signature format: {e}")))?;
        Ok(self.verifying_key.verify(data, &signature).is_ok())
    }
}

/// In-process ECDSA P-256 signer
#[derive(Clone)]
pub struct SoftwareSigner {
    signing_key: SigningKey,
}

impl SoftwareSigner {
    /// Generate a fresh P-256 key
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Load a key from PKCS#8 DER
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_der(der)
            .map_err(|e| TrifleError::InvalidInput(format!("Invalid PKCS#8 private key: {e}")))?;
        Ok(Self { signing_key })
    }

    /// Export the private key as PKCS#8 DER; the buffer is wiped on drop
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let document = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| TrifleError::KeyStore(Box::new(e)))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl fmt::Debug for SoftwareSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareSigner")
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

impl Signer for SoftwareSigner {
    fn export_public_key(&self) -> Result<SigningPublicKey> {
        let point = self.verifying_key().to_encoded_point(false);
        SigningPublicKey::new(KeyInfo::P256_ECDSA_SHA256, point.as_bytes().to_vec())
    }

    fn sign(&self, data: &[u8]) -> Result<(SigningAlgorithm, Vec<u8>)> {
        let signature: Signature = self
            .signing_key
            .try_sign(data)
            .map_err(|e| TrifleError::Signing(Box::new(e)))?;
        Ok((
            SigningAlgorithm::EcdsaSha256,
            signature.to_der().as_bytes().to_vec(),
        ))
    }
}

/// In-memory key manager; aliases map to independently generated keys
pub struct SoftwareKeyManager {
    keys: RwLock<HashMap<String, Arc<SoftwareSigner>>>,
    logger: Logger,
}

impl SoftwareKeyManager {
    pub fn new(logger: Logger) -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            logger: logger.scoped(Component::Keys),
        }
    }

    /// Register an existing key under `alias`, replacing any previous one
    pub fn import_key(&self, alias: &str, signer: SoftwareSigner) -> Result<KeyHandle> {
        let fingerprint = signer.export_public_key()?.fingerprint();
        self.keys
            .write()
            .map_err(|_| lock_poisoned())?
            .insert(alias.to_string(), Arc::new(signer));
        self.logger
            .debug_args(format_args!("Imported key '{alias}' ({fingerprint})"));
        Ok(KeyHandle::new(alias))
    }

    pub fn aliases(&self) -> Result<Vec<String>> {
        let keys = self.keys.read().map_err(|_| lock_poisoned())?;
        let mut aliases: Vec<String> = keys.keys().cloned().collect();
        aliases.sort();
        Ok(aliases)
    }
}

impl KeyManager for SoftwareKeyManager {
    fn generate_key(&self, alias: &str) -> Result<KeyHandle> {
        if alias.is_empty() {
            return Err(TrifleError::InvalidInput("key alias is empty".to_string()));
        }
        let mut keys = self.keys.write().map_err(|_| lock_poisoned())?;
        if keys.contains_key(alias) {
            return Err(TrifleError::KeyStore(
                format!("key '{alias}' already exists").into(),
            ));
        }
        let signer = SoftwareSigner::generate();
        let fingerprint = signer.export_public_key()?.fingerprint();
        keys.insert(alias.to_string(), Arc::new(signer));
        self.logger
            .info_args(format_args!("Generated P-256 key '{alias}' ({fingerprint})"));
        Ok(KeyHandle::new(alias))
    }

    fn key_exists(&self, handle: &KeyHandle) -> Result<bool> {
        let keys = self.keys.read().map_err(|_| lock_poisoned())?;
        Ok(keys.contains_key(handle.alias()))
    }

    fn delete_key(&self, handle: &KeyHandle) -> Result<()> {
        let removed = self
            .keys
            .write()
            .map_err(|_| lock_poisoned())?
            .remove(handle.alias());
        match removed {
            Some(_) => {
                self.logger.info(format!("Deleted key '{handle}'"));
                Ok(())
            }
            None => Err(TrifleError::KeyStore(
                format!("key '{handle}' not found").into(),
            )),
        }
    }

    fn signer(&self, handle: &KeyHandle) -> Result<Arc<dyn Signer>> {
        let keys = self.keys.read().map_err(|_| lock_poisoned())?;
        let signer = keys
            .get(handle.alias())
            .cloned()
            .ok_or_else(|| TrifleError::KeyStore(format!("key '{handle}' not found").into()))?;
        Ok(signer)
    }
}

fn lock_poisoned() -> TrifleError {
    TrifleError::KeyStore("key table lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_signature_verifies_with_exported_key() {
        let signer = SoftwareSigner::generate();
        let (algorithm, signature) = signer.sign(b"payload").unwrap();
        assert_eq!(algorithm, SigningAlgorithm::EcdsaSha256);

        let verifier = signer.export_public_key().unwrap().verifier().unwrap();
        assert!(verifier.verify(b"payload", &signature).unwrap());
        assert!(!verifier.verify(b"payload!", &signature).unwrap());
    }

    #[test]
    fn malformed_signature_is_an_error() {
        let signer = SoftwareSigner::generate();
        let verifier = signer.export_public_key().unwrap().verifier().unwrap();
        assert!(verifier.verify(b"payload", &[0x30, 0x01]).is_err());
    }

    #[test]
    fn pkcs8_export_round_trips() {
        let signer = SoftwareSigner::generate();
        let der = signer.to_pkcs8_der().unwrap();
        let restored = SoftwareSigner::from_pkcs8_der(&der).unwrap();
        assert_eq!(
            restored.export_public_key().unwrap(),
            signer.export_public_key().unwrap()
        );
    }

    #[test]
    fn debug_output_hides_the_key() {
        let rendered = format!("{:?}", SoftwareSigner::generate());
        assert!(rendered.contains("[REDACTED]"));
    }
}
