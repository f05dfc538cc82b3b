//! Algorithm and key-info registry.
//!
//! Maps the key shapes a signer can export to the OIDs used in
//! SubjectPublicKeyInfo and signature AlgorithmIdentifiers, and back.
//! Anything outside the registry fails with `UnsupportedOperation`.

use crate::der::{oid, read_single, Asn1Type, BitString, Tag};
use crate::error::{Result, TrifleError};

pub const OID_EC_PUBLIC_KEY: &[u64] = &[1, 2, 840, 10_045, 2, 1];
pub const OID_PRIME256V1: &[u64] = &[1, 2, 840, 10_045, 3, 1, 7];
pub const OID_ECDSA_WITH_SHA256: &[u64] = &[1, 2, 840, 10_045, 4, 3, 2];

/// Named curves a key may live on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EllipticCurve {
    P256,
}

impl EllipticCurve {
    pub fn oid(&self) -> &'static [u64] {
        match self {
            EllipticCurve::P256 => OID_PRIME256V1,
        }
    }

    pub fn from_oid(arcs: &[u64]) -> Result<Self> {
        if arcs == OID_PRIME256V1 {
            return Ok(EllipticCurve::P256);
        }
        Err(TrifleError::UnsupportedOperation(format!(
            "unsupported curve {}",
            oid::to_dotted(arcs)
        )))
    }

    /// Length of an uncompressed SEC1 point on this curve
    pub fn uncompressed_point_len(&self) -> usize {
        match self {
            EllipticCurve::P256 => 65,
        }
    }
}

/// Signature algorithms a signer may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SigningAlgorithm {
    EcdsaSha256,
}

impl SigningAlgorithm {
    pub fn oid(&self) -> &'static [u64] {
        match self {
            SigningAlgorithm::EcdsaSha256 => OID_ECDSA_WITH_SHA256,
        }
    }

    /// ECDSA identifiers carry no parameters (RFC 5758)
    pub fn identifier(&self) -> AlgorithmIdentifier {
        match self {
            SigningAlgorithm::EcdsaSha256 => AlgorithmIdentifier::new(self.oid(), None),
        }
    }

    pub fn from_identifier(identifier: &AlgorithmIdentifier) -> Result<Self> {
        if identifier.oid == OID_ECDSA_WITH_SHA256 {
            if identifier.parameters.is_some() {
                return Err(TrifleError::InvalidInput(
                    "ecdsa-with-SHA256 must not carry parameters".to_string(),
                ));
            }
            return Ok(SigningAlgorithm::EcdsaSha256);
        }
        Err(TrifleError::UnsupportedOperation(format!(
            "unsupported signature algorithm {}",
            oid::to_dotted(&identifier.oid)
        )))
    }
}

/// `AlgorithmIdentifier ::= SEQUENCE { algorithm OID, parameters ANY OPTIONAL }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmIdentifier {
    pub oid: Vec<u64>,
    pub parameters: Option<Asn1Type>,
}

impl AlgorithmIdentifier {
    pub fn new(oid: &[u64], parameters: Option<Asn1Type>) -> Self {
        Self {
            oid: oid.to_vec(),
            parameters,
        }
    }

    pub fn to_asn1(&self) -> Asn1Type {
        let mut children = vec![Asn1Type::ObjectIdentifier(self.oid.clone())];
        if let Some(parameters) = &self.parameters {
            children.push(parameters.clone());
        }
        Asn1Type::Sequence(children)
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.to_asn1().to_der()
    }

    /// Decode from DER. Constructed parameters are kept as raw octets since
    /// no supported algorithm needs to look inside them.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let outer = read_single(der)?;
        outer.expect(Tag::Sequence)?;
        let children = outer
            .children()?
            .iter()
            .map(|child| {
                if child.is_constructed() {
                    Ok(Asn1Type::Raw(child.raw.to_vec()))
                } else {
                    Asn1Type::from_tlv(child)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_asn1(Asn1Type::Sequence(children))
    }

    pub fn from_asn1(value: Asn1Type) -> Result<Self> {
        let mut children = match value {
            Asn1Type::Sequence(children) => children.into_iter(),
            other => {
                return Err(TrifleError::InvalidInput(format!(
                    "AlgorithmIdentifier must be a SEQUENCE, found {:?}",
                    other.tag()
                )))
            }
        };
        let oid = match children.next() {
            Some(Asn1Type::ObjectIdentifier(arcs)) => arcs,
            _ => {
                return Err(TrifleError::InvalidInput(
                    "AlgorithmIdentifier must start with an OID".to_string(),
                ))
            }
        };
        let parameters = children.next();
        if children.next().is_some() {
            return Err(TrifleError::InvalidInput(
                "AlgorithmIdentifier has trailing elements".to_string(),
            ));
        }
        Ok(Self { oid, parameters })
    }
}

/// Curve and signature algorithm of a signing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyInfo {
    pub curve: EllipticCurve,
    pub algorithm: SigningAlgorithm,
}

impl KeyInfo {
    pub const P256_ECDSA_SHA256: KeyInfo = KeyInfo {
        curve: EllipticCurve::P256,
        algorithm: SigningAlgorithm::EcdsaSha256,
    };

    pub fn new(curve: EllipticCurve, algorithm: SigningAlgorithm) -> Result<Self> {
        match (curve, algorithm) {
            (EllipticCurve::P256, SigningAlgorithm::EcdsaSha256) => Ok(Self { curve, algorithm }),
        }
    }

    /// The SubjectPublicKeyInfo algorithm: `ecPublicKey` parameterized by the curve
    pub fn public_key_algorithm(&self) -> AlgorithmIdentifier {
        AlgorithmIdentifier::new(OID_EC_PUBLIC_KEY, Some(Asn1Type::oid(self.curve.oid())))
    }

    pub fn to_asn1(&self) -> Asn1Type {
        self.public_key_algorithm().to_asn1()
    }

    /// Inverse lookup from a SubjectPublicKeyInfo algorithm identifier
    pub fn from_public_key_algorithm(identifier: &AlgorithmIdentifier) -> Result<Self> {
        if identifier.oid != OID_EC_PUBLIC_KEY {
            return Err(TrifleError::UnsupportedOperation(format!(
                "unsupported public key algorithm {}",
                oid::to_dotted(&identifier.oid)
            )));
        }
        let curve = match &identifier.parameters {
            Some(Asn1Type::ObjectIdentifier(arcs)) => EllipticCurve::from_oid(arcs)?,
            _ => {
                return Err(TrifleError::UnsupportedOperation(
                    "ecPublicKey without a named curve".to_string(),
                ))
            }
        };
        match curve {
            EllipticCurve::P256 => Self::new(curve, SigningAlgorithm::EcdsaSha256),
        }
    }
}

/// An exported public key plus the metadata needed to rebuild its SubjectPublicKeyInfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningPublicKey {
    pub key_info: KeyInfo,
    pub raw_key_bytes: Vec<u8>,
}

impl SigningPublicKey {
    pub fn new(key_info: KeyInfo, raw_key_bytes: Vec<u8>) -> Result<Self> {
        let expected = key_info.curve.uncompressed_point_len();
        if raw_key_bytes.len() != expected || raw_key_bytes.first() != Some(&0x04) {
            return Err(TrifleError::InvalidInput(format!(
                "expected a {expected}-octet uncompressed point, got {} octets",
                raw_key_bytes.len()
            )));
        }
        Ok(Self {
            key_info,
            raw_key_bytes,
        })
    }

    /// `SubjectPublicKeyInfo ::= SEQUENCE { algorithm, subjectPublicKey BIT STRING }`
    pub fn subject_public_key_info(&self) -> Asn1Type {
        Asn1Type::Sequence(vec![
            self.key_info.to_asn1(),
            Asn1Type::BitString(BitString::from_bytes(self.raw_key_bytes.clone())),
        ])
    }

    pub fn spki_der(&self) -> Result<Vec<u8>> {
        self.subject_public_key_info().to_der()
    }

    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let spki = read_single(der)?;
        spki.expect(Tag::Sequence)?;
        let children = spki.children()?;
        let [algorithm, key] = children.as_slice() else {
            return Err(TrifleError::InvalidInput(format!(
                "SubjectPublicKeyInfo has {} elements",
                children.len()
            )));
        };

        let algorithm = AlgorithmIdentifier::from_der(algorithm.raw)?;
        let key_info = KeyInfo::from_public_key_algorithm(&algorithm)?;
        let bits = match Asn1Type::from_tlv(key)? {
            Asn1Type::BitString(bits) if bits.unused_bits() == 0 => bits,
            _ => {
                return Err(TrifleError::InvalidInput(
                    "subjectPublicKey must be an octet-aligned BIT STRING".to_string(),
                ))
            }
        };
        Self::new(key_info, bits.into_bytes())
    }

    /// Short hex fingerprint for logs
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(&Sha256::digest(&self.raw_key_bytes)[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdsa_identifier_has_no_parameters() {
        let der = SigningAlgorithm::EcdsaSha256.identifier().to_der().unwrap();
        assert_eq!(
            der,
            vec![0x30, 0x0A, 0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x02]
        );
    }

    #[test]
    fn p256_key_info_round_trips() {
        let identifier = KeyInfo::P256_ECDSA_SHA256.public_key_algorithm();
        let der = identifier.to_der().unwrap();
        let decoded = AlgorithmIdentifier::from_der(&der).unwrap();
        assert_eq!(
            KeyInfo::from_public_key_algorithm(&decoded).unwrap(),
            KeyInfo::P256_ECDSA_SHA256
        );
    }

    #[test]
    fn unknown_algorithms_are_unsupported() {
        let rsa = AlgorithmIdentifier::new(&[1, 2, 840, 113_549, 1, 1, 11], Some(Asn1Type::Null));
        assert!(matches!(
            SigningAlgorithm::from_identifier(&rsa),
            Err(TrifleError::UnsupportedOperation(_))
        ));

        let secp384 = AlgorithmIdentifier::new(
            OID_EC_PUBLIC_KEY,
            Some(Asn1Type::oid(&[1, 3, 132, 0, 34])),
        );
        assert!(matches!(
            KeyInfo::from_public_key_algorithm(&secp384),
            Err(TrifleError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn spki_round_trip() {
        let mut point = vec![0x04];
        point.extend((1..=64).map(|b| b as u8));
        let key = SigningPublicKey::new(KeyInfo::P256_ECDSA_SHA256, point).unwrap();
        let der = key.spki_der().unwrap();
        assert_eq!(SigningPublicKey::from_spki_der(&der).unwrap(), key);
    }

    #[test]
    fn rejects_compressed_points() {
        assert!(SigningPublicKey::new(KeyInfo::P256_ECDSA_SHA256, vec![0x02; 33]).is_err());
    }
}
