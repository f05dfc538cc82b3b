//! Wire messages for the binary envelopes.
//!
//! Top-level envelopes travel length-delimited; the `EnvelopedData` octets
//! embedded in `SignedData` are a plain message encoding and are the exact
//! bytes covered by the signature.

/// An X.509 certificate and the envelope version it was written with
#[derive(Clone, PartialEq, prost::Message)]
pub struct CertificateProto {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    /// DER certificate
    #[prost(bytes = "vec", tag = "2")]
    pub certificate: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MobileCertificateRequestProto {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    /// DER PKCS#10 request
    #[prost(bytes = "vec", tag = "2")]
    pub pkcs10_request: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EnvelopedDataProto {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    /// DER AlgorithmIdentifier of the signature
    #[prost(bytes = "vec", tag = "2")]
    pub signing_algorithm: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SignedDataProto {
    /// Encoded `EnvelopedDataProto`, kept as the signed octets
    #[prost(bytes = "vec", tag = "1")]
    pub enveloped_data: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    /// Leaf first
    #[prost(message, repeated, tag = "3")]
    pub certificates: Vec<CertificateProto>,
}
