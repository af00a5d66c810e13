//! Abstraction layer around the [`rsa`] crate. This module provides the RSA
//! private key type used to check certificate and key pairs.
use rsa::{
    RsaPrivateKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePublicKey},
};
use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::keys::CertificateKey;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to deserialize the private key from DER-encoded PKCS1"))]
    DeserializePkcs1Key { source: rsa::pkcs1::Error },

    #[snafu(display("failed to deserialize the private key from DER-encoded PKCS8"))]
    DeserializePkcs8Key { source: rsa::pkcs8::Error },

    #[snafu(display("failed to serialize the public key as DER-encoded SPKI"))]
    SerializePublicKey { source: rsa::pkcs8::spki::Error },
}

#[derive(Debug)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Parses the private key from DER-encoded PKCS1 (`RSA PRIVATE KEY`).
    #[instrument(name = "parse_rsa_private_key_from_pkcs1_der", skip_all)]
    pub fn from_pkcs1_der(input: &[u8]) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs1_der(input).context(DeserializePkcs1KeySnafu)?;
        Ok(Self(private_key))
    }
}

impl CertificateKey for PrivateKey {
    type Error = Error;

    #[instrument(name = "parse_rsa_private_key_from_pkcs8_der", skip_all)]
    fn from_pkcs8_der(input: &[u8]) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_der(input).context(DeserializePkcs8KeySnafu)?;
        Ok(Self(private_key))
    }

    fn public_key_der(&self) -> Result<Vec<u8>> {
        let document = self
            .0
            .to_public_key()
            .to_public_key_der()
            .context(SerializePublicKeySnafu)?;

        Ok(document.into_vec())
    }

    fn algorithm_name() -> &'static str {
        "rsa"
    }
}
