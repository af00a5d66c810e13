//! Abstraction layer around the [`p256`] crate. This module provides the
//! ECDSA (P-256) private key type used to check certificate and key pairs.
use p256::{
    SecretKey,
    pkcs8::{DecodePrivateKey, EncodePublicKey},
};
use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::keys::CertificateKey;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to deserialize the private key from DER-encoded SEC1"))]
    DeserializeSec1Key { source: p256::elliptic_curve::Error },

    #[snafu(display("failed to deserialize the private key from DER-encoded PKCS8"))]
    DeserializePkcs8Key { source: p256::pkcs8::Error },

    #[snafu(display("failed to serialize the public key as DER-encoded SPKI"))]
    SerializePublicKey { source: p256::pkcs8::spki::Error },
}

#[derive(Debug)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    /// Parses the private key from DER-encoded SEC1 (`EC PRIVATE KEY`).
    #[instrument(name = "parse_ecdsa_private_key_from_sec1_der", skip_all)]
    pub fn from_sec1_der(input: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_sec1_der(input).context(DeserializeSec1KeySnafu)?;
        Ok(Self(secret_key))
    }
}

impl CertificateKey for PrivateKey {
    type Error = Error;

    #[instrument(name = "parse_ecdsa_private_key_from_pkcs8_der", skip_all)]
    fn from_pkcs8_der(input: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_pkcs8_der(input).context(DeserializePkcs8KeySnafu)?;
        Ok(Self(secret_key))
    }

    fn public_key_der(&self) -> Result<Vec<u8>> {
        let document = self
            .0
            .public_key()
            .to_public_key_der()
            .context(SerializePublicKeySnafu)?;

        Ok(document.into_vec())
    }

    fn algorithm_name() -> &'static str {
        "ecdsa"
    }
}
