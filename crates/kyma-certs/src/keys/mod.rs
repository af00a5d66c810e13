//! Contains the private key types which can be matched against the public key
//! embedded in a certificate.
//!
//! ## ECDSA
//!
//! ECDSA keys are handled by the [`p256`] crate, which implements the NIST
//! P-256 elliptic curve.
//!
//! ## RSA
//!
//! RSA keys are handled by the [`rsa`] crate.
use std::fmt::Debug;

use rustls_pemfile::Item;
use snafu::{ResultExt, Snafu};

pub mod ecdsa;
pub mod rsa;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read PEM blocks"))]
    ReadPem { source: std::io::Error },

    #[snafu(display("failed to parse RSA private key"))]
    Rsa { source: rsa::Error },

    #[snafu(display("failed to parse ECDSA private key"))]
    Ecdsa { source: ecdsa::Error },

    #[snafu(display(
        "unsupported PKCS8 private key, only RSA and ECDSA (P-256) keys are supported"
    ))]
    UnsupportedPkcs8Key {
        rsa_error: rsa::Error,
        ecdsa_error: ecdsa::Error,
    },
}

/// Common functionality of all supported private key algorithms.
pub trait CertificateKey
where
    Self: Debug + Sized,
{
    type Error: std::error::Error + 'static;

    /// Parses the private key from DER-encoded PKCS8.
    fn from_pkcs8_der(input: &[u8]) -> Result<Self, Self::Error>;

    /// Returns the DER-encoded SubjectPublicKeyInfo of the public half of
    /// the key, in the same form it is embedded into X.509 certificates.
    fn public_key_der(&self) -> Result<Vec<u8>, Self::Error>;

    /// The name of the algorithm such as `rsa` or `ecdsa`.
    fn algorithm_name() -> &'static str;
}

/// A private key of any supported algorithm.
#[derive(Debug)]
pub enum PrivateKey {
    Rsa(rsa::PrivateKey),
    Ecdsa(ecdsa::PrivateKey),
}

impl PrivateKey {
    /// Reads the first private key block from PEM-encoded input. Blocks of
    /// other types (such as certificates) are skipped.
    ///
    /// Returns [`None`] if the input doesn't contain any private key.
    pub fn from_pem(mut input: &[u8]) -> Result<Option<Self>> {
        for item in rustls_pemfile::read_all(&mut input) {
            let key = match item.context(ReadPemSnafu)? {
                Item::Pkcs1Key(der) => rsa::PrivateKey::from_pkcs1_der(der.secret_pkcs1_der())
                    .map(Self::Rsa)
                    .context(RsaSnafu),
                Item::Sec1Key(der) => ecdsa::PrivateKey::from_sec1_der(der.secret_sec1_der())
                    .map(Self::Ecdsa)
                    .context(EcdsaSnafu),
                Item::Pkcs8Key(der) => Self::from_pkcs8_der(der.secret_pkcs8_der()),
                _ => continue,
            };

            return key.map(Some);
        }

        Ok(None)
    }

    /// Parses a DER-encoded PKCS8 private key, trying RSA first and ECDSA
    /// second.
    pub fn from_pkcs8_der(input: &[u8]) -> Result<Self> {
        let rsa_error = match rsa::PrivateKey::from_pkcs8_der(input) {
            Ok(key) => return Ok(Self::Rsa(key)),
            Err(err) => err,
        };

        match ecdsa::PrivateKey::from_pkcs8_der(input) {
            Ok(key) => Ok(Self::Ecdsa(key)),
            Err(ecdsa_error) => UnsupportedPkcs8KeySnafu {
                rsa_error,
                ecdsa_error,
            }
            .fail(),
        }
    }

    /// See [`CertificateKey::public_key_der`].
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        match self {
            PrivateKey::Rsa(key) => key.public_key_der().context(RsaSnafu),
            PrivateKey::Ecdsa(key) => key.public_key_der().context(EcdsaSnafu),
        }
    }

    /// See [`CertificateKey::algorithm_name`].
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            PrivateKey::Rsa(_) => rsa::PrivateKey::algorithm_name(),
            PrivateKey::Ecdsa(_) => ecdsa::PrivateKey::algorithm_name(),
        }
    }
}
