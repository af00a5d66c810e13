//! This crate provides types and functions to check that a PEM-encoded X.509
//! TLS certificate and a PEM-encoded private key belong together. It is used
//! to validate user supplied (or built-in default) certificates before they
//! are handed to a Kyma installation.
//!
//! Parsing is lenient in the same way most TLS stacks are: any PEM blocks
//! which are not certificates are skipped in the certificate input, and the
//! first private key block is used from the key input. The first certificate
//! is treated as the leaf certificate.
//!
//! Currently, these private key types are supported:
//!
//! - RSA, encoded as PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`)
//! - ECDSA on the NIST P-256 curve, encoded as SEC1 (`EC PRIVATE KEY`) or
//!   PKCS#8 (`PRIVATE KEY`)
//!
//! ## References
//!
//! - <https://datatracker.ietf.org/doc/html/rfc5280>
//! - <https://datatracker.ietf.org/doc/html/rfc7468>
use rustls_pemfile::Item;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::instrument;
use x509_cert::{
    Certificate,
    der::{Decode, Encode},
};

use crate::keys::PrivateKey;

pub mod keys;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error variants which can be encountered when creating a new
/// [`CertificatePair`].
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read PEM blocks from {input} input"))]
    ReadPem {
        source: std::io::Error,
        input: PemInput,
    },

    #[snafu(display("failed to find any PEM data in {input} input"))]
    NoPemData { input: PemInput },

    #[snafu(display("failed to decode DER certificate from the PEM block"))]
    DeserializeCertificate { source: x509_cert::der::Error },

    #[snafu(display("failed to encode certificate public key as DER"))]
    SerializeCertificatePublicKey { source: x509_cert::der::Error },

    #[snafu(display("failed to parse private key"))]
    ParsePrivateKey { source: keys::Error },

    #[snafu(display("failed to derive public key from the {algorithm} private key"))]
    DerivePublicKey {
        source: keys::Error,
        algorithm: &'static str,
    },

    #[snafu(display("private key does not match public key"))]
    KeyMismatch,
}

/// Which of the two inputs of [`CertificatePair::from_pem`] an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemInput {
    Certificate,
    Key,
}

impl std::fmt::Display for PemInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PemInput::Certificate => write!(f, "certificate"),
            PemInput::Key => write!(f, "key"),
        }
    }
}

/// A leaf certificate together with the private key bound to it.
///
/// A value of this type can only be constructed if the public key embedded
/// in the certificate is the public half of the private key.
#[derive(Debug)]
pub struct CertificatePair {
    certificate: Certificate,
    private_key: PrivateKey,
}

impl CertificatePair {
    /// Parses a PEM-encoded certificate (chain) and a PEM-encoded private key
    /// and verifies that they form a key pair.
    #[instrument(name = "parse_certificate_pair", skip_all)]
    pub fn from_pem(certificate_pem: &[u8], private_key_pem: &[u8]) -> Result<Self> {
        let certificate = leaf_certificate(certificate_pem)?;
        let private_key = PrivateKey::from_pem(private_key_pem)
            .context(ParsePrivateKeySnafu)?
            .context(NoPemDataSnafu {
                input: PemInput::Key,
            })?;

        let certificate_public_key = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .context(SerializeCertificatePublicKeySnafu)?;
        let private_public_key = private_key
            .public_key_der()
            .context(DerivePublicKeySnafu {
                algorithm: private_key.algorithm_name(),
            })?;

        ensure!(certificate_public_key == private_public_key, KeyMismatchSnafu);

        tracing::debug!(
            algorithm = private_key.algorithm_name(),
            "certificate matches private key"
        );

        Ok(Self {
            certificate,
            private_key,
        })
    }

    /// Returns a reference to the (leaf) [`Certificate`].
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Returns a reference to the private key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

fn leaf_certificate(mut input: &[u8]) -> Result<Certificate> {
    for item in rustls_pemfile::read_all(&mut input) {
        let item = item.context(ReadPemSnafu {
            input: PemInput::Certificate,
        })?;

        if let Item::X509Certificate(der) = item {
            return Certificate::from_der(der.as_ref()).context(DeserializeCertificateSnafu);
        }
    }

    NoPemDataSnafu {
        input: PemInput::Certificate,
    }
    .fail()
}
