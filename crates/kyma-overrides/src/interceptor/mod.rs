//! Interceptors rewrite or default override values at registered key paths.
//!
//! An interceptor is registered for one or more key paths on the
//! [`Builder`](crate::builder::Builder). While building, every registered key
//! is looked up in the merged overrides. If it is present,
//! [`Interceptor::intercept`] may replace the value, otherwise
//! [`Interceptor::undefined`] may inject a default.
use std::fmt::Debug;

use async_trait::async_trait;
use snafu::Snafu;

use crate::{
    cluster,
    value::{Mapping, Value},
};

mod certificate;
mod domain;
mod fallback;
mod mask;
mod registry;

pub use certificate::CertificateInterceptor;
pub use domain::DomainNameInterceptor;
pub use fallback::FallbackInterceptor;
pub use mask::{MASKED, MaskInterceptor};
pub use registry::{RegistryAddressInterceptor, RegistryDisableInterceptor};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to query the cluster topology"))]
    ClusterQuery { source: cluster::Error },

    #[snafu(display(
        "provided TLS certificate (passed in keys {crt_key:?} and {key_key:?}) is invalid"
    ))]
    InvalidCertificate {
        source: kyma_certs::Error,
        crt_key: String,
        key_key: String,
    },

    #[snafu(display("failed to decode the base64 encoded value of override {key:?}"))]
    DecodeBase64 {
        source: base64::DecodeError,
        key: String,
    },

    #[snafu(display(
        "override {key:?} cannot be set with default value as sub-key {sub_key:?} is not a map"
    ))]
    SubKeyNotMapping { key: String, sub_key: String },

    #[snafu(display("certificate interceptor can not handle override key {key:?}"))]
    UnsupportedKey { key: String },

    #[snafu(display("override {key:?} has to be a string, but is a {found}"))]
    NotAString { key: String, found: &'static str },
}

/// Controls access to the override values at the key paths it is registered
/// for.
#[async_trait]
pub trait Interceptor: Debug + Send + Sync {
    /// Renders a present value without querying the cluster. Used when
    /// overrides are printed via [`Display`](std::fmt::Display), e.g. in log
    /// lines.
    fn display(&self, value: &Value, _key: &str) -> String {
        value.to_string()
    }

    /// Renders a present value for the user.
    async fn render(&self, value: &Value, key: &str) -> String {
        self.display(value, key)
    }

    /// Called for every present value while building. The returned value
    /// replaces the original one.
    async fn intercept(&self, value: Value, key: &str) -> Result<Value>;

    /// Called for every absent key while building, can inject a default into
    /// `overrides`.
    async fn undefined(&self, overrides: &mut Mapping, key: &str) -> Result<()>;
}
