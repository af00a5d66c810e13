use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use kyma_certs::CertificatePair;
use snafu::{ResultExt, ensure};
use tracing::instrument;

use crate::{
    cluster::ClusterTopology,
    defaults::{LOCAL_TLS_CRT, LOCAL_TLS_KEY, REMOTE_TLS_CRT, REMOTE_TLS_KEY},
    interceptor::{
        ClusterQuerySnafu, DecodeBase64Snafu, FallbackInterceptor, Interceptor,
        InvalidCertificateSnafu, MASKED, NotAStringSnafu, Result, UnsupportedKeySnafu,
    },
    value::{Mapping, Value},
};

/// Handles a base64 encoded TLS certificate and private key stored at two
/// separate override keys.
///
/// The certificate and key seen last are remembered, and once both are known
/// they have to form a key pair. On Gardener clusters certificates are
/// managed by the cluster, so provided values are blanked and no defaults
/// are injected.
#[derive(Debug)]
pub struct CertificateInterceptor {
    crt_key: String,
    key_key: String,
    topology: Arc<dyn ClusterTopology>,
    pair: Mutex<EncodedPair>,
}

#[derive(Debug, Default)]
struct EncodedPair {
    crt: String,
    key: String,
}

impl CertificateInterceptor {
    pub fn new(
        crt_key: impl Into<String>,
        key_key: impl Into<String>,
        topology: Arc<dyn ClusterTopology>,
    ) -> Self {
        Self {
            crt_key: crt_key.into(),
            key_key: key_key.into(),
            topology,
            pair: Mutex::default(),
        }
    }

    /// The override keys this interceptor is meant to be registered for.
    pub fn keys(&self) -> [&str; 2] {
        [&self.crt_key, &self.key_key]
    }

    fn pair(&self) -> MutexGuard<'_, EncodedPair> {
        self.pair.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remembers `value` for `key`, returns `false` for keys which are
    /// neither the certificate nor the private key key.
    fn remember(&self, key: &str, value: &str) -> bool {
        let mut pair = self.pair();
        if key == self.crt_key {
            pair.crt = value.to_owned();
        } else if key == self.key_key {
            pair.key = value.to_owned();
        } else {
            return false;
        }
        true
    }

    fn validate(&self) -> Result<()> {
        let (crt, key) = {
            let pair = self.pair();
            (pair.crt.clone(), pair.key.clone())
        };
        if crt.is_empty() || key.is_empty() {
            return Ok(());
        }

        let crt = STANDARD.decode(crt).context(DecodeBase64Snafu {
            key: &self.crt_key,
        })?;
        let key = STANDARD.decode(key).context(DecodeBase64Snafu {
            key: &self.key_key,
        })?;

        CertificatePair::from_pem(&crt, &key).context(InvalidCertificateSnafu {
            crt_key: &self.crt_key,
            key_key: &self.key_key,
        })?;

        tracing::debug!(
            crt_key = %self.crt_key,
            key_key = %self.key_key,
            "TLS certificate and private key form a valid pair"
        );
        Ok(())
    }
}

#[async_trait]
impl Interceptor for CertificateInterceptor {
    fn display(&self, _value: &Value, _key: &str) -> String {
        MASKED.to_owned()
    }

    #[instrument(skip(self, value))]
    async fn intercept(&self, value: Value, key: &str) -> Result<Value> {
        if self.topology.is_gardener().await.context(ClusterQuerySnafu)? {
            tracing::info!("certificates are managed by Gardener, dropping the provided one");
            return Ok(Value::String(String::new()));
        }

        let Value::String(encoded) = &value else {
            return NotAStringSnafu {
                key,
                found: value.kind(),
            }
            .fail();
        };

        self.remember(key, encoded);
        self.validate()?;
        Ok(value)
    }

    #[instrument(skip(self, overrides))]
    async fn undefined(&self, overrides: &mut Mapping, key: &str) -> Result<()> {
        if self.topology.is_gardener().await.context(ClusterQuerySnafu)? {
            return Ok(());
        }

        let is_k3d = self.topology.is_k3d().await.context(ClusterQuerySnafu)?;
        let default = match (key == self.crt_key, is_k3d) {
            (true, true) => LOCAL_TLS_CRT,
            (true, false) => REMOTE_TLS_CRT,
            (false, true) => LOCAL_TLS_KEY,
            (false, false) => REMOTE_TLS_KEY,
        };

        ensure!(self.remember(key, default), UnsupportedKeySnafu { key });
        tracing::debug!(is_k3d, "using built-in default certificate");

        FallbackInterceptor::new(default).apply(overrides, key)?;
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cluster::StaticClusterTopology,
        defaults::{TLS_CRT_KEY, TLS_KEY_KEY},
        interceptor::Error,
        value::find,
    };

    fn interceptor(topology: StaticClusterTopology) -> CertificateInterceptor {
        CertificateInterceptor::new(TLS_CRT_KEY, TLS_KEY_KEY, Arc::new(topology))
    }

    #[tokio::test]
    async fn injects_local_defaults_on_k3d() {
        let interceptor = interceptor(StaticClusterTopology::k3d("kyma"));
        let mut overrides = Mapping::new();

        for key in interceptor.keys() {
            interceptor
                .undefined(&mut overrides, key)
                .await
                .expect("built-in certificate is valid");
        }

        assert_eq!(find(&overrides, TLS_CRT_KEY), Some(&Value::from(LOCAL_TLS_CRT)));
        assert_eq!(find(&overrides, TLS_KEY_KEY), Some(&Value::from(LOCAL_TLS_KEY)));
    }

    #[tokio::test]
    async fn injects_remote_defaults() {
        let interceptor = interceptor(StaticClusterTopology::remote());
        let mut overrides = Mapping::new();

        for key in interceptor.keys() {
            interceptor
                .undefined(&mut overrides, key)
                .await
                .expect("built-in certificate is valid");
        }

        assert_eq!(find(&overrides, TLS_CRT_KEY), Some(&Value::from(REMOTE_TLS_CRT)));
        assert_eq!(find(&overrides, TLS_KEY_KEY), Some(&Value::from(REMOTE_TLS_KEY)));
    }

    #[tokio::test]
    async fn gardener_blanks_and_skips() {
        let interceptor = interceptor(StaticClusterTopology::gardener("shoot.example.com"));
        let mut overrides = Mapping::new();

        let value = interceptor
            .intercept(Value::from(LOCAL_TLS_CRT), TLS_CRT_KEY)
            .await
            .expect("nothing is validated on Gardener");
        interceptor
            .undefined(&mut overrides, TLS_KEY_KEY)
            .await
            .expect("nothing is injected on Gardener");

        assert_eq!(value, Value::from(""));
        assert!(overrides.is_empty());
    }

    #[tokio::test]
    async fn mismatching_pair_fails() {
        let interceptor = interceptor(StaticClusterTopology::remote());

        interceptor
            .intercept(Value::from(LOCAL_TLS_CRT), TLS_CRT_KEY)
            .await
            .expect("a single certificate is not validated");
        let err = interceptor
            .intercept(Value::from(REMOTE_TLS_KEY), TLS_KEY_KEY)
            .await
            .expect_err("local certificate doesn't match remote key");

        assert!(matches!(err, Error::InvalidCertificate { .. }));
        assert!(
            snafu::Report::from_error(err)
                .to_string()
                .contains("private key does not match public key")
        );
    }

    #[tokio::test]
    async fn invalid_base64_fails() {
        let interceptor = interceptor(StaticClusterTopology::remote());

        interceptor
            .intercept(Value::from("not base64!"), TLS_CRT_KEY)
            .await
            .expect("a single certificate is not validated");
        let err = interceptor
            .intercept(Value::from(REMOTE_TLS_KEY), TLS_KEY_KEY)
            .await
            .expect_err("certificate is not base64");

        assert!(matches!(err, Error::DecodeBase64 { key, .. } if key == TLS_CRT_KEY));
    }

    #[tokio::test]
    async fn rejects_non_string_values() {
        let interceptor = interceptor(StaticClusterTopology::remote());

        let err = interceptor
            .intercept(Value::Bool(true), TLS_CRT_KEY)
            .await
            .expect_err("certificates are strings");

        assert!(matches!(err, Error::NotAString { found: "bool", .. }));
    }

    #[tokio::test]
    async fn rejects_unknown_keys() {
        let interceptor = interceptor(StaticClusterTopology::remote());
        let mut overrides = Mapping::new();

        let err = interceptor
            .undefined(&mut overrides, "global.other")
            .await
            .expect_err("only the two configured keys are supported");

        assert!(matches!(err, Error::UnsupportedKey { .. }));
        assert!(overrides.is_empty());
    }

    #[test]
    fn display_is_masked() {
        let interceptor = interceptor(StaticClusterTopology::remote());

        assert_eq!(
            interceptor.display(&Value::from(LOCAL_TLS_CRT), TLS_CRT_KEY),
            "<masked>"
        );
    }
}
