use std::sync::Arc;

use async_trait::async_trait;
use snafu::ResultExt;
use tracing::instrument;

use crate::{
    cluster::ClusterTopology,
    defaults::{LOCAL_KYMA_DOMAIN, REMOTE_KYMA_DOMAIN},
    interceptor::{ClusterQuerySnafu, FallbackInterceptor, Interceptor, Result},
    value::{Mapping, Value},
};

/// Resolves the domain name of the cluster.
///
/// On Gardener clusters the shoot domain always wins, even over a domain the
/// user provided. Everywhere else a user provided domain is kept. Without
/// one, local k3d clusters get [`LOCAL_KYMA_DOMAIN`] and all other clusters
/// [`REMOTE_KYMA_DOMAIN`].
#[derive(Debug)]
pub struct DomainNameInterceptor {
    topology: Arc<dyn ClusterTopology>,
}

impl DomainNameInterceptor {
    pub fn new(topology: Arc<dyn ClusterTopology>) -> Self {
        Self { topology }
    }

    async fn default_domain_name(&self) -> Result<String> {
        if let Some(domain) = self
            .topology
            .gardener_domain()
            .await
            .context(ClusterQuerySnafu)?
        {
            return Ok(domain);
        }

        if self.topology.is_k3d().await.context(ClusterQuerySnafu)? {
            return Ok(LOCAL_KYMA_DOMAIN.to_owned());
        }

        Ok(REMOTE_KYMA_DOMAIN.to_owned())
    }
}

#[async_trait]
impl Interceptor for DomainNameInterceptor {
    #[instrument(skip(self, value))]
    async fn intercept(&self, value: Value, key: &str) -> Result<Value> {
        match self
            .topology
            .gardener_domain()
            .await
            .context(ClusterQuerySnafu)?
        {
            Some(domain) => {
                tracing::info!(%domain, "ignoring the provided domain on a Gardener cluster");
                Ok(Value::String(domain))
            }
            None => Ok(value),
        }
    }

    #[instrument(skip(self, overrides))]
    async fn undefined(&self, overrides: &mut Mapping, key: &str) -> Result<()> {
        let domain = self.default_domain_name().await?;
        FallbackInterceptor::new(domain).apply(overrides, key)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{cluster::StaticClusterTopology, value::find};

    #[rstest]
    #[case::k3d(StaticClusterTopology::k3d("kyma"), "local.kyma.dev")]
    #[case::remote(StaticClusterTopology::remote(), "kyma.example.com")]
    #[case::gardener(StaticClusterTopology::gardener("shoot.kyma.ondemand.com"), "shoot.kyma.ondemand.com")]
    #[tokio::test]
    async fn default_domain(#[case] topology: StaticClusterTopology, #[case] expected: &str) {
        let interceptor = DomainNameInterceptor::new(Arc::new(topology));
        let mut overrides = Mapping::new();

        interceptor
            .undefined(&mut overrides, "global.domainName")
            .await
            .expect("default domain is set");

        assert_eq!(
            find(&overrides, "global.domainName"),
            Some(&Value::from(expected))
        );
    }

    #[rstest]
    #[case::k3d(StaticClusterTopology::k3d("kyma"), "user.example.com")]
    #[case::remote(StaticClusterTopology::remote(), "user.example.com")]
    #[case::gardener(StaticClusterTopology::gardener("shoot.kyma.ondemand.com"), "shoot.kyma.ondemand.com")]
    #[tokio::test]
    async fn provided_domain(#[case] topology: StaticClusterTopology, #[case] expected: &str) {
        let interceptor = DomainNameInterceptor::new(Arc::new(topology));

        let value = interceptor
            .intercept(Value::from("user.example.com"), "global.domainName")
            .await
            .expect("domain is intercepted");

        assert_eq!(value, Value::from(expected));
    }
}
