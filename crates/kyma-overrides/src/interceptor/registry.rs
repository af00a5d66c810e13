use std::sync::Arc;

use async_trait::async_trait;
use snafu::ResultExt;
use tracing::instrument;

use crate::{
    cluster::ClusterTopology,
    interceptor::{ClusterQuerySnafu, FallbackInterceptor, Interceptor, Result},
    value::{Mapping, Value},
};

/// Disables the internal registry on k3d clusters, which bring their own.
#[derive(Debug)]
pub struct RegistryDisableInterceptor {
    topology: Arc<dyn ClusterTopology>,
}

impl RegistryDisableInterceptor {
    pub fn new(topology: Arc<dyn ClusterTopology>) -> Self {
        Self { topology }
    }
}

#[async_trait]
impl Interceptor for RegistryDisableInterceptor {
    async fn render(&self, value: &Value, key: &str) -> String {
        render_intercepted(self, value, key).await
    }

    #[instrument(skip(self, value))]
    async fn intercept(&self, value: Value, key: &str) -> Result<Value> {
        if self.topology.is_k3d().await.context(ClusterQuerySnafu)? {
            tracing::debug!("disabling internal registry on k3d cluster");
            return Ok(Value::from("false"));
        }
        Ok(value)
    }

    #[instrument(skip(self, overrides))]
    async fn undefined(&self, overrides: &mut Mapping, key: &str) -> Result<()> {
        if self.topology.is_k3d().await.context(ClusterQuerySnafu)? {
            return FallbackInterceptor::new(false).apply(overrides, key);
        }
        Ok(())
    }
}

/// Points registry addresses to the registry k3d creates alongside the
/// cluster, unless the user configured one.
#[derive(Debug)]
pub struct RegistryAddressInterceptor {
    topology: Arc<dyn ClusterTopology>,
}

impl RegistryAddressInterceptor {
    pub fn new(topology: Arc<dyn ClusterTopology>) -> Self {
        Self { topology }
    }
}

#[async_trait]
impl Interceptor for RegistryAddressInterceptor {
    async fn render(&self, value: &Value, key: &str) -> String {
        render_intercepted(self, value, key).await
    }

    async fn intercept(&self, value: Value, _key: &str) -> Result<Value> {
        Ok(value)
    }

    #[instrument(skip(self, overrides))]
    async fn undefined(&self, overrides: &mut Mapping, key: &str) -> Result<()> {
        if !self.topology.is_k3d().await.context(ClusterQuerySnafu)? {
            return Ok(());
        }

        let cluster_name = self
            .topology
            .k3d_cluster_name()
            .await
            .context(ClusterQuerySnafu)?;
        FallbackInterceptor::new(format!("k3d-{cluster_name}-registry:5000")).apply(overrides, key)
    }
}

async fn render_intercepted(interceptor: &dyn Interceptor, value: &Value, key: &str) -> String {
    match interceptor.intercept(value.clone(), key).await {
        Ok(value) => value.to_string(),
        Err(err) => format!("error during interception: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{cluster::StaticClusterTopology, value::find};

    const ENABLE_INTERNAL: &str = "serverless.dockerRegistry.enableInternal";
    const SERVER_ADDRESS: &str = "serverless.dockerRegistry.serverAddress";

    #[rstest]
    #[case::k3d(StaticClusterTopology::k3d("kyma"), Some(Value::Bool(false)))]
    #[case::remote(StaticClusterTopology::remote(), None)]
    #[tokio::test]
    async fn disable_default(#[case] topology: StaticClusterTopology, #[case] expected: Option<Value>) {
        let interceptor = RegistryDisableInterceptor::new(Arc::new(topology));
        let mut overrides = Mapping::new();

        interceptor
            .undefined(&mut overrides, ENABLE_INTERNAL)
            .await
            .expect("static topology never fails");

        assert_eq!(find(&overrides, ENABLE_INTERNAL).cloned(), expected);
    }

    #[rstest]
    #[case::k3d(StaticClusterTopology::k3d("kyma"), "false")]
    #[case::remote(StaticClusterTopology::remote(), "true")]
    #[tokio::test]
    async fn disable_provided(#[case] topology: StaticClusterTopology, #[case] expected: &str) {
        let interceptor = RegistryDisableInterceptor::new(Arc::new(topology));

        let value = interceptor
            .intercept(Value::from("true"), ENABLE_INTERNAL)
            .await
            .expect("static topology never fails");

        assert_eq!(value, Value::from(expected));
        assert_eq!(
            interceptor.render(&Value::from("true"), ENABLE_INTERNAL).await,
            expected
        );
    }

    #[rstest]
    #[case::k3d(
        StaticClusterTopology::k3d("my-cluster"),
        Some(Value::from("k3d-my-cluster-registry:5000"))
    )]
    #[case::gardener(StaticClusterTopology::gardener("shoot.example.com"), None)]
    #[tokio::test]
    async fn address_default(#[case] topology: StaticClusterTopology, #[case] expected: Option<Value>) {
        let interceptor = RegistryAddressInterceptor::new(Arc::new(topology));
        let mut overrides = Mapping::new();

        interceptor
            .undefined(&mut overrides, SERVER_ADDRESS)
            .await
            .expect("static topology never fails");

        assert_eq!(find(&overrides, SERVER_ADDRESS).cloned(), expected);
    }

    #[tokio::test]
    async fn address_provided_is_kept() {
        let interceptor = RegistryAddressInterceptor::new(Arc::new(StaticClusterTopology::k3d("kyma")));

        let value = interceptor
            .intercept(Value::from("registry.example.com"), SERVER_ADDRESS)
            .await
            .expect("present addresses are kept");

        assert_eq!(value, Value::from("registry.example.com"));
    }
}
