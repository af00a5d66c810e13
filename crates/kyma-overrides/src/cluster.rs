//! Detection of the kind of cluster the overrides are built for.
//!
//! Interceptors don't talk to Kubernetes directly, they ask a
//! [`ClusterTopology`]. [`KubeClusterTopology`] answers these questions by
//! querying the API server, [`StaticClusterTopology`] answers them from fixed
//! values.
use std::{fmt, future::Future, time::Duration};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Node};
use kube::{
    Api, Client,
    api::{ListParams, ObjectList, ResourceExt},
};
use snafu::{ResultExt, Snafu};
use tracing::instrument;

/// Every node of a k3d cluster is named `k3d-<cluster-name>-<role>-<index>`.
pub const K3D_NODE_PREFIX: &str = "k3d-";

const MASTER_NODE_LABEL_SELECTOR: &str = "node-role.kubernetes.io/master=true";

const GARDENER_SHOOT_INFO_NAMESPACE: &str = "kube-system";
const GARDENER_SHOOT_INFO_NAME: &str = "shoot-info";
const GARDENER_DOMAIN_KEY: &str = "domain";

const RETRY_ATTEMPTS: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to list nodes"))]
    ListNodes { source: kube::Error },

    #[snafu(display("failed to get ConfigMap {namespace}/{name}"))]
    GetConfigMap {
        source: kube::Error,
        namespace: &'static str,
        name: &'static str,
    },

    #[snafu(display(
        "cluster is not a k3d cluster, master node {node:?} is not prefixed with {K3D_NODE_PREFIX:?}"
    ))]
    NotK3dCluster { node: String },
}

/// Answers the questions interceptors have about the target cluster.
#[async_trait]
pub trait ClusterTopology: fmt::Debug + Send + Sync {
    /// Whether the cluster is a local k3d cluster.
    async fn is_k3d(&self) -> Result<bool>;

    /// The name of the k3d cluster, or an empty string if the cluster has no
    /// master nodes.
    async fn k3d_cluster_name(&self) -> Result<String>;

    /// The shoot domain if the cluster is managed by Gardener.
    async fn gardener_domain(&self) -> Result<Option<String>>;

    async fn is_gardener(&self) -> Result<bool> {
        Ok(self.gardener_domain().await?.is_some())
    }
}

/// Queries the Kubernetes API server for the cluster topology.
///
/// Nothing is cached, every call results in API requests.
#[derive(Clone)]
pub struct KubeClusterTopology {
    client: Client,
}

impl fmt::Debug for KubeClusterTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeClusterTopology").finish_non_exhaustive()
    }
}

impl KubeClusterTopology {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn list_nodes(&self, params: &ListParams) -> Result<ObjectList<Node>> {
        let api: &Api<Node> = &Api::all(self.client.clone());
        with_retries("list nodes", || async move {
            api.list(params).await.context(ListNodesSnafu)
        })
        .await
    }
}

#[async_trait]
impl ClusterTopology for KubeClusterTopology {
    #[instrument(skip(self))]
    async fn is_k3d(&self) -> Result<bool> {
        let nodes = self.list_nodes(&ListParams::default()).await?;
        let is_k3d = nodes
            .iter()
            .any(|node| node.name_any().starts_with(K3D_NODE_PREFIX));

        tracing::debug!(is_k3d, "checked node names for k3d prefix");
        Ok(is_k3d)
    }

    #[instrument(skip(self))]
    async fn k3d_cluster_name(&self) -> Result<String> {
        let params = ListParams::default().labels(MASTER_NODE_LABEL_SELECTOR);
        let nodes = self.list_nodes(&params).await?;

        let mut cluster_name = String::new();
        for node in nodes {
            let node_name = node.name_any();
            let Some(name) = k3d_cluster_name_from_node(&node_name) else {
                return NotK3dClusterSnafu { node: node_name }.fail();
            };
            cluster_name = name.to_owned();
        }

        tracing::debug!(%cluster_name, "derived k3d cluster name from master nodes");
        Ok(cluster_name)
    }

    #[instrument(skip(self))]
    async fn gardener_domain(&self) -> Result<Option<String>> {
        let api: Api<ConfigMap> =
            Api::namespaced(self.client.clone(), GARDENER_SHOOT_INFO_NAMESPACE);
        let shoot_info = api
            .get_opt(GARDENER_SHOOT_INFO_NAME)
            .await
            .context(GetConfigMapSnafu {
                namespace: GARDENER_SHOOT_INFO_NAMESPACE,
                name: GARDENER_SHOOT_INFO_NAME,
            })?;

        let domain = shoot_info
            .and_then(|config_map| config_map.data)
            .and_then(|mut data| data.remove(GARDENER_DOMAIN_KEY))
            .filter(|domain| !domain.is_empty());

        tracing::debug!(?domain, "looked up Gardener shoot domain");
        Ok(domain)
    }
}

/// A topology with fixed answers, for clusters whose kind is known upfront.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticClusterTopology {
    k3d_cluster_name: Option<String>,
    gardener_domain: Option<String>,
}

impl StaticClusterTopology {
    /// A remote cluster which is neither k3d nor managed by Gardener.
    pub fn remote() -> Self {
        Self::default()
    }

    pub fn k3d(cluster_name: impl Into<String>) -> Self {
        Self {
            k3d_cluster_name: Some(cluster_name.into()),
            gardener_domain: None,
        }
    }

    pub fn gardener(domain: impl Into<String>) -> Self {
        Self {
            k3d_cluster_name: None,
            gardener_domain: Some(domain.into()),
        }
    }
}

#[async_trait]
impl ClusterTopology for StaticClusterTopology {
    async fn is_k3d(&self) -> Result<bool> {
        Ok(self.k3d_cluster_name.is_some())
    }

    async fn k3d_cluster_name(&self) -> Result<String> {
        Ok(self.k3d_cluster_name.clone().unwrap_or_default())
    }

    async fn gardener_domain(&self) -> Result<Option<String>> {
        Ok(self.gardener_domain.clone())
    }
}

/// Derives the k3d cluster name from a node name of the form
/// `k3d-<cluster-name>-server-<index>`.
///
/// Returns [`None`] if the node doesn't belong to a k3d cluster.
pub fn k3d_cluster_name_from_node(node_name: &str) -> Option<&str> {
    let name = node_name
        .strip_prefix(K3D_NODE_PREFIX)?
        .trim_end_matches(|c: char| c.is_numeric() || c == '-');

    Some(name.strip_suffix("-server").unwrap_or(name))
}

async fn with_retries<T, F, Fut>(operation: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 1;
    loop {
        match attempt().await {
            Err(err) if attempts < RETRY_ATTEMPTS => {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    operation,
                    attempts,
                    "cluster query failed, retrying in {}s",
                    RETRY_DELAY.as_secs()
                );
                tokio::time::sleep(RETRY_DELAY).await;
                attempts += 1;
            }
            result => return result,
        }
    }
}
