//! The override engine used to compute the values of a Kyma installation.
//!
//! Overrides are collected from several sources (values files, `key=value`
//! strings and direct mappings) by a [`Builder`], deep-merged in a fixed
//! order and then passed through a set of [`Interceptor`]s. Interceptors
//! rewrite or default the values at the key paths they are registered for,
//! depending on the kind of cluster Kyma is installed into (see
//! [`cluster::ClusterTopology`]).
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use kyma_overrides::{Builder, cluster::StaticClusterTopology, interceptor::DomainNameInterceptor};
//!
//! let mut builder = Builder::new();
//! builder.add_file("values.yaml")?;
//! builder.add_values(kyma_overrides::strvals::parse("serverless.enabled=true")?)?;
//! builder.add_interceptor(
//!     ["global.domainName"],
//!     Arc::new(DomainNameInterceptor::new(Arc::new(StaticClusterTopology::k3d("kyma")))),
//! );
//!
//! let overrides = builder.build().await?;
//! assert_eq!(
//!     overrides.find("global.domainName").as_ref().and_then(|value| value.as_str()),
//!     Some("local.kyma.dev")
//! );
//! # Ok(())
//! # }
//! ```
pub mod builder;
pub mod cluster;
pub mod defaults;
pub mod interceptor;
pub mod overrides;
pub mod resolve;
pub mod sources;
pub mod strvals;
pub mod value;

pub use builder::Builder;
pub use interceptor::Interceptor;
pub use overrides::Overrides;
pub use value::{Mapping, Value};
