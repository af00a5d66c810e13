//! Assembles overrides from the sources a user can pass on the command line.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use base64::{Engine, engine::general_purpose::STANDARD};
use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    builder::{self, Builder},
    cluster::ClusterTopology,
    defaults::{
        DOMAIN_NAME_KEYS, REGISTRY_ADDRESS_KEYS, REGISTRY_ENABLE_INTERNAL_KEY, TLS_CRT_KEY,
        TLS_KEY_KEY,
    },
    interceptor::{
        CertificateInterceptor, DomainNameInterceptor, MaskInterceptor,
        RegistryAddressInterceptor, RegistryDisableInterceptor,
    },
    resolve::{self, Downloader, Location},
    strvals,
    value::{Mapping, Value},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to add default values file"))]
    AddDefaultValuesFile { source: builder::Error },

    #[snafu(display("failed to resolve values file {}", file.display()))]
    ResolveValuesFile {
        source: resolve::Error,
        file: PathBuf,
    },

    #[snafu(display("failed to add values file"))]
    AddValuesFile { source: builder::Error },

    #[snafu(display("failed to parse value {value:?}"))]
    ParseValue {
        source: strvals::Error,
        value: String,
    },

    #[snafu(display("failed to add value {value:?}"))]
    AddValue {
        source: builder::Error,
        value: String,
    },

    #[snafu(display("failed to read TLS file {}", path.display()))]
    ReadTlsFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("TLS certificate and private key have to be provided together"))]
    IncompleteTlsPair,

    #[snafu(display("failed to add domain values"))]
    AddDomainValues { source: builder::Error },

    #[snafu(display("failed to build values"))]
    Build { source: builder::Error },
}

/// The override sources a user can provide.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sources {
    /// Path or http(s) URL of a YAML or JSON file with values. Can be
    /// repeated, later files win over earlier ones.
    #[cfg_attr(
        feature = "clap",
        arg(long = "values-file", env = "KYMA_VALUES_FILE", value_name = "FILE")
    )]
    pub values_files: Vec<PathBuf>,

    /// Values in the form KEY=VALUE[,KEY=VALUE]. Can be repeated, values win
    /// over files.
    #[cfg_attr(feature = "clap", arg(long = "value", env = "KYMA_VALUES", value_name = "KEY=VALUE"))]
    pub values: Vec<String>,

    /// Domain used for the installation.
    #[cfg_attr(feature = "clap", arg(long, env = "KYMA_DOMAIN"))]
    pub domain: Option<String>,

    /// Path to the PEM encoded TLS certificate for the domain.
    #[cfg_attr(
        feature = "clap",
        arg(long = "tls-crt", env = "KYMA_TLS_CRT", value_name = "FILE", requires = "tls_key_file")
    )]
    pub tls_crt_file: Option<PathBuf>,

    /// Path to the PEM encoded private key of the TLS certificate.
    #[cfg_attr(
        feature = "clap",
        arg(long = "tls-key", env = "KYMA_TLS_KEY", value_name = "FILE", requires = "tls_crt_file")
    )]
    pub tls_key_file: Option<PathBuf>,
}

/// Merges all sources, runs the default interceptors against the cluster
/// described by `topology` and returns the flattened result.
///
/// `default_values_file` is merged first and skipped if it doesn't exist.
#[instrument(skip(topology))]
pub async fn merge(
    sources: &Sources,
    default_values_file: Option<&Path>,
    topology: Arc<dyn ClusterTopology>,
) -> Result<BTreeMap<String, Value>> {
    let mut builder = collect(sources, default_values_file).await?;
    register_interceptors(&mut builder, topology);

    let overrides = builder.build().await.context(BuildSnafu)?;
    Ok(overrides.flattened_map())
}

/// Adds all sources to a new [`Builder`], without registering interceptors.
///
/// Remote values files are downloaded into a temporary directory owned by the
/// returned builder.
#[instrument(skip(sources))]
pub async fn collect(sources: &Sources, default_values_file: Option<&Path>) -> Result<Builder> {
    let mut builder = Builder::new();

    if let Some(path) = default_values_file {
        match builder.add_file(path) {
            Ok(_) => {}
            Err(builder::Error::FileNotFound { path }) => {
                tracing::debug!(path = %path.display(), "default values file does not exist");
            }
            Err(err) => return Err(err).context(AddDefaultValuesFileSnafu),
        }
    }

    let mut downloader = None;
    for file in &sources.values_files {
        let location = Location::parse(file).context(ResolveValuesFileSnafu { file })?;
        let path = match location {
            Location::Local(path) => path.to_owned(),
            Location::Remote(_) => {
                let current = match downloader.take() {
                    Some(current) => current,
                    None => Downloader::new().context(ResolveValuesFileSnafu { file })?,
                };
                downloader
                    .insert(current)
                    .resolve(location)
                    .await
                    .context(ResolveValuesFileSnafu { file })?
            }
        };
        builder.add_file(path).context(AddValuesFileSnafu)?;
    }
    if let Some(dir) = downloader.and_then(Downloader::into_dir) {
        builder.keep_download_dir(dir);
    }

    for value in &sources.values {
        let parsed = strvals::parse(value).context(ParseValueSnafu { value })?;
        builder
            .add_values(parsed)
            .context(AddValueSnafu { value })?;
    }

    let global = domain_values(sources)?;
    if !global.is_empty() {
        builder
            .add_overrides("global", global)
            .context(AddDomainValuesSnafu)?;
    }

    Ok(builder)
}

/// Registers the interceptors which default and validate domain,
/// certificate and registry values.
pub fn register_interceptors(builder: &mut Builder, topology: Arc<dyn ClusterTopology>) {
    let certificate = CertificateInterceptor::new(TLS_CRT_KEY, TLS_KEY_KEY, topology.clone());

    builder
        .add_interceptor(
            DOMAIN_NAME_KEYS,
            Arc::new(DomainNameInterceptor::new(topology.clone())),
        )
        .add_interceptor([TLS_CRT_KEY, TLS_KEY_KEY], Arc::new(certificate))
        .add_interceptor(
            REGISTRY_ADDRESS_KEYS,
            Arc::new(RegistryAddressInterceptor::new(topology.clone())),
        )
        .add_interceptor(
            [REGISTRY_ENABLE_INTERNAL_KEY],
            Arc::new(RegistryDisableInterceptor::new(topology)),
        );
}

/// Registers masking for the TLS values without any cluster dependent
/// behavior, for builders which are only merged with [`Builder::raw`].
pub fn register_masking(builder: &mut Builder) {
    builder.add_interceptor([TLS_CRT_KEY, TLS_KEY_KEY], Arc::new(MaskInterceptor));
}

/// Values below `global` derived from the domain and TLS options.
fn domain_values(sources: &Sources) -> Result<Mapping> {
    let mut global = Mapping::new();

    if let Some(domain) = &sources.domain {
        global.insert("domainName".to_owned(), Value::from(domain.as_str()));
        global.insert(
            "ingress".to_owned(),
            Value::Mapping(Mapping::from([(
                "domainName".to_owned(),
                Value::from(domain.as_str()),
            )])),
        );
    }

    match (&sources.tls_crt_file, &sources.tls_key_file) {
        (Some(crt), Some(key)) => {
            global.insert("tlsCrt".to_owned(), Value::String(read_and_encode(crt)?));
            global.insert("tlsKey".to_owned(), Value::String(read_and_encode(key)?));
        }
        (None, None) => {}
        _ => return IncompleteTlsPairSnafu.fail(),
    }

    Ok(global)
}

fn read_and_encode(path: &Path) -> Result<String> {
    let content = fs::read(path).context(ReadTlsFileSnafu { path })?;
    Ok(STANDARD.encode(content))
}
