use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use snafu::{ResultExt, Snafu, ensure};
use tempfile::TempDir;
use tracing::instrument;

use crate::{
    interceptor::Interceptor,
    overrides::{self, Overrides, Registry},
    value::{self, Mapping, Value, YamlError},
};

/// File extensions [`Builder::add_file`] accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid override file {}: file does not exist", path.display()))]
    FileNotFound { path: PathBuf },

    #[snafu(display(
        "unsupported extension of override file {}, supported extensions are: {}",
        path.display(),
        SUPPORTED_EXTENSIONS.join(", ")
    ))]
    UnsupportedFormat { path: PathBuf },

    #[snafu(display("scope name cannot be empty when adding overrides"))]
    EmptyScope,

    #[snafu(display("empty overrides provided for scope {scope:?}"))]
    EmptyOverrides { scope: String },

    #[snafu(display("empty values provided"))]
    EmptyValues,

    #[snafu(display("failed to read override file {}", path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to process configuration values defined in file {}", path.display()))]
    ParseYaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to process configuration values defined in file {}", path.display()))]
    ConvertYaml { source: YamlError, path: PathBuf },

    #[snafu(display(
        "configuration values defined in file {} have to be a mapping, but are a {found}",
        path.display()
    ))]
    DocumentNotMapping { path: PathBuf, found: &'static str },

    #[snafu(display("failed to process configuration values defined in file {}", path.display()))]
    ParseJson {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to run override interceptors"))]
    Intercept { source: overrides::Error },
}

/// Accumulates override sources and interceptors and merges them into an
/// [`Overrides`] snapshot.
///
/// Sources are merged in a fixed order, later sources win over earlier ones:
///
/// 1. files added with [`Builder::add_file`], in the order they were added,
/// 2. mappings added with [`Builder::add_overrides`] and
///    [`Builder::add_values`], in the order they were added.
///
/// Nested mappings are merged recursively, see [`value::deep_merge`].
#[derive(Clone, Debug, Default)]
pub struct Builder {
    files: Vec<PathBuf>,
    values: Vec<Mapping>,
    interceptors: Registry,
    download_dirs: Vec<Arc<TempDir>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a YAML or JSON file. It is only read when the overrides are
    /// merged.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self> {
        let path = path.into();

        ensure!(path.exists(), FileNotFoundSnafu { path });
        ensure!(
            extension(&path).is_some_and(|extension| SUPPORTED_EXTENSIONS.contains(&extension)),
            UnsupportedFormatSnafu { path }
        );

        self.files.push(path);
        Ok(self)
    }

    /// Adds overrides scoped under the top-level key `scope`, usually the
    /// name of a chart or component.
    pub fn add_overrides(&mut self, scope: impl Into<String>, overrides: Mapping) -> Result<&mut Self> {
        let scope = scope.into();

        ensure!(!scope.is_empty(), EmptyScopeSnafu);
        ensure!(!overrides.is_empty(), EmptyOverridesSnafu { scope });

        self.values
            .push(Mapping::from([(scope, Value::Mapping(overrides))]));
        Ok(self)
    }

    /// Adds overrides whose top-level keys already are the scopes, e.g. the
    /// result of parsing `key=value` strings.
    pub fn add_values(&mut self, values: Mapping) -> Result<&mut Self> {
        ensure!(!values.is_empty(), EmptyValuesSnafu);

        self.values.push(values);
        Ok(self)
    }

    /// Registers `interceptor` for every key in `keys`. A later registration
    /// for the same key replaces the earlier one.
    pub fn add_interceptor<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a str>,
        interceptor: Arc<dyn Interceptor>,
    ) -> &mut Self {
        for key in keys {
            self.interceptors.insert(key.to_owned(), interceptor.clone());
        }
        self
    }

    /// Keeps `dir` until the builder is dropped, so files downloaded into it
    /// can still be read when merging.
    pub fn keep_download_dir(&mut self, dir: TempDir) -> &mut Self {
        self.download_dirs.push(Arc::new(dir));
        self
    }

    /// Merges all sources without running any interceptor.
    pub fn raw(&self) -> Result<Overrides> {
        let merged = self.merge_sources()?;
        Ok(Overrides::new(merged, self.interceptors.clone()))
    }

    /// Merges all sources and runs the interceptors on the result.
    ///
    /// This can query the cluster once or more per registered key. Every
    /// call produces a new snapshot from the same sources.
    #[instrument(skip(self))]
    pub async fn build(&self) -> Result<Overrides> {
        let raw = self.raw()?;
        let intercepted = raw.intercept().await.context(InterceptSnafu)?;

        tracing::debug!(overrides = %raw, "built overrides");
        Ok(Overrides::new(intercepted, self.interceptors.clone()))
    }

    fn merge_sources(&self) -> Result<Mapping> {
        let mut merged = Mapping::new();

        for path in &self.files {
            if let Some(file_overrides) = load_file(path)? {
                value::deep_merge(&mut merged, file_overrides);
            }
        }

        for values in &self.values {
            value::deep_merge(&mut merged, values.clone());
        }

        Ok(merged)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|extension| extension.to_str())
}

/// Reads an override file, returning [`None`] for empty documents.
///
/// Only the first document of a YAML stream is used. Merge keys (`<<`) are
/// resolved.
#[instrument]
fn load_file(path: &Path) -> Result<Option<Mapping>> {
    let content = fs::read_to_string(path).context(ReadFileSnafu { path })?;
    if content.trim().is_empty() {
        tracing::debug!("override file is empty");
        return Ok(None);
    }

    if extension(path) == Some("json") {
        return serde_json::from_str(&content).context(ParseJsonSnafu { path });
    }

    let Some(document) = serde_yaml::Deserializer::from_str(&content).next() else {
        tracing::debug!("override file contains no YAML document");
        return Ok(None);
    };
    let mut yaml = serde_yaml::Value::deserialize(document).context(ParseYamlSnafu { path })?;
    yaml.apply_merge().context(ParseYamlSnafu { path })?;

    match Value::try_from(yaml).context(ConvertYamlSnafu { path })? {
        Value::Null => Ok(None),
        Value::Mapping(mapping) => Ok(Some(mapping)),
        other => DocumentNotMappingSnafu {
            path,
            found: other.kind(),
        }
        .fail(),
    }
}
