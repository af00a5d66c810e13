//! Resolves values file locations, downloading `http://` and `https://` URLs
//! into a temporary directory.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use snafu::{ResultExt, Snafu};
use tempfile::TempDir;
use tracing::instrument;

const URL_SEPARATOR: &str = "://";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot download {location:?} because scheme {scheme:?} is not supported"))]
    UnsupportedScheme { location: String, scheme: String },

    #[snafu(display("file location {location:?} is not valid"))]
    InvalidLocation { location: String },

    #[snafu(display("failed to create HTTP client"))]
    CreateHttpClient { source: reqwest::Error },

    #[snafu(display("failed to create download directory"))]
    CreateDownloadDir { source: std::io::Error },

    #[snafu(display("failed to download {url:?}"))]
    Download { source: reqwest::Error, url: String },

    #[snafu(display("failed to write downloaded file {}", path.display()))]
    WriteDownload {
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Where a values file is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location<'a> {
    Local(&'a Path),
    Remote(&'a str),
}

impl<'a> Location<'a> {
    /// Parses a location given by the user. Anything without `://` is a local
    /// path, and only `http` and `https` URLs are supported.
    pub fn parse(file: &'a Path) -> Result<Self> {
        let Some(location) = file.to_str() else {
            return Ok(Self::Local(file));
        };

        let tokens: Vec<&str> = location.split(URL_SEPARATOR).collect();
        match tokens.as_slice() {
            [_] => Ok(Self::Local(file)),
            ["http" | "https", _] => Ok(Self::Remote(location)),
            [scheme, _] => UnsupportedSchemeSnafu { location, scheme: *scheme }.fail(),
            _ => InvalidLocationSnafu { location }.fail(),
        }
    }
}

/// Downloads remote values files into a temporary directory, which is
/// removed when the downloader (or the directory taken from it) is dropped.
#[derive(Debug)]
pub struct Downloader {
    client: reqwest::Client,
    dir: Option<TempDir>,
    downloads: usize,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context(CreateHttpClientSnafu)?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            dir: None,
            downloads: 0,
        }
    }

    /// Returns a local path for `location`, downloading remote files first.
    /// Local paths are returned unchanged, without checking they exist.
    pub async fn resolve(&mut self, location: Location<'_>) -> Result<PathBuf> {
        match location {
            Location::Local(path) => Ok(path.to_owned()),
            Location::Remote(url) => self.download(url).await,
        }
    }

    /// Takes the directory holding the downloaded files, if anything was
    /// downloaded.
    pub fn into_dir(self) -> Option<TempDir> {
        self.dir
    }

    #[instrument(skip(self))]
    async fn download(&mut self, url: &str) -> Result<PathBuf> {
        let content = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .context(DownloadSnafu { url })?
            .bytes()
            .await
            .context(DownloadSnafu { url })?;

        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => TempDir::new().context(CreateDownloadDirSnafu)?,
        };
        let dir = self.dir.insert(dir);
        // Prefixed, so files with the same name from different URLs don't
        // overwrite each other.
        let path = dir
            .path()
            .join(format!("{}-{}", self.downloads, file_name(url)));
        tokio::fs::write(&path, &content)
            .await
            .context(WriteDownloadSnafu { path: &path })?;
        self.downloads += 1;

        tracing::debug!(path = %path.display(), bytes = content.len(), "downloaded values file");
        Ok(path)
    }
}

/// The last path segment of `url`, without query or fragment.
fn file_name(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query.rsplit('/').next().unwrap_or(without_query)
}
