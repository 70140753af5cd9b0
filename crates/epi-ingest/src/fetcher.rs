//! HTTP fetcher with an optional on-disk cache
//!
//! When a cache directory is configured, a file named after the URL's last
//! path segment short-circuits the network entirely, and fresh downloads
//! are written there before being returned. Writes go to a `.part` sibling
//! that is renamed into place once flushed, so the cache never holds a
//! truncated file under its final name.
//!
//! Redirects are followed by hand rather than by reqwest: each hop keeps the
//! scheme and host of the current URL and adopts only the path and query of
//! the `Location` target.

use crate::config::FetchConfig;
use crate::error::FetchError;
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode, Url};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Suffix of an in-progress cache write
pub const PARTIAL_SUFFIX: &str = ".part";

pub struct CachedFetcher {
    client: Client,
    cache_dir: Option<PathBuf>,
    max_redirects: usize,
}

impl CachedFetcher {
    pub fn new(config: &FetchConfig, cache_dir: Option<PathBuf>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("epi-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            cache_dir,
            max_redirects: config.max_redirects,
        })
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Fetch `url` as text, from the cache when possible
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let cache_path = self.cache_path(&parsed);
        if let Some(path) = &cache_path {
            match tokio::fs::read_to_string(path).await {
                Ok(body) => {
                    info!(url, path = %path.display(), bytes = body.len(), "Using cached copy");
                    return Ok(body);
                },
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(source) => {
                    return Err(FetchError::Cache {
                        url: url.to_string(),
                        path: path.clone(),
                        source,
                    })
                },
            }
        }

        let body = self.download(parsed).await?;
        info!(url, bytes = body.len(), "Downloaded");

        if let Some(path) = &cache_path {
            store(url, path, &body).await?;
            debug!(path = %path.display(), "Cached download");
        }

        Ok(body)
    }

    /// `<cache_dir>/<basename>`, or `None` when caching is off or the URL
    /// has no file name
    pub fn cache_path(&self, url: &Url) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())?;
        Some(dir.join(name))
    }

    async fn download(&self, url: Url) -> Result<String, FetchError> {
        let origin = url.to_string();
        let mut current = url;

        for hop in 0..=self.max_redirects {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|source| FetchError::Transport {
                    url: current.to_string(),
                    source,
                })?;
            let status = response.status();

            if is_followed_redirect(status) {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| FetchError::MissingLocation {
                        url: current.to_string(),
                        status,
                    })?;
                let next = redirect_target(&current, location)?;
                debug!(hop, status = %status, from = %current, to = %next, "Following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status {
                    url: current.to_string(),
                    status,
                });
            }

            return response.text().await.map_err(|source| FetchError::Transport {
                url: current.to_string(),
                source,
            });
        }

        Err(FetchError::TooManyRedirects {
            url: origin,
            limit: self.max_redirects,
        })
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Keep scheme, host and port of `current`; take path and query from `location`
pub(crate) fn redirect_target(current: &Url, location: &str) -> Result<Url, FetchError> {
    let resolved = current
        .join(location)
        .map_err(|e| FetchError::InvalidRedirect {
            url: current.to_string(),
            location: location.to_string(),
            reason: e.to_string(),
        })?;

    let mut next = current.clone();
    next.set_path(resolved.path());
    next.set_query(resolved.query());
    next.set_fragment(None);
    Ok(next)
}

/// Sibling of `path` that receives the body before the rename
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

async fn store(url: &str, path: &Path, body: &str) -> Result<(), FetchError> {
    let cache_error = |source: std::io::Error| FetchError::Cache {
        url: url.to_string(),
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(cache_error)?;
    }

    let temp_path = partial_path(path);
    if let Err(source) = write_then_rename(&temp_path, path, body).await {
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %temp_path.display(), error = %e, "Failed to remove partial cache file");
            }
        }
        return Err(cache_error(source));
    }
    Ok(())
}

async fn write_then_rename(temp_path: &Path, path: &Path, body: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(temp_path).await?;
    file.write_all(body.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(temp_path, path).await
}
