//! Artifact Download
//!
//! Blocking HTTP fetch with partial-file staging, so an interrupted
//! transfer never masquerades as a fully staged archive.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use super::error::LifecycleError;

const USER_AGENT_VALUE: &str = "verisctl";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Transfers one remote artifact to a local path. Production goes over
/// HTTP; tests substitute fixture writers.
pub trait Fetcher {
    /// Download `url` into `dest`, replacing any previous partial transfer.
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), LifecycleError>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), LifecycleError> {
        let failed = |reason: String| LifecycleError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let partial = dest.with_extension("partial");
        let mut file = File::create(&partial).map_err(|e| failed(e.to_string()))?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| failed(e.to_string()))?;
        file.flush().map_err(|e| failed(e.to_string()))?;
        drop(file);

        fs::rename(&partial, dest).map_err(|e| failed(e.to_string()))?;
        tracing::info!(url, bytes, dest = %dest.display(), "artifact downloaded");

        Ok(())
    }
}
