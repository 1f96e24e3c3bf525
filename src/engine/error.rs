//! Lifecycle Error Taxonomy
//!
//! Every orchestrator operation fails fast with one of these kinds. All of
//! them are fatal to the current operation and none of them may crash the
//! process: the menu loop stays usable after any single failure.

use thiserror::Error;

use super::config::ConfigError;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("no usable release for {component}: {reason}")]
    ReleaseNotFound { component: String, reason: String },

    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("failed to extract {archive}: {reason}")]
    ExtractFailed { archive: String, reason: String },

    #[error("failed to install {binary}: {reason}")]
    InstallFailed { binary: String, reason: String },

    #[error("node RPC query against {endpoint} failed: {reason}")]
    PeerQueryFailed { endpoint: String, reason: String },

    #[error("service {0} was never registered")]
    UnknownService(String),

    #[error("supervisor did not report {service} {target} within {timeout_secs}s")]
    SupervisorTimeout {
        service: String,
        target: &'static str,
        timeout_secs: u64,
    },

    #[error("supervisor command for {service} failed: {reason}")]
    SupervisorFailed { service: String, reason: String },

    /// Not a failure: the operator declined and nothing was touched.
    #[error("operation declined by operator")]
    ConfirmationDeclined,

    #[error("installed {component} did not answer a version probe: {reason}")]
    VersionQueryFailed { component: String, reason: String },

    #[error("{binary} invocation failed: {reason}")]
    EngineCommandFailed { binary: String, reason: String },

    #[error("node configuration error: {0}")]
    Config(#[from] ConfigError),
}
