//! Engine Probes
//!
//! Shelling out to the installed engines and their RPC is isolated behind
//! capabilities so orchestration logic can run against doubles.

use std::process::Command;
use std::time::Duration;

use serde::Deserialize;

use super::component::{Component, CONSENSUS};
use super::error::LifecycleError;
use super::state::DeploymentState;

const USER_AGENT_VALUE: &str = "verisctl";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Asks an installed binary what version it is.
pub trait VersionProbe {
    fn installed_version(
        &self,
        state: &DeploymentState,
        component: &Component,
    ) -> Result<String, LifecycleError>;
}

/// Runs the real binary with its version argument.
pub struct BinaryVersionProbe;

impl VersionProbe for BinaryVersionProbe {
    fn installed_version(
        &self,
        state: &DeploymentState,
        component: &Component,
    ) -> Result<String, LifecycleError> {
        let failed = |reason: String| LifecycleError::VersionQueryFailed {
            component: component.name.to_string(),
            reason,
        };

        let binary = component.binary_path(&state.bin_dir);
        let binary = if binary.exists() {
            binary
        } else {
            which::which(component.name).map_err(|_| failed("binary not installed".to_string()))?
        };

        let output = Command::new(&binary)
            .arg(component.version_arg)
            .output()
            .map_err(|e| failed(e.to_string()))?;
        if !output.status.success() {
            return Err(failed(format!("exit code {:?}", output.status.code())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version_token(&stdout).ok_or_else(|| failed("no version in output".to_string()))
    }
}

/// First token that looks like a dotted version, e.g. out of
/// `verisd version v0.13.1 (linux/amd64)`.
fn parse_version_token(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .find(|token| {
            let bare = token.trim_start_matches('v');
            bare.split('.').count() >= 2
                && bare.chars().next().is_some_and(|c| c.is_ascii_digit())
        })
        .map(|token| token.to_string())
}

/// Read-only view of the running node's chain status.
pub trait StatusProbe {
    fn latest_block_height(&self, rpc: &str) -> Result<u64, LifecycleError>;
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    result: StatusResult,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

pub struct RpcStatusProbe {
    client: reqwest::blocking::Client,
}

impl RpcStatusProbe {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for RpcStatusProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusProbe for RpcStatusProbe {
    fn latest_block_height(&self, rpc: &str) -> Result<u64, LifecycleError> {
        let url = format!("{}/status", rpc.trim_end_matches('/'));
        let failed = |reason: String| LifecycleError::PeerQueryFailed {
            endpoint: url.clone(),
            reason,
        };

        let response: StatusResponse = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| failed(e.to_string()))?;

        response
            .result
            .sync_info
            .latest_block_height
            .parse()
            .map_err(|_| failed("block height is not a number".to_string()))
    }
}

/// Delegated invocations of the installed engine command-line interfaces.
pub trait EngineCli {
    /// Initialize the consensus engine's chain-state directory.
    fn init_chain(
        &self,
        state: &DeploymentState,
        moniker: &str,
        network: &str,
    ) -> Result<(), LifecycleError>;

    /// Submit the validator creation transaction; returns the engine output.
    fn create_validator(
        &self,
        state: &DeploymentState,
        stake: &str,
    ) -> Result<String, LifecycleError>;
}

/// Runs the real consensus binary.
pub struct ProcessEngineCli;

impl ProcessEngineCli {
    fn run(
        &self,
        state: &DeploymentState,
        component: &Component,
        args: &[&str],
    ) -> Result<String, LifecycleError> {
        let binary = component.binary_path(&state.bin_dir);
        let output = Command::new(&binary).args(args).output().map_err(|e| {
            LifecycleError::EngineCommandFailed {
                binary: component.name.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LifecycleError::EngineCommandFailed {
                binary: component.name.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl EngineCli for ProcessEngineCli {
    fn init_chain(
        &self,
        state: &DeploymentState,
        moniker: &str,
        network: &str,
    ) -> Result<(), LifecycleError> {
        self.run(
            state,
            &CONSENSUS,
            &["init", "--network", network, "--moniker", moniker],
        )
        .map(|_| ())
    }

    fn create_validator(
        &self,
        state: &DeploymentState,
        stake: &str,
    ) -> Result<String, LifecycleError> {
        self.run(state, &CONSENSUS, &["validator", "create", "--stake", stake])
    }
}
