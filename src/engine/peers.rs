//! Peer Discovery
//!
//! Builds the persistent peer string from a seed node's reported network
//! status. The endpoint only lists remote peers, so the local node never
//! appears in the result.

use std::time::Duration;

use serde::Deserialize;

use super::error::LifecycleError;

const USER_AGENT_VALUE: &str = "verisctl";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct NetInfoResponse {
    result: NetInfoResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetInfoResult {
    #[serde(default)]
    pub peers: Vec<PeerEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PeerEntry {
    pub node_info: NodeInfo,
    pub remote_ip: String,
}

#[derive(Debug, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub listen_addr: String,
}

/// Source of a seed node's network status. Production queries its RPC;
/// tests substitute canned responses.
pub trait PeerSource {
    fn net_info(&self, seed: &str) -> Result<NetInfoResult, LifecycleError>;
}

pub struct HttpPeerSource {
    client: reqwest::blocking::Client,
}

impl HttpPeerSource {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpPeerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerSource for HttpPeerSource {
    fn net_info(&self, seed: &str) -> Result<NetInfoResult, LifecycleError> {
        let url = format!("{}/net_info", seed.trim_end_matches('/'));
        self.client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<NetInfoResponse>())
            .map(|r| r.result)
            .map_err(|e| LifecycleError::PeerQueryFailed {
                endpoint: url,
                reason: e.to_string(),
            })
    }
}

/// Render one `id@ip:port` token per peer, comma-joined in the order
/// received. Only the port of the listen address is used; its host part may
/// be an unroutable bind address. An empty peer set is valid and yields an
/// empty string.
pub fn format_peer_string(info: &NetInfoResult) -> String {
    info.peers
        .iter()
        .filter_map(|peer| {
            let port: u16 = peer.node_info.listen_addr.rsplit(':').next()?.parse().ok()?;
            Some(format!("{}@{}:{}", peer.node_info.id, peer.remote_ip, port))
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Query the seed and assemble the persistent peer configuration value.
pub fn build_peer_string(source: &dyn PeerSource, seed: &str) -> Result<String, LifecycleError> {
    let info = source.net_info(seed)?;
    Ok(format_peer_string(&info))
}
