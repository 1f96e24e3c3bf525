//! Release Index Client
//!
//! Resolves published versions and platform artifact URLs from the GitHub
//! releases listing of a component's repository.

use std::time::Duration;

use serde::Deserialize;

use super::component::{Component, Release, ARCHIVE_SUFFIX};
use super::error::LifecycleError;

const RELEASE_INDEX_URL: &str = "https://api.github.com";
const USER_AGENT_VALUE: &str = "verisctl";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Release notes wrap the artifact link in this many bytes of trailing
/// markup (an HTML-escaped closing quote).
const NOTES_URL_TRAILER_LEN: usize = 6;

/// Where released versions come from. Production queries the GitHub API;
/// tests substitute canned indexes.
pub trait ReleaseSource {
    /// Resolve the nth most recently published release (0 = latest).
    fn resolve_nth(&self, component: &Component, nth: usize) -> Result<Release, LifecycleError>;

    fn resolve_latest(&self, component: &Component) -> Result<Release, LifecycleError> {
        self.resolve_nth(component, 0)
    }
}

/// One entry of the index's native JSON structure, newest first.
#[derive(Debug, Deserialize)]
pub struct ReleaseEntry {
    pub tag_name: Option<String>,
    pub body: Option<String>,
}

pub struct GithubReleases {
    client: reqwest::blocking::Client,
    api_base: String,
}

impl GithubReleases {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: RELEASE_INDEX_URL.to_string(),
        }
    }
}

impl Default for GithubReleases {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseSource for GithubReleases {
    fn resolve_nth(&self, component: &Component, nth: usize) -> Result<Release, LifecycleError> {
        let url = format!("{}/repos/{}/releases", self.api_base, component.repo);
        let entries: Vec<ReleaseEntry> = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| LifecycleError::ReleaseNotFound {
                component: component.name.to_string(),
                reason: e.to_string(),
            })?;

        release_from_entries(&entries, component, nth)
    }
}

/// Pick the nth entry out of a fetched index and extract tag + artifact URL.
pub fn release_from_entries(
    entries: &[ReleaseEntry],
    component: &Component,
    nth: usize,
) -> Result<Release, LifecycleError> {
    let not_found = |reason: String| LifecycleError::ReleaseNotFound {
        component: component.name.to_string(),
        reason,
    };

    let entry = entries.get(nth).ok_or_else(|| {
        not_found(format!(
            "index lists {} releases, wanted #{}",
            entries.len(),
            nth + 1
        ))
    })?;

    let tag = entry
        .tag_name
        .clone()
        .ok_or_else(|| not_found("release has no tag".to_string()))?;

    let body = entry.body.as_deref().unwrap_or_default();
    let artifact_url = artifact_url_from_notes(body, component.artifact_pattern).ok_or_else(|| {
        not_found(format!(
            "no {} artifact in release notes for {}",
            component.artifact_pattern, tag
        ))
    })?;

    Ok(Release { tag, artifact_url })
}

/// Extract the platform artifact URL from the release notes body.
///
/// The notes list download links as whitespace-separated tokens; the token
/// for the platform artifact may carry `NOTES_URL_TRAILER_LEN` bytes of
/// markup after the archive name, which is stripped byte-exactly.
fn artifact_url_from_notes(body: &str, pattern: &str) -> Option<String> {
    let token = body
        .split_whitespace()
        .find(|t| t.contains(pattern) && t.contains("https://"))?;
    let token = &token[token.find("https://")?..];

    if token.ends_with(ARCHIVE_SUFFIX) {
        return Some(token.to_string());
    }

    let cut = token.len().checked_sub(NOTES_URL_TRAILER_LEN)?;
    if !token.is_char_boundary(cut) {
        return None;
    }
    let url = &token[..cut];
    if url.ends_with(ARCHIVE_SUFFIX) {
        Some(url.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::component::CONSENSUS;

    const CLEAN_URL: &str =
        "https://github.com/veris-labs/verisd/releases/download/v0.13.0/verisd-linux-amd64.tar.gz";

    #[test]
    fn test_clean_url_accepted_verbatim() {
        let body = format!("Assets:\n{}\nchecksums below", CLEAN_URL);
        assert_eq!(
            artifact_url_from_notes(&body, "linux-amd64").as_deref(),
            Some(CLEAN_URL)
        );
    }

    #[test]
    fn test_six_byte_trailer_stripped_exactly() {
        // The notes body HTML-escapes the closing quote after the link.
        let body = format!("download: {}&quot; sha256 0a1b2c", CLEAN_URL);
        assert_eq!(
            artifact_url_from_notes(&body, "linux-amd64").as_deref(),
            Some(CLEAN_URL)
        );
    }

    #[test]
    fn test_no_matching_artifact() {
        let body = "https://github.com/veris-labs/verisd/releases/download/v0.13.0/verisd-darwin-arm64.tar.gz";
        assert_eq!(artifact_url_from_notes(body, "linux-amd64"), None);
    }

    #[test]
    fn test_resolve_from_entries_picks_nth() {
        let entries = vec![
            ReleaseEntry {
                tag_name: Some("v0.13.1".to_string()),
                body: Some(CLEAN_URL.to_string()),
            },
            ReleaseEntry {
                tag_name: Some("v0.13.0".to_string()),
                body: Some(CLEAN_URL.to_string()),
            },
        ];

        let latest = release_from_entries(&entries, &CONSENSUS, 0).unwrap();
        assert_eq!(latest.tag, "v0.13.1");

        let prior = release_from_entries(&entries, &CONSENSUS, 1).unwrap();
        assert_eq!(prior.tag, "v0.13.0");
    }

    #[test]
    fn test_missing_tag_is_release_not_found() {
        let entries = vec![ReleaseEntry {
            tag_name: None,
            body: Some(CLEAN_URL.to_string()),
        }];

        let err = release_from_entries(&entries, &CONSENSUS, 0).unwrap_err();
        assert!(matches!(err, LifecycleError::ReleaseNotFound { .. }));
    }

    #[test]
    fn test_empty_index_is_release_not_found() {
        let err = release_from_entries(&[], &CONSENSUS, 0).unwrap_err();
        assert!(matches!(err, LifecycleError::ReleaseNotFound { .. }));
    }
}
