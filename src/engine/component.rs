//! Engine Components
//!
//! The two node processes are described as data so the resolver, installer
//! and probes never hard-code a binary name.

use std::path::{Path, PathBuf};

/// Substring identifying the platform artifact inside a release.
pub const PLATFORM_PATTERN: &str = "linux-amd64";

/// Released artifacts are gzipped tarballs.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// A named installable engine. Exactly one installed version exists on disk
/// at a time; installation overwrites, never versions side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Canonical binary name, also the installed file name.
    pub name: &'static str,
    /// GitHub `owner/repo` the releases are published under.
    pub repo: &'static str,
    /// Substring that picks the platform artifact out of the release notes.
    pub artifact_pattern: &'static str,
    /// File name the downloaded archive is staged under.
    pub archive_name: &'static str,
    /// Argument passed to the installed binary to print its version.
    pub version_arg: &'static str,
    /// Arguments the supervised service runs the binary with.
    pub run_args: &'static [&'static str],
}

/// The consensus engine: block production and validation.
pub const CONSENSUS: Component = Component {
    name: "verisd",
    repo: "veris-labs/verisd",
    artifact_pattern: PLATFORM_PATTERN,
    archive_name: "verisd-linux-amd64.tar.gz",
    version_arg: "version",
    run_args: &["run"],
};

/// The execution engine: transaction state transitions.
pub const EXECUTION: Component = Component {
    name: "veris-geth",
    repo: "veris-labs/veris-geth",
    artifact_pattern: PLATFORM_PATTERN,
    archive_name: "veris-geth-linux-amd64.tar.gz",
    version_arg: "version",
    run_args: &["--veris", "--syncmode", "full"],
};

impl Component {
    /// Where the installed binary lives under a deployment's bin dir.
    pub fn binary_path(&self, bin_dir: &Path) -> PathBuf {
        bin_dir.join(self.name)
    }
}

/// A published release resolved from the index. Resolved fresh on every
/// query, never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    pub artifact_url: String,
}

/// Check if version A is newer than version B (leading `v` ignored).
pub fn is_newer_version(a: &str, b: &str) -> bool {
    let parse = |v: &str| -> Vec<u32> {
        v.trim_start_matches('v')
            .split('.')
            .filter_map(|s| s.parse().ok())
            .collect()
    };

    parse(a) > parse(b)
}
