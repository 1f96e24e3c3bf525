//! Artifact Installer
//!
//! Stages release archives, extracts them and installs the contained
//! executable into the deployment binary directory.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::component::Component;
use super::download::Fetcher;
use super::error::LifecycleError;
use super::state::DeploymentState;

pub struct ArtifactInstaller<'a> {
    state: &'a DeploymentState,
    fetcher: &'a dyn Fetcher,
}

impl<'a> ArtifactInstaller<'a> {
    pub fn new(state: &'a DeploymentState, fetcher: &'a dyn Fetcher) -> Self {
        Self { state, fetcher }
    }

    /// Install `component` from `url`.
    ///
    /// An archive already staged in the workdir short-circuits the whole
    /// routine: a re-run after a partial failure must not re-download.
    pub fn install_from(&self, component: &Component, url: &str) -> Result<(), LifecycleError> {
        let archive = self.state.workdir.join(component.archive_name);
        if archive.exists() {
            info!(
                archive = %archive.display(),
                "archive already staged, skipping install"
            );
            return Ok(());
        }

        self.fetcher.fetch(url, &archive)?;
        if let Ok(digest) = sha256_of(&archive) {
            info!(component = component.name, %digest, "staged archive digest");
        }

        let extract_dir = self.state.workdir.join(format!("{}-unpack", component.name));
        extract_archive(&archive, &extract_dir).map_err(|e| LifecycleError::ExtractFailed {
            archive: component.archive_name.to_string(),
            reason: e.to_string(),
        })?;

        let executable = find_executable(&extract_dir, component.name).ok_or_else(|| {
            LifecycleError::ExtractFailed {
                archive: component.archive_name.to_string(),
                reason: format!("expected executable {} not present", component.name),
            }
        })?;

        let target = component.binary_path(&self.state.bin_dir);
        install_binary(&executable, &target).map_err(|e| LifecycleError::InstallFailed {
            binary: component.name.to_string(),
            reason: e.to_string(),
        })?;
        info!(component = component.name, target = %target.display(), "binary installed");

        // Transient files are best-effort cleanup; the install itself is done.
        if let Err(e) = fs::remove_dir_all(&extract_dir) {
            warn!(dir = %extract_dir.display(), error = %e, "could not remove extracted tree");
        }
        if let Err(e) = fs::remove_file(&archive) {
            warn!(archive = %archive.display(), error = %e, "could not remove staged archive");
        }

        Ok(())
    }

    /// Delete the installed binary. After this there is nothing to roll
    /// back to until a reinstall completes.
    pub fn remove_installed(&self, component: &Component) -> Result<(), LifecycleError> {
        let binary = component.binary_path(&self.state.bin_dir);
        if binary.exists() {
            fs::remove_file(&binary).map_err(|e| LifecycleError::InstallFailed {
                binary: component.name.to_string(),
                reason: format!("could not remove installed binary: {}", e),
            })?;
        }
        Ok(())
    }
}

fn extract_archive(archive: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    let file = File::open(archive)?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.unpack(dest)
}

fn find_executable(dir: &Path, name: &str) -> Option<PathBuf> {
    for entry in fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_executable(&path, name) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(name) {
            return Some(path);
        }
    }
    None
}

fn install_binary(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dest, fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}

/// SHA256 of a staged archive, logged so operators can compare against
/// published checksums.
pub fn sha256_of(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
