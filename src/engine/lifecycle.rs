//! Node Lifecycle Orchestration
//!
//! First-time installation and in-place upgrades of the two engines. Every
//! operation runs against injected capabilities and an explicit
//! `DeploymentState`, so the whole flow can be exercised with doubles.

use tracing::{error, info};

use super::component::{is_newer_version, Component, Release, CONSENSUS, EXECUTION};
use super::config;
use super::confirm::{Confirmer, StdinConfirmer};
use super::download::{Fetcher, HttpFetcher};
use super::error::LifecycleError;
use super::install::ArtifactInstaller;
use super::peers::{self, HttpPeerSource, PeerSource};
use super::probe::{BinaryVersionProbe, EngineCli, ProcessEngineCli, VersionProbe};
use super::release::{GithubReleases, ReleaseSource};
use super::state::{DeploymentState, UpgradePhase};
use super::supervisor::{ServiceUnit, Supervisor, SystemdSupervisor};

/// Fixed network identifier chain state is initialized against.
pub const NETWORK_ID: &str = "veris-testnet-1";

/// Public seed whose network status seeds the persistent peer set.
pub const SEED_RPC: &str = "https://seed-1.veris.network:26657";

/// The collaborators every lifecycle operation is composed from.
pub struct Orchestrator {
    state: DeploymentState,
    releases: Box<dyn ReleaseSource>,
    fetcher: Box<dyn Fetcher>,
    peers: Box<dyn PeerSource>,
    supervisor: Box<dyn Supervisor>,
    version_probe: Box<dyn VersionProbe>,
    engine: Box<dyn EngineCli>,
    confirmer: Box<dyn Confirmer>,
}

impl Orchestrator {
    /// Production wiring against the live system.
    pub fn system(state: DeploymentState) -> Self {
        let supervisor = SystemdSupervisor::new(state.unit_dir.clone());
        Self {
            state,
            releases: Box::new(GithubReleases::new()),
            fetcher: Box::new(HttpFetcher::new()),
            peers: Box::new(HttpPeerSource::new()),
            supervisor: Box::new(supervisor),
            version_probe: Box::new(BinaryVersionProbe),
            engine: Box::new(ProcessEngineCli),
            confirmer: Box::new(StdinConfirmer),
        }
    }

    /// Explicit wiring, used by tests to substitute doubles.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: DeploymentState,
        releases: Box<dyn ReleaseSource>,
        fetcher: Box<dyn Fetcher>,
        peers: Box<dyn PeerSource>,
        supervisor: Box<dyn Supervisor>,
        version_probe: Box<dyn VersionProbe>,
        engine: Box<dyn EngineCli>,
        confirmer: Box<dyn Confirmer>,
    ) -> Self {
        Self {
            state,
            releases,
            fetcher,
            peers,
            supervisor,
            version_probe,
            engine,
            confirmer,
        }
    }

    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    /// Resolve and install one component: the full install routine, shared
    /// by first installs and upgrades.
    pub fn install_component(
        &self,
        component: &Component,
        nth: usize,
    ) -> Result<Release, LifecycleError> {
        let release = self.releases.resolve_nth(component, nth)?;
        info!(component = component.name, tag = %release.tag, "installing release");

        let installer = ArtifactInstaller::new(&self.state, self.fetcher.as_ref());
        installer.install_from(component, &release.artifact_url)?;
        Ok(release)
    }

    /// First-time node setup.
    ///
    /// `release_choice` selects which published consensus tag to install
    /// (0 = latest, 1 = the immediately prior release). Failure at any step
    /// aborts the remainder; completed steps are not undone.
    pub fn fresh_install(&self, release_choice: usize) -> Result<(), LifecycleError> {
        self.state
            .init()
            .map_err(|e| LifecycleError::InstallFailed {
                binary: "deployment layout".to_string(),
                reason: e.to_string(),
            })?;

        let consensus = self.install_component(&CONSENSUS, release_choice)?;
        self.install_component(&EXECUTION, 0)?;

        let moniker = self
            .confirmer
            .read_line("Node moniker (public identity label)");
        self.engine.init_chain(&self.state, &moniker, NETWORK_ID)?;
        info!(%moniker, network = NETWORK_ID, "chain state initialized");

        let peer_string = peers::build_peer_string(self.peers.as_ref(), SEED_RPC)?;
        let peer_count = peer_string.split(',').filter(|t| !t.is_empty()).count();
        info!(peer_count, "persistent peer set assembled");
        config::set_persistent_peers(&self.state.config_file(), &peer_string)?;

        self.supervisor.register(&consensus_unit(&self.state))?;
        self.supervisor.register(&execution_unit(&self.state))?;

        info!(consensus = %consensus.tag, "node installed and services started");
        Ok(())
    }

    /// Perform a version-aware in-place upgrade of one engine.
    ///
    /// Once the service is stopped, control does not return until the
    /// service is confirmed started or a fatal error is reported. There is
    /// no rollback after the installed binary is removed.
    pub fn update(&self, component: &Component, service: &str) -> Result<(), LifecycleError> {
        let latest = self.releases.resolve_latest(component)?;
        let installed = self.version_probe.installed_version(&self.state, component)?;
        info!(
            component = component.name,
            %installed, latest = %latest.tag, "resolved versions"
        );

        if !self
            .confirmer
            .confirm(&update_prompt(component, &installed, &latest.tag))
        {
            return Err(LifecycleError::ConfirmationDeclined);
        }

        let mut phase = UpgradePhase::Running;
        let outcome = self.upgrade_sequence(component, service, &mut phase);
        if let Err(err) = &outcome {
            if phase.in_risk_window() {
                error!(
                    service,
                    phase = phase.label(),
                    %err,
                    "upgrade failed with no installed binary; reinstall before starting the service"
                );
            } else {
                error!(service, phase = phase.label(), %err, "upgrade aborted");
            }
        }
        outcome
    }

    fn upgrade_sequence(
        &self,
        component: &Component,
        service: &str,
        phase: &mut UpgradePhase,
    ) -> Result<(), LifecycleError> {
        self.supervisor.stop(service)?;
        phase.step(); // Stopped

        let installer = ArtifactInstaller::new(&self.state, self.fetcher.as_ref());
        installer.remove_installed(component)?;
        phase.step(); // Uninstalled

        phase.step(); // Installing
        self.install_component(component, 0)?;

        self.supervisor.start(service)?;
        phase.step(); // Started
        info!(service, "upgrade complete, service running");
        Ok(())
    }

    /// Delegated validator creation (a single engine CLI call).
    pub fn create_validator(&self, stake: &str) -> Result<String, LifecycleError> {
        self.engine.create_validator(&self.state, stake)
    }

    /// The validator's public address, read from the identity file.
    pub fn validator_address(&self) -> Result<String, LifecycleError> {
        config::read_validator_address(&self.state.validator_key_file()).map_err(Into::into)
    }

    /// Supervised state of both engine services.
    pub fn service_status(&self) -> Vec<(&'static str, Result<bool, LifecycleError>)> {
        vec![
            (CONSENSUS.name, self.supervisor.is_running(CONSENSUS.name)),
            (EXECUTION.name, self.supervisor.is_running(EXECUTION.name)),
        ]
    }
}

fn update_prompt(component: &Component, installed: &str, latest_tag: &str) -> String {
    if is_newer_version(latest_tag, installed) {
        format!(
            "Upgrade {} {} -> {}?",
            component.name, installed, latest_tag
        )
    } else {
        format!(
            "{} is already at {} (latest is {}). Reinstall anyway?",
            component.name, installed, latest_tag
        )
    }
}

fn consensus_unit(state: &DeploymentState) -> ServiceUnit {
    ServiceUnit {
        name: CONSENSUS.name.to_string(),
        description: "Veris consensus engine".to_string(),
        exec_start: format!(
            "{} {}",
            CONSENSUS.binary_path(&state.bin_dir).display(),
            CONSENSUS.run_args.join(" ")
        ),
        user: "root".to_string(),
    }
}

fn execution_unit(state: &DeploymentState) -> ServiceUnit {
    ServiceUnit {
        name: EXECUTION.name.to_string(),
        description: "Veris execution engine".to_string(),
        exec_start: format!(
            "{} {}",
            EXECUTION.binary_path(&state.bin_dir).display(),
            EXECUTION.run_args.join(" ")
        ),
        user: "root".to_string(),
    }
}
