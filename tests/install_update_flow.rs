use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use flate2::write::GzEncoder;
use flate2::Compression;

use verisctl::engine::component::{Component, Release, CONSENSUS, EXECUTION};
use verisctl::engine::confirm::Confirmer;
use verisctl::engine::download::Fetcher;
use verisctl::engine::error::LifecycleError;
use verisctl::engine::lifecycle::Orchestrator;
use verisctl::engine::peers::{NetInfoResult, PeerSource};
use verisctl::engine::probe::{EngineCli, VersionProbe};
use verisctl::engine::release::ReleaseSource;
use verisctl::engine::state::DeploymentState;
use verisctl::engine::supervisor::{ServiceUnit, Supervisor};

// ---- doubles -------------------------------------------------------------

struct StubReleases {
    tag: String,
    fail: bool,
}

impl ReleaseSource for StubReleases {
    fn resolve_nth(&self, component: &Component, _nth: usize) -> Result<Release, LifecycleError> {
        if self.fail {
            return Err(LifecycleError::ReleaseNotFound {
                component: component.name.to_string(),
                reason: "connection timed out".to_string(),
            });
        }
        Ok(Release {
            tag: self.tag.clone(),
            artifact_url: format!(
                "https://example.invalid/{}/{}",
                component.name, component.archive_name
            ),
        })
    }
}

/// Serves locally built tar.gz archives instead of going to the network.
struct FixtureFetcher;

impl Fetcher for FixtureFetcher {
    fn fetch(&self, _url: &str, dest: &Path) -> Result<(), LifecycleError> {
        let file_name = dest.file_name().unwrap().to_string_lossy();
        let binary_name = if file_name.starts_with(EXECUTION.name) {
            EXECUTION.name
        } else {
            CONSENSUS.name
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(dest, build_archive(binary_name, b"#!new-binary")).unwrap();
        Ok(())
    }
}

fn build_archive(binary_name: &str, content: &[u8]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(&mut header, format!("release/{}", binary_name), content)
        .unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

struct StubPeerSource {
    body: &'static str,
}

impl PeerSource for StubPeerSource {
    fn net_info(&self, _seed: &str) -> Result<NetInfoResult, LifecycleError> {
        Ok(serde_json::from_str(self.body).unwrap())
    }
}

#[derive(Clone)]
struct RecordingSupervisor {
    running: Rc<RefCell<Vec<(String, bool)>>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl RecordingSupervisor {
    fn new() -> Self {
        Self {
            running: Rc::new(RefCell::new(Vec::new())),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn with_running(name: &str) -> Self {
        let supervisor = Self::new();
        supervisor
            .running
            .borrow_mut()
            .push((name.to_string(), true));
        supervisor
    }

    fn is_marked_running(&self, name: &str) -> bool {
        self.running
            .borrow()
            .iter()
            .any(|(n, up)| n == name && *up)
    }

    fn mark(&self, name: &str, up: bool) {
        for entry in self.running.borrow_mut().iter_mut() {
            if entry.0 == name {
                entry.1 = up;
            }
        }
    }
}

impl Supervisor for RecordingSupervisor {
    fn register(&self, unit: &ServiceUnit) -> Result<(), LifecycleError> {
        self.calls
            .borrow_mut()
            .push(format!("register {}", unit.name));
        self.running.borrow_mut().push((unit.name.clone(), true));
        Ok(())
    }

    fn start(&self, name: &str) -> Result<(), LifecycleError> {
        self.calls.borrow_mut().push(format!("start {}", name));
        self.mark(name, true);
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<(), LifecycleError> {
        self.calls.borrow_mut().push(format!("stop {}", name));
        self.mark(name, false);
        Ok(())
    }

    fn restart(&self, name: &str) -> Result<(), LifecycleError> {
        self.calls.borrow_mut().push(format!("restart {}", name));
        Ok(())
    }

    fn is_running(&self, name: &str) -> Result<bool, LifecycleError> {
        Ok(self.is_marked_running(name))
    }
}

struct StubVersionProbe {
    version: String,
}

impl VersionProbe for StubVersionProbe {
    fn installed_version(
        &self,
        _state: &DeploymentState,
        _component: &Component,
    ) -> Result<String, LifecycleError> {
        Ok(self.version.clone())
    }
}

/// Stands in for `verisd init`: generates the config file the way the real
/// engine does, with an empty persistent peer set.
struct InitWritingEngineCli;

impl EngineCli for InitWritingEngineCli {
    fn init_chain(
        &self,
        state: &DeploymentState,
        moniker: &str,
        _network: &str,
    ) -> Result<(), LifecycleError> {
        let config = state.config_file();
        fs::create_dir_all(config.parent().unwrap()).unwrap();
        fs::write(
            &config,
            format!("moniker = \"{}\"\npersistent_peers = \"\"\n", moniker),
        )
        .unwrap();
        Ok(())
    }

    fn create_validator(
        &self,
        _state: &DeploymentState,
        _stake: &str,
    ) -> Result<String, LifecycleError> {
        Ok(String::new())
    }
}

struct ScriptedConfirmer {
    answer: bool,
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, _question: &str) -> bool {
        self.answer
    }

    fn read_line(&self, _question: &str) -> String {
        "scenario-node".to_string()
    }
}

const TWO_PEERS: &str = r#"{
    "peers": [
        {
            "node_info": {"id": "a1b2c3d4e5f6", "listen_addr": "tcp://0.0.0.0:26656"},
            "remote_ip": "203.0.113.7"
        },
        {
            "node_info": {"id": "f6e5d4c3b2a1", "listen_addr": "tcp://0.0.0.0:26656"},
            "remote_ip": "198.51.100.2"
        }
    ]
}"#;

// ---- scenarios -----------------------------------------------------------

#[test]
fn test_fresh_install_with_two_seed_peers() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Empty deployment rooted in a temp directory
    let root = tempfile::tempdir()?;
    let state = DeploymentState::rooted_at(root.path());

    let supervisor = RecordingSupervisor::new();
    let orchestrator = Orchestrator::new(
        state.clone(),
        Box::new(StubReleases {
            tag: "v0.13.1".to_string(),
            fail: false,
        }),
        Box::new(FixtureFetcher),
        Box::new(StubPeerSource { body: TWO_PEERS }),
        Box::new(supervisor.clone()),
        Box::new(StubVersionProbe {
            version: "v0.13.1".to_string(),
        }),
        Box::new(InitWritingEngineCli),
        Box::new(ScriptedConfirmer { answer: true }),
    );

    // 2. Run the full first-time install
    orchestrator.fresh_install(0)?;

    // 3. Both engine binaries are installed
    assert!(CONSENSUS.binary_path(&state.bin_dir).exists());
    assert!(EXECUTION.binary_path(&state.bin_dir).exists());

    // 4. The persistent peer line holds exactly the two peers, in order
    let config = fs::read_to_string(state.config_file())?;
    assert!(config.contains(
        r#"persistent_peers = "a1b2c3d4e5f6@203.0.113.7:26656,f6e5d4c3b2a1@198.51.100.2:26656""#
    ));
    // The rest of the generated config is untouched
    assert!(config.contains(r#"moniker = "scenario-node""#));

    // 5. Both services are registered and reported running
    assert_eq!(
        *supervisor.calls.borrow(),
        ["register verisd", "register veris-geth"]
    );
    assert!(supervisor.is_marked_running(CONSENSUS.name));
    assert!(supervisor.is_marked_running(EXECUTION.name));

    Ok(())
}

#[test]
fn test_update_at_latest_still_reinstalls_when_confirmed() -> Result<(), Box<dyn std::error::Error>>
{
    // 1. Deployment with the consensus engine installed and running
    let root = tempfile::tempdir()?;
    let state = DeploymentState::rooted_at(root.path());
    state.init()?;
    let binary = CONSENSUS.binary_path(&state.bin_dir);
    fs::write(&binary, b"#!old-binary")?;

    // 2. Installed version equals the latest published tag
    let supervisor = RecordingSupervisor::with_running(CONSENSUS.name);
    let orchestrator = Orchestrator::new(
        state.clone(),
        Box::new(StubReleases {
            tag: "v0.13.1".to_string(),
            fail: false,
        }),
        Box::new(FixtureFetcher),
        Box::new(StubPeerSource { body: TWO_PEERS }),
        Box::new(supervisor.clone()),
        Box::new(StubVersionProbe {
            version: "v0.13.1".to_string(),
        }),
        Box::new(InitWritingEngineCli),
        Box::new(ScriptedConfirmer { answer: true }),
    );

    // 3. Version equality is informational: a confirmed update still runs
    orchestrator.update(&CONSENSUS, CONSENSUS.name)?;

    // 4. The service went through stop and start, and is running again
    assert_eq!(*supervisor.calls.borrow(), ["stop verisd", "start verisd"]);
    assert!(supervisor.is_marked_running(CONSENSUS.name));

    // 5. The binary was reinstalled from the release artifact
    assert_eq!(fs::read(&binary)?, b"#!new-binary");

    Ok(())
}

#[test]
fn test_update_with_unreachable_index_leaves_node_alone() -> Result<(), Box<dyn std::error::Error>>
{
    // 1. Deployment with the consensus engine installed and running
    let root = tempfile::tempdir()?;
    let state = DeploymentState::rooted_at(root.path());
    state.init()?;
    let binary = CONSENSUS.binary_path(&state.bin_dir);
    fs::write(&binary, b"#!old-binary")?;

    let supervisor = RecordingSupervisor::with_running(CONSENSUS.name);
    let orchestrator = Orchestrator::new(
        state.clone(),
        Box::new(StubReleases {
            tag: String::new(),
            fail: true,
        }),
        Box::new(FixtureFetcher),
        Box::new(StubPeerSource { body: TWO_PEERS }),
        Box::new(supervisor.clone()),
        Box::new(StubVersionProbe {
            version: "v0.13.0".to_string(),
        }),
        Box::new(InitWritingEngineCli),
        Box::new(ScriptedConfirmer { answer: true }),
    );

    // 2. The release index query fails before anything is touched
    let err = orchestrator.update(&CONSENSUS, CONSENSUS.name).unwrap_err();
    assert!(matches!(err, LifecycleError::ReleaseNotFound { .. }));

    // 3. The service was never stopped and remains running, unchanged
    assert!(supervisor.calls.borrow().is_empty());
    assert!(supervisor.is_marked_running(CONSENSUS.name));
    assert_eq!(fs::read(&binary)?, b"#!old-binary");

    Ok(())
}
