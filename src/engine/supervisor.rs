//! Service Supervision
//!
//! Registers the engines as systemd units and drives their lifecycle. Unit
//! files are written under the deployment unit directory; state transitions
//! are polled until the supervisor reports them or a timeout elapses.

use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use super::error::LifecycleError;

pub const RESTART_DELAY_SECS: u32 = 3;
pub const FILE_DESCRIPTOR_LIMIT: u32 = 4096;

const TRANSITION_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Declarative description of a supervised engine service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
    /// Unit name without the `.service` suffix.
    pub name: String,
    pub description: String,
    pub exec_start: String,
    pub user: String,
}

impl ServiceUnit {
    pub fn file_name(&self) -> String {
        format!("{}.service", self.name)
    }

    /// Render the systemd unit file.
    pub fn render(&self) -> String {
        format!(
            r#"[Unit]
Description={description}
After=network-online.target

[Service]
User={user}
ExecStart={exec_start}
Restart=on-failure
RestartSec={delay}
LimitNOFILE={nofile}

[Install]
WantedBy=multi-user.target
"#,
            description = self.description,
            user = self.user,
            exec_start = self.exec_start,
            delay = RESTART_DELAY_SECS,
            nofile = FILE_DESCRIPTOR_LIMIT,
        )
    }
}

/// Process supervisor operations. Production shells out to systemd; tests
/// use a recording double. Registration is once-per-install; units are
/// never deleted by this system.
pub trait Supervisor {
    /// Write the unit, reload the supervisor, enable at boot and start.
    fn register(&self, unit: &ServiceUnit) -> Result<(), LifecycleError>;
    fn start(&self, name: &str) -> Result<(), LifecycleError>;
    fn stop(&self, name: &str) -> Result<(), LifecycleError>;
    fn restart(&self, name: &str) -> Result<(), LifecycleError>;
    fn is_running(&self, name: &str) -> Result<bool, LifecycleError>;
}

pub struct SystemdSupervisor {
    unit_dir: PathBuf,
}

impl SystemdSupervisor {
    pub fn new(unit_dir: PathBuf) -> Self {
        Self { unit_dir }
    }

    fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(format!("{}.service", name))
    }

    fn ensure_registered(&self, name: &str) -> Result<(), LifecycleError> {
        if !self.unit_path(name).exists() {
            return Err(LifecycleError::UnknownService(name.to_string()));
        }
        Ok(())
    }

    fn systemctl(&self, service: &str, args: &[&str]) -> Result<(), LifecycleError> {
        let output = Command::new("systemctl").args(args).output().map_err(|e| {
            LifecycleError::SupervisorFailed {
                service: service.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LifecycleError::SupervisorFailed {
                service: service.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    fn query_active(&self, name: &str) -> Result<bool, LifecycleError> {
        // `is-active` exits zero exactly when the unit is active.
        let output = Command::new("systemctl")
            .args(["is-active", "--quiet", name])
            .output()
            .map_err(|e| LifecycleError::SupervisorFailed {
                service: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(output.status.success())
    }

    fn wait_for(&self, name: &str, want_active: bool, target: &'static str) -> Result<(), LifecycleError> {
        let start = Instant::now();
        loop {
            if self.query_active(name)? == want_active {
                return Ok(());
            }
            if start.elapsed() > TRANSITION_TIMEOUT {
                return Err(LifecycleError::SupervisorTimeout {
                    service: name.to_string(),
                    target,
                    timeout_secs: TRANSITION_TIMEOUT.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Supervisor for SystemdSupervisor {
    fn register(&self, unit: &ServiceUnit) -> Result<(), LifecycleError> {
        let path = self.unit_path(&unit.name);
        std::fs::write(&path, unit.render()).map_err(|e| LifecycleError::SupervisorFailed {
            service: unit.name.clone(),
            reason: format!("could not write {}: {}", path.display(), e),
        })?;
        info!(unit = %path.display(), "service unit written");

        self.systemctl(&unit.name, &["daemon-reload"])?;
        self.systemctl(&unit.name, &["enable", &unit.file_name()])?;
        self.start(&unit.name)
    }

    fn start(&self, name: &str) -> Result<(), LifecycleError> {
        self.ensure_registered(name)?;
        self.systemctl(name, &["start", name])?;
        self.wait_for(name, true, "started")?;
        info!(service = name, "service started");
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<(), LifecycleError> {
        self.ensure_registered(name)?;
        self.systemctl(name, &["stop", name])?;
        self.wait_for(name, false, "stopped")?;
        info!(service = name, "service stopped");
        Ok(())
    }

    fn restart(&self, name: &str) -> Result<(), LifecycleError> {
        self.ensure_registered(name)?;
        self.systemctl(name, &["restart", name])?;
        self.wait_for(name, true, "restarted")
    }

    fn is_running(&self, name: &str) -> Result<bool, LifecycleError> {
        self.ensure_registered(name)?;
        self.query_active(name)
    }
}
