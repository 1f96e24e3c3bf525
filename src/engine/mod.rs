// verisctl engine - core module structure
pub mod cli;
pub mod component;
pub mod config;
pub mod confirm;
pub mod download;
pub mod error;
pub mod install;
pub mod lifecycle;
pub mod menu;
pub mod nodeops;
pub mod peers;
pub mod probe;
pub mod release;
pub mod state;
pub mod supervisor;

pub use component::{Component, Release, CONSENSUS, EXECUTION};
pub use error::LifecycleError;
pub use lifecycle::Orchestrator;
pub use state::DeploymentState;
