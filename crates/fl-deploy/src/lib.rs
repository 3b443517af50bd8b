//! Brings a local FunLess deployment (core + worker containers and their two
//! networks) up before the end-to-end suites run, and tears it down afterwards.
//!
//! The manager talks to the container runtime through [`ContainerRuntime`];
//! [`DockerRuntime`] is the bollard-backed implementation used outside tests.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

pub mod cli;
pub mod config;
pub mod deployer;
pub mod docker;
pub mod readiness;
pub mod runtime;
pub mod testing;

pub use bollard;
pub use config::{DeployConfig, DeploymentTarget, PortMapping, ServiceSpec};
pub use deployer::{Deployer, DeploymentStatus};
pub use docker::DockerRuntime;
pub use readiness::{ReadinessChecker, ReadinessConfig, ReadinessError};
pub use runtime::{ContainerRuntime, ContainerSpec, RuntimeError};

/// Lifecycle steps, in the order `deploy` and `destroy` run them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateNetworks,
    PullCoreImage,
    PullWorkerImage,
    StartCore,
    StartWorker,
    AwaitStartup,
    RemoveWorker,
    RemoveCore,
    RemoveFunctionContainers,
    RemoveNetworks,
}

impl Step {
    pub fn phase(self) -> Phase {
        match self {
            Step::CreateNetworks
            | Step::PullCoreImage
            | Step::PullWorkerImage
            | Step::StartCore
            | Step::StartWorker
            | Step::AwaitStartup => Phase::Setup,
            Step::RemoveWorker
            | Step::RemoveCore
            | Step::RemoveFunctionContainers
            | Step::RemoveNetworks => Phase::Teardown,
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::CreateNetworks => "create networks",
            Step::PullCoreImage => "pull core image",
            Step::PullWorkerImage => "pull worker image",
            Step::StartCore => "start core",
            Step::StartWorker => "start worker",
            Step::AwaitStartup => "await startup",
            Step::RemoveWorker => "remove worker container",
            Step::RemoveCore => "remove core container",
            Step::RemoveFunctionContainers => "remove function containers",
            Step::RemoveNetworks => "remove networks",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Teardown,
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Setup failed for {resource}: {source}")]
    Setup {
        resource: String,
        #[source]
        source: RuntimeError,
    },
    #[error("Image pull failed for {image}: {source}")]
    Pull {
        image: String,
        #[source]
        source: RuntimeError,
    },
    #[error("Container start failed for {container}: {source}")]
    Start {
        container: String,
        #[source]
        source: RuntimeError,
    },
    #[error("Services did not become ready: {0}")]
    Readiness(#[from] ReadinessError),
    #[error("Teardown failed while removing {resource}: {source}")]
    Teardown {
        resource: String,
        #[source]
        source: RuntimeError,
    },
    #[error("Step '{step}' timed out after {after:?}")]
    Timeout { step: Step, after: Duration },
    #[error("Configuration Error: {0}")]
    Config(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeployError {
    /// Which half of the lifecycle failed. Callers only distinguish
    /// "setup failed" from "teardown failed".
    pub fn phase(&self) -> Phase {
        match self {
            DeployError::Teardown { .. } => Phase::Teardown,
            DeployError::Timeout { step, .. } => step.phase(),
            _ => Phase::Setup,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_phase() {
        let err = DeployError::Timeout {
            step: Step::RemoveNetworks,
            after: Duration::from_secs(1),
        };
        assert_eq!(err.phase(), Phase::Teardown);
        assert_eq!(
            err.to_string(),
            "Step 'remove networks' timed out after 1s"
        );

        let err = DeployError::Pull {
            image: "ghcr.io/funlessdev/core:latest".to_string(),
            source: RuntimeError::NotFound("manifest unknown".to_string()),
        };
        assert_eq!(err.phase(), Phase::Setup);
    }

    #[test]
    fn test_serialization_error_variant() {
        let err: DeployError = serde_json::from_str::<u8>("not json").unwrap_err().into();
        assert!(matches!(err, DeployError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization failed: "));
        assert_eq!(err.phase(), Phase::Setup);
    }
}
