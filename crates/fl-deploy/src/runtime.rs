use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::PortMapping;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("container runtime unreachable: {0}")]
    Unreachable(String),
    #[error("container runtime error: {0}")]
    Api(String),
}

/// Everything needed to create and start one long-running service container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Empty keeps the image's default command.
    pub command: Vec<String>,
    pub env: Vec<String>,
    /// The first network is used at creation time; the rest are connected before start.
    pub networks: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub binds: Vec<String>,
    pub labels: HashMap<String, String>,
}

/// The container operations the lifecycle manager needs. Every call blocks
/// until the runtime has finished the operation.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<(), RuntimeError>;

    /// Returns `Conflict` when the network already exists.
    async fn create_network(&self, name: &str) -> Result<(), RuntimeError>;

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Creates and starts the container, returning its id. Returns `Conflict`
    /// when the name is already taken.
    async fn run_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Force-removes the container. Returns `NotFound` when it does not exist.
    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Names of all containers, running or not, attached to `network`.
    async fn list_containers_on_network(&self, network: &str)
        -> Result<Vec<String>, RuntimeError>;

    /// Returns `NotFound` when the network does not exist.
    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError>;

    async fn container_exists(&self, name: &str) -> Result<bool, RuntimeError>;

    async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError>;
}
