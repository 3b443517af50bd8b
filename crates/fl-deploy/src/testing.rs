//! Test support: an in-memory [`ContainerRuntime`] that behaves like the
//! Docker daemon for the operations the deployer uses, and records every call.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;

use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};

pub fn has_docker() -> bool {
    Command::new("docker")
        .arg("info")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Skips the current test when no Docker daemon is available.
#[macro_export]
macro_rules! require_docker {
    () => {
        if !$crate::testing::has_docker() {
            eprintln!("Test ignored: Docker not available");
            return;
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Ping,
    CreateNetwork(String),
    PullImage(String),
    RunContainer(String),
    RemoveContainer(String),
    ListContainers(String),
    RemoveNetwork(String),
}

#[derive(Debug, Default)]
struct FakeState {
    unreachable: bool,
    networks: BTreeSet<String>,
    images: BTreeSet<String>,
    missing_images: BTreeSet<String>,
    /// container name -> attached networks
    containers: BTreeMap<String, Vec<String>>,
    /// host port -> owning container (None for ports held outside the runtime)
    bound_ports: HashMap<u16, Option<String>>,
    calls: Vec<RuntimeCall>,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the daemon socket were missing.
    pub fn unreachable() -> Self {
        let runtime = Self::default();
        runtime.lock().unreachable = true;
        runtime
    }

    /// Pulls of `image` fail as a missing tag would.
    pub fn with_missing_image(self, image: &str) -> Self {
        self.lock().missing_images.insert(image.to_string());
        self
    }

    /// Marks `port` as already bound by something outside the runtime.
    pub fn with_bound_port(self, port: u16) -> Self {
        self.lock().bound_ports.insert(port, None);
        self
    }

    /// Every pull takes this long.
    pub fn with_pull_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    /// Simulates the worker spawning an invocation container on `network`.
    pub fn spawn_invocation_container(&self, name: &str, network: &str) {
        self.lock()
            .containers
            .insert(name.to_string(), vec![network.to_string()]);
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn containers(&self) -> Vec<String> {
        self.lock().containers.keys().cloned().collect()
    }

    pub fn networks(&self) -> Vec<String> {
        self.lock().networks.iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: RuntimeCall) -> Result<std::sync::MutexGuard<'_, FakeState>, RuntimeError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.unreachable {
            return Err(RuntimeError::Unreachable(
                "Socket not found: /var/run/docker.sock".to_string(),
            ));
        }
        Ok(state)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Ping).map(|_| ())
    }

    async fn create_network(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.record(RuntimeCall::CreateNetwork(name.to_string()))?;
        if !state.networks.insert(name.to_string()) {
            return Err(RuntimeError::Conflict(format!(
                "network with name {name} already exists"
            )));
        }
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let delay = {
            let state = self.record(RuntimeCall::PullImage(image.to_string()))?;
            if state.missing_images.contains(image) {
                return Err(RuntimeError::NotFound(format!("manifest unknown: {image}")));
            }
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.lock().images.insert(image.to_string());
        Ok(())
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.record(RuntimeCall::RunContainer(spec.name.clone()))?;
        if state.containers.contains_key(&spec.name) {
            return Err(RuntimeError::Conflict(format!(
                "container name \"/{}\" is already in use",
                spec.name
            )));
        }
        if !state.images.contains(&spec.image) {
            return Err(RuntimeError::NotFound(format!("No such image: {}", spec.image)));
        }
        if let Some(missing) = spec.networks.iter().find(|n| !state.networks.contains(*n)) {
            return Err(RuntimeError::NotFound(format!("network {missing} not found")));
        }
        if let Some(port) = spec
            .ports
            .iter()
            .find(|p| state.bound_ports.contains_key(&p.host_port))
        {
            return Err(RuntimeError::Api(format!(
                "Bind for 0.0.0.0:{} failed: port is already allocated",
                port.host_port
            )));
        }
        for port in &spec.ports {
            state
                .bound_ports
                .insert(port.host_port, Some(spec.name.clone()));
        }
        state
            .containers
            .insert(spec.name.clone(), spec.networks.clone());
        Ok(format!("id-{}", spec.name))
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.record(RuntimeCall::RemoveContainer(name.to_string()))?;
        if state.containers.remove(name).is_none() {
            return Err(RuntimeError::NotFound(format!("No such container: {name}")));
        }
        state
            .bound_ports
            .retain(|_, owner| owner.as_deref() != Some(name));
        Ok(())
    }

    async fn list_containers_on_network(
        &self,
        network: &str,
    ) -> Result<Vec<String>, RuntimeError> {
        let state = self.record(RuntimeCall::ListContainers(network.to_string()))?;
        Ok(state
            .containers
            .iter()
            .filter(|(_, networks)| networks.iter().any(|n| n == network))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.record(RuntimeCall::RemoveNetwork(name.to_string()))?;
        if !state.networks.contains(name) {
            return Err(RuntimeError::NotFound(format!("network {name} not found")));
        }
        if state
            .containers
            .values()
            .any(|networks| networks.iter().any(|n| n == name))
        {
            return Err(RuntimeError::Api(format!(
                "error while removing network: network {name} has active endpoints"
            )));
        }
        state.networks.remove(name);
        Ok(())
    }

    async fn container_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        if self.lock().unreachable {
            return Err(RuntimeError::Unreachable("daemon not running".to_string()));
        }
        Ok(self.lock().containers.contains_key(name))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        if self.lock().unreachable {
            return Err(RuntimeError::Unreachable("daemon not running".to_string()));
        }
        Ok(self.lock().networks.contains(name))
    }
}
