use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::readiness::{ProbeType, ReadinessConfig, ReadinessProbe};
use crate::{DeployError, Result};

pub const CORE_CONTAINER: &str = "fl-core";
pub const WORKER_CONTAINER: &str = "fl-worker";
pub const CONTROL_NETWORK: &str = "fl_net";
pub const RUNTIME_NETWORK: &str = "fl_runtime_net";

pub const DEFAULT_CORE_IMAGE: &str = "ghcr.io/funlessdev/core:latest";
pub const DEFAULT_WORKER_IMAGE: &str = "ghcr.io/funlessdev/worker:latest";
pub const DEFAULT_CORE_PORT: u16 = 4000;
pub const DOCKER_SOCKET_BIND: &str = "/var/run/docker.sock:/var/run/docker.sock";

/// Names of the two service containers and the two networks. Lifecycle calls
/// and later cleanup must agree on these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub core_container: String,
    pub worker_container: String,
    pub control_network: String,
    pub runtime_network: String,
}

impl Default for DeploymentTarget {
    fn default() -> Self {
        Self {
            core_container: CORE_CONTAINER.to_string(),
            worker_container: WORKER_CONTAINER.to_string(),
            control_network: CONTROL_NETWORK.to_string(),
            runtime_network: RUNTIME_NETWORK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
}

impl PortMapping {
    pub fn same(port: u16) -> Self {
        Self {
            container_port: port,
            host_port: port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub binds: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub target: DeploymentTarget,
    pub core: ServiceSpec,
    pub worker: ServiceSpec,
    /// Fixed wait after both services are started.
    pub startup_delay: Duration,
    /// Optional polling after the fixed wait.
    pub readiness: Option<ReadinessConfig>,
    /// Upper bound for every single runtime call.
    pub step_timeout: Duration,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            target: DeploymentTarget::default(),
            core: ServiceSpec {
                image: DEFAULT_CORE_IMAGE.to_string(),
                command: Vec::new(),
                env: Vec::new(),
                ports: vec![PortMapping::same(DEFAULT_CORE_PORT)],
                binds: Vec::new(),
            },
            worker: ServiceSpec {
                image: DEFAULT_WORKER_IMAGE.to_string(),
                command: Vec::new(),
                env: Vec::new(),
                ports: Vec::new(),
                binds: vec![DOCKER_SOCKET_BIND.to_string()],
            },
            startup_delay: Duration::from_secs(5),
            readiness: None,
            step_timeout: Duration::from_secs(300),
        }
    }
}

impl DeployConfig {
    /// Reads overrides from the environment, falling back to the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(image) = std::env::var("FL_CORE_IMAGE") {
            config.core.image = image;
        }
        if let Ok(image) = std::env::var("FL_WORKER_IMAGE") {
            config.worker.image = image;
        }
        if let Some(port) = env_parse::<u16>("FL_CORE_PORT")? {
            config.core.ports = vec![PortMapping::same(port)];
        }
        if let Ok(env) = std::env::var("FL_CORE_ENV") {
            config.core.env = split_list(&env);
        }
        if let Ok(env) = std::env::var("FL_WORKER_ENV") {
            config.worker.env = split_list(&env);
        }
        if let Some(secs) = env_parse::<u64>("FL_STARTUP_DELAY_SECS")? {
            config.startup_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("FL_STEP_TIMEOUT_SECS")? {
            config.step_timeout = Duration::from_secs(secs);
        }

        let wait_ready = match std::env::var("FL_WAIT_READY") {
            Ok(value) => parse_bool_flag(&value)
                .ok_or_else(|| DeployError::Config(format!("FL_WAIT_READY: invalid flag '{value}'")))?,
            Err(_) => false,
        };
        let http_path = std::env::var("FL_READY_HTTP_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty());
        if let Some(path) = &http_path {
            if !path.starts_with('/') {
                return Err(DeployError::Config(format!(
                    "FL_READY_HTTP_PATH: '{path}' must start with '/'"
                )));
            }
        }
        if wait_ready || http_path.is_some() {
            config.readiness = Some(config.core_readiness(http_path.as_deref()));
        }

        Ok(config)
    }

    /// A TCP probe against the first published core port on localhost,
    /// followed by an HTTP GET of `http_path` on the same port when given.
    pub fn core_readiness(&self, http_path: Option<&str>) -> ReadinessConfig {
        let port = self
            .core
            .ports
            .first()
            .map(|p| p.host_port)
            .unwrap_or(DEFAULT_CORE_PORT);
        let mut probes = vec![ReadinessProbe {
            probe_type: ProbeType::Tcp,
            port: Some(port),
            ..Default::default()
        }];
        if let Some(path) = http_path {
            probes.push(ReadinessProbe {
                probe_type: ProbeType::Http,
                port: Some(port),
                path: Some(path.to_string()),
                ..Default::default()
            });
        }
        ReadinessConfig {
            probes,
            ..Default::default()
        }
    }
}

/// Accepts the same spellings as Go's `strconv.ParseBool`.
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DeployError::Config(format!("{key}: cannot parse '{raw}'"))),
        Err(_) => Ok(None),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
