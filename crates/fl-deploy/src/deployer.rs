use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::config::{DeployConfig, ServiceSpec};
use crate::readiness::ReadinessChecker;
use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};
use crate::{DeployError, Result, Step};

pub const ROLE_LABEL: &str = "dev.funless.e2e.role";

/// Presence of every resource the deployer manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentStatus {
    pub core_container: bool,
    pub worker_container: bool,
    pub control_network: bool,
    pub runtime_network: bool,
}

impl DeploymentStatus {
    pub fn is_up(&self) -> bool {
        self.core_container && self.worker_container && self.control_network && self.runtime_network
    }

    pub fn is_clean(&self) -> bool {
        !(self.core_container || self.worker_container || self.control_network || self.runtime_network)
    }
}

/// Deploys and destroys the FunLess core/worker pair.
///
/// Setup is not idempotent: a second `deploy` without an intervening
/// `destroy` reuses the existing networks but fails at [`Step::StartCore`]
/// with a name conflict. Teardown tolerates missing resources, so it is safe
/// to call after a partial or skipped setup. Only one deployer per host may
/// run at a time.
pub struct Deployer {
    runtime: Arc<dyn ContainerRuntime>,
    config: DeployConfig,
}

impl Deployer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: DeployConfig) -> Self {
        Self { runtime, config }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Runs every setup step in order, stopping at the first failure.
    #[instrument(skip(self), fields(core = %self.config.target.core_container, worker = %self.config.target.worker_container))]
    pub async fn deploy(&self) -> Result<()> {
        info!("Deploying FunLess");
        self.create_networks().await?;
        self.pull_core_image().await?;
        self.pull_worker_image().await?;
        self.start_core().await?;
        self.start_worker().await?;
        self.await_startup().await?;
        info!("FunLess deployed");
        Ok(())
    }

    /// Removes worker, core, invocation containers and networks, in that order.
    #[instrument(skip(self))]
    pub async fn destroy(&self) -> Result<()> {
        info!("Destroying FunLess deployment");
        self.remove_worker_container().await?;
        self.remove_core_container().await?;
        self.remove_function_containers().await?;
        self.remove_networks().await?;
        info!("FunLess deployment removed");
        Ok(())
    }

    pub async fn create_networks(&self) -> Result<()> {
        self.bounded(Step::CreateNetworks, async {
            self.runtime
                .ping()
                .await
                .map_err(|source| DeployError::Setup {
                    resource: "container runtime".to_string(),
                    source,
                })?;

            let target = &self.config.target;
            for network in [&target.control_network, &target.runtime_network] {
                match self.runtime.create_network(network).await {
                    Ok(()) => info!(%network, "Network created"),
                    Err(RuntimeError::Conflict(_)) => {
                        debug!(%network, "Network already exists, reusing it")
                    }
                    Err(source) => {
                        return Err(DeployError::Setup {
                            resource: network.clone(),
                            source,
                        })
                    }
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn pull_core_image(&self) -> Result<()> {
        self.pull(Step::PullCoreImage, &self.config.core.image).await
    }

    pub async fn pull_worker_image(&self) -> Result<()> {
        self.pull(Step::PullWorkerImage, &self.config.worker.image)
            .await
    }

    pub async fn start_core(&self) -> Result<()> {
        let target = &self.config.target;
        let spec = container_spec(
            &target.core_container,
            &self.config.core,
            vec![target.control_network.clone()],
            "core",
        );
        self.start(Step::StartCore, spec).await
    }

    /// The worker joins both networks: it talks to the core on the control
    /// network and to invocation containers on the runtime network.
    pub async fn start_worker(&self) -> Result<()> {
        let target = &self.config.target;
        let spec = container_spec(
            &target.worker_container,
            &self.config.worker,
            vec![
                target.control_network.clone(),
                target.runtime_network.clone(),
            ],
            "worker",
        );
        self.start(Step::StartWorker, spec).await
    }

    /// Fixed settle delay, then the readiness poll when one is configured.
    pub async fn await_startup(&self) -> Result<()> {
        if !self.config.startup_delay.is_zero() {
            debug!(delay = ?self.config.startup_delay, "Waiting for services to settle");
            sleep(self.config.startup_delay).await;
        }
        if let Some(readiness) = &self.config.readiness {
            let mut checker = ReadinessChecker::new(readiness.clone());
            let status = checker.wait_for_ready().await?;
            info!(checks = status.checks_performed, "Services ready");
        }
        Ok(())
    }

    pub async fn remove_worker_container(&self) -> Result<()> {
        let name = &self.config.target.worker_container;
        self.bounded(Step::RemoveWorker, self.remove_container(name))
            .await
    }

    pub async fn remove_core_container(&self) -> Result<()> {
        let name = &self.config.target.core_container;
        self.bounded(Step::RemoveCore, self.remove_container(name))
            .await
    }

    /// Invocation containers are not tracked: once the worker and core are
    /// gone, anything still attached to the runtime network is one of them.
    pub async fn remove_function_containers(&self) -> Result<()> {
        self.bounded(Step::RemoveFunctionContainers, async {
            let network = &self.config.target.runtime_network;
            let containers = match self.runtime.list_containers_on_network(network).await {
                Ok(containers) => containers,
                Err(RuntimeError::NotFound(_)) => return Ok(()),
                Err(source) => {
                    return Err(DeployError::Teardown {
                        resource: network.clone(),
                        source,
                    })
                }
            };
            if !containers.is_empty() {
                info!(count = containers.len(), "Removing function containers");
            }
            for name in &containers {
                self.remove_container(name).await?;
            }
            Ok(())
        })
        .await
    }

    pub async fn remove_networks(&self) -> Result<()> {
        self.bounded(Step::RemoveNetworks, async {
            let target = &self.config.target;
            for network in [&target.runtime_network, &target.control_network] {
                match self.runtime.remove_network(network).await {
                    Ok(()) => info!(%network, "Network removed"),
                    Err(RuntimeError::NotFound(_)) => debug!(%network, "Network already absent"),
                    Err(source) => {
                        return Err(DeployError::Teardown {
                            resource: network.clone(),
                            source,
                        })
                    }
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn status(&self) -> Result<DeploymentStatus> {
        let target = &self.config.target;
        let probe = |source| DeployError::Setup {
            resource: "container runtime".to_string(),
            source,
        };
        Ok(DeploymentStatus {
            core_container: self
                .runtime
                .container_exists(&target.core_container)
                .await
                .map_err(probe)?,
            worker_container: self
                .runtime
                .container_exists(&target.worker_container)
                .await
                .map_err(probe)?,
            control_network: self
                .runtime
                .network_exists(&target.control_network)
                .await
                .map_err(probe)?,
            runtime_network: self
                .runtime
                .network_exists(&target.runtime_network)
                .await
                .map_err(probe)?,
        })
    }

    async fn pull(&self, step: Step, image: &str) -> Result<()> {
        self.bounded(step, async {
            info!(%image, "Pulling image");
            self.runtime
                .pull_image(image)
                .await
                .map_err(|source| DeployError::Pull {
                    image: image.to_string(),
                    source,
                })
        })
        .await
    }

    async fn start(&self, step: Step, spec: ContainerSpec) -> Result<()> {
        self.bounded(step, async {
            let id = self
                .runtime
                .run_container(&spec)
                .await
                .map_err(|source| DeployError::Start {
                    container: spec.name.clone(),
                    source,
                })?;
            info!(name = %spec.name, %id, "Service started");
            Ok(())
        })
        .await
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        match self.runtime.remove_container(name).await {
            Ok(()) => {
                info!(%name, "Container removed");
                Ok(())
            }
            Err(RuntimeError::NotFound(_)) => {
                debug!(%name, "Container already absent");
                Ok(())
            }
            Err(source) => Err(DeployError::Teardown {
                resource: name.to_string(),
                source,
            }),
        }
    }

    async fn bounded<T, F>(&self, step: Step, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.step_timeout;
        match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%step, ?limit, "Lifecycle step timed out");
                Err(DeployError::Timeout { step, after: limit })
            }
        }
    }
}

fn container_spec(
    name: &str,
    service: &ServiceSpec,
    networks: Vec<String>,
    role: &str,
) -> ContainerSpec {
    ContainerSpec {
        name: name.to_string(),
        image: service.image.clone(),
        command: service.command.clone(),
        env: service.env.clone(),
        networks,
        ports: service.ports.clone(),
        binds: service.binds.clone(),
        labels: HashMap::from([(ROLE_LABEL.to_string(), role.to_string())]),
    }
}
