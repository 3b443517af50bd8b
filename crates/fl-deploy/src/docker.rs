use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{EndpointSettings, HostConfig, PortBinding};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};

/// [`ContainerRuntime`] backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Arc<Docker>,
}

impl DockerRuntime {
    pub fn new(docker: Arc<Docker>) -> Self {
        Self { docker }
    }

    /// Connects with the platform defaults (`DOCKER_HOST` or the local socket).
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Unreachable(e.to_string()))?;
        Ok(Self::new(Arc::new(docker)))
    }

    pub fn client(&self) -> Arc<Docker> {
        self.docker.clone()
    }
}

fn classify(err: BollardError) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        BollardError::DockerResponseServerError {
            status_code: 409,
            message,
        } => RuntimeError::Conflict(message),
        BollardError::DockerResponseServerError { message, .. } => RuntimeError::Api(message),
        err @ (BollardError::IOError { .. }
        | BollardError::HyperResponseError { .. }
        | BollardError::RequestTimeoutError) => RuntimeError::Unreachable(err.to_string()),
        other => RuntimeError::Api(other.to_string()),
    }
}

/// An `error` item inside the pull progress stream. A missing image is
/// already a 404 from the daemon; anything reported here (auth, registry
/// timeouts, layer failures) is an API failure.
fn pull_stream_error(message: String) -> RuntimeError {
    RuntimeError::Api(message)
}

fn port_maps(
    spec: &ContainerSpec,
) -> (
    HashMap<String, HashMap<(), ()>>,
    HashMap<String, Option<Vec<PortBinding>>>,
) {
    let mut exposed_ports = HashMap::new();
    let mut port_bindings = HashMap::new();
    for mapping in &spec.ports {
        let key = format!("{}/tcp", mapping.container_port);
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(mapping.host_port.to_string()),
            }]),
        );
    }
    (exposed_ports, port_bindings)
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Unreachable(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn create_network(&self, name: &str) -> Result<(), RuntimeError> {
        // Docker happily creates duplicate names; report them as a conflict instead.
        if self.network_exists(name).await? {
            return Err(RuntimeError::Conflict(format!("network {name} already exists")));
        }
        let options = CreateNetworkOptions {
            name: name.to_string(),
            driver: "bridge".to_string(),
            attachable: true,
            ..Default::default()
        };
        let response = self.docker.create_network(options).await.map_err(classify)?;
        debug!(id = ?response.id, "Network created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: image.to_string(),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(progress) = stream.next().await {
            let info = progress.map_err(classify)?;
            if let Some(error) = info.error {
                return Err(pull_stream_error(error));
            }
            if let Some(status) = info.status {
                debug!(%status, "Pull progress");
            }
        }
        info!("Image pulled");
        Ok(())
    }

    #[instrument(skip(self, spec), fields(name = %spec.name, image = %spec.image))]
    async fn run_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let (exposed_ports, port_bindings) = port_maps(spec);
        let mut networks = spec.networks.iter();
        let first_network = networks.next().cloned();

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                binds: Some(spec.binds.clone()),
                network_mode: first_network,
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.clone(),
                    ..Default::default()
                }),
                config,
            )
            .await
            .map_err(classify)?;
        info!(container_id = %created.id, "Container created");

        for network in networks {
            self.docker
                .connect_network(
                    network,
                    ConnectNetworkOptions {
                        container: spec.name.clone(),
                        endpoint_config: EndpointSettings::default(),
                    },
                )
                .await
                .map_err(classify)?;
            debug!(%network, "Connected to network");
        }

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(classify)?;
        info!(container_id = %created.id, "Container started");
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(classify)
    }

    async fn list_containers_on_network(
        &self,
        network: &str,
    ) -> Result<Vec<String>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("network".to_string(), vec![network.to_string()]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(classify)?;

        Ok(containers
            .into_iter()
            .filter_map(|summary| {
                summary
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|name| name.trim_start_matches('/').to_string())
                    .or(summary.id)
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker.remove_network(name).await.map_err(classify)
    }

    async fn container_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(classify)
        {
            Ok(_) => Ok(true),
            Err(RuntimeError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn network_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(classify)
        {
            Ok(_) => Ok(true),
            Err(RuntimeError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortMapping;

    #[test]
    fn test_classify_status_codes() {
        let not_found = BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such container: fl-core".to_string(),
        };
        assert_eq!(
            classify(not_found),
            RuntimeError::NotFound("No such container: fl-core".to_string())
        );

        let conflict = BollardError::DockerResponseServerError {
            status_code: 409,
            message: "name already in use".to_string(),
        };
        assert!(matches!(classify(conflict), RuntimeError::Conflict(_)));

        let server = BollardError::DockerResponseServerError {
            status_code: 500,
            message: "port is already allocated".to_string(),
        };
        assert_eq!(
            classify(server),
            RuntimeError::Api("port is already allocated".to_string())
        );
        assert!(matches!(
            classify(BollardError::RequestTimeoutError),
            RuntimeError::Unreachable(_)
        ));
    }

    #[test]
    fn test_pull_stream_errors_are_api_failures() {
        assert_eq!(
            pull_stream_error("unauthorized: authentication required".to_string()),
            RuntimeError::Api("unauthorized: authentication required".to_string())
        );

        let missing = BollardError::DockerResponseServerError {
            status_code: 404,
            message: "manifest for ghcr.io/funlessdev/core:nope not found".to_string(),
        };
        assert!(matches!(classify(missing), RuntimeError::NotFound(_)));
    }

    #[test]
    fn test_port_maps() {
        let spec = ContainerSpec {
            name: "fl-core".to_string(),
            ports: vec![PortMapping {
                container_port: 4000,
                host_port: 4001,
            }],
            ..Default::default()
        };
        let (exposed, bindings) = port_maps(&spec);
        assert!(exposed.contains_key("4000/tcp"));
        let binding = bindings["4000/tcp"].as_ref().unwrap();
        assert_eq!(binding[0].host_port.as_deref(), Some("4001"));
    }
}
