//! Runs the lifecycle against a real Docker daemon, with small stand-in
//! images in place of the FunLess services.

use fl_deploy::{require_docker, DeployConfig, DeploymentTarget, Deployer, DockerRuntime};
use std::sync::Arc;
use std::time::Duration;

fn stand_in_config() -> DeployConfig {
    let mut config = DeployConfig {
        target: DeploymentTarget {
            core_container: "fl-e2e-core".to_string(),
            worker_container: "fl-e2e-worker".to_string(),
            control_network: "fl_e2e_net".to_string(),
            runtime_network: "fl_e2e_runtime_net".to_string(),
        },
        startup_delay: Duration::ZERO,
        ..Default::default()
    };
    for service in [&mut config.core, &mut config.worker] {
        service.image = "alpine:latest".to_string();
        service.command = vec!["sleep".to_string(), "300".to_string()];
        service.binds.clear();
    }
    config.core.ports.clear();
    config
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_docker_deploy_and_destroy() {
    require_docker!();
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let runtime = Arc::new(DockerRuntime::connect().expect("docker connection"));
    let deployer = Deployer::new(runtime, stand_in_config());

    // Start from a clean slate in case a previous run was interrupted.
    deployer.destroy().await.unwrap();

    deployer.deploy().await.unwrap();
    assert!(deployer.status().await.unwrap().is_up());

    deployer.destroy().await.unwrap();
    assert!(deployer.status().await.unwrap().is_clean());

    // A second teardown finds nothing and still succeeds.
    deployer.destroy().await.unwrap();
}
