use color_eyre::eyre;
use fl_deploy::cli::{self, Command};
use fl_deploy::{DeployConfig, Deployer, DockerRuntime};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(args.as_slice())?;
    let config = DeployConfig::from_env()?;
    info!(core_image = %config.core.image, worker_image = %config.worker.image, "Loaded deploy configuration");

    let runtime = DockerRuntime::connect()?;
    let deployer = Deployer::new(Arc::new(runtime), config);

    let mut stdout = std::io::stdout();
    cli::run(command, &deployer, &mut stdout).await?;
    Ok(())
}
