use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{bail, eyre, Report, Result, WrapErr};
use fl_cli_runner::FlCli;
use fl_deploy::{DeployConfig, Deployer, DockerRuntime};
use futures::FutureExt;
use tracing::{error, info, warn};

/// Where a suite's platform comes from.
#[derive(Debug, Clone)]
pub enum DeployMethod {
    /// Containers managed directly through the Docker API.
    Direct(DeployConfig),
    /// `fl admin deploy docker up`, then a fixed wait.
    Cli { cli: FlCli, startup_delay: Duration },
    /// Already running; nothing to set up or tear down.
    External,
}

/// A deployment held for the duration of one suite run.
pub struct Suite {
    name: String,
    method: DeployMethod,
    deployer: Option<Deployer>,
}

impl Suite {
    /// Sets the platform up. A failed setup is cleaned up best-effort and
    /// aborts the run.
    pub async fn start(name: impl Into<String>, method: DeployMethod) -> Result<Self> {
        let name = name.into();
        info!(suite = %name, "Starting suite");

        let deployer = match &method {
            DeployMethod::Direct(config) => {
                let runtime = DockerRuntime::connect().wrap_err("Failed to connect to Docker")?;
                let deployer = Deployer::new(Arc::new(runtime), config.clone());
                if let Err(e) = deployer.deploy().await {
                    error!(suite = %name, error = %e, "Deployment failed");
                    if let Err(cleanup) = deployer.destroy().await {
                        warn!(suite = %name, error = %cleanup, "Cleanup after failed deployment failed");
                    }
                    return Err(Report::new(e).wrap_err(format!("{name}: deployment failed")));
                }
                Some(deployer)
            }
            DeployMethod::Cli { cli, startup_delay } => {
                let output = cli.run(&["admin", "deploy", "docker", "up"]).await;
                if output.is_error() {
                    let down = cli.run(&["admin", "deploy", "docker", "down"]).await;
                    if down.is_error() {
                        warn!(suite = %name, output = %down.last_line(), "Cleanup after failed deployment failed");
                    }
                    bail!("{name}: deployment failed: {}", output.last_line());
                }
                tokio::time::sleep(*startup_delay).await;
                None
            }
            DeployMethod::External => None,
        };

        Ok(Self {
            name,
            method,
            deployer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `scenarios`, then tears the deployment down whatever happened.
    /// A panic inside `scenarios` is re-raised after teardown.
    pub async fn run<F, Fut>(self, scenarios: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let outcome = AssertUnwindSafe(scenarios()).catch_unwind().await;
        let teardown = self.teardown().await;

        match outcome {
            Err(panic) => {
                if let Err(e) = teardown {
                    error!(suite = %self.name, error = ?e, "Teardown failed");
                }
                std::panic::resume_unwind(panic)
            }
            Ok(result) => {
                if let Err(e) = &teardown {
                    error!(suite = %self.name, error = %e, "Teardown failed");
                }
                result?;
                teardown
            }
        }
    }

    async fn teardown(&self) -> Result<()> {
        info!(suite = %self.name, "Tearing down");
        match (&self.method, &self.deployer) {
            (DeployMethod::Direct(_), Some(deployer)) => deployer
                .destroy()
                .await
                .wrap_err_with(|| format!("{}: teardown failed", self.name)),
            (DeployMethod::Cli { cli, .. }, _) => {
                let output = cli.run(&["admin", "deploy", "docker", "down"]).await;
                if output.is_error() {
                    bail!("{}: teardown failed: {}", self.name, output.last_line());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Outcomes of the named scenarios of one suite.
///
/// A failing scenario is recorded and the next one still runs; [`finish`]
/// turns any failure into an error for the whole suite.
///
/// [`finish`]: SuiteReport::finish
#[derive(Debug)]
pub struct SuiteReport {
    suite: String,
    passed: Vec<String>,
    failed: Vec<(String, Report)>,
}

impl SuiteReport {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            passed: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub async fn check<Fut>(&mut self, scenario: &str, fut: Fut)
    where
        Fut: Future<Output = Result<()>>,
    {
        match fut.await {
            Ok(()) => {
                info!(suite = %self.suite, scenario, "PASS");
                self.passed.push(scenario.to_string());
            }
            Err(e) => {
                error!(suite = %self.suite, scenario, error = ?e, "FAIL");
                self.failed.push((scenario.to_string(), e));
            }
        }
    }

    pub fn passed(&self) -> &[String] {
        &self.passed
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|(name, _)| name.as_str())
    }

    pub fn finish(self) -> Result<()> {
        if self.failed.is_empty() {
            info!(suite = %self.suite, passed = self.passed.len(), "Suite passed");
            return Ok(());
        }
        let total = self.passed.len() + self.failed.len();
        let mut summary = format!(
            "{}: {} of {} scenarios failed",
            self.suite,
            self.failed.len(),
            total
        );
        for (name, err) in &self.failed {
            summary.push_str(&format!("\n - {name}: {err:#}"));
        }
        Err(eyre!(summary))
    }
}

/// Fails with both values when they differ.
pub fn expect_eq<T: PartialEq + Debug>(what: &str, expected: T, actual: T) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(eyre!("{what}: expected {expected:?}, got {actual:?}"))
    }
}
