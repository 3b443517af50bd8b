//! `fl` command line suite. Set `HOST` to run it, and `DEPLOY=true` to have
//! the CLI deploy the platform itself. `FL_CLI_BIN` selects the binary.

use color_eyre::eyre::Result;
use fl_cli_runner::FlCli;
use fl_tester::scenarios::cli::{self, CliContext};
use fl_tester::{init_tracing, E2eConfig, FixtureContext, Suite, SuiteReport};
use tempfile::TempDir;

#[tokio::test]
async fn test_cli() -> Result<()> {
    init_tracing();
    let config = E2eConfig::from_env()?;
    if config.cli_host.is_none() {
        eprintln!("Skipping CLI suite: set HOST to run it, and DEPLOY=true to deploy FunLess");
        return Ok(());
    }
    if !config.wasm_source.is_file() {
        eprintln!(
            "Skipping CLI suite: {} not found, set FL_TEST_WASM",
            config.wasm_source.display()
        );
        return Ok(());
    }

    let scratch = TempDir::new()?;
    let fl = FlCli::from_env().working_dir(scratch.path());
    let ctx = CliContext {
        cli: fl.clone(),
        scratch: scratch.path().to_path_buf(),
        fixture: FixtureContext::hello_wasm(&config.wasm_source),
        new_module: "test_mod".to_string(),
        rust_function: config.rust_function.clone(),
        contract: config.contract.clone(),
    };

    let suite = Suite::start("cli", config.cli_deploy_method(&fl)).await?;
    let ctx = &ctx;
    suite
        .run(move || async move {
            let mut report = SuiteReport::new("cli");
            cli::operations_failure(&ctx, &mut report).await;
            cli::operations_success(&ctx, &mut report).await;
            report.finish()
        })
        .await
}
