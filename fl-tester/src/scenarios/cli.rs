use std::path::PathBuf;

use color_eyre::eyre::{bail, Result};
use fl_cli_runner::{is_error_line, CliOutput, FlCli};
use tracing::warn;

use crate::config::PlatformContract;
use crate::fixtures::{greeting, FixtureContext, FunctionSource};
use crate::suite::{expect_eq, SuiteReport};

/// Name of the function built from the Rust sources.
const BUILT: &str = "built";

pub struct CliContext {
    /// Runs in `scratch`, where `fn build` drops its output.
    pub cli: FlCli,
    pub scratch: PathBuf,
    pub fixture: FixtureContext,
    pub new_module: String,
    pub rust_function: PathBuf,
    pub contract: PlatformContract,
}

impl CliContext {
    fn wasm(&self) -> String {
        match &self.fixture.source {
            FunctionSource::Wasm(path) => path.display().to_string(),
            FunctionSource::Code(_) => String::new(),
        }
    }

    fn rust_sources(&self) -> String {
        self.rust_function.display().to_string()
    }

    async fn upload(&self, name: &str, module: &str) -> Result<()> {
        let wasm = self.wasm();
        let output = self
            .cli
            .run(&["fn", "upload", name, &wasm, "--namespace", module])
            .await;
        expect_ok("fn upload", &output)
    }

    async fn delete(&self, name: &str, module: &str) -> Result<()> {
        let output = self
            .cli
            .run(&["fn", "delete", name, "--namespace", module])
            .await;
        expect_ok("fn delete", &output)
    }

    async fn invoke(&self, name: &str, module: &str, args: &str) -> CliOutput {
        self.cli
            .run(&["fn", "invoke", name, "--namespace", module, "-j", args])
            .await
    }

    async fn expect_greeting(&self, name: &str, module: &str, who: &str) -> Result<()> {
        let args = serde_json::json!({"name": who}).to_string();
        let output = self.invoke(name, module, &args).await;
        expect_eq(
            "fn invoke output",
            format!("{}\n", greeting(Some(who))),
            output.transcript(),
        )
    }

    fn expect_not_found(&self, output: &CliOutput) -> Result<()> {
        expect_eq(
            "last line",
            self.contract.cli_not_found.as_str(),
            output.last_line().as_str(),
        )
    }
}

fn expect_ok(what: &str, output: &CliOutput) -> Result<()> {
    if output.is_error() {
        bail!("{what} failed: {}", output.last_line());
    }
    Ok(())
}

pub async fn operations_success(ctx: &CliContext, report: &mut SuiteReport) {
    let function = ctx.fixture.function.as_str();
    let module = ctx.fixture.namespace.as_str();
    let new_module = ctx.new_module.as_str();
    let args = ctx.fixture.args_string();

    report
        .check("should successfully create function", ctx.upload(function, module))
        .await;

    report
        .check("should return the correct result when invoking hello", async {
            let output = ctx.invoke(function, module, &args).await;
            expect_eq(
                "fn invoke output",
                format!("{}\n", greeting(Some("Test"))),
                output.transcript(),
            )
        })
        .await;

    report
        .check("should successfully delete function", ctx.delete(function, module))
        .await;

    report
        .check("should successfully build and create function", async {
            let sources = ctx.rust_sources();
            let output = ctx
                .cli
                .run(&["fn", "create", BUILT, &sources, "--namespace", module, "--language", "rust"])
                .await;
            expect_ok("fn create", &output)?;
            ctx.expect_greeting(BUILT, module, "Build").await?;
            ctx.delete(BUILT, module).await
        })
        .await;

    report
        .check("should successfully build function", async {
            let sources = ctx.rust_sources();
            let output = ctx
                .cli
                .run(&["fn", "build", BUILT, &sources, "--language", "rust"])
                .await;
            expect_ok("fn build", &output)?;

            let artifact = ctx.scratch.join(format!("{BUILT}.wasm"));
            if !artifact.is_file() {
                bail!("{} was not produced", artifact.display());
            }
            std::fs::remove_file(&artifact)?;
            Ok(())
        })
        .await;

    report
        .check("should successfully create a module", async {
            let output = ctx.cli.run(&["mod", "create", new_module]).await;
            expect_eq(
                "mod create output",
                format!("Successfully created module {new_module}.\n"),
                output.transcript(),
            )
        })
        .await;

    report
        .check(
            "should successfully create function in a new module",
            ctx.upload(function, new_module),
        )
        .await;

    report
        .check("should successfully invoke function in a new module", async {
            ctx.expect_greeting(function, new_module, "Test").await
        })
        .await;

    report
        .check("should successfully list functions in a module", async {
            let second = format!("{function}2");
            ctx.upload(&second, new_module).await?;

            let expected = format!("Module: {new_module}\nFunctions:\n{function}\n{second}\n");
            let output = ctx.cli.run(&["mod", "get", new_module]).await;
            expect_eq("mod get output", expected.clone(), output.transcript())?;

            let output = ctx.cli.run(&["mod", "get", new_module, "-c"]).await;
            expect_eq(
                "mod get -c output",
                format!("{expected}Count: 2\n"),
                output.transcript(),
            )
        })
        .await;

    report
        .check("should successfully list modules", async {
            let output = ctx.cli.run(&["mod", "list"]).await;
            expect_eq(
                "mod list output",
                format!("{module}\n{new_module}\n"),
                output.transcript(),
            )?;

            let output = ctx.cli.run(&["mod", "list", "-c"]).await;
            expect_eq(
                "mod list -c output",
                format!("{module}\n{new_module}\nCount: 2\n"),
                output.transcript(),
            )
        })
        .await;

    report
        .check("should successfully delete a module", async {
            let output = ctx.cli.run(&["mod", "delete", new_module]).await;
            expect_eq(
                "mod delete output",
                format!("Successfully deleted module {new_module}.\n"),
                output.transcript(),
            )?;

            let output = ctx.cli.run(&["mod", "list"]).await;
            expect_eq("mod list output", format!("{module}\n"), output.transcript())
        })
        .await;
}

pub async fn operations_failure(ctx: &CliContext, report: &mut SuiteReport) {
    let function = ctx.fixture.function.as_str();
    let module = ctx.fixture.namespace.as_str();
    let new_module = ctx.new_module.as_str();
    let args = ctx.fixture.args_string();

    report
        .check("should return an error when invoking a function before creating it", async {
            let output = ctx.invoke(function, module, &args).await;
            ctx.expect_not_found(&output)
        })
        .await;

    report
        .check("should return an error when invoking a function in the wrong namespace", async {
            ctx.upload(function, module).await?;
            let output = ctx.invoke(function, "WRONG", &args).await;
            let outcome = ctx.expect_not_found(&output);
            if let Err(e) = ctx.delete(function, module).await {
                warn!(%function, %module, error = %e, "Cleanup after wrong-namespace invocation failed");
            }
            outcome
        })
        .await;

    report
        .check("should return an error when invoking a function after deleting it", async {
            ctx.upload(function, module).await?;
            ctx.delete(function, module).await?;
            let output = ctx.invoke(function, module, &args).await;
            ctx.expect_not_found(&output)
        })
        .await;

    report
        .check("should return an error when deleting a function before creating it", async {
            let output = ctx
                .cli
                .run(&["fn", "delete", function, "--namespace", module])
                .await;
            ctx.expect_not_found(&output)
        })
        .await;

    report
        .check("should return an error when creating a function in a nonexistent module", async {
            let wasm = ctx.wasm();
            let output = ctx
                .cli
                .run(&["fn", "upload", function, &wasm, "--namespace", new_module])
                .await;
            ctx.expect_not_found(&output)
        })
        .await;

    report
        .check(
            "should return an error when invoking a function after its module was deleted",
            async {
                expect_ok("mod create", &ctx.cli.run(&["mod", "create", new_module]).await)?;
                ctx.upload(function, new_module).await?;
                expect_ok("mod delete", &ctx.cli.run(&["mod", "delete", new_module]).await)?;

                let output = ctx.invoke(function, new_module, &args).await;
                expect_eq(
                    "fn invoke output",
                    ctx.contract.cli_not_found.as_str(),
                    output.transcript().trim_end(),
                )
            },
        )
        .await;

    report
        .check("should return an error when trying to delete a nonexistent module", async {
            let output = ctx.cli.run(&["mod", "delete", new_module]).await;
            expect_eq(
                "mod delete output",
                ctx.contract.cli_not_found.as_str(),
                output.transcript().trim_end(),
            )
        })
        .await;

    report
        .check("should return an error when trying to create an existing module", async {
            expect_ok("mod create", &ctx.cli.run(&["mod", "create", new_module]).await)?;

            let output = ctx.cli.run(&["mod", "create", new_module]).await;
            let duplicate_rejected = is_error_line(&output.last_line());

            expect_ok("mod delete", &ctx.cli.run(&["mod", "delete", new_module]).await)?;
            if !duplicate_rejected {
                bail!("duplicate mod create was accepted: {}", output.last_line());
            }
            Ok(())
        })
        .await;
}
