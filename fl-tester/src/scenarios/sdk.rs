use color_eyre::eyre::{bail, Result};
use fl_sdk::{extract_error, FlClient, FunctionInvocation, PlatformErrorKind};

use crate::config::PlatformContract;
use crate::fixtures::{greeting, FixtureContext};
use crate::suite::{expect_eq, SuiteReport};

pub struct SdkContext {
    pub client: FlClient,
    pub fixture: FixtureContext,
    pub contract: PlatformContract,
}

impl SdkContext {
    async fn create(&self) -> Result<()> {
        let created = self.client.create(&self.fixture.creation()?).await?;
        expect_eq("created function", self.fixture.function.as_str(), created.result.as_str())
    }

    async fn delete(&self) -> Result<()> {
        let deleted = self.client.delete(&self.fixture.deletion()).await?;
        expect_eq("deleted function", self.fixture.function.as_str(), deleted.result.as_str())
    }

    fn with_args(&self) -> FunctionInvocation {
        self.fixture.invocation(Some(self.fixture.args.clone()))
    }

    async fn expect_not_found(&self, invocation: &FunctionInvocation) -> Result<()> {
        match self.client.invoke(invocation).await {
            Ok(success) => bail!("invocation unexpectedly succeeded: {:?}", success.result),
            Err(e) => {
                expect_eq("error kind", Some(PlatformErrorKind::NotFound), e.kind())?;
                expect_eq(
                    "error message",
                    self.contract.invoke_not_found.as_str(),
                    extract_error(&e).as_str(),
                )
            }
        }
    }
}

pub async fn invocation_success(ctx: &SdkContext, report: &mut SuiteReport) {
    report
        .check("should successfully create function", ctx.create())
        .await;

    report
        .check("should return no error when invoking an existing function", async {
            ctx.client.invoke(&ctx.with_args()).await?;
            Ok(())
        })
        .await;

    report
        .check("should successfully invoke function without args", async {
            let invoked = ctx.client.invoke(&ctx.fixture.invocation(None)).await?;
            expect_eq("result", Some(greeting(None)), invoked.result)
        })
        .await;

    report
        .check("should successfully invoke function with args", async {
            let invoked = ctx.client.invoke(&ctx.with_args()).await?;
            expect_eq("result", Some(greeting(Some("Test"))), invoked.result)
        })
        .await;

    report
        .check("should successfully delete function", ctx.delete())
        .await;
}

pub async fn invocation_failure(ctx: &SdkContext, report: &mut SuiteReport) {
    report
        .check("should return an error when invoking a function before creating it", async {
            ctx.expect_not_found(&ctx.with_args()).await
        })
        .await;

    report
        .check("should return an error when invoking a function in the wrong namespace", async {
            ctx.create().await?;
            let elsewhere = ctx
                .fixture
                .invocation_in_wrong_namespace(Some(ctx.fixture.args.clone()));
            ctx.expect_not_found(&elsewhere).await?;
            ctx.delete().await
        })
        .await;

    report
        .check("should return an error when invoking a function after deleting it", async {
            ctx.create().await?;
            ctx.delete().await?;
            ctx.expect_not_found(&ctx.with_args()).await
        })
        .await;
}
