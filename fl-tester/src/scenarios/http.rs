use color_eyre::eyre::Result;
use fl_common::Endpoint;

use crate::config::PlatformContract;
use crate::fixtures::{error_body, greeting, invocation_result, FixtureContext};
use crate::http::RawHttp;
use crate::suite::{expect_eq, SuiteReport};

pub struct HttpContext {
    pub http: RawHttp,
    pub fixture: FixtureContext,
    pub contract: PlatformContract,
}

impl HttpContext {
    async fn create(&self) -> Result<()> {
        let response = self
            .http
            .post_json(Endpoint::Create, &self.fixture.creation()?)
            .await?;
        expect_eq("create status", 200, response.status)?;
        expect_eq("create body", self.fixture.name_result(), response.body)
    }

    async fn delete(&self) -> Result<()> {
        let response = self
            .http
            .post_json(Endpoint::Delete, &self.fixture.deletion())
            .await?;
        expect_eq("delete status", 200, response.status)?;
        expect_eq("delete body", self.fixture.name_result(), response.body)
    }

    async fn expect_not_found(&self, invocation: &fl_common::FunctionInvocation) -> Result<()> {
        let response = self.http.post_json(Endpoint::Invoke, invocation).await?;
        expect_eq("invoke status", 404, response.status)?;
        expect_eq(
            "invoke body",
            error_body(&self.contract.invoke_not_found),
            response.body,
        )
    }
}

/// Full lifecycle of a function: create, invoke with and without arguments,
/// delete.
pub async fn invocation_success(ctx: &HttpContext, report: &mut SuiteReport) {
    report
        .check("should successfully create function", ctx.create())
        .await;

    report
        .check("should return no error when invoking an existing function", async {
            let response = ctx
                .http
                .post_json(Endpoint::Invoke, &ctx.fixture.invocation(None))
                .await?;
            expect_eq("invoke status", 200, response.status)
        })
        .await;

    report
        .check("should return the correct result when invoking hellojs with no args", async {
            let response = ctx
                .http
                .post_json(Endpoint::Invoke, &ctx.fixture.invocation(None))
                .await?;
            expect_eq("invoke status", 200, response.status)?;
            expect_eq(
                "invoke body",
                invocation_result(greeting(None)),
                response.body,
            )
        })
        .await;

    report
        .check("should return the correct result when invoking hellojs with args", async {
            let response = ctx
                .http
                .post_json(
                    Endpoint::Invoke,
                    &ctx.fixture.invocation(Some(ctx.fixture.args.clone())),
                )
                .await?;
            expect_eq("invoke status", 200, response.status)?;
            expect_eq(
                "invoke body",
                invocation_result(greeting(Some("Test"))),
                response.body,
            )
        })
        .await;

    report
        .check("should successfully delete function", ctx.delete())
        .await;
}

/// Invocations that the platform must reject as not found.
pub async fn invocation_failure(ctx: &HttpContext, report: &mut SuiteReport) {
    report
        .check("should return 404 when invoking a function before creating it", async {
            ctx.expect_not_found(&ctx.fixture.invocation(None)).await
        })
        .await;

    report
        .check("should return 404 when invoking a function in the wrong namespace", async {
            ctx.create().await?;
            ctx.expect_not_found(&ctx.fixture.invocation_in_wrong_namespace(None))
                .await?;
            ctx.delete().await
        })
        .await;

    report
        .check("should return 404 when invoking a function after deleting it", async {
            ctx.create().await?;
            ctx.delete().await?;
            ctx.expect_not_found(&ctx.fixture.invocation(None)).await
        })
        .await;
}

/// Malformed requests only a raw HTTP client can send. The function is
/// created by the first scenario and deleted by the last.
pub async fn http_only_failure(ctx: &HttpContext, report: &mut SuiteReport) {
    report
        .check("should return an error when invoking a function with bad params", async {
            ctx.create().await?;
            let body = serde_json::json!({
                "wrongly-named-parameter": ctx.fixture.function,
                "namespace": ctx.fixture.namespace,
            });
            let response = ctx.http.post_json(Endpoint::Invoke, &body).await?;
            expect_eq("invoke status", 400, response.status)?;
            expect_eq(
                "invoke body",
                error_body(&ctx.contract.bad_request),
                response.body,
            )
        })
        .await;

    report
        .check("should return an error when invoking a function with wrong MIME type", async {
            let body = serde_json::to_string(&ctx.fixture.invocation(None))?;
            let response = ctx
                .http
                .post_raw(Endpoint::Invoke, "text/plain", body)
                .await?;
            expect_eq("invoke status", 415, response.status)
        })
        .await;

    report
        .check(
            "should return an error when invoking a function passing a malformed json string",
            async {
                let body = format!(
                    r#"{{"function": "{}", "namespace": "{}", "args": {{"name":"Some name",,,}}}}"#,
                    ctx.fixture.function, ctx.fixture.namespace
                );
                let response = ctx
                    .http
                    .post_raw(Endpoint::Invoke, "application/json", body)
                    .await?;
                expect_eq("invoke status", 400, response.status)?;
                expect_eq(
                    "invoke body",
                    error_body(&ctx.contract.malformed_json),
                    response.body,
                )?;
                ctx.delete().await
            },
        )
        .await;
}
