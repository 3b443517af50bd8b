//! End-to-end suites for a FunLess platform.
//!
//! The same scenarios run over three surfaces: the raw HTTP API, the Rust
//! SDK and the `fl` command line. [`Suite`] owns the deployment around a run;
//! [`SuiteReport`] collects per-scenario outcomes so one failure does not hide
//! the rest.

pub mod config;
pub mod fixtures;
pub mod http;
pub mod scenarios;
pub mod suite;

pub use config::{E2eConfig, PlatformContract};
pub use fixtures::{FixtureContext, FunctionSource};
pub use http::{RawHttp, RawResponse};
pub use suite::{expect_eq, DeployMethod, Suite, SuiteReport};

use tracing_subscriber::EnvFilter;

/// Installs the error reporter and a test-friendly subscriber. Safe to call
/// from every test; only the first call has an effect.
pub fn init_tracing() {
    let _ = color_eyre::install();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
