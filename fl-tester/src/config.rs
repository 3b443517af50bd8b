use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{eyre, Result, WrapErr};
use fl_deploy::config::parse_bool_flag;
use fl_deploy::DeployConfig;

use crate::suite::DeployMethod;
use fl_cli_runner::FlCli;

const FUNCTIONS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../functions");

/// Error strings the platform under test is expected to return.
///
/// The wording has changed between platform revisions, so scenarios compare
/// against this table instead of literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformContract {
    pub invoke_not_found: String,
    pub bad_request: String,
    pub malformed_json: String,
    pub cli_not_found: String,
}

impl Default for PlatformContract {
    fn default() -> Self {
        Self {
            invoke_not_found: "Failed to invoke function: function not found in given namespace"
                .to_string(),
            bad_request: "Failed to perform operation: bad request".to_string(),
            malformed_json: "The provided body was not a valid JSON string".to_string(),
            cli_not_found: "fl: error: Not Found".to_string(),
        }
    }
}

impl PlatformContract {
    pub fn from_env() -> Self {
        let mut contract = Self::default();
        for (key, slot) in [
            ("FL_EXPECT_INVOKE_NOT_FOUND", &mut contract.invoke_not_found),
            ("FL_EXPECT_BAD_REQUEST", &mut contract.bad_request),
            ("FL_EXPECT_MALFORMED_JSON", &mut contract.malformed_json),
            ("FL_EXPECT_CLI_NOT_FOUND", &mut contract.cli_not_found),
        ] {
            if let Ok(value) = std::env::var(key) {
                *slot = value;
            }
        }
        contract
    }
}

#[derive(Debug, Clone)]
pub struct E2eConfig {
    /// Platform address for the HTTP and SDK suites.
    pub platform_host: Option<String>,
    /// Deploy locally before the HTTP and SDK suites.
    pub platform_deploy: bool,
    /// Gate for the CLI suite.
    pub cli_host: Option<String>,
    /// Deploy through `fl admin deploy docker` before the CLI suite.
    pub cli_deploy: bool,
    pub cli_startup_delay: Duration,
    pub js_source: PathBuf,
    pub wasm_source: PathBuf,
    pub rust_function: PathBuf,
    pub contract: PlatformContract,
}

impl E2eConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let functions = Path::new(FUNCTIONS_DIR);
        let cli_startup_delay = match std::env::var("FL_CLI_STARTUP_DELAY_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .wrap_err_with(|| format!("FL_CLI_STARTUP_DELAY_SECS: cannot parse '{raw}'"))?,
            ),
            Err(_) => Duration::from_secs(10),
        };

        Ok(Self {
            platform_host: non_empty_var("FL_TEST_HOST"),
            platform_deploy: flag("FL_TEST_DEPLOY", true)?,
            cli_host: non_empty_var("HOST"),
            cli_deploy: flag("DEPLOY", false)?,
            cli_startup_delay,
            js_source: path_var("FL_TEST_JS", functions.join("hello.js")),
            wasm_source: path_var("FL_TEST_WASM", functions.join("hello.wasm")),
            rust_function: path_var("FL_TEST_RUST_FN", functions.join("hello_rust")),
            contract: PlatformContract::from_env(),
        })
    }

    /// How the HTTP and SDK suites get a platform.
    pub fn platform_deploy_method(&self) -> Result<DeployMethod> {
        if !self.platform_deploy {
            return Ok(DeployMethod::External);
        }
        let config = DeployConfig::from_env().wrap_err("Invalid deployment configuration")?;
        Ok(DeployMethod::Direct(config))
    }

    /// How the CLI suite gets a platform.
    pub fn cli_deploy_method(&self, cli: &FlCli) -> DeployMethod {
        if self.cli_deploy {
            DeployMethod::Cli {
                cli: cli.clone(),
                startup_delay: self.cli_startup_delay,
            }
        } else {
            DeployMethod::External
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn path_var(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn flag(key: &str, default: bool) -> Result<bool> {
    match std::env::var(key) {
        Ok(value) => parse_bool_flag(&value).ok_or_else(|| eyre!("{key}: invalid flag '{value}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "FL_TEST_HOST",
        "FL_TEST_DEPLOY",
        "HOST",
        "DEPLOY",
        "FL_CLI_STARTUP_DELAY_SECS",
        "FL_TEST_WASM",
        "FL_EXPECT_INVOKE_NOT_FOUND",
    ];

    fn clear() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = E2eConfig::from_env().unwrap();
        assert!(config.platform_host.is_none());
        assert!(config.platform_deploy);
        assert!(config.cli_host.is_none());
        assert!(!config.cli_deploy);
        assert_eq!(config.cli_startup_delay, Duration::from_secs(10));
        assert!(config.js_source.ends_with("functions/hello.js"));
        assert_eq!(config.contract, PlatformContract::default());
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear();
        std::env::set_var("FL_TEST_HOST", "http://localhost:4000");
        std::env::set_var("DEPLOY", "t");
        std::env::set_var("HOST", "  ");
        std::env::set_var("FL_TEST_WASM", "/tmp/hello.wasm");
        std::env::set_var("FL_EXPECT_INVOKE_NOT_FOUND", "Not Found");
        let config = E2eConfig::from_env().unwrap();
        clear();

        assert_eq!(config.platform_host.as_deref(), Some("http://localhost:4000"));
        assert!(config.cli_deploy);
        assert!(config.cli_host.is_none());
        assert_eq!(config.wasm_source, PathBuf::from("/tmp/hello.wasm"));
        assert_eq!(config.contract.invoke_not_found, "Not Found");
    }

    #[test]
    #[serial]
    fn test_invalid_flag() {
        clear();
        std::env::set_var("FL_TEST_DEPLOY", "yes");
        let result = E2eConfig::from_env();
        clear();
        assert!(result.is_err());
    }
}
