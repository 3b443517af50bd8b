use std::path::{Path, PathBuf};

use color_eyre::eyre::{bail, Result, WrapErr};
use fl_common::{FunctionCreation, FunctionDeletion, FunctionInvocation};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionSource {
    /// Source text sent inline in a create request.
    Code(String),
    /// Compiled module uploaded by the CLI.
    Wasm(PathBuf),
}

/// Names, source and inputs shared by one suite's scenarios.
#[derive(Debug, Clone)]
pub struct FixtureContext {
    pub namespace: String,
    pub function: String,
    pub source: FunctionSource,
    pub image: String,
    pub args: Value,
}

impl FixtureContext {
    /// The JavaScript greeter used by the HTTP and SDK suites.
    pub fn hellojs(source: &Path) -> Result<Self> {
        let code = std::fs::read_to_string(source)
            .wrap_err_with(|| format!("Failed to read function source {}", source.display()))?;
        Ok(Self {
            namespace: "helloNS".to_string(),
            function: "hellojs".to_string(),
            source: FunctionSource::Code(code),
            image: "nodejs".to_string(),
            args: json!({"name": "Test"}),
        })
    }

    /// The compiled greeter used by the CLI suite, in the default module.
    pub fn hello_wasm(module: &Path) -> Self {
        Self {
            namespace: "_".to_string(),
            function: "hello_test".to_string(),
            source: FunctionSource::Wasm(module.to_path_buf()),
            image: String::new(),
            args: json!({"name": "Test"}),
        }
    }

    pub fn creation(&self) -> Result<FunctionCreation> {
        let FunctionSource::Code(code) = &self.source else {
            bail!("{} has no inline source to send", self.function);
        };
        Ok(FunctionCreation {
            name: self.function.clone(),
            namespace: self.namespace.clone(),
            code: code.clone(),
            image: self.image.clone(),
        })
    }

    pub fn deletion(&self) -> FunctionDeletion {
        FunctionDeletion {
            name: self.function.clone(),
            namespace: self.namespace.clone(),
        }
    }

    pub fn invocation(&self, args: Option<Value>) -> FunctionInvocation {
        FunctionInvocation {
            function: self.function.clone(),
            namespace: self.namespace.clone(),
            args,
        }
    }

    /// Same function addressed in a namespace that does not hold it.
    pub fn invocation_in_wrong_namespace(&self, args: Option<Value>) -> FunctionInvocation {
        FunctionInvocation {
            namespace: format!("{}_", self.namespace),
            ..self.invocation(args)
        }
    }

    pub fn args_string(&self) -> String {
        self.args.to_string()
    }

    /// Body of a successful create or delete.
    pub fn name_result(&self) -> String {
        json!({"result": self.function}).to_string()
    }
}

/// Payload the greeter functions return for `name`, or for no name at all.
pub fn greeting(name: Option<&str>) -> Value {
    json!({"payload": format!("Hello {}!", name.unwrap_or("World"))})
}

/// Body of a successful invocation wrapping `payload`.
pub fn invocation_result(payload: Value) -> String {
    json!({"result": payload}).to_string()
}

/// Body of a failed request.
pub fn error_body(message: &str) -> String {
    json!({"error": message}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_hellojs_fixture() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "function main(args) {{}}").unwrap();

        let fixture = FixtureContext::hellojs(file.path()).unwrap();
        let creation = fixture.creation().unwrap();
        assert_eq!(creation.code, "function main(args) {}");
        assert_eq!(creation.image, "nodejs");
        assert_eq!(fixture.name_result(), r#"{"result":"hellojs"}"#);
        assert_eq!(fixture.invocation_in_wrong_namespace(None).namespace, "helloNS_");
        assert_eq!(fixture.args_string(), r#"{"name":"Test"}"#);
    }

    #[test]
    fn test_missing_source() {
        assert!(FixtureContext::hellojs(Path::new("/nonexistent/hello.js")).is_err());
    }

    #[test]
    fn test_wasm_fixture_has_no_inline_code() {
        let fixture = FixtureContext::hello_wasm(Path::new("hello.wasm"));
        assert!(fixture.creation().is_err());
        assert_eq!(fixture.deletion().namespace, "_");
    }

    #[test]
    fn test_expected_bodies() {
        assert_eq!(
            invocation_result(greeting(None)),
            r#"{"result":{"payload":"Hello World!"}}"#
        );
        assert_eq!(
            invocation_result(greeting(Some("Test"))),
            r#"{"result":{"payload":"Hello Test!"}}"#
        );
        assert_eq!(error_body("bad"), r#"{"error":"bad"}"#);
    }
}
