//! Package installation tool.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use quarry_executor::ExecutorClient;

use crate::error::Result;
use crate::tool::{ParamExt, ParameterValidationError, Tool, ToolContext, ToolOutput};

/// Tool for installing a package into the sandbox environment.
#[derive(Debug, Clone)]
pub struct InstallPackageTool {
    client: Arc<ExecutorClient>,
}

impl InstallPackageTool {
    /// Create a new install tool.
    pub fn new(client: Arc<ExecutorClient>) -> Self {
        Self { client }
    }
}

/// Package specs are names with an optional version pin; anything that could
/// smuggle extra installer flags is refused.
fn validate_package(spec: &str) -> std::result::Result<(), ParameterValidationError> {
    let valid = !spec.is_empty()
        && !spec.starts_with('-')
        && spec
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.=<>~![],".contains(c));
    if valid {
        Ok(())
    } else {
        Err(ParameterValidationError::invalid_value(
            "package",
            spec,
            "expected a package name with an optional version specifier",
        ))
    }
}

#[async_trait]
impl Tool for InstallPackageTool {
    fn name(&self) -> &str {
        "install_package"
    }

    fn description(&self) -> &str {
        "Install a Python package into the sandbox, e.g. `statsmodels` or `pandas==2.2.2`."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "package": {
                    "type": "string",
                    "description": "Package name with an optional version specifier"
                }
            },
            "required": ["package"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let package = params.required_str("package", "provide the package to install")?;
        validate_package(package)?;

        tracing::info!(package = %package, "Installing package in sandbox");
        Ok(ToolOutput::new(self.client.install_package(package).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolRegistry;
    use crate::tools::test_support::{spawn_executor, unreachable_executor};
    use axum::{Json, Router, routing::post};

    #[test]
    fn test_validate_package() {
        assert!(validate_package("statsmodels").is_ok());
        assert!(validate_package("pandas==2.2.2").is_ok());
        assert!(validate_package("scikit-learn>=1.4").is_ok());
        assert!(validate_package("").is_err());
        assert!(validate_package("--index-url").is_err());
        assert!(validate_package("numpy; rm -rf /").is_err());
    }

    #[tokio::test]
    async fn test_install_forwards_package() {
        let router = Router::new().route(
            "/packages/install",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "installed": body["package"] }))
            }),
        );
        let tool = InstallPackageTool::new(spawn_executor(router).await);

        let output = tool
            .execute(json!({"package": "statsmodels"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(output.result["installed"], "statsmodels");
    }

    #[tokio::test]
    async fn test_invalid_package_reported_to_model() {
        let mut registry = ToolRegistry::new();
        registry.register(InstallPackageTool::new(unreachable_executor()));

        let (result, _) = registry
            .dispatch(
                "install_package",
                r#"{"package": "-e git+https://x"}"#,
                &ToolContext::default(),
            )
            .await;
        assert!(result["error"].as_str().unwrap().contains("package"));
    }
}
