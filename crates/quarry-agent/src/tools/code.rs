//! Code execution tool.
//!
//! Forwards model-written code to the execution service. Soft failures
//! (tracebacks, timeouts, an unreachable service) come back in the
//! `errors` list rather than as a tool error, so the model can react.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use quarry_executor::ExecutorClient;

use crate::artifact::image_markers;
use crate::error::Result;
use crate::tool::{ParamExt, ParameterValidationError, Tool, ToolContext, ToolOutput};

/// Metadata key listing image paths printed by the code.
pub const IMAGES_METADATA_KEY: &str = "images";

/// Tool that runs Python (or bash, via a Python wrapper) in the sandbox.
#[derive(Debug, Clone)]
pub struct ExecuteCodeTool {
    client: Arc<ExecutorClient>,
}

impl ExecuteCodeTool {
    /// Create a tool backed by the given executor client.
    pub fn new(client: Arc<ExecutorClient>) -> Self {
        Self { client }
    }
}

/// Wrap a shell script so the Python sandbox runs it and relays its output.
fn wrap_bash(script: &str) -> String {
    let quoted = serde_json::to_string(script).unwrap_or_else(|_| "''".to_string());
    format!(
        "import subprocess\nimport sys\n\
         result = subprocess.run(['bash', '-c', {quoted}], capture_output=True, text=True)\n\
         print(result.stdout)\n\
         if result.stderr:\n    print(result.stderr, file=sys.stderr)\n\
         sys.exit(result.returncode)"
    )
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute Python code in a sandbox with read-only access to the analytics database. \
         Returns printed output as `results` and any tracebacks as `errors`. To return a chart, \
         save it under outputs/ and print a line `IMAGE:<relative path>`."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The code to execute"
                },
                "language": {
                    "type": "string",
                    "enum": ["python", "bash"],
                    "description": "Language of the code (default: python)"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let code = params.required_str("code", "provide the code to execute")?;
        let code = match params.optional_str("language").unwrap_or("python") {
            "python" => code.to_string(),
            "bash" => wrap_bash(code),
            other => {
                return Err(ParameterValidationError::invalid_value(
                    "language",
                    other,
                    "must be 'python' or 'bash'",
                )
                .into());
            }
        };

        let output = self.client.execute_code(&code).await;
        tracing::debug!(
            results = output.results.len(),
            errors = output.errors.len(),
            "Code executed"
        );

        let images: Vec<String> = output
            .results
            .iter()
            .flat_map(|line| image_markers(line))
            .collect();

        let mut tool_output = ToolOutput::new(json!({
            "results": output.results,
            "errors": output.errors,
        }));
        if !images.is_empty() {
            tool_output = tool_output.with_metadata(IMAGES_METADATA_KEY, json!(images));
        }
        Ok(tool_output)
    }
}
