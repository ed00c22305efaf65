//! Client for the sandboxed code-execution service.
//!
//! Quarry never runs model-written code itself. Code, file access, and
//! package installs are forwarded to an external execution service that
//! holds the sandbox and the read-only analytics database connection.
//!
//! # Protocol
//!
//! Every operation is a JSON `POST` to `<base_url>/<path>`:
//!
//! | Operation | Path | Request | Response |
//! |-----------|------|---------|----------|
//! | execute code | `execute` | `{code}` | `{results: [text], errors: [text]}` |
//! | read file | `files/read` | `{path}` | service-defined |
//! | write file | `files/write` | `{path, content}` | service-defined |
//! | list directory | `files/list` | `{path}` | service-defined |
//! | search | `files/search` | `{pattern, path?}` | service-defined |
//! | glob | `files/glob` | `{pattern}` | service-defined |
//! | install package | `packages/install` | `{package}` | service-defined |
//!
//! # Example
//!
//! ```no_run
//! use quarry_executor::{ExecutorClient, ExecutorConfig};
//!
//! # async fn run() -> Result<(), quarry_executor::ExecutorError> {
//! let client = ExecutorClient::new(ExecutorConfig::new("http://localhost:8000"))?;
//! let output = client.execute_code("SELECT count(*) FROM orders").await;
//! if !output.is_ok() {
//!     eprintln!("errors: {:?}", output.errors);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;

pub use client::{ExecutionOutput, ExecutorClient, Operation};
pub use config::{DEFAULT_EXECUTOR_URL, ExecutorConfig};
pub use error::{ExecutorError, ExecutorResult};
