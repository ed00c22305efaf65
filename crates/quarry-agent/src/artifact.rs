//! Image artifact extraction.
//!
//! Executed code signals a chart by printing a line `IMAGE:<relative-path>`.
//! After a run, [`ArtifactExtractor::process`] finds those markers in the
//! tool results, embeds the first referenced file as base64, and strips every
//! marker from the answer text. Only one image is embedded per response.

use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Line prefix that marks a generated image.
pub const IMAGE_MARKER: &str = "IMAGE:";

/// A final answer with its optional embedded image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedAnswer {
    /// Answer text with every image marker removed.
    pub answer: String,
    /// Base64 (standard alphabet, padded) file contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_base64: Option<String>,
    /// MIME type inferred from the file extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_mime: Option<String>,
}

/// Collect image paths from marker lines in `text`, in order.
pub fn image_markers(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix(IMAGE_MARKER))
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

/// Collect image paths from the `results` lines of each tool result.
pub fn image_paths_in_results(tool_results: &[Value]) -> Vec<String> {
    tool_results
        .iter()
        .filter_map(|result| result.get("results").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .flat_map(image_markers)
        .collect()
}

/// MIME type for an image path, by extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "image/png",
    }
}

/// Resolves image markers against a base directory and embeds the first.
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    base_dir: PathBuf,
}

impl ArtifactExtractor {
    /// Create an extractor resolving paths under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// The directory marker paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a marker path. Absolute paths and parent components are refused.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        let safe = path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        safe.then(|| self.base_dir.join(path))
    }

    /// Post-process a final answer. Never fails: any problem reading the
    /// image yields an answer without an artifact.
    pub async fn process(&self, answer: &str, tool_results: &[Value]) -> ProcessedAnswer {
        let paths = image_paths_in_results(tool_results);
        let Some(first) = paths.first() else {
            return ProcessedAnswer {
                answer: answer.to_string(),
                ..Default::default()
            };
        };

        tracing::debug!(count = paths.len(), first = %first, "Found image markers");

        let mut cleaned = answer.to_string();
        for path in &paths {
            cleaned = cleaned.replace(&format!("{IMAGE_MARKER}{path}"), "");
        }
        let cleaned = cleaned.trim().to_string();

        match self.encode(first).await {
            Some((data, mime)) => ProcessedAnswer {
                answer: cleaned,
                artifact_base64: Some(data),
                artifact_mime: Some(mime.to_string()),
            },
            None => ProcessedAnswer {
                answer: cleaned,
                ..Default::default()
            },
        }
    }

    async fn encode(&self, relative: &str) -> Option<(String, &'static str)> {
        let Some(full_path) = self.resolve(relative) else {
            tracing::warn!(path = %relative, "Refusing image path outside the artifact directory");
            return None;
        };

        match tokio::fs::read(&full_path).await {
            Ok(bytes) => {
                tracing::info!(path = %relative, bytes = bytes.len(), "Embedded image artifact");
                Some((STANDARD.encode(bytes), mime_for_path(&full_path)))
            }
            Err(e) => {
                tracing::warn!(path = %full_path.display(), error = %e, "Failed to read image artifact");
                None
            }
        }
    }
}
