//! Ask command - one-shot question answered in-process.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use base64::Engine;
use clap::Args;
use console::Style;
use futures::StreamExt;

use quarry_agent::{Entry, QueryEvent, QueryRequest, QueryResponse};

use super::Context;
use crate::runtime::Runtime;

/// Longest tool output echoed to the terminal.
const MAX_RESULT_PREVIEW: usize = 400;

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    #[arg(required = true)]
    pub prompt: String,

    /// Continue an existing session
    #[arg(short, long)]
    pub session: Option<String>,

    /// Maximum model calls for this question
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Write a generated chart to this file
    #[arg(long)]
    pub artifact_out: Option<PathBuf>,

    /// Print the final response as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    if args.prompt.trim().is_empty() {
        bail!("the question must not be empty");
    }

    let loaded = ctx.load_config()?;
    let base_dir = std::env::current_dir()?;
    let runtime = Runtime::build(&loaded.config, &base_dir).await?;

    if let Some(max_steps) = args.max_steps
        && (max_steps == 0 || max_steps > runtime.max_steps_limit)
    {
        bail!(
            "--max-steps must be between 1 and {}",
            runtime.max_steps_limit
        );
    }

    let mut request = QueryRequest::new(args.prompt);
    request.session_id = args.session;
    request.max_steps = args.max_steps;

    let mut events = runtime.orchestrator.handle_stream(request).await?;
    let mut response = None;

    while let Some(event) = events.next().await {
        match event? {
            QueryEvent::Step(step) => {
                if !args.json {
                    print_entry(&step.entry)?;
                }
            }
            QueryEvent::Done(done) => response = Some(done),
        }
    }

    let response = response.context("the run ended without a response")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    if let Some(ref path) = args.artifact_out {
        if write_artifact(&response, path)? {
            if !args.json {
                println!("Chart written to {}", path.display());
            }
        } else {
            eprintln!("warning: no chart was produced; {} not written", path.display());
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// How a line of step output is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Text,
    Tool,
    Error,
}

/// Terminal lines for one transcript entry.
fn entry_lines(entry: &Entry) -> Vec<(LineKind, String)> {
    match entry {
        // echo of the user's own question
        Entry::UserTurn { .. } => Vec::new(),
        Entry::AssistantTurn {
            content,
            tool_calls,
        } => {
            let mut lines = Vec::new();
            if let Some(text) = content.as_deref().filter(|t| !t.trim().is_empty()) {
                lines.push((LineKind::Text, text.to_string()));
            }
            for call in tool_calls {
                lines.push((LineKind::Tool, format!("[Running: {}]", call.name)));
            }
            lines
        }
        Entry::ToolResult { content, .. } => {
            let failed = serde_json::from_str::<serde_json::Value>(content)
                .map(|v| v.get("error").is_some())
                .unwrap_or(false);
            let kind = if failed { LineKind::Error } else { LineKind::Tool };
            vec![(kind, preview(content))]
        }
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= MAX_RESULT_PREVIEW {
        return content.to_string();
    }
    let head: String = content.chars().take(MAX_RESULT_PREVIEW).collect();
    format!("{}…", head)
}

fn print_entry(entry: &Entry) -> Result<()> {
    let dim = Style::new().dim();
    let red = Style::new().red();
    let mut stdout = std::io::stdout();

    for (kind, line) in entry_lines(entry) {
        match kind {
            LineKind::Text => writeln!(stdout, "{}", line)?,
            LineKind::Tool => writeln!(stdout, "{}", dim.apply_to(line))?,
            LineKind::Error => writeln!(stdout, "{}", red.apply_to(line))?,
        }
    }
    stdout.flush()?;
    Ok(())
}

fn print_response(response: &QueryResponse) {
    let bold = Style::new().bold();
    let dim = Style::new().dim();

    println!();
    println!("{}", bold.apply_to(&response.answer));
    println!();
    println!(
        "{}",
        dim.apply_to(format!(
            "session {} · {} step(s)",
            response.session_id, response.steps_taken
        ))
    );
    if let Some(ref error) = response.session_error {
        eprintln!("warning: session was not saved: {}", error);
    }
}

/// Decode the embedded chart into `path`. Returns `false` if there was none.
fn write_artifact(response: &QueryResponse, path: &Path) -> Result<bool> {
    let Some(ref encoded) = response.artifact_base64 else {
        return Ok(false);
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .context("artifact is not valid base64")?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}
