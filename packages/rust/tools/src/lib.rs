//! Wrappers around the external command-line tools MetricCli drives.
//!
//! Each tool is an opaque subprocess: the tracker and requirements tools write
//! search results to a JSON file which is read back here, the upload tool
//! pushes a JSON file to the BI backend. Process execution goes through the
//! [`CommandRunner`] seam so the pipeline can be exercised without the real
//! programs installed.

mod requirements;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
mod tracker;
mod upload;

use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tracing::{debug, warn};

use metriccli_shared::{MetricCliError, Result, SearchResults};

pub use requirements::RequirementsTool;
pub use tracker::TrackerTool;
pub use upload::UploadTool;

// ---------------------------------------------------------------------------
// Runner seam
// ---------------------------------------------------------------------------

/// Captured result of one finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a program to completion and captures its output.
///
/// An `Err` means the program could not be started at all.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<ToolOutput>> + Send;
}

/// Runs real subprocesses via `tokio::process`. No timeout is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput> {
        debug!(program, ?args, "running external tool");

        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MetricCliError::tool(program, format!("failed to start: {e}")))?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Presence probe: `<program> --help` must start and exit 0.
pub(crate) async fn probe<R: CommandRunner>(runner: &R, program: &str) -> bool {
    match runner.run(program, &["--help".to_string()]).await {
        Ok(output) if output.success() => true,
        Ok(output) => {
            warn!(program, code = ?output.code, "{program} --help failed, treating as not installed");
            false
        }
        Err(e) => {
            warn!(program, error = %e, "{program} is not installed");
            false
        }
    }
}

/// Read a results file written by a tool. Unreadable or malformed files yield
/// empty results; the failure is logged.
pub(crate) fn read_results(path: &Path) -> SearchResults {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(?path, error = %e, "failed to read search results");
            return SearchResults::empty();
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => SearchResults::from_value(value),
        Err(e) => {
            tracing::error!(?path, error = %e, "search results are not valid JSON");
            SearchResults::empty()
        }
    }
}

/// Push `--field NAME` pairs in order.
pub(crate) fn push_fields(args: &mut Vec<String>, fields: &[String]) {
    for field in fields {
        args.push("--field".into());
        args.push(field.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedRunner, ScriptedTool};

    #[tokio::test]
    async fn probe_requires_successful_help() {
        let runner = ScriptedRunner::new()
            .with_tool("ok-tool", ScriptedTool::installed())
            .with_tool("broken", ScriptedTool::installed().with_help_exit(1));

        assert!(probe(&runner, "ok-tool").await);
        assert!(!probe(&runner, "broken").await);
        assert!(!probe(&runner, "absent").await);
    }

    #[test]
    fn read_results_tolerates_bad_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.json");
        assert!(read_results(&missing).is_empty());

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not json").expect("write");
        assert!(read_results(&garbage).is_empty());

        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"issues": [1, 2]}"#).expect("write");
        let results = read_results(&good);
        assert_eq!(results.pointer("/issues/1"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn push_fields_keeps_order() {
        let mut args = vec!["search".to_string()];
        push_fields(&mut args, &["status".into(), "assignee".into()]);
        assert_eq!(args, ["search", "--field", "status", "--field", "assignee"]);
    }

    #[tokio::test]
    async fn process_runner_reports_spawn_failure() {
        let err = ProcessRunner
            .run("metriccli-definitely-not-a-program", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MetricCliError::Tool { .. }));
    }
}
