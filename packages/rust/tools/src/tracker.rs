//! Issue tracker CLI wrapper (`pyJiraCli` by default).

use std::path::Path;

use tracing::{error, info, instrument};

use metriccli_shared::{Result, SearchResults, TrackerConfig};

use crate::{CommandRunner, push_fields, read_results};

/// Drives `<tool> search ... --file F`, then reads `F` back.
pub struct TrackerTool<'a, R> {
    runner: &'a R,
    program: &'a str,
}

impl<'a, R: CommandRunner> TrackerTool<'a, R> {
    pub fn new(runner: &'a R, program: &'a str) -> Self {
        Self { runner, program }
    }

    pub fn program(&self) -> &str {
        self.program
    }

    pub async fn is_installed(&self) -> bool {
        crate::probe(self.runner, self.program).await
    }

    /// Build the `search` argument list for `config`, writing to `results_file`.
    pub fn search_args(config: &TrackerConfig, results_file: &Path) -> Vec<String> {
        let mut args = vec![
            "search".to_string(),
            "--server".into(),
            config.server.clone(),
            "--token".into(),
            config.token.clone(),
            config.filter.clone(),
            "--file".into(),
            results_file.display().to_string(),
            "--max".into(),
            config.max.to_string(),
        ];
        if config.full {
            args.push("--full".into());
        }
        push_fields(&mut args, &config.fields);
        args
    }

    /// Run a search. A nonzero exit yields empty results; `Err` only if the
    /// program could not be started.
    #[instrument(skip_all, fields(tool = self.program))]
    pub async fn search(&self, config: &TrackerConfig, results_file: &Path) -> Result<SearchResults> {
        let args = Self::search_args(config, results_file);
        let output = self.runner.run(self.program, &args).await?;

        if !output.success() {
            error!(code = ?output.code, stderr = %output.stderr.trim(), "tracker search failed");
            return Ok(SearchResults::empty());
        }

        info!(?results_file, "tracker search finished");
        Ok(read_results(results_file))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::scripted::{ScriptedRunner, ScriptedTool};

    fn config() -> TrackerConfig {
        TrackerConfig::new("https://jira.example.com", "tok")
            .with_filter("project = MET")
            .with_max(100)
            .with_field("status")
            .with_field("priority")
    }

    #[test]
    fn search_args_follow_cli_layout() {
        let args = TrackerTool::<ScriptedRunner>::search_args(&config(), &PathBuf::from("/tmp/r.json"));
        assert_eq!(
            args,
            [
                "search", "--server", "https://jira.example.com", "--token", "tok",
                "project = MET", "--file", "/tmp/r.json", "--max", "100",
                "--field", "status", "--field", "priority",
            ]
        );
    }

    #[test]
    fn full_flag_is_appended_when_set() {
        let args = TrackerTool::<ScriptedRunner>::search_args(
            &config().with_full(true),
            &PathBuf::from("/tmp/r.json"),
        );
        assert!(args.contains(&"--full".to_string()));
    }

    #[tokio::test]
    async fn search_reads_results_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("tracker.json");
        let runner = ScriptedRunner::new().with_tool(
            "jira",
            ScriptedTool::installed().writes_to_file_arg(serde_json::json!({"total": 2})),
        );

        let tool = TrackerTool::new(&runner, "jira");
        let results = tool.search(&config(), &file).await.expect("search");
        assert_eq!(results.pointer("/total"), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn nonzero_exit_yields_empty_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new().with_tool(
            "jira",
            ScriptedTool::installed().with_exit(1, "401 Unauthorized"),
        );

        let tool = TrackerTool::new(&runner, "jira");
        let results = tool
            .search(&config(), &dir.path().join("tracker.json"))
            .await
            .expect("search");
        assert!(results.is_empty());
    }
}
