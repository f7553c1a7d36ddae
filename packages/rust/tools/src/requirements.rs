//! Requirements tool CLI wrapper (`pyPolarionCli` by default).

use std::path::{Path, PathBuf};

use tracing::{error, info, instrument};

use metriccli_shared::{RequirementsConfig, Result, SearchResults};

use crate::{CommandRunner, push_fields, read_results};

/// Drives `<tool> ... search --output DIR`, then reads
/// `DIR/<project>_search_results.json` back.
pub struct RequirementsTool<'a, R> {
    runner: &'a R,
    program: &'a str,
}

impl<'a, R: CommandRunner> RequirementsTool<'a, R> {
    pub fn new(runner: &'a R, program: &'a str) -> Self {
        Self { runner, program }
    }

    pub fn program(&self) -> &str {
        self.program
    }

    pub async fn is_installed(&self) -> bool {
        crate::probe(self.runner, self.program).await
    }

    /// Where the tool writes results for `config` inside `output_dir`.
    pub fn results_path(config: &RequirementsConfig, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_search_results.json", config.project))
    }

    pub fn search_args(config: &RequirementsConfig, output_dir: &Path) -> Vec<String> {
        let mut args = match config.auth_token() {
            Some(token) => vec!["--token".to_string(), token.to_string()],
            None => vec![
                "--user".to_string(),
                config.username.clone(),
                "--password".into(),
                config.password.clone(),
            ],
        };
        args.extend([
            "--server".to_string(),
            config.server.clone(),
            "search".into(),
            "--project".into(),
            config.project.clone(),
            "--output".into(),
            output_dir.display().to_string(),
            "--query".into(),
            config.query.clone(),
        ]);
        push_fields(&mut args, &config.fields);
        args
    }

    /// Run a search. A nonzero exit yields empty results; `Err` only if the
    /// program could not be started.
    #[instrument(skip_all, fields(tool = self.program, project = %config.project))]
    pub async fn search(
        &self,
        config: &RequirementsConfig,
        output_dir: &Path,
    ) -> Result<SearchResults> {
        let args = Self::search_args(config, output_dir);
        let output = self.runner.run(self.program, &args).await?;

        if !output.success() {
            error!(code = ?output.code, stderr = %output.stderr.trim(), "requirements search failed");
            return Ok(SearchResults::empty());
        }

        let path = Self::results_path(config, output_dir);
        info!(?path, "requirements search finished");
        Ok(read_results(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedRunner, ScriptedTool};

    fn config() -> RequirementsConfig {
        RequirementsConfig::new("https://polarion.example.com", "MET")
            .with_credentials("alice", "pw")
            .with_query("type:requirement")
            .with_field("status")
    }

    #[test]
    fn password_auth_args() {
        let args = RequirementsTool::<ScriptedRunner>::search_args(&config(), Path::new("/tmp/out"));
        assert_eq!(
            args,
            [
                "--user", "alice", "--password", "pw", "--server",
                "https://polarion.example.com", "search", "--project", "MET",
                "--output", "/tmp/out", "--query", "type:requirement",
                "--field", "status",
            ]
        );
    }

    #[test]
    fn token_replaces_user_and_password() {
        let args = RequirementsTool::<ScriptedRunner>::search_args(
            &config().with_token("pat"),
            Path::new("/tmp/out"),
        );
        assert_eq!(&args[..2], ["--token", "pat"]);
        assert!(!args.contains(&"--user".to_string()));
    }

    #[test]
    fn results_path_is_named_after_project() {
        let path = RequirementsTool::<ScriptedRunner>::results_path(&config(), Path::new("/tmp/out"));
        assert_eq!(path, Path::new("/tmp/out/MET_search_results.json"));
    }

    #[tokio::test]
    async fn search_reads_project_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new().with_tool(
            "polarion",
            ScriptedTool::installed()
                .writes_project_results(serde_json::json!({"workitems": [{"id": "R-1"}]})),
        );

        let tool = RequirementsTool::new(&runner, "polarion");
        let results = tool.search(&config(), dir.path()).await.expect("search");
        assert_eq!(
            results.pointer("/workitems/0/id"),
            Some(&serde_json::json!("R-1"))
        );
    }
}
