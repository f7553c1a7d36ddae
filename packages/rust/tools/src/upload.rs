//! BI upload CLI wrapper (`pySupersetCli` by default).

use std::path::Path;

use tracing::{error, info, instrument};

use metriccli_shared::{MetricCliError, Result, UploadConfig, UploadProfile};

use crate::{CommandRunner, ToolOutput};

/// Drives `<tool> --verbose ... upload --file F`.
pub struct UploadTool<'a, R> {
    runner: &'a R,
    program: &'a str,
    profiles: &'a [UploadProfile],
}

/// Server and credentials after profile resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials<'c> {
    server: &'c str,
    user: &'c str,
    password: &'c str,
}

impl<'a, R: CommandRunner> UploadTool<'a, R> {
    /// `profiles` are the stored credentials an upload config may refer to.
    pub fn new(runner: &'a R, program: &'a str, profiles: &'a [UploadProfile]) -> Self {
        Self {
            runner,
            program,
            profiles,
        }
    }

    pub fn program(&self) -> &str {
        self.program
    }

    pub async fn is_installed(&self) -> bool {
        crate::probe(self.runner, self.program).await
    }

    fn credentials<'c>(&'c self, config: &'c UploadConfig) -> Result<Credentials<'c>> {
        match &config.profile {
            Some(name) => {
                let profile = self
                    .profiles
                    .iter()
                    .find(|p| &p.name == name)
                    .ok_or_else(|| MetricCliError::config(format!("unknown upload profile '{name}'")))?;
                Ok(Credentials {
                    server: &profile.server,
                    user: &profile.user,
                    password: &profile.password,
                })
            }
            None => Ok(Credentials {
                server: &config.server,
                user: &config.user,
                password: &config.password,
            }),
        }
    }

    /// Build the argument list; fails only if a named profile is unknown.
    pub fn upload_args(&self, config: &UploadConfig, input_file: &Path) -> Result<Vec<String>> {
        let creds = self.credentials(config)?;

        let mut args = vec![
            "--verbose".to_string(),
            "--server".into(),
            creds.server.to_string(),
            "--user".into(),
            creds.user.to_string(),
            "--password".into(),
            creds.password.to_string(),
        ];
        if config.basic_auth {
            args.push("--basic_auth".into());
        }
        if config.no_ssl {
            args.push("--no_ssl".into());
        }
        args.extend([
            "upload".to_string(),
            "--database".into(),
            config.database.clone(),
            "--table".into(),
            config.table.clone(),
            "--file".into(),
            input_file.display().to_string(),
        ]);
        Ok(args)
    }

    /// Upload `input_file`. The caller decides what a nonzero exit means.
    #[instrument(skip_all, fields(tool = self.program, table = %config.table))]
    pub async fn upload(&self, config: &UploadConfig, input_file: &Path) -> Result<ToolOutput> {
        let args = self.upload_args(config, input_file)?;
        info!(?input_file, "uploading metrics");

        let output = self.runner.run(self.program, &args).await?;
        if !output.success() {
            error!(code = ?output.code, stderr = %output.stderr.trim(), "upload failed");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedRunner, ScriptedTool};

    fn profiles() -> Vec<UploadProfile> {
        vec![UploadProfile {
            name: "prod".into(),
            server: "https://bi.prod".into(),
            user: "bot".into(),
            password: "s3cret".into(),
        }]
    }

    #[test]
    fn args_include_optional_flags() {
        let runner = ScriptedRunner::new();
        let tool = UploadTool::new(&runner, "superset", &[]);
        let config = UploadConfig::new("metrics", "weekly")
            .with_server("https://bi", "u", "p")
            .with_basic_auth(true)
            .with_no_ssl(true);

        let args = tool
            .upload_args(&config, Path::new("/tmp/m.json"))
            .expect("args");
        assert_eq!(
            args,
            [
                "--verbose", "--server", "https://bi", "--user", "u", "--password", "p",
                "--basic_auth", "--no_ssl", "upload", "--database", "metrics",
                "--table", "weekly", "--file", "/tmp/m.json",
            ]
        );
    }

    #[test]
    fn profile_supplies_credentials() {
        let runner = ScriptedRunner::new();
        let profiles = profiles();
        let tool = UploadTool::new(&runner, "superset", &profiles);
        let config = UploadConfig::new("metrics", "weekly")
            .with_server("ignored", "ignored", "ignored")
            .with_profile("prod");

        let args = tool
            .upload_args(&config, Path::new("/tmp/m.json"))
            .expect("args");
        assert_eq!(&args[1..7], ["--server", "https://bi.prod", "--user", "bot", "--password", "s3cret"]);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let runner = ScriptedRunner::new();
        let tool = UploadTool::new(&runner, "superset", &[]);
        let config = UploadConfig::new("metrics", "weekly").with_profile("staging");
        let err = tool
            .upload_args(&config, Path::new("/tmp/m.json"))
            .unwrap_err();
        assert!(err.to_string().contains("staging"));
    }

    #[tokio::test]
    async fn upload_returns_tool_output() {
        let runner = ScriptedRunner::new()
            .with_tool("superset", ScriptedTool::installed().with_exit(3, "table missing"));
        let tool = UploadTool::new(&runner, "superset", &[]);
        let output = tool
            .upload(&UploadConfig::new("db", "t"), Path::new("/tmp/m.json"))
            .await
            .expect("upload");
        assert!(!output.success());
        assert_eq!(output.stderr, "table missing");
    }
}
