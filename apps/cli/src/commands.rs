//! CLI definition, tracing setup, and the run entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use metriccli_adapter::{MANIFEST_EXTENSIONS, ManifestFormat};
use metriccli_core::{Pipeline, run_guarded};
use metriccli_shared::{AppSettings, RunStatus, load_settings, load_settings_from};
use metriccli_tools::ProcessRunner;
use tracing::{error, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MetricCli: push tracker and requirements metrics to a dashboard.
#[derive(Parser, Debug)]
#[command(
    name = "metriccli",
    version,
    about = "Collect metrics from issue tracking tools through an adapter and upload them.",
    long_about = None,
    after_help = "Exit codes: 0 ok, 1 error, 2 bad arguments, 3 invalid argument, \
                  4/5 tracker/requirements handler error, 6 upload error, \
                  7/8/9 tracker/requirements/upload tool not installed.",
)]
pub(crate) struct Cli {
    /// Adapter file (.toml or .json) describing what to query and upload.
    #[arg(short = 'c', long = "config-file", alias = "config_file", value_name = "ADAPTER")]
    pub config_file: PathBuf,

    /// Verbosity level: -v enables info and warning logs, -vv debug, -vvv trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Settings file naming the external tools and upload profiles
    /// (defaults to ~/.metriccli/metriccli.toml).
    #[arg(long, env = "METRICCLI_SETTINGS", value_name = "FILE")]
    pub settings: Option<PathBuf>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Default filter directive for a verbosity count.
fn filter_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing based on CLI flags. `RUST_LOG` takes precedence.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(cli.verbose)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Check the adapter path has a recognized extension.
fn check_adapter_path(path: &Path) -> std::result::Result<(), String> {
    match ManifestFormat::from_path(path) {
        Some(_) => Ok(()),
        None => Err(format!(
            "invalid adapter file '{}', expected one of: {}",
            path.display(),
            MANIFEST_EXTENSIONS
                .iter()
                .map(|ext| format!(".{ext}"))
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

fn resolve_settings(explicit: Option<&Path>) -> Result<AppSettings> {
    match explicit {
        Some(path) => load_settings_from(path)
            .wrap_err_with(|| format!("cannot load settings from {}", path.display())),
        None => load_settings().wrap_err("cannot load default settings"),
    }
}

/// Run one metrics collection. Settings failures surface as an error report;
/// everything else is expressed as a [`RunStatus`].
pub(crate) async fn run(cli: Cli) -> Result<RunStatus> {
    info!(
        config_file = %cli.config_file.display(),
        verbose = cli.verbose,
        log_format = ?cli.log_format,
        settings = ?cli.settings,
        "program arguments"
    );

    if let Err(message) = check_adapter_path(&cli.config_file) {
        error!("{message}");
        return Ok(RunStatus::InvalidArgument);
    }

    let settings = resolve_settings(cli.settings.as_deref())?;
    let pipeline = Arc::new(Pipeline::new(ProcessRunner, settings));

    let status = run_guarded(pipeline, cli.config_file).await;
    info!(%status, "done");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_file_is_required() {
        let err = Cli::try_parse_from(["metriccli"]).unwrap_err();
        assert_eq!(err.exit_code(), i32::from(RunStatus::ArgParse.code()));
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from(["metriccli", "-c", "adapter.toml", "-vv"]).expect("parse");
        assert_eq!(cli.config_file, PathBuf::from("adapter.toml"));
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["metriccli", "--config_file", "a.json"]).expect("parse");
        assert_eq!(cli.config_file, PathBuf::from("a.json"));
    }

    #[test]
    fn verbosity_maps_to_filters() {
        assert_eq!(filter_for(0), "error");
        assert_eq!(filter_for(1), "info");
        assert_eq!(filter_for(2), "debug");
        assert_eq!(filter_for(9), "trace");
    }

    #[test]
    fn adapter_extension_is_checked() {
        assert!(check_adapter_path(Path::new("adapter.toml")).is_ok());
        assert!(check_adapter_path(Path::new("dir/adapter.json")).is_ok());
        let err = check_adapter_path(Path::new("adapter.py")).unwrap_err();
        assert!(err.contains(".toml, .json"));
    }

    #[tokio::test]
    async fn bad_extension_is_invalid_argument() {
        let cli = Cli::try_parse_from(["metriccli", "-c", "adapter.yaml"]).expect("parse");
        assert_eq!(run(cli).await.expect("run"), RunStatus::InvalidArgument);
    }
}
