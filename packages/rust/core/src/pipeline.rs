//! End-to-end metrics run: adapter → tracker → requirements → persist → upload.
//!
//! Stages run strictly in order and the first failure halts the run with its
//! own [`RunStatus`]. Everything written during a run lives in one temporary
//! directory that is removed when the run ends, on success, on any halt, and
//! while unwinding from a panic. A process killed by a signal may leave it
//! behind; no signal handling is installed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempDir;
use tracing::{error, info, instrument, warn};

use metriccli_adapter::{Adapter, HandlerRegistry, LoadError, load_adapter};
use metriccli_shared::{
    AppSettings, MetricCliError, RequirementsConfig, RunId, RunStatus, ToolsConfig, TrackerConfig,
    UploadConfig, UploadProfile,
};
use metriccli_tools::{CommandRunner, RequirementsTool, TrackerTool, UploadTool};

use crate::persist::{RECORD_FILE_NAME, persist_record};

/// Name of the tracker results file inside the tracker's working directory.
pub const TRACKER_RESULTS_FILE_NAME: &str = "tracker_search_results.json";

/// Per-tool working directories inside the run's temporary directory. Each
/// tool only ever writes into its own, so result paths cannot collide.
pub const TRACKER_DIR_NAME: &str = "tracker";
pub const REQUIREMENTS_DIR_NAME: &str = "requirements";

/// Prefix of the per-run temporary directory.
const TEMP_DIR_PREFIX: &str = "metriccli-";

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// Why a run halted. Each variant maps to exactly one [`RunStatus`].
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("no usable adapter: {0}")]
    AdapterLoad(#[from] LoadError),

    #[error("failed to create temporary storage: {0}")]
    TempStorage(std::io::Error),

    #[error("tracker tool '{0}' is not installed")]
    TrackerNotInstalled(String),

    #[error("requirements tool '{0}' is not installed")]
    RequirementsNotInstalled(String),

    #[error("upload tool '{0}' is not installed")]
    UploadNotInstalled(String),

    #[error("adapter failed to handle tracker results")]
    TrackerHandler,

    #[error("adapter failed to handle requirements results")]
    RequirementsHandler,

    #[error("external tool failed: {0}")]
    Tool(MetricCliError),

    #[error("failed to persist metrics: {0}")]
    Persist(MetricCliError),

    #[error("upload rejected: {0}")]
    UploadRejected(MetricCliError),

    #[error("upload tool exited with {0:?}")]
    UploadFailed(Option<i32>),
}

impl StageError {
    pub fn status(&self) -> RunStatus {
        match self {
            Self::AdapterLoad(_) | Self::TempStorage(_) | Self::Tool(_) | Self::Persist(_) => {
                RunStatus::Error
            }
            Self::TrackerNotInstalled(_) => RunStatus::TrackerNotInstalled,
            Self::RequirementsNotInstalled(_) => RunStatus::RequirementsNotInstalled,
            Self::UploadNotInstalled(_) => RunStatus::UploadNotInstalled,
            Self::TrackerHandler => RunStatus::TrackerHandler,
            Self::RequirementsHandler => RunStatus::RequirementsHandler,
            Self::UploadRejected(_) | Self::UploadFailed(_) => RunStatus::Upload,
        }
    }
}

type StageResult<T = ()> = std::result::Result<T, StageError>;

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything a run needs besides the adapter itself.
pub struct Pipeline<R> {
    runner: R,
    tools: ToolsConfig,
    profiles: Vec<UploadProfile>,
    registry: HandlerRegistry,
    temp_root: Option<PathBuf>,
}

impl<R: CommandRunner> Pipeline<R> {
    /// A pipeline using `runner` for subprocesses and the built-in handlers.
    pub fn new(runner: R, settings: AppSettings) -> Self {
        Self {
            runner,
            tools: settings.tools,
            profiles: settings.profiles,
            registry: HandlerRegistry::new(),
            temp_root: None,
        }
    }

    /// Replace the handler registry adapters are resolved against.
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Create the per-run temporary directory under `root` instead of the
    /// system temp directory.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Load the adapter at `adapter_path` and run every stage.
    #[instrument(skip_all, fields(run_id = %RunId::new(), adapter = %adapter_path.display()))]
    pub async fn run(&self, adapter_path: &Path) -> RunStatus {
        let adapter = match load_adapter(adapter_path, &self.registry) {
            Ok(adapter) => adapter,
            Err(e) => return halt(StageError::from(e)),
        };
        self.execute(adapter).await
    }

    /// Run every stage with an already-loaded adapter.
    pub async fn execute(&self, adapter: Box<dyn Adapter>) -> RunStatus {
        let start = Instant::now();
        info!(adapter = adapter.name(), "starting metrics run");

        match self.execute_stages(adapter).await {
            Ok(()) => {
                info!(elapsed_ms = start.elapsed().as_millis() as u64, "metrics run finished");
                RunStatus::Ok
            }
            Err(e) => halt(e),
        }
    }

    async fn execute_stages(&self, mut adapter: Box<dyn Adapter>) -> StageResult {
        // Owned copies so no borrow of the adapter is held across an await.
        let tracker = adapter.tracker_config().clone();
        let requirements = adapter.requirements_config().clone();
        let upload = adapter.upload_config().clone();

        // Removed on drop, whichever way this function exits.
        let temp_dir = self.create_temp_dir()?;
        info!(path = %temp_dir.path().display(), "created temporary storage");

        let tracker_dir = stage_dir(temp_dir.path(), TRACKER_DIR_NAME)?;
        let requirements_dir = stage_dir(temp_dir.path(), REQUIREMENTS_DIR_NAME)?;

        self.query_tracker(adapter.as_mut(), &tracker, &tracker_dir)
            .await?;
        self.query_requirements(adapter.as_mut(), &requirements, &requirements_dir)
            .await?;

        let record_path = temp_dir.path().join(RECORD_FILE_NAME);
        let record = persist_record(adapter.into_output(), &record_path).map_err(StageError::Persist)?;
        info!(keys = record.len(), path = %record_path.display(), "metrics record persisted");

        self.upload(&upload, &record_path).await
    }

    fn create_temp_dir(&self) -> StageResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_DIR_PREFIX);
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(StageError::TempStorage)
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    #[instrument(skip_all, name = "tracker")]
    async fn query_tracker(
        &self,
        adapter: &mut dyn Adapter,
        config: &TrackerConfig,
        work_dir: &Path,
    ) -> StageResult {
        if !config.is_enabled() {
            info!("tracker filter is empty, skipping tracker stage");
            return Ok(());
        }

        let tool = TrackerTool::new(&self.runner, &self.tools.tracker);
        if !tool.is_installed().await {
            return Err(StageError::TrackerNotInstalled(tool.program().to_string()));
        }

        let results_file = work_dir.join(TRACKER_RESULTS_FILE_NAME);
        let results = tool
            .search(config, &results_file)
            .await
            .map_err(StageError::Tool)?;

        if !adapter.handle_tracker_results(&results) {
            return Err(StageError::TrackerHandler);
        }
        Ok(())
    }

    #[instrument(skip_all, name = "requirements")]
    async fn query_requirements(
        &self,
        adapter: &mut dyn Adapter,
        config: &RequirementsConfig,
        work_dir: &Path,
    ) -> StageResult {
        if !config.is_enabled() {
            info!("requirements query is empty, skipping requirements stage");
            return Ok(());
        }

        let tool = RequirementsTool::new(&self.runner, &self.tools.requirements);
        if !tool.is_installed().await {
            return Err(StageError::RequirementsNotInstalled(
                tool.program().to_string(),
            ));
        }

        let results = tool
            .search(config, work_dir)
            .await
            .map_err(StageError::Tool)?;

        if !adapter.handle_requirements_results(&results) {
            return Err(StageError::RequirementsHandler);
        }
        Ok(())
    }

    #[instrument(skip_all, name = "upload")]
    async fn upload(&self, config: &UploadConfig, record_path: &Path) -> StageResult {
        let tool = UploadTool::new(&self.runner, &self.tools.upload, &self.profiles);
        if !tool.is_installed().await {
            return Err(StageError::UploadNotInstalled(tool.program().to_string()));
        }

        let output = tool
            .upload(config, record_path)
            .await
            .map_err(StageError::UploadRejected)?;

        if !output.success() {
            return Err(StageError::UploadFailed(output.code));
        }
        info!("upload finished");
        Ok(())
    }
}

fn stage_dir(temp_dir: &Path, name: &str) -> StageResult<PathBuf> {
    let dir = temp_dir.join(name);
    std::fs::create_dir(&dir).map_err(StageError::TempStorage)?;
    Ok(dir)
}

fn halt(err: StageError) -> RunStatus {
    let status = err.status();
    error!(%status, error = %err, "metrics run halted");
    status
}

/// Run the pipeline on its own task so a panic anywhere in it, including in
/// an adapter handler, ends the run with [`RunStatus::Error`].
pub async fn run_guarded<R>(pipeline: Arc<Pipeline<R>>, adapter_path: PathBuf) -> RunStatus
where
    R: CommandRunner + 'static,
{
    let task = tokio::spawn(async move { pipeline.run(&adapter_path).await });

    match task.await {
        Ok(status) => status,
        Err(e) if e.is_panic() => {
            error!("metrics run panicked");
            RunStatus::Error
        }
        Err(e) => {
            warn!(error = %e, "metrics run was cancelled");
            RunStatus::Error
        }
    }
}
