//! Adapter contract, manifest schema, handler registry and loader.
//!
//! An adapter owns the metrics accumulator and the three tool configurations,
//! and turns each tool's search results into accumulator entries. Adapters
//! are declared in a manifest file chosen at run time; their behaviour comes
//! from handlers compiled into the [`HandlerRegistry`].

pub mod handlers;
pub mod loader;
pub mod manifest;

use metriccli_shared::{
    Accumulator, RequirementsConfig, SearchResults, TrackerConfig, UploadConfig,
};

pub use handlers::{HandlerFactory, HandlerParams, HandlerRegistry, ResultHandler};
pub use loader::{LoadError, load_adapter, validate_manifest};
pub use manifest::{AdapterManifest, MANIFEST_EXTENSIONS, ManifestFormat, SUPPORTED_API_VERSION};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The capability set every adapter provides to the pipeline.
///
/// Handlers mutate only the adapter's own accumulator. The pipeline reads the
/// configurations and takes the accumulator once, at the end of the run.
pub trait Adapter: Send {
    /// Human-readable adapter name for tracing.
    fn name(&self) -> &str;

    fn output(&self) -> &Accumulator;

    fn tracker_config(&self) -> &TrackerConfig;

    fn requirements_config(&self) -> &RequirementsConfig;

    fn upload_config(&self) -> &UploadConfig;

    /// Handle tracker search results. `false` aborts the run.
    fn handle_tracker_results(&mut self, results: &SearchResults) -> bool;

    /// Handle requirements search results. `false` aborts the run.
    fn handle_requirements_results(&mut self, results: &SearchResults) -> bool;

    /// Give up the accumulator for finalization.
    fn into_output(self: Box<Self>) -> Accumulator;
}

// ---------------------------------------------------------------------------
// Manifest-backed adapter
// ---------------------------------------------------------------------------

/// An adapter assembled from a validated manifest.
pub struct ManifestAdapter {
    name: String,
    output: Accumulator,
    tracker: TrackerConfig,
    requirements: RequirementsConfig,
    upload: UploadConfig,
    tracker_handler: Box<dyn ResultHandler>,
    requirements_handler: Box<dyn ResultHandler>,
}

impl std::fmt::Debug for ManifestAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestAdapter")
            .field("name", &self.name)
            .field("output", &self.output)
            .field("tracker_handler", &self.tracker_handler.kind())
            .field("requirements_handler", &self.requirements_handler.kind())
            .finish_non_exhaustive()
    }
}

impl Adapter for ManifestAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn output(&self) -> &Accumulator {
        &self.output
    }

    fn tracker_config(&self) -> &TrackerConfig {
        &self.tracker
    }

    fn requirements_config(&self) -> &RequirementsConfig {
        &self.requirements
    }

    fn upload_config(&self) -> &UploadConfig {
        &self.upload
    }

    fn handle_tracker_results(&mut self, results: &SearchResults) -> bool {
        tracing::info!(handler = self.tracker_handler.kind(), "handling tracker results");
        self.tracker_handler.handle(results, &mut self.output)
    }

    fn handle_requirements_results(&mut self, results: &SearchResults) -> bool {
        tracing::info!(
            handler = self.requirements_handler.kind(),
            "handling requirements results"
        );
        self.requirements_handler.handle(results, &mut self.output)
    }

    fn into_output(self: Box<Self>) -> Accumulator {
        self.output
    }
}
