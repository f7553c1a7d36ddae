//! Load an adapter manifest from disk and validate it.
//!
//! Validation is an ordered capability probe that stops at the first gap:
//!
//! 1. the file declares an `[adapter]` of a supported API version;
//! 2. it has an `[output]` accumulator;
//! 3. it has `[tracker]`, `[requirements]` and `[upload]` configs, and the
//!    requirements `project` is usable as a file name;
//! 4. both result handlers are declared and resolve in the registry;
//! 5. the `output` keys are unique once lower-cased;
//! 6. every `output` value is representable in JSON (no NaN or infinity).

use std::path::{Component, Path, PathBuf};

use tracing::{error, info, instrument};

use crate::handlers::{HandlerRegistry, ResultHandler};
use crate::manifest::{AdapterManifest, HandlerDecl, ManifestFormat, SUPPORTED_API_VERSION};
use crate::{Adapter, ManifestAdapter};

/// Why an adapter could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("adapter file not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported adapter file format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("failed to read adapter file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse adapter file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("no [adapter] declared")]
    AdapterMissing,

    #[error("adapter api_version {found} is not supported (expected {supported})")]
    UnsupportedApiVersion { found: u32, supported: u32 },

    #[error("adapter has no [output] accumulator")]
    MissingOutput,

    #[error("adapter has no [{0}] configuration")]
    MissingConfig(&'static str),

    #[error("requirements project '{0}' cannot be used as a file name")]
    InvalidProject(String),

    #[error("adapter declares no {0} results handler")]
    MissingHandler(&'static str),

    #[error("{slot} handler kind '{kind}' is not registered")]
    UnknownHandler { slot: &'static str, kind: String },

    #[error("{slot} handler '{kind}' is misconfigured: {message}")]
    InvalidHandler {
        slot: &'static str,
        kind: String,
        message: String,
    },

    #[error("output keys are not unique ignoring case: {0:?}")]
    DuplicateKeys(Vec<String>),

    #[error("output values are not finite numbers: {0:?}")]
    NonFiniteValues(Vec<String>),
}

/// Read, parse and validate the adapter manifest at `path`.
///
/// Every failure is logged before it is returned; callers only need to know
/// that no usable adapter exists.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_adapter(
    path: &Path,
    registry: &HandlerRegistry,
) -> Result<Box<dyn Adapter>, LoadError> {
    let result = read_manifest(path).and_then(|manifest| validate_manifest(manifest, registry));

    match result {
        Ok(adapter) => {
            info!(adapter = adapter.name(), "adapter loaded");
            Ok(Box::new(adapter))
        }
        Err(e) => {
            error!(error = %e, "adapter rejected");
            Err(e)
        }
    }
}

fn read_manifest(path: &Path) -> Result<AdapterManifest, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let format =
        ManifestFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    AdapterManifest::parse(&content, format).map_err(|message| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Run the capability probe over a parsed manifest.
pub fn validate_manifest(
    manifest: AdapterManifest,
    registry: &HandlerRegistry,
) -> Result<ManifestAdapter, LoadError> {
    let header = manifest.adapter.ok_or(LoadError::AdapterMissing)?;
    if header.api_version != SUPPORTED_API_VERSION {
        return Err(LoadError::UnsupportedApiVersion {
            found: header.api_version,
            supported: SUPPORTED_API_VERSION,
        });
    }

    let output = manifest.output.ok_or(LoadError::MissingOutput)?;

    let tracker = manifest.tracker.ok_or(LoadError::MissingConfig("tracker"))?;
    let requirements = manifest
        .requirements
        .ok_or(LoadError::MissingConfig("requirements"))?;
    let upload = manifest.upload.ok_or(LoadError::MissingConfig("upload"))?;
    if !is_file_stem(&requirements.project) {
        return Err(LoadError::InvalidProject(requirements.project));
    }

    let tracker_decl = manifest
        .handlers
        .tracker
        .ok_or(LoadError::MissingHandler("tracker"))?;
    let requirements_decl = manifest
        .handlers
        .requirements
        .ok_or(LoadError::MissingHandler("requirements"))?;
    let tracker_handler = resolve_handler(registry, "tracker", &tracker_decl)?;
    let requirements_handler = resolve_handler(registry, "requirements", &requirements_decl)?;

    let duplicates = output.case_insensitive_duplicates();
    if !duplicates.is_empty() {
        return Err(LoadError::DuplicateKeys(duplicates));
    }

    let non_finite: Vec<String> = output
        .iter()
        .filter(|(_, value)| !value.is_finite())
        .map(|(key, _)| key.to_string())
        .collect();
    if !non_finite.is_empty() {
        return Err(LoadError::NonFiniteValues(non_finite));
    }

    Ok(ManifestAdapter {
        name: header.name,
        output,
        tracker,
        requirements,
        upload,
        tracker_handler,
        requirements_handler,
    })
}

/// The requirements tool names its results file after the project, so the
/// project must stay a single plain path component. Empty is allowed; the
/// stage is then normally skipped by an empty query.
fn is_file_stem(project: &str) -> bool {
    if project.is_empty() {
        return true;
    }
    if project.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(project).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn resolve_handler(
    registry: &HandlerRegistry,
    slot: &'static str,
    decl: &HandlerDecl,
) -> Result<Box<dyn ResultHandler>, LoadError> {
    match registry.build(&decl.kind, &decl.params) {
        None => Err(LoadError::UnknownHandler {
            slot,
            kind: decl.kind.clone(),
        }),
        Some(Err(message)) => Err(LoadError::InvalidHandler {
            slot,
            kind: decl.kind.clone(),
            message,
        }),
        Some(Ok(handler)) => Ok(handler),
    }
}

#[cfg(test)]
mod tests {
    use metriccli_shared::{MetricValue, SearchResults};

    use super::*;

    const VALID: &str = r#"
[adapter]
name = "team"

[output]
open = 0
Closed = 0

[tracker]
server = "https://jira.example.com"
token = "t"
filter = "project = MET"

[requirements]
server = "https://polarion.example.com"
project = "MET"

[upload]
server = "https://bi.example.com"
database = "metrics"
table = "weekly"

[handlers.tracker]
kind = "count"
key = "open"

[handlers.requirements]
kind = "noop"
"#;

    fn parse(text: &str) -> AdapterManifest {
        AdapterManifest::parse(text, ManifestFormat::Toml).expect("parse")
    }

    fn without_section(section: &str) -> AdapterManifest {
        let mut manifest = parse(VALID);
        match section {
            "adapter" => manifest.adapter = None,
            "output" => manifest.output = None,
            "tracker" => manifest.tracker = None,
            "requirements" => manifest.requirements = None,
            "upload" => manifest.upload = None,
            "handlers.tracker" => manifest.handlers.tracker = None,
            "handlers.requirements" => manifest.handlers.requirements = None,
            other => panic!("unknown section {other}"),
        }
        manifest
    }

    fn validate(manifest: AdapterManifest) -> Result<ManifestAdapter, LoadError> {
        validate_manifest(manifest, &HandlerRegistry::new())
    }

    #[test]
    fn valid_manifest_builds_adapter() {
        let mut adapter = validate(parse(VALID)).expect("valid");
        assert_eq!(adapter.name(), "team");
        assert_eq!(adapter.tracker_config().filter, "project = MET");
        assert_eq!(adapter.upload_config().table, "weekly");

        let results = SearchResults::from_value(serde_json::json!({"issues": [1, 2]}));
        assert!(adapter.handle_tracker_results(&results));
        assert!(adapter.handle_requirements_results(&SearchResults::empty()));
        assert_eq!(adapter.output().get("open"), Some(&MetricValue::Integer(2)));
    }

    #[test]
    fn each_missing_capability_is_named() {
        assert!(matches!(
            validate(without_section("adapter")),
            Err(LoadError::AdapterMissing)
        ));
        assert!(matches!(
            validate(without_section("output")),
            Err(LoadError::MissingOutput)
        ));
        assert!(matches!(
            validate(without_section("tracker")),
            Err(LoadError::MissingConfig("tracker"))
        ));
        assert!(matches!(
            validate(without_section("requirements")),
            Err(LoadError::MissingConfig("requirements"))
        ));
        assert!(matches!(
            validate(without_section("upload")),
            Err(LoadError::MissingConfig("upload"))
        ));
        assert!(matches!(
            validate(without_section("handlers.tracker")),
            Err(LoadError::MissingHandler("tracker"))
        ));
        assert!(matches!(
            validate(without_section("handlers.requirements")),
            Err(LoadError::MissingHandler("requirements"))
        ));
    }

    #[test]
    fn probe_stops_at_first_gap() {
        let mut manifest = without_section("output");
        manifest.upload = None;
        assert!(matches!(validate(manifest), Err(LoadError::MissingOutput)));
    }

    #[test]
    fn wrong_api_version_is_rejected() {
        let text = VALID.replace("name = \"team\"", "name = \"team\"\napi_version = 2");
        assert!(matches!(
            validate(parse(&text)),
            Err(LoadError::UnsupportedApiVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn duplicate_keys_rejected_even_when_complete() {
        let text = VALID.replace("Closed = 0", "Closed = 0\nOPEN = 1");
        match validate(parse(&text)) {
            Err(LoadError::DuplicateKeys(keys)) => assert_eq!(keys, vec!["open".to_string()]),
            other => panic!("expected duplicate keys, got {other:?}"),
        }
    }

    #[test]
    fn project_must_be_a_plain_file_name() {
        for bad in ["../etc", "a/b", "..", ".", "a\\b"] {
            let text = VALID.replace("project = \"MET\"", &format!("project = '{bad}'"));
            match validate(parse(&text)) {
                Err(LoadError::InvalidProject(project)) => assert_eq!(project, bad),
                other => panic!("expected invalid project for {bad:?}, got {other:?}"),
            }
        }

        let text = VALID.replace("project = \"MET\"", "project = \"MET-2.x\"");
        assert!(validate(parse(&text)).is_ok());
    }

    #[test]
    fn non_finite_output_values_are_rejected() {
        let text = VALID.replace("open = 0", "open = nan\nratio = inf");
        match validate(parse(&text)) {
            Err(LoadError::NonFiniteValues(keys)) => assert_eq!(keys, ["open", "ratio"]),
            other => panic!("expected non-finite values, got {other:?}"),
        }
    }

    #[test]
    fn unknown_and_invalid_handlers() {
        let text = VALID.replace("kind = \"noop\"", "kind = \"script\"");
        assert!(matches!(
            validate(parse(&text)),
            Err(LoadError::UnknownHandler { slot: "requirements", .. })
        ));

        let text = VALID.replace("key = \"open\"", "");
        assert!(matches!(
            validate(parse(&text)),
            Err(LoadError::InvalidHandler { slot: "tracker", .. })
        ));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("adapter.toml");
        std::fs::write(&path, VALID).expect("write");

        let adapter = load_adapter(&path, &HandlerRegistry::new()).expect("load");
        assert_eq!(adapter.name(), "team");
    }

    #[test]
    fn load_reports_missing_file_and_bad_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = HandlerRegistry::new();

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_adapter(&missing, &registry),
            Err(LoadError::NotFound(_))
        ));

        let script = dir.path().join("adapter.py");
        std::fs::write(&script, "class Adapter: pass").expect("write");
        assert!(matches!(
            load_adapter(&script, &registry),
            Err(LoadError::UnsupportedFormat(_))
        ));

        let broken = dir.path().join("adapter.json");
        std::fs::write(&broken, "{ not json").expect("write");
        assert!(matches!(
            load_adapter(&broken, &registry),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn demo_adapter_validates() {
        let adapter = load_adapter(
            Path::new("../../../demos/adapter.toml"),
            &HandlerRegistry::new(),
        )
        .expect("demo adapter");
        assert_eq!(adapter.name(), "team-metrics");
        assert_eq!(adapter.upload_config().profile.as_deref(), Some("superset-prod"));
    }
}
