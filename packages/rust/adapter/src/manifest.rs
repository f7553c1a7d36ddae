//! On-disk adapter manifest schema.
//!
//! Every section is optional at parse time so the loader can report exactly
//! which capability a manifest lacks instead of a generic parse error.

use std::path::Path;

use serde::Deserialize;

use metriccli_shared::{Accumulator, RequirementsConfig, TrackerConfig, UploadConfig};

/// Manifest format version understood by this build.
pub const SUPPORTED_API_VERSION: u32 = 1;

/// Recognized manifest file extensions.
pub const MANIFEST_EXTENSIONS: &[&str] = &["toml", "json"];

/// Serialization format of a manifest, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    /// Format for `path`, or `None` if the extension is not recognized.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Raw adapter manifest as read from disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdapterManifest {
    /// `[adapter]` header. Its absence means the file declares no adapter.
    #[serde(default)]
    pub adapter: Option<AdapterHeader>,

    /// `[output]`: initial accumulator contents.
    #[serde(default)]
    pub output: Option<Accumulator>,

    #[serde(default)]
    pub tracker: Option<TrackerConfig>,

    #[serde(default)]
    pub requirements: Option<RequirementsConfig>,

    #[serde(default)]
    pub upload: Option<UploadConfig>,

    /// `[handlers.*]`: which registered handler processes each tool's results.
    #[serde(default)]
    pub handlers: HandlerDecls,
}

impl AdapterManifest {
    /// Parse manifest text in the given format.
    pub fn parse(content: &str, format: ManifestFormat) -> Result<Self, String> {
        match format {
            ManifestFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ManifestFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// `[adapter]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterHeader {
    /// Display name used in logs.
    #[serde(default = "default_adapter_name")]
    pub name: String,

    #[serde(default = "default_api_version")]
    pub api_version: u32,
}

fn default_adapter_name() -> String {
    "Adapter".into()
}
fn default_api_version() -> u32 {
    SUPPORTED_API_VERSION
}

/// `[handlers]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandlerDecls {
    #[serde(default)]
    pub tracker: Option<HandlerDecl>,

    #[serde(default)]
    pub requirements: Option<HandlerDecl>,
}

/// A single handler declaration: a registered kind plus its parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerDecl {
    pub kind: String,

    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            ManifestFormat::from_path(Path::new("a/adapter.toml")),
            Some(ManifestFormat::Toml)
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("adapter.JSON")),
            Some(ManifestFormat::Json)
        );
        assert_eq!(ManifestFormat::from_path(Path::new("adapter.py")), None);
        assert_eq!(ManifestFormat::from_path(Path::new("adapter")), None);
    }

    #[test]
    fn toml_manifest_parses_handler_params() {
        let manifest = AdapterManifest::parse(
            r#"
[adapter]
name = "team-metrics"

[output]
open = 0

[handlers.tracker]
kind = "count"
key = "open"
items = "/issues"
"#,
            ManifestFormat::Toml,
        )
        .expect("parse");

        let header = manifest.adapter.expect("header");
        assert_eq!(header.name, "team-metrics");
        assert_eq!(header.api_version, SUPPORTED_API_VERSION);

        let decl = manifest.handlers.tracker.expect("tracker handler");
        assert_eq!(decl.kind, "count");
        assert_eq!(decl.params.get("key"), Some(&serde_json::json!("open")));
        assert!(!decl.params.contains_key("kind"));
        assert!(manifest.handlers.requirements.is_none());
        assert!(manifest.tracker.is_none());
    }

    #[test]
    fn json_manifest_parses() {
        let manifest = AdapterManifest::parse(
            r#"{"adapter": {"api_version": 1}, "output": {"a": 1}, "upload": {"table": "t"}}"#,
            ManifestFormat::Json,
        )
        .expect("parse");
        assert_eq!(manifest.output.map(|o| o.len()), Some(1));
        assert_eq!(manifest.upload.map(|u| u.table), Some("t".to_string()));
    }
}
