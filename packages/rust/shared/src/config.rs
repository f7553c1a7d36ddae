//! Tool configuration shapes and application settings for MetricCli.
//!
//! The three tool configs are declared by the adapter manifest. Application
//! settings live at `~/.metriccli/metriccli.toml` and name the external
//! programs plus any stored upload profiles.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MetricCliError, Result};

/// Default settings file name.
const SETTINGS_FILE_NAME: &str = "metriccli.toml";

/// Default settings directory name under the user's home.
const SETTINGS_DIR_NAME: &str = ".metriccli";

// ---------------------------------------------------------------------------
// Tool configs (declared by the adapter manifest)
// ---------------------------------------------------------------------------

/// `[tracker]` section: how to query the issue tracker.
///
/// The results file path is injected by the pipeline and is not a field here;
/// unknown keys are rejected so a manifest cannot smuggle one in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Tracker server URL.
    pub server: String,
    /// API token.
    pub token: String,
    /// Search filter expression. Empty skips the tracker stage.
    pub filter: String,
    /// Maximum number of results; 0 means unlimited.
    pub max: u32,
    /// Fields to retrieve, in order.
    pub fields: Vec<String>,
    /// Retrieve full issue payloads.
    pub full: bool,
}

impl TrackerConfig {
    pub fn new(server: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_max(mut self, max: u32) -> Self {
        self.max = max;
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn with_full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    /// Whether the tracker stage should run at all.
    pub fn is_enabled(&self) -> bool {
        !self.filter.trim().is_empty()
    }
}

/// `[requirements]` section: how to query the requirements tool.
///
/// The output directory is injected by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequirementsConfig {
    pub username: String,
    pub password: String,
    /// Personal access token; takes precedence over username/password.
    pub token: Option<String>,
    pub server: String,
    /// Project identifier. Also names the results file the tool writes.
    pub project: String,
    /// Query expression. Empty skips the requirements stage.
    pub query: String,
    pub fields: Vec<String>,
}

impl RequirementsConfig {
    pub fn new(server: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// Token to authenticate with, if one is configured and non-empty.
    pub fn auth_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// `[upload]` section: where to push the finalized record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub server: String,
    #[serde(alias = "username")]
    pub user: String,
    pub password: String,
    /// Target database identifier.
    pub database: String,
    /// Target table name.
    pub table: String,
    /// Use HTTP basic authentication.
    pub basic_auth: bool,
    /// Disable TLS certificate verification.
    pub no_ssl: bool,
    /// Take server and credentials from a stored profile instead.
    pub profile: Option<String>,
}

impl UploadConfig {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_server(
        mut self,
        server: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.server = server.into();
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_basic_auth(mut self, basic_auth: bool) -> Self {
        self.basic_auth = basic_auth;
        self
    }

    pub fn with_no_ssl(mut self, no_ssl: bool) -> Self {
        self.no_ssl = no_ssl;
        self
    }
}

// ---------------------------------------------------------------------------
// Application settings
// ---------------------------------------------------------------------------

/// Top-level settings, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    /// External program names.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Stored upload credentials.
    #[serde(default)]
    pub profiles: Vec<UploadProfile>,
}

impl AppSettings {
    /// Find a stored profile by name.
    pub fn profile(&self, name: &str) -> Option<&UploadProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Issue tracker CLI.
    #[serde(default = "default_tracker_program")]
    pub tracker: String,

    /// Requirements tool CLI.
    #[serde(default = "default_requirements_program")]
    pub requirements: String,

    /// BI upload CLI.
    #[serde(default = "default_upload_program")]
    pub upload: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tracker: default_tracker_program(),
            requirements: default_requirements_program(),
            upload: default_upload_program(),
        }
    }
}

fn default_tracker_program() -> String {
    "pyJiraCli".into()
}
fn default_requirements_program() -> String {
    "pyPolarionCli".into()
}
fn default_upload_program() -> String {
    "pySupersetCli".into()
}

/// `[[profiles]]` entry: credentials for the upload server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadProfile {
    pub name: String,
    pub server: String,
    pub user: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Settings loading
// ---------------------------------------------------------------------------

/// Get the path to the settings directory (`~/.metriccli/`).
pub fn settings_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MetricCliError::config("could not determine home directory"))?;
    Ok(home.join(SETTINGS_DIR_NAME))
}

/// Get the path to the settings file (`~/.metriccli/metriccli.toml`).
pub fn settings_file_path() -> Result<PathBuf> {
    Ok(settings_dir()?.join(SETTINGS_FILE_NAME))
}

/// Load settings from the default location. Returns defaults if the file does not exist.
pub fn load_settings() -> Result<AppSettings> {
    let path = settings_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "settings file not found, using defaults");
        return Ok(AppSettings::default());
    }

    load_settings_from(&path)
}

/// Load settings from a specific file path.
pub fn load_settings_from(path: &Path) -> Result<AppSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| MetricCliError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MetricCliError::config(format!("failed to parse {}: {e}", path.display()))
    })
}
