//! Run outcome codes.
//!
//! These values are the process exit code of `metriccli` and are scripted
//! against by shell and CI tooling. Never renumber a variant.

use std::fmt;

/// Outcome of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RunStatus {
    Ok = 0,
    Error = 1,
    /// Must stay 2 to coincide with clap's usage-error exit code.
    ArgParse = 2,
    InvalidArgument = 3,
    TrackerHandler = 4,
    RequirementsHandler = 5,
    Upload = 6,
    TrackerNotInstalled = 7,
    RequirementsNotInstalled = 8,
    UploadNotInstalled = 9,
}

impl RunStatus {
    /// Every status, in exit-code order.
    pub const ALL: [RunStatus; 10] = [
        Self::Ok,
        Self::Error,
        Self::ArgParse,
        Self::InvalidArgument,
        Self::TrackerHandler,
        Self::RequirementsHandler,
        Self::Upload,
        Self::TrackerNotInstalled,
        Self::RequirementsNotInstalled,
        Self::UploadNotInstalled,
    ];

    /// Numeric exit code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Stable machine-readable name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::ArgParse => "argparse_error",
            Self::InvalidArgument => "invalid_argument",
            Self::TrackerHandler => "tracker_handler_error",
            Self::RequirementsHandler => "requirements_handler_error",
            Self::Upload => "upload_error",
            Self::TrackerNotInstalled => "tracker_not_installed",
            Self::RequirementsNotInstalled => "requirements_not_installed",
            Self::UploadNotInstalled => "upload_not_installed",
        }
    }

    /// Reverse lookup from an exit code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl From<RunStatus> for std::process::ExitCode {
    fn from(status: RunStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}
