//! Finalize the accumulator and write it where the upload tool can read it.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use metriccli_shared::{Accumulator, MetricCliError, MetricsRecord, Result};

/// File name of the persisted record inside the run's temporary directory.
pub const RECORD_FILE_NAME: &str = "metrics.json";

/// Stamp `output` with the current time and write it to `path`.
pub fn persist_record(output: Accumulator, path: &Path) -> Result<MetricsRecord> {
    persist_record_at(output, path, Utc::now())
}

/// Same as [`persist_record`] with an explicit generation time.
#[instrument(skip_all, fields(path = %path.display(), keys = output.len()))]
pub fn persist_record_at(
    output: Accumulator,
    path: &Path,
    generated_at: DateTime<Utc>,
) -> Result<MetricsRecord> {
    let record = output.finalize(generated_at);
    let json = record
        .to_json_pretty()
        .map_err(|e| MetricCliError::parse(format!("failed to serialize metrics: {e}")))?;

    std::fs::write(path, json).map_err(|e| MetricCliError::io(path, e))?;
    debug!("metrics record written");

    Ok(record)
}
