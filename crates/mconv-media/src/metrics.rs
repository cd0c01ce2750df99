//! Conversion metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host process installs a recorder.

use metrics::{counter, gauge, histogram};

use mconv_models::JobKind;

use crate::job::JobStage;

/// Metric names as constants for consistency.
pub mod names {
    pub const CONVERSIONS_TOTAL: &str = "mconv_conversions_total";
    pub const ENCODE_DURATION_SECONDS: &str = "mconv_encode_duration_seconds";
    pub const ENCODES_ACTIVE: &str = "mconv_encodes_active";
}

/// Record a finished job.
///
/// `outcome` is the job's outcome stage (`completed`, `failed`, `timed_out`).
pub fn record_conversion(kind: JobKind, outcome: JobStage, duration_secs: f64) {
    let labels = [
        ("kind", kind.as_str().to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];
    counter!(names::CONVERSIONS_TOTAL, &labels).increment(1);

    let labels = [("kind", kind.as_str().to_string())];
    histogram!(names::ENCODE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Counts one running encoder in the active gauge until dropped.
#[derive(Debug)]
pub struct ActiveEncode(());

impl ActiveEncode {
    pub fn start() -> Self {
        gauge!(names::ENCODES_ACTIVE).increment(1.0);
        Self(())
    }
}

impl Drop for ActiveEncode {
    fn drop(&mut self) {
        gauge!(names::ENCODES_ACTIVE).decrement(1.0);
    }
}
