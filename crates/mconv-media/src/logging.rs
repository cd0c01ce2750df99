//! Structured job logging.

use tracing::{error, info, info_span, warn, Span};

use mconv_models::{JobId, JobKind};

use crate::error::ConversionError;

/// Logs job lifecycle events with the job ID and kind attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    kind: JobKind,
}

impl JobLogger {
    pub fn new(job_id: &JobId, kind: JobKind) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind,
        }
    }

    /// Span covering the whole job; encoder logs inherit its fields.
    pub fn span(&self) -> Span {
        info_span!("conversion", job_id = %self.job_id, kind = %self.kind)
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            kind = %self.kind,
            "Conversion started: {}", message
        );
    }

    pub fn log_completion(&self, bytes: usize, duration_ms: u64) {
        info!(
            job_id = %self.job_id,
            kind = %self.kind,
            bytes,
            duration_ms,
            "Conversion completed"
        );
    }

    /// Caller mistakes log at warn, service faults at error.
    pub fn log_failure(&self, err: &ConversionError, duration_ms: u64) {
        if err.is_bad_input() {
            warn!(
                job_id = %self.job_id,
                kind = %self.kind,
                error_kind = err.kind().as_str(),
                duration_ms,
                "Conversion rejected: {}", err
            );
        } else {
            error!(
                job_id = %self.job_id,
                kind = %self.kind,
                error_kind = err.kind().as_str(),
                duration_ms,
                "Conversion failed: {}", err
            );
        }
    }
}
