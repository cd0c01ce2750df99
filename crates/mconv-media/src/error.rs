//! Error types for conversion jobs.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, ConversionError>;

/// Diagnostic phrases FFmpeg prints when it cannot make sense of its input.
const UNSUPPORTED_INPUT_MARKERS: &[&str] = &[
    "invalid data found when processing input",
    "could not find codec parameters",
    "does not contain any stream",
    "output file #0 does not contain any stream",
    "moov atom not found",
    "unknown format",
];

/// Errors that can end a conversion job.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("No input file provided")]
    NoInputProvided,

    #[error("Failed to stage input file: {0}")]
    StagingFailure(#[source] std::io::Error),

    #[error("Failed to start encoder {program}: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion tool exited with code {}", exit_code_label(.code))]
    ProcessExitedNonZero {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("Conversion exceeded time budget of {} seconds", .after.as_secs())]
    ProcessTimedOut { after: Duration },

    #[error("Encoder reported success but output could not be read: {0}")]
    OutputReadFailure(#[source] std::io::Error),

    #[error("Failed to remove temporary file {}: {source}", .path.display())]
    CleanupFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Stable, serializable classification of a [`ConversionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoInputProvided,
    StagingFailure,
    SpawnFailure,
    ProcessExitedNonZero,
    ProcessTimedOut,
    OutputReadFailure,
    CleanupFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoInputProvided => "no_input_provided",
            ErrorKind::StagingFailure => "staging_failure",
            ErrorKind::SpawnFailure => "spawn_failure",
            ErrorKind::ProcessExitedNonZero => "process_exited_non_zero",
            ErrorKind::ProcessTimedOut => "process_timed_out",
            ErrorKind::OutputReadFailure => "output_read_failure",
            ErrorKind::CleanupFailure => "cleanup_failure",
        }
    }
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::NoInputProvided => ErrorKind::NoInputProvided,
            ConversionError::StagingFailure(_) => ErrorKind::StagingFailure,
            ConversionError::SpawnFailure { .. } => ErrorKind::SpawnFailure,
            ConversionError::ProcessExitedNonZero { .. } => ErrorKind::ProcessExitedNonZero,
            ConversionError::ProcessTimedOut { .. } => ErrorKind::ProcessTimedOut,
            ConversionError::OutputReadFailure(_) => ErrorKind::OutputReadFailure,
            ConversionError::CleanupFailure { .. } => ErrorKind::CleanupFailure,
        }
    }

    /// Exit code of the encoder, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ConversionError::ProcessExitedNonZero { code, .. } => *code,
            _ => None,
        }
    }

    /// Tail of the encoder's stderr, if any was captured.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            ConversionError::ProcessExitedNonZero { diagnostics, .. } if !diagnostics.is_empty() => {
                Some(diagnostics)
            }
            _ => None,
        }
    }

    /// Check if the failure was caused by the upload rather than the service.
    ///
    /// Covers a missing file and encoder failures whose diagnostics show the
    /// input could not be demuxed or decoded.
    pub fn is_bad_input(&self) -> bool {
        match self {
            ConversionError::NoInputProvided => true,
            ConversionError::ProcessExitedNonZero { diagnostics, .. } => {
                let lower = diagnostics.to_lowercase();
                UNSUPPORTED_INPUT_MARKERS
                    .iter()
                    .any(|marker| lower.contains(marker))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_message_includes_code() {
        let err = ConversionError::ProcessExitedNonZero {
            code: Some(183),
            diagnostics: String::new(),
        };
        assert_eq!(err.to_string(), "Conversion tool exited with code 183");
        assert_eq!(err.exit_code(), Some(183));
        assert_eq!(err.kind(), ErrorKind::ProcessExitedNonZero);
        assert!(err.diagnostics().is_none());
    }

    #[test]
    fn test_signal_exit_message() {
        let err = ConversionError::ProcessExitedNonZero {
            code: None,
            diagnostics: "killed".to_string(),
        };
        assert!(err.to_string().contains("terminated by signal"));
        assert_eq!(err.diagnostics(), Some("killed"));
    }

    #[test]
    fn test_timeout_message() {
        let err = ConversionError::ProcessTimedOut {
            after: Duration::from_secs(300),
        };
        assert_eq!(
            err.to_string(),
            "Conversion exceeded time budget of 300 seconds"
        );
        assert_eq!(err.kind().as_str(), "process_timed_out");
    }

    #[test]
    fn test_bad_input_detection() {
        assert!(ConversionError::NoInputProvided.is_bad_input());

        let unsupported = ConversionError::ProcessExitedNonZero {
            code: Some(1),
            diagnostics: "/tmp/x.bin: Invalid data found when processing input".to_string(),
        };
        assert!(unsupported.is_bad_input());

        let tool_error = ConversionError::ProcessExitedNonZero {
            code: Some(1),
            diagnostics: "Unknown encoder 'libfoo'".to_string(),
        };
        assert!(!tool_error.is_bad_input());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::OutputReadFailure).unwrap();
        assert_eq!(json, "\"output_read_failure\"");
    }
}
