//! Conversion job lifecycle.
//!
//! A job moves through `Created -> Staged -> Running -> {Completed | Failed |
//! TimedOut} -> Cleaned`. Both temp files are released on every path once
//! staging succeeded; a release failure is logged and never changes the
//! result.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use mconv_models::{ConversionRequest, EncodeProfile, JobId, JobKind};

use crate::command::build_args;
use crate::config::EncoderConfig;
use crate::error::ConversionError;
use crate::profile::resolve_profile;
use crate::staging::{TempFile, TempFileStager};
use crate::supervisor::{ProcessOutcome, ProcessSupervisor};

/// Stem used when the upload carried no usable filename.
pub const DEFAULT_OUTPUT_STEM: &str = "converted";

/// Stage of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Created,
    Staged,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cleaned,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Created => "created",
            JobStage::Staged => "staged",
            JobStage::Running => "running",
            JobStage::Completed => "completed",
            JobStage::Failed => "failed",
            JobStage::TimedOut => "timed_out",
            JobStage::Cleaned => "cleaned",
        }
    }

    /// Outcome stages, reached right before cleanup.
    pub fn is_outcome(&self) -> bool {
        matches!(
            self,
            JobStage::Completed | JobStage::Failed | JobStage::TimedOut
        )
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converted file returned to the caller.
#[derive(Clone)]
pub struct ConvertedMedia {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Original filename stem with the new extension
    pub file_name: String,
}

impl fmt::Debug for ConvertedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertedMedia")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Either the converted file or the reason there is none.
pub type ConversionResult = Result<ConvertedMedia, ConversionError>;

/// What a finished job leaves behind.
#[derive(Debug)]
pub struct JobReport {
    pub id: JobId,
    pub kind: JobKind,
    /// Every stage the job entered, in order
    pub stages: Vec<JobStage>,
    pub elapsed: Duration,
    pub result: ConversionResult,
}

impl JobReport {
    /// The outcome stage (completed, failed or timed out).
    pub fn outcome(&self) -> Option<JobStage> {
        self.stages.iter().rev().copied().find(JobStage::is_outcome)
    }
}

/// One request's trip through staging, encoding and cleanup.
#[derive(Debug)]
pub struct ConversionJob {
    id: JobId,
    request: ConversionRequest,
    profile: EncodeProfile,
    stages: Vec<JobStage>,
}

impl ConversionJob {
    pub fn new(request: ConversionRequest) -> Self {
        let profile = resolve_profile(request.job_kind(), request.profile_selector());
        Self {
            id: JobId::new(),
            request,
            profile,
            stages: vec![JobStage::Created],
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.request.job_kind()
    }

    pub fn profile(&self) -> &EncodeProfile {
        &self.profile
    }

    pub fn stage(&self) -> JobStage {
        self.stages.last().copied().unwrap_or(JobStage::Created)
    }

    /// Name of the converted file: upload stem plus the output extension.
    pub fn output_file_name(&self) -> String {
        format!(
            "{}.{}",
            self.request.source_stem().unwrap_or(DEFAULT_OUTPUT_STEM),
            self.profile.output_extension()
        )
    }

    fn advance(&mut self, next: JobStage) {
        debug!(job_id = %self.id, from = %self.stage(), to = %next, "Job stage");
        self.stages.push(next);
    }

    /// Run the job to completion and consume it.
    pub async fn run(
        mut self,
        stager: &TempFileStager,
        supervisor: &ProcessSupervisor,
        config: &EncoderConfig,
    ) -> JobReport {
        let started = Instant::now();
        let result = self.execute(stager, supervisor, config).await;

        JobReport {
            kind: self.kind(),
            id: self.id,
            stages: self.stages,
            elapsed: started.elapsed(),
            result,
        }
    }

    async fn execute(
        &mut self,
        stager: &TempFileStager,
        supervisor: &ProcessSupervisor,
        config: &EncoderConfig,
    ) -> Result<ConvertedMedia, ConversionError> {
        if self.request.source_bytes().is_empty() {
            self.advance(JobStage::Failed);
            self.advance(JobStage::Cleaned);
            return Err(ConversionError::NoInputProvided);
        }

        let input = match stager
            .stage(self.request.source_bytes(), self.request.source_extension_hint())
            .await
        {
            Ok(file) => file,
            Err(e) => {
                self.advance(JobStage::Failed);
                self.advance(JobStage::Cleaned);
                return Err(e);
            }
        };
        let output = stager.allocate_output(self.profile.output_extension());
        self.advance(JobStage::Staged);

        let result = self.encode(&input, &output, stager, supervisor, config).await;

        release_logged(stager, input).await;
        release_logged(stager, output).await;
        self.advance(JobStage::Cleaned);

        result
    }

    async fn encode(
        &mut self,
        input: &TempFile,
        output: &TempFile,
        stager: &TempFileStager,
        supervisor: &ProcessSupervisor,
        config: &EncoderConfig,
    ) -> Result<ConvertedMedia, ConversionError> {
        let args = build_args(&self.profile, input.path(), output.path());
        self.advance(JobStage::Running);

        let outcome = supervisor
            .run(&config.ffmpeg_path, &args, config.encode_timeout)
            .await;

        match outcome {
            ProcessOutcome::Exited {
                exit_code: Some(0), ..
            } => match stager.read(output).await {
                Ok(bytes) => {
                    self.advance(JobStage::Completed);
                    Ok(ConvertedMedia {
                        bytes,
                        content_type: self.profile.content_type(),
                        file_name: self.output_file_name(),
                    })
                }
                Err(e) => {
                    warn!(job_id = %self.id, "Encoder succeeded but output is unreadable: {}", e);
                    self.advance(JobStage::Failed);
                    Err(ConversionError::OutputReadFailure(e))
                }
            },
            ProcessOutcome::Exited {
                exit_code,
                diagnostics,
            } => {
                warn!(
                    job_id = %self.id,
                    exit_code = ?exit_code,
                    "Encoder failed: {}",
                    diagnostics.lines().last().unwrap_or("no diagnostics")
                );
                self.advance(JobStage::Failed);
                Err(ConversionError::ProcessExitedNonZero {
                    code: exit_code,
                    diagnostics,
                })
            }
            ProcessOutcome::TimedOut { diagnostics } => {
                warn!(
                    job_id = %self.id,
                    last_output = diagnostics.lines().last().unwrap_or(""),
                    "Encoder killed after {:?}",
                    config.encode_timeout
                );
                self.advance(JobStage::TimedOut);
                Err(ConversionError::ProcessTimedOut {
                    after: config.encode_timeout,
                })
            }
            ProcessOutcome::SpawnFailed { error } => {
                self.advance(JobStage::Failed);
                Err(ConversionError::SpawnFailure {
                    program: config.ffmpeg_path.display().to_string(),
                    source: error,
                })
            }
        }
    }
}

/// Release a temp file, logging instead of failing.
async fn release_logged(stager: &TempFileStager, file: TempFile) {
    if let Err(e) = stager.release(file).await {
        warn!("{}", e);
    }
}
