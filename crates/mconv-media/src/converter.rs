//! Conversion service shared by every request.

use std::sync::Arc;

use tracing::Instrument;

use mconv_models::{ConversionRequest, EncodeProfile};

use crate::config::EncoderConfig;
use crate::job::{ConversionJob, ConversionResult, JobReport, JobStage};
use crate::logging::JobLogger;
use crate::metrics;
use crate::staging::TempFileStager;
use crate::supervisor::ProcessSupervisor;

/// Runs conversion jobs against one encoder configuration.
///
/// Cheap to clone; clones share the concurrency limit.
#[derive(Debug, Clone)]
pub struct Converter {
    config: Arc<EncoderConfig>,
    stager: TempFileStager,
    supervisor: ProcessSupervisor,
}

impl Converter {
    pub fn new(config: EncoderConfig) -> Self {
        let stager = TempFileStager::new(config.temp_dir.clone());
        let supervisor =
            ProcessSupervisor::new(config.max_concurrent_encodes, config.max_diagnostic_bytes);
        Self {
            config: Arc::new(config),
            stager,
            supervisor,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encoder processes currently running.
    pub fn active_encodes(&self) -> usize {
        self.supervisor.active()
    }

    /// Convert one upload and return the converted file.
    pub async fn convert(&self, request: ConversionRequest) -> ConversionResult {
        self.run_job(request).await.result
    }

    /// Convert one upload and return the full job report.
    pub async fn run_job(&self, request: ConversionRequest) -> JobReport {
        let job = ConversionJob::new(request);
        let logger = JobLogger::new(job.id(), job.kind());
        let span = logger.span();

        logger.log_start(&describe_profile(job.profile()));

        let report = job
            .run(&self.stager, &self.supervisor, &self.config)
            .instrument(span)
            .await;

        let duration_ms = report.elapsed.as_millis() as u64;
        match &report.result {
            Ok(media) => logger.log_completion(media.bytes.len(), duration_ms),
            Err(e) => logger.log_failure(e, duration_ms),
        }

        metrics::record_conversion(
            report.kind,
            report.outcome().unwrap_or(JobStage::Failed),
            report.elapsed.as_secs_f64(),
        );

        report
    }
}

fn describe_profile(profile: &EncodeProfile) -> String {
    match profile {
        EncodeProfile::Video(video) => format!(
            "{} ({} {} at {})",
            video.preset, video.video_codec, video.speed_preset, video.video_bitrate
        ),
        EncodeProfile::Audio(audio) => {
            format!("{} via {}", audio.format, audio.encoding.codec())
        }
    }
}
