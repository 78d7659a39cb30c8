//! Per-file redaction pipeline.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use ffmpeg_next as ffmpeg;

use plateblur_common::config::AppConfig;
use plateblur_common::error::{PlateblurError, PlateblurResult};
use plateblur_frame_model::SessionConfig;
use plateblur_processing_core::{FrameScheduler, PlateDetector};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::output::OutputGuard;
use crate::progress::{PipelineStage, ProgressReporter, ProgressSender};
use crate::transcode::Transcode;

static FFMPEG_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize FFmpeg once per process and quiet its own logging.
pub fn init_ffmpeg() -> PlateblurResult<()> {
    FFMPEG_INIT
        .get_or_init(|| {
            ffmpeg::init().map_err(|e| e.to_string())?;
            ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
            Ok(())
        })
        .clone()
        .map_err(|e| PlateblurError::decode(format!("failed to initialize FFmpeg: {e}")))
}

/// Whether FFmpeg was built with an encoder of this name.
pub fn encoder_available(name: &str) -> bool {
    init_ffmpeg().is_ok() && ffmpeg::encoder::find_by_name(name).is_some()
}

/// Everything a pipeline needs besides the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub session: SessionConfig,

    /// FFmpeg encoder name for the video stream.
    pub video_encoder: String,

    /// FFmpeg encoder name for every audio stream.
    pub audio_encoder: String,

    /// Write to a partial file and rename it on success.
    pub atomic: bool,
}

impl PipelineOptions {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            video_encoder: "libx264".to_string(),
            audio_encoder: "aac".to_string(),
            atomic: true,
        }
    }

    /// Build options from the application config.
    pub fn from_config(config: &AppConfig) -> PlateblurResult<Self> {
        Ok(Self {
            session: SessionConfig::from_defaults(&config.processing)?,
            video_encoder: config.output.video_encoder.clone(),
            audio_encoder: config.output.audio_encoder.clone(),
            atomic: config.output.atomic,
        })
    }
}

/// Summary of one successfully processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub frames_processed: u64,
    pub detections_run: u64,
    pub tracked_frames: u64,
    pub regions_dropped: u64,
    pub regions_redacted: u64,
    pub audio_streams: usize,
    /// Frame count advertised by the container, if any.
    pub total_frames: Option<u64>,
}

/// Redacts one input file into one output file.
///
/// `OPENING -> STREAMING -> FLUSHING -> CLOSED`, or `FAILED` from any stage.
/// Containers are released on every exit path; with atomic output an
/// unfinished file never appears at the target path.
pub struct StreamPipeline {
    input: PathBuf,
    output: PathBuf,
    options: PipelineOptions,
    progress: Option<ProgressSender>,
    cancel: CancellationToken,
    stage: PipelineStage,
}

impl StreamPipeline {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, options: PipelineOptions) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            options,
            progress: None,
            cancel: CancellationToken::new(),
            stage: PipelineStage::Opening,
        }
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Process the whole file with `detector`.
    pub fn run(&mut self, detector: &mut dyn PlateDetector) -> PlateblurResult<PipelineReport> {
        if !self.input.is_file() {
            return Err(PlateblurError::InputNotFound {
                path: self.input.clone(),
            });
        }
        self.options.session.validate()?;
        init_ffmpeg()?;

        let started = Instant::now();
        let mut reporter = ProgressReporter::new(self.progress.clone(), &self.input);
        tracing::info!(
            input = %self.input.display(),
            output = %self.output.display(),
            detector = detector.name(),
            tracker = %self.options.session.tracker_algorithm,
            interval = self.options.session.detection_interval,
            "Processing video"
        );

        match self.execute(detector, &mut reporter) {
            Ok(report) => {
                self.enter(PipelineStage::Closed, &mut reporter);
                tracing::info!(
                    input = %report.input.display(),
                    output = %report.output.display(),
                    frames = report.frames_processed,
                    detections = report.detections_run,
                    tracked = report.tracked_frames,
                    dropped = report.regions_dropped,
                    audio_streams = report.audio_streams,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Video processed"
                );
                Ok(report)
            }
            Err(e) => {
                self.enter(PipelineStage::Failed, &mut reporter);
                Err(e)
            }
        }
    }

    fn execute(
        &mut self,
        detector: &mut dyn PlateDetector,
        reporter: &mut ProgressReporter,
    ) -> PlateblurResult<PipelineReport> {
        self.enter(PipelineStage::Opening, reporter);
        let guard = OutputGuard::new(&self.output, self.options.atomic)?;
        let mut transcode = Transcode::open(
            &self.input,
            guard.write_path(),
            &self.options.video_encoder,
            &self.options.audio_encoder,
        )?;
        let total_frames = transcode.total_frames();
        let audio_streams = transcode.audio_streams();
        reporter.set_total_frames(total_frames);

        let session = self.options.session.clone();
        let factory = session
            .tracking_enabled
            .then(|| plateblur_vision::tracker_factory(session.tracker_algorithm));
        let mut scheduler = FrameScheduler::new(session, detector, factory)?;

        self.enter(PipelineStage::Streaming, reporter);
        transcode.stream(&mut scheduler, reporter, &self.cancel)?;

        self.enter(PipelineStage::Flushing, reporter);
        let frames_processed = transcode.finish(&mut scheduler, reporter, &self.cancel)?;

        let stats = scheduler.stats();
        let output = guard.commit()?;
        Ok(PipelineReport {
            input: self.input.clone(),
            output,
            frames_processed,
            detections_run: stats.detections_run,
            tracked_frames: stats.tracked_frames,
            regions_dropped: stats.regions_dropped,
            regions_redacted: stats.regions_redacted,
            audio_streams,
            total_frames,
        })
    }

    fn enter(&mut self, stage: PipelineStage, reporter: &mut ProgressReporter) {
        tracing::debug!(
            input = %self.input.display(),
            from = ?self.stage,
            to = ?stage,
            "Pipeline stage"
        );
        self.stage = stage;
        reporter.stage(stage);
    }
}
