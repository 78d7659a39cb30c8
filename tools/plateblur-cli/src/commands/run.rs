//! Redact plates in a set of video files.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plateblur_common::config::{AppConfig, ProcessingDefaults};
use plateblur_common::error::PlateblurResult;
use plateblur_processing_core::PlateDetector;
use plateblur_render_engine::{
    plan_jobs, process_batch, progress_channel, BatchJob, BatchReport, PipelineOptions,
    PipelineStage, ProgressReceiver,
};
use plateblur_vision::NullDetector;
use tokio_util::sync::CancellationToken;

use crate::paths::collect_inputs;
use crate::RunArgs;

pub async fn run(args: RunArgs, mut config: AppConfig, verbose: bool) -> anyhow::Result<()> {
    apply_overrides(&args, &mut config.processing);
    let mut options = PipelineOptions::from_config(&config)?;
    options.session.verbose = verbose;

    let inputs = collect_inputs(&args.paths);
    if inputs.is_empty() {
        anyhow::bail!("No video files to process");
    }
    let jobs = plan_jobs(&inputs, args.output_dir.as_deref(), &config.output.suffix)?;

    let detector = DetectorSpec::new(&args, &config.processing);
    if !args.dry_run {
        // Fail fast instead of once per worker.
        detector.build()?;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping after the current frame");
                cancel.cancel();
            }
        });
    }

    let (tx, rx) = progress_channel();
    let printer = tokio::spawn(print_progress(rx));

    let workers = args.jobs.clamp(1, jobs.len());
    println!(
        "Processing {} file(s) with {} worker(s){}",
        jobs.len(),
        workers,
        if args.dry_run { " (dry run)" } else { "" }
    );

    let options = Arc::new(options);
    let detector = Arc::new(detector);
    let mut handles = Vec::with_capacity(workers);
    for shard in shard_jobs(jobs, workers) {
        let options = Arc::clone(&options);
        let detector = Arc::clone(&detector);
        let tx = tx.clone();
        let cancel = cancel.clone();
        handles.push(tokio::task::spawn_blocking(move || -> PlateblurResult<BatchReport> {
            let mut detector = detector.build()?;
            Ok(process_batch(
                &shard,
                &options,
                detector.as_mut(),
                Some(tx),
                &cancel,
            ))
        }));
    }
    drop(tx);

    let mut report = BatchReport::default();
    for handle in handles {
        report.merge(handle.await??);
    }
    printer.await?;

    print_summary(&report);
    if report.cancelled {
        anyhow::bail!("Processing cancelled");
    }
    if !report.failed.is_empty() {
        anyhow::bail!("{} file(s) failed", report.failed.len());
    }
    Ok(())
}

fn apply_overrides(args: &RunArgs, defaults: &mut ProcessingDefaults) {
    if let Some(tracker) = &args.tracker {
        defaults.tracker = tracker.clone();
    }
    if let Some(interval) = args.interval {
        defaults.detection_interval = interval;
    }
    if let Some(conf) = args.conf_threshold {
        defaults.confidence_threshold = conf;
    }
    if let Some(iou) = args.iou_threshold {
        defaults.iou_threshold = iou;
    }
    if let Some(shrink) = args.shrink_factor {
        defaults.shrink_factor = shrink;
    }
    if args.no_tracking {
        defaults.tracking_enabled = false;
    }
    if let Some(method) = &args.method {
        defaults.redaction = method.clone();
    }
    if let Some(strength) = args.strength {
        defaults.redaction_strength = strength;
    }
    if let Some(model) = &args.model {
        defaults.model_path = model.clone();
    }
}

/// Recipe for building one detector per worker.
#[derive(Debug, Clone)]
struct DetectorSpec {
    dry_run: bool,
    model_path: PathBuf,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl DetectorSpec {
    fn new(args: &RunArgs, defaults: &ProcessingDefaults) -> Self {
        Self {
            dry_run: args.dry_run,
            model_path: defaults.model_path.clone(),
            confidence_threshold: defaults.confidence_threshold,
            iou_threshold: defaults.iou_threshold,
        }
    }

    fn build(&self) -> PlateblurResult<Box<dyn PlateDetector>> {
        if self.dry_run {
            return Ok(Box::new(NullDetector));
        }
        self.build_model()
    }

    #[cfg(feature = "onnx")]
    fn build_model(&self) -> PlateblurResult<Box<dyn PlateDetector>> {
        let mut config = plateblur_vision::YoloConfig::new(&self.model_path);
        config.confidence_threshold = self.confidence_threshold;
        config.iou_threshold = self.iou_threshold;
        Ok(Box::new(plateblur_vision::YoloPlateDetector::new(config)?))
    }

    #[cfg(not(feature = "onnx"))]
    fn build_model(&self) -> PlateblurResult<Box<dyn PlateDetector>> {
        Err(plateblur_common::error::PlateblurError::config(format!(
            "built without ONNX support; cannot load {} (use --dry-run)",
            self.model_path.display()
        )))
    }
}

/// Deal jobs round-robin so each worker gets a similar share.
fn shard_jobs(jobs: Vec<BatchJob>, workers: usize) -> Vec<Vec<BatchJob>> {
    let workers = workers.max(1);
    let mut shards: Vec<Vec<BatchJob>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, job) in jobs.into_iter().enumerate() {
        shards[i % workers].push(job);
    }
    shards.retain(|s| !s.is_empty());
    shards
}

async fn print_progress(mut rx: ProgressReceiver) {
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        let name = display_name(&event.input);
        match event.stage {
            PipelineStage::Streaming | PipelineStage::Flushing if event.frame_index > 0 => {
                print!("\r{name}: {}", event.describe());
            }
            PipelineStage::Closed => println!("\r{name}: {} frames, done", event.frame_index),
            PipelineStage::Failed => println!("\r{name}: failed"),
            _ => {}
        }
        let _ = stdout.flush();
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_summary(report: &BatchReport) {
    println!();
    for file in &report.processed {
        println!(
            "  [OK]   {} -> {} ({} frames, {} detections, {} tracked, {} audio)",
            file.input.display(),
            file.output.display(),
            file.frames_processed,
            file.detections_run,
            file.tracked_frames,
            file.audio_streams,
        );
    }
    for path in &report.skipped {
        println!("  [SKIP] {} (not found)", path.display());
    }
    for failed in &report.failed {
        println!("  [FAIL] {}: {}", failed.input.display(), failed.error);
    }
    println!(
        "\n{} processed, {} skipped, {} failed",
        report.processed.len(),
        report.skipped.len(),
        report.failed.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            paths: vec![PathBuf::from("a.mp4")],
            tracker: None,
            interval: None,
            conf_threshold: None,
            iou_threshold: None,
            shrink_factor: None,
            no_tracking: false,
            method: None,
            strength: None,
            model: None,
            output_dir: None,
            jobs: 1,
            dry_run: false,
        }
    }

    fn job(name: &str) -> BatchJob {
        BatchJob {
            input: PathBuf::from(name),
            output: PathBuf::from(format!("out_{name}")),
        }
    }

    #[test]
    fn test_overrides_replace_only_given_values() {
        let mut defaults = ProcessingDefaults::default();
        let args = RunArgs {
            tracker: Some("CSRT".to_string()),
            interval: Some(30),
            no_tracking: true,
            method: Some("pixelate".to_string()),
            ..args()
        };
        apply_overrides(&args, &mut defaults);
        assert_eq!(defaults.tracker, "CSRT");
        assert_eq!(defaults.detection_interval, 30);
        assert!(!defaults.tracking_enabled);
        assert_eq!(defaults.redaction, "pixelate");
        assert_eq!(defaults.redaction_strength, 15);
        assert!((defaults.shrink_factor - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_shards_are_round_robin() {
        let jobs: Vec<_> = ["a", "b", "c", "d", "e"].into_iter().map(job).collect();
        let shards = shard_jobs(jobs, 2);
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[0].len(), 3);
        assert_eq!(shards[1][0].input, PathBuf::from("b"));

        let shards = shard_jobs(vec![job("only")], 4);
        assert_eq!(shards.len(), 1);
    }

    #[test]
    fn test_dry_run_builds_null_detector() {
        let spec = DetectorSpec::new(
            &RunArgs {
                dry_run: true,
                ..args()
            },
            &ProcessingDefaults::default(),
        );
        assert_eq!(spec.build().unwrap().name(), "null");
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let spec = DetectorSpec::new(
            &RunArgs {
                model: Some(PathBuf::from("/nonexistent/model.onnx")),
                ..args()
            },
            &ProcessingDefaults {
                model_path: PathBuf::from("/nonexistent/model.onnx"),
                ..ProcessingDefaults::default()
            },
        );
        assert!(spec.build().is_err());
    }
}
