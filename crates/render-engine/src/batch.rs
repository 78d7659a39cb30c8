//! Sequential processing of several input files.
//!
//! A batch never stops on a per-file error. Missing inputs are skipped with a
//! warning, other failures are recorded, and only cancellation ends the run
//! early.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use plateblur_common::error::{PlateblurError, PlateblurResult};
use plateblur_processing_core::PlateDetector;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::output::{default_output_path, resolve_path};
use crate::pipeline::{PipelineOptions, PipelineReport, StreamPipeline};
use crate::progress::ProgressSender;

/// One input/output pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Pair every input with its default output path.
///
/// Fails before any file is touched when an output would replace its own
/// input, or when two inputs would write the same output.
pub fn plan_jobs(
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
    suffix: &str,
) -> PlateblurResult<Vec<BatchJob>> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::with_capacity(inputs.len());
    let mut jobs = Vec::with_capacity(inputs.len());

    for input in inputs {
        let output = default_output_path(input, out_dir, suffix);
        let resolved = resolve_path(&output);

        if resolved == resolve_path(input) {
            return Err(PlateblurError::config(format!(
                "output {} would overwrite its input",
                output.display()
            )));
        }
        if let Some(other) = claimed.insert(resolved, input) {
            return Err(PlateblurError::config(format!(
                "{} and {} would both be written to {}",
                other.display(),
                input.display(),
                output.display()
            )));
        }

        jobs.push(BatchJob {
            input: input.clone(),
            output,
        });
    }
    Ok(jobs)
}

/// A file that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    pub input: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: Vec<PipelineReport>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<FailedJob>,
    /// Set when cancellation stopped the batch before every job ran.
    pub cancelled: bool,
}

impl BatchReport {
    /// True when every job produced an output.
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty() && !self.cancelled
    }

    /// Fold another worker's report into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.processed.extend(other.processed);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.cancelled |= other.cancelled;
    }
}

/// Run `jobs` one after another with a shared detector.
pub fn process_batch(
    jobs: &[BatchJob],
    options: &PipelineOptions,
    detector: &mut dyn PlateDetector,
    progress: Option<ProgressSender>,
    cancel: &CancellationToken,
) -> BatchReport {
    let mut report = BatchReport::default();

    for job in jobs {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let mut pipeline = StreamPipeline::new(&job.input, &job.output, options.clone())
            .with_cancellation(cancel.clone());
        if let Some(tx) = &progress {
            pipeline = pipeline.with_progress(tx.clone());
        }

        match pipeline.run(&mut *detector) {
            Ok(file_report) => report.processed.push(file_report),
            Err(PlateblurError::InputNotFound { path }) => {
                tracing::warn!(path = %path.display(), "Input file not found; skipping");
                report.skipped.push(path);
            }
            Err(e) if e.aborts_batch() => {
                tracing::warn!(input = %job.input.display(), "Processing cancelled");
                report.cancelled = true;
                break;
            }
            Err(e) => {
                tracing::error!(input = %job.input.display(), error = %e, "Failed to process video");
                report.failed.push(FailedJob {
                    input: job.input.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        cancelled = report.cancelled,
        "Batch finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_jobs_uses_suffix_or_directory() {
        let inputs = vec![PathBuf::from("/v/a.mp4"), PathBuf::from("/v/b.mkv")];
        let jobs = plan_jobs(&inputs, None, "_blurred").unwrap();
        assert_eq!(jobs[0].output, PathBuf::from("/v/a_blurred.mp4"));
        assert_eq!(jobs[1].output, PathBuf::from("/v/b_blurred.mkv"));

        let jobs = plan_jobs(&inputs, Some(Path::new("/out")), "_blurred").unwrap();
        assert_eq!(jobs[1].output, PathBuf::from("/out/b_blurred.mkv"));
    }

    #[test]
    fn test_plan_jobs_never_targets_an_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.mp4");
        std::fs::write(&input, b"source").unwrap();

        let jobs = plan_jobs(&[input.clone()], Some(dir.path()), "_blurred").unwrap();
        assert_eq!(jobs[0].output, dir.path().join("a_blurred.mp4"));

        let err = plan_jobs(&[input.clone()], Some(dir.path()), "").unwrap_err();
        assert!(matches!(err, PlateblurError::Config { .. }));
        assert!(err.to_string().contains("overwrite"));

        let err = plan_jobs(&[input.clone()], None, "").unwrap_err();
        assert!(matches!(err, PlateblurError::Config { .. }));
        assert_eq!(std::fs::read(&input).unwrap(), b"source");
    }

    #[test]
    fn test_plan_jobs_rejects_shared_output() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["day", "night"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
            std::fs::write(dir.path().join(sub).join("cam.mp4"), b"x").unwrap();
        }
        let inputs = vec![
            dir.path().join("day").join("cam.mp4"),
            dir.path().join("night").join("cam.mp4"),
        ];
        let out = dir.path().join("out");

        let err = plan_jobs(&inputs, Some(&out), "_blurred").unwrap_err();
        assert!(matches!(err, PlateblurError::Config { .. }));
        assert!(err.to_string().contains("cam_blurred.mp4"));

        assert_eq!(plan_jobs(&inputs, None, "_blurred").unwrap().len(), 2);
    }

    #[test]
    fn test_merge_reports() {
        let mut a = BatchReport {
            skipped: vec![PathBuf::from("x.mp4")],
            ..BatchReport::default()
        };
        let b = BatchReport {
            failed: vec![FailedJob {
                input: PathBuf::from("y.mp4"),
                error: "boom".to_string(),
            }],
            cancelled: true,
            ..BatchReport::default()
        };
        a.merge(b);
        assert_eq!(a.skipped.len(), 1);
        assert_eq!(a.failed.len(), 1);
        assert!(a.cancelled);
        assert!(!a.is_success());
        assert!(BatchReport::default().is_success());
    }
}
