//! Progress reporting.
//!
//! The pipeline pushes events into an unbounded channel and never waits on
//! the receiver. A closed or absent receiver is not an error.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Lifecycle of one input/output pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Opening,
    Streaming,
    Flushing,
    Closed,
    Failed,
}

/// Progress report for one file.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Input being processed.
    pub input: Arc<Path>,

    pub stage: PipelineStage,

    /// 1-based index of the last processed video frame, 0 before the first.
    pub frame_index: u64,

    /// Frame count from container metadata, when the container has one.
    pub total_frames: Option<u64>,
}

impl ProgressEvent {
    /// Completed fraction in `[0, 1]`, when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_frames {
            Some(total) if total > 0 => Some((self.frame_index as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }

    /// One-line human readable status.
    pub fn describe(&self) -> String {
        match self.fraction() {
            Some(fraction) => format!(
                "Processed frame {}/{} ({:.1}%)",
                self.frame_index,
                self.total_frames.unwrap_or_default(),
                fraction * 100.0
            ),
            None => format!("Processing frame {} ...", self.frame_index),
        }
    }
}

pub type ProgressSender = UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = UnboundedReceiver<ProgressEvent>;

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Per-file handle used by the pipeline to emit events.
#[derive(Debug, Clone)]
pub(crate) struct ProgressReporter {
    tx: Option<ProgressSender>,
    input: Arc<Path>,
    stage: PipelineStage,
    frame_index: u64,
    total_frames: Option<u64>,
}

impl ProgressReporter {
    pub(crate) fn new(tx: Option<ProgressSender>, input: &Path) -> Self {
        Self {
            tx,
            input: Arc::from(input),
            stage: PipelineStage::Opening,
            frame_index: 0,
            total_frames: None,
        }
    }

    pub(crate) fn set_total_frames(&mut self, total: Option<u64>) {
        self.total_frames = total;
    }

    /// Record a stage change and emit it.
    pub(crate) fn stage(&mut self, stage: PipelineStage) {
        self.stage = stage;
        self.send();
    }

    /// Record a processed frame and emit it.
    pub(crate) fn frame(&mut self, frame_index: u64) {
        self.frame_index = frame_index;
        self.send();
    }

    fn send(&self) {
        if let Some(tx) = &self.tx {
            // The receiver may already be gone; progress is best-effort.
            let _ = tx.send(ProgressEvent {
                input: Arc::clone(&self.input),
                stage: self.stage,
                frame_index: self.frame_index,
                total_frames: self.total_frames,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(frame_index: u64, total_frames: Option<u64>) -> ProgressEvent {
        ProgressEvent {
            input: Arc::from(Path::new("clip.mp4")),
            stage: PipelineStage::Streaming,
            frame_index,
            total_frames,
        }
    }

    #[test]
    fn test_describe_with_known_total() {
        assert_eq!(event(45, Some(90)).describe(), "Processed frame 45/90 (50.0%)");
    }

    #[test]
    fn test_describe_with_unknown_total() {
        assert_eq!(event(7, None).describe(), "Processing frame 7 ...");
        assert_eq!(event(7, Some(0)).describe(), "Processing frame 7 ...");
    }

    #[test]
    fn test_fraction_is_capped() {
        // Container metadata can undercount.
        assert_eq!(event(95, Some(90)).fraction(), Some(1.0));
    }

    #[test]
    fn test_reporter_survives_dropped_receiver() {
        let (tx, rx) = progress_channel();
        drop(rx);
        let mut reporter = ProgressReporter::new(Some(tx), Path::new("a.mp4"));
        reporter.frame(1);
    }

    #[test]
    fn test_reporter_delivers_events_in_order() {
        let (tx, mut rx) = progress_channel();
        let mut reporter = ProgressReporter::new(Some(tx), Path::new("a.mp4"));
        reporter.set_total_frames(Some(3));
        reporter.stage(PipelineStage::Streaming);
        for i in 1..=3 {
            reporter.frame(i);
        }
        reporter.stage(PipelineStage::Closed);

        let received: Vec<(PipelineStage, u64)> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.stage, e.frame_index))
            .collect();
        assert_eq!(
            received,
            vec![
                (PipelineStage::Streaming, 0),
                (PipelineStage::Streaming, 1),
                (PipelineStage::Streaming, 2),
                (PipelineStage::Streaming, 3),
                (PipelineStage::Closed, 3),
            ]
        );
    }
}
