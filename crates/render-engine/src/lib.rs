//! Plateblur Render Engine
//!
//! Streams a video file through demux, decode, redaction, encode and mux,
//! and runs batches of files.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.mp4 ── demux ──┬── video ── decode ── RGB ── FrameScheduler ── YUV ── encode ──┐
//!                      │                          (detect / track / redact)           │
//!                      ├── audio #1 ── decode ── aformat ── encode ───────────────────┼── mux ── output.partial.mp4
//!                      ├── audio #2 ── decode ── aformat ── encode ───────────────────┘        │
//!                      └── other streams (ignored)                                             ▼
//!                                                                                    rename ── output.mp4
//! ```

pub mod batch;
pub mod output;
pub mod pipeline;
pub mod progress;
mod transcode;

pub use batch::{plan_jobs, process_batch, BatchJob, BatchReport, FailedJob};
pub use output::{default_output_path, partial_path, OutputGuard};
pub use pipeline::{
    encoder_available, init_ffmpeg, PipelineOptions, PipelineReport, StreamPipeline,
};
pub use progress::{progress_channel, PipelineStage, ProgressEvent, ProgressReceiver, ProgressSender};
