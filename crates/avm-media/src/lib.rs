//! FFmpeg CLI wrapper for narrated video composition.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Typed builders for concatenation, muxing, loop-matching,
//!   circular overlays and playback normalization
//! - The `MediaEngine` seam used by the pipeline orchestrator

pub mod command;
pub mod compose;
pub mod engine;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{
    CircularOverlayCommand, ConcatCommand, ConcatMode, LoopMatchCommand, MuxCommand,
    NormalizeCommand,
};
pub use engine::{FfmpegEngine, MediaEngine};
pub use error::{MediaError, MediaResult};
pub use filters::{CircularMask, Corner, OverlayOptions};
pub use probe::{probe_duration, probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
