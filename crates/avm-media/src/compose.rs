//! Typed FFmpeg command builders, one per composition operation.
//!
//! Each builder only produces an [`FfmpegCommand`]; running it is the job of
//! [`crate::engine::FfmpegEngine`]. Keeping construction pure makes the
//! exact argument vectors unit-testable without an FFmpeg binary.

use std::path::{Path, PathBuf};

use avm_models::PlaybackProfile;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::filters::OverlayOptions;
use crate::probe::MediaInfo;

/// How a set of clips is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    /// All inputs share codec and resolution
    StreamCopy,
    /// Inputs are scaled to a common resolution and re-encoded
    Reencode { width: u32, height: u32 },
}

impl ConcatMode {
    /// Pick stream copy when every input matches the first one.
    pub fn for_inputs(infos: &[MediaInfo]) -> MediaResult<Self> {
        let first = infos.first().ok_or(MediaError::NoInputs)?;
        if infos.iter().all(|info| first.stream_compatible(info)) {
            Ok(ConcatMode::StreamCopy)
        } else {
            Ok(ConcatMode::Reencode {
                width: even(first.width.max(2)),
                height: even(first.height.max(2)),
            })
        }
    }
}

fn even(value: u32) -> u32 {
    value - value % 2
}

/// Join clips in order. Audio is always dropped.
#[derive(Debug, Clone)]
pub struct ConcatCommand {
    pub clips: Vec<PathBuf>,
    pub output: PathBuf,
    pub mode: ConcatMode,
    /// Concat demuxer list file, used in stream-copy mode
    pub list_file: PathBuf,
}

impl ConcatCommand {
    pub fn new(
        clips: Vec<PathBuf>,
        output: impl AsRef<Path>,
        mode: ConcatMode,
        list_file: impl AsRef<Path>,
    ) -> Self {
        Self {
            clips,
            output: output.as_ref().to_path_buf(),
            mode,
            list_file: list_file.as_ref().to_path_buf(),
        }
    }

    /// Contents of the concat demuxer list file.
    pub fn list_contents(&self) -> String {
        self.clips
            .iter()
            .map(|clip| {
                let path = clip.to_string_lossy().replace('\'', "'\\''");
                format!("file '{}'\n", path)
            })
            .collect()
    }

    pub fn build(&self, profile: &PlaybackProfile) -> MediaResult<FfmpegCommand> {
        if self.clips.is_empty() {
            return Err(MediaError::NoInputs);
        }

        let cmd = match self.mode {
            ConcatMode::StreamCopy => FfmpegCommand::new(&self.output)
                .input_with_args(["-f", "concat", "-safe", "0"], &self.list_file)
                .no_audio()
                .video_codec("copy"),
            ConcatMode::Reencode { width, height } => {
                let mut cmd = FfmpegCommand::new(&self.output);
                for clip in &self.clips {
                    cmd = cmd.input(clip);
                }

                let mut graph = String::new();
                for i in 0..self.clips.len() {
                    graph.push_str(&format!(
                        "[{i}:v]scale={width}:{height}:force_original_aspect_ratio=decrease,\
                         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps=30[v{i}];"
                    ));
                }
                for i in 0..self.clips.len() {
                    graph.push_str(&format!("[v{i}]"));
                }
                graph.push_str(&format!("concat=n={}:v=1:a=0[outv]", self.clips.len()));

                cmd.filter_complex(graph)
                    .map("[outv]")
                    .no_audio()
                    .encode_video(profile)
            }
        };

        Ok(cmd.container(profile))
    }
}

/// Combine one video stream with one audio stream.
///
/// Output duration is the shorter of the two inputs.
#[derive(Debug, Clone)]
pub struct MuxCommand {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
    /// Re-encode video with the playback profile instead of copying it
    pub reencode_video: bool,
}

impl MuxCommand {
    pub fn new(video: impl AsRef<Path>, audio: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            video: video.as_ref().to_path_buf(),
            audio: audio.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            reencode_video: false,
        }
    }

    pub fn reencode(mut self) -> Self {
        self.reencode_video = true;
        self
    }

    pub fn build(&self, profile: &PlaybackProfile) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(&self.output)
            .input(&self.video)
            .input(&self.audio)
            .map("0:v:0")
            .map("1:a:0");

        let cmd = if self.reencode_video {
            cmd.encode_video(profile)
        } else {
            cmd.video_codec("copy")
        };

        cmd.encode_audio(profile).shortest().container(profile)
    }
}

/// Repeat a clip until it covers the narration, then cut to its exact length.
#[derive(Debug, Clone)]
pub struct LoopMatchCommand {
    pub clip: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
    /// Narration duration in seconds, used verbatim
    pub duration: f64,
}

impl LoopMatchCommand {
    pub fn new(
        clip: impl AsRef<Path>,
        audio: impl AsRef<Path>,
        output: impl AsRef<Path>,
        duration: f64,
    ) -> Self {
        Self {
            clip: clip.as_ref().to_path_buf(),
            audio: audio.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            duration,
        }
    }

    /// Number of clip repetitions needed to cover the narration.
    pub fn repetitions(clip_duration: f64, audio_duration: f64) -> u32 {
        if clip_duration <= 0.0 {
            return 0;
        }
        (audio_duration / clip_duration).ceil().max(1.0) as u32
    }

    pub fn build(&self, profile: &PlaybackProfile) -> FfmpegCommand {
        FfmpegCommand::new(&self.output)
            .looped_input(&self.clip)
            .input(&self.audio)
            .map("0:v:0")
            .map("1:a:0")
            .duration(self.duration)
            .encode_video(profile)
            .encode_audio(profile)
            .container(profile)
    }
}

/// Place a looping circular avatar over a background, narrated.
///
/// Inputs: 0 background, 1 avatar clip (looped), 2 narration audio. The
/// background keeps its resolution; its last frame is held if it is shorter
/// than the narration.
#[derive(Debug, Clone)]
pub struct CircularOverlayCommand {
    pub background: PathBuf,
    pub clip: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
    /// Narration duration in seconds, used verbatim
    pub duration: f64,
    pub options: OverlayOptions,
}

impl CircularOverlayCommand {
    pub fn new(
        background: impl AsRef<Path>,
        clip: impl AsRef<Path>,
        audio: impl AsRef<Path>,
        output: impl AsRef<Path>,
        duration: f64,
    ) -> Self {
        Self {
            background: background.as_ref().to_path_buf(),
            clip: clip.as_ref().to_path_buf(),
            audio: audio.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            duration,
            options: OverlayOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OverlayOptions) -> Self {
        self.options = options;
        self
    }

    /// The full filter graph.
    pub fn filter_graph(&self) -> String {
        let mask = self.options.mask().filter();
        let position = self.options.corner.position(self.options.margin);
        format!(
            "[0:v]tpad=stop_mode=clone:stop_duration={dur}[bg];\
             [1:v]{mask}[bubble];\
             [bg][bubble]overlay={position}:format=auto[outv]",
            dur = crate::command::format_seconds(self.duration),
        )
    }

    pub fn build(&self, profile: &PlaybackProfile) -> FfmpegCommand {
        FfmpegCommand::new(&self.output)
            .input(&self.background)
            .looped_input(&self.clip)
            .input(&self.audio)
            .filter_complex(self.filter_graph())
            .map("[outv]")
            .map("2:a:0")
            .duration(self.duration)
            .encode_video(profile)
            .encode_audio(profile)
            .container(profile)
    }
}

/// Re-encode a file with the playback profile.
#[derive(Debug, Clone)]
pub struct NormalizeCommand {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl NormalizeCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
        }
    }

    pub fn build(&self, profile: &PlaybackProfile) -> FfmpegCommand {
        FfmpegCommand::new(&self.output)
            .input(&self.input)
            .encode_video(profile)
            .encode_audio(profile)
            .container(profile)
    }
}
