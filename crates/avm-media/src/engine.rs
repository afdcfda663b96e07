//! Media composition engine.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use avm_models::PlaybackProfile;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::compose::{
    CircularOverlayCommand, ConcatCommand, ConcatMode, LoopMatchCommand, MuxCommand,
    NormalizeCommand,
};
use crate::error::{MediaError, MediaResult};
use crate::filters::OverlayOptions;
use crate::fs_utils::{ensure_parent, move_file, partial_path};
use crate::probe::{probe_duration, probe_media};

/// Deterministic operations that combine media fragments into one file.
///
/// Every operation writes `output` only when it fully succeeds and returns
/// its path.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Exact duration of a media file in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;

    /// Join clips in order, dropping their audio.
    async fn concatenate(&self, clips: &[PathBuf], output: &Path) -> MediaResult<PathBuf>;

    /// Combine a video stream and an audio stream; the shorter one wins.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path, reencode: bool) -> MediaResult<PathBuf>;

    /// Loop `clip` to the exact narration duration and add the narration.
    async fn loop_match(&self, clip: &Path, audio: &Path, output: &Path) -> MediaResult<PathBuf>;

    /// Composite a circular looping avatar bubble over a background.
    async fn circular_overlay(
        &self,
        background: &Path,
        clip: &Path,
        audio: &Path,
        output: &Path,
    ) -> MediaResult<PathBuf>;

    /// Re-encode for broad playback compatibility.
    async fn normalize(&self, input: &Path, output: &Path) -> MediaResult<PathBuf>;
}

/// [`MediaEngine`] backed by the FFmpeg and FFprobe CLIs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    profile: PlaybackProfile,
    overlay: OverlayOptions,
}

impl FfmpegEngine {
    pub fn new(profile: PlaybackProfile, overlay: OverlayOptions) -> Self {
        Self { profile, overlay }
    }

    pub fn profile(&self) -> &PlaybackProfile {
        &self.profile
    }

    /// Run `build(partial)` and move the partial output into place.
    async fn produce<F>(&self, operation: &str, output: &Path, total_secs: Option<f64>, build: F) -> MediaResult<PathBuf>
    where
        F: FnOnce(&Path) -> MediaResult<FfmpegCommand>,
    {
        ensure_parent(output).await?;
        let partial = partial_path(output);
        let cmd = build(&partial)?;

        let op = operation.to_string();
        let total_ms = total_secs.map(|s| (s * 1000.0) as i64).unwrap_or(0);
        let result = FfmpegRunner::new(operation)
            .run_with_progress(&cmd, move |p| {
                if total_ms > 0 {
                    debug!(operation = %op, percent = p.percentage(total_ms), "FFmpeg progress");
                }
            })
            .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        move_file(&partial, output).await?;
        info!(operation, output = %output.display(), "Media operation finished");
        Ok(output.to_path_buf())
    }
}

fn require(path: &Path) -> MediaResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(MediaError::FileNotFound(path.to_path_buf()))
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        probe_duration(path).await
    }

    async fn concatenate(&self, clips: &[PathBuf], output: &Path) -> MediaResult<PathBuf> {
        if clips.is_empty() {
            return Err(MediaError::NoInputs);
        }

        let mut infos = Vec::with_capacity(clips.len());
        for clip in clips {
            infos.push(probe_media(clip).await?);
        }
        let mode = ConcatMode::for_inputs(&infos)?;
        debug!(clips = clips.len(), ?mode, "Concatenating clips");

        // Absolute paths so the list file resolves regardless of its location
        let clips: Vec<PathBuf> = clips
            .iter()
            .map(|c| std::path::absolute(c).unwrap_or_else(|_| c.clone()))
            .collect();
        let list_file = output.with_extension("concat.txt");

        let total: f64 = infos.iter().map(|i| i.duration).sum();
        let concat = ConcatCommand::new(clips, output, mode, &list_file);
        if mode == ConcatMode::StreamCopy {
            ensure_parent(&list_file).await?;
            tokio::fs::write(&list_file, concat.list_contents()).await?;
        }

        let result = self
            .produce("concat", output, Some(total), |partial| {
                let mut cmd = concat.clone();
                cmd.output = partial.to_path_buf();
                cmd.build(&self.profile)
            })
            .await;

        let _ = tokio::fs::remove_file(&list_file).await;
        result
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path, reencode: bool) -> MediaResult<PathBuf> {
        require(video)?;
        require(audio)?;

        self.produce("mux", output, None, |partial| {
            let mux = MuxCommand::new(video, audio, partial);
            let mux = if reencode { mux.reencode() } else { mux };
            Ok(mux.build(&self.profile))
        })
        .await
    }

    async fn loop_match(&self, clip: &Path, audio: &Path, output: &Path) -> MediaResult<PathBuf> {
        require(clip)?;
        let duration = probe_duration(audio).await?;

        self.produce("loop_match", output, Some(duration), |partial| {
            Ok(LoopMatchCommand::new(clip, audio, partial, duration).build(&self.profile))
        })
        .await
    }

    async fn circular_overlay(
        &self,
        background: &Path,
        clip: &Path,
        audio: &Path,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        require(background)?;
        require(clip)?;
        let duration = probe_duration(audio).await?;

        self.produce("circular_overlay", output, Some(duration), |partial| {
            Ok(
                CircularOverlayCommand::new(background, clip, audio, partial, duration)
                    .with_options(self.overlay)
                    .build(&self.profile),
            )
        })
        .await
    }

    async fn normalize(&self, input: &Path, output: &Path) -> MediaResult<PathBuf> {
        require(input)?;

        self.produce("normalize", output, None, |partial| {
            Ok(NormalizeCommand::new(input, partial).build(&self.profile))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_inputs_fail_fast() {
        let dir = TempDir::new().unwrap();
        let engine = FfmpegEngine::default();
        let out = dir.path().join("out.mp4");

        let err = engine
            .mux(&dir.path().join("v.mp4"), &dir.path().join("a.mp3"), &out, false)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));

        let err = engine.concatenate(&[], &out).await.unwrap_err();
        assert!(matches!(err, MediaError::NoInputs));
        assert!(!out.exists());
    }

    /// Generate a colored test clip with a sine tone.
    async fn make_clip(path: &Path, seconds: u32, size: &str) {
        make_solid_clip(path, "blue", seconds, size).await;
    }

    async fn make_solid_clip(path: &Path, color: &str, seconds: u32, size: &str) {
        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
            .arg(format!("color=c={color}:s={size}:d={seconds}"))
            .args(["-f", "lavfi", "-i"])
            .arg(format!("sine=frequency=440:duration={seconds}"))
            .args(["-shortest", "-pix_fmt", "yuv420p"])
            .arg(path)
            .status()
            .await
            .unwrap();
        assert!(status.success());
    }

    async fn make_tone(path: &Path, seconds: f64) {
        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
            .arg(format!("sine=frequency=220:duration={seconds}"))
            .arg(path)
            .status()
            .await
            .unwrap();
        assert!(status.success());
    }

    /// One decoded frame at `at` seconds as packed RGB, with its width.
    async fn frame_rgb(path: &Path, at: f64) -> (u32, Vec<u8>) {
        let width = probe_media(path).await.unwrap().width;
        let output = tokio::process::Command::new("ffmpeg")
            .args(["-v", "error", "-ss"])
            .arg(format!("{at:.3}"))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .output()
            .await
            .unwrap();
        assert!(output.status.success());
        (width, output.stdout)
    }

    fn pixel(frame: &(u32, Vec<u8>), x: u32, y: u32) -> [u8; 3] {
        let i = ((y * frame.0 + x) * 3) as usize;
        [frame.1[i], frame.1[i + 1], frame.1[i + 2]]
    }

    /// Equal within the error of a lossy yuv420p round trip.
    fn same_color(a: [u8; 3], b: [u8; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 40)
    }

    async fn count_frames(path: &Path) -> u64 {
        let output = tokio::process::Command::new("ffprobe")
            .args(["-v", "error", "-select_streams", "v:0", "-count_frames"])
            .args(["-show_entries", "stream=nb_read_frames", "-of", "csv=p=0"])
            .arg(path)
            .output()
            .await
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().parse().unwrap()
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_concat_duration_is_sum() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        make_clip(&a, 2, "320x240").await;
        make_clip(&b, 3, "320x240").await;

        let engine = FfmpegEngine::default();
        let out = engine
            .concatenate(&[a, b], &dir.path().join("joined.mp4"))
            .await
            .unwrap();

        let info = probe_media(&out).await.unwrap();
        assert!((info.duration - 5.0).abs() < 0.3, "{}", info.duration);
        assert!(!info.has_audio);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_mux_is_shortest() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("v.mp4");
        let audio = dir.path().join("a.m4a");
        make_clip(&video, 4, "320x240").await;
        make_tone(&audio, 2.5).await;

        let engine = FfmpegEngine::default();
        let out = engine
            .mux(&video, &audio, &dir.path().join("muxed.mp4"), false)
            .await
            .unwrap();

        let d = engine.duration(&out).await.unwrap();
        assert!((d - 2.5).abs() < 0.3, "{d}");
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_loop_match_covers_narration() {
        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("c.mp4");
        let audio = dir.path().join("a.m4a");
        make_clip(&clip, 2, "320x240").await;
        make_tone(&audio, 7.0).await;

        let engine = FfmpegEngine::default();
        let out = engine
            .loop_match(&clip, &audio, &dir.path().join("looped.mp4"))
            .await
            .unwrap();

        let d = engine.duration(&out).await.unwrap();
        assert!((d - 7.0).abs() < 0.3, "{d}");
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_overlay_keeps_background_resolution() {
        let dir = TempDir::new().unwrap();
        let bg = dir.path().join("bg.mp4");
        let clip = dir.path().join("me.mp4");
        let audio = dir.path().join("a.m4a");
        make_clip(&bg, 3, "1280x720").await;
        make_clip(&clip, 1, "640x480").await;
        make_tone(&audio, 3.0).await;

        let engine = FfmpegEngine::default();
        let out = engine
            .circular_overlay(&bg, &clip, &audio, &dir.path().join("overlay.mp4"))
            .await
            .unwrap();

        let info = probe_media(&out).await.unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert!((info.duration - 3.0).abs() < 0.3);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_loop_match_repeats_clip_content() {
        let dir = TempDir::new().unwrap();
        let red = dir.path().join("red.mp4");
        let blue = dir.path().join("blue.mp4");
        let audio = dir.path().join("a.m4a");
        make_solid_clip(&red, "0xFF0000", 1, "320x240").await;
        make_solid_clip(&blue, "0x0000FF", 1, "320x240").await;
        make_tone(&audio, 7.0).await;

        let engine = FfmpegEngine::default();
        let clip = engine
            .concatenate(&[red, blue], &dir.path().join("clip.mp4"))
            .await
            .unwrap();
        let out = engine
            .loop_match(&clip, &audio, &dir.path().join("looped.mp4"))
            .await
            .unwrap();

        let clip_duration = engine.duration(&clip).await.unwrap();
        let audio_duration = engine.duration(&audio).await.unwrap();
        let repetitions = LoopMatchCommand::repetitions(clip_duration, audio_duration);
        assert_eq!(repetitions, 4);

        // The last repetition is cut short at the narration's end
        let clip_frames = count_frames(&clip).await;
        let out_frames = count_frames(&out).await;
        assert!(out_frames <= repetitions as u64 * clip_frames, "{out_frames}");
        assert!(out_frames > (repetitions as u64 - 1) * clip_frames, "{out_frames}");

        let red_px = [255, 0, 0];
        let blue_px = [0, 0, 255];
        for k in 0..repetitions {
            let start = k as f64 * clip_duration;
            let first_half = frame_rgb(&out, start + 0.5).await;
            assert!(same_color(pixel(&first_half, 160, 120), red_px), "repetition {k}");
            if start + 1.5 < audio_duration {
                let second_half = frame_rgb(&out, start + 1.5).await;
                assert!(same_color(pixel(&second_half, 160, 120), blue_px), "repetition {k}");
            }
        }
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_overlay_shows_background_outside_circle() {
        let dir = TempDir::new().unwrap();
        let bg = dir.path().join("bg.mp4");
        let clip = dir.path().join("me.mp4");
        let audio = dir.path().join("a.m4a");
        make_solid_clip(&bg, "0xFF0000", 3, "1280x720").await;
        make_solid_clip(&clip, "0x00FF00", 1, "640x480").await;
        make_tone(&audio, 3.0).await;

        let options = OverlayOptions::default();
        let engine = FfmpegEngine::new(PlaybackProfile::default(), options);
        let out = engine
            .circular_overlay(&bg, &clip, &audio, &dir.path().join("overlay.mp4"))
            .await
            .unwrap();

        let frame = frame_rgb(&out, 1.5).await;
        let background = [255, 0, 0];
        let bubble = [0, 255, 0];

        // Bottom-right bubble square
        let d = options.mask().diameter();
        let x0 = 1280 - d - options.margin;
        let y0 = 720 - d - options.margin;
        let r = options.radius;

        assert!(!options.mask().contains(4, 4));
        assert!(same_color(pixel(&frame, x0 + 4, y0 + 4), background));
        assert!(same_color(pixel(&frame, x0 + d - 5, y0 + 4), background));
        assert!(same_color(pixel(&frame, x0 + 4, y0 + d - 5), background));
        assert!(same_color(pixel(&frame, x0 + r, y0 + r), bubble));
        assert!(!same_color(pixel(&frame, x0 + r, y0 + r), background));
        assert!(same_color(pixel(&frame, 100, 100), background));
    }
}
