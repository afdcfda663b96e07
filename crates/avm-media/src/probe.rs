//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Frame rates closer than this are treated as equal.
const FPS_TOLERANCE: f64 = 0.01;

/// Media file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels (0 for audio-only files)
    pub width: u32,
    /// Height in pixels (0 for audio-only files)
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec, empty for audio-only files
    pub video_codec: String,
    /// Pixel format of the video stream, e.g. `yuv420p`
    #[serde(default)]
    pub pix_fmt: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
}

impl MediaInfo {
    /// Whether two files can be joined without re-encoding.
    ///
    /// Codec, frame size, frame rate and pixel format must all agree; a
    /// stream-copied join of mismatched rates drifts from the summed length.
    pub fn stream_compatible(&self, other: &MediaInfo) -> bool {
        self.has_video
            && other.has_video
            && self.video_codec == other.video_codec
            && self.width == other.width
            && self.height == other.height
            && (self.fps - other.fps).abs() < FPS_TOLERANCE
            && self.pix_fmt.is_some()
            && self.pix_fmt == other.pix_fmt
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    pix_fmt: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Duration of a media file in seconds, exactly as reported by FFprobe.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let info = probe_media(path.as_ref()).await?;
    if info.duration <= 0.0 {
        return Err(MediaError::invalid_media(format!(
            "{} has no measurable duration",
            path.as_ref().display()
        )));
    }
    Ok(info.duration)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    if video.is_none() && !has_audio {
        return Err(MediaError::invalid_media("No audio or video stream found"));
    }

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let fps = video
        .and_then(|v| v.avg_frame_rate.as_ref().or(v.r_frame_rate.as_ref()))
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        fps,
        video_codec: video
            .and_then(|v| v.codec_name.clone())
            .unwrap_or_default(),
        pix_fmt: video.and_then(|v| v.pix_fmt.clone()),
        has_video: video.is_some(),
        has_audio,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
