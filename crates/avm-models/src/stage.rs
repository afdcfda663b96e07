//! Video modes and the pipeline stage state machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of video a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoMode {
    /// Talking avatar clips, one per script section
    #[default]
    Avatar,
    /// Scrolling capture of the source with narration
    ScreenRecording,
    /// Screen capture with a circular avatar bubble in a corner
    CustomAvatarOverlay,
}

/// Avatar mode plan.
const AVATAR_PLAN: &[(PipelineStage, u8)] = &[
    (PipelineStage::AnalyzingSource, 10),
    (PipelineStage::GeneratingScript, 25),
    (PipelineStage::SynthesizingAudio, 45),
    (PipelineStage::RenderingAvatar, 65),
    (PipelineStage::Composing, 85),
];

/// Screen recording mode plan.
const SCREEN_RECORDING_PLAN: &[(PipelineStage, u8)] = &[
    (PipelineStage::AnalyzingSource, 10),
    (PipelineStage::CapturingScreen, 20),
    (PipelineStage::GeneratingScript, 50),
    (PipelineStage::SynthesizingAudio, 70),
    (PipelineStage::Composing, 90),
];

/// Custom avatar overlay plan.
const OVERLAY_PLAN: &[(PipelineStage, u8)] = &[
    (PipelineStage::AnalyzingSource, 10),
    (PipelineStage::CapturingScreen, 20),
    (PipelineStage::GeneratingScript, 40),
    (PipelineStage::SynthesizingAudio, 55),
    (PipelineStage::RenderingAvatar, 70),
    (PipelineStage::Composing, 85),
];

impl VideoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoMode::Avatar => "avatar",
            VideoMode::ScreenRecording => "screen_recording",
            VideoMode::CustomAvatarOverlay => "custom_avatar_overlay",
        }
    }

    /// Ordered working stages with the progress recorded on entering each.
    ///
    /// `Completed` (100) is implied after the last entry.
    pub fn plan(&self) -> &'static [(PipelineStage, u8)] {
        match self {
            VideoMode::Avatar => AVATAR_PLAN,
            VideoMode::ScreenRecording => SCREEN_RECORDING_PLAN,
            VideoMode::CustomAvatarOverlay => OVERLAY_PLAN,
        }
    }

    /// Progress for entering `stage` in this mode, if the mode traverses it.
    pub fn progress_for(&self, stage: PipelineStage) -> Option<u8> {
        match stage {
            PipelineStage::Created => Some(0),
            PipelineStage::Completed => Some(100),
            PipelineStage::Failed => None,
            _ => self
                .plan()
                .iter()
                .find(|(s, _)| *s == stage)
                .map(|(_, p)| *p),
        }
    }

    /// Whether this mode needs a screen capture of the source.
    pub fn needs_capture(&self) -> bool {
        !matches!(self, VideoMode::Avatar)
    }
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a job in the pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Created,
    AnalyzingSource,
    GeneratingScript,
    SynthesizingAudio,
    RenderingAvatar,
    CapturingScreen,
    Composing,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Created => "created",
            PipelineStage::AnalyzingSource => "analyzing_source",
            PipelineStage::GeneratingScript => "generating_script",
            PipelineStage::SynthesizingAudio => "synthesizing_audio",
            PipelineStage::RenderingAvatar => "rendering_avatar",
            PipelineStage::CapturingScreen => "capturing_screen",
            PipelineStage::Composing => "composing",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        }
    }

    /// Human-readable label shown to clients.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Created => "Queued",
            PipelineStage::AnalyzingSource => "Analyzing source",
            PipelineStage::GeneratingScript => "Generating script",
            PipelineStage::SynthesizingAudio => "Synthesizing narration",
            PipelineStage::RenderingAvatar => "Rendering avatar",
            PipelineStage::CapturingScreen => "Capturing screen",
            PipelineStage::Composing => "Composing video",
            PipelineStage::Completed => "Completed",
            PipelineStage::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plans_are_strictly_increasing() {
        for mode in [
            VideoMode::Avatar,
            VideoMode::ScreenRecording,
            VideoMode::CustomAvatarOverlay,
        ] {
            let progress: Vec<u8> = mode.plan().iter().map(|(_, p)| *p).collect();
            assert!(progress.windows(2).all(|w| w[0] < w[1]), "{mode}");
            assert!(*progress.last().unwrap() < 100);
        }
    }

    #[test]
    fn test_screen_recording_progress() {
        let mode = VideoMode::ScreenRecording;
        assert_eq!(mode.progress_for(PipelineStage::AnalyzingSource), Some(10));
        assert_eq!(mode.progress_for(PipelineStage::CapturingScreen), Some(20));
        assert_eq!(mode.progress_for(PipelineStage::GeneratingScript), Some(50));
        assert_eq!(mode.progress_for(PipelineStage::SynthesizingAudio), Some(70));
        assert_eq!(mode.progress_for(PipelineStage::Composing), Some(90));
        assert_eq!(mode.progress_for(PipelineStage::Completed), Some(100));
        assert_eq!(mode.progress_for(PipelineStage::RenderingAvatar), None);
    }

    #[test]
    fn test_avatar_mode_skips_capture() {
        assert!(!VideoMode::Avatar.needs_capture());
        assert_eq!(
            VideoMode::Avatar.progress_for(PipelineStage::CapturingScreen),
            None
        );
        assert_eq!(
            VideoMode::Avatar.progress_for(PipelineStage::RenderingAvatar),
            Some(65)
        );
    }

    #[test]
    fn test_mode_serde() {
        let json = serde_json::to_string(&VideoMode::CustomAvatarOverlay).unwrap();
        assert_eq!(json, "\"custom_avatar_overlay\"");
        let mode: VideoMode = serde_json::from_str("\"screen_recording\"").unwrap();
        assert_eq!(mode, VideoMode::ScreenRecording);
    }
}
