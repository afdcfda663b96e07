//! Mapping of pipeline errors to sanitized categories.
//!
//! Classification looks only at error kinds. Messages are never inspected
//! and never leave the logs.

use avm_avatar::AvatarError;
use avm_models::{ErrorCategory, PipelineStage};

use crate::collaborators::CollaboratorErrorKind;
use crate::error::WorkerError;

/// Category reported when a stage fails for a stage-specific reason.
pub fn stage_category(stage: PipelineStage) -> ErrorCategory {
    match stage {
        PipelineStage::AnalyzingSource => ErrorCategory::AnalysisFailed,
        PipelineStage::GeneratingScript => ErrorCategory::ScriptFailed,
        PipelineStage::SynthesizingAudio => ErrorCategory::NarrationFailed,
        PipelineStage::CapturingScreen => ErrorCategory::CaptureFailed,
        PipelineStage::RenderingAvatar => ErrorCategory::AvatarFailed,
        PipelineStage::Composing => ErrorCategory::CompositionFailed,
        PipelineStage::Created | PipelineStage::Completed | PipelineStage::Failed => {
            ErrorCategory::Internal
        }
    }
}

pub fn classify(error: &WorkerError) -> ErrorCategory {
    match error {
        WorkerError::Collaborator { stage, source } => {
            if source.kind.is_upstream() {
                ErrorCategory::UpstreamUnavailable
            } else if source.kind == CollaboratorErrorKind::InvalidInput {
                ErrorCategory::InvalidSource
            } else {
                stage_category(*stage)
            }
        }
        WorkerError::Stage { stage, .. } => stage_category(*stage),
        WorkerError::Avatar(e) => match e {
            AvatarError::NoPlaceholder { .. } => ErrorCategory::UpstreamUnavailable,
            e if e.is_unavailable() => ErrorCategory::UpstreamUnavailable,
            _ => ErrorCategory::AvatarFailed,
        },
        WorkerError::Media(_) => ErrorCategory::CompositionFailed,
        WorkerError::Validation(_) => ErrorCategory::InvalidSource,
        WorkerError::Store(_)
        | WorkerError::Io(_)
        | WorkerError::NotFound(_)
        | WorkerError::NotReady(_) => ErrorCategory::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use avm_media::MediaError;

    fn collab(stage: PipelineStage, kind: CollaboratorErrorKind) -> WorkerError {
        WorkerError::collaborator(stage, CollaboratorError::new(kind, "raw upstream text"))
    }

    #[test]
    fn test_upstream_kinds() {
        for kind in [
            CollaboratorErrorKind::Unavailable,
            CollaboratorErrorKind::Timeout,
            CollaboratorErrorKind::RateLimited,
            CollaboratorErrorKind::Unauthorized,
        ] {
            assert_eq!(
                classify(&collab(PipelineStage::GeneratingScript, kind)),
                ErrorCategory::UpstreamUnavailable
            );
        }
    }

    #[test]
    fn test_invalid_input_is_invalid_source() {
        assert_eq!(
            classify(&collab(PipelineStage::CapturingScreen, CollaboratorErrorKind::InvalidInput)),
            ErrorCategory::InvalidSource
        );
    }

    #[test]
    fn test_other_kinds_use_stage() {
        assert_eq!(
            classify(&collab(PipelineStage::SynthesizingAudio, CollaboratorErrorKind::Rejected)),
            ErrorCategory::NarrationFailed
        );
        assert_eq!(
            classify(&collab(PipelineStage::AnalyzingSource, CollaboratorErrorKind::Internal)),
            ErrorCategory::AnalysisFailed
        );
        assert_eq!(
            classify(&WorkerError::stage(PipelineStage::GeneratingScript, "empty")),
            ErrorCategory::ScriptFailed
        );
    }

    #[test]
    fn test_avatar_and_media() {
        let err = WorkerError::from(AvatarError::NoPlaceholder {
            backend: "heygen",
            persona: "casual_male".to_string(),
            cause: "timeout".to_string(),
        });
        assert_eq!(classify(&err), ErrorCategory::UpstreamUnavailable);

        let err = WorkerError::from(MediaError::ffmpeg_failed("boom", Some("stderr".to_string()), Some(1)));
        assert_eq!(classify(&err), ErrorCategory::CompositionFailed);

        let err = WorkerError::from(std::io::Error::other("disk"));
        assert_eq!(classify(&err), ErrorCategory::Internal);
    }
}
