//! Sanitized failure categories.
//!
//! These are the only failure texts ever persisted on a job record or
//! returned to clients. Raw collaborator and tool errors stay in the logs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ErrorCategory {
    #[serde(rename = "upstream API unavailable")]
    UpstreamUnavailable,
    #[serde(rename = "invalid source reference")]
    InvalidSource,
    #[serde(rename = "content analysis failed")]
    AnalysisFailed,
    #[serde(rename = "script generation failed")]
    ScriptFailed,
    #[serde(rename = "narration synthesis failed")]
    NarrationFailed,
    #[serde(rename = "screen capture failed")]
    CaptureFailed,
    #[serde(rename = "avatar rendering failed")]
    AvatarFailed,
    #[serde(rename = "video composition failed")]
    CompositionFailed,
    #[serde(rename = "internal error")]
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UpstreamUnavailable => "upstream API unavailable",
            ErrorCategory::InvalidSource => "invalid source reference",
            ErrorCategory::AnalysisFailed => "content analysis failed",
            ErrorCategory::ScriptFailed => "script generation failed",
            ErrorCategory::NarrationFailed => "narration synthesis failed",
            ErrorCategory::CaptureFailed => "screen capture failed",
            ErrorCategory::AvatarFailed => "avatar rendering failed",
            ErrorCategory::CompositionFailed => "video composition failed",
            ErrorCategory::Internal => "internal error",
        }
    }

    /// Short label for metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            ErrorCategory::UpstreamUnavailable => "upstream_unavailable",
            ErrorCategory::InvalidSource => "invalid_source",
            ErrorCategory::AnalysisFailed => "analysis",
            ErrorCategory::ScriptFailed => "script",
            ErrorCategory::NarrationFailed => "narration",
            ErrorCategory::CaptureFailed => "capture",
            ErrorCategory::AvatarFailed => "avatar",
            ErrorCategory::CompositionFailed => "composition",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
