//! Host message types.
//!
//! Messages arrive as JSON objects of the form `{"type": ..., "payload": ...}`
//! and every message is answered with a `MessageResponse`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inbound message from the host channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    /// Start or fully tear down the scheduler.
    SetEnabled { enabled: bool },
    /// Export the page; forwarded to the exporter.
    TriggerExport {
        #[serde(default)]
        mode: ExportMode,
    },
}

/// What the exporter should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    #[default]
    Raw,
    Summary,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Raw => write!(f, "raw"),
            ExportMode::Summary => write!(f, "summary"),
        }
    }
}

/// Reply to every host message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MessageError>,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(MessageError {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }
}

/// Error details in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageError {
    pub code: String,
    pub message: String,
}

/// Standard error codes.
pub struct ErrorCode;

impl ErrorCode {
    pub const UNKNOWN_MESSAGE_TYPE: &'static str = "UNKNOWN_MESSAGE_TYPE";
    pub const EXPORT_FAILED: &'static str = "EXPORT_FAILED";
}
