//! Dispatches host messages to the scheduler and the exporter.

use std::sync::Arc;

use serde_json::Value;

use super::messages::{ErrorCode, ExportMode, HostMessage, MessageResponse};
use crate::annotate::Annotator;
use crate::error::Result;
use crate::host::Page;
use crate::scheduler::AnnotationScheduler;

/// Turns the page into a structured document. Implemented outside the scheduler.
pub trait Exporter: Send + Sync {
    fn export(&self, page: &Page, mode: ExportMode) -> Result<()>;
}

pub struct MessageHandler<A: Annotator + ?Sized + 'static> {
    scheduler: Arc<AnnotationScheduler<A>>,
    exporter: Arc<dyn Exporter>,
}

impl<A: Annotator + ?Sized + 'static> MessageHandler<A> {
    pub fn new(scheduler: Arc<AnnotationScheduler<A>>, exporter: Arc<dyn Exporter>) -> Self {
        Self { scheduler, exporter }
    }

    /// Handle a decoded message. Must run inside a tokio runtime.
    pub fn handle(&self, message: HostMessage) -> MessageResponse {
        match message {
            HostMessage::SetEnabled { enabled: true } => {
                if !self.scheduler.enable() {
                    tracing::debug!("Scheduler already enabled");
                }
                MessageResponse::ok()
            }
            HostMessage::SetEnabled { enabled: false } => {
                self.scheduler.disable();
                MessageResponse::ok()
            }
            HostMessage::TriggerExport { mode } => match self.exporter.export(self.scheduler.page(), mode) {
                Ok(()) => MessageResponse::ok(),
                Err(e) => {
                    tracing::error!(%mode, error = %e, "Export failed");
                    MessageResponse::error(ErrorCode::EXPORT_FAILED, e.to_string())
                }
            },
        }
    }

    /// Handle a raw JSON message; anything that is not a known message gets an error reply
    pub fn handle_value(&self, value: Value) -> MessageResponse {
        match serde_json::from_value::<HostMessage>(value) {
            Ok(message) => self.handle(message),
            Err(e) => {
                tracing::warn!(error = %e, "Unrecognized host message");
                MessageResponse::error(ErrorCode::UNKNOWN_MESSAGE_TYPE, "Unknown message type")
            }
        }
    }
}
