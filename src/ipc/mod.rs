//! Host message channel
//!
//! This module provides:
//! - Message types exchanged with the host
//! - A handler dispatching them to the scheduler and the exporter

pub mod handler;
pub mod messages;

pub use handler::{Exporter, MessageHandler};
pub use messages::{ErrorCode, ExportMode, HostMessage, MessageError, MessageResponse};
