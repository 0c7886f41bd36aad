//! Annotation service collaborators
//!
//! The scheduler only sees the `Annotator` trait: text in, annotated text out,
//! may be slow and may fail.

pub mod chat;
pub mod client;
pub mod mock;

pub use chat::{ChatAnnotator, ChatConfig, Provider};
pub use client::{language_display_name, AnnotateError, Annotator};
pub use mock::MockAnnotator;
