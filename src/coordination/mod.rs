//! Scheduling coordination primitives
//!
//! Coalesces bursts of wake-up requests into single scheduler invocations.

pub mod coalesce;

pub use coalesce::Coalescer;
