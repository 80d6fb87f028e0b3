//! Core gating logic.
//!
//! This module contains:
//! - Window aggregation of per-tick movement samples into verdicts
//! - The reward state machine that turns verdicts into gate states

pub mod reward;
pub mod windowing;

// Re-export commonly used types
pub use reward::{ChewState, Effect, ProgressCounter, RewardStateMachine};
pub use windowing::{EdgeTracker, Window, WindowAggregator, WindowVerdict};
