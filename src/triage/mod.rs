//! The `triage` module computes how urgently a message must propagate.
//!
//! Everything is a pure function of its inputs; see `engine` for weights and
//! thresholds.

pub mod engine;

pub use engine::{
    TriageFactors, bump_for_critical_battery, calculate_batch, calculate_priority, factors_for,
    priority_for_score, score, score_message, should_escalate,
};
