//! The `relay` module floods messages across the mesh without storms.
//!
//! - `FloodRelay`: per-message pipeline (verify, triage, dedup, persist,
//!   fan-out) plus the periodic maintenance sweep
//! - `SeenSet`: bounded LRU of ids already processed
//! - `RelayPolicy`: hop budgets and dedup rules, usually built from config
//! - `RelayStats`: counters for diagnostics

pub mod engine;
pub mod policy;
pub mod seen;
pub mod stats;

pub use engine::{FloodRelay, MaintenanceReport, Originated, RelayOutcome};
pub use policy::{RelayPolicy, SameIdPolicy};
pub use seen::{Claim, SeenSet};
pub use stats::{RelayStats, StatsSnapshot};
