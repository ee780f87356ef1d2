//! Triage engine
//!
//! Pure scoring functions that turn situational factors into a `Priority`.
//! Nothing here holds state or reads the clock: callers pass `now_ms`, which
//! keeps every function deterministic and safe to call from any thread.
//!
//! Scoring is additive. Weights and thresholds are part of the contract and
//! pinned by tests; change them only together with those tests.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::message::{Message, Priority};

pub const INJURED_WEIGHT: u32 = 50;
pub const UNDER_RUBBLE_WEIGHT: u32 = 40;
pub const LOW_BATTERY_WEIGHT: u32 = 20;
pub const CROWD_WEIGHT: u32 = 15;
pub const VOLUNTEER_NEARBY_WEIGHT: u32 = 10;
pub const WAITED_OVER_HOUR_WEIGHT: u32 = 15;
pub const WAITED_OVER_HALF_HOUR_WEIGHT: u32 = 10;
pub const MANY_CALLS_WEIGHT: u32 = 15;
pub const REPEATED_CALLS_WEIGHT: u32 = 8;
pub const POOR_FIX_WEIGHT: u32 = 5;

pub const CRITICAL_THRESHOLD: u32 = 40;
pub const HIGH_THRESHOLD: u32 = 20;

/// Battery below this percentage counts as `low_battery`.
pub const LOW_BATTERY_PERCENT: u8 = 20;

/// Minutes without an update after which any message is re-escalated.
pub const STALE_UPDATE_MINUTES: u64 = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TriageFactors {
    pub injured: bool,
    pub under_rubble: bool,
    pub low_battery: bool,
    pub repeated_calls: u32,
    pub volunteer_nearby: bool,
    pub time_elapsed_minutes: u64,
    pub people_count: u32,
    pub location_accuracy_meters: f64,
}

/// Sum of the weighted contributions.
pub fn score(factors: &TriageFactors) -> u32 {
    let mut total = 0;

    if factors.injured {
        total += INJURED_WEIGHT;
    }
    if factors.under_rubble {
        total += UNDER_RUBBLE_WEIGHT;
    }
    if factors.low_battery {
        total += LOW_BATTERY_WEIGHT;
    }
    if factors.people_count > 5 {
        total += CROWD_WEIGHT;
    }
    if factors.volunteer_nearby {
        total += VOLUNTEER_NEARBY_WEIGHT;
    }

    if factors.time_elapsed_minutes > 60 {
        total += WAITED_OVER_HOUR_WEIGHT;
    } else if factors.time_elapsed_minutes > 30 {
        total += WAITED_OVER_HALF_HOUR_WEIGHT;
    }

    if factors.repeated_calls > 3 {
        total += MANY_CALLS_WEIGHT;
    } else if factors.repeated_calls > 1 {
        total += REPEATED_CALLS_WEIGHT;
    }

    if factors.location_accuracy_meters > 100.0 {
        total += POOR_FIX_WEIGHT;
    }

    total
}

/// Thresholds are inclusive: 40 is Critical, 20 is High.
pub fn priority_for_score(score: u32) -> Priority {
    if score >= CRITICAL_THRESHOLD {
        Priority::Critical
    } else if score >= HIGH_THRESHOLD {
        Priority::High
    } else {
        Priority::Normal
    }
}

pub fn calculate_priority(factors: &TriageFactors) -> Priority {
    priority_for_score(score(factors))
}

/// Derive factors from what a message itself carries. Call history and
/// volunteer proximity are not part of the message and count as absent.
pub fn factors_for(message: &Message, now_ms: i64) -> TriageFactors {
    TriageFactors {
        injured: message.flags.injured,
        under_rubble: message.flags.under_rubble,
        low_battery: message
            .battery_percent
            .is_some_and(|b| b < LOW_BATTERY_PERCENT),
        repeated_calls: 0,
        volunteer_nearby: false,
        time_elapsed_minutes: message.age_minutes(now_ms),
        people_count: message.people_count,
        location_accuracy_meters: message.location.accuracy_meters,
    }
}

pub fn score_message(message: &Message, now_ms: i64) -> Priority {
    calculate_priority(&factors_for(message, now_ms))
}

/// Whether a message deserves escalation right now.
///
/// Time-driven: callers must re-evaluate periodically, a single call at
/// creation time says nothing about later.
pub fn should_escalate(
    message: &Message,
    minutes_since_last_update: u64,
    previous_priority: Priority,
    now_ms: i64,
) -> bool {
    let recomputed = score_message(message, now_ms);
    if recomputed > previous_priority {
        return true;
    }

    let age = message.age_minutes(now_ms);
    match message.priority.max(recomputed) {
        Priority::Critical if age > 30 => return true,
        Priority::High if age > 60 => return true,
        _ => {}
    }

    minutes_since_last_update > STALE_UPDATE_MINUTES
}

/// Score many messages at once. Order-independent, so it runs on the rayon pool.
pub fn calculate_batch(messages: &[Message], now_ms: i64) -> HashMap<String, Priority> {
    messages
        .par_iter()
        .map(|m| (m.id.clone(), score_message(m, now_ms)))
        .collect()
}

/// Raise priority one level when the reporter's phone is about to die.
pub fn bump_for_critical_battery(
    priority: Priority,
    battery_percent: Option<u8>,
    critical_percent: u8,
) -> Priority {
    match battery_percent {
        Some(b) if b < critical_percent => priority.escalated(),
        _ => priority,
    }
}
