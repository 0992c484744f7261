//! Stress indicator derivation
//!
//! Computes the four interaction-pattern indicators from a trailing window of
//! the activity log. Pure computation with no side effects: callable many
//! times per second with the same inputs producing the same snapshot.

use crate::activity::ActivityLog;
use crate::types::{ActivityKind, StressSnapshot};
use chrono::{DateTime, Duration, Utc};

/// Trailing window the indicators are computed over (60 seconds)
pub const INDICATOR_WINDOW_MS: i64 = 60_000;

/// Dwell on one screen at or past this counts as decision fatigue (10 minutes)
pub const DECISION_FATIGUE_MS: u64 = 600_000;

/// Indicator calculator over the activity log
pub struct IndicatorCalculator;

impl IndicatorCalculator {
    /// Compute a fresh snapshot from the trailing window ending at `now`
    pub fn snapshot(log: &ActivityLog, now: DateTime<Utc>) -> StressSnapshot {
        let window = log.window(Duration::milliseconds(INDICATOR_WINDOW_MS), now);

        StressSnapshot {
            navigation_rate: count_taps(&window),
            scroll_velocity_avg: mean_absolute_velocity(log.scroll_samples()),
            decision_fatigue: log.current_dwell_ms(now) >= DECISION_FATIGUE_MS,
            rush_pattern: has_rapid_transition(&window),
        }
    }
}

/// Taps in the window. Interpreted as taps per window, not normalized per
/// minute, to match the aggregator thresholds.
fn count_taps(window: &[&crate::types::ActivityEvent]) -> u32 {
    window
        .iter()
        .filter(|e| matches!(e.kind, ActivityKind::Tap))
        .count() as u32
}

/// Mean of absolute scroll velocities over the rolling sample buffer. The
/// buffer is independent of the 60 s window by design; zero when no samples
/// exist.
fn mean_absolute_velocity(samples: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for velocity in samples {
        sum += velocity.abs();
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// True when any navigation in the window carried the rapid-transition flag
fn has_rapid_transition(window: &[&crate::types::ActivityEvent]) -> bool {
    window.iter().any(|e| {
        matches!(
            e.kind,
            ActivityKind::Navigation {
                rapid_transition: true
            }
        )
    })
}
