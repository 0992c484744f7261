//! Stress score aggregation
//!
//! Combines the four indicators into one continuous score in [0, 1], applies
//! a hysteresis band so subscribers only hear about meaningful movement, and
//! detects directional crossings of the high-stress threshold to arm
//! stress-triggered interventions.

use crate::types::{StressChange, StressSnapshot};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Weight of the navigation-rate indicator
pub const NAVIGATION_WEIGHT: f64 = 0.3;
/// Weight of the scroll-velocity indicator
pub const SCROLL_WEIGHT: f64 = 0.2;
/// Weight of the rush-pattern indicator
pub const RUSH_WEIGHT: f64 = 0.3;
/// Weight of the decision-fatigue indicator
pub const FATIGUE_WEIGHT: f64 = 0.2;

/// Taps per window above which the navigation indicator contributes
pub const NAVIGATION_RATE_LIMIT: u32 = 30;
/// Mean absolute scroll velocity above which the scroll indicator contributes
pub const SCROLL_VELOCITY_LIMIT: f64 = 500.0;

/// Score at or above which a stress intervention becomes a candidate
pub const HIGH_STRESS_THRESHOLD: f64 = 0.7;
/// Minimum score movement before subscribers are notified
pub const NOTIFY_DELTA: f64 = 0.05;

/// Outcome of one score recomputation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// The freshly computed score
    pub score: f64,
    /// Whether the score moved past the hysteresis band and subscribers
    /// were notified
    pub changed: bool,
    /// Whether the score crossed upward through the high-stress threshold
    pub crossed_high: bool,
}

/// Subscriber callback. Invoked synchronously, in registration order.
pub type StressCallback = Box<dyn FnMut(&StressChange)>;

/// Token returned by `subscribe`, redeemable for `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// Smoothed, hysteretic stress score with a subscriber registry.
///
/// Process-lifetime state: the score is a live signal and is recomputed from
/// scratch after a restart rather than persisted.
pub struct StressAggregator {
    previous_score: f64,
    subscribers: Vec<(SubscriptionToken, StressCallback)>,
    next_token: u64,
}

impl Default for StressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StressAggregator {
    pub fn new() -> Self {
        Self {
            previous_score: 0.0,
            subscribers: Vec::new(),
            next_token: 0,
        }
    }

    /// Recompute the score from a snapshot.
    ///
    /// When the score moved by more than the hysteresis delta the previous
    /// score is updated and all subscribers are notified. The upward crossing
    /// through the high threshold is directional: staying above fires only
    /// once, dropping below re-arms it.
    pub fn evaluate(&mut self, snapshot: &StressSnapshot) -> Evaluation {
        let score = compute_score(snapshot);
        let previous = self.previous_score;
        let changed = (score - previous).abs() > NOTIFY_DELTA;
        let crossed_high =
            changed && score >= HIGH_STRESS_THRESHOLD && previous < HIGH_STRESS_THRESHOLD;

        if changed {
            self.previous_score = score;
            let change = StressChange {
                score,
                previous,
                snapshot: snapshot.clone(),
            };
            self.notify(&change);
        }

        Evaluation {
            score,
            changed,
            crossed_high,
        }
    }

    /// Last published score
    pub fn current_score(&self) -> f64 {
        self.previous_score
    }

    /// Register a callback for score changes. Delivery is synchronous and in
    /// registration order.
    pub fn subscribe(&mut self, callback: StressCallback) -> SubscriptionToken {
        self.next_token += 1;
        let token = SubscriptionToken(self.next_token);
        self.subscribers.push((token, callback));
        token
    }

    /// Remove a subscriber. Returns whether the token was registered.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(t, _)| *t != token);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Fan out a change to every subscriber. A panicking subscriber is
    /// isolated so the rest still receive the change.
    fn notify(&mut self, change: &StressChange) {
        for (token, callback) in self.subscribers.iter_mut() {
            if catch_unwind(AssertUnwindSafe(|| callback(change))).is_err() {
                tracing::warn!(
                    token = token.0,
                    "stress subscriber panicked; continuing fan-out"
                );
            }
        }
    }
}

/// Weighted threshold score over the four indicators, clamped to [0, 1]:
///
/// ```text
/// score = 0.3·[navigation_rate > 30] + 0.2·[scroll_velocity_avg > 500]
///       + 0.3·[rush_pattern]         + 0.2·[decision_fatigue]
/// ```
pub fn compute_score(snapshot: &StressSnapshot) -> f64 {
    let mut score = 0.0;
    if snapshot.navigation_rate > NAVIGATION_RATE_LIMIT {
        score += NAVIGATION_WEIGHT;
    }
    if snapshot.scroll_velocity_avg > SCROLL_VELOCITY_LIMIT {
        score += SCROLL_WEIGHT;
    }
    if snapshot.rush_pattern {
        score += RUSH_WEIGHT;
    }
    if snapshot.decision_fatigue {
        score += FATIGUE_WEIGHT;
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn snapshot(
        navigation_rate: u32,
        scroll_velocity_avg: f64,
        rush_pattern: bool,
        decision_fatigue: bool,
    ) -> StressSnapshot {
        StressSnapshot {
            navigation_rate,
            scroll_velocity_avg,
            decision_fatigue,
            rush_pattern,
        }
    }

    #[test]
    fn test_score_weights() {
        assert_eq!(compute_score(&snapshot(31, 0.0, false, false)), 0.3);
        assert_eq!(compute_score(&snapshot(0, 501.0, false, false)), 0.2);
        assert_eq!(compute_score(&snapshot(0, 0.0, true, false)), 0.3);
        assert_eq!(compute_score(&snapshot(0, 0.0, false, true)), 0.2);
        assert_eq!(compute_score(&snapshot(31, 501.0, true, true)), 1.0);
    }

    #[test]
    fn test_thresholds_are_strict() {
        // Exactly 30 taps and exactly 500 px/s do not contribute
        assert_eq!(compute_score(&snapshot(30, 500.0, false, false)), 0.0);
    }

    #[test]
    fn test_small_movement_does_not_notify() {
        let mut aggregator = StressAggregator::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        aggregator.subscribe(Box::new(move |change| {
            sink.borrow_mut().push(change.score);
        }));

        // 0.0 -> 0.0 is within the band
        let eval = aggregator.evaluate(&snapshot(0, 0.0, false, false));
        assert!(!eval.changed);
        assert!(seen.borrow().is_empty());

        // 0.0 -> 0.2 is a real movement
        let eval = aggregator.evaluate(&snapshot(0, 0.0, false, true));
        assert!(eval.changed);
        assert_eq!(*seen.borrow(), vec![0.2]);
    }

    #[test]
    fn test_crossing_is_directional_and_rearms() {
        let mut aggregator = StressAggregator::new();

        // 0.0 -> 0.8 crosses
        let up = aggregator.evaluate(&snapshot(31, 0.0, true, true));
        assert!(up.crossed_high);

        // Staying at 0.8 does not cross again
        let flat = aggregator.evaluate(&snapshot(31, 0.0, true, true));
        assert!(!flat.crossed_high);

        // 0.8 -> 1.0 stays above, still no new crossing
        let higher = aggregator.evaluate(&snapshot(31, 501.0, true, true));
        assert!(higher.changed);
        assert!(!higher.crossed_high);

        // Drop below, then climb back: counts as a new crossing
        aggregator.evaluate(&snapshot(0, 0.0, false, false));
        let again = aggregator.evaluate(&snapshot(31, 0.0, true, true));
        assert!(again.crossed_high);
    }

    #[test]
    fn test_subscribers_notified_in_registration_order() {
        let mut aggregator = StressAggregator::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let sink = order.clone();
            aggregator.subscribe(Box::new(move |_| {
                sink.borrow_mut().push(label);
            }));
        }

        aggregator.evaluate(&snapshot(0, 0.0, true, false));
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let mut aggregator = StressAggregator::new();
        let delivered = Rc::new(RefCell::new(0u32));

        aggregator.subscribe(Box::new(|_| panic!("subscriber bug")));
        let sink = delivered.clone();
        aggregator.subscribe(Box::new(move |_| {
            *sink.borrow_mut() += 1;
        }));

        aggregator.evaluate(&snapshot(0, 0.0, true, false));
        assert_eq!(*delivered.borrow(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut aggregator = StressAggregator::new();
        let seen = Rc::new(RefCell::new(0u32));
        let sink = seen.clone();
        let token = aggregator.subscribe(Box::new(move |_| {
            *sink.borrow_mut() += 1;
        }));

        aggregator.evaluate(&snapshot(0, 0.0, true, false));
        assert!(aggregator.unsubscribe(token));
        assert!(!aggregator.unsubscribe(token));

        aggregator.evaluate(&snapshot(0, 0.0, false, false));
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(aggregator.subscriber_count(), 0);
    }

    #[test]
    fn test_previous_score_only_updates_past_band() {
        let mut aggregator = StressAggregator::new();

        aggregator.evaluate(&snapshot(0, 0.0, true, true)); // 0.5
        assert_eq!(aggregator.current_score(), 0.5);

        // 0.5 -> 0.5 exactly: |delta| == 0, previous untouched
        aggregator.evaluate(&snapshot(0, 0.0, true, true));
        assert_eq!(aggregator.current_score(), 0.5);
    }
}
