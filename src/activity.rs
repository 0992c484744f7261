//! Append-only activity log
//!
//! Capacity-bounded store of timestamped interaction events with a trailing
//! `window` view for the indicator calculator. Two tiers: a fast in-memory
//! ring buffer and a smaller durable tier written through the host store so
//! indicator history survives a process restart.
//!
//! The log also owns the two pieces of ingest-order state the indicators
//! need: the rolling scroll-velocity sample buffer and the current-screen
//! dwell clock.

use crate::host::RecordStore;
use crate::types::{ActivityEvent, ActivityKind};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Most-recent events kept in memory
pub const FAST_TIER_CAPACITY: usize = 100;

/// Most-recent events mirrored to the durable tier
pub const DURABLE_TIER_CAPACITY: usize = 50;

/// Rolling scroll-velocity samples kept for averaging
pub const SCROLL_SAMPLE_CAPACITY: usize = 50;

/// A navigation is rapid when the previous screen was shown for less than
/// this long
pub const RAPID_TRANSITION_MS: i64 = 5_000;

const ACTIVITY_LOG_KEY: &str = "wellbeing/activity_log";

#[derive(Debug, Clone)]
struct ScreenVisit {
    screen: String,
    entered_at: DateTime<Utc>,
}

/// Bounded, append-only event log
#[derive(Debug, Clone)]
pub struct ActivityLog {
    events: VecDeque<ActivityEvent>,
    scroll_samples: VecDeque<f64>,
    current_screen: Option<ScreenVisit>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(FAST_TIER_CAPACITY),
            scroll_samples: VecDeque::with_capacity(SCROLL_SAMPLE_CAPACITY),
            current_screen: None,
        }
    }

    /// Rebuild the log from the durable tier. A missing or unreadable blob
    /// starts an empty log; indicator history is a live signal and tolerates
    /// gaps.
    pub fn load(store: &dyn RecordStore) -> Self {
        let mut log = Self::new();
        match store.get(ACTIVITY_LOG_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<ActivityEvent>>(&json) {
                Ok(events) => {
                    for event in events {
                        if let ActivityKind::Scroll { velocity } = event.kind {
                            log.push_scroll_sample(velocity);
                        }
                        log.push_event(event);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable activity log blob");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "activity log load failed; starting empty");
            }
        }
        log
    }

    /// Append an event in O(1) amortized, evicting the oldest past capacity,
    /// and mirror the durable tail. A store failure skips persistence for
    /// this cycle only.
    pub fn record(&mut self, event: ActivityEvent, store: &mut dyn RecordStore) {
        if let ActivityKind::Scroll { velocity } = event.kind {
            self.push_scroll_sample(velocity);
        }
        self.push_event(event);
        self.persist_tail(store);
    }

    /// All events with `timestamp ∈ [now - duration, now]`, oldest first.
    /// Non-mutating.
    pub fn window(&self, duration: Duration, now: DateTime<Utc>) -> Vec<&ActivityEvent> {
        let start = now - duration;
        self.events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= now)
            .collect()
    }

    /// Mark a screen transition. Returns whether the transition was rapid,
    /// i.e. the previous screen was shown for under five seconds, and the
    /// dwell spent on the previous screen when there was one.
    pub fn note_screen_entered(
        &mut self,
        screen: &str,
        now: DateTime<Utc>,
    ) -> (bool, Option<u64>) {
        let previous_dwell_ms = self
            .current_screen
            .as_ref()
            .map(|visit| (now - visit.entered_at).num_milliseconds().max(0) as u64);

        self.current_screen = Some(ScreenVisit {
            screen: screen.to_string(),
            entered_at: now,
        });

        let rapid = previous_dwell_ms
            .map(|dwell| (dwell as i64) < RAPID_TRANSITION_MS)
            .unwrap_or(false);
        (rapid, previous_dwell_ms)
    }

    /// Milliseconds the current screen has been shown, zero before the first
    /// navigation
    pub fn current_dwell_ms(&self, now: DateTime<Utc>) -> u64 {
        self.current_screen
            .as_ref()
            .map(|visit| (now - visit.entered_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Name of the screen currently shown
    pub fn current_screen(&self) -> Option<&str> {
        self.current_screen.as_ref().map(|v| v.screen.as_str())
    }

    /// Rolling scroll-velocity samples, oldest first
    pub fn scroll_samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.scroll_samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn push_event(&mut self, event: ActivityEvent) {
        self.events.push_back(event);
        while self.events.len() > FAST_TIER_CAPACITY {
            self.events.pop_front();
        }
    }

    fn push_scroll_sample(&mut self, velocity: f64) {
        self.scroll_samples.push_back(velocity);
        while self.scroll_samples.len() > SCROLL_SAMPLE_CAPACITY {
            self.scroll_samples.pop_front();
        }
    }

    fn persist_tail(&self, store: &mut dyn RecordStore) {
        let tail_start = self.events.len().saturating_sub(DURABLE_TIER_CAPACITY);
        let tail: Vec<&ActivityEvent> = self.events.iter().skip(tail_start).collect();
        match serde_json::to_string(&tail) {
            Ok(json) => {
                if let Err(e) = store.set(ACTIVITY_LOG_KEY, &json) {
                    tracing::warn!(error = %e, "activity log persist failed; skipping this cycle");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "activity log serialization failed");
            }
        }
    }
}
