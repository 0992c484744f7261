//! Milestone and streak tracking
//!
//! Maintains lifetime counters and consecutive-calendar-day streaks for the
//! discrete wellness actions and emits one-shot milestone events at defined
//! thresholds. All dates are local calendar days supplied by the caller.
//!
//! Counters are monotonic; only a streak's `current` resets, and only on a
//! day gap. State is persisted after every recorded action and reloads
//! idempotently.

use crate::host::RecordStore;
use crate::types::{MilestoneEvent, MilestoneProgress, StreakState, WellnessKind};
use chrono::{Datelike, Duration, NaiveDate};

/// Streak lengths that earn a milestone, per kind
pub const STREAK_MILESTONES: [u32; 4] = [3, 7, 14, 30];

/// Wellness actions within one calendar week that complete the weekly goal
pub const WEEKLY_GOAL: u32 = 7;

const MILESTONE_KEY: &str = "wellbeing/milestones";

/// Tracker over the mutable milestone state
pub struct MilestoneTracker {
    progress: MilestoneProgress,
}

impl Default for MilestoneTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MilestoneTracker {
    pub fn new() -> Self {
        Self {
            progress: MilestoneProgress::default(),
        }
    }

    /// Restore progress from the store. Reloading is idempotent: the blob is
    /// the complete state, so nothing is ever double-counted.
    pub fn load(store: &dyn RecordStore) -> Self {
        let progress = match store.get(MILESTONE_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding unreadable milestone blob");
                MilestoneProgress::default()
            }),
            Ok(None) => MilestoneProgress::default(),
            Err(e) => {
                tracing::warn!(error = %e, "milestone load failed; starting fresh");
                MilestoneProgress::default()
            }
        };
        Self { progress }
    }

    pub fn progress(&self) -> &MilestoneProgress {
        &self.progress
    }

    /// Record one wellness action of `kind` on local calendar day `date` and
    /// return the milestones it earned, in emission order.
    pub fn record_action(
        &mut self,
        kind: WellnessKind,
        date: NaiveDate,
        store: &mut dyn RecordStore,
    ) -> Vec<MilestoneEvent> {
        let mut events = Vec::new();

        let count = self.progress.counts_by_kind.entry(kind).or_insert(0);
        *count += 1;
        if *count == 1 {
            events.push(MilestoneEvent::FirstAction { kind });
        }

        if let Some(days) = self.update_streak(kind, date) {
            events.push(MilestoneEvent::StreakReached { kind, days });
        }

        if let Some(week_start) = self.update_weekly(date) {
            events.push(MilestoneEvent::WeeklyGoalCompleted { week_start });
        }

        self.persist(store);
        events
    }

    /// Apply the day-gap rule and return a streak threshold when this action
    /// crossed one.
    ///
    /// Gap of 0 days leaves the streak untouched, so repeated same-day
    /// actions can never re-emit a threshold; gap of 1 extends it; anything
    /// longer resets to 1.
    fn update_streak(&mut self, kind: WellnessKind, date: NaiveDate) -> Option<u32> {
        let streak = self.progress.streaks_by_kind.get(&kind).cloned();
        let (next, crossed) = match streak {
            None => (
                StreakState {
                    current: 1,
                    last_action_date: date,
                },
                false,
            ),
            Some(prev) => {
                let gap = (date - prev.last_action_date).num_days();
                match gap {
                    0 => (
                        StreakState {
                            current: prev.current,
                            last_action_date: date,
                        },
                        false,
                    ),
                    1 => (
                        StreakState {
                            current: prev.current + 1,
                            last_action_date: date,
                        },
                        true,
                    ),
                    _ => (
                        StreakState {
                            current: 1,
                            last_action_date: date,
                        },
                        false,
                    ),
                }
            }
        };

        let milestone = if crossed && STREAK_MILESTONES.contains(&next.current) {
            Some(next.current)
        } else {
            None
        };
        self.progress.streaks_by_kind.insert(kind, next);
        milestone
    }

    /// Bump the weekly activity count and return the week start when this
    /// action completed the weekly goal for a not-yet-celebrated week.
    fn update_weekly(&mut self, date: NaiveDate) -> Option<NaiveDate> {
        let week_start = week_start_of(date);

        if self.progress.weekly_week != Some(week_start) {
            self.progress.weekly_week = Some(week_start);
            self.progress.weekly_activity_count = 0;
        }
        self.progress.weekly_activity_count += 1;

        if self.progress.weekly_activity_count >= WEEKLY_GOAL
            && self.progress.last_weekly_celebration_week != Some(week_start)
        {
            self.progress.last_weekly_celebration_week = Some(week_start);
            Some(week_start)
        } else {
            None
        }
    }

    fn persist(&self, store: &mut dyn RecordStore) {
        match serde_json::to_string(&self.progress) {
            Ok(json) => {
                if let Err(e) = store.set(MILESTONE_KEY, &json) {
                    tracing::warn!(error = %e, "milestone persist failed; skipping this cycle");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "milestone serialization failed");
            }
        }
    }
}

/// Monday of the ISO week containing `date`
fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}
