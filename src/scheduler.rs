//! Intervention scheduling
//!
//! Two trigger sources, one gating policy. Stress crossings and daily
//! wall-clock slots both funnel through the same checks: permanent user
//! opt-outs first, then per-category cooldowns, and only then a persisted
//! record plus a single outbound notification request. The scheduler decides
//! and requests; it never delivers.

use crate::host::{read_json, write_json, NotificationPort, RecordStore};
use crate::types::{
    DailySlot, InterventionKind, InterventionPrefs, InterventionRecord, NotificationContent,
    StressSnapshot,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Minimum time between stress-break interventions
pub const STRESS_COOLDOWN_MINUTES: i64 = 30;
/// Minimum time between meditation escalations
pub const MEDITATION_COOLDOWN_MINUTES: i64 = 60;
/// Crossing score at or above which the meditation escalation fires
pub const MEDITATION_SCORE_THRESHOLD: f64 = 0.85;
/// Stress notifications are requested this far in the future
pub const STRESS_DELIVERY_DELAY_SECONDS: i64 = 5;

/// Cooldown key for the regular stress break
pub const STRESS_BREAK_KEY: &str = "stress_break";
/// Cooldown key for the meditation escalation
pub const MEDITATION_KEY: &str = "meditation";

/// Fired records retained for cooldown checks and insight mining
const MAX_HISTORY: usize = 500;

const SCHEDULER_STATE_KEY: &str = "wellbeing/interventions";
const PREFS_KEY: &str = "wellbeing/intervention_prefs";

/// Persisted scheduler state: the firing history plus the once-per-day
/// ledger for the named slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchedulerState {
    history: Vec<InterventionRecord>,
    #[serde(default)]
    slot_last_fired: HashMap<DailySlot, NaiveDate>,
}

/// Decides whether and when to request a wellbeing notification
pub struct InterventionScheduler {
    state: SchedulerState,
    prefs: InterventionPrefs,
}

impl Default for InterventionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl InterventionScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::default(),
            prefs: InterventionPrefs::default(),
        }
    }

    /// Restore history and preferences from the store. Unreadable blobs
    /// degrade to empty state.
    pub fn load(store: &dyn RecordStore) -> Self {
        let state = read_json(store, SCHEDULER_STATE_KEY).unwrap_or_default();
        let prefs = read_json(store, PREFS_KEY).unwrap_or_default();
        Self { state, prefs }
    }

    pub fn prefs(&self) -> &InterventionPrefs {
        &self.prefs
    }

    /// Full firing history, oldest first
    pub fn history(&self) -> &[InterventionRecord] {
        &self.state.history
    }

    pub fn set_slot_enabled(&mut self, slot: DailySlot, enabled: bool, store: &mut dyn RecordStore) {
        if enabled {
            self.prefs.disabled_slots.remove(&slot);
        } else {
            self.prefs.disabled_slots.insert(slot);
        }
        self.persist_prefs(store);
    }

    /// Permanently opt the user out of a trigger category
    pub fn dismiss(&mut self, kind: InterventionKind, store: &mut dyn RecordStore) {
        self.prefs.dismissed.insert(kind);
        self.persist_prefs(store);
    }

    /// Handle an upward crossing of the high-stress threshold.
    ///
    /// Fires the stress break unless its 30-minute cooldown is live. For
    /// crossings at or above the escalation score, also fires a meditation
    /// suggestion on its own 60-minute cooldown. Returns the records fired.
    pub fn on_stress_crossing(
        &mut self,
        score: f64,
        snapshot: &StressSnapshot,
        now: DateTime<Utc>,
        store: &mut dyn RecordStore,
        notifier: &mut dyn NotificationPort,
    ) -> Vec<InterventionRecord> {
        if self.prefs.is_dismissed(InterventionKind::StressTriggered) {
            return Vec::new();
        }

        let fire_at = now + Duration::seconds(STRESS_DELIVERY_DELAY_SECONDS);
        let mut fired = Vec::new();

        if self.cooldown_elapsed(STRESS_BREAK_KEY, STRESS_COOLDOWN_MINUTES, now) {
            let content = stress_break_content(snapshot, score);
            fired.push(self.fire(
                InterventionKind::StressTriggered,
                STRESS_BREAK_KEY.to_string(),
                content,
                now,
                fire_at,
                store,
                notifier,
            ));
        }

        if score >= MEDITATION_SCORE_THRESHOLD
            && self.cooldown_elapsed(MEDITATION_KEY, MEDITATION_COOLDOWN_MINUTES, now)
        {
            fired.push(self.fire(
                InterventionKind::StressTriggered,
                MEDITATION_KEY.to_string(),
                meditation_content(),
                now,
                fire_at,
                store,
                notifier,
            ));
        }

        fired
    }

    /// Evaluate the daily slots against the local wall clock.
    ///
    /// A slot fires when the clock is inside its exact minute and it has not
    /// fired on that calendar day; the per-slot ledger is persisted, so a
    /// re-check after a process resume cannot double-fire.
    pub fn check_time_triggers(
        &mut self,
        local: NaiveDateTime,
        now: DateTime<Utc>,
        store: &mut dyn RecordStore,
        notifier: &mut dyn NotificationPort,
    ) -> Vec<InterventionRecord> {
        if self.prefs.is_dismissed(InterventionKind::TimeTriggered) {
            return Vec::new();
        }

        let today = local.date();
        let mut fired = Vec::new();

        for slot in DailySlot::ALL {
            if !self.prefs.slot_enabled(slot) {
                continue;
            }
            let (hour, minute) = slot.fire_time();
            if local.hour() != hour || local.minute() != minute {
                continue;
            }
            if self.state.slot_last_fired.get(&slot) == Some(&today) {
                continue;
            }

            self.state.slot_last_fired.insert(slot, today);
            // Same-minute delivery
            fired.push(self.fire(
                InterventionKind::TimeTriggered,
                slot.cooldown_key(),
                slot_content(slot),
                now,
                now,
                store,
                notifier,
            ));
        }

        fired
    }

    fn cooldown_elapsed(&self, key: &str, minutes: i64, now: DateTime<Utc>) -> bool {
        match self
            .state
            .history
            .iter()
            .rev()
            .find(|r| r.cooldown_key == key)
        {
            Some(last) => now - last.fired_at >= Duration::minutes(minutes),
            None => true,
        }
    }

    /// Persist the record, then request the notification. A failing port is
    /// logged and the record still stands: the firing is superseded by the
    /// next cooldown check, never retracted.
    #[allow(clippy::too_many_arguments)]
    fn fire(
        &mut self,
        kind: InterventionKind,
        cooldown_key: String,
        content: NotificationContent,
        now: DateTime<Utc>,
        fire_at: DateTime<Utc>,
        store: &mut dyn RecordStore,
        notifier: &mut dyn NotificationPort,
    ) -> InterventionRecord {
        let record = InterventionRecord {
            id: Uuid::new_v4(),
            kind,
            fired_at: now,
            cooldown_key,
        };
        self.state.history.push(record.clone());
        while self.state.history.len() > MAX_HISTORY {
            self.state.history.remove(0);
        }
        self.persist_state(store);

        if let Err(e) = notifier.schedule_local(content, fire_at) {
            tracing::warn!(error = %e, key = %record.cooldown_key, "notification request failed");
        }
        record
    }

    fn persist_state(&self, store: &mut dyn RecordStore) {
        write_json(store, SCHEDULER_STATE_KEY, &self.state);
    }

    fn persist_prefs(&self, store: &mut dyn RecordStore) {
        write_json(store, PREFS_KEY, &self.prefs);
    }
}

/// Break length scales with how far the score climbed
fn suggested_break_minutes(score: f64) -> u32 {
    if score >= 0.85 {
        10
    } else if score >= 0.75 {
        7
    } else {
        5
    }
}

/// Copy keyed by whichever indicator dominates the crossing
fn stress_break_content(snapshot: &StressSnapshot, score: f64) -> NotificationContent {
    let minutes = suggested_break_minutes(score);
    let (title, body) = if snapshot.rush_pattern {
        (
            "Slow down for a moment",
            "You're moving through screens quickly. One thing at a time works better.",
        )
    } else if snapshot.decision_fatigue {
        (
            "Simplify the choice",
            "You've been weighing this screen for a while. Pick something good enough.",
        )
    } else if snapshot.scroll_velocity_avg > crate::stress::SCROLL_VELOCITY_LIMIT {
        (
            "Pause the scroll",
            "Lots of fast scrolling lately. A short pause can reset your focus.",
        )
    } else {
        (
            "Take a short break",
            "Your planning pace looks stressed. A few quiet minutes can help.",
        )
    };

    NotificationContent {
        title: title.to_string(),
        body: format!("{} Try {} minutes away.", body, minutes),
        suggested_minutes: Some(minutes),
    }
}

fn meditation_content() -> NotificationContent {
    NotificationContent {
        title: "A few mindful breaths".to_string(),
        body: "Stress has been running high. A short guided meditation could help you reset."
            .to_string(),
        suggested_minutes: Some(10),
    }
}

fn slot_content(slot: DailySlot) -> NotificationContent {
    let (title, body) = match slot {
        DailySlot::PreLunch => (
            "Before lunch",
            "A mindful minute before you eat makes the meal land better.",
        ),
        DailySlot::PostLunch => (
            "After lunch",
            "How did that meal feel? A quick reflection keeps the picture honest.",
        ),
        DailySlot::Afternoon => (
            "Afternoon check-in",
            "Energy dipping? Note how you feel and grab some water.",
        ),
        DailySlot::Evening => (
            "Evening wind-down",
            "One thing you're grateful for today. It only takes a moment.",
        ),
    };
    NotificationContent {
        title: title.to_string(),
        body: body.to_string(),
        suggested_minutes: None,
    }
}
