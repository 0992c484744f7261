//! Core types for the wellbeing engine
//!
//! This module defines the data structures that flow through the engine:
//! raw activity events, derived stress snapshots, intervention records,
//! wellness action records, milestone progress, and generated insights.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Kind-specific payload of a raw interaction event.
///
/// Modeled as a tagged union so every consumer matches exhaustively instead
/// of probing optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    /// Screen transition. `rapid_transition` is set at ingestion when the
    /// previous screen was visited for less than five seconds.
    Navigation { rapid_transition: bool },
    /// Scroll gesture with signed velocity in pixels per second
    Scroll { velocity: f64 },
    /// Discrete tap
    Tap,
    /// Dwell recorded when a screen is left
    ScreenTime { dwell_ms: u64 },
}

/// A single low-level interaction event. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Screen the event occurred on, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    /// Kind-specific payload
    #[serde(flatten)]
    pub kind: ActivityKind,
}

/// Indicator values computed fresh from the trailing activity window on each
/// evaluation. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressSnapshot {
    /// Tap events in the trailing window (taps per window, not per minute)
    pub navigation_rate: u32,
    /// Mean absolute scroll velocity over the rolling sample buffer
    pub scroll_velocity_avg: f64,
    /// Current screen has been shown for ten minutes or more
    pub decision_fatigue: bool,
    /// Any navigation in the window carried the rapid-transition flag
    pub rush_pattern: bool,
}

/// Published to stress subscribers when the score moves past the hysteresis
/// band.
#[derive(Debug, Clone, PartialEq)]
pub struct StressChange {
    /// New score, clamped to [0, 1]
    pub score: f64,
    /// Score before this recomputation
    pub previous: f64,
    /// Indicators that produced the new score
    pub snapshot: StressSnapshot,
}

/// Which trigger source fired an intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    StressTriggered,
    TimeTriggered,
}

/// One intervention firing. Persisted so cooldown windows survive restart;
/// never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRecord {
    pub id: Uuid,
    pub kind: InterventionKind,
    pub fired_at: DateTime<Utc>,
    /// Category key the cooldown is enforced against, e.g. `stress_break`,
    /// `meditation`, `slot:pre_lunch`
    pub cooldown_key: String,
}

/// Named daily slots for time-triggered interventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailySlot {
    PreLunch,
    PostLunch,
    Afternoon,
    Evening,
}

impl DailySlot {
    pub const ALL: [DailySlot; 4] = [
        DailySlot::PreLunch,
        DailySlot::PostLunch,
        DailySlot::Afternoon,
        DailySlot::Evening,
    ];

    /// Local wall-clock firing time as (hour, minute)
    pub fn fire_time(&self) -> (u32, u32) {
        match self {
            DailySlot::PreLunch => (11, 30),
            DailySlot::PostLunch => (13, 30),
            DailySlot::Afternoon => (15, 30),
            DailySlot::Evening => (19, 0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DailySlot::PreLunch => "pre_lunch",
            DailySlot::PostLunch => "post_lunch",
            DailySlot::Afternoon => "afternoon",
            DailySlot::Evening => "evening",
        }
    }

    /// Cooldown-record key for this slot
    pub fn cooldown_key(&self) -> String {
        format!("slot:{}", self.as_str())
    }
}

/// User preferences gating intervention delivery. Persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionPrefs {
    /// Trigger categories the user has permanently opted out of
    #[serde(default)]
    pub dismissed: HashSet<InterventionKind>,
    /// Slots the user has switched off. Slots are on unless listed here.
    #[serde(default)]
    pub disabled_slots: HashSet<DailySlot>,
}

impl InterventionPrefs {
    pub fn slot_enabled(&self, slot: DailySlot) -> bool {
        !self.disabled_slots.contains(&slot)
    }

    pub fn is_dismissed(&self, kind: InterventionKind) -> bool {
        self.dismissed.contains(&kind)
    }
}

/// Discrete wellness action kinds tracked for counts and streaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellnessKind {
    Mood,
    Gratitude,
    Breathing,
    Reflection,
}

impl WellnessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WellnessKind::Mood => "mood",
            WellnessKind::Gratitude => "gratitude",
            WellnessKind::Breathing => "breathing",
            WellnessKind::Reflection => "reflection",
        }
    }
}

/// Self-reported mood check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Mood on a 1 (stressed) to 5 (great) scale
    pub mood_score: u8,
    /// Energy on a 1 (drained) to 5 (energized) scale
    pub energy_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_meal_id: Option<String>,
}

/// Gratitude journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GratitudeEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_meal_id: Option<String>,
}

/// Completed guided-breathing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathingSession {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Where in the app the session was started, e.g. `pre_meal`
    pub context: String,
    pub completed_cycles: u32,
    pub duration_sec: u32,
}

/// Post-meal reflection linking mood and energy to a meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Coarse meal category, e.g. `salad`, `pasta`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_category: Option<String>,
    pub mood_score: u8,
    pub energy_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_meal_id: Option<String>,
}

/// Union of all wellness action records. Append-only; source of truth for
/// both the milestone tracker and the insight generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WellnessActionRecord {
    Mood(MoodEntry),
    Gratitude(GratitudeEntry),
    Breathing(BreathingSession),
    Reflection(ReflectionEntry),
}

impl WellnessActionRecord {
    pub fn kind(&self) -> WellnessKind {
        match self {
            WellnessActionRecord::Mood(_) => WellnessKind::Mood,
            WellnessActionRecord::Gratitude(_) => WellnessKind::Gratitude,
            WellnessActionRecord::Breathing(_) => WellnessKind::Breathing,
            WellnessActionRecord::Reflection(_) => WellnessKind::Reflection,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WellnessActionRecord::Mood(e) => e.timestamp,
            WellnessActionRecord::Gratitude(e) => e.timestamp,
            WellnessActionRecord::Breathing(e) => e.timestamp,
            WellnessActionRecord::Reflection(e) => e.timestamp,
        }
    }
}

/// Per-kind consecutive-day streak state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive calendar days with at least one action
    pub current: u32,
    /// Local calendar day of the most recent action
    pub last_action_date: NaiveDate,
}

/// Mutable milestone state, owned by the milestone tracker and persisted
/// after every recorded action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilestoneProgress {
    /// Lifetime action counts per kind
    #[serde(default)]
    pub counts_by_kind: HashMap<WellnessKind, u32>,
    /// Streak state per kind
    #[serde(default)]
    pub streaks_by_kind: HashMap<WellnessKind, StreakState>,
    /// Actions recorded within `weekly_week`
    #[serde(default)]
    pub weekly_activity_count: u32,
    /// Monday of the week `weekly_activity_count` refers to
    #[serde(default)]
    pub weekly_week: Option<NaiveDate>,
    /// Monday of the last week the weekly goal was celebrated
    #[serde(default)]
    pub last_weekly_celebration_week: Option<NaiveDate>,
}

/// One-shot milestone emitted by the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "milestone", rename_all = "snake_case")]
pub enum MilestoneEvent {
    /// First-ever action of a kind
    FirstAction { kind: WellnessKind },
    /// A streak reached a defined threshold
    StreakReached { kind: WellnessKind, days: u32 },
    /// Seven wellness actions within one calendar week
    WeeklyGoalCompleted { week_start: NaiveDate },
}

/// Category of a generated insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    MealMood,
    EnergyTiming,
    StressPattern,
    GratitudeEffect,
    BreathingHabit,
}

/// A generated, confidence-scored observation. Ephemeral; regenerated on
/// each request from the record stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub category: InsightCategory,
    pub title: String,
    pub message: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actionable_suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supporting_data: Option<HashMap<String, serde_json::Value>>,
}

/// Content of an outbound notification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    /// Suggested break length in minutes, when the copy includes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_minutes: Option<u32>,
}

/// Opaque handle returned by the notification collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_kind_serialization() {
        let kind = ActivityKind::Navigation {
            rapid_transition: true,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, r#"{"type":"navigation","rapid_transition":true}"#);

        let parsed: ActivityKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kind);
    }

    #[test]
    fn test_activity_event_flattened_payload() {
        let json = r#"{
            "timestamp": "2026-03-02T12:00:00Z",
            "screen": "meal_planner",
            "type": "scroll",
            "velocity": -340.5
        }"#;

        let event: ActivityEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.screen.as_deref(), Some("meal_planner"));
        assert_eq!(event.kind, ActivityKind::Scroll { velocity: -340.5 });
    }

    #[test]
    fn test_wellness_record_kind_tag() {
        let entry = WellnessActionRecord::Gratitude(GratitudeEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            text: "slow lunch outside".to_string(),
            linked_meal_id: None,
        });

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""kind":"gratitude""#));
        assert_eq!(entry.kind(), WellnessKind::Gratitude);
    }

    #[test]
    fn test_daily_slot_keys() {
        assert_eq!(DailySlot::PreLunch.cooldown_key(), "slot:pre_lunch");
        assert_eq!(DailySlot::Evening.fire_time(), (19, 0));
    }

    #[test]
    fn test_prefs_defaults_allow_everything() {
        let prefs = InterventionPrefs::default();
        assert!(prefs.slot_enabled(DailySlot::Afternoon));
        assert!(!prefs.is_dismissed(InterventionKind::StressTriggered));
    }

    #[test]
    fn test_milestone_progress_round_trip() {
        let mut progress = MilestoneProgress::default();
        progress.counts_by_kind.insert(WellnessKind::Breathing, 4);
        progress.streaks_by_kind.insert(
            WellnessKind::Breathing,
            StreakState {
                current: 3,
                last_action_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            },
        );

        let json = serde_json::to_string(&progress).unwrap();
        let loaded: MilestoneProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, progress);
    }
}
