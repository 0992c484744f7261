//! Engine orchestration
//!
//! `WellbeingEngine` wires the pipeline together: ingest → indicators →
//! stress aggregation → intervention scheduling, plus the wellness-action
//! path into the milestone tracker and the on-demand insight generator.
//!
//! The engine is an explicitly constructed object, not a global: hosts and
//! tests create isolated instances with their own store and notifier. All
//! computation is synchronous and driven by the caller; the host owns the
//! once-per-minute timer and calls `tick`.

use crate::activity::ActivityLog;
use crate::host::{read_json, write_json, NotificationPort, RecordStore};
use crate::indicators::IndicatorCalculator;
use crate::insights::InsightGenerator;
use crate::milestones::MilestoneTracker;
use crate::scheduler::InterventionScheduler;
use crate::stress::{Evaluation, StressAggregator, StressCallback, SubscriptionToken};
use crate::types::{
    ActivityEvent, ActivityKind, BreathingSession, DailySlot, GratitudeEntry, Insight,
    InterventionKind, MilestoneEvent, MilestoneProgress, MoodEntry, ReflectionEntry,
    WellnessActionRecord,
};
use chrono::{DateTime, FixedOffset, Utc};

const WELLNESS_HISTORY_KEY: &str = "wellbeing/wellness_history";

/// The behavioral-signal and intervention engine.
///
/// Owns the full pipeline state for one user session. Single-threaded by
/// design: every mutation runs on the caller's thread, in call order.
pub struct WellbeingEngine<S: RecordStore, N: NotificationPort> {
    store: S,
    notifier: N,
    /// Host-resolved local offset for calendar arithmetic (streak days,
    /// daily slots, insight hour buckets)
    tz: FixedOffset,
    log: ActivityLog,
    aggregator: StressAggregator,
    scheduler: InterventionScheduler,
    milestones: MilestoneTracker,
    wellness: Vec<WellnessActionRecord>,
}

impl<S: RecordStore, N: NotificationPort> WellbeingEngine<S, N> {
    /// Construct an engine, restoring every persisted tier from the store.
    /// Missing or unreadable tiers start empty.
    pub fn new(store: S, notifier: N, tz: FixedOffset) -> Self {
        let log = ActivityLog::load(&store);
        let scheduler = InterventionScheduler::load(&store);
        let milestones = MilestoneTracker::load(&store);
        let wellness: Vec<WellnessActionRecord> =
            read_json(&store, WELLNESS_HISTORY_KEY).unwrap_or_default();

        Self {
            store,
            notifier,
            tz,
            log,
            aggregator: StressAggregator::new(),
            scheduler,
            milestones,
            wellness,
        }
    }

    // ------------------------------------------------------------------
    // Activity ingestion
    // ------------------------------------------------------------------

    /// Record a screen transition. Emits a dwell event for the screen being
    /// left, flags the transition as rapid when that dwell was under five
    /// seconds, and re-evaluates the stress pipeline.
    pub fn record_navigation(&mut self, screen: &str, now: DateTime<Utc>) -> Evaluation {
        let previous = self.log.current_screen().map(str::to_string);
        let (rapid, previous_dwell_ms) = self.log.note_screen_entered(screen, now);

        if let (Some(prev_screen), Some(dwell_ms)) = (previous, previous_dwell_ms) {
            self.log.record(
                ActivityEvent {
                    timestamp: now,
                    screen: Some(prev_screen),
                    kind: ActivityKind::ScreenTime { dwell_ms },
                },
                &mut self.store,
            );
        }

        self.log.record(
            ActivityEvent {
                timestamp: now,
                screen: Some(screen.to_string()),
                kind: ActivityKind::Navigation {
                    rapid_transition: rapid,
                },
            },
            &mut self.store,
        );
        self.evaluate(now)
    }

    /// Record a scroll gesture and re-evaluate
    pub fn record_scroll(&mut self, velocity: f64, now: DateTime<Utc>) -> Evaluation {
        let screen = self.log.current_screen().map(str::to_string);
        self.log.record(
            ActivityEvent {
                timestamp: now,
                screen,
                kind: ActivityKind::Scroll { velocity },
            },
            &mut self.store,
        );
        self.evaluate(now)
    }

    /// Record a tap and re-evaluate
    pub fn record_tap(&mut self, now: DateTime<Utc>) -> Evaluation {
        let screen = self.log.current_screen().map(str::to_string);
        self.log.record(
            ActivityEvent {
                timestamp: now,
                screen,
                kind: ActivityKind::Tap,
            },
            &mut self.store,
        );
        self.evaluate(now)
    }

    /// Recompute indicators and the stress score without new input. Useful
    /// for dwell-driven changes where no event arrives.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Evaluation {
        let snapshot = IndicatorCalculator::snapshot(&self.log, now);
        let evaluation = self.aggregator.evaluate(&snapshot);
        if evaluation.crossed_high {
            self.scheduler.on_stress_crossing(
                evaluation.score,
                &snapshot,
                now,
                &mut self.store,
                &mut self.notifier,
            );
        }
        evaluation
    }

    /// Once-per-minute driver: re-evaluate the live signal and check the
    /// daily slots. Safe to call more often; slot firing is keyed on a
    /// persisted per-slot, per-day ledger.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.evaluate(now);
        let local = now.with_timezone(&self.tz).naive_local();
        self.scheduler
            .check_time_triggers(local, now, &mut self.store, &mut self.notifier);
    }

    // ------------------------------------------------------------------
    // Wellness actions
    // ------------------------------------------------------------------

    pub fn record_mood(&mut self, entry: MoodEntry) -> Vec<MilestoneEvent> {
        self.record_wellness(WellnessActionRecord::Mood(entry))
    }

    pub fn record_gratitude(&mut self, entry: GratitudeEntry) -> Vec<MilestoneEvent> {
        self.record_wellness(WellnessActionRecord::Gratitude(entry))
    }

    pub fn record_breathing(&mut self, session: BreathingSession) -> Vec<MilestoneEvent> {
        self.record_wellness(WellnessActionRecord::Breathing(session))
    }

    pub fn record_reflection(&mut self, entry: ReflectionEntry) -> Vec<MilestoneEvent> {
        self.record_wellness(WellnessActionRecord::Reflection(entry))
    }

    /// Append a wellness action to the history and run the milestone
    /// tracker, returning any milestones earned.
    pub fn record_wellness(&mut self, record: WellnessActionRecord) -> Vec<MilestoneEvent> {
        let kind = record.kind();
        let date = record.timestamp().with_timezone(&self.tz).date_naive();

        self.wellness.push(record);
        write_json(&mut self.store, WELLNESS_HISTORY_KEY, &self.wellness);

        self.milestones.record_action(kind, date, &mut self.store)
    }

    // ------------------------------------------------------------------
    // Queries and subscriptions
    // ------------------------------------------------------------------

    /// Mine the full wellness and intervention history into ranked insights
    pub fn generate_insights(&self) -> Vec<Insight> {
        InsightGenerator::generate(&self.wellness, self.scheduler.history(), &self.tz)
    }

    /// Register a stress-change callback for UI reactions
    pub fn subscribe_stress(&mut self, callback: StressCallback) -> SubscriptionToken {
        self.aggregator.subscribe(callback)
    }

    pub fn unsubscribe_stress(&mut self, token: SubscriptionToken) -> bool {
        self.aggregator.unsubscribe(token)
    }

    /// Last published stress score
    pub fn stress_score(&self) -> f64 {
        self.aggregator.current_score()
    }

    pub fn milestone_progress(&self) -> &MilestoneProgress {
        self.milestones.progress()
    }

    pub fn wellness_history(&self) -> &[WellnessActionRecord] {
        &self.wellness
    }

    pub fn set_slot_enabled(&mut self, slot: DailySlot, enabled: bool) {
        self.scheduler
            .set_slot_enabled(slot, enabled, &mut self.store);
    }

    /// Permanently opt out of a trigger category
    pub fn dismiss_interventions(&mut self, kind: InterventionKind) {
        self.scheduler.dismiss(kind, &mut self.store);
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tear down the engine, handing the collaborators back to the host
    pub fn into_parts(self) -> (S, N) {
        (self.store, self.notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FailingNotifier, FailingStore, MemoryStore, RecordingNotifier};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use uuid::Uuid;

    fn engine() -> WellbeingEngine<MemoryStore, RecordingNotifier> {
        WellbeingEngine::new(
            MemoryStore::new(),
            RecordingNotifier::new(),
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    fn at(sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::seconds(sec)
    }

    fn gratitude_at(day: u32) -> GratitudeEntry {
        GratitudeEntry {
            id: Uuid::new_v4(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, day, 20, 0, 0).unwrap(),
            text: "unhurried dinner".to_string(),
            linked_meal_id: None,
        }
    }

    #[test]
    fn test_calm_taps_fire_nothing() {
        let mut engine = engine();

        // Five taps in a minute: navigation_rate = 5, no threshold crossed
        for sec in 0..5 {
            engine.record_tap(at(sec * 10));
        }

        assert_eq!(engine.stress_score(), 0.0);
        assert!(engine.notifier().scheduled().is_empty());
    }

    #[test]
    fn test_long_dwell_notifies_without_intervening() {
        let mut engine = engine();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        engine.subscribe_stress(Box::new(move |change| {
            sink.borrow_mut().push((change.previous, change.score));
        }));

        engine.record_navigation("meal_planner", at(0));

        // Just past the ten-minute mark on one screen
        let eval = engine.evaluate(at(0) + Duration::milliseconds(600_001));
        assert_eq!(eval.score, 0.2);
        assert!(eval.changed, "0.0 -> 0.2 clears the hysteresis band");
        assert!(!eval.crossed_high);

        assert_eq!(*changes.borrow(), vec![(0.0, 0.2)]);
        assert!(
            engine.notifier().scheduled().is_empty(),
            "below the high band, no intervention request"
        );
    }

    #[test]
    fn test_rushed_session_requests_one_break() {
        let mut engine = engine();

        // Fast scrolling feeds the velocity buffer
        for sec in 0..3 {
            engine.record_scroll(620.0, at(sec));
        }
        // Rapid screen hopping sets the rush flag
        engine.record_navigation("recipes", at(4));
        engine.record_navigation("meal_planner", at(6));
        // A burst of taps pushes navigation_rate past 30
        for i in 0..31 {
            engine.record_tap(at(8 + i));
        }

        // scroll 0.2 + rush 0.3 + taps 0.3 = 0.8, one upward crossing
        assert_eq!(engine.stress_score(), 0.8);
        let scheduled = engine.notifier().scheduled();
        assert_eq!(scheduled.len(), 1, "cooldown holds repeat crossings back");

        let (_, content, fire_at) = &scheduled[0];
        assert!(content.title.contains("Slow down"), "rush copy dominates");
        assert_eq!(content.suggested_minutes, Some(7));
        assert_eq!(*fire_at, at(38) + Duration::seconds(5));
    }

    #[test]
    fn test_tick_fires_daily_slot() {
        let mut engine = engine();

        // 11:30 UTC with a zero offset is the pre-lunch slot
        let slot_time = Utc.with_ymd_and_hms(2026, 3, 2, 11, 30, 0).unwrap();
        engine.tick(slot_time);
        assert_eq!(engine.notifier().scheduled().len(), 1);

        // The minute timer re-fires within the same minute; the ledger holds
        engine.tick(slot_time + Duration::seconds(20));
        assert_eq!(engine.notifier().scheduled().len(), 1);

        // Off-minute ticks do nothing
        engine.tick(slot_time + Duration::minutes(5));
        assert_eq!(engine.notifier().scheduled().len(), 1);
    }

    #[test]
    fn test_wellness_actions_earn_milestones() {
        let mut engine = engine();

        let first = engine.record_gratitude(gratitude_at(2));
        assert_eq!(
            first,
            vec![MilestoneEvent::FirstAction {
                kind: crate::types::WellnessKind::Gratitude
            }]
        );

        engine.record_gratitude(gratitude_at(3));
        let third = engine.record_gratitude(gratitude_at(4));
        assert!(third.contains(&MilestoneEvent::StreakReached {
            kind: crate::types::WellnessKind::Gratitude,
            days: 3
        }));

        assert_eq!(engine.wellness_history().len(), 3);
    }

    #[test]
    fn test_state_survives_engine_restart() {
        let mut engine = engine();
        engine.record_gratitude(gratitude_at(2));
        engine.record_gratitude(gratitude_at(3));

        let (store, _) = engine.into_parts();
        let restarted = WellbeingEngine::new(
            store,
            RecordingNotifier::new(),
            FixedOffset::east_opt(0).unwrap(),
        );

        assert_eq!(restarted.wellness_history().len(), 2);
        let streak = &restarted.milestone_progress().streaks_by_kind
            [&crate::types::WellnessKind::Gratitude];
        assert_eq!(streak.current, 2);
    }

    #[test]
    fn test_dismissed_stress_interventions_stay_quiet() {
        let mut engine = engine();
        engine.dismiss_interventions(InterventionKind::StressTriggered);

        for sec in 0..3 {
            engine.record_scroll(620.0, at(sec));
        }
        engine.record_navigation("recipes", at(4));
        engine.record_navigation("meal_planner", at(6));
        for i in 0..31 {
            engine.record_tap(at(8 + i));
        }

        assert_eq!(engine.stress_score(), 0.8);
        assert!(engine.notifier().scheduled().is_empty());
    }

    #[test]
    fn test_failing_collaborators_never_fail_an_operation() {
        let mut engine = WellbeingEngine::new(
            FailingStore,
            FailingNotifier,
            FixedOffset::east_opt(0).unwrap(),
        );

        // Full signal path up to a high-stress crossing: every persist and
        // the intervention request are refused, the pipeline keeps going
        for sec in 0..3 {
            engine.record_scroll(620.0, at(sec));
        }
        engine.record_navigation("recipes", at(4));
        engine.record_navigation("meal_planner", at(6));
        for i in 0..31 {
            engine.record_tap(at(8 + i));
        }
        assert_eq!(engine.stress_score(), 0.8);

        // Wellness recording still reaches the milestone tracker
        let events = engine.record_gratitude(gratitude_at(2));
        assert_eq!(
            events,
            vec![MilestoneEvent::FirstAction {
                kind: crate::types::WellnessKind::Gratitude
            }]
        );
        assert_eq!(engine.wellness_history().len(), 1);

        // Slot check and insight mining run against the in-memory state
        engine.tick(Utc.with_ymd_and_hms(2026, 3, 2, 11, 30, 0).unwrap());
        assert!(engine.generate_insights().is_empty());
    }

    #[test]
    fn test_insights_flow_from_recorded_history() {
        let mut engine = engine();
        for day in [2, 3, 4] {
            engine.record_breathing(BreathingSession {
                id: Uuid::new_v4(),
                timestamp: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
                context: "pre_meal".to_string(),
                completed_cycles: 5,
                duration_sec: 150,
            });
        }

        let insights = engine.generate_insights();
        assert_eq!(insights.len(), 2);
        assert!(insights[0].confidence >= insights[1].confidence);

        // Read-only and re-callable
        let again = engine.generate_insights();
        assert_eq!(again.len(), insights.len());
    }

    #[test]
    fn test_unsubscribe_stops_ui_updates() {
        let mut engine = engine();
        let seen = Rc::new(RefCell::new(0u32));
        let sink = seen.clone();
        let token = engine.subscribe_stress(Box::new(move |_| {
            *sink.borrow_mut() += 1;
        }));

        engine.record_navigation("home", at(0));
        engine.evaluate(at(0) + Duration::milliseconds(600_001));
        assert_eq!(*seen.borrow(), 1);

        assert!(engine.unsubscribe_stress(token));
        // Switching screens resets the dwell and drops the score back to 0.0,
        // a change the removed subscriber must not see
        engine.record_navigation("recipes", at(0) + Duration::milliseconds(700_000));
        assert_eq!(engine.stress_score(), 0.0);
        assert_eq!(*seen.borrow(), 1);
    }
}
