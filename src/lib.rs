//! Wellbeing Engine - In-process behavioral-signal and intervention engine
//!
//! The engine turns raw interaction events into wellbeing interventions
//! through a deterministic pipeline: activity logging → indicator derivation
//! → stress aggregation → intervention scheduling. Alongside the live signal
//! path it tracks wellness-action milestones and mines the recorded history
//! into personalized insights.
//!
//! ## Modules
//!
//! - **Signal path**: [`activity`], [`indicators`], [`stress`], [`scheduler`]
//! - **Wellness path**: [`milestones`], [`insights`]
//! - **Host seams**: [`host`] (record store and notification collaborators)
//! - **Orchestration**: [`engine`]

pub mod activity;
pub mod engine;
pub mod error;
pub mod host;
pub mod indicators;
pub mod insights;
pub mod milestones;
pub mod scheduler;
pub mod stress;
pub mod types;

pub use engine::WellbeingEngine;
pub use error::{NotificationError, StoreError};
pub use host::{MemoryStore, NotificationPort, RecordStore, RecordingNotifier};

// Signal-path exports
pub use stress::{Evaluation, StressCallback, SubscriptionToken};
pub use types::{ActivityEvent, ActivityKind, StressChange, StressSnapshot};

// Wellness-path exports
pub use types::{
    BreathingSession, GratitudeEntry, Insight, InsightCategory, MilestoneEvent, MoodEntry,
    ReflectionEntry, WellnessActionRecord, WellnessKind,
};

// Intervention exports
pub use types::{DailySlot, InterventionKind, InterventionRecord, NotificationContent, NotificationId};

/// Engine version reported to hosts
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
