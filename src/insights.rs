//! Insight generation
//!
//! Batch-analyzes the wellness and intervention histories into ranked,
//! confidence-scored observations. Each analysis rule is independent and
//! additive; a rule with insufficient samples simply produces nothing.
//! The generator is read-only over its inputs and safely re-callable.

use crate::types::{
    BreathingSession, GratitudeEntry, Insight, InsightCategory, InterventionRecord, MoodEntry,
    ReflectionEntry, WellnessActionRecord,
};
use chrono::{FixedOffset, Timelike};
use std::collections::HashMap;
use uuid::Uuid;

/// Reflections per meal category before the correlation rule speaks
pub const MIN_MEAL_SAMPLES: usize = 3;
/// Mood entries per hour bucket before the timing rule speaks
pub const MIN_HOUR_SAMPLES: usize = 2;
/// Intervention firings before the dominance rule speaks
pub const MIN_INTERVENTION_SAMPLES: usize = 3;
/// Day samples per side before the gratitude comparison speaks
pub const MIN_GRATITUDE_DAYS: usize = 3;
/// Breathing sessions before either breathing rule speaks
pub const MIN_BREATHING_SAMPLES: usize = 3;

/// Insights returned per request
pub const MAX_INSIGHTS: usize = 5;

/// Generator over the historical record stores
pub struct InsightGenerator;

impl InsightGenerator {
    /// Run every rule and return the qualifying insights, descending by
    /// confidence, truncated to the top five.
    pub fn generate(
        records: &[WellnessActionRecord],
        interventions: &[InterventionRecord],
        tz: &FixedOffset,
    ) -> Vec<Insight> {
        let mut moods = Vec::new();
        let mut gratitudes = Vec::new();
        let mut breathings = Vec::new();
        let mut reflections = Vec::new();
        for record in records {
            match record {
                WellnessActionRecord::Mood(e) => moods.push(e),
                WellnessActionRecord::Gratitude(e) => gratitudes.push(e),
                WellnessActionRecord::Breathing(e) => breathings.push(e),
                WellnessActionRecord::Reflection(e) => reflections.push(e),
            }
        }

        let mut insights = Vec::new();
        insights.extend(meal_mood_insights(&reflections));
        insights.extend(energy_dip_insight(&moods, tz));
        insights.extend(stress_pattern_insight(interventions));
        insights.extend(gratitude_lift_insight(&moods, &gratitudes, tz));
        insights.extend(breathing_insights(&breathings));

        // Stable sort keeps rule order on confidence ties
        insights.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        insights.truncate(MAX_INSIGHTS);
        insights
    }
}

fn make_insight(
    category: InsightCategory,
    title: String,
    message: String,
    confidence: f64,
    suggestion: Option<String>,
    data: HashMap<String, serde_json::Value>,
) -> Insight {
    Insight {
        id: Uuid::new_v4(),
        category,
        title,
        message,
        confidence,
        actionable_suggestion: suggestion,
        supporting_data: if data.is_empty() { None } else { Some(data) },
    }
}

/// Meal-mood correlation: a meal category with enough reflections and a
/// dominant mood yields a fixed-confidence insight per category.
fn meal_mood_insights(reflections: &[&ReflectionEntry]) -> Vec<Insight> {
    let mut by_category: HashMap<&str, Vec<&ReflectionEntry>> = HashMap::new();
    for entry in reflections {
        if let Some(category) = entry.meal_category.as_deref() {
            by_category.entry(category).or_default().push(entry);
        }
    }

    let mut categories: Vec<(&str, Vec<&ReflectionEntry>)> = by_category.into_iter().collect();
    categories.sort_by_key(|(name, _)| name.to_string());

    let mut insights = Vec::new();
    for (category, entries) in categories {
        if entries.len() < MIN_MEAL_SAMPLES {
            continue;
        }

        let mut mood_counts: HashMap<u8, usize> = HashMap::new();
        for entry in &entries {
            *mood_counts.entry(entry.mood_score).or_insert(0) += 1;
        }
        // Ties resolve toward the higher mood score
        let (dominant_mood, _) = mood_counts
            .into_iter()
            .max_by_key(|(score, count)| (*count, *score))
            .expect("non-empty category");
        let avg_energy: f64 = entries.iter().map(|e| e.energy_level as f64).sum::<f64>()
            / entries.len() as f64;

        let mut data = HashMap::new();
        data.insert("samples".to_string(), entries.len().into());
        data.insert("average_energy".to_string(), avg_energy.into());

        if dominant_mood >= 4 && avg_energy >= 3.5 {
            insights.push(make_insight(
                InsightCategory::MealMood,
                format!("{} meals boost your energy", capitalize(category)),
                format!(
                    "You consistently feel good after {} meals, with energy averaging {:.1} out of 5.",
                    category, avg_energy
                ),
                0.8,
                Some(format!("Plan more {} meals on demanding days.", category)),
                data,
            ));
        } else if dominant_mood <= 2 {
            insights.push(make_insight(
                InsightCategory::MealMood,
                format!("{} meals feel heavy", capitalize(category)),
                format!(
                    "Your mood tends to dip after {} meals. It might be worth lighter versions.",
                    category
                ),
                0.7,
                Some(format!("Try a lighter take on {} next time.", category)),
                data,
            ));
        }
    }
    insights
}

/// Energy-dip timing: the lowest-energy hour of the day, when it has enough
/// samples and dips below the midpoint.
fn energy_dip_insight(moods: &[&MoodEntry], tz: &FixedOffset) -> Option<Insight> {
    let mut by_hour: HashMap<u32, Vec<f64>> = HashMap::new();
    for entry in moods {
        let hour = entry.timestamp.with_timezone(tz).hour();
        by_hour
            .entry(hour)
            .or_default()
            .push(entry.energy_level as f64);
    }

    let (dip_hour, dip_avg) = by_hour
        .into_iter()
        .filter(|(_, levels)| levels.len() >= MIN_HOUR_SAMPLES)
        .map(|(hour, levels)| {
            let avg = levels.iter().sum::<f64>() / levels.len() as f64;
            (hour, avg)
        })
        // Global minimum; earliest hour on ties
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)))?;

    if dip_avg >= 3.0 {
        return None;
    }

    let mut data = HashMap::new();
    data.insert("hour".to_string(), dip_hour.into());
    data.insert("average_energy".to_string(), dip_avg.into());

    Some(make_insight(
        InsightCategory::EnergyTiming,
        "Your energy dips in a pattern".to_string(),
        format!(
            "Around {}:00 your energy tends to be lowest, averaging {:.1} out of 5.",
            dip_hour, dip_avg
        ),
        0.75,
        Some("A protein-forward snack before that hour can smooth the dip.".to_string()),
        data,
    ))
}

/// Stress-pattern dominance: the most frequent intervention category, once it
/// has recurred enough to be a pattern.
fn stress_pattern_insight(interventions: &[InterventionRecord]) -> Option<Insight> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in interventions {
        *counts.entry(record.cooldown_key.as_str()).or_insert(0) += 1;
    }

    let (key, count) = counts
        .into_iter()
        .max_by_key(|(key, count)| (*count, std::cmp::Reverse(key.to_string())))?;
    if count < MIN_INTERVENTION_SAMPLES {
        return None;
    }

    let confidence = (count as f64 / 10.0).min(0.9);
    let label = intervention_label(key);

    let mut data = HashMap::new();
    data.insert("category".to_string(), key.into());
    data.insert("count".to_string(), count.into());

    Some(make_insight(
        InsightCategory::StressPattern,
        "A stress pattern keeps recurring".to_string(),
        format!(
            "{} have fired {} times, your most common intervention.",
            label, count
        ),
        confidence,
        Some("Consider building that pause into your routine before it's needed.".to_string()),
        data,
    ))
}

/// Gratitude-mood lift: mean mood on gratitude days versus days without,
/// with enough day samples on each side.
fn gratitude_lift_insight(
    moods: &[&MoodEntry],
    gratitudes: &[&GratitudeEntry],
    tz: &FixedOffset,
) -> Option<Insight> {
    let gratitude_days: std::collections::HashSet<_> = gratitudes
        .iter()
        .map(|e| e.timestamp.with_timezone(tz).date_naive())
        .collect();

    let mut by_day: HashMap<chrono::NaiveDate, Vec<f64>> = HashMap::new();
    for entry in moods {
        let date = entry.timestamp.with_timezone(tz).date_naive();
        by_day.entry(date).or_default().push(entry.mood_score as f64);
    }

    let mut with = Vec::new();
    let mut without = Vec::new();
    for (date, scores) in by_day {
        let day_mean = scores.iter().sum::<f64>() / scores.len() as f64;
        if gratitude_days.contains(&date) {
            with.push(day_mean);
        } else {
            without.push(day_mean);
        }
    }

    if with.len() < MIN_GRATITUDE_DAYS || without.len() < MIN_GRATITUDE_DAYS {
        return None;
    }

    let with_mean = with.iter().sum::<f64>() / with.len() as f64;
    let without_mean = without.iter().sum::<f64>() / without.len() as f64;
    if without_mean <= 0.0 || with_mean <= without_mean * 1.2 {
        return None;
    }

    let lift_pct = ((with_mean - without_mean) / without_mean) * 100.0;
    let mut data = HashMap::new();
    data.insert("days_with_gratitude".to_string(), with.len().into());
    data.insert("days_without".to_string(), without.len().into());
    data.insert("lift_pct".to_string(), lift_pct.into());

    Some(make_insight(
        InsightCategory::GratitudeEffect,
        "Gratitude lifts your mood".to_string(),
        format!(
            "On days you write a gratitude entry your mood runs {:.0}% higher.",
            lift_pct
        ),
        0.85,
        Some("Keep the evening gratitude habit going.".to_string()),
        data,
    ))
}

/// Breathing-context affinity: the most-used session context reinforces a
/// habit; a high completed-cycle average earns a separate dedication insight.
fn breathing_insights(sessions: &[&BreathingSession]) -> Vec<Insight> {
    let mut insights = Vec::new();
    if sessions.len() < MIN_BREATHING_SAMPLES {
        return insights;
    }

    let mut by_context: HashMap<&str, usize> = HashMap::new();
    for session in sessions {
        *by_context.entry(session.context.as_str()).or_insert(0) += 1;
    }
    if let Some((context, count)) = by_context
        .into_iter()
        .max_by_key(|(context, count)| (*count, std::cmp::Reverse(context.to_string())))
    {
        if count >= MIN_BREATHING_SAMPLES {
            let mut data = HashMap::new();
            data.insert("context".to_string(), context.into());
            data.insert("count".to_string(), count.into());
            insights.push(make_insight(
                InsightCategory::BreathingHabit,
                "Breathing has found its moment".to_string(),
                format!(
                    "Most of your breathing sessions ({}) happen at {}. The habit is sticking.",
                    count,
                    context_label(context)
                ),
                0.7,
                None,
                data,
            ));
        }
    }

    let avg_cycles: f64 = sessions
        .iter()
        .map(|s| s.completed_cycles as f64)
        .sum::<f64>()
        / sessions.len() as f64;
    if avg_cycles >= 4.0 {
        let mut data = HashMap::new();
        data.insert("average_cycles".to_string(), avg_cycles.into());
        data.insert("sessions".to_string(), sessions.len().into());
        insights.push(make_insight(
            InsightCategory::BreathingHabit,
            "You stay with your breath".to_string(),
            format!(
                "You complete {:.1} cycles per session on average. Real dedication.",
                avg_cycles
            ),
            0.8,
            None,
            data,
        ));
    }

    insights
}

fn intervention_label(key: &str) -> String {
    match key {
        crate::scheduler::STRESS_BREAK_KEY => "Stress breaks".to_string(),
        crate::scheduler::MEDITATION_KEY => "Meditation suggestions".to_string(),
        other => match other.strip_prefix("slot:") {
            Some(slot) => format!("{} check-ins", capitalize(&slot.replace('_', " "))),
            None => capitalize(other),
        },
    }
}

fn context_label(context: &str) -> String {
    context.replace('_', " ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
