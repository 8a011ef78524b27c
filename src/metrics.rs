//! Derived values for the dashboards: one-rep-max estimates, body
//! composition targets and cohort activity. Everything here is a pure
//! function of the records passed in; bad records are skipped, never
//! reported.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::body::{ActivityLevel, BodyComposition, GoalDiet};
use crate::client::ClientId;
use crate::dates::{self, YearMonth};
use crate::training::{SetMeasure, TrainingSession};

/// The Epley coefficient.
pub const EPLEY_COEFFICIENT: f64 = 0.0333;

/// Estimated one-repetition maximum for a set of `reps` reps at `load_kg`.
pub fn one_rep_max(load_kg: f64, reps: u32) -> f64 {
    load_kg * (1.0 + EPLEY_COEFFICIENT * f64::from(reps))
}

/// The grouping key for one-rep-max estimates.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct LiftKey {
    pub client_id: ClientId,
    pub date: Date,
    pub exercise: String,
}

/// Estimates the one-rep max of every rep-based set and averages the
/// estimates per client, date and exercise. Timed holds are left out.
pub fn estimate_one_rep_max<'a>(
    sessions: impl IntoIterator<Item = &'a TrainingSession>,
) -> BTreeMap<LiftKey, f64> {
    let mut groups: BTreeMap<LiftKey, (f64, u32)> = BTreeMap::new();

    for session in sessions {
        let reps = match session.measure() {
            SetMeasure::Reps(reps) => reps,
            SetMeasure::Duration(_) => continue,
        };

        if !session.load_kg().is_finite() {
            continue;
        }

        let key = LiftKey {
            client_id: session.client_id().clone(),
            date: session.date(),
            exercise: session.exercise().to_owned(),
        };

        let (sum, count) = groups.entry(key).or_insert((0.0, 0));
        *sum += one_rep_max(session.load_kg(), reps);
        *count += 1;
    }

    groups
        .into_iter()
        .map(|(key, (sum, count))| (key, sum / f64::from(count)))
        .collect()
}

/// One averaged estimate, flattened for responses.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OneRepMax {
    pub client_id: ClientId,

    #[serde(with = "dates::iso")]
    pub date: Date,

    pub exercise: String,

    pub one_rep_max: f64,
}

/// Flattens estimates into rows, newest first; rows on the same date
/// stay in exercise order.
pub fn newest_first(estimates: BTreeMap<LiftKey, f64>) -> Vec<OneRepMax> {
    let mut rows = estimates
        .into_iter()
        .map(|(key, one_rep_max)| OneRepMax {
            client_id: key.client_id,
            date: key.date,
            exercise: key.exercise,
            one_rep_max,
        })
        .collect::<Vec<_>>();

    rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.exercise.cmp(&b.exercise)));
    rows
}

/// The progress table for one client and exercise, newest first.
pub fn exercise_history(rows: &[OneRepMax], client: &ClientId, exercise: &str) -> Vec<OneRepMax> {
    rows.iter()
        .filter(|row| &row.client_id == client && row.exercise == exercise)
        .cloned()
        .collect()
}

/// How many distinct days have at least one logged session.
pub fn count_session_days<'a>(sessions: impl IntoIterator<Item = &'a TrainingSession>) -> usize {
    sessions
        .into_iter()
        .map(|session| session.date())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Body-composition snapshot plus everything derived from it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BodyMetrics {
    pub id: Uuid,
    pub client_id: ClientId,

    #[serde(with = "dates::iso")]
    pub measured_on: Date,

    pub body_wt_kg: f64,
    pub body_fat_pct: f64,
    pub height_cm: f64,
    pub fat_mass: f64,
    pub lean_mass: f64,
    pub age: i32,
    pub activity_level: String,
    pub goal_diet: String,
    pub bmr: f64,
    pub tee: f64,
    pub goal_calories: f64,
    pub goal_protein_g: f64,
    pub goal_carbs_g: f64,
    pub goal_fats_g: f64,
}

/// Derives fat and lean mass, age, BMR, TEE and macro targets for each
/// snapshot, in input order. A snapshot whose activity or diet key is
/// missing from the lookup tables, or whose numbers aren't finite, is
/// dropped.
///
/// BMR uses the male-coefficient Mifflin-St Jeor form for everyone.
pub fn derive_body_metrics<'a>(
    snapshots: impl IntoIterator<Item = &'a BodyComposition>,
    activity_levels: &[ActivityLevel],
    goal_diets: &[GoalDiet],
    today: Date,
) -> Vec<BodyMetrics> {
    let multipliers = activity_levels
        .iter()
        .map(|level| (level.key.as_str(), level.multiplier))
        .collect::<HashMap<_, _>>();
    let diets = goal_diets
        .iter()
        .map(|diet| (diet.key.as_str(), diet))
        .collect::<HashMap<_, _>>();

    snapshots
        .into_iter()
        .filter_map(|snapshot| {
            let m = &snapshot.measurement;
            let multiplier = *multipliers.get(m.activity_level.as_str())?;
            let diet = *diets.get(m.goal_diet.as_str())?;

            let fat_mass = m.body_wt_kg * m.body_fat_pct / 100.0;
            let lean_mass = m.body_wt_kg - fat_mass;
            let age = dates::age_on(m.date_of_birth, today);
            let bmr = 10.0 * m.body_wt_kg + 6.25 * m.height_cm - 5.0 * f64::from(age) + 5.0;
            let tee = bmr * multiplier;
            let goal_calories = tee + diet.caloric_adjustment;
            let goal_protein_g = goal_calories * diet.protein_pct / 100.0 / 4.0;
            let goal_carbs_g = goal_calories * diet.carbs_pct / 100.0 / 4.0;
            let goal_fats_g = goal_calories * diet.fats_pct / 100.0 / 9.0;

            if !goal_protein_g.is_finite()
                || !goal_carbs_g.is_finite()
                || !goal_fats_g.is_finite()
                || !lean_mass.is_finite()
            {
                return None;
            }

            Some(BodyMetrics {
                id: snapshot.id,
                client_id: snapshot.client_id.clone(),
                measured_on: m.measured_on,
                body_wt_kg: round_to(m.body_wt_kg, 2),
                body_fat_pct: round_to(m.body_fat_pct, 2),
                height_cm: m.height_cm,
                fat_mass: round_to(fat_mass, 2),
                lean_mass: round_to(lean_mass, 2),
                age,
                activity_level: m.activity_level.clone(),
                goal_diet: m.goal_diet.clone(),
                bmr: round_to(bmr, 0),
                tee: round_to(tee, 0),
                goal_calories: round_to(goal_calories, 0),
                goal_protein_g: round_to(goal_protein_g, 0),
                goal_carbs_g: round_to(goal_carbs_g, 0),
                goal_fats_g: round_to(goal_fats_g, 0),
            })
        })
        .collect()
}

/// Splits derived snapshots into the latest one and the rest, both
/// ordered newest first.
pub fn latest_body_metrics(mut metrics: Vec<BodyMetrics>) -> (Option<BodyMetrics>, Vec<BodyMetrics>) {
    metrics.sort_by(|a, b| b.measured_on.cmp(&a.measured_on));

    if metrics.is_empty() {
        (None, metrics)
    } else {
        let latest = metrics.remove(0);
        (Some(latest), metrics)
    }
}

/// Active-client counts for a month and the month before it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CohortSummary {
    pub month: YearMonth,
    pub active_clients: usize,
    pub previous_active_clients: usize,

    /// Relative change against the previous month, in percent. `None`
    /// when the previous month had nobody to compare against.
    pub change_percent: Option<f64>,
}

/// Counts the clients with at least one session in `reference_month`
/// and in the month before.
pub fn summarize_cohort_activity<'a>(
    sessions: impl IntoIterator<Item = &'a TrainingSession>,
    reference_month: YearMonth,
) -> CohortSummary {
    let previous_month = reference_month.previous();
    let mut current = BTreeSet::new();
    let mut previous = BTreeSet::new();

    for session in sessions {
        if reference_month.contains(session.date()) {
            current.insert(session.client_id());
        } else if previous_month.contains(session.date()) {
            previous.insert(session.client_id());
        }
    }

    let active_clients = current.len();
    let previous_active_clients = previous.len();

    CohortSummary {
        month: reference_month,
        active_clients,
        previous_active_clients,
        change_percent: percent_change(previous_active_clients, active_clients),
    }
}

fn percent_change(previous: usize, current: usize) -> Option<f64> {
    if previous == 0 {
        return None;
    }

    let previous = previous as f64;
    Some((current as f64 - previous) / previous * 100.0)
}

/// Session days per client active in a month.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientSessions {
    pub client_id: ClientId,
    pub sessions: usize,
}

/// For each client active in `month`, the number of distinct days they
/// trained that month, in client order.
pub fn sessions_per_active_client<'a>(
    sessions: impl IntoIterator<Item = &'a TrainingSession>,
    month: YearMonth,
) -> Vec<ClientSessions> {
    let mut days: BTreeMap<&ClientId, BTreeSet<Date>> = BTreeMap::new();

    for session in sessions {
        if month.contains(session.date()) {
            days.entry(session.client_id())
                .or_default()
                .insert(session.date());
        }
    }

    days.into_iter()
        .map(|(client_id, days)| ClientSessions {
            client_id: client_id.clone(),
            sessions: days.len(),
        })
        .collect()
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
