// src/progression.rs
//! Load suggestions: starting weights estimated from body metrics, and
//! session-to-session adjustments driven by reps in reserve (RIR).
use crate::error::{AppError, AppResult};
use crate::models::{LoggedPerformance, ProgramWorkoutExercise, User};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Smallest load step available with standard plates.
pub const PLATE_INCREMENT: f64 = 2.5;

/// Modifier for exercises missing from the modifier table. Matches the
/// lightest known lift so an unknown movement starts conservatively.
pub const DEFAULT_EXERCISE_MODIFIER: f64 = 0.5;

const BODY_WEIGHT_FACTOR: f64 = 0.6;
const MALE_FACTOR: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl FromStr for Sex {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            "other" => Ok(Sex::Other),
            other => Err(AppError::validation(format!("unknown sex: {}", other))),
        }
    }
}

/// The body metrics the starting-weight estimate depends on.
#[derive(Debug, Clone, Copy)]
pub struct BodyMetrics {
    pub weight: f64,
    pub sex: Sex,
    pub age: i32,
}

impl BodyMetrics {
    pub fn from_user(user: &User) -> AppResult<Self> {
        Ok(BodyMetrics {
            weight: user.weight,
            sex: user.sex.parse()?,
            age: user.age,
        })
    }
}

pub fn round_to_increment(value: f64) -> f64 {
    (value / PLATE_INCREMENT).round() * PLATE_INCREMENT
}

pub fn exercise_modifier(exercise_id: i32) -> f64 {
    match exercise_id {
        1 => 1.0, // bench press
        2 => 0.8, // shoulder press
        3 => 1.2, // squat
        4 => 1.1, // deadlift
        5 => 0.5, // bicep curl
        _ => DEFAULT_EXERCISE_MODIFIER,
    }
}

pub fn age_multiplier(age: i32) -> f64 {
    let age = f64::from(age);
    if age < 25.0 {
        0.9 + (age - 13.0) / 120.0
    } else if age > 35.0 {
        1.1 - (age - 35.0) / 100.0
    } else {
        1.0
    }
}

pub fn base_strength(metrics: &BodyMetrics) -> f64 {
    let mut base = metrics.weight * BODY_WEIGHT_FACTOR;
    if metrics.sex == Sex::Male {
        base *= MALE_FACTOR;
    }
    base * age_multiplier(metrics.age)
}

/// Starting load for one exercise. A positive prescribed weight on the
/// template always wins over the estimate.
pub fn initial_weight(metrics: &BodyMetrics, exercise_id: i32, prescribed: Option<f64>) -> f64 {
    if let Some(weight) = prescribed.filter(|w| *w > 0.0) {
        return weight;
    }
    let estimate = base_strength(metrics) * exercise_modifier(exercise_id);
    round_to_increment(estimate).max(0.0)
}

/// Starting loads for every template exercise, keyed by template exercise
/// id. `None` when there is nothing to suggest for.
pub fn initial_weights<'a, I>(metrics: &BodyMetrics, exercises: I) -> Option<BTreeMap<i32, f64>>
where
    I: IntoIterator<Item = &'a ProgramWorkoutExercise>,
{
    let weights: BTreeMap<i32, f64> = exercises
        .into_iter()
        .map(|e| (e.id, initial_weight(metrics, e.exercise_id, e.prescribed_weight)))
        .collect();
    if weights.is_empty() { None } else { Some(weights) }
}

/// Load to show for a template exercise: the last weight the user logged
/// for that exercise, falling back to the starting estimate.
pub fn suggested_weight(
    metrics: &BodyMetrics,
    exercise: &ProgramWorkoutExercise,
    last_logged: &HashMap<i32, f64>,
) -> f64 {
    match last_logged.get(&exercise.exercise_id) {
        Some(weight) => *weight,
        None => initial_weight(metrics, exercise.exercise_id, exercise.prescribed_weight),
    }
}

pub fn average_rir(actual_rir: &[i32]) -> Option<f64> {
    if actual_rir.is_empty() {
        return None;
    }
    let sum: i64 = actual_rir.iter().map(|r| i64::from(*r)).sum();
    Some(sum as f64 / actual_rir.len() as f64)
}

/// Tiers are checked in order; the first match wins.
pub fn adjustment_multiplier(target_rir: f64, average_rir: f64) -> f64 {
    let difference = target_rir - average_rir;
    if difference >= 2.0 {
        0.90
    } else if difference <= -2.0 {
        1.10
    } else if difference >= 1.0 {
        0.95
    } else if difference <= -1.0 {
        1.05
    } else {
        1.0
    }
}

/// Load for the next session given the load used and the RIR reported for
/// each set. `None` when no sets were reported.
pub fn next_weight(previous_weight: f64, target_rir: i32, actual_rir: &[i32]) -> Option<f64> {
    let average = average_rir(actual_rir)?;
    let multiplier = adjustment_multiplier(f64::from(target_rir), average);
    Some(round_to_increment(previous_weight * multiplier).max(0.0))
}

/// Next-session loads for every exercise logged in a session, keyed by
/// template exercise id. `None` when the session has no usable logs.
pub fn next_weights(logs: &[LoggedPerformance]) -> Option<BTreeMap<i32, f64>> {
    let weights: BTreeMap<i32, f64> = logs
        .iter()
        .filter_map(|log| {
            next_weight(log.weight, log.target_rir, &log.actual_rir)
                .map(|w| (log.program_workout_exercise_id, w))
        })
        .collect();
    if weights.is_empty() { None } else { Some(weights) }
}
