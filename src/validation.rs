// src/validation.rs
//! Field bounds shared by registration, profile updates, session logs and
//! custom workouts.
use crate::error::{AppError, AppResult};
use crate::models::{
    CustomExerciseRequest, CustomWorkoutRequest, ExerciseLogRequest, RegisterRequest, User,
    UserPreferences,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::ops::RangeInclusive;

pub const AGE: RangeInclusive<i64> = 13..=120;
pub const HEIGHT: RangeInclusive<f64> = 30.0..=250.0;
pub const BODY_WEIGHT: RangeInclusive<f64> = 20.0..=500.0;
pub const DURATION_WEEKS: RangeInclusive<i32> = 1..=52;
pub const DAY: RangeInclusive<i32> = 1..=7;
pub const SETS: RangeInclusive<i32> = 1..=20;
pub const REPS: RangeInclusive<i32> = 1..=100;
pub const RIR: RangeInclusive<i32> = 0..=10;
pub const LIFT_WEIGHT: RangeInclusive<f64> = 0.0..=1000.0;
pub const MIN_PASSWORD_LEN: usize = 8;

pub const SEXES: &[&str] = &["male", "female", "other"];
pub const ACTIVITY_LEVELS: &[&str] = &[
    "sedentary",
    "lightly_active",
    "moderately_active",
    "very_active",
    "extra_active",
];
pub const GOALS: &[&str] = &["weight_loss", "muscle_gain", "maintenance", "endurance"];
pub const WORKOUT_TYPES: &[&str] = &[
    "hypertrophy",
    "strength",
    "endurance",
    "powerlifting",
    "cardio",
    "flexibility",
];

const MAX_PREFERENCES: usize = 50;
const MAX_ALLERGIES: usize = 20;
const MAX_DISLIKES: usize = 30;

fn ensure(ok: bool, msg: &str) -> AppResult<()> {
    if ok {
        Ok(())
    } else {
        Err(AppError::validation(msg))
    }
}

pub fn validate_password(password: &str) -> AppResult<()> {
    ensure(
        password.chars().count() >= MIN_PASSWORD_LEN,
        "password must be at least 8 characters",
    )
}

pub fn validate_registration(req: &RegisterRequest) -> AppResult<()> {
    let email = req.email.trim();
    ensure(
        email.len() > 2 && email.contains('@') && !email.starts_with('@') && !email.ends_with('@'),
        "email must be a valid address",
    )?;
    validate_password(&req.password)?;
    ensure(!req.name.trim().is_empty(), "name is required")?;
    ensure(AGE.contains(&i64::from(req.age)), "age must be between 13 and 120")?;
    ensure(SEXES.contains(&req.sex.as_str()), "sex must be one of male, female, other")?;
    ensure(HEIGHT.contains(&req.height), "height must be between 30 and 250")?;
    ensure(BODY_WEIGHT.contains(&req.weight), "weight must be between 20 and 500")?;
    ensure(
        ACTIVITY_LEVELS.contains(&req.activity_level.as_str()),
        "activity_level is not a recognised activity level",
    )?;
    ensure(GOALS.contains(&req.goal.as_str()), "goal is not a recognised goal")?;
    if let Some(budget) = req.weekly_budget {
        ensure(budget >= 0.0, "weekly_budget must not be negative")?;
    }
    Ok(())
}

/// Applies a free-form profile update to `user`.
///
/// Each key is gated on its own: a value that is out of range, of the wrong
/// JSON type, or addressed to an unknown key is skipped while the remaining
/// fields still apply. Returns the names of the fields that changed.
pub fn apply_profile_updates(user: &mut User, updates: &Map<String, Value>) -> Vec<&'static str> {
    let mut applied = Vec::new();

    for (key, value) in updates {
        match key.as_str() {
            "name" => {
                if let Some(name) = value.as_str().map(str::trim).filter(|n| !n.is_empty()) {
                    user.name = name.to_string();
                    applied.push("name");
                }
            }
            "age" => {
                if let Some(age) = value.as_i64().filter(|a| AGE.contains(a)) {
                    user.age = age as i32;
                    applied.push("age");
                }
            }
            "height" => {
                if let Some(height) = value.as_f64().filter(|h| HEIGHT.contains(h)) {
                    user.height = height;
                    applied.push("height");
                }
            }
            "weight" => {
                if let Some(weight) = value.as_f64().filter(|w| BODY_WEIGHT.contains(w)) {
                    user.weight = weight;
                    applied.push("weight");
                }
            }
            "activity_level" => {
                if let Some(level) = value.as_str().filter(|l| ACTIVITY_LEVELS.contains(l)) {
                    user.activity_level = level.to_string();
                    applied.push("activity_level");
                }
            }
            "goal" => {
                if let Some(goal) = value.as_str().filter(|g| GOALS.contains(g)) {
                    user.goal = goal.to_string();
                    applied.push("goal");
                }
            }
            "weekly_budget" => {
                if let Some(budget) = value.as_f64().filter(|b| *b >= 0.0) {
                    user.weekly_budget = Some(budget);
                    applied.push("weekly_budget");
                }
            }
            // Needs a catalog lookup and a transaction; the handler applies it.
            "program_id" => {}
            _ => {}
        }
    }

    applied
}

/// The program a profile update asks to switch to, if the value is a
/// positive integer id. Whether that program exists is up to the caller.
pub fn requested_program_id(updates: &Map<String, Value>) -> Option<i32> {
    updates
        .get("program_id")?
        .as_i64()
        .filter(|id| *id > 0)
        .and_then(|id| i32::try_from(id).ok())
}

pub fn validate_preferences(prefs: &UserPreferences) -> AppResult<()> {
    ensure(
        prefs.preferences.len() <= MAX_PREFERENCES,
        "too many preferences (max 50)",
    )?;
    ensure(prefs.allergies.len() <= MAX_ALLERGIES, "too many allergies (max 20)")?;
    ensure(prefs.dislikes.len() <= MAX_DISLIKES, "too many dislikes (max 30)")
}

/// Checks the shape of a completion payload: one entry per template
/// exercise, parallel per-set arrays, and per-set bounds.
pub fn validate_exercise_logs(logs: &[ExerciseLogRequest]) -> AppResult<()> {
    ensure(!logs.is_empty(), "at least one exercise log is required")?;

    let mut seen = HashSet::new();
    for log in logs {
        let id = log.program_workout_exercise_id;
        if !seen.insert(id) {
            return Err(AppError::validation(format!(
                "program_workout_exercise_id {} is logged more than once",
                id
            )));
        }
        if log.actual_reps.is_empty() || log.actual_reps.len() != log.actual_rir.len() {
            return Err(AppError::validation(format!(
                "exercise {}: actual_reps and actual_rir must be non-empty and of equal length",
                id
            )));
        }
        if log.actual_reps.len() > *SETS.end() as usize {
            return Err(AppError::validation(format!(
                "exercise {}: at most 20 sets can be logged",
                id
            )));
        }
        if log.actual_reps.iter().any(|r| !REPS.contains(r)) {
            return Err(AppError::validation(format!(
                "exercise {}: reps must be between 1 and 100",
                id
            )));
        }
        if log.actual_rir.iter().any(|r| !RIR.contains(r)) {
            return Err(AppError::validation(format!(
                "exercise {}: rir must be between 0 and 10",
                id
            )));
        }
        if let Some(weight) = log.weight {
            ensure(
                LIFT_WEIGHT.contains(&weight),
                "weight must be between 0 and 1000",
            )?;
        }
    }
    Ok(())
}

pub fn validate_workout_type(workout_type: &str) -> AppResult<()> {
    if WORKOUT_TYPES.contains(&workout_type) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "invalid workout type: {}",
            workout_type
        )))
    }
}

pub fn validate_duration(weeks: i32) -> AppResult<()> {
    ensure(
        DURATION_WEEKS.contains(&weeks),
        "duration must be between 1 and 52 weeks",
    )
}

pub fn validate_custom_workout(req: &CustomWorkoutRequest) -> AppResult<()> {
    ensure(!req.name.trim().is_empty(), "workout name is required")?;
    validate_workout_type(&req.workout_type)?;
    validate_duration(req.duration_weeks)
}

pub fn validate_day(day: i32) -> AppResult<()> {
    ensure(DAY.contains(&day), "day must be between 1 and 7")
}

pub fn validate_custom_exercise(req: &CustomExerciseRequest) -> AppResult<()> {
    ensure(!req.name.trim().is_empty(), "exercise name is required")?;
    ensure(SETS.contains(&req.sets), "sets must be between 1 and 20")?;
    ensure(REPS.contains(&req.reps), "reps must be between 1 and 100")?;
    ensure(
        LIFT_WEIGHT.contains(&req.weight),
        "weight must be between 0 and 1000",
    )
}

#[cfg(test)]
pub(crate) fn sample_user() -> User {
    use chrono::Utc;
    User {
        id: uuid::Uuid::new_v4(),
        email: "jane@example.com".to_string(),
        password_hash: String::new(),
        name: "Jane Doe".to_string(),
        age: 30,
        sex: "female".to_string(),
        height: 170.0,
        weight: 65.0,
        activity_level: "moderately_active".to_string(),
        goal: "muscle_gain".to_string(),
        weekly_budget: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn updates(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn registration() -> RegisterRequest {
        RegisterRequest {
            email: "jane@example.com".to_string(),
            password: "correct horse".to_string(),
            name: "Jane".to_string(),
            age: 28,
            sex: "female".to_string(),
            height: 168.0,
            weight: 62.5,
            activity_level: "very_active".to_string(),
            goal: "endurance".to_string(),
            program_id: None,
            weekly_budget: Some(40.0),
        }
    }

    #[test]
    fn out_of_range_age_is_dropped_while_name_applies() {
        let mut user = sample_user();
        let applied = apply_profile_updates(&mut user, &updates(json!({"age": 200, "name": "Jane"})));

        assert_eq!(user.age, 30);
        assert_eq!(user.name, "Jane");
        assert_eq!(applied, vec!["name"]);
    }

    #[test]
    fn wrong_types_are_ignored_per_field() {
        let mut user = sample_user();
        let applied = apply_profile_updates(
            &mut user,
            &updates(json!({
                "age": "31",
                "weight": "heavy",
                "goal": 3,
                "height": 180.5,
            })),
        );

        assert_eq!(user.age, 30);
        assert_eq!(user.weight, 65.0);
        assert_eq!(user.goal, "muscle_gain");
        assert_eq!(user.height, 180.5);
        assert_eq!(applied, vec!["height"]);
    }

    #[test]
    fn fractional_age_is_not_an_integer() {
        let mut user = sample_user();
        apply_profile_updates(&mut user, &updates(json!({"age": 31.5})));
        assert_eq!(user.age, 30);
    }

    #[test]
    fn range_edges_are_inclusive() {
        let mut user = sample_user();
        apply_profile_updates(
            &mut user,
            &updates(json!({"age": 13, "height": 250, "weight": 20})),
        );
        assert_eq!(user.age, 13);
        assert_eq!(user.height, 250.0);
        assert_eq!(user.weight, 20.0);

        apply_profile_updates(&mut user, &updates(json!({"age": 121, "weight": 500.1})));
        assert_eq!(user.age, 13);
        assert_eq!(user.weight, 20.0);
    }

    #[test]
    fn program_id_is_left_to_the_caller() {
        let mut user = sample_user();
        let applied = apply_profile_updates(&mut user, &updates(json!({"program_id": 4, "age": 31})));
        assert_eq!(applied, vec!["age"]);

        assert_eq!(requested_program_id(&updates(json!({"program_id": 4}))), Some(4));
        assert_eq!(requested_program_id(&updates(json!({"age": 31}))), None);
        for bad in [json!(0), json!(-3), json!(2.5), json!("4"), json!(i64::from(i32::MAX) + 1)] {
            assert_eq!(requested_program_id(&updates(json!({"program_id": bad}))), None);
        }
    }

    #[test]
    fn closed_sets_gate_enums() {
        let mut user = sample_user();
        apply_profile_updates(
            &mut user,
            &updates(json!({"activity_level": "couch", "goal": "maintenance"})),
        );
        assert_eq!(user.activity_level, "moderately_active");
        assert_eq!(user.goal, "maintenance");
    }

    #[test]
    fn blank_names_and_unknown_keys_are_ignored() {
        let mut user = sample_user();
        let applied = apply_profile_updates(
            &mut user,
            &updates(json!({"name": "   ", "email": "x@y.z", "password_hash": "nope"})),
        );
        assert!(applied.is_empty());
        assert_eq!(user.name, "Jane Doe");
        assert_eq!(user.email, "jane@example.com");
    }

    #[test]
    fn names_are_trimmed() {
        let mut user = sample_user();
        apply_profile_updates(&mut user, &updates(json!({"name": "  Jo  "})));
        assert_eq!(user.name, "Jo");
    }

    #[test]
    fn registration_accepts_valid_payload() {
        assert!(validate_registration(&registration()).is_ok());
    }

    #[test]
    fn registration_rejects_each_bad_field() {
        let cases: Vec<Box<dyn Fn(&mut RegisterRequest)>> = vec![
            Box::new(|r| r.email = "not-an-email".to_string()),
            Box::new(|r| r.password = "short".to_string()),
            Box::new(|r| r.name = " ".to_string()),
            Box::new(|r| r.age = 12),
            Box::new(|r| r.sex = "unknown".to_string()),
            Box::new(|r| r.height = 29.9),
            Box::new(|r| r.weight = 501.0),
            Box::new(|r| r.activity_level = "lazy".to_string()),
            Box::new(|r| r.goal = "bulk".to_string()),
            Box::new(|r| r.weekly_budget = Some(-1.0)),
        ];

        for mutate in cases {
            let mut req = registration();
            mutate(&mut req);
            assert!(matches!(
                validate_registration(&req),
                Err(AppError::Validation(_))
            ));
        }
    }

    fn log(id: i32, reps: Vec<i32>, rir: Vec<i32>) -> ExerciseLogRequest {
        ExerciseLogRequest {
            program_workout_exercise_id: id,
            actual_reps: reps,
            actual_rir: rir,
            weight: None,
        }
    }

    #[test]
    fn exercise_logs_need_parallel_arrays() {
        assert!(validate_exercise_logs(&[log(1, vec![8, 8, 8], vec![2, 2, 1])]).is_ok());
        assert!(validate_exercise_logs(&[log(1, vec![8, 8], vec![2])]).is_err());
        assert!(validate_exercise_logs(&[log(1, vec![], vec![])]).is_err());
        assert!(validate_exercise_logs(&[]).is_err());
    }

    #[test]
    fn exercise_logs_check_set_bounds_and_duplicates() {
        assert!(validate_exercise_logs(&[log(1, vec![0], vec![1])]).is_err());
        assert!(validate_exercise_logs(&[log(1, vec![5], vec![11])]).is_err());
        assert!(validate_exercise_logs(&[log(1, vec![5], vec![1]), log(1, vec![5], vec![1])]).is_err());

        let mut heavy = log(2, vec![5], vec![1]);
        heavy.weight = Some(1000.5);
        assert!(validate_exercise_logs(&[heavy]).is_err());
    }

    #[test]
    fn custom_workout_gates() {
        let mut req = CustomWorkoutRequest {
            name: "Block A".to_string(),
            workout_type: "strength".to_string(),
            duration_weeks: 52,
            completed: false,
        };
        assert!(validate_custom_workout(&req).is_ok());
        req.duration_weeks = 53;
        assert!(validate_custom_workout(&req).is_err());
        req.duration_weeks = 8;
        req.workout_type = "yoga".to_string();
        assert!(validate_custom_workout(&req).is_err());
    }

    #[test]
    fn custom_exercise_gates() {
        let mut req = CustomExerciseRequest {
            name: "Row".to_string(),
            sets: 20,
            reps: 100,
            weight: 0.0,
            completed: false,
        };
        assert!(validate_custom_exercise(&req).is_ok());
        req.sets = 21;
        assert!(validate_custom_exercise(&req).is_err());
        req.sets = 3;
        req.weight = -0.5;
        assert!(validate_custom_exercise(&req).is_err());
        assert!(validate_day(0).is_err());
        assert!(validate_day(7).is_ok());
    }

    #[test]
    fn preference_limits() {
        let mut prefs = UserPreferences::default();
        prefs.allergies = vec!["nuts".to_string(); 20];
        assert!(validate_preferences(&prefs).is_ok());
        prefs.allergies.push("soy".to_string());
        assert!(validate_preferences(&prefs).is_err());
    }
}
