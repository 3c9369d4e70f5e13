// src/programs.rs
use crate::auth;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{
    AssignProgramRequest, CompleteSessionRequest, LoggedPerformance, Program, ProgramWorkout,
    ProgramWorkoutExercise, StartSessionRequest, User, UserProgram,
};
use crate::progression::{self, BodyMetrics};
use crate::validation;
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use chrono::Utc;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_HISTORY_LIMIT: i64 = 10;
const MAX_HISTORY_LIMIT: i64 = 100;

pub fn init_public_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_programs);
}

/// Mounted under `/programs`.
pub fn init_program_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(my_program);
    cfg.service(my_initial_weights);
    cfg.service(assign);
    cfg.service(get_program);
}

/// Mounted under `/exercises`.
pub fn init_exercise_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_exercises);
    cfg.service(get_exercise);
}

/// Mounted under `/workouts`.
pub fn init_workout_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(start_session);
    cfg.service(complete_session);
    cfg.service(history);
    cfg.service(next_weights);
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutTemplate {
    #[serde(flatten)]
    pub workout: ProgramWorkout,
    pub exercises: Vec<ProgramWorkoutExercise>,
}

/// A program with its workouts (by day) and their exercises (by order).
#[derive(Debug, Clone, Serialize)]
pub struct ProgramTemplate {
    #[serde(flatten)]
    pub program: Program,
    pub workouts: Vec<WorkoutTemplate>,
}

impl ProgramTemplate {
    pub fn assemble(
        program: Program,
        workouts: Vec<ProgramWorkout>,
        exercises: Vec<ProgramWorkoutExercise>,
    ) -> Self {
        let mut by_workout: HashMap<i32, Vec<ProgramWorkoutExercise>> = HashMap::new();
        for exercise in exercises {
            by_workout
                .entry(exercise.program_workout_id)
                .or_default()
                .push(exercise);
        }
        let workouts = workouts
            .into_iter()
            .map(|workout| {
                let mut exercises = by_workout.remove(&workout.id).unwrap_or_default();
                exercises.sort_by_key(|e| e.exercise_order);
                WorkoutTemplate { workout, exercises }
            })
            .collect();
        ProgramTemplate { program, workouts }
    }

    pub fn exercises(&self) -> impl Iterator<Item = &ProgramWorkoutExercise> {
        self.workouts.iter().flat_map(|w| w.exercises.iter())
    }

    pub fn workout(&self, program_workout_id: i32) -> Option<&WorkoutTemplate> {
        self.workouts.iter().find(|w| w.workout.id == program_workout_id)
    }
}

/// Program templates never change once seeded, so they are cached whole.
#[derive(Clone)]
pub struct ProgramCatalog {
    cache: Cache<i32, Arc<ProgramTemplate>>,
}

impl ProgramCatalog {
    pub fn new(capacity: u64) -> Self {
        ProgramCatalog {
            cache: Cache::new(capacity),
        }
    }

    pub async fn get(&self, pool: &PgPool, program_id: i32) -> AppResult<Option<Arc<ProgramTemplate>>> {
        if let Some(template) = self.cache.get(&program_id).await {
            tracing::debug!("Program cache hit for {}", program_id);
            return Ok(Some(template));
        }

        let Some(program) = db::get_program_by_id(pool, program_id).await? else {
            return Ok(None);
        };
        let workouts = db::get_program_workouts(pool, program_id).await?;
        let exercises = db::get_program_exercises(pool, program_id).await?;

        let template = Arc::new(ProgramTemplate::assemble(program, workouts, exercises));
        self.cache.insert(program_id, template.clone()).await;
        Ok(Some(template))
    }

    async fn require(&self, pool: &PgPool, program_id: i32) -> AppResult<Arc<ProgramTemplate>> {
        self.get(pool, program_id)
            .await?
            .ok_or_else(|| AppError::not_found("Program not found"))
    }
}

/// Makes `program_id` the user's only active program. Runs on the caller's
/// transaction; the user row lock orders concurrent assignments.
pub async fn assign_program(
    conn: &mut PgConnection,
    user_id: Uuid,
    program_id: i32,
) -> AppResult<UserProgram> {
    db::lock_user(&mut *conn, user_id).await?;
    let replaced = db::deactivate_user_programs(&mut *conn, user_id).await?;
    let user_program = db::create_user_program(&mut *conn, user_id, program_id, Utc::now())
        .await
        .map_err(|e| {
            AppError::from(e).on_unique_violation(
                db::ONE_ACTIVE_PROGRAM_INDEX,
                "Another program assignment for this user is in progress",
            )
        })?;
    tracing::info!(
        "Assigned program {} to user {} (replaced {} active)",
        program_id,
        user_id,
        replaced
    );
    Ok(user_program)
}

async fn require_active_program(pool: &PgPool, user_id: Uuid) -> AppResult<UserProgram> {
    db::get_active_user_program(pool, user_id)
        .await?
        .ok_or_else(|| AppError::conflict("No active program; assign one first"))
}

async fn require_user(pool: &PgPool, user_id: Uuid) -> AppResult<User> {
    db::get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))
}

#[derive(Deserialize)]
pub struct GoalQuery {
    pub goal: Option<String>,
}

#[get("/programs")]
pub async fn list_programs(
    pool: web::Data<PgPool>,
    query: web::Query<GoalQuery>,
) -> AppResult<HttpResponse> {
    let goal = query
        .goal
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| AppError::validation("goal query parameter is required"))?;
    let programs = db::get_programs_by_goal(&pool, goal).await?;
    Ok(HttpResponse::Ok().json(programs))
}

#[get("/{id:\\d+}")]
pub async fn get_program(
    pool: web::Data<PgPool>,
    catalog: web::Data<ProgramCatalog>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let template = catalog.require(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&*template))
}

#[get("")]
pub async fn list_exercises(pool: web::Data<PgPool>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(db::get_all_exercises(&pool).await?))
}

#[get("/{id:\\d+}")]
pub async fn get_exercise(
    pool: web::Data<PgPool>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let exercise = db::get_exercise_by_id(&pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Exercise not found"))?;
    Ok(HttpResponse::Ok().json(exercise))
}

#[post("/assign")]
pub async fn assign(
    pool: web::Data<PgPool>,
    catalog: web::Data<ProgramCatalog>,
    req: HttpRequest,
    body: web::Json<AssignProgramRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    catalog.require(&pool, body.program_id).await?;

    let mut tx = pool.begin().await?;
    let user_program = assign_program(&mut tx, user_id, body.program_id).await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(user_program))
}

#[derive(Serialize)]
struct SuggestedExercise<'a> {
    #[serde(flatten)]
    exercise: &'a ProgramWorkoutExercise,
    suggested_weight: f64,
}

#[derive(Serialize)]
struct SuggestedWorkout<'a> {
    #[serde(flatten)]
    workout: &'a ProgramWorkout,
    exercises: Vec<SuggestedExercise<'a>>,
}

#[get("/me")]
pub async fn my_program(
    pool: web::Data<PgPool>,
    catalog: web::Data<ProgramCatalog>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let user_program = require_active_program(&pool, user_id).await?;
    let user = require_user(&pool, user_id).await?;
    let template = catalog.require(&pool, user_program.program_id).await?;

    let metrics = BodyMetrics::from_user(&user)?;
    let last_logged = db::get_last_weights_by_exercise(&pool, user_id).await?;

    let workouts: Vec<SuggestedWorkout> = template
        .workouts
        .iter()
        .map(|w| SuggestedWorkout {
            workout: &w.workout,
            exercises: w
                .exercises
                .iter()
                .map(|exercise| SuggestedExercise {
                    exercise,
                    suggested_weight: progression::suggested_weight(&metrics, exercise, &last_logged),
                })
                .collect(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "user_program": user_program,
        "program": template.program,
        "workouts": workouts,
    })))
}

#[get("/me/initial-weights")]
pub async fn my_initial_weights(
    pool: web::Data<PgPool>,
    catalog: web::Data<ProgramCatalog>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let user_program = require_active_program(&pool, user_id).await?;
    let user = require_user(&pool, user_id).await?;
    let template = catalog.require(&pool, user_program.program_id).await?;

    let metrics = BodyMetrics::from_user(&user)?;
    let weights = progression::initial_weights(&metrics, template.exercises())
        .ok_or_else(|| AppError::not_found("The active program has no exercises"))?;

    Ok(HttpResponse::Ok().json(json!({
        "program_id": user_program.program_id,
        "weights": weights,
    })))
}

#[post("/start")]
pub async fn start_session(
    pool: web::Data<PgPool>,
    catalog: web::Data<ProgramCatalog>,
    req: HttpRequest,
    body: web::Json<StartSessionRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let user_program = require_active_program(&pool, user_id).await?;
    let template = catalog.require(&pool, user_program.program_id).await?;
    if template.workout(body.program_workout_id).is_none() {
        return Err(AppError::not_found(
            "Program workout not found in the active program",
        ));
    }

    let session =
        db::create_workout_session(&pool, user_program.id, body.program_workout_id, Utc::now())
            .await?;
    tracing::info!("User {} started session {}", user_id, session.id);
    Ok(HttpResponse::Created().json(session))
}

/// Pairs each logged entry with its template exercise, failing on entries
/// that belong to another workout.
fn match_templates<'a>(
    templates: &'a [ProgramWorkoutExercise],
    body: &CompleteSessionRequest,
) -> AppResult<Vec<&'a ProgramWorkoutExercise>> {
    body.exercises
        .iter()
        .map(|log| {
            templates
                .iter()
                .find(|t| t.id == log.program_workout_exercise_id)
                .ok_or_else(|| {
                    AppError::validation(format!(
                        "program_workout_exercise_id {} is not part of this workout",
                        log.program_workout_exercise_id
                    ))
                })
        })
        .collect()
}

#[post("/{id:\\d+}/complete")]
pub async fn complete_session(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<CompleteSessionRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let session_id = path.into_inner();
    validation::validate_exercise_logs(&body.exercises)?;

    let session = db::get_session_for_user(&pool, session_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Workout session not found"))?;
    let templates = db::get_workout_exercises(&pool, session.program_workout_id).await?;
    let matched = match_templates(&templates, &body)?;

    let user = require_user(&pool, user_id).await?;
    let metrics = BodyMetrics::from_user(&user)?;
    let last_logged = db::get_last_weights_by_exercise(&pool, user_id).await?;

    let performances: Vec<LoggedPerformance> = body
        .exercises
        .iter()
        .zip(&matched)
        .map(|(log, template)| LoggedPerformance {
            program_workout_exercise_id: template.id,
            target_rir: template.target_rir,
            weight: log
                .weight
                .unwrap_or_else(|| progression::suggested_weight(&metrics, template, &last_logged)),
            actual_rir: log.actual_rir.clone(),
        })
        .collect();

    let mut tx = pool.begin().await?;
    db::lock_session(&mut *tx, session.id).await?;
    if db::count_session_logs(&mut *tx, session.id).await? > 0 {
        return Err(AppError::conflict("Workout session is already completed"));
    }
    for (log, performance) in body.exercises.iter().zip(&performances) {
        db::create_exercise_log(
            &mut *tx,
            session.id,
            performance.program_workout_exercise_id,
            performance.weight,
            &log.actual_reps,
            &log.actual_rir,
        )
        .await
        .map_err(|e| {
            AppError::from(e).on_unique_violation(
                db::ONE_LOG_PER_EXERCISE_KEY,
                "Workout session is already completed",
            )
        })?;
    }
    tx.commit().await?;

    tracing::info!(
        "User {} completed session {} with {} exercises",
        user_id,
        session.id,
        performances.len()
    );
    Ok(HttpResponse::Ok().json(json!({
        "session_id": session.id,
        "logged": performances.len(),
        "next_weights": progression::next_weights(&performances),
    })))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

fn history_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

#[get("/history")]
pub async fn history(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    query: web::Query<HistoryQuery>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let user_program = require_active_program(&pool, user_id).await?;
    let sessions =
        db::get_sessions_by_user_program(&pool, user_program.id, history_limit(query.limit)).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

#[derive(Deserialize)]
pub struct NextWeightsQuery {
    pub program_workout_id: i32,
}

#[get("/next-weights")]
pub async fn next_weights(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    query: web::Query<NextWeightsQuery>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let no_history = || AppError::not_found("No previous workout session found");

    let session = db::get_last_logged_session(&pool, user_id, query.program_workout_id)
        .await?
        .ok_or_else(no_history)?;
    let performances = db::get_logged_performance(&pool, session.id).await?;
    let weights = progression::next_weights(&performances).ok_or_else(no_history)?;

    Ok(HttpResponse::Ok().json(json!({
        "program_workout_id": query.program_workout_id,
        "based_on_session": session.id,
        "weights": weights,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExerciseLogRequest;

    fn program() -> Program {
        Program {
            id: 1,
            name: "Base Strength".to_string(),
            description: String::new(),
            goal: "muscle_gain".to_string(),
            estimated_weeks: 8,
            created_at: Utc::now(),
        }
    }

    fn workout(id: i32, day: i32) -> ProgramWorkout {
        ProgramWorkout {
            id,
            program_id: 1,
            name: format!("Day {}", day),
            day_of_week: day,
            description: String::new(),
        }
    }

    fn template(id: i32, program_workout_id: i32, order: i32) -> ProgramWorkoutExercise {
        ProgramWorkoutExercise {
            id,
            program_workout_id,
            exercise_id: 1,
            sets: 3,
            reps: 5,
            target_rir: 2,
            prescribed_weight: None,
            exercise_order: order,
            notes: String::new(),
        }
    }

    #[test]
    fn assemble_groups_exercises_under_their_workout() {
        let template = ProgramTemplate::assemble(
            program(),
            vec![workout(10, 1), workout(20, 3), workout(30, 5)],
            vec![template(2, 10, 2), template(1, 10, 1), template(3, 20, 1)],
        );
        assert_eq!(template.workouts.len(), 3);
        let first: Vec<i32> = template.workouts[0].exercises.iter().map(|e| e.id).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(template.workouts[1].exercises.len(), 1);
        assert!(template.workouts[2].exercises.is_empty());
        assert_eq!(template.exercises().count(), 3);
        assert!(template.workout(20).is_some());
        assert!(template.workout(99).is_none());
    }

    #[test]
    fn template_serializes_flat() {
        let template = ProgramTemplate::assemble(program(), vec![workout(10, 1)], vec![template(1, 10, 1)]);
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["name"], "Base Strength");
        assert_eq!(value["workouts"][0]["day_of_week"], 1);
        assert_eq!(value["workouts"][0]["exercises"][0]["target_rir"], 2);
    }

    #[test]
    fn history_limit_defaults_and_clamps() {
        assert_eq!(history_limit(None), 10);
        assert_eq!(history_limit(Some(0)), 1);
        assert_eq!(history_limit(Some(-5)), 1);
        assert_eq!(history_limit(Some(25)), 25);
        assert_eq!(history_limit(Some(1000)), 100);
    }

    #[test]
    fn logs_must_belong_to_the_session_workout() {
        let templates = vec![template(1, 10, 1), template(2, 10, 2)];
        let log = |id| ExerciseLogRequest {
            program_workout_exercise_id: id,
            actual_reps: vec![5],
            actual_rir: vec![2],
            weight: None,
        };

        let ok = CompleteSessionRequest { exercises: vec![log(2), log(1)] };
        let matched = match_templates(&templates, &ok).unwrap();
        assert_eq!(matched[0].id, 2);
        assert_eq!(matched[1].id, 1);

        let foreign = CompleteSessionRequest { exercises: vec![log(1), log(7)] };
        assert!(matches!(
            match_templates(&templates, &foreign),
            Err(AppError::Validation(_))
        ));
    }

    async fn seed_program(pool: &PgPool, name: &str) -> i32 {
        sqlx::query_scalar(
            "INSERT INTO programs (name, description, goal, estimated_weeks)
             VALUES ($1, '', 'muscle_gain', 8) RETURNING id",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn seed_user(pool: &PgPool) -> Uuid {
        let user = crate::validation::sample_user();
        db::create_user(pool, &user).await.unwrap();
        user.id
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn reassignment_leaves_exactly_one_active_program(pool: PgPool) {
        let user_id = seed_user(&pool).await;
        let a = seed_program(&pool, "A").await;
        let b = seed_program(&pool, "B").await;

        let mut tx = pool.begin().await.unwrap();
        assign_program(&mut tx, user_id, a).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        assign_program(&mut tx, user_id, b).await.unwrap();
        tx.commit().await.unwrap();

        let active: Vec<(i32, bool)> = sqlx::query_as(
            "SELECT program_id, is_active FROM user_programs WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(active, vec![(a, false), (b, true)]);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn next_weights_use_the_persisted_weight(pool: PgPool) {
        let user_id = seed_user(&pool).await;
        let program_id = seed_program(&pool, "A").await;
        let exercise_id: i32 = sqlx::query_scalar(
            "INSERT INTO exercises (name, primary_muscle_group, equipment)
             VALUES ('Bench Press', 'chest', 'barbell') RETURNING id",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        let workout_id: i32 = sqlx::query_scalar(
            "INSERT INTO program_workouts (program_id, name, day_of_week) VALUES ($1, 'Push', 1) RETURNING id",
        )
        .bind(program_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        let pwe_id: i32 = sqlx::query_scalar(
            "INSERT INTO program_workout_exercises (program_workout_id, exercise_id, sets, reps, target_rir, exercise_order)
             VALUES ($1, $2, 3, 8, 2, 1) RETURNING id",
        )
        .bind(workout_id)
        .bind(exercise_id)
        .fetch_one(&pool)
        .await
        .unwrap();

        let mut tx = pool.begin().await.unwrap();
        let user_program = assign_program(&mut tx, user_id, program_id).await.unwrap();
        tx.commit().await.unwrap();

        let session = db::create_workout_session(&pool, user_program.id, workout_id, Utc::now())
            .await
            .unwrap();
        db::create_exercise_log(&pool, session.id, pwe_id, 60.0, &[8, 8, 8], &[4, 4, 4])
            .await
            .unwrap();

        let last = db::get_last_logged_session(&pool, user_id, workout_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.id, session.id);
        let performances = db::get_logged_performance(&pool, last.id).await.unwrap();
        let weights = progression::next_weights(&performances).unwrap();
        assert_eq!(weights[&pwe_id], 65.0);

        let last_by_exercise = db::get_last_weights_by_exercise(&pool, user_id).await.unwrap();
        assert_eq!(last_by_exercise[&exercise_id], 60.0);
    }
}
