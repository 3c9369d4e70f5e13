// src/custom_workouts.rs
//! User-built workout plans: free-form workouts, their sessions by weekday
//! and the exercises logged in each session.
use crate::auth;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{
    CustomExercise, CustomExerciseRequest, CustomSession, CustomSessionRequest, CustomWorkout,
    CustomWorkoutRequest, GenerateWorkoutRequest,
};
use crate::validation;
use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_PAGE: i64 = 1_000_000;

/// Mounted under `/custom-workouts`. Literal segments are registered
/// ahead of `/{id}` so they are not parsed as ids.
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_workout)
        .service(list_workouts)
        .service(current_workout)
        .service(generate_workout)
        .service(get_session)
        .service(start_session)
        .service(complete_session)
        .service(log_exercise)
        .service(list_exercises)
        .service(update_exercise)
        .service(create_session)
        .service(list_sessions)
        .service(get_workout)
        .service(update_workout)
        .service(delete_workout);
}

pub fn sessions_per_week(workout_type: &str) -> i32 {
    match workout_type {
        "hypertrophy" => 4,
        "strength" | "powerlifting" => 3,
        "endurance" | "cardio" => 5,
        "flexibility" => 6,
        _ => 3,
    }
}

pub fn generated_name(workout_type: &str, duration_weeks: i32, user_name: &str) -> String {
    format!(
        "{}-Week {} Program for {}",
        duration_weeks, workout_type, user_name
    )
}

/// Lays out `duration_weeks * sessions_per_week` sessions, cycling through
/// the days of the week in order.
pub fn generate_plan(
    user_id: Uuid,
    user_name: &str,
    workout_type: &str,
    duration_weeks: i32,
    now: DateTime<Utc>,
) -> (CustomWorkout, Vec<CustomSession>) {
    let workout = CustomWorkout {
        id: Uuid::new_v4(),
        user_id,
        name: generated_name(workout_type, duration_weeks, user_name),
        workout_type: workout_type.to_string(),
        duration_weeks,
        completed: false,
        created_at: now,
        updated_at: now,
    };
    let total = duration_weeks * sessions_per_week(workout_type);
    let sessions = (1..=total)
        .map(|i| CustomSession {
            id: Uuid::new_v4(),
            workout_id: workout.id,
            day: (i - 1) % 7 + 1,
            completed: false,
            created_at: now,
            updated_at: now,
        })
        .collect();
    (workout, sessions)
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    fn page(&self) -> i64 {
        self.page.filter(|p| *p >= 1).unwrap_or(1).min(MAX_PAGE)
    }

    fn limit(&self) -> i64 {
        self.limit
            .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

async fn owned_workout(pool: &PgPool, id: Uuid, user_id: Uuid) -> AppResult<CustomWorkout> {
    db::get_custom_workout(pool, id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Workout not found"))
}

async fn owned_session(pool: &PgPool, id: Uuid, user_id: Uuid) -> AppResult<CustomSession> {
    db::get_custom_session(pool, id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Session not found"))
}

#[post("")]
pub async fn create_workout(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    body: web::Json<CustomWorkoutRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let body = body.into_inner();
    validation::validate_custom_workout(&body)?;

    let now = Utc::now();
    let workout = CustomWorkout {
        id: Uuid::new_v4(),
        user_id,
        name: body.name.trim().to_string(),
        workout_type: body.workout_type,
        duration_weeks: body.duration_weeks,
        completed: body.completed,
        created_at: now,
        updated_at: now,
    };
    db::create_custom_workout(pool.get_ref(), &workout).await?;
    Ok(HttpResponse::Created().json(workout))
}

#[get("")]
pub async fn list_workouts(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let (page, limit) = (query.page(), query.limit());
    let (workouts, total) =
        db::list_custom_workouts(&pool, user_id, limit, query.offset()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "workouts": workouts,
        "total": total,
        "page": page,
        "limit": limit,
    })))
}

#[get("/current")]
pub async fn current_workout(
    pool: web::Data<PgPool>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let workout = db::get_current_custom_workout(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("No workout in progress"))?;
    Ok(HttpResponse::Ok().json(workout))
}

#[post("/generate")]
pub async fn generate_workout(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    body: web::Json<GenerateWorkoutRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    validation::validate_workout_type(&body.workout_type)?;
    validation::validate_duration(body.duration)?;

    let user = db::get_user_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let (workout, sessions) =
        generate_plan(user_id, &user.name, &body.workout_type, body.duration, Utc::now());

    let mut tx = pool.begin().await?;
    db::create_custom_workout(&mut *tx, &workout).await?;
    for session in &sessions {
        db::create_custom_session(&mut *tx, session).await?;
    }
    tx.commit().await?;

    tracing::info!(
        "Generated workout {} with {} sessions for user {}",
        workout.id,
        sessions.len(),
        user_id
    );
    Ok(HttpResponse::Created().json(json!({
        "workout": workout,
        "sessions": sessions,
    })))
}

#[get("/{id}")]
pub async fn get_workout(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let workout = owned_workout(&pool, path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(workout))
}

#[put("/{id}")]
pub async fn update_workout(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CustomWorkoutRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let body = body.into_inner();
    validation::validate_custom_workout(&body)?;

    let mut workout = owned_workout(&pool, path.into_inner(), user_id).await?;
    workout.name = body.name.trim().to_string();
    workout.workout_type = body.workout_type;
    workout.duration_weeks = body.duration_weeks;
    workout.completed = body.completed;
    workout.updated_at = Utc::now();
    db::update_custom_workout(&pool, &workout).await?;
    Ok(HttpResponse::Ok().json(workout))
}

#[delete("/{id}")]
pub async fn delete_workout(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    if !db::soft_delete_custom_workout(&pool, path.into_inner(), user_id).await? {
        return Err(AppError::not_found("Workout not found"));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[post("/{id}/sessions")]
pub async fn create_session(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CustomSessionRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    validation::validate_day(body.day)?;
    let workout = owned_workout(&pool, path.into_inner(), user_id).await?;

    let now = Utc::now();
    let session = CustomSession {
        id: Uuid::new_v4(),
        workout_id: workout.id,
        day: body.day,
        completed: false,
        created_at: now,
        updated_at: now,
    };
    db::create_custom_session(pool.get_ref(), &session).await?;
    Ok(HttpResponse::Created().json(session))
}

#[get("/{id}/sessions")]
pub async fn list_sessions(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let workout = owned_workout(&pool, path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(db::list_custom_sessions(&pool, workout.id).await?))
}

#[get("/sessions/{session_id}")]
pub async fn get_session(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let session = owned_session(&pool, path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(session))
}

/// Starting only checks that the session is still open.
#[post("/sessions/{session_id}/start")]
pub async fn start_session(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let session = owned_session(&pool, path.into_inner(), user_id).await?;
    if session.completed {
        return Err(AppError::conflict("Session is already completed"));
    }
    Ok(HttpResponse::Ok().json(session))
}

#[post("/sessions/{session_id}/complete")]
pub async fn complete_session(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let mut session = owned_session(&pool, path.into_inner(), user_id).await?;
    db::set_custom_session_completed(&pool, session.id, true).await?;
    session.completed = true;
    session.updated_at = Utc::now();
    tracing::info!("User {} completed custom session {}", user_id, session.id);
    Ok(HttpResponse::Ok().json(session))
}

#[post("/sessions/{session_id}/exercises")]
pub async fn log_exercise(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CustomExerciseRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let body = body.into_inner();
    validation::validate_custom_exercise(&body)?;
    let session = owned_session(&pool, path.into_inner(), user_id).await?;

    let exercise = CustomExercise {
        id: Uuid::new_v4(),
        session_id: session.id,
        name: body.name.trim().to_string(),
        sets: body.sets,
        reps: body.reps,
        weight: body.weight,
        completed: body.completed,
        created_at: Utc::now(),
    };
    db::create_custom_exercise(&pool, &exercise).await?;
    Ok(HttpResponse::Created().json(exercise))
}

#[get("/sessions/{session_id}/exercises")]
pub async fn list_exercises(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let session = owned_session(&pool, path.into_inner(), user_id).await?;
    Ok(HttpResponse::Ok().json(db::list_custom_exercises(&pool, session.id).await?))
}

#[put("/exercises/{exercise_id}")]
pub async fn update_exercise(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CustomExerciseRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let body = body.into_inner();
    validation::validate_custom_exercise(&body)?;

    let mut exercise = db::get_custom_exercise(&pool, path.into_inner(), user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Exercise not found"))?;
    exercise.name = body.name.trim().to_string();
    exercise.sets = body.sets;
    exercise.reps = body.reps;
    exercise.weight = body.weight;
    exercise.completed = body.completed;
    db::update_custom_exercise(&pool, &exercise).await?;
    Ok(HttpResponse::Ok().json(exercise))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_per_week_by_type() {
        assert_eq!(sessions_per_week("hypertrophy"), 4);
        assert_eq!(sessions_per_week("strength"), 3);
        assert_eq!(sessions_per_week("endurance"), 5);
        assert_eq!(sessions_per_week("powerlifting"), 3);
        assert_eq!(sessions_per_week("cardio"), 5);
        assert_eq!(sessions_per_week("flexibility"), 6);
    }

    #[test]
    fn generated_plan_cycles_through_the_week() {
        let user_id = Uuid::new_v4();
        let (workout, sessions) = generate_plan(user_id, "Jane Doe", "hypertrophy", 2, Utc::now());

        assert_eq!(workout.name, "2-Week hypertrophy Program for Jane Doe");
        assert_eq!(workout.user_id, user_id);
        assert!(!workout.completed);
        assert_eq!(sessions.len(), 8);

        let days: Vec<i32> = sessions.iter().map(|s| s.day).collect();
        assert_eq!(days, vec![1, 2, 3, 4, 5, 6, 7, 1]);
        assert!(sessions.iter().all(|s| s.workout_id == workout.id && !s.completed));
    }

    #[test]
    fn flexibility_year_plan_stays_in_day_range() {
        let (_, sessions) = generate_plan(Uuid::new_v4(), "Sam", "flexibility", 52, Utc::now());
        assert_eq!(sessions.len(), 312);
        assert!(sessions.iter().all(|s| (1..=7).contains(&s.day)));
    }

    #[test]
    fn page_query_falls_back_to_defaults() {
        let q = PageQuery { page: None, limit: None };
        assert_eq!((q.page(), q.limit()), (1, 20));

        let q = PageQuery { page: Some(0), limit: Some(500) };
        assert_eq!((q.page(), q.limit()), (1, 20));

        let q = PageQuery { page: Some(3), limit: Some(50) };
        assert_eq!((q.page(), q.limit()), (3, 50));
        assert_eq!(q.offset(), 100);
    }

    #[test]
    fn huge_page_numbers_are_capped() {
        let q = PageQuery { page: Some(i64::MAX), limit: Some(MAX_PAGE_SIZE) };
        assert_eq!(q.page(), MAX_PAGE);
        assert_eq!(q.offset(), (MAX_PAGE - 1) * MAX_PAGE_SIZE);

        let q = PageQuery { page: Some(i64::MAX / 2 + 1), limit: None };
        assert!(q.offset() >= 0);
    }

    #[test]
    fn serialized_workout_uses_type_key() {
        let (workout, _) = generate_plan(Uuid::new_v4(), "Jane", "cardio", 1, Utc::now());
        let value = serde_json::to_value(&workout).unwrap();
        assert_eq!(value["type"], "cardio");
        assert!(value.get("workout_type").is_none());
    }
}
