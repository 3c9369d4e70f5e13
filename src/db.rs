// src/db.rs
use crate::models::{
    CustomExercise, CustomSession, CustomWorkout, Exercise, LoggedPerformance, Program,
    ProgramWorkout, ProgramWorkoutExercise, User, UserPreferences, UserProgram, UserStats,
    WorkoutSession,
};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

pub const USERS_EMAIL_INDEX: &str = "users_email_active_idx";
pub const ONE_ACTIVE_PROGRAM_INDEX: &str = "user_programs_one_active_idx";
pub const ONE_LOG_PER_EXERCISE_KEY: &str = "workout_exercises_one_per_exercise";

// ---------------------------------------------------------------------------
// Users

pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, name, age, sex, height, weight, activity_level, goal, weekly_budget, created_at, updated_at
         FROM users WHERE lower(email) = lower($1) AND deleted_at IS NULL",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, name, age, sex, height, weight, activity_level, goal, weekly_budget, created_at, updated_at
         FROM users WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn create_user<'e>(executor: impl PgExecutor<'e>, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, age, sex, height, weight, activity_level, goal, weekly_budget, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(user.age)
    .bind(&user.sex)
    .bind(user.height)
    .bind(user.weight)
    .bind(&user.activity_level)
    .bind(&user.goal)
    .bind(user.weekly_budget)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_user_profile<'e>(
    executor: impl PgExecutor<'e>,
    user: &User,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users
         SET name = $2, age = $3, height = $4, weight = $5, activity_level = $6, goal = $7, weekly_budget = $8, updated_at = $9
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(user.age)
    .bind(user.height)
    .bind(user.weight)
    .bind(&user.activity_level)
    .bind(&user.goal)
    .bind(user.weekly_budget)
    .bind(user.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_user_password(
    pool: &PgPool,
    id: Uuid,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(password_hash)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_user_preferences(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserPreferences>, sqlx::Error> {
    sqlx::query_as::<_, UserPreferences>(
        "SELECT user_id, preferences, allergies, dislikes FROM user_preferences WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn upsert_user_preferences(
    pool: &PgPool,
    prefs: &UserPreferences,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_preferences (user_id, preferences, allergies, dislikes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, NOW(), NOW())
         ON CONFLICT (user_id) DO UPDATE
         SET preferences = EXCLUDED.preferences, allergies = EXCLUDED.allergies, dislikes = EXCLUDED.dislikes, updated_at = NOW()",
    )
    .bind(prefs.user_id)
    .bind(&prefs.preferences)
    .bind(&prefs.allergies)
    .bind(&prefs.dislikes)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_user_stats(pool: &PgPool, user_id: Uuid) -> Result<UserStats, sqlx::Error> {
    sqlx::query_as::<_, UserStats>(
        "SELECT
             COUNT(DISTINCT w.id) AS completed_sessions,
             COALESCE(SUM(cardinality(we.actual_reps)), 0)::BIGINT AS total_sets,
             COALESCE(SUM((SELECT SUM(r) FROM unnest(we.actual_reps) AS r)), 0)::BIGINT AS total_reps,
             COALESCE(SUM(we.weight * (SELECT SUM(r) FROM unnest(we.actual_reps) AS r)), 0)::DOUBLE PRECISION AS total_volume,
             MAX(w.completed_date) AS last_workout_date
         FROM workouts w
         JOIN user_programs up ON up.id = w.user_program_id
         JOIN workout_exercises we ON we.workout_id = w.id
         WHERE up.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

// ---------------------------------------------------------------------------
// Programs and exercises

pub async fn get_program_by_id(pool: &PgPool, id: i32) -> Result<Option<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(
        "SELECT id, name, description, goal, estimated_weeks, created_at FROM programs WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_programs_by_goal(pool: &PgPool, goal: &str) -> Result<Vec<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(
        "SELECT id, name, description, goal, estimated_weeks, created_at FROM programs WHERE goal = $1 ORDER BY name",
    )
    .bind(goal)
    .fetch_all(pool)
    .await
}

pub async fn get_program_workouts(
    pool: &PgPool,
    program_id: i32,
) -> Result<Vec<ProgramWorkout>, sqlx::Error> {
    sqlx::query_as::<_, ProgramWorkout>(
        "SELECT id, program_id, name, day_of_week, description
         FROM program_workouts WHERE program_id = $1 ORDER BY day_of_week",
    )
    .bind(program_id)
    .fetch_all(pool)
    .await
}

/// Template exercises of every workout in a program, grouped by workout
/// day and then by exercise order.
pub async fn get_program_exercises(
    pool: &PgPool,
    program_id: i32,
) -> Result<Vec<ProgramWorkoutExercise>, sqlx::Error> {
    sqlx::query_as::<_, ProgramWorkoutExercise>(
        "SELECT pwe.id, pwe.program_workout_id, pwe.exercise_id, pwe.sets, pwe.reps, pwe.target_rir,
                pwe.prescribed_weight, pwe.exercise_order, pwe.notes
         FROM program_workout_exercises pwe
         JOIN program_workouts pw ON pw.id = pwe.program_workout_id
         WHERE pw.program_id = $1
         ORDER BY pw.day_of_week, pwe.exercise_order",
    )
    .bind(program_id)
    .fetch_all(pool)
    .await
}

pub async fn get_workout_exercises(
    pool: &PgPool,
    program_workout_id: i32,
) -> Result<Vec<ProgramWorkoutExercise>, sqlx::Error> {
    sqlx::query_as::<_, ProgramWorkoutExercise>(
        "SELECT id, program_workout_id, exercise_id, sets, reps, target_rir, prescribed_weight, exercise_order, notes
         FROM program_workout_exercises WHERE program_workout_id = $1 ORDER BY exercise_order",
    )
    .bind(program_workout_id)
    .fetch_all(pool)
    .await
}

pub async fn get_all_exercises(pool: &PgPool) -> Result<Vec<Exercise>, sqlx::Error> {
    sqlx::query_as::<_, Exercise>(
        "SELECT id, name, description, primary_muscle_group, equipment, created_at FROM exercises ORDER BY name",
    )
    .fetch_all(pool)
    .await
}

pub async fn get_exercise_by_id(pool: &PgPool, id: i32) -> Result<Option<Exercise>, sqlx::Error> {
    sqlx::query_as::<_, Exercise>(
        "SELECT id, name, description, primary_muscle_group, equipment, created_at FROM exercises WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

// ---------------------------------------------------------------------------
// Enrolment

pub async fn get_active_user_program<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<Option<UserProgram>, sqlx::Error> {
    sqlx::query_as::<_, UserProgram>(
        "SELECT id, user_id, program_id, start_date, is_active, created_at
         FROM user_programs WHERE user_id = $1 AND is_active = true",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Locks the user's row so concurrent assignments for the same user run
/// one after the other.
pub async fn lock_user<'e>(executor: impl PgExecutor<'e>, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    Ok(())
}

pub async fn deactivate_user_programs<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE user_programs SET is_active = false WHERE user_id = $1 AND is_active = true",
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn create_user_program<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    program_id: i32,
    start_date: DateTime<Utc>,
) -> Result<UserProgram, sqlx::Error> {
    sqlx::query_as::<_, UserProgram>(
        "INSERT INTO user_programs (user_id, program_id, start_date, is_active)
         VALUES ($1, $2, $3, true)
         RETURNING id, user_id, program_id, start_date, is_active, created_at",
    )
    .bind(user_id)
    .bind(program_id)
    .bind(start_date)
    .fetch_one(executor)
    .await
}

// ---------------------------------------------------------------------------
// Sessions and logs

pub async fn create_workout_session(
    pool: &PgPool,
    user_program_id: i32,
    program_workout_id: i32,
    completed_date: DateTime<Utc>,
) -> Result<WorkoutSession, sqlx::Error> {
    sqlx::query_as::<_, WorkoutSession>(
        "INSERT INTO workouts (user_program_id, program_workout_id, completed_date, notes)
         VALUES ($1, $2, $3, '')
         RETURNING id, user_program_id, program_workout_id, completed_date, notes, created_at",
    )
    .bind(user_program_id)
    .bind(program_workout_id)
    .bind(completed_date)
    .fetch_one(pool)
    .await
}

pub async fn get_session_for_user(
    pool: &PgPool,
    session_id: i32,
    user_id: Uuid,
) -> Result<Option<WorkoutSession>, sqlx::Error> {
    sqlx::query_as::<_, WorkoutSession>(
        "SELECT w.id, w.user_program_id, w.program_workout_id, w.completed_date, w.notes, w.created_at
         FROM workouts w
         JOIN user_programs up ON up.id = w.user_program_id
         WHERE w.id = $1 AND up.user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Takes a row lock on the session so concurrent completions serialise.
pub async fn lock_session<'e>(executor: impl PgExecutor<'e>, session_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT id FROM workouts WHERE id = $1 FOR UPDATE")
        .bind(session_id)
        .fetch_optional(executor)
        .await?;
    Ok(())
}

pub async fn count_session_logs<'e>(
    executor: impl PgExecutor<'e>,
    session_id: i32,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM workout_exercises WHERE workout_id = $1")
        .bind(session_id)
        .fetch_one(executor)
        .await
}

pub async fn create_exercise_log<'e>(
    executor: impl PgExecutor<'e>,
    session_id: i32,
    program_workout_exercise_id: i32,
    weight: f64,
    actual_reps: &[i32],
    actual_rir: &[i32],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO workout_exercises (workout_id, program_workout_exercise_id, weight, actual_reps, actual_rir)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(session_id)
    .bind(program_workout_exercise_id)
    .bind(weight)
    .bind(actual_reps)
    .bind(actual_rir)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_sessions_by_user_program(
    pool: &PgPool,
    user_program_id: i32,
    limit: i64,
) -> Result<Vec<WorkoutSession>, sqlx::Error> {
    sqlx::query_as::<_, WorkoutSession>(
        "SELECT id, user_program_id, program_workout_id, completed_date, notes, created_at
         FROM workouts WHERE user_program_id = $1
         ORDER BY completed_date DESC, id DESC LIMIT $2",
    )
    .bind(user_program_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Most recent session of a program workout that has at least one log.
pub async fn get_last_logged_session(
    pool: &PgPool,
    user_id: Uuid,
    program_workout_id: i32,
) -> Result<Option<WorkoutSession>, sqlx::Error> {
    sqlx::query_as::<_, WorkoutSession>(
        "SELECT w.id, w.user_program_id, w.program_workout_id, w.completed_date, w.notes, w.created_at
         FROM workouts w
         JOIN user_programs up ON up.id = w.user_program_id
         WHERE up.user_id = $1 AND w.program_workout_id = $2
           AND EXISTS (SELECT 1 FROM workout_exercises we WHERE we.workout_id = w.id)
         ORDER BY w.completed_date DESC, w.id DESC LIMIT 1",
    )
    .bind(user_id)
    .bind(program_workout_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_logged_performance(
    pool: &PgPool,
    session_id: i32,
) -> Result<Vec<LoggedPerformance>, sqlx::Error> {
    sqlx::query_as::<_, LoggedPerformance>(
        "SELECT we.program_workout_exercise_id, pwe.target_rir, we.weight, we.actual_rir
         FROM workout_exercises we
         JOIN program_workout_exercises pwe ON pwe.id = we.program_workout_exercise_id
         WHERE we.workout_id = $1
         ORDER BY we.id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

/// Last logged weight per exercise for a user, across every program.
pub async fn get_last_weights_by_exercise(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<HashMap<i32, f64>, sqlx::Error> {
    let rows: Vec<(i32, f64)> = sqlx::query_as(
        "SELECT DISTINCT ON (pwe.exercise_id) pwe.exercise_id, we.weight
         FROM workout_exercises we
         JOIN workouts w ON w.id = we.workout_id
         JOIN user_programs up ON up.id = w.user_program_id
         JOIN program_workout_exercises pwe ON pwe.id = we.program_workout_exercise_id
         WHERE up.user_id = $1
         ORDER BY pwe.exercise_id, w.completed_date DESC, we.id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Custom workouts

pub async fn create_custom_workout<'e>(
    executor: impl PgExecutor<'e>,
    workout: &CustomWorkout,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO custom_workouts (id, user_id, name, workout_type, duration_weeks, completed, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(workout.id)
    .bind(workout.user_id)
    .bind(&workout.name)
    .bind(&workout.workout_type)
    .bind(workout.duration_weeks)
    .bind(workout.completed)
    .bind(workout.created_at)
    .bind(workout.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_custom_workout(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<CustomWorkout>, sqlx::Error> {
    sqlx::query_as::<_, CustomWorkout>(
        "SELECT id, user_id, name, workout_type, duration_weeks, completed, created_at, updated_at
         FROM custom_workouts WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_custom_workouts(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<(Vec<CustomWorkout>, i64), sqlx::Error> {
    let workouts = sqlx::query_as::<_, CustomWorkout>(
        "SELECT id, user_id, name, workout_type, duration_weeks, completed, created_at, updated_at
         FROM custom_workouts WHERE user_id = $1 AND deleted_at IS NULL
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM custom_workouts WHERE user_id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok((workouts, total))
}

pub async fn get_current_custom_workout(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<CustomWorkout>, sqlx::Error> {
    sqlx::query_as::<_, CustomWorkout>(
        "SELECT id, user_id, name, workout_type, duration_weeks, completed, created_at, updated_at
         FROM custom_workouts WHERE user_id = $1 AND completed = false AND deleted_at IS NULL
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_custom_workout(
    pool: &PgPool,
    workout: &CustomWorkout,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE custom_workouts
         SET name = $2, workout_type = $3, duration_weeks = $4, completed = $5, updated_at = $6
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(workout.id)
    .bind(&workout.name)
    .bind(&workout.workout_type)
    .bind(workout.duration_weeks)
    .bind(workout.completed)
    .bind(workout.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn soft_delete_custom_workout(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE custom_workouts SET deleted_at = NOW() WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn create_custom_session<'e>(
    executor: impl PgExecutor<'e>,
    session: &CustomSession,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO custom_workout_sessions (id, workout_id, day, completed, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(session.id)
    .bind(session.workout_id)
    .bind(session.day)
    .bind(session.completed)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_custom_session(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<CustomSession>, sqlx::Error> {
    sqlx::query_as::<_, CustomSession>(
        "SELECT s.id, s.workout_id, s.day, s.completed, s.created_at, s.updated_at
         FROM custom_workout_sessions s
         JOIN custom_workouts w ON w.id = s.workout_id
         WHERE s.id = $1 AND w.user_id = $2 AND s.deleted_at IS NULL AND w.deleted_at IS NULL",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_custom_sessions(
    pool: &PgPool,
    workout_id: Uuid,
) -> Result<Vec<CustomSession>, sqlx::Error> {
    sqlx::query_as::<_, CustomSession>(
        "SELECT id, workout_id, day, completed, created_at, updated_at
         FROM custom_workout_sessions WHERE workout_id = $1 AND deleted_at IS NULL
         ORDER BY day ASC, created_at ASC",
    )
    .bind(workout_id)
    .fetch_all(pool)
    .await
}

pub async fn set_custom_session_completed(
    pool: &PgPool,
    id: Uuid,
    completed: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE custom_workout_sessions SET completed = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(completed)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_custom_exercise(
    pool: &PgPool,
    exercise: &CustomExercise,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO custom_session_exercises (id, session_id, name, sets, reps, weight, completed, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(exercise.id)
    .bind(exercise.session_id)
    .bind(&exercise.name)
    .bind(exercise.sets)
    .bind(exercise.reps)
    .bind(exercise.weight)
    .bind(exercise.completed)
    .bind(exercise.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_custom_exercise(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<CustomExercise>, sqlx::Error> {
    sqlx::query_as::<_, CustomExercise>(
        "SELECT e.id, e.session_id, e.name, e.sets, e.reps, e.weight, e.completed, e.created_at
         FROM custom_session_exercises e
         JOIN custom_workout_sessions s ON s.id = e.session_id
         JOIN custom_workouts w ON w.id = s.workout_id
         WHERE e.id = $1 AND w.user_id = $2
           AND e.deleted_at IS NULL AND s.deleted_at IS NULL AND w.deleted_at IS NULL",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_custom_exercise(
    pool: &PgPool,
    exercise: &CustomExercise,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE custom_session_exercises
         SET name = $2, sets = $3, reps = $4, weight = $5, completed = $6
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(exercise.id)
    .bind(&exercise.name)
    .bind(exercise.sets)
    .bind(exercise.reps)
    .bind(exercise.weight)
    .bind(exercise.completed)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_custom_exercises(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<Vec<CustomExercise>, sqlx::Error> {
    sqlx::query_as::<_, CustomExercise>(
        "SELECT id, session_id, name, sets, reps, weight, completed, created_at
         FROM custom_session_exercises WHERE session_id = $1 AND deleted_at IS NULL
         ORDER BY created_at ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}
