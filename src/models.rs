// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub age: i32,
    pub sex: String,
    pub height: f64,
    pub weight: f64,
    pub activity_level: String,
    pub goal: String,
    pub weekly_budget: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, FromRow)]
pub struct UserPreferences {
    #[serde(default)]
    pub user_id: Uuid,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, FromRow)]
pub struct UserStats {
    pub completed_sessions: i64,
    pub total_sets: i64,
    pub total_reps: i64,
    pub total_volume: f64,
    pub last_workout_date: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct Exercise {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub primary_muscle_group: String,
    pub equipment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct Program {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub goal: String,
    pub estimated_weeks: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct ProgramWorkout {
    pub id: i32,
    pub program_id: i32,
    pub name: String,
    pub day_of_week: i32,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct ProgramWorkoutExercise {
    pub id: i32,
    pub program_workout_id: i32,
    pub exercise_id: i32,
    pub sets: i32,
    pub reps: i32,
    pub target_rir: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescribed_weight: Option<f64>,
    pub exercise_order: i32,
    pub notes: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct UserProgram {
    pub id: i32,
    pub user_id: Uuid,
    pub program_id: i32,
    pub start_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct WorkoutSession {
    pub id: i32,
    pub user_program_id: i32,
    pub program_workout_id: i32,
    pub completed_date: DateTime<Utc>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// A log row joined with the target RIR of its template exercise.
#[derive(Clone, Debug, FromRow)]
pub struct LoggedPerformance {
    pub program_workout_exercise_id: i32,
    pub target_rir: i32,
    pub weight: f64,
    pub actual_rir: Vec<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct CustomWorkout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub workout_type: String,
    pub duration_weeks: i32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct CustomSession {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub day: i32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct CustomExercise {
    pub id: Uuid,
    pub session_id: Uuid,
    pub name: String,
    pub sets: i32,
    pub reps: i32,
    pub weight: f64,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub age: i32,
    pub sex: String,
    pub height: f64,
    pub weight: f64,
    pub activity_level: String,
    pub goal: String,
    pub program_id: Option<i32>,
    pub weekly_budget: Option<f64>,
}

#[derive(Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Serialize, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Serialize, Deserialize)]
pub struct AssignProgramRequest {
    pub program_id: i32,
}

#[derive(Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub program_workout_id: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExerciseLogRequest {
    pub program_workout_exercise_id: i32,
    pub actual_reps: Vec<i32>,
    pub actual_rir: Vec<i32>,
    pub weight: Option<f64>,
}

#[derive(Serialize, Deserialize)]
pub struct CompleteSessionRequest {
    pub exercises: Vec<ExerciseLogRequest>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CustomWorkoutRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub workout_type: String,
    pub duration_weeks: i32,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Serialize, Deserialize)]
pub struct GenerateWorkoutRequest {
    #[serde(rename = "type")]
    pub workout_type: String,
    pub duration: i32,
}

#[derive(Serialize, Deserialize)]
pub struct CustomSessionRequest {
    pub day: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CustomExerciseRequest {
    pub name: String,
    pub sets: i32,
    pub reps: i32,
    pub weight: f64,
    #[serde(default)]
    pub completed: bool,
}
