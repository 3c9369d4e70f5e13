// src/users.rs
use crate::auth;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{PasswordChangeRequest, User, UserPreferences};
use crate::programs::{self, ProgramCatalog};
use crate::validation;
use actix_web::{HttpRequest, HttpResponse, get, put, web};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_me);
    cfg.service(update_me);
    cfg.service(get_preferences);
    cfg.service(update_preferences);
    cfg.service(change_password);
    cfg.service(get_stats);
}

async fn current_user(pool: &PgPool, user_id: Uuid) -> AppResult<User> {
    db::get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[get("/me")]
pub async fn get_me(pool: web::Data<PgPool>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    Ok(HttpResponse::Ok().json(current_user(&pool, user_id).await?))
}

/// Applies whichever fields pass their own check; the rest are dropped
/// without failing the request. A `program_id` naming a known program
/// reassigns the user in the same transaction as the profile write.
#[put("/me")]
pub async fn update_me(
    pool: web::Data<PgPool>,
    catalog: web::Data<ProgramCatalog>,
    req: HttpRequest,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let updates = body
        .as_object()
        .ok_or_else(|| AppError::validation("request body must be a JSON object"))?;

    let mut user = current_user(&pool, user_id).await?;
    let mut applied = validation::apply_profile_updates(&mut user, updates);

    let mut program_id = None;
    if let Some(id) = validation::requested_program_id(updates) {
        if catalog.get(&pool, id).await?.is_some() {
            program_id = Some(id);
            applied.push("program_id");
        }
    }

    let skipped: Vec<&str> = updates
        .keys()
        .map(String::as_str)
        .filter(|key| !applied.iter().any(|field| field == key))
        .collect();
    if !skipped.is_empty() {
        tracing::debug!("Profile update for {} skipped fields {:?}", user_id, skipped);
    }

    if !applied.is_empty() {
        user.updated_at = Utc::now();
        let mut tx = pool.begin().await?;
        db::update_user_profile(&mut *tx, &user).await?;
        if let Some(program_id) = program_id {
            let assigned = programs::assign_program(&mut tx, user_id, program_id).await?;
            tracing::info!("User {} switched to program {}", user_id, assigned.program_id);
        }
        tx.commit().await?;
    }
    Ok(HttpResponse::Ok().json(user))
}

#[get("/me/preferences")]
pub async fn get_preferences(
    pool: web::Data<PgPool>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let prefs = db::get_user_preferences(&pool, user_id)
        .await?
        .unwrap_or_else(|| UserPreferences {
            user_id,
            ..UserPreferences::default()
        });
    Ok(HttpResponse::Ok().json(prefs))
}

#[put("/me/preferences")]
pub async fn update_preferences(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    body: web::Json<UserPreferences>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let mut prefs = body.into_inner();
    prefs.user_id = user_id;
    validation::validate_preferences(&prefs)?;

    db::upsert_user_preferences(&pool, &prefs).await?;
    Ok(HttpResponse::Ok().json(prefs))
}

#[put("/me/password")]
pub async fn change_password(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    body: web::Json<PasswordChangeRequest>,
) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    let body = body.into_inner();
    validation::validate_password(&body.new_password)?;

    let user = current_user(&pool, user_id).await?;
    if !auth::verify_password(body.old_password, user.password_hash).await? {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    let password_hash = auth::hash_password(body.new_password).await?;
    if !db::update_user_password(&pool, user_id, &password_hash).await? {
        return Err(AppError::not_found("User not found"));
    }
    tracing::info!("User {} changed password", user_id);
    Ok(HttpResponse::Ok().json(json!({"message": "Password updated"})))
}

#[get("/me/stats")]
pub async fn get_stats(pool: web::Data<PgPool>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user_id = auth::require_user_id(&req)?;
    Ok(HttpResponse::Ok().json(db::get_user_stats(&pool, user_id).await?))
}
