// src/auth.rs
use crate::config::Config;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{AuthResponse, Claims, LoginRequest, RegisterRequest, User};
use crate::programs;
use crate::validation;
use actix_web::{
    HttpMessage, HttpRequest, HttpResponse,
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    post, web,
};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub const ISSUER: &str = "fitness-app";

/// Routes reachable without a token.
pub fn init_public_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register);
    cfg.service(login);
}

/// Mounted under `/auth` behind the token guard.
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(logout);
    cfg.service(refresh);
}

/// Signs and checks HS256 session tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_nbf = true;
        TokenIssuer {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            ttl: Duration::days(config.token_ttl_days),
        }
    }

    pub fn issue(&self, user: &User) -> AppResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: ISSUER.to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, expires_at))
    }

    pub fn validate(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::unauthorized("Token has expired"),
                _ => AppError::unauthorized("Invalid token"),
            })
    }
}

pub async fn hash_password(password: String) -> AppResult<String> {
    hash_with_cost(password, DEFAULT_COST).await
}

pub(crate) async fn hash_with_cost(password: String, cost: u32) -> AppResult<String> {
    let hashed = tokio::task::spawn_blocking(move || hash(password, cost)).await??;
    Ok(hashed)
}

/// A stored hash that bcrypt cannot parse counts as a mismatch.
pub async fn verify_password(password: String, password_hash: String) -> AppResult<bool> {
    let result = tokio::task::spawn_blocking(move || verify(password, &password_hash)).await?;
    match result {
        Ok(matches) => Ok(matches),
        Err(e) => {
            tracing::warn!("Stored password hash could not be verified: {}", e);
            Ok(false)
        }
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn authenticate(req: &ServiceRequest) -> AppResult<Uuid> {
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| AppError::Internal("token issuer is not configured".to_string()))?;
    let token = bearer_token(req)
        .ok_or_else(|| AppError::unauthorized("Missing or malformed Authorization header"))?;
    let claims = issuer.validate(token)?;
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::unauthorized("Invalid token"))
}

/// Guards the protected scope: a valid bearer token is required and the
/// caller's id is stored in the request extensions.
pub async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    match authenticate(&req) {
        Ok(user_id) => {
            req.extensions_mut().insert(user_id);
            next.call(req).await.map(ServiceResponse::map_into_boxed_body)
        }
        Err(e) => {
            tracing::warn!("Rejected request to {}: {}", req.path(), e);
            Ok(req.error_response(e))
        }
    }
}

pub fn get_user_id_from_request(req: &HttpRequest) -> Option<Uuid> {
    req.extensions().get::<Uuid>().copied()
}

pub fn require_user_id(req: &HttpRequest) -> AppResult<Uuid> {
    get_user_id_from_request(req).ok_or_else(|| AppError::unauthorized("Unauthorized"))
}

fn invalid_credentials() -> AppError {
    AppError::unauthorized("Invalid email or password")
}

#[post("/auth/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    req: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    let req = req.into_inner();
    validation::validate_registration(&req)?;

    if let Some(program_id) = req.program_id {
        if db::get_program_by_id(&pool, program_id).await?.is_none() {
            return Err(AppError::not_found("Program not found"));
        }
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: req.email.trim().to_string(),
        password_hash: hash_password(req.password).await?,
        name: req.name.trim().to_string(),
        age: req.age,
        sex: req.sex,
        height: req.height,
        weight: req.weight,
        activity_level: req.activity_level,
        goal: req.goal,
        weekly_budget: req.weekly_budget,
        created_at: now,
        updated_at: now,
    };

    let mut tx = pool.begin().await?;
    db::create_user(&mut *tx, &user).await.map_err(|e| {
        AppError::from(e).on_unique_violation(db::USERS_EMAIL_INDEX, "Email is already registered")
    })?;
    if let Some(program_id) = req.program_id {
        programs::assign_program(&mut tx, user.id, program_id).await?;
    }
    tx.commit().await?;

    tracing::info!("Registered user {}", user.id);
    let (token, expires_at) = issuer.issue(&user)?;
    Ok(HttpResponse::Created().json(AuthResponse {
        token,
        expires_at,
        user,
    }))
}

#[post("/auth/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    req: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = req.into_inner();
    let user = db::get_user_by_email(&pool, req.email.trim())
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(invalid_credentials());
    }

    let (token, expires_at) = issuer.issue(&user)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        expires_at,
        user,
    }))
}

/// Tokens are stateless; the client drops its copy.
#[post("/logout")]
pub async fn logout(req: HttpRequest) -> AppResult<HttpResponse> {
    let user_id = require_user_id(&req)?;
    tracing::info!("User {} logged out", user_id);
    Ok(HttpResponse::Ok().json(json!({"message": "Logged out"})))
}

#[post("/refresh")]
pub async fn refresh(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = require_user_id(&req)?;
    let user = db::get_user_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists"))?;

    let (token, expires_at) = issuer.issue(&user)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        expires_at,
        user,
    }))
}
