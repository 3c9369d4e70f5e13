// src/main.rs
use actix_web::{
    App, HttpResponse, HttpServer, get,
    middleware::{Logger, from_fn},
    web,
};
use error::AppError;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(test)]
#[macro_use]
mod test_support;

mod auth;
mod config;
mod custom_workouts;
mod db;
mod error;
mod models;
mod programs;
mod progression;
mod users;
mod validation;

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ok"}))
}

/// Registers every route. Public routes come first; each protected group
/// sits under its own prefix so paths outside them still resolve to 404.
/// Extractor failures are rendered in the same `{"error": ...}` shape as
/// handler errors.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::not_found(err.to_string()).into()),
    )
    .service(health)
    .configure(auth::init_public_routes)
    .configure(programs::init_public_routes)
    .service(
        web::scope("/auth")
            .wrap(from_fn(auth::require_auth))
            .configure(auth::init_routes),
    )
    .service(
        web::scope("/users")
            .wrap(from_fn(auth::require_auth))
            .configure(users::init_routes),
    )
    .service(
        web::scope("/programs")
            .wrap(from_fn(auth::require_auth))
            .configure(programs::init_program_routes),
    )
    .service(
        web::scope("/exercises")
            .wrap(from_fn(auth::require_auth))
            .configure(programs::init_exercise_routes),
    )
    .service(
        web::scope("/workouts")
            .wrap(from_fn(auth::require_auth))
            .configure(programs::init_workout_routes),
    )
    .service(
        web::scope("/custom-workouts")
            .wrap(from_fn(auth::require_auth))
            .configure(custom_workouts::init_routes),
    );
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let config = config::Config::from_env().expect("Failed to load config from environment");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    let pool = web::Data::new(pool);
    let issuer = web::Data::new(auth::TokenIssuer::new(&config));
    let catalog = web::Data::new(programs::ProgramCatalog::new(config.program_cache_capacity));

    tracing::info!("Starting strength tracker on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(issuer.clone())
            .app_data(catalog.clone())
            .wrap(Logger::default())
            .configure(configure_app)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestState, error_message};
    use crate::validation::sample_user;
    use actix_web::{http::StatusCode, http::header, test as actix_test};

    fn state() -> TestState {
        TestState::lazy()
    }

    fn bearer(state: &TestState) -> (header::HeaderName, String) {
        state.bearer(&sample_user())
    }

    #[actix_web::test]
    async fn health_is_public() {
        let state = state();
        let app = test_app!(state);
        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn protected_routes_need_a_token() {
        let state = state();
        let app = test_app!(state);
        for uri in [
            "/users/me",
            "/programs/me",
            "/exercises",
            "/workouts/history",
            "/custom-workouts",
        ] {
            let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }

        let req = actix_test::TestRequest::get()
            .uri("/users/me")
            .insert_header((header::AUTHORIZATION, "Bearer not-a-jwt"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(resp).await, "Invalid token");
    }

    #[actix_web::test]
    async fn unknown_paths_are_not_found_without_a_token() {
        let state = state();
        let app = test_app!(state);
        for uri in ["/", "/nope", "/api/users/me", "/usersx"] {
            let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
        }

        // Public routes win over the guarded scope sharing their prefix.
        let req = actix_test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"email": "jane@example.com"}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::post().uri("/auth/logout").to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn registration_is_validated_before_storage() {
        let state = state();
        let app = test_app!(state);
        let req = actix_test::TestRequest::post()
            .uri("/auth/register")
            .set_json(json!({
                "email": "jane@example.com",
                "password": "long-enough-password",
                "name": "Jane",
                "age": 200,
                "sex": "female",
                "height": 170.0,
                "weight": 65.0,
                "activity_level": "moderately_active",
                "goal": "muscle_gain"
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(error_message(resp).await.contains("age"));
    }

    #[actix_web::test]
    async fn malformed_json_is_a_bad_request() {
        let state = state();
        let app = test_app!(state);
        let req = actix_test::TestRequest::post()
            .uri("/auth/login")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!error_message(resp).await.is_empty());
    }

    #[actix_web::test]
    async fn listing_programs_requires_a_goal() {
        let state = state();
        let app = test_app!(state);
        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/programs").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn profile_update_must_be_an_object() {
        let state = state();
        let app = test_app!(state);
        let req = actix_test::TestRequest::put()
            .uri("/users/me")
            .insert_header(bearer(&state))
            .set_json(json!([1, 2, 3]))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn bad_query_and_path_values_are_rejected() {
        let state = state();
        let app = test_app!(state);

        let req = actix_test::TestRequest::get()
            .uri("/workouts/next-weights")
            .insert_header(bearer(&state))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::get()
            .uri("/custom-workouts/not-a-uuid")
            .insert_header(bearer(&state))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn completion_payload_is_validated_before_lookup() {
        let state = state();
        let app = test_app!(state);
        let req = actix_test::TestRequest::post()
            .uri("/workouts/1/complete")
            .insert_header(bearer(&state))
            .set_json(json!({"exercises": [
                {"program_workout_exercise_id": 1, "actual_reps": [8, 8], "actual_rir": [2]}
            ]}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn custom_workout_gates_reject_the_request() {
        let state = state();
        let app = test_app!(state);
        let req = actix_test::TestRequest::post()
            .uri("/custom-workouts")
            .insert_header(bearer(&state))
            .set_json(json!({"name": "Block", "type": "yoga", "duration_weeks": 4}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::post()
            .uri("/custom-workouts/generate")
            .insert_header(bearer(&state))
            .set_json(json!({"type": "strength", "duration": 53}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
