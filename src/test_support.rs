// src/test_support.rs
//! Shared scaffolding for the HTTP tests in each handler module.
use crate::auth::TokenIssuer;
use crate::config::test_config;
use crate::models::User;
use crate::programs::ProgramCatalog;
use actix_web::{dev::ServiceResponse, http::header, test as actix_test, web};
use sqlx::{PgPool, postgres::PgPoolOptions};

pub struct TestState {
    pub pool: web::Data<PgPool>,
    pub issuer: web::Data<TokenIssuer>,
    pub catalog: web::Data<ProgramCatalog>,
}

impl TestState {
    /// The pool never connects; only requests answered before any query
    /// runs can be sent against it.
    pub fn lazy() -> Self {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        Self::with_pool(pool)
    }

    pub fn with_pool(pool: PgPool) -> Self {
        let config = test_config();
        TestState {
            pool: web::Data::new(pool),
            issuer: web::Data::new(TokenIssuer::new(&config)),
            catalog: web::Data::new(ProgramCatalog::new(config.program_cache_capacity)),
        }
    }

    pub fn bearer(&self, user: &User) -> (header::HeaderName, String) {
        let (token, _) = self.issuer.issue(user).unwrap();
        (header::AUTHORIZATION, format!("Bearer {}", token))
    }
}

macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.pool.clone())
                .app_data($state.issuer.clone())
                .app_data($state.catalog.clone())
                .configure($crate::configure_app),
        )
        .await
    };
}

pub async fn error_message(resp: ServiceResponse) -> String {
    let body: serde_json::Value = actix_test::read_body_json(resp).await;
    body["error"].as_str().unwrap_or_default().to_string()
}
