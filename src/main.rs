use actix_web::{middleware::Compress, web, App, HttpServer};
use actix_cors::Cors;
use utoipa_swagger_ui::SwaggerUi;

use eggconomy::auth::admin_seed_from_env;
use eggconomy::openapi::ApiDoc;
use eggconomy::rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
use eggconomy::routes::{config, AppState};
use eggconomy::store::mem::MemStore;
use eggconomy::store::pg::PgStore;
use eggconomy::store::router::RoutingStore;
use eggconomy::store::EggStore;

use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Environment variables must be set externally (shell, systemd, Docker, etc.)
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars();

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping eggconomy server");

    let admin_seed = admin_seed_from_env();

    // The fallback store always exists; the primary is optional. Backend
    // choice happens per request inside RoutingStore, not here.
    let fallback = Arc::new(MemStore::new(admin_seed.clone()));
    let primary: Option<Arc<dyn EggStore>> = match std::env::var("DATABASE_URL") {
        Ok(db_url) => {
            use sqlx::postgres::PgPoolOptions;
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(&db_url)
                .expect("Failed to create Pg pool");
            info!("Primary store configured (Postgres); fallback on missing relations");
            Some(Arc::new(PgStore::new(pool, admin_seed)))
        }
        Err(_) => {
            info!("DATABASE_URL not set; serving everything from the in-process fallback store");
            None
        }
    };
    let store = Arc::new(RoutingStore::new(primary, fallback));

    let rate_limiter = RateLimiterFacade::new(
        InMemoryRateLimiter::new(true),
        RateLimitConfig::from_env(),
    );

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // local dev frontend ports
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Ok(front) = std::env::var("FRONTEND_URL") {
                c = c.allowed_origin(&front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                rate_limiter: Some(rate_limiter.clone()),
            }))
    })
    .bind(("0.0.0.0", 8080))?;

    info!("Listening on http://0.0.0.0:8080");

    server.run().await
}

/// Validate that required environment variables are set
fn validate_env_vars() {
    use std::env;

    if env::var("JWT_SECRET").is_err() {
        eprintln!("Missing required environment variable: JWT_SECRET");
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    if let Ok(secret) = env::var("JWT_SECRET") {
        if secret.len() < 32 {
            eprintln!("JWT_SECRET must be at least 32 characters long for security");
            std::process::exit(1);
        }
    }

    if env::var("DATABASE_URL").is_err() {
        eprintln!("Warning: DATABASE_URL not set; data lives in the in-process fallback store");
        eprintln!("Registered users and listings reset on restart (minus the local snapshot)");
    }
}
