use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use chetana::auth::StaticRoles;
use chetana::chat::{ChatPipeline, GeminiClient, InMemoryHistory};
use chetana::circuit_breaker::CircuitBreaker;
use chetana::config::Settings;
use chetana::openapi::ApiDoc;
use chetana::rate_limit::{InMemoryRateLimiter, RateLimiterFacade};
use chetana::repo::Repo;
use chetana::{configure, telemetry, AppState, SecurityHeaders};

const HISTORY_FAILURE_THRESHOLD: u32 = 5;
const HISTORY_COOLDOWN: Duration = Duration::from_secs(30);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            eprintln!("Please copy .env.example to .env and configure it");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping chetana server");
    info!("Frontend URL: {}", settings.frontend_url.as_deref().unwrap_or("http://localhost:5173"));

    let repo = build_repo(&settings).await?;
    let metrics = telemetry::install().context("installing metrics recorder")?;

    let limiter = RateLimiterFacade::new(
        InMemoryRateLimiter::new(settings.rate_limit_enabled),
        settings.rate_limit.clone(),
    );
    spawn_limiter_sweep(limiter.clone());

    let mut state = AppState::new(repo)
        .with_roles(StaticRoles::new(settings.admin_identities.iter().cloned()))
        .with_rate_limiter(limiter)
        .with_window(settings.submission_window)
        .with_metrics(metrics);

    match &settings.gemini {
        Some(gemini) => {
            let model = GeminiClient::new(gemini.api_key.clone(), gemini.model.clone(), gemini.api_base.clone())
                .context("building Gemini client")?;
            state = state.with_chat(ChatPipeline::new(
                Arc::new(model),
                Arc::new(InMemoryHistory::default()),
                CircuitBreaker::new(HISTORY_FAILURE_THRESHOLD, HISTORY_COOLDOWN),
            ));
            info!(model = %gemini.model, "chat enabled");
        }
        None => warn!("GEMINI_API_KEY not set; chat endpoints will answer 503"),
    }

    let openapi = ApiDoc::openapi();
    info!("OpenAPI document generated");

    let frontend_url = settings.frontend_url.clone();
    let enable_hsts = settings.enable_hsts;
    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            // local Vite dev server and the containerised frontend
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);
        if let Some(front) = &frontend_url {
            cors = cors.allowed_origin(front);
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::new(enable_hsts))
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(configure)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(settings.bind_addr.as_str())
    .with_context(|| format!("binding {}", settings.bind_addr))?;

    info!("Listening on http://{}", settings.bind_addr);
    server.run().await?;
    Ok(())
}

/// Periodically evicts clients whose window has fully drained.
fn spawn_limiter_sweep(limiter: RateLimiterFacade) {
    actix_web::rt::spawn(async move {
        let mut ticks = tokio::time::interval(limiter.cfg.action_window.max(Duration::from_secs(1)));
        loop {
            ticks.tick().await;
            limiter.sweep();
        }
    });
}

#[cfg(feature = "postgres-store")]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    use chetana::repo::pg::{connect, PgConnectOptions, PgRepo};

    if let Some(db) = &settings.database {
        let opts = PgConnectOptions {
            max_connections: db.max_connections,
            acquire_timeout: db.acquire_timeout,
            attempts: db.connect_attempts,
            backoff: db.connect_backoff,
        };
        let pool = connect(&db.url, &opts).await?;
        info!("Using Postgres repository backend");
        return Ok(Arc::new(PgRepo::new(pool)));
    }
    in_memory_repo()
}

#[cfg(not(feature = "postgres-store"))]
async fn build_repo(settings: &Settings) -> anyhow::Result<Arc<dyn Repo>> {
    if settings.database.is_some() {
        warn!("DATABASE_URL is set but this build has no postgres-store feature");
    }
    in_memory_repo()
}

#[cfg(feature = "inmem-store")]
fn in_memory_repo() -> anyhow::Result<Arc<dyn Repo>> {
    info!("Using in-memory repository backend; data is lost on restart");
    Ok(Arc::new(chetana::repo::inmem::InMemRepo::new()))
}

#[cfg(not(feature = "inmem-store"))]
fn in_memory_repo() -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("DATABASE_URL must be set when the inmem-store feature is disabled")
}
