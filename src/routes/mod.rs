use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::auth::{RoleLookup, StaticRoles};
use crate::chat::ChatPipeline;
use crate::error::ApiError;
use crate::rate_limit::RateLimiterFacade;
use crate::repo::Repo;
use crate::streak::{Clock, SubmissionWindow, SystemClock};
use crate::telemetry;

pub mod account;
pub mod assessment;
pub mod chat;
pub mod forum;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/forum")
                    .route(web::get().to(forum::forum_get))
                    .route(web::post().to(forum::forum_post))
                    .route(web::delete().to(forum::forum_delete)),
            )
            .service(
                web::resource("/assessments")
                    .route(web::get().to(assessment::list_assessments))
                    .route(web::post().to(assessment::submit_assessment)),
            )
            .service(web::resource("/assessments/streak").route(web::get().to(assessment::get_streak)))
            .service(web::resource("/chat").route(web::post().to(chat::chat)))
            .service(web::resource("/chat/history").route(web::get().to(chat::chat_history)))
            .service(web::resource("/auth/register").route(web::post().to(account::register)))
            .service(web::resource("/auth/login").route(web::post().to(account::login)))
            .service(web::resource("/auth/me").route(web::get().to(account::me))),
    );
    cfg.route("/health", web::get().to(health));
    cfg.route("/metrics", web::get().to(render_metrics));
}

/// Shared handler state. Optional parts are switched off when absent: no
/// rate limiting, chat answers 503, `/metrics` answers 404.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub roles: Arc<dyn RoleLookup>,
    pub rate_limiter: Option<RateLimiterFacade>,
    pub chat: Option<Arc<ChatPipeline>>,
    pub clock: Arc<dyn Clock>,
    pub window: SubmissionWindow,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self {
            repo,
            roles: Arc::new(StaticRoles::default()),
            rate_limiter: None,
            chat: None,
            clock: Arc::new(SystemClock),
            window: SubmissionWindow::default(),
            metrics: None,
        }
    }

    pub fn with_roles(mut self, roles: impl RoleLookup + 'static) -> Self {
        self.roles = Arc::new(roles);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiterFacade) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_chat(mut self, pipeline: ChatPipeline) -> Self {
        self.chat = Some(Arc::new(pipeline));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_window(mut self, window: SubmissionWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Rate-limit key: the client address, honouring `Forwarded`/`X-Forwarded-For`.
pub(crate) fn client_key(req: &HttpRequest) -> String {
    req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string()
}

pub(crate) fn throttle(req: &HttpRequest, data: &AppState) -> Result<(), ApiError> {
    let Some(limiter) = &data.rate_limiter else { return Ok(()) };
    let client = client_key(req);
    limiter.allow_action(&client).map_err(|retry| {
        metrics::increment_counter!(telemetry::RATE_LIMITED);
        warn!(%client, "forum rate limit exceeded");
        let secs = retry.as_secs() + u64::from(retry.subsec_nanos() > 0);
        ApiError::RateLimited(secs.max(1))
    })
}

/// Deserialize a JSON request body, mapping failures to our 400 body.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))
}

/// Trimmed, non-empty text field.
pub(crate) fn required_text(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub async fn render_metrics(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let handle = data.metrics.as_ref().ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render()))
}
