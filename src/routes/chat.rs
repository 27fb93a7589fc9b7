use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use super::{parse_body, required_text, AppState};
use crate::auth::{ensure_acting_as, Auth};
use crate::chat::{ChatPipeline, ChatTurn};
use crate::error::ApiError;
use crate::telemetry;

pub const MAX_MESSAGE_CHARS: usize = 4000;
const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// When present, the exchange is stored in this user's history.
    pub user_uid: Option<String>,
    /// Prior turns supplied by the client; when empty, stored history is used.
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    pub user_uid: String,
    pub limit: Option<usize>,
}

fn pipeline(data: &AppState) -> Result<&ChatPipeline, ApiError> {
    data.chat
        .as_deref()
        .ok_or_else(|| ApiError::Unavailable("chat is not configured".into()))
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = crate::chat::ChatReply),
        (status = 502, description = "Language model failed", body = crate::error::ApiErrorBody),
        (status = 503, description = "Chat not configured", body = crate::error::ApiErrorBody)
    )
)]
pub async fn chat(auth: Option<Auth>, data: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let pipeline = pipeline(&data)?;
    let req: ChatRequest = parse_body(&body)?;
    let message = required_text(&req.message, "message")?;
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!("message must be at most {MAX_MESSAGE_CHARS} characters")));
    }
    let user_uid = req.user_uid.as_deref().map(str::trim).filter(|u| !u.is_empty());
    if let Some(uid) = user_uid {
        ensure_acting_as(&auth, uid)?;
    }

    match pipeline.respond(user_uid, &message, &req.history).await {
        Ok(reply) => {
            metrics::increment_counter!(telemetry::CHAT_REQUESTS, "outcome" => "ok");
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "reply": reply.reply,
                "emotion": reply.emotion,
                "historySaved": reply.history_saved,
            })))
        }
        Err(e) => {
            metrics::increment_counter!(telemetry::CHAT_REQUESTS, "outcome" => "model_error");
            warn!("chat model call failed: {e}");
            Err(ApiError::Upstream("the assistant is unavailable right now".into()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/chat/history",
    params(HistoryQuery),
    responses((status = 200, description = "Stored turns, oldest first; empty when history is unavailable"))
)]
pub async fn chat_history(req: HttpRequest, auth: Option<Auth>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let pipeline = pipeline(&data)?;
    let q = web::Query::<HistoryQuery>::from_query(req.query_string()).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let uid = required_text(&q.user_uid, "userUid")?;
    ensure_acting_as(&auth, &uid)?;
    let messages = pipeline.history(&uid, q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)).await;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "messages": messages })))
}
