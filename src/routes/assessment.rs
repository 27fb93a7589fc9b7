use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{parse_body, required_text, AppState};
use crate::auth::{ensure_acting_as, Auth};
use crate::error::ApiError;
use crate::models::{Id, NewAssessment, Streak};
use crate::streak::StreakUpdate;
use crate::telemetry;

const MAX_KIND_CHARS: usize = 64;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAssessmentRequest {
    pub user_uid: String,
    /// Questionnaire name, e.g. `phq9`, `gad7`, `mood`.
    pub kind: String,
    pub score: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAssessmentResponse {
    pub success: bool,
    #[schema(value_type = i64)]
    pub assessment_id: Id,
    pub streak: Streak,
    pub update: StreakUpdate,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    pub user_uid: String,
}

fn user_query(req: &HttpRequest) -> Result<String, ApiError> {
    let q = web::Query::<UserQuery>::from_query(req.query_string()).map_err(|e| ApiError::bad_request(e.to_string()))?;
    required_text(&q.user_uid, "userUid")
}

#[utoipa::path(
    post,
    path = "/api/assessments",
    request_body = SubmitAssessmentRequest,
    responses(
        (status = 201, description = "Assessment stored and streak advanced", body = SubmitAssessmentResponse),
        (status = 400, description = "Invalid submission or deadline passed", body = crate::error::ApiErrorBody)
    )
)]
pub async fn submit_assessment(auth: Option<Auth>, data: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let req: SubmitAssessmentRequest = parse_body(&body)?;
    let user_uid = required_text(&req.user_uid, "userUid")?;
    ensure_acting_as(&auth, &user_uid)?;
    let kind = required_text(&req.kind, "kind")?;
    if kind.chars().count() > MAX_KIND_CHARS {
        return Err(ApiError::bad_request(format!("kind must be at most {MAX_KIND_CHARS} characters")));
    }
    if req.score < 0 {
        return Err(ApiError::bad_request("score must not be negative"));
    }
    let today = data
        .window
        .submission_date(data.clock.now())
        .ok_or_else(|| ApiError::bad_request("deadline passed"))?;

    let receipt = data
        .repo
        .record_assessment(NewAssessment { user_uid, kind, score: req.score }, today)
        .await?;
    metrics::increment_counter!(telemetry::ASSESSMENTS);
    info!(
        uid = %receipt.streak.user_uid,
        current = receipt.streak.current_streak,
        update = ?receipt.update,
        "assessment recorded"
    );
    Ok(HttpResponse::Created().json(SubmitAssessmentResponse {
        success: true,
        assessment_id: receipt.assessment.id,
        streak: receipt.streak,
        update: receipt.update,
    }))
}

#[utoipa::path(
    get,
    path = "/api/assessments",
    params(UserQuery),
    responses((status = 200, description = "Assessments, newest first", body = [crate::models::Assessment]))
)]
pub async fn list_assessments(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let uid = user_query(&req)?;
    let assessments = data.repo.list_assessments(&uid).await?;
    Ok(HttpResponse::Ok().json(assessments))
}

#[utoipa::path(
    get,
    path = "/api/assessments/streak",
    params(UserQuery),
    responses((status = 200, description = "Current streak; null before the first submission"))
)]
pub async fn get_streak(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let uid = user_query(&req)?;
    let streak = data.repo.get_streak(&uid).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "streak": streak })))
}
