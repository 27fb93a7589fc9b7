//! `/api/forum`, dispatched on the `action` query parameter.

use std::collections::HashMap;
use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{parse_body, required, required_text, throttle, AppState};
use crate::auth::{ensure_acting_as, Auth};
use crate::error::ApiError;
use crate::models::*;
use crate::telemetry;

pub const REASON_MIN_CHARS: usize = 5;
pub const REASON_MAX_CHARS: usize = 500;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ForumQuery {
    /// Operation to run, e.g. `posts`, `vote`, `resolve-report`.
    pub action: String,
    pub community: Option<String>,
    #[param(value_type = Option<i64>)]
    pub post_id: Option<Id>,
    pub user_uid: Option<String>,
    pub admin_uid: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub target_type: Option<String>,
    #[param(value_type = Option<i64>)]
    pub id: Option<Id>,
    pub author_uid: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostBody {
    pub title: String,
    pub content: String,
    pub community: String,
    pub author_uid: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentBody {
    pub post_id: Id,
    pub content: String,
    pub author_uid: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    pub post_id: Option<Id>,
    pub comment_id: Option<Id>,
    pub vote_type: String,
    pub voter_uid: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    pub community: String,
    pub user_uid: String,
    /// `join` (default) or `leave`.
    pub action: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PinBody {
    pub post_id: Option<Id>,
    pub comment_id: Option<Id>,
    pub pinner_uid: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportBody {
    #[serde(rename = "type")]
    pub target_type: String,
    pub id: Id,
    pub reason: String,
    pub reporter_uid: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReportBody {
    pub report_id: Id,
    pub action: ReportAction,
    pub resolver_uid: String,
}

fn unknown_action(action: &str) -> ApiError {
    ApiError::bad_request(format!("unknown action '{action}'"))
}

fn parse_query(req: &HttpRequest) -> Result<ForumQuery, ApiError> {
    web::Query::<ForumQuery>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> Result<T, ApiError> {
    raw.parse().map_err(ApiError::BadRequest)
}

fn pick_target(post_id: Option<Id>, comment_id: Option<Id>) -> Result<Target, ApiError> {
    match (post_id, comment_id) {
        (Some(id), None) => Ok(Target::post(id)),
        (None, Some(id)) => Ok(Target::comment(id)),
        _ => Err(ApiError::bad_request("exactly one of postId or commentId is required")),
    }
}

fn require_admin(data: &AppState, uid: &str, what: &str) -> Result<(), ApiError> {
    if data.roles.is_admin(uid) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("only admins can {what}")))
    }
}

async fn require_member(data: &AppState, uid: &str, community: Community) -> Result<(), ApiError> {
    if data.repo.is_member(uid, community).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("join the {community} community first")))
    }
}

async fn votes_of(data: &AppState, viewer: Option<&str>, kind: TargetType, ids: &[Id]) -> Result<HashMap<Id, VoteType>, ApiError> {
    match viewer {
        Some(uid) if !ids.is_empty() => Ok(data.repo.votes_by(uid, kind, ids).await?),
        _ => Ok(HashMap::new()),
    }
}

#[utoipa::path(
    get,
    path = "/api/forum",
    params(ForumQuery),
    responses(
        (status = 200, description = "posts | comments | memberships | aura | reports | community-rules"),
        (status = 400, description = "Unknown action or bad parameters", body = crate::error::ApiErrorBody),
        (status = 403, description = "Admin only (reports)", body = crate::error::ApiErrorBody),
        (status = 404, description = "Not found", body = crate::error::ApiErrorBody)
    )
)]
pub async fn forum_get(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let q = parse_query(&req)?;
    match q.action.as_str() {
        "posts" => get_posts(&data, &q).await,
        "comments" => get_comments(&data, &q).await,
        "memberships" => {
            let uid = required(q.user_uid.as_deref(), "userUid")?;
            let communities = data.repo.memberships(uid).await?;
            Ok(HttpResponse::Ok().json(json!({ "success": true, "communities": communities })))
        }
        "aura" => {
            let uid = required(q.user_uid.as_deref(), "userUid")?;
            let aura = data.repo.aura(uid).await?;
            Ok(HttpResponse::Ok().json(json!({ "success": true, "aura": aura })))
        }
        "reports" => {
            let admin = required(q.admin_uid.as_deref(), "adminUid")?;
            require_admin(&data, admin, "review reports")?;
            let status = q.status.as_deref().map(parse_enum::<ReportStatus>).transpose()?;
            let reports = data.repo.list_reports(status).await?;
            Ok(HttpResponse::Ok().json(reports))
        }
        "community-rules" => {
            let community: Community = parse_enum(required(q.community.as_deref(), "community")?)?;
            let rules = data.repo.community_rules(community).await?;
            Ok(HttpResponse::Ok().json(json!({ "success": true, "community": community, "rules": rules })))
        }
        other => Err(unknown_action(other)),
    }
}

async fn get_posts(data: &AppState, q: &ForumQuery) -> Result<HttpResponse, ApiError> {
    let viewer = q.user_uid.as_deref();
    if let Some(id) = q.post_id {
        let post = data.repo.get_post(id).await?;
        let votes = votes_of(data, viewer, TargetType::Post, &[id]).await?;
        let vote = votes.get(&id).copied();
        return Ok(HttpResponse::Ok().json(PostView::new(post, vote)));
    }
    let community = q.community.as_deref().map(parse_enum::<Community>).transpose()?;
    let posts = data.repo.list_posts(community).await?;
    let ids: Vec<Id> = posts.iter().map(|p| p.id).collect();
    let votes = votes_of(data, viewer, TargetType::Post, &ids).await?;
    let views: Vec<PostView> = posts
        .into_iter()
        .map(|p| {
            let vote = votes.get(&p.id).copied();
            PostView::new(p, vote)
        })
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

async fn get_comments(data: &AppState, q: &ForumQuery) -> Result<HttpResponse, ApiError> {
    let post_id = required(q.post_id, "postId")?;
    let comments = data.repo.list_comments(post_id).await?;
    let ids: Vec<Id> = comments.iter().map(|c| c.id).collect();
    let votes = votes_of(data, q.user_uid.as_deref(), TargetType::Comment, &ids).await?;
    let views: Vec<CommentView> = comments
        .into_iter()
        .map(|c| {
            let vote = votes.get(&c.id).copied();
            CommentView::new(c, vote)
        })
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    post,
    path = "/api/forum",
    params(ForumQuery),
    request_body(content = String, description = "JSON body; its shape depends on the action", content_type = "application/json"),
    responses(
        (status = 200, description = "vote | join | pin | resolve-report"),
        (status = 201, description = "posts | comments | report created"),
        (status = 400, description = "Validation failed or unknown action", body = crate::error::ApiErrorBody),
        (status = 403, description = "Not allowed", body = crate::error::ApiErrorBody),
        (status = 404, description = "Target not found", body = crate::error::ApiErrorBody),
        (status = 429, description = "Too many forum actions", body = crate::error::ApiErrorBody)
    )
)]
pub async fn forum_post(
    req: HttpRequest,
    auth: Option<Auth>,
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let q = parse_query(&req)?;
    let action = q.action.as_str();
    if !matches!(action, "posts" | "comments" | "vote" | "join" | "pin" | "report" | "resolve-report") {
        return Err(unknown_action(action));
    }
    throttle(&req, &data)?;
    match action {
        "posts" => create_post(&data, &auth, parse_body(&body)?).await,
        "comments" => create_comment(&data, &auth, parse_body(&body)?).await,
        "vote" => vote(&data, &auth, parse_body(&body)?).await,
        "join" => join(&data, &auth, parse_body(&body)?).await,
        "pin" => pin(&data, &auth, parse_body(&body)?).await,
        "report" => report(&data, &auth, parse_body(&body)?).await,
        _ => resolve_report(&data, &auth, parse_body(&body)?).await,
    }
}

async fn create_post(data: &AppState, auth: &Option<Auth>, body: CreatePostBody) -> Result<HttpResponse, ApiError> {
    let author_uid = required_text(&body.author_uid, "authorUid")?;
    ensure_acting_as(auth, &author_uid)?;
    let title = required_text(&body.title, "title")?;
    let content = required_text(&body.content, "content")?;
    let community: Community = parse_enum(&body.community)?;
    require_member(data, &author_uid, community).await?;

    let post = data.repo.create_post(NewPost { title, content, community, author_uid }).await?;
    info!(post_id = post.id, %community, "post created");
    Ok(HttpResponse::Created().json(json!({ "success": true, "postId": post.id })))
}

async fn create_comment(data: &AppState, auth: &Option<Auth>, body: CreateCommentBody) -> Result<HttpResponse, ApiError> {
    let author_uid = required_text(&body.author_uid, "authorUid")?;
    ensure_acting_as(auth, &author_uid)?;
    let content = required_text(&body.content, "content")?;
    let post = data.repo.get_post(body.post_id).await?;
    require_member(data, &author_uid, post.community).await?;

    let comment = data.repo.create_comment(NewComment { post_id: post.id, content, author_uid }).await?;
    info!(comment_id = comment.id, post_id = post.id, "comment created");
    Ok(HttpResponse::Created().json(json!({ "success": true, "commentId": comment.id })))
}

async fn vote(data: &AppState, auth: &Option<Auth>, body: VoteBody) -> Result<HttpResponse, ApiError> {
    let target = pick_target(body.post_id, body.comment_id)?;
    let vote: VoteType = parse_enum(&body.vote_type)?;
    let voter = required_text(&body.voter_uid, "voterUid")?;
    ensure_acting_as(auth, &voter)?;

    let outcome = data.repo.apply_vote(target, vote, &voter).await?;
    metrics::increment_counter!(telemetry::FORUM_VOTES, "vote" => vote.as_str());
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "auraChange": outcome.aura_change,
        "userVote": outcome.user_vote,
    })))
}

async fn join(data: &AppState, auth: &Option<Auth>, body: JoinBody) -> Result<HttpResponse, ApiError> {
    let uid = required_text(&body.user_uid, "userUid")?;
    ensure_acting_as(auth, &uid)?;
    let community: Community = parse_enum(&body.community)?;
    let joined = match body.action.as_deref().unwrap_or("join") {
        "join" => {
            data.repo.join(&uid, community).await?;
            true
        }
        "leave" => {
            data.repo.leave(&uid, community).await?;
            false
        }
        other => return Err(ApiError::bad_request(format!("action must be join or leave, got '{other}'"))),
    };
    Ok(HttpResponse::Ok().json(json!({ "success": true, "joined": joined })))
}

async fn pin(data: &AppState, auth: &Option<Auth>, body: PinBody) -> Result<HttpResponse, ApiError> {
    let target = pick_target(body.post_id, body.comment_id)?;
    let pinner = required_text(&body.pinner_uid, "pinnerUid")?;
    ensure_acting_as(auth, &pinner)?;
    require_admin(data, &pinner, "pin content")?;

    let pinned = data.repo.toggle_pin(target).await?;
    info!(kind = target.kind.as_str(), id = target.id, pinned, "pin toggled");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "pinned": pinned })))
}

async fn report(data: &AppState, auth: &Option<Auth>, body: ReportBody) -> Result<HttpResponse, ApiError> {
    let reporter = required_text(&body.reporter_uid, "reporterUid")?;
    ensure_acting_as(auth, &reporter)?;
    let target_type: TargetType = parse_enum(&body.target_type)?;
    let reason = body.reason.trim();
    let len = reason.chars().count();
    if !(REASON_MIN_CHARS..=REASON_MAX_CHARS).contains(&len) {
        return Err(ApiError::bad_request(format!(
            "reason must be between {REASON_MIN_CHARS} and {REASON_MAX_CHARS} characters"
        )));
    }
    let target = Target { kind: target_type, id: body.id };
    data.repo.author_of(target).await?;

    let report = data
        .repo
        .create_report(NewReport { target_type, content_id: body.id, reason: reason.to_string(), reporter_uid: reporter })
        .await?;
    metrics::increment_counter!(telemetry::FORUM_REPORTS);
    info!(report_id = report.id, kind = target_type.as_str(), content_id = body.id, "report filed");
    Ok(HttpResponse::Created().json(json!({ "success": true, "reportId": report.id })))
}

async fn resolve_report(data: &AppState, auth: &Option<Auth>, body: ResolveReportBody) -> Result<HttpResponse, ApiError> {
    let resolver = required_text(&body.resolver_uid, "resolverUid")?;
    ensure_acting_as(auth, &resolver)?;
    require_admin(data, &resolver, "resolve reports")?;

    let report = data.repo.resolve_report(body.report_id, body.action).await?;
    info!(report_id = report.id, status = report.status.as_str(), %resolver, "report resolved");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "status": report.status })))
}

#[utoipa::path(
    delete,
    path = "/api/forum",
    params(ForumQuery),
    responses(
        (status = 200, description = "Content deleted"),
        (status = 403, description = "Neither the author nor an admin", body = crate::error::ApiErrorBody),
        (status = 404, description = "Content not found", body = crate::error::ApiErrorBody)
    )
)]
pub async fn forum_delete(req: HttpRequest, auth: Option<Auth>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let q = parse_query(&req)?;
    if q.action != "delete-content" {
        return Err(unknown_action(&q.action));
    }
    throttle(&req, &data)?;

    let kind: TargetType = parse_enum(required(q.target_type.as_deref(), "type")?)?;
    let target = Target { kind, id: required(q.id, "id")? };
    let actor = required_text(required(q.author_uid.as_deref(), "authorUid")?, "authorUid")?;
    ensure_acting_as(&auth, &actor)?;

    let author = data.repo.author_of(target).await?;
    if author != actor && !data.roles.is_admin(&actor) {
        return Err(ApiError::forbidden("only the author or an admin can delete this"));
    }
    data.repo.delete_content(target).await?;
    info!(kind = kind.as_str(), id = target.id, %actor, "content deleted");
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
