use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use super::{parse_body, required_text, AppState};
use crate::auth::{create_jwt, generate_uid, hash_password, verify_password, Auth, AuthError, Role};
use crate::error::ApiError;
use crate::models::NewAccount;
use crate::repo::RepoError;

pub const MIN_PASSWORD_CHARS: usize = 8;
const UID_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub uid: String,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Role,
}

fn auth_failure(e: AuthError) -> ApiError {
    error!("auth: {e}");
    ApiError::Internal
}

fn issue_session(data: &AppState, uid: String) -> Result<SessionResponse, ApiError> {
    let token = create_jwt(&uid, data.roles.role_of(&uid)).map_err(auth_failure)?;
    Ok(SessionResponse { success: true, uid, token })
}

async fn free_uid(data: &AppState) -> Result<String, ApiError> {
    for _ in 0..UID_ATTEMPTS {
        let uid = generate_uid();
        match data.repo.get_account(&uid).await {
            Err(RepoError::NotFound) => return Ok(uid),
            Ok(_) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    error!("no free uid after {UID_ATTEMPTS} attempts");
    Err(ApiError::Internal)
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = SessionResponse),
        (status = 400, description = "Invalid email or password", body = crate::error::ApiErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ApiErrorBody)
    )
)]
pub async fn register(data: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let req: RegisterRequest = parse_body(&body)?;
    let email = required_text(&req.email, "email")?.to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::bad_request("email is invalid"));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::bad_request(format!("password must be at least {MIN_PASSWORD_CHARS} characters")));
    }
    match data.repo.find_account_by_email(&email).await {
        Ok(_) => return Err(ApiError::Conflict("email already registered".into())),
        Err(RepoError::NotFound) => {}
        Err(e) => return Err(e.into()),
    }

    let password = req.password;
    let password_hash = web::block(move || hash_password(&password))
        .await
        .map_err(|_| ApiError::Internal)?
        .map_err(auth_failure)?;
    let uid = free_uid(&data).await?;
    let display_name = req.display_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let account = data
        .repo
        .create_account(NewAccount { uid, email, display_name, password_hash })
        .await?;
    info!(uid = %account.uid, "account registered");
    Ok(HttpResponse::Created().json(issue_session(&data, account.uid)?))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiErrorBody)
    )
)]
pub async fn login(data: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let req: LoginRequest = parse_body(&body)?;
    let invalid = || ApiError::Unauthorized("invalid email or password".into());
    let email = req.email.trim().to_lowercase();
    let account = match data.repo.find_account_by_email(&email).await {
        Ok(account) => account,
        Err(RepoError::NotFound) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };
    let password = req.password;
    let hash = account.password_hash.clone();
    let ok = web::block(move || verify_password(&password, &hash))
        .await
        .map_err(|_| ApiError::Internal)?;
    if !ok {
        return Err(invalid());
    }
    Ok(HttpResponse::Ok().json(issue_session(&data, account.uid)?))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current session", body = MeResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let claims = auth.0;
    // configured admin identities may have no account row
    let (email, display_name) = match data.repo.get_account(&claims.sub).await {
        Ok(account) => (Some(account.email), account.display_name),
        Err(RepoError::NotFound) => (None, None),
        Err(e) => return Err(e.into()),
    };
    Ok(HttpResponse::Ok().json(MeResponse {
        role: data.roles.role_of(&claims.sub),
        uid: claims.sub,
        email,
        display_name,
    }))
}
