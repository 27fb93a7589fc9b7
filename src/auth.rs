use std::collections::HashSet;
use std::env;
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Identities with admin rights when `ADMIN_IDENTITIES` is not set.
pub const DEFAULT_ADMINS: &[&str] = &["u/kklt3o", "admin@chetana.com", "admin"];

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("JWT_SECRET not set")]
    MissingSecret,
    #[error("token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hash: {0}")]
    Hash(String),
}

/// Single place that decides who may moderate. Every admin check in the
/// handlers goes through this.
pub trait RoleLookup: Send + Sync {
    fn role_of(&self, identity: &str) -> Role;

    fn is_admin(&self, identity: &str) -> bool {
        self.role_of(identity) == Role::Admin
    }
}

/// Admin set read from configuration; everyone else is a plain user.
#[derive(Debug, Clone)]
pub struct StaticRoles {
    admins: HashSet<String>,
}

impl StaticRoles {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { admins: admins.into_iter().map(Into::into).collect() }
    }
}

impl Default for StaticRoles {
    fn default() -> Self {
        Self::new(DEFAULT_ADMINS.iter().copied())
    }
}

impl RoleLookup for StaticRoles {
    fn role_of(&self, identity: &str) -> Role {
        if self.admins.contains(identity) { Role::Admin } else { Role::User }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Role,
}

fn secret() -> Result<String, AuthError> {
    env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)
}

/// Validate a JWT and return its claims.
pub fn decode_jwt(token: &str) -> Result<Claims, AuthError> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Issue a session token for `uid`. Sessions are stateless; nothing is kept
/// server side.
pub fn create_jwt(uid: &str, role: Role) -> Result<String, AuthError> {
    let secret = secret()?;
    let exp = (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize;
    let claims = Claims { sub: uid.to_string(), exp, role };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() else {
            return ready(Err(ApiError::Unauthorized("authorization required".into())));
        };
        ready(
            decode_jwt(bearer.token())
                .map(Auth)
                .map_err(|_| ApiError::Unauthorized("invalid token".into())),
        )
    }
}

/// When the caller presented a session token, the uid named in the request
/// body must be the token's subject.
pub fn ensure_acting_as(auth: &Option<Auth>, claimed_uid: &str) -> Result<(), ApiError> {
    match auth {
        Some(Auth(claims)) if claims.sub != claimed_uid => {
            Err(ApiError::forbidden("token subject does not match the acting user"))
        }
        _ => Ok(()),
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Public user identifier: `u/` followed by six lowercase alphanumerics.
pub fn generate_uid() -> String {
    let tail: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("u/{tail}")
}
