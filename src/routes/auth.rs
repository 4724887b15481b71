/// Authentication routes
///
/// User registration, login, token refresh and current user information.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{hash_password, login as session_login, refresh as session_refresh, AuthenticatedUser};
use crate::configuration::JwtSettings;
use crate::domain::UserView;
use crate::error::{AppError, AuthError};
use crate::validators::{is_valid_email, is_valid_username};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/register
///
/// Registers a new user. Answers the created user snapshot (never the
/// password hash); no tokens are issued, clients log in afterwards.
///
/// # Errors
/// - 400: Validation errors (invalid email/username/password)
/// - 409: Email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let username = is_valid_username(&form.username)?;
    let password_hash = hash_password(&form.password)?;

    tracing::info!(email = %email, username = %username, "Registering new user");

    let user_id = Uuid::new_v4();
    let created_at = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, username, password_hash, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&username)
    .bind(&password_hash)
    .bind(created_at)
    .execute(pool.get_ref())
    .await?;

    tracing::info!(user_id = %user_id, "User registered");

    Ok(HttpResponse::Created().json(UserView {
        id: user_id,
        email,
        username,
        role: None,
        family_id: None,
        created_at,
    }))
}

/// POST /auth/login
///
/// Authenticates with email and password; answers
/// `{tokens: {access_token, refresh_token}, user}`.
///
/// # Security Notes
/// - Unknown email and wrong password answer the same 401, preventing user
///   enumeration (a login for a nonexistent user is 401, never 404).
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let response = session_login(pool.get_ref(), jwt_config.get_ref(), &form.email, &form.password)
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// POST /auth/refresh
///
/// Exchanges a bearer **refresh** token for a new token pair plus the
/// current user snapshot. The new access token's role claim reflects the
/// user's current membership, re-read from storage.
///
/// # Errors
/// - 401: missing bearer token, invalid/expired refresh token, or user gone
pub async fn refresh(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let response = session_refresh(pool.get_ref(), jwt_config.get_ref(), token).await?;

    Ok(HttpResponse::Ok().json(response))
}

/// GET /auth/me
///
/// Current authenticated user's snapshot, freshly loaded from storage.
/// The identity is injected by the auth middleware.
pub async fn get_current_user(
    identity: web::ReqData<AuthenticatedUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = UserView::find_by_id(pool.get_ref(), identity.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(HttpResponse::Ok().json(user))
}
