use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_cookies::{
    cookie::{time::Duration as CookieDuration, SameSite},
    Cookie, Cookies,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        email::{send_password_reset_email, send_verification_email},
        generate_token, hash_password, validate_password_strength, verify_password,
    },
    db::Db,
    errors::{AppError, AppResult},
    state::AppState,
};

// ── Session cookie constants ──────────────────────────────────

const SESSION_COOKIE: &str = "session";
const SESSION_DAYS:   i64  = 30;
const VERIFY_HOURS:   i64  = 24;
const RESET_HOURS:    i64  = 1;

// ── Request / response types ──────────────────────────────────

#[derive(Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    email:     String,
    password:  String,
    full_name: Option<String>,
    phone:     Option<String>,
    /// "customer" (default) or "owner" - owners manage complexes.
    role:      Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email:    String,
    password: String,
}

#[derive(Deserialize)]
struct VerifyEmailRequest {
    token: String,
}

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    token:    String,
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    id:        String,
    email:     String,
    full_name: Option<String>,
    phone:     Option<String>,
    role:      String,
}

// ── Database row types (runtime queries - no DATABASE_URL at compile time) ──────

#[derive(sqlx::FromRow)]
struct UserRow {
    id:            String,
    email:         String,
    full_name:     Option<String>,
    phone:         Option<String>,
    password_hash: String,
    role:          Option<String>,
    is_verified:   bool,
    is_active:     bool,
}

#[derive(sqlx::FromRow)]
struct MeRow {
    id:        String,
    email:     String,
    full_name: Option<String>,
    phone:     Option<String>,
    role:      Option<String>,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    user_id: String,
}

#[derive(sqlx::FromRow)]
struct ForgotRow {
    id: String,
}

// ── Router ────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register",        post(register))
        .route("/auth/login",           post(login))
        .route("/auth/logout",          post(logout))
        .route("/auth/me",              get(me))
        .route("/auth/verify-email",    post(verify_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password",  post(reset_password))
}

// ── Handlers ──────────────────────────────────────────────────

/// POST /auth/register - create a customer or owner account.
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let pool   = &state.pool;
    let config = &state.config;

    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let role = match body.role.as_deref() {
        None | Some("customer") => "customer",
        Some("owner") => "owner",
        Some(other) => {
            return Err(AppError::BadRequest(format!("Invalid role \"{other}\"")));
        }
    };

    // DEV: password strength is disabled in development for easy testing.
    if !config.is_development() {
        validate_password_strength(&body.password)?;
    }

    let email_taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? AND deleted_at IS NULL)",
    )
    .bind(&body.email)
    .fetch_one(pool)
    .await?;
    if email_taken {
        return Err(AppError::Conflict("Email address is already registered".into()));
    }

    let hash = hash_password(&body.password)?;
    let id   = Uuid::new_v4().to_string();

    let insert_result = sqlx::query(
        "INSERT INTO users (id, email, full_name, phone, password_hash, role, is_verified, is_active)
         VALUES (?, ?, ?, ?, ?, ?, 0, 1)",
    )
    .bind(&id)
    .bind(&body.email)
    .bind(&body.full_name)
    .bind(&body.phone)
    .bind(hash)
    .bind(role)
    .execute(pool)
    .await;

    // Guard against duplicate key (race condition / double-submit)
    if let Err(sqlx::Error::Database(ref db_err)) = insert_result {
        if db_err.code().as_deref() == Some("23000") {
            return Err(AppError::Conflict("Email address is already registered".into()));
        }
    }
    insert_result?;

    let token = issue_email_token(pool, &id, "verify_email", VERIFY_HOURS).await?;
    send_verification_email(config, &body.email, &token).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Account created. Please check your email to verify your address." })),
    ))
}

/// POST /auth/login - email+password login.
async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(body): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, full_name, phone, password_hash, role, is_verified, is_active
         FROM users WHERE email = ? AND deleted_at IS NULL LIMIT 1",
    )
    .bind(&body.email)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !row.is_active {
        return Err(AppError::Unauthorized);
    }
    let role = row.role.as_deref().unwrap_or("customer");
    // Admin is seeded pre-verified; everyone else confirms their email first.
    if role != "admin" && !row.is_verified {
        return Err(AppError::BadRequest(
            "Please verify your email address before logging in.".into(),
        ));
    }

    verify_password(&body.password, &row.password_hash)?;

    let session_token = create_session(pool, &row.id, SESSION_DAYS).await?;
    set_session_cookie(&cookies, &session_token, SESSION_DAYS);

    Ok(Json(UserResponse {
        id:        row.id.clone(),
        email:     row.email.clone(),
        full_name: row.full_name.clone(),
        phone:     row.phone.clone(),
        role:      role.to_owned(),
    }))
}

/// POST /auth/logout - delete the current session.
async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    if let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_owned()) {
        sqlx::query("DELETE FROM user_sessions WHERE token = ?")
            .bind(&token)
            .execute(pool)
            .await?;
    }
    clear_session_cookie(&cookies);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me - return the currently logged-in user.
async fn me(
    State(state): State<AppState>,
    cookies: Cookies,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(AppError::Unauthorized)?;

    let row = sqlx::query_as::<_, MeRow>(
        "SELECT u.id, u.email, u.full_name, u.phone, u.role
         FROM user_sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ? AND s.expires_at > NOW() AND u.is_active = 1 AND u.deleted_at IS NULL
         LIMIT 1",
    )
    .bind(&token)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    Ok(Json(UserResponse {
        id:        row.id.clone(),
        email:     row.email.clone(),
        full_name: row.full_name.clone(),
        phone:     row.phone.clone(),
        role:      row.role.clone().unwrap_or_default(),
    }))
}

/// POST /auth/verify-email - confirm an email address.
async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> AppResult<impl IntoResponse> {
    let pool = &state.pool;
    let row = sqlx::query_as::<_, TokenRow>(
        "SELECT user_id FROM email_tokens
         WHERE token = ? AND kind = 'verify_email' AND expires_at > NOW() LIMIT 1",
    )
    .bind(&body.token)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::BadRequest("Invalid or expired verification token".into()))?;

    sqlx::query("UPDATE users SET is_verified = 1 WHERE id = ?")
        .bind(&row.user_id)
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM email_tokens WHERE token = ?")
        .bind(&body.token)
        .execute(pool)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Email verified. You can now log in." })))
}

/// POST /auth/forgot-password - request a password-reset link.
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    let pool   = &state.pool;
    let config = &state.config;
    // Always return success to avoid leaking whether an email is registered
    let row = sqlx::query_as::<_, ForgotRow>(
        "SELECT id FROM users WHERE email = ? AND deleted_at IS NULL AND is_active = 1 LIMIT 1",
    )
    .bind(&body.email)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        let token = issue_email_token(pool, &row.id, "reset_password", RESET_HOURS).await?;
        // Best-effort - don't let email failure return an error
        let _ = send_password_reset_email(config, &body.email, &token).await;
    }

    Ok(Json(serde_json::json!({
        "message": "If that email is registered you will receive a reset link shortly."
    })))
}

/// POST /auth/reset-password - apply a new password from a reset token.
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    let pool   = &state.pool;
    let config = &state.config;
    if !config.is_development() {
        validate_password_strength(&body.password)?;
    }

    let row = sqlx::query_as::<_, TokenRow>(
        "SELECT user_id FROM email_tokens
         WHERE token = ? AND kind = 'reset_password' AND expires_at > NOW() LIMIT 1",
    )
    .bind(&body.token)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".into()))?;

    let hash = hash_password(&body.password)?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = NOW() WHERE id = ?")
        .bind(hash)
        .bind(&row.user_id)
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM email_tokens WHERE token = ?")
        .bind(&body.token)
        .execute(pool)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Password updated. Please log in." })))
}

// ── Internal helpers ──────────────────────────────────────────

async fn create_session(pool: &Db, user_id: &str, days: i64) -> AppResult<String> {
    let token = generate_token();
    let id    = Uuid::new_v4().to_string();
    let expires_at =
        (Utc::now() + chrono::Duration::days(days)).naive_utc();

    sqlx::query(
        "INSERT INTO user_sessions (id, user_id, token, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(&token)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(token)
}

async fn issue_email_token(
    pool: &Db,
    user_id: &str,
    kind: &str,
    hours: i64,
) -> AppResult<String> {
    // Invalidate any existing tokens of the same kind for this user
    sqlx::query("DELETE FROM email_tokens WHERE user_id = ? AND kind = ?")
        .bind(user_id)
        .bind(kind)
        .execute(pool)
        .await?;

    let token = generate_token();
    let id    = Uuid::new_v4().to_string();
    let expires_at =
        (Utc::now() + chrono::Duration::hours(hours)).naive_utc();

    sqlx::query(
        "INSERT INTO email_tokens (id, user_id, token, kind, expires_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(&token)
    .bind(kind)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(token)
}

fn set_session_cookie(cookies: &Cookies, token: &str, days: i64) {
    let cookie = Cookie::build((SESSION_COOKIE, token.to_owned()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(CookieDuration::days(days))
        .build();
    cookies.add(cookie);
}

fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .max_age(CookieDuration::ZERO)
        .build();
    cookies.add(cookie);
}
