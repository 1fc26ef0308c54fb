//! `/admin` routes - complex approval, subscription billing management and
//! platform stats. All routes require the `admin` role (enforced via the
//! `require_admin` role-guard applied in the router below).

use axum::{
    extract::{Extension, Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    auth::email::send_notification_email,
    errors::{AppError, AppResult},
    middleware::{auth_guard::AuthUser, role_guard::require_admin},
    services::{
        notifications,
        subscriptions::{self, BillingView},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    use axum::middleware;
    // require_admin reads Extension<AuthUser> (injected by require_auth in mod.rs);
    // it does not need AppState, so plain from_fn is sufficient.
    let admin_guard = middleware::from_fn(require_admin);
    Router::new()
        .route("/admin/complexes/pending",           get(list_pending_complexes))
        .route("/admin/complexes/{id}/approve",      post(approve_complex))
        .route("/admin/complexes/{id}/reject",       post(reject_complex))
        .route("/admin/subscriptions",               get(list_subscriptions))
        .route("/admin/complexes/{id}/subscription", patch(update_subscription))
        .route("/admin/notifications",               post(broadcast_notifications))
        .route("/admin/stats",                       get(stats))
        .route_layer(admin_guard)
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct PendingComplexRow {
    id:           String,
    owner_id:     String,
    name:         String,
    address:      String,
    neighborhood: Option<String>,
    phone:        Option<String>,
    whatsapp:     Option<String>,
    email:        Option<String>,
    owner_email:  String,
    owner_name:   Option<String>,
    created_at:   chrono::NaiveDateTime,
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id:                      String,
    name:                    String,
    owner_email:             String,
    is_approved:             bool,
    is_active:               bool,
    payment_status:          String,
    subscription_expires_at: Option<chrono::NaiveDateTime>,
}

#[derive(Serialize)]
struct SubscriptionItem {
    id:                      String,
    name:                    String,
    owner_email:             String,
    is_approved:             bool,
    is_active:               bool,
    subscription_expires_at: Option<chrono::NaiveDateTime>,
    #[serde(flatten)]
    billing: BillingView,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /admin/complexes/pending - complexes awaiting approval.
async fn list_pending_complexes(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
) -> AppResult<Json<Vec<PendingComplexRow>>> {
    let pool = &state.pool;
    let rows: Vec<PendingComplexRow> = sqlx::query_as::<_, PendingComplexRow>(
        "SELECT x.id, x.owner_id, x.name, x.address, x.neighborhood,
                x.phone, x.whatsapp, x.email,
                u.email AS owner_email, u.full_name AS owner_name,
                x.created_at
         FROM sport_complexes x
         JOIN users u ON u.id = x.owner_id
         WHERE x.is_approved = 0
         ORDER BY x.created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(Json(rows))
}

/// POST /admin/complexes/{id}/approve - approve, publicly list, and start
/// the trial clock. The trial window counts from approval, not from
/// registration, so a long-pending complex still gets its full trial.
async fn approve_complex(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let pool = &state.pool;
    let trial_expires =
        (Utc::now() + chrono::Duration::days(state.config.trial_days)).naive_utc();
    let affected = sqlx::query(
        "UPDATE sport_complexes
         SET is_approved = 1, is_active = 1,
             payment_status = 'trial', subscription_expires_at = ?
         WHERE id = ?",
    )
    .bind(trial_expires)
    .bind(&id)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!(complex_id = %id, "Complex approved");
    Ok(Json(serde_json::json!({ "message": "Complex approved" })))
}

/// POST /admin/complexes/{id}/reject - delist without deleting.
async fn reject_complex(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let pool = &state.pool;
    let affected = sqlx::query(
        "UPDATE sport_complexes SET is_approved = 0, is_active = 0 WHERE id = ?",
    )
    .bind(&id)
    .execute(pool)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!(complex_id = %id, "Complex rejected");
    Ok(Json(serde_json::json!({ "message": "Complex rejected" })))
}

/// GET /admin/subscriptions - every complex with its billing classification,
/// closest expiry first.
async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
) -> AppResult<Json<Vec<SubscriptionItem>>> {
    let pool = &state.pool;
    let rows: Vec<SubscriptionRow> = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT x.id, x.name, u.email AS owner_email,
                x.is_approved, x.is_active, x.payment_status, x.subscription_expires_at
         FROM sport_complexes x
         JOIN users u ON u.id = x.owner_id
         ORDER BY x.subscription_expires_at IS NULL, x.subscription_expires_at",
    )
    .fetch_all(pool)
    .await?;

    let now = Utc::now().naive_utc();
    let items = rows
        .into_iter()
        .map(|r| {
            let billing = subscriptions::classify(&r.payment_status, r.subscription_expires_at, now);
            SubscriptionItem {
                id: r.id,
                name: r.name,
                owner_email: r.owner_email,
                is_approved: r.is_approved,
                is_active: r.is_active,
                subscription_expires_at: r.subscription_expires_at,
                billing,
            }
        })
        .collect();
    Ok(Json(items))
}

// ── Subscription updates ─────────────────────────────────────

#[derive(Deserialize)]
struct UpdateSubscriptionBody {
    /// "activate", "extend-trial" or "suspend".
    action: String,
    days:   Option<i64>,
}

/// PATCH /admin/complexes/{id}/subscription - activate for N days, extend
/// the trial, or suspend. Active/trial complexes stay publicly listed;
/// suspension delists immediately.
async fn update_subscription(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateSubscriptionBody>,
) -> AppResult<Json<serde_json::Value>> {
    let pool = &state.pool;
    let days = body.days.unwrap_or(30);
    if days <= 0 {
        return Err(AppError::BadRequest("Days must be positive".into()));
    }

    let current: Option<Option<chrono::NaiveDateTime>> = sqlx::query_scalar(
        "SELECT subscription_expires_at FROM sport_complexes WHERE id = ?",
    )
    .bind(&id)
    .fetch_optional(pool)
    .await?;
    let current = current.ok_or(AppError::NotFound)?;

    let now = Utc::now().naive_utc();
    match body.action.as_str() {
        "activate" => {
            let expires = now + chrono::Duration::days(days);
            sqlx::query(
                "UPDATE sport_complexes
                 SET payment_status = 'active', is_active = 1, subscription_expires_at = ?
                 WHERE id = ?",
            )
            .bind(expires)
            .bind(&id)
            .execute(pool)
            .await?;
        }
        "extend-trial" => {
            // Extend from the later of now and the current expiry, so an
            // already-lapsed trial restarts rather than staying in the past.
            let base = current.filter(|at| *at > now).unwrap_or(now);
            let expires = base + chrono::Duration::days(days);
            sqlx::query(
                "UPDATE sport_complexes
                 SET payment_status = 'trial', is_active = 1, subscription_expires_at = ?
                 WHERE id = ?",
            )
            .bind(expires)
            .bind(&id)
            .execute(pool)
            .await?;
        }
        "suspend" => {
            sqlx::query(
                "UPDATE sport_complexes
                 SET payment_status = 'suspended', is_active = 0
                 WHERE id = ?",
            )
            .bind(&id)
            .execute(pool)
            .await?;
        }
        other => {
            return Err(AppError::BadRequest(format!("Invalid action \"{other}\"")));
        }
    }

    tracing::info!(complex_id = %id, action = %body.action, days, "Subscription updated");
    Ok(Json(serde_json::json!({ "message": "Subscription updated" })))
}

// ── Owner broadcasts ─────────────────────────────────────────

#[derive(Deserialize)]
struct BroadcastBody {
    /// "all", "trial", "active" or "expired".
    audience: String,
    subject:  Option<String>,
    /// Message with `{owner_name}`, `{complex_name}`, `{expiry_date}`
    /// placeholders.
    template: String,
}

#[derive(sqlx::FromRow)]
struct BroadcastTargetRow {
    complex_name:            String,
    owner_name:              Option<String>,
    owner_email:             String,
    payment_status:          String,
    subscription_expires_at: Option<chrono::NaiveDateTime>,
}

/// POST /admin/notifications - render a message template for every complex
/// owner in the selected billing audience and email it to each of them.
async fn broadcast_notifications(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
    Json(body): Json<BroadcastBody>,
) -> AppResult<Json<serde_json::Value>> {
    let pool = &state.pool;
    let audience = notifications::Audience::parse(&body.audience)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid audience \"{}\"", body.audience)))?;
    if body.template.trim().is_empty() {
        return Err(AppError::BadRequest("Message template is required".into()));
    }

    let rows: Vec<BroadcastTargetRow> = sqlx::query_as::<_, BroadcastTargetRow>(
        "SELECT x.name AS complex_name, u.full_name AS owner_name, u.email AS owner_email,
                x.payment_status, x.subscription_expires_at
         FROM sport_complexes x
         JOIN users u ON u.id = x.owner_id
         WHERE u.deleted_at IS NULL AND u.is_active = 1",
    )
    .fetch_all(pool)
    .await?;

    let now = Utc::now().naive_utc();
    let subject = body.subject.unwrap_or_else(|| "Cancha Jujuy".to_owned());
    let mut sent = 0u64;
    for row in rows {
        if !audience.includes(&row.payment_status, row.subscription_expires_at, now) {
            continue;
        }
        let message = notifications::render_template(
            &body.template,
            row.owner_name.as_deref().unwrap_or("propietario"),
            &row.complex_name,
            row.subscription_expires_at,
        );
        let config = state.config.clone();
        let subject = subject.clone();
        // Fire-and-forget per owner; one bounced address does not fail the batch.
        tokio::spawn(async move {
            if let Err(err) =
                send_notification_email(&config, &row.owner_email, &subject, &message).await
            {
                tracing::warn!(to = %row.owner_email, error = ?err, "Broadcast email failed");
            }
        });
        sent += 1;
    }

    tracing::info!(audience = %body.audience, sent, "Owner broadcast dispatched");
    Ok(Json(serde_json::json!({ "sent": sent })))
}

// ── Stats ────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatsResponse {
    total_complexes:      i64,
    approved_complexes:   i64,
    pending_complexes:    i64,
    total_users:          i64,
    total_reservations:   i64,
    monthly_reservations: i64,
}

/// GET /admin/stats - platform totals for the admin dashboard.
async fn stats(
    State(state): State<AppState>,
    Extension(_admin): Extension<AuthUser>,
) -> AppResult<Json<StatsResponse>> {
    let pool = &state.pool;

    let total_complexes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sport_complexes").fetch_one(pool).await?;
    let approved_complexes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sport_complexes WHERE is_approved = 1")
            .fetch_one(pool)
            .await?;
    let total_users: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(pool)
            .await?;
    let total_reservations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM reservations").fetch_one(pool).await?;
    let monthly_reservations: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reservations
         WHERE YEAR(created_at) = YEAR(NOW()) AND MONTH(created_at) = MONTH(NOW())",
    )
    .fetch_one(pool)
    .await?;

    Ok(Json(StatsResponse {
        total_complexes,
        approved_complexes,
        pending_complexes: total_complexes - approved_complexes,
        total_users,
        total_reservations,
        monthly_reservations,
    }))
}
