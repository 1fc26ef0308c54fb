//! `/complexes` routes - public catalog browsing plus owner-side management
//! of complexes and their courts.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    middleware::{auth_guard::AuthUser, role_guard::require_owner},
    models::UserRole,
    services::booking,
    state::AppState,
};

/// Routes reachable without a session: the public marketplace listing.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/complexes",      get(list_public_complexes))
        .route("/complexes/{id}", get(get_public_complex))
}

/// Owner-side management routes. `require_owner` admits owners and admins.
pub fn router() -> Router<AppState> {
    use axum::middleware;
    let owner_guard = middleware::from_fn(require_owner);
    Router::new()
        .route("/complexes",                    post(register_complex))
        .route("/complexes/{id}",               put(update_complex))
        .route("/complexes/{id}/courts",        post(add_court))
        .route("/courts/{id}",                  put(update_court).delete(deactivate_court))
        .route("/courts/{id}/availability",     put(set_court_availability))
        .route("/complexes/{id}/reservations",  get(list_complex_reservations))
        .route_layer(owner_guard)
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct ComplexRow {
    id:           String,
    owner_id:     String,
    name:         String,
    description:  Option<String>,
    address:      String,
    neighborhood: Option<String>,
    phone:        Option<String>,
    whatsapp:     Option<String>,
    email:        Option<String>,
    website:      Option<String>,
    photos:       Option<String>,
    amenities:    Option<String>,
    opening_hours: Option<String>,
    latitude:     Option<f64>,
    longitude:    Option<f64>,
    is_approved:  bool,
    is_active:    bool,
}

#[derive(sqlx::FromRow, Serialize)]
struct CourtRow {
    id:               String,
    complex_id:       String,
    name:             String,
    sport:            String,
    players_capacity: i32,
    surface_type:     Option<String>,
    has_lighting:     bool,
    has_roof:         bool,
    hourly_price:     Option<i64>,
    is_active:        bool,
}

#[derive(Serialize)]
struct ComplexResponse {
    id:            String,
    owner_id:      String,
    name:          String,
    description:   Option<String>,
    address:       String,
    neighborhood:  Option<String>,
    phone:         Option<String>,
    whatsapp:      Option<String>,
    email:         Option<String>,
    website:       Option<String>,
    photos:        Vec<String>,
    amenities:     Vec<String>,
    opening_hours: Option<serde_json::Value>,
    latitude:      Option<f64>,
    longitude:     Option<f64>,
    is_approved:   bool,
    is_active:     bool,
    courts:        Vec<CourtRow>,
}

fn parse_string_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn to_response(row: ComplexRow, courts: Vec<CourtRow>) -> ComplexResponse {
    ComplexResponse {
        id: row.id,
        owner_id: row.owner_id,
        name: row.name,
        description: row.description,
        address: row.address,
        neighborhood: row.neighborhood,
        phone: row.phone,
        whatsapp: row.whatsapp,
        email: row.email,
        website: row.website,
        photos: parse_string_list(row.photos),
        amenities: parse_string_list(row.amenities),
        opening_hours: row.opening_hours.and_then(|s| serde_json::from_str(&s).ok()),
        latitude: row.latitude,
        longitude: row.longitude,
        is_approved: row.is_approved,
        is_active: row.is_active,
        courts,
    }
}

const COMPLEX_COLUMNS: &str =
    "id, owner_id, name, description, address, neighborhood, phone, whatsapp, email, website,
     CAST(photos AS CHAR) AS photos, CAST(amenities AS CHAR) AS amenities,
     CAST(opening_hours AS CHAR) AS opening_hours,
     latitude, longitude, is_approved, is_active";

// ── Request bodies ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct NewCourtBody {
    #[validate(length(min = 1, message = "Court name is required"))]
    name:             String,
    #[validate(length(min = 1, message = "Sport is required"))]
    sport:            String,
    players_capacity: Option<i32>,
    surface_type:     Option<String>,
    has_lighting:     Option<bool>,
    has_roof:         Option<bool>,
    hourly_price:     Option<i64>,
}

#[derive(Deserialize, Validate)]
struct RegisterComplexBody {
    #[validate(length(min = 1, message = "Complex name is required"))]
    name:          String,
    description:   Option<String>,
    #[validate(length(min = 1, message = "Address is required"))]
    address:       String,
    neighborhood:  Option<String>,
    phone:         Option<String>,
    whatsapp:      Option<String>,
    #[validate(email(message = "Invalid email address"))]
    email:         Option<String>,
    website:       Option<String>,
    photos:        Option<Vec<String>>,
    amenities:     Option<Vec<String>>,
    opening_hours: Option<serde_json::Value>,
    latitude:      Option<f64>,
    longitude:     Option<f64>,
    #[validate(nested)]
    courts:        Vec<NewCourtBody>,
}

#[derive(Deserialize)]
struct UpdateComplexBody {
    name:          Option<String>,
    description:   Option<String>,
    address:       Option<String>,
    neighborhood:  Option<String>,
    phone:         Option<String>,
    whatsapp:      Option<String>,
    email:         Option<String>,
    website:       Option<String>,
    photos:        Option<Vec<String>>,
    amenities:     Option<Vec<String>>,
    opening_hours: Option<serde_json::Value>,
    latitude:      Option<f64>,
    longitude:     Option<f64>,
}

#[derive(Deserialize)]
struct UpdateCourtBody {
    name:             Option<String>,
    sport:            Option<String>,
    players_capacity: Option<i32>,
    surface_type:     Option<String>,
    has_lighting:     Option<bool>,
    has_roof:         Option<bool>,
    hourly_price:     Option<i64>,
    is_active:        Option<bool>,
}

// ── Auth helper ──────────────────────────────────────────────

/// Verify caller owns the complex. Admins bypass.
async fn assert_owns_complex(
    pool: &crate::db::Db,
    complex_id: &str,
    caller: &AuthUser,
) -> AppResult<()> {
    if caller.role == UserRole::Admin {
        return Ok(());
    }
    let is_mine: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sport_complexes WHERE id = ? AND owner_id = ?)",
    )
    .bind(complex_id)
    .bind(&caller.user_id)
    .fetch_one(pool)
    .await?;
    if !is_mine {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

async fn fetch_active_courts(
    pool: &crate::db::Db,
    complex_id: &str,
) -> AppResult<Vec<CourtRow>> {
    let courts: Vec<CourtRow> = sqlx::query_as::<_, CourtRow>(
        "SELECT id, complex_id, name, sport, players_capacity, surface_type,
                has_lighting, has_roof, hourly_price, is_active
         FROM sport_courts WHERE complex_id = ? AND is_active = 1 ORDER BY name",
    )
    .bind(complex_id)
    .fetch_all(pool)
    .await?;
    Ok(courts)
}

// ── Public handlers ──────────────────────────────────────────

/// GET /complexes - approved and active complexes with their active courts.
async fn list_public_complexes(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ComplexResponse>>> {
    let pool = &state.pool;
    let rows: Vec<ComplexRow> = sqlx::query_as::<_, ComplexRow>(&format!(
        "SELECT {COMPLEX_COLUMNS}
         FROM sport_complexes
         WHERE is_approved = 1 AND is_active = 1
         ORDER BY name",
    ))
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let courts = fetch_active_courts(pool, &row.id).await?;
        out.push(to_response(row, courts));
    }
    Ok(Json(out))
}

/// GET /complexes/{id} - one public complex with its courts.
async fn get_public_complex(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ComplexResponse>> {
    let pool = &state.pool;
    let row: ComplexRow = sqlx::query_as::<_, ComplexRow>(&format!(
        "SELECT {COMPLEX_COLUMNS}
         FROM sport_complexes
         WHERE id = ? AND is_approved = 1 AND is_active = 1",
    ))
    .bind(&id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    let courts = fetch_active_courts(pool, &row.id).await?;
    Ok(Json(to_response(row, courts)))
}

// ── Owner handlers ───────────────────────────────────────────

/// POST /complexes - register a new complex with its initial courts.
/// The complex starts unapproved on a trial subscription whose expiry stays
/// unset until admin approval starts the trial clock.
async fn register_complex(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RegisterComplexBody>,
) -> AppResult<(StatusCode, Json<ComplexResponse>)> {
    let pool = &state.pool;
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if body.courts.is_empty() {
        return Err(AppError::BadRequest("At least one court is required".into()));
    }

    let id = Uuid::new_v4().to_string();
    let photos = serde_json::to_string(&body.photos.clone().unwrap_or_default())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let amenities = serde_json::to_string(&body.amenities.clone().unwrap_or_default())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let opening_hours = body
        .opening_hours
        .as_ref()
        .map(|v| v.to_string());

    sqlx::query(
        "INSERT INTO sport_complexes
            (id, owner_id, name, description, address, neighborhood, phone, whatsapp,
             email, website, photos, amenities, opening_hours, latitude, longitude,
             is_approved, is_active, payment_status, subscription_expires_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 'trial', NULL)",
    )
    .bind(&id)
    .bind(&user.user_id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(&body.address)
    .bind(&body.neighborhood)
    .bind(&body.phone)
    .bind(&body.whatsapp)
    .bind(&body.email)
    .bind(&body.website)
    .bind(&photos)
    .bind(&amenities)
    .bind(&opening_hours)
    .bind(body.latitude)
    .bind(body.longitude)
    .execute(pool)
    .await?;

    for court in &body.courts {
        insert_court(pool, &id, court).await?;
    }

    let row: ComplexRow = sqlx::query_as::<_, ComplexRow>(&format!(
        "SELECT {COMPLEX_COLUMNS} FROM sport_complexes WHERE id = ?",
    ))
    .bind(&id)
    .fetch_one(pool)
    .await?;
    let courts = fetch_active_courts(pool, &id).await?;
    Ok((StatusCode::CREATED, Json(to_response(row, courts))))
}

async fn insert_court(
    pool: &crate::db::Db,
    complex_id: &str,
    court: &NewCourtBody,
) -> AppResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sport_courts
            (id, complex_id, name, sport, players_capacity, surface_type,
             has_lighting, has_roof, hourly_price, is_active)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(&id)
    .bind(complex_id)
    .bind(&court.name)
    .bind(&court.sport)
    .bind(court.players_capacity.unwrap_or(10))
    .bind(&court.surface_type)
    .bind(court.has_lighting.unwrap_or(false))
    .bind(court.has_roof.unwrap_or(false))
    .bind(court.hourly_price)
    .execute(pool)
    .await?;
    Ok(id)
}

/// PUT /complexes/{id} - owner edits their complex details.
async fn update_complex(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateComplexBody>,
) -> AppResult<Json<ComplexResponse>> {
    let pool = &state.pool;
    assert_owns_complex(pool, &id, &user).await?;

    if let Some(v) = &body.name         { sqlx::query("UPDATE sport_complexes SET name = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.description  { sqlx::query("UPDATE sport_complexes SET description = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.address      { sqlx::query("UPDATE sport_complexes SET address = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.neighborhood { sqlx::query("UPDATE sport_complexes SET neighborhood = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.phone        { sqlx::query("UPDATE sport_complexes SET phone = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.whatsapp     { sqlx::query("UPDATE sport_complexes SET whatsapp = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.email        { sqlx::query("UPDATE sport_complexes SET email = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.website      { sqlx::query("UPDATE sport_complexes SET website = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.latitude      { sqlx::query("UPDATE sport_complexes SET latitude = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.longitude     { sqlx::query("UPDATE sport_complexes SET longitude = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.photos {
        let json = serde_json::to_string(v).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        sqlx::query("UPDATE sport_complexes SET photos = ? WHERE id = ?").bind(json).bind(&id).execute(pool).await?;
    }
    if let Some(v) = &body.amenities {
        let json = serde_json::to_string(v).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        sqlx::query("UPDATE sport_complexes SET amenities = ? WHERE id = ?").bind(json).bind(&id).execute(pool).await?;
    }
    if let Some(v) = &body.opening_hours {
        sqlx::query("UPDATE sport_complexes SET opening_hours = ? WHERE id = ?").bind(v.to_string()).bind(&id).execute(pool).await?;
    }

    let row: ComplexRow = sqlx::query_as::<_, ComplexRow>(&format!(
        "SELECT {COMPLEX_COLUMNS} FROM sport_complexes WHERE id = ?",
    ))
    .bind(&id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;
    let courts = fetch_active_courts(pool, &id).await?;
    Ok(Json(to_response(row, courts)))
}

/// POST /complexes/{id}/courts - add a court to an owned complex.
async fn add_court(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(complex_id): Path<String>,
    Json(body): Json<NewCourtBody>,
) -> AppResult<(StatusCode, Json<CourtRow>)> {
    let pool = &state.pool;
    assert_owns_complex(pool, &complex_id, &user).await?;
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let id = insert_court(pool, &complex_id, &body).await?;
    let court: CourtRow = sqlx::query_as::<_, CourtRow>(
        "SELECT id, complex_id, name, sport, players_capacity, surface_type,
                has_lighting, has_roof, hourly_price, is_active
         FROM sport_courts WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok((StatusCode::CREATED, Json(court)))
}

/// Resolve the owning complex of a court, for ownership checks.
async fn court_complex_id(pool: &crate::db::Db, court_id: &str) -> AppResult<String> {
    let complex_id: Option<String> =
        sqlx::query_scalar("SELECT complex_id FROM sport_courts WHERE id = ?")
            .bind(court_id)
            .fetch_optional(pool)
            .await?;
    complex_id.ok_or(AppError::NotFound)
}

/// PUT /courts/{id} - edit a court.
async fn update_court(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCourtBody>,
) -> AppResult<Json<CourtRow>> {
    let pool = &state.pool;
    let complex_id = court_complex_id(pool, &id).await?;
    assert_owns_complex(pool, &complex_id, &user).await?;

    if let Some(v) = &body.name             { sqlx::query("UPDATE sport_courts SET name = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.sport            { sqlx::query("UPDATE sport_courts SET sport = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.players_capacity  { sqlx::query("UPDATE sport_courts SET players_capacity = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = &body.surface_type     { sqlx::query("UPDATE sport_courts SET surface_type = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.has_lighting      { sqlx::query("UPDATE sport_courts SET has_lighting = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.has_roof          { sqlx::query("UPDATE sport_courts SET has_roof = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.hourly_price      { sqlx::query("UPDATE sport_courts SET hourly_price = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }
    if let Some(v) = body.is_active         { sqlx::query("UPDATE sport_courts SET is_active = ? WHERE id = ?").bind(v).bind(&id).execute(pool).await?; }

    let court: CourtRow = sqlx::query_as::<_, CourtRow>(
        "SELECT id, complex_id, name, sport, players_capacity, surface_type,
                has_lighting, has_roof, hourly_price, is_active
         FROM sport_courts WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok(Json(court))
}

/// DELETE /courts/{id} - soft-deactivate; past reservations keep their rows.
async fn deactivate_court(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let pool = &state.pool;
    let complex_id = court_complex_id(pool, &id).await?;
    assert_owns_complex(pool, &complex_id, &user).await?;

    sqlx::query("UPDATE sport_courts SET is_active = 0 WHERE id = ?")
        .bind(&id)
        .execute(pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Weekly availability windows ──────────────────────────────

#[derive(Deserialize)]
struct AvailabilityWindowBody {
    /// 0 = Sunday … 6 = Saturday.
    day_of_week:  u8,
    start_time:   String,
    end_time:     String,
    is_available: Option<bool>,
}

/// PUT /courts/{id}/availability - replace the court's weekly opening
/// windows wholesale.
async fn set_court_availability(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<Vec<AvailabilityWindowBody>>,
) -> AppResult<StatusCode> {
    let pool = &state.pool;
    let complex_id = court_complex_id(pool, &id).await?;
    assert_owns_complex(pool, &complex_id, &user).await?;

    for w in &body {
        if w.day_of_week > 6 {
            return Err(AppError::BadRequest("day_of_week must be 0-6".into()));
        }
        let start = booking::parse_hhmm(&w.start_time)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid time \"{}\"", w.start_time)))?;
        let end = booking::parse_hhmm(&w.end_time)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid time \"{}\"", w.end_time)))?;
        if start >= end {
            return Err(AppError::BadRequest("Start time must be before end time".into()));
        }
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM court_availability WHERE court_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    for w in &body {
        sqlx::query(
            "INSERT INTO court_availability (id, court_id, day_of_week, start_time, end_time, is_available)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(w.day_of_week)
        .bind(&w.start_time)
        .bind(&w.end_time)
        .bind(w.is_available.unwrap_or(true))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

// ── Owner reservation view ───────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct ComplexReservationRow {
    id:               String,
    user_id:          String,
    court_id:         String,
    court_name:       String,
    customer_name:    Option<String>,
    customer_phone:   Option<String>,
    reservation_date: chrono::NaiveDate,
    start_time:       String,
    end_time:         String,
    total_price:      i64,
    payment_method:   String,
    payment_status:   String,
    deposit_amount:   i64,
    deposit_paid:     bool,
    notes:            Option<String>,
}

/// GET /complexes/{id}/reservations - all reservations across the complex,
/// newest dates first.
async fn list_complex_reservations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<ComplexReservationRow>>> {
    let pool = &state.pool;
    assert_owns_complex(pool, &id, &user).await?;

    let rows: Vec<ComplexReservationRow> = sqlx::query_as::<_, ComplexReservationRow>(
        "SELECT r.id, r.user_id, r.court_id,
                c.name AS court_name,
                u.full_name AS customer_name,
                u.phone AS customer_phone,
                r.reservation_date, r.start_time, r.end_time,
                r.total_price, r.payment_method, r.payment_status,
                r.deposit_amount, r.deposit_paid, r.notes
         FROM reservations r
         JOIN sport_courts c ON c.id = r.court_id
         JOIN users u ON u.id = r.user_id
         WHERE r.complex_id = ?
         ORDER BY r.reservation_date DESC, r.start_time",
    )
    .bind(&id)
    .fetch_all(pool)
    .await?;
    Ok(Json(rows))
}
