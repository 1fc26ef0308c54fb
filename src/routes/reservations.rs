//! `/reservations` and `/courts/{id}` booking routes.
//!
//! The booking flow is: the UI asks for the day's windows and an advisory
//! slot check (public endpoints), then submits the reservation. The create
//! handler re-prices the slot server-side and re-runs the conflict check
//! inside the insert transaction, so a stale advisory answer can only
//! produce a 409, never a double booking.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    middleware::auth_guard::AuthUser,
    models::{PaymentMethod, PaymentStatus, UserRole},
    services::{booking, whatsapp},
    state::AppState,
};

/// Advisory availability endpoints, reachable without a session so the
/// booking UI works before login.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/courts/{id}/availability", get(court_day_availability))
        .route("/courts/{id}/check-slot",   post(check_slot))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reservations",              get(list_my_reservations).post(create_reservation))
        .route("/reservations/{id}/cancel",  post(cancel_reservation))
        .route("/reservations/{id}/payment", axum::routing::patch(update_payment))
}

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct CourtContextRow {
    court_id:         String,
    court_name:       String,
    sport:            String,
    hourly_price:     Option<i64>,
    court_active:     bool,
    complex_id:       String,
    complex_name:     String,
    phone:            Option<String>,
    whatsapp:         Option<String>,
    complex_approved: bool,
    complex_active:   bool,
}

/// Court joined with its complex; the complex must be publicly listable for
/// any booking activity.
async fn fetch_bookable_court(
    pool: &crate::db::Db,
    court_id: &str,
) -> AppResult<CourtContextRow> {
    let row: CourtContextRow = sqlx::query_as::<_, CourtContextRow>(
        "SELECT c.id AS court_id, c.name AS court_name, c.sport, c.hourly_price,
                c.is_active AS court_active,
                x.id AS complex_id, x.name AS complex_name, x.phone, x.whatsapp,
                x.is_approved AS complex_approved, x.is_active AS complex_active
         FROM sport_courts c
         JOIN sport_complexes x ON x.id = c.complex_id
         WHERE c.id = ?",
    )
    .bind(court_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    if !row.court_active || !row.complex_approved || !row.complex_active {
        return Err(AppError::NotFound);
    }
    Ok(row)
}

// ── Availability ─────────────────────────────────────────────

#[derive(Deserialize)]
struct AvailabilityQuery {
    date: NaiveDate,
}

#[derive(sqlx::FromRow, Serialize)]
struct WindowRow {
    start_time: String,
    end_time:   String,
}

#[derive(Serialize)]
struct DayAvailability {
    date:    NaiveDate,
    windows: Vec<WindowRow>,
    booked:  Vec<WindowRow>,
}

/// GET /courts/{id}/availability?date=YYYY-MM-DD - the weekly opening
/// windows for that weekday plus the day's non-cancelled bookings.
async fn court_day_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<AvailabilityQuery>,
) -> AppResult<Json<DayAvailability>> {
    let pool = &state.pool;
    fetch_bookable_court(pool, &id).await?;

    let day_of_week = booking::weekday_index(q.date);
    let windows: Vec<WindowRow> = sqlx::query_as::<_, WindowRow>(
        "SELECT start_time, end_time FROM court_availability
         WHERE court_id = ? AND day_of_week = ? AND is_available = 1
         ORDER BY start_time",
    )
    .bind(&id)
    .bind(day_of_week)
    .fetch_all(pool)
    .await?;

    let booked: Vec<WindowRow> = sqlx::query_as::<_, WindowRow>(
        "SELECT start_time, end_time FROM reservations
         WHERE court_id = ? AND reservation_date = ? AND payment_status <> 'cancelled'
         ORDER BY start_time",
    )
    .bind(&id)
    .bind(q.date)
    .fetch_all(pool)
    .await?;

    Ok(Json(DayAvailability { date: q.date, windows, booked }))
}

// ── Slot check ───────────────────────────────────────────────

#[derive(Deserialize)]
struct CheckSlotBody {
    date:           NaiveDate,
    start_time:     String,
    end_time:       String,
    payment_method: Option<PaymentMethod>,
}

#[derive(Serialize)]
struct CheckSlotResponse {
    available: bool,
    quote:     booking::Quote,
}

/// POST /courts/{id}/check-slot - advisory conflict check plus a price
/// quote for the slot. The answer can go stale; the create handler is the
/// authority.
async fn check_slot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CheckSlotBody>,
) -> AppResult<Json<CheckSlotResponse>> {
    let pool = &state.pool;
    let court = fetch_bookable_court(pool, &id).await?;

    let court_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::BadRequest("Invalid court id".into()))?;
    let available =
        booking::is_slot_available(pool, &court_id, body.date, &body.start_time, &body.end_time)
            .await?;

    let start_min = booking::parse_hhmm(&body.start_time)
        .ok_or_else(|| AppError::BadRequest("Invalid start time".into()))?;
    let end_min = booking::parse_hhmm(&body.end_time)
        .ok_or_else(|| AppError::BadRequest("Invalid end time".into()))?;
    let quote = booking::quote(
        court.hourly_price,
        start_min,
        end_min,
        body.payment_method.unwrap_or(PaymentMethod::MercadoPago),
    );

    Ok(Json(CheckSlotResponse { available, quote }))
}

// ── Create ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateReservationBody {
    court_id:       String,
    date:           NaiveDate,
    start_time:     String,
    end_time:       String,
    payment_method: PaymentMethod,
    notes:          Option<String>,
}

#[derive(sqlx::FromRow, Serialize)]
struct ReservationRow {
    id:               String,
    user_id:          String,
    complex_id:       String,
    court_id:         String,
    reservation_date: NaiveDate,
    start_time:       String,
    end_time:         String,
    total_price:      i64,
    payment_method:   String,
    payment_status:   String,
    deposit_amount:   i64,
    deposit_paid:     bool,
    notes:            Option<String>,
}

const RESERVATION_COLUMNS: &str =
    "id, user_id, complex_id, court_id, reservation_date, start_time, end_time,
     total_price, payment_method, payment_status, deposit_amount, deposit_paid, notes";

/// POST /reservations - price the slot, insert it transactionally, and
/// hand the booking summary to the WhatsApp relay in the background.
async fn create_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateReservationBody>,
) -> AppResult<(StatusCode, Json<ReservationRow>)> {
    let pool = &state.pool;
    let court = fetch_bookable_court(pool, &body.court_id).await?;

    let court_id = Uuid::parse_str(&body.court_id)
        .map_err(|_| AppError::BadRequest("Invalid court id".into()))?;
    let complex_id = Uuid::parse_str(&court.complex_id)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let user_id = Uuid::parse_str(&user.user_id)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let start_min = booking::parse_hhmm(&body.start_time)
        .ok_or_else(|| AppError::BadRequest("Invalid start time".into()))?;
    let end_min = booking::parse_hhmm(&body.end_time)
        .ok_or_else(|| AppError::BadRequest("Invalid end time".into()))?;
    if start_min >= end_min {
        return Err(AppError::BadRequest("Start time must be before end time".into()));
    }

    let quote = booking::quote(court.hourly_price, start_min, end_min, body.payment_method);

    let id = booking::create_reservation(
        pool,
        booking::NewReservation {
            user_id:        &user_id,
            complex_id:     &complex_id,
            court_id:       &court_id,
            date:           body.date,
            start_time:     &body.start_time,
            end_time:       &body.end_time,
            total_price:    quote.total,
            payment_method: body.payment_method,
            deposit_amount: quote.deposit,
            notes:          body.notes.as_deref(),
        },
    )
    .await?;

    let message = whatsapp::build_booking_message(&whatsapp::BookingNotification {
        complex_name:   &court.complex_name,
        court_name:     &court.court_name,
        sport:          &court.sport,
        date:           body.date,
        start_time:     &body.start_time,
        end_time:       &body.end_time,
        total_price:    quote.total,
        payment_method: body.payment_method,
        deposit_amount: quote.deposit,
        notes:          body.notes.as_deref(),
    });
    let phone_number = whatsapp::contact_number(
        court.whatsapp.as_deref(),
        court.phone.as_deref(),
        &state.config.whatsapp_fallback_number,
    );
    whatsapp::spawn_dispatch(
        state.config.clone(),
        whatsapp::RelayMessage {
            phone_number,
            message,
            complex_name: court.complex_name.clone(),
            reservation_id: id.to_string(),
        },
    );

    let row: ReservationRow = sqlx::query_as::<_, ReservationRow>(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?",
    ))
    .bind(id.to_string())
    .fetch_one(pool)
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

// ── My reservations ──────────────────────────────────────────

#[derive(sqlx::FromRow, Serialize)]
struct MyReservationRow {
    id:               String,
    complex_id:       String,
    complex_name:     String,
    complex_address:  String,
    court_id:         String,
    court_name:       String,
    sport:            String,
    reservation_date: NaiveDate,
    start_time:       String,
    end_time:         String,
    total_price:      i64,
    payment_method:   String,
    payment_status:   String,
    deposit_amount:   i64,
    deposit_paid:     bool,
    notes:            Option<String>,
}

/// GET /reservations - the caller's bookings, soonest first.
async fn list_my_reservations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<MyReservationRow>>> {
    let pool = &state.pool;
    let rows: Vec<MyReservationRow> = sqlx::query_as::<_, MyReservationRow>(
        "SELECT r.id, r.complex_id,
                x.name AS complex_name, x.address AS complex_address,
                r.court_id, c.name AS court_name, c.sport,
                r.reservation_date, r.start_time, r.end_time,
                r.total_price, r.payment_method, r.payment_status,
                r.deposit_amount, r.deposit_paid, r.notes
         FROM reservations r
         JOIN sport_complexes x ON x.id = r.complex_id
         JOIN sport_courts c ON c.id = r.court_id
         WHERE r.user_id = ?
         ORDER BY r.reservation_date, r.start_time",
    )
    .bind(&user.user_id)
    .fetch_all(pool)
    .await?;
    Ok(Json(rows))
}

// ── Cancel ───────────────────────────────────────────────────

/// POST /reservations/{id}/cancel - soft cancel. The row stays but stops
/// blocking the slot. Only pending bookings can be cancelled by the
/// customer; paid ones go through the owner.
async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let pool = &state.pool;

    #[derive(sqlx::FromRow)]
    struct CancelRow {
        user_id:        String,
        payment_status: String,
    }

    let row: CancelRow = sqlx::query_as::<_, CancelRow>(
        "SELECT user_id, payment_status FROM reservations WHERE id = ?",
    )
    .bind(&id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)?;

    if user.role != UserRole::Admin && row.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    match PaymentStatus::parse(&row.payment_status) {
        Some(PaymentStatus::Cancelled) => {
            return Err(AppError::BadRequest("Reservation is already cancelled".into()));
        }
        Some(PaymentStatus::Paid) if user.role != UserRole::Admin => {
            return Err(AppError::BadRequest(
                "Paid reservations must be cancelled by the complex".into(),
            ));
        }
        _ => {}
    }

    sqlx::query("UPDATE reservations SET payment_status = 'cancelled' WHERE id = ?")
        .bind(&id)
        .execute(pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Payment updates (owner/admin) ────────────────────────────

#[derive(Deserialize)]
struct UpdatePaymentBody {
    payment_status: Option<String>,
    deposit_paid:   Option<bool>,
}

/// PATCH /reservations/{id}/payment - the complex confirms payments and
/// deposits. Owners may only touch reservations on their own complexes.
async fn update_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePaymentBody>,
) -> AppResult<Json<ReservationRow>> {
    let pool = &state.pool;

    let complex_id: Option<String> =
        sqlx::query_scalar("SELECT complex_id FROM reservations WHERE id = ?")
            .bind(&id)
            .fetch_optional(pool)
            .await?;
    let complex_id = complex_id.ok_or(AppError::NotFound)?;

    if user.role != UserRole::Admin {
        let is_mine: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sport_complexes WHERE id = ? AND owner_id = ?)",
        )
        .bind(&complex_id)
        .bind(&user.user_id)
        .fetch_one(pool)
        .await?;
        if !is_mine {
            return Err(AppError::Forbidden);
        }
    }

    if let Some(status) = &body.payment_status {
        if PaymentStatus::parse(status).is_none() {
            return Err(AppError::BadRequest("Invalid payment status".into()));
        }
        sqlx::query("UPDATE reservations SET payment_status = ? WHERE id = ?")
            .bind(status)
            .bind(&id)
            .execute(pool)
            .await?;
    }
    if let Some(paid) = body.deposit_paid {
        sqlx::query("UPDATE reservations SET deposit_paid = ? WHERE id = ?")
            .bind(paid)
            .bind(&id)
            .execute(pool)
            .await?;
    }

    let row: ReservationRow = sqlx::query_as::<_, ReservationRow>(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?",
    ))
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok(Json(row))
}
