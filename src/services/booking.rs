//! Slot-conflict and pricing evaluation for court reservations.
//!
//! The conflict predicate works on minutes-since-midnight parsed from
//! zero-padded "HH:MM" strings, using half-open interval semantics: two
//! bookings collide iff `s1 < e2 && e1 > s2`, so back-to-back slots
//! (10:00-11:00 followed by 11:00-12:00) never conflict. Cancelled
//! reservations are excluded everywhere, which gives them soft-delete
//! semantics for availability purposes.
//!
//! Failure policy: every store error propagates - a slot is never reported
//! available when the fetch failed.

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::{
    db::Db,
    errors::{AppError, AppResult},
    models::PaymentMethod,
};

/// Courts without a configured price bill at this rate per hour.
pub const DEFAULT_HOURLY_PRICE: i64 = 2000;

/// Fraction of the total due up front for cash bookings.
pub const CASH_DEPOSIT_RATE: f64 = 0.30;

// ── Time handling ────────────────────────────────────────────

/// Parse a zero-padded 24h "HH:MM" string into minutes since midnight.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

fn parse_hhmm_or_bad_request(s: &str) -> AppResult<u32> {
    parse_hhmm(s).ok_or_else(|| AppError::BadRequest(format!("Invalid time \"{s}\" (expected HH:MM)")))
}

/// Weekday index matching the `court_availability.day_of_week` column:
/// 0 = Sunday through 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

/// An occupied interval on a court, in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookedSpan {
    pub start_min: u32,
    pub end_min:   u32,
}

/// Half-open interval overlap: `[s1,e1)` and `[s2,e2)` conflict iff
/// `s1 < e2 && e1 > s2`.
pub fn spans_overlap(s1: u32, e1: u32, s2: u32, e2: u32) -> bool {
    s1 < e2 && e1 > s2
}

/// True when the requested `[start,end)` collides with any existing span.
pub fn slot_conflicts(existing: &[BookedSpan], start_min: u32, end_min: u32) -> bool {
    existing
        .iter()
        .any(|span| spans_overlap(start_min, end_min, span.start_min, span.end_min))
}

// ── Pricing ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Quote {
    pub hours:   i64,
    pub total:   i64,
    pub deposit: i64,
}

/// Compute total and deposit for a slot. Duration is the whole-hour
/// difference (the booking UI only offers on-the-hour slots); cash bookings
/// carry a deposit of 30% of the total, rounded to the nearest integer.
pub fn quote(
    hourly_price: Option<i64>,
    start_min: u32,
    end_min: u32,
    method: PaymentMethod,
) -> Quote {
    let hours = i64::from(end_min / 60) - i64::from(start_min / 60);
    let total = hours * hourly_price.unwrap_or(DEFAULT_HOURLY_PRICE);
    let deposit = match method {
        PaymentMethod::Cash => (total as f64 * CASH_DEPOSIT_RATE).round() as i64,
        _ => 0,
    };
    Quote { hours, total, deposit }
}

// ── Store-backed availability ────────────────────────────────

#[derive(sqlx::FromRow)]
struct SpanRow {
    start_time: String,
    end_time:   String,
}

fn rows_to_spans(rows: Vec<SpanRow>) -> AppResult<Vec<BookedSpan>> {
    rows.into_iter()
        .map(|r| {
            let start_min = parse_hhmm(&r.start_time);
            let end_min = parse_hhmm(&r.end_time);
            match (start_min, end_min) {
                (Some(start_min), Some(end_min)) => Ok(BookedSpan { start_min, end_min }),
                _ => Err(AppError::Internal(anyhow::anyhow!(
                    "Malformed stored reservation time {}-{}",
                    r.start_time,
                    r.end_time
                ))),
            }
        })
        .collect()
}

/// Advisory availability check: fetch all non-cancelled reservations for the
/// court/date and test overlap client-side. Not atomic with a later insert;
/// [`create_reservation`] re-checks inside a transaction.
pub async fn is_slot_available(
    pool: &Db,
    court_id: &Uuid,
    date: NaiveDate,
    start_time: &str,
    end_time: &str,
) -> AppResult<bool> {
    let start_min = parse_hhmm_or_bad_request(start_time)?;
    let end_min = parse_hhmm_or_bad_request(end_time)?;
    if start_min >= end_min {
        return Err(AppError::BadRequest("Start time must be before end time".into()));
    }

    let rows: Vec<SpanRow> = sqlx::query_as::<_, SpanRow>(
        "SELECT start_time, end_time FROM reservations
         WHERE court_id = ? AND reservation_date = ? AND payment_status <> 'cancelled'",
    )
    .bind(court_id.to_string())
    .bind(date)
    .fetch_all(pool)
    .await?;

    let spans = rows_to_spans(rows)?;
    Ok(!slot_conflicts(&spans, start_min, end_min))
}

/// Everything needed to insert one reservation row. Prices come from
/// [`quote`], never from the client.
pub struct NewReservation<'a> {
    pub user_id:        &'a Uuid,
    pub complex_id:     &'a Uuid,
    pub court_id:       &'a Uuid,
    pub date:           NaiveDate,
    pub start_time:     &'a str,
    pub end_time:       &'a str,
    pub total_price:    i64,
    pub payment_method: PaymentMethod,
    pub deposit_amount: i64,
    pub notes:          Option<&'a str>,
}

/// Insert a reservation with the conflict check and the write in one
/// transaction. The existing rows for the court/date are locked with
/// `SELECT ... FOR UPDATE`, so two concurrent bookings for the same slot
/// serialize and the second one observes the first and fails with 409.
pub async fn create_reservation(pool: &Db, new: NewReservation<'_>) -> AppResult<Uuid> {
    let start_min = parse_hhmm_or_bad_request(new.start_time)?;
    let end_min = parse_hhmm_or_bad_request(new.end_time)?;
    if start_min >= end_min {
        return Err(AppError::BadRequest("Start time must be before end time".into()));
    }

    let mut tx = pool.begin().await?;

    let rows: Vec<SpanRow> = sqlx::query_as::<_, SpanRow>(
        "SELECT start_time, end_time FROM reservations
         WHERE court_id = ? AND reservation_date = ? AND payment_status <> 'cancelled'
         FOR UPDATE",
    )
    .bind(new.court_id.to_string())
    .bind(new.date)
    .fetch_all(&mut *tx)
    .await?;

    let spans = rows_to_spans(rows)?;
    if slot_conflicts(&spans, start_min, end_min) {
        return Err(AppError::Conflict(
            "El horario seleccionado ya no está disponible".into(),
        ));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO reservations
            (id, user_id, complex_id, court_id, reservation_date, start_time, end_time,
             total_price, payment_method, payment_status, deposit_amount, deposit_paid, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, 0, ?)",
    )
    .bind(id.to_string())
    .bind(new.user_id.to_string())
    .bind(new.complex_id.to_string())
    .bind(new.court_id.to_string())
    .bind(new.date)
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(new.total_price)
    .bind(new.payment_method.as_str())
    .bind(new.deposit_amount)
    .bind(new.notes)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> u32 {
        h * 60 + m
    }

    #[test]
    fn parses_zero_padded_times() {
        assert_eq!(parse_hhmm("09:00"), Some(540));
        assert_eq!(parse_hhmm("22:30"), Some(1350));
        assert_eq!(parse_hhmm("00:00"), Some(0));
        assert_eq!(parse_hhmm("23:59"), Some(1439));
    }

    #[test]
    fn weekday_index_starts_at_sunday() {
        // 2024-06-02 is a Sunday.
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()), 0);
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()), 1);
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2024, 6, 8).unwrap()), 6);
    }

    #[test]
    fn rejects_malformed_times() {
        for s in ["9:00", "24:00", "12:60", "noon", "12-30", "12:3", ""] {
            assert_eq!(parse_hhmm(s), None, "accepted {s:?}");
        }
    }

    #[test]
    fn overlap_matches_half_open_semantics() {
        // Exhaustive over on-the-hour pairs within the booking day.
        for s1 in 9..22u32 {
            for e1 in (s1 + 1)..=22 {
                for s2 in 9..22u32 {
                    for e2 in (s2 + 1)..=22 {
                        let expected = s1 < e2 && e1 > s2;
                        assert_eq!(
                            spans_overlap(hm(s1, 0), hm(e1, 0), hm(s2, 0), hm(e2, 0)),
                            expected,
                            "[{s1},{e1}) vs [{s2},{e2})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn touching_slots_do_not_conflict() {
        assert!(!spans_overlap(hm(9, 0), hm(10, 0), hm(10, 0), hm(11, 0)));
        assert!(!spans_overlap(hm(10, 0), hm(11, 0), hm(9, 0), hm(10, 0)));
    }

    #[test]
    fn nested_slot_conflicts() {
        assert!(spans_overlap(hm(9, 0), hm(13, 0), hm(10, 0), hm(11, 0)));
        assert!(spans_overlap(hm(10, 0), hm(11, 0), hm(9, 0), hm(13, 0)));
    }

    #[test]
    fn partial_overlap_conflicts() {
        // 14:30-15:30 against an existing 14:00-15:00 booking.
        let existing = [BookedSpan { start_min: hm(14, 0), end_min: hm(15, 0) }];
        assert!(slot_conflicts(&existing, hm(14, 30), hm(15, 30)));
        // The following hour is free.
        assert!(!slot_conflicts(&existing, hm(15, 0), hm(16, 0)));
    }

    #[test]
    fn empty_day_never_conflicts() {
        assert!(!slot_conflicts(&[], hm(9, 0), hm(22, 0)));
    }

    #[test]
    fn quote_multiplies_hours_by_rate() {
        let q = quote(Some(3000), hm(18, 0), hm(20, 0), PaymentMethod::Transfer);
        assert_eq!(q, Quote { hours: 2, total: 6000, deposit: 0 });
    }

    #[test]
    fn quote_falls_back_to_default_rate() {
        let q = quote(None, hm(14, 0), hm(15, 0), PaymentMethod::MercadoPago);
        assert_eq!(q.total, DEFAULT_HOURLY_PRICE);
        assert_eq!(q.deposit, 0);
    }

    #[test]
    fn cash_deposit_is_rounded_thirty_percent() {
        let q = quote(Some(2000), hm(15, 0), hm(16, 0), PaymentMethod::Cash);
        assert_eq!(q.total, 2000);
        assert_eq!(q.deposit, 600);

        // 1 hour at 1833 -> 549.9 rounds to 550.
        let q = quote(Some(1833), hm(9, 0), hm(10, 0), PaymentMethod::Cash);
        assert_eq!(q.deposit, 550);
        assert!(q.deposit <= q.total);
    }

    #[test]
    fn booking_scenario_end_to_end() {
        // Court with hourly price 2000, one confirmed booking 14:00-15:00.
        let existing = [BookedSpan { start_min: hm(14, 0), end_min: hm(15, 0) }];

        // 15:00-16:00 is free: total 2000, cash deposit 600.
        assert!(!slot_conflicts(&existing, hm(15, 0), hm(16, 0)));
        let q = quote(Some(2000), hm(15, 0), hm(16, 0), PaymentMethod::Cash);
        assert_eq!((q.total, q.deposit), (2000, 600));

        // 14:30-15:30 collides and is rejected.
        assert!(slot_conflicts(&existing, hm(14, 30), hm(15, 30)));
    }

    #[test]
    fn cancelled_reservations_never_block() {
        // A cancelled booking is filtered out before the predicate runs
        // (payment_status <> 'cancelled' in the fetch), so the same interval
        // books cleanly.
        let existing: [BookedSpan; 0] = [];
        assert!(!slot_conflicts(&existing, hm(14, 0), hm(15, 0)));
    }
}
