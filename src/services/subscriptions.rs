//! Subscription billing classification and the expiry sweep.
//!
//! Complexes bill through a flat subscription managed from the admin panel:
//! `trial` on registration, `active` once paid, `expired` when the expiry
//! timestamp passes, `suspended` by admin action. Only trial/active
//! complexes stay publicly listed.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{db::Db, models::SubscriptionStatus, state::AppState};

/// Days before expiry at which a subscription counts as "expiring soon".
pub const EXPIRY_WARNING_DAYS: i64 = 7;

/// Billing classification of one complex, as shown in the admin panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingView {
    pub status:                SubscriptionStatus,
    pub days_until_expiration: Option<i64>,
    pub expiring_soon:         bool,
    pub expired:               bool,
}

/// Classify a complex's stored billing state against `now`.
///
/// A stored `trial`/`active` status whose expiry timestamp has passed is
/// reported as expired even before the sweep has rewritten the row.
pub fn classify(
    stored_status: &str,
    expires_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> BillingView {
    let stored = SubscriptionStatus::parse(stored_status).unwrap_or(SubscriptionStatus::Trial);
    // Ceiling day counts: a subscription expiring later today still has one
    // day left, and only a passed timestamp makes it lapsed.
    let days_until_expiration =
        expires_at.map(|at| ((at - now).num_seconds() as f64 / 86_400.0).ceil() as i64);

    let lapsed = matches!(expires_at, Some(at) if at <= now);
    let status = match stored {
        SubscriptionStatus::Trial | SubscriptionStatus::Active if lapsed => {
            SubscriptionStatus::Expired
        }
        other => other,
    };

    let expiring_soon = matches!(status, SubscriptionStatus::Trial | SubscriptionStatus::Active)
        && matches!(days_until_expiration, Some(d) if d > 0 && d <= EXPIRY_WARNING_DAYS);

    BillingView {
        status,
        days_until_expiration,
        expiring_soon,
        expired: status == SubscriptionStatus::Expired,
    }
}

// ── Background sweep ─────────────────────────────────────────

pub fn spawn_expiry_sweep(state: AppState) {
    if !state.config.subscription_sweep_enabled {
        tracing::info!("Subscription expiry sweep disabled");
        return;
    }

    let minutes = state.config.subscription_sweep_interval_minutes;
    tracing::info!(minutes, "Subscription expiry sweep started");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(minutes.saturating_mul(60)));
        // First immediate tick consumed so subsequent ticks wait the configured interval.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(err) = run_expiry_sweep(&state.pool).await {
                tracing::error!(error = %err, "Subscription expiry sweep failed");
            }
        }
    });
}

/// Mark lapsed trial/active complexes as expired and delist them, then drop
/// expired session and email-token rows.
pub async fn run_expiry_sweep(pool: &Db) -> anyhow::Result<()> {
    let expired = sqlx::query(
        "UPDATE sport_complexes
         SET payment_status = 'expired', is_active = 0
         WHERE payment_status IN ('trial', 'active')
           AND subscription_expires_at IS NOT NULL
           AND subscription_expires_at < NOW()",
    )
    .execute(pool)
    .await?
    .rows_affected();
    if expired > 0 {
        tracing::info!(expired, "Expired lapsed complex subscriptions");
    }

    let sessions = sqlx::query("DELETE FROM user_sessions WHERE expires_at < NOW()")
        .execute(pool)
        .await?
        .rows_affected();
    let tokens = sqlx::query("DELETE FROM email_tokens WHERE expires_at < NOW()")
        .execute(pool)
        .await?
        .rows_affected();
    if sessions > 0 || tokens > 0 {
        tracing::info!(sessions, tokens, "Pruned expired sessions and email tokens");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn active_with_distant_expiry_stays_active() {
        let v = classify("active", Some(at(2024, 8, 1)), at(2024, 6, 1));
        assert_eq!(v.status, SubscriptionStatus::Active);
        assert!(!v.expiring_soon);
        assert!(!v.expired);
    }

    #[test]
    fn lapsed_timestamp_overrides_stored_status() {
        let v = classify("active", Some(at(2024, 5, 1)), at(2024, 6, 1));
        assert_eq!(v.status, SubscriptionStatus::Expired);
        assert!(v.expired);

        let v = classify("trial", Some(at(2024, 5, 30)), at(2024, 6, 1));
        assert!(v.expired);
    }

    #[test]
    fn sub_day_expiry_still_counts_as_a_day() {
        let now = at(2024, 6, 1);
        let v = classify("active", Some(now + Duration::hours(12)), now);
        assert_eq!(v.status, SubscriptionStatus::Active);
        assert_eq!(v.days_until_expiration, Some(1));
        assert!(v.expiring_soon);
        assert!(!v.expired);
    }

    #[test]
    fn expiry_at_or_before_now_is_lapsed() {
        let now = at(2024, 6, 1);
        assert!(classify("trial", Some(now), now).expired);
        assert!(classify("active", Some(now - Duration::minutes(1)), now).expired);
    }

    #[test]
    fn near_expiry_is_flagged() {
        let v = classify("trial", Some(at(2024, 6, 5)), at(2024, 6, 1));
        assert_eq!(v.status, SubscriptionStatus::Trial);
        assert!(v.expiring_soon);
        assert_eq!(v.days_until_expiration, Some(4));
    }

    #[test]
    fn suspended_is_never_expiring_soon() {
        let v = classify("suspended", Some(at(2024, 6, 5)), at(2024, 6, 1));
        assert_eq!(v.status, SubscriptionStatus::Suspended);
        assert!(!v.expiring_soon);
        assert!(!v.expired);
    }

    #[test]
    fn missing_expiry_never_expires() {
        let v = classify("trial", None, at(2024, 6, 1));
        assert_eq!(v.status, SubscriptionStatus::Trial);
        assert_eq!(v.days_until_expiration, None);
        assert!(!v.expired);
    }

    #[test]
    fn trial_granted_at_approval_starts_fresh() {
        // Approval may come long after registration; the window counts from
        // the approval timestamp, so the fresh trial is never already lapsed.
        let approved_at = at(2024, 9, 1);
        let v = classify("trial", Some(approved_at + Duration::days(15)), approved_at);
        assert_eq!(v.status, SubscriptionStatus::Trial);
        assert!(!v.expired);
        assert!(!v.expiring_soon);
    }

    #[test]
    fn unknown_stored_status_defaults_to_trial() {
        let v = classify("whatever", None, at(2024, 6, 1));
        assert_eq!(v.status, SubscriptionStatus::Trial);
    }
}
