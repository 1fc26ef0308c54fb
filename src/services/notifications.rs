//! Owner broadcast notifications composed in the admin panel.
//!
//! The admin writes a message template with `{owner_name}`, `{complex_name}`
//! and `{expiry_date}` placeholders, picks an audience by billing status, and
//! the rendered message goes out to every matching complex owner.

use chrono::NaiveDateTime;

use crate::models::SubscriptionStatus;
use crate::services::subscriptions;

/// Which complex owners a broadcast addresses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Audience {
    All,
    Trial,
    Active,
    Expired,
}

impl Audience {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Audience::All),
            "trial" => Some(Audience::Trial),
            "active" => Some(Audience::Active),
            "expired" => Some(Audience::Expired),
            _ => None,
        }
    }

    /// Whether a complex with this billing state belongs to the audience.
    /// Classification runs against `now`, so a lapsed trial/active row counts
    /// as expired even before the sweep has rewritten it.
    pub fn includes(
        &self,
        stored_status: &str,
        expires_at: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> bool {
        let status = subscriptions::classify(stored_status, expires_at, now).status;
        match self {
            Audience::All => true,
            Audience::Trial => status == SubscriptionStatus::Trial,
            Audience::Active => status == SubscriptionStatus::Active,
            Audience::Expired => status == SubscriptionStatus::Expired,
        }
    }
}

/// Substitute the `{owner_name}`, `{complex_name}` and `{expiry_date}`
/// placeholders into a message template. A missing expiry renders as "-".
pub fn render_template(
    template: &str,
    owner_name: &str,
    complex_name: &str,
    expires_at: Option<NaiveDateTime>,
) -> String {
    let expiry = expires_at
        .map(|at| at.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "-".to_owned());
    template
        .replace("{owner_name}", owner_name)
        .replace("{complex_name}", complex_name)
        .replace("{expiry_date}", &expiry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn substitutes_all_placeholders() {
        let msg = render_template(
            "Hola {owner_name}, la prueba de {complex_name} vence el {expiry_date}.",
            "Ana",
            "Complejo Norte",
            Some(at(2024, 6, 15)),
        );
        assert_eq!(msg, "Hola Ana, la prueba de Complejo Norte vence el 15/06/2024.");
    }

    #[test]
    fn missing_expiry_renders_as_dash() {
        let msg = render_template("Vence: {expiry_date}", "Ana", "Norte", None);
        assert_eq!(msg, "Vence: -");
    }

    #[test]
    fn template_without_placeholders_passes_through() {
        let msg = render_template("Aviso general", "Ana", "Norte", Some(at(2024, 6, 15)));
        assert_eq!(msg, "Aviso general");
    }

    #[test]
    fn audience_filtering_tracks_billing_state() {
        let now = at(2024, 6, 1);
        assert!(Audience::All.includes("suspended", None, now));
        assert!(Audience::Trial.includes("trial", Some(at(2024, 6, 10)), now));
        assert!(!Audience::Trial.includes("active", Some(at(2024, 6, 10)), now));
        assert!(Audience::Active.includes("active", Some(at(2024, 6, 10)), now));
        // Lapsed rows count as expired before the sweep rewrites them.
        assert!(Audience::Expired.includes("trial", Some(at(2024, 5, 1)), now));
        assert!(!Audience::Active.includes("active", Some(at(2024, 5, 1)), now));
    }
}
