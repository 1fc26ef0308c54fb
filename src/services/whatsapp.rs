//! WhatsApp notification relay.
//!
//! After a reservation is written, the owning complex gets a booking summary
//! over WhatsApp. Dispatch is fire-and-forget: it runs on a spawned task and
//! a relay failure only produces a log line - the reservation stands.
//!
//! Without a configured relay URL the click-to-chat link is logged instead,
//! which is what local development uses.

use std::time::Duration;

use serde::Serialize;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    models::PaymentMethod,
};

/// Payload the relay expects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    pub phone_number:   String,
    pub message:        String,
    pub complex_name:   String,
    pub reservation_id: String,
}

/// Details of a freshly created booking, used to render the message.
pub struct BookingNotification<'a> {
    pub complex_name:   &'a str,
    pub court_name:     &'a str,
    pub sport:          &'a str,
    pub date:           chrono::NaiveDate,
    pub start_time:     &'a str,
    pub end_time:       &'a str,
    pub total_price:    i64,
    pub payment_method: PaymentMethod,
    pub deposit_amount: i64,
    pub notes:          Option<&'a str>,
}

/// Render the owner-facing booking summary.
pub fn build_booking_message(n: &BookingNotification<'_>) -> String {
    let mut msg = format!(
        "🏟️ *NUEVA RESERVA*\n\n\
         📍 Complejo: {}\n\
         🏐 Cancha: {} ({})\n\
         📅 Fecha: {}\n\
         🕐 Horario: {} - {}\n\
         💰 Total: ${}\n\
         💳 Método de pago: {}\n",
        n.complex_name,
        n.court_name,
        n.sport,
        n.date.format("%d/%m/%Y"),
        n.start_time,
        n.end_time,
        n.total_price,
        n.payment_method.label_es(),
    );
    if n.payment_method == PaymentMethod::Cash {
        msg.push_str(&format!("💵 Seña requerida: ${}\n", n.deposit_amount));
    }
    if let Some(notes) = n.notes {
        if !notes.trim().is_empty() {
            msg.push_str(&format!("📝 Notas: {notes}\n"));
        }
    }
    msg.push_str("\n📞 Contactar al cliente para confirmar");
    msg
}

/// The number a complex is notified on: WhatsApp number first, then the
/// landline, then the platform fallback.
pub fn contact_number(
    whatsapp: Option<&str>,
    phone: Option<&str>,
    fallback: &str,
) -> String {
    whatsapp
        .filter(|s| !s.trim().is_empty())
        .or(phone.filter(|s| !s.trim().is_empty()))
        .unwrap_or(fallback)
        .to_owned()
}

/// Spawn the relay call in the background and log the outcome.
pub fn spawn_dispatch(config: Config, message: RelayMessage) {
    tokio::spawn(async move {
        let reservation_id = message.reservation_id.clone();
        match dispatch(&config, message).await {
            Ok(()) => {
                tracing::info!(%reservation_id, "WhatsApp notification dispatched");
            }
            Err(err) => {
                // Non-fatal: the reservation already exists.
                tracing::warn!(%reservation_id, error = ?err, "WhatsApp notification failed");
            }
        }
    });
}

async fn dispatch(config: &Config, message: RelayMessage) -> AppResult<()> {
    if config.whatsapp_relay_url.is_empty() {
        let link = format!(
            "https://api.whatsapp.com/send?phone={}&text={}",
            message.phone_number,
            urlencoding::encode(&message.message),
        );
        tracing::warn!(%link, "WhatsApp relay not configured - click-to-chat link printed here");
        return Ok(());
    }

    let client = http_client()?;
    let resp = client
        .post(&config.whatsapp_relay_url)
        .json(&message)
        .send()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Relay request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "Relay request failed with status {status}"
        )));
    }
    Ok(())
}

fn http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(12))
        .user_agent("CanchaBackend/1.0 (+https://localhost)")
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn notification(method: PaymentMethod, deposit: i64, notes: Option<&str>) -> String {
        build_booking_message(&BookingNotification {
            complex_name: "Complejo Norte",
            court_name: "Cancha 1",
            sport: "futbol5",
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_time: "14:00",
            end_time: "15:00",
            total_price: 2000,
            payment_method: method,
            deposit_amount: deposit,
            notes,
        })
    }

    #[test]
    fn message_contains_booking_facts() {
        let msg = notification(PaymentMethod::Transfer, 0, None);
        assert!(msg.contains("Complejo Norte"));
        assert!(msg.contains("Cancha 1 (futbol5)"));
        assert!(msg.contains("01/06/2024"));
        assert!(msg.contains("14:00 - 15:00"));
        assert!(msg.contains("Total: $2000"));
        assert!(msg.contains("Transferencia"));
        assert!(!msg.contains("Seña"));
        assert!(!msg.contains("Notas"));
    }

    #[test]
    fn cash_message_includes_deposit() {
        let msg = notification(PaymentMethod::Cash, 600, Some("llevamos pecheras"));
        assert!(msg.contains("Efectivo"));
        assert!(msg.contains("Seña requerida: $600"));
        assert!(msg.contains("Notas: llevamos pecheras"));
    }

    #[test]
    fn contact_number_prefers_whatsapp_then_phone() {
        assert_eq!(contact_number(Some("549111"), Some("549222"), "549999"), "549111");
        assert_eq!(contact_number(None, Some("549222"), "549999"), "549222");
        assert_eq!(contact_number(Some("  "), None, "549999"), "549999");
        assert_eq!(contact_number(None, None, "549999"), "549999");
    }
}
