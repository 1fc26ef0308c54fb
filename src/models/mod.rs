#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Users ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id:            Uuid,
    pub email:         String,
    pub full_name:     Option<String>,
    pub phone:         Option<String>,
    pub password_hash: String,
    pub role:          UserRole,
    pub is_verified:   bool,
    pub is_active:     bool,
    pub created_at:    NaiveDateTime,
    pub updated_at:    NaiveDateTime,
    pub deleted_at:    Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Owner,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserRole::Customer => "customer",
            UserRole::Owner => "owner",
            UserRole::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

// ── Sessions ─────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSession {
    pub id:         Uuid,
    pub user_id:    Uuid,
    pub token:      String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

// ── Email tokens ─────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::Type, PartialEq)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum EmailTokenKind {
    VerifyEmail,
    ResetPassword,
}

// ── Payment method / status ──────────────────────────────────

/// How the customer intends to pay. Cash bookings require a 30% deposit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MercadoPago,
    Transfer,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MercadoPago => "mercado_pago",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mercado_pago" => Some(PaymentMethod::MercadoPago),
            "transfer" => Some(PaymentMethod::Transfer),
            "cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }

    /// Human-readable label used in the WhatsApp notification.
    pub fn label_es(&self) -> &'static str {
        match self {
            PaymentMethod::MercadoPago => "MercadoPago",
            PaymentMethod::Transfer => "Transferencia",
            PaymentMethod::Cash => "Efectivo",
        }
    }
}

/// Lifecycle of a reservation's payment. `Cancelled` rows never block new
/// bookings (soft-delete semantics).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "confirmed" => Some(PaymentStatus::Confirmed),
            "paid" => Some(PaymentStatus::Paid),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

// ── Subscription status ──────────────────────────────────────

/// Billing state of a complex, managed from the admin panel only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
    Suspended,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(SubscriptionStatus::Trial),
            "active" => Some(SubscriptionStatus::Active),
            "expired" => Some(SubscriptionStatus::Expired),
            "suspended" => Some(SubscriptionStatus::Suspended),
            _ => None,
        }
    }

    /// A complex is publicly listable only while trialing or paying.
    pub fn allows_listing(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }
}

// ── Complexes / courts ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SportComplex {
    pub id:                      Uuid,
    pub owner_id:                Uuid,
    pub name:                    String,
    pub description:             Option<String>,
    pub address:                 String,
    pub neighborhood:            Option<String>,
    pub phone:                   Option<String>,
    pub whatsapp:                Option<String>,
    pub email:                   Option<String>,
    pub website:                 Option<String>,
    pub latitude:                Option<f64>,
    pub longitude:               Option<f64>,
    pub is_approved:             bool,
    pub is_active:               bool,
    pub payment_status:          String,
    pub subscription_expires_at: Option<NaiveDateTime>,
    pub created_at:              NaiveDateTime,
    pub updated_at:              NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SportCourt {
    pub id:               Uuid,
    pub complex_id:       Uuid,
    pub name:             String,
    pub sport:            String,
    pub players_capacity: i32,
    pub surface_type:     Option<String>,
    pub has_lighting:     bool,
    pub has_roof:         bool,
    pub hourly_price:     Option<i64>,
    pub is_active:        bool,
    pub created_at:       NaiveDateTime,
}

// ── Reservations ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id:               Uuid,
    pub user_id:          Uuid,
    pub complex_id:       Uuid,
    pub court_id:         Uuid,
    pub reservation_date: NaiveDate,
    pub start_time:       String, // "HH:MM"
    pub end_time:         String, // "HH:MM"
    pub total_price:      i64,
    pub payment_method:   String,
    pub payment_status:   String,
    pub deposit_amount:   i64,
    pub deposit_paid:     bool,
    pub notes:            Option<String>,
    pub created_at:       NaiveDateTime,
    pub updated_at:       NaiveDateTime,
}
