use dotenvy::dotenv;
use std::env;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub db_host:          String,
    pub db_port:          u16,
    pub db_name:          String,
    pub db_user:          String,
    pub db_password:      String,

    // Backend
    pub backend_host:     String,
    pub backend_port:     u16,

    // WhatsApp relay
    pub whatsapp_relay_url:       String,
    pub whatsapp_fallback_number: String,

    // Email
    pub smtp_host:        String,
    pub smtp_port:        u16,
    pub smtp_user:        String,
    pub smtp_password:    String,
    pub smtp_from:        String,

    // Subscription sweep
    pub subscription_sweep_enabled:          bool,
    pub subscription_sweep_interval_minutes: u64,
    pub trial_days:                          i64,

    // App
    pub app_env:          String,
    pub app_base_url:     String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        fn require(key: &str) -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        }

        fn parse_port(key: &str) -> Result<u16, ConfigError> {
            let raw = require(key)?;
            raw.parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw))
        }

        Ok(Self {
            db_host:      require("DB_HOST").unwrap_or_else(|_| "db".into()),
            db_port:      parse_port("DB_PORT").unwrap_or(3306),
            db_name:      require("DB_NAME")?,
            db_user:      require("DB_USER")?,
            db_password:  require("DB_PASSWORD")?,

            backend_host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            backend_port: parse_port("BACKEND_PORT").unwrap_or(8080),

            // Empty relay URL means "log only" - the click-to-chat link is
            // written to the log instead of being POSTed anywhere.
            whatsapp_relay_url: env::var("WHATSAPP_RELAY_URL").unwrap_or_default(),
            whatsapp_fallback_number: env::var("WHATSAPP_FALLBACK_NUMBER")
                .unwrap_or_else(|_| "5491133334444".into()),

            smtp_host:     env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port:     env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(587),
            smtp_user:     env::var("SMTP_USER").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from:     env::var("SMTP_FROM").unwrap_or_default(),

            subscription_sweep_enabled: env::var("SUBSCRIPTION_SWEEP_ENABLED")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
            // A zero interval would panic tokio's ticker; clamp to one minute.
            subscription_sweep_interval_minutes: env::var("SUBSCRIPTION_SWEEP_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60)
                .max(1),
            trial_days: env::var("TRIAL_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(15),

            app_env:      env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            app_base_url: env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost".into()),
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_is_clamped_to_one_minute() {
        std::env::set_var("DB_NAME", "cancha");
        std::env::set_var("DB_USER", "cancha");
        std::env::set_var("DB_PASSWORD", "secret");
        std::env::set_var("SUBSCRIPTION_SWEEP_INTERVAL_MINUTES", "0");

        let config = Config::from_env().unwrap();
        assert_eq!(config.subscription_sweep_interval_minutes, 1);
    }
}
