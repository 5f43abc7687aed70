// Configuration chargée une seule fois au démarrage, immuable ensuite.
// Changer un secret = redémarrer le process.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::meal_type::MealType;

/// Secret de développement. Refusé en production.
pub const DEV_FALLBACK_QR_SECRET: &str = "mess-dev-insecure-qr-secret";
pub const DEV_FALLBACK_JWT_SECRET: &str = "mess-dev-insecure-jwt-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingSecret(&'static str),

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Clé HMAC partagée (par référence) entre émission et vérification
#[derive(Clone)]
pub struct SigningSecret(Arc<[u8]>);

impl SigningSecret {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Durée de validité par défaut des QR de repas, en minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealValidity {
    pub breakfast: i64,
    pub lunch: i64,
    pub dinner: i64,
}

impl Default for MealValidity {
    fn default() -> Self {
        Self {
            breakfast: 180,
            lunch: 240,
            dinner: 240,
        }
    }
}

impl MealValidity {
    pub fn minutes_for(&self, meal: MealType) -> i64 {
        match meal {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub qr_secret: SigningSecret,
    pub jwt_secret: SigningSecret,
    pub meal_validity: MealValidity,
    pub storage_timeout: Duration,
    pub clock_skew: chrono::Duration,
    pub utc_offset: FixedOffset,
    pub reconcile_interval: Duration,
}

impl AppConfig {
    /// Lit la configuration depuis l'environnement (après dotenv)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV",
                    value: other.to_string(),
                });
            }
        };

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let qr_secret = secret(&lookup, environment, "QR_SECRET", DEV_FALLBACK_QR_SECRET)?;
        let jwt_secret = secret(&lookup, environment, "JWT_SECRET", DEV_FALLBACK_JWT_SECRET)?;

        let defaults = MealValidity::default();
        let meal_validity = MealValidity {
            breakfast: positive(&lookup, "MEAL_VALIDITY_BREAKFAST_MINUTES", defaults.breakfast)?,
            lunch: positive(&lookup, "MEAL_VALIDITY_LUNCH_MINUTES", defaults.lunch)?,
            dinner: positive(&lookup, "MEAL_VALIDITY_DINNER_MINUTES", defaults.dinner)?,
        };

        let offset_minutes: i32 = parse_or(&lookup, "MESS_UTC_OFFSET_MINUTES", 0)?;
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or(ConfigError::Invalid {
            key: "MESS_UTC_OFFSET_MINUTES",
            value: offset_minutes.to_string(),
        })?;

        Ok(Self {
            environment,
            database_url,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            qr_secret,
            jwt_secret,
            meal_validity,
            storage_timeout: Duration::from_millis(
                positive(&lookup, "STORAGE_TIMEOUT_MS", 3000)? as u64,
            ),
            clock_skew: chrono::Duration::seconds(parse_or(&lookup, "CLOCK_SKEW_SECONDS", 0)?),
            utc_offset,
            reconcile_interval: Duration::from_secs(
                positive(&lookup, "RECONCILE_INTERVAL_SECONDS", 300)? as u64,
            ),
        })
    }
}

fn secret<F>(
    lookup: &F,
    environment: Environment,
    key: &'static str,
    fallback: &str,
) -> Result<SigningSecret, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => Ok(SigningSecret::new(value.trim())),
        None if environment == Environment::Production => Err(ConfigError::MissingSecret(key)),
        None => {
            warn!("{key} not set, using development fallback (INSECURE)");
            Ok(SigningSecret::new(fallback))
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn positive<F>(lookup: &F, key: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if value <= 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_production_requires_secrets() {
        let result = AppConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://localhost/mess"),
            ("JWT_SECRET", "jwt"),
        ]));
        assert_eq!(result.unwrap_err(), ConfigError::MissingSecret("QR_SECRET"));
    }

    #[test]
    fn test_development_uses_fallback_secret() {
        let config =
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.qr_secret.as_bytes(), DEV_FALLBACK_QR_SECRET.as_bytes());
        assert_eq!(config.meal_validity, MealValidity::default());
        assert_eq!(config.storage_timeout, Duration::from_millis(3000));
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("QR_SECRET", "s3cret"),
            ("MEAL_VALIDITY_LUNCH_MINUTES", "90"),
            ("MESS_UTC_OFFSET_MINUTES", "330"),
        ]))
        .unwrap();
        assert_eq!(config.meal_validity.lunch, 90);
        assert_eq!(config.utc_offset.local_minus_utc(), 330 * 60);

        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("MEAL_VALIDITY_DINNER_MINUTES", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MEAL_VALIDITY_DINNER_MINUTES", .. }));
    }

    #[test]
    fn test_durations_must_be_positive() {
        for key in ["STORAGE_TIMEOUT_MS", "RECONCILE_INTERVAL_SECONDS"] {
            for raw in ["0", "-5"] {
                let err = AppConfig::from_lookup(lookup(&[
                    ("DATABASE_URL", "sqlite::memory:"),
                    (key, raw),
                ]))
                .unwrap_err();
                assert_eq!(
                    err,
                    ConfigError::Invalid {
                        key,
                        value: raw.to_string()
                    }
                );
            }
        }

        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("STORAGE_TIMEOUT_MS", "250"),
            ("RECONCILE_INTERVAL_SECONDS", "60"),
        ]))
        .unwrap();
        assert_eq!(config.storage_timeout, Duration::from_millis(250));
        assert_eq!(config.reconcile_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_validity_per_meal() {
        let validity = MealValidity::default();
        assert_eq!(validity.minutes_for(MealType::Breakfast), 180);
        assert_eq!(validity.minutes_for(MealType::Dinner), 240);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = SigningSecret::new("top-secret");
        assert!(!format!("{secret:?}").contains("top-secret"));
    }
}
