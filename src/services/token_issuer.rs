use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::{MealValidity, SigningSecret};
use crate::models::meal_token::{MealToken, TokenScope};
use crate::models::meal_type::MealType;
use crate::services::token_store::{MealTokenStore, SlotKey};
use crate::services::user_token::{USER_TOKEN_VALIDITY_MINUTES, UserTokenClaims};
use crate::utils::signing;

/// 32 octets = 256 bits d'entropie pour un code de repas
const MEAL_CODE_BYTES: usize = 32;
const NONCE_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("Validity must be a positive number of minutes (got {0})")]
    InvalidValidity(i64),

    #[error("Failed to encode token: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Émet les QR de repas (anonymes) et les QR personnels (signés)
#[derive(Clone)]
pub struct TokenIssuer {
    secret: SigningSecret,
    store: Arc<dyn MealTokenStore>,
    clock: Arc<dyn Clock>,
    validity: MealValidity,
}

impl TokenIssuer {
    pub fn new(
        secret: SigningSecret,
        store: Arc<dyn MealTokenStore>,
        clock: Arc<dyn Clock>,
        validity: MealValidity,
    ) -> Self {
        Self {
            secret,
            store,
            clock,
            validity,
        }
    }

    /// QR anonyme du créneau (mess, repas, jour).
    /// Idempotent : si un token vivant existe déjà pour le créneau, il est
    /// retourné tel quel au lieu d'en créer un second.
    pub async fn issue_meal_token(
        &self,
        mess_id: i32,
        meal_type: MealType,
        date: NaiveDate,
        validity_minutes: Option<i64>,
    ) -> Result<MealToken, IssueError> {
        let minutes = validity_minutes.unwrap_or_else(|| self.validity.minutes_for(meal_type));
        if minutes <= 0 {
            return Err(IssueError::InvalidValidity(minutes));
        }

        let now = self.clock.now();
        let candidate = MealToken {
            code: signing::random_hex(MEAL_CODE_BYTES),
            scope: TokenScope::Meal,
            subject: None,
            mess_id: Some(mess_id),
            meal_type,
            date,
            issued_at: now,
            expires_at: now + Duration::minutes(minutes),
            nonce: None,
            signature: None,
        };
        let candidate_code = candidate.code.clone();

        let slot = SlotKey {
            mess_id,
            meal_type,
            date,
        };
        let token = self.store.get_or_register(slot, candidate, now).await;

        if token.code == candidate_code {
            info!(mess_id, %meal_type, %date, expires_at = %token.expires_at, "Meal token issued");
        } else {
            debug!(mess_id, %meal_type, %date, "Reusing live meal token");
        }
        Ok(token)
    }

    /// QR personnel signé, valable 30 minutes, sans enregistrement serveur.
    /// Le rejeu est bloqué par l'unicité du journal de présence.
    pub fn issue_user_token(
        &self,
        user_id: i32,
        meal_type: MealType,
        date: NaiveDate,
    ) -> Result<MealToken, IssueError> {
        let now = self.clock.now();
        let claims = UserTokenClaims {
            user_id,
            meal_type,
            date,
            timestamp: now.timestamp_millis(),
            nonce: signing::random_hex(NONCE_BYTES),
        };
        let (code, signature) = claims.seal(&self.secret)?;

        debug!(user_id, %meal_type, %date, "User token issued");

        Ok(MealToken {
            code,
            scope: TokenScope::User,
            subject: Some(user_id),
            mess_id: None,
            meal_type,
            date,
            issued_at: now,
            expires_at: now + Duration::minutes(USER_TOKEN_VALIDITY_MINUTES),
            nonce: Some(claims.nonce),
            signature: Some(signature),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ManualClock, day, instant, token_pair};

    #[tokio::test]
    async fn test_default_validity_per_meal() {
        let now = instant(2026, 10, 17, 7, 0);
        let (issuer, _, _) = token_pair(ManualClock::at(now));

        let breakfast = issuer
            .issue_meal_token(1, MealType::Breakfast, day(2026, 10, 17), None)
            .await
            .unwrap();
        let lunch = issuer
            .issue_meal_token(1, MealType::Lunch, day(2026, 10, 17), None)
            .await
            .unwrap();

        assert_eq!(breakfast.expires_at - breakfast.issued_at, Duration::minutes(180));
        assert_eq!(lunch.expires_at - lunch.issued_at, Duration::minutes(240));
        assert_eq!(breakfast.scope, TokenScope::Meal);
        assert!(breakfast.subject.is_none());
        assert_eq!(breakfast.code.len(), MEAL_CODE_BYTES * 2);
    }

    #[tokio::test]
    async fn test_reissue_returns_live_token() {
        let clock = ManualClock::at(instant(2026, 10, 17, 12, 0));
        let (issuer, _, _) = token_pair(clock.clone());

        let first = issuer
            .issue_meal_token(1, MealType::Lunch, day(2026, 10, 17), Some(60))
            .await
            .unwrap();
        clock.advance(Duration::minutes(30));
        let again = issuer
            .issue_meal_token(1, MealType::Lunch, day(2026, 10, 17), Some(60))
            .await
            .unwrap();
        assert_eq!(first, again);

        // Autre mess, autre créneau
        let other = issuer
            .issue_meal_token(2, MealType::Lunch, day(2026, 10, 17), Some(60))
            .await
            .unwrap();
        assert_ne!(first.code, other.code);

        clock.advance(Duration::minutes(31));
        let renewed = issuer
            .issue_meal_token(1, MealType::Lunch, day(2026, 10, 17), Some(60))
            .await
            .unwrap();
        assert_ne!(first.code, renewed.code);
    }

    #[tokio::test]
    async fn test_non_positive_validity_is_rejected() {
        let (issuer, _, _) = token_pair(ManualClock::at(instant(2026, 10, 17, 12, 0)));
        let result = issuer
            .issue_meal_token(1, MealType::Lunch, day(2026, 10, 17), Some(0))
            .await;
        assert!(matches!(result, Err(IssueError::InvalidValidity(0))));
    }

    #[test]
    fn test_user_token_is_signed_and_bounded() {
        let now = instant(2026, 10, 17, 19, 0);
        let (issuer, _, _) = token_pair(ManualClock::at(now));

        let token = issuer
            .issue_user_token(7, MealType::Dinner, day(2026, 10, 17))
            .unwrap();

        assert_eq!(token.scope, TokenScope::User);
        assert_eq!(token.subject, Some(7));
        assert_eq!(token.expires_at - token.issued_at, Duration::minutes(30));
        assert_eq!(token.nonce.as_ref().map(String::len), Some(NONCE_BYTES * 2));
        assert_eq!(token.signature.as_ref().map(String::len), Some(64));

        let other = issuer
            .issue_user_token(7, MealType::Dinner, day(2026, 10, 17))
            .unwrap();
        assert_ne!(token.nonce, other.nonce);
    }
}
