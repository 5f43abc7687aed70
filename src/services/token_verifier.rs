use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::config::SigningSecret;
use crate::error::TokenRejection;
use crate::models::meal_type::MealType;
use crate::services::token_store::MealTokenStore;
use crate::services::user_token::{self, USER_TOKEN_VALIDITY_MINUTES};

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedMealToken {
    pub code: String,
    pub mess_id: i32,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedUserToken {
    pub user_id: i32,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub issued_at: DateTime<Utc>,
}

/// Authentifie un QR présenté. Lecture seule : ne consomme rien.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: SigningSecret,
    store: Arc<dyn MealTokenStore>,
    clock: Arc<dyn Clock>,
    skew: Duration,
}

impl TokenVerifier {
    pub fn new(
        secret: SigningSecret,
        store: Arc<dyn MealTokenStore>,
        clock: Arc<dyn Clock>,
        skew: Duration,
    ) -> Self {
        Self {
            secret,
            store,
            clock,
            skew,
        }
    }

    pub async fn verify_meal_token(&self, code: &str) -> Result<VerifiedMealToken, TokenRejection> {
        let Some((slot, token)) = self.store.find(code).await else {
            debug!("Meal token not found");
            return Err(TokenRejection::NotFound);
        };

        if token.is_expired_at(self.clock.now(), self.skew) {
            debug!(mess_id = slot.mess_id, meal_type = %slot.meal_type, "Meal token expired");
            return Err(TokenRejection::Expired);
        }

        Ok(VerifiedMealToken {
            code: token.code,
            mess_id: slot.mess_id,
            meal_type: slot.meal_type,
            date: slot.date,
            expires_at: token.expires_at,
        })
    }

    /// La signature est vérifiée AVANT toute autre règle : un payload non
    /// signé n'apprend rien à l'appelant sur sa plausibilité.
    pub fn verify_user_token(&self, code: &str) -> Result<VerifiedUserToken, TokenRejection> {
        let Some(claims) = user_token::open(code, &self.secret) else {
            debug!("User token rejected: bad signature");
            return Err(TokenRejection::BadSignature);
        };

        // Signé par nous mais timestamp inexploitable : on refuse quand même
        let issued_at =
            DateTime::from_timestamp_millis(claims.timestamp).ok_or(TokenRejection::BadSignature)?;
        let expires_at = issued_at + Duration::minutes(USER_TOKEN_VALIDITY_MINUTES);

        if self.clock.now() > expires_at + self.skew {
            debug!(user_id = claims.user_id, "User token expired");
            return Err(TokenRejection::Expired);
        }

        Ok(VerifiedUserToken {
            user_id: claims.user_id,
            meal_type: claims.meal_type,
            date: claims.date,
            issued_at,
        })
    }
}
