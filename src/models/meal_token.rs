// Token QR éphémère (jamais persisté en base)

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::meal_type::MealType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    /// Anonyme, lié à un créneau (mess, repas, jour)
    Meal,
    /// Lié à un abonné, signé HMAC
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealToken {
    /// Code aléatoire (Meal) ou payload signé encodé en base64 (User)
    pub code: String,
    pub scope: TokenScope,
    /// None pour un token Meal
    pub subject: Option<i32>,
    /// Mess du créneau (tokens Meal seulement)
    pub mess_id: Option<i32>,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub nonce: Option<String>,
    pub signature: Option<String>,
}

impl MealToken {
    /// Expiré dès que `now > expires_at` (+ tolérance d'horloge)
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now > self.expires_at + skew
    }
}
