// Requêtes et réponses de l'API (JSON)
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::meal_token::{MealToken, TokenScope};
use crate::models::meal_type::MealType;
use crate::models::{attendance, meal_confirmation};
use crate::services::geofence::GeoPoint;

// ----------------------------------------------------------------------------
// Émission des QR
// ----------------------------------------------------------------------------

// Le jour n'est jamais choisi par le client : toujours le jour local de la mess

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct IssueMealTokenRequest {
    #[validate(range(min = 1))]
    pub mess_id: i32,
    /// Déduit des fenêtres de la mess si absent
    pub meal_type: Option<MealType>,
    #[validate(range(min = 1, max = 1440))]
    pub validity_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueUserTokenRequest {
    pub meal_type: MealType,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub code: String,
    pub scope: TokenScope,
    pub mess_id: Option<i32>,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<MealToken> for TokenResponse {
    fn from(token: MealToken) -> Self {
        Self {
            code: token.code,
            scope: token.scope,
            mess_id: token.mess_id,
            meal_type: token.meal_type,
            date: token.date,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
        }
    }
}

// ----------------------------------------------------------------------------
// Passage à la mess
// ----------------------------------------------------------------------------

/// L'abonné scanne le QR de la mess
#[derive(Debug, Deserialize, Validate)]
pub struct RedeemMealTokenRequest {
    #[validate(length(min = 1, max = 256))]
    pub token: String,
    pub geo_location: Option<GeoPoint>,
    pub meal_type: Option<MealType>,
}

/// Le poste de la mess scanne le QR personnel de l'abonné
#[derive(Debug, Deserialize, Validate)]
pub struct RedeemUserTokenRequest {
    #[validate(range(min = 1))]
    pub mess_id: i32,
    #[validate(length(min = 1, max = 2048))]
    pub token: String,
    pub geo_location: Option<GeoPoint>,
    pub meal_type: Option<MealType>,
}

#[derive(Debug, Serialize)]
pub struct RedemptionResponse {
    pub success: bool,
    pub message: String,
    pub attendance_id: i32,
    pub user_id: i32,
    pub mess_id: i32,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub scan_time: DateTime<Utc>,
    pub distance_meters: Option<f64>,
}

impl From<attendance::Model> for RedemptionResponse {
    fn from(record: attendance::Model) -> Self {
        Self {
            success: true,
            message: format!("Attendance marked for {}", record.meal_type),
            attendance_id: record.id,
            user_id: record.user_id,
            mess_id: record.mess_id,
            meal_type: record.meal_type,
            date: record.scan_date,
            scan_time: record.scan_time,
            distance_meters: record.distance_from_mess,
        }
    }
}

// ----------------------------------------------------------------------------
// Confirmations
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmationRequest {
    #[validate(range(min = 1))]
    pub mess_id: i32,
    pub date: NaiveDate,
    pub meal_type: MealType,
}

#[derive(Debug, Serialize)]
pub struct ConfirmationResponse {
    pub mess_id: i32,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub is_confirmed: bool,
    pub confirmation_deadline: DateTime<Utc>,
}

impl From<meal_confirmation::Model> for ConfirmationResponse {
    fn from(record: meal_confirmation::Model) -> Self {
        Self {
            mess_id: record.mess_id,
            date: record.date,
            meal_type: record.meal_type,
            is_confirmed: record.is_confirmed,
            confirmation_deadline: record.confirmation_deadline,
        }
    }
}

// ----------------------------------------------------------------------------
// Santé
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time: DateTime<Utc>,
    /// "up" ou "down" selon le ping de la BD
    pub database: &'static str,
}
