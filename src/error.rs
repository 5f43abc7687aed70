// ============================================================================
// ERREURS ET REFUS
// ============================================================================
//
// Deux familles bien séparées:
//   - Les REFUS métier (token invalide, abonnement non éligible, trop loin,
//     déjà scanné) : résultats normaux, retournés dans Ok(..), jamais loggés
//     en erreur
//   - Les ERREURS système (stockage indisponible, configuration manquante) :
//     RedemptionError, propagées avec `?`
//
// ============================================================================

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

use crate::models::meal_type::MealType;
use crate::services::confirmation_gate::ConfirmationError;
use crate::services::token_issuer::IssueError;

/// Pourquoi un token présenté est refusé
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRejection {
    NotFound,
    Expired,
    BadSignature,
}

impl TokenRejection {
    pub fn code(&self) -> &'static str {
        match self {
            TokenRejection::NotFound => "not_found",
            TokenRejection::Expired => "expired",
            TokenRejection::BadSignature => "bad_signature",
        }
    }
}

/// Pourquoi l'abonné ne peut pas prendre ce repas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligibility {
    NoSubscription,
    SubscriptionExpired,
    SubscriptionPausedOrCancelled,
    PaymentNotConfirmed,
    MealNotIncluded,
    NotConfirmed,
    ConfirmationDeadlinePassed,
}

impl Ineligibility {
    pub fn code(&self) -> &'static str {
        match self {
            Ineligibility::NoSubscription => "no_subscription",
            Ineligibility::SubscriptionExpired => "subscription_expired",
            Ineligibility::SubscriptionPausedOrCancelled => "subscription_paused_or_cancelled",
            Ineligibility::PaymentNotConfirmed => "payment_not_confirmed",
            Ineligibility::MealNotIncluded => "meal_not_included",
            Ineligibility::NotConfirmed => "not_confirmed",
            Ineligibility::ConfirmationDeadlinePassed => "confirmation_deadline_passed",
        }
    }
}

/// Refus d'un passage, un variant par étape de la validation
#[derive(Debug, Clone, PartialEq)]
pub enum RedemptionRejection {
    InvalidToken(TokenRejection),
    Ineligible(Ineligibility),
    /// QR émis pour un autre jour que le jour local de la mess
    WrongDay,
    OutsideMealWindow { meal_type: MealType },
    LocationRequired,
    OutOfRange { distance_meters: f64 },
    AlreadyRedeemed { meal_type: MealType },
}

impl RedemptionRejection {
    /// Code stable pour les logs et le client
    pub fn code(&self) -> &'static str {
        match self {
            RedemptionRejection::InvalidToken(_) => "invalid_token",
            RedemptionRejection::Ineligible(_) => "ineligible",
            RedemptionRejection::WrongDay => "wrong_day",
            RedemptionRejection::OutsideMealWindow { .. } => "outside_meal_window",
            RedemptionRejection::LocationRequired => "location_required",
            RedemptionRejection::OutOfRange { .. } => "out_of_range",
            RedemptionRejection::AlreadyRedeemed { .. } => "already_redeemed",
        }
    }

    /// Raison détaillée (reste côté serveur pour les tokens)
    pub fn reason(&self) -> &'static str {
        match self {
            RedemptionRejection::InvalidToken(r) => r.code(),
            RedemptionRejection::Ineligible(r) => r.code(),
            other => other.code(),
        }
    }

    /// Message affiché à l'abonné.
    /// `not_found` et `bad_signature` partagent le même message.
    pub fn user_message(&self) -> String {
        match self {
            RedemptionRejection::InvalidToken(TokenRejection::Expired) => {
                "This QR code has expired".to_string()
            }
            RedemptionRejection::InvalidToken(_) => "Invalid QR code".to_string(),
            RedemptionRejection::Ineligible(reason) => match reason {
                Ineligibility::NoSubscription => {
                    "You do not have a subscription for this mess".to_string()
                }
                Ineligibility::SubscriptionExpired => "Your subscription has expired".to_string(),
                Ineligibility::SubscriptionPausedOrCancelled => {
                    "Your subscription is paused or cancelled".to_string()
                }
                Ineligibility::PaymentNotConfirmed => {
                    "Your subscription payment is not confirmed".to_string()
                }
                Ineligibility::MealNotIncluded => {
                    "This meal is not included in your subscription".to_string()
                }
                Ineligibility::NotConfirmed => "You did not confirm this meal".to_string(),
                Ineligibility::ConfirmationDeadlinePassed => {
                    "The confirmation deadline for this meal has passed".to_string()
                }
            },
            RedemptionRejection::WrongDay => "This QR code is not valid today".to_string(),
            RedemptionRejection::OutsideMealWindow { meal_type } => {
                format!("Outside {} hours", meal_type)
            }
            RedemptionRejection::LocationRequired => {
                "Location is required to scan this QR code".to_string()
            }
            RedemptionRejection::OutOfRange { distance_meters } => format!(
                "You are too far from the mess ({:.0} m away)",
                distance_meters
            ),
            RedemptionRejection::AlreadyRedeemed { meal_type } => {
                format!("Already marked present for {} today", meal_type)
            }
        }
    }
}

impl fmt::Display for RedemptionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.reason())
    }
}

/// Échecs non métier d'un passage
#[derive(Debug, Error)]
pub enum RedemptionError {
    /// Stockage lent ou indisponible : l'appelant peut réessayer
    #[error("Storage unavailable: {0}")]
    Transient(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<DbErr> for RedemptionError {
    fn from(err: DbErr) -> Self {
        RedemptionError::Transient(err.to_string())
    }
}

/// Erreur retournée par les routes HTTP
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", .0.user_message())]
    Rejected(RedemptionRejection),

    #[error(transparent)]
    Redemption(#[from] RedemptionError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("{0}")]
    Internal(String),
}

impl From<IssueError> for ApiError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::InvalidValidity(_) => ApiError::BadRequest(err.to_string()),
            IssueError::Encoding(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ConfirmationError> for ApiError {
    fn from(err: ConfirmationError) -> Self {
        match err {
            ConfirmationError::NotAllowed(_) | ConfirmationError::DeadlinePassed(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ConfirmationError::NotFound => ApiError::NotFound(err.to_string()),
            ConfirmationError::Database(db_err) => ApiError::Database(db_err),
        }
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Rejected(rejection) => rejection.code(),
            ApiError::Redemption(RedemptionError::Transient(_)) => "transient_failure",
            ApiError::Redemption(RedemptionError::Configuration(_)) => "configuration_error",
            ApiError::BadRequest(_) | ApiError::Validation(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Database(_) => "database_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Rejected(RedemptionRejection::InvalidToken(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Rejected(RedemptionRejection::AlreadyRedeemed { .. }) => StatusCode::CONFLICT,
            ApiError::Rejected(_) => StatusCode::FORBIDDEN,
            ApiError::Redemption(RedemptionError::Transient(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Redemption(RedemptionError::Configuration(_))
            | ApiError::Database(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if matches!(self, ApiError::Redemption(RedemptionError::Transient(_))) {
            response.insert_header(("Retry-After", "1"));
        }

        let body = match self {
            ApiError::Rejected(RedemptionRejection::OutOfRange { distance_meters }) => {
                serde_json::json!({
                    "error": self.to_string(),
                    "code": self.code(),
                    "distance_meters": distance_meters,
                })
            }
            ApiError::Redemption(RedemptionError::Transient(_)) => serde_json::json!({
                "error": "Please try again",
                "code": self.code(),
            }),
            _ => serde_json::json!({
                "error": self.to_string(),
                "code": self.code(),
            }),
        };

        response.json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Rejected(RedemptionRejection::InvalidToken(TokenRejection::Expired)),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Rejected(RedemptionRejection::Ineligible(Ineligibility::MealNotIncluded)),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::Rejected(RedemptionRejection::OutOfRange { distance_meters: 320.0 }),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::Rejected(RedemptionRejection::AlreadyRedeemed { meal_type: MealType::Lunch }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Redemption(RedemptionError::Transient("timeout".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Redemption(RedemptionError::Configuration("no geofence".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{error:?}");
        }
    }

    #[test]
    fn test_token_reasons_share_a_message() {
        let not_found = RedemptionRejection::InvalidToken(TokenRejection::NotFound);
        let forged = RedemptionRejection::InvalidToken(TokenRejection::BadSignature);
        let expired = RedemptionRejection::InvalidToken(TokenRejection::Expired);

        assert_eq!(not_found.user_message(), forged.user_message());
        assert_eq!(expired.user_message(), "This QR code has expired");
        assert_eq!(forged.reason(), "bad_signature");
    }

    #[test]
    fn test_specific_messages() {
        let already = RedemptionRejection::AlreadyRedeemed { meal_type: MealType::Lunch };
        assert_eq!(already.user_message(), "Already marked present for lunch today");

        let far = RedemptionRejection::OutOfRange { distance_meters: 412.4 };
        assert_eq!(far.user_message(), "You are too far from the mess (412 m away)");

        let late = RedemptionRejection::OutsideMealWindow { meal_type: MealType::Lunch };
        assert_eq!(late.user_message(), "Outside lunch hours");
        assert_eq!(ApiError::Rejected(late).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Rejected(RedemptionRejection::WrongDay).status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
