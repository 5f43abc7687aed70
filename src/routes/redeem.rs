use actix_web::{HttpResponse, post, web};
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::dto::{RedeemMealTokenRequest, RedeemUserTokenRequest, RedemptionResponse};
use crate::services::redemption_service::RedemptionOutcome;
use crate::state::AppState;

fn respond(outcome: RedemptionOutcome) -> Result<HttpResponse, ApiError> {
    match outcome {
        RedemptionOutcome::Redeemed(record) => {
            Ok(HttpResponse::Created().json(RedemptionResponse::from(record)))
        }
        RedemptionOutcome::Rejected(rejection) => Err(ApiError::Rejected(rejection)),
    }
}

/// POST /api/redeem/meal - l'abonné connecté scanne le QR de la mess
#[post("/meal")]
pub async fn redeem_meal_token(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    request: web::Json<RedeemMealTokenRequest>,
) -> Result<HttpResponse, ApiError> {
    request.validate()?;

    let outcome = state
        .redemption
        .redeem_meal_token(
            auth_user.user_id,
            &request.token,
            request.geo_location,
            request.meal_type,
        )
        .await?;

    respond(outcome)
}

/// POST /api/redeem/user - le poste de la mess scanne le QR personnel
#[post("/user")]
pub async fn redeem_user_token(
    state: web::Data<AppState>,
    _auth_user: AuthUser,
    request: web::Json<RedeemUserTokenRequest>,
) -> Result<HttpResponse, ApiError> {
    request.validate()?;

    let outcome = state
        .redemption
        .redeem_user_token(
            request.mess_id,
            &request.token,
            request.geo_location,
            request.meal_type,
        )
        .await?;

    respond(outcome)
}

pub fn redeem_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/redeem")
            .service(redeem_meal_token)
            .service(redeem_user_token),
    );
}
