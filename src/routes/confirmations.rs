use actix_web::{HttpResponse, delete, post, web};
use sea_orm::EntityTrait;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::dto::{ConfirmationRequest, ConfirmationResponse};
use crate::models::mess;
use crate::services::confirmation_gate::ConfirmationGate;
use crate::state::AppState;

/// POST /api/confirmations - confirmer sa présence à un repas
#[post("")]
pub async fn confirm_meal(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    request: web::Json<ConfirmationRequest>,
) -> Result<HttpResponse, ApiError> {
    request.validate()?;

    let mess = mess::Entity::find_by_id(request.mess_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Mess {} not found", request.mess_id)))?;

    let record = ConfirmationGate::confirm(
        &state.db,
        auth_user.user_id,
        &mess,
        request.date,
        request.meal_type,
        state.clock.now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(ConfirmationResponse::from(record)))
}

/// DELETE /api/confirmations - annuler une confirmation
#[delete("")]
pub async fn cancel_confirmation(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    request: web::Json<ConfirmationRequest>,
) -> Result<HttpResponse, ApiError> {
    request.validate()?;

    let record = ConfirmationGate::cancel(
        &state.db,
        auth_user.user_id,
        request.mess_id,
        request.date,
        request.meal_type,
        state.clock.now(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(ConfirmationResponse::from(record)))
}

pub fn confirmation_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/confirmations")
            .service(confirm_meal)
            .service(cancel_confirmation),
    );
}
