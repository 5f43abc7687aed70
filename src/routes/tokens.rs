use actix_web::{HttpResponse, post, web};
use sea_orm::EntityTrait;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::dto::{IssueMealTokenRequest, IssueUserTokenRequest, TokenResponse};
use crate::models::mess;
use crate::state::AppState;

/// POST /api/tokens/meal - QR du créneau en cours, affiché par la mess
#[post("/meal")]
pub async fn issue_meal_token(
    state: web::Data<AppState>,
    _auth_user: AuthUser,
    request: web::Json<IssueMealTokenRequest>,
) -> Result<HttpResponse, ApiError> {
    request.validate()?;
    let request = request.into_inner();

    let mess = mess::Entity::find_by_id(request.mess_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Mess {} not found", request.mess_id)))?;

    let local_now = state.local_now();
    let meal_type = match request.meal_type {
        Some(meal_type) => meal_type,
        None => mess
            .meal_at(local_now.time())
            .ok_or_else(|| ApiError::BadRequest("No meal is being served right now".to_string()))?,
    };
    let date = local_now.date_naive();

    // Durée : requête, sinon réglage de la mess, sinon défaut du repas
    let validity = request
        .validity_minutes
        .or(mess.qr_validity_minutes.map(i64::from));

    let token = state
        .issuer
        .issue_meal_token(mess.id, meal_type, date, validity)
        .await?;

    Ok(HttpResponse::Ok().json(TokenResponse::from(token)))
}

/// POST /api/tokens/user - QR personnel de l'utilisateur connecté (30 min)
#[post("/user")]
pub async fn issue_user_token(
    state: web::Data<AppState>,
    auth_user: AuthUser,
    request: web::Json<IssueUserTokenRequest>,
) -> Result<HttpResponse, ApiError> {
    let date = state.today();
    let token = state
        .issuer
        .issue_user_token(auth_user.user_id, request.meal_type, date)?;

    Ok(HttpResponse::Created().json(TokenResponse::from(token)))
}

pub fn token_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tokens")
            .service(issue_meal_token)
            .service(issue_user_token),
    );
}
