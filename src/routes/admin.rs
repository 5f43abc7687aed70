use actix_web::{HttpResponse, post, web};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::reconciliation;
use crate::state::AppState;

/// POST /api/admin/subscriptions/reconcile - remet à jour les status stockés
#[post("/reconcile")]
pub async fn reconcile_subscriptions(
    state: web::Data<AppState>,
    _auth_user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let today = state.today();
    let updated = reconciliation::reconcile_statuses(&state.db, today).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("Marked {} subscriptions as expired", updated),
        "updated": updated,
        "date": today,
    })))
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/subscriptions")
            .service(reconcile_subscriptions),
    );
}
