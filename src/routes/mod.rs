pub mod admin;
pub mod confirmations;
pub mod health;
pub mod redeem;
pub mod tokens;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(tokens::token_routes)
            .configure(redeem::redeem_routes)
            .configure(confirmations::confirmation_routes)
            .configure(admin::admin_routes),
    );
}
