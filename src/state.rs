use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use sea_orm::DatabaseConnection;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::services::redemption_service::RedemptionService;
use crate::services::token_issuer::TokenIssuer;
use crate::services::token_store::{InMemoryMealTokenStore, MealTokenStore};
use crate::services::token_verifier::TokenVerifier;

/// Dépendances partagées par les routes (injectées via web::Data)
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub tokens: Arc<dyn MealTokenStore>,
    pub issuer: TokenIssuer,
    pub redemption: RedemptionService,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let tokens: Arc<dyn MealTokenStore> = Arc::new(InMemoryMealTokenStore::default());

        let issuer = TokenIssuer::new(
            config.qr_secret.clone(),
            tokens.clone(),
            clock.clone(),
            config.meal_validity,
        );
        let verifier = TokenVerifier::new(
            config.qr_secret.clone(),
            tokens.clone(),
            clock.clone(),
            config.clock_skew,
        );
        let redemption = RedemptionService::new(
            db.clone(),
            verifier,
            tokens.clone(),
            clock.clone(),
            config.storage_timeout,
            config.utc_offset,
            config.clock_skew,
        );

        Self {
            db,
            config: Arc::new(config),
            clock,
            tokens,
            issuer,
            redemption,
        }
    }

    /// Heure courante dans le fuseau des mess
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        self.clock.now().with_timezone(&self.config.utc_offset)
    }

    pub fn today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }
}
