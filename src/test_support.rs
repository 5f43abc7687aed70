// Outils partagés par les tests (horloge manuelle, BD SQLite en mémoire, seeds)

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};

use crate::clock::Clock;
use crate::config::{MealValidity, SigningSecret};
use crate::db;
use crate::models::mess;
use crate::models::subscription::{self, PaymentStatus, SubscriptionStatus};
use crate::services::token_issuer::TokenIssuer;
use crate::services::token_store::{InMemoryMealTokenStore, MealTokenStore};
use crate::services::token_verifier::TokenVerifier;

pub const SECRET: &str = "test-secret";

/// Horloge avancée à la main
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn instant(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Mess à Bangalore, rayon 100 m
pub const MESS_LAT: f64 = 12.9716;
pub const MESS_LON: f64 = 77.5946;

pub fn mess_model(id: i32) -> mess::Model {
    mess::Model {
        id,
        name: format!("Mess {id}"),
        latitude: Some(MESS_LAT),
        longitude: Some(MESS_LON),
        radius_meters: 100,
        breakfast_start: hm(7, 0),
        breakfast_end: hm(10, 0),
        lunch_start: hm(12, 0),
        lunch_end: hm(15, 0),
        dinner_start: hm(19, 0),
        dinner_end: hm(22, 0),
        qr_validity_minutes: None,
        allow_meal_confirmation: false,
        confirmation_deadline_hours: 2,
    }
}

pub fn subscription_model(id: i32, start: NaiveDate, end: NaiveDate) -> subscription::Model {
    subscription::Model {
        id,
        user_id: 7,
        mess_id: 1,
        start_date: start,
        end_date: end,
        status: SubscriptionStatus::Active,
        payment_status: PaymentStatus::Paid,
        breakfast: true,
        lunch: true,
        dinner: true,
        created_at: instant(2026, 9, 1, 0, 0),
    }
}

pub async fn memory_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    db::sync_schema(&db).await.unwrap();
    db
}

pub async fn seed_mess(db: &DatabaseConnection, model: mess::Model) -> mess::Model {
    let active: mess::ActiveModel = mess::ActiveModel {
        id: Set(model.id),
        name: Set(model.name),
        latitude: Set(model.latitude),
        longitude: Set(model.longitude),
        radius_meters: Set(model.radius_meters),
        breakfast_start: Set(model.breakfast_start),
        breakfast_end: Set(model.breakfast_end),
        lunch_start: Set(model.lunch_start),
        lunch_end: Set(model.lunch_end),
        dinner_start: Set(model.dinner_start),
        dinner_end: Set(model.dinner_end),
        qr_validity_minutes: Set(model.qr_validity_minutes),
        allow_meal_confirmation: Set(model.allow_meal_confirmation),
        confirmation_deadline_hours: Set(model.confirmation_deadline_hours),
    };
    active.insert(db).await.unwrap()
}

pub async fn seed_subscription(
    db: &DatabaseConnection,
    model: subscription::Model,
) -> subscription::Model {
    let active = subscription::ActiveModel {
        id: Set(model.id),
        user_id: Set(model.user_id),
        mess_id: Set(model.mess_id),
        start_date: Set(model.start_date),
        end_date: Set(model.end_date),
        status: Set(model.status),
        payment_status: Set(model.payment_status),
        breakfast: Set(model.breakfast),
        lunch: Set(model.lunch),
        dinner: Set(model.dinner),
        created_at: Set(model.created_at),
    };
    active.insert(db).await.unwrap()
}

/// Émetteur + vérificateur partageant store, horloge et secret
pub fn token_pair(clock: Arc<dyn Clock>) -> (TokenIssuer, TokenVerifier, Arc<dyn MealTokenStore>) {
    let store: Arc<dyn MealTokenStore> = Arc::new(InMemoryMealTokenStore::default());
    let secret = SigningSecret::new(SECRET);
    let issuer = TokenIssuer::new(
        secret.clone(),
        store.clone(),
        clock.clone(),
        MealValidity::default(),
    );
    let verifier = TokenVerifier::new(secret, store.clone(), clock, Duration::zero());
    (issuer, verifier, store)
}
