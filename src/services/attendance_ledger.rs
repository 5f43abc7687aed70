// Journal des présences.
//
// L'unicité "un passage valide par (user, jour, repas)" est portée par
// l'index uq_attendance_valid_slot : on insère directement et on traduit la
// violation d'unicité en LedgerOutcome::Duplicate. Pas de SELECT préalable,
// donc pas de fenêtre check-then-insert.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set, SqlErr};
use serde_json::json;
use tracing::{debug, info};

use crate::error::RedemptionError;
use crate::models::attendance::{self, ScanMethod};
use crate::models::meal_type::MealType;
use crate::services::geofence::GeoPoint;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    Created(attendance::Model),
    Duplicate,
}

/// Données d'un passage à journaliser
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub user_id: i32,
    pub mess_id: i32,
    pub subscription_id: i32,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub scanned_at: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub distance_meters: Option<f64>,
    pub method: ScanMethod,
}

impl NewAttendance {
    fn into_active_model(self, is_valid: bool, errors: &[&str]) -> attendance::ActiveModel {
        attendance::ActiveModel {
            user_id: Set(self.user_id),
            mess_id: Set(self.mess_id),
            subscription_id: Set(self.subscription_id),
            scan_date: Set(self.date),
            meal_type: Set(self.meal_type),
            scan_time: Set(self.scanned_at),
            latitude: Set(self.location.map(|p| p.latitude)),
            longitude: Set(self.location.map(|p| p.longitude)),
            distance_from_mess: Set(self.distance_meters),
            is_valid: Set(is_valid),
            valid_slot: Set(is_valid.then_some(true)),
            validation_errors: Set(json!(errors)),
            scan_method: Set(self.method),
            ..Default::default()
        }
    }
}

pub struct AttendanceLedger;

impl AttendanceLedger {
    /// Insère le passage valide. Duplicate si le créneau est déjà pris.
    pub async fn record_redemption(
        db: &DatabaseConnection,
        entry: NewAttendance,
    ) -> Result<LedgerOutcome, RedemptionError> {
        let (user_id, date, meal) = (entry.user_id, entry.date, entry.meal_type);

        match entry.into_active_model(true, &[]).insert(db).await {
            Ok(model) => {
                info!(user_id, mess_id = model.mess_id, %date, %meal, attendance_id = model.id, "Attendance recorded");
                Ok(LedgerOutcome::Created(model))
            }
            Err(err) if is_unique_violation(&err) => {
                debug!(user_id, %date, %meal, "Attendance already recorded for this slot");
                Ok(LedgerOutcome::Duplicate)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Trace d'audit d'une tentative refusée (is_valid = false, valid_slot NULL)
    pub async fn record_rejected_scan(
        db: &DatabaseConnection,
        entry: NewAttendance,
        reason: &str,
    ) -> Result<attendance::Model, RedemptionError> {
        let model = entry.into_active_model(false, &[reason]).insert(db).await?;
        debug!(attendance_id = model.id, reason, "Rejected scan recorded");
        Ok(model)
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
