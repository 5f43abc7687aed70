// Pré-confirmation des repas (mess avec allow_meal_confirmation = true).
//
// La deadline est figée à la première confirmation :
//   confirmation_deadline = instant de confirmation + confirmation_deadline_hours
// Un passage après cette deadline est refusé même si la confirmation existe.
// Re-confirmer (après une annulation) garde la deadline d'origine, et n'est
// plus possible une fois celle-ci passée.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use thiserror::Error;
use tracing::info;

use crate::error::{Ineligibility, RedemptionError};
use crate::models::meal_confirmation;
use crate::models::meal_type::MealType;
use crate::models::mess;

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("Mess {0} does not use meal confirmation")]
    NotAllowed(i32),

    #[error("No confirmation found")]
    NotFound,

    #[error("Confirmation deadline passed at {0}")]
    DeadlinePassed(DateTime<Utc>),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

pub struct ConfirmationGate;

impl ConfirmationGate {
    /// Vérifie la confirmation de l'abonné pour ce repas
    pub async fn check_confirmed(
        db: &DatabaseConnection,
        user_id: i32,
        mess: &mess::Model,
        date: NaiveDate,
        meal: MealType,
        now: DateTime<Utc>,
    ) -> Result<Result<(), Ineligibility>, RedemptionError> {
        let record = find(db, user_id, mess.id, date, meal).await?;

        Ok(match record {
            Some(record) if record.is_confirmed => {
                if now > record.confirmation_deadline {
                    Err(Ineligibility::ConfirmationDeadlinePassed)
                } else {
                    Ok(())
                }
            }
            _ => Err(Ineligibility::NotConfirmed),
        })
    }

    /// Crée la confirmation, ou réactive celle du créneau tant que sa
    /// deadline n'est pas passée (upsert sur l'index unique)
    pub async fn confirm(
        db: &DatabaseConnection,
        user_id: i32,
        mess: &mess::Model,
        date: NaiveDate,
        meal: MealType,
        now: DateTime<Utc>,
    ) -> Result<meal_confirmation::Model, ConfirmationError> {
        if !mess.allow_meal_confirmation {
            return Err(ConfirmationError::NotAllowed(mess.id));
        }

        if let Some(existing) = find(db, user_id, mess.id, date, meal).await? {
            if now > existing.confirmation_deadline {
                return Err(ConfirmationError::DeadlinePassed(existing.confirmation_deadline));
            }
        }

        let deadline = now + Duration::hours(i64::from(mess.confirmation_deadline_hours));
        let record = meal_confirmation::ActiveModel {
            user_id: Set(user_id),
            mess_id: Set(mess.id),
            date: Set(date),
            meal_type: Set(meal),
            is_confirmed: Set(true),
            confirmation_deadline: Set(deadline),
            updated_at: Set(now),
            ..Default::default()
        };

        meal_confirmation::Entity::insert(record)
            .on_conflict(
                OnConflict::columns([
                    meal_confirmation::Column::UserId,
                    meal_confirmation::Column::MessId,
                    meal_confirmation::Column::Date,
                    meal_confirmation::Column::MealType,
                ])
                .update_columns([
                    meal_confirmation::Column::IsConfirmed,
                    meal_confirmation::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(db)
            .await?;

        let record = find(db, user_id, mess.id, date, meal)
            .await?
            .ok_or(ConfirmationError::NotFound)?;

        info!(
            user_id,
            mess_id = mess.id,
            %date,
            %meal,
            deadline = %record.confirmation_deadline,
            "Meal confirmed"
        );
        Ok(record)
    }

    /// Annule une confirmation existante (is_confirmed = false)
    pub async fn cancel(
        db: &DatabaseConnection,
        user_id: i32,
        mess_id: i32,
        date: NaiveDate,
        meal: MealType,
        now: DateTime<Utc>,
    ) -> Result<meal_confirmation::Model, ConfirmationError> {
        let record = find(db, user_id, mess_id, date, meal)
            .await?
            .ok_or(ConfirmationError::NotFound)?;

        let mut active: meal_confirmation::ActiveModel = record.into();
        active.is_confirmed = Set(false);
        active.updated_at = Set(now);
        let updated = active.update(db).await?;

        info!(user_id, mess_id, %date, %meal, "Meal confirmation cancelled");
        Ok(updated)
    }
}

async fn find(
    db: &DatabaseConnection,
    user_id: i32,
    mess_id: i32,
    date: NaiveDate,
    meal: MealType,
) -> Result<Option<meal_confirmation::Model>, DbErr> {
    meal_confirmation::Entity::find()
        .filter(meal_confirmation::Column::UserId.eq(user_id))
        .filter(meal_confirmation::Column::MessId.eq(mess_id))
        .filter(meal_confirmation::Column::Date.eq(date))
        .filter(meal_confirmation::Column::MealType.eq(meal))
        .one(db)
        .await
}
