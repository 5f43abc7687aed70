// Éligibilité d'un abonné pour un repas donné.
//
// Le status stocké n'est qu'un cache : on recalcule tout depuis les dates,
// le paiement et les repas inclus. Seuls "paused" et "cancelled" sont pris
// tels quels (ce sont des décisions explicites, pas des dérivations).

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::debug;

use crate::error::{Ineligibility, RedemptionError};
use crate::models::meal_type::MealType;
use crate::models::mess;
use crate::models::subscription::{self, SubscriptionStatus};
use crate::services::confirmation_gate::ConfirmationGate;

pub struct SubscriptionGate;

impl SubscriptionGate {
    /// Choisit l'abonnement applicable et vérifie qu'il est utilisable.
    ///
    /// En cas de chevauchement (renouvellement), le choix est déterministe :
    /// utilisable d'abord, puis status actif, puis start_date la plus récente,
    /// puis created_at le plus récent.
    pub fn evaluate(
        subscriptions: &[subscription::Model],
        date: NaiveDate,
        meal: MealType,
    ) -> Result<&subscription::Model, Ineligibility> {
        if subscriptions.is_empty() {
            return Err(Ineligibility::NoSubscription);
        }

        let best = subscriptions
            .iter()
            .filter(|s| s.covers(date))
            .max_by_key(|s| {
                (
                    s.is_usable(date, meal),
                    !s.is_paused_or_cancelled(),
                    s.is_paid(),
                    s.status == SubscriptionStatus::Active,
                    s.start_date,
                    s.created_at,
                    s.id,
                )
            });

        let Some(best) = best else {
            // Rien ne couvre ce jour : soit tout est terminé, soit pas encore commencé
            return if subscriptions.iter().any(|s| s.end_date < date) {
                Err(Ineligibility::SubscriptionExpired)
            } else {
                Err(Ineligibility::NoSubscription)
            };
        };

        if best.is_paused_or_cancelled() {
            Err(Ineligibility::SubscriptionPausedOrCancelled)
        } else if !best.is_paid() {
            Err(Ineligibility::PaymentNotConfirmed)
        } else if !best.includes(meal) {
            Err(Ineligibility::MealNotIncluded)
        } else {
            Ok(best)
        }
    }

    /// Charge les abonnements de l'utilisateur dans cette mess et les évalue.
    /// Si la mess exige une pré-confirmation, délègue ensuite à ConfirmationGate.
    pub async fn check_eligibility(
        db: &DatabaseConnection,
        user_id: i32,
        mess: &mess::Model,
        date: NaiveDate,
        meal: MealType,
        now: DateTime<Utc>,
    ) -> Result<Result<subscription::Model, Ineligibility>, RedemptionError> {
        let subscriptions = subscription::Entity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::MessId.eq(mess.id))
            .all(db)
            .await?;

        let chosen = match Self::evaluate(&subscriptions, date, meal) {
            Ok(chosen) => chosen.clone(),
            Err(reason) => {
                debug!(user_id, mess_id = mess.id, %date, %meal, reason = reason.code(), "Not eligible");
                return Ok(Err(reason));
            }
        };

        if mess.allow_meal_confirmation {
            if let Err(reason) =
                ConfirmationGate::check_confirmed(db, user_id, mess, date, meal, now).await?
            {
                debug!(user_id, mess_id = mess.id, %date, %meal, reason = reason.code(), "Meal not confirmed");
                return Ok(Err(reason));
            }
        }

        Ok(Ok(chosen))
    }
}
