// ============================================================================
// MODÈLE : SUBSCRIPTION
// ============================================================================
//
// Description:
//   Abonnement d'un utilisateur à une mess pour une période donnée.
//
// Colonnes de la table subscription:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - user_id, mess_id (INTEGER, NOT NULL)
//   - start_date, end_date (DATE, NOT NULL) - bornes INCLUSES
//   - status (VARCHAR) - pending | active | paused | expired | cancelled
//   - payment_status (VARCHAR) - paid | pending | failed | refunded
//   - breakfast, lunch, dinner (BOOLEAN) - repas inclus
//   - created_at (TIMESTAMPTZ)
//
// Points d'attention:
//   - status est un CACHE : la décision d'accès le recalcule toujours à partir
//     des dates et du paiement (voir services::subscription_gate)
//   - end_date > start_date, vérifié dans before_save
//   - Jamais supprimé (archivage logique)
//
// ============================================================================

use chrono::NaiveDate;
use sea_orm::ActiveValue;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::meal_type::MealType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub mess_id: i32,

    pub start_date: Date,
    pub end_date: Date,

    pub status: SubscriptionStatus,
    pub payment_status: PaymentStatus,

    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mess::Entity",
        from = "Column::MessId",
        to = "super::mess::Column::Id"
    )]
    Mess,
}

impl Related<super::mess::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mess.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let (Some(start), Some(end)) = (value_of(&self.start_date), value_of(&self.end_date)) {
            if end <= start {
                return Err(DbErr::Custom(format!(
                    "Subscription end_date ({end}) must be after start_date ({start})"
                )));
            }
        }
        Ok(self)
    }
}

fn value_of(value: &ActiveValue<Date>) -> Option<NaiveDate> {
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(*v),
        ActiveValue::NotSet => None,
    }
}

impl Model {
    /// La période couvre `date` (bornes incluses)
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn includes(&self, meal: MealType) -> bool {
        match meal {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
        }
    }

    pub fn is_paused_or_cancelled(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Paused | SubscriptionStatus::Cancelled
        )
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Utilisable pour `meal` le jour `date`, sans se fier au status stocké
    /// sauf pour pause/annulation (qui sont des décisions explicites)
    pub fn is_usable(&self, date: NaiveDate, meal: MealType) -> bool {
        !self.is_paused_or_cancelled() && self.is_paid() && self.covers(date) && self.includes(meal)
    }
}
