// ============================================================================
// MODÈLE : ATTENDANCE
// ============================================================================
//
// Description:
//   Journal des passages à la mess. Une ligne par scan réussi, plus les
//   tentatives refusées au géofence (pour audit).
//
// Colonnes de la table attendance:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - user_id, mess_id, subscription_id (INTEGER, NOT NULL)
//   - scan_date (DATE, NOT NULL) - jour calendaire du repas
//   - meal_type (VARCHAR, NOT NULL)
//   - scan_time (TIMESTAMPTZ, NOT NULL)
//   - latitude / longitude (DOUBLE, NULL)
//   - distance_from_mess (DOUBLE, NULL) - en mètres
//   - is_valid (BOOLEAN, NOT NULL)
//   - valid_slot (BOOLEAN, NULL) - TRUE si is_valid, NULL sinon
//   - validation_errors (JSON, NOT NULL) - tableau de codes
//   - scan_method (VARCHAR, NOT NULL) - meal_qr | user_qr
//
// Points d'attention:
//   - Index UNIQUE (user_id, scan_date, meal_type, valid_slot) : les NULL ne
//     se comparent jamais, donc seules les lignes valides sont uniques
//   - Immuable une fois écrit (piste d'audit)
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::meal_type::MealType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ScanMethod {
    /// QR de la mess scanné par l'abonné
    #[sea_orm(string_value = "meal_qr")]
    MealQr,
    /// QR personnel de l'abonné scanné par la mess
    #[sea_orm(string_value = "user_qr")]
    UserQr,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub mess_id: i32,
    pub subscription_id: i32,

    pub scan_date: Date,
    pub meal_type: MealType,
    pub scan_time: DateTimeUtc,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_from_mess: Option<f64>,

    pub is_valid: bool,
    #[serde(skip_serializing)]
    pub valid_slot: Option<bool>,
    pub validation_errors: Json,

    pub scan_method: ScanMethod,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mess::Entity",
        from = "Column::MessId",
        to = "super::mess::Column::Id"
    )]
    Mess,

    #[sea_orm(
        belongs_to = "super::subscription::Entity",
        from = "Column::SubscriptionId",
        to = "super::subscription::Column::Id"
    )]
    Subscription,
}

impl Related<super::mess::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mess.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
