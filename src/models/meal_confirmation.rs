// ============================================================================
// MODÈLE : MEAL CONFIRMATION
// ============================================================================
//
// Description:
//   Pré-confirmation d'un repas, utilisée seulement quand la mess a
//   allow_meal_confirmation = true.
//
// Colonnes de la table meal_confirmation:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - user_id, mess_id (INTEGER, NOT NULL)
//   - date (DATE, NOT NULL)
//   - meal_type (VARCHAR, NOT NULL)
//   - is_confirmed (BOOLEAN, NOT NULL)
//   - confirmation_deadline (TIMESTAMPTZ, NOT NULL)
//   - updated_at (TIMESTAMPTZ, NOT NULL)
//
// Points d'attention:
//   - Index UNIQUE (user_id, mess_id, date, meal_type)
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::meal_type::MealType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meal_confirmation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub mess_id: i32,
    pub date: Date,
    pub meal_type: MealType,
    pub is_confirmed: bool,
    pub confirmation_deadline: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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

impl ActiveModelBehavior for ActiveModel {}
