// ============================================================================
// MODÈLE : MESS
// ============================================================================
//
// Description:
//   Une cantine (mess). Fournie par le collaborateur de gestion des mess,
//   le coeur la lit uniquement (ancre du géofence + fenêtres de repas).
//
// Colonnes de la table mess:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - name (VARCHAR, NOT NULL)
//   - latitude / longitude (DOUBLE, NULL) - NULL = géofence non configuré
//   - radius_meters (INTEGER, NOT NULL)
//   - breakfast_start/end, lunch_start/end, dinner_start/end (TIME)
//   - qr_validity_minutes (INTEGER, NULL) - surcharge la durée par défaut
//   - allow_meal_confirmation (BOOLEAN) - pré-confirmation obligatoire
//   - confirmation_deadline_hours (INTEGER)
//
// Points d'attention:
//   - Une mess sans coordonnées est une erreur de configuration, jamais
//     "dans le périmètre"
//
// ============================================================================

use chrono::{Duration, NaiveDateTime, NaiveTime};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::meal_type::MealType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mess")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: i32,

    pub breakfast_start: Time,
    pub breakfast_end: Time,
    pub lunch_start: Time,
    pub lunch_end: Time,
    pub dinner_start: Time,
    pub dinner_end: Time,

    pub qr_validity_minutes: Option<i32>,
    pub allow_meal_confirmation: bool,
    pub confirmation_deadline_hours: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscription,

    #[sea_orm(has_many = "super::attendance::Entity")]
    Attendance,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Related<super::attendance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Coordonnées du centre du géofence, si la mess les a renseignées
    pub fn anchor(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn meal_window(&self, meal: MealType) -> (NaiveTime, NaiveTime) {
        match meal {
            MealType::Breakfast => (self.breakfast_start, self.breakfast_end),
            MealType::Lunch => (self.lunch_start, self.lunch_end),
            MealType::Dinner => (self.dinner_start, self.dinner_end),
        }
    }

    /// Le repas est servi à cet instant local (bornes incluses, tolérance
    /// `skew` de chaque côté)
    pub fn serves_at(&self, meal: MealType, local: NaiveDateTime, skew: Duration) -> bool {
        let (start, end) = self.meal_window(meal);
        let day = local.date();
        day.and_time(start) - skew <= local && local <= day.and_time(end) + skew
    }

    /// Repas en cours à l'heure locale donnée (bornes incluses)
    pub fn meal_at(&self, time: NaiveTime) -> Option<MealType> {
        [MealType::Breakfast, MealType::Lunch, MealType::Dinner]
            .into_iter()
            .find(|meal| {
                let (start, end) = self.meal_window(*meal);
                start <= time && time <= end
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_meal_at_windows() {
        let mess = test_support::mess_model(1);
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();

        assert_eq!(mess.meal_at(at(7, 30)), Some(MealType::Breakfast));
        assert_eq!(mess.meal_at(at(13, 0)), Some(MealType::Lunch));
        assert_eq!(mess.meal_at(at(22, 0)), Some(MealType::Dinner));
        assert_eq!(mess.meal_at(at(16, 0)), None);
    }

    #[test]
    fn test_serves_at_with_skew() {
        let mess = test_support::mess_model(1);
        let at = |h, m| {
            test_support::day(2026, 10, 17)
                .and_hms_opt(h, m, 0)
                .unwrap()
        };

        assert!(mess.serves_at(MealType::Lunch, at(15, 0), Duration::zero()));
        assert!(!mess.serves_at(MealType::Lunch, at(15, 1), Duration::zero()));
        assert!(mess.serves_at(MealType::Lunch, at(15, 1), Duration::minutes(2)));
        assert!(!mess.serves_at(MealType::Lunch, at(21, 35), Duration::minutes(2)));
        assert!(mess.serves_at(MealType::Dinner, at(21, 35), Duration::zero()));
    }

    #[test]
    fn test_anchor_requires_both_coordinates() {
        let mut mess = test_support::mess_model(1);
        assert!(mess.anchor().is_some());

        mess.longitude = None;
        assert!(mess.anchor().is_none());
    }
}
