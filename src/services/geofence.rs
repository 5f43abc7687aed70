use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::RedemptionError;
use crate::models::mess;

/// Rayon moyen de la Terre, en mètres
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Coordonnées finies et dans les bornes WGS84
    pub fn is_well_formed(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Distance orthodromique (haversine), en mètres
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProximityRejection {
    /// Position absente ou invalide : jamais considérée "dans le périmètre"
    LocationRequired,
    OutOfRange { distance_meters: f64 },
}

/// Vérifie la position par rapport à la mess.
/// Ok(distance) si distance <= rayon (borne incluse).
/// Err(Configuration) si la mess n'a pas de coordonnées.
pub fn check_proximity(
    mess: &mess::Model,
    presented: Option<GeoPoint>,
) -> Result<Result<f64, ProximityRejection>, RedemptionError> {
    let Some((latitude, longitude)) = mess.anchor() else {
        error!(mess_id = mess.id, "Mess has no geofence coordinates");
        return Err(RedemptionError::Configuration(format!(
            "mess {} has no geofence coordinates",
            mess.id
        )));
    };

    let Some(presented) = presented.filter(GeoPoint::is_well_formed) else {
        return Ok(Err(ProximityRejection::LocationRequired));
    };

    let distance_meters = haversine_meters(GeoPoint::new(latitude, longitude), presented);
    if within_radius(distance_meters, mess.radius_meters) {
        Ok(Ok(distance_meters))
    } else {
        Ok(Err(ProximityRejection::OutOfRange { distance_meters }))
    }
}

pub fn within_radius(distance_meters: f64, radius_meters: i32) -> bool {
    distance_meters <= f64::from(radius_meters)
}

/// Refuse de démarrer si une mess n'a pas de géofence exploitable
pub async fn ensure_geofences_configured(db: &DatabaseConnection) -> Result<(), RedemptionError> {
    let broken: Vec<i32> = mess::Entity::find()
        .filter(
            mess::Column::Latitude
                .is_null()
                .or(mess::Column::Longitude.is_null())
                .or(mess::Column::RadiusMeters.lte(0)),
        )
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.id)
        .collect();

    if broken.is_empty() {
        Ok(())
    } else {
        Err(RedemptionError::Configuration(format!(
            "messes without geofence data: {:?}",
            broken
        )))
    }
}
