// Format de transport du QR personnel :
//   base64( JSON {user_id, meal_type, date, timestamp, nonce, signature} )
// avec signature = hex(HMAC-SHA256(secret, JSON {user_id, meal_type, date, timestamp, nonce}))
//
// Le JSON signé est TOUJOURS re-sérialisé depuis la struct (ordre des champs
// fixe), jamais repris tel quel depuis le token reçu.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::SigningSecret;
use crate::models::meal_type::MealType;
use crate::utils::signing;

/// Durée de vie fixe d'un QR personnel
pub const USER_TOKEN_VALIDITY_MINUTES: i64 = 30;

/// Partie signée
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserTokenClaims {
    pub user_id: i32,
    pub meal_type: MealType,
    pub date: NaiveDate,
    /// Émission, en millisecondes depuis l'epoch
    pub timestamp: i64,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireToken {
    user_id: i32,
    meal_type: MealType,
    date: NaiveDate,
    timestamp: i64,
    nonce: String,
    signature: String,
}

impl UserTokenClaims {
    pub fn canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Signe et encode en base64. Retourne (code, signature).
    pub fn seal(&self, secret: &SigningSecret) -> Result<(String, String), serde_json::Error> {
        let signature = signing::sign(secret, &self.canonical_json()?);
        let wire = WireToken {
            user_id: self.user_id,
            meal_type: self.meal_type,
            date: self.date,
            timestamp: self.timestamp,
            nonce: self.nonce.clone(),
            signature: signature.clone(),
        };
        let json = serde_json::to_vec(&wire)?;
        Ok((STANDARD.encode(json), signature))
    }
}

/// Décode le token reçu et vérifie sa signature.
/// Toute anomalie (base64, JSON, signature) donne None : l'appelant ne
/// distingue pas un token mal formé d'un token falsifié.
pub fn open(code: &str, secret: &SigningSecret) -> Option<UserTokenClaims> {
    let bytes = STANDARD.decode(code).ok()?;
    let wire: WireToken = serde_json::from_slice(&bytes).ok()?;

    let claims = UserTokenClaims {
        user_id: wire.user_id,
        meal_type: wire.meal_type,
        date: wire.date,
        timestamp: wire.timestamp,
        nonce: wire.nonce,
    };
    let payload = claims.canonical_json().ok()?;

    signing::verify(secret, &payload, &wire.signature).then_some(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::day;

    fn claims() -> UserTokenClaims {
        UserTokenClaims {
            user_id: 42,
            meal_type: MealType::Dinner,
            date: day(2026, 10, 17),
            timestamp: 1_792_230_000_000,
            nonce: "00ff".to_string(),
        }
    }

    #[test]
    fn test_canonical_field_order() {
        let json = String::from_utf8(claims().canonical_json().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"user_id":42,"meal_type":"dinner","date":"2026-10-17","timestamp":1792230000000,"nonce":"00ff"}"#
        );
    }

    #[test]
    fn test_seal_then_open() {
        let secret = SigningSecret::new("k");
        let (code, _) = claims().seal(&secret).unwrap();

        assert_eq!(open(&code, &secret), Some(claims()));
        assert_eq!(open(&code, &SigningSecret::new("other")), None);
        assert_eq!(open("not base64 !", &secret), None);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let secret = SigningSecret::new("k");
        let (code, signature) = claims().seal(&secret).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(&code).unwrap()).unwrap();
        value["role"] = serde_json::json!("admin");
        assert_eq!(value["signature"], serde_json::json!(signature));

        let forged = STANDARD.encode(serde_json::to_vec(&value).unwrap());
        assert_eq!(open(&forged, &secret), None);
    }
}
