use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::SigningSecret;

/// Claims du JWT de session émis par le service de comptes
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,        // user_id
    pub username: String,
    pub exp: i64,        // expiration timestamp
}

/// Génère un JWT de session (même format que le service de comptes)
pub fn generate_token(
    secret: &SigningSecret,
    user_id: i32,
    username: &str,
    ttl: Duration,
) -> Result<String, String> {
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or("Failed to calculate expiration")?
        .timestamp();

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to generate token: {}", e))
}

/// Vérifie et décode un JWT de session
pub fn verify_token(secret: &SigningSecret, token: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_token() {
        let secret = SigningSecret::new("session-secret");
        let token = generate_token(&secret, 123, "asha", Duration::hours(1)).unwrap();
        let claims = verify_token(&secret, &token).unwrap();

        assert_eq!(claims.sub, 123);
        assert_eq!(claims.username, "asha");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token =
            generate_token(&SigningSecret::new("a"), 1, "asha", Duration::hours(1)).unwrap();
        assert!(verify_token(&SigningSecret::new("b"), &token).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let result = verify_token(&SigningSecret::new("a"), "invalid.token.here");
        assert!(result.is_err());
    }
}
