use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::config::SigningSecret;

type HmacSha256 = Hmac<Sha256>;

/// Longueur d'une signature HMAC-SHA256 encodée en hex
pub const SIGNATURE_HEX_LEN: usize = 64;

/// Génère `len` octets aléatoires encodés en hex minuscule
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

/// hex(HMAC-SHA256(secret, payload))
pub fn sign(secret: &SigningSecret, payload: &[u8]) -> String {
    let mut mac = new_mac(secret);
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Vérifie une signature hex en temps constant.
/// Seul l'encodage canonique (hex minuscule, 64 caractères) est accepté :
/// "AB" et "ab" ne sont pas la même signature.
pub fn verify(secret: &SigningSecret, payload: &[u8], signature_hex: &str) -> bool {
    if signature_hex.len() != SIGNATURE_HEX_LEN
        || !signature_hex
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return false;
    }

    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };

    let mut mac = new_mac(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(secret: &SigningSecret) -> HmacSha256 {
    // HMAC accepte une clé de n'importe quelle taille
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let secret = SigningSecret::new("k");
        let signature = sign(&secret, b"payload");

        assert_eq!(signature.len(), SIGNATURE_HEX_LEN);
        assert!(verify(&secret, b"payload", &signature));
        assert!(!verify(&secret, b"payload2", &signature));
        assert!(!verify(&SigningSecret::new("other"), b"payload", &signature));
    }

    #[test]
    fn test_uppercase_signature_is_rejected() {
        let secret = SigningSecret::new("k");
        let signature = sign(&secret, b"payload").to_uppercase();
        assert!(!verify(&secret, b"payload", &signature));
    }

    #[test]
    fn test_random_hex_entropy() {
        let a = random_hex(32);
        let b = random_hex(32);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
