// Registre des QR de repas vivants.
// Clé (mess, repas, jour) -> token courant, plus index code -> token.
// Un token expiré reste lisible (pour répondre "expired") jusqu'à la purge.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::models::meal_token::MealToken;
use crate::models::meal_type::MealType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub mess_id: i32,
    pub meal_type: MealType,
    pub date: NaiveDate,
}

#[async_trait]
pub trait MealTokenStore: Send + Sync {
    /// Retourne le token vivant du créneau s'il existe, sinon enregistre
    /// `candidate` et le retourne. Atomique.
    async fn get_or_register(
        &self,
        slot: SlotKey,
        candidate: MealToken,
        now: DateTime<Utc>,
    ) -> MealToken;

    async fn find(&self, code: &str) -> Option<(SlotKey, MealToken)>;

    /// Retire le token du registre (consommation). None si déjà retiré.
    async fn take(&self, code: &str) -> Option<(SlotKey, MealToken)>;

    /// Remet un token retiré par `take`
    async fn restore(&self, slot: SlotKey, token: MealToken);

    /// Supprime les tokens dont le TTL est écoulé, retourne le nombre supprimé
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Default)]
struct Registry {
    slots: HashMap<SlotKey, String>,
    tokens: HashMap<String, (SlotKey, MealToken)>,
}

#[derive(Default)]
pub struct InMemoryMealTokenStore {
    registry: Mutex<Registry>,
}

#[async_trait]
impl MealTokenStore for InMemoryMealTokenStore {
    async fn get_or_register(
        &self,
        slot: SlotKey,
        candidate: MealToken,
        now: DateTime<Utc>,
    ) -> MealToken {
        let mut registry = self.registry.lock().await;

        let live = registry
            .slots
            .get(&slot)
            .and_then(|code| registry.tokens.get(code))
            .filter(|(_, token)| !token.is_expired_at(now, Duration::zero()))
            .map(|(_, token)| token.clone());

        if let Some(token) = live {
            return token;
        }

        registry.slots.insert(slot, candidate.code.clone());
        registry
            .tokens
            .insert(candidate.code.clone(), (slot, candidate.clone()));
        candidate
    }

    async fn find(&self, code: &str) -> Option<(SlotKey, MealToken)> {
        self.registry.lock().await.tokens.get(code).cloned()
    }

    async fn take(&self, code: &str) -> Option<(SlotKey, MealToken)> {
        let mut registry = self.registry.lock().await;
        let (slot, token) = registry.tokens.remove(code)?;

        if registry.slots.get(&slot).is_some_and(|current| current == code) {
            registry.slots.remove(&slot);
        }
        Some((slot, token))
    }

    async fn restore(&self, slot: SlotKey, token: MealToken) {
        let mut registry = self.registry.lock().await;

        // Un nouveau token a pu être émis entre-temps : on ne l'écrase pas
        registry
            .slots
            .entry(slot)
            .or_insert_with(|| token.code.clone());
        registry.tokens.insert(token.code.clone(), (slot, token));
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut registry = self.registry.lock().await;
        let before = registry.tokens.len();

        registry
            .tokens
            .retain(|_, (_, token)| !token.is_expired_at(now, Duration::zero()));

        let Registry { slots, tokens } = &mut *registry;
        slots.retain(|_, code| tokens.contains_key(code));

        before - tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::meal_token::TokenScope;
    use crate::test_support::{day, instant};

    fn slot() -> SlotKey {
        SlotKey {
            mess_id: 1,
            meal_type: MealType::Lunch,
            date: day(2026, 10, 17),
        }
    }

    fn token(code: &str, issued_at: DateTime<Utc>, minutes: i64) -> MealToken {
        MealToken {
            code: code.to_string(),
            scope: TokenScope::Meal,
            subject: None,
            mess_id: Some(1),
            meal_type: MealType::Lunch,
            date: day(2026, 10, 17),
            issued_at,
            expires_at: issued_at + Duration::minutes(minutes),
            nonce: None,
            signature: None,
        }
    }

    #[tokio::test]
    async fn test_get_or_register_keeps_live_token() {
        let store = InMemoryMealTokenStore::default();
        let now = instant(2026, 10, 17, 12, 0);

        let first = store.get_or_register(slot(), token("a", now, 240), now).await;
        let second = store
            .get_or_register(slot(), token("b", now, 240), now + Duration::minutes(5))
            .await;

        assert_eq!(first.code, "a");
        assert_eq!(second.code, "a");
        assert!(store.find("b").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_slot_is_replaced_but_old_code_stays_readable() {
        let store = InMemoryMealTokenStore::default();
        let now = instant(2026, 10, 17, 12, 0);
        store.get_or_register(slot(), token("a", now, 10), now).await;

        let later = now + Duration::minutes(11);
        let fresh = store.get_or_register(slot(), token("b", later, 10), later).await;

        assert_eq!(fresh.code, "b");
        assert!(store.find("a").await.is_some());

        assert_eq!(store.purge_expired(later).await, 1);
        assert!(store.find("a").await.is_none());
        assert!(store.find("b").await.is_some());
    }

    #[tokio::test]
    async fn test_take_is_single_use_and_restore_puts_it_back() {
        let store = InMemoryMealTokenStore::default();
        let now = instant(2026, 10, 17, 12, 0);
        store.get_or_register(slot(), token("a", now, 60), now).await;

        let (taken_slot, taken) = store.take("a").await.unwrap();
        assert!(store.take("a").await.is_none());

        store.restore(taken_slot, taken).await;
        let again = store.get_or_register(slot(), token("b", now, 60), now).await;
        assert_eq!(again.code, "a");
    }
}
