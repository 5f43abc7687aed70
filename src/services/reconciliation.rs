// Remise à niveau du status stocké des abonnements.
// N'intervient jamais dans la décision d'accès : c'est un cache pour l'affichage.

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::models::subscription::{self, SubscriptionStatus};
use crate::services::token_store::MealTokenStore;

/// Passe à "expired" les abonnements active/pending terminés avant `today`
pub async fn reconcile_statuses(db: &DatabaseConnection, today: NaiveDate) -> Result<u64, DbErr> {
    let result = subscription::Entity::update_many()
        .col_expr(
            subscription::Column::Status,
            Expr::value(SubscriptionStatus::Expired),
        )
        .filter(subscription::Column::EndDate.lt(today))
        .filter(
            subscription::Column::Status
                .is_in([SubscriptionStatus::Active, SubscriptionStatus::Pending]),
        )
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!(rows = result.rows_affected, %today, "Subscriptions marked expired");
    }
    Ok(result.rows_affected)
}

/// Tâche de fond : statuts des abonnements + purge des meal QR expirés
pub fn spawn_reconciler(
    db: DatabaseConnection,
    tokens: Arc<dyn MealTokenStore>,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;

            let now = clock.now();
            let today = now.with_timezone(&utc_offset).date_naive();

            if let Err(err) = reconcile_statuses(&db, today).await {
                warn!(error = %err, "Subscription reconciliation failed");
            }

            let purged = tokens.purge_expired(now).await;
            if purged > 0 {
                info!(purged, "Expired meal tokens purged");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::meal_token::{MealToken, TokenScope};
    use crate::models::meal_type::MealType;
    use crate::services::token_store::{InMemoryMealTokenStore, SlotKey};
    use crate::test_support::{
        ManualClock, day, instant, memory_db, mess_model, seed_mess, seed_subscription,
        subscription_model,
    };

    #[tokio::test]
    async fn test_only_lapsed_active_or_pending_expire() {
        let db = memory_db().await;
        seed_mess(&db, mess_model(1)).await;

        // Terminé hier
        seed_subscription(&db, subscription_model(1, day(2026, 9, 1), day(2026, 10, 16))).await;
        // Termine aujourd'hui (borne incluse)
        seed_subscription(&db, subscription_model(2, day(2026, 9, 1), day(2026, 10, 17))).await;
        let mut pending = subscription_model(3, day(2026, 9, 1), day(2026, 9, 30));
        pending.status = SubscriptionStatus::Pending;
        seed_subscription(&db, pending).await;
        let mut cancelled = subscription_model(4, day(2026, 9, 1), day(2026, 9, 30));
        cancelled.status = SubscriptionStatus::Cancelled;
        seed_subscription(&db, cancelled).await;

        assert_eq!(reconcile_statuses(&db, day(2026, 10, 17)).await.unwrap(), 2);
        assert_eq!(reconcile_statuses(&db, day(2026, 10, 17)).await.unwrap(), 0);

        let statuses: Vec<_> = subscription::Entity::find()
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|s| (s.id, s.status))
            .collect();
        assert!(statuses.contains(&(1, SubscriptionStatus::Expired)));
        assert!(statuses.contains(&(2, SubscriptionStatus::Active)));
        assert!(statuses.contains(&(3, SubscriptionStatus::Expired)));
        assert!(statuses.contains(&(4, SubscriptionStatus::Cancelled)));
    }

    #[tokio::test]
    async fn test_background_task_purges_tokens() {
        let db = memory_db().await;
        let now = instant(2026, 10, 17, 23, 0);
        let store: Arc<dyn MealTokenStore> = Arc::new(InMemoryMealTokenStore::default());
        let slot = SlotKey {
            mess_id: 1,
            meal_type: MealType::Dinner,
            date: day(2026, 10, 17),
        };
        let stale = MealToken {
            code: "stale".to_string(),
            scope: TokenScope::Meal,
            subject: None,
            mess_id: Some(1),
            meal_type: MealType::Dinner,
            date: day(2026, 10, 17),
            issued_at: now - chrono::Duration::hours(5),
            expires_at: now - chrono::Duration::hours(1),
            nonce: None,
            signature: None,
        };
        store.restore(slot, stale).await;

        let handle = spawn_reconciler(
            db,
            store.clone(),
            ManualClock::at(now),
            FixedOffset::east_opt(0).unwrap(),
            Duration::from_secs(3600),
        );

        // Le premier tick est immédiat
        for _ in 0..50 {
            if store.find("stale").await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(store.find("stale").await.is_none());
    }
}
