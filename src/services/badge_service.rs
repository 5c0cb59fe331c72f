use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::coin_service::CoinLedger;
use crate::database::models::{Badge, OwnerRef, RedeemedBadge};
use crate::database::{SharedStore, StoreError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub badge: Badge,
    pub coins_spent: i64,
    pub new_balance: i64,
}

#[derive(Clone)]
pub struct BadgeService {
    store: SharedStore,
    ledger: CoinLedger,
}

impl BadgeService {
    pub fn new(store: SharedStore, ledger: CoinLedger) -> Self {
        Self { store, ledger }
    }

    pub async fn catalog(&self) -> Result<Vec<Badge>, StoreError> {
        self.store.active_badges().await
    }

    pub async fn owned(&self, owner: &OwnerRef) -> Result<Vec<RedeemedBadge>, StoreError> {
        self.store.redeemed_badges(owner).await
    }

    /// Buy a badge: the spend and the redemption fact are written together.
    pub async fn redeem(
        &self,
        owner: &OwnerRef,
        badge_id: Uuid,
        performed_by: Uuid,
    ) -> Result<Redemption, StoreError> {
        let badge = self
            .store
            .find_active_badge(badge_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("badge {}", badge_id)))?;

        let receipt = self
            .ledger
            .spend(
                owner,
                badge.coin_cost,
                format!("Redeemed: {}", badge.title),
                Some(performed_by),
                Some(badge.id),
            )
            .await?;
        info!("{} redeemed badge '{}'", owner, badge.title);

        Ok(Redemption {
            coins_spent: receipt.entry.amount,
            new_balance: receipt.balance,
            badge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Category;
    use crate::services::catalog::seed_if_empty;
    use crate::testing::TestContext;
    use chrono::Duration;

    async fn earn_days(ctx: &TestContext, owner: &OwnerRef, days: i64) {
        for _ in 0..days {
            ctx.services
                .ledger
                .award_daily_category_bonus(owner, Category::Hydration, owner.parent_id())
                .await
                .unwrap();
            ctx.clock.advance(Duration::days(1));
        }
    }

    #[tokio::test]
    async fn redeem_spends_and_records_ownership_once() {
        let ctx = TestContext::new();
        seed_if_empty(&ctx.store).await.unwrap();
        let parent = ctx.create_parent("Chidi").await;
        let owner = OwnerRef::parent(parent.id);
        earn_days(&ctx, &owner, 6).await;

        let cheapest = ctx.services.badges.catalog().await.unwrap()[0].clone();
        assert_eq!(cheapest.coin_cost, 50);

        let redemption = ctx
            .services
            .badges
            .redeem(&owner, cheapest.id, parent.id)
            .await
            .unwrap();
        assert_eq!(redemption.coins_spent, 50);
        assert_eq!(redemption.new_balance, 10);

        let again = ctx.services.badges.redeem(&owner, cheapest.id, parent.id).await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));
        assert_eq!(ctx.balance(&owner).await, 10);

        let owned = ctx.services.badges.owned(&owner).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].badge.id, cheapest.id);
    }

    #[tokio::test]
    async fn short_balance_changes_nothing() {
        let ctx = TestContext::new();
        seed_if_empty(&ctx.store).await.unwrap();
        let parent = ctx.create_parent("Chidi").await;
        let owner = OwnerRef::parent(parent.id);
        earn_days(&ctx, &owner, 2).await;

        let badge = ctx.services.badges.catalog().await.unwrap()[0].clone();
        let err = ctx
            .services
            .badges
            .redeem(&owner, badge.id, parent.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientBalance { balance: 20, requested: 50 }
        ));
        assert_eq!(ctx.balance(&owner).await, 20);
        assert!(ctx.services.badges.owned(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_badge_is_not_found() {
        let ctx = TestContext::new();
        let parent = ctx.create_parent("Chidi").await;
        let err = ctx
            .services
            .badges
            .redeem(&OwnerRef::parent(parent.id), Uuid::new_v4(), parent.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redeems_buy_the_badge_once() {
        let ctx = TestContext::new();
        seed_if_empty(&ctx.store).await.unwrap();
        let parent = ctx.create_parent("Chidi").await;
        let owner = OwnerRef::parent(parent.id);
        earn_days(&ctx, &owner, 6).await;
        let badge_id = ctx.services.badges.catalog().await.unwrap()[0].id;
        let parent_id = parent.id;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let badges = ctx.services.badges.clone();
                let owner = owner.clone();
                tokio::spawn(async move { badges.redeem(&owner, badge_id, parent_id).await })
            })
            .collect();
        let mut redeemed = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(redemption) => redeemed.push(redemption),
                Err(StoreError::Conflict(_)) | Err(StoreError::InsufficientBalance { .. }) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(redeemed.len(), 1);
        assert_eq!(redeemed[0].new_balance, 10);
        assert_eq!(ctx.balance(&owner).await, 10);
        assert_eq!(ctx.services.badges.owned(&owner).await.unwrap().len(), 1);
    }
}
