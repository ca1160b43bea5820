//! Profile aggregation: loyalty, achievements and history in one view.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use poizon_core::{
    Achievements, LoyaltyTier, OrderId, OrderStatus, PublicId, TierProgress, UserId,
};

use super::auth::Identity;
use crate::db::{AddressStore, OrderStore, RepositoryError, UserStore};
use crate::models::{Address, NewUser, Order, User};

/// Everything the profile screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub days_since_registration: i64,
    pub order_count: u32,
    /// Whole rubles across all orders that were not rejected.
    pub total_spent: i64,
    pub loyalty: Loyalty,
    pub achievements: Achievements,
    pub last_order: Option<LastOrder>,
    pub address: Option<Address>,
    pub referral_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loyalty {
    pub tier: LoyaltyTier,
    pub cashback_percent: u8,
    pub perks: &'static [&'static str],
    #[serde(flatten)]
    pub progress: TierProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOrder {
    pub id: OrderId,
    pub public_id: PublicId,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

/// Aggregate a profile from already-loaded records.
///
/// `orders` must be newest first; the first one becomes `last_order`.
#[must_use]
pub fn build_profile(
    user: &User,
    orders: &[Order],
    address: Option<Address>,
    now: DateTime<Utc>,
    bot_username: Option<&str>,
) -> Profile {
    let (order_count, total_spent) = orders.iter().fold((0_u32, 0_i64), |(count, spent), order| {
        let spent = if order.status == OrderStatus::Rejected {
            spent
        } else {
            spent.saturating_add(order.price)
        };
        (count.saturating_add(1), spent)
    });

    let tier = LoyaltyTier::from_order_count(order_count);
    let last_order = orders.first().map(|order| LastOrder {
        id: order.id,
        public_id: order.public_id.clone(),
        status: order.status,
        status_label: order.status.label(),
        price: order.price,
        created_at: order.created_at,
    });

    Profile {
        user_id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        registered_at: user.created_at,
        days_since_registration: (now - user.created_at).num_days().max(0),
        order_count,
        total_spent,
        loyalty: Loyalty {
            tier,
            cashback_percent: tier.cashback_percent(),
            perks: tier.perks(),
            progress: TierProgress::for_order_count(order_count),
        },
        achievements: Achievements::evaluate(order_count, total_spent),
        last_order,
        address,
        referral_link: bot_username
            .map(|bot| bot.trim_start_matches('@'))
            .filter(|bot| !bot.is_empty())
            .map(|bot| format!("https://t.me/{bot}?startapp=ref_{}", user.id)),
    }
}

/// Loads the records behind a profile.
#[derive(Clone)]
pub struct ProfileService<S> {
    store: S,
    bot_username: Option<String>,
}

impl<S> ProfileService<S>
where
    S: UserStore + OrderStore + AddressStore,
{
    #[must_use]
    pub const fn new(store: S, bot_username: Option<String>) -> Self {
        Self {
            store,
            bot_username,
        }
    }

    /// Build the caller's profile.
    ///
    /// The user row is upserted first so a token issued before the row
    /// existed still yields a profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if any query fails.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn profile(&self, identity: &Identity) -> Result<Profile, RepositoryError> {
        let user = match self.store.get_user(identity.user_id).await? {
            Some(user) => user,
            None => {
                self.store
                    .upsert_user(&NewUser {
                        id: identity.user_id,
                        username: identity.username.clone(),
                        first_name: None,
                    })
                    .await?
            }
        };
        let orders = self.store.list_orders(identity.user_id).await?;
        let address = self.store.get_address(identity.user_id).await?;

        Ok(build_profile(
            &user,
            &orders,
            address,
            Utc::now(),
            self.bot_username.as_deref(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;

    use poizon_core::{DeliveryType, ShippingMethod};

    use super::*;
    use crate::db::MemoryStore;

    fn user(created_at: DateTime<Utc>) -> User {
        User {
            id: UserId::new(42),
            username: Some("buyer".to_string()),
            first_name: None,
            created_at,
        }
    }

    fn order(id: i64, price: i64, status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(id),
            public_id: PublicId::parse("ABCDEF1").unwrap(),
            user_id: UserId::new(42),
            username: None,
            link: "https://dw4.co/t/A/1".to_string(),
            category: "Обувь".to_string(),
            shipping: ShippingMethod::Standard,
            price,
            raw_poizon_price: Decimal::from(100),
            status,
            delivery_type: DeliveryType::Pickup,
            city: "Москва".to_string(),
            street: None,
            full_name: "Иван".to_string(),
            phone: "+7".to_string(),
            pickup_code: Some("MSK1".to_string()),
            pickup_address: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_zero_orders() {
        let now = Utc::now();
        let profile = build_profile(&user(now), &[], None, now, None);

        assert_eq!(profile.order_count, 0);
        assert_eq!(profile.total_spent, 0);
        assert_eq!(profile.days_since_registration, 0);
        assert_eq!(profile.loyalty.tier, LoyaltyTier::Bronze);
        assert_eq!(profile.loyalty.progress.orders_to_next, 5);
        assert_eq!(profile.loyalty.progress.progress_percent, 0);
        assert_eq!(profile.achievements, Achievements::default());
        assert!(profile.last_order.is_none());
        assert!(profile.address.is_none());
        assert!(profile.referral_link.is_none());
    }

    #[test]
    fn test_rejected_orders_count_but_do_not_spend() {
        let now = Utc::now();
        let orders = vec![
            order(3, 20_000, OrderStatus::Rejected),
            order(2, 12_000, OrderStatus::Completed),
            order(1, 19_000, OrderStatus::Paid),
        ];
        let profile = build_profile(
            &user(now - Duration::days(10)),
            &orders,
            None,
            now,
            Some("@poizon_bot"),
        );

        assert_eq!(profile.order_count, 3);
        assert_eq!(profile.total_spent, 31_000);
        assert_eq!(profile.days_since_registration, 10);
        assert!(profile.achievements.first_purchase);
        assert!(!profile.achievements.five_orders);
        assert!(profile.achievements.big_spender);
        assert_eq!(profile.last_order.as_ref().unwrap().id, OrderId::new(3));
        assert_eq!(
            profile.referral_link.as_deref(),
            Some("https://t.me/poizon_bot?startapp=ref_42")
        );
    }

    #[test]
    fn test_gold_tier_has_no_next() {
        let now = Utc::now();
        let orders: Vec<Order> = (1..=12)
            .map(|id| order(id, 1_000, OrderStatus::Completed))
            .collect();
        let profile = build_profile(&user(now), &orders, None, now, None);

        assert_eq!(profile.loyalty.tier, LoyaltyTier::Gold);
        assert_eq!(profile.loyalty.cashback_percent, 5);
        assert!(profile.loyalty.progress.next_tier.is_none());
        assert_eq!(profile.loyalty.progress.progress_percent, 100);
    }

    #[tokio::test]
    async fn test_profile_creates_missing_user() {
        let store = MemoryStore::new();
        let service = ProfileService::new(store.clone(), Some("poizon_bot".to_string()));
        let identity = Identity {
            user_id: UserId::new(42),
            username: Some("buyer".to_string()),
        };

        let profile = service.profile(&identity).await.unwrap();
        assert_eq!(profile.username.as_deref(), Some("buyer"));
        assert!(store.get_user(UserId::new(42)).await.unwrap().is_some());
    }
}
