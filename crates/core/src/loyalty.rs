//! Loyalty tiers and achievements derived from order history.

use serde::{Deserialize, Serialize};

/// Spend threshold (rubles) for the big-spender achievement.
pub const BIG_SPENDER_THRESHOLD: i64 = 30_000;

/// Customer loyalty tier, derived from the number of orders placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
}

impl LoyaltyTier {
    /// Classify by order count: Bronze below 5, Silver 5–9, Gold from 10.
    #[must_use]
    pub const fn from_order_count(orders: u32) -> Self {
        match orders {
            0..=4 => Self::Bronze,
            5..=9 => Self::Silver,
            _ => Self::Gold,
        }
    }

    /// Orders required to enter this tier.
    #[must_use]
    pub const fn min_orders(self) -> u32 {
        match self {
            Self::Bronze => 0,
            Self::Silver => 5,
            Self::Gold => 10,
        }
    }

    #[must_use]
    pub const fn cashback_percent(self) -> u8 {
        match self {
            Self::Bronze => 1,
            Self::Silver => 3,
            Self::Gold => 5,
        }
    }

    #[must_use]
    pub const fn perks(self) -> &'static [&'static str] {
        match self {
            Self::Bronze => &["Кэшбэк 1% баллами"],
            Self::Silver => &["Кэшбэк 3% баллами", "Приоритетная проверка заказа"],
            Self::Gold => &[
                "Кэшбэк 5% баллами",
                "Приоритетная проверка заказа",
                "Персональный менеджер",
                "Бесплатная упаковка",
            ],
        }
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Bronze => Some(Self::Silver),
            Self::Silver => Some(Self::Gold),
            Self::Gold => None,
        }
    }
}

/// Progress from the current tier to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierProgress {
    pub next_tier: Option<LoyaltyTier>,
    pub orders_to_next: u32,
    /// 0–100; 100 once the top tier is reached.
    pub progress_percent: u8,
}

impl TierProgress {
    #[must_use]
    pub fn for_order_count(orders: u32) -> Self {
        let tier = LoyaltyTier::from_order_count(orders);
        let Some(next) = tier.next() else {
            return Self {
                next_tier: None,
                orders_to_next: 0,
                progress_percent: 100,
            };
        };

        let span = next.min_orders().saturating_sub(tier.min_orders());
        let done = orders.saturating_sub(tier.min_orders());
        let percent = if span == 0 {
            100
        } else {
            (done.saturating_mul(100) / span).min(100)
        };

        Self {
            next_tier: Some(next),
            orders_to_next: next.min_orders().saturating_sub(orders),
            progress_percent: u8::try_from(percent).unwrap_or(100),
        }
    }
}

/// Fixed set of profile achievements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievements {
    pub first_purchase: bool,
    pub five_orders: bool,
    pub big_spender: bool,
}

impl Achievements {
    #[must_use]
    pub const fn evaluate(orders: u32, total_spent: i64) -> Self {
        Self {
            first_purchase: orders >= 1,
            five_orders: orders >= 5,
            big_spender: total_spent >= BIG_SPENDER_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(LoyaltyTier::from_order_count(0), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::from_order_count(4), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::from_order_count(5), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_order_count(9), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_order_count(10), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_order_count(250), LoyaltyTier::Gold);
    }

    #[test]
    fn test_progress_with_no_orders() {
        let progress = TierProgress::for_order_count(0);
        assert_eq!(progress.next_tier, Some(LoyaltyTier::Silver));
        assert_eq!(progress.orders_to_next, 5);
        assert_eq!(progress.progress_percent, 0);
    }

    #[test]
    fn test_progress_mid_tier() {
        let progress = TierProgress::for_order_count(7);
        assert_eq!(progress.next_tier, Some(LoyaltyTier::Gold));
        assert_eq!(progress.orders_to_next, 3);
        assert_eq!(progress.progress_percent, 40);
    }

    #[test]
    fn test_progress_at_top_tier() {
        let progress = TierProgress::for_order_count(12);
        assert_eq!(progress.next_tier, None);
        assert_eq!(progress.orders_to_next, 0);
        assert_eq!(progress.progress_percent, 100);
    }

    #[test]
    fn test_achievements() {
        assert_eq!(Achievements::evaluate(0, 0), Achievements::default());

        let some = Achievements::evaluate(1, 29_999);
        assert!(some.first_purchase);
        assert!(!some.five_orders);
        assert!(!some.big_spender);

        let all = Achievements::evaluate(5, 30_000);
        assert!(all.first_purchase && all.five_orders && all.big_spender);
    }
}
