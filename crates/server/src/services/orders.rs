//! Checkout and the operator status flow.
//!
//! Checkout prices the item server-side, stores the order under a fresh
//! public id and notifies the operator chat. Operators then move the order
//! along the status pipeline with inline buttons; each press is applied as a
//! compare-and-set on the status column and the notification is edited in
//! place.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use teloxide::types::{CallbackQuery, ChatId};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use poizon_core::{
    DeliveryType, OrderId, OrderStatus, PricingConfig, PricingError, PublicId, ShippingMethod,
    StatusAction, UserId, calculate_final_price, validate_raw_price,
};

use super::auth::Identity;
use super::rates::{ExchangeRateProvider, RateSource};
use crate::db::{OrderStore, RepositoryError};
use crate::models::{NewOrder, Order};
use crate::telegram::{Notifier, build_order_notification};

/// Attempts at drawing an unused public id before giving up.
pub const PUBLIC_ID_ATTEMPTS: u32 = 5;

/// Errors from checkout and price quotes.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Request failed validation; the message is shown to the customer.
    #[error("{0}")]
    Validation(String),

    /// Every generated public id collided with an existing order.
    #[error("could not allocate an unused public order id")]
    PublicIdExhausted,

    #[error("pricing error: {0}")]
    Pricing(PricingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PricingError> for CheckoutError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::NonPositivePrice => {
                Self::Validation("Цена должна быть больше нуля".to_string())
            }
            other => Self::Pricing(other),
        }
    }
}

/// Checkout payload from the Mini-App.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Listing price in CNY.
    pub raw_poizon_price: Decimal,
    /// `"air"` or anything else for standard shipping.
    #[serde(default)]
    pub shipping: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub category: String,
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub pickup_code: Option<String>,
    #[serde(default)]
    pub pickup_address: Option<String>,
}

impl CheckoutRequest {
    /// Validate and normalize into the insertable fields, minus the id,
    /// owner and price.
    fn validate(self) -> Result<ValidCheckout, CheckoutError> {
        let raw_price = validate_raw_price(self.raw_poizon_price)?;
        let link = required(self.link, "Ссылка на товар обязательна")?;
        let category = required(self.category, "Категория обязательна")?;
        let city = required(self.city, "Город обязателен")?;
        let full_name = required(self.full_name, "ФИО обязательно")?;
        let phone = required(self.phone, "Телефон обязателен")?;
        let street = optional(self.street);
        let pickup_code = optional(self.pickup_code);
        let pickup_address = optional(self.pickup_address);

        match self.delivery_type {
            DeliveryType::Pickup if pickup_code.is_none() => {
                return Err(CheckoutError::Validation(
                    "Выберите пункт выдачи".to_string(),
                ));
            }
            DeliveryType::Address if street.is_none() => {
                return Err(CheckoutError::Validation("Укажите улицу".to_string()));
            }
            _ => {}
        }

        Ok(ValidCheckout {
            raw_price,
            shipping: ShippingMethod::from_input(&self.shipping),
            link,
            category,
            delivery_type: self.delivery_type,
            city,
            street,
            full_name,
            phone,
            pickup_code,
            pickup_address,
        })
    }
}

struct ValidCheckout {
    raw_price: Decimal,
    shipping: ShippingMethod,
    link: String,
    category: String,
    delivery_type: DeliveryType,
    city: String,
    street: Option<String>,
    full_name: String,
    phone: String,
    pickup_code: Option<String>,
    pickup_address: Option<String>,
}

fn required(value: String, message: &str) -> Result<String, CheckoutError> {
    let value = value.trim();
    if value.is_empty() {
        Err(CheckoutError::Validation(message.to_string()))
    } else {
        Ok(value.to_string())
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub public_id: PublicId,
    pub price: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub status: OrderStatus,
}

/// A price computed with the current rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub price: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

/// Customer-facing status of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusView {
    pub id: OrderId,
    pub public_id: PublicId,
    pub status: OrderStatus,
    pub status_label: &'static str,
}

/// What happened to an operator button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Status persisted and the notification edited.
    Updated { order_id: OrderId, status: OrderStatus },
    /// The order id does not exist.
    NotFound,
    /// The pipeline forbids the move; nothing persisted.
    NotAllowed { from: OrderStatus, to: OrderStatus },
    /// Payload is not a status action.
    Invalid,
    /// The status changed between load and update.
    Stale,
    /// The button was not pressed in the operator chat.
    Forbidden,
}

/// Order placement, quotes and operator status changes.
pub struct OrderService<S, N, R> {
    store: S,
    notifier: N,
    rates: Arc<ExchangeRateProvider<R>>,
    pricing: PricingConfig,
    admin_chat_id: ChatId,
}

impl<S, N, R> OrderService<S, N, R>
where
    S: OrderStore,
    N: Notifier,
    R: RateSource,
{
    #[must_use]
    pub const fn new(
        store: S,
        notifier: N,
        rates: Arc<ExchangeRateProvider<R>>,
        pricing: PricingConfig,
        admin_chat_id: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            rates,
            pricing,
            admin_chat_id: ChatId(admin_chat_id),
        }
    }

    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Current marked-up CNY→RUB rate.
    pub async fn current_rate(&self) -> Decimal {
        self.rates.get_rate().await
    }

    /// Price an item with the current rate.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` if `raw_price <= 0`.
    pub async fn quote(&self, raw_price: Decimal, shipping: &str) -> Result<Quote, CheckoutError> {
        let raw_price = validate_raw_price(raw_price)?;
        let rate = self.current_rate().await;
        let price = calculate_final_price(
            raw_price,
            ShippingMethod::from_input(shipping),
            rate,
            &self.pricing,
        )?;
        Ok(Quote { price, rate })
    }

    /// Place an order and notify the operators.
    ///
    /// A failed notification is logged and does not fail the checkout.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for bad input,
    /// `CheckoutError::PublicIdExhausted` if no unused public id was found,
    /// or `CheckoutError::Repository` if the insert fails.
    #[instrument(skip(self, identity, request), fields(user_id = %identity.user_id))]
    pub async fn checkout(
        &self,
        identity: &Identity,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, CheckoutError> {
        let valid = request.validate()?;
        let rate = self.current_rate().await;
        let price = calculate_final_price(valid.raw_price, valid.shipping, rate, &self.pricing)?;

        let order = self.insert_with_fresh_public_id(identity, valid, price).await?;
        info!(order_id = %order.id, public_id = %order.public_id, price, "Order placed");

        let notification = build_order_notification(&order);
        if let Err(e) = self
            .notifier
            .send_order_notification(self.admin_chat_id, &notification)
            .await
        {
            error!(error = %e, order_id = %order.id, "Failed to notify operators about new order");
        }

        Ok(CheckoutResponse {
            order_id: order.id,
            public_id: order.public_id,
            price: order.price,
            rate,
            status: order.status,
        })
    }

    async fn insert_with_fresh_public_id(
        &self,
        identity: &Identity,
        valid: ValidCheckout,
        price: i64,
    ) -> Result<Order, CheckoutError> {
        let mut new_order = NewOrder {
            public_id: PublicId::generate(&mut rand::rng()),
            user_id: identity.user_id,
            username: identity.username.clone(),
            link: valid.link,
            category: valid.category,
            shipping: valid.shipping,
            price,
            raw_poizon_price: valid.raw_price,
            delivery_type: valid.delivery_type,
            city: valid.city,
            street: valid.street,
            full_name: valid.full_name,
            phone: valid.phone,
            pickup_code: valid.pickup_code,
            pickup_address: valid.pickup_address,
        };

        for attempt in 1..=PUBLIC_ID_ATTEMPTS {
            match self.store.insert_order(&new_order).await {
                Ok(order) => return Ok(order),
                Err(RepositoryError::Conflict(_)) => {
                    warn!(attempt, public_id = %new_order.public_id, "Public id collision");
                    new_order.public_id = PublicId::generate(&mut rand::rng());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CheckoutError::PublicIdExhausted)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        self.store.list_orders(user_id).await
    }

    /// Status of one of the user's orders. `None` if it does not exist or
    /// belongs to someone else.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn order_status(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<OrderStatusView>, RepositoryError> {
        let order = self.store.get_order(order_id).await?;
        Ok(order
            .filter(|order| order.user_id == user_id)
            .map(|order| OrderStatusView {
                id: order.id,
                public_id: order.public_id,
                status: order.status,
                status_label: order.status.label(),
            }))
    }

    /// Apply an operator's status button press.
    ///
    /// Every outcome answers the callback so the button stops spinning.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading or updating the order fails.
    #[instrument(skip(self, callback), fields(callback_id = %callback.id, operator = callback.from.id.0))]
    pub async fn apply_status_callback(
        &self,
        callback: &CallbackQuery,
    ) -> Result<CallbackOutcome, RepositoryError> {
        let (outcome, answer) = self.resolve_callback(callback).await?;
        if let Err(e) = self.notifier.answer_callback(&callback.id, &answer).await {
            warn!(error = %e, "Failed to answer callback query");
        }
        Ok(outcome)
    }

    async fn resolve_callback(
        &self,
        callback: &CallbackQuery,
    ) -> Result<(CallbackOutcome, String), RepositoryError> {
        // Inaccessible (too old) messages still carry their chat and id.
        let Some(message) = callback
            .message
            .as_ref()
            .filter(|message| message.chat().id == self.admin_chat_id)
        else {
            warn!("Status callback outside the operator chat");
            return Ok((CallbackOutcome::Forbidden, "Недоступно".to_string()));
        };

        let action = match callback.data.as_deref().map(StatusAction::parse) {
            Some(Ok(action)) => action,
            Some(Err(e)) => {
                warn!(error = %e, "Undecodable callback data");
                return Ok((CallbackOutcome::Invalid, "Неизвестное действие".to_string()));
            }
            None => return Ok((CallbackOutcome::Invalid, "Неизвестное действие".to_string())),
        };

        let Some(order) = self.store.get_order(action.order_id).await? else {
            return Ok((CallbackOutcome::NotFound, "Заказ не найден".to_string()));
        };

        let from = order.status;
        if let Err(e) = from.transition(action.status) {
            info!(order_id = %order.id, error = %e, "Rejected status transition");
            return Ok((
                CallbackOutcome::NotAllowed {
                    from,
                    to: action.status,
                },
                format!("Переход недоступен: {} → {}", from.label(), action.status.label()),
            ));
        }

        let Some(updated) = self
            .store
            .update_status(order.id, from, action.status)
            .await?
        else {
            return Ok((CallbackOutcome::Stale, "Статус уже изменён".to_string()));
        };
        info!(order_id = %updated.id, from = %from, to = %updated.status, "Order status updated");

        let notification = build_order_notification(&updated);
        if let Err(e) = self
            .notifier
            .edit_order_notification(message.chat().id, message.id(), &notification)
            .await
        {
            error!(error = %e, order_id = %updated.id, "Failed to edit order notification");
        }

        Ok((
            CallbackOutcome::Updated {
                order_id: updated.id,
                status: updated.status,
            },
            format!("Статус: {}", updated.status.label()),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::MemoryStore;
    use crate::services::rates::RateQuote;
    use crate::services::rates::fixed::FixedRateSource;
    use crate::telegram::recording::{NotifierCall, RecordingNotifier};

    const ADMIN_CHAT: i64 = -1_001;

    type TestService = OrderService<MemoryStore, RecordingNotifier, FixedRateSource>;

    fn service(store: MemoryStore, notifier: RecordingNotifier) -> TestService {
        let source = FixedRateSource::new(RateQuote {
            value: Decimal::from(13),
            nominal: Decimal::ONE,
        });
        let rates = ExchangeRateProvider::new(source, Duration::from_secs(3600), Decimal::from(14));
        OrderService::new(
            store,
            notifier,
            Arc::new(rates),
            PricingConfig::default(),
            ADMIN_CHAT,
        )
    }

    fn identity() -> Identity {
        Identity {
            user_id: UserId::new(42),
            username: Some("buyer".to_string()),
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            raw_poizon_price: Decimal::from(100),
            shipping: "air".to_string(),
            link: "https://dw4.co/t/A/1".to_string(),
            category: "Обувь".to_string(),
            delivery_type: DeliveryType::Pickup,
            city: "Москва".to_string(),
            street: None,
            full_name: "Иван Петров".to_string(),
            phone: "+79990001122".to_string(),
            pickup_code: Some("MSK1".to_string()),
            pickup_address: Some("ул. Ленина, 1".to_string()),
        }
    }

    fn callback(data: &str, chat_id: i64) -> CallbackQuery {
        serde_json::from_value(serde_json::json!({
            "id": "cb",
            "from": {"id": 7, "is_bot": false, "first_name": "Оператор"},
            "message": {
                "message_id": 99,
                "date": 1_700_000_000,
                "chat": {"id": chat_id, "type": "group", "title": "Заказы"},
                "text": "Заказ",
            },
            "chat_instance": "1",
            "data": data,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_prices_stores_and_notifies() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::new();
        let orders = service(store.clone(), notifier.clone());

        let placed = orders.checkout(&identity(), request()).await.unwrap();

        // 100 × 14 + 590 + 800
        assert_eq!(placed.price, 2790);
        assert_eq!(placed.rate, Decimal::from(14));
        assert_eq!(placed.status, OrderStatus::Pending);

        let stored = store.get_order(placed.order_id).await.unwrap().unwrap();
        assert_eq!(stored.public_id, placed.public_id);
        assert_eq!(stored.username.as_deref(), Some("buyer"));
        assert_eq!(stored.shipping, ShippingMethod::Air);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains(placed.public_id.as_str()));
    }

    #[tokio::test]
    async fn test_checkout_validation() {
        let orders = service(MemoryStore::new(), RecordingNotifier::new());

        let mut zero = request();
        zero.raw_poizon_price = Decimal::ZERO;
        assert!(matches!(
            orders.checkout(&identity(), zero).await,
            Err(CheckoutError::Validation(_))
        ));

        let mut no_link = request();
        no_link.link = "  ".to_string();
        assert!(matches!(
            orders.checkout(&identity(), no_link).await,
            Err(CheckoutError::Validation(_))
        ));

        let mut no_pickup = request();
        no_pickup.pickup_code = None;
        assert!(matches!(
            orders.checkout(&identity(), no_pickup).await,
            Err(CheckoutError::Validation(_))
        ));

        let mut no_street = request();
        no_street.delivery_type = DeliveryType::Address;
        assert!(matches!(
            orders.checkout(&identity(), no_street).await,
            Err(CheckoutError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_checkout_retries_public_id_collisions() {
        let store = MemoryStore::new();
        let orders = service(store.clone(), RecordingNotifier::new());

        store.force_public_id_conflicts(PUBLIC_ID_ATTEMPTS - 1);
        assert!(orders.checkout(&identity(), request()).await.is_ok());

        store.force_public_id_conflicts(PUBLIC_ID_ATTEMPTS);
        assert!(matches!(
            orders.checkout(&identity(), request()).await,
            Err(CheckoutError::PublicIdExhausted)
        ));
        assert_eq!(store.order_count(), 1);
    }

    #[tokio::test]
    async fn test_checkout_survives_notification_failure() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::new();
        notifier.fail_sends();
        let orders = service(store.clone(), notifier);

        assert!(orders.checkout(&identity(), request()).await.is_ok());
        assert_eq!(store.order_count(), 1);
    }

    #[tokio::test]
    async fn test_status_callback_updates_and_edits() {
        let notifier = RecordingNotifier::new();
        let orders = service(MemoryStore::new(), notifier.clone());
        let placed = orders.checkout(&identity(), request()).await.unwrap();

        let data = StatusAction::new(OrderStatus::Paid, placed.order_id).encode();
        let outcome = orders
            .apply_status_callback(&callback(&data, ADMIN_CHAT))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CallbackOutcome::Updated {
                order_id: placed.order_id,
                status: OrderStatus::Paid
            }
        );
        let edits = notifier.edits();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].text.contains("Оплачен"));
        assert_eq!(notifier.answers(), vec!["Статус: Оплачен".to_string()]);
        assert!(notifier.calls().iter().any(|call| matches!(
            call,
            NotifierCall::Edit { chat_id, message_id, .. }
                if *chat_id == ChatId(ADMIN_CHAT) && message_id.0 == 99
        )));
    }

    #[tokio::test]
    async fn test_status_callback_changes_nothing_but_status() {
        let store = MemoryStore::new();
        let orders = service(store.clone(), RecordingNotifier::new());
        let placed = orders.checkout(&identity(), request()).await.unwrap();
        let before = store.get_order(placed.order_id).await.unwrap().unwrap();

        let data = StatusAction::new(OrderStatus::AtWarehouse, placed.order_id).encode();
        orders
            .apply_status_callback(&callback(&data, ADMIN_CHAT))
            .await
            .unwrap();

        let after = store.get_order(placed.order_id).await.unwrap().unwrap();
        assert_eq!(after.status, OrderStatus::AtWarehouse);
        assert_eq!(
            Order {
                status: before.status,
                ..after
            },
            before
        );
    }

    #[tokio::test]
    async fn test_status_callback_rejects_backward_move() {
        let notifier = RecordingNotifier::new();
        let orders = service(MemoryStore::new(), notifier.clone());
        let placed = orders.checkout(&identity(), request()).await.unwrap();

        let paid = StatusAction::new(OrderStatus::Paid, placed.order_id).encode();
        orders
            .apply_status_callback(&callback(&paid, ADMIN_CHAT))
            .await
            .unwrap();

        let back = StatusAction::new(OrderStatus::Pending, placed.order_id).encode();
        let outcome = orders
            .apply_status_callback(&callback(&back, ADMIN_CHAT))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CallbackOutcome::NotAllowed {
                from: OrderStatus::Paid,
                to: OrderStatus::Pending
            }
        );
        let status = orders
            .order_status(UserId::new(42), placed.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, OrderStatus::Paid);
        assert_eq!(notifier.edits().len(), 1);
    }

    #[tokio::test]
    async fn test_status_callback_edge_cases() {
        let orders = service(MemoryStore::new(), RecordingNotifier::new());
        let placed = orders.checkout(&identity(), request()).await.unwrap();
        let paid = StatusAction::new(OrderStatus::Paid, placed.order_id).encode();

        assert_eq!(
            orders
                .apply_status_callback(&callback(&paid, 555))
                .await
                .unwrap(),
            CallbackOutcome::Forbidden
        );
        assert_eq!(
            orders
                .apply_status_callback(&callback("status:paid:9999", ADMIN_CHAT))
                .await
                .unwrap(),
            CallbackOutcome::NotFound
        );
        assert_eq!(
            orders
                .apply_status_callback(&callback("status:teleported:1", ADMIN_CHAT))
                .await
                .unwrap(),
            CallbackOutcome::Invalid
        );
        assert_eq!(
            orders
                .apply_status_callback(&callback("status_paid_abc", ADMIN_CHAT))
                .await
                .unwrap(),
            CallbackOutcome::Invalid
        );
    }

    #[tokio::test]
    async fn test_order_status_is_owner_scoped() {
        let orders = service(MemoryStore::new(), RecordingNotifier::new());
        let placed = orders.checkout(&identity(), request()).await.unwrap();

        let own = orders
            .order_status(UserId::new(42), placed.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(own.status_label, "Ожидает обработки");

        assert!(
            orders
                .order_status(UserId::new(43), placed.order_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_quote() {
        let orders = service(MemoryStore::new(), RecordingNotifier::new());
        let quote = orders.quote(Decimal::from(100), "standard").await.unwrap();
        assert_eq!(quote, Quote { price: 2390, rate: Decimal::from(14) });
        assert!(matches!(
            orders.quote(Decimal::from(-5), "air").await,
            Err(CheckoutError::Validation(_))
        ));
    }
}
