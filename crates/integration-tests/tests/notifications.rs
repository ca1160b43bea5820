//! Operator notifications produced by the order service.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use teloxide::types::{CallbackQuery, InlineKeyboardButtonKind};

use poizon_core::{OrderStatus, PricingConfig, StatusAction, UserId};
use poizon_server::db::MemoryStore;
use poizon_server::services::auth::Identity;
use poizon_server::services::rates::fixed::FixedRateSource;
use poizon_server::services::{
    CallbackOutcome, CheckoutRequest, ExchangeRateProvider, OrderService, RateQuote,
};
use poizon_server::telegram::recording::RecordingNotifier;
use poizon_integration_tests::{ADMIN_CHAT_ID, callback_update, pickup_checkout};

type Service = OrderService<MemoryStore, RecordingNotifier, FixedRateSource>;

fn service(notifier: RecordingNotifier) -> Service {
    let source = FixedRateSource::new(RateQuote {
        value: Decimal::from(13),
        nominal: Decimal::ONE,
    });
    let rates = ExchangeRateProvider::new(source, Duration::from_secs(3600), Decimal::from(14));
    OrderService::new(
        MemoryStore::new(),
        notifier,
        Arc::new(rates),
        PricingConfig::default(),
        ADMIN_CHAT_ID,
    )
}

fn buyer() -> Identity {
    Identity {
        user_id: UserId::new(42),
        username: Some("buyer".to_string()),
    }
}

fn request() -> CheckoutRequest {
    serde_json::from_value(pickup_checkout()).unwrap()
}

fn press(data: &str) -> CallbackQuery {
    let update = callback_update(ADMIN_CHAT_ID, data);
    serde_json::from_value(update["callback_query"].clone()).unwrap()
}

#[tokio::test]
async fn test_new_order_notifies_operator_with_buttons() {
    let notifier = RecordingNotifier::new();
    let orders = service(notifier.clone());

    let placed = orders.checkout(&buyer(), request()).await.unwrap();

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    let message = sent.first().unwrap();
    assert!(message.markdown);
    assert!(message.text.contains(placed.public_id.as_str()));
    assert!(message.text.contains("@buyer"));

    let keyboard = message.reply_markup.as_ref().unwrap();
    let callbacks: Vec<&str> = keyboard
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|button| match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.as_str()),
            _ => None,
        })
        .collect();
    let first = StatusAction::new(OrderStatus::AwaitingPayment, placed.order_id).encode();
    assert_eq!(callbacks.first().copied(), Some(first.as_str()));
    assert!(callbacks.iter().all(|data| StatusAction::parse(data).is_ok()));
}

#[tokio::test]
async fn test_status_press_edits_notification() {
    let notifier = RecordingNotifier::new();
    let orders = service(notifier.clone());
    let placed = orders.checkout(&buyer(), request()).await.unwrap();

    let action = StatusAction::new(OrderStatus::Rejected, placed.order_id).encode();
    let outcome = orders.apply_status_callback(&press(&action)).await.unwrap();
    assert_eq!(
        outcome,
        CallbackOutcome::Updated {
            order_id: placed.order_id,
            status: OrderStatus::Rejected,
        }
    );

    let edits = notifier.edits();
    assert_eq!(edits.len(), 1);
    // Rejected is terminal, so the buttons are removed.
    let keyboard = edits.first().unwrap().reply_markup.as_ref().unwrap();
    assert!(keyboard.inline_keyboard.is_empty());
    assert_eq!(notifier.answers().len(), 1);
}

#[tokio::test]
async fn test_order_survives_notification_failure() {
    let notifier = RecordingNotifier::new();
    notifier.fail_sends();
    let orders = service(notifier);

    let placed = orders.checkout(&buyer(), request()).await.unwrap();
    let listed = orders.list_orders(UserId::new(42)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed.first().unwrap().id, placed.order_id);
}
