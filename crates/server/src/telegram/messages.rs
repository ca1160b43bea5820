//! Bot message builders.
//!
//! Provides factory functions for:
//! - The operator notification for a new order, with status buttons
//! - The reply to `/start`
//!
//! All user-supplied text is escaped for `MarkdownV2`.

use poizon_core::{DeliveryType, OrderStatus, StatusAction};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use url::Url;

use crate::models::Order;

/// Message text plus optional keyboard, sent or edited by the client.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub text: String,
    /// Whether `text` is `MarkdownV2`.
    pub markdown: bool,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// Status buttons per keyboard row.
const BUTTONS_PER_ROW: usize = 2;

/// Characters with special meaning in `MarkdownV2`.
const MARKDOWN_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!',
];

/// Escape text for use in a `MarkdownV2` message.
#[must_use]
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Format whole rubles with grouped thousands: `12 345 ₽`.
fn format_rubles(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    if amount < 0 {
        grouped.insert(0, '-');
    }
    format!("{grouped} ₽")
}

/// Operator notification for an order.
///
/// Used both when the order is placed and when its status changes, so the
/// edited message always shows the current status and its next actions.
#[must_use]
pub fn build_order_notification(order: &Order) -> OutgoingMessage {
    let customer = order.username.as_deref().map_or_else(
        || format!("id {}", order.user_id),
        |username| format!("@{username}"),
    );

    let mut lines = vec![
        format!("🛍 *Заказ* `{}`", escape_markdown(order.public_id.as_str())),
        String::new(),
        format!("*Статус:* {}", escape_markdown(order.status.label())),
        format!("*Клиент:* {}", escape_markdown(&customer)),
        format!("*Товар:* {}", escape_markdown(&order.link)),
        format!("*Категория:* {}", escape_markdown(&order.category)),
        format!("*Доставка из Китая:* {}", escape_markdown(order.shipping.label())),
        format!(
            "*Цена Poizon:* {}",
            escape_markdown(&format!("{} ¥", order.raw_poizon_price.normalize()))
        ),
        format!("*Итого:* {}", escape_markdown(&format_rubles(order.price))),
        String::new(),
        format!("*Получение:* {}", escape_markdown(order.delivery_type.label())),
        format!("*Город:* {}", escape_markdown(&order.city)),
    ];

    match order.delivery_type {
        DeliveryType::Pickup => {
            let point = [order.pickup_code.as_deref(), order.pickup_address.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("*ПВЗ:* {}", escape_markdown(&point)));
        }
        DeliveryType::Address => {
            lines.push(format!(
                "*Адрес:* {}",
                escape_markdown(order.street.as_deref().unwrap_or_default())
            ));
        }
    }

    lines.push(format!("*ФИО:* {}", escape_markdown(&order.full_name)));
    lines.push(format!("*Телефон:* {}", escape_markdown(&order.phone)));

    OutgoingMessage {
        text: lines.join("\n"),
        markdown: true,
        // An empty keyboard removes the buttons when the message is edited.
        reply_markup: Some(status_keyboard(order).unwrap_or_default()),
    }
}

/// Buttons for every status reachable from the order's current one.
///
/// `None` once the order is terminal.
#[must_use]
pub fn status_keyboard(order: &Order) -> Option<InlineKeyboardMarkup> {
    let next: Vec<OrderStatus> = order.status.allowed_next();
    if next.is_empty() {
        return None;
    }

    let buttons: Vec<InlineKeyboardButton> = next
        .into_iter()
        .map(|status| {
            InlineKeyboardButton::callback(
                status.label(),
                StatusAction::new(status, order.id).encode(),
            )
        })
        .collect();

    Some(InlineKeyboardMarkup::new(
        buttons
            .chunks(BUTTONS_PER_ROW)
            .map(<[InlineKeyboardButton]>::to_vec),
    ))
}

/// Reply to `/start`: a Mini-App launch button, or plain text when no
/// usable app URL is configured.
#[must_use]
pub fn build_start_reply(web_app_url: Option<&str>) -> OutgoingMessage {
    let app_url = web_app_url.and_then(|raw| {
        Url::parse(raw)
            .inspect_err(|e| tracing::warn!(error = %e, url = raw, "WEB_APP_URL does not parse"))
            .ok()
    });

    match app_url {
        Some(url) => OutgoingMessage {
            text: "Привет! Оформляйте заказы с Poizon прямо в Telegram.".to_string(),
            markdown: false,
            reply_markup: Some(InlineKeyboardMarkup::new([[InlineKeyboardButton::web_app(
                "Открыть магазин",
                WebAppInfo { url },
            )]])),
        },
        None => OutgoingMessage {
            text: "Привет! Магазин скоро откроется.".to_string(),
            markdown: false,
            reply_markup: None,
        },
    }
}
