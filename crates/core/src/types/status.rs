//! Order status state machine.
//!
//! Orders move along a fixed forward pipeline driven by operator actions in
//! the admin chat:
//!
//! ```text
//! pending → awaiting_payment → paid → to_warehouse → at_warehouse
//!         → to_moscow → in_moscow → shipped_cdek → ready_for_pickup → completed
//! ```
//!
//! Operators may skip ahead along the pipeline but never move backwards.
//! `rejected` can be reached from any non-terminal state. `completed` and
//! `rejected` are terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::OrderId;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    AwaitingPayment,
    Paid,
    ToWarehouse,
    AtWarehouse,
    ToMoscow,
    InMoscow,
    ShippedCdek,
    ReadyForPickup,
    Completed,
    Rejected,
}

/// An operator attempted a status change the pipeline does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("transition from {from} to {to} is not allowed")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    /// Every status, in pipeline order with `rejected` last.
    pub const ALL: [Self; 11] = [
        Self::Pending,
        Self::AwaitingPayment,
        Self::Paid,
        Self::ToWarehouse,
        Self::AtWarehouse,
        Self::ToMoscow,
        Self::InMoscow,
        Self::ShippedCdek,
        Self::ReadyForPickup,
        Self::Completed,
        Self::Rejected,
    ];

    /// Stable machine name, as stored in the database and sent to clients.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::ToWarehouse => "to_warehouse",
            Self::AtWarehouse => "at_warehouse",
            Self::ToMoscow => "to_moscow",
            Self::InMoscow => "in_moscow",
            Self::ShippedCdek => "shipped_cdek",
            Self::ReadyForPickup => "ready_for_pickup",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// Human-readable label shown to customers and operators.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Ожидает обработки",
            Self::AwaitingPayment => "Ожидает оплаты",
            Self::Paid => "Оплачен",
            Self::ToWarehouse => "Едет на склад",
            Self::AtWarehouse => "На складе в Китае",
            Self::ToMoscow => "Едет в Москву",
            Self::InMoscow => "Прибыл в Москву",
            Self::ShippedCdek => "Отправлен СДЭК",
            Self::ReadyForPickup => "Готов к выдаче",
            Self::Completed => "Завершён",
            Self::Rejected => "Отклонён",
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Position along the forward pipeline. `None` for `rejected`.
    const fn stage(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::AwaitingPayment => Some(1),
            Self::Paid => Some(2),
            Self::ToWarehouse => Some(3),
            Self::AtWarehouse => Some(4),
            Self::ToMoscow => Some(5),
            Self::InMoscow => Some(6),
            Self::ShippedCdek => Some(7),
            Self::ReadyForPickup => Some(8),
            Self::Completed => Some(9),
            Self::Rejected => None,
        }
    }

    /// Whether an operator may move an order from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.stage(), next.stage()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    /// Statuses reachable from `self`, in pipeline order.
    #[must_use]
    pub fn allowed_next(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }

    /// Validate a transition and return the new status.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` for same-state, backward, or post-terminal moves.
    pub const fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

// =============================================================================
// Callback payloads
// =============================================================================

/// Prefix of the current callback payload format.
const ACTION_PREFIX: &str = "status";
/// Separator of the current format. Never appears in status names.
const ACTION_SEPARATOR: char = ':';
/// Prefix of the legacy `status_<status>_<id>` format.
const LEGACY_PREFIX: &str = "status_";

/// An operator's request to move an order to a new status.
///
/// Encoded into inline-button callback data as `status:<status>:<order_id>`.
/// The legacy `status_<status>_<order_id>` form is still accepted so buttons
/// on older notifications keep working; the status there is everything between
/// the prefix and the last underscore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusAction {
    pub status: OrderStatus,
    pub order_id: OrderId,
}

/// Callback data could not be decoded into a `StatusAction`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusActionError {
    #[error("not a status action")]
    UnknownFormat,
    #[error("unknown status: {0}")]
    UnknownStatus(String),
    #[error("invalid order id: {0}")]
    InvalidOrderId(String),
}

impl StatusAction {
    #[must_use]
    pub const fn new(status: OrderStatus, order_id: OrderId) -> Self {
        Self { status, order_id }
    }

    /// Encode as callback data.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{ACTION_PREFIX}{ACTION_SEPARATOR}{}{ACTION_SEPARATOR}{}",
            self.status.as_str(),
            self.order_id
        )
    }

    /// Decode callback data in either the current or the legacy format.
    ///
    /// # Errors
    ///
    /// Returns `StatusActionError` if the payload is not a status action, names
    /// an unknown status, or carries a malformed order ID.
    pub fn parse(data: &str) -> Result<Self, StatusActionError> {
        let (status, id) = if let Some(rest) = data
            .strip_prefix(ACTION_PREFIX)
            .and_then(|r| r.strip_prefix(ACTION_SEPARATOR))
        {
            rest.split_once(ACTION_SEPARATOR)
                .ok_or(StatusActionError::UnknownFormat)?
        } else if let Some(rest) = data.strip_prefix(LEGACY_PREFIX) {
            rest.rsplit_once('_')
                .ok_or(StatusActionError::UnknownFormat)?
        } else {
            return Err(StatusActionError::UnknownFormat);
        };

        let status = status
            .parse::<OrderStatus>()
            .map_err(|_| StatusActionError::UnknownStatus(status.to_string()))?;
        let order_id = parse_order_id(id)?;

        Ok(Self { status, order_id })
    }
}

fn parse_order_id(raw: &str) -> Result<OrderId, StatusActionError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StatusActionError::InvalidOrderId(raw.to_string()));
    }
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(OrderId::new(id)),
        _ => Err(StatusActionError::InvalidOrderId(raw.to_string())),
    }
}
