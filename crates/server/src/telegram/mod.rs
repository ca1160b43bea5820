//! Telegram bot integration.
//!
//! This module provides:
//! - [`TelegramClient`], a `teloxide` bot for sending and editing messages
//! - Message builders for order notifications
//! - Webhook secret verification
//!
//! Webhook updates and keyboards use the `teloxide` types directly.
//!
//! # Flow
//!
//! 1. A customer places an order; a notification with status buttons is sent
//!    to the operator chat
//! 2. An operator presses a button
//! 3. The webhook handler verifies the secret and decodes the callback
//! 4. The status is updated and the message is edited in place

mod client;
mod error;
mod messages;

use std::future::Future;

use teloxide::types::{ChatId, MessageId};

pub use client::{TELEGRAM_API_BASE, TelegramClient, verify_webhook_secret};
pub use error::TelegramError;
pub use messages::{
    OutgoingMessage, build_order_notification, build_start_reply, escape_markdown,
    status_keyboard,
};

/// Delivery of operator-facing messages.
pub trait Notifier: Send + Sync {
    /// Post a new order notification. Returns the sent message id.
    fn send_order_notification(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
    ) -> impl Future<Output = Result<MessageId, TelegramError>> + Send;

    /// Replace an existing notification in place.
    fn edit_order_notification(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutgoingMessage,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;

    /// Answer a button press with a short toast.
    fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), TelegramError>> + Send;
}

impl Notifier for TelegramClient {
    async fn send_order_notification(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
    ) -> Result<MessageId, TelegramError> {
        self.send_message(chat_id, message).await.map(|sent| sent.id)
    }

    async fn edit_order_notification(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutgoingMessage,
    ) -> Result<(), TelegramError> {
        self.edit_message_text(chat_id, message_id, message).await
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), TelegramError> {
        self.answer_callback_query(callback_id, Some(text)).await
    }
}

/// A notifier that records every call.
#[cfg(any(test, feature = "test-support"))]
pub mod recording {
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::sync::atomic::{AtomicBool, Ordering};

    use teloxide::types::{ChatId, MessageId};

    use super::{Notifier, OutgoingMessage, TelegramError};

    #[derive(Debug, Clone)]
    pub enum NotifierCall {
        Send {
            chat_id: ChatId,
            message: OutgoingMessage,
        },
        Edit {
            chat_id: ChatId,
            message_id: MessageId,
            message: OutgoingMessage,
        },
        Answer {
            callback_id: String,
            text: String,
        },
    }

    #[derive(Debug, Clone, Default)]
    pub struct RecordingNotifier {
        calls: Arc<Mutex<Vec<NotifierCall>>>,
        fail_sends: Arc<AtomicBool>,
    }

    impl RecordingNotifier {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `send_order_notification` fail from now on.
        pub fn fail_sends(&self) {
            self.fail_sends.store(true, Ordering::SeqCst);
        }

        fn lock(&self) -> MutexGuard<'_, Vec<NotifierCall>> {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner)
        }

        #[must_use]
        pub fn calls(&self) -> Vec<NotifierCall> {
            self.lock().clone()
        }

        /// Messages passed to `send_order_notification`.
        #[must_use]
        pub fn sent(&self) -> Vec<OutgoingMessage> {
            self.lock()
                .iter()
                .filter_map(|call| match call {
                    NotifierCall::Send { message, .. } => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Messages passed to `edit_order_notification`.
        #[must_use]
        pub fn edits(&self) -> Vec<OutgoingMessage> {
            self.lock()
                .iter()
                .filter_map(|call| match call {
                    NotifierCall::Edit { message, .. } => Some(message.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Toast texts passed to `answer_callback`.
        #[must_use]
        pub fn answers(&self) -> Vec<String> {
            self.lock()
                .iter()
                .filter_map(|call| match call {
                    NotifierCall::Answer { text, .. } => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn send_order_notification(
            &self,
            chat_id: ChatId,
            message: &OutgoingMessage,
        ) -> Result<MessageId, TelegramError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TelegramError::Request("connection refused".to_string()));
            }
            let mut calls = self.lock();
            calls.push(NotifierCall::Send {
                chat_id,
                message: message.clone(),
            });
            Ok(MessageId(i32::try_from(calls.len()).unwrap_or(i32::MAX)))
        }

        async fn edit_order_notification(
            &self,
            chat_id: ChatId,
            message_id: MessageId,
            message: &OutgoingMessage,
        ) -> Result<(), TelegramError> {
            self.lock().push(NotifierCall::Edit {
                chat_id,
                message_id,
                message: message.clone(),
            });
            Ok(())
        }

        async fn answer_callback(
            &self,
            callback_id: &str,
            text: &str,
        ) -> Result<(), TelegramError> {
            self.lock().push(NotifierCall::Answer {
                callback_id: callback_id.to_string(),
                text: text.to_string(),
            });
            Ok(())
        }
    }
}
