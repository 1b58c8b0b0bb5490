//! Messaging transport - Telegram Bot API client

mod client;
pub(crate) mod types;

pub use client::{TelegramConfig, TelegramTransport};
pub use types::{Incoming, Update};

use async_trait::async_trait;

use crate::core::{ChatId, InlineAnswer, MessageId, TransportError};
use crate::ui::Keyboard;

/// The narrow messaging surface the engine and the progress task use
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<MessageId, TransportError>;

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;

    /// Answer an inline query; an empty answer clears the user's result list
    async fn answer_inline_query(
        &self,
        query_id: &str,
        answer: &InlineAnswer,
    ) -> Result<(), TransportError>;
}
