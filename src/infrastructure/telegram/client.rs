//! Bot API client over HTTPS

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::core::{ChatId, InlineAnswer, MessageId, TransportError};
use crate::ui::Keyboard;

use super::types::{ApiResponse, EditResult, SentMessage, Update};
use super::Transport;

const API_BASE: &str = "https://api.telegram.org";

/// Connection settings for the Bot API
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout: Duration,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>, poll_timeout: Duration) -> Self {
        Self {
            token: token.into(),
            api_base: API_BASE.to_string(),
            poll_timeout,
        }
    }
}

pub struct TelegramTransport {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        // The client timeout must outlast the long poll
        let http = reqwest::Client::builder()
            .timeout(config.poll_timeout + Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http, config })
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    /// Fetch the next batch of updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.config.poll_timeout.as_secs(),
                "allowed_updates": ["message", "callback_query", "inline_query"],
            }),
        )
        .await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, TransportError> {
        let response = self
            .http
            .post(self.url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Other(format!("{method}: {e}")))?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                error_code,
                ..
            } => {
                let description = description.unwrap_or_default();
                debug!(method, status, ?error_code, %description, "bot api call rejected");
                Err(classify_failure(error_code.unwrap_or(status), description))
            }
        }
    }
}

/// Map a Bot API failure onto the transport taxonomy
pub(crate) fn classify_failure(code: u16, description: String) -> TransportError {
    let lower = description.to_lowercase();
    if lower.contains("message is not modified") {
        TransportError::NotModified
    } else if lower.contains("message to edit not found")
        || lower.contains("message can't be edited")
        || lower.contains("message to delete not found")
        || lower.contains("message can't be deleted")
    {
        TransportError::MessageGone(description)
    } else if code == 403 {
        TransportError::Blocked(description)
    } else {
        TransportError::Other(format!("{code}: {description}"))
    }
}

/// `answerInlineQuery` body; results are personal and barely cached
fn inline_answer_body(query_id: &str, answer: &InlineAnswer) -> Value {
    let results: Vec<Value> = answer
        .articles
        .iter()
        .map(|article| {
            json!({
                "type": "article",
                "id": article.id,
                "title": article.title,
                "description": article.description,
                "input_message_content": { "message_text": article.message_text },
            })
        })
        .collect();
    json!({
        "inline_query_id": query_id,
        "results": results,
        "cache_time": 1,
        "is_personal": true,
        "next_offset": answer.next_offset,
    })
}

fn with_keyboard(mut body: Value, keyboard: Option<&Keyboard>) -> Value {
    if let Some(keyboard) = keyboard.filter(|k| !k.is_empty()) {
        body["reply_markup"] = keyboard.to_markup();
    }
    body
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let body = with_keyboard(json!({ "chat_id": chat_id, "text": text }), keyboard);
        let sent: SentMessage = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let body = with_keyboard(
            json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
            keyboard,
        );
        match self.call::<EditResult>("editMessageText", body).await? {
            EditResult::Message(sent) => Ok(sent.message_id),
            EditResult::Flag(_) => Ok(message_id),
        }
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<MessageId, TransportError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .http
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;
        let sent: SentMessage = Self::decode("sendDocument", response).await?;
        Ok(sent.message_id)
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback_id }),
            )
            .await?;
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        answer: &InlineAnswer,
    ) -> Result<(), TransportError> {
        let _: bool = self
            .call("answerInlineQuery", inline_answer_body(query_id, answer))
            .await?;
        Ok(())
    }
}
