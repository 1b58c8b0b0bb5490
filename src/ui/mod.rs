//! Window rendering
//!
//! A render model is a pure function of the session. Text stays plain;
//! the transport applies it to the anchor message (edit in place preferred,
//! send-new as fallback).

pub mod keyboard;
mod views;

use tracing::debug;

use crate::core::{ChatId, MessageId, TransportError};
use crate::domain::Session;
use crate::infrastructure::telegram::Transport;

pub use keyboard::{KeyButton, Keyboard, Press};

/// Text plus keyboard of one rendered window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderModel {
    pub text: String,
    pub keyboard: Keyboard,
}

/// One-line banner shown above a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    KeyRejected,
    KeySaved,
    KeyRemoved,
    NetworkSwitched { testnet: bool },
    Unavailable,
    BadRange,
    NoAttributes,
    ExportDone { rows: usize },
    ExportTruncated { rows: usize },
}

/// Screens rendered instead of a window after a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorView {
    NotFound,
    RateLimited,
    /// Session store or transport trouble; nothing was reported
    Unavailable,
    Failure,
}

/// Render the session's current window
pub fn render(session: &Session, notice: Option<&Notice>) -> RenderModel {
    let mut model = views::window(session);
    if let Some(notice) = notice {
        model.text = format!("{}\n\n{}", views::notice(notice), model.text);
    }
    model
}

pub fn render_error(view: ErrorView) -> RenderModel {
    views::error(view)
}

/// Show `model` on the anchor message, returning the id that now holds it
pub async fn apply_render(
    transport: &dyn Transport,
    chat_id: ChatId,
    anchor: Option<MessageId>,
    model: &RenderModel,
) -> Result<MessageId, TransportError> {
    if let Some(message_id) = anchor {
        match transport
            .edit_message(chat_id, message_id, &model.text, Some(&model.keyboard))
            .await
        {
            Ok(id) => return Ok(id),
            Err(TransportError::NotModified) => return Ok(message_id),
            Err(TransportError::MessageGone(reason)) => {
                debug!(chat_id, message_id, %reason, "anchor gone; sending a new one");
            }
            Err(err) => return Err(err),
        }
    }
    send_fresh(transport, chat_id, anchor, model).await
}

/// Send `model` as a new message and drop the previous anchor best-effort
pub async fn send_fresh(
    transport: &dyn Transport,
    chat_id: ChatId,
    previous: Option<MessageId>,
    model: &RenderModel,
) -> Result<MessageId, TransportError> {
    let message_id = transport
        .send_message(chat_id, &model.text, Some(&model.keyboard))
        .await?;
    if let Some(previous) = previous.filter(|p| *p != message_id) {
        delete_quietly(transport, chat_id, previous).await;
    }
    Ok(message_id)
}

/// Best-effort delete
pub async fn delete_quietly(transport: &dyn Transport, chat_id: ChatId, message_id: MessageId) {
    if let Err(err) = transport.delete_message(chat_id, message_id).await {
        debug!(chat_id, message_id, error = %err, "delete skipped");
    }
}
