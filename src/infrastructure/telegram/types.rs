//! Bot API wire types and their conversion into inbound events

use serde::Deserialize;

use crate::core::{Event, Inbound, InlineQuery as Listing};

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
}

/// What an update turned into
#[derive(Debug, Clone)]
pub enum Incoming {
    Inbound(Inbound),
    /// Callback with data no window understands; only acknowledged
    Stray { callback_id: String },
    /// Inline query that names no listing; answered with no results
    UnknownQuery { query_id: String },
    /// Nothing to act on (service messages, stickers, ...)
    Ignored,
}

impl Update {
    pub fn classify(self) -> Incoming {
        if let Some(inline) = self.inline_query {
            return match Listing::parse(&inline.id, &inline.query, &inline.offset) {
                // inline queries carry no chat; answers go back by query id
                Some(listing) => Incoming::Inbound(Inbound {
                    user_id: inline.from.id,
                    chat_id: inline.from.id,
                    message_id: None,
                    callback_id: None,
                    event: Event::Query(listing),
                }),
                None => Incoming::UnknownQuery { query_id: inline.id },
            };
        }
        if let Some(query) = self.callback_query {
            let Some(chat_id) = query.message.as_ref().map(|m| m.chat.id) else {
                return Incoming::Stray {
                    callback_id: query.id,
                };
            };
            return match query.data.as_deref().and_then(Event::from_callback) {
                Some(event) => Incoming::Inbound(Inbound {
                    user_id: query.from.id,
                    chat_id,
                    message_id: None,
                    callback_id: Some(query.id),
                    event,
                }),
                None => Incoming::Stray {
                    callback_id: query.id,
                },
            };
        }

        match self.message {
            Some(Message {
                message_id,
                from: Some(from),
                chat,
                text: Some(text),
            }) => Incoming::Inbound(Inbound {
                user_id: from.id,
                chat_id: chat.id,
                message_id: Some(message_id),
                callback_id: None,
                event: Event::from_text(&text),
            }),
            _ => Incoming::Ignored,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SentMessage {
    pub message_id: i64,
}

/// `editMessageText` answers `true` for inline messages and a message otherwise
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EditResult {
    Message(SentMessage),
    Flag(bool),
}
