pub mod action;
pub mod command;
pub mod error;
pub mod event;
pub mod inline;
pub mod window;

pub use action::{Button, ExportFormat, RangePreset};
pub use command::{parse_callback, parse_command, Command};
pub use error::{BotError, BotResult, ProviderError, TransportError};
pub use event::{Event, EventTag, HandlerKey, Inbound};
pub use inline::{InlineAnswer, InlineArticle, InlineKind, InlineQuery, INLINE_PAGE};
pub use window::Window;

/// Stable numeric key of an end user
pub type UserId = i64;

/// Chat the bot talks to the user in (equal to the user id for private chats)
pub type ChatId = i64;

/// Identifier of a message inside a chat
pub type MessageId = i64;
