//! Inbound user actions and their classification into events

use super::action::Button;
use super::command::{parse_callback, parse_command, Command};
use super::inline::InlineQuery;
use super::{ChatId, MessageId, UserId};

/// A classified user action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Slash command; handled before the window dispatch table
    Command(Command),
    /// Inline button press
    Button(Button),
    /// Free text
    Text(String),
    /// Inline-mode listing request; never changes the window
    Query(InlineQuery),
}

/// Key of the dispatch table; drops the arguments an event carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    GoMain,
    Back,
    SetKey,
    DeleteKey,
    ToggleNetwork,
    Events,
    Metadata,
    Attributes,
    Export,
    ShowJson,
    SelectEvent,
    Page,
    Range,
    Format,
    Text,
}

impl Event {
    /// Classify raw text: commands first, everything else is a free-text query
    pub fn from_text(text: &str) -> Self {
        match parse_command(text) {
            Some(command) => Event::Command(command),
            None => Event::Text(text.trim().to_string()),
        }
    }

    /// Classify callback data; unknown payloads yield `None`
    pub fn from_callback(data: &str) -> Option<Self> {
        parse_callback(data).map(Event::Button)
    }

    pub fn tag(&self) -> Option<EventTag> {
        let tag = match self {
            Event::Command(_) | Event::Query(_) => return None,
            Event::Text(_) => EventTag::Text,
            Event::Button(button) => match button {
                Button::GoMain => EventTag::GoMain,
                Button::Back => EventTag::Back,
                Button::SetKey => EventTag::SetKey,
                Button::DeleteKey => EventTag::DeleteKey,
                Button::ToggleNetwork => EventTag::ToggleNetwork,
                Button::Events => EventTag::Events,
                Button::Metadata => EventTag::Metadata,
                Button::Attributes => EventTag::Attributes,
                Button::Export => EventTag::Export,
                Button::ShowJson => EventTag::ShowJson,
                Button::SelectEvent(_) => EventTag::SelectEvent,
                Button::Page(_) => EventTag::Page,
                Button::Range(_) => EventTag::Range,
                Button::Format(_) => EventTag::Format,
            },
        };
        Some(tag)
    }
}

/// Which rate limit bucket an inbound update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKey {
    /// Free-text search / lookup
    Search,
    /// Credential submission
    Key,
    /// Typed date range
    RangeInput,
    /// Slash command
    Command,
    /// Any inline button
    Button,
    /// Inline-mode listing
    Query,
}

impl HandlerKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKey::Search => "search",
            HandlerKey::Key => "key",
            HandlerKey::RangeInput => "range_input",
            HandlerKey::Command => "command",
            HandlerKey::Button => "button",
            HandlerKey::Query => "query",
        }
    }
}

/// One update from the transport, already attributed to a user
#[derive(Debug, Clone)]
pub struct Inbound {
    pub user_id: UserId,
    pub chat_id: ChatId,
    /// The user's own message, deleted best-effort after handling
    pub message_id: Option<MessageId>,
    /// Callback query to acknowledge
    pub callback_id: Option<String>,
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::RangePreset;

    #[test]
    fn test_text_classification() {
        assert_eq!(Event::from_text("/start"), Event::Command(Command::Start));
        assert_eq!(
            Event::from_text("  foundation.ton "),
            Event::Text("foundation.ton".to_string())
        );
    }

    #[test]
    fn test_tags_drop_arguments() {
        let a = Event::Button(Button::Page(2)).tag();
        let b = Event::Button(Button::Page(9)).tag();
        assert_eq!(a, b);
        assert_eq!(
            Event::Button(Button::Range(RangePreset::AllTime)).tag(),
            Some(EventTag::Range)
        );
        assert_eq!(Event::Command(Command::Start).tag(), None);
    }

    #[test]
    fn test_unknown_callback() {
        assert_eq!(Event::from_callback("what"), None);
        assert_eq!(
            Event::from_callback("events"),
            Some(Event::Button(Button::Events))
        );
    }
}
