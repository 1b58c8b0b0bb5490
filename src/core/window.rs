//! Conversation windows

use serde::{Deserialize, Serialize};

/// One named UI state of the per-user conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Window {
    #[default]
    Main,
    SetKey,
    KeyInvalid,
    Information,
    Detail,
    InformationEvent,
    InformationEventJson,
    SelectDateRange,
    ConfirmExport,
}

impl Window {
    pub const ALL: [Window; 9] = [
        Window::Main,
        Window::SetKey,
        Window::KeyInvalid,
        Window::Information,
        Window::Detail,
        Window::InformationEvent,
        Window::InformationEventJson,
        Window::SelectDateRange,
        Window::ConfirmExport,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Window::Main => "Main",
            Window::SetKey => "Set API key",
            Window::KeyInvalid => "API key invalid",
            Window::Information => "Information",
            Window::Detail => "Detail",
            Window::InformationEvent => "Event",
            Window::InformationEventJson => "Event JSON",
            Window::SelectDateRange => "Select date range",
            Window::ConfirmExport => "Confirm export",
        }
    }

    /// Windows that accept free text as input of their own
    /// (credential entry, typed date range). Everywhere else text is a search.
    pub fn captures_text(&self) -> bool {
        matches!(
            self,
            Window::SetKey | Window::KeyInvalid | Window::SelectDateRange
        )
    }
}
