//! `(window, event tag) -> transition` dispatch table
//!
//! Built once at startup. A pair with no entry is a stray event and is
//! acknowledged as a no-op by the engine.

use std::collections::HashMap;

use crate::core::{EventTag, Window};

/// What a legal event does; arguments come from the event itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    GoMain,
    OpenSetKey,
    DeleteKey,
    ToggleNetwork,
    SubmitKey,
    Search,
    OpenEvents,
    OpenMetadata,
    OpenAttributes,
    Paginate,
    OpenEvent,
    OpenEventJson,
    Back,
    OpenExport,
    PickRange,
    TypeRange,
    ConfirmExport,
}

#[derive(Debug, Clone)]
pub struct DispatchTable {
    entries: HashMap<(Window, EventTag), Transition>,
}

impl DispatchTable {
    pub fn standard() -> Self {
        use EventTag as E;
        use Transition as T;
        use Window as W;

        let mut table = Self {
            entries: HashMap::new(),
        };
        for window in Window::ALL {
            table.insert(window, E::GoMain, T::GoMain);
        }

        table.insert(W::Main, E::SetKey, T::OpenSetKey);
        table.insert(W::Main, E::DeleteKey, T::DeleteKey);
        table.insert(W::Main, E::ToggleNetwork, T::ToggleNetwork);
        table.insert(W::Main, E::Text, T::Search);

        table.insert(W::SetKey, E::Text, T::SubmitKey);
        table.insert(W::SetKey, E::Back, T::GoMain);

        table.insert(W::KeyInvalid, E::Text, T::SubmitKey);
        table.insert(W::KeyInvalid, E::DeleteKey, T::DeleteKey);

        table.insert(W::Information, E::Events, T::OpenEvents);
        table.insert(W::Information, E::Metadata, T::OpenMetadata);
        table.insert(W::Information, E::Attributes, T::OpenAttributes);
        table.insert(W::Information, E::Export, T::OpenExport);
        table.insert(W::Information, E::Text, T::Search);

        table.insert(W::Detail, E::Page, T::Paginate);
        table.insert(W::Detail, E::SelectEvent, T::OpenEvent);
        table.insert(W::Detail, E::Export, T::OpenExport);
        table.insert(W::Detail, E::Back, T::Back);
        table.insert(W::Detail, E::Text, T::Search);

        table.insert(W::InformationEvent, E::ShowJson, T::OpenEventJson);
        table.insert(W::InformationEvent, E::Back, T::Back);
        table.insert(W::InformationEvent, E::Text, T::Search);

        table.insert(W::InformationEventJson, E::Back, T::Back);
        table.insert(W::InformationEventJson, E::Text, T::Search);

        table.insert(W::SelectDateRange, E::Range, T::PickRange);
        table.insert(W::SelectDateRange, E::Text, T::TypeRange);
        table.insert(W::SelectDateRange, E::Back, T::Back);

        table.insert(W::ConfirmExport, E::Format, T::ConfirmExport);
        table.insert(W::ConfirmExport, E::Back, T::Back);

        table
    }

    fn insert(&mut self, window: Window, tag: EventTag, transition: Transition) {
        self.entries.insert((window, tag), transition);
    }

    pub fn lookup(&self, window: Window, tag: EventTag) -> Option<Transition> {
        self.entries.get(&(window, tag)).copied()
    }

    /// Event tags `window` declares as legal
    pub fn legal_tags(&self, window: Window) -> Vec<EventTag> {
        self.entries
            .keys()
            .filter(|(w, _)| *w == window)
            .map(|(_, tag)| *tag)
            .collect()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}
