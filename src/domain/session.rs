//! Per-user session state persisted in the session store

use serde::{Deserialize, Serialize};

use crate::core::{MessageId, UserId, Window};

use super::ledger::{
    AccountSnapshot, ContractInfo, ContractKind, Cursor, DateRange, EventRecord,
};

/// Persisted per-user state: current window, anchor message, typed payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub window: Window,
    /// The single message edited in place to show the current window
    pub anchor: Option<MessageId>,
    /// Back target of the current window (one level, recomputed on entry)
    pub back_to: Option<Window>,
    pub prefs: Preferences,
    pub payload: Payload,
}

/// Settings that survive navigation but not a session reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub testnet: bool,
    pub api_key: Option<String>,
}

/// Window-specific data, one variant per family of windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Payload {
    #[default]
    Empty,
    /// Information, Detail, SelectDateRange, ConfirmExport, and events opened from a listing
    Account(Box<AccountPayload>),
    /// An event looked up directly by id
    Event(Box<EventPayload>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPayload {
    pub account: AccountSnapshot,
    pub contract: Option<ContractInfo>,
    pub detail: DetailView,
    pub listing: Option<EventListing>,
    /// Event opened from the listing
    pub selected: Option<EventRecord>,
    pub export: Option<ExportDraft>,
}

impl AccountPayload {
    pub fn new(account: AccountSnapshot, contract: Option<ContractInfo>) -> Self {
        Self {
            account,
            contract,
            detail: DetailView::Events,
            listing: None,
            selected: None,
            export: None,
        }
    }
}

/// What the `Detail` window currently shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailView {
    Events,
    Metadata,
    /// Traits of an NFT item
    Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event: EventRecord,
}

/// Cached pages of the event history listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListing {
    pub events: Vec<EventRecord>,
    pub page_size: usize,
    /// Pages fetched so far; pages `1..=fetched_pages` render from cache
    pub fetched_pages: u32,
    /// Page currently shown (1-based)
    pub page: u32,
    /// Cursor for the next unfetched page
    pub cursor: Option<Cursor>,
    pub exhausted: bool,
}

impl EventListing {
    pub fn new(page_size: usize) -> Self {
        Self {
            events: Vec::new(),
            page_size: page_size.max(1),
            fetched_pages: 0,
            page: 1,
            cursor: None,
            exhausted: false,
        }
    }

    /// Events of a cached page (1-based); empty when out of range
    pub fn page_items(&self, page: u32) -> &[EventRecord] {
        if page == 0 {
            return &[];
        }
        let start = (page as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(self.events.len());
        self.events.get(start..end).unwrap_or(&[])
    }

    pub fn current_items(&self) -> &[EventRecord] {
        self.page_items(self.page)
    }

    /// Absolute index of the first item of the current page
    pub fn current_offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.page_size
    }

    pub fn has_next(&self) -> bool {
        self.page < self.fetched_pages || !self.exhausted
    }
}

/// Export being configured in SelectDateRange / ConfirmExport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDraft {
    /// Window the export was started from
    pub origin: Window,
    pub range: Option<DateRange>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            window: Window::Main,
            anchor: None,
            back_to: None,
            prefs: Preferences::default(),
            payload: Payload::Empty,
        }
    }

    /// Wipe navigation state; keeps the anchor so it can be cleaned up
    pub fn reset(&mut self) {
        self.window = Window::Main;
        self.back_to = None;
        self.prefs = Preferences::default();
        self.payload = Payload::Empty;
    }

    /// Back to Main; keeps preferences and the anchor
    pub fn go_main(&mut self) {
        self.payload = Payload::Empty;
        self.enter(Window::Main);
    }

    /// Switch window and recompute its back target from the payload
    pub fn enter(&mut self, window: Window) {
        self.window = window;
        self.back_to = origin_of(window, &self.payload);
    }

    pub fn account(&self) -> Option<&AccountPayload> {
        match &self.payload {
            Payload::Account(account) => Some(account.as_ref()),
            _ => None,
        }
    }

    pub fn account_mut(&mut self) -> Option<&mut AccountPayload> {
        match &mut self.payload {
            Payload::Account(account) => Some(account.as_mut()),
            _ => None,
        }
    }

    /// The event shown by InformationEvent / InformationEventJson
    pub fn current_event(&self) -> Option<&EventRecord> {
        match &self.payload {
            Payload::Account(account) => account.selected.as_ref(),
            Payload::Event(event) => Some(&event.event),
            Payload::Empty => None,
        }
    }

    /// Whether the payload carries what `window` needs to render
    pub fn payload_fits(&self, window: Window) -> bool {
        match window {
            Window::Main | Window::SetKey | Window::KeyInvalid => true,
            Window::Information => self.account().is_some(),
            Window::Detail => self.account().is_some_and(|account| match account.detail {
                DetailView::Events => account.listing.is_some(),
                DetailView::Metadata => account.contract.is_some(),
                DetailView::Attributes => account
                    .contract
                    .as_ref()
                    .is_some_and(|c| c.kind == ContractKind::NftItem),
            }),
            Window::InformationEvent | Window::InformationEventJson => {
                self.current_event().is_some()
            }
            Window::SelectDateRange => self.account().is_some_and(|a| a.export.is_some()),
            Window::ConfirmExport => self
                .account()
                .and_then(|a| a.export)
                .is_some_and(|draft| draft.range.is_some()),
        }
    }
}

/// Back target of `window` given the payload it is entered with
pub fn origin_of(window: Window, payload: &Payload) -> Option<Window> {
    match (window, payload) {
        (Window::Detail, Payload::Account(_)) => Some(Window::Information),
        (Window::InformationEvent, Payload::Account(account)) if account.listing.is_some() => {
            Some(Window::Detail)
        }
        (Window::InformationEventJson, _) => Some(Window::InformationEvent),
        (Window::SelectDateRange, Payload::Account(account)) => {
            account.export.map(|draft| draft.origin)
        }
        (Window::ConfirmExport, _) => Some(Window::SelectDateRange),
        _ => None,
    }
}
