use crate::core::{Button, ExportFormat, InlineKind, InlineQuery, RangePreset, Window};
use crate::domain::{
    short_address, AccountPayload, ContractKind, DetailView, EventListing, EventRecord, Session,
};
use crate::modules::export::format::format_ton;

use super::{ErrorView, KeyButton, Keyboard, Notice, RenderModel};

/// Telegram caps message text at 4096 characters
const MAX_TEXT: usize = 3800;

pub(super) fn window(session: &Session) -> RenderModel {
    match session.window {
        Window::Main => main(session),
        Window::SetKey => RenderModel {
            text: "Send your API key:\n\nA shared key serves every user by default. \
                   Your own key speeds up your requests."
                .to_string(),
            keyboard: nav(session),
        },
        Window::KeyInvalid => RenderModel {
            text: "Your API key was rejected by the provider.\n\n\
                   Send a new key or remove the current one."
                .to_string(),
            keyboard: Keyboard::new().row(vec![
                KeyButton::new("Remove key", Button::DeleteKey),
                KeyButton::new("Main", Button::GoMain),
            ]),
        },
        Window::Information => with_account(session, information),
        Window::Detail => with_account(session, detail),
        Window::InformationEvent => with_event(session, event_summary),
        Window::InformationEventJson => with_event(session, event_json),
        Window::SelectDateRange => with_account(session, select_range),
        Window::ConfirmExport => with_account(session, confirm_export),
    }
}

pub(super) fn notice(notice: &Notice) -> String {
    match notice {
        Notice::KeyRejected => "The key was rejected. Try another one.".to_string(),
        Notice::KeySaved => "API key saved.".to_string(),
        Notice::KeyRemoved => "API key removed.".to_string(),
        Notice::NetworkSwitched { testnet: true } => "Switched to testnet.".to_string(),
        Notice::NetworkSwitched { testnet: false } => "Switched to mainnet.".to_string(),
        Notice::Unavailable => "The provider is temporarily unavailable. Try again.".to_string(),
        Notice::BadRange => "Use the format DD.MM.YYYY-DD.MM.YYYY.".to_string(),
        Notice::NoAttributes => "Attributes not found.".to_string(),
        Notice::ExportDone { rows } => format!("Export ready: {rows} events."),
        Notice::ExportTruncated { rows } => {
            format!("Export stopped early at {rows} events (page limit reached).")
        }
    }
}

pub(super) fn error(view: ErrorView) -> RenderModel {
    let go_main = Keyboard::new().row(vec![KeyButton::new("Main", Button::GoMain)]);
    match view {
        ErrorView::NotFound => RenderModel {
            text: "Nothing found. Check the address, name or event id.".to_string(),
            keyboard: go_main,
        },
        ErrorView::RateLimited => RenderModel {
            text: "Too many requests. Wait a moment, or set your own API key.".to_string(),
            keyboard: Keyboard::new()
                .row(vec![KeyButton::new("Set API key", Button::SetKey)])
                .row(vec![KeyButton::new("Main", Button::GoMain)]),
        },
        ErrorView::Unavailable => RenderModel {
            text: "Temporarily unavailable. Try again in a moment.".to_string(),
            keyboard: go_main,
        },
        ErrorView::Failure => RenderModel {
            text: "Something went wrong. The team has been notified.".to_string(),
            keyboard: go_main,
        },
    }
}

fn main(session: &Session) -> RenderModel {
    let network = if session.prefs.testnet {
        "testnet"
    } else {
        "mainnet"
    };
    let (key_label, key_action) = match session.prefs.api_key {
        Some(_) => ("Remove API key", Button::DeleteKey),
        None => ("Set API key", Button::SetKey),
    };
    let switch_label = if session.prefs.testnet {
        "Switch to mainnet"
    } else {
        "Switch to testnet"
    };
    RenderModel {
        text: format!("TON explorer ({network})\n\nSend an address, a name or an event id:"),
        keyboard: Keyboard::new().row(vec![
            KeyButton::new(switch_label, Button::ToggleNetwork),
            KeyButton::new(key_label, key_action),
        ]),
    }
}

fn with_account(session: &Session, view: fn(&Session, &AccountPayload) -> RenderModel) -> RenderModel {
    match session.account() {
        Some(account) => view(session, account),
        None => main(session),
    }
}

fn with_event(session: &Session, view: fn(&Session, &EventRecord) -> RenderModel) -> RenderModel {
    match session.current_event() {
        Some(event) => view(session, event),
        None => main(session),
    }
}

/// Back (when the window has a back target) and Main
fn nav(session: &Session) -> Keyboard {
    let mut row = Vec::new();
    if session.back_to.is_some() || session.window == Window::SetKey {
        row.push(KeyButton::new("Back", Button::Back));
    }
    row.push(KeyButton::new("Main", Button::GoMain));
    Keyboard::new().row(row)
}

fn information(session: &Session, payload: &AccountPayload) -> RenderModel {
    let account = &payload.account;
    let mut lines = vec![
        account.title(),
        String::new(),
        format!("Address: {}", account.address),
        format!("Balance: {} TON", format_ton(account.balance)),
        format!("Status: {}", account.status),
    ];
    if !account.interfaces.is_empty() {
        lines.push(format!("Interfaces: {}", account.interfaces.join(", ")));
    }
    if let Some(contract) = &payload.contract {
        lines.push(format!(
            "Contract: {:?}{}",
            contract.kind,
            contract
                .name
                .as_ref()
                .map(|name| format!(" ({name})"))
                .unwrap_or_default()
        ));
    }

    let kind = payload.contract.as_ref().map(|c| c.kind);
    let mut actions = vec![KeyButton::new("Events", Button::Events)];
    if kind == Some(ContractKind::NftItem) {
        actions.push(KeyButton::new("Attributes", Button::Attributes));
    }
    if kind.is_some() {
        actions.push(KeyButton::new("Metadata", Button::Metadata));
    }
    actions.push(KeyButton::new("Export", Button::Export));

    RenderModel {
        text: lines.join("\n"),
        keyboard: Keyboard::new()
            .row(actions)
            .row(listings(payload))
            .append(nav(session)),
    }
}

/// Inline-mode listings that fit the account type
fn listings(payload: &AccountPayload) -> Vec<KeyButton> {
    let address = &payload.account.address;
    let kinds: &[InlineKind] = match payload.contract.as_ref().map(|c| c.kind) {
        Some(ContractKind::Jetton) => &[InlineKind::Transactions, InlineKind::Holders],
        Some(ContractKind::NftItem) => &[InlineKind::Transactions],
        Some(ContractKind::NftCollection) => &[InlineKind::Transactions, InlineKind::Items],
        None if payload.account.is_wallet => &[
            InlineKind::Transactions,
            InlineKind::Tokens,
            InlineKind::Collectibles,
        ],
        None => &[InlineKind::Transactions],
    };
    kinds
        .iter()
        .map(|kind| KeyButton::inline(kind.label(), InlineQuery::switch_text(*kind, address)))
        .collect()
}

fn detail(session: &Session, payload: &AccountPayload) -> RenderModel {
    match (payload.detail, &payload.listing) {
        (DetailView::Events, Some(listing)) => listing_view(session, payload, listing),
        (DetailView::Attributes, _) => {
            let lines: Vec<String> = payload
                .contract
                .as_ref()
                .map(|c| c.attributes())
                .unwrap_or_default()
                .into_iter()
                .map(|(name, value)| format!("• {name}: {value}"))
                .collect();
            RenderModel {
                text: clip(&lines.join("\n\n")),
                keyboard: nav(session),
            }
        }
        _ => {
            let metadata = payload
                .contract
                .as_ref()
                .map(|c| serde_json::to_string_pretty(&c.metadata).unwrap_or_default())
                .unwrap_or_default();
            RenderModel {
                text: clip(&metadata),
                keyboard: nav(session),
            }
        }
    }
}

fn listing_view(session: &Session, payload: &AccountPayload, listing: &EventListing) -> RenderModel {
    let items = listing.current_items();
    let offset = listing.current_offset();
    let mut lines = vec![format!(
        "History of {} - page {}",
        short_address(&payload.account.title()),
        listing.page
    )];
    lines.push(String::new());
    if items.is_empty() {
        lines.push("No events.".to_string());
    }
    for (i, event) in items.iter().enumerate() {
        lines.push(format!(
            "{}. {} {} {}",
            offset + i + 1,
            event_time(event),
            event.label,
            event.value_display
        ));
    }

    let selectors = items
        .iter()
        .enumerate()
        .map(|(i, _)| KeyButton::new((offset + i + 1).to_string(), Button::SelectEvent(offset + i)))
        .collect();
    let mut paging = Vec::new();
    if listing.page > 1 {
        paging.push(KeyButton::new("«", Button::Page(listing.page - 1)));
    }
    if listing.has_next() {
        paging.push(KeyButton::new("»", Button::Page(listing.page + 1)));
    }

    RenderModel {
        text: lines.join("\n"),
        keyboard: Keyboard::new()
            .grid(selectors, 5)
            .row(paging)
            .row(vec![KeyButton::new("Export", Button::Export)])
            .append(nav(session)),
    }
}

fn event_summary(session: &Session, event: &EventRecord) -> RenderModel {
    let mut lines = vec![
        format!("{} - {}", event.label, event_time(event)),
        String::new(),
        event.description.clone(),
        format!("Value: {}", event.value_display),
    ];
    for (i, participant) in event.participants.iter().enumerate() {
        lines.push(format!("Account {}: {}", i + 1, participant));
    }
    if let Some(comment) = &event.comment {
        lines.push(format!("Comment: {comment}"));
    }
    lines.push(format!("Id: {}", event.id));

    RenderModel {
        text: lines.join("\n"),
        keyboard: Keyboard::new()
            .row(vec![KeyButton::new("Show JSON", Button::ShowJson)])
            .append(nav(session)),
    }
}

fn event_json(session: &Session, event: &EventRecord) -> RenderModel {
    let body = if event.raw.is_null() {
        serde_json::to_string_pretty(event).unwrap_or_default()
    } else {
        serde_json::to_string_pretty(&event.raw).unwrap_or_default()
    };
    RenderModel {
        text: clip(&body),
        keyboard: nav(session),
    }
}

fn select_range(session: &Session, payload: &AccountPayload) -> RenderModel {
    let presets = vec![
        KeyButton::new("All time", Button::Range(RangePreset::AllTime)),
        KeyButton::new("7 days", Button::Range(RangePreset::LastDays(7))),
        KeyButton::new("30 days", Button::Range(RangePreset::LastDays(30))),
        KeyButton::new("365 days", Button::Range(RangePreset::LastDays(365))),
    ];
    RenderModel {
        text: format!(
            "Export history of {}\n\nPick a period or send it as DD.MM.YYYY-DD.MM.YYYY:",
            payload.account.title()
        ),
        keyboard: Keyboard::new().grid(presets, 2).append(nav(session)),
    }
}

fn confirm_export(session: &Session, payload: &AccountPayload) -> RenderModel {
    let range = payload
        .export
        .and_then(|draft| draft.range)
        .map(|range| range.describe())
        .unwrap_or_default();
    RenderModel {
        text: format!(
            "Export history of {}\nPeriod: {range}\n\nChoose a format:",
            payload.account.title()
        ),
        keyboard: Keyboard::new()
            .row(vec![
                KeyButton::new("CSV", Button::Format(ExportFormat::Csv)),
                KeyButton::new("JSON", Button::Format(ExportFormat::Json)),
            ])
            .append(nav(session)),
    }
}

fn event_time(event: &EventRecord) -> String {
    event
        .datetime()
        .map(|dt| dt.format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_default()
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_TEXT).collect();
    clipped.push_str("\n...");
    clipped
}
