//! Ledger records as returned by the provider

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Nanotons per TON
pub const NANO: u128 = 1_000_000_000;

/// Opaque pagination marker returned by the event feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(pub String);

/// Kind of a ledger event (taken from its first action)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Transfer,
    ContractDeploy,
    NftTransfer,
    Purchase,
    Other,
}

impl EventKind {
    pub fn from_action_type(action_type: &str) -> Self {
        match action_type {
            "TonTransfer" => EventKind::Transfer,
            "ContractDeploy" => EventKind::ContractDeploy,
            "NftItemTransfer" => EventKind::NftTransfer,
            "NftPurchase" => EventKind::Purchase,
            _ => EventKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Transfer => "transfer",
            EventKind::ContractDeploy => "contract_deploy",
            EventKind::NftTransfer => "nft_transfer",
            EventKind::Purchase => "purchase",
            EventKind::Other => "other",
        }
    }
}

/// Simple value transfer details, present only for `EventKind::Transfer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferValue {
    pub sender: String,
    pub recipient: String,
    /// Amount in nanotons
    pub amount: u128,
}

/// One ledger event; immutable once fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    /// Unix seconds
    pub timestamp: i64,
    /// Address of the account whose feed produced this event
    pub account_address: String,
    pub account_name: Option<String>,
    /// One or two addresses, in provider order
    pub participants: Vec<String>,
    pub kind: EventKind,
    /// Short label of the action ("Ton Transfer", "Contract Deploy", ...)
    pub label: String,
    pub description: String,
    pub value_display: String,
    pub comment: Option<String>,
    pub transfer: Option<TransferValue>,
    /// Provider payload kept for the JSON detail view
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl EventRecord {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

/// Contract standards an account may implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    Jetton,
    NftItem,
    NftCollection,
}

impl ContractKind {
    /// Pick the standard from the account's interface tags
    pub fn from_interfaces(interfaces: &[String]) -> Option<Self> {
        let has = |tag: &str| interfaces.iter().any(|i| i == tag);
        if has("tep74") {
            Some(ContractKind::Jetton)
        } else if has("tep62_item") {
            Some(ContractKind::NftItem)
        } else if has("tep62_collection") {
            Some(ContractKind::NftCollection)
        } else {
            None
        }
    }
}

/// Jetton / NFT details fetched for contract accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub kind: ContractKind,
    pub name: Option<String>,
    pub metadata: serde_json::Value,
}

impl ContractInfo {
    /// `trait_type: value` pairs of an NFT's metadata, in metadata order
    pub fn attributes(&self) -> Vec<(String, String)> {
        let Some(list) = self.metadata.get("attributes").and_then(Value::as_array) else {
            return Vec::new();
        };
        list.iter()
            .filter_map(|attr| {
                let name = attr.get("trait_type").and_then(Value::as_str)?;
                let value = match attr.get("value")? {
                    Value::String(text) => text.clone(),
                    Value::Null => return None,
                    other => other.to_string(),
                };
                Some((name.to_string(), value))
            })
            .collect()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.metadata.get("symbol").and_then(Value::as_str)
    }

    /// Jetton decimals; metadata carries them as a string, 9 when absent
    pub fn decimals(&self) -> u32 {
        match self.metadata.get("decimals") {
            Some(Value::String(text)) => text.parse().unwrap_or(9),
            Some(Value::Number(n)) => n.as_u64().and_then(|d| u32::try_from(d).ok()).unwrap_or(9),
            _ => 9,
        }
    }
}

/// An NFT item as listed in a wallet or a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftSummary {
    pub address: String,
    pub name: Option<String>,
    /// Domain name for DNS items
    pub dns: Option<String>,
    pub collection: Option<String>,
    pub description: Option<String>,
}

impl NftSummary {
    pub fn title(&self) -> String {
        self.dns
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// One jetton held by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JettonBalance {
    /// Address of the jetton master
    pub jetton_address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: u32,
    pub verified: bool,
    /// Balance in the jetton's smallest units
    pub balance: u128,
}

/// One holder of a jetton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JettonHolder {
    pub address: String,
    pub balance: u128,
}

/// Snapshot of an account taken when it was looked up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Raw form (`wc:hex`) used for comparisons
    pub address: String,
    pub name: Option<String>,
    /// Balance in nanotons
    pub balance: u128,
    pub status: String,
    pub interfaces: Vec<String>,
    pub is_wallet: bool,
}

impl AccountSnapshot {
    pub fn title(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.address.clone())
    }

    pub fn owns(&self, address: &str) -> bool {
        normalize_address(address) == normalize_address(&self.address)
    }
}

/// Inclusive date range filter of the event feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRange {
    AllTime,
    /// Unix seconds, both bounds inclusive
    Between { start: i64, end: i64 },
}

impl DateRange {
    /// The `days` days up to and including `now`
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Self {
        let start = now - Duration::days(i64::from(days));
        DateRange::Between {
            start: start.timestamp(),
            end: now.timestamp(),
        }
    }

    /// Whole UTC days from `from` to `to`, inclusive
    pub fn from_dates(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        if from > to {
            return None;
        }
        let start = from.and_hms_opt(0, 0, 0)?.and_utc().timestamp();
        let end = to.and_hms_opt(23, 59, 59)?.and_utc().timestamp();
        Some(DateRange::Between { start, end })
    }

    /// Parse `DD.MM.YYYY-DD.MM.YYYY` (spaces around the dash allowed)
    pub fn parse(input: &str) -> Option<Self> {
        let (from, to) = input.split_once('-')?;
        let from = NaiveDate::parse_from_str(from.trim(), "%d.%m.%Y").ok()?;
        let to = NaiveDate::parse_from_str(to.trim(), "%d.%m.%Y").ok()?;
        Self::from_dates(from, to)
    }

    pub fn bounds(&self) -> Option<(i64, i64)> {
        match self {
            DateRange::AllTime => None,
            DateRange::Between { start, end } => Some((*start, *end)),
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        match self {
            DateRange::AllTime => true,
            DateRange::Between { start, end } => (*start..=*end).contains(&timestamp),
        }
    }

    pub fn describe(&self) -> String {
        match self.bounds() {
            None => "all time".to_string(),
            Some((start, end)) => {
                let day = |ts: i64| {
                    Utc.timestamp_opt(ts, 0)
                        .single()
                        .map(|dt| dt.format("%d.%m.%Y").to_string())
                        .unwrap_or_default()
                };
                format!("{} - {}", day(start), day(end))
            }
        }
    }
}

/// One batch of the cursor-paginated event feed
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<EventRecord>,
    /// `None` when the feed reports exhaustion
    pub next_cursor: Option<Cursor>,
}

/// Normalize an address for comparison (trim, lowercase)
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Shorten an address for display (`EQAbcd...wxyz`)
pub fn short_address(value: &str) -> String {
    let value = value.trim();
    if value.chars().count() <= 12 {
        return value.to_string();
    }
    let start: String = value.chars().take(6).collect();
    let end: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    format!("{}...{}", start, end)
}
