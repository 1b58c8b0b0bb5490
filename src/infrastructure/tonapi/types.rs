//! TON API response shapes and their conversion into domain records

use serde::Deserialize;
use serde_json::Value;

use crate::core::ProviderError;
use crate::domain::{
    AccountSnapshot, ContractInfo, ContractKind, Cursor, EventKind, EventPage, EventRecord,
    JettonBalance, JettonHolder, NftSummary, TransferValue,
};

#[derive(Debug, Deserialize)]
pub(crate) struct AccountAddress {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DnsRecord {
    #[serde(default)]
    pub wallet: Option<AccountAddress>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Account {
    pub address: String,
    /// Nanotons
    pub balance: u128,
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub is_wallet: bool,
}

impl From<Account> for AccountSnapshot {
    fn from(account: Account) -> Self {
        AccountSnapshot {
            address: account.address,
            name: account.name,
            balance: account.balance,
            status: account.status,
            interfaces: account.interfaces,
            is_wallet: account.is_wallet,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountEvents {
    #[serde(default)]
    pub events: Vec<Value>,
    /// Logical time to continue from; 0 once the feed is exhausted
    #[serde(default)]
    pub next_from: i64,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    event_id: String,
    timestamp: i64,
    #[serde(default)]
    account: Option<AccountAddress>,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "TonTransfer", default)]
    ton_transfer: Option<TonTransfer>,
    #[serde(rename = "JettonTransfer", default)]
    jetton_transfer: Option<JettonTransfer>,
    simple_preview: SimplePreview,
}

#[derive(Debug, Deserialize)]
struct TonTransfer {
    sender: AccountAddress,
    recipient: AccountAddress,
    amount: u128,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JettonTransfer {
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimplePreview {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    accounts: Vec<AccountAddress>,
}

/// Map one event JSON object onto an `EventRecord`, keeping the raw payload
pub(crate) fn event_record(raw: Value) -> Result<EventRecord, ProviderError> {
    let event: RawEvent =
        serde_json::from_value(raw.clone()).map_err(|e| ProviderError::Decode(e.to_string()))?;
    let action = event
        .actions
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode(format!("event {} has no actions", event.event_id)))?;

    let participants: Vec<String> = action
        .simple_preview
        .accounts
        .into_iter()
        .take(2)
        .map(|a| a.address)
        .collect();

    let mut comment = None;
    let mut transfer = None;
    if let Some(ton) = action.ton_transfer {
        comment = ton.comment;
        transfer = Some(TransferValue {
            sender: ton.sender.address,
            recipient: ton.recipient.address,
            amount: ton.amount,
        });
    }
    if let Some(jetton) = action.jetton_transfer {
        if jetton.comment.is_some() {
            comment = jetton.comment;
        }
    }

    let kind = EventKind::from_action_type(&action.kind);
    let (account_address, account_name) = match event.account {
        Some(account) => (account.address, account.name),
        None => (participants.first().cloned().unwrap_or_default(), None),
    };

    Ok(EventRecord {
        id: event.event_id,
        timestamp: event.timestamp,
        account_address,
        account_name,
        participants,
        kind,
        label: action.simple_preview.name,
        description: action.simple_preview.description,
        value_display: action.simple_preview.value.unwrap_or_default(),
        comment: comment.filter(|c| !c.trim().is_empty()),
        transfer: transfer.filter(|_| kind == EventKind::Transfer),
        raw,
    })
}

pub(crate) fn event_page(events: AccountEvents) -> Result<EventPage, ProviderError> {
    let records = events
        .events
        .into_iter()
        .map(event_record)
        .collect::<Result<Vec<_>, _>>()?;
    let next_cursor = (events.next_from > 0).then(|| Cursor(events.next_from.to_string()));
    Ok(EventPage {
        events: records,
        next_cursor,
    })
}

/// Token amounts arrive as decimal strings; some endpoints send numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Amount {
    Text(String),
    Number(u128),
}

impl Amount {
    fn value(self) -> Result<u128, ProviderError> {
        match self {
            Amount::Number(n) => Ok(n),
            Amount::Text(text) => text
                .parse()
                .map_err(|_| ProviderError::Decode(format!("bad amount {text:?}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NftItems {
    #[serde(default)]
    pub nft_items: Vec<NftItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NftItem {
    address: String,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    collection: Option<AccountAddress>,
    #[serde(default)]
    dns: Option<String>,
}

impl From<NftItem> for NftSummary {
    fn from(item: NftItem) -> Self {
        let text = |field: &str| {
            item.metadata
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        NftSummary {
            name: text("name"),
            description: text("description").filter(|d| !d.trim().is_empty()),
            address: item.address,
            dns: item.dns,
            collection: item.collection.and_then(|c| c.name),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JettonBalances {
    #[serde(default)]
    pub balances: Vec<RawJettonBalance>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawJettonBalance {
    balance: Amount,
    jetton: JettonPreview,
}

#[derive(Debug, Deserialize)]
struct JettonPreview {
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default = "default_decimals")]
    decimals: u32,
    #[serde(default)]
    verification: String,
}

fn default_decimals() -> u32 {
    9
}

pub(crate) fn jetton_balances(raw: JettonBalances) -> Result<Vec<JettonBalance>, ProviderError> {
    raw.balances
        .into_iter()
        .map(|entry| {
            Ok(JettonBalance {
                balance: entry.balance.value()?,
                jetton_address: entry.jetton.address,
                name: entry.jetton.name,
                symbol: entry.jetton.symbol,
                decimals: entry.jetton.decimals,
                verified: entry.jetton.verification == "whitelist",
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct JettonHolders {
    #[serde(default)]
    pub addresses: Vec<RawHolder>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawHolder {
    address: String,
    #[serde(default)]
    owner: Option<AccountAddress>,
    balance: Amount,
}

/// Holders are listed by their jetton wallet; the owner is the account users know
pub(crate) fn jetton_holders(raw: JettonHolders) -> Result<Vec<JettonHolder>, ProviderError> {
    raw.addresses
        .into_iter()
        .map(|holder| {
            Ok(JettonHolder {
                balance: holder.balance.value()?,
                address: holder.owner.map(|o| o.address).unwrap_or(holder.address),
            })
        })
        .collect()
}

/// Jetton, NFT item and collection responses all carry a `metadata` object
pub(crate) fn contract_info(kind: ContractKind, raw: Value) -> ContractInfo {
    let metadata = raw.get("metadata").cloned().unwrap_or(Value::Null);
    let name = metadata
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);
    ContractInfo {
        kind,
        name,
        metadata,
    }
}
