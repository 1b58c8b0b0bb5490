//! Shared fixtures for the integration tests
//!
//! - `FixtureProvider`: in-memory ledger feed with call counters
//! - `RecordingTransport`: records every send, edit and delete
//! - `FlakyStore`: in-memory session store whose reads and clears can fail
//! - `Harness`: an `App` wired around all three

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use tonview::app::{App, Handled, RateLimits};
use tonview::core::{
    Button, ChatId, Event, Inbound, InlineAnswer, InlineQuery, MessageId, ProviderError,
    TransportError, UserId,
};
use tonview::domain::{
    AccountSnapshot, ContractInfo, ContractKind, Cursor, DateRange, EventKind, EventPage,
    EventRecord, JettonBalance, JettonHolder, NftSummary, Preferences, Session, TransferValue,
    NANO,
};
use tonview::infrastructure::telegram::Transport;
use tonview::infrastructure::tonapi::{LedgerProvider, ProviderFactory};
use tonview::modules::engine::EngineSettings;
use tonview::modules::export::ExportSettings;
use tonview::modules::throttle::{Cadence, TokioClock, HOURGLASS, MAGNIFIER};
use tonview::store::{MemorySessionStore, SessionStore};
use tonview::ui::Keyboard;
use tonview::{build_app, AppSettings};

/// User-friendly form of the fixture wallet
pub const WALLET: &str = "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N";

/// Counterparty used by transfers
pub const PEER: &str = "EQBvW8Z5huBkMJYdnfAEM5JqTNkuWX3diqYENkWsIL0XggGG";

/// 1 March 2024 00:00 UTC
pub const MARCH_1: i64 = 1_709_251_200;

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

// ============================================================================
// Ledger fixtures
// ============================================================================

pub fn wallet() -> AccountSnapshot {
    AccountSnapshot {
        address: WALLET.to_string(),
        name: Some("fixture.ton".to_string()),
        balance: 1_234_567_125_000_000,
        status: "active".to_string(),
        interfaces: vec!["wallet_v4r2".to_string()],
        is_wallet: true,
    }
}

pub fn jetton_master(address: &str) -> AccountSnapshot {
    AccountSnapshot {
        address: address.to_string(),
        name: None,
        balance: 50 * NANO,
        status: "active".to_string(),
        interfaces: vec!["tep74".to_string()],
        is_wallet: false,
    }
}

pub fn transfer(id: &str, timestamp: i64, sender: &str, recipient: &str, amount: u128) -> EventRecord {
    EventRecord {
        id: id.to_string(),
        timestamp,
        account_address: WALLET.to_string(),
        account_name: Some("fixture.ton".to_string()),
        participants: vec![sender.to_string(), recipient.to_string()],
        kind: EventKind::Transfer,
        label: "Ton Transfer".to_string(),
        description: format!("Transfer of {amount} nanoton"),
        value_display: format!("{} TON", amount / NANO),
        comment: None,
        transfer: Some(TransferValue {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
        }),
        raw: json!({ "event_id": id, "timestamp": timestamp }),
    }
}

pub fn deploy(id: &str, timestamp: i64) -> EventRecord {
    EventRecord {
        id: id.to_string(),
        timestamp,
        account_address: WALLET.to_string(),
        account_name: Some("fixture.ton".to_string()),
        participants: vec![WALLET.to_string()],
        kind: EventKind::ContractDeploy,
        label: "Contract Deploy".to_string(),
        description: "Wallet deployed".to_string(),
        value_display: String::new(),
        comment: Some("hello".to_string()),
        transfer: None,
        raw: json!({ "event_id": id, "timestamp": timestamp }),
    }
}

/// 23 March events, newest first.
///
/// Index `i % 3`: 0 is a deploy, 1 sends `i + 1` TON, 2 receives `(i + 1) / 2` TON.
/// Sent total is 100 TON, received total is 42 TON.
pub fn march_feed() -> Vec<EventRecord> {
    let mut events: Vec<EventRecord> = (0..23)
        .map(|i: u32| {
            let id = format!("march-{i:02}");
            let ts = MARCH_1 + i64::from(i) * DAY + 12 * HOUR;
            let amount = u128::from(i + 1) * NANO;
            match i % 3 {
                0 => deploy(&id, ts),
                1 => transfer(&id, ts, WALLET, PEER, amount),
                _ => transfer(&id, ts, PEER, WALLET, amount / 2),
            }
        })
        .collect();
    events.reverse();
    events
}

/// Four February events, newest first (outside the March range)
pub fn february_feed() -> Vec<EventRecord> {
    (0..4)
        .map(|i: i64| {
            transfer(
                &format!("feb-{i}"),
                MARCH_1 - (i + 1) * DAY,
                PEER,
                WALLET,
                7 * NANO,
            )
        })
        .collect()
}

#[derive(Default)]
struct Feed {
    accounts: HashMap<String, AccountSnapshot>,
    dns: HashMap<String, String>,
    events: HashMap<String, Vec<EventRecord>>,
    contracts: HashMap<String, ContractInfo>,
    single_events: HashMap<String, EventRecord>,
    valid_keys: HashSet<String>,
    /// Owned NFTs and collection items, keyed by owner or collection
    nfts: HashMap<String, Vec<NftSummary>>,
    jettons: HashMap<String, Vec<JettonBalance>>,
    holders: HashMap<String, Vec<JettonHolder>>,
}

/// In-memory ledger with call counters and optional latency
#[derive(Default)]
pub struct FixtureProvider {
    feed: Mutex<Feed>,
    latency: Mutex<Duration>,
    /// Batch size cap, independent of the requested limit
    batch_cap: Mutex<Option<usize>>,
    pub event_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: Mutex<HashMap<String, usize>>,
    /// Returned by the next provider call
    failure: Mutex<Option<ProviderError>>,
}

impl FixtureProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The fixture wallet with the February and March feeds
    pub fn standard() -> Arc<Self> {
        let provider = Self::new();
        let mut events = march_feed();
        events.extend(february_feed());
        provider.add_account(wallet(), events);
        provider.add_dns("fixture.ton", WALLET);
        provider.add_key("good-key");
        provider
    }

    pub fn add_account(&self, account: AccountSnapshot, events: Vec<EventRecord>) {
        let mut feed = self.feed.lock().unwrap();
        feed.events.insert(account.address.clone(), events);
        feed.accounts.insert(account.address.clone(), account);
    }

    pub fn add_dns(&self, name: &str, address: &str) {
        self.feed
            .lock()
            .unwrap()
            .dns
            .insert(name.to_string(), address.to_string());
    }

    pub fn add_contract(&self, address: &str, info: ContractInfo) {
        self.feed
            .lock()
            .unwrap()
            .contracts
            .insert(address.to_string(), info);
    }

    pub fn add_event(&self, event: EventRecord) {
        self.feed
            .lock()
            .unwrap()
            .single_events
            .insert(event.id.clone(), event);
    }

    /// NFTs owned by `owner`, or items of the collection at `owner`
    pub fn add_nfts(&self, owner: &str, items: Vec<NftSummary>) {
        self.feed
            .lock()
            .unwrap()
            .nfts
            .insert(owner.to_string(), items);
    }

    pub fn add_jettons(&self, owner: &str, balances: Vec<JettonBalance>) {
        self.feed
            .lock()
            .unwrap()
            .jettons
            .insert(owner.to_string(), balances);
    }

    pub fn add_holders(&self, jetton: &str, holders: Vec<JettonHolder>) {
        self.feed
            .lock()
            .unwrap()
            .holders
            .insert(jetton.to_string(), holders);
    }

    pub fn add_key(&self, key: &str) {
        self.feed.lock().unwrap().valid_keys.insert(key.to_string());
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn set_batch_cap(&self, cap: Option<usize>) {
        *self.batch_cap.lock().unwrap() = cap;
    }

    /// Make the next provider call fail with `err`
    pub fn fail_next(&self, err: ProviderError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn event_calls(&self) -> usize {
        self.event_calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping calls seen for `account`
    pub fn max_in_flight(&self, account: &str) -> usize {
        self.max_in_flight
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    async fn slow(&self, account: &str) -> Result<(), ProviderError> {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let count = in_flight.entry(account.to_string()).or_default();
            *count += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            let seen = max.entry(account.to_string()).or_default();
            *seen = (*seen).max(*count);
        }
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(count) = self.in_flight.lock().unwrap().get_mut(account) {
            *count -= 1;
        }
        match self.failure.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn page(&self, account: &str, cursor: Option<&Cursor>, limit: usize, range: DateRange) -> EventPage {
        let feed = self.feed.lock().unwrap();
        let matching: Vec<EventRecord> = feed
            .events
            .get(account)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| range.contains(e.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let start: usize = cursor.and_then(|c| c.0.parse().ok()).unwrap_or(0);
        let size = match *self.batch_cap.lock().unwrap() {
            Some(cap) => limit.min(cap),
            None => limit,
        };
        let end = (start + size).min(matching.len());
        let events = matching.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_cursor = (end < matching.len()).then(|| Cursor(end.to_string()));
        EventPage {
            events,
            next_cursor,
        }
    }
}

#[async_trait]
impl LedgerProvider for FixtureProvider {
    async fn resolve_dns(&self, name: &str) -> Result<String, ProviderError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.slow(name).await?;
        self.feed
            .lock()
            .unwrap()
            .dns
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("dns {name}")))
    }

    async fn account(&self, account_id: &str) -> Result<AccountSnapshot, ProviderError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.slow(account_id).await?;
        self.feed
            .lock()
            .unwrap()
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("account {account_id}")))
    }

    async fn account_events(
        &self,
        account_id: &str,
        cursor: Option<&Cursor>,
        limit: usize,
        range: DateRange,
    ) -> Result<EventPage, ProviderError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        self.slow(account_id).await?;
        Ok(self.page(account_id, cursor, limit, range))
    }

    async fn event(&self, event_id: &str) -> Result<EventRecord, ProviderError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.slow(event_id).await?;
        self.feed
            .lock()
            .unwrap()
            .single_events
            .get(event_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("event {event_id}")))
    }

    async fn jetton(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        self.contract(account_id, ContractKind::Jetton)
    }

    async fn nft_item(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        self.contract(account_id, ContractKind::NftItem)
    }

    async fn nft_collection(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        self.contract(account_id, ContractKind::NftCollection)
    }

    async fn account_nfts(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NftSummary>, ProviderError> {
        self.slow(account_id).await?;
        Ok(self.slice(|feed| feed.nfts.get(account_id), limit, offset))
    }

    async fn jetton_balances(&self, account_id: &str) -> Result<Vec<JettonBalance>, ProviderError> {
        self.slow(account_id).await?;
        Ok(self
            .feed
            .lock()
            .unwrap()
            .jettons
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn collection_items(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NftSummary>, ProviderError> {
        self.slow(account_id).await?;
        Ok(self.slice(|feed| feed.nfts.get(account_id), limit, offset))
    }

    async fn jetton_holders(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JettonHolder>, ProviderError> {
        self.slow(account_id).await?;
        Ok(self.slice(|feed| feed.holders.get(account_id), limit, offset))
    }

    async fn validate_key(&self) -> Result<(), ProviderError> {
        // the shared provider carries no user key
        Ok(())
    }
}

impl FixtureProvider {
    fn slice<T: Clone>(
        &self,
        pick: impl FnOnce(&Feed) -> Option<&Vec<T>>,
        limit: usize,
        offset: usize,
    ) -> Vec<T> {
        let feed = self.feed.lock().unwrap();
        pick(&feed)
            .map(|items| items.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default()
    }

    fn contract(&self, account_id: &str, kind: ContractKind) -> Result<ContractInfo, ProviderError> {
        self.feed
            .lock()
            .unwrap()
            .contracts
            .get(account_id)
            .filter(|info| info.kind == kind)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("contract {account_id}")))
    }
}

/// Provider bound to one user-supplied key
struct KeyedProvider {
    inner: Arc<FixtureProvider>,
    key: String,
}

#[async_trait]
impl LedgerProvider for KeyedProvider {
    async fn resolve_dns(&self, name: &str) -> Result<String, ProviderError> {
        self.inner.resolve_dns(name).await
    }

    async fn account(&self, account_id: &str) -> Result<AccountSnapshot, ProviderError> {
        self.inner.account(account_id).await
    }

    async fn account_events(
        &self,
        account_id: &str,
        cursor: Option<&Cursor>,
        limit: usize,
        range: DateRange,
    ) -> Result<EventPage, ProviderError> {
        self.inner.account_events(account_id, cursor, limit, range).await
    }

    async fn event(&self, event_id: &str) -> Result<EventRecord, ProviderError> {
        self.inner.event(event_id).await
    }

    async fn jetton(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        self.inner.jetton(account_id).await
    }

    async fn nft_item(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        self.inner.nft_item(account_id).await
    }

    async fn nft_collection(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        self.inner.nft_collection(account_id).await
    }

    async fn account_nfts(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NftSummary>, ProviderError> {
        self.inner.account_nfts(account_id, limit, offset).await
    }

    async fn jetton_balances(&self, account_id: &str) -> Result<Vec<JettonBalance>, ProviderError> {
        self.inner.jetton_balances(account_id).await
    }

    async fn collection_items(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NftSummary>, ProviderError> {
        self.inner.collection_items(account_id, limit, offset).await
    }

    async fn jetton_holders(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JettonHolder>, ProviderError> {
        self.inner.jetton_holders(account_id, limit, offset).await
    }

    async fn validate_key(&self) -> Result<(), ProviderError> {
        self.inner.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.slow("validate").await?;
        if self.inner.feed.lock().unwrap().valid_keys.contains(&self.key) {
            Ok(())
        } else {
            Err(ProviderError::Unauthorized("invalid api key".to_string()))
        }
    }
}

/// Hands out the shared fixture regardless of network
pub struct FixtureFactory(pub Arc<FixtureProvider>);

impl ProviderFactory for FixtureFactory {
    fn for_prefs(&self, _prefs: &Preferences) -> Arc<dyn LedgerProvider> {
        self.0.clone()
    }

    fn with_key(&self, key: &str, _testnet: bool) -> Arc<dyn LedgerProvider> {
        Arc::new(KeyedProvider {
            inner: self.0.clone(),
            key: key.to_string(),
        })
    }
}

// ============================================================================
// Transport fixture
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Delete {
        message_id: MessageId,
    },
    Document {
        message_id: MessageId,
        file_name: String,
        bytes: Vec<u8>,
        caption: String,
    },
    Answer {
        callback_id: String,
    },
    Inline {
        query_id: String,
        answer: InlineAnswer,
    },
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub chat_id: ChatId,
    /// Virtual time of the call
    pub at: Instant,
    pub call: Call,
}

/// Records every call; edits of unknown messages fail like the real API
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Recorded>>,
    live: Mutex<HashMap<MessageId, (String, Option<Keyboard>)>>,
    next_id: AtomicI64,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(1000),
            ..Default::default()
        })
    }

    fn record(&self, chat_id: ChatId, call: Call) {
        self.calls.lock().unwrap().push(Recorded {
            chat_id,
            at: Instant::now(),
            call,
        });
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Window renders (sends and edits), progress frames excluded
    pub fn renders(&self) -> Vec<(String, Option<Keyboard>)> {
        self.calls()
            .into_iter()
            .filter_map(|r| match r.call {
                Call::Send { text, keyboard, .. } | Call::Edit { text, keyboard, .. }
                    if !is_progress(&text) =>
                {
                    Some((text, keyboard))
                }
                _ => None,
            })
            .collect()
    }

    /// Progress frames with their virtual timestamps
    pub fn progress_frames(&self) -> Vec<(Instant, String)> {
        self.calls()
            .into_iter()
            .filter_map(|r| match r.call {
                Call::Send { text, .. } | Call::Edit { text, .. } if is_progress(&text) => {
                    Some((r.at, text))
                }
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<(String, Vec<u8>, String)> {
        self.calls()
            .into_iter()
            .filter_map(|r| match r.call {
                Call::Document {
                    file_name,
                    bytes,
                    caption,
                    ..
                } => Some((file_name, bytes, caption)),
                _ => None,
            })
            .collect()
    }

    /// Inline answers in call order
    pub fn inline_answers(&self) -> Vec<(String, InlineAnswer)> {
        self.calls()
            .into_iter()
            .filter_map(|r| match r.call {
                Call::Inline { query_id, answer } => Some((query_id, answer)),
                _ => None,
            })
            .collect()
    }

    pub fn last_render(&self) -> Option<(String, Option<Keyboard>)> {
        self.renders().pop()
    }

    pub fn last_text(&self) -> String {
        self.last_render().map(|(text, _)| text).unwrap_or_default()
    }

    /// Messages still present in the chat
    pub fn live_messages(&self) -> Vec<MessageId> {
        let mut ids: Vec<MessageId> = self.live.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drop a message as if the user deleted it
    pub fn forget(&self, message_id: MessageId) {
        self.live.lock().unwrap().remove(&message_id);
    }
}

pub fn is_progress(text: &str) -> bool {
    HOURGLASS.contains(&text) || MAGNIFIER.contains(&text)
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap()
            .insert(message_id, (text.to_string(), keyboard.cloned()));
        self.record(
            chat_id,
            Call::Send {
                message_id,
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            },
        );
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        {
            let mut live = self.live.lock().unwrap();
            let Some(current) = live.get_mut(&message_id) else {
                return Err(TransportError::MessageGone(
                    "message to edit not found".to_string(),
                ));
            };
            let next = (text.to_string(), keyboard.cloned());
            if *current == next {
                return Err(TransportError::NotModified);
            }
            *current = next;
        }
        self.record(
            chat_id,
            Call::Edit {
                message_id,
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            },
        );
        Ok(message_id)
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        if self.live.lock().unwrap().remove(&message_id).is_none() {
            return Err(TransportError::MessageGone(
                "message to delete not found".to_string(),
            ));
        }
        self.record(chat_id, Call::Delete { message_id });
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<MessageId, TransportError> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(
            chat_id,
            Call::Document {
                message_id,
                file_name: file_name.to_string(),
                bytes,
                caption: caption.to_string(),
            },
        );
        Ok(message_id)
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.record(
            0,
            Call::Answer {
                callback_id: callback_id.to_string(),
            },
        );
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        answer: &InlineAnswer,
    ) -> Result<(), TransportError> {
        self.record(
            0,
            Call::Inline {
                query_id: query_id.to_string(),
                answer: answer.clone(),
            },
        );
        Ok(())
    }
}

// ============================================================================
// Session store fixture
// ============================================================================

/// In-memory store with switchable read and clear failures
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemorySessionStore,
    pub fail_get: AtomicBool,
    pub fail_clear: AtomicBool,
}

impl FlakyStore {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clears(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get(&self, user_id: UserId) -> Result<Option<Session>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(anyhow!("session {user_id} could not be decoded"));
        }
        self.inner.get(user_id).await
    }

    async fn set(&self, session: &Session) -> Result<()> {
        self.inner.set(session).await
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(anyhow!("session store is read-only"));
        }
        self.inner.clear(user_id).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

// ============================================================================
// Harness
// ============================================================================

/// No rate limiting; tests that need it pass their own limits
pub fn unlimited() -> RateLimits {
    RateLimits {
        text: Duration::ZERO,
        key: Duration::ZERO,
        button: Duration::ZERO,
    }
}

pub struct Harness {
    pub app: Arc<App>,
    pub provider: Arc<FixtureProvider>,
    pub transport: Arc<RecordingTransport>,
    pub store: Arc<FlakyStore>,
    next_message: AtomicI64,
}

impl Harness {
    pub fn new(provider: Arc<FixtureProvider>) -> Self {
        Self::with_rates(provider, unlimited())
    }

    pub fn with_rates(provider: Arc<FixtureProvider>, rates: RateLimits) -> Self {
        let settings = AppSettings {
            rates,
            engine: EngineSettings {
                listing_page_size: 10,
                cadence: Cadence::default(),
            },
            export: ExportSettings {
                page_size: 10,
                page_pause: Duration::from_millis(200),
                max_pages: 500,
            },
            operator_chat_id: Some(-1),
        };
        Self::with_settings(provider, settings)
    }

    pub fn with_settings(provider: Arc<FixtureProvider>, settings: AppSettings) -> Self {
        let transport = RecordingTransport::new();
        let store = Arc::new(FlakyStore::default());
        let app = build_app(
            settings,
            transport.clone(),
            Arc::new(FixtureFactory(provider.clone())),
            store.clone(),
            Arc::new(TokioClock),
        );
        Self {
            app: Arc::new(app),
            provider,
            transport,
            store,
            next_message: AtomicI64::new(1),
        }
    }

    pub async fn text(&self, user_id: UserId, text: &str) -> Handled {
        let inbound = Inbound {
            user_id,
            chat_id: user_id,
            message_id: Some(self.next_message.fetch_add(1, Ordering::SeqCst)),
            callback_id: None,
            event: Event::from_text(text),
        };
        self.app.handle(inbound).await
    }

    pub async fn tap(&self, user_id: UserId, button: Button) -> Handled {
        self.app.handle(tap(user_id, button)).await
    }

    pub async fn inline(&self, user_id: UserId, query_id: &str, query: &str, offset: &str) -> Handled {
        let Some(query) = InlineQuery::parse(query_id, query, offset) else {
            panic!("not a listing query: {query}");
        };
        let inbound = Inbound {
            user_id,
            chat_id: user_id,
            message_id: None,
            callback_id: None,
            event: Event::Query(query),
        };
        self.app.handle(inbound).await
    }

    /// Stored session, read past any injected store failure
    pub async fn session(&self, user_id: UserId) -> Session {
        self.store
            .inner
            .get(user_id)
            .await
            .unwrap()
            .unwrap_or_else(|| Session::new(user_id))
    }
}

pub fn tap(user_id: UserId, button: Button) -> Inbound {
    Inbound {
        user_id,
        chat_id: user_id,
        message_id: None,
        callback_id: Some(format!("cb-{user_id}-{button}")),
        event: Event::Button(button),
    }
}
