//! Ledger provider - TON API v2 client

mod client;
pub(crate) mod types;

pub use client::{ProviderConfig, TonapiFactory, TonapiProvider};

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::ProviderError;
use crate::domain::{
    AccountSnapshot, ContractInfo, Cursor, DateRange, EventPage, EventRecord, JettonBalance,
    JettonHolder, NftSummary, Preferences,
};

/// Paginated query surface of the blockchain data provider
#[async_trait]
pub trait LedgerProvider: Send + Sync {
    /// Resolve a DNS name (`foo.ton`, `bar.t.me`) to an account address
    async fn resolve_dns(&self, name: &str) -> Result<String, ProviderError>;

    async fn account(&self, account_id: &str) -> Result<AccountSnapshot, ProviderError>;

    /// One batch of the account's event feed, newest first
    async fn account_events(
        &self,
        account_id: &str,
        cursor: Option<&Cursor>,
        limit: usize,
        range: DateRange,
    ) -> Result<EventPage, ProviderError>;

    async fn event(&self, event_id: &str) -> Result<EventRecord, ProviderError>;

    async fn jetton(&self, account_id: &str) -> Result<ContractInfo, ProviderError>;

    async fn nft_item(&self, account_id: &str) -> Result<ContractInfo, ProviderError>;

    async fn nft_collection(&self, account_id: &str) -> Result<ContractInfo, ProviderError>;

    /// NFTs owned by the account, directly or through a sale contract
    async fn account_nfts(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NftSummary>, ProviderError>;

    /// Every jetton balance of the account (the endpoint is not paged)
    async fn jetton_balances(&self, account_id: &str) -> Result<Vec<JettonBalance>, ProviderError>;

    async fn collection_items(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NftSummary>, ProviderError>;

    async fn jetton_holders(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JettonHolder>, ProviderError>;

    /// Cheap authenticated call used to check a credential
    async fn validate_key(&self) -> Result<(), ProviderError>;
}

/// Builds a provider for the network and credential a session selected
pub trait ProviderFactory: Send + Sync {
    fn for_prefs(&self, prefs: &Preferences) -> Arc<dyn LedgerProvider>;

    /// Provider using exactly `key`, for credential validation
    fn with_key(&self, key: &str, testnet: bool) -> Arc<dyn LedgerProvider>;
}
