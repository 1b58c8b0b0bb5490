//! HTTP client for the TON API

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::core::ProviderError;
use crate::domain::{
    AccountSnapshot, ContractInfo, ContractKind, Cursor, DateRange, EventPage, EventRecord,
    JettonBalance, JettonHolder, NftSummary, Preferences,
};

use super::types::{
    self, Account, AccountEvents, DnsRecord, JettonBalances, JettonHolders, NftItems,
};
use super::{LedgerProvider, ProviderFactory};

/// Endpoints and the shared credential
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub mainnet_url: String,
    pub testnet_url: String,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            mainnet_url: "https://tonapi.io".to_string(),
            testnet_url: "https://testnet.tonapi.io".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

pub struct TonapiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl TonapiProvider {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(path, status = status.as_u16(), "provider call failed");
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("{path}: {e}")))
    }
}

#[async_trait]
impl LedgerProvider for TonapiProvider {
    async fn resolve_dns(&self, name: &str) -> Result<String, ProviderError> {
        let record: DnsRecord = self
            .get(&format!("/v2/dns/{}/resolve", name.to_lowercase()), &[])
            .await?;
        record
            .wallet
            .map(|wallet| wallet.address)
            .ok_or_else(|| ProviderError::NotFound(format!("{name} has no wallet record")))
    }

    async fn account(&self, account_id: &str) -> Result<AccountSnapshot, ProviderError> {
        let account: Account = self.get(&format!("/v2/accounts/{account_id}"), &[]).await?;
        Ok(account.into())
    }

    async fn account_events(
        &self,
        account_id: &str,
        cursor: Option<&Cursor>,
        limit: usize,
        range: DateRange,
    ) -> Result<EventPage, ProviderError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("before_lt", cursor.0.clone()));
        }
        if let Some((start, end)) = range.bounds() {
            query.push(("start_date", start.to_string()));
            query.push(("end_date", end.to_string()));
        }

        let events: AccountEvents = self
            .get(&format!("/v2/accounts/{account_id}/events"), &query)
            .await?;
        types::event_page(events)
    }

    async fn event(&self, event_id: &str) -> Result<EventRecord, ProviderError> {
        let raw: Value = self.get(&format!("/v2/events/{event_id}"), &[]).await?;
        types::event_record(raw)
    }

    async fn jetton(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        let raw: Value = self.get(&format!("/v2/jettons/{account_id}"), &[]).await?;
        Ok(types::contract_info(ContractKind::Jetton, raw))
    }

    async fn nft_item(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        let raw: Value = self.get(&format!("/v2/nfts/{account_id}"), &[]).await?;
        Ok(types::contract_info(ContractKind::NftItem, raw))
    }

    async fn nft_collection(&self, account_id: &str) -> Result<ContractInfo, ProviderError> {
        let raw: Value = self
            .get(&format!("/v2/nfts/collections/{account_id}"), &[])
            .await?;
        Ok(types::contract_info(ContractKind::NftCollection, raw))
    }

    async fn account_nfts(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NftSummary>, ProviderError> {
        let query = [
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("indirect_ownership", "true".to_string()),
        ];
        let items: NftItems = self
            .get(&format!("/v2/accounts/{account_id}/nfts"), &query)
            .await?;
        Ok(items.nft_items.into_iter().map(NftSummary::from).collect())
    }

    async fn jetton_balances(&self, account_id: &str) -> Result<Vec<JettonBalance>, ProviderError> {
        let raw: JettonBalances = self
            .get(&format!("/v2/accounts/{account_id}/jettons"), &[])
            .await?;
        types::jetton_balances(raw)
    }

    async fn collection_items(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NftSummary>, ProviderError> {
        let query = [("limit", limit.to_string()), ("offset", offset.to_string())];
        let items: NftItems = self
            .get(&format!("/v2/nfts/collections/{account_id}/items"), &query)
            .await?;
        Ok(items.nft_items.into_iter().map(NftSummary::from).collect())
    }

    async fn jetton_holders(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JettonHolder>, ProviderError> {
        let query = [("limit", limit.to_string()), ("offset", offset.to_string())];
        let raw: JettonHolders = self
            .get(&format!("/v2/jettons/{account_id}/holders"), &query)
            .await?;
        types::jetton_holders(raw)
    }

    async fn validate_key(&self) -> Result<(), ProviderError> {
        let _: Value = self
            .get(
                "/v2/rates",
                &[("tokens", "ton".to_string()), ("currencies", "usd".to_string())],
            )
            .await?;
        Ok(())
    }
}

/// Shares one HTTP connection pool across every per-session provider
pub struct TonapiFactory {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl TonapiFactory {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http, config })
    }

    fn base_url(&self, testnet: bool) -> &str {
        if testnet {
            &self.config.testnet_url
        } else {
            &self.config.mainnet_url
        }
    }
}

impl ProviderFactory for TonapiFactory {
    fn for_prefs(&self, prefs: &Preferences) -> Arc<dyn LedgerProvider> {
        let key = prefs.api_key.clone().or_else(|| self.config.api_key.clone());
        Arc::new(TonapiProvider::new(
            self.http.clone(),
            self.base_url(prefs.testnet),
            key,
        ))
    }

    fn with_key(&self, key: &str, testnet: bool) -> Arc<dyn LedgerProvider> {
        Arc::new(TonapiProvider::new(
            self.http.clone(),
            self.base_url(testnet),
            Some(key.to_string()),
        ))
    }
}
