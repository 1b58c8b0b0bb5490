//! Export Module
//!
//! Walks an account's cursor-paginated event feed, aggregates flow totals
//! and serializes the accumulated rows as CSV or JSON.
//!
//! The loop ends when the feed reports exhaustion (empty batch, no cursor,
//! or a short batch). `max_pages` is a safety bound on top of that; a feed
//! that never exhausts is otherwise an external-dependency risk.

mod csv_export;
pub mod format;
pub mod json_export;
pub mod rows;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::{BotError, BotResult, ExportFormat};
use crate::domain::{AccountSnapshot, Cursor, DateRange, EventKind, EventPage, EventRecord};
use crate::infrastructure::tonapi::LedgerProvider;
use crate::modules::throttle::Clock;

pub use format::format_ton;
pub use json_export::read_rows;
pub use rows::{EventRow, EventRows, COLUMNS};

#[derive(Debug, Clone, Copy)]
pub struct ExportSettings {
    /// Events requested per batch
    pub page_size: usize,
    /// Pause between batches
    pub page_pause: Duration,
    pub max_pages: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            page_pause: Duration::from_secs(1),
            max_pages: 500,
        }
    }
}

/// State of one export run; dropped when the run ends
#[derive(Debug)]
pub struct ExportJob {
    account: AccountSnapshot,
    range: DateRange,
    cursor: Option<Cursor>,
    events: Vec<EventRecord>,
    sent_total: u128,
    received_total: u128,
    pages: u32,
    started_at: tokio::time::Instant,
}

impl ExportJob {
    pub fn new(account: AccountSnapshot, range: DateRange, started_at: tokio::time::Instant) -> Self {
        Self {
            account,
            range,
            cursor: None,
            events: Vec::new(),
            sent_total: 0,
            received_total: 0,
            pages: 0,
            started_at,
        }
    }

    /// Fold one batch in; returns whether the feed may have more
    pub fn absorb(&mut self, batch: EventPage, limit: usize) -> bool {
        let received = batch.events.len();
        if received == 0 {
            return false;
        }
        self.pages += 1;

        for event in batch.events {
            if !self.range.contains(event.timestamp) {
                continue;
            }
            if let (EventKind::Transfer, Some(transfer)) = (event.kind, &event.transfer) {
                if self.account.owns(&transfer.sender) {
                    self.sent_total += transfer.amount;
                } else {
                    self.received_total += transfer.amount;
                }
            }
            self.events.push(event);
        }

        self.cursor = batch.next_cursor;
        self.cursor.is_some() && received >= limit
    }

    /// Close the run at `now`; elapsed time is measured from `started_at`
    fn finish(self, truncated: bool, now: tokio::time::Instant) -> ExportResult {
        let elapsed = now.saturating_duration_since(self.started_at);
        ExportResult {
            events: self.events,
            sent_total: self.sent_total,
            received_total: self.received_total,
            pages: self.pages,
            truncated,
            elapsed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportResult {
    pub events: Vec<EventRecord>,
    /// Nanotons sent by the account in simple transfers
    pub sent_total: u128,
    /// Nanotons received by the account in simple transfers
    pub received_total: u128,
    pub pages: u32,
    /// Stopped by `max_pages` before the feed was exhausted
    pub truncated: bool,
    pub elapsed: Duration,
}

impl ExportResult {
    pub fn row_count(&self) -> usize {
        self.events.len()
    }

    pub fn rows(&self) -> Vec<EventRow> {
        self.events.iter().map(EventRow::from).collect()
    }

    pub fn serialize(&self, format: ExportFormat) -> BotResult<Vec<u8>> {
        let rows = self.rows();
        match format {
            ExportFormat::Csv => csv_export::write_rows(&rows)
                .map_err(|e| BotError::Transient(format!("csv export: {e}"))),
            ExportFormat::Json => json_export::write_rows(&rows)
                .map_err(|e| BotError::Transient(format!("json export: {e}"))),
        }
    }

    /// Document caption: row count and formatted totals
    pub fn caption(&self) -> String {
        format!(
            "Events: {}\nSent: {} TON\nReceived: {} TON",
            self.row_count(),
            format_ton(self.sent_total),
            format_ton(self.received_total)
        )
    }
}

pub struct ExportPipeline {
    settings: ExportSettings,
    clock: Arc<dyn Clock>,
}

impl ExportPipeline {
    pub fn new(settings: ExportSettings, clock: Arc<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    pub fn settings(&self) -> ExportSettings {
        self.settings
    }

    pub async fn run(
        &self,
        provider: &dyn LedgerProvider,
        account: &AccountSnapshot,
        range: DateRange,
    ) -> BotResult<ExportResult> {
        let limit = self.settings.page_size.max(1);
        let mut job = ExportJob::new(account.clone(), range, self.clock.now());
        let mut truncated = false;

        loop {
            let batch = provider
                .account_events(&account.address, job.cursor.as_ref(), limit, range)
                .await?;
            if !job.absorb(batch, limit) {
                break;
            }
            if job.pages >= self.settings.max_pages {
                truncated = true;
                warn!(
                    account = %account.address,
                    pages = job.pages,
                    "export stopped at the page bound"
                );
                break;
            }
            self.clock.sleep(self.settings.page_pause).await;
        }

        let result = job.finish(truncated, self.clock.now());
        info!(
            account = %account.address,
            rows = result.row_count(),
            pages = result.pages,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "export finished"
        );
        Ok(result)
    }
}

/// File name of an export document
pub fn file_name(account: &AccountSnapshot, format: ExportFormat) -> String {
    let stem: String = account
        .address
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("events_{}.{}", stem, format.extension())
}
