//! Polling worker - pulls updates and spawns one handler task per update
//!
//! Handlers for different users run concurrently. Per-user serialization is
//! the gate's job; the worker only guarantees that a slow handler never
//! stalls polling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::core::{InlineAnswer, TransportError};
use crate::infrastructure::telegram::{Incoming, TelegramTransport, Update};

/// Where updates come from
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Next batch of updates with id >= `offset`; may block up to the poll timeout
    async fn next_batch(&self, offset: i64) -> Result<Vec<Update>, TransportError>;
}

#[async_trait]
impl UpdateSource for TelegramTransport {
    async fn next_batch(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.get_updates(offset).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Pause after a failed poll
    pub retry_delay: Duration,
    /// How often idle per-user state is swept
    pub sweep_every: Duration,
    /// Upper bound on waiting for in-flight handlers at shutdown
    pub drain_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(3),
            sweep_every: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Run until `shutdown` flips to true
pub async fn run_polling(
    source: Arc<dyn UpdateSource>,
    app: Arc<App>,
    settings: PollSettings,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut offset = 0i64;
    let mut tasks = JoinSet::new();
    let mut sweep = interval(settings.sweep_every);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("polling started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = sweep.tick() => {
                app.sweep();
                debug!(users = app.gate().tracked_users(), "gate swept");
            }
            batch = source.next_batch(offset) => match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        dispatch(&mut tasks, &app, update);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "polling failed; retrying");
                    sleep(settings.retry_delay).await;
                }
            },
        }

        while let Some(joined) = tasks.try_join_next() {
            if let Err(err) = joined {
                error!(error = %err, "update handler panicked");
            }
        }
    }

    info!(in_flight = tasks.len(), "polling stopped; draining handlers");
    let drained = tokio::time::timeout(settings.drain_timeout, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(remaining = tasks.len(), "handlers still running at shutdown; aborting");
        tasks.abort_all();
    }
    Ok(())
}

fn dispatch(tasks: &mut JoinSet<()>, app: &Arc<App>, update: Update) {
    let update_id = update.update_id;
    match update.classify() {
        Incoming::Inbound(inbound) => {
            let app = app.clone();
            tasks.spawn(async move {
                let user_id = inbound.user_id;
                let handled = app.handle(inbound).await;
                debug!(update_id, user_id, ?handled, "update handled");
            });
        }
        Incoming::Stray { callback_id } => {
            let app = app.clone();
            tasks.spawn(async move {
                app.answer_callback(&callback_id).await;
            });
        }
        Incoming::UnknownQuery { query_id } => {
            let app = app.clone();
            tasks.spawn(async move {
                app.answer_inline(&query_id, &InlineAnswer::default()).await;
            });
        }
        Incoming::Ignored => debug!(update_id, "update ignored"),
    }
}
