//! Single-flight wrapper around a slow operation with live progress feedback
//!
//! `Idle -> Running -> Stopping -> Idle`. Entering takes the user's
//! ThrottleToken (blocking every other inbound event of that user) and starts
//! a background task that re-renders the anchor message with an alternating
//! pair of glyphs. Exiting always runs: the task is signalled, awaited for a
//! bounded time, and the token is released.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::{BotResult, ChatId, MessageId, TransportError, UserId};
use crate::infrastructure::telegram::Transport;

use super::clock::Clock;
use super::gate::{ThrottleGate, UserSlot};

/// Glyph pair shown while waiting on the provider
pub const HOURGLASS: [&str; 2] = ["⏳", "⌛"];

/// Glyph pair shown while searching
pub const MAGNIFIER: [&str; 2] = ["🔍", "🔎"];

/// Timing of the progress task
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub interval: Duration,
    pub initial_delay: Duration,
    /// Upper bound on waiting for the task to acknowledge a stop
    pub stop_grace: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            initial_delay: Duration::ZERO,
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// What the wrapped operation produced, plus the anchor the progress task
/// ended up on (it may have replaced a vanished message)
#[derive(Debug)]
pub struct Throttled<T> {
    pub outcome: BotResult<T>,
    pub anchor: Option<MessageId>,
}

pub struct ThrottleContext {
    gate: Arc<ThrottleGate>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    user_id: UserId,
    chat_id: ChatId,
    anchor: Option<MessageId>,
    glyphs: [&'static str; 2],
    cadence: Cadence,
}

impl ThrottleContext {
    pub fn new(
        gate: Arc<ThrottleGate>,
        transport: Arc<dyn Transport>,
        user_id: UserId,
        chat_id: ChatId,
        anchor: Option<MessageId>,
    ) -> Self {
        let clock = gate.clock();
        Self {
            gate,
            transport,
            clock,
            user_id,
            chat_id,
            anchor,
            glyphs: HOURGLASS,
            cadence: Cadence::default(),
        }
    }

    pub fn glyphs(mut self, glyphs: [&'static str; 2]) -> Self {
        self.glyphs = glyphs;
        self
    }

    pub fn cadence(mut self, cadence: Cadence) -> Self {
        self.cadence = cadence;
        self
    }

    /// Run `body` while the progress task renders.
    ///
    /// Returns `Err` only when the context cannot be entered (a second
    /// context for the same user is a fatal invariant violation). Failures
    /// of the body come back in `Throttled::outcome` after the progress task
    /// has fully stopped.
    pub async fn run<F, T>(self, body: F) -> BotResult<Throttled<T>>
    where
        F: Future<Output = BotResult<T>>,
    {
        let running = self.enter()?;
        let outcome = body.await;
        let anchor = running.exit().await;
        Ok(Throttled { outcome, anchor })
    }

    fn enter(self) -> BotResult<Running> {
        let slot = self.gate.slot(self.user_id);
        slot.acquire_token(self.user_id)?;
        let token = TokenGuard { slot };

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = ProgressWorker {
            transport: self.transport,
            clock: self.clock,
            chat_id: self.chat_id,
            anchor: self.anchor,
            glyphs: self.glyphs,
            cadence: self.cadence,
            stop: stop_rx,
        };
        let handle = tokio::spawn(worker.run());
        debug!(user_id = self.user_id, "throttle context entered");

        Ok(Running {
            user_id: self.user_id,
            fallback_anchor: self.anchor,
            stop_grace: self.cadence.stop_grace,
            stop_tx,
            handle: Some(handle),
            _token: token,
        })
    }
}

/// Releases the ThrottleToken however the scope ends
struct TokenGuard {
    slot: Arc<UserSlot>,
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        self.slot.release_token();
    }
}

struct Running {
    user_id: UserId,
    fallback_anchor: Option<MessageId>,
    stop_grace: Duration,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<Option<MessageId>>>,
    _token: TokenGuard,
}

impl Running {
    async fn exit(mut self) -> Option<MessageId> {
        let _ = self.stop_tx.send(true);
        let Some(mut handle) = self.handle.take() else {
            return self.fallback_anchor;
        };

        let anchor = match tokio::time::timeout(self.stop_grace, &mut handle).await {
            Ok(Ok(anchor)) => anchor,
            Ok(Err(err)) => {
                warn!(user_id = self.user_id, error = %err, "progress task failed");
                self.fallback_anchor
            }
            Err(_) => {
                warn!(
                    user_id = self.user_id,
                    grace_ms = self.stop_grace.as_millis() as u64,
                    "progress task did not stop in time; aborting"
                );
                handle.abort();
                self.fallback_anchor
            }
        };
        debug!(user_id = self.user_id, "throttle context exited");
        anchor
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        // Scope abandoned mid-flight (caller future dropped)
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.send(true);
            handle.abort();
        }
    }
}

struct ProgressWorker {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    chat_id: ChatId,
    anchor: Option<MessageId>,
    glyphs: [&'static str; 2],
    cadence: Cadence,
    stop: watch::Receiver<bool>,
}

impl ProgressWorker {
    async fn run(mut self) -> Option<MessageId> {
        if self.wait(self.cadence.initial_delay).await {
            return self.anchor;
        }

        let mut counter = 0usize;
        loop {
            if *self.stop.borrow() {
                break;
            }
            let started = self.clock.now();
            self.render(self.glyphs[counter % 2]).await;
            counter += 1;

            let elapsed = self.clock.now().saturating_duration_since(started);
            let delay = self.cadence.interval.saturating_sub(elapsed);
            if self.wait(delay).await {
                break;
            }
        }
        self.anchor
    }

    /// Sleep up to `delay`; true when a stop was signalled
    async fn wait(&mut self, delay: Duration) -> bool {
        if *self.stop.borrow() {
            return true;
        }
        if delay.is_zero() {
            return false;
        }
        let clock = self.clock.clone();
        tokio::select! {
            changed = self.stop.changed() => changed.is_err() || *self.stop.borrow(),
            _ = clock.sleep(delay) => *self.stop.borrow(),
        }
    }

    /// One progress frame; failures are logged and never abort the loop
    async fn render(&mut self, glyph: &str) {
        let result = match self.anchor {
            Some(message_id) => {
                match self
                    .transport
                    .edit_message(self.chat_id, message_id, glyph, None)
                    .await
                {
                    Err(TransportError::MessageGone(_)) => self.replace_anchor(glyph).await,
                    Err(TransportError::NotModified) => Ok(()),
                    other => other.map(|_| ()),
                }
            }
            None => self.replace_anchor(glyph).await,
        };

        if let Err(err) = result {
            warn!(chat_id = self.chat_id, error = %err, "progress render failed");
        }
    }

    async fn replace_anchor(&mut self, glyph: &str) -> Result<(), TransportError> {
        let message_id = self.transport.send_message(self.chat_id, glyph, None).await?;
        self.anchor = Some(message_id);
        Ok(())
    }
}
