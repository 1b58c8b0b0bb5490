//! Per-user admission control
//!
//! Every user owns a slot in the gate's arena. The slot carries:
//! - the rate-limit stamps per handler key,
//! - the ThrottleToken flag (set while a slow call is in flight),
//! - a handler lock that serializes update handling for that user.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::core::{BotError, BotResult, HandlerKey, UserId};

use super::clock::Clock;

/// Result of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected,
}

#[derive(Debug, Clone, Copy)]
struct RateEntry {
    last_admitted: Instant,
    exceeded: u32,
}

/// In-memory handle of one user
#[derive(Debug, Default)]
pub struct UserSlot {
    token: AtomicBool,
    handler: Arc<AsyncMutex<()>>,
    rates: Mutex<HashMap<HandlerKey, RateEntry>>,
}

impl UserSlot {
    pub fn is_blocked(&self) -> bool {
        self.token.load(Ordering::Acquire)
    }

    /// Take the ThrottleToken; fails fast if one is already active
    pub(crate) fn acquire_token(&self, user_id: UserId) -> BotResult<()> {
        self.token
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| {
                BotError::Fatal(format!("throttle token already active for user {user_id}"))
            })
    }

    pub(crate) fn release_token(&self) {
        self.token.store(false, Ordering::Release);
    }

    fn is_idle(&self) -> bool {
        !self.is_blocked()
            && self.handler.try_lock().is_ok()
            && self.rates.lock().map(|r| r.is_empty()).unwrap_or(false)
    }
}

/// Held for the whole duration of one update's handling
pub struct HandlerPermit {
    _guard: OwnedMutexGuard<()>,
}

pub struct ThrottleGate {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<UserId, Arc<UserSlot>>>,
    /// Stamps older than this are dropped
    horizon: Duration,
}

impl ThrottleGate {
    pub fn new(clock: Arc<dyn Clock>, horizon: Duration) -> Self {
        Self {
            clock,
            slots: Mutex::new(HashMap::new()),
            horizon,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// The user's slot, created on first use
    pub fn slot(&self, user_id: UserId) -> Arc<UserSlot> {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.entry(user_id).or_default().clone()
    }

    /// Whether the user currently owns an active ThrottleToken
    pub fn is_blocked(&self, user_id: UserId) -> bool {
        let slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.get(&user_id).is_some_and(|slot| slot.is_blocked())
    }

    /// Rate-limit check keyed by `(user, handler)`
    ///
    /// Rejected when the last admitted call under the same key happened
    /// less than `min_interval` ago. Rejections do not move the window.
    pub fn admit(&self, user_id: UserId, key: HandlerKey, min_interval: Duration) -> Admission {
        let slot = self.slot(user_id);
        let now = self.clock.now();
        let mut rates = match slot.rates.lock() {
            Ok(rates) => rates,
            Err(poisoned) => poisoned.into_inner(),
        };

        let horizon = self.horizon.max(min_interval);
        rates.retain(|_, entry| now.saturating_duration_since(entry.last_admitted) < horizon);

        match rates.get_mut(&key) {
            Some(entry) if now.saturating_duration_since(entry.last_admitted) < min_interval => {
                entry.exceeded += 1;
                debug!(
                    user_id,
                    key = key.as_str(),
                    exceeded = entry.exceeded,
                    "rate limit exceeded"
                );
                Admission::Rejected
            }
            _ => {
                rates.insert(
                    key,
                    RateEntry {
                        last_admitted: now,
                        exceeded: 0,
                    },
                );
                Admission::Admitted
            }
        }
    }

    /// Claim the user's handler slot without waiting
    pub fn try_begin(&self, user_id: UserId) -> Option<HandlerPermit> {
        let slot = self.slot(user_id);
        slot.handler
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| HandlerPermit { _guard: guard })
    }

    /// Drop slots of users with nothing in flight and no live stamps
    pub fn sweep(&self) {
        let now = self.clock.now();
        let horizon = self.horizon;
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.retain(|_, slot| {
            if let Ok(mut rates) = slot.rates.lock() {
                rates.retain(|_, e| now.saturating_duration_since(e.last_admitted) < horizon);
            }
            Arc::strong_count(slot) > 1 || !slot.is_idle()
        });
    }

    pub fn tracked_users(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or_default()
    }
}
