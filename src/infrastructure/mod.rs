//! Infrastructure layer - external service integrations
//!
//! This layer contains:
//! - Telegram Bot API transport (long polling, message edits, documents)
//! - TON API ledger provider
//! - Polling worker that feeds updates to the app

pub mod runtime;
pub mod telegram;
pub mod tonapi;
