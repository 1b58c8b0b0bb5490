//! Bot features
//!
//! - engine: window state machine and its dispatch table
//! - throttle: per-user gate and progress-indicator context
//! - export: paginated history export and its file encoders

pub mod engine;
pub mod export;
pub mod throttle;
