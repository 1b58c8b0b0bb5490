//! Concurrency and progress subsystem
//!
//! - `ThrottleGate`: rate limiting per `(user, handler)` plus the per-user block check
//! - `ThrottleContext`: single-flight scope with a background progress task
//! - `Clock`: injected time source

pub mod clock;
pub mod context;
pub mod gate;

pub use clock::{Clock, ManualClock, TokioClock};
pub use context::{Cadence, ThrottleContext, Throttled, HOURGLASS, MAGNIFIER};
pub use gate::{Admission, HandlerPermit, ThrottleGate, UserSlot};
