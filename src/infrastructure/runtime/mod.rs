//! Runtime infrastructure - long-polling worker fanning updates out to tasks

mod worker;

pub use worker::{run_polling, PollSettings, UpdateSource};
