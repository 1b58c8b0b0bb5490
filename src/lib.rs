//! tonview: a Telegram front-end for browsing and exporting TON ledger data

pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod modules;
pub mod store;
pub mod ui;

use std::sync::Arc;

use crate::app::{App, RateLimits};
use crate::core::ChatId;
use crate::infrastructure::telegram::Transport;
use crate::infrastructure::tonapi::ProviderFactory;
use crate::modules::engine::{EngineSettings, WindowEngine};
use crate::modules::export::{ExportPipeline, ExportSettings};
use crate::modules::throttle::{Clock, ThrottleGate};
use crate::store::SessionStore;

/// Everything `build_app` needs besides the external services
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub rates: RateLimits,
    pub engine: EngineSettings,
    pub export: ExportSettings,
    pub operator_chat_id: Option<ChatId>,
}

impl AppSettings {
    pub fn from_config(config: &config::Config) -> Self {
        Self {
            rates: config.rate_limits(),
            engine: config.engine_settings(),
            export: config.export_settings(),
            operator_chat_id: config.bot.operator_chat_id,
        }
    }
}

/// Wire gate, export pipeline and engine around the given services
pub fn build_app(
    settings: AppSettings,
    transport: Arc<dyn Transport>,
    providers: Arc<dyn ProviderFactory>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
) -> App {
    let gate = Arc::new(ThrottleGate::new(clock.clone(), settings.rates.horizon()));
    let pipeline = ExportPipeline::new(settings.export, clock);
    let engine = WindowEngine::new(
        providers,
        transport.clone(),
        store.clone(),
        gate.clone(),
        pipeline,
        settings.engine,
    );
    App::new(
        engine,
        gate,
        store,
        transport,
        settings.rates,
        settings.operator_chat_id,
    )
}
