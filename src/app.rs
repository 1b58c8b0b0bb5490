//! Update handling: gate checks, engine dispatch, top-level error handler

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::core::{
    BotError, ChatId, Command, Event, HandlerKey, Inbound, InlineAnswer, UserId, Window,
};
use crate::domain::Session;
use crate::infrastructure::telegram::Transport;
use crate::modules::engine::{Outcome, WindowEngine};
use crate::modules::throttle::{Admission, ThrottleGate};
use crate::store::SessionStore;
use crate::ui::{self, ErrorView};

/// Minimum spacing between two admitted updates of one handler kind
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Free-text searches and typed date ranges
    pub text: Duration,
    /// Credential submissions and slash commands
    pub key: Duration,
    /// Inline buttons
    pub button: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            text: Duration::from_secs(2),
            key: Duration::from_secs(1),
            button: Duration::from_millis(300),
        }
    }
}

impl RateLimits {
    pub fn interval(&self, key: HandlerKey) -> Duration {
        match key {
            HandlerKey::Search | HandlerKey::RangeInput => self.text,
            HandlerKey::Key | HandlerKey::Command => self.key,
            HandlerKey::Button | HandlerKey::Query => self.button,
        }
    }

    /// Age after which a rate stamp can no longer reject anything
    pub fn horizon(&self) -> Duration {
        self.text.max(self.key).max(self.button)
    }
}

/// How one update ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Rejected by the gate (busy user, rate limit, handler in flight)
    Dropped,
    /// Reached the engine but was a no-op
    Ignored,
    Rendered,
    /// Inline query answered; the session was not touched
    Answered,
    /// Went through the top-level error handler
    Failed,
}

pub struct App {
    engine: WindowEngine,
    gate: Arc<ThrottleGate>,
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn Transport>,
    rates: RateLimits,
    operator_chat_id: Option<ChatId>,
}

impl App {
    pub fn new(
        engine: WindowEngine,
        gate: Arc<ThrottleGate>,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn Transport>,
        rates: RateLimits,
        operator_chat_id: Option<ChatId>,
    ) -> Self {
        Self {
            engine,
            gate,
            store,
            transport,
            rates,
            operator_chat_id,
        }
    }

    pub fn engine(&self) -> &WindowEngine {
        &self.engine
    }

    pub fn gate(&self) -> &Arc<ThrottleGate> {
        &self.gate
    }

    /// Handle one inbound update end to end.
    ///
    /// Callback queries are always answered and the user's own text
    /// message is always cleaned up, whether or not the update got through.
    /// An inline query the gate drops gets an empty answer.
    pub async fn handle(&self, inbound: Inbound) -> Handled {
        let answer = async {
            if let Some(callback_id) = &inbound.callback_id {
                self.answer_callback(callback_id).await;
            }
        };
        let ((), handled) = futures::join!(answer, self.process(&inbound));

        if let Some(message_id) = inbound.message_id {
            ui::delete_quietly(self.transport.as_ref(), inbound.chat_id, message_id).await;
        }
        if let (Event::Query(query), Handled::Dropped) = (&inbound.event, handled) {
            self.answer_inline(&query.id, &InlineAnswer::default()).await;
        }
        handled
    }

    /// Acknowledge a callback whose data no window understands
    pub async fn answer_callback(&self, callback_id: &str) {
        if let Err(err) = self.transport.answer_callback(callback_id).await {
            debug!(callback_id, error = %err, "callback answer skipped");
        }
    }

    pub async fn answer_inline(&self, query_id: &str, answer: &InlineAnswer) {
        if let Err(err) = self.transport.answer_inline_query(query_id, answer).await {
            debug!(query_id, error = %err, "inline answer skipped");
        }
    }

    /// Release per-user state nobody holds anymore
    pub fn sweep(&self) {
        self.gate.sweep();
    }

    async fn process(&self, inbound: &Inbound) -> Handled {
        let user_id = inbound.user_id;
        if self.gate.is_blocked(user_id) {
            debug!(user_id, "user busy; update dropped");
            return Handled::Dropped;
        }
        let Some(_permit) = self.gate.try_begin(user_id) else {
            debug!(user_id, "handler in flight; update dropped");
            return Handled::Dropped;
        };

        let mut session = match self.store.get(user_id).await {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(user_id),
            // /start rebuilds the session, so the stored one is not needed
            Err(err) if inbound.event == Event::Command(Command::Start) => {
                warn!(user_id, error = %format!("{err:#}"), "session load failed; starting over");
                Session::new(user_id)
            }
            Err(err) => {
                let reason = format!("session load failed: {err:#}");
                error!(user_id, %reason, "session unavailable");
                if let Event::Query(query) = &inbound.event {
                    self.answer_inline(&query.id, &InlineAnswer::default()).await;
                } else {
                    self.notify_operator(user_id, &reason).await;
                    self.render_detached(inbound.chat_id, ErrorView::Failure).await;
                }
                return Handled::Failed;
            }
        };

        let key = handler_key(&session, &inbound.event);
        if self.gate.admit(user_id, key, self.rates.interval(key)) == Admission::Rejected {
            return Handled::Dropped;
        }

        let result = match &inbound.event {
            Event::Query(query) => {
                return match self.engine.inline_query(&session, query).await {
                    Ok(()) => Handled::Answered,
                    Err(err) => {
                        warn!(user_id, error = %err, "inline query unanswered");
                        Handled::Failed
                    }
                };
            }
            Event::Command(command) => {
                self.engine
                    .command(&mut session, inbound.chat_id, command)
                    .await
            }
            event => {
                self.engine
                    .dispatch(&mut session, inbound.chat_id, event)
                    .await
            }
        };

        match result {
            Ok(Outcome::Rendered) => Handled::Rendered,
            Ok(Outcome::Ignored) => Handled::Ignored,
            Err(err) => {
                self.handle_error(&mut session, inbound.chat_id, err).await;
                Handled::Failed
            }
        }
    }

    /// Errors the engine surfaced; each ends in exactly one render
    async fn handle_error(&self, session: &mut Session, chat_id: ChatId, err: BotError) {
        let user_id = session.user_id;
        // Local errors that reach this point came from the store or the transport
        if err.is_local() {
            warn!(user_id, error = %err, kind = err.kind(), "update finished with an error");
            self.render_detached(chat_id, ErrorView::Unavailable).await;
            return;
        }
        let model = match err {
            BotError::Auth(reason) => {
                info!(user_id, %reason, "credential rejected by provider");
                session.enter(Window::KeyInvalid);
                ui::render(session, None)
            }
            BotError::RateLimited(reason) => {
                info!(user_id, %reason, "provider rate limit hit");
                session.go_main();
                ui::render_error(ErrorView::RateLimited)
            }
            other => {
                let reason = other.to_string();
                error!(user_id, %reason, "fatal error while handling update");
                self.notify_operator(user_id, &reason).await;
                session.go_main();
                ui::render_error(ErrorView::Failure)
            }
        };

        if let Err(err) = self.engine.show(session, chat_id, &model, false).await {
            warn!(user_id, error = %err, "error view could not be shown");
        }
    }

    async fn notify_operator(&self, user_id: UserId, reason: &str) {
        let Some(operator) = self.operator_chat_id else {
            return;
        };
        let text = format!("#ERROR\n\nUser: {user_id}\nError: {reason}");
        if let Err(err) = self.transport.send_message(operator, &text, None).await {
            warn!(error = %err, "operator notification failed");
        }
    }

    /// Render without a session (the store is unavailable)
    async fn render_detached(&self, chat_id: ChatId, view: ErrorView) {
        let model = ui::render_error(view);
        if let Err(err) = self
            .transport
            .send_message(chat_id, &model.text, Some(&model.keyboard))
            .await
        {
            warn!(chat_id, error = %err, "detached render failed");
        }
    }
}

/// Rate-limit bucket of an update, given the window it arrives in
pub fn handler_key(session: &Session, event: &Event) -> HandlerKey {
    match event {
        Event::Command(_) => HandlerKey::Command,
        Event::Query(_) => HandlerKey::Query,
        Event::Button(_) => HandlerKey::Button,
        Event::Text(_) => match session.window {
            Window::SetKey | Window::KeyInvalid => HandlerKey::Key,
            Window::SelectDateRange => HandlerKey::RangeInput,
            _ => HandlerKey::Search,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Button;

    #[test]
    fn test_handler_keys_follow_window() {
        let mut session = Session::new(1);
        let text = Event::Text("hello".into());
        assert_eq!(handler_key(&session, &text), HandlerKey::Search);
        session.enter(Window::SetKey);
        assert_eq!(handler_key(&session, &text), HandlerKey::Key);
        assert_eq!(
            handler_key(&session, &Event::Button(Button::GoMain)),
            HandlerKey::Button
        );
        let query = crate::core::InlineQuery::parse("q", "tokens 0:aa", "").unwrap();
        assert_eq!(handler_key(&session, &Event::Query(query)), HandlerKey::Query);
    }

    #[test]
    fn test_rate_horizon_is_widest() {
        let rates = RateLimits::default();
        assert_eq!(rates.horizon(), Duration::from_secs(2));
        assert_eq!(rates.interval(HandlerKey::Button), Duration::from_millis(300));
    }
}
