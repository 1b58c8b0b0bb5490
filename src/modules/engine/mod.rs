//! Window engine
//!
//! Maps `(window, event)` to the next window through the dispatch table,
//! runs slow provider calls inside a `ThrottleContext`, renders the result on
//! the anchor message and persists the session as one write.
//!
//! Transitions work on a copy of the session. The copy replaces the session
//! only when the transition succeeds, so a failed provider call leaves the
//! user in the pre-transition window (only the anchor is adopted, since the
//! progress task may have replaced it).

mod inline;
mod pagination;
mod search;
mod table;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::{
    BotError, BotResult, Button, ChatId, Command, Event, ExportFormat, InlineAnswer, InlineQuery,
    RangePreset, Window,
};
use crate::domain::{
    AccountPayload, ContractKind, DateRange, DetailView, EventListing, EventPayload, EventRecord,
    ExportDraft, Payload, Session,
};
use crate::infrastructure::telegram::Transport;
use crate::infrastructure::tonapi::{LedgerProvider, ProviderFactory};
use crate::modules::export::{self, ExportPipeline};
use crate::modules::throttle::{Cadence, ThrottleContext, ThrottleGate, HOURGLASS, MAGNIFIER};
use crate::store::SessionStore;
use crate::ui::{self, ErrorView, Notice, RenderModel};

pub use pagination::{apply_batch, plan, PageRequest};
pub use search::{classify_query, Query};
pub use table::{DispatchTable, Transition};

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Items per page of the event listing (also the fetch batch size)
    pub listing_page_size: usize,
    pub cadence: Cadence,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            listing_page_size: 10,
            cadence: Cadence::default(),
        }
    }
}

/// Result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A window (or error view) was rendered and the session persisted
    Rendered,
    /// Stray or out-of-range event; nothing changed
    Ignored,
}

enum Step {
    Render(Option<Notice>),
    /// Render as a new message (below a just-delivered document)
    RenderFresh(Option<Notice>),
    Ignore,
}

enum Found {
    Account(AccountPayload),
    Event(EventRecord),
}

pub struct WindowEngine {
    table: DispatchTable,
    providers: Arc<dyn ProviderFactory>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    gate: Arc<ThrottleGate>,
    pipeline: ExportPipeline,
    settings: EngineSettings,
}

impl WindowEngine {
    pub fn new(
        providers: Arc<dyn ProviderFactory>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        gate: Arc<ThrottleGate>,
        pipeline: ExportPipeline,
        settings: EngineSettings,
    ) -> Self {
        Self {
            table: DispatchTable::standard(),
            providers,
            transport,
            store,
            gate,
            pipeline,
            settings,
        }
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Handle one window event.
    ///
    /// NotFound and Transient failures are recovered here by rendering.
    /// Auth, RateLimited and Fatal come back as `Err` for the top-level
    /// handler, with the session still in its pre-transition window.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        chat_id: ChatId,
        event: &Event,
    ) -> BotResult<Outcome> {
        let Some(tag) = event.tag() else {
            return Ok(Outcome::Ignored);
        };
        let Some(transition) = self.table.lookup(session.window, tag) else {
            debug!(user_id = session.user_id, window = ?session.window, ?tag, "stray event ignored");
            return Ok(Outcome::Ignored);
        };
        if !session.payload_fits(session.window) {
            return Err(BotError::Fatal(format!(
                "payload {} does not fit window {:?}",
                payload_kind(&session.payload),
                session.window
            )));
        }
        debug!(user_id = session.user_id, window = ?session.window, ?tag, ?transition, "dispatch");

        let mut next = session.clone();
        match self.apply(transition, &mut next, chat_id, event).await {
            Ok(Step::Ignore) => Ok(Outcome::Ignored),
            Ok(Step::Render(notice)) => {
                *session = next;
                self.commit(session, chat_id, notice.as_ref(), false).await?;
                Ok(Outcome::Rendered)
            }
            Ok(Step::RenderFresh(notice)) => {
                *session = next;
                self.commit(session, chat_id, notice.as_ref(), true).await?;
                Ok(Outcome::Rendered)
            }
            Err(err) => {
                session.anchor = next.anchor;
                self.recover(session, chat_id, err).await
            }
        }
    }

    /// Slash commands bypass the dispatch table and work from any window
    pub async fn command(
        &self,
        session: &mut Session,
        chat_id: ChatId,
        command: &Command,
    ) -> BotResult<Outcome> {
        match command {
            Command::Start => {
                info!(user_id = session.user_id, "session reset");
                self.store
                    .clear(session.user_id)
                    .await
                    .map_err(|e| BotError::Transient(format!("session store: {e:#}")))?;
                session.reset();
                let model = ui::render(session, None);
                self.show(session, chat_id, &model, true).await?;
            }
            Command::SetKey => {
                session.enter(Window::SetKey);
                self.commit(session, chat_id, None, false).await?;
            }
            Command::SwitchNetwork => {
                let notice = toggle_network(session);
                self.commit(session, chat_id, Some(&notice), false).await?;
            }
            Command::Unknown(text) => {
                debug!(user_id = session.user_id, command = %text, "unknown command ignored");
                return Ok(Outcome::Ignored);
            }
        }
        Ok(Outcome::Rendered)
    }

    /// Answer an inline listing request.
    ///
    /// Leaves the session and the anchor alone. Provider failures end the
    /// listing with an empty answer; only the answer call itself can fail.
    pub async fn inline_query(&self, session: &Session, query: &InlineQuery) -> BotResult<()> {
        let provider = self.providers.for_prefs(&session.prefs);
        let answer = match inline::answer(provider.as_ref(), query).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(
                    user_id = session.user_id,
                    kind = %query.kind,
                    account = %query.account,
                    error = %err,
                    "inline listing failed"
                );
                InlineAnswer::default()
            }
        };
        debug!(user_id = session.user_id, kind = %query.kind, results = answer.articles.len(), "inline answer");
        self.transport
            .answer_inline_query(&query.id, &answer)
            .await?;
        Ok(())
    }

    /// Show `model` on the session's anchor and persist the session.
    ///
    /// The session is persisted even when the render fails so the anchor
    /// bookkeeping stays consistent; the render failure is returned after.
    pub async fn show(
        &self,
        session: &mut Session,
        chat_id: ChatId,
        model: &RenderModel,
        fresh: bool,
    ) -> BotResult<()> {
        let transport = self.transport.as_ref();
        let rendered = if fresh {
            ui::send_fresh(transport, chat_id, session.anchor, model).await
        } else {
            ui::apply_render(transport, chat_id, session.anchor, model).await
        };
        let rendered = match rendered {
            Ok(message_id) => {
                session.anchor = Some(message_id);
                Ok(())
            }
            Err(err) => Err(BotError::from(err)),
        };
        self.persist(session).await?;
        rendered
    }

    async fn commit(
        &self,
        session: &mut Session,
        chat_id: ChatId,
        notice: Option<&Notice>,
        fresh: bool,
    ) -> BotResult<()> {
        let model = ui::render(session, notice);
        self.show(session, chat_id, &model, fresh).await
    }

    async fn persist(&self, session: &Session) -> BotResult<()> {
        self.store
            .set(session)
            .await
            .map_err(|e| BotError::Transient(format!("session store: {e:#}")))
    }

    async fn recover(
        &self,
        session: &mut Session,
        chat_id: ChatId,
        err: BotError,
    ) -> BotResult<Outcome> {
        match err {
            BotError::Transient(reason) => {
                warn!(user_id = session.user_id, window = ?session.window, %reason, "transition failed; window kept");
                self.commit(session, chat_id, Some(&Notice::Unavailable), false)
                    .await?;
                Ok(Outcome::Rendered)
            }
            BotError::NotFound(reason) => {
                debug!(user_id = session.user_id, %reason, "lookup found nothing");
                session.go_main();
                let model = ui::render_error(ErrorView::NotFound);
                self.show(session, chat_id, &model, false).await?;
                Ok(Outcome::Rendered)
            }
            other => Err(other),
        }
    }

    async fn apply(
        &self,
        transition: Transition,
        s: &mut Session,
        chat_id: ChatId,
        event: &Event,
    ) -> BotResult<Step> {
        match (transition, event) {
            (Transition::GoMain, _) => {
                s.go_main();
                Ok(Step::Render(None))
            }
            (Transition::OpenSetKey, _) => {
                s.enter(Window::SetKey);
                Ok(Step::Render(None))
            }
            (Transition::DeleteKey, _) => {
                s.prefs.api_key = None;
                s.go_main();
                Ok(Step::Render(Some(Notice::KeyRemoved)))
            }
            (Transition::ToggleNetwork, _) => Ok(Step::Render(Some(toggle_network(s)))),
            (Transition::SubmitKey, Event::Text(key)) => self.submit_key(s, chat_id, key).await,
            (Transition::Search, Event::Text(text)) => self.search(s, chat_id, text).await,
            (Transition::OpenEvents, _) => self.open_events(s, chat_id).await,
            (Transition::OpenMetadata, _) => Ok(open_metadata(s)),
            (Transition::OpenAttributes, _) => Ok(open_attributes(s)),
            (Transition::Paginate, Event::Button(Button::Page(page))) => {
                self.paginate(s, chat_id, *page).await
            }
            (Transition::OpenEvent, Event::Button(Button::SelectEvent(index))) => {
                Ok(open_event(s, *index))
            }
            (Transition::OpenEventJson, _) => {
                s.enter(Window::InformationEventJson);
                Ok(Step::Render(None))
            }
            (Transition::Back, _) => back(s),
            (Transition::OpenExport, _) => Ok(open_export(s)),
            (Transition::PickRange, Event::Button(Button::Range(preset))) => {
                let range = match preset {
                    RangePreset::AllTime => DateRange::AllTime,
                    RangePreset::LastDays(days) => DateRange::last_days(*days, Utc::now()),
                };
                choose_range(s, range)
            }
            (Transition::TypeRange, Event::Text(text)) => match DateRange::parse(text) {
                Some(range) => choose_range(s, range),
                None => Ok(Step::Render(Some(Notice::BadRange))),
            },
            (Transition::ConfirmExport, Event::Button(Button::Format(format))) => {
                self.confirm_export(s, chat_id, *format).await
            }
            _ => Ok(Step::Ignore),
        }
    }

    /// Run `body` with the progress task rendering on the session's anchor
    async fn throttled<T, F>(
        &self,
        session: &mut Session,
        chat_id: ChatId,
        glyphs: [&'static str; 2],
        body: F,
    ) -> BotResult<T>
    where
        F: Future<Output = BotResult<T>>,
    {
        let throttled = ThrottleContext::new(
            self.gate.clone(),
            self.transport.clone(),
            session.user_id,
            chat_id,
            session.anchor,
        )
        .glyphs(glyphs)
        .cadence(self.settings.cadence)
        .run(body)
        .await?;
        session.anchor = throttled.anchor;
        throttled.outcome
    }

    async fn submit_key(&self, s: &mut Session, chat_id: ChatId, key: &str) -> BotResult<Step> {
        let key = key.trim().to_string();
        if key.is_empty() {
            return Ok(Step::Ignore);
        }
        let provider = self.providers.with_key(&key, s.prefs.testnet);
        let validated = self
            .throttled(s, chat_id, HOURGLASS, async {
                provider.validate_key().await.map_err(BotError::from)
            })
            .await;

        match validated {
            Ok(()) => {
                s.prefs.api_key = Some(key);
                s.go_main();
                Ok(Step::Render(Some(Notice::KeySaved)))
            }
            // stays in SetKey / KeyInvalid
            Err(BotError::Auth(reason)) => {
                debug!(user_id = s.user_id, %reason, "credential rejected");
                Ok(Step::Render(Some(Notice::KeyRejected)))
            }
            Err(err) => Err(err),
        }
    }

    async fn search(&self, s: &mut Session, chat_id: ChatId, text: &str) -> BotResult<Step> {
        if text.trim().is_empty() {
            return Ok(Step::Ignore);
        }
        let query = classify_query(text);
        let provider = self.providers.for_prefs(&s.prefs);
        let found = self
            .throttled(s, chat_id, MAGNIFIER, lookup(provider.as_ref(), query))
            .await?;

        match found {
            Found::Account(payload) => {
                s.payload = Payload::Account(Box::new(payload));
                s.enter(Window::Information);
            }
            Found::Event(event) => {
                s.payload = Payload::Event(Box::new(EventPayload { event }));
                s.enter(Window::InformationEvent);
            }
        }
        Ok(Step::Render(None))
    }

    async fn open_events(&self, s: &mut Session, chat_id: ChatId) -> BotResult<Step> {
        let Some(address) = s.account().map(|a| a.account.address.clone()) else {
            return Ok(Step::Ignore);
        };
        let page_size = self.settings.listing_page_size.max(1);
        let provider = self.providers.for_prefs(&s.prefs);
        let batch = self
            .throttled(s, chat_id, HOURGLASS, async {
                provider
                    .account_events(&address, None, page_size, DateRange::AllTime)
                    .await
                    .map_err(BotError::from)
            })
            .await?;

        let mut listing = EventListing::new(page_size);
        apply_batch(&mut listing, batch, page_size);
        let account = account_mut(s)?;
        account.listing = Some(listing);
        account.detail = DetailView::Events;
        account.selected = None;
        s.enter(Window::Detail);
        Ok(Step::Render(None))
    }

    async fn paginate(&self, s: &mut Session, chat_id: ChatId, page: u32) -> BotResult<Step> {
        let Some(account) = s.account() else {
            return Ok(Step::Ignore);
        };
        let Some(listing) = account.listing.as_ref() else {
            return Ok(Step::Ignore);
        };

        match plan(listing, page) {
            PageRequest::Skip => {
                debug!(user_id = s.user_id, page, fetched = listing.fetched_pages, "page out of reach");
                Ok(Step::Ignore)
            }
            PageRequest::Cached(page) => {
                listing_mut(s)?.page = page;
                Ok(Step::Render(None))
            }
            PageRequest::FetchNext(page) => {
                let address = account.account.address.clone();
                let cursor = listing.cursor.clone();
                let limit = listing.page_size;
                let provider = self.providers.for_prefs(&s.prefs);
                let batch = self
                    .throttled(s, chat_id, HOURGLASS, async {
                        provider
                            .account_events(&address, cursor.as_ref(), limit, DateRange::AllTime)
                            .await
                            .map_err(BotError::from)
                    })
                    .await?;

                let listing = listing_mut(s)?;
                if apply_batch(listing, batch, limit) {
                    listing.page = page;
                }
                Ok(Step::Render(None))
            }
        }
    }

    async fn confirm_export(
        &self,
        s: &mut Session,
        chat_id: ChatId,
        format: ExportFormat,
    ) -> BotResult<Step> {
        let Some(account) = s.account() else {
            return Ok(Step::Ignore);
        };
        let Some(range) = account.export.and_then(|draft| draft.range) else {
            return Ok(Step::Ignore);
        };
        let snapshot = account.account.clone();
        let provider = self.providers.for_prefs(&s.prefs);
        let result = self
            .throttled(
                s,
                chat_id,
                HOURGLASS,
                self.pipeline.run(provider.as_ref(), &snapshot, range),
            )
            .await?;

        let bytes = result.serialize(format)?;
        self.transport
            .send_document(
                chat_id,
                &export::file_name(&snapshot, format),
                bytes,
                &result.caption(),
            )
            .await?;

        account_mut(s)?.export = None;
        s.enter(Window::Information);
        let rows = result.row_count();
        let notice = if result.truncated {
            Notice::ExportTruncated { rows }
        } else {
            Notice::ExportDone { rows }
        };
        Ok(Step::RenderFresh(Some(notice)))
    }
}

async fn lookup(provider: &dyn LedgerProvider, query: Query) -> BotResult<Found> {
    let address = match query {
        Query::Dns(name) => provider.resolve_dns(&name).await?,
        Query::Account(address) => address,
        Query::Event(id) => return Ok(Found::Event(provider.event(&id).await?)),
    };

    let account = provider.account(&address).await?;
    let contract = match ContractKind::from_interfaces(&account.interfaces) {
        Some(ContractKind::Jetton) => Some(provider.jetton(&account.address).await?),
        Some(ContractKind::NftItem) => Some(provider.nft_item(&account.address).await?),
        Some(ContractKind::NftCollection) => {
            Some(provider.nft_collection(&account.address).await?)
        }
        None => None,
    };
    Ok(Found::Account(AccountPayload::new(account, contract)))
}

fn toggle_network(s: &mut Session) -> Notice {
    s.prefs.testnet = !s.prefs.testnet;
    s.go_main();
    Notice::NetworkSwitched {
        testnet: s.prefs.testnet,
    }
}

fn open_metadata(s: &mut Session) -> Step {
    match s.account_mut() {
        Some(account) if account.contract.is_some() => {
            account.detail = DetailView::Metadata;
            s.enter(Window::Detail);
            Step::Render(None)
        }
        _ => Step::Ignore,
    }
}

fn open_attributes(s: &mut Session) -> Step {
    let Some(account) = s.account_mut() else {
        return Step::Ignore;
    };
    let Some(contract) = account
        .contract
        .as_ref()
        .filter(|c| c.kind == ContractKind::NftItem)
    else {
        return Step::Ignore;
    };
    if contract.attributes().is_empty() {
        return Step::Render(Some(Notice::NoAttributes));
    }
    account.detail = DetailView::Attributes;
    s.enter(Window::Detail);
    Step::Render(None)
}

fn open_event(s: &mut Session, index: usize) -> Step {
    let Some(account) = s.account_mut() else {
        return Step::Ignore;
    };
    let Some(event) = account
        .listing
        .as_ref()
        .and_then(|listing| listing.events.get(index))
        .cloned()
    else {
        return Step::Ignore;
    };
    account.selected = Some(event);
    s.enter(Window::InformationEvent);
    Step::Render(None)
}

fn open_export(s: &mut Session) -> Step {
    let origin = s.window;
    let Some(account) = s.account_mut() else {
        return Step::Ignore;
    };
    account.export = Some(ExportDraft {
        origin,
        range: None,
    });
    s.enter(Window::SelectDateRange);
    Step::Render(None)
}

fn choose_range(s: &mut Session, range: DateRange) -> BotResult<Step> {
    let draft = account_mut(s)?
        .export
        .as_mut()
        .ok_or_else(|| BotError::Fatal("date range picked without an export draft".into()))?;
    draft.range = Some(range);
    s.enter(Window::ConfirmExport);
    Ok(Step::Render(None))
}

fn back(s: &mut Session) -> BotResult<Step> {
    let Some(target) = s.back_to else {
        return Ok(Step::Ignore);
    };

    // Leaving a window drops the state only it needed
    match s.window {
        Window::SelectDateRange => {
            if let Some(account) = s.account_mut() {
                account.export = None;
            }
        }
        Window::ConfirmExport => {
            if let Some(draft) = s.account_mut().and_then(|a| a.export.as_mut()) {
                draft.range = None;
            }
        }
        _ => {}
    }

    if !s.payload_fits(target) {
        return Err(BotError::Fatal(format!(
            "back target {:?} of {:?} has no payload",
            target, s.window
        )));
    }
    s.enter(target);
    Ok(Step::Render(None))
}

fn account_mut(s: &mut Session) -> BotResult<&mut AccountPayload> {
    let window = s.window;
    s.account_mut()
        .ok_or_else(|| BotError::Fatal(format!("window {:?} lost its account payload", window)))
}

fn listing_mut(s: &mut Session) -> BotResult<&mut EventListing> {
    account_mut(s)?
        .listing
        .as_mut()
        .ok_or_else(|| BotError::Fatal("listing vanished during pagination".into()))
}

fn payload_kind(payload: &Payload) -> &'static str {
    match payload {
        Payload::Empty => "empty",
        Payload::Account(_) => "account",
        Payload::Event(_) => "event",
    }
}
