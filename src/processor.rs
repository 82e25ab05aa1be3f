use log::{debug, error, info, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::Settings;
use crate::dedup::{DedupTracker, IdentityKey, PollVerdict};
use crate::diag::{DiagnosticEvent, DiagnosticSink};
use crate::dom::{caption_selectors, MutationKind, MutationRecord, NodeId, Page, Selector};
use crate::extract::original_text;
use crate::inject;
use crate::inject::OVERLAY_CLASS;
use crate::translate::{TranslateError, TranslationEngine};

// ─── Timing ──────────────────────────────────────────────────────────

/// Poll fallback period. Some player frameworks update caption text
/// without firing observable mutations, so polling runs regardless.
pub const POLL_PERIOD: Duration = Duration::from_millis(500);
/// Retry period while no caption container exists (ads, loading, pages
/// without a player).
pub const SEARCH_RETRY: Duration = Duration::from_secs(2);

// ─── Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Searching,
    Observing,
    Disposed,
}

/// Which change-detection mechanism produced a candidate. The two run
/// independently and either may fire redundantly; classification is
/// idempotent for duplicate texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    Mutation,
    Poll,
}

struct Outcome {
    container: NodeId,
    original: String,
    result: Result<String, TranslateError>,
}

// ─── Processor ───────────────────────────────────────────────────────

/// One observation session: find the caption container, watch it through
/// mutations and polling, dispatch each novel subtitle for translation
/// exactly once, and render results as a sibling overlay. Runs until the
/// stop signal fires, then disposes.
pub struct SubtitleProcessor {
    page: Arc<Mutex<Page>>,
    engine: Arc<dyn TranslationEngine>,
    settings: Settings,
    selectors: Vec<Selector>,
    diag: DiagnosticSink,
    tracker: DedupTracker,
    state: watch::Sender<SessionState>,
    // Every overlay this session rendered. The container may be replaced
    // wholesale mid-session, so disposal cannot find them all by sibling
    // lookup alone.
    overlays: Vec<NodeId>,
    outcome_tx: Option<mpsc::UnboundedSender<Outcome>>,
}

impl SubtitleProcessor {
    pub fn new(
        page: Arc<Mutex<Page>>,
        engine: Arc<dyn TranslationEngine>,
        settings: Settings,
        diag: DiagnosticSink,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Searching);
        Self {
            page,
            engine,
            settings,
            selectors: caption_selectors(),
            diag,
            tracker: DedupTracker::new(),
            state,
            overlays: Vec::new(),
            outcome_tx: None,
        }
    }

    pub fn with_selectors(mut self, selectors: Vec<Selector>) -> Self {
        self.selectors = selectors;
        self
    }

    fn lock_page(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drive the session until `stop` fires. Dispose is part of the run:
    /// when this returns, the observer is disconnected, the overlay is
    /// removed and the dedup state is cleared.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        if !self.settings.enabled {
            info!("translation disabled, session not starting");
            self.state.send_replace(SessionState::Disposed);
            return;
        }
        info!("session starting (engine: {})", self.engine.name());

        // ── SEARCHING: retry until the container exists ──────────────
        let container = loop {
            if let Some(c) = self.lock_page().query_first(&self.selectors) {
                break c;
            }
            trace!("caption container not found, retrying in {:?}", SEARCH_RETRY);
            tokio::select! {
                _ = &mut stop => {
                    self.state.send_replace(SessionState::Disposed);
                    info!("session stopped while searching");
                    return;
                }
                _ = tokio::time::sleep(SEARCH_RETRY) => {}
            }
        };
        info!("caption container found, starting observation");

        // ── OBSERVING ────────────────────────────────────────────────
        let (mutation_tx, mut mutation_rx) = mpsc::unbounded_channel();
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        self.outcome_tx = Some(outcome_tx);
        {
            // Lock the field directly: the tracker is primed while the
            // guard is held.
            let mut page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
            // Prime last-observed text so the caption already on screen is
            // not handled a second time by the first poll tick.
            let current = original_text(&page, container);
            self.tracker.prime(&current);
            page.observe(container, mutation_tx);
        }
        self.state.send_replace(SessionState::Observing);

        // The observer only reports changes; whatever text is already
        // present is scanned once here.
        self.classify_candidate(SignalSource::Mutation, container);

        let mut poll = interval_at(Instant::now() + POLL_PERIOD, POLL_PERIOD);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = poll.tick() => self.on_poll_tick(),
                Some(batch) = mutation_rx.recv() => self.on_mutation_batch(batch),
                Some(outcome) = outcome_rx.recv() => self.on_outcome(outcome),
            }
        }

        self.dispose(container);
    }

    // ── Poll path ────────────────────────────────────────────────────

    /// Poll the container as a fallback for changes that never fired a
    /// mutation. The container is re-queried every tick rather than
    /// cached: the host page may replace the element wholesale.
    fn on_poll_tick(&mut self) {
        let (container, text) = {
            let page = self.lock_page();
            match page.query_first(&self.selectors) {
                Some(c) => (c, original_text(&page, c)),
                None => {
                    trace!("poll: container absent, skipping tick");
                    return;
                }
            }
        };

        match self.tracker.observe_poll(&text) {
            PollVerdict::Unchanged | PollVerdict::Cleared | PollVerdict::AlreadyTracked => {}
            PollVerdict::Changed => {
                self.classify_candidate(SignalSource::Poll, container);
            }
        }
    }

    // ── Mutation path ────────────────────────────────────────────────

    /// All records from one platform batch are processed synchronously
    /// before yielding.
    fn on_mutation_batch(&mut self, batch: Vec<MutationRecord>) {
        for record in batch {
            match record.kind {
                MutationKind::ChildList => {
                    for added in record.added {
                        self.classify_candidate(SignalSource::Mutation, added);
                    }
                }
                MutationKind::CharacterData | MutationKind::Attributes => {
                    self.classify_candidate(SignalSource::Mutation, record.target);
                }
            }
        }
    }

    // ── Classification + dispatch ────────────────────────────────────

    fn classify_candidate(&mut self, source: SignalSource, node: NodeId) {
        let (text, kind) = {
            let page = self.lock_page();
            // Never classify our own overlay.
            if page.has_class(node, OVERLAY_CLASS) {
                return;
            }
            (original_text(&page, node), page.element_kind(node))
        };
        if text.is_empty() {
            return;
        }

        let key = IdentityKey::new(kind, text.clone());
        // Insert-before-dispatch: overlapping signals for the same
        // identity never re-enter, regardless of arrival order.
        if !self.tracker.try_begin(key) {
            trace!("{:?} signal for already-seen text, ignoring", source);
            return;
        }

        debug!("novel subtitle via {:?}: \"{}\"", source, text);
        self.diag.emit(DiagnosticEvent::detected(&text));
        self.dispatch(node, text);
    }

    fn dispatch(&self, container: NodeId, text: String) {
        let Some(tx) = self.outcome_tx.clone() else {
            return;
        };
        let engine = self.engine.clone();
        let source = self.settings.source_language.clone();
        let target = self.settings.target_language.clone();
        tokio::spawn(async move {
            let result = engine.translate(&text, &source, &target).await;
            // A dead receiver means the session was disposed while this
            // was in flight; the result is discarded silently.
            let _ = tx.send(Outcome {
                container,
                original: text,
                result,
            });
        });
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        match outcome.result {
            Ok(translated) => {
                debug!("translated \"{}\" → \"{}\"", outcome.original, translated);
                {
                    let mut page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
                    match inject::render(&mut page, outcome.container, &translated, &self.settings)
                    {
                        Some(overlay) => {
                            if !self.overlays.contains(&overlay) {
                                self.overlays.push(overlay);
                            }
                        }
                        None => warn!("container left the tree before render, result dropped"),
                    }
                }
                self.diag
                    .emit(DiagnosticEvent::complete(&outcome.original, &translated));
                self.tracker.evict_over_cap();
            }
            Err(e) => {
                // The identity stays seen: a failing subtitle is not
                // retried within the session.
                error!("translation failed for \"{}\": {}", outcome.original, e);
                self.diag
                    .emit(DiagnosticEvent::error(&outcome.original, &e.to_string()));
            }
        }
    }

    // ── Disposal ─────────────────────────────────────────────────────

    fn dispose(&mut self, container: NodeId) {
        self.outcome_tx = None;
        {
            let mut page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
            page.disconnect();
            // Detach every overlay this session rendered, wherever it sits:
            // after a wholesale container replacement the sibling of the
            // original container is not the only one.
            for overlay in self.overlays.drain(..) {
                page.remove(overlay);
            }
            inject::remove(&mut page, container);
        }
        self.tracker.reset();
        self.state.send_replace(SessionState::Disposed);
        info!("session disposed");
    }

    /// Watch the session's lifecycle state from outside the running task.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}
