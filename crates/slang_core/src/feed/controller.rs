//! Feed controller: deck ownership, votes, submission and refill.
//!
//! # Responsibility
//! - Expose the current word and advance it on every vote.
//! - Reorder candidates with the prioritized shuffle on every (re)load.
//! - Issue store writes for votes without blocking cursor movement.
//!
//! # Invariants
//! - Mutating methods take `&mut self`; callers serialize access.
//! - Background fetches never touch the deck directly. Their results are
//!   queued on the inbox and applied by `apply_pending`/`apply_inbound`.
//! - A late background result is applied as if current (last write wins).
//! - A user's vote on a word counts at most once.
//! - New-word checks start from `fetched_through`, which only store results
//!   move. Local submissions never advance it.

use crate::auth::Identity;
use crate::config::{ConfigError, FeedConfig};
use crate::feed::clock::{Clock, SystemClock};
use crate::feed::deck::{Advance, Deck};
use crate::feed::seed::{seed_leaderboard, seed_words};
use crate::feed::shuffle::{prioritized_shuffle, ShufflePolicy};
use crate::model::user::{User, UserList};
use crate::model::word::{VoteField, Word, WordId, WordValidationError};
use crate::store::{StoreError, StoreResult, WordStore};
use log::{debug, error, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug)]
pub enum FeedError {
    Validation(WordValidationError),
    StoreRead(StoreError),
    StoreWrite(StoreError),
    /// Vote or submit attempted without a resolved identity.
    AuthRequired,
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::StoreRead(err) => write!(f, "failed to read words: {err}"),
            Self::StoreWrite(err) => write!(f, "failed to write word: {err}"),
            Self::AuthRequired => write!(f, "sign in required"),
        }
    }
}

impl Error for FeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::StoreRead(err) | Self::StoreWrite(err) => Some(err),
            Self::AuthRequired => None,
        }
    }
}

impl From<WordValidationError> for FeedError {
    fn from(value: WordValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Cursor state as seen by presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    HasCurrent,
    Exhausted,
    Loading,
}

impl FeedState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HasCurrent => "has_current",
            Self::Exhausted => "exhausted",
            Self::Loading => "loading",
        }
    }
}

/// State-change notifications for presentation listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    DeckChanged {
        len: usize,
        cursor: usize,
        state: FeedState,
    },
    TopWordsChanged(usize),
    UserWordsChanged(usize),
    /// A submitted word should be re-rendered by the discovery view.
    RefreshRequested,
    /// User-visible load failure.
    Error(String),
    /// Background write failure; informational only.
    Warning(String),
}

/// Result of one upvote/downvote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Word that was current when the vote was cast.
    pub word_id: Option<WordId>,
    /// `false` when the vote was a duplicate or there was nothing to vote on.
    pub counted: bool,
    pub state: FeedState,
}

/// Background result queued for the owning task.
#[derive(Debug)]
pub struct Inbound(InboundKind);

#[derive(Debug)]
enum InboundKind {
    Reloaded(StoreResult<Vec<Word>>),
    Fetched {
        since_ms: i64,
        result: StoreResult<Vec<Word>>,
    },
}

pub struct FeedController<S: WordStore> {
    store: Arc<S>,
    config: FeedConfig,
    clock: Arc<dyn Clock>,
    rng: ChaCha8Rng,
    deck: Deck,
    top_words: Vec<Word>,
    user_words: Vec<Word>,
    identity: Option<Identity>,
    voted: HashMap<WordId, VoteField>,
    loading: bool,
    reload_in_flight: bool,
    fetch_in_flight: bool,
    needs_refresh: bool,
    /// Every store word created at or before this instant has been fetched.
    fetched_through: i64,
    last_error: Option<String>,
    events: broadcast::Sender<FeedEvent>,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox_rx: mpsc::UnboundedReceiver<Inbound>,
    writes: JoinSet<()>,
}

impl<S: WordStore> FeedController<S> {
    /// Creates a controller with an empty deck over `store`.
    ///
    /// # Errors
    /// - Returns `ConfigError` when `config` fails validation.
    pub fn new(store: Arc<S>, config: FeedConfig) -> Result<Self, ConfigError> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        config: FeedConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.shuffle_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let (events, _) = broadcast::channel(config.event_capacity);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        Ok(Self {
            store,
            config,
            clock,
            rng,
            deck: Deck::default(),
            top_words: Vec::new(),
            user_words: Vec::new(),
            identity: None,
            voted: HashMap::new(),
            loading: false,
            reload_in_flight: false,
            fetch_in_flight: false,
            needs_refresh: false,
            fetched_through: 0,
            last_error: None,
            events,
            inbox_tx,
            inbox_rx,
            writes: JoinSet::new(),
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn current(&self) -> Option<&Word> {
        self.deck.current()
    }

    pub fn state(&self) -> FeedState {
        if self.loading || self.reload_in_flight {
            FeedState::Loading
        } else if self.deck.current().is_some() {
            FeedState::HasCurrent
        } else {
            FeedState::Exhausted
        }
    }

    pub fn top_words(&self) -> &[Word] {
        &self.top_words
    }

    pub fn user_words(&self) -> &[Word] {
        &self.user_words
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Returns and clears the "discovery view should refresh" flag.
    pub fn take_refresh_flag(&mut self) -> bool {
        std::mem::take(&mut self.needs_refresh)
    }

    /// Recorded vote of the bound identity on `word_id`.
    pub fn vote_on(&self, word_id: &str) -> Option<VoteField> {
        self.voted.get(word_id).copied()
    }

    /// Fills the deck with seed words and starts a background reload.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initialize(&mut self) {
        if self.deck.is_empty() {
            self.fill_with_seeds();
        }
        info!(
            "event=feed_init module=feed status=ok seed_count={}",
            self.deck.len()
        );
        self.spawn_reload();
        self.publish_deck();
    }

    /// Replaces the deck with the newest `page_size` words.
    ///
    /// An empty result keeps the current deck (seed words when it is empty),
    /// so the discovery view never goes blank on an empty store.
    ///
    /// # Errors
    /// - `StoreRead` when the fetch fails. The previous deck is kept (or seed
    ///   words when it was empty) and the error is recorded for display.
    pub async fn load_all(&mut self) -> FeedResult<usize> {
        self.apply_pending();
        self.loading = true;
        self.publish_deck();
        let started_at = Instant::now();
        let result = self.store.fetch_recent(self.config.page_size).await;
        self.loading = false;
        let outcome = self.apply_loaded(result);
        debug!(
            "event=feed_load module=feed status=done duration_ms={}",
            started_at.elapsed().as_millis()
        );
        outcome
    }

    /// Loads the leaderboard, falling back to seed words ranked by score.
    pub async fn load_top(&mut self, limit: u32) -> Vec<Word> {
        match self.store.fetch_top(limit).await {
            Ok(words) => {
                info!(
                    "event=feed_top module=feed status=ok count={}",
                    words.len()
                );
                self.top_words = words;
            }
            Err(err) => {
                if self.top_words.is_empty() {
                    self.top_words = seed_leaderboard(self.clock.now_ms(), limit as usize);
                }
                self.record_error(format!("Failed to load top words: {err}"));
            }
        }
        self.emit(FeedEvent::TopWordsChanged(self.top_words.len()));
        self.top_words.clone()
    }

    /// Loads words created by the bound identity, newest first.
    ///
    /// # Errors
    /// - `AuthRequired` without an identity.
    /// - `StoreRead` when the fetch fails.
    pub async fn load_user_words(&mut self) -> FeedResult<Vec<Word>> {
        let user_id = match self.identity.as_ref() {
            Some(identity) => identity.user_id.clone(),
            None => return Err(FeedError::AuthRequired),
        };
        match self.store.fetch_by_creator(&user_id).await {
            Ok(words) => {
                self.user_words = words;
                self.emit(FeedEvent::UserWordsChanged(self.user_words.len()));
                Ok(self.user_words.clone())
            }
            Err(err) => {
                self.record_error(format!("Failed to load your words: {err}"));
                Err(FeedError::StoreRead(err))
            }
        }
    }

    /// Binds or clears the identity used for votes and submissions.
    ///
    /// The user document is read to seed vote dedup, and created when it is
    /// missing. Store failures only log a warning.
    pub async fn set_identity(&mut self, identity: Option<Identity>) {
        self.voted.clear();
        self.user_words.clear();
        self.identity = identity.clone();

        let Some(identity) = identity else {
            info!("event=identity_clear module=feed status=ok");
            return;
        };

        match self.store.fetch_user(&identity.user_id).await {
            Ok(Some(user)) => {
                for id in user.liked_words.iter().chain(&user.disliked_words) {
                    if let Some(field) = user.vote_on(id) {
                        self.voted.insert(id.clone(), field);
                    }
                }
            }
            Ok(None) => {
                let user = User::new(identity.user_id.clone(), identity.display_name.clone());
                if let Err(err) = self.store.create_user(&user).await {
                    warn!(
                        "event=identity_bind module=feed status=error error_code=user_create_failed error={err}"
                    );
                }
            }
            Err(err) => {
                warn!(
                    "event=identity_bind module=feed status=error error_code=user_fetch_failed error={err}"
                );
            }
        }
        info!(
            "event=identity_bind module=feed status=ok user_id={} known_votes={}",
            identity.user_id,
            self.voted.len()
        );
    }

    pub async fn upvote(&mut self) -> FeedResult<VoteOutcome> {
        self.vote(VoteField::Upvotes).await
    }

    pub async fn downvote(&mut self) -> FeedResult<VoteOutcome> {
        self.vote(VoteField::Downvotes).await
    }

    async fn vote(&mut self, field: VoteField) -> FeedResult<VoteOutcome> {
        self.apply_pending();
        let user_id = match self.identity.as_ref() {
            Some(identity) => identity.user_id.clone(),
            None => return Err(FeedError::AuthRequired),
        };
        let Some(current) = self.deck.current() else {
            return Ok(VoteOutcome {
                word_id: None,
                counted: false,
                state: self.state(),
            });
        };

        let word_id = current.id.clone();
        let counted = match word_id.as_deref() {
            Some(id) if self.voted.contains_key(id) => {
                debug!("event=vote module=feed status=skip reason=duplicate word_id={id}");
                false
            }
            Some(id) => {
                self.deck.record_vote(id, field);
                self.voted.insert(id.to_string(), field);
                self.spawn_vote_write(user_id, id.to_string(), field);
                true
            }
            None => false,
        };

        match self.deck.advance(self.config.prefetch_threshold) {
            Advance::Moved { near_end } => {
                if near_end {
                    self.spawn_check_for_new();
                }
            }
            Advance::Exhausted => {
                self.publish_deck();
                if self.fetch_in_flight {
                    // The near-end prefetch already covers this check.
                    self.await_prefetch().await;
                } else {
                    let since = self.sync_point();
                    // Failure is already recorded for display; the vote itself stands.
                    let _ = self.check_for_new(since).await;
                }
            }
        }
        self.publish_deck();

        Ok(VoteOutcome {
            word_id,
            counted,
            state: self.state(),
        })
    }

    /// Creates a word, places it in the deck and points the cursor at it.
    ///
    /// # Errors
    /// - `Validation` when the word or definition is blank; the deck is untouched.
    /// - `AuthRequired` without an identity.
    /// - `StoreWrite` when the store rejects the document.
    pub async fn submit(&mut self, word: &str, definition: &str) -> FeedResult<Word> {
        self.apply_pending();
        let identity = self.identity.clone();
        let draft = Word::draft(
            word,
            definition,
            identity
                .as_ref()
                .map(|identity| identity.user_id.clone())
                .unwrap_or_default(),
            identity
                .as_ref()
                .map(|identity| identity.display_name.clone())
                .unwrap_or_default(),
            self.clock.now_ms(),
        );
        draft.validate()?;
        let Some(identity) = identity else {
            return Err(FeedError::AuthRequired);
        };

        let id = match self.store.create_word(&draft).await {
            Ok(id) => id,
            Err(err) => {
                self.record_error(format!("Failed to add word: {err}"));
                return Err(FeedError::StoreWrite(err));
            }
        };
        let created = draft.with_id(id.clone());
        self.spawn_list_append(identity.user_id.clone(), UserList::Created, id.clone());

        let mut words = self.deck.take_words();
        words.insert(0, created.clone());
        let ordered = self.shuffle(words);
        self.deck.replace(ordered);
        self.deck.seek(&id);
        self.needs_refresh = true;

        info!(
            "event=word_submit module=feed status=ok word_id={id} cursor={} deck_len={}",
            self.deck.cursor(),
            self.deck.len()
        );
        self.emit(FeedEvent::RefreshRequested);
        self.publish_deck();
        Ok(created)
    }

    /// Merges words created after `since_ms` into the deck.
    ///
    /// Returns how many unseen words were added. When that is zero the deck
    /// and cursor are unchanged; otherwise the whole deck is re-shuffled and
    /// the cursor rewinds to 0.
    pub async fn check_for_new(&mut self, since_ms: i64) -> FeedResult<usize> {
        let result = self
            .store
            .fetch_since(since_ms, self.config.new_words_limit)
            .await;
        self.apply_fetched(since_ms, result)
    }

    /// Timer entry point.
    ///
    /// Returns `false` (no-op) while a load or fetch is in flight. Otherwise
    /// spawns a background reload when the deck is exhausted, or a new-word
    /// check when it is not.
    pub fn schedule_refresh(&mut self) -> bool {
        self.apply_pending();
        if self.loading || self.reload_in_flight || self.fetch_in_flight {
            debug!("event=feed_refresh module=feed status=skip reason=in_flight");
            return false;
        }
        if self.deck.is_exhausted() {
            self.spawn_reload();
        } else {
            self.spawn_check_for_new();
        }
        true
    }

    /// Waits for the next background result.
    pub async fn recv_inbound(&mut self) -> Option<Inbound> {
        self.inbox_rx.recv().await
    }

    pub fn apply_inbound(&mut self, inbound: Inbound) {
        match inbound.0 {
            InboundKind::Reloaded(result) => {
                self.reload_in_flight = false;
                let _ = self.apply_loaded(result);
            }
            InboundKind::Fetched { since_ms, result } => {
                self.fetch_in_flight = false;
                let _ = self.apply_fetched(since_ms, result);
            }
        }
        self.publish_deck();
    }

    /// Applies every queued background result. Returns how many were applied.
    pub fn apply_pending(&mut self) -> usize {
        self.reap_writes();
        let mut applied = 0;
        while let Ok(inbound) = self.inbox_rx.try_recv() {
            self.apply_inbound(inbound);
            applied += 1;
        }
        applied
    }

    /// Waits for background writes to finish and applies in-flight fetches.
    pub async fn settle(&mut self) {
        self.flush_writes().await;
        while self.reload_in_flight || self.fetch_in_flight {
            match self.inbox_rx.recv().await {
                Some(inbound) => self.apply_inbound(inbound),
                None => break,
            }
        }
    }

    async fn await_prefetch(&mut self) {
        while self.fetch_in_flight {
            match self.inbox_rx.recv().await {
                Some(inbound) => self.apply_inbound(inbound),
                None => break,
            }
        }
    }

    /// Waits for every spawned vote/list write.
    pub async fn flush_writes(&mut self) {
        while let Some(result) = self.writes.join_next().await {
            if let Err(err) = result {
                error!("event=store_write module=feed status=error error_code=task_failed error={err}");
            }
        }
    }

    fn apply_loaded(&mut self, result: StoreResult<Vec<Word>>) -> FeedResult<usize> {
        match result {
            Ok(words) if words.is_empty() => {
                if self.deck.is_empty() {
                    self.fill_with_seeds();
                }
                info!("event=feed_load module=feed status=ok count=0 kept_deck=true");
                Ok(0)
            }
            Ok(words) => {
                let count = words.len();
                if let Some(newest) = words.iter().map(|word| word.created_at).max() {
                    self.fetched_through = self.fetched_through.max(newest);
                }
                let ordered = self.shuffle(words);
                self.deck.replace(ordered);
                info!("event=feed_load module=feed status=ok count={count}");
                self.publish_deck();
                Ok(count)
            }
            Err(err) => {
                if self.deck.is_empty() {
                    self.fill_with_seeds();
                }
                self.record_error(format!("Failed to load words: {err}"));
                Err(FeedError::StoreRead(err))
            }
        }
    }

    fn apply_fetched(
        &mut self,
        since_ms: i64,
        result: StoreResult<Vec<Word>>,
    ) -> FeedResult<usize> {
        let fetched = match result {
            Ok(words) => words,
            Err(err) => {
                self.record_error(format!("Failed to check for new words: {err}"));
                return Err(FeedError::StoreRead(err));
            }
        };
        self.advance_watermark(since_ms, &fetched);
        let fetched_count = fetched.len();
        let unseen = self.deck.filter_unseen(fetched);
        if unseen.is_empty() {
            debug!("event=feed_check module=feed status=ok fetched={fetched_count} added=0");
            return Ok(0);
        }

        let added = unseen.len();
        let mut words = self.deck.take_words();
        words.extend(unseen);
        let ordered = self.shuffle(words);
        self.deck.replace(ordered);
        info!(
            "event=feed_check module=feed status=ok fetched={fetched_count} added={added} deck_len={}",
            self.deck.len()
        );
        self.publish_deck();
        Ok(added)
    }

    fn fill_with_seeds(&mut self) {
        let seeds = seed_words(self.clock.now_ms());
        let ordered = self.shuffle(seeds);
        self.deck.replace(ordered);
    }

    fn shuffle(&mut self, words: Vec<Word>) -> Vec<Word> {
        let policy = ShufflePolicy {
            recent_window_ms: self.config.recent_window_ms(),
            intermix_probability: self.config.intermix_probability,
        };
        prioritized_shuffle(words, self.clock.now_ms(), &policy, &mut self.rng)
    }

    /// Lower bound for new-word checks.
    fn sync_point(&self) -> i64 {
        self.fetched_through
    }

    /// Moves `fetched_through` over an oldest-first `fetch_since` page.
    ///
    /// A page that starts above the watermark leaves a gap and is ignored. A
    /// full page may end inside a run of equal timestamps, so the watermark
    /// stops 1 ms short of its last word; re-fetched words are filtered out.
    fn advance_watermark(&mut self, since_ms: i64, page: &[Word]) {
        if since_ms > self.fetched_through {
            return;
        }
        let Some(last) = page.iter().map(|word| word.created_at).max() else {
            return;
        };
        let full = page.len() >= self.config.new_words_limit as usize;
        let through = if full { last.saturating_sub(1) } else { last };
        self.fetched_through = self.fetched_through.max(through);
    }

    fn spawn_reload(&mut self) {
        if self.reload_in_flight {
            return;
        }
        self.reload_in_flight = true;
        let store = Arc::clone(&self.store);
        let inbox = self.inbox_tx.clone();
        let limit = self.config.page_size;
        tokio::spawn(async move {
            let result = store.fetch_recent(limit).await;
            let _ = inbox.send(Inbound(InboundKind::Reloaded(result)));
        });
        debug!("event=feed_reload module=feed status=start");
    }

    fn spawn_check_for_new(&mut self) {
        if self.fetch_in_flight {
            return;
        }
        self.fetch_in_flight = true;
        let store = Arc::clone(&self.store);
        let inbox = self.inbox_tx.clone();
        let since = self.sync_point();
        let limit = self.config.new_words_limit;
        tokio::spawn(async move {
            let result = store.fetch_since(since, limit).await;
            let _ = inbox.send(Inbound(InboundKind::Fetched {
                since_ms: since,
                result,
            }));
        });
        debug!("event=feed_prefetch module=feed status=start since={since}");
    }

    fn spawn_vote_write(&mut self, user_id: String, word_id: WordId, field: VoteField) {
        self.reap_writes();
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        self.writes.spawn(async move {
            if let Err(err) = store.increment_vote(&word_id, field).await {
                warn!(
                    "event=vote_write module=feed status=error field={} word_id={word_id} error={err}",
                    field.as_str()
                );
                let _ = events.send(FeedEvent::Warning(format!(
                    "Failed to record {}: {err}",
                    field.as_str()
                )));
            }
            append_or_warn(&*store, &events, &user_id, UserList::for_vote(field), &word_id).await;
        });
    }

    fn spawn_list_append(&mut self, user_id: String, list: UserList, word_id: WordId) {
        self.reap_writes();
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        self.writes.spawn(async move {
            append_or_warn(&*store, &events, &user_id, list, &word_id).await;
        });
    }

    fn reap_writes(&mut self) {
        while let Some(result) = self.writes.try_join_next() {
            if let Err(err) = result {
                error!("event=store_write module=feed status=error error_code=task_failed error={err}");
            }
        }
    }

    fn record_error(&mut self, message: String) {
        error!("event=feed_error module=feed status=error message={message}");
        self.last_error = Some(message.clone());
        self.emit(FeedEvent::Error(message));
    }

    fn publish_deck(&self) {
        self.emit(FeedEvent::DeckChanged {
            len: self.deck.len(),
            cursor: self.deck.cursor(),
            state: self.state(),
        });
    }

    fn emit(&self, event: FeedEvent) {
        // Send only fails when nobody is subscribed.
        let _ = self.events.send(event);
    }
}

async fn append_or_warn<S: WordStore>(
    store: &S,
    events: &broadcast::Sender<FeedEvent>,
    user_id: &str,
    list: UserList,
    word_id: &str,
) {
    if let Err(err) = store.append_to_user_list(user_id, list, word_id).await {
        warn!(
            "event=user_list_write module=feed status=error list={} word_id={word_id} error={err}",
            list.as_str()
        );
        let _ = events.send(FeedEvent::Warning(format!(
            "Failed to update {}: {err}",
            list.as_str()
        )));
    }
}
