#![allow(dead_code)]

use async_trait::async_trait;
use slang_core::{
    Clock, FeedConfig, FeedController, InMemoryWordStore, StoreError, StoreResult, User,
    UserList, VoteField, Word, WordId, WordStore, SYSTEM_CREATOR_ID,
};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const NOW: i64 = 1_700_000_000_000;
pub const HOUR_MS: i64 = 60 * 60 * 1000;

pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(now_ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now_ms)))
    }

    pub fn advance(&self, delta_ms: i64) {
        self.0.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory store with call counters, failure switches and a fetch gate.
pub struct StubStore {
    pub inner: InMemoryWordStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fetch_recent_calls: AtomicUsize,
    pub fetch_since_calls: AtomicUsize,
    pub increment_calls: AtomicUsize,
    pub append_calls: AtomicUsize,
    hold_fetches: AtomicBool,
    gate: Semaphore,
}

impl Default for StubStore {
    fn default() -> Self {
        Self {
            inner: InMemoryWordStore::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fetch_recent_calls: AtomicUsize::new(0),
            fetch_since_calls: AtomicUsize::new(0),
            increment_calls: AtomicUsize::new(0),
            append_calls: AtomicUsize::new(0),
            hold_fetches: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }
}

impl StubStore {
    pub fn with_words(words: Vec<Word>) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryWordStore::with_words(words),
            ..Self::default()
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes fetches wait until [`StubStore::release_fetches`].
    pub fn hold_fetches(&self) {
        self.hold_fetches.store(true, Ordering::SeqCst);
    }

    pub fn release_fetches(&self) {
        self.hold_fetches.store(false, Ordering::SeqCst);
        self.gate.add_permits(1024);
    }

    pub fn since_calls(&self) -> usize {
        self.fetch_since_calls.load(Ordering::SeqCst)
    }

    async fn read_guard(&self) -> StoreResult<()> {
        if self.hold_fetches.load(Ordering::SeqCst) {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| StoreError::Unavailable("gate closed".to_string()))?;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn write_guard(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WordStore for StubStore {
    async fn fetch_recent(&self, limit: u32) -> StoreResult<Vec<Word>> {
        self.fetch_recent_calls.fetch_add(1, Ordering::SeqCst);
        self.read_guard().await?;
        self.inner.fetch_recent(limit).await
    }

    async fn fetch_top(&self, limit: u32) -> StoreResult<Vec<Word>> {
        self.read_guard().await?;
        self.inner.fetch_top(limit).await
    }

    async fn fetch_since(&self, since_ms: i64, limit: u32) -> StoreResult<Vec<Word>> {
        self.fetch_since_calls.fetch_add(1, Ordering::SeqCst);
        self.read_guard().await?;
        self.inner.fetch_since(since_ms, limit).await
    }

    async fn fetch_by_creator(&self, user_id: &str) -> StoreResult<Vec<Word>> {
        self.read_guard().await?;
        self.inner.fetch_by_creator(user_id).await
    }

    async fn create_word(&self, draft: &Word) -> StoreResult<WordId> {
        self.write_guard()?;
        self.inner.create_word(draft).await
    }

    async fn increment_vote(&self, word_id: &str, field: VoteField) -> StoreResult<()> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        self.write_guard()?;
        self.inner.increment_vote(word_id, field).await
    }

    async fn append_to_user_list(
        &self,
        user_id: &str,
        list: UserList,
        word_id: &str,
    ) -> StoreResult<()> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        self.write_guard()?;
        self.inner.append_to_user_list(user_id, list, word_id).await
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        self.write_guard()?;
        self.inner.create_user(user).await
    }

    async fn fetch_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        self.inner.fetch_user(user_id).await
    }
}

/// Default config with a fixed shuffle seed.
pub fn test_config() -> FeedConfig {
    FeedConfig {
        shuffle_seed: Some(7),
        ..FeedConfig::default()
    }
}

pub fn controller(store: &Arc<StubStore>, clock: &Arc<FixedClock>) -> FeedController<StubStore> {
    controller_with(store, clock, test_config())
}

pub fn controller_with(
    store: &Arc<StubStore>,
    clock: &Arc<FixedClock>,
    config: FeedConfig,
) -> FeedController<StubStore> {
    let clock: Arc<dyn Clock> = clock.clone();
    FeedController::with_clock(Arc::clone(store), config, clock).unwrap()
}

pub fn user_word(id: &str, created_at: i64) -> Word {
    Word::draft(id, &format!("meaning of {id}"), "creator", "Creator", created_at).with_id(id)
}

pub fn system_word(id: &str, created_at: i64) -> Word {
    Word::draft(id, "system meaning", SYSTEM_CREATOR_ID, "SlangIt", created_at).with_id(id)
}

/// `n` persisted user words, each older than the previous by one hour.
pub fn user_words(n: usize) -> Vec<Word> {
    (0..n)
        .map(|i| user_word(&format!("w{i}"), NOW - (i as i64 + 1) * HOUR_MS))
        .collect()
}

pub fn deck_ids(controller: &FeedController<StubStore>) -> Vec<String> {
    controller
        .deck()
        .words()
        .iter()
        .filter_map(|word| word.id.clone())
        .collect()
}
