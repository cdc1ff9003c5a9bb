//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the discovery feed to Dart as sync FRB calls.
//! - Own the process-wide Tokio runtime and the single open feed.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - At most one feed is open; `feed_open` replaces the previous one.
//! - Calls made before `feed_open` return a failure envelope, never block.

use log::{info, warn};
use once_cell::sync::{Lazy, OnceCell};
use slang_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    sign_up, AuthProvider, FeedConfig, FeedController, FeedHandle, FeedService, Identity,
    LocalAuthProvider, SqliteWordStore, VoteOutcome, Word, WordStore,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::runtime::{Builder, Runtime};

const TOP_LIMIT_MAX: u32 = 50;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();
static OPEN_FEED: Lazy<Mutex<Option<OpenFeed>>> = Lazy::new(|| Mutex::new(None));
// Development provider; accounts live for the process lifetime.
static AUTH: Lazy<LocalAuthProvider> = Lazy::new(LocalAuthProvider::new);

#[derive(Clone)]
struct OpenFeed {
    handle: FeedHandle,
    store: Arc<SqliteWordStore>,
    top_limit: u32,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Word card as rendered by the discovery and leaderboard views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedWordItem {
    /// `None` for words that were never persisted.
    pub word_id: Option<String>,
    pub word: String,
    pub definition: String,
    pub username: String,
    pub upvotes: u32,
    pub downvotes: u32,
    pub score: i64,
    pub created_at_ms: i64,
}

/// Current feed view for the discovery screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshotResponse {
    pub ok: bool,
    pub current: Option<FeedWordItem>,
    /// `has_current|exhausted|loading`.
    pub state: String,
    pub deck_len: u32,
    pub cursor: u32,
    /// Last load failure, if any. Not cleared by this call.
    pub error_message: Option<String>,
    pub message: String,
}

/// List response for leaderboard and "my words".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedListResponse {
    pub ok: bool,
    pub items: Vec<FeedWordItem>,
    pub message: String,
}

/// Generic action response envelope for feed commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Word the action applied to, or the created word.
    pub word_id: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl FeedActionResponse {
    fn success(message: impl Into<String>, word_id: Option<String>) -> Self {
        Self {
            ok: true,
            word_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            word_id: None,
            message: message.into(),
        }
    }
}

/// Result of sign-up/sign-in calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedAuthResponse {
    pub ok: bool,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub message: String,
}

impl FeedAuthResponse {
    fn signed_in(identity: &Identity, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            user_id: Some(identity.user_id.clone()),
            display_name: Some(identity.display_name.clone()),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            user_id: None,
            display_name: None,
            message: message.into(),
        }
    }
}

/// Opens the SQLite word store at `db_path` and starts the feed.
///
/// `config_json` is an optional partial `FeedConfig` object; missing fields
/// take their defaults.
///
/// # FFI contract
/// - Sync call; performs DB open and migration.
/// - Replaces (and shuts down) a previously opened feed.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_open(db_path: String, config_json: Option<String>) -> FeedActionResponse {
    match open_feed(db_path.trim(), config_json.as_deref()) {
        Ok(deck_len) => {
            FeedActionResponse::success(format!("Feed ready with {deck_len} word(s)."), None)
        }
        Err(err) => FeedActionResponse::failure(format!("feed_open failed: {err}")),
    }
}

/// Stops the open feed, flushing pending vote writes.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_close() -> FeedActionResponse {
    let previous = match OPEN_FEED.lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => return FeedActionResponse::failure("feed_close failed: feed state poisoned"),
    };
    match previous {
        Some(feed) => {
            feed.handle.shutdown();
            info!("event=ffi_feed_close module=ffi status=ok");
            FeedActionResponse::success("Feed closed.", None)
        }
        None => FeedActionResponse::success("No feed open.", None),
    }
}

/// Returns the current word and deck position.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_snapshot() -> FeedSnapshotResponse {
    let result = with_feed(|feed| async move { feed.handle.snapshot().await });
    match result {
        Ok(snapshot) => FeedSnapshotResponse {
            ok: true,
            current: snapshot.current.map(to_feed_word_item),
            state: snapshot.state.as_str().to_string(),
            deck_len: saturating_u32(snapshot.deck_len),
            cursor: saturating_u32(snapshot.cursor),
            error_message: snapshot.last_error,
            message: String::new(),
        },
        Err(err) => FeedSnapshotResponse {
            ok: false,
            current: None,
            state: "exhausted".to_string(),
            deck_len: 0,
            cursor: 0,
            error_message: None,
            message: format!("feed_snapshot failed: {err}"),
        },
    }
}

/// Upvotes the current word and advances the feed.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_upvote() -> FeedActionResponse {
    vote_response(
        "feed_upvote",
        with_feed(|feed| async move { feed.handle.upvote().await }),
    )
}

/// Downvotes the current word and advances the feed.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_downvote() -> FeedActionResponse {
    vote_response(
        "feed_downvote",
        with_feed(|feed| async move { feed.handle.downvote().await }),
    )
}

/// Submits a new word; on success it becomes the current word.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_submit(word: String, definition: String) -> FeedActionResponse {
    match with_feed(|feed| async move { feed.handle.submit(word, definition).await }) {
        Ok(created) => FeedActionResponse::success("Word added.", created.id),
        Err(err) => FeedActionResponse::failure(format!("feed_submit failed: {err}")),
    }
}

/// Reloads the deck from the store.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_reload() -> FeedActionResponse {
    match with_feed(|feed| async move { feed.handle.load_all().await }) {
        Ok(count) => FeedActionResponse::success(format!("Loaded {count} word(s)."), None),
        Err(err) => FeedActionResponse::failure(format!("feed_reload failed: {err}")),
    }
}

/// Loads the leaderboard. `limit` of `None` or `0` uses the configured default.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_top(limit: Option<u32>) -> FeedListResponse {
    list_response(
        "feed_top",
        with_feed(|feed| async move {
            let limit = normalize_top_limit(limit, feed.top_limit);
            feed.handle.load_top(limit).await
        }),
    )
}

/// Loads words submitted by the signed-in user.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_user_words() -> FeedListResponse {
    list_response(
        "feed_user_words",
        with_feed(|feed| async move { feed.handle.load_user_words().await }),
    )
}

/// Creates an account, its user record, and binds it to the feed.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_sign_up(email: String, password: String, display_name: String) -> FeedAuthResponse {
    let result = with_feed(|feed| async move {
        let identity = sign_up(&*AUTH, &*feed.store, &email, &password, &display_name)
            .await
            .map_err(|err| err.to_string())?;
        bind_identity(&feed, identity).await
    });
    match result {
        Ok(identity) => FeedAuthResponse::signed_in(&identity, "Account created."),
        Err(err) => FeedAuthResponse::failure(format!("feed_sign_up failed: {err}")),
    }
}

/// Signs in and binds the identity to the feed.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_sign_in(email: String, password: String) -> FeedAuthResponse {
    let result = with_feed(|feed| async move {
        let user_id = AUTH
            .sign_in(&email, &password)
            .await
            .map_err(|err| err.to_string())?;
        let display_name = match feed.store.fetch_user(&user_id).await {
            Ok(Some(user)) => user.display_name,
            Ok(None) => String::new(),
            Err(err) => {
                warn!("event=ffi_sign_in module=ffi status=error error_code=user_fetch_failed error={err}");
                String::new()
            }
        };
        bind_identity(&feed, Identity::new(user_id, display_name)).await
    });
    match result {
        Ok(identity) => FeedAuthResponse::signed_in(&identity, "Signed in."),
        Err(err) => FeedAuthResponse::failure(format!("feed_sign_in failed: {err}")),
    }
}

/// Signs out and clears the feed identity.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_sign_out() -> FeedActionResponse {
    let result = with_feed(|feed| async move {
        AUTH.sign_out().await;
        feed.handle.set_identity(None).await
    });
    match result {
        Ok(()) => FeedActionResponse::success("Signed out.", None),
        Err(err) => FeedActionResponse::failure(format!("feed_sign_out failed: {err}")),
    }
}

/// Returns and clears the last user-visible error. Empty when none.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_take_error() -> String {
    with_feed(|feed| async move { feed.handle.take_error().await })
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Returns and clears the "discovery view should refresh" flag.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_take_refresh_flag() -> bool {
    with_feed(|feed| async move { feed.handle.take_refresh_flag().await }).unwrap_or(false)
}

fn open_feed(db_path: &str, config_json: Option<&str>) -> Result<usize, String> {
    if db_path.is_empty() {
        return Err("db_path cannot be empty".to_string());
    }
    let config = parse_config(config_json)?;
    let top_limit = config.top_limit;
    let store = Arc::new(SqliteWordStore::open(db_path).map_err(|err| err.to_string())?);
    let controller =
        FeedController::new(Arc::clone(&store), config).map_err(|err| err.to_string())?;

    let runtime = runtime()?;
    let handle = {
        let _entered = runtime.enter();
        FeedService::spawn(controller).0
    };
    let feed = OpenFeed {
        handle,
        store,
        top_limit,
    };
    let previous = OPEN_FEED
        .lock()
        .map_err(|_| "feed state poisoned".to_string())?
        .replace(feed.clone());
    if let Some(previous) = previous {
        previous.handle.shutdown();
    }

    let snapshot = block_on(runtime, feed.handle.snapshot())?.map_err(|err| err.to_string())?;
    info!(
        "event=ffi_feed_open module=ffi status=ok deck_len={}",
        snapshot.deck_len
    );
    Ok(snapshot.deck_len)
}

fn parse_config(config_json: Option<&str>) -> Result<FeedConfig, String> {
    match config_json.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => serde_json::from_str(raw).map_err(|err| format!("invalid config: {err}")),
        None => Ok(FeedConfig::default()),
    }
}

fn normalize_top_limit(limit: Option<u32>, default_limit: u32) -> u32 {
    match limit {
        Some(0) | None => default_limit,
        Some(value) => value.min(TOP_LIMIT_MAX),
    }
}

fn runtime() -> Result<&'static Runtime, String> {
    RUNTIME.get_or_try_init(|| {
        Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("slang-feed")
            .enable_time()
            .build()
            .map_err(|err| format!("failed to start runtime: {err}"))
    })
}

fn block_on<F: Future>(runtime: &Runtime, future: F) -> Result<F::Output, String> {
    // block_on panics when called from inside a runtime thread.
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err("sync feed call made from an async context".to_string());
    }
    Ok(runtime.block_on(future))
}

fn with_feed<T, E, F, Fut>(f: F) -> Result<T, String>
where
    F: FnOnce(OpenFeed) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ToString,
{
    let feed = OPEN_FEED
        .lock()
        .map_err(|_| "feed state poisoned".to_string())?
        .clone()
        .ok_or_else(|| "feed is not open".to_string())?;
    let runtime = runtime()?;
    block_on(runtime, f(feed))?.map_err(|err| err.to_string())
}

async fn bind_identity(feed: &OpenFeed, identity: Identity) -> Result<Identity, String> {
    feed.handle
        .set_identity(Some(identity.clone()))
        .await
        .map_err(|err| err.to_string())?;
    Ok(identity)
}

fn vote_response(
    operation: &str,
    result: Result<VoteOutcome, String>,
) -> FeedActionResponse {
    match result {
        Ok(outcome) if outcome.counted => {
            FeedActionResponse::success("Vote recorded.", outcome.word_id)
        }
        Ok(outcome) if outcome.word_id.is_some() => {
            FeedActionResponse::success("Already voted.", outcome.word_id)
        }
        Ok(_) => FeedActionResponse::success("Nothing to vote on.", None),
        Err(err) => FeedActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn list_response(operation: &str, result: Result<Vec<Word>, String>) -> FeedListResponse {
    match result {
        Ok(words) => {
            let items = words.into_iter().map(to_feed_word_item).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No words yet.".to_string()
            } else {
                format!("Found {} word(s).", items.len())
            };
            FeedListResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(err) => FeedListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("{operation} failed: {err}"),
        },
    }
}

fn to_feed_word_item(word: Word) -> FeedWordItem {
    let score = word.score();
    FeedWordItem {
        word_id: word.id,
        word: word.text,
        definition: word.definition,
        username: word.creator_name,
        upvotes: word.upvotes,
        downvotes: word.downvotes,
        score,
        created_at_ms: word.created_at,
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, feed_close, feed_open, feed_sign_up, feed_snapshot, feed_submit,
        feed_take_refresh_flag, feed_top, feed_upvote, feed_user_words, init_logging,
        normalize_top_limit, parse_config, ping,
    };

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn top_limit_defaults_and_caps() {
        assert_eq!(normalize_top_limit(None, 10), 10);
        assert_eq!(normalize_top_limit(Some(0), 10), 10);
        assert_eq!(normalize_top_limit(Some(7), 10), 7);
        assert_eq!(normalize_top_limit(Some(500), 10), 50);
    }

    #[test]
    fn parse_config_accepts_partial_json() {
        let config = parse_config(Some(r#"{"page_size": 5}"#)).unwrap();
        assert_eq!(config.top_limit, 10);
        assert!(parse_config(Some("not json")).is_err());
        assert!(parse_config(None).is_ok());
        assert!(parse_config(Some("   ")).is_ok());
    }

    // One test drives the global feed so parallel tests never race on it.
    #[test]
    fn feed_round_trip_through_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("slangit.db");

        let not_open = feed_close();
        assert!(not_open.ok);

        let opened = feed_open(
            db_path.to_str().unwrap().to_string(),
            Some(r#"{"shuffle_seed": 1}"#.to_string()),
        );
        assert!(opened.ok, "{}", opened.message);

        let snapshot = feed_snapshot();
        assert!(snapshot.ok, "{}", snapshot.message);
        assert!(snapshot.current.is_some());

        let anonymous = feed_upvote();
        assert!(!anonymous.ok);

        let signed_up = feed_sign_up(
            "bridge@example.com".to_string(),
            "secret1".to_string(),
            String::new(),
        );
        assert!(signed_up.ok, "{}", signed_up.message);
        assert_eq!(signed_up.display_name.as_deref(), Some("bridge"));

        let created = feed_submit("yeet2".to_string(), "to go viral".to_string());
        assert!(created.ok, "{}", created.message);
        assert!(feed_take_refresh_flag());
        let current = feed_snapshot().current.unwrap();
        assert_eq!(current.word_id, created.word_id);
        assert_eq!(current.username, "bridge");

        let voted = feed_upvote();
        assert!(voted.ok, "{}", voted.message);
        assert_eq!(voted.word_id, created.word_id);

        let mine = feed_user_words();
        assert_eq!(mine.items.len(), 1);
        assert!(feed_top(Some(3)).ok);

        let rejected = feed_submit(" ".to_string(), "x".to_string());
        assert!(!rejected.ok);

        assert!(feed_close().ok);
        assert!(!feed_snapshot().ok);
    }
}
