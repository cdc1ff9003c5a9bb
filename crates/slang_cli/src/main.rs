//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `slang_core` linkage.
//! - Drive one feed session against the in-memory store: sign up, vote,
//!   submit, leaderboard.
//! - Keep output deterministic for quick local sanity checks.

use slang_core::{
    sign_up, FeedConfig, FeedController, InMemoryWordStore, LocalAuthProvider, Word,
};
use std::error::Error;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("slang_core ping={}", slang_core::ping());
    println!("slang_core version={}", slang_core::core_version());

    let store = Arc::new(InMemoryWordStore::new());
    let auth = LocalAuthProvider::new();
    let config = FeedConfig {
        shuffle_seed: Some(1),
        ..FeedConfig::default()
    };
    let mut feed = FeedController::new(Arc::clone(&store), config)?;

    feed.initialize();
    feed.settle().await;
    println!(
        "feed state={} deck_len={}",
        feed.state().as_str(),
        feed.deck().len()
    );

    let identity = sign_up(&auth, &*store, "probe@example.com", "probe-pass", "").await?;
    println!("identity user={}", identity.display_name);
    feed.set_identity(Some(identity)).await;

    let created = feed.submit("yeet2", "to go viral").await?;
    print_word("submitted", &created);

    let outcome = feed.upvote().await?;
    println!(
        "vote counted={} state={}",
        outcome.counted,
        outcome.state.as_str()
    );
    feed.settle().await;

    for word in feed.load_top(3).await {
        print_word("top", &word);
    }
    Ok(())
}

fn print_word(label: &str, word: &Word) {
    println!(
        "{label} word={} score={} by={}",
        word.text,
        word.score(),
        word.creator_name
    );
}
