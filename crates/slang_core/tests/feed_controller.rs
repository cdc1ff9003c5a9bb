mod common;

use common::{
    controller, controller_with, deck_ids, test_config, user_word, user_words, FixedClock,
    StubStore, HOUR_MS, NOW,
};
use slang_core::{
    FeedError, FeedEvent, FeedState, Identity, User, UserList, VoteField, Word,
    WordValidationError, WordStore,
};
use std::sync::atomic::Ordering;

fn tester() -> Identity {
    Identity::new("u1", "Tester")
}

fn words_with_upvotes(n: usize, upvotes: u32) -> Vec<Word> {
    user_words(n)
        .into_iter()
        .map(|mut word| {
            word.upvotes = upvotes;
            word
        })
        .collect()
}

#[tokio::test]
async fn upvote_increments_current_word_and_advances_cursor() {
    let store = StubStore::with_words(words_with_upvotes(3, 5));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    assert_eq!(feed.load_all().await.unwrap(), 3);

    let voted_id = feed.current().unwrap().id.clone().unwrap();
    let outcome = feed.upvote().await.unwrap();

    assert!(outcome.counted);
    assert_eq!(outcome.word_id.as_deref(), Some(voted_id.as_str()));
    assert_eq!(outcome.state, FeedState::HasCurrent);
    assert_eq!(feed.deck().cursor(), 1);
    let local = feed.deck().words().iter().find(|w| w.id() == Some(voted_id.as_str())).unwrap();
    assert_eq!(local.upvotes, 6);
    assert_eq!(feed.vote_on(&voted_id), Some(VoteField::Upvotes));

    feed.flush_writes().await;
    let persisted = store.inner.fetch_recent(10).await.unwrap();
    let remote = persisted.iter().find(|w| w.id() == Some(voted_id.as_str())).unwrap();
    assert_eq!(remote.upvotes, 6);
    let user = store.inner.fetch_user("u1").await.unwrap().unwrap();
    assert_eq!(user.liked_words, vec![voted_id]);
}

#[tokio::test]
async fn downvote_records_disliked_list() {
    let store = StubStore::with_words(user_words(2));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();

    let voted_id = feed.current().unwrap().id.clone().unwrap();
    feed.downvote().await.unwrap();
    feed.flush_writes().await;

    let user = store.inner.fetch_user("u1").await.unwrap().unwrap();
    assert_eq!(user.disliked_words, vec![voted_id.clone()]);
    assert!(user.liked_words.is_empty());
    let local = feed.deck().words().iter().find(|w| w.id() == Some(voted_id.as_str())).unwrap();
    assert_eq!(local.downvotes, 1);
}

#[tokio::test]
async fn voting_on_last_word_without_new_words_exhausts_deck() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    assert_eq!(feed.config().prefetch_threshold, 5);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();

    feed.upvote().await.unwrap();
    feed.upvote().await.unwrap();
    let outcome = feed.upvote().await.unwrap();
    feed.settle().await;

    assert_eq!(outcome.state, FeedState::Exhausted);
    assert!(feed.current().is_none());
    assert_eq!(store.since_calls(), 1);
}

#[tokio::test]
async fn voting_on_last_word_merges_new_words_and_rewinds() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    let fresh = Word::draft("bussin", "really good", "u2", "Other", NOW + 1_000);
    let fresh_id = store.inner.create_word(&fresh).await.unwrap();

    feed.upvote().await.unwrap();
    feed.upvote().await.unwrap();
    let outcome = feed.upvote().await.unwrap();
    feed.settle().await;

    assert_eq!(outcome.state, FeedState::HasCurrent);
    assert_eq!(store.since_calls(), 1);
    assert_eq!(feed.deck().len(), 4);
    assert_eq!(feed.deck().cursor(), 0);
    assert!(feed.deck().contains_id(&fresh_id));
}

#[tokio::test]
async fn exhaustion_without_prefetch_checks_inline_once() {
    let store = StubStore::with_words(user_words(2));
    let clock = FixedClock::new(NOW);
    let config = slang_core::FeedConfig {
        prefetch_threshold: 0,
        ..test_config()
    };
    let mut feed = controller_with(&store, &clock, config);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();

    feed.upvote().await.unwrap();
    feed.flush_writes().await;
    assert_eq!(store.since_calls(), 0);

    let outcome = feed.upvote().await.unwrap();
    assert_eq!(outcome.state, FeedState::Exhausted);
    assert_eq!(store.since_calls(), 1);
}

#[tokio::test]
async fn own_submission_does_not_hide_older_remote_words() {
    let store = StubStore::with_words(user_words(2));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();

    let other = Word::draft("drip", "style", "u2", "Other", NOW + 1_000);
    let other_id = store.inner.create_word(&other).await.unwrap();
    clock.advance(2_000);
    feed.submit("yeet2", "to go viral").await.unwrap();

    for _ in 0..3 {
        if feed.deck().contains_id(&other_id) {
            break;
        }
        feed.upvote().await.unwrap();
    }
    feed.settle().await;

    assert!(feed.deck().contains_id(&other_id));
    assert_eq!(feed.state(), FeedState::HasCurrent);
}

#[tokio::test]
async fn full_new_word_page_resumes_from_its_last_word() {
    let store = StubStore::with_words(user_words(1));
    let clock = FixedClock::new(NOW);
    let config = slang_core::FeedConfig {
        new_words_limit: 2,
        ..test_config()
    };
    let mut feed = controller_with(&store, &clock, config);
    feed.load_all().await.unwrap();

    let mut fresh_ids = Vec::new();
    for offset in 1..=3 {
        let draft = Word::draft("fresh", "new", "u2", "Other", NOW + offset);
        fresh_ids.push(store.inner.create_word(&draft).await.unwrap());
    }

    assert!(feed.schedule_refresh());
    feed.settle().await;
    assert_eq!(feed.deck().len(), 3);

    assert!(feed.schedule_refresh());
    feed.settle().await;
    assert_eq!(feed.deck().len(), 4);
    assert!(fresh_ids.iter().all(|id| feed.deck().contains_id(id)));
    assert_eq!(store.since_calls(), 2);
}

#[tokio::test]
async fn submit_inserts_word_once_and_points_cursor_at_it() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    let mut events = feed.subscribe();

    let created = feed.submit("yeet2", "to go viral").await.unwrap();
    let id = created.id.clone().unwrap();

    assert_eq!(created.created_by, "u1");
    assert_eq!(created.creator_name, "Tester");
    assert_eq!(created.created_at, NOW);
    assert_eq!(feed.deck().len(), 4);
    assert_eq!(
        feed.deck().words().iter().filter(|w| w.text == "yeet2").count(),
        1
    );
    assert_eq!(feed.current().unwrap().id.as_deref(), Some(id.as_str()));
    assert_eq!(store.inner.word_count(), 4);
    assert!(feed.take_refresh_flag());
    assert!(!feed.take_refresh_flag());
    assert_eq!(events.try_recv().unwrap(), FeedEvent::RefreshRequested);

    feed.flush_writes().await;
    let user = store.inner.fetch_user("u1").await.unwrap().unwrap();
    assert_eq!(user.created_words, vec![id]);
}

#[tokio::test]
async fn submit_with_blank_fields_is_rejected_without_mutation() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    let before = feed.deck().clone();

    let err = feed.submit("", "a definition").await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Validation(WordValidationError::EmptyText)
    ));
    let err = feed.submit("word", "   ").await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Validation(WordValidationError::EmptyDefinition)
    ));

    assert_eq!(feed.deck(), &before);
    assert_eq!(store.inner.word_count(), 3);
    assert!(!feed.take_refresh_flag());
}

#[tokio::test]
async fn submit_trims_whitespace() {
    let store = StubStore::empty();
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;

    let created = feed.submit("  drip ", " style\n").await.unwrap();
    assert_eq!(created.text, "drip");
    assert_eq!(created.definition, "style");
}

#[tokio::test]
async fn validation_is_reported_before_missing_identity() {
    let store = StubStore::empty();
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);

    assert!(matches!(
        feed.submit("", "x").await.unwrap_err(),
        FeedError::Validation(_)
    ));
    assert!(matches!(
        feed.submit("cap", "a lie").await.unwrap_err(),
        FeedError::AuthRequired
    ));
    assert_eq!(store.inner.word_count(), 0);
}

#[tokio::test]
async fn submit_store_failure_leaves_deck_untouched() {
    let store = StubStore::with_words(user_words(2));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    let before = feed.deck().clone();
    store.set_fail_writes(true);

    let err = feed.submit("mid", "mediocre").await.unwrap_err();
    assert!(matches!(err, FeedError::StoreWrite(_)));
    assert_eq!(feed.deck(), &before);
    assert!(feed.last_error().unwrap().contains("Failed to add word"));
}

#[tokio::test]
async fn check_for_new_since_now_leaves_deck_unchanged() {
    let store = StubStore::with_words(user_words(4));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    feed.upvote().await.unwrap();
    let before = feed.deck().clone();

    assert_eq!(feed.check_for_new(NOW).await.unwrap(), 0);
    assert_eq!(feed.deck(), &before);
    assert_eq!(feed.deck().cursor(), 1);
}

#[tokio::test]
async fn check_for_new_ignores_words_already_in_deck() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.load_all().await.unwrap();

    assert_eq!(feed.check_for_new(0).await.unwrap(), 0);
    assert_eq!(feed.deck().len(), 3);

    store
        .inner
        .create_word(&user_word("late", NOW - HOUR_MS / 2))
        .await
        .unwrap();
    assert_eq!(feed.check_for_new(0).await.unwrap(), 1);
    assert_eq!(feed.deck().len(), 4);
    assert_eq!(feed.deck().cursor(), 0);
}

#[tokio::test]
async fn voting_requires_identity() {
    let store = StubStore::with_words(words_with_upvotes(2, 5));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.load_all().await.unwrap();

    assert!(matches!(
        feed.upvote().await.unwrap_err(),
        FeedError::AuthRequired
    ));
    assert_eq!(feed.deck().cursor(), 0);
    assert_eq!(feed.current().unwrap().upvotes, 5);
    feed.flush_writes().await;
    assert_eq!(store.increment_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stored_votes_are_not_counted_twice() {
    let store = StubStore::with_words(user_words(1));
    let mut user = User::new("u1", "Tester");
    user.liked_words.push("w0".to_string());
    store.inner.create_user(&user).await.unwrap();
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    assert_eq!(feed.vote_on("w0"), Some(VoteField::Upvotes));

    let outcome = feed.downvote().await.unwrap();
    assert!(!outcome.counted);
    assert_eq!(outcome.state, FeedState::Exhausted);
    feed.flush_writes().await;
    assert_eq!(store.increment_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_votes_are_not_counted_after_reload() {
    let store = StubStore::with_words(user_words(1));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;

    feed.load_all().await.unwrap();
    assert!(feed.upvote().await.unwrap().counted);
    feed.load_all().await.unwrap();
    assert!(!feed.upvote().await.unwrap().counted);

    feed.flush_writes().await;
    assert_eq!(store.increment_calls.load(Ordering::SeqCst), 1);
    let user = store.inner.fetch_user("u1").await.unwrap().unwrap();
    assert_eq!(user.liked_words, vec!["w0".to_string()]);
}

#[tokio::test]
async fn appending_same_word_twice_keeps_one_entry() {
    let store = StubStore::empty();
    store.inner.create_user(&User::new("u1", "Tester")).await.unwrap();

    store
        .append_to_user_list("u1", UserList::Liked, "w9")
        .await
        .unwrap();
    store
        .append_to_user_list("u1", UserList::Liked, "w9")
        .await
        .unwrap();

    let user = store.fetch_user("u1").await.unwrap().unwrap();
    assert_eq!(user.liked_words, vec!["w9".to_string()]);
}

#[tokio::test]
async fn failed_vote_write_keeps_local_count_and_warns() {
    let store = StubStore::with_words(words_with_upvotes(2, 5));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    store.set_fail_writes(true);
    let mut events = feed.subscribe();

    let voted_id = feed.current().unwrap().id.clone().unwrap();
    assert!(feed.upvote().await.unwrap().counted);
    feed.flush_writes().await;

    let local = feed.deck().words().iter().find(|w| w.id() == Some(voted_id.as_str())).unwrap();
    assert_eq!(local.upvotes, 6);
    assert!(feed.last_error().is_none());

    let mut warnings = 0;
    while let Ok(event) = events.try_recv() {
        if let FeedEvent::Warning(_) = event {
            warnings += 1;
        }
    }
    // One for the counter, one for the liked list.
    assert_eq!(warnings, 2);
}

#[tokio::test]
async fn load_failure_keeps_previous_deck() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.load_all().await.unwrap();
    let ids = deck_ids(&feed);
    store.set_fail_reads(true);
    let mut events = feed.subscribe();

    assert!(matches!(
        feed.load_all().await.unwrap_err(),
        FeedError::StoreRead(_)
    ));
    assert_eq!(deck_ids(&feed), ids);
    assert!(feed.last_error().unwrap().starts_with("Failed to load words"));

    let mut saw_error = false;
    while let Ok(event) = events.try_recv() {
        saw_error |= matches!(event, FeedEvent::Error(_));
    }
    assert!(saw_error);
    assert!(feed.take_error().is_some());
    assert!(feed.last_error().is_none());
}

#[tokio::test]
async fn load_failure_on_empty_deck_falls_back_to_seeds() {
    let store = StubStore::empty();
    store.set_fail_reads(true);
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);

    assert!(feed.load_all().await.is_err());
    assert_eq!(feed.deck().len(), 10);
    assert!(feed.deck().words().iter().all(Word::is_system));
    assert_eq!(feed.state(), FeedState::HasCurrent);
}

#[tokio::test]
async fn empty_remote_result_keeps_seed_deck() {
    let store = StubStore::empty();
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);

    assert_eq!(feed.load_all().await.unwrap(), 0);
    assert_eq!(feed.deck().len(), 10);
    assert!(feed.last_error().is_none());
}

#[tokio::test]
async fn load_top_falls_back_to_seed_leaderboard() {
    let store = StubStore::empty();
    store.set_fail_reads(true);
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);

    let top = feed.load_top(3).await;
    assert_eq!(top.len(), 3);
    assert!(top.iter().all(Word::is_system));
    assert!(top.windows(2).all(|pair| pair[0].score() >= pair[1].score()));
    assert!(feed.last_error().unwrap().contains("top words"));
    assert_eq!(feed.top_words(), top.as_slice());
}

#[tokio::test]
async fn load_top_failure_keeps_last_good_leaderboard() {
    let mut words = user_words(3);
    words[2].upvotes = 40;
    let store = StubStore::with_words(words);
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);

    let top = feed.load_top(2).await;
    assert_eq!(top[0].id.as_deref(), Some("w2"));
    store.set_fail_reads(true);

    assert_eq!(feed.load_top(2).await, top);
    assert!(feed.last_error().is_some());
}

#[tokio::test]
async fn load_user_words_returns_own_words_newest_first() {
    let mut words = user_words(3);
    words[0].created_by = "u1".to_string();
    words[2].created_by = "u1".to_string();
    let store = StubStore::with_words(words);
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);

    assert!(matches!(
        feed.load_user_words().await.unwrap_err(),
        FeedError::AuthRequired
    ));

    feed.set_identity(Some(tester())).await;
    let mine = feed.load_user_words().await.unwrap();
    let ids = mine.iter().filter_map(Word::id).collect::<Vec<_>>();
    assert_eq!(ids, vec!["w0", "w2"]);
    assert_eq!(feed.user_words().len(), 2);

    feed.set_identity(None).await;
    assert!(feed.user_words().is_empty());
    assert!(feed.identity().is_none());
}

#[tokio::test]
async fn set_identity_creates_missing_user_document() {
    let store = StubStore::empty();
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);

    feed.set_identity(Some(tester())).await;

    let user = store.inner.fetch_user("u1").await.unwrap().unwrap();
    assert_eq!(user.display_name, "Tester");
    assert!(user.created_words.is_empty());
}

#[tokio::test]
async fn reaching_prefetch_threshold_fetches_in_background() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let config = slang_core::FeedConfig {
        prefetch_threshold: 2,
        ..test_config()
    };
    let mut feed = controller_with(&store, &clock, config);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    let fresh_id = store
        .inner
        .create_word(&user_word("fresh", NOW + 5))
        .await
        .unwrap();

    feed.upvote().await.unwrap();
    assert_eq!(feed.deck().len(), 3);
    feed.settle().await;

    assert_eq!(store.since_calls(), 1);
    assert_eq!(feed.deck().len(), 4);
    assert!(feed.deck().contains_id(&fresh_id));
}

#[tokio::test]
async fn schedule_refresh_is_skipped_while_fetch_in_flight() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.load_all().await.unwrap();
    store.hold_fetches();

    assert!(feed.schedule_refresh());
    assert!(!feed.schedule_refresh());

    store.release_fetches();
    feed.settle().await;
    assert!(feed.schedule_refresh());
    feed.settle().await;
    assert_eq!(store.since_calls(), 2);
}

#[tokio::test]
async fn schedule_refresh_on_exhausted_deck_reloads() {
    let store = StubStore::with_words(user_words(1));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);
    feed.set_identity(Some(tester())).await;
    feed.load_all().await.unwrap();
    feed.upvote().await.unwrap();
    assert_eq!(feed.state(), FeedState::Exhausted);

    assert!(feed.schedule_refresh());
    assert_eq!(feed.state(), FeedState::Loading);
    feed.settle().await;

    assert_eq!(feed.state(), FeedState::HasCurrent);
    assert_eq!(store.fetch_recent_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn initialize_shows_seeds_then_applies_reload() {
    let store = StubStore::with_words(user_words(3));
    let clock = FixedClock::new(NOW);
    let mut feed = controller(&store, &clock);

    feed.initialize();
    assert_eq!(feed.deck().len(), 10);
    assert!(feed.current().unwrap().is_system());
    assert_eq!(feed.state(), FeedState::Loading);

    feed.settle().await;
    assert_eq!(feed.deck().len(), 3);
    assert_eq!(feed.state(), FeedState::HasCurrent);
}

#[tokio::test]
async fn fresh_user_words_lead_the_deck() {
    let mut words = user_words(2);
    words.push(user_word("old", NOW - 3 * 24 * HOUR_MS));
    words.push(common::system_word("sys", NOW));
    let store = StubStore::with_words(words);
    let clock = FixedClock::new(NOW);
    let config = slang_core::FeedConfig {
        intermix_probability: 0.0,
        ..test_config()
    };
    let mut feed = controller_with(&store, &clock, config);
    feed.load_all().await.unwrap();

    let ids = deck_ids(&feed);
    assert_eq!(ids.len(), 4);
    assert!(ids[..2].contains(&"w0".to_string()));
    assert!(ids[..2].contains(&"w1".to_string()));
    assert_eq!(&ids[2..], &["old".to_string(), "sys".to_string()]);
}
