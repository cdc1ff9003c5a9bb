//! Prioritized shuffle over candidate words.
//!
//! # Invariants
//! - Every input word appears exactly once in the output.
//! - Tier 1 (recent user words) always precedes tiers 2 and 3.
//! - Without intermixing, tier 2 (older user words) precedes tier 3 (system).

use crate::model::word::Word;
use rand::seq::SliceRandom;
use rand::Rng;

/// Priority group of a word within the shuffled feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    RecentUser,
    OlderUser,
    System,
}

/// Shuffle knobs taken from `FeedConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShufflePolicy {
    pub recent_window_ms: i64,
    pub intermix_probability: f64,
}

pub fn tier_of(word: &Word, now_ms: i64, recent_window_ms: i64) -> Tier {
    if word.is_system() {
        Tier::System
    } else if now_ms.saturating_sub(word.created_at) < recent_window_ms {
        Tier::RecentUser
    } else {
        Tier::OlderUser
    }
}

/// Orders `words` by tier, shuffling uniformly within each tier.
///
/// With probability `intermix_probability` tiers 2 and 3 are merged into one
/// pool and shuffled together behind tier 1.
pub fn prioritized_shuffle<R>(
    words: Vec<Word>,
    now_ms: i64,
    policy: &ShufflePolicy,
    rng: &mut R,
) -> Vec<Word>
where
    R: Rng + ?Sized,
{
    let mut recent = Vec::new();
    let mut older = Vec::new();
    let mut system = Vec::new();
    for word in words {
        match tier_of(&word, now_ms, policy.recent_window_ms) {
            Tier::RecentUser => recent.push(word),
            Tier::OlderUser => older.push(word),
            Tier::System => system.push(word),
        }
    }

    recent.shuffle(rng);
    older.shuffle(rng);
    system.shuffle(rng);

    let mut ordered = recent;
    if rng.gen_bool(policy.intermix_probability) {
        let mut pool = older;
        pool.append(&mut system);
        pool.shuffle(rng);
        ordered.append(&mut pool);
    } else {
        ordered.append(&mut older);
        ordered.append(&mut system);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::{prioritized_shuffle, tier_of, ShufflePolicy, Tier};
    use crate::model::word::{Word, SYSTEM_CREATOR_ID};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const NOW: i64 = 10 * 86_400_000;
    const WINDOW: i64 = 86_400_000;

    fn word(id: &str, creator: &str, created_at: i64) -> Word {
        Word::draft(id, "def", creator, "name", created_at).with_id(id)
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_of(&word("a", "u", NOW - 1), NOW, WINDOW), Tier::RecentUser);
        assert_eq!(tier_of(&word("b", "u", NOW - WINDOW), NOW, WINDOW), Tier::OlderUser);
        assert_eq!(
            tier_of(&word("c", SYSTEM_CREATOR_ID, NOW), NOW, WINDOW),
            Tier::System
        );
    }

    #[test]
    fn intermix_keeps_recent_words_first() {
        let mut words = vec![word("r1", "u", NOW), word("r2", "u", NOW - 5)];
        for i in 0..6 {
            words.push(word(&format!("o{i}"), "u", NOW - 3 * WINDOW));
            words.push(word(&format!("s{i}"), SYSTEM_CREATOR_ID, NOW));
        }
        let policy = ShufflePolicy {
            recent_window_ms: WINDOW,
            intermix_probability: 1.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let ordered = prioritized_shuffle(words, NOW, &policy, &mut rng);

        assert_eq!(ordered.len(), 14);
        let head = ordered[..2].iter().filter_map(Word::id).collect::<Vec<_>>();
        assert!(head.iter().all(|id| id.starts_with('r')));
    }
}
