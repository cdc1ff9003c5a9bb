//! Built-in seed words shown before the first store round trip.

use crate::model::word::{Word, SYSTEM_CREATOR_ID};

const SEED_CREATOR_NAME: &str = "SlangIt";
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

// (id, word, definition, upvotes, downvotes, age in days)
const SEED_WORDS: &[(&str, &str, &str, u32, u32, i64)] = &[
    ("1", "Rizz", "Charisma or the ability to attract a romantic partner through charm and communication", 125, 15, 7),
    ("2", "Bussin", "Extremely good, delicious, or exceptional, particularly used to describe food", 98, 12, 6),
    ("3", "No Cap", "No lie or telling the truth; used to emphasize honesty", 87, 5, 5),
    ("4", "Tea", "Gossip or juicy information worth talking about", 76, 8, 4),
    ("5", "Slay", "To do something exceptionally well or to look extremely good", 65, 7, 3),
    ("6", "Boujee", "High-class, fancy, luxurious, or associated with a higher socioeconomic status", 54, 11, 2),
    ("7", "Bop", "A song that is extremely catchy or enjoyable", 43, 6, 1),
    ("8", "Yeet", "To throw something forcefully or with great energy; can also express excitement", 39, 14, 0),
    ("9", "Flex", "To show off or boast about something you have or can do", 32, 4, 0),
    ("10", "Vibe Check", "An assessment of someone's mood or attitude, or the general atmosphere of a situation", 28, 3, 0),
];

/// Returns the seed set with timestamps relative to `now_ms`.
pub fn seed_words(now_ms: i64) -> Vec<Word> {
    SEED_WORDS
        .iter()
        .map(|&(id, text, definition, upvotes, downvotes, age_days)| Word {
            id: Some(id.to_string()),
            text: text.to_string(),
            definition: definition.to_string(),
            created_by: SYSTEM_CREATOR_ID.to_string(),
            creator_name: SEED_CREATOR_NAME.to_string(),
            upvotes,
            downvotes,
            created_at: now_ms - age_days * DAY_MS,
        })
        .collect()
}

/// Seed words ranked by score, highest first, truncated to `limit`.
pub fn seed_leaderboard(now_ms: i64, limit: usize) -> Vec<Word> {
    let mut words = seed_words(now_ms);
    words.sort_by(|a, b| b.score().cmp(&a.score()));
    words.truncate(limit);
    words
}

#[cfg(test)]
mod tests {
    use super::{seed_leaderboard, seed_words};

    #[test]
    fn seed_words_are_system_words_with_unique_ids() {
        let words = seed_words(1_000);
        assert_eq!(words.len(), 10);
        assert!(words.iter().all(|word| word.is_system()));
        let mut ids = words.iter().filter_map(|w| w.id.clone()).collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn leaderboard_orders_by_score() {
        let top = seed_leaderboard(0, 3);
        let texts = top.iter().map(|w| w.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, ["Rizz", "Bussin", "No Cap"]);
    }
}
