//! Taste-profile recomputation.
//!
//! Pure functions over the full rating history: no clock, no randomness, no
//! storage access. Recomputing twice over the same inputs yields an
//! identical profile, so the persisted profile is strictly a cache.
//!
//! The scoring heuristics (rhyme tagging, readability, ending
//! classification) are intentionally replaceable; only determinism is load-
//! bearing.

use super::traits::{EndingStyle, RatedVersion, RhymeTag, TasteProfile};
use crate::pipeline::ReadingLevel;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// ─── Per-poem scoring ────────────────────────────────────────────────────────

/// Tag a poem's rhyme scheme by checking adjacent line pairs for matching
/// ending sounds (crude suffix comparison on the final word).
pub fn detect_rhyme_tag(text: &str) -> RhymeTag {
    let endings: Vec<String> = text
        .lines()
        .filter_map(line_ending_sound)
        .collect();
    if endings.len() < 2 {
        return RhymeTag::Unrhymed;
    }

    let pairs = endings.len() - 1;
    let rhyming = endings
        .windows(2)
        .filter(|pair| sounds_alike(&pair[0], &pair[1]))
        .count();

    let ratio = rhyming as f64 / pairs as f64;
    if ratio >= 0.5 {
        RhymeTag::Rhymed
    } else if ratio >= 0.2 {
        RhymeTag::Partial
    } else {
        RhymeTag::Unrhymed
    }
}

fn line_ending_sound(line: &str) -> Option<String> {
    let word = line
        .split_whitespace()
        .last()?
        .trim_matches(|c: char| !c.is_alphabetic())
        .to_lowercase();
    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

fn sounds_alike(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    // Reversed-prefix comparison is equivalent to comparing the last two
    // characters without byte-offset slicing.
    let tail = |w: &str| w.chars().rev().take(2).collect::<String>();
    tail(a) == tail(b)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Word-length based readability score. Higher means harder.
pub fn readability_score(text: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let total_len: usize = words
        .iter()
        .map(|w| w.chars().filter(|c| c.is_alphabetic()).count())
        .sum();
    total_len as f64 / words.len() as f64
}

fn bucket_readability(score: f64) -> ReadingLevel {
    if score < 4.2 {
        ReadingLevel::Simple
    } else if score < 5.4 {
        ReadingLevel::General
    } else {
        ReadingLevel::Advanced
    }
}

/// Classify how a poem lands from its final line.
pub fn classify_ending(text: &str) -> EndingStyle {
    let last = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let words: Vec<String> = last
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphabetic())
                .to_lowercase()
        })
        .collect();

    const HOPEFUL_CUES: [&str; 6] = ["hope", "dawn", "light", "tomorrow", "rise", "bloom"];
    if words.iter().any(|w| HOPEFUL_CUES.contains(&w.as_str())) {
        EndingStyle::Hopeful
    } else if last.ends_with('!') {
        EndingStyle::Punchline
    } else if last.ends_with('?') {
        EndingStyle::Twist
    } else {
        EndingStyle::Soft
    }
}

// ─── Recomputation ───────────────────────────────────────────────────────────

/// Rebuild a user's taste profile from their full rating history.
///
/// - rhyme preference: rating-weighted mode of the detected rhyme tag
/// - average length: mean word count of versions rated >= 3
/// - reading level: rating-weighted mean readability, bucketed
/// - ending style: mode of the ending classification over versions rated
///   >= 4, falling back to declared ending preferences
///
/// Ties break toward the tag seen on the most recent version. `updated_at`
/// is the newest rating timestamp in the input, so the output depends only
/// on the input.
pub fn recompute(user_id: &str, rated: &[RatedVersion]) -> TasteProfile {
    if rated.is_empty() {
        return TasteProfile::empty(user_id);
    }

    let mut ordered: Vec<&RatedVersion> = rated.iter().collect();
    ordered.sort_by(|a, b| {
        a.rating
            .created_at
            .cmp(&b.rating.created_at)
            .then(a.rating.id.cmp(&b.rating.id))
    });

    let rhyme_pref = weighted_mode(
        ordered
            .iter()
            .map(|rv| (detect_rhyme_tag(&rv.version.text), i64::from(rv.rating.score))),
    );

    let liked_lengths: Vec<usize> = ordered
        .iter()
        .filter(|rv| rv.rating.score >= 3)
        .map(|rv| word_count(&rv.version.text))
        .collect();
    let avg_length = if liked_lengths.is_empty() {
        None
    } else {
        Some(liked_lengths.iter().sum::<usize>() as f64 / liked_lengths.len() as f64)
    };

    let weight_sum: i64 = ordered.iter().map(|rv| i64::from(rv.rating.score)).sum();
    let reading_level = if weight_sum > 0 {
        let weighted: f64 = ordered
            .iter()
            .map(|rv| readability_score(&rv.version.text) * f64::from(rv.rating.score))
            .sum();
        Some(bucket_readability(weighted / weight_sum as f64))
    } else {
        None
    };

    let ending_style = weighted_mode(
        ordered
            .iter()
            .filter(|rv| rv.rating.score >= 4)
            .map(|rv| (classify_ending(&rv.version.text), 1)),
    )
    .or_else(|| {
        weighted_mode(
            ordered
                .iter()
                .filter_map(|rv| rv.rating.ending_pref.map(|pref| (pref, 1))),
        )
    });

    let updated_at: DateTime<Utc> = ordered
        .iter()
        .map(|rv| rv.rating.created_at)
        .max()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    TasteProfile {
        user_id: user_id.to_string(),
        total_ratings: ordered.len() as i64,
        rhyme_pref,
        avg_length,
        reading_level,
        ending_style,
        updated_at,
    }
}

/// Weighted mode over an ordered stream; on equal weight the later
/// (most recent) entry wins.
fn weighted_mode<T: Copy + Eq + std::hash::Hash>(
    items: impl Iterator<Item = (T, i64)>,
) -> Option<T> {
    let mut weights: HashMap<T, i64> = HashMap::new();
    let mut last_seen: Vec<T> = Vec::new();
    for (tag, weight) in items {
        *weights.entry(tag).or_insert(0) += weight;
        last_seen.retain(|t| *t != tag);
        last_seen.push(tag);
    }
    // `max_by_key` returns the last maximal element, so scanning oldest to
    // newest resolves ties toward the latest tag.
    last_seen
        .iter()
        .max_by_key(|tag| weights.get(tag).copied().unwrap_or(0))
        .copied()
}
