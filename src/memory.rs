//! User-memory rendering: turns the taste profile and the people directory
//! into the plain-text block interpolated into the generate stage.

use crate::storage::{Person, RhymeTag, TasteProfile};
use std::fmt::Write;

/// At most this many people are surfaced to the model.
const PEOPLE_LIMIT: usize = 10;

/// Render learned preferences and people memory for the prompt. Returns
/// `"None"` when there is nothing to say, so templates never interpolate an
/// empty block.
pub fn render_user_memory(profile: Option<&TasteProfile>, people: &[Person]) -> String {
    let mut parts: Vec<String> = Vec::new();

    match profile {
        Some(p) if p.total_ratings > 0 => {
            let mut block = String::from("Preferences learned from ratings:\n");
            let rhyme_hint = match p.rhyme_pref {
                Some(RhymeTag::Rhymed) => "prefers rhyme",
                Some(RhymeTag::Unrhymed) => "prefers no rhyme",
                Some(RhymeTag::Partial) | None => "no strong rhyme preference",
            };
            let _ = writeln!(block, "- {rhyme_hint}");
            if let Some(avg) = p.avg_length {
                let _ = writeln!(block, "- typical length: ~{} words", avg.round() as i64);
            }
            if let Some(level) = p.reading_level {
                let _ = writeln!(block, "- reading level: {}", level.as_str());
            }
            if let Some(ending) = p.ending_style {
                let _ = writeln!(block, "- ending style: {}", ending.as_str());
            }
            parts.push(block.trim_end().to_string());
        }
        _ => parts.push("Preferences learned from ratings: none yet.".to_string()),
    }

    if people.is_empty() {
        parts.push("People memory: none yet.".to_string());
    } else {
        let mut block = String::from("People memory:\n");
        for person in people.iter().take(PEOPLE_LIMIT) {
            let _ = write!(block, "- {} ({})", person.name, person.relationship);
            if let Some(notes) = person.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                let _ = write!(block, " note: {notes}");
            }
            block.push('\n');
        }
        parts.push(block.trim_end().to_string());
    }

    let rendered = parts.join("\n\n").trim().to_string();
    if rendered.is_empty() {
        "None".to_string()
    } else {
        rendered
    }
}
