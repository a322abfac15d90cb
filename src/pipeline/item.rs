use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::fields::{FieldEntry, FieldMap};
use super::lesson::{is_lesson_field, Lesson};

pub const MAX_TEXT_CHARS: usize = 500;
pub const MAX_READING_CHARS: usize = 200;

const FRONT_NAMES: &[&str] = &["expression", "front", "word", "vocabulary", "kanji", "japanese"];
const BACK_NAMES: &[&str] = &["meaning", "back", "english", "definition", "translation"];
const READING_NAMES: &[&str] = &["reading", "kana", "furigana", "hiragana"];

/// One flashcard in the shape the admin import endpoint accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyItem {
    pub front: String,
    pub reading: String,
    pub back: String,
    pub topic: String,
}

/// Keep at most `max` characters. Never fails, only drops the tail.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte, _)) => s[..byte].to_string(),
        None => s.to_string(),
    }
}

/// Strip HTML tags and sound references, decode common entities and
/// collapse whitespace.
pub fn clean_text(s: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static MEDIA: OnceLock<Regex> = OnceLock::new();
    static SPACE: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    let media = MEDIA.get_or_init(|| Regex::new(r"\[(?:sound|anki:play):[^\]]+\]").unwrap());
    let space = SPACE.get_or_init(|| Regex::new(r"\s+").unwrap());

    let text = tags.replace_all(s, " ");
    let text = media.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    space.replace_all(&text, " ").trim().to_string()
}

fn find_named<'a>(fields: &'a FieldMap, candidates: &[&str]) -> Option<&'a FieldEntry> {
    fields
        .iter()
        .find(|e| candidates.iter().any(|c| e.name.eq_ignore_ascii_case(c)))
}

/// Field for a role: by name first, then by position among the
/// non-lesson fields.
fn pick<'a>(fields: &'a FieldMap, candidates: &[&str], position: Option<usize>) -> &'a str {
    if let Some(e) = find_named(fields, candidates) {
        return &e.value;
    }
    position
        .and_then(|p| fields.iter().filter(|e| !is_lesson_field(&e.name)).nth(p))
        .map(|e| e.value.as_str())
        .unwrap_or("")
}

/// Build the study item for a note. The flag is set when any value had to
/// be clipped to fit the column limits.
pub fn normalize(fields: &FieldMap, lesson: &Lesson, clean_html: bool) -> (StudyItem, bool) {
    let mut clipped = false;
    let mut prep = |s: &str, max: usize| {
        let text = if clean_html {
            clean_text(s)
        } else {
            s.to_string()
        };
        let out = truncate(&text, max);
        clipped |= out.len() < text.len();
        out
    };

    let item = StudyItem {
        front: prep(pick(fields, FRONT_NAMES, Some(0)), MAX_TEXT_CHARS),
        reading: prep(pick(fields, READING_NAMES, None), MAX_READING_CHARS),
        back: prep(pick(fields, BACK_NAMES, Some(1)), MAX_TEXT_CHARS),
        topic: lesson.topic(),
    };
    (item, clipped)
}
