use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::fields::FieldMap;

/// Lesson assigned to notes that carry no usable lesson information.
pub const DEFAULT_LESSON: u32 = 1;

/// Where a note's lesson came from. A numbered tag gets the same
/// `Lesson NN` topic as a field would; only number-less tags keep their text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lesson {
    /// A "Lesson"/"Chapter" field held a number.
    Numbered(u32),
    /// A tag named the lesson. `number` is its first digit run, if any.
    Tagged { label: String, number: Option<u32> },
    /// Nothing usable. `parse_failed` is set when a lesson field existed
    /// but held no number.
    Unresolved { parse_failed: bool },
}

impl Lesson {
    /// The numeric lesson, when one was actually found.
    pub fn number(&self) -> Option<u32> {
        match self {
            Lesson::Numbered(n) => Some(*n),
            Lesson::Tagged { number, .. } => *number,
            Lesson::Unresolved { .. } => None,
        }
    }

    /// Lesson number used for bucketing in lenient mode.
    pub fn number_or_default(&self) -> u32 {
        self.number().unwrap_or(DEFAULT_LESSON)
    }

    pub fn topic(&self) -> String {
        match self {
            Lesson::Numbered(n) => topic_for(*n),
            Lesson::Tagged {
                number: Some(n), ..
            } => topic_for(*n),
            Lesson::Tagged { label, .. } => label.clone(),
            Lesson::Unresolved { .. } => topic_for(DEFAULT_LESSON),
        }
    }

    pub fn parse_failed(&self) -> bool {
        matches!(self, Lesson::Unresolved { parse_failed: true })
    }
}

/// `Lesson 05`: zero-padded so string order matches lesson order up to 99.
pub fn topic_for(lesson: u32) -> String {
    format!("Lesson {:02}", lesson)
}

/// First run of ASCII digits in `s`, if it fits a `u32`.
pub fn first_number(s: &str) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[0-9]+").unwrap());
    re.find(s)?.as_str().parse().ok()
}

pub(super) fn is_lesson_field(name: &str) -> bool {
    name.contains("Lesson") || name.contains("Chapter")
}

fn is_lesson_tag(tag: &str) -> bool {
    tag.to_lowercase().contains("lesson") || tag.starts_with('L')
}

/// Lesson field first, then tags, then nothing.
pub fn resolve(fields: &FieldMap, tags: &str) -> Lesson {
    let mut parse_failed = false;
    for entry in fields.iter().filter(|e| is_lesson_field(&e.name)) {
        match first_number(&entry.value) {
            Some(n) => return Lesson::Numbered(n),
            None => {
                debug!(index = entry.index, field = %entry.name, "Lesson field holds no number");
                parse_failed = true;
            }
        }
    }

    if let Some(tag) = tags.split_whitespace().find(|t| is_lesson_tag(t)) {
        return Lesson::Tagged {
            label: tag.replace('_', " "),
            number: first_number(tag),
        };
    }

    Lesson::Unresolved { parse_failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fields::Decoder;
    use std::collections::HashMap;

    fn positional(packed: &str) -> FieldMap {
        Decoder::new(&HashMap::new()).decode(0, packed).fields
    }

    #[test]
    fn lesson_field_number() {
        let f = positional("食べる\x1fto eat\x1fたべる\x1f5");
        assert_eq!(resolve(&f, ""), Lesson::Numbered(5));
    }

    #[test]
    fn first_digit_run_is_used() {
        assert_eq!(first_number("Chapter 30: Travel"), Some(30));
        assert_eq!(first_number("L2-14"), Some(2));
        assert_eq!(first_number("none"), None);
        assert_eq!(first_number("99999999999"), None);
    }

    #[test]
    fn field_beats_tags() {
        let f = positional("a\x1fb\x1fc\x1f7");
        assert_eq!(resolve(&f, "Lesson_3"), Lesson::Numbered(7));
    }

    #[test]
    fn tag_label_override() {
        let f = positional("a\x1fb");
        assert_eq!(
            resolve(&f, "vocab Lesson_12 n5"),
            Lesson::Tagged {
                label: "Lesson 12".to_string(),
                number: Some(12),
            }
        );
        let l = resolve(&f, "Listening");
        assert_eq!(l.topic(), "Listening");
        assert_eq!(l.number(), None);
    }

    #[test]
    fn numbered_tag_sorts_with_field_lessons() {
        let tagged = resolve(&positional("a\x1fb"), "Lesson_2");
        let field2 = resolve(&positional("a\x1fb\x1fc\x1f2"), "");
        let field10 = resolve(&positional("a\x1fb\x1fc\x1f10"), "");
        assert_eq!(tagged.topic(), "Lesson 02");
        assert_eq!(tagged.topic(), field2.topic());
        assert!(tagged.topic() < field10.topic());

        let l3 = resolve(&positional("a\x1fb"), "L3");
        assert_eq!(l3.topic(), "Lesson 03");
    }

    #[test]
    fn missing_everything_defaults_to_one() {
        let f = positional("行く\x1fto go");
        let l = resolve(&f, "verbs n5");
        assert_eq!(l, Lesson::Unresolved { parse_failed: false });
        assert_eq!(l.number_or_default(), 1);
        assert_eq!(l.topic(), "Lesson 01");
    }

    #[test]
    fn unparseable_field_is_flagged() {
        let f = positional("a\x1fb\x1fc\x1fsee notes");
        let l = resolve(&f, "");
        assert!(l.parse_failed());
        assert_eq!(l.number_or_default(), 1);
    }

    #[test]
    fn field_name_match_is_case_sensitive() {
        let mut schemas = HashMap::new();
        schemas.insert(
            1,
            crate::db::FieldSchema {
                names: vec![Some("Word".into()), Some("lesson".into())],
            },
        );
        let f = Decoder::new(&schemas).decode(1, "w\x1f9").fields;
        assert_eq!(resolve(&f, "").number(), None);
    }

    #[test]
    fn topics_sort_like_numbers() {
        for n in 1..99u32 {
            for m in (n + 1)..=99 {
                assert!(topic_for(n) < topic_for(m), "{} vs {}", n, m);
            }
        }
        assert_eq!(topic_for(5), "Lesson 05");
        assert_eq!(topic_for(30), "Lesson 30");
    }
}
