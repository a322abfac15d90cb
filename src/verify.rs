use std::sync::OnceLock;

use regex::Regex;

use crate::api::{DataCourse, DataTopic};
use crate::config::Settings;
use crate::pipeline::lesson::topic_for;

/// What `verify` looks for. Unset flags fall back to the configured course
/// names and the first lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyTargets {
    pub course: String,
    pub lesson_course: String,
    pub lesson: String,
}

impl VerifyTargets {
    pub fn resolve(
        course: Option<String>,
        lesson_course: Option<String>,
        lesson: Option<String>,
        settings: &Settings,
    ) -> VerifyTargets {
        VerifyTargets {
            course: course.unwrap_or_else(|| settings.course2_name.clone()),
            lesson_course: lesson_course.unwrap_or_else(|| settings.course1_name.clone()),
            lesson: lesson.unwrap_or_else(|| topic_for(1)),
        }
    }
}

/// Comparison key for titles: trimmed, lowercased, and `Lesson 01` folded
/// to `lesson 1`.
fn title_key(title: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^lesson\s*0*([0-9]+)$").unwrap());
    let t = title.trim().to_lowercase();
    match re.captures(&t) {
        Some(c) => format!("lesson {}", &c[1]),
        None => t,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicCount {
    pub id: i64,
    pub title: String,
    pub order_index: Option<i64>,
    pub items: usize,
}

pub fn topic_counts(course: &DataCourse) -> Vec<TopicCount> {
    course
        .topics
        .iter()
        .map(|t| TopicCount {
            id: t.id,
            title: t.title.clone(),
            order_index: t.order_index,
            items: t.study_items.len(),
        })
        .collect()
}

/// Course whose title equals `needle`, else the first one containing it.
pub fn find_course<'a>(courses: &'a [DataCourse], needle: &str) -> Option<&'a DataCourse> {
    let key = title_key(needle);
    courses
        .iter()
        .find(|c| title_key(&c.title) == key)
        .or_else(|| courses.iter().find(|c| c.title.contains(needle)))
}

/// Topic with the same title. `Lesson 1` matches `Lesson 01` but never
/// `Lesson 10`.
pub fn find_topic<'a>(course: &'a DataCourse, needle: &str) -> Option<&'a DataTopic> {
    let key = title_key(needle);
    course.topics.iter().find(|t| title_key(&t.title) == key)
}

/// Print every course with per-topic counts. Titles are quoted so stray
/// whitespace shows.
pub fn print_topics(courses: &[DataCourse]) {
    for course in courses {
        println!("Course: {}", course.title);
        for t in topic_counts(course) {
            let order = t
                .order_index
                .map(|o| o.to_string())
                .unwrap_or_else(|| "-".into());
            println!(
                "  Topic ID {}: '{}' - Order: {} - Items: {}",
                t.id, t.title, order, t.items
            );
        }
    }
}
