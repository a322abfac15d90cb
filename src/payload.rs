use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::pipeline::bucket::{Bucket, Buckets};
use crate::pipeline::item::StudyItem;

/// Body of `POST /api/admin/anki/import`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePayload {
    pub course_name: String,
    pub description: String,
    pub items: Vec<StudyItem>,
}

fn describe(first: u32, last: u32) -> String {
    format!("Lessons {}-{} vocabulary and expressions", first, last)
}

/// One payload per bucket, in import order. The unclassified bucket is
/// only included when it has items.
pub fn course_payloads(buckets: &Buckets, settings: &Settings) -> Vec<(Bucket, CoursePayload)> {
    let t = settings.lesson_threshold;
    let course2_first = t.saturating_add(1);
    let course2_last = buckets
        .max_lesson(Bucket::Course2)
        .unwrap_or(course2_first)
        .max(course2_first);

    let mut out = vec![
        (
            Bucket::Course1,
            CoursePayload {
                course_name: settings.course1_name.clone(),
                description: describe(1, t),
                items: buckets.get(Bucket::Course1).to_vec(),
            },
        ),
        (
            Bucket::Course2,
            CoursePayload {
                course_name: settings.course2_name.clone(),
                description: describe(course2_first, course2_last),
                items: buckets.get(Bucket::Course2).to_vec(),
            },
        ),
    ];

    let unclassified = buckets.get(Bucket::Unclassified);
    if !unclassified.is_empty() {
        out.push((
            Bucket::Unclassified,
            CoursePayload {
                course_name: "Unclassified".to_string(),
                description: "Notes without lesson information, for review".to_string(),
                items: unclassified.to_vec(),
            },
        ));
    }
    out
}

/// Write `<dir>/<bucket>.json`, pretty-printed with non-ASCII text kept as is.
pub fn write_json(dir: &Path, bucket: Bucket, payload: &CoursePayload) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let path = dir.join(format!("{}.json", bucket.name()));
    let json = serde_json::to_string_pretty(payload)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(topic: &str) -> StudyItem {
        StudyItem {
            front: "食べる".into(),
            reading: "たべる".into(),
            back: "to eat".into(),
            topic: topic.into(),
        }
    }

    #[test]
    fn payload_json_shape() {
        let p = CoursePayload {
            course_name: "Minna no Nihongo 1".into(),
            description: describe(1, 25),
            items: vec![item("Lesson 05")],
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["courseName"], "Minna no Nihongo 1");
        assert_eq!(v["description"], "Lessons 1-25 vocabulary and expressions");
        assert_eq!(v["items"][0]["front"], "食べる");
        assert_eq!(v["items"][0]["reading"], "たべる");
        assert_eq!(v["items"][0]["back"], "to eat");
        assert_eq!(v["items"][0]["topic"], "Lesson 05");
    }

    #[test]
    fn descriptions_follow_threshold_and_data() {
        let mut buckets = Buckets::default();
        buckets.push(Bucket::Course1, Some(3), item("Lesson 03"));
        buckets.push(Bucket::Course2, Some(50), item("Lesson 50"));
        let payloads = course_payloads(&buckets, &Settings::default());
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].1.description, describe(1, 25));
        assert_eq!(payloads[1].1.description, describe(26, 50));
        assert_eq!(payloads[1].1.course_name, "Minna no Nihongo 2");
    }

    #[test]
    fn unclassified_only_when_present() {
        let mut buckets = Buckets::default();
        buckets.push(Bucket::Unclassified, None, item("Lesson 01"));
        let payloads = course_payloads(&buckets, &Settings::default());
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[2].0, Bucket::Unclassified);
        assert_eq!(payloads[1].1.description, describe(26, 26));
    }

    #[test]
    fn threshold_at_u32_max_does_not_overflow() {
        let settings = Settings {
            lesson_threshold: u32::MAX,
            ..Settings::default()
        };
        let mut buckets = Buckets::default();
        buckets.push(Bucket::Course1, Some(7), item("Lesson 07"));
        let payloads = course_payloads(&buckets, &settings);
        assert_eq!(payloads[0].1.description, describe(1, u32::MAX));
        assert_eq!(payloads[1].1.description, describe(u32::MAX, u32::MAX));
        assert!(payloads[1].1.items.is_empty());
    }

    #[test]
    fn json_file_keeps_japanese() {
        let dir = std::env::temp_dir().join(format!("anki_migrate_test_{}", std::process::id()));
        let p = CoursePayload {
            course_name: "c".into(),
            description: "d".into(),
            items: vec![item("Lesson 01")],
        };
        let path = write_json(&dir, Bucket::Course1, &p).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("食べる"));
        let back: CoursePayload = serde_json::from_str(&text).unwrap();
        assert_eq!(back.items, p.items);
        let _ = fs::remove_dir_all(&dir);
    }
}
