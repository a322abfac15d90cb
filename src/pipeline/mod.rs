pub mod bucket;
pub mod fields;
pub mod item;
pub mod lesson;

use std::collections::{BTreeMap, HashMap};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::db::{FieldSchema, Note, NoteRows};
use crate::error::Fallback;
use bucket::{Bucket, Buckets};
use fields::Decoder;
use item::StudyItem;
use lesson::Lesson;

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub lesson_threshold: u32,
    pub strict: bool,
    pub clean_html: bool,
}

impl From<&Settings> for Options {
    fn from(s: &Settings) -> Self {
        Options {
            lesson_threshold: s.lesson_threshold,
            strict: s.strict,
            clean_html: s.clean_html,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedNote {
    pub note_id: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ExtractReport {
    pub total_notes: usize,
    pub fallbacks: BTreeMap<Fallback, usize>,
    pub skipped: Vec<SkippedNote>,
    /// Items with at least one value clipped to the column limits.
    pub truncated: usize,
}

impl ExtractReport {
    fn record(&mut self, fallback: Fallback) {
        *self.fallbacks.entry(fallback).or_insert(0) += 1;
    }

    pub fn count(&self, fallback: Fallback) -> usize {
        self.fallbacks.get(&fallback).copied().unwrap_or(0)
    }
}

pub struct Extraction {
    pub buckets: Buckets,
    pub report: ExtractReport,
}

/// One processed note.
#[derive(Debug)]
pub struct Processed {
    pub item: StudyItem,
    pub lesson: Lesson,
    pub bucket: Bucket,
    pub fallbacks: Vec<Fallback>,
    pub truncated: bool,
}

/// Decode, resolve, normalize and route a single note. `Err` means the
/// note carries nothing worth importing.
pub fn process_note(decoder: &Decoder, note: &Note, opts: &Options) -> Result<Processed, String> {
    let decoded = decoder.decode(note.model_id, &note.fields);
    if decoded.fields.is_blank() {
        return Err("all fields are empty".to_string());
    }

    let mut fallbacks = Vec::new();
    if decoded.positional {
        fallbacks.push(Fallback::UnresolvedModel);
    }
    if decoded.malformed > 0 {
        fallbacks.push(Fallback::MalformedSchema);
    }

    let lesson = lesson::resolve(&decoded.fields, &note.tags);
    if lesson.parse_failed() {
        fallbacks.push(Fallback::LessonParseFailure);
    }

    let (item, truncated) = item::normalize(&decoded.fields, &lesson, opts.clean_html);
    let bucket = bucket::route(&lesson, opts.lesson_threshold, opts.strict);
    Ok(Processed {
        item,
        lesson,
        bucket,
        fallbacks,
        truncated,
    })
}

/// Turn every readable note into a study item and sort it into a bucket.
/// A bad note is recorded and skipped; it never stops the batch.
pub fn run(rows: NoteRows, schemas: &HashMap<i64, FieldSchema>, opts: &Options) -> Extraction {
    let decoder = Decoder::new(schemas);
    let mut buckets = Buckets::default();
    let mut report = ExtractReport {
        total_notes: rows.notes.len() + rows.failed.len(),
        ..Default::default()
    };

    for failed in rows.failed {
        report.record(Fallback::NoteProcessingFailure);
        report.skipped.push(SkippedNote {
            note_id: failed.note_id,
            reason: failed.reason,
        });
    }

    let pb = ProgressBar::new(rows.notes.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} notes")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    for note in &rows.notes {
        match process_note(&decoder, note, opts) {
            Ok(p) => {
                for f in &p.fallbacks {
                    debug!(note_id = note.id, model_id = note.model_id, "{}", f);
                    report.record(*f);
                }
                if p.truncated {
                    debug!(note_id = note.id, "Clipped to column limits");
                    report.truncated += 1;
                }
                buckets.push(p.bucket, p.lesson.number(), p.item);
            }
            Err(reason) => {
                warn!(note_id = note.id, "Skipping note: {}", reason);
                report.record(Fallback::NoteProcessingFailure);
                report.skipped.push(SkippedNote {
                    note_id: Some(note.id),
                    reason,
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        items = buckets.total(),
        course1 = buckets.course1.len(),
        course2 = buckets.course2.len(),
        unclassified = buckets.unclassified.len(),
        skipped = report.skipped.len(),
        truncated = report.truncated,
        "Extraction finished"
    );
    Extraction { buckets, report }
}
