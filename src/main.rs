mod api;
mod config;
mod db;
mod error;
mod payload;
mod pipeline;
mod verify;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::{Overrides, Settings};
use crate::error::Fallback;
use crate::pipeline::bucket::Bucket;
use crate::pipeline::{Extraction, Options};

#[derive(Parser)]
#[command(name = "anki_migrate", about = "Move Anki flashcards into the study app")]
struct Cli {
    /// Settings file (default: ./anki_migrate.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Anki collection file
    #[arg(long, global = true)]
    source: Option<PathBuf>,
    /// Admin API root
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Highest lesson number that belongs to course 1
    #[arg(long, global = true)]
    threshold: Option<u32>,
    /// Put notes without a numeric lesson into an "unclassified" bucket
    #[arg(long, global = true)]
    strict: bool,
    /// Strip HTML and sound tags from field values
    #[arg(long, global = true)]
    clean_html: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract notes and write one JSON payload per course
    Extract {
        /// Output directory
        #[arg(short, long, default_value = "data/export")]
        out: PathBuf,
    },
    /// Extract notes, replace the courses on the server and import both
    Import {
        /// Do not delete existing courses first
        #[arg(long)]
        keep_existing: bool,
        /// Stop after extraction, no HTTP calls
        #[arg(long)]
        dry_run: bool,
    },
    /// Print every course's topics with item counts
    Topics,
    /// Check that an imported course exists and show its topic counts
    Verify {
        /// Course title to check (default: the configured course 2 name)
        #[arg(long)]
        course: Option<String>,
        /// Course to look up a single lesson in (default: course 1 name)
        #[arg(long)]
        lesson_course: Option<String>,
        /// Topic title to count, e.g. "Lesson 1" (default: Lesson 01)
        #[arg(long)]
        lesson: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let overrides = Overrides {
        source_path: cli.source.clone(),
        base_url: cli.base_url.clone(),
        lesson_threshold: cli.threshold,
        strict: cli.strict,
        clean_html: cli.clean_html,
    };
    let settings = Settings::load(cli.config.as_deref(), &overrides)?;

    let result = match cli.command {
        Commands::Extract { out } => {
            let extraction = extract(&settings)?;
            print_summary(&extraction, &settings);
            for (bucket, payload) in payload::course_payloads(&extraction.buckets, &settings) {
                let path = payload::write_json(&out, bucket, &payload)?;
                println!("Exported {} items to {}", payload.items.len(), path.display());
            }
            print_samples(&extraction);
            Ok(())
        }
        Commands::Import {
            keep_existing,
            dry_run,
        } => {
            let extraction = extract(&settings)?;
            print_summary(&extraction, &settings);
            if dry_run {
                println!("Dry run: nothing sent to {}", settings.base_url);
                return Ok(());
            }
            import(&settings, &extraction, keep_existing)
        }
        Commands::Topics => {
            let courses = api::fetch_data_courses(&settings.data_url)
                .with_context(|| format!("Failed to fetch courses from {}", settings.data_url))?;
            if courses.is_empty() {
                println!("No courses found.");
            }
            verify::print_topics(&courses);
            Ok(())
        }
        Commands::Verify {
            course,
            lesson_course,
            lesson,
        } => {
            let targets = verify::VerifyTargets::resolve(course, lesson_course, lesson, &settings);
            let courses = api::fetch_data_courses(&settings.data_url)
                .with_context(|| format!("Failed to fetch courses from {}", settings.data_url))?;
            let Some(target) = verify::find_course(&courses, &targets.course) else {
                bail!("{} course not found", targets.course);
            };
            println!("Checking course: {}", target.title);
            for t in verify::topic_counts(target) {
                println!("Topic: '{}' (ID: {}) - Items: {}", t.title, t.id, t.items);
            }
            if let Some(other) = verify::find_course(&courses, &targets.lesson_course) {
                if let Some(topic) = verify::find_topic(other, &targets.lesson) {
                    println!(
                        "{} ({}) Items: {}",
                        topic.title,
                        other.title,
                        topic.study_items.len()
                    );
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn extract(settings: &Settings) -> Result<Extraction> {
    println!("Collection: {}", settings.source_path.display());
    let (rows, schemas) = read_collection(&settings.source_path)?;
    Ok(pipeline::run(rows, &schemas, &Options::from(settings)))
}

/// Read everything up front; the connection closes when this returns.
fn read_collection(
    path: &Path,
) -> Result<(db::NoteRows, std::collections::HashMap<i64, db::FieldSchema>)> {
    let conn = db::open(path)?;
    let rows = db::fetch_all_notes(&conn)?;
    let schemas = db::fetch_field_schemas(&conn)?;
    Ok((rows, schemas))
}

fn import(settings: &Settings, extraction: &Extraction, keep_existing: bool) -> Result<()> {
    println!("Connecting to {}...", settings.base_url);
    let mut client = api::AdminClient::new(&settings.base_url, settings.credentials.clone())?;
    client.login().context("Login failed")?;
    println!("Got token");

    if !keep_existing {
        println!("Deleting old courses...");
        match client.list_courses() {
            Ok(courses) => {
                for course in courses {
                    let title = course.title.as_deref().unwrap_or("(untitled)");
                    match client.delete_course(course.id) {
                        Ok(()) => println!("  Deleted: {}", title),
                        Err(e) => warn!("Could not delete course {} ({}): {}", course.id, title, e),
                    }
                }
            }
            Err(e) => warn!("Could not list courses: {}", e),
        }
    }

    for (bucket, payload) in payload::course_payloads(&extraction.buckets, settings) {
        if payload.items.is_empty() {
            println!("Skipping {}: no items", payload.course_name);
            continue;
        }
        if bucket == Bucket::Unclassified {
            println!(
                "Not importing {} unclassified items; see `extract` output",
                payload.items.len()
            );
            continue;
        }
        println!("Importing {} ({} items)...", payload.course_name, payload.items.len());
        let reply = client
            .import_course(&payload)
            .with_context(|| format!("Import of {} failed", payload.course_name))?;
        println!("  -> {}", reply);
    }
    Ok(())
}

fn print_summary(extraction: &Extraction, settings: &Settings) {
    let b = &extraction.buckets;
    let t = settings.lesson_threshold;
    println!("Total notes: {}", extraction.report.total_notes);
    println!("Course 1 (Lessons 1-{}): {} items", t, b.course1.len());
    println!(
        "Course 2 (Lessons {}+): {} items",
        t.saturating_add(1),
        b.course2.len()
    );
    if settings.strict {
        println!("Unclassified: {} items", b.unclassified.len());
    }
    for f in Fallback::ALL {
        let n = extraction.report.count(f);
        if n > 0 {
            println!("  {}: {}", f, n);
        }
    }
    if extraction.report.truncated > 0 {
        println!(
            "Some text was clipped to fit database limits: {} items",
            extraction.report.truncated
        );
    }
    for s in extraction.report.skipped.iter().take(10) {
        let id = s.note_id.map(|i| i.to_string()).unwrap_or_else(|| "?".into());
        println!("  skipped note {}: {}", id, s.reason);
    }
}

fn print_samples(extraction: &Extraction) {
    println!("Sample items:");
    for item in extraction.buckets.course1.iter().take(3) {
        println!(
            "  {} | {} | {} | {}",
            truncate(&item.front, 24),
            truncate(&item.reading, 24),
            truncate(&item.back, 32),
            item.topic
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
