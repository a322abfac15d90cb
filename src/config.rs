use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ::config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_LESSON_THRESHOLD: u32 = 25;
/// Topics are `Lesson NN`; past 99 they stop sorting in lesson order.
pub const MAX_LESSON_THRESHOLD: u32 = 99;
const DEFAULT_CONFIG_NAME: &str = "anki_migrate";

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Everything a migration run needs, resolved once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Anki collection file (`collection.anki2`).
    pub source_path: PathBuf,
    /// Admin API root used for login and import.
    pub base_url: String,
    /// Read-only data API root used by `topics` and `verify`.
    pub data_url: String,
    pub credentials: Credentials,
    /// Highest lesson number that still belongs to course 1.
    pub lesson_threshold: u32,
    /// Route notes without a numeric lesson to an `unclassified` bucket.
    pub strict: bool,
    pub clean_html: bool,
    pub course1_name: String,
    pub course2_name: String,
}

/// Command-line values that win over file and environment settings.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub source_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub lesson_threshold: Option<u32>,
    pub strict: bool,
    pub clean_html: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            source_path: PathBuf::from("data/collection.anki2"),
            base_url: "http://localhost:8080".to_string(),
            data_url: "http://localhost:8081".to_string(),
            credentials: Credentials {
                username: "admin".to_string(),
                password: "admin".to_string(),
            },
            lesson_threshold: DEFAULT_LESSON_THRESHOLD,
            strict: false,
            clean_html: false,
            course1_name: "Minna no Nihongo 1".to_string(),
            course2_name: "Minna no Nihongo 2".to_string(),
        }
    }
}

impl Settings {
    /// Layer defaults, an optional TOML file, `ANKI_*` environment variables
    /// and finally the command-line overrides.
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
        let d = Settings::default();
        let mut builder = Config::builder()
            .set_default("source_path", d.source_path.to_string_lossy().to_string())?
            .set_default("base_url", d.base_url)?
            .set_default("data_url", d.data_url)?
            .set_default("credentials.username", d.credentials.username)?
            .set_default("credentials.password", d.credentials.password)?
            .set_default("lesson_threshold", i64::from(d.lesson_threshold))?
            .set_default("strict", d.strict)?
            .set_default("clean_html", d.clean_html)?
            .set_default("course1_name", d.course1_name)?
            .set_default("course2_name", d.course2_name)?;

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("ANKI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.apply(overrides).validated()
    }

    fn apply(mut self, o: &Overrides) -> Settings {
        if let Some(p) = &o.source_path {
            self.source_path = p.clone();
        }
        if let Some(url) = &o.base_url {
            self.base_url = url.clone();
        }
        if let Some(t) = o.lesson_threshold {
            self.lesson_threshold = t;
        }
        self.strict |= o.strict;
        self.clean_html |= o.clean_html;
        self
    }

    fn validated(mut self) -> Result<Settings> {
        if !(1..=MAX_LESSON_THRESHOLD).contains(&self.lesson_threshold) {
            bail!(
                "lesson_threshold must be between 1 and {}, got {}",
                MAX_LESSON_THRESHOLD,
                self.lesson_threshold
            );
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self.data_url = self.data_url.trim_end_matches('/').to_string();
        Ok(self)
    }
}
