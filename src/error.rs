use std::fmt;

use thiserror::Error;

/// Failures talking to the study-app admin API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request was rejected with 401 Unauthorized")]
    Unauthorized,

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("login response did not contain an access token")]
    MissingToken,

    #[error("HTTP error: {0}")]
    Http(Box<reqwest::Error>),
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::Http(Box::new(error))
    }
}

/// Non-fatal pipeline outcomes. Each one is counted, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fallback {
    /// A schema entry had no usable name; that field was skipped.
    MalformedSchema,
    /// No schema for the note's model; positional names were used.
    UnresolvedModel,
    /// A lesson field was present but held no parseable number.
    LessonParseFailure,
    /// The note could not be read or decoded at all and was dropped.
    NoteProcessingFailure,
}

impl Fallback {
    pub const ALL: [Fallback; 4] = [
        Fallback::MalformedSchema,
        Fallback::UnresolvedModel,
        Fallback::LessonParseFailure,
        Fallback::NoteProcessingFailure,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Fallback::MalformedSchema => "malformed schema",
            Fallback::UnresolvedModel => "unresolved model",
            Fallback::LessonParseFailure => "lesson parse failure",
            Fallback::NoteProcessingFailure => "note processing failure",
        }
    }
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
