use thiserror::Error;

/// Input-shape violations. "No data" outcomes are never errors.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("input is not valid UTF-8 text: {0}")]
    NotText(#[from] std::str::Utf8Error),

    #[error("feed is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("feed must be a mapping keyed by department code, found {0}")]
    NotAMapping(&'static str),

    #[error("entry for department {department} is malformed: {source}")]
    MalformedDepartment {
        department: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),
}
