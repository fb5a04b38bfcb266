//! Entry point selecting exactly one adapter per run.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::NormalizeError;
use crate::record::{AlertRecord, Clock, SystemClock};
use crate::structured;
use crate::text::TextAdapter;

/// Department reported on when none is configured (Gironde).
pub const DEFAULT_DEPARTMENT: &str = "33";

/// Which adapter interprets the raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// JSON mapping of department code to phenomenon list.
    Structured,
    /// Visible text of a rendered page.
    Text,
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "json" | "feed" => Ok(SourceFormat::Structured),
            "text" | "page" => Ok(SourceFormat::Text),
            other => Err(format!("unknown source format: {other}")),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Structured => f.write_str("structured"),
            SourceFormat::Text => f.write_str("text"),
        }
    }
}

/// A record that is always schema-complete, plus the failure that forced the
/// error baseline, if any.
#[derive(Debug)]
pub struct Normalized {
    pub record: AlertRecord,
    pub failure: Option<NormalizeError>,
}

/// Shared normalization rules bound to one department and one clock.
#[derive(Clone)]
pub struct Normalizer {
    department: String,
    text: TextAdapter,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("department", &self.department)
            .field("red_markers", &self.text.red_markers())
            .finish_non_exhaustive()
    }
}

impl Normalizer {
    pub fn new(department: impl Into<String>) -> Result<Self, NormalizeError> {
        Ok(Self {
            department: department.into(),
            text: TextAdapter::new()?,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_red_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text = self.text.with_red_markers(markers);
        self
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    /// Decode `raw` and run the adapter for `format`.
    ///
    /// Only input-shape violations are errors; an absent department or a
    /// page without horizon blocks yields the quiet record.
    pub fn normalize(
        &self,
        format: SourceFormat,
        raw: &[u8],
    ) -> Result<AlertRecord, NormalizeError> {
        let text = std::str::from_utf8(raw)?;
        match format {
            SourceFormat::Structured => {
                let feed: Value =
                    serde_json::from_str(text).map_err(NormalizeError::InvalidJson)?;
                structured::normalize_feed(&feed, &self.department, self.clock.as_ref())
            }
            SourceFormat::Text => Ok(self.text.normalize(text, self.clock.as_ref())),
        }
    }

    /// Like [`Normalizer::normalize`], but substitutes the error record on failure.
    pub fn normalize_or_failed(&self, format: SourceFormat, raw: &[u8]) -> Normalized {
        match self.normalize(format, raw) {
            Ok(record) => {
                info!(
                    department = %self.department,
                    %format,
                    today = record.today.level.value(),
                    tomorrow = record.tomorrow.level.value(),
                    red_alert = record.red_alert_detected,
                    "normalized vigilance record"
                );
                Normalized {
                    record,
                    failure: None,
                }
            }
            Err(err) => {
                warn!(department = %self.department, %format, error = %err, "normalization failed");
                Normalized {
                    record: self.failed(err.to_string()),
                    failure: Some(err),
                }
            }
        }
    }

    /// Error record for failures outside normalization, e.g. acquisition.
    pub fn failed(&self, message: impl Into<String>) -> AlertRecord {
        AlertRecord::failed(self.clock.as_ref(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!("JSON".parse::<SourceFormat>(), Ok(SourceFormat::Structured));
        assert_eq!("page".parse::<SourceFormat>(), Ok(SourceFormat::Text));
        assert!("xml".parse::<SourceFormat>().is_err());
        assert_eq!(SourceFormat::Text.to_string(), "text");
    }

    #[test]
    fn non_utf8_is_a_shape_violation_for_both_formats() {
        let normalizer = Normalizer::new("33").unwrap();
        for format in [SourceFormat::Structured, SourceFormat::Text] {
            let out = normalizer.normalize_or_failed(format, &[0xff, 0xfe, 0x00]);
            assert!(matches!(out.failure, Some(NormalizeError::NotText(_))));
            assert!(out.record.is_failure());
        }
    }

    #[test]
    fn invalid_json_yields_error_record() {
        let normalizer = Normalizer::new("33").unwrap();
        let out = normalizer.normalize_or_failed(SourceFormat::Structured, b"{ not json");
        assert!(matches!(out.failure, Some(NormalizeError::InvalidJson(_))));
        assert_eq!(out.record.today.phenomena.as_display(), "Erreur");
    }
}
