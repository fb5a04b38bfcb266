//! JSON shapes a record is published in.

use std::fmt;
use std::str::FromStr;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigilance_core::{AlertRecord, HorizonRecord};

/// Field naming of the published document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSchema {
    /// `lastUpdate`, `alerteRougeDetectee`, `aujourd_hui`, `demain`, `niveau`, `phenomenes`.
    #[default]
    Legacy,
    /// `generatedAt`, `redAlertDetected`, `today`, `tomorrow`, `level`, `phenomena`.
    Canonical,
}

impl FromStr for OutputSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(OutputSchema::Legacy),
            "canonical" => Ok(OutputSchema::Canonical),
            other => Err(format!("unknown output schema: {other}")),
        }
    }
}

impl fmt::Display for OutputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSchema::Legacy => f.write_str("legacy"),
            OutputSchema::Canonical => f.write_str("canonical"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDocument<'a> {
    last_update: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    alerte_rouge_detectee: bool,
    #[serde(rename = "aujourd_hui")]
    aujourd_hui: LegacyHorizon<'a>,
    demain: LegacyHorizon<'a>,
}

#[derive(Serialize)]
pub struct LegacyHorizon<'a> {
    date: String,
    niveau: u8,
    phenomenes: &'a str,
}

impl<'a> From<&'a HorizonRecord> for LegacyHorizon<'a> {
    fn from(h: &'a HorizonRecord) -> Self {
        Self {
            date: h.date.to_string(),
            niveau: h.level.value(),
            phenomenes: h.phenomena.as_display(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDocument<'a> {
    generated_at: String,
    red_alert_detected: bool,
    today: CanonicalHorizon<'a>,
    tomorrow: CanonicalHorizon<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Serialize)]
pub struct CanonicalHorizon<'a> {
    date: String,
    level: u8,
    phenomena: &'a str,
}

impl<'a> From<&'a HorizonRecord> for CanonicalHorizon<'a> {
    fn from(h: &'a HorizonRecord) -> Self {
        Self {
            date: h.date.to_string(),
            level: h.level.value(),
            phenomena: h.phenomena.as_display(),
        }
    }
}

fn timestamp(record: &AlertRecord) -> String {
    record
        .generated_at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A record laid out in one [`OutputSchema`], ready to serialize.
#[derive(Serialize)]
#[serde(untagged)]
pub enum Document<'a> {
    Legacy(LegacyDocument<'a>),
    Canonical(CanonicalDocument<'a>),
}

impl<'a> Document<'a> {
    pub fn new(record: &'a AlertRecord, schema: OutputSchema) -> Self {
        match schema {
            OutputSchema::Legacy => Document::Legacy(LegacyDocument {
                last_update: timestamp(record),
                error: record.error.as_deref(),
                alerte_rouge_detectee: record.red_alert_detected,
                aujourd_hui: (&record.today).into(),
                demain: (&record.tomorrow).into(),
            }),
            OutputSchema::Canonical => Document::Canonical(CanonicalDocument {
                generated_at: timestamp(record),
                red_alert_detected: record.red_alert_detected,
                today: (&record.today).into(),
                tomorrow: (&record.tomorrow).into(),
                error: record.error.as_deref(),
            }),
        }
    }
}

/// Render `record` in the requested naming as a JSON value.
pub fn render(record: &AlertRecord, schema: OutputSchema) -> Result<Value, serde_json::Error> {
    serde_json::to_value(Document::new(record, schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use vigilance_core::{AlertLevel, AlertRecord, FixedClock, HorizonStatus, Phenomena};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 1, 24, 6, 15, 0).unwrap())
    }

    #[test]
    fn legacy_shape() {
        let record = AlertRecord::assemble(
            &clock(),
            HorizonStatus {
                level: AlertLevel::RED,
                phenomena: Phenomena::from_text("Vent violent"),
            },
            HorizonStatus::default(),
            false,
        );

        assert_eq!(
            render(&record, OutputSchema::Legacy).unwrap(),
            json!({
                "lastUpdate": "2025-01-24T06:15:00.000Z",
                "alerteRougeDetectee": true,
                "aujourd_hui": { "date": "2025-01-24", "niveau": 4, "phenomenes": "Vent violent" },
                "demain": { "date": "2025-01-25", "niveau": 1, "phenomenes": "Aucun" },
            })
        );
    }

    #[test]
    fn canonical_shape_with_error() {
        let record = AlertRecord::failed(&clock(), "feed is not valid JSON");

        assert_eq!(
            render(&record, OutputSchema::Canonical).unwrap(),
            json!({
                "generatedAt": "2025-01-24T06:15:00.000Z",
                "redAlertDetected": false,
                "today": { "date": "2025-01-24", "level": 1, "phenomena": "Erreur" },
                "tomorrow": { "date": "2025-01-25", "level": 1, "phenomena": "Erreur" },
                "error": "feed is not valid JSON",
            })
        );
    }

    #[test]
    fn legacy_error_keeps_field_order() {
        let record = AlertRecord::failed(&clock(), "boom");
        let text = serde_json::to_string(&Document::new(&record, OutputSchema::Legacy)).unwrap();
        assert!(text.starts_with(r#"{"lastUpdate":"2025-01-24T06:15:00.000Z","error":"boom","alerteRougeDetectee":false"#));
        assert!(text.contains(r#""phenomenes":"Erreur""#));
    }

    #[test]
    fn schema_names() {
        assert_eq!("Canonical".parse::<OutputSchema>(), Ok(OutputSchema::Canonical));
        assert!("french".parse::<OutputSchema>().is_err());
        assert_eq!(OutputSchema::default(), OutputSchema::Legacy);
    }
}
