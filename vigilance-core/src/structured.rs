//! Structured-source adapter: a JSON mapping of department code to phenomenon list.
//!
//! Expected shape:
//!
//! ```json
//! { "33": { "phenomenes": [ { "nom": "Vent violent", "niveau_vigilance": 3, "echeance": "J" } ] } }
//! ```
//!
//! Every phenomenon entry is defaulted into a [`Phenomenon`] on read; the
//! per-horizon fold then only ever sees required fields.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::NormalizeError;
use crate::level::AlertLevel;
use crate::record::{AlertRecord, Clock, Horizon, HorizonStatus, Phenomena};

/// Name given to a phenomenon whose feed entry carries none.
pub const UNKNOWN_PHENOMENON: &str = "Inconnu";

#[derive(Debug, Deserialize)]
struct DepartmentEntry {
    #[serde(default)]
    phenomenes: Option<Vec<RawPhenomenon>>,
}

#[derive(Debug, Deserialize)]
struct RawPhenomenon {
    #[serde(default)]
    nom: Option<String>,
    #[serde(default)]
    niveau_vigilance: Option<RawLevel>,
    #[serde(default)]
    echeance: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawLevel {
    fn resolve(&self) -> AlertLevel {
        match self {
            RawLevel::Integer(n) => AlertLevel::clamped(*n),
            RawLevel::Float(f) if f.is_finite() => AlertLevel::clamped(f.trunc() as i64),
            RawLevel::Float(_) => AlertLevel::GREEN,
            RawLevel::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(AlertLevel::clamped)
                .unwrap_or_default(),
        }
    }
}

/// One feed phenomenon with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phenomenon {
    pub name: String,
    pub level: AlertLevel,
    /// `None` when the `echeance` tag is outside the known vocabulary.
    pub horizon: Option<Horizon>,
}

impl From<RawPhenomenon> for Phenomenon {
    fn from(raw: RawPhenomenon) -> Self {
        let name = raw
            .nom
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_PHENOMENON.to_string());
        let level = raw
            .niveau_vigilance
            .as_ref()
            .map(RawLevel::resolve)
            .unwrap_or_default();
        // Entries without a tag are reported for the current day.
        let horizon = Horizon::from_echeance(raw.echeance.as_deref().unwrap_or("J"));
        Self {
            name,
            level,
            horizon,
        }
    }
}

#[derive(Debug, Default)]
struct HorizonFold {
    level: AlertLevel,
    names: Vec<String>,
}

impl HorizonFold {
    fn absorb(&mut self, phenomenon: &Phenomenon) {
        self.level = self.level.max(phenomenon.level);
        if phenomenon.level.is_notable() {
            self.names.push(phenomenon.name.clone());
        }
    }

    fn finish(self) -> HorizonStatus {
        HorizonStatus {
            level: self.level,
            phenomena: Phenomena::from_names(self.names),
        }
    }
}

/// Extract and default the phenomenon list for `department`.
///
/// Returns `Ok(None)` when the department is absent from the feed.
pub fn department_phenomena(
    feed: &Value,
    department: &str,
) -> Result<Option<Vec<Phenomenon>>, NormalizeError> {
    let departments = feed
        .as_object()
        .ok_or_else(|| NormalizeError::NotAMapping(json_kind(feed)))?;

    let Some(raw_entry) = departments.get(department) else {
        return Ok(None);
    };

    let entry = DepartmentEntry::deserialize(raw_entry).map_err(|source| {
        NormalizeError::MalformedDepartment {
            department: department.to_string(),
            source,
        }
    })?;

    Ok(Some(
        entry
            .phenomenes
            .unwrap_or_default()
            .into_iter()
            .map(Phenomenon::from)
            .collect(),
    ))
}

/// Fold one department's phenomena into the canonical record.
///
/// ```
/// use serde_json::json;
/// use vigilance_core::{structured::normalize_feed, AlertLevel, SystemClock};
///
/// let feed = json!({ "33": { "phenomenes": [
///     { "nom": "Orages", "niveau_vigilance": 3, "echeance": "J" },
///     { "nom": "Canicule", "niveau_vigilance": 1, "echeance": "J" },
/// ]}});
/// let record = normalize_feed(&feed, "33", &SystemClock).unwrap();
/// assert_eq!(record.today.level, AlertLevel::ORANGE);
/// assert_eq!(record.today.phenomena.as_display(), "Orages");
/// assert_eq!(record.tomorrow.phenomena.as_display(), "Aucun");
/// ```
pub fn normalize_feed(
    feed: &Value,
    department: &str,
    clock: &dyn Clock,
) -> Result<AlertRecord, NormalizeError> {
    let Some(phenomena) = department_phenomena(feed, department)? else {
        info!(department, "no entry for department in feed");
        return Ok(AlertRecord::quiet(clock));
    };

    let mut today = HorizonFold::default();
    let mut tomorrow = HorizonFold::default();
    let mut dropped = 0usize;

    for phenomenon in &phenomena {
        match phenomenon.horizon {
            Some(Horizon::Today) => today.absorb(phenomenon),
            Some(Horizon::Tomorrow) => tomorrow.absorb(phenomenon),
            None => dropped += 1,
        }
    }

    debug!(
        department,
        total = phenomena.len(),
        dropped,
        "folded feed phenomena"
    );

    Ok(AlertRecord::assemble(
        clock,
        today.finish(),
        tomorrow.finish(),
        false,
    ))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 1, 24, 6, 0, 0).unwrap())
    }

    #[test]
    fn missing_fields_take_defaults() {
        let feed = json!({ "33": { "phenomenes": [ {} ] } });
        let phenomena = department_phenomena(&feed, "33").unwrap().unwrap();
        assert_eq!(
            phenomena,
            vec![Phenomenon {
                name: UNKNOWN_PHENOMENON.into(),
                level: AlertLevel::GREEN,
                horizon: Some(Horizon::Today),
            }]
        );
    }

    #[test]
    fn lenient_levels() {
        let feed = json!({ "33": { "phenomenes": [
            { "nom": "a", "niveau_vigilance": "3" },
            { "nom": "b", "niveau_vigilance": 0 },
            { "nom": "c", "niveau_vigilance": null },
            { "nom": "d", "niveau_vigilance": "haut" },
            { "nom": "e", "niveau_vigilance": 7 },
            { "nom": "f", "niveau_vigilance": 2.0 },
        ]}});
        let levels: Vec<u8> = department_phenomena(&feed, "33")
            .unwrap()
            .unwrap()
            .iter()
            .map(|p| p.level.value())
            .collect();
        assert_eq!(levels, vec![3, 1, 1, 1, 4, 2]);
    }

    #[test]
    fn unknown_echeance_is_dropped() {
        let feed = json!({ "33": { "phenomenes": [
            { "nom": "Avalanches", "niveau_vigilance": 4, "echeance": "J2" },
        ]}});
        let record = normalize_feed(&feed, "33", &clock()).unwrap();
        assert_eq!(record.today.level, AlertLevel::GREEN);
        assert_eq!(record.tomorrow.level, AlertLevel::GREEN);
        assert!(!record.red_alert_detected);
    }

    #[test]
    fn non_mapping_feed_is_rejected() {
        let err = normalize_feed(&json!([1, 2]), "33", &clock()).unwrap_err();
        assert!(matches!(err, NormalizeError::NotAMapping("an array")));
    }

    #[test]
    fn non_list_phenomenes_is_malformed() {
        let err = normalize_feed(&json!({ "33": { "phenomenes": "vent" } }), "33", &clock())
            .unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::MalformedDepartment { ref department, .. } if department == "33"
        ));
    }

    #[test]
    fn null_phenomenes_means_quiet() {
        let record = normalize_feed(&json!({ "33": { "phenomenes": null } }), "33", &clock())
            .unwrap();
        assert_eq!(record, AlertRecord::quiet(&clock()));
    }
}
