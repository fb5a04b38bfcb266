//! Canonical alert record and the baseline constructors shared by both adapters.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::level::AlertLevel;

/// Display value for a horizon with confirmed absence of notable phenomena.
pub const NONE_SENTINEL: &str = "Aucun";
/// Display value for a horizon whose status could not be determined.
pub const ERROR_SENTINEL: &str = "Erreur";

const PHENOMENA_SEPARATOR: &str = ", ";

/// Source of "now" for timestamps and horizon dates.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Frozen clock, mostly for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The two windows a vigilance status applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizon {
    Today,
    Tomorrow,
}

impl Horizon {
    /// Map a feed `echeance` tag (`J`, `J1`) to a horizon.
    pub fn from_echeance(tag: &str) -> Option<Self> {
        match tag {
            "J" => Some(Horizon::Today),
            "J1" => Some(Horizon::Tomorrow),
            _ => None,
        }
    }

    /// Calendar date this horizon covers, relative to `now` (UTC).
    pub fn date_from(self, now: DateTime<Utc>) -> NaiveDate {
        match self {
            Horizon::Today => now.date_naive(),
            Horizon::Tomorrow => (now + Duration::days(1)).date_naive(),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Horizon::Today => f.write_str("today"),
            Horizon::Tomorrow => f.write_str("tomorrow"),
        }
    }
}

/// Phenomena shown for a horizon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phenomena {
    /// Nothing notable reported.
    #[default]
    None,
    /// Status unknown because normalization failed.
    Error,
    /// Human-readable listing, never empty.
    Listed(String),
}

impl Phenomena {
    /// Join phenomenon names for display; an empty list means [`Phenomena::None`].
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(PHENOMENA_SEPARATOR);
        Self::from_text(&joined)
    }

    /// Take a display string verbatim, trimmed.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Phenomena::None
        } else {
            Phenomena::Listed(trimmed.to_string())
        }
    }

    pub fn as_display(&self) -> &str {
        match self {
            Phenomena::None => NONE_SENTINEL,
            Phenomena::Error => ERROR_SENTINEL,
            Phenomena::Listed(text) => text,
        }
    }
}

impl fmt::Display for Phenomena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_display())
    }
}

/// Level and phenomena an adapter resolved for one horizon, before dating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HorizonStatus {
    pub level: AlertLevel,
    pub phenomena: Phenomena,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HorizonRecord {
    pub date: NaiveDate,
    pub level: AlertLevel,
    pub phenomena: Phenomena,
}

impl HorizonRecord {
    fn dated(date: NaiveDate, status: HorizonStatus) -> Self {
        Self {
            date,
            level: status.level,
            phenomena: status.phenomena,
        }
    }
}

/// Normalized vigilance status for one department.
///
/// Built fresh for every run and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub generated_at: DateTime<Utc>,
    pub red_alert_detected: bool,
    pub today: HorizonRecord,
    pub tomorrow: HorizonRecord,
    pub error: Option<String>,
}

impl AlertRecord {
    /// Baseline for "no active alerts": level 1 and no phenomena on both horizons.
    ///
    /// ```
    /// use vigilance_core::{AlertLevel, AlertRecord, Phenomena, SystemClock};
    ///
    /// let record = AlertRecord::quiet(&SystemClock);
    /// assert_eq!(record.today.level, AlertLevel::GREEN);
    /// assert_eq!(record.tomorrow.phenomena, Phenomena::None);
    /// assert!(!record.red_alert_detected);
    /// assert!(record.error.is_none());
    /// ```
    pub fn quiet(clock: &dyn Clock) -> Self {
        Self::assemble(clock, HorizonStatus::default(), HorizonStatus::default(), false)
    }

    /// Baseline for a run that could not complete. Both horizons carry the
    /// error sentinel so consumers can tell it apart from [`AlertRecord::quiet`].
    pub fn failed(clock: &dyn Clock, message: impl Into<String>) -> Self {
        let unknown = HorizonStatus {
            level: AlertLevel::GREEN,
            phenomena: Phenomena::Error,
        };
        let mut record = Self::assemble(clock, unknown.clone(), unknown, false);
        record.error = Some(message.into());
        record
    }

    /// Date both horizons and derive the red-alert flag.
    ///
    /// `marker` carries any explicit red-alert signal found in the source;
    /// a level-4 horizon raises the flag regardless.
    pub fn assemble(
        clock: &dyn Clock,
        today: HorizonStatus,
        tomorrow: HorizonStatus,
        marker: bool,
    ) -> Self {
        let now = clock.now();
        let red_alert_detected = marker || today.level.is_red() || tomorrow.level.is_red();
        Self {
            generated_at: now,
            red_alert_detected,
            today: HorizonRecord::dated(Horizon::Today.date_from(now), today),
            tomorrow: HorizonRecord::dated(Horizon::Tomorrow.date_from(now), tomorrow),
            error: None,
        }
    }

    pub fn horizon(&self, horizon: Horizon) -> &HorizonRecord {
        match horizon {
            Horizon::Today => &self.today,
            Horizon::Tomorrow => &self.tomorrow,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
