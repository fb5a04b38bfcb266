use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordinal vigilance severity, always within `1..=4`.
///
/// `1` is green (no particular vigilance), `4` is red.
///
/// ```
/// use vigilance_core::AlertLevel;
///
/// assert_eq!(AlertLevel::clamped(0), AlertLevel::GREEN);
/// assert_eq!(AlertLevel::clamped(9), AlertLevel::RED);
/// assert_eq!(AlertLevel::from_token("Orange"), Some(AlertLevel::ORANGE));
/// assert_eq!(AlertLevel::from_token("violet"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AlertLevel(u8);

impl AlertLevel {
    pub const GREEN: AlertLevel = AlertLevel(1);
    pub const YELLOW: AlertLevel = AlertLevel(2);
    pub const ORANGE: AlertLevel = AlertLevel(3);
    pub const RED: AlertLevel = AlertLevel(4);

    /// Clamp any integer into the level domain.
    pub fn clamped(raw: i64) -> Self {
        AlertLevel(raw.clamp(1, 4) as u8)
    }

    /// Resolve a colour word or digit, French or English, ignoring case.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "1" | "vert" | "verte" | "green" => Some(Self::GREEN),
            "2" | "jaune" | "yellow" => Some(Self::YELLOW),
            "3" | "orange" => Some(Self::ORANGE),
            "4" | "rouge" | "red" => Some(Self::RED),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether this is the maximum severity.
    pub fn is_red(self) -> bool {
        self == Self::RED
    }

    /// Phenomena at this level or above are surfaced in horizon listings.
    pub fn is_notable(self) -> bool {
        self >= Self::YELLOW
    }
}

impl Default for AlertLevel {
    fn default() -> Self {
        Self::GREEN
    }
}

impl From<AlertLevel> for u8 {
    fn from(level: AlertLevel) -> Self {
        level.0
    }
}

impl TryFrom<u8> for AlertLevel {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        if (1..=4).contains(&raw) {
            Ok(AlertLevel(raw))
        } else {
            Err(format!("alert level {raw} outside 1..=4"))
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let colour = match self.0 {
            1 => "vert",
            2 => "jaune",
            3 => "orange",
            _ => "rouge",
        };
        write!(f, "{colour} ({}/4)", self.0)
    }
}
