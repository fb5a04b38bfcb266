//! Text-source adapter: visible text of a rendered vigilance page.
//!
//! Each horizon block is recognised in two stages. A label scan finds every
//! candidate `AUJOURD'HUI` / `DEMAIN` occurrence, then a block pattern is
//! applied to the text right after the label. The block may span at most
//! two lines:
//!
//! ```text
//! AUJOURD'HUI (vendredi 24 janvier): Niveau Rouge (4/4) - vigilance absolue
//! Phénomènes en rouge: Vent violent, Vagues-submersion
//! ```
//!
//! The first label whose block matches wins. A horizon with no matching
//! block keeps the quiet defaults.

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::NormalizeError;
use crate::level::AlertLevel;
use crate::record::{AlertRecord, Clock, Horizon, HorizonStatus, Phenomena};

/// Announcement phrases and glyphs that signal a red alert on their own.
pub const DEFAULT_RED_MARKERS: &[&str] = &["ALERTE ROUGE DÉTECTÉE", "🚨"];

const PREVIEW_CHARS: usize = 500;

const TODAY_LABEL: &str = r"(?i)\baujourd['’]\s?hui\b";
const TOMORROW_LABEL: &str = r"(?i)\bdemain\b";

// Severity: colour word with optional "(n/4)", or a bare digit. Then the
// phenomena marker on the same line or the next one.
const BLOCK: &str = r"(?i)\A[^\n]*?\bniveau\s*:?\s*(?:(?P<word>verte?|jaune|orange|rouge|green|yellow|red)\b(?:\s*\(\s*(?P<digit>\d+)\s*/\s*4\s*\))?|(?P<bare>\d+)(?:\s*/\s*4)?)[^\n]*?(?:\r?\n[ \t]*)?\bph[ée]nom[èe]nes(?:\s+en\s+\w+)?\s*:[ \t]*(?P<list>[^\r\n]*)";

/// What a scan found before dating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextScan {
    pub marker_found: bool,
    pub today: Option<HorizonStatus>,
    pub tomorrow: Option<HorizonStatus>,
}

#[derive(Debug, Clone)]
pub struct TextAdapter {
    red_markers: Vec<String>,
    today_label: Regex,
    tomorrow_label: Regex,
    block: Regex,
}

impl TextAdapter {
    pub fn new() -> Result<Self, NormalizeError> {
        Ok(Self {
            red_markers: DEFAULT_RED_MARKERS.iter().map(|m| m.to_string()).collect(),
            today_label: Regex::new(TODAY_LABEL)?,
            tomorrow_label: Regex::new(TOMORROW_LABEL)?,
            block: Regex::new(BLOCK)?,
        })
    }

    /// Replace the red-alert markers. Empty markers are ignored.
    pub fn with_red_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.red_markers = markers
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.is_empty())
            .collect();
        self
    }

    pub fn red_markers(&self) -> &[String] {
        &self.red_markers
    }

    /// Locate markers and horizon blocks without building a record.
    pub fn scan(&self, text: &str) -> TextScan {
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        debug!(chars = text.chars().count(), %preview, "scanning page text");

        TextScan {
            marker_found: self.red_markers.iter().any(|m| text.contains(m.as_str())),
            today: self.horizon_block(text, Horizon::Today),
            tomorrow: self.horizon_block(text, Horizon::Tomorrow),
        }
    }

    /// Build the canonical record from page text. Never fails: unmatched
    /// blocks keep their defaults.
    ///
    /// ```
    /// use vigilance_core::{text::TextAdapter, AlertLevel, SystemClock};
    ///
    /// let adapter = TextAdapter::new().unwrap();
    /// let page = "AUJOURD'HUI (lundi): Niveau Orange (3/4)\nPhénomènes en orange: Orages\n";
    /// let record = adapter.normalize(page, &SystemClock);
    /// assert_eq!(record.today.level, AlertLevel::ORANGE);
    /// assert_eq!(record.today.phenomena.as_display(), "Orages");
    /// assert_eq!(record.tomorrow.level, AlertLevel::GREEN);
    /// ```
    pub fn normalize(&self, text: &str, clock: &dyn Clock) -> AlertRecord {
        let scan = self.scan(text);
        debug!(
            marker = scan.marker_found,
            today = scan.today.is_some(),
            tomorrow = scan.tomorrow.is_some(),
            "page text scanned"
        );
        AlertRecord::assemble(
            clock,
            scan.today.unwrap_or_default(),
            scan.tomorrow.unwrap_or_default(),
            scan.marker_found,
        )
    }

    fn horizon_block(&self, text: &str, horizon: Horizon) -> Option<HorizonStatus> {
        let label = match horizon {
            Horizon::Today => &self.today_label,
            Horizon::Tomorrow => &self.tomorrow_label,
        };
        label.find_iter(text).find_map(|found| {
            let caps = self.block.captures(&text[found.end()..])?;
            debug!(%horizon, offset = found.start(), "horizon block matched");
            Some(HorizonStatus {
                level: block_level(&caps),
                phenomena: Phenomena::from_text(caps.name("list").map_or("", |m| m.as_str())),
            })
        })
    }
}

/// An explicit `(n/4)` wins over the colour word.
fn block_level(caps: &Captures<'_>) -> AlertLevel {
    let numeric = caps
        .name("digit")
        .or_else(|| caps.name("bare"))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(AlertLevel::clamped);
    numeric
        .or_else(|| {
            caps.name("word")
                .and_then(|m| AlertLevel::from_token(m.as_str()))
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FixedClock;
    use chrono::{TimeZone, Utc};

    fn adapter() -> TextAdapter {
        TextAdapter::new().unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 1, 24, 6, 0, 0).unwrap())
    }

    #[test]
    fn digit_overrides_colour_word() {
        let scan = adapter().scan("DEMAIN (samedi): Niveau Jaune (3/4)\nPhénomènes en jaune: Neige\n");
        let tomorrow = scan.tomorrow.unwrap();
        assert_eq!(tomorrow.level, AlertLevel::ORANGE);
    }

    #[test]
    fn out_of_range_digit_is_clamped() {
        let scan = adapter().scan("Aujourd'hui : Niveau Rouge (9/4)\nPhénomènes en rouge: Crues\n");
        assert_eq!(scan.today.unwrap().level, AlertLevel::RED);
    }

    #[test]
    fn bare_digit_level() {
        let scan = adapter().scan("Demain - niveau 2/4 - Phénomènes: Orages\n");
        let tomorrow = scan.tomorrow.unwrap();
        assert_eq!(tomorrow.level, AlertLevel::YELLOW);
        assert_eq!(tomorrow.phenomena.as_display(), "Orages");
    }

    #[test]
    fn marker_qualifier_colour_need_not_match() {
        let scan = adapter()
            .scan("AUJOURD'HUI (lundi): Niveau Orange (3/4)\n  Phénomènes en jaune: Vent violent\n");
        let today = scan.today.unwrap();
        assert_eq!(today.level, AlertLevel::ORANGE);
        assert_eq!(today.phenomena.as_display(), "Vent violent");
    }

    #[test]
    fn prose_mentions_are_skipped_until_a_block_matches() {
        let page = "Prévisions pour demain en cours de publication.\n\
                    DEMAIN (samedi): Niveau Orange (3/4)\n\
                    Phénomènes en orange: Pluie-inondation\n";
        let tomorrow = adapter().scan(page).tomorrow.unwrap();
        assert_eq!(tomorrow.phenomena.as_display(), "Pluie-inondation");
    }

    #[test]
    fn marker_more_than_one_line_away_does_not_match() {
        let page = "AUJOURD'HUI (lundi): Niveau Orange (3/4)\n\nautre chose\nPhénomènes en orange: Orages\n";
        assert!(adapter().scan(page).today.is_none());
    }

    #[test]
    fn empty_phenomena_list_is_none() {
        let scan = adapter().scan("AUJOURD'HUI: Niveau Vert (1/4)\nPhénomènes en vert:   \n");
        assert_eq!(scan.today.unwrap().phenomena, Phenomena::None);
    }

    #[test]
    fn glyph_marker_alone_raises_flag() {
        let record = adapter().normalize("Bulletin 🚨 en cours", &clock());
        assert!(record.red_alert_detected);
        assert_eq!(record.today.level, AlertLevel::GREEN);
        assert_eq!(record.today.phenomena, Phenomena::None);
    }

    #[test]
    fn custom_markers_replace_defaults() {
        let adapter = adapter().with_red_markers(["VIGILANCE ROUGE", ""]);
        assert_eq!(adapter.red_markers(), ["VIGILANCE ROUGE".to_string()]);
        assert!(!adapter.normalize("🚨", &clock()).red_alert_detected);
        assert!(adapter.normalize("... VIGILANCE ROUGE ...", &clock()).red_alert_detected);
    }

    #[test]
    fn crlf_line_endings() {
        let page = "AUJOURD’HUI (lundi): Niveau Jaune (2/4)\r\nPhénomènes en jaune: Orages\r\n";
        let today = adapter().scan(page).today.unwrap();
        assert_eq!(today.level, AlertLevel::YELLOW);
        assert_eq!(today.phenomena.as_display(), "Orages");
    }
}
