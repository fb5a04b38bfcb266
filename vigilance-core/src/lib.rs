//! Vigilance normalization engine.
//!
//! Turns either a structured JSON feed or free-form page text into one
//! [`AlertRecord`] describing today's and tomorrow's vigilance for a single
//! department.
//!
//! - [`structured`]: department mapping → record
//! - [`text`]: rendered page text → record
//! - [`Normalizer`]: picks one adapter per run and guarantees a record even on failure
//!
//! ```rust
//! use vigilance_core::{Normalizer, SourceFormat};
//!
//! let normalizer = Normalizer::new("33").unwrap();
//! let out = normalizer.normalize_or_failed(SourceFormat::Structured, br#"{"13": {}}"#);
//! assert!(out.failure.is_none());
//! assert_eq!(out.record.today.phenomena.as_display(), "Aucun");
//! ```

pub mod error;
pub mod level;
pub mod normalize;
pub mod record;
pub mod structured;
pub mod text;

pub use error::NormalizeError;
pub use level::AlertLevel;
pub use normalize::{Normalized, Normalizer, SourceFormat, DEFAULT_DEPARTMENT};
pub use record::{
    AlertRecord, Clock, FixedClock, Horizon, HorizonRecord, HorizonStatus, Phenomena,
    SystemClock, ERROR_SENTINEL, NONE_SENTINEL,
};
