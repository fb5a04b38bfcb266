//! Page-text providers: where the raw vigilance payload comes from.
//!
//! Providers only acquire bytes; decoding and interpretation belong to
//! `vigilance-core`.
//!
//! - [`source::FileSource`]: local file (feed dump or saved page text)
//! - [`source::HttpSource`]: plain GET through `vigilance-http`
//! - [`browser::BrowserSource`]: rendered page text through a WebDriver endpoint
pub mod browser;
pub mod source;

pub use browser::{BrowserOptions, BrowserSource};
pub use source::{FileSource, HttpSource, PageTextProvider, ProviderError};
