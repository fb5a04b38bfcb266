//! Loader for vigilance configuration with YAML + environment overlays.
//!
//! Sources are merged in order: YAML files or snippets first, then
//! `VIGILANCE__`-prefixed environment variables (`__` separates nesting,
//! e.g. `VIGILANCE__OUTPUT__PATH`). String values may reference `${VAR}`
//! placeholders, expanded recursively up to a fixed depth.
//!
//! ```yaml
//! department: "33"
//! source:
//!   format: text
//!   from: browser
//!   url: https://example.org/vigilance/
//! output:
//!   path: alerts.json
//!   schema: legacy
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};

use vigilance_core::DEFAULT_DEPARTMENT;
use vigilance_core::text::DEFAULT_RED_MARKERS;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
/// Read verbatim: numeric parsing of env values would drop a leading zero.
const DEPARTMENT_ENV: &str = "VIGILANCE__DEPARTMENT";

#[derive(Debug, Clone, Deserialize)]
pub struct VigilanceConfig {
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub version: Option<String>,
    /// Department code to report on, e.g. `"33"` or `"2A"`.
    #[serde(default = "default_department", deserialize_with = "department_code")]
    pub department: String,
    /// Where the payload comes from. Optional so the CLI can supply it.
    #[serde(default)]
    pub source: Option<SourceSpec>,
    #[serde(default)]
    pub text: TextSpec,
    #[serde(default)]
    pub output: OutputSpec,
    #[serde(default)]
    pub logging: LoggingSpec,
}

/// Payload format plus origin details.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    pub format: PayloadFormat,
    #[serde(flatten)]
    pub origin: OriginSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Structured,
    Text,
}

/// The tag is `from`; the remaining keys belong to the chosen origin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "from", rename_all = "lowercase")]
pub enum OriginSpec {
    File {
        path: PathBuf,
    },
    Http {
        url: String,
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_retries")]
        retries: usize,
    },
    Browser {
        url: String,
        #[serde(default = "default_webdriver_url")]
        webdriver_url: String,
        #[serde(default = "default_true")]
        headless: bool,
        #[serde(default = "default_settle_secs")]
        settle_secs: u64,
        #[serde(default = "default_navigation_timeout_secs")]
        timeout_secs: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextSpec {
    /// Phrases or glyphs that flag a red alert wherever they appear.
    #[serde(default = "default_red_markers")]
    pub red_markers: Vec<String>,
}

impl Default for TextSpec {
    fn default() -> Self {
        Self {
            red_markers: default_red_markers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputSpec {
    /// Target file; `-` writes to stdout.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub schema: SchemaSpec,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            schema: SchemaSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSpec {
    #[default]
    Legacy,
    Canonical,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSpec {
    #[serde(default)]
    pub format: LogFormatSpec,
    #[serde(default = "default_true")]
    pub stderr: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSpec {
    fn default() -> Self {
        Self {
            format: LogFormatSpec::default(),
            stderr: true,
            dir: None,
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSpec {
    #[default]
    Text,
    Json,
}

fn default_department() -> String {
    DEFAULT_DEPARTMENT.into()
}
fn default_output_path() -> PathBuf {
    PathBuf::from("alerts.json")
}
fn default_red_markers() -> Vec<String> {
    DEFAULT_RED_MARKERS.iter().map(|m| m.to_string()).collect()
}
fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}
fn default_http_timeout_secs() -> u64 {
    15
}
fn default_navigation_timeout_secs() -> u64 {
    30
}
fn default_settle_secs() -> u64 {
    5
}
fn default_retries() -> usize {
    2
}
fn default_true() -> bool {
    true
}
fn default_log_filter() -> String {
    "info".into()
}

// Department codes and versions are often written unquoted in YAML, and
// environment overrides are parsed eagerly, so accept numbers as well.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Integer(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
        }
    }
}

/// Department codes are strings ("01", "2A", "971"). An unquoted YAML `06`
/// arrives as the integer 6, so single-digit integers are padded back to two
/// digits; anything else non-textual must be quoted.
fn department_code<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Text(code) => Ok(code.trim().to_string()),
        Scalar::Integer(n @ 1..=9) => Ok(format!("{n:02}")),
        Scalar::Integer(n @ 10..=999) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "invalid department code {}; quote it, e.g. department: \"33\"",
            other.into_string()
        ))),
    }
}

fn optional_scalar_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<Scalar>::deserialize(d).map(|s| s.map(Scalar::into_string))
}

impl VigilanceConfig {
    /// Reject values that would only fail later, mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dept = self.department.as_str();
        if dept.is_empty() || dept.len() > 3 || !dept.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Message(format!(
                "invalid department code: {:?}",
                self.department
            )));
        }
        if let Some(SourceSpec {
            origin: OriginSpec::Http { url, .. } | OriginSpec::Browser { url, .. },
            ..
        }) = &self.source
        {
            if url.trim().is_empty() {
                return Err(ConfigError::Message("source url is empty".into()));
            }
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(ConfigError::Message("output path is empty".into()));
        }
        Ok(())
    }
}

/// Expand `$VAR` / `${VAR}` in every string, re-expanding values that
/// themselves contain placeholders. Unknown variables stay as written.
fn expand_env_placeholders(value: &mut Value) {
    match value {
        Value::String(text) if text.contains('$') => {
            let mut current = std::mem::take(text);
            for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                let next = match shellexpand::env(&current) {
                    Ok(expanded) => expanded.into_owned(),
                    Err(_) => break,
                };
                if next == current {
                    break;
                }
                current = next;
            }
            *text = current;
        }
        Value::Array(items) => items.iter_mut().for_each(expand_env_placeholders),
        Value::Object(map) => map.values_mut().for_each(expand_env_placeholders),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct VigilanceConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for VigilanceConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl VigilanceConfigLoader {
    /// Start with defaults; `VIGILANCE__` env overrides are applied last, at [`load`](Self::load).
    ///
    /// ```
    /// use vigilance_config::VigilanceConfigLoader;
    ///
    /// let config = VigilanceConfigLoader::new()
    ///     .with_yaml_str("department: '13'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.department, "13");
    /// assert!(config.source.is_none());
    /// assert_eq!(config.output.path.to_str(), Some("alerts.json"));
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a required YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, for environment-only deployments.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use vigilance_config::{OriginSpec, PayloadFormat, VigilanceConfigLoader};
    ///
    /// let cfg = VigilanceConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// source:
    ///   format: structured
    ///   from: file
    ///   path: alerts-raw.json
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// let source = cfg.source.unwrap();
    /// assert_eq!(source.format, PayloadFormat::Structured);
    /// assert!(matches!(source.origin, OriginSpec::File { .. }));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// `${VAR}` placeholders are expanded before deserialization, and the
    /// result is validated.
    pub fn load(self) -> Result<VigilanceConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("VIGILANCE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        if let (Ok(raw), Some(map)) = (std::env::var(DEPARTMENT_ENV), v.as_object_mut()) {
            map.insert("department".into(), Value::String(raw));
        }
        expand_env_placeholders(&mut v);

        let typed: VigilanceConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("VIGILANCE_TEST_HOST", Some("example.org"), || {
            let mut v = json!("https://${VIGILANCE_TEST_HOST}/feed.json");
            expand_env_placeholders(&mut v);
            assert_eq!(v, json!("https://example.org/feed.json"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars(
            [("DEPT", Some("33")), ("MARKER", Some("VIGILANCE ROUGE"))],
            || {
                let mut v = json!([
                    "dept-$DEPT",
                    { "marker": "${MARKER}!" },
                    42,
                    true,
                    null
                ]);
                expand_env_placeholders(&mut v);
                assert_eq!(
                    v,
                    json!(["dept-33", { "marker": "VIGILANCE ROUGE!" }, 42, true, null])
                );
            },
        );
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("VIGILANCE_TEST_ROOT", Some("/srv")),
                ("VIGILANCE_TEST_WWW", Some("${VIGILANCE_TEST_ROOT}/www")),
            ],
            || {
                let mut v = json!("${VIGILANCE_TEST_WWW}/alerts.json");
                expand_env_placeholders(&mut v);
                assert_eq!(v, json!("/srv/www/alerts.json"));
            },
        );
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars(
            [("VIGILANCE_PING", Some("${VIGILANCE_PONG}")), ("VIGILANCE_PONG", Some("${VIGILANCE_PING}"))],
            || {
                let mut v = json!("${VIGILANCE_PING}.json");
                expand_env_placeholders(&mut v);
                assert!(v.as_str().unwrap().ends_with("}.json"));
            },
        );
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("alerts-${VIGILANCE_TEST_UNSET_SUFFIX}.json");
        expand_env_placeholders(&mut v);
        assert_eq!(v, json!("alerts-${VIGILANCE_TEST_UNSET_SUFFIX}.json"));
    }

    #[test]
    fn defaults_fill_everything_but_source() {
        let cfg: VigilanceConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(cfg.department, "33");
        assert!(cfg.source.is_none());
        assert_eq!(cfg.output.schema, SchemaSpec::Legacy);
        assert_eq!(cfg.text.red_markers.len(), 2);
        assert!(cfg.logging.stderr);
        assert_eq!(cfg.logging.format, LogFormatSpec::Text);
    }

    #[test]
    fn numeric_department_and_version() {
        let cfg: VigilanceConfig =
            serde_json::from_value(json!({ "department": 33, "version": 0.1 })).unwrap();
        assert_eq!(cfg.department, "33");
        assert_eq!(cfg.version.as_deref(), Some("0.1"));

        let cfg: VigilanceConfig = serde_json::from_value(json!({ "department": 1 })).unwrap();
        assert_eq!(cfg.department, "01");
        assert!(serde_json::from_value::<VigilanceConfig>(json!({ "department": -3 })).is_err());
    }

    #[test]
    fn default_markers_follow_the_text_adapter() {
        assert_eq!(TextSpec::default().red_markers, DEFAULT_RED_MARKERS);
    }

    #[test]
    fn browser_origin_defaults() {
        let spec: SourceSpec = serde_json::from_value(json!({
            "format": "text",
            "from": "browser",
            "url": "https://example.org/vigilance/",
        }))
        .unwrap();
        assert_eq!(
            spec.origin,
            OriginSpec::Browser {
                url: "https://example.org/vigilance/".into(),
                webdriver_url: "http://localhost:9515".into(),
                headless: true,
                settle_secs: 5,
                timeout_secs: 30,
            }
        );
    }

    #[test]
    fn validation_rejects_bad_department() {
        let mut cfg: VigilanceConfig = serde_json::from_value(json!({})).unwrap();
        cfg.department = "33; rm".into();
        assert!(cfg.validate().is_err());
        cfg.department = " 33".into();
        assert!(cfg.validate().is_err());
        cfg.department = "2A".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validation_rejects_empty_url() {
        let cfg: VigilanceConfig = serde_json::from_value(json!({
            "source": { "format": "structured", "from": "http", "url": " " }
        }))
        .unwrap();
        assert!(cfg.validate().is_err());
    }
}
