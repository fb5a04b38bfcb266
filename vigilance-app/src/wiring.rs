use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use vigilance_common::VigilanceError;
use vigilance_common::observability::{LogConfig, LogFormat};
use vigilance_config::{
    LogFormatSpec, LoggingSpec, OriginSpec, PayloadFormat, SchemaSpec, SourceSpec,
    VigilanceConfig,
};
use vigilance_core::{Normalizer, SourceFormat, SystemClock};
use vigilance_drivers::{BrowserOptions, BrowserSource, FileSource, HttpSource, PageTextProvider};
use vigilance_sink::{AlertSink, JsonFileSink, OutputSchema, StdoutSink};

use crate::pipeline::Plan;

/// Output path that selects stdout instead of a file.
pub const STDOUT_PATH: &str = "-";

const FILE_DEADLINE: Duration = Duration::from_secs(30);
// Room for backoff sleeps between HTTP attempts.
const RETRY_SLACK: Duration = Duration::from_secs(30);

pub fn log_config(spec: &LoggingSpec) -> LogConfig {
    LogConfig {
        app_name: "vigilance",
        log_dir: spec.dir.clone(),
        emit_stderr: spec.stderr,
        format: match spec.format {
            LogFormatSpec::Text => LogFormat::Text,
            LogFormatSpec::Json => LogFormat::Json,
        },
        default_filter: spec.filter.clone(),
    }
}

pub fn output_schema(spec: SchemaSpec) -> OutputSchema {
    match spec {
        SchemaSpec::Legacy => OutputSchema::Legacy,
        SchemaSpec::Canonical => OutputSchema::Canonical,
    }
}

fn source_format(format: PayloadFormat) -> SourceFormat {
    match format {
        PayloadFormat::Structured => SourceFormat::Structured,
        PayloadFormat::Text => SourceFormat::Text,
    }
}

/// Provider for `origin`, plus the overall deadline to acquire from it.
pub fn provider_for(
    origin: &OriginSpec,
) -> Result<(Box<dyn PageTextProvider>, Duration), VigilanceError> {
    let invalid = |e: vigilance_drivers::ProviderError| VigilanceError::Config(e.to_string());
    let provider: Box<dyn PageTextProvider>;
    let deadline = match origin {
        OriginSpec::File { path } => {
            provider = Box::new(FileSource::new(path));
            FILE_DEADLINE
        }
        OriginSpec::Http {
            url,
            timeout_secs,
            retries,
        } => {
            let per_attempt = Duration::from_secs(*timeout_secs);
            let attempts = u32::try_from(retries.saturating_add(1)).unwrap_or(u32::MAX);
            provider = Box::new(HttpSource::new(url, per_attempt, *retries).map_err(invalid)?);
            per_attempt.saturating_mul(attempts) + RETRY_SLACK
        }
        OriginSpec::Browser {
            url,
            webdriver_url,
            headless,
            settle_secs,
            timeout_secs,
        } => {
            let options = BrowserOptions {
                webdriver_url: webdriver_url.clone(),
                headless: *headless,
                settle: Duration::from_secs(*settle_secs),
                navigation_timeout: Duration::from_secs(*timeout_secs),
            };
            // Connect and navigate each get the navigation timeout.
            let deadline = options.navigation_timeout * 2 + options.settle + FILE_DEADLINE;
            provider = Box::new(BrowserSource::new(url, options).map_err(invalid)?);
            deadline
        }
    };
    Ok((provider, deadline))
}

pub fn sink_for(path: &Path, schema: OutputSchema) -> Box<dyn AlertSink> {
    if path == Path::new(STDOUT_PATH) {
        Box::new(StdoutSink::new(schema))
    } else {
        Box::new(JsonFileSink::new(path, schema))
    }
}

/// Assemble the run from a validated config and the chosen source.
pub fn build_plan(cfg: &VigilanceConfig, source: &SourceSpec) -> Result<Plan, VigilanceError> {
    let normalizer = Normalizer::new(cfg.department.clone())
        .map_err(|e| VigilanceError::Internal(e.into()))?
        .with_red_markers(cfg.text.red_markers.iter().cloned())
        .with_clock(Arc::new(SystemClock));
    let (provider, deadline) = provider_for(&source.origin)?;
    let schema = output_schema(cfg.output.schema);

    debug!(deadline_secs = deadline.as_secs(), ?schema, "plan assembled");
    Ok(Plan {
        format: source_format(source.format),
        provider,
        deadline,
        normalizer,
        sink: sink_for(&cfg.output.path, schema),
        schema,
    })
}
