use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{error, info, warn};
use vigilance_common::{ExitStatus, VigilanceError};
use vigilance_core::{AlertRecord, Horizon, Normalizer, SourceFormat};
use vigilance_drivers::PageTextProvider;
use vigilance_sink::{AlertSink, OutputSchema, render};

/// Everything one run needs, resolved from config and flags.
pub struct Plan {
    pub format: SourceFormat,
    pub provider: Box<dyn PageTextProvider>,
    /// Overall deadline for acquiring the raw payload.
    pub deadline: Duration,
    pub normalizer: Normalizer,
    pub sink: Box<dyn AlertSink>,
    pub schema: OutputSchema,
}

/// Acquire, normalize, persist. A record is written on every path except a
/// persistence failure, where it goes to the log instead.
pub async fn run(plan: &Plan) -> ExitStatus {
    let started = Instant::now();
    info!(
        source = %plan.provider.describe(),
        format = %plan.format,
        department = %plan.normalizer.department(),
        sink = %plan.sink.describe(),
        "run started"
    );

    let (record, status) = match acquire(plan).await {
        Ok(raw) => {
            let normalized = plan.normalizer.normalize_or_failed(plan.format, &raw);
            let status = match normalized.failure {
                Some(_) => ExitStatus::NormalizationFailed,
                None => ExitStatus::Success,
            };
            (normalized.record, status)
        }
        Err(err) => {
            error!(source = %plan.provider.describe(), error = %err, "acquisition failed");
            (plan.normalizer.failed(err.to_string()), err.exit_status())
        }
    };

    if let Err(err) = plan.sink.persist(&record).await {
        let rendered = render(&record, plan.schema)
            .map(|doc| doc.to_string())
            .unwrap_or_else(|e| format!("<unrenderable: {e}>"));
        error!(
            sink = %plan.sink.describe(),
            error = %err,
            record = %rendered,
            "failed to persist record"
        );
        return VigilanceError::Persistence(err.to_string()).exit_status();
    }

    summarize(&record);
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        exit_code = status.code(),
        "run finished"
    );
    status
}

async fn acquire(plan: &Plan) -> Result<Vec<u8>, VigilanceError> {
    match timeout(plan.deadline, plan.provider.fetch()).await {
        Ok(Ok(raw)) => Ok(raw),
        Ok(Err(err)) => Err(VigilanceError::Acquisition(err.to_string())),
        Err(_) => Err(VigilanceError::Timeout(plan.deadline.as_secs())),
    }
}

fn summarize(record: &AlertRecord) {
    for (name, horizon) in [("today", Horizon::Today), ("tomorrow", Horizon::Tomorrow)] {
        let h = record.horizon(horizon);
        info!(
            horizon = name,
            date = %h.date,
            level = %h.level,
            phenomena = h.phenomena.as_display(),
            "vigilance"
        );
    }

    if !record.red_alert_detected {
        return;
    }
    let mut reported = false;
    for (name, horizon) in [("today", Horizon::Today), ("tomorrow", Horizon::Tomorrow)] {
        let h = record.horizon(horizon);
        if h.level.is_red() {
            warn!(
                horizon = name,
                date = %h.date,
                phenomena = h.phenomena.as_display(),
                "RED ALERT in effect"
            );
            reported = true;
        }
    }
    if !reported {
        // Flag raised by a page marker without a level-4 horizon.
        warn!(
            today = %record.today.level,
            tomorrow = %record.tomorrow.level,
            "RED ALERT flagged by source"
        );
    }
}
