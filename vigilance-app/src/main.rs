use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use vigilance_common::observability::init_logging;
use vigilance_common::{ExitStatus, VigilanceError};
use vigilance_config::{
    OriginSpec, PayloadFormat, SchemaSpec, SourceSpec, VigilanceConfig, VigilanceConfigLoader,
};

mod pipeline;
mod wiring;

const DEFAULT_CONFIG_FILE: &str = "vigilance.yaml";

/// Publish today's and tomorrow's weather vigilance for one department.
#[derive(Debug, Parser)]
#[command(name = "vigilance", version)]
struct Cli {
    /// YAML config file. Without it, `vigilance.yaml` is read if present.
    #[arg(long, global = true, env = "VIGILANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Department code, e.g. 33 or 2A.
    #[arg(long, global = true)]
    department: Option<String>,

    /// Output file; `-` prints to stdout.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Field naming of the published document.
    #[arg(long, global = true, value_enum)]
    schema: Option<SchemaArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Use the source configured in the YAML file.
    Run,
    /// Normalize a structured JSON feed.
    Parse {
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        input: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long, default_value_t = 15)]
        timeout_secs: u64,
        #[arg(long, default_value_t = 2)]
        retries: usize,
    },
    /// Extract vigilance from a rendered page, or from saved page text.
    Scrape {
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        url: Option<String>,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value = "http://localhost:9515")]
        webdriver_url: String,
        #[arg(long, default_value_t = 5)]
        settle_secs: u64,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
        /// Show the browser window.
        #[arg(long)]
        headed: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaArg {
    Legacy,
    Canonical,
}

impl From<SchemaArg> for SchemaSpec {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Legacy => SchemaSpec::Legacy,
            SchemaArg::Canonical => SchemaSpec::Canonical,
        }
    }
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<VigilanceConfig> {
        let loader = match &self.config {
            Some(path) => VigilanceConfigLoader::new().with_file(path),
            None => VigilanceConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
        };
        let mut cfg = loader.load().context("failed to load configuration")?;

        if let Some(dept) = &self.department {
            cfg.department = dept.trim().to_string();
        }
        if let Some(path) = &self.output {
            cfg.output.path = path.clone();
        }
        if let Some(schema) = self.schema {
            cfg.output.schema = schema.into();
        }
        cfg.validate().context("invalid command-line override")?;
        Ok(cfg)
    }

    /// The source this invocation reads from.
    fn source(&self, cfg: &VigilanceConfig) -> Result<SourceSpec, VigilanceError> {
        match &self.command {
            Command::Run => cfg.source.clone().ok_or_else(|| {
                VigilanceError::Config("no source configured; add `source:` or use parse/scrape".into())
            }),
            Command::Parse {
                input,
                url,
                timeout_secs,
                retries,
            } => {
                let origin = match (input, url) {
                    (Some(path), _) => OriginSpec::File { path: path.clone() },
                    (None, Some(url)) => OriginSpec::Http {
                        url: url.clone(),
                        timeout_secs: *timeout_secs,
                        retries: *retries,
                    },
                    (None, None) => {
                        return Err(VigilanceError::Config("parse needs --input or --url".into()));
                    }
                };
                Ok(SourceSpec {
                    format: PayloadFormat::Structured,
                    origin,
                })
            }
            Command::Scrape {
                url,
                input,
                webdriver_url,
                settle_secs,
                timeout_secs,
                headed,
            } => {
                let origin = match (input, url) {
                    (Some(path), _) => OriginSpec::File { path: path.clone() },
                    (None, Some(url)) => OriginSpec::Browser {
                        url: url.clone(),
                        webdriver_url: webdriver_url.clone(),
                        headless: !headed,
                        settle_secs: *settle_secs,
                        timeout_secs: *timeout_secs,
                    },
                    (None, None) => {
                        return Err(VigilanceError::Config("scrape needs --url or --input".into()));
                    }
                };
                Ok(SourceSpec {
                    format: PayloadFormat::Text,
                    origin,
                })
            }
        }
    }
}

async fn launch(cli: Cli) -> Result<ExitStatus, VigilanceError> {
    // 1) Config first; logging settings live in it
    let cfg = cli
        .load_config()
        .map_err(|e| VigilanceError::Config(format!("{e:#}")))?;

    // 2) Logging
    let log_path = init_logging(wiring::log_config(&cfg.logging))?;
    info!(log = %log_path.display(), department = %cfg.department, "vigilance starting");

    // 3) Source, normalizer, sink
    let source = cli.source(&cfg)?;
    let plan = wiring::build_plan(&cfg, &source)?;

    Ok(pipeline::run(&plan).await)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match launch(cli).await {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            // Logging may not be up yet.
            error!(error = %err, "vigilance could not start");
            eprintln!("vigilance: {err}");
            ExitCode::from(err.exit_status().code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_requires_exactly_one_origin() {
        assert!(Cli::try_parse_from(["vigilance", "parse"]).is_err());
        assert!(
            Cli::try_parse_from(["vigilance", "parse", "--input", "a.json", "--url", "http://x"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["vigilance", "parse", "--input", "a.json"]).is_ok());
    }

    #[test]
    fn global_overrides_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "vigilance",
            "scrape",
            "--url",
            "https://example.org/vigilance/",
            "--department",
            "13",
            "--schema",
            "canonical",
            "--headed",
        ])
        .unwrap();
        assert_eq!(cli.department.as_deref(), Some("13"));
        assert!(matches!(cli.schema, Some(SchemaArg::Canonical)));

        let cfg = VigilanceConfigLoader::new().load().unwrap();
        let source = cli.source(&cfg).unwrap();
        assert_eq!(source.format, PayloadFormat::Text);
        assert!(matches!(
            source.origin,
            OriginSpec::Browser { headless: false, settle_secs: 5, .. }
        ));
    }

    #[test]
    fn department_override_is_trimmed() {
        let cli = Cli::try_parse_from(["vigilance", "--department", " 13 ", "run"]).unwrap();
        let cfg = cli.load_config().unwrap();
        assert_eq!(cfg.department, "13");
    }

    #[test]
    fn run_without_configured_source_is_a_config_error() {
        let cli = Cli::try_parse_from(["vigilance", "run"]).unwrap();
        let cfg = VigilanceConfigLoader::new().load().unwrap();
        let err = cli.source(&cfg).unwrap_err();
        assert_eq!(err.exit_status(), ExitStatus::ConfigInvalid);
    }
}
