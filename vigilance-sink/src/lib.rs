//! Persistence for normalized vigilance records.
//!
//! [`JsonFileSink`] replaces the target file atomically, so a reader sees
//! either the previous record or the new one, never a partial write.
//! Field naming is chosen per sink through [`OutputSchema`].

pub mod document;

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use vigilance_core::AlertRecord;

pub use document::{render, Document, OutputSchema};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write task aborted: {0}")]
    Task(String),
}

/// Where a finished record goes.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn describe(&self) -> String;

    async fn persist(&self, record: &AlertRecord) -> Result<(), SinkError>;
}

/// Writes the record as a JSON document at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    schema: OutputSchema,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>, schema: OutputSchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AlertSink for JsonFileSink {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn persist(&self, record: &AlertRecord) -> Result<(), SinkError> {
        let mut bytes = serde_json::to_vec_pretty(&Document::new(record, self.schema))?;
        bytes.push(b'\n');

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| SinkError::Task(e.to_string()))??;

        info!(path = %self.path.display(), schema = ?self.schema, "record persisted");
        Ok(())
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    let io_err = |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Prints the record to stdout, for piping into other tools.
#[derive(Debug, Clone, Copy)]
pub struct StdoutSink {
    schema: OutputSchema,
}

impl StdoutSink {
    pub fn new(schema: OutputSchema) -> Self {
        Self { schema }
    }
}

#[async_trait]
impl AlertSink for StdoutSink {
    fn describe(&self) -> String {
        "stdout".to_string()
    }

    async fn persist(&self, record: &AlertRecord) -> Result<(), SinkError> {
        let text = serde_json::to_string_pretty(&Document::new(record, self.schema))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{text}").map_err(|source| SinkError::Io {
            path: PathBuf::from("-"),
            source,
        })
    }
}
