//! Where the processor gets its tables from.
//!
//! The processor only sees the two traits; [`SqliteTableSource`] and
//! [`CsvLookupSource`] are the adapters used by the binary.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use polars::prelude::*;
use tracing::debug;

use crate::db;
use crate::error::{BoxError, PipelineError, Result};

/// Produces the table the pipeline starts from.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Opens `location`, runs `query` and returns the full result set.
    /// Failures are reported as [`PipelineError::DataSource`].
    async fn load_table(&self, location: &str, query: &str) -> Result<DataFrame>;
}

/// Produces the weather-station lookup table.
#[async_trait]
pub trait LookupSource: Send + Sync {
    /// Failures are reported as [`PipelineError::EnrichmentSource`].
    async fn fetch_table(&self, location: &str) -> Result<DataFrame>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTableSource;

#[async_trait]
impl TableSource for SqliteTableSource {
    async fn load_table(&self, location: &str, query: &str) -> Result<DataFrame> {
        let mut conn = db::connect(location)
            .await
            .map_err(|err| PipelineError::data_source(location, err))?;
        db::query_frame(&mut conn, query)
            .await
            .map_err(|err| PipelineError::data_source(location, err))
    }
}

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads a CSV table (header row, inferred dtypes) over HTTP(S) or from the
/// local filesystem.
#[derive(Debug, Clone)]
pub struct CsvLookupSource {
    client: reqwest::Client,
}

impl CsvLookupSource {
    /// Uses a 30 second request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PipelineError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    async fn fetch_bytes(&self, location: &str) -> std::result::Result<Vec<u8>, BoxError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            debug!(url = location, "downloading weather mapping");
            let response = self.client.get(location).send().await?.error_for_status()?;
            return Ok(response.bytes().await?.to_vec());
        }

        let path = location.strip_prefix("file://").unwrap_or(location);
        debug!(path, "reading weather mapping from disk");
        Ok(tokio::fs::read(path).await?)
    }
}

#[async_trait]
impl LookupSource for CsvLookupSource {
    async fn fetch_table(&self, location: &str) -> Result<DataFrame> {
        let bytes = self
            .fetch_bytes(location)
            .await
            .map_err(|err| PipelineError::enrichment_source(location, err))?;
        read_csv_bytes(&bytes).map_err(|err| PipelineError::enrichment_source(location, err))
    }
}

pub fn read_csv_bytes(content: &[u8]) -> PolarsResult<DataFrame> {
    let cursor = Cursor::new(content);
    CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(cursor)
        .finish()
}
