// crates/fieldflux-core/src/error.rs

use std::fmt;

use polars::prelude::DataType;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The four pipeline steps, in the order `process()` runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Load,
    Rename,
    Correct,
    Enrich,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Load => "load",
            Step::Rename => "rename",
            Step::Correct => "correct",
            Step::Enrich => "enrich",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("data source {location} failed: {source}")]
    DataSource {
        location: String,
        #[source]
        source: BoxError,
    },

    #[error("{step} step requires column '{column}', which is not present")]
    MissingColumn { step: Step, column: String },

    #[error("{step} step expected column '{column}' to be {expected}, found {found}")]
    ColumnType {
        step: Step,
        column: String,
        expected: &'static str,
        found: DataType,
    },

    #[error("weather mapping source {location} failed: {source}")]
    EnrichmentSource {
        location: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{step} step called before a table was loaded")]
    TableNotLoaded { step: Step },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl PipelineError {
    pub fn data_source(location: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PipelineError::DataSource {
            location: location.into(),
            source: source.into(),
        }
    }

    pub fn enrichment_source(location: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PipelineError::EnrichmentSource {
            location: location.into(),
            source: source.into(),
        }
    }

    pub fn missing_column(step: Step, column: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            step,
            column: column.into(),
        }
    }

    /// The step that raised this error, when the error is tied to one.
    pub fn step(&self) -> Option<Step> {
        match self {
            PipelineError::DataSource { .. } => Some(Step::Load),
            PipelineError::EnrichmentSource { .. } => Some(Step::Enrich),
            PipelineError::MissingColumn { step, .. }
            | PipelineError::ColumnType { step, .. }
            | PipelineError::TableNotLoaded { step } => Some(*step),
            PipelineError::Config(_) | PipelineError::Polars(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
