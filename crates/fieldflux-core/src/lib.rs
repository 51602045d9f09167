pub mod column_swap;
pub mod config;
pub mod corrections;
pub mod db;
pub mod error;
pub mod outputs;
pub mod processor;
pub mod sources;
pub mod weather_enricher;

pub use config::{ColumnSwap, CorrectionColumns, PipelineConfig};
pub use error::{PipelineError, Result, Step};
pub use processor::{FieldDataProcessor, Stage};
