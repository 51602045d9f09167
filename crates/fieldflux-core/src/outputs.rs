use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::io::parquet::write::{ParquetCompression, ParquetWriter};
use polars::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    /// `.parquet` files are written as Parquet, everything else as CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => OutputFormat::Parquet,
            _ => OutputFormat::Csv,
        }
    }
}

/// Writes the processed table to `path`, returning the format used.
pub fn write_table(path: &Path, df: &mut DataFrame) -> Result<OutputFormat> {
    let format = OutputFormat::from_path(path);
    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;

    match format {
        OutputFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(df)
                .context("failed to write CSV output")?;
        }
        OutputFormat::Parquet => {
            ParquetWriter::new(&mut file)
                .with_compression(ParquetCompression::Zstd(None))
                .finish(df)
                .context("failed to write parquet output")?;
        }
    }

    Ok(format)
}
