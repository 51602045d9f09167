use std::collections::HashMap;

use polars::prelude::*;

use crate::config::CorrectionColumns;
use crate::error::{PipelineError, Result, Step};

/// Applies both column corrections and returns the corrected table:
///
/// * `columns.magnitude` holds absolute values (negative readings are sign
///   errors from the sensors),
/// * `columns.categorical` is trimmed, then mapped through `value_renames`;
///   values without a mapping keep their trimmed form.
///
/// Both columns are checked before anything is replaced.
pub fn apply_corrections(
    df: &DataFrame,
    columns: &CorrectionColumns,
    value_renames: &HashMap<String, String>,
) -> Result<DataFrame> {
    let magnitude = column(df, &columns.magnitude)?;
    let categorical = column(df, &columns.categorical)?;

    let magnitude = absolute_values(magnitude)?;
    let categorical = normalize_categories(categorical, value_renames)?;

    let mut corrected = df.clone();
    corrected.with_column(magnitude)?;
    corrected.with_column(categorical)?;
    Ok(corrected)
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PipelineError::missing_column(Step::Correct, name))
}

/// Integer columns come back as `Int64`; float columns keep their width.
/// `i64::MIN` saturates to `i64::MAX`.
pub fn absolute_values(column: &Column) -> Result<Series> {
    let series = column.as_materialized_series();
    let name = series.name().clone();

    match series.dtype() {
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let widened = series.cast(&DataType::Int64)?;
            let values: Vec<Option<i64>> = widened
                .i64()?
                .into_iter()
                .map(|value| value.map(i64::saturating_abs))
                .collect();
            Ok(Series::new(name, values))
        }
        DataType::Float32 | DataType::Float64 => {
            let dtype = series.dtype().clone();
            let widened = series.cast(&DataType::Float64)?;
            let values: Vec<Option<f64>> = widened
                .f64()?
                .into_iter()
                .map(|value| value.map(f64::abs))
                .collect();
            Ok(Series::new(name, values).cast(&dtype)?)
        }
        DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Null => Ok(series.clone()),
        other => Err(PipelineError::ColumnType {
            step: Step::Correct,
            column: name.to_string(),
            expected: "numeric",
            found: other.clone(),
        }),
    }
}

pub fn normalize_categories(
    column: &Column,
    value_renames: &HashMap<String, String>,
) -> Result<Series> {
    let series = column.as_materialized_series();
    let name = series.name().clone();

    match series.dtype() {
        DataType::String => {
            let values: Vec<Option<String>> = series
                .str()?
                .into_iter()
                .map(|value| value.map(|raw| normalize_category(raw, value_renames)))
                .collect();
            Ok(Series::new(name, values))
        }
        DataType::Null => Ok(series.clone()),
        other => Err(PipelineError::ColumnType {
            step: Step::Correct,
            column: name.to_string(),
            expected: "a string column",
            found: other.clone(),
        }),
    }
}

fn normalize_category(raw: &str, value_renames: &HashMap<String, String>) -> String {
    let trimmed = raw.trim();
    value_renames
        .get(trimmed)
        .cloned()
        .unwrap_or_else(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_values_are_only_trimmed() {
        let renames = HashMap::from([("maize".to_string(), "Maize".to_string())]);
        assert_eq!(normalize_category("  maize ", &renames), "Maize");
        assert_eq!(normalize_category(" tea\t", &renames), "tea");
        assert_eq!(normalize_category("Maize", &renames), "Maize");
    }
}
