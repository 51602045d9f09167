use polars::prelude::*;

use crate::config::ColumnSwap;
use crate::error::{PipelineError, Result, Step};

const PLACEHOLDER_BASE: &str = "__temp_name_for_swap__";

/// Exchanges the names of `swap.source` and `swap.target`. Column data and
/// positions are unchanged, only the two labels trade places.
pub fn swap_columns(df: &DataFrame, swap: &ColumnSwap) -> Result<DataFrame> {
    for column in [&swap.source, &swap.target] {
        if df.get_column_index(column).is_none() {
            return Err(PipelineError::missing_column(Step::Rename, column.as_str()));
        }
    }

    let placeholder = placeholder_name(df);

    let mut swapped = df.clone();
    for (from, to) in [
        (swap.source.as_str(), placeholder.as_str()),
        (swap.target.as_str(), swap.source.as_str()),
        (placeholder.as_str(), swap.target.as_str()),
    ] {
        swapped.rename(from, to.into())?;
        // rename leaves the cached schema holding the old name
        swapped.clear_schema();
    }

    Ok(swapped)
}

/// A column name not used by `df`.
pub fn placeholder_name(df: &DataFrame) -> String {
    let mut name = PLACEHOLDER_BASE.to_string();
    while df.get_column_index(&name).is_some() {
        name.push('_');
    }
    name
}
