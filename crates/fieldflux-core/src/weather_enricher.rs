use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result, Step};

pub const FIELD_ID: &str = "Field_ID";
pub const WEATHER_STATION: &str = "Weather_station";

/// Left-joins the `Weather_station` column of `lookup` onto `observations`
/// by `Field_ID`. Every observation row is kept, in order; rows without a
/// matching field get a null station.
///
/// A field listed more than once in the lookup yields one output row per
/// listing.
pub fn enrich_with_weather_stations(
    observations: &DataFrame,
    lookup: &DataFrame,
    lookup_location: &str,
) -> Result<DataFrame> {
    let key_dtype = observations
        .column(FIELD_ID)
        .map_err(|_| PipelineError::missing_column(Step::Enrich, FIELD_ID))?
        .dtype()
        .clone();

    for required in [FIELD_ID, WEATHER_STATION] {
        if lookup.get_column_index(required).is_none() {
            return Err(PipelineError::enrichment_source(
                lookup_location,
                format!("lookup table has no '{required}' column"),
            ));
        }
    }

    let repeated = repeated_key_rows(lookup)?;
    if repeated > 0 {
        warn!(
            repeated_rows = repeated,
            "weather mapping lists some fields more than once; matching rows will be repeated"
        );
    }

    let mut left = observations.clone();
    if left.get_column_index(WEATHER_STATION).is_some() {
        debug!("replacing existing {WEATHER_STATION} column");
        left = left.drop(WEATHER_STATION)?;
    }

    let stations = lookup
        .clone()
        .lazy()
        .select([col(FIELD_ID).cast(key_dtype), col(WEATHER_STATION)]);

    let enriched = left
        .lazy()
        .join(
            stations,
            [col(FIELD_ID)],
            [col(FIELD_ID)],
            JoinArgs {
                maintain_order: MaintainOrderJoin::Left,
                ..JoinArgs::new(JoinType::Left)
            },
        )
        .collect()?;

    Ok(enriched)
}

/// Lookup rows whose key already appeared on an earlier row.
fn repeated_key_rows(lookup: &DataFrame) -> Result<usize> {
    let keys = lookup.column(FIELD_ID)?.as_materialized_series();
    Ok(keys.len().saturating_sub(keys.n_unique()?))
}
