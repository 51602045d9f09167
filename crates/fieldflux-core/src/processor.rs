use polars::prelude::DataFrame;
use tracing::{info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::column_swap::swap_columns;
use crate::config::{ColumnSwap, CorrectionColumns, PipelineConfig};
use crate::corrections;
use crate::error::{PipelineError, Result, Step};
use crate::sources::{CsvLookupSource, LookupSource, SqliteTableSource, TableSource};
use crate::weather_enricher::enrich_with_weather_stations;

/// The last step that completed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Empty,
    Loaded,
    Renamed,
    Corrected,
    Enriched,
}

/// Runs the load → rename → correct → enrich pipeline over a table it owns.
///
/// Each step computes a new table from the current one; the current table is
/// only replaced when the step succeeds, so after a failure [`table`](Self::table)
/// still shows the output of the last successful step.
pub struct FieldDataProcessor {
    config: PipelineConfig,
    swap: ColumnSwap,
    table_source: Box<dyn TableSource>,
    lookup_source: Box<dyn LookupSource>,
    span: Span,
    table: Option<DataFrame>,
    stage: Stage,
}

impl std::fmt::Debug for FieldDataProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDataProcessor")
            .field("config", &self.config)
            .field("stage", &self.stage)
            .field("table_shape", &self.table.as_ref().map(DataFrame::shape))
            .finish()
    }
}

impl FieldDataProcessor {
    /// Builds a processor reading from SQLite and fetching the weather
    /// mapping as CSV. Fails with [`PipelineError::Config`] if the config is
    /// invalid or the HTTP client cannot be built.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_sources(
            config,
            Box::new(SqliteTableSource),
            Box::new(CsvLookupSource::new()?),
        )
    }

    /// Fails with [`PipelineError::Config`] when the configuration is invalid,
    /// e.g. `columns_to_rename` does not hold exactly one pair.
    pub fn with_sources(
        config: PipelineConfig,
        table_source: Box<dyn TableSource>,
        lookup_source: Box<dyn LookupSource>,
    ) -> Result<Self> {
        let swap = config.validate()?;
        let span = info_span!("field_data_processor", run_id = %Uuid::new_v4());

        Ok(Self {
            config,
            swap,
            table_source,
            lookup_source,
            span,
            table: None,
            stage: Stage::Empty,
        })
    }

    /// Emits all of this processor's events inside `span` instead of the
    /// default `field_data_processor` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn table(&self) -> Option<&DataFrame> {
        self.table.as_ref()
    }

    pub fn into_table(self) -> Option<DataFrame> {
        self.table
    }

    /// Replaces the current table with the result of `sql_query` against
    /// `db_path`.
    pub async fn load_table(&mut self) -> Result<&DataFrame> {
        let span = self.span.clone();
        let table = async {
            let table = self
                .table_source
                .load_table(&self.config.db_path, &self.config.sql_query)
                .await?;
            info!(
                rows = table.height(),
                columns = table.width(),
                "successfully loaded data"
            );
            Ok::<_, PipelineError>(table)
        }
        .instrument(span)
        .await?;

        self.stage = Stage::Loaded;
        Ok(&*self.table.insert(table))
    }

    /// Swaps the names of the two columns in `columns_to_rename`.
    pub fn rename_columns(&mut self) -> Result<()> {
        let _entered = self.span.clone().entered();
        let current = self.current_table(Step::Rename)?;

        let swapped = swap_columns(current, &self.swap)?;
        info!(
            source = %self.swap.source,
            target = %self.swap.target,
            "swapped columns"
        );

        self.table = Some(swapped);
        self.stage = Stage::Renamed;
        Ok(())
    }

    /// Corrects the configured categorical and magnitude columns
    /// (`Crop_type` and `Elevation` unless the config names others).
    pub fn apply_corrections(&mut self) -> Result<()> {
        let columns = self.config.correction_columns();
        self.apply_corrections_to(&columns)
    }

    pub fn apply_corrections_to(&mut self, columns: &CorrectionColumns) -> Result<()> {
        let _entered = self.span.clone().entered();
        let current = self.current_table(Step::Correct)?;

        let corrected =
            corrections::apply_corrections(current, columns, &self.config.values_to_rename)?;
        info!(
            categorical = %columns.categorical,
            magnitude = %columns.magnitude,
            "applied corrections"
        );

        self.table = Some(corrected);
        self.stage = Stage::Corrected;
        Ok(())
    }

    /// Adds `Weather_station` to every row by left-joining the weather
    /// mapping on `Field_ID`.
    pub async fn enrich_with_weather_station(&mut self) -> Result<()> {
        let span = self.span.clone();
        let enriched = async {
            let current = self.current_table(Step::Enrich)?;
            let location = &self.config.weather_mapping_csv;

            let lookup = self.lookup_source.fetch_table(location).await?;
            let enriched = enrich_with_weather_stations(current, &lookup, location)?;
            info!(
                rows = enriched.height(),
                lookup_rows = lookup.height(),
                "mapped weather stations"
            );
            Ok::<_, PipelineError>(enriched)
        }
        .instrument(span)
        .await?;

        self.table = Some(enriched);
        self.stage = Stage::Enriched;
        Ok(())
    }

    /// Runs every step in order and stops at the first failure, returning
    /// that step's error as-is.
    pub async fn process(&mut self) -> Result<()> {
        self.load_table().await?;
        self.rename_columns()?;
        self.apply_corrections()?;
        self.enrich_with_weather_station().await?;
        Ok(())
    }

    fn current_table(&self, step: Step) -> Result<&DataFrame> {
        self.table
            .as_ref()
            .ok_or(PipelineError::TableNotLoaded { step })
    }
}
