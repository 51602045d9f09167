use std::collections::HashSet;
use std::str::FromStr;

use polars::prelude::*;
use tracing::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column as _, ConnectOptions, Executor, Row, Statement, TypeInfo, ValueRef};

/// Opens the SQLite database named by `location`.
///
/// Accepted forms are SQLAlchemy-style URLs (`sqlite:///farm.db`), sqlx URLs
/// (`sqlite://farm.db`, `sqlite::memory:`) and bare file paths. A missing
/// database file is an error; nothing is created.
pub async fn connect(location: &str) -> Result<SqliteConnection, sqlx::Error> {
    connect_options(location)?.connect().await
}

pub fn connect_options(location: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    if let Some(path) = location.strip_prefix("sqlite:///") {
        return Ok(SqliteConnectOptions::new().filename(path));
    }
    if location.starts_with("sqlite:") {
        return SqliteConnectOptions::from_str(location);
    }
    Ok(SqliteConnectOptions::new().filename(location))
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Runs `sql` and collects the whole result set into a DataFrame.
///
/// Column dtypes follow the stored values: integers become `Int64`, reals (or
/// a mix of integers and reals) `Float64`, and anything holding text becomes
/// `String`. A column without any non-null value takes its dtype from the
/// declared column type. Repeated column names (e.g. from a join) are kept,
/// later occurrences being renamed `{name}_duplicated_{n}`.
pub async fn query_frame(
    conn: &mut SqliteConnection,
    sql: &str,
) -> Result<DataFrame, sqlx::Error> {
    let statement = (&mut *conn).prepare(sql).await?;
    let columns: Vec<(String, String)> = statement
        .columns()
        .iter()
        .map(|column| {
            (
                column.name().to_string(),
                column.type_info().name().to_ascii_uppercase(),
            )
        })
        .collect();

    let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;

    let mut cells: Vec<Vec<Cell>> = columns
        .iter()
        .map(|_| Vec::with_capacity(rows.len()))
        .collect();
    for row in &rows {
        for (idx, values) in cells.iter_mut().enumerate() {
            values.push(read_cell(row, idx)?);
        }
    }

    let names = unique_column_names(columns.iter().map(|(name, _)| name.as_str()));
    let frame_columns: Vec<Column> = names
        .iter()
        .zip(&columns)
        .map(|(name, (_, declared))| (name, declared))
        .zip(cells)
        .map(|((name, declared), values)| build_series(name, declared, values).into())
        .collect();

    DataFrame::new(frame_columns).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Makes result-set column names unique, keeping the first occurrence as is.
fn unique_column_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.collect();
    let mut taken: HashSet<String> = names.iter().map(|name| name.to_string()).collect();
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(names.len());

    for name in names {
        if seen.insert(name) {
            unique.push(name.to_string());
            continue;
        }

        let mut n = 0;
        let mut candidate = format!("{name}_duplicated_{n}");
        while taken.contains(&candidate) {
            n += 1;
            candidate = format!("{name}_duplicated_{n}");
        }
        debug!(column = name, renamed = %candidate, "renamed repeated result column");
        taken.insert(candidate.clone());
        unique.push(candidate);
    }

    unique
}

fn read_cell(row: &SqliteRow, idx: usize) -> Result<Cell, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }

    let storage = raw.type_info().name().to_ascii_uppercase();
    let cell = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => Cell::Integer(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" => Cell::Real(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx)?;
            Cell::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Cell::Text(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(cell)
}

fn build_series(name: &str, declared: &str, values: Vec<Cell>) -> Series {
    let has_text = values.iter().any(|cell| matches!(cell, Cell::Text(_)));
    let has_real = values.iter().any(|cell| matches!(cell, Cell::Real(_)));
    let has_integer = values.iter().any(|cell| matches!(cell, Cell::Integer(_)));

    if has_text {
        let column: Vec<Option<String>> = values
            .into_iter()
            .map(|cell| match cell {
                Cell::Null => None,
                Cell::Integer(v) => Some(v.to_string()),
                Cell::Real(v) => Some(v.to_string()),
                Cell::Text(v) => Some(v),
            })
            .collect();
        return Series::new(name.into(), column);
    }

    if has_real {
        let column: Vec<Option<f64>> = values
            .into_iter()
            .map(|cell| match cell {
                Cell::Integer(v) => Some(v as f64),
                Cell::Real(v) => Some(v),
                Cell::Null | Cell::Text(_) => None,
            })
            .collect();
        return Series::new(name.into(), column);
    }

    if has_integer {
        let column: Vec<Option<i64>> = values
            .into_iter()
            .map(|cell| match cell {
                Cell::Integer(v) => Some(v),
                _ => None,
            })
            .collect();
        return Series::new(name.into(), column);
    }

    Series::full_null(name.into(), values.len(), &declared_dtype(declared))
}

/// SQLite type affinity rules, applied to the declared column type.
fn declared_dtype(declared: &str) -> DataType {
    if declared.contains("INT") || declared == "BOOLEAN" {
        DataType::Int64
    } else if ["CHAR", "CLOB", "TEXT"].iter().any(|s| declared.contains(s)) {
        DataType::String
    } else if ["REAL", "FLOA", "DOUB"].iter().any(|s| declared.contains(s)) {
        DataType::Float64
    } else {
        DataType::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_follow_sqlite_affinity() {
        assert_eq!(declared_dtype("INTEGER"), DataType::Int64);
        assert_eq!(declared_dtype("BIGINT"), DataType::Int64);
        assert_eq!(declared_dtype("VARCHAR(20)"), DataType::String);
        assert_eq!(declared_dtype("DOUBLE PRECISION"), DataType::Float64);
        assert_eq!(declared_dtype("NULL"), DataType::Null);
    }

    #[test]
    fn mixed_integer_and_real_cells_become_float() {
        let series = build_series(
            "Elevation",
            "NULL",
            vec![Cell::Integer(-3), Cell::Null, Cell::Real(2.5)],
        );
        assert_eq!(series.dtype(), &DataType::Float64);
        let values: Vec<Option<f64>> = series.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(-3.0), None, Some(2.5)]);
    }

    #[test]
    fn repeated_column_names_are_suffixed() {
        let names = unique_column_names(
            ["Field_ID", "Notes", "Notes", "Notes_duplicated_0", "Notes"].into_iter(),
        );
        assert_eq!(
            names,
            [
                "Field_ID",
                "Notes",
                "Notes_duplicated_1",
                "Notes_duplicated_0",
                "Notes_duplicated_2",
            ]
        );
    }

    #[test]
    fn bare_paths_and_urls_are_accepted() {
        let options = connect_options("sqlite:///farm_survey.db").unwrap();
        assert_eq!(options.get_filename(), std::path::Path::new("farm_survey.db"));

        let options = connect_options("data/farm_survey.db").unwrap();
        assert_eq!(
            options.get_filename(),
            std::path::Path::new("data/farm_survey.db")
        );
    }
}
