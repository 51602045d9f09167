use std::collections::HashMap;

use polars::prelude::*;

use fieldflux_core::corrections::apply_corrections;
use fieldflux_core::{CorrectionColumns, PipelineError, Step};

fn crop_renames() -> HashMap<String, String> {
    HashMap::from([
        ("cassaval".to_string(), "cassava".to_string()),
        ("wheatn".to_string(), "wheat".to_string()),
        ("teaa".to_string(), "tea".to_string()),
        ("maize".to_string(), "Maize".to_string()),
    ])
}

fn survey() -> DataFrame {
    df![
        "Field_ID" => &[1i64, 2, 3, 4, 5],
        "Crop_type" => &[Some("maize "), Some(" cassaval"), Some("tea"), None, Some("  potato\t")],
        "Elevation" => &[Some(-120.0f64), Some(45.5), None, Some(0.0), Some(-0.25)],
    ]
    .expect("df")
}

#[test]
fn corrections_take_magnitude_and_normalize_crops() -> PolarsResult<()> {
    let corrected =
        apply_corrections(&survey(), &CorrectionColumns::default(), &crop_renames()).unwrap();

    let elevation: Vec<Option<f64>> = corrected.column("Elevation")?.f64()?.into_iter().collect();
    assert_eq!(
        elevation,
        vec![Some(120.0), Some(45.5), None, Some(0.0), Some(0.25)]
    );

    let crops: Vec<Option<&str>> = corrected.column("Crop_type")?.str()?.into_iter().collect();
    assert_eq!(
        crops,
        vec![Some("Maize"), Some("cassava"), Some("tea"), None, Some("potato")]
    );

    assert_eq!(corrected.height(), 5);
    assert_eq!(
        corrected.column("Field_ID")?.i64()?.get(4),
        Some(5),
        "untouched columns keep their values"
    );

    Ok(())
}

#[test]
fn corrected_magnitudes_are_never_negative() -> PolarsResult<()> {
    let df = df![
        "Crop_type" => &["tea", "tea", "tea", "tea"],
        "Elevation" => &[-5i64, 3, i64::MIN, -1],
    ]?;

    let corrected =
        apply_corrections(&df, &CorrectionColumns::default(), &HashMap::new()).unwrap();
    let elevation = corrected.column("Elevation")?.i64()?;
    assert!(elevation.into_iter().flatten().all(|value| value >= 0));
    assert_eq!(elevation.get(0), Some(5));

    Ok(())
}

#[test]
fn integer_columns_are_widened_and_floats_keep_their_width() -> PolarsResult<()> {
    let df = df![
        "Crop_type" => &["tea", "wheat"],
        "Elevation" => &[-7i32, 2],
        "Rainfall" => &[-1.5f32, 2.0],
    ]?;

    let corrected =
        apply_corrections(&df, &CorrectionColumns::default(), &HashMap::new()).unwrap();
    assert_eq!(corrected.column("Elevation")?.dtype(), &DataType::Int64);
    assert_eq!(corrected.column("Elevation")?.i64()?.get(0), Some(7));

    let rainfall_columns = CorrectionColumns {
        categorical: "Crop_type".to_string(),
        magnitude: "Rainfall".to_string(),
    };
    let corrected = apply_corrections(&df, &rainfall_columns, &HashMap::new()).unwrap();
    assert_eq!(corrected.column("Rainfall")?.dtype(), &DataType::Float32);
    assert_eq!(corrected.column("Rainfall")?.f32()?.get(0), Some(1.5));

    Ok(())
}

#[test]
fn corrections_are_idempotent() {
    let renames = crop_renames();
    let columns = CorrectionColumns::default();

    let once = apply_corrections(&survey(), &columns, &renames).unwrap();
    let twice = apply_corrections(&once, &columns, &renames).unwrap();

    assert!(twice.equals_missing(&once));
}

#[test]
fn missing_magnitude_column_is_a_schema_error() {
    let df = df![
        "Crop_type" => &["tea"],
        "Rainfall" => &[10.0f64],
    ]
    .expect("df");

    let err = apply_corrections(&df, &CorrectionColumns::default(), &HashMap::new()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingColumn { step: Step::Correct, ref column } if column == "Elevation"
    ));
}

#[test]
fn text_in_the_magnitude_column_is_a_type_error() {
    let df = df![
        "Crop_type" => &["tea"],
        "Elevation" => &["high"],
    ]
    .expect("df");

    let err = apply_corrections(&df, &CorrectionColumns::default(), &HashMap::new()).unwrap_err();
    match err {
        PipelineError::ColumnType {
            step,
            column,
            found,
            ..
        } => {
            assert_eq!(step, Step::Correct);
            assert_eq!(column, "Elevation");
            assert_eq!(found, DataType::String);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn numeric_categorical_column_is_a_type_error() {
    let df = df![
        "Crop_type" => &[1i64],
        "Elevation" => &[-3.0f64],
    ]
    .expect("df");

    let err = apply_corrections(&df, &CorrectionColumns::default(), &HashMap::new()).unwrap_err();
    assert!(matches!(err, PipelineError::ColumnType { ref column, .. } if column == "Crop_type"));
}
