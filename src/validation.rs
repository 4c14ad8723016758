//! Schema validation: turns a raw table into a typed `Dataset`

use crate::config::{MetricType, NanPolicy};
use crate::dataset::{is_missing_token, DataSchema, Dataset, RawTable};
use crate::error::{Result, ValidationError};

/// Tables smaller than this are analysed but logged as suspicious
pub const MIN_ROWS_WARNING: usize = 100;

fn parse_error(col: &str, row: usize, cell: &str) -> ValidationError {
    ValidationError::new(
        "parse_error",
        format!("Column '{}' holds a non-numeric value", col),
        format!("Row {} of column '{}' could not be read as a number: '{}'", row + 1, col, cell),
        "Clean the column or mark missing values as NA",
    )
}

fn nan_in_metric(col: &str) -> ValidationError {
    ValidationError::new(
        "nan_in_metric",
        "Metric contains missing values",
        format!("Column '{}' contains missing values", col),
        "Use nan_policy 'drop' or 'zero', or clean the data",
    )
}

/// Numeric cells; missing tokens become `None`
fn numeric_column(table: &RawTable, col: &str) -> Result<Vec<Option<f64>>> {
    let cells = table.column(col).ok_or_else(|| ValidationError::missing_column(col))?;
    cells
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            if is_missing_token(cell) {
                return Ok(None);
            }
            match cell.trim().parse::<f64>() {
                Ok(v) if v.is_nan() => Ok(None),
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(parse_error(col, row, cell).into()),
            }
        })
        .collect()
}

fn label_column(table: &RawTable, col: &str) -> Result<Vec<Option<String>>> {
    let cells = table.column(col).ok_or_else(|| ValidationError::missing_column(col))?;
    Ok(cells
        .iter()
        .map(|c| if is_missing_token(c) { None } else { Some(c.trim().to_string()) })
        .collect())
}

/// Check column presence, apply the nan policy and build the dataset.
///
/// Required columns (group, metric, optional user id and pre-period) must
/// exist and not be entirely missing. Rows without a group label are
/// dropped. Segment columns absent from the table are skipped with a warning.
pub fn validate_table(
    table: &RawTable,
    schema: &DataSchema,
    nan_policy: NanPolicy,
    segment_cols: &[String],
) -> Result<Dataset> {
    for col in schema.required_columns() {
        let cells = table.column(col).ok_or_else(|| ValidationError::missing_column(col))?;
        if cells.iter().all(|c| is_missing_token(c)) {
            return Err(ValidationError::empty_column(col).into());
        }
    }

    if table.len() < MIN_ROWS_WARNING {
        tracing::warn!(rows = table.len(), "table has only {} rows", table.len());
    }

    let groups = label_column(table, &schema.group_col)?;
    let mut metric = numeric_column(table, &schema.metric_col)?;
    let pre = match &schema.preperiod_metric_col {
        Some(col) => Some((col.as_str(), numeric_column(table, col)?)),
        None => None,
    };
    let users = match &schema.user_id {
        Some(col) => Some(label_column(table, col)?),
        None => None,
    };
    let mut segments = Vec::new();
    for col in segment_cols {
        if table.column_index(col).is_some() {
            segments.push((col.as_str(), label_column(table, col)?));
        } else {
            tracing::warn!(column = %col, "segment column not found, skipping");
        }
    }

    let missing = metric.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        match nan_policy {
            NanPolicy::Error => return Err(nan_in_metric(&schema.metric_col).into()),
            NanPolicy::Drop => tracing::info!("dropping {} rows with a missing metric", missing),
            NanPolicy::Zero => {
                tracing::info!("filling {} missing metric values with zero", missing);
                for v in metric.iter_mut().filter(|v| v.is_none()) {
                    *v = Some(0.0);
                }
            }
        }
    }

    let unlabeled = groups.iter().filter(|g| g.is_none()).count();
    if unlabeled > 0 {
        tracing::info!("dropping {} rows without a group label", unlabeled);
    }

    let keep: Vec<usize> = (0..table.len())
        .filter(|&i| groups[i].is_some() && metric[i].is_some())
        .collect();

    let mut ds = Dataset::new(
        keep.iter().filter_map(|&i| groups[i].clone()).collect(),
        keep.iter().filter_map(|&i| metric[i]).collect(),
    )?;
    if let Some((col, values)) = pre {
        ds = ds.with_covariate(col, keep.iter().map(|&i| values[i]).collect())?;
    }
    for (col, values) in segments {
        ds = ds.with_segment(col, keep.iter().map(|&i| values[i].clone()).collect())?;
    }
    if let Some(ids) = users {
        ds = ds.with_user_ids(keep.iter().map(|&i| ids[i].clone().unwrap_or_default()).collect())?;
        let crossed = ds.cross_group_users();
        if !crossed.is_empty() {
            tracing::warn!(users = crossed.len(), example = %crossed[0], "users appear in more than one group");
        }
    }

    tracing::debug!(rows = ds.len(), groups = ?ds.group_labels(), "table validated");
    Ok(ds)
}

/// Binomial when every value is 0 or 1, otherwise continuous
pub fn infer_metric_type(dataset: &Dataset) -> MetricType {
    if dataset.metric.iter().all(|&v| v == 0.0 || v == 1.0) {
        MetricType::Binomial
    } else {
        MetricType::Continuous
    }
}
