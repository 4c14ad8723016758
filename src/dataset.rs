//! Column roles, raw CSV tables and the validated columnar dataset

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Cell values read as missing
pub const MISSING_TOKENS: [&str; 5] = ["", "NA", "NaN", "null", "None"];

pub fn is_missing_token(cell: &str) -> bool {
    let cell = cell.trim();
    MISSING_TOKENS.iter().any(|t| cell.eq_ignore_ascii_case(t))
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Maps logical roles to physical column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSchema {
    pub group_col: String,
    pub metric_col: String,
    #[serde(default)]
    pub preperiod_metric_col: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl DataSchema {
    pub fn new(group_col: &str, metric_col: &str) -> Self {
        DataSchema {
            group_col: group_col.to_string(),
            metric_col: metric_col.to_string(),
            preperiod_metric_col: None,
            user_id: None,
        }
    }

    pub fn with_preperiod(mut self, col: &str) -> Self {
        self.preperiod_metric_col = Some(col.to_string());
        self
    }

    pub fn with_user_id(mut self, col: &str) -> Self {
        self.user_id = Some(col.to_string());
        self
    }

    /// Columns that must exist and hold at least one value
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.group_col.as_str(), self.metric_col.as_str()];
        if let Some(u) = &self.user_id {
            cols.push(u);
        }
        if let Some(p) = &self.preperiod_metric_col {
            cols.push(p);
        }
        cols
    }
}

// ============================================================================
// RAW TABLE
// ============================================================================

/// Untyped table as read from CSV; short rows read as missing cells
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(RawTable { headers, rows })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cells of a column, `""` where a row is too short
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.get(idx).map(String::as_str).unwrap_or("")).collect())
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// Validated rows in columnar form: one group label and one metric value
/// per row, plus optional numeric covariates and segment labels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub groups: Vec<String>,
    pub metric: Vec<f64>,
    pub covariates: BTreeMap<String, Vec<Option<f64>>>,
    pub segments: BTreeMap<String, Vec<Option<String>>>,
    /// Unit identifiers, used to detect users exposed to both groups
    pub user_ids: Option<Vec<String>>,
}

fn length_mismatch(what: &str, got: usize, want: usize) -> ValidationError {
    ValidationError::new(
        "length_mismatch",
        format!("Column '{}' has the wrong length", what),
        format!("Column '{}' has {} values but the dataset has {} rows", what, got, want),
        "Make every column the same length as the group column",
    )
}

impl Dataset {
    pub fn new(groups: Vec<String>, metric: Vec<f64>) -> Result<Self> {
        if groups.len() != metric.len() {
            return Err(length_mismatch("metric", metric.len(), groups.len()).into());
        }
        Ok(Dataset { groups, metric, ..Default::default() })
    }

    pub fn with_covariate(mut self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        if values.len() != self.len() {
            return Err(length_mismatch(name, values.len(), self.len()).into());
        }
        self.covariates.insert(name.to_string(), values);
        Ok(self)
    }

    pub fn with_segment(mut self, name: &str, values: Vec<Option<String>>) -> Result<Self> {
        if values.len() != self.len() {
            return Err(length_mismatch(name, values.len(), self.len()).into());
        }
        self.segments.insert(name.to_string(), values);
        Ok(self)
    }

    pub fn with_user_ids(mut self, ids: Vec<String>) -> Result<Self> {
        if ids.len() != self.len() {
            return Err(length_mismatch("user_id", ids.len(), self.len()).into());
        }
        self.user_ids = Some(ids);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Distinct group labels in order of first appearance
    pub fn group_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for g in &self.groups {
            if !labels.contains(g) {
                labels.push(g.clone());
            }
        }
        labels
    }

    /// Row indices belonging to `label`
    pub fn group_indices(&self, label: &str) -> Vec<usize> {
        self.groups.iter().enumerate().filter(|(_, g)| g.as_str() == label).map(|(i, _)| i).collect()
    }

    pub fn covariate(&self, name: &str) -> Option<&[Option<f64>]> {
        self.covariates.get(name).map(Vec::as_slice)
    }

    /// Row indices per segment value, sorted by value; rows with a missing label are left out
    pub fn segment_groups(&self, column: &str) -> Option<BTreeMap<String, Vec<usize>>> {
        let values = self.segments.get(column)?;
        let mut out: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, v) in values.iter().enumerate() {
            if let Some(v) = v {
                out.entry(v.clone()).or_default().push(i);
            }
        }
        Some(out)
    }

    /// User ids that appear under more than one group label, sorted.
    /// Empty ids and datasets without ids yield nothing.
    pub fn cross_group_users(&self) -> Vec<String> {
        let Some(ids) = &self.user_ids else {
            return Vec::new();
        };
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        let mut crossed: BTreeSet<String> = BTreeSet::new();
        for (id, group) in ids.iter().zip(&self.groups) {
            if id.is_empty() {
                continue;
            }
            match seen.get(id.as_str()) {
                Some(&first) if first != group.as_str() => {
                    crossed.insert(id.clone());
                }
                Some(_) => {}
                None => {
                    seen.insert(id.as_str(), group.as_str());
                }
            }
        }
        crossed.into_iter().collect()
    }

    /// New dataset holding only the given rows, in the given order
    pub fn subset(&self, rows: &[usize]) -> Dataset {
        let pick = |v: &Vec<Option<f64>>| rows.iter().map(|&i| v[i]).collect::<Vec<_>>();
        Dataset {
            groups: rows.iter().map(|&i| self.groups[i].clone()).collect(),
            metric: rows.iter().map(|&i| self.metric[i]).collect(),
            covariates: self.covariates.iter().map(|(k, v)| (k.clone(), pick(v))).collect(),
            segments: self
                .segments
                .iter()
                .map(|(k, v)| (k.clone(), rows.iter().map(|&i| v[i].clone()).collect()))
                .collect(),
            user_ids: self.user_ids.as_ref().map(|ids| rows.iter().map(|&i| ids[i].clone()).collect()),
        }
    }
}
