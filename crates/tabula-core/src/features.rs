//! Feature encoding for the churn classifier
//!
//! Turns a cleaned table into a numeric [`FeatureMatrix`] and a 0/1
//! [`LabelVector`]. Numeric columns pass through unchanged; categorical columns
//! are one-hot encoded with the lexically first value dropped as the reference
//! level. The fitted [`FeatureLayout`] encodes later records the same way.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ColumnType, Record, Table, Value};

/// Dense row-major matrix of features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::config(format!(
                "Matrix data has {} values, expected {} x {}",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from equal-width rows
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::config(format!(
                    "Row {} has {} features, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// Iterate rows in order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Copy out the given rows, in the order given
    pub fn select(&self, indices: &[usize]) -> FeatureMatrix {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        FeatureMatrix {
            rows: indices.len(),
            cols: self.cols,
            data,
        }
    }
}

/// One 0/1 label per matrix row
pub type LabelVector = Vec<u8>;

/// Labels for the given rows, in the order given
pub fn select_labels(labels: &[u8], indices: &[usize]) -> LabelVector {
    indices.iter().map(|&i| labels[i]).collect()
}

/// What the encoder reads from the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub label_column: String,
    /// Label text that encodes as 1
    pub positive_value: String,
    /// Identifier columns that never become features
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl EncoderConfig {
    pub fn new(label_column: impl Into<String>, positive_value: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
            positive_value: positive_value.into(),
            exclude: vec![],
        }
    }

    pub fn exclude(mut self, column: impl Into<String>) -> Self {
        self.exclude.push(column.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct NumericFeature {
    column: usize,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct CategoricalFeature {
    column: usize,
    name: String,
    /// Sorted; the first is the dropped reference level
    levels: Vec<String>,
}

/// Column order fitted by [`FeatureEncoder::encode`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureLayout {
    numeric: Vec<NumericFeature>,
    categorical: Vec<CategoricalFeature>,
    names: Vec<String>,
}

impl FeatureLayout {
    /// Feature names in matrix column order
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Encode one record of the table the layout was fitted on
    ///
    /// Returns None when a feature value is missing. A category not seen
    /// during fitting encodes as the reference level.
    pub fn transform(&self, record: &Record) -> Option<Vec<f64>> {
        let mut row = Vec::with_capacity(self.width());

        for feature in &self.numeric {
            row.push(record.get(feature.column)?.as_f64()?);
        }

        for feature in &self.categorical {
            let value = record.get(feature.column)?;
            if value.is_missing() {
                return None;
            }
            let text = value.to_string();
            row.extend(
                feature.levels[1..]
                    .iter()
                    .map(|level| if *level == text { 1.0 } else { 0.0 }),
            );
        }

        Some(row)
    }
}

/// Encoder output
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub matrix: FeatureMatrix,
    pub labels: LabelVector,
    pub layout: FeatureLayout,
    /// Source row index of each matrix row
    pub kept_rows: Vec<usize>,
    /// Source rows dropped for a missing label or feature value
    pub excluded_rows: Vec<usize>,
}

impl EncodedDataset {
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

pub struct FeatureEncoder {
    config: EncoderConfig,
}

impl FeatureEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Fit the layout on `table` and encode every complete row
    pub fn encode(&self, table: &Table) -> Result<EncodedDataset> {
        let schema = table.schema();
        let label_idx = schema.require(&self.config.label_column)?;
        let excluded = self
            .config
            .exclude
            .iter()
            .map(|c| schema.require(c))
            .collect::<Result<Vec<usize>>>()?;

        let is_feature = |idx: usize| idx != label_idx && !excluded.contains(&idx);

        let numeric: Vec<NumericFeature> = schema
            .of_type(ColumnType::Numeric)
            .filter(|(idx, _)| is_feature(*idx))
            .map(|(idx, c)| NumericFeature {
                column: idx,
                name: c.name.clone(),
            })
            .collect();
        let categorical_columns: Vec<(usize, String)> = schema
            .of_type(ColumnType::Categorical)
            .filter(|(idx, _)| is_feature(*idx))
            .map(|(idx, c)| (idx, c.name.clone()))
            .collect();

        let feature_columns: Vec<usize> = numeric
            .iter()
            .map(|f| f.column)
            .chain(categorical_columns.iter().map(|(idx, _)| *idx))
            .collect();

        let mut kept_rows = Vec::new();
        let mut excluded_rows = Vec::new();
        for (i, row) in table.rows().iter().enumerate() {
            let complete = !row[label_idx].is_missing()
                && feature_columns.iter().all(|&c| !row[c].is_missing());
            if complete {
                kept_rows.push(i);
            } else {
                excluded_rows.push(i);
            }
        }

        if kept_rows.is_empty() {
            return Err(Error::EmptyInput(
                "No complete rows to encode".to_string(),
            ));
        }

        // Levels come from kept rows only
        let categorical: Vec<CategoricalFeature> = categorical_columns
            .into_iter()
            .map(|(column, name)| {
                let levels: BTreeSet<String> = kept_rows
                    .iter()
                    .map(|&i| table.rows()[i][column].to_string())
                    .collect();
                CategoricalFeature {
                    column,
                    name,
                    levels: levels.into_iter().collect(),
                }
            })
            .collect();

        let names: Vec<String> = numeric
            .iter()
            .map(|f| f.name.clone())
            .chain(categorical.iter().flat_map(|f| {
                f.levels[1..]
                    .iter()
                    .map(move |level| format!("{}_{}", f.name, level))
            }))
            .collect();

        let layout = FeatureLayout {
            numeric,
            categorical,
            names,
        };

        let mut data = Vec::with_capacity(kept_rows.len() * layout.width());
        let mut labels = Vec::with_capacity(kept_rows.len());
        for &i in &kept_rows {
            let row = &table.rows()[i];
            let encoded = layout.transform(row).ok_or_else(|| {
                Error::InvalidData(format!("Row {} has a non-numeric feature value", i))
            })?;
            data.extend(encoded);
            labels.push(self.label(&row[label_idx]));
        }

        let matrix = FeatureMatrix::new(kept_rows.len(), layout.width(), data)?;

        debug!(
            rows = matrix.nrows(),
            features = matrix.ncols(),
            excluded = excluded_rows.len(),
            "Encoded feature matrix"
        );

        Ok(EncodedDataset {
            matrix,
            labels,
            layout,
            kept_rows,
            excluded_rows,
        })
    }

    fn label(&self, value: &Value) -> u8 {
        u8::from(value.to_string() == self.config.positive_value)
    }
}
