use serde_json::Value;
use thiserror::Error;

/// Reasons a request body cannot be turned into a [`FeatureBatch`].
#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("expected an array of numbers or an array of arrays of numbers, got {0}")]
    NotAnArray(&'static str),

    #[error("feature array is empty")]
    Empty,

    #[error("row {0} has no features")]
    EmptyRow(usize),

    #[error("feature at row {row}, column {col} is {kind}, not a number")]
    NonNumeric {
        row: usize,
        col: usize,
        kind: &'static str,
    },

    #[error("invalid shape: row {0} is nested deeper than 2 dimensions")]
    TooDeep(usize),

    #[error("invalid shape: cannot mix numbers and rows at the top level")]
    Mixed,

    #[error("invalid shape: item {index} is {kind}, expected a row of numbers")]
    NotARow { index: usize, kind: &'static str },

    #[error("invalid shape: row {row} has {found} features, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("model expects {expected} features, got {found}")]
    FeatureCount { expected: usize, found: usize },

    #[error("malformed JSON body: {0}")]
    Malformed(String),
}

/// A rectangular `(rows, cols)` matrix of samples by features, stored row-major.
///
/// Both dimensions are at least one and every row has `cols` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBatch {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl FeatureBatch {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn n_samples(&self) -> usize {
        self.rows
    }

    pub fn n_features(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.cols)
    }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.rows().flatten().map(|v| *v as f32).collect()
    }

    fn single(values: &[Value]) -> Result<Self, ShapeError> {
        let data = parse_row(0, values)?;
        Ok(FeatureBatch {
            cols: data.len(),
            rows: 1,
            data,
        })
    }

    fn batch(rows: &[Value]) -> Result<Self, ShapeError> {
        let mut data = Vec::new();
        let mut cols = 0;
        for (index, row) in rows.iter().enumerate() {
            let values = row.as_array().ok_or(ShapeError::Mixed)?;
            let parsed = parse_row(index, values)?;
            if index == 0 {
                cols = parsed.len();
            } else if parsed.len() != cols {
                return Err(ShapeError::Ragged {
                    row: index,
                    expected: cols,
                    found: parsed.len(),
                });
            }
            data.extend(parsed);
        }
        Ok(FeatureBatch {
            data,
            rows: rows.len(),
            cols,
        })
    }
}

impl TryFrom<&Value> for FeatureBatch {
    type Error = ShapeError;

    /// Accepts `[f1, .., fn]` as a single `(1, n)` sample and `[[f1, .., fn], ..]`
    /// as an `(m, n)` batch. Every other shape is rejected.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let items = value
            .as_array()
            .ok_or_else(|| ShapeError::NotAnArray(kind_of(value)))?;
        if items.is_empty() {
            return Err(ShapeError::Empty);
        }

        let nested = items.iter().filter(|item| item.is_array()).count();
        if nested == 0 {
            FeatureBatch::single(items)
        } else if nested == items.len() {
            FeatureBatch::batch(items)
        } else if items.iter().any(Value::is_number) {
            Err(ShapeError::Mixed)
        } else {
            // Rows next to strings, nulls or objects: report the first offender.
            let index = items.iter().position(|item| !item.is_array()).unwrap_or(0);
            Err(ShapeError::NotARow {
                index,
                kind: kind_of(&items[index]),
            })
        }
    }
}

fn parse_row(row: usize, values: &[Value]) -> Result<Vec<f64>, ShapeError> {
    if values.is_empty() {
        return Err(if row == 0 {
            ShapeError::Empty
        } else {
            ShapeError::EmptyRow(row)
        });
    }
    values
        .iter()
        .enumerate()
        .map(|(col, value)| match value {
            Value::Array(_) => Err(ShapeError::TooDeep(row)),
            other => other.as_f64().ok_or(ShapeError::NonNumeric {
                row,
                col,
                kind: kind_of(other),
            }),
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
