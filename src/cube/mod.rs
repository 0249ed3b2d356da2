//! JSON-stat cube model
//!
//! A [`Dataset`] is a flat value array plus an ordered list of dimensions.
//! Dimension order defines the mixed-radix encoding of the values: the first
//! dimension varies slowest, the last one fastest. [`Dataset::data_points`]
//! inverts that encoding lazily, one cell at a time.

mod decode;

pub use decode::decode;

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Cube decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CubeError {
    /// Required structure missing or inconsistent
    #[error("malformed cube: {0}")]
    MalformedCube(String),
}

/// Result alias for cube operations
pub type CubeResult<T> = Result<T, CubeError>;

/// One coordinate value along a dimension axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    /// Position along the axis (0-based)
    pub index: usize,
    /// Category code, e.g. "MK01"
    pub code: String,
    /// Display label, e.g. "Uusimaa"
    pub label: String,
    /// Unit label for measure categories, if the cube declares one
    pub unit: Option<String>,
}

/// Dimension with its categories ordered by index.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDimension {
    /// Dimension id, e.g. "Alue"
    pub id: String,
    /// Display label
    pub label: String,
    /// Categories; `categories[i].index == i`
    pub categories: Vec<Category>,
}

impl ParsedDimension {
    /// Number of categories.
    pub fn size(&self) -> usize {
        self.categories.len()
    }

    /// Look up a category by its code.
    pub fn get_category_by_code(&self, code: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.code == code)
    }

    /// Look up a category by its index.
    pub fn get_category_by_index(&self, index: usize) -> Option<&Category> {
        self.categories.get(index)
    }
}

/// Decoded cube.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Table title
    pub label: String,
    /// Publishing organisation
    pub source: Option<String>,
    /// Last update timestamp as published
    pub updated: Option<String>,
    /// Dimensions in encoding order
    pub dimensions: Vec<ParsedDimension>,
    /// Flat observations; `None` marks a missing value
    pub values: Vec<Option<f64>>,
    /// Per-dimension cardinalities
    pub sizes: Vec<usize>,
}

impl Dataset {
    /// Find a dimension by id.
    pub fn get_dimension(&self, id: &str) -> Option<&ParsedDimension> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    /// Number of dimensions.
    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    /// Number of cells (equals `values.len()`).
    pub fn total_cells(&self) -> usize {
        self.values.len()
    }

    /// Lazily enumerate every cell with resolved coordinates.
    pub fn data_points(&self) -> DataPoints<'_> {
        DataPoints {
            dataset: self,
            strides: strides(&self.sizes),
            next: 0,
        }
    }

    /// Invert a flat index into per-dimension category indices.
    ///
    /// Coordinate `k` is `(flat / product(sizes[k+1..])) % sizes[k]`.
    pub fn coordinates_of(&self, flat: usize) -> Option<Vec<usize>> {
        if flat >= self.values.len() {
            return None;
        }
        Some(decode_flat(flat, &self.sizes, &strides(&self.sizes)))
    }

    /// Encode per-dimension category indices into a flat index.
    pub fn flat_index_of(&self, coordinates: &[usize]) -> Option<usize> {
        if coordinates.len() != self.sizes.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&coordinate, &size) in coordinates.iter().zip(&self.sizes) {
            if coordinate >= size {
                return None;
            }
            flat = flat * size + coordinate;
        }
        Some(flat)
    }

    /// Cells as JSON objects: `{<dim id>: <code>, ..., "value": <number|null>}`.
    pub fn to_records(&self) -> Vec<Value> {
        self.data_points()
            .map(|point| {
                let mut row: Map<String, Value> = point
                    .coordinates
                    .into_iter()
                    .map(|(dim, code)| (dim, Value::String(code)))
                    .collect();
                row.insert("value".to_string(), number_or_null(point.value));
                Value::Object(row)
            })
            .collect()
    }

    /// Cells with both codes and labels: `{<dim>_code, <dim>_label, "value"}`.
    pub fn to_records_with_labels(&self) -> Vec<Value> {
        self.data_points()
            .map(|point| {
                let mut row = Map::new();
                for (dim, code) in point.coordinates {
                    let label = point.labels.get(&dim).cloned().unwrap_or_default();
                    row.insert(format!("{dim}_code"), Value::String(code));
                    row.insert(format!("{dim}_label"), Value::String(label));
                }
                row.insert("value".to_string(), number_or_null(point.value));
                Value::Object(row)
            })
            .collect()
    }
}

fn number_or_null(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// `strides[k]` = product of the sizes of all later dimensions.
fn strides(sizes: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; sizes.len()];
    for k in (0..sizes.len().saturating_sub(1)).rev() {
        strides[k] = strides[k + 1].saturating_mul(sizes[k + 1]);
    }
    strides
}

fn decode_flat(flat: usize, sizes: &[usize], strides: &[usize]) -> Vec<usize> {
    sizes
        .iter()
        .zip(strides)
        .map(|(&size, &stride)| (flat / stride) % size.max(1))
        .collect()
}

/// One cell of a [`Dataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Observation, `None` when missing
    pub value: Option<f64>,
    /// Dimension id to category code
    pub coordinates: BTreeMap<String, String>,
    /// Dimension id to category label
    pub labels: BTreeMap<String, String>,
}

impl DataPoint {
    /// Whether the observation is missing.
    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    /// Category code along a dimension.
    pub fn code(&self, dimension_id: &str) -> Option<&str> {
        self.coordinates.get(dimension_id).map(String::as_str)
    }

    /// Category label along a dimension.
    pub fn label(&self, dimension_id: &str) -> Option<&str> {
        self.labels.get(dimension_id).map(String::as_str)
    }
}

/// Lazy cell iterator returned by [`Dataset::data_points`].
#[derive(Debug, Clone)]
pub struct DataPoints<'a> {
    dataset: &'a Dataset,
    strides: Vec<usize>,
    next: usize,
}

impl Iterator for DataPoints<'_> {
    type Item = DataPoint;

    fn next(&mut self) -> Option<DataPoint> {
        let dataset = self.dataset;
        let value = *dataset.values.get(self.next)?;
        let indices = decode_flat(self.next, &dataset.sizes, &self.strides);
        self.next += 1;

        let mut coordinates = BTreeMap::new();
        let mut labels = BTreeMap::new();
        for (dimension, index) in dataset.dimensions.iter().zip(indices) {
            if let Some(category) = dimension.get_category_by_index(index) {
                coordinates.insert(dimension.id.clone(), category.code.clone());
                labels.insert(dimension.id.clone(), category.label.clone());
            }
        }

        Some(DataPoint {
            value,
            coordinates,
            labels,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.values.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DataPoints<'_> {}
