//! PxWeb table query builder

use serde::{Deserialize, Serialize};

/// Response format requested by default.
pub const JSON_STAT2: &str = "json-stat2";

/// Wildcard selecting every value of a dimension.
pub const SELECT_ALL: &str = "*";

/// Body of a PxWeb table POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableQuery {
    /// Per-dimension selections, in caller order
    pub query: Vec<DimensionSelection>,
    /// Requested output format
    pub response: ResponseFormat,
}

/// Selection for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSelection {
    /// Dimension code, e.g. "Vuosi"
    pub code: String,
    /// Filter and values
    pub selection: Selection,
}

/// Filter kind with its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// `item` lists values, `all` matches a wildcard
    pub filter: SelectionFilter,
    /// Selected value codes
    pub values: Vec<String>,
}

/// PxWeb selection filters used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionFilter {
    /// Explicit value codes
    Item,
    /// Wildcard
    All,
}

/// Output format wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Format name, e.g. "json-stat2"
    pub format: String,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self {
            format: JSON_STAT2.to_string(),
        }
    }
}

impl Default for TableQuery {
    fn default() -> Self {
        Self::select_all()
    }
}

impl TableQuery {
    /// Query without selections: PxWeb returns every value of every dimension.
    pub fn select_all() -> Self {
        Self {
            query: Vec::new(),
            response: ResponseFormat::default(),
        }
    }

    /// Start building a query.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Build from `(dimension, values)` pairs, preserving their order.
    pub fn from_selections<I, K, V>(selections: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        selections
            .into_iter()
            .fold(QueryBuilder::default(), |builder, (code, values)| {
                builder.dimension(code, values)
            })
            .build()
    }
}

/// Incremental [`TableQuery`] builder.
///
/// ```
/// use statfin_ingest::catalog::{SelectionFilter, TableQuery};
///
/// let query = TableQuery::builder()
///     .dimension("Vuosi", ["2022", "2023"])
///     .dimension("Alue", ["*"])
///     .build();
/// assert_eq!(query.query[0].selection.filter, SelectionFilter::Item);
/// assert_eq!(query.query[1].selection.filter, SelectionFilter::All);
/// assert_eq!(query.response.format, "json-stat2");
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    selections: Vec<DimensionSelection>,
    format: Option<String>,
}

impl QueryBuilder {
    /// Select values of a dimension. `["*"]` selects all of them.
    pub fn dimension<V>(mut self, code: impl Into<String>, values: V) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let filter = if values.len() == 1 && values[0] == SELECT_ALL {
            SelectionFilter::All
        } else {
            SelectionFilter::Item
        };
        self.selections.push(DimensionSelection {
            code: code.into(),
            selection: Selection { filter, values },
        });
        self
    }

    /// Override the response format.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Finish the query.
    pub fn build(self) -> TableQuery {
        TableQuery {
            query: self.selections,
            response: self
                .format
                .map(|format| ResponseFormat { format })
                .unwrap_or_default(),
        }
    }
}
