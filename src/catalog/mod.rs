//! Catalog browser
//!
//! Walks the PxWeb folder hierarchy, reads table metadata and posts table
//! queries, all through the retrying [`PxWebClient`].

mod parser;
mod query;

pub use parser::{parse_listing, parse_metadata};
pub use query::{
    DimensionSelection, QueryBuilder, ResponseFormat, Selection, SelectionFilter, TableQuery,
    JSON_STAT2, SELECT_ALL,
};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{ClientError, ClientResult, PxWebClient};

/// Kind of a listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Folder ("l")
    Folder,
    /// Table ("t")
    Table,
}

impl NodeKind {
    /// Map the PxWeb `type` code. Anything but "t" is browsable as a folder.
    pub fn from_code(code: &str) -> Self {
        if code == "t" {
            NodeKind::Table
        } else {
            NodeKind::Folder
        }
    }
}

/// One entry of a catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableNode {
    /// Entry id, e.g. "statfin_vaerak_pxt_11ra.px"
    pub id: String,
    /// Display text
    pub text: String,
    /// Folder or table
    pub kind: NodeKind,
    /// Path segments from the API root, ending with `id`
    pub path: Vec<String>,
}

impl TableNode {
    /// Whether this entry is a table.
    pub fn is_table(&self) -> bool {
        self.kind == NodeKind::Table
    }

    /// Whether this entry is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Path joined with `/`, usable with [`Catalog::list`] or [`Catalog::metadata`].
    pub fn full_path(&self) -> String {
        self.path.join("/")
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    /// Table path the metadata was read from
    pub table_id: String,
    /// Table title
    pub title: String,
    /// Variables (dimensions) in table order
    pub variables: Vec<TableVariable>,
    /// Publishing organisation
    pub source: Option<String>,
    /// Last update timestamp as published
    pub updated: Option<String>,
}

impl TableMetadata {
    /// Variable by code.
    pub fn get_variable(&self, code: &str) -> Option<&TableVariable> {
        self.variables.iter().find(|v| v.code == code)
    }

    /// The variable flagged as time, if any.
    pub fn time_variable(&self) -> Option<&TableVariable> {
        self.variables.iter().find(|v| v.time)
    }
}

/// One table variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableVariable {
    /// Variable code
    pub code: String,
    /// Display text
    pub text: String,
    /// Available values
    pub values: Vec<VariableValue>,
    /// May be omitted from a query
    pub elimination: bool,
    /// Time variable
    pub time: bool,
}

/// Value code with display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableValue {
    /// Value code
    pub code: String,
    /// Display text
    pub text: String,
}

/// Catalog operations over a [`PxWebClient`].
#[derive(Debug, Clone)]
pub struct Catalog {
    client: PxWebClient,
}

impl Catalog {
    /// Wrap a client.
    pub fn new(client: PxWebClient) -> Self {
        Self { client }
    }

    /// Underlying client.
    pub fn client(&self) -> &PxWebClient {
        &self.client
    }

    /// List folders and tables under `path` ("" for the root).
    pub async fn list(&self, path: &str) -> ClientResult<Vec<TableNode>> {
        debug!(path = %path, "Listing catalog");
        let body = self.client.get(path).await?;
        parse_listing(body, path)
    }

    /// Read metadata of a table.
    pub async fn metadata(&self, table_path: &str) -> ClientResult<TableMetadata> {
        debug!(table = %table_path, "Fetching table metadata");
        let body = self.client.get(table_path).await?;
        parse_metadata(body, table_path)
    }

    /// Post a query and return the raw cube document.
    pub async fn query(&self, table_path: &str, query: &TableQuery) -> ClientResult<Value> {
        let body = serde_json::to_value(query)
            .map_err(|e| ClientError::InvalidBody(format!("failed to encode query: {e}")))?;
        debug!(table = %table_path, dimensions = query.query.len(), "Querying table");
        self.client.post(table_path, &body).await
    }
}
