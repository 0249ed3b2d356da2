//! Parsing of listing and metadata responses

use serde::Deserialize;
use serde_json::Value;

use super::{NodeKind, TableMetadata, TableNode, TableVariable, VariableValue};
use crate::client::{ClientError, ClientResult};

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(rename = "type", default = "default_node_type")]
    kind: String,
}

fn default_node_type() -> String {
    "l".to_string()
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    title: String,
    #[serde(default)]
    variables: Vec<RawVariable>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariable {
    code: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    value_texts: Vec<String>,
    #[serde(default)]
    elimination: bool,
    #[serde(default)]
    time: bool,
}

/// Split a catalog path into non-empty segments.
pub(crate) fn path_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a listing response fetched from `path`.
pub fn parse_listing(body: Value, path: &str) -> ClientResult<Vec<TableNode>> {
    let raw: Vec<RawNode> = serde_json::from_value(body)
        .map_err(|e| ClientError::InvalidBody(format!("listing at '{path}': {e}")))?;
    let parent = path_segments(path);

    Ok(raw
        .into_iter()
        .map(|node| {
            let mut node_path = parent.clone();
            node_path.push(node.id.clone());
            TableNode {
                id: node.id,
                text: node.text,
                kind: NodeKind::from_code(&node.kind),
                path: node_path,
            }
        })
        .collect())
}

/// Parse a metadata response for `table_path`. Missing value texts fall back
/// to the value code.
pub fn parse_metadata(body: Value, table_path: &str) -> ClientResult<TableMetadata> {
    let raw: RawMetadata = serde_json::from_value(body)
        .map_err(|e| ClientError::InvalidBody(format!("metadata for '{table_path}': {e}")))?;

    let variables = raw
        .variables
        .into_iter()
        .map(|var| {
            let values = var
                .values
                .iter()
                .enumerate()
                .map(|(i, code)| VariableValue {
                    code: code.clone(),
                    text: var.value_texts.get(i).cloned().unwrap_or_else(|| code.clone()),
                })
                .collect();
            TableVariable {
                code: var.code,
                text: var.text,
                values,
                elimination: var.elimination,
                time: var.time,
            }
        })
        .collect();

    Ok(TableMetadata {
        table_id: table_path.trim_matches('/').to_string(),
        title: raw.title,
        variables,
        source: raw.source,
        updated: raw.updated,
    })
}
