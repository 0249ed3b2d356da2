use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{Category, CubeError, CubeResult, Dataset, ParsedDimension};

/// Decode a JSON-stat2 document into a [`Dataset`].
///
/// Fails with [`CubeError::MalformedCube`] when `id`, `dimension` or `value`
/// is missing, or when the value count does not match the dimension sizes.
/// A dimension listed in `id` but absent from `dimension` is logged and
/// skipped.
pub fn decode(raw: &Value) -> CubeResult<Dataset> {
    let doc = raw
        .as_object()
        .ok_or_else(|| malformed("document is not a JSON object"))?;

    let ids = doc
        .get("id")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing 'id' list"))?;
    let dimension_map = doc
        .get("dimension")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing 'dimension' map"))?;
    let raw_values = doc
        .get("value")
        .ok_or_else(|| malformed("missing 'value' array"))?;
    let declared_sizes: Option<Vec<u64>> = doc
        .get("size")
        .and_then(Value::as_array)
        .map(|sizes| sizes.iter().filter_map(Value::as_u64).collect());

    let mut dimensions = Vec::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        let id = id
            .as_str()
            .ok_or_else(|| malformed(format!("dimension id at position {position} is not a string")))?;

        let Some(raw_dimension) = dimension_map.get(id) else {
            warn!(dimension = %id, "Dimension listed in 'id' is missing from 'dimension'; skipping");
            continue;
        };

        let dimension = parse_dimension(id, raw_dimension)?;
        if let Some(declared) = declared_sizes.as_ref().and_then(|s| s.get(position)) {
            if *declared != dimension.size() as u64 {
                return Err(malformed(format!(
                    "dimension '{id}' declares size {declared} but has {} categories",
                    dimension.size()
                )));
            }
        }
        dimensions.push(dimension);
    }

    let sizes: Vec<usize> = dimensions.iter().map(ParsedDimension::size).collect();
    let cells = sizes
        .iter()
        .try_fold(1usize, |acc, &size| acc.checked_mul(size))
        .ok_or_else(|| malformed("cube dimensions overflow"))?;

    let values = parse_values(raw_values, cells)?;

    debug!(
        dimensions = dimensions.len(),
        cells,
        "Decoded JSON-stat cube"
    );

    Ok(Dataset {
        label: optional_str(doc, "label").unwrap_or_default(),
        source: optional_str(doc, "source"),
        updated: optional_str(doc, "updated"),
        dimensions,
        values,
        sizes,
    })
}

fn parse_dimension(id: &str, raw: &Value) -> CubeResult<ParsedDimension> {
    let label = raw
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or(id)
        .to_string();
    let category = raw
        .get("category")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed(format!("dimension '{id}' has no category map")))?;
    let labels = category.get("label").and_then(Value::as_object);
    let units = category.get("unit").and_then(Value::as_object);

    let mut indexed: Vec<(String, u64)> = match category.get("index") {
        Some(Value::Object(index)) => index
            .iter()
            .map(|(code, position)| {
                position
                    .as_u64()
                    .map(|position| (code.clone(), position))
                    .ok_or_else(|| {
                        malformed(format!("dimension '{id}' category '{code}' has a non-numeric index"))
                    })
            })
            .collect::<CubeResult<_>>()?,
        Some(Value::Array(codes)) => codes
            .iter()
            .zip(0u64..)
            .map(|(code, position)| {
                code.as_str()
                    .map(|code| (code.to_string(), position))
                    .ok_or_else(|| malformed(format!("dimension '{id}' has a non-string category code")))
            })
            .collect::<CubeResult<_>>()?,
        None => match labels {
            // A single-category dimension may omit its index.
            Some(labels) if labels.len() == 1 => labels.keys().map(|code| (code.clone(), 0)).collect(),
            _ => return Err(malformed(format!("dimension '{id}' has no category index"))),
        },
        Some(_) => return Err(malformed(format!("dimension '{id}' has an invalid category index"))),
    };

    indexed.sort_by_key(|(_, position)| *position);

    let mut seen = HashSet::with_capacity(indexed.len());
    let mut categories = Vec::with_capacity(indexed.len());
    for (expected, (code, position)) in indexed.into_iter().enumerate() {
        if position != expected as u64 {
            return Err(malformed(format!(
                "dimension '{id}' category indices are not contiguous (found {position}, expected {expected})"
            )));
        }
        if !seen.insert(code.clone()) {
            return Err(malformed(format!("dimension '{id}' repeats category '{code}'")));
        }

        let category_label = labels
            .and_then(|l| l.get(&code))
            .and_then(Value::as_str)
            .unwrap_or(&code)
            .to_string();
        let unit = units
            .and_then(|u| u.get(&code))
            .and_then(|u| u.get("label"))
            .and_then(Value::as_str)
            .map(str::to_string);

        categories.push(Category {
            index: expected,
            code,
            label: category_label,
            unit,
        });
    }

    Ok(ParsedDimension {
        id: id.to_string(),
        label,
        categories,
    })
}

fn parse_values(raw: &Value, cells: usize) -> CubeResult<Vec<Option<f64>>> {
    match raw {
        Value::Array(entries) => {
            if entries.len() != cells {
                return Err(malformed(format!(
                    "'value' has {} entries but dimensions imply {cells}",
                    entries.len()
                )));
            }
            Ok(entries.iter().map(coerce_number).collect())
        }
        // Sparse form: {"<flat index>": value}
        Value::Object(entries) => {
            let mut values = vec![None; cells];
            for (key, entry) in entries {
                let position = key
                    .parse::<usize>()
                    .ok()
                    .filter(|p| *p < cells)
                    .ok_or_else(|| malformed(format!("sparse value key '{key}' is out of range")))?;
                values[position] = coerce_number(entry);
            }
            Ok(values)
        }
        _ => Err(malformed("'value' is neither an array nor an object")),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn optional_str(doc: &Map<String, Value>, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_string)
}

fn malformed(message: impl Into<String>) -> CubeError {
    CubeError::MalformedCube(message.into())
}
