//! Dimension normalizer
//!
//! Turns a decoded [`Dataset`] into [`NormalizedRecord`]s keyed by
//! year/quarter/month, region and industry. Dimension roles are inferred by
//! matching dimension ids and labels against [`ROLE_VOCABULARIES`].

mod codes;
mod time;

pub use codes::{normalize_industry_code, normalize_region_code, WHOLE_COUNTRY_CODE};
pub use time::{parse_time_code, ParsedTime, TimePeriod};

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::cube::{DataPoint, Dataset};
use crate::NormalizedRecord;

/// Per-record normalization failures. The record is dropped, the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// No four-digit year anywhere in the time code
    #[error("unresolvable time code '{0}'")]
    UnresolvableTimeCode(String),

    /// Neither a time dimension nor a fallback year dimension is present
    #[error("could not determine year")]
    MissingYear,
}

/// Result alias for normalization
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Semantic role of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionRole {
    /// Year, quarter or month
    Time,
    /// Geographic area
    Region,
    /// Industry classification
    Industry,
    /// Measure / information dimension
    Value,
}

/// Known tokens per role, in precedence order. Matching is a case-insensitive
/// substring test against the dimension id and label.
pub const ROLE_VOCABULARIES: &[(DimensionRole, &[&str])] = &[
    (
        DimensionRole::Time,
        &["Vuosi", "Year", "Kuukausi", "Month", "Vuosineljännes", "Quarter"],
    ),
    (
        DimensionRole::Region,
        &["Alue", "Region", "Maakunta", "Kunta", "Seutukunta"],
    ),
    (DimensionRole::Industry, &["Toimiala", "Industry", "TOL"]),
    (DimensionRole::Value, &["Tiedot", "Tieto", "Information", "Data"]),
];

/// Literal dimension ids tried when no dimension was classified into a role.
pub const FALLBACK_DIMENSION_IDS: &[(DimensionRole, &[&str])] = &[
    (DimensionRole::Time, &["Vuosi", "Year"]),
    (
        DimensionRole::Region,
        &["Alue", "Region", "Maakunta", "Kunta"],
    ),
    (DimensionRole::Industry, &["Toimiala", "Industry"]),
    (DimensionRole::Value, &["Tiedot", "Information"]),
];

/// Role of a dimension from its id and label, if any vocabulary matches.
pub fn role_of(id: &str, label: &str) -> Option<DimensionRole> {
    let id = id.to_uppercase();
    let label = label.to_uppercase();
    ROLE_VOCABULARIES
        .iter()
        .find(|(_, tokens)| {
            tokens.iter().any(|token| {
                let token = token.to_uppercase();
                id.contains(&token) || label.contains(&token)
            })
        })
        .map(|(role, _)| *role)
}

fn fallback_ids(role: DimensionRole) -> &'static [&'static str] {
    FALLBACK_DIMENSION_IDS
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, ids)| *ids)
        .unwrap_or(&[])
}

/// Dimension id chosen for each role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Time dimension
    pub time: Option<String>,
    /// Region dimension
    pub region: Option<String>,
    /// Industry dimension
    pub industry: Option<String>,
    /// Measure dimension
    pub value: Option<String>,
    /// Dimensions matching no vocabulary
    pub unclassified: Vec<String>,
}

impl RoleAssignment {
    /// Dimension assigned to `role`.
    pub fn get(&self, role: DimensionRole) -> Option<&str> {
        match role {
            DimensionRole::Time => self.time.as_deref(),
            DimensionRole::Region => self.region.as_deref(),
            DimensionRole::Industry => self.industry.as_deref(),
            DimensionRole::Value => self.value.as_deref(),
        }
    }

    fn set(&mut self, role: DimensionRole, id: &str) {
        let slot = match role {
            DimensionRole::Time => &mut self.time,
            DimensionRole::Region => &mut self.region,
            DimensionRole::Industry => &mut self.industry,
            DimensionRole::Value => &mut self.value,
        };
        *slot = Some(id.to_string());
    }
}

/// Assign roles to the dataset's dimensions. When several dimensions match
/// the same role, the last one in cube order is used.
pub fn classify(dataset: &Dataset) -> RoleAssignment {
    let mut roles = RoleAssignment::default();
    for dimension in &dataset.dimensions {
        match role_of(&dimension.id, &dimension.label) {
            Some(role) => roles.set(role, &dimension.id),
            None => roles.unclassified.push(dimension.id.clone()),
        }
    }
    debug!(?roles, "Classified dimensions");
    roles
}

/// Records and warnings produced from one dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeOutcome {
    /// Normalized records, in cell order
    pub records: Vec<NormalizedRecord>,
    /// Distinct warnings, in first-seen order
    pub warnings: Vec<String>,
    /// Cells dropped for lack of a year
    pub dropped: usize,
}

/// Insertion-ordered set of warning messages.
#[derive(Debug, Default)]
pub(crate) struct WarningSet {
    seen: HashSet<String>,
    list: Vec<String>,
}

impl WarningSet {
    pub(crate) fn push(&mut self, warning: String) {
        if self.seen.insert(warning.clone()) {
            self.list.push(warning);
        }
    }

    pub(crate) fn extend(&mut self, warnings: impl IntoIterator<Item = String>) {
        for warning in warnings {
            self.push(warning);
        }
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        self.list
    }
}

/// Converts data points into records using a fixed role assignment.
#[derive(Debug, Clone)]
pub struct Normalizer {
    roles: RoleAssignment,
}

impl Normalizer {
    /// Normalizer with explicit roles.
    pub fn new(roles: RoleAssignment) -> Self {
        Self { roles }
    }

    /// Normalizer with roles classified from the dataset.
    pub fn for_dataset(dataset: &Dataset) -> Self {
        Self::new(classify(dataset))
    }

    /// Role assignment in use.
    pub fn roles(&self) -> &RoleAssignment {
        &self.roles
    }

    /// Normalize every cell. Cells without a resolvable year are dropped with
    /// a warning.
    pub fn normalize(&self, dataset: &Dataset) -> NormalizeOutcome {
        let mut records = Vec::with_capacity(dataset.total_cells());
        let mut warnings = WarningSet::default();
        let mut dropped = 0;

        for point in dataset.data_points() {
            match self.normalize_point(dataset, &point) {
                Ok((record, partial_warning)) => {
                    if let Some(w) = partial_warning {
                        warnings.push(w);
                    }
                    records.push(record);
                }
                Err(e) => {
                    dropped += 1;
                    warnings.push(format!("Dropped record: {e}"));
                }
            }
        }

        if dropped > 0 {
            warn!(dropped, kept = records.len(), "Dropped records without a year");
        }

        NormalizeOutcome {
            records,
            warnings: warnings.into_vec(),
            dropped,
        }
    }

    /// Normalize one cell. Returns the record and a warning when the time
    /// code was only partially understood.
    pub fn normalize_point(
        &self,
        dataset: &Dataset,
        point: &DataPoint,
    ) -> NormalizeResult<(NormalizedRecord, Option<String>)> {
        let time_code = self
            .code_for(point, DimensionRole::Time)
            .ok_or(NormalizeError::MissingYear)?;
        let parsed = parse_time_code(time_code)?;
        let partial_warning = parsed.partial.then(|| {
            format!(
                "Time code '{time_code}' only partially parsed; using year {}",
                parsed.period.year
            )
        });

        let value_dimension = self.dimension_for(point, DimensionRole::Value);
        let value_label = value_dimension.and_then(|dim| point.label(dim)).map(str::to_string);
        let unit = value_dimension.and_then(|dim| {
            let code = point.code(dim)?;
            dataset
                .get_dimension(dim)?
                .get_category_by_code(code)?
                .unit
                .clone()
        });

        let record = NormalizedRecord {
            year: parsed.period.year,
            quarter: parsed.period.quarter,
            month: parsed.period.month,
            region_code: self
                .code_for(point, DimensionRole::Region)
                .map(normalize_region_code),
            industry_code: self
                .code_for(point, DimensionRole::Industry)
                .map(normalize_industry_code),
            value: point.value,
            value_label,
            unit,
        };

        Ok((record, partial_warning))
    }

    /// Dimension id carrying `role` for this point: the classified one if the
    /// point has it, else the first fallback id present.
    fn dimension_for<'a>(&'a self, point: &DataPoint, role: DimensionRole) -> Option<&'a str> {
        if let Some(dim) = self.roles.get(role) {
            if point.coordinates.contains_key(dim) {
                return Some(dim);
            }
        }
        fallback_ids(role)
            .iter()
            .copied()
            .find(|dim| point.coordinates.contains_key(*dim))
    }

    fn code_for<'p>(&self, point: &'p DataPoint, role: DimensionRole) -> Option<&'p str> {
        self.dimension_for(point, role).and_then(|dim| point.code(dim))
    }
}

/// Classify and normalize in one step.
pub fn normalize(dataset: &Dataset) -> NormalizeOutcome {
    Normalizer::for_dataset(dataset).normalize(dataset)
}
