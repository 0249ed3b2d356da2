//! # StatFin Ingest Library
//!
//! Ingestion pipeline for PxWeb statistical tables published as JSON-stat
//! cubes (Statistics Finland's StatFin database by default). Cubes are decoded,
//! their dimensions classified, and every cell flattened into a record keyed
//! by time, region and industry.
//!
//! ## Features
//!
//! - **Resilient transport**: per-attempt timeouts, exponential backoff, 429 `Retry-After` handling
//! - **Catalog browsing**: folder/table listings and table metadata
//! - **Cube decoding**: exact mixed-radix inversion of the flat value array
//! - **Normalization**: role classification, time code parsing, region/industry canonicalization
//! - **Orchestration**: bounded concurrency, polite sequential batches, per-source status tracking
//!
//! ## Quick Start
//!
//! ```no_run
//! use statfin_ingest::catalog::Catalog;
//! use statfin_ingest::client::PxWebClient;
//! use statfin_ingest::config::Settings;
//! use statfin_ingest::orchestrator::Orchestrator;
//! use statfin_ingest::store::{InMemoryStore, SourceConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let catalog = Arc::new(Catalog::new(PxWebClient::from_settings(&settings)?));
//! let store = Arc::new(
//!     InMemoryStore::new().with_source(SourceConfig::new("vaesto", "vaerak/statfin_vaerak_pxt_11ra.px")),
//! );
//!
//! let orchestrator = Orchestrator::new(catalog, store);
//! let result = orchestrator.fetch_one("vaesto").await;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`client`] - HTTP transport with retry and rate-limit handling
//! - [`catalog`] - Catalog listing, table metadata and query building
//! - [`cube`] - JSON-stat decoding into a [`cube::Dataset`]
//! - [`normalize`] - Dimension roles and code normalization
//! - [`orchestrator`] - Fetch orchestration and scheduling
//! - [`store`] - Persistence collaborator interface and implementations

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// Catalog browsing and table queries
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// PxWeb transport client
pub mod client;

/// Configuration constants and runtime settings
pub mod config;

/// JSON-stat cube decoding
pub mod cube;

/// Observability metrics
pub mod metrics;

/// Dimension normalization
pub mod normalize;

/// Fetch orchestration
pub mod orchestrator;

/// Graceful shutdown coordination
pub mod shutdown;

/// Persistence collaborator
pub mod store;

pub use normalize::TimePeriod;

/// One flattened observation keyed by time, region and industry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Calendar year
    pub year: i32,
    /// Quarter (1-4)
    pub quarter: Option<u8>,
    /// Month (1-12)
    pub month: Option<u8>,
    /// Canonical region code
    pub region_code: Option<String>,
    /// Canonical industry code
    pub industry_code: Option<String>,
    /// Observation; `None` when missing in the source
    pub value: Option<f64>,
    /// Label of the measure category
    pub value_label: Option<String>,
    /// Unit of the measure category
    pub unit: Option<String>,
}

impl NormalizedRecord {
    /// Annual record with no other fields set.
    pub fn new(year: i32) -> Self {
        Self {
            year,
            quarter: None,
            month: None,
            region_code: None,
            industry_code: None,
            value: None,
            value_label: None,
            unit: None,
        }
    }

    /// Time part of the linkage key.
    pub fn period(&self) -> TimePeriod {
        TimePeriod {
            year: self.year,
            quarter: self.quarter,
            month: self.month,
        }
    }

    /// Validate quarter and month ranges.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(q) = self.quarter {
            if !(1..=4).contains(&q) {
                return Err(format!("quarter {q} out of range 1-4"));
            }
        }
        if let Some(m) = self.month {
            if !(1..=12).contains(&m) {
                return Err(format!("month {m} out of range 1-12"));
            }
        }
        Ok(())
    }
}
