//! Shared test doubles and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use statfin_ingest::catalog::Catalog;
use statfin_ingest::client::{HttpMethod, PxWebClient, RawResponse, Transport, TransportError};
use statfin_ingest::orchestrator::Orchestrator;
use statfin_ingest::store::SourceStore;

pub const BASE_URL: &str = "https://pxdata.test/PXWeb/api/v1/fi/StatFin";

/// A request seen by a test transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
    pub at: tokio::time::Instant,
}

type Scripted = Result<RawResponse, TransportError>;

/// Replays queued responses in order, then repeats the fallback.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Err(TransportError::Other("script exhausted".to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same response.
    pub fn always(response: Scripted) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: response,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `200` and this JSON body.
    pub fn json(body: Value) -> Self {
        Self::always(Ok(RawResponse::new(200, body.to_string())))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Time waited before each request after the first.
    pub fn gaps(&self) -> Vec<Duration> {
        let requests = self.requests();
        requests.windows(2).map(|w| w[1].at - w[0].at).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.cloned(),
            at: tokio::time::Instant::now(),
        });
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Serves the same cube after a delay while tracking peak concurrency.
pub struct SlowCubeTransport {
    delay: Duration,
    body: String,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowCubeTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            body: population_cube().to_string(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for SlowCubeTransport {
    async fn send(
        &self,
        _method: HttpMethod,
        _url: &str,
        _body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RawResponse::new(200, self.body.clone()))
    }
}

pub fn client(transport: Arc<dyn Transport>, max_retries: u32) -> PxWebClient {
    PxWebClient::new(transport, BASE_URL, max_retries)
}

/// Orchestrator without retries or inter-fetch delay.
pub fn orchestrator(transport: Arc<dyn Transport>, store: Arc<dyn SourceStore>) -> Orchestrator {
    Orchestrator::new(Arc::new(Catalog::new(client(transport, 0))), store)
        .with_min_fetch_delay(Duration::ZERO)
}

/// Population by region and year: 3 regions x 2 years x 1 measure.
pub fn population_cube() -> Value {
    json!({
        "version": "2.0",
        "class": "dataset",
        "label": "Väestö alueittain",
        "source": "Tilastokeskus",
        "updated": "2024-03-28T05:00:00Z",
        "id": ["Alue", "Vuosi", "Tiedot"],
        "size": [3, 2, 1],
        "dimension": {
            "Alue": {
                "label": "Alue",
                "category": {
                    "index": {"SSS": 0, "MK01": 1, "MK02": 2},
                    "label": {"SSS": "KOKO MAA", "MK01": "Uusimaa", "MK02": "Varsinais-Suomi"}
                }
            },
            "Vuosi": {
                "label": "Vuosi",
                "category": {
                    "index": {"2022": 0, "2023": 1},
                    "label": {"2022": "2022", "2023": "2023"}
                }
            },
            "Tiedot": {
                "label": "Tiedot",
                "category": {
                    "index": {"vaesto": 0},
                    "label": {"vaesto": "Väestö 31.12."},
                    "unit": {"vaesto": {"label": "henkilöä", "decimals": 0}}
                }
            }
        },
        "value": [5548241, 5563970, 1734634, 1751717, 479341, 481143]
    })
}

/// Turnover by industry and quarter, with one suppressed cell.
pub fn turnover_cube() -> Value {
    json!({
        "version": "2.0",
        "class": "dataset",
        "label": "Liikevaihto toimialoittain",
        "id": ["Vuosineljännes", "Toimiala", "Tiedot"],
        "size": [2, 2, 1],
        "dimension": {
            "Vuosineljännes": {
                "label": "Vuosineljännes",
                "category": {
                    "index": ["2023Q4", "2024Q1"],
                    "label": {"2023Q4": "2023Q4", "2024Q1": "2024Q1"}
                }
            },
            "Toimiala": {
                "label": "Toimiala (TOL 2008)",
                "category": {
                    "index": {"TOL_C": 0, "tol2008_f": 1},
                    "label": {"TOL_C": "Teollisuus", "tol2008_f": "Rakentaminen"}
                }
            },
            "Tiedot": {
                "label": "Tiedot",
                "category": {
                    "index": {"lv": 0},
                    "label": {"lv": "Liikevaihto"}
                }
            }
        },
        "value": [101.5, null, 99.2, 87.0]
    })
}

/// Catalog listing of a folder with one subfolder and one table.
pub fn listing() -> Value {
    json!([
        {"id": "vaerak", "type": "l", "text": "Väestörakenne"},
        {"id": "statfin_vaerak_pxt_11ra.px", "type": "t", "text": "Väestö alueittain", "updated": "2024-03-28T05:00:00"}
    ])
}

/// Metadata of the population table.
pub fn metadata() -> Value {
    json!({
        "title": "Väestö alueittain",
        "variables": [
            {
                "code": "Alue",
                "text": "Alue",
                "values": ["SSS", "MK01"],
                "valueTexts": ["KOKO MAA", "Uusimaa"],
                "elimination": true
            },
            {
                "code": "Vuosi",
                "text": "Vuosi",
                "values": ["2022", "2023"],
                "time": true
            }
        ]
    })
}
