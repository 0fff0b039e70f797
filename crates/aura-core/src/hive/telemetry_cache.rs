//! # Telemetry Cache
//!
//! A process-wide, mutex-guarded cache over the external metrics provider
//! (Prometheus HTTP API). Snapshots live for 30 seconds; on miss, two
//! metric queries run concurrently under a 5 second deadline. Staleness is
//! preferred over unavailability: a dead provider degrades the snapshot, it
//! never fails the request.

use aura_types::{HealthStatus, SystemHealth};
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Snapshot TTL.
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// Deadline for each metrics query.
pub const QUERY_DEADLINE: Duration = Duration::from_secs(5);

const CPU_QUERY: &str =
    r#"avg(rate(container_cpu_usage_seconds_total{namespace="default"}[5m])) * 100"#;
const MEM_QUERY: &str =
    r#"avg(container_memory_working_set_bytes{namespace="default"}) / 1024 / 1024"#;

struct CacheSlot {
    fetched_at: Instant,
    snapshot: SystemHealth,
}

/// TTL cache over the metrics provider.
pub struct TelemetryCache {
    base_url: String,
    client: reqwest::Client,
    slot: Mutex<Option<CacheSlot>>,
}

impl TelemetryCache {
    /// Build a cache against a Prometheus base URL.
    pub fn new(prometheus_url: &str) -> Self {
        Self {
            base_url: prometheus_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(QUERY_DEADLINE)
                .build()
                .unwrap_or_default(),
            slot: Mutex::new(None),
        }
    }

    /// Pre-load a snapshot, bypassing the provider. Used by wiring code at
    /// startup warm-up and by tests.
    pub async fn prime(&self, snapshot: SystemHealth) {
        let mut slot = self.slot.lock().await;
        *slot = Some(CacheSlot {
            fetched_at: Instant::now(),
            snapshot,
        });
    }

    /// Current system health, served from cache within the TTL.
    ///
    /// Within the TTL consecutive reads return the same snapshot and make
    /// zero outbound calls.
    pub async fn system_health(&self) -> SystemHealth {
        {
            let slot = self.slot.lock().await;
            if let Some(cached) = slot.as_ref() {
                if cached.fetched_at.elapsed() <= CACHE_TTL {
                    let mut snapshot = cached.snapshot.clone();
                    snapshot.cached = true;
                    return snapshot;
                }
            }
        }

        // Miss: fetch outside the lock; duplicated concurrent refreshes are
        // acceptable, the last writer wins.
        match self.fetch().await {
            Ok(snapshot) => {
                self.prime(snapshot.clone()).await;
                snapshot
            }
            Err(err) => {
                error!(error = %err, event = "metrics_provider_unreachable", "telemetry fetch failed");
                let slot = self.slot.lock().await;
                if let Some(stale) = slot.as_ref() {
                    let mut snapshot = stale.snapshot.clone();
                    snapshot.cached = true;
                    if !snapshot.warnings.iter().any(|w| w == "stale_data") {
                        snapshot.warnings.push("stale_data".to_string());
                    }
                    return snapshot;
                }
                SystemHealth::unknown(Utc::now().to_rfc3339())
            }
        }
    }

    async fn fetch(&self) -> Result<SystemHealth, String> {
        let (cpu, mem) = tokio::join!(self.query_value(CPU_QUERY), self.query_value(MEM_QUERY));

        let mut warnings = Vec::new();
        let cpu_usage = match cpu {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, event = "cpu_metric_unavailable", "partial telemetry");
                warnings.push("cpu_unavailable".to_string());
                0.0
            }
        };
        let mem_usage = match mem {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, event = "memory_metric_unavailable", "partial telemetry");
                warnings.push("memory_unavailable".to_string());
                0.0
            }
        };

        // Total failure falls back to the stale cache in the caller.
        if warnings.len() == 2 {
            return Err("both metric queries failed".to_string());
        }

        let status = if warnings.is_empty() {
            HealthStatus::Ok
        } else {
            HealthStatus::Partial
        };

        Ok(SystemHealth {
            status,
            cpu_usage_percent: round2(cpu_usage),
            memory_usage_mb: round2(mem_usage),
            timestamp: Utc::now().to_rfc3339(),
            cached: false,
            warnings,
        })
    }

    async fn query_value(&self, query: &str) -> Result<f64, String> {
        let url = format!("{}/api/v1/query", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;

        if body.get("status").and_then(|s| s.as_str()) != Some("success") {
            return Err("query status not success".to_string());
        }
        // Result shape: data.result[0].value == [unix_ts, "<value>"]
        let value = body
            .pointer("/data/result/0/value/1")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "empty result".to_string())?;
        value.parse::<f64>().map_err(|e| e.to_string())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
