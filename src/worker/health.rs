//! Pipeline health reporting.
//!
//! Each contract pipeline publishes its phase and watermark here; the main
//! binary reads the registry for its periodic health log and readiness
//! decisions. Lock scope is a single map access, so a plain `std` RwLock is
//! enough.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    /// Catching up on history; the watermark is behind the chain head.
    Backfilling,
    /// Polling at the head.
    Live,
    /// Retries exhausted or the store rejected a write. Needs attention.
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub phase: PipelinePhase,
    pub last_processed_block: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct HealthRegistry {
    inner: Arc<RwLock<FxHashMap<String, PipelineStatus>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_phase(&self, contract: &str, phase: PipelinePhase) {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        inner
            .entry(contract.to_string())
            .and_modify(|s| {
                s.phase = phase;
                s.updated_at = now;
            })
            .or_insert(PipelineStatus {
                phase,
                last_processed_block: 0,
                updated_at: now,
            });
    }

    pub fn record_progress(&self, contract: &str, block: u64) {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        inner
            .entry(contract.to_string())
            .and_modify(|s| {
                s.last_processed_block = block;
                s.updated_at = now;
            })
            .or_insert(PipelineStatus {
                phase: PipelinePhase::Backfilling,
                last_processed_block: block,
                updated_at: now,
            });
    }

    pub fn status(&self, contract: &str) -> Option<PipelineStatus> {
        self.inner.read().unwrap().get(contract).cloned()
    }

    pub fn snapshot(&self) -> Vec<(String, PipelineStatus)> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<_> = inner
            .iter()
            .map(|(name, status)| (name.clone(), status.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// True when every registered pipeline has reached the live phase.
    pub fn is_live(&self) -> bool {
        let inner = self.inner.read().unwrap();
        !inner.is_empty() && inner.values().all(|s| s.phase == PipelinePhase::Live)
    }

    pub fn is_degraded(&self) -> bool {
        let inner = self.inner.read().unwrap();
        inner.values().any(|s| s.phase == PipelinePhase::Degraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_requires_every_pipeline_live() {
        let health = HealthRegistry::new();
        assert!(!health.is_live(), "empty registry is not live");

        health.set_phase("dex", PipelinePhase::Live);
        health.set_phase("token", PipelinePhase::Backfilling);
        assert!(!health.is_live());

        health.set_phase("token", PipelinePhase::Live);
        assert!(health.is_live());

        health.set_phase("dex", PipelinePhase::Degraded);
        assert!(!health.is_live());
        assert!(health.is_degraded());
    }

    #[test]
    fn progress_updates_watermark_without_touching_phase() {
        let health = HealthRegistry::new();
        health.set_phase("oracle", PipelinePhase::Live);
        health.record_progress("oracle", 1234);

        let status = health.status("oracle").unwrap();
        assert_eq!(status.phase, PipelinePhase::Live);
        assert_eq!(status.last_processed_block, 1234);
    }
}
