//! Health-check scheduler.
//!
//! # Responsibilities
//! - Global tick: re-scan the registry every minute, probe every
//!   record with a health-check configuration concurrently
//! - Per-record tick: one self-rescheduling timer per record at the
//!   record's own interval
//! - Write probe outcomes back to the registry's health fields
//!
//! # Design Decisions
//! - The timer map is re-derived from the registry on every global
//!   tick rather than trusted as accumulated state, so records being
//!   added, removed, or re-configured converge within one scan and
//!   restarts are idempotent
//! - Probe failures degrade to "unhealthy" plus a warning; the
//!   scheduler itself keeps running
//! - `stop()` aborts every armed timer including the global one

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::HealthConfig;
use crate::health::probe::HealthProber;
use crate::registry::{DomainRecord, RegistryDb};

/// Background scheduler probing registered routes.
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    registry: Arc<RegistryDb>,
    prober: HealthProber,
    scan_interval: Duration,
    running: AtomicBool,
    timers: DashMap<Uuid, JoinHandle<()>>,
    global: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<RegistryDb>, prober: HealthProber, config: &HealthConfig) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                registry,
                prober,
                scan_interval: Duration::from_secs(config.scan_interval_secs),
                running: AtomicBool::new(false),
                timers: DashMap::new(),
                global: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Start the scheduler: one immediate probe round, then the global
    /// re-scan loop. Idempotent while running.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(
            scan_interval_secs = self.inner.scan_interval.as_secs(),
            "starting health check scheduler"
        );

        MonitorInner::scan_and_arm(&self.inner).await;

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.scan_interval).await;
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                MonitorInner::scan_and_arm(&inner).await;
            }
        });

        let mut global = self.inner.global.lock().unwrap_or_else(|e| e.into_inner());
        *global = Some(handle);
    }

    /// Stop the scheduler and abort every armed timer. No probe fires
    /// after this returns.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("stopping health check scheduler");

        let mut global = self.inner.global.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = global.take() {
            handle.abort();
        }
        self.inner.abort_record_timers();
    }

    /// Run a single probe round without touching the timer fabric.
    pub async fn run_once(&self) {
        self.inner.probe_round().await;
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

impl MonitorInner {
    /// One global tick: probe everything, then re-derive the
    /// per-record timers from the registry.
    async fn scan_and_arm(inner: &Arc<Self>) {
        let records = inner.probe_round().await;

        inner.abort_record_timers();
        for record in records {
            let interval = record
                .health_check
                .as_ref()
                .map(|spec| spec.interval_secs)
                .unwrap_or(0);
            if interval == 0 {
                continue;
            }
            Self::arm_timer(inner, record.id, record.incoming_address.clone(), interval);
        }
    }

    /// Probe every record carrying a health-check configuration,
    /// concurrently, and write the outcomes back.
    async fn probe_round(&self) -> Vec<DomainRecord> {
        let records = match self.registry.list_with_health_check() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "health scan could not list records");
                return Vec::new();
            }
        };

        tracing::debug!(count = records.len(), "running health probe round");
        join_all(records.iter().map(|record| self.probe_and_record(record))).await;
        records
    }

    async fn probe_and_record(&self, record: &DomainRecord) {
        let outcome = self.prober.probe(record).await;
        if !outcome.healthy {
            tracing::warn!(
                host = %record.incoming_address,
                detail = %outcome.detail,
                "health probe unhealthy"
            );
        }
        if let Err(e) = self.registry.write_health(
            &record.incoming_address,
            outcome.healthy,
            &outcome.detail,
            outcome.checked_at,
        ) {
            tracing::warn!(
                host = %record.incoming_address,
                error = %e,
                "failed to write probe result"
            );
        }
    }

    /// Arm one self-rescheduling single-shot timer for a record. The
    /// record is re-read on every firing so a stale routing field is
    /// observed for at most one cycle.
    fn arm_timer(this: &Arc<Self>, id: Uuid, host: String, interval_secs: u64) {
        let inner = Arc::clone(this);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(interval_secs)).await;
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                match inner.registry.find_by_host(&host) {
                    Ok(Some(record)) if record.health_check.is_some() => {
                        inner.probe_and_record(&record).await;
                    }
                    // Removed or re-configured; the next global tick
                    // re-derives the timer set.
                    _ => break,
                }
            }
        });

        if let Some(old) = this.timers.insert(id, handle) {
            old.abort();
        }
    }

    fn abort_record_timers(&self) {
        self.timers.retain(|_, handle| {
            handle.abort();
            false
        });
    }
}
