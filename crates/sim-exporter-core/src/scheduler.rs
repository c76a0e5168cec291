//! Refresh scheduler.
//!
//! One background task ticks at the configured refresh period. Every tick
//! fans out one task per metric item, waits for the whole batch, then goes
//! back to sleep. A batch that overruns the period delays the next tick
//! instead of stacking ticks.
//!
//! ```text
//!   tick ──► JoinSet ─┬─ item 0: generate ─► registry.update
//!                     ├─ item 1: generate ─► registry.update
//!                     └─ item n: ...
//!            join all ◄┘   (failures logged + counted, never abort)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{RefreshError, RegistryError, SimError};
use crate::model::{Collection, ItemRef};
use crate::registry::SeriesRegistry;
use crate::waveform;

/// Running totals of the refresh loop.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub ticks: AtomicU64,
    pub updates: AtomicU64,
    pub failures: AtomicU64,
}

impl SchedulerStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Outcome of one refresh batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub updated: usize,
    pub failed: usize,
}

/// Owns a validated collection and keeps its series fresh.
pub struct Scheduler<R: SeriesRegistry> {
    collection: Arc<Collection>,
    /// Indexed by `MetricId`.
    series: Arc<Vec<R::Handle>>,
    registry: Arc<R>,
    config: SchedulerConfig,
    start: DateTime<Utc>,
    stats: Arc<SchedulerStats>,
}

impl<R: SeriesRegistry> Scheduler<R> {
    /// Register one series per metric. The waveform start time is now.
    pub fn new(
        collection: Collection,
        registry: Arc<R>,
        config: SchedulerConfig,
    ) -> Result<Self, RegistryError> {
        let series = collection
            .metrics
            .iter()
            .map(|m| registry.register(&m.name, &m.kind, &m.help, &m.labels))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            metrics = collection.metrics.len(),
            items = collection.item_count(),
            "Metrics registered"
        );

        Ok(Self {
            collection: Arc::new(collection),
            series: Arc::new(series),
            registry,
            config,
            start: Utc::now(),
            stats: Arc::new(SchedulerStats::default()),
        })
    }

    /// Override the reference time all waveforms are measured from.
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// Recompute every item once and wait for the batch to finish.
    ///
    /// Per-item failures are logged, counted and reported to the registry.
    /// Only an internal invariant violation is returned as an error, after the
    /// rest of the batch has completed.
    pub async fn refresh_once(&self) -> Result<TickReport, SimError> {
        let mut batch = JoinSet::new();
        let mut tasks = HashMap::new();
        for (item_ref, _, _) in self.collection.items() {
            let collection = Arc::clone(&self.collection);
            let series = Arc::clone(&self.series);
            let registry = Arc::clone(&self.registry);
            let start = self.start;
            let task = batch.spawn(async move {
                let outcome = refresh_item(&collection, &series, registry.as_ref(), item_ref, start);
                (item_ref, outcome)
            });
            tasks.insert(task.id(), item_ref);
        }

        let mut report = TickReport::default();
        let mut fatal = None;
        while let Some(joined) = batch.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.updated += 1,
                Ok((item_ref, Err(err))) => {
                    report.failed += 1;
                    let metric = self.metric_name(item_ref);
                    self.registry.report_failure(metric);
                    match err {
                        source if source.is_internal() => {
                            error!(metric, item = item_ref.index, error = %source, "Internal invariant violated");
                            if fatal.is_none() {
                                fatal = Some(SimError::Internal {
                                    metric: metric.to_string(),
                                    source,
                                });
                            }
                        }
                        err => warn!(metric, item = item_ref.index, error = %err, "Item refresh failed"),
                    }
                }
                Err(join_err) => {
                    report.failed += 1;
                    match tasks.get(&join_err.id()) {
                        Some(&item_ref) => {
                            let metric = self.metric_name(item_ref);
                            self.registry.report_failure(metric);
                            warn!(metric, item = item_ref.index, error = %join_err, "Item refresh task panicked");
                        }
                        None => warn!(error = %join_err, "Item refresh task panicked"),
                    }
                }
            }
        }

        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        self.stats
            .updates
            .fetch_add(report.updated as u64, Ordering::Relaxed);
        self.stats
            .failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);

        match fatal {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Refresh forever at the configured period.
    pub async fn run(self) -> Result<(), SimError> {
        let mut ticker = tokio::time::interval(self.config.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(refresh = ?self.config.refresh, "Refresh loop started");

        loop {
            ticker.tick().await;
            let report = self.refresh_once().await?;
            debug!(
                updated = report.updated,
                failed = report.failed,
                "Refresh finished"
            );
        }
    }

    /// Run the refresh loop as a background task.
    pub fn spawn(self) -> JoinHandle<Result<(), SimError>> {
        tokio::spawn(self.run())
    }

    fn metric_name(&self, item_ref: ItemRef) -> &str {
        self.collection
            .metric(item_ref.metric)
            .map(|m| m.name.as_str())
            .unwrap_or("<unknown>")
    }
}

fn refresh_item<R: SeriesRegistry>(
    collection: &Collection,
    series: &[R::Handle],
    registry: &R,
    item_ref: ItemRef,
    start: DateTime<Utc>,
) -> Result<(), RefreshError> {
    let (Some(metric), Some(item), Some(handle)) = (
        collection.metric(item_ref.metric),
        collection.item(item_ref),
        series.get(item_ref.metric.0),
    ) else {
        return Err(RefreshError::DanglingItem(item_ref));
    };

    let value = waveform::generate(item, start, Utc::now())?;
    registry.update(handle, &metric.label_values(item), value)?;
    Ok(())
}
