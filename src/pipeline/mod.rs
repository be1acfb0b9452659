//! The two-phase crawl: filter and collect the grid, then enrich item by
//! item on one session.

pub mod assemble;
pub mod catalog;
pub mod credits;
pub mod enrich;
pub mod filter;
pub mod lifecycle;

pub use assemble::RecordAssembler;
pub use catalog::CatalogCollector;
pub use credits::{CreditsToggle, ToggleOutcome, ToggleState};
pub use enrich::{DetailEnricher, EnrichOutcome, EnrichStatus};
pub use filter::{FilterController, FilterOutcome};
pub use lifecycle::{LifecyclePolicy, PipelineState, SessionLifecycle};

use tracing::{info, warn};

use crate::core::types::{FilterSpec, Record, RunReport};
use crate::core::ScoutConfig;
use crate::scraping::{BrowserSession, NoSnapshots, SnapshotSink};

pub struct Pipeline<'a> {
    config: &'a ScoutConfig,
    snapshots: &'a dyn SnapshotSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ScoutConfig) -> Self {
        Self {
            config,
            snapshots: &NoSnapshots,
        }
    }

    pub fn with_snapshots(mut self, snapshots: &'a dyn SnapshotSink) -> Self {
        self.snapshots = snapshots;
        self
    }

    fn lifecycle_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            restart_every: self.config.restart_every,
            restart_page_load: self.config.timeouts.restart_page_load(),
        }
    }

    /// Run the whole crawl. Never fails: a grid that cannot be reached yields
    /// zero records, and every collected item yields exactly one record.
    pub async fn run<S: BrowserSession>(
        &self,
        session: S,
        spec: &FilterSpec,
    ) -> (Vec<Record>, RunReport, S) {
        let cfg = self.config;
        let mut lifecycle = SessionLifecycle::new(session, self.lifecycle_policy());
        let mut report = RunReport::default();

        info!(
            "🎯 crawling {} for genre {:?} (out of stock: {})",
            cfg.base_url, spec.genre_label, spec.include_out_of_stock
        );

        // Phase 1: filters + pagination + grid collection.
        let filters = FilterController::new(&cfg.selectors, &cfg.timeouts, &cfg.retry, self.snapshots);
        let outcome = filters
            .apply_filters(lifecycle.session(), &cfg.base_url, spec)
            .await;
        if !outcome.reached_grid() {
            warn!("catalog grid never reached, run yields no records: {:?}", outcome);
            return (Vec::new(), report, lifecycle.into_session());
        }

        let collector = CatalogCollector::new(&cfg.selectors, &cfg.site_root);
        let items = match collector.collect(lifecycle.session(), spec).await {
            Ok(items) => items,
            Err(e) => {
                warn!("catalog collection failed, run yields no records: {}", e);
                return (Vec::new(), report, lifecycle.into_session());
            }
        };
        report.items_collected = items.len();

        // Phase 2: detail enrichment, strictly one item at a time.
        let enricher = DetailEnricher::new(&cfg.selectors, &cfg.timeouts, &cfg.retry, self.snapshots);
        let mut enrichments = Vec::with_capacity(items.len());
        let total = items.len();
        for (i, item) in items.iter().enumerate() {
            let outcome = enricher.enrich(&mut lifecycle, item).await;
            match outcome.status {
                EnrichStatus::Skipped => {}
                EnrichStatus::Enriched => report.enrichment_attempted += 1,
                EnrichStatus::SongwritersMissing => {
                    report.enrichment_attempted += 1;
                    report.songwriter_fallbacks += 1;
                }
                EnrichStatus::Failed => {
                    report.enrichment_attempted += 1;
                    report.enrichment_failed += 1;
                }
            }
            report.enrichment_retries += outcome.attempts.saturating_sub(1);
            info!(
                "[{}/{}] {:?} → {:?} after {} attempt(s)",
                i + 1,
                total,
                item.summary.title,
                outcome.status,
                outcome.attempts
            );
            enrichments.push(Some(outcome.enrichment));

            if outcome.status != EnrichStatus::Skipped && i + 1 < total {
                tokio::time::sleep(cfg.timeouts.pacing()).await;
            }
        }
        report.session_restarts = lifecycle.state().restarts();

        let summaries = items.into_iter().map(|item| item.summary).collect();
        let records = RecordAssembler::assemble(summaries, enrichments);

        info!(
            "🏁 {} records ({} enriched, {} failed, {} retries, {} without songwriters, {} restarts)",
            records.len(),
            report.enrichment_attempted - report.enrichment_failed,
            report.enrichment_failed,
            report.enrichment_retries,
            report.songwriter_fallbacks,
            report.session_restarts
        );
        (records, report, lifecycle.into_session())
    }
}
