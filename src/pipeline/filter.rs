//! Brings the catalog page to a filtered, fully paginated state.

use backoff::backoff::Backoff;
use tracing::{info, warn};

use crate::core::config::{RetryConfig, SiteSelectors, Timeouts};
use crate::core::types::FilterSpec;
use crate::core::{SessionError, SessionResult};
use crate::scraping::{BrowserSession, Locator, SnapshotSink, WaitCondition};

/// Where filter application ended up. Only `Unreachable` means there is no
/// grid to collect from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Filters applied and pagination ran to its end.
    Applied { visible: usize, show_more_clicks: usize },
    /// Some step timed out; the grid is in whatever state it reached.
    Partial { visible: usize, reason: String },
    /// The catalog page could not be loaded.
    Unreachable { reason: String },
}

impl FilterOutcome {
    /// Visible grid items once filtering settled.
    pub fn stable_item_count(&self) -> usize {
        match self {
            FilterOutcome::Applied { visible, .. } | FilterOutcome::Partial { visible, .. } => {
                *visible
            }
            FilterOutcome::Unreachable { .. } => 0,
        }
    }

    pub fn reached_grid(&self) -> bool {
        !matches!(self, FilterOutcome::Unreachable { .. })
    }
}

pub struct FilterController<'a> {
    selectors: &'a SiteSelectors,
    timeouts: &'a Timeouts,
    retry: &'a RetryConfig,
    snapshots: &'a dyn SnapshotSink,
}

impl<'a> FilterController<'a> {
    pub fn new(
        selectors: &'a SiteSelectors,
        timeouts: &'a Timeouts,
        retry: &'a RetryConfig,
        snapshots: &'a dyn SnapshotSink,
    ) -> Self {
        Self {
            selectors,
            timeouts,
            retry,
            snapshots,
        }
    }

    fn grid(&self) -> Locator {
        Locator::css(&self.selectors.grid_item)
    }

    /// Navigate to `base_url`, apply `spec`, then page through "show more"
    /// until the control disappears.
    pub async fn apply_filters<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        base_url: &str,
        spec: &FilterSpec,
    ) -> FilterOutcome {
        if let Err(e) = session.navigate(base_url).await {
            warn!("catalog page {} unreachable: {}", base_url, e);
            return FilterOutcome::Unreachable {
                reason: e.to_string(),
            };
        }
        if let Ok(markup) = session.snapshot().await {
            self.snapshots.record("initial_page", &markup);
        }

        if let Err(e) = self.select_filters(session, spec).await {
            warn!(
                "filter application for {:?} incomplete: {} (continuing with partial grid)",
                spec.genre_label, e
            );
            let visible = session.visible_count(&self.grid()).await.unwrap_or(0);
            return FilterOutcome::Partial {
                visible,
                reason: e.to_string(),
            };
        }
        info!("✅ filter {:?} applied", spec.genre_label);

        let show_more_clicks = self.paginate(session).await;
        let visible = session.visible_count(&self.grid()).await.unwrap_or(0);
        info!(
            "📦 grid settled: {} visible items after {} show-more clicks",
            visible, show_more_clicks
        );
        if let Ok(markup) = session.snapshot().await {
            self.snapshots.record("filtered_page", &markup);
        }

        FilterOutcome::Applied {
            visible,
            show_more_clicks,
        }
    }

    async fn select_filters<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        spec: &FilterSpec,
    ) -> SessionResult<()> {
        let wait = self.timeouts.filter();

        let toggle = Locator::css(&self.selectors.filter_toggle);
        session
            .wait_for(&WaitCondition::Clickable(toggle.clone()), wait)
            .await?;
        session.click(&toggle).await?;
        session
            .wait_for(
                &WaitCondition::Visible(Locator::css(&self.selectors.filter_panel)),
                wait,
            )
            .await?;

        let option = Locator::css(self.selectors.genre_option_for(&spec.genre_label));
        session
            .wait_for(&WaitCondition::Clickable(option.clone()), wait)
            .await?;
        session.click(&option).await?;

        session
            .wait_for(
                &WaitCondition::VisibleCountAtLeast(self.grid(), 1),
                self.timeouts.grid(),
            )
            .await?;

        if spec.include_out_of_stock {
            let switch = Locator::css(&self.selectors.stock_switch);
            session
                .wait_for(&WaitCondition::Clickable(switch.clone()), wait)
                .await?;
            session.click(&switch).await?;
            session
                .wait_for(
                    &WaitCondition::VisibleCountAtLeast(self.grid(), 1),
                    self.timeouts.grid(),
                )
                .await?;
        }

        Ok(())
    }

    /// Click "show more" until it is gone. Returns the number of clicks that
    /// grew the grid.
    async fn paginate<S: BrowserSession + ?Sized>(&self, session: &mut S) -> usize {
        let show_more = Locator::css(&self.selectors.show_more);
        let mut clicks = 0;

        while clicks < self.retry.max_show_more_pages {
            match session.visibility(&show_more).await {
                Ok(mask) if mask.iter().any(|v| *v) => {}
                Ok(_) => break,
                Err(e) => {
                    warn!("show-more lookup failed, stopping pagination: {}", e);
                    break;
                }
            }

            let before = match session.visible_count(&self.grid()).await {
                Ok(n) => n,
                Err(e) => {
                    warn!("grid count failed, stopping pagination: {}", e);
                    break;
                }
            };

            match self.show_more_once(session, &show_more, before).await {
                Ok(()) => clicks += 1,
                Err(e) => {
                    // Control still present but the grid stopped growing:
                    // treated as the end of results.
                    warn!(
                        "show-more did not load more items after {} attempts ({}); stopping at {} items",
                        self.retry.show_more_attempts, e, before
                    );
                    break;
                }
            }
        }

        if clicks >= self.retry.max_show_more_pages {
            warn!(
                "show-more page cap ({}) reached, collecting current grid",
                self.retry.max_show_more_pages
            );
        }
        clicks
    }

    async fn show_more_once<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        show_more: &Locator,
        before: usize,
    ) -> SessionResult<()> {
        let attempts = self.retry.show_more_attempts.max(1);
        let mut delays = self.retry.backoff();
        let mut last_err = SessionError::NotFound(show_more.to_string());

        for attempt in 1..=attempts {
            let result = async {
                session.scroll_into_view(show_more).await?;
                session.click_direct(show_more).await?;
                session
                    .wait_for(
                        &WaitCondition::VisibleCountAtLeast(self.grid(), before + 1),
                        self.timeouts.show_more(),
                    )
                    .await
            }
            .await;

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!("show-more attempt {}/{} failed: {}", attempt, attempts, e);
                    if let Some(delay) = delays.next_backoff() {
                        tokio::time::sleep(delay).await;
                    }
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }
}
