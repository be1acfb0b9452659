//! Per-item detail page extraction.
//!
//! Each item gets a bounded number of attempts. An attempt navigates to the
//! detail page, reads the static fields and the default credits view, then
//! flips the credits widget to its songwriter view and waits for the list to
//! change before reading it again. When every attempt fails the item keeps a
//! full sentinel enrichment; one bad page never stops the run.

use backoff::backoff::Backoff;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use super::credits::CreditsToggle;
use super::lifecycle::SessionLifecycle;
use crate::core::config::{RetryConfig, SiteSelectors, Timeouts};
use crate::core::types::{
    or_sentinel, text_or_sentinel, CatalogItem, Credit, DetailEnrichment, SpecRow, TrackRow,
};
use crate::core::SessionResult;
use crate::scraping::{BrowserSession, Document, Locator, SnapshotSink, WaitCondition};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrichStatus {
    /// No detail link; nothing was attempted.
    Skipped,
    Enriched,
    /// Page read fine but the songwriter view could not be reached.
    SongwritersMissing,
    /// Every attempt failed; enrichment is all sentinel.
    Failed,
}

#[derive(Debug, Clone)]
pub struct EnrichOutcome {
    pub enrichment: DetailEnrichment,
    pub status: EnrichStatus,
    /// Detail page passes made, 0 when skipped.
    pub attempts: usize,
}

pub struct DetailEnricher<'a> {
    selectors: &'a SiteSelectors,
    timeouts: &'a Timeouts,
    retry: &'a RetryConfig,
    snapshots: &'a dyn SnapshotSink,
}

impl<'a> DetailEnricher<'a> {
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

    /// Enrich one catalog item. Items without a detail link get the sentinel
    /// enrichment without touching the session or the restart counter.
    pub async fn enrich<S: BrowserSession>(
        &self,
        lifecycle: &mut SessionLifecycle<S>,
        item: &CatalogItem,
    ) -> EnrichOutcome {
        let Some(url) = item.detail_link.as_deref() else {
            return EnrichOutcome {
                enrichment: DetailEnrichment::sentinel(),
                status: EnrichStatus::Skipped,
                attempts: 0,
            };
        };

        lifecycle
            .with_session(|session| Box::pin(self.enrich_url(session, url)))
            .await
    }

    async fn enrich_url<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        url: &str,
    ) -> EnrichOutcome {
        let attempts = self.retry.enrich_attempts.max(1);
        let mut delays = self.retry.backoff();

        for attempt in 1..=attempts {
            match self.attempt(session, url).await {
                Ok((enrichment, songwriters_found)) => {
                    let status = if songwriters_found {
                        EnrichStatus::Enriched
                    } else {
                        EnrichStatus::SongwritersMissing
                    };
                    return EnrichOutcome {
                        enrichment,
                        status,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!("detail {} attempt {}/{} failed: {}", url, attempt, attempts, e);
                    if attempt < attempts {
                        if let Some(delay) = delays.next_backoff() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        warn!("giving up on {}, recording sentinel enrichment", url);
        EnrichOutcome {
            enrichment: DetailEnrichment::sentinel(),
            status: EnrichStatus::Failed,
            attempts,
        }
    }

    /// One full pass over a detail page. The bool reports whether the
    /// songwriter view was read.
    async fn attempt<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        url: &str,
    ) -> SessionResult<(DetailEnrichment, bool)> {
        session.navigate(url).await?;
        session
            .wait_for(
                &WaitCondition::Present(Locator::css(&self.selectors.product_info)),
                self.timeouts.detail(),
            )
            .await?;

        let markup = session.snapshot().await?;
        self.snapshots.record("detail", &markup);
        let mut enrichment = parse_detail(&markup, self.selectors);

        let has_widget = Document::parse(&markup).exists(&self.selectors.credits_widget);
        if !has_widget {
            info!("no credits widget on {}, songwriters left as sentinel", url);
            return Ok((enrichment, false));
        }

        let toggle = CreditsToggle::new(self.selectors, self.timeouts, self.retry)
            .run(session)
            .await;
        if !toggle.confirmed() {
            return Ok((enrichment, false));
        }

        match self
            .await_songwriter_view(session, &enrichment.primary_creators)
            .await?
        {
            Some((songwriters, markup)) => {
                self.snapshots.record("songwriters", &markup);
                enrichment.songwriters = songwriters;
                Ok((enrichment, true))
            }
            None => {
                warn!(
                    "credits on {} never switched to songwriters within {}ms, left as sentinel",
                    url,
                    self.timeouts.toggle().as_millis()
                );
                Ok((enrichment, false))
            }
        }
    }

    /// Poll the widget until its primary list is replaced by the songwriter
    /// list. `None` once the toggle wait elapses with the old view still shown.
    async fn await_songwriter_view<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        before: &[Credit],
    ) -> SessionResult<Option<(Vec<Credit>, String)>> {
        let deadline = Instant::now() + self.timeouts.toggle();
        let poll = self.timeouts.credits_poll().max(Duration::from_millis(50));
        loop {
            let markup = session.snapshot().await?;
            let now = parse_credits(&markup, &self.selectors.credits_primary, self.selectors);
            if songwriters_replaced(before, &now) {
                return Ok(Some((now, markup)));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

/// The list differs from the default view and holds real entries. An empty
/// list mid re-render does not count.
fn songwriters_replaced(before: &[Credit], now: &[Credit]) -> bool {
    now != before && !now.iter().all(|c| *c == Credit::sentinel())
}

/// Static fields plus the default (creators/companies) credits view.
/// Songwriters start as sentinel.
pub fn parse_detail(markup: &str, s: &SiteSelectors) -> DetailEnrichment {
    let doc = Document::parse(markup);

    let spec_rows = doc
        .select(&s.spec_rows)
        .iter()
        .map(|n| n.text())
        .filter(|line| !line.is_empty())
        .map(|line| SpecRow::parse_line(&line))
        .collect();

    let tracklist = doc
        .select(&s.track_rows)
        .iter()
        .filter_map(|row| {
            let cells = row
                .select(&s.track_cells)
                .iter()
                .take(3)
                .map(|c| c.text())
                .collect();
            TrackRow::from_cells(cells)
        })
        .collect();

    DetailEnrichment {
        description: text_or_sentinel(doc.first_text(&s.description)),
        spec_rows: or_sentinel(spec_rows, SpecRow::sentinel),
        playlist_name: text_or_sentinel(doc.first_text(&s.playlist_name)),
        tracklist: or_sentinel(tracklist, TrackRow::sentinel),
        primary_creators: credits_in(&doc, &s.credits_primary, s),
        companies: credits_in(&doc, &s.credits_companies, s),
        songwriters: vec![Credit::sentinel()],
    }
}

/// Credit entries under `list_selector`, or the single sentinel row.
pub fn parse_credits(markup: &str, list_selector: &str, s: &SiteSelectors) -> Vec<Credit> {
    credits_in(&Document::parse(markup), list_selector, s)
}

fn credits_in(doc: &Document, list_selector: &str, s: &SiteSelectors) -> Vec<Credit> {
    let credits = doc
        .select(list_selector)
        .iter()
        .map(|item| Credit {
            image_url: item.first_attr(&s.credit_image, "src"),
            name: item.first_text(&s.credit_name),
            role: item.first_text(&s.credit_role),
        })
        .collect();
    or_sentinel(credits, Credit::sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SENTINEL;

    const DETAIL: &str = r#"
    <div class="product-info">
      <div class="product-description"><p>Remastered 180g pressing.</p></div>
      <ul class="product-specs">
        <li>Label: Columbia</li>
        <li>Release: 17 Aug 1959</li>
        <li>Runtime: 45:44</li>
      </ul>
      <h4 class="playlist-name">Side A / Side B</h4>
      <table class="tracklist">
        <tr><th>#</th><th>Title</th><th>Length</th></tr>
        <tr><td>A1</td><td>So What</td><td>9:22</td><td>hidden</td></tr>
        <tr><td>A2</td><td>Freddie Freeloader</td></tr>
      </table>
      <div class="credits-widget">
        <div class="credits-artists">
          <div class="credit-item"><img src="/img/miles.jpg"><span class="credit-name">Miles Davis</span><span class="credit-role">Trumpet</span></div>
          <div class="credit-item"><img src="/img/bill.jpg"><span class="credit-name">Bill Evans</span><span class="credit-role">Piano</span></div>
        </div>
        <div class="credits-companies">
          <div class="credit-item"><span class="credit-name">Columbia</span><span class="credit-role">Label</span></div>
        </div>
      </div>
    </div>"#;

    #[test]
    fn parses_static_fields() {
        let e = parse_detail(DETAIL, &SiteSelectors::default());

        assert_eq!(e.description, "Remastered 180g pressing.");
        assert_eq!(e.playlist_name, "Side A / Side B");
        assert_eq!(e.spec_rows.len(), 3);
        assert_eq!(e.spec_rows[2].label, "Runtime");
        assert_eq!(e.spec_rows[2].value, "45:44");
    }

    #[test]
    fn tracklist_takes_first_three_cells_and_skips_header() {
        let e = parse_detail(DETAIL, &SiteSelectors::default());

        assert_eq!(e.tracklist.len(), 2);
        assert_eq!(e.tracklist[0].title, "So What");
        assert_eq!(e.tracklist[0].duration, "9:22");
        assert_eq!(e.tracklist[1].duration, "");
    }

    #[test]
    fn default_credits_view_and_songwriter_placeholder() {
        let e = parse_detail(DETAIL, &SiteSelectors::default());

        assert_eq!(e.primary_creators.len(), 2);
        assert_eq!(e.primary_creators[1].name, "Bill Evans");
        assert_eq!(e.primary_creators[0].image_url, "/img/miles.jpg");
        assert_eq!(e.companies.len(), 1);
        assert_eq!(e.companies[0].image_url, "");
        assert_eq!(e.companies[0].role, "Label");
        assert_eq!(e.songwriters, vec![Credit::sentinel()]);
    }

    #[test]
    fn songwriter_list_counts_only_when_it_replaced_the_default_view() {
        let creators = vec![Credit {
            image_url: "/img/miles.jpg".into(),
            name: "Miles Davis".into(),
            role: "Trumpet".into(),
        }];
        let writers = vec![Credit {
            image_url: String::new(),
            name: "Bill Evans".into(),
            role: "Composer".into(),
        }];

        assert!(songwriters_replaced(&creators, &writers));
        assert!(!songwriters_replaced(&creators, &creators));
        assert!(!songwriters_replaced(&creators, &[Credit::sentinel()]));
        assert!(!songwriters_replaced(&creators, &[]));
    }

    #[test]
    fn bare_page_resolves_every_field_to_sentinel() {
        let e = parse_detail(
            r#"<div class="product-info"></div>"#,
            &SiteSelectors::default(),
        );
        assert_eq!(e, DetailEnrichment::sentinel());
        assert_eq!(e.description, SENTINEL);
    }
}
