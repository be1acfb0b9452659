//! Reads item summaries off the filtered grid.

use std::collections::HashSet;

use tracing::{info, warn};
use url::Url;

use crate::core::config::SiteSelectors;
use crate::core::types::{CatalogItem, FilterSpec, ItemSummary};
use crate::core::SessionResult;
use crate::scraping::{BrowserSession, Document, Locator, Node};

pub struct CatalogCollector<'a> {
    selectors: &'a SiteSelectors,
    site_root: Option<Url>,
}

impl<'a> CatalogCollector<'a> {
    pub fn new(selectors: &'a SiteSelectors, site_root: &str) -> Self {
        let site_root = match Url::parse(site_root) {
            Ok(u) => Some(u),
            Err(e) => {
                warn!("invalid site root {:?}: {} (detail links kept as-is)", site_root, e);
                None
            }
        };
        Self {
            selectors,
            site_root,
        }
    }

    /// Single pass over the grid as currently rendered. Only items that are
    /// visible count; tiles hidden by the genre filter stay in the DOM but are
    /// skipped. Does not interact with the page.
    pub async fn collect<S: BrowserSession + ?Sized>(
        &self,
        session: &mut S,
        spec: &FilterSpec,
    ) -> SessionResult<Vec<CatalogItem>> {
        let mask = session
            .visibility(&Locator::css(&self.selectors.grid_item))
            .await?;
        let markup = session.snapshot().await?;
        let items = self.parse_grid(&markup, &mask, &spec.genre_label);
        info!(
            "🗂️ collected {} visible items ({} tiles in DOM)",
            items.len(),
            mask.len()
        );
        Ok(items)
    }

    /// Extract every visible tile. `visible[i]` is the visibility of the
    /// i-th grid match in document order; tiles beyond the mask count as
    /// hidden.
    pub fn parse_grid(&self, markup: &str, visible: &[bool], genre: &str) -> Vec<CatalogItem> {
        let doc = Document::parse(markup);
        let tiles = doc.select(&self.selectors.grid_item);
        if tiles.len() != visible.len() {
            warn!(
                "grid changed between visibility check and snapshot ({} vs {} tiles)",
                visible.len(),
                tiles.len()
            );
        }

        let mut seen_links = HashSet::new();
        tiles
            .iter()
            .enumerate()
            .filter(|(i, _)| visible.get(*i).copied().unwrap_or(false))
            .map(|(_, tile)| {
                let item = self.parse_tile(tile, genre);
                if let Some(link) = &item.detail_link {
                    if !seen_links.insert(link.clone()) {
                        warn!("duplicate detail link in grid: {}", link);
                    }
                }
                item
            })
            .collect()
    }

    fn parse_tile(&self, tile: &Node<'_>, genre: &str) -> CatalogItem {
        let s = self.selectors;
        let detail_link = self.resolve(&tile.self_or_first_attr(&s.item_link, "href"));
        let image = tile.first(&s.item_image);
        let image_src = image
            .and_then(|img| img.attr("src").or_else(|| img.attr("data-src")))
            .unwrap_or("")
            .trim();

        let summary = ItemSummary {
            image_url: self.resolve(image_src).unwrap_or_default(),
            detail_url: detail_link.clone().unwrap_or_default(),
            title: tile.first_text(&s.item_title),
            artist: tile.first_text(&s.item_artist),
            price: tile.first_text(&s.item_price),
            previous_price: tile.first_text(&s.item_previous_price),
            sale_label: tile.first_text(&s.item_sale),
            low_stock_label: tile.first_text(&s.item_low_stock),
            sold_out_label: tile.first_text(&s.item_sold_out),
            genre: genre.to_string(),
        };

        CatalogItem {
            summary,
            detail_link,
        }
    }

    /// Absolute URL for `href`, or `None` when there is nothing to follow.
    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        match &self.site_root {
            Some(root) => match root.join(href) {
                Ok(url) => Some(url.to_string()),
                Err(_) => Some(href.to_string()),
            },
            None => Some(href.to_string()),
        }
    }
}
