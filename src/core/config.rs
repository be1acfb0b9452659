use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::types::FilterSpec;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (vinyl-scout.json) with env-var overrides
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "VINYL_SCOUT_CONFIG";
pub const ENV_GENRE: &str = "VINYL_SCOUT_GENRE";
pub const ENV_OUTPUT: &str = "VINYL_SCOUT_OUTPUT";
pub const ENV_HEADLESS: &str = "VINYL_SCOUT_HEADLESS";
pub const ENV_SNAPSHOT_DIR: &str = "VINYL_SCOUT_SNAPSHOT_DIR";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

/// Every bounded wait in the pipeline, in milliseconds.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Timeouts {
    /// Filter panel toggle, genre option and stock switch waits.
    pub filter_ms: u64,
    /// Grid must show at least one visible item.
    pub grid_ms: u64,
    /// Visible item count must grow after a "show more" click.
    pub show_more_ms: u64,
    /// Static product-info block on a detail page.
    pub detail_ms: u64,
    /// Each wait inside the credits toggle.
    pub toggle_ms: u64,
    /// Page-load timeout of a freshly launched session.
    pub page_load_ms: u64,
    /// Page-load timeout applied after a proactive restart.
    pub restart_page_load_ms: u64,
    /// Poll interval while waiting for the songwriter list to replace the
    /// default credits view. The wait itself is bounded by `toggle_ms`.
    pub credits_poll_ms: u64,
    /// Fixed pause between detail pages.
    pub pacing_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            filter_ms: 10_000,
            grid_ms: 10_000,
            show_more_ms: 8_000,
            detail_ms: 10_000,
            toggle_ms: 5_000,
            page_load_ms: 30_000,
            restart_page_load_ms: 60_000,
            credits_poll_ms: 250,
            pacing_ms: 1_000,
        }
    }
}

impl Timeouts {
    pub fn filter(&self) -> Duration {
        Duration::from_millis(self.filter_ms)
    }
    pub fn grid(&self) -> Duration {
        Duration::from_millis(self.grid_ms)
    }
    pub fn show_more(&self) -> Duration {
        Duration::from_millis(self.show_more_ms)
    }
    pub fn detail(&self) -> Duration {
        Duration::from_millis(self.detail_ms)
    }
    pub fn toggle(&self) -> Duration {
        Duration::from_millis(self.toggle_ms)
    }
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }
    pub fn restart_page_load(&self) -> Duration {
        Duration::from_millis(self.restart_page_load_ms)
    }
    pub fn credits_poll(&self) -> Duration {
        Duration::from_millis(self.credits_poll_ms)
    }
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Attempt budgets and backoff for the locally retried steps.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RetryConfig {
    pub enrich_attempts: usize,
    pub toggle_attempts: usize,
    pub show_more_attempts: usize,
    /// Upper bound on "show more" pages, independent of what the site reports.
    pub max_show_more_pages: usize,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enrich_attempts: 2,
            toggle_attempts: 3,
            show_more_attempts: 3,
            max_show_more_pages: 200,
            backoff_initial_ms: 300,
            backoff_max_ms: 2_000,
        }
    }
}

impl RetryConfig {
    /// Fresh delay schedule for one retry loop.
    pub fn backoff(&self) -> backoff::ExponentialBackoff {
        backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.backoff_initial_ms))
            .with_max_interval(Duration::from_millis(self.backoff_max_ms))
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Structural selectors for the storefront. `{genre}` in `genre_option` is
/// replaced by the alphanumeric part of the genre label.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SiteSelectors {
    pub filter_toggle: String,
    pub filter_panel: String,
    pub genre_option: String,
    pub stock_switch: String,
    pub grid_item: String,
    pub show_more: String,

    pub item_image: String,
    pub item_link: String,
    pub item_title: String,
    pub item_artist: String,
    pub item_price: String,
    pub item_previous_price: String,
    pub item_sale: String,
    pub item_low_stock: String,
    pub item_sold_out: String,

    pub product_info: String,
    pub description: String,
    pub spec_rows: String,
    pub playlist_name: String,
    pub track_rows: String,
    pub track_cells: String,

    pub credits_widget: String,
    pub credits_accordion: String,
    pub credits_panel: String,
    /// XPath for the tab switching the widget to its songwriter view.
    pub songwriters_tab_xpath: String,
    pub credits_primary: String,
    pub credits_companies: String,
    pub credit_image: String,
    pub credit_name: String,
    pub credit_role: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            filter_toggle: "a[href='#collapseFilterGender']".into(),
            filter_panel: "#collapseFilterGender".into(),
            genre_option: "label[for='filter{genre}']".into(),
            stock_switch: "label[for='switchOutOfStock']".into(),
            grid_item: ".product-grid .product-item".into(),
            show_more: ".product-grid-more button".into(),

            item_image: ".product-image img".into(),
            item_link: "a.product-name".into(),
            item_title: ".product-name h2".into(),
            item_artist: ".product-artist h3".into(),
            item_price: ".new-price".into(),
            item_previous_price: ".old-price".into(),
            item_sale: ".label-sale".into(),
            item_low_stock: ".label-low-stock".into(),
            item_sold_out: ".label-sold-out".into(),

            product_info: ".product-info".into(),
            description: ".product-description".into(),
            spec_rows: ".product-specs li".into(),
            playlist_name: ".playlist-name".into(),
            track_rows: ".tracklist tr".into(),
            track_cells: "td".into(),

            credits_widget: ".credits-widget".into(),
            credits_accordion: ".credits-widget .accordion-button".into(),
            credits_panel: "#collapseCredits".into(),
            songwriters_tab_xpath: "//div[contains(@class,'credits-widget')]\
                //*[@role='tab'][.//span[contains(@class,'badge')]]\
                [text()[normalize-space()='Songwriters']]"
                .into(),
            credits_primary: ".credits-artists .credit-item".into(),
            credits_companies: ".credits-companies .credit-item".into(),
            credit_image: "img".into(),
            credit_name: ".credit-name".into(),
            credit_role: ".credit-role".into(),
        }
    }
}

impl SiteSelectors {
    /// Selector for the filter option matching `genre_label`.
    pub fn genre_option_for(&self, genre_label: &str) -> String {
        let id: String = genre_label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        self.genre_option.replace("{genre}", &id)
    }
}

/// Top-level config loaded from `vinyl-scout.json`.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ScoutConfig {
    /// Origin used to resolve relative detail links.
    pub site_root: String,
    /// Catalog page the filters are applied on.
    pub base_url: String,
    pub genre: String,
    pub include_out_of_stock: bool,
    pub output_path: PathBuf,
    pub headless: bool,
    /// When set, intermediate page markup is written here for debugging.
    pub snapshot_dir: Option<PathBuf>,
    /// Items a session may process before it is proactively restarted.
    pub restart_every: usize,
    pub timeouts: Timeouts,
    pub retry: RetryConfig,
    pub selectors: SiteSelectors,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            site_root: "https://vinyl.com".into(),
            base_url: "https://vinyl.com/pages/shop".into(),
            genre: "Rock".into(),
            include_out_of_stock: false,
            output_path: PathBuf::from("vinyl_data.csv"),
            headless: true,
            snapshot_dir: None,
            restart_every: 10,
            timeouts: Timeouts::default(),
            retry: RetryConfig::default(),
            selectors: SiteSelectors::default(),
        }
    }
}

impl ScoutConfig {
    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec::new(self.genre.clone()).with_out_of_stock(self.include_out_of_stock)
    }

    /// Apply `VINYL_SCOUT_*` environment overrides on top of file values.
    pub fn apply_env(mut self) -> Self {
        if let Some(genre) = env_non_empty(ENV_GENRE) {
            self.genre = genre;
        }
        if let Some(out) = env_non_empty(ENV_OUTPUT) {
            self.output_path = PathBuf::from(out);
        }
        if let Some(dir) = env_non_empty(ENV_SNAPSHOT_DIR) {
            self.snapshot_dir = Some(PathBuf::from(dir));
        }
        if let Some(v) = env_non_empty(ENV_HEADLESS) {
            self.headless = !matches!(
                v.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        self
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Load `vinyl-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `VINYL_SCOUT_CONFIG` env var path
/// 2. `./vinyl-scout.json`
/// 3. `~/.vinyl-scout/config.json`
///
/// Missing file → defaults (silent). Parse error → warning, defaults.
/// Environment overrides are applied in both cases.
pub fn load_config() -> ScoutConfig {
    let mut candidates = vec![PathBuf::from("vinyl-scout.json")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".vinyl-scout").join("config.json"));
    }
    if let Some(env_path) = env_non_empty(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        if let Some(cfg) = load_config_from(path) {
            return cfg.apply_env();
        }
    }

    ScoutConfig::default().apply_env()
}

/// `None` when the file does not exist; defaults when it does not parse.
pub fn load_config_from(path: &Path) -> Option<ScoutConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<ScoutConfig>(&contents) {
        Ok(cfg) => {
            tracing::info!("vinyl-scout config loaded from {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            tracing::warn!(
                "vinyl-scout config parse error at {}: {} (using defaults)",
                path.display(),
                e
            );
            Some(ScoutConfig::default())
        }
    }
}

/// Optional override for the Chromium-family browser executable.
///
/// Only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = env_non_empty(ENV_CHROME_EXECUTABLE)?;
    if Path::new(&p).exists() {
        Some(p)
    } else {
        None
    }
}
