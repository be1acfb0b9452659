//! Native browser provisioning using `chromiumoxide`.
//!
//! Finds a usable Chromium-family executable and builds the launch config for
//! [`super::cdp_session::CdpSession`]. No external driver process is needed.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use rand::seq::IndexedRandom;

use crate::core::config;

const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 132 – macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 131 – Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Edge 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen desktop Chromium User-Agent string.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    DESKTOP_USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

/// Executable names looked up on `PATH`.
const PATH_NAMES: &[&str] = &["google-chrome", "chromium", "chromium-browser"];

#[cfg(target_os = "linux")]
const INSTALL_PATHS: &[&str] = &["/usr/bin/google-chrome", "/usr/bin/chromium"];
#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];
#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[r"C:\Program Files\Google\Chrome\Application\chrome.exe"];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &[];

/// Find a Chrome or Chromium executable: `CHROME_EXECUTABLE`, then `PATH`,
/// then the usual install location for this OS.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = config::chrome_executable_override() {
        return Some(p);
    }

    let on_path = std::env::var_os("PATH").and_then(|path_var| {
        std::env::split_paths(&path_var)
            .flat_map(|dir| PATH_NAMES.iter().map(move |exe| dir.join(exe)))
            .find(|full| full.exists())
    });
    if let Some(full) = on_path {
        return Some(full.to_string_lossy().into_owned());
    }

    INSTALL_PATHS
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
}

/// Flags for an unattended crawl; the automation flag keeps the storefront
/// from serving its bot interstitial.
const CRAWL_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-first-run",
    "--mute-audio",
    "--disable-blink-features=AutomationControlled",
];

/// Launch parameters for one browser session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: String,
    pub headless: bool,
    pub page_load_timeout: Duration,
    pub width: u32,
    pub height: u32,
}

impl LaunchOptions {
    pub fn new(executable: impl Into<String>, page_load_timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            headless: true,
            page_load_timeout,
            width: 1920,
            height: 1080,
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

/// Build a `BrowserConfig` for the storefront crawl.
///
/// A large desktop viewport keeps the grid in its multi-column layout so
/// "show more" and the credits tabs render the same way as for a visitor.
pub fn build_config(opts: &LaunchOptions) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(&opts.executable)
        .viewport(Viewport {
            width: opts.width,
            height: opts.height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(opts.width, opts.height)
        .request_timeout(opts.page_load_timeout)
        .arg(format!("--user-agent={}", random_user_agent()));
    for flag in CRAWL_ARGS {
        builder = builder.arg(*flag);
    }

    if !opts.headless {
        builder = builder.with_head();
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_comes_from_pool() {
        let ua = random_user_agent();
        assert!(DESKTOP_USER_AGENTS.contains(&ua));
    }

    #[test]
    fn crawl_args_disable_automation_marker() {
        assert!(CRAWL_ARGS.contains(&"--disable-blink-features=AutomationControlled"));
        assert!(CRAWL_ARGS.iter().all(|a| a.starts_with("--")));
    }

    #[test]
    fn launch_options_defaults() {
        let opts = LaunchOptions::new("/usr/bin/chromium", Duration::from_secs(30)).headless(false);
        assert!(!opts.headless);
        assert_eq!((opts.width, opts.height), (1920, 1080));
        assert_eq!(opts.page_load_timeout, Duration::from_secs(30));
    }
}
