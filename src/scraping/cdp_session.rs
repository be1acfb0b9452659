//! [`BrowserSession`] over the Chrome DevTools Protocol.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::browser_manager::{self, LaunchOptions};
use super::session::{BrowserSession, Locator, WaitCondition};
use crate::core::{SessionError, SessionResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Same notion of "displayed" as a WebDriver: rendered, not hidden, non-zero box.
const IS_VISIBLE_JS: &str = "const __vis = (el) => { \
    if (!el) return false; \
    const s = window.getComputedStyle(el); \
    if (s.display === 'none' || s.visibility === 'hidden' || parseFloat(s.opacity) === 0) return false; \
    const r = el.getBoundingClientRect(); \
    return r.width > 0 && r.height > 0; };";

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// JS expression evaluating to the first match or `null`.
fn js_lookup(target: &Locator) -> String {
    let sel = js_string(target.as_str());
    match target {
        Locator::Css(_) => format!("document.querySelector({sel})"),
        Locator::XPath(_) => format!(
            "document.evaluate({sel}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
        ),
    }
}

/// JS expression evaluating to an array of every match.
fn js_lookup_all(target: &Locator) -> String {
    let sel = js_string(target.as_str());
    match target {
        Locator::Css(_) => format!("Array.from(document.querySelectorAll({sel}))"),
        Locator::XPath(_) => format!(
            "(() => {{ const r = document.evaluate({sel}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
             for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
             return out; }})()"
        ),
    }
}

fn condition_script(condition: &WaitCondition) -> String {
    let body = match condition {
        WaitCondition::Present(l) => format!("return !!({});", js_lookup(l)),
        WaitCondition::Visible(l) => format!("return __vis({});", js_lookup(l)),
        WaitCondition::Clickable(l) => format!(
            "const el = {}; return __vis(el) && !el.disabled \
             && el.getAttribute('aria-disabled') !== 'true';",
            js_lookup(l)
        ),
        WaitCondition::VisibleCountAtLeast(l, n) => {
            format!("return {}.filter(__vis).length >= {};", js_lookup_all(l), n)
        }
    };
    format!("(() => {{ {IS_VISIBLE_JS} {body} }})()")
}

fn spawn_handler_task(
    mut handler: chromiumoxide::Handler,
    closed: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                warn!("chromiumoxide handler event error: {}", e);
            }
        }
        closed.store(true, Ordering::SeqCst);
    })
}

struct Live {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
}

impl Live {
    async fn launch(opts: &LaunchOptions) -> SessionResult<Self> {
        let config = browser_manager::build_config(opts)
            .map_err(|e| SessionError::Launch(e.to_string()))?;
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(format!("{} ({})", e, opts.executable)))?;

        let closed = Arc::new(AtomicBool::new(false));
        let handler_task = spawn_handler_task(handler, closed.clone());

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Launch(format!("failed to open tab: {}", e)))?;

        Ok(Self {
            browser,
            page,
            handler_task,
            closed,
        })
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("browser close error (non-fatal): {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

/// One headless Chromium with a single tab.
pub struct CdpSession {
    opts: LaunchOptions,
    live: Option<Live>,
}

impl CdpSession {
    pub async fn launch(opts: LaunchOptions) -> SessionResult<Self> {
        info!(
            "🚀 launching browser ({}, page-load timeout {}s)",
            opts.executable,
            opts.page_load_timeout.as_secs()
        );
        let live = Live::launch(&opts).await?;
        Ok(Self {
            opts,
            live: Some(live),
        })
    }

    /// Launch with the auto-discovered executable.
    pub async fn launch_auto(headless: bool, page_load_timeout: Duration) -> SessionResult<Self> {
        let exe = browser_manager::find_chrome_executable().ok_or_else(|| {
            SessionError::Launch(
                "No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE.".into(),
            )
        })?;
        Self::launch(LaunchOptions::new(exe, page_load_timeout).headless(headless)).await
    }

    pub async fn close(mut self) {
        if let Some(live) = self.live.take() {
            live.shutdown().await;
            info!("🛑 browser session closed");
        }
    }

    fn page(&self) -> SessionResult<&Page> {
        match self.live.as_ref() {
            Some(live) if !live.closed.load(Ordering::SeqCst) => Ok(&live.page),
            _ => Err(SessionError::Closed),
        }
    }

    async fn eval_bool(&self, script: String) -> SessionResult<bool> {
        let value = self.page()?.evaluate(script).await?;
        Ok(value.into_value::<bool>().unwrap_or(false))
    }

    async fn find(&self, target: &Locator) -> SessionResult<chromiumoxide::Element> {
        let page = self.page()?;
        let found = match target {
            Locator::Css(sel) => page.find_element(sel.as_str()).await,
            Locator::XPath(expr) => page.find_xpath(expr.as_str()).await,
        };
        found.map_err(|_| SessionError::NotFound(target.to_string()))
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.handler_task.abort();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let mut browser = live.browser;
                handle.spawn(async move {
                    let _ = browser.close().await;
                });
            }
        }
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn navigate(&mut self, url: &str) -> SessionResult<()> {
        let page = self.page()?;
        let timeout = self.opts.page_load_timeout;
        debug!("🌐 navigating to {}", url);
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Navigation(format!("{}: {}", url, e))),
            Err(_) => Err(SessionError::timeout(format!("page load of {url}"), timeout)),
        }
    }

    async fn wait_for(
        &mut self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> SessionResult<()> {
        let script = condition_script(condition);
        let start = Instant::now();
        loop {
            // Evaluation errors (page mid-navigation, bad selector) read as "not yet".
            match self.eval_bool(script.clone()).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(SessionError::Closed) => return Err(SessionError::Closed),
                Err(e) => debug!("wait_for {}: check failed: {}", condition, e),
            }
            if start.elapsed() >= timeout {
                return Err(SessionError::timeout(condition.to_string(), timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, target: &Locator) -> SessionResult<()> {
        let element = self.find(target).await?;
        element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| SessionError::Interaction(format!("click {}: {}", target, e)))
    }

    async fn click_direct(&mut self, target: &Locator) -> SessionResult<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
            js_lookup(target)
        );
        if self.eval_bool(script).await? {
            Ok(())
        } else {
            Err(SessionError::NotFound(target.to_string()))
        }
    }

    async fn scroll_into_view(&mut self, target: &Locator) -> SessionResult<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; \
             el.scrollIntoView({{block: 'center', inline: 'nearest'}}); return true; }})()",
            js_lookup(target)
        );
        if self.eval_bool(script).await? {
            Ok(())
        } else {
            Err(SessionError::NotFound(target.to_string()))
        }
    }

    async fn snapshot(&mut self) -> SessionResult<String> {
        let page = self.page()?;

        // JS snapshot first; Page::content() as the fallback.
        if let Ok(val) = page.evaluate("document.documentElement.outerHTML").await {
            if let Ok(html) = val.into_value::<String>() {
                if !html.is_empty() {
                    return Ok(html);
                }
            }
        }

        let delays = [200u64, 500, 1200];
        let mut last_err = None;
        for (i, delay_ms) in delays.iter().enumerate() {
            match page.content().await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    warn!("page.content attempt {} failed: {}", i + 1, e);
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
            }
        }
        Err(last_err
            .map(SessionError::from)
            .unwrap_or(SessionError::Closed))
    }

    async fn visibility(&mut self, target: &Locator) -> SessionResult<Vec<bool>> {
        let script = format!(
            "(() => {{ {IS_VISIBLE_JS} return {}.map(__vis); }})()",
            js_lookup_all(target)
        );
        let value = self.page()?.evaluate(script).await?;
        value
            .into_value::<Vec<bool>>()
            .map_err(|e| SessionError::Interaction(format!("visibility of {}: {}", target, e)))
    }

    async fn restart(&mut self, page_load_timeout: Duration) -> SessionResult<()> {
        if let Some(old) = self.live.take() {
            old.shutdown().await;
        }
        self.opts.page_load_timeout = page_load_timeout;
        info!(
            "🔄 relaunching browser (page-load timeout {}s)",
            page_load_timeout.as_secs()
        );
        self.live = Some(Live::launch(&self.opts).await?);
        Ok(())
    }
}
