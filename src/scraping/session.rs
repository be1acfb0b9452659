//! The interactive-page capability the pipeline drives.
//!
//! Everything that touches a live page goes through [`BrowserSession`]; the
//! production implementation is [`super::cdp_session::CdpSession`], tests use
//! scripted in-memory pages.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::SessionResult;

/// How to find an element on the live page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// A predicate over page state that [`BrowserSession::wait_for`] polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// At least one match exists in the DOM.
    Present(Locator),
    /// The first match is rendered and visible.
    Visible(Locator),
    /// The first match is visible and not disabled.
    Clickable(Locator),
    /// At least `n` matches are visible.
    VisibleCountAtLeast(Locator, usize),
}

impl WaitCondition {
    pub fn locator(&self) -> &Locator {
        match self {
            WaitCondition::Present(l)
            | WaitCondition::Visible(l)
            | WaitCondition::Clickable(l)
            | WaitCondition::VisibleCountAtLeast(l, _) => l,
        }
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Present(l) => write!(f, "presence of {l}"),
            WaitCondition::Visible(l) => write!(f, "visibility of {l}"),
            WaitCondition::Clickable(l) => write!(f, "clickable {l}"),
            WaitCondition::VisibleCountAtLeast(l, n) => write!(f, "{n}+ visible {l}"),
        }
    }
}

/// Stateful handle to one interactive page.
///
/// Not safe for concurrent use: every method takes `&mut self`.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, bounded by the session's page-load timeout.
    async fn navigate(&mut self, url: &str) -> SessionResult<()>;

    /// Poll `condition` until it holds or `timeout` elapses.
    async fn wait_for(&mut self, condition: &WaitCondition, timeout: Duration)
        -> SessionResult<()>;

    /// Native click on the first match.
    async fn click(&mut self, target: &Locator) -> SessionResult<()>;

    /// Script-level click on the first match, for elements an overlay may
    /// obscure.
    async fn click_direct(&mut self, target: &Locator) -> SessionResult<()>;

    async fn scroll_into_view(&mut self, target: &Locator) -> SessionResult<()>;

    /// Rendered markup of the whole document.
    async fn snapshot(&mut self) -> SessionResult<String>;

    /// Visibility of every match, in document order.
    async fn visibility(&mut self, target: &Locator) -> SessionResult<Vec<bool>>;

    /// Tear the session down and start a fresh one with the given page-load
    /// timeout. The handle remains usable afterwards.
    async fn restart(&mut self, page_load_timeout: Duration) -> SessionResult<()>;

    /// Number of currently visible matches.
    async fn visible_count(&mut self, target: &Locator) -> SessionResult<usize> {
        Ok(self.visibility(target).await?.into_iter().filter(|v| *v).count())
    }
}
