//! Switches the credits widget on a detail page to its songwriter view.
//!
//! The widget sits in an accordion that may start collapsed, and the
//! "Songwriters" tab is often partly covered by sticky layout, so the click is
//! issued as a script-level interaction. Any failure restarts the whole
//! sequence from `Collapsed`, up to a fixed number of cycles.

use std::time::Duration;

use backoff::backoff::Backoff;
use tracing::{debug, warn};

use crate::core::config::{RetryConfig, SiteSelectors, Timeouts};
use crate::core::SessionResult;
use crate::scraping::{BrowserSession, Document, Locator, WaitCondition};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleState {
    Collapsed,
    Expanding,
    Expanded,
    Locating,
    Clicking,
    Confirmed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// `Confirmed` or `Failed`.
    pub state: ToggleState,
    /// Full cycles started, including the successful one.
    pub cycles: usize,
}

impl ToggleOutcome {
    pub fn confirmed(&self) -> bool {
        self.state == ToggleState::Confirmed
    }
}

fn log_state(state: ToggleState) {
    debug!("credits_toggle_state={:?}", state);
}

pub struct CreditsToggle<'a> {
    accordion: Locator,
    panel: Locator,
    songwriters_tab: Locator,
    wait: Duration,
    attempts: usize,
    retry: &'a RetryConfig,
}

impl<'a> CreditsToggle<'a> {
    pub fn new(selectors: &SiteSelectors, timeouts: &Timeouts, retry: &'a RetryConfig) -> Self {
        Self {
            accordion: Locator::css(&selectors.credits_accordion),
            panel: Locator::css(&selectors.credits_panel),
            songwriters_tab: Locator::xpath(&selectors.songwriters_tab_xpath),
            wait: timeouts.toggle(),
            attempts: retry.toggle_attempts.max(1),
            retry,
        }
    }

    /// Drive the widget to the songwriter view. Carries no state between
    /// calls; each item gets a fresh run.
    pub async fn run<S: BrowserSession + ?Sized>(&self, session: &mut S) -> ToggleOutcome {
        let mut delays = self.retry.backoff();

        for cycle in 1..=self.attempts {
            match self.cycle(session).await {
                Ok(()) => {
                    log_state(ToggleState::Confirmed);
                    return ToggleOutcome {
                        state: ToggleState::Confirmed,
                        cycles: cycle,
                    };
                }
                Err(e) => {
                    warn!(
                        "credits toggle cycle {}/{} failed: {}",
                        cycle, self.attempts, e
                    );
                    if cycle < self.attempts {
                        if let Some(delay) = delays.next_backoff() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        log_state(ToggleState::Failed);
        ToggleOutcome {
            state: ToggleState::Failed,
            cycles: self.attempts,
        }
    }

    async fn cycle<S: BrowserSession + ?Sized>(&self, session: &mut S) -> SessionResult<()> {
        let mut state = ToggleState::Collapsed;
        loop {
            log_state(state);
            state = match state {
                ToggleState::Collapsed => {
                    session
                        .wait_for(&WaitCondition::Present(self.accordion.clone()), self.wait)
                        .await?;
                    let markup = session.snapshot().await?;
                    if accordion_collapsed(&markup, self.accordion.as_str()) {
                        ToggleState::Expanding
                    } else {
                        ToggleState::Expanded
                    }
                }
                ToggleState::Expanding => {
                    session
                        .wait_for(&WaitCondition::Clickable(self.accordion.clone()), self.wait)
                        .await?;
                    session.click(&self.accordion).await?;
                    session
                        .wait_for(&WaitCondition::Visible(self.panel.clone()), self.wait)
                        .await?;
                    ToggleState::Expanded
                }
                ToggleState::Expanded => ToggleState::Locating,
                ToggleState::Locating => {
                    session
                        .wait_for(
                            &WaitCondition::Visible(self.songwriters_tab.clone()),
                            self.wait,
                        )
                        .await?;
                    ToggleState::Clicking
                }
                ToggleState::Clicking => {
                    session.scroll_into_view(&self.songwriters_tab).await?;
                    session
                        .wait_for(
                            &WaitCondition::Clickable(self.songwriters_tab.clone()),
                            self.wait,
                        )
                        .await?;
                    session.click_direct(&self.songwriters_tab).await?;
                    ToggleState::Confirmed
                }
                ToggleState::Confirmed | ToggleState::Failed => return Ok(()),
            };
        }
    }
}

/// Bootstrap marks a closed accordion trigger with the `collapsed` class.
fn accordion_collapsed(markup: &str, accordion_selector: &str) -> bool {
    Document::parse(markup)
        .first(accordion_selector)
        .map(|n| n.has_class("collapsed") || n.attr("aria-expanded") == Some("false"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionError;
    use async_trait::async_trait;

    /// Accordion + tab widget whose songwriter click can be made to fail.
    struct Widget {
        collapsed: bool,
        songwriters_shown: bool,
        fail_tab_clicks: usize,
        cycles_started: usize,
        accordion_clicks: usize,
        tab_clicks: usize,
    }

    impl Widget {
        fn new(collapsed: bool, fail_tab_clicks: usize) -> Self {
            Self {
                collapsed,
                songwriters_shown: false,
                fail_tab_clicks,
                cycles_started: 0,
                accordion_clicks: 0,
                tab_clicks: 0,
            }
        }
    }

    #[async_trait]
    impl BrowserSession for Widget {
        async fn navigate(&mut self, _url: &str) -> SessionResult<()> {
            Ok(())
        }
        async fn wait_for(&mut self, c: &WaitCondition, t: Duration) -> SessionResult<()> {
            match c {
                WaitCondition::Present(_) => {
                    self.cycles_started += 1;
                    Ok(())
                }
                WaitCondition::Visible(Locator::Css(sel)) if sel == "#collapseCredits" => {
                    if self.collapsed {
                        Err(SessionError::timeout(c.to_string(), t))
                    } else {
                        Ok(())
                    }
                }
                _ => Ok(()),
            }
        }
        async fn click(&mut self, _t: &Locator) -> SessionResult<()> {
            self.accordion_clicks += 1;
            self.collapsed = false;
            Ok(())
        }
        async fn click_direct(&mut self, _t: &Locator) -> SessionResult<()> {
            self.tab_clicks += 1;
            if self.fail_tab_clicks > 0 {
                self.fail_tab_clicks -= 1;
                return Err(SessionError::Interaction("element click intercepted".into()));
            }
            self.songwriters_shown = true;
            Ok(())
        }
        async fn scroll_into_view(&mut self, _t: &Locator) -> SessionResult<()> {
            Ok(())
        }
        async fn snapshot(&mut self) -> SessionResult<String> {
            let class = if self.collapsed {
                "accordion-button collapsed"
            } else {
                "accordion-button"
            };
            Ok(format!(
                r#"<div class="credits-widget"><button class="{class}">Credits</button></div>"#
            ))
        }
        async fn visibility(&mut self, _t: &Locator) -> SessionResult<Vec<bool>> {
            Ok(vec![true])
        }
        async fn restart(&mut self, _t: Duration) -> SessionResult<()> {
            Ok(())
        }
    }

    fn toggle(retry: &RetryConfig) -> CreditsToggle<'_> {
        CreditsToggle::new(&SiteSelectors::default(), &Timeouts::default(), retry)
    }

    #[tokio::test(start_paused = true)]
    async fn expands_collapsed_accordion_then_clicks_tab() {
        let retry = RetryConfig::default();
        let mut widget = Widget::new(true, 0);

        let outcome = toggle(&retry).run(&mut widget).await;

        assert!(outcome.confirmed());
        assert_eq!(outcome.cycles, 1);
        assert_eq!(widget.accordion_clicks, 1);
        assert!(widget.songwriters_shown);
    }

    #[tokio::test(start_paused = true)]
    async fn already_expanded_accordion_is_not_clicked() {
        let retry = RetryConfig::default();
        let mut widget = Widget::new(false, 0);

        let outcome = toggle(&retry).run(&mut widget).await;

        assert!(outcome.confirmed());
        assert_eq!(widget.accordion_clicks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_within_the_attempt_budget() {
        let retry = RetryConfig::default();
        let mut widget = Widget::new(false, 2);

        let outcome = toggle(&retry).run(&mut widget).await;

        assert!(outcome.confirmed());
        assert_eq!(outcome.cycles, 3);
        assert_eq!(widget.tab_clicks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn three_failures_report_failed_without_a_fourth_cycle() {
        let retry = RetryConfig::default();
        let mut widget = Widget::new(false, usize::MAX);

        let outcome = toggle(&retry).run(&mut widget).await;

        assert_eq!(outcome.state, ToggleState::Failed);
        assert_eq!(outcome.cycles, 3);
        assert_eq!(widget.cycles_started, 3);
        assert_eq!(widget.tab_clicks, 3);
        assert!(!widget.songwriters_shown);
    }

    #[test]
    fn collapsed_detection_reads_class_and_aria() {
        let sel = ".credits-widget .accordion-button";
        assert!(accordion_collapsed(
            r#"<div class="credits-widget"><button class="accordion-button collapsed"></button></div>"#,
            sel
        ));
        assert!(accordion_collapsed(
            r#"<div class="credits-widget"><button class="accordion-button" aria-expanded="false"></button></div>"#,
            sel
        ));
        assert!(!accordion_collapsed(
            r#"<div class="credits-widget"><button class="accordion-button" aria-expanded="true"></button></div>"#,
            sel
        ));
    }
}
