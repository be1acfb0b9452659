//! Proactive restart policy for long-running sessions.
//!
//! The storefront stops responding after many detail navigations on one
//! browser, so the session is recycled every `restart_every` items instead of
//! waiting for it to fail.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::scraping::BrowserSession;

/// Process-scoped pipeline state. Owned by [`SessionLifecycle`]; other
/// components only borrow the session for the duration of one call.
#[derive(Debug)]
pub struct PipelineState<S> {
    session: S,
    restarts: usize,
    processed_since_restart: usize,
}

impl<S> PipelineState<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            restarts: 0,
            processed_since_restart: 0,
        }
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn processed_since_restart(&self) -> usize {
        self.processed_since_restart
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    pub restart_every: usize,
    /// Page-load timeout given to every restarted session.
    pub restart_page_load: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            restart_every: 10,
            restart_page_load: Duration::from_secs(60),
        }
    }
}

pub struct SessionLifecycle<S> {
    state: PipelineState<S>,
    policy: LifecyclePolicy,
}

impl<S: BrowserSession> SessionLifecycle<S> {
    pub fn new(session: S, policy: LifecyclePolicy) -> Self {
        Self {
            state: PipelineState::new(session),
            policy,
        }
    }

    pub fn state(&self) -> &PipelineState<S> {
        &self.state
    }

    /// Borrow the session for work that does not count as an item
    /// (filter application, catalog collection).
    pub fn session(&mut self) -> &mut S {
        &mut self.state.session
    }

    /// Run one item's work against the current session, restarting it first
    /// if it has already served `restart_every` items. The item is counted
    /// whether or not `f` succeeds.
    pub async fn with_session<'s, T>(
        &'s mut self,
        f: impl FnOnce(&'s mut S) -> BoxFuture<'s, T>,
    ) -> T {
        self.restart_if_due().await;
        self.state.processed_since_restart += 1;
        f(&mut self.state.session).await
    }

    async fn restart_if_due(&mut self) {
        let every = self.policy.restart_every;
        if every == 0 || self.state.processed_since_restart < every {
            return;
        }

        info!(
            "♻️ session served {} items, restarting (restart #{})",
            self.state.processed_since_restart,
            self.state.restarts + 1
        );
        match self.state.session.restart(self.policy.restart_page_load).await {
            Ok(()) => {
                self.state.restarts += 1;
                self.state.processed_since_restart = 0;
            }
            Err(e) => {
                // Keep the old session; the next item tries again.
                warn!("session restart failed, continuing on current session: {}", e);
            }
        }
    }

    pub fn into_session(self) -> S {
        self.state.session
    }
}
