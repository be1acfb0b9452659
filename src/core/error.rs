use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a [`crate::scraping::BrowserSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timed out after {}ms waiting for {what}", after.as_millis())]
    Timeout { what: String, after: Duration },

    #[error("element not found: {0}")]
    NotFound(String),

    #[error("interaction failed: {0}")]
    Interaction(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser session closed")]
    Closed,
}

impl SessionError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Worth another attempt on the same session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout { .. } | SessionError::NotFound(_) | SessionError::Interaction(_)
        )
    }
}

impl From<chromiumoxide::error::CdpError> for SessionError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        SessionError::Interaction(e.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_condition() {
        let e = SessionError::timeout("visible #collapseFilterGender", Duration::from_secs(10));
        assert_eq!(
            e.to_string(),
            "timed out after 10000ms waiting for visible #collapseFilterGender"
        );
        assert!(e.is_transient());
    }

    #[test]
    fn launch_and_closed_are_not_transient() {
        assert!(!SessionError::Launch("no browser".into()).is_transient());
        assert!(!SessionError::Closed.is_transient());
        assert!(!SessionError::Navigation("net::ERR".into()).is_transient());
    }
}
