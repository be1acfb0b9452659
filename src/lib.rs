pub mod core;
pub mod pipeline;
pub mod scraping;
pub mod sink;

// --- Primary exports ---
pub use core::types;
pub use core::types::*;
pub use core::{ScoutConfig, SessionError, SessionResult};
pub use pipeline::Pipeline;
pub use scraping::{BrowserSession, CdpSession, Locator, WaitCondition};
