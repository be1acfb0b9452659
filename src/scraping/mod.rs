pub mod browser_manager;
pub mod cdp_session;
pub mod query;
pub mod session;
pub mod snapshots;

pub use cdp_session::CdpSession;
pub use query::{Document, Node};
pub use session::{BrowserSession, Locator, WaitCondition};
pub use snapshots::{DirSnapshots, NoSnapshots, SnapshotSink};
