//! Browser session management
//!
//! Wraps a Chrome/Chromium instance behind the operations the agent needs:
//! launch/connect, tab management, navigation, script evaluation and the
//! per-step perception capture ([`BrowserSession::capture_state`]).

pub mod config;
pub mod session;
pub mod state;

pub use config::{ConnectionOptions, LaunchOptions};
pub use session::BrowserSession;
pub use state::{PageState, TabInfo};
