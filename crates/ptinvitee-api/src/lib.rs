//! HTTP plumbing for private-tracker forum pages.
//!
//! - **[`TransportConfig`]** builds a `reqwest::Client` with connect and
//!   read timeouts, user agent, optional proxy, and credential headers
//!   ([`SessionAuth`]).
//! - **[`SiteSession`]** resolves site-relative paths against a base URL and
//!   turns HTTP failures and logged-out pages into typed [`Error`]s.

pub mod error;
pub mod session;
pub mod transport;

pub use error::Error;
pub use session::{Page, SiteSession};
pub use transport::{DEFAULT_USER_AGENT, SessionAuth, TransportConfig};
