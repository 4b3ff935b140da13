//! Google Calendar as a rotamirror target.
//!
//! Authenticates with a service account key and talks to the Calendar v3
//! REST API directly.

mod convert;
pub mod error;
pub mod session;
pub mod store;
pub mod types;

pub use error::GoogleError;
pub use session::{ServiceAccountKey, Session, StaticToken, TokenSource};
pub use store::{DEFAULT_API_BASE, DEFAULT_TIMEOUT, GoogleCalendarStore};
