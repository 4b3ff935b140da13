pub mod inspect;
pub mod sync;

use std::time::Duration;

/// Request timeout for feed and calendar calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
