//! Shared utilities for hotspot analysis.

pub mod clock;
pub mod error;
pub mod logging;
pub mod time;

pub use clock::{Clock, SystemClock};
pub use error::UtilsError;
pub use logging::{init_logging, LogFormat};
pub use time::{format_timestamp, parse_date};
