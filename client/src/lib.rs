//! Remote challenge and directory source.
//!
//! [`HttpClient`] speaks the blockchain API one page at a time. [`Fetcher`]
//! drives any [`ChallengeSource`] or [`DirectorySource`] through cursors,
//! retrying transient failures with a [`Retrier`] and pausing between pages.

pub mod error;
pub mod fetcher;
pub mod http;
pub mod retry;
pub mod source;

pub use error::FetchError;
pub use fetcher::{FetchOptions, Fetcher};
pub use http::{classify_status, decode_page, parse_rate_limit, HttpClient, DEFAULT_API_URL};
pub use retry::{Backoff, Retrier, Sleeper, ThreadSleeper};
pub use source::{ChallengeSource, DirectorySource, Page};
