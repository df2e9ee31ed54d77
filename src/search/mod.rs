//! Rate-limited search client
//!
//! This module wraps the hosting platform's code-search API, including:
//! - One filename query per repository, with full pagination
//! - Primary rate budget tracking fed by response headers
//! - Exponential backoff with jitter for secondary rate limits
//! - Not-found / renamed classification via the repository metadata
//!   endpoint

mod backoff;
mod budget;
mod client;

pub use backoff::Backoff;
pub use budget::{
    SharedBudget, AUTHENTICATED_SEARCHES_PER_MINUTE, UNAUTHENTICATED_SEARCHES_PER_MINUTE,
};
pub use client::{build_http_client, SearchClient, SearchOutcome};
