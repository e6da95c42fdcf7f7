//! Fetcher trait for pluggable retrieval strategies.
//!
//! A fetcher turns a listing URL into raw content. The orchestrator holds
//! one fetcher per [`FetchStrategy`] and switches between them when a
//! strategy is blocked.
//!
//! # Usage
//!
//! ```rust,ignore
//! use listing_acquisition::traits::fetcher::Fetcher;
//!
//! let raw = fetcher.fetch("https://www.rightmove.co.uk/properties/123").await?;
//! assert_eq!(raw.strategy, fetcher.strategy());
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::FetchResult;
use crate::types::content::RawContent;
use crate::types::listing::FetchStrategy;

/// One retrieval strategy.
///
/// Implementations must not apply their own per-host gating; the
/// orchestrator's host gates wrap every call.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a single URL.
    async fn fetch(&self, url: &str) -> FetchResult<RawContent>;

    /// The strategy this fetcher implements.
    fn strategy(&self) -> FetchStrategy;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> FetchResult<RawContent> {
        (**self).fetch(url).await
    }

    fn strategy(&self) -> FetchStrategy {
        (**self).strategy()
    }
}
