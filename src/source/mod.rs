//! Remote image source contract and implementations.

mod wallhaven;

pub use wallhaven::{SourceConfig, WallhavenSource};

use crate::error::SourceError;
use async_trait::async_trait;

/// One search hit offered by a source.
#[derive(Debug, Clone)]
pub struct RemoteImage {
    pub id: String,
    pub url: String,
}

/// Remote image search and download contract.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Searches for candidate images. An empty list means no results for the
    /// query, not an error.
    async fn search(&self, query: &str, page_hint: u32) -> Result<Vec<RemoteImage>, SourceError>;

    /// Fetches the image bytes behind one candidate URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}
