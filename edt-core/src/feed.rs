pub mod ade;
pub mod directory;

use async_trait::async_trait;

use crate::{Result, window::QueryWindow};

pub use ade::*;
pub use directory::*;

/// 订阅源传输层
///
/// Retrieves the raw calendar text of one program. The aggregator treats any
/// error returned here as a non-fatal, per-program failure.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Source name, used in logs
    fn name(&self) -> &str;

    /// Fetch the raw feed of `code` for the given query window
    async fn fetch(&self, code: &str, window: &QueryWindow) -> Result<String>;
}

#[async_trait]
impl<S: FeedSource + ?Sized> FeedSource for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, code: &str, window: &QueryWindow) -> Result<String> {
        (**self).fetch(code, window).await
    }
}
