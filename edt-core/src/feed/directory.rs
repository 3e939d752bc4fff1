use std::path::PathBuf;

use async_trait::async_trait;

use crate::{Error, Result, feed::FeedSource, window::QueryWindow};

/// 从本地目录读取 `<code>.ics` 快照
///
/// The query window is ignored: a snapshot already covers whatever range it
/// was exported for.
#[derive(Debug, Clone)]
pub struct DirectoryFeedSource {
    dir: PathBuf,
}

impl DirectoryFeedSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn feed_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.ics"))
    }
}

#[async_trait]
impl FeedSource for DirectoryFeedSource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(&self, code: &str, _window: &QueryWindow) -> Result<String> {
        let path = self.feed_path(code);
        tokio::fs::read_to_string(&path).await.map_err(|e| Error::Feed {
            program: code.to_string(),
            message: format!("Failed to read {}: {}", path.display(), e),
        })
    }
}
