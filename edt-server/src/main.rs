mod handlers;
mod server;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Result;
use edt_core::{compose::CalendarEngine, config::DEFAULT_CONFIG_FILE, prelude::*};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edt_server=info,edt_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 获取ADE订阅地址
    let feed_url = env::var("EDT_FEED_URL")
        .map_err(|_| anyhow::anyhow!("EDT_FEED_URL environment variable is required"))?;

    let config_path =
        PathBuf::from(env::var("EDT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string()));
    let (config, config_path) = match CalendarConfig::load_for_update(&config_path) {
        Ok(config) => {
            tracing::info!(
                "Loaded {} program(s) and {} constant event(s) from {}",
                config.masters.len(),
                config.constant_events.len(),
                config_path.display()
            );
            (config, Some(config_path))
        }
        Err(e) => {
            // 不覆盖无法读取的文件
            tracing::warn!("{}; starting empty, edits will not be saved", e);
            (CalendarConfig::default(), None)
        }
    };

    let source: Arc<dyn FeedSource> = Arc::new(AdeFeedSource::new(feed_url)?);
    let engine = CalendarEngine::new(CourseAggregator::new(
        source,
        ParisNormalizer::new(),
        QueryWindow::default(),
    ));

    // 启动服务器
    server::start_server(AppState::new(config_path, config, engine)).await
}
