use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};

use crate::{Error, Result, feed::FeedSource, window::QueryWindow};

/// ADE HTTP 订阅源构建器
pub struct AdeFeedSourceBuilder {
    pub client_builder: ClientBuilder,
    pub base_url: String,
}

/// Fetches anonymous iCalendar exports from an ADE Campus instance.
pub struct AdeFeedSource {
    client: Client,
    base_url: String,
}

impl AdeFeedSourceBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client_builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("EDT-LOGOS-Rust/0.1.0");

        Self {
            client_builder,
            base_url: base_url.into(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.client_builder = self
            .client_builder
            .timeout(Duration::from_secs(timeout_secs));
        self
    }

    pub fn build(self) -> Result<AdeFeedSource> {
        let client = self.client_builder.build()?;

        Ok(AdeFeedSource {
            client,
            base_url: self.base_url,
        })
    }
}

impl AdeFeedSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        AdeFeedSourceBuilder::new(base_url).build()
    }

    /// 查询参数
    pub fn query_params(code: &str, window: &QueryWindow) -> Vec<(&'static str, String)> {
        vec![
            ("resources", code.to_string()),
            ("projectId", window.academic_year.to_string()),
            ("calType", "ical".to_string()),
            ("firstDate", window.start_param()),
            ("lastDate", window.end_param()),
            ("ficheEtalon", window.template_sheet.clone()),
        ]
    }

    fn handle_error_req(code: &str, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout
        } else if error.is_request() || error.is_connect() {
            Error::Feed {
                program: code.to_string(),
                message: format!("Request failed: {}", error),
            }
        } else {
            Error::Http(error)
        }
    }
}

#[async_trait]
impl FeedSource for AdeFeedSource {
    fn name(&self) -> &str {
        "ade"
    }

    async fn fetch(&self, code: &str, window: &QueryWindow) -> Result<String> {
        tracing::debug!("Fetching ADE feed for {} from {}", code, self.base_url);

        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::query_params(code, window))
            .send()
            .await
            .map_err(|e| Self::handle_error_req(code, e))?;

        if !response.status().is_success() {
            return Err(Error::Feed {
                program: code.to_string(),
                message: format!("HTTP {} error", response.status()),
            });
        }

        response
            .text()
            .await
            .map_err(|e| Self::handle_error_req(code, e))
    }
}
