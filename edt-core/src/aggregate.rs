use std::fmt;

use futures::future::join_all;
use serde::Serialize;

use crate::{
    Error, ProgramConfig, RawCourseEvent, Result, extract::extract_events, feed::FeedSource,
    timezone::TimezoneNormalizer, window::QueryWindow,
};

/// 非致命警告，报告给用户但不会中断日历生成
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// One program's fetch / normalization failed; it contributes no events.
    ProgramFailed {
        code: String,
        name: String,
        reason: String,
    },
    /// No program yielded any event.
    NoEvents,
    /// An enabled constant event could not be materialized.
    ConstantEvent {
        index: usize,
        summary: String,
        reason: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramFailed { code, name, reason } => write!(
                f,
                "Erreur lors de la récupération des cours pour {} (code {}): {}",
                name, code, reason
            ),
            Self::NoEvents => write!(
                f,
                "Aucun cours n'a pu être récupéré. Le calendrier sera vide \
                 (réessayez dans 1h, c'est probablement une erreur venant d'ADE)."
            ),
            Self::ConstantEvent {
                index,
                summary,
                reason,
            } => write!(
                f,
                "Événement constant #{} ({}) ignoré: {}",
                index, summary, reason
            ),
        }
    }
}

/// 聚合结果
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Events of every program, in program-list order then feed order.
    pub events: Vec<RawCourseEvent>,
    pub warnings: Vec<Warning>,
}

/// Course aggregator: fetch → normalize → extract, for every program.
pub struct CourseAggregator<S, N> {
    source: S,
    normalizer: N,
    window: QueryWindow,
}

impl<S: FeedSource, N: TimezoneNormalizer> CourseAggregator<S, N> {
    pub const fn new(source: S, normalizer: N, window: QueryWindow) -> Self {
        Self {
            source,
            normalizer,
            window,
        }
    }

    pub const fn window(&self) -> &QueryWindow {
        &self.window
    }

    /// 单个专业的完整流水线
    pub async fn fetch_program(&self, program: &ProgramConfig) -> Result<Vec<RawCourseEvent>> {
        let raw = self.source.fetch(&program.code, &self.window).await?;
        let fixed = self
            .normalizer
            .normalize(&raw, &program.code)
            .ok_or_else(|| Error::NoData(program.code.clone()))?;

        Ok(extract_events(&fixed).collect())
    }

    /// Run every program's pipeline concurrently.
    ///
    /// Failures are turned into warnings; the result keeps program-list order
    /// whatever the completion order.
    pub async fn aggregate(&self, programs: &[ProgramConfig]) -> Aggregation {
        let results = join_all(programs.iter().map(|program| async move {
            tracing::info!("Récupération des cours pour {}...", program.name);
            (program, self.fetch_program(program).await)
        }))
        .await;

        let mut aggregation = Aggregation::default();
        for (program, result) in results {
            match result {
                Ok(events) => {
                    tracing::info!(
                        "{} cours récupérés pour {} ({})",
                        events.len(),
                        program.name,
                        program.code
                    );
                    aggregation.events.extend(events);
                }
                Err(e) => {
                    let warning = Warning::ProgramFailed {
                        code: program.code.clone(),
                        name: program.name.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!("{}", warning);
                    aggregation.warnings.push(warning);
                }
            }
        }

        if aggregation.events.is_empty() {
            tracing::warn!("{}", Warning::NoEvents);
            aggregation.warnings.push(Warning::NoEvents);
        }

        aggregation
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::HashMap, time::Duration};

    use async_trait::async_trait;

    use super::*;
    use crate::timezone::ParisNormalizer;

    /// 内存订阅源，可为每个代码设置延迟
    #[derive(Default)]
    pub(crate) struct MockSource {
        pub feeds: HashMap<String, (u64, Option<String>)>,
    }

    impl MockSource {
        pub fn with_feed(mut self, code: &str, delay_ms: u64, feed: Option<String>) -> Self {
            self.feeds.insert(code.to_string(), (delay_ms, feed));
            self
        }
    }

    #[async_trait]
    impl FeedSource for MockSource {
        fn name(&self) -> &str {
            "mock"
        }

        async fn fetch(&self, code: &str, _window: &QueryWindow) -> Result<String> {
            match self.feeds.get(code) {
                Some((delay, feed)) => {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    feed.clone().ok_or(Error::Timeout)
                }
                None => Err(Error::Feed {
                    program: code.to_string(),
                    message: "unknown code".to_string(),
                }),
            }
        }
    }

    pub(crate) fn feed_with(titles: &[&str]) -> String {
        let mut text = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n");
        for (i, title) in titles.iter().enumerate() {
            text.push_str(&format!(
                "BEGIN:VEVENT\r\nSUMMARY:{}\r\nDTSTART:202410{:02}T080000Z\r\nDTEND:202410{:02}T100000Z\r\nLOCATION:Salle {}\r\nEND:VEVENT\r\n",
                title,
                i + 1,
                i + 1,
                i
            ));
        }
        text.push_str("END:VCALENDAR\r\n");
        text
    }

    pub(crate) fn program(code: &str, name: &str) -> ProgramConfig {
        ProgramConfig {
            code: code.to_string(),
            name: name.to_string(),
            courses: Vec::new(),
        }
    }

    #[tokio::test]
    async fn failed_program_does_not_affect_others() {
        let source = MockSource::default()
            .with_feed("A", 0, None)
            .with_feed("B", 0, Some(feed_with(&["Syntaxe", "Sémantique", "Pragmatique"])));
        let aggregator = CourseAggregator::new(source, ParisNormalizer, QueryWindow::default());

        let result = aggregator
            .aggregate(&[program("A", "Master A"), program("B", "Master B")])
            .await;

        let titles: Vec<_> = result.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Syntaxe", "Sémantique", "Pragmatique"]);
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(
            &result.warnings[0],
            Warning::ProgramFailed { code, .. } if code == "A"
        ));
    }

    #[tokio::test]
    async fn result_follows_program_order_not_completion_order() {
        let source = MockSource::default()
            .with_feed("slow", 50, Some(feed_with(&["Lent"])))
            .with_feed("fast", 0, Some(feed_with(&["Rapide"])));
        let aggregator = CourseAggregator::new(source, ParisNormalizer, QueryWindow::default());

        let result = aggregator
            .aggregate(&[program("slow", "Slow"), program("fast", "Fast")])
            .await;

        let titles: Vec<_> = result.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Lent", "Rapide"]);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn normalization_no_data_is_a_warning() {
        let source = MockSource::default()
            .with_feed("html", 0, Some("<html>maintenance</html>".to_string()));
        let aggregator = CourseAggregator::new(source, ParisNormalizer, QueryWindow::default());

        let result = aggregator.aggregate(&[program("html", "HTML")]).await;
        assert!(result.events.is_empty());
        assert_eq!(result.warnings.len(), 2);
        assert!(matches!(
            &result.warnings[0],
            Warning::ProgramFailed { reason, .. } if reason.contains("no data")
        ));
        assert_eq!(result.warnings[1], Warning::NoEvents);
    }

    #[tokio::test]
    async fn empty_program_list_reports_no_events() {
        let aggregator =
            CourseAggregator::new(MockSource::default(), ParisNormalizer, QueryWindow::default());
        let result = aggregator.aggregate(&[]).await;
        assert!(result.events.is_empty());
        assert_eq!(result.warnings, vec![Warning::NoEvents]);
    }

    #[tokio::test]
    async fn utc_feed_is_shifted_to_paris() {
        let source = MockSource::default().with_feed("B", 0, Some(feed_with(&["Syntaxe"])));
        let aggregator = CourseAggregator::new(source, ParisNormalizer, QueryWindow::default());

        let events = aggregator.fetch_program(&program("B", "B")).await.unwrap();
        assert_eq!(events[0].start.to_string(), "2024-10-01 10:00:00");
        assert_eq!(events[0].location, "Salle 0");
    }
}
