use serde::{Deserialize, Serialize};

use crate::{
    CalendarEvent, RawCourseEvent,
    aggregate::{Aggregation, CourseAggregator, Warning},
    config::CalendarConfig,
    constant::materialize_all,
    feed::FeedSource,
    filter::{Selection, filter_courses},
    timezone::TimezoneNormalizer,
};

/// 日历组件顶部工具栏布局
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderToolbar {
    pub left: String,
    pub center: String,
    pub right: String,
}

impl Default for HeaderToolbar {
    fn default() -> Self {
        Self {
            left: "prev,next today".to_string(),
            center: "title".to_string(),
            right: "dayGridMonth,timeGridWeek,timeGridDay".to_string(),
        }
    }
}

/// 渲染端的视图配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOptions {
    pub header_toolbar: HeaderToolbar,
    pub initial_view: String,
    pub slot_min_time: String,
    pub slot_max_time: String,
    pub all_day_slot: bool,
    pub height: u32,
    pub locale: String,
    /// First day of the week, 1 = Monday
    pub first_day: u32,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            header_toolbar: HeaderToolbar::default(),
            initial_view: "timeGridWeek".to_string(),
            slot_min_time: "08:00:00".to_string(),
            slot_max_time: "20:00:00".to_string(),
            all_day_slot: false,
            height: 700,
            locale: "fr".to_string(),
            first_day: 1,
        }
    }
}

/// View options plus the events, serialized as one options object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarView {
    #[serde(flatten)]
    pub options: ViewOptions,
    pub events: Vec<CalendarEvent>,
}

/// 一次生成的完整结果
#[derive(Debug, Clone, Serialize)]
pub struct CalendarReport {
    pub view: CalendarView,
    pub warnings: Vec<Warning>,
}

/// Merge filtered course events with materialized constant events.
///
/// Courses come first, then constant events, each in input order. Overlaps
/// are kept as-is.
pub fn compose(filtered: Vec<RawCourseEvent>, constant: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    let mut events: Vec<CalendarEvent> = Vec::with_capacity(filtered.len() + constant.len());
    events.extend(filtered.into_iter().map(CalendarEvent::from));
    events.extend(constant);
    events
}

/// 日历引擎：聚合 → 过滤 → 常驻事件 → 合成
///
/// Pure with respect to its inputs; callers re-run it whenever the config or
/// the selection changes.
pub struct CalendarEngine<S, N> {
    aggregator: CourseAggregator<S, N>,
    view: ViewOptions,
}

impl<S: FeedSource, N: TimezoneNormalizer> CalendarEngine<S, N> {
    pub fn new(aggregator: CourseAggregator<S, N>) -> Self {
        Self {
            aggregator,
            view: ViewOptions::default(),
        }
    }

    pub const fn aggregator(&self) -> &CourseAggregator<S, N> {
        &self.aggregator
    }

    /// Fetch every program and build the calendar.
    pub async fn build(&self, config: &CalendarConfig, selection: &Selection) -> CalendarReport {
        let aggregation = self.aggregator.aggregate(&config.masters).await;
        self.assemble(aggregation, config, selection)
    }

    /// Build the calendar from an already aggregated event set.
    pub fn assemble(
        &self,
        aggregation: Aggregation,
        config: &CalendarConfig,
        selection: &Selection,
    ) -> CalendarReport {
        let Aggregation {
            events,
            mut warnings,
        } = aggregation;

        let filtered = filter_courses(&events, selection);
        tracing::debug!(
            "{} of {} course events match the selection",
            filtered.len(),
            events.len()
        );

        let materialized = materialize_all(&config.constant_events);
        warnings.extend(materialized.errors.into_iter().map(|(index, e)| {
            Warning::ConstantEvent {
                index,
                summary: config.constant_events[index].summary().to_string(),
                reason: e.to_string(),
            }
        }));

        CalendarReport {
            view: CalendarView {
                options: self.view.clone(),
                events: compose(filtered, materialized.events),
            },
            warnings,
        }
    }
}
