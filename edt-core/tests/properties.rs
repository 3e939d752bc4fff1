//! Property-based tests for feed extraction, course filtering and aggregation order.

use std::{collections::HashMap, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use edt_core::{
    ProgramConfig, RawCourseEvent, Result,
    aggregate::CourseAggregator,
    extract::extract_events,
    feed::FeedSource,
    filter::{Selection, filter_courses},
    timezone::ParisNormalizer,
    window::QueryWindow,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_datetime() -> impl Strategy<Value = NaiveDateTime> {
    (2024i32..=2025, 1u32..=12, 1u32..=28, 0u32..=21, 0u32..=59).prop_map(|(y, m, d, h, min)| {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    })
}

fn arb_title() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Syntaxe".to_string()),
        Just("Sémantique".to_string()),
        Just("Logique".to_string()),
        Just("Pragmatique".to_string()),
        Just("Philosophie du langage".to_string()),
    ]
}

fn arb_event() -> impl Strategy<Value = RawCourseEvent> {
    (arb_title(), arb_datetime(), 15i64..=180).prop_map(|(title, start, minutes)| {
        RawCourseEvent {
            title,
            start,
            end: start + Duration::minutes(minutes),
            location: "Salle 1".to_string(),
        }
    })
}

fn feed_of(blocks: &[(String, NaiveDateTime, NaiveDateTime)]) -> String {
    let mut text = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n");
    for (title, start, end) in blocks {
        text.push_str("BEGIN:VEVENT\r\n");
        text.push_str(&format!("SUMMARY:{}\r\n", title));
        text.push_str(&format!(
            "DTSTART;TZID=Europe/Paris:{}\r\n",
            start.format("%Y%m%dT%H%M%S")
        ));
        text.push_str(&format!(
            "DTEND;TZID=Europe/Paris:{}\r\n",
            end.format("%Y%m%dT%H%M%S")
        ));
        text.push_str("END:VEVENT\r\n");
    }
    text.push_str("END:VCALENDAR\r\n");
    text
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn extraction_never_panics(text in "\\PC*") {
        let _ = extract_events(&text).count();
    }

    #[test]
    fn extraction_never_panics_on_calendar_shaped_noise(
        lines in prop::collection::vec("(BEGIN|END|SUMMARY|DTSTART|DTEND)[:;][A-Za-z0-9=/:]{0,20}", 0..40)
    ) {
        let text = lines.join("\r\n");
        let _ = extract_events(&text).count();
    }

    #[test]
    fn valid_blocks_are_extracted_in_order(
        events in prop::collection::vec(arb_event(), 0..20)
    ) {
        let blocks: Vec<_> = events
            .iter()
            .map(|e| (e.title.clone(), e.start, e.end))
            .collect();
        let text = feed_of(&blocks);

        let extracted: Vec<_> = extract_events(&text).collect();
        prop_assert_eq!(extracted.len(), events.len());
        for (got, want) in extracted.iter().zip(&events) {
            prop_assert_eq!(&got.title, &want.title);
            prop_assert_eq!(got.start, want.start);
            prop_assert_eq!(got.end, want.end);
            prop_assert!(got.start < got.end);
        }
    }

    #[test]
    fn inverted_blocks_are_dropped(
        events in prop::collection::vec(arb_event(), 1..20),
        mask in prop::collection::vec(any::<bool>(), 20)
    ) {
        let blocks: Vec<_> = events
            .iter()
            .zip(&mask)
            .map(|(e, &swap)| {
                if swap {
                    (e.title.clone(), e.end, e.start)
                } else {
                    (e.title.clone(), e.start, e.end)
                }
            })
            .collect();
        let kept = mask.iter().take(events.len()).filter(|&&swap| !swap).count();

        let extracted: Vec<_> = extract_events(&feed_of(&blocks)).collect();
        prop_assert_eq!(extracted.len(), kept);
        prop_assert!(extracted.iter().all(|e| e.start < e.end));
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn filtering_is_idempotent(
        events in prop::collection::vec(arb_event(), 0..30),
        selected in prop::collection::btree_set(arb_title(), 0..5)
    ) {
        let selection: Selection = selected.into_iter().collect();
        let once = filter_courses(&events, &selection);
        let twice = filter_courses(&once, &selection);
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.iter().all(|e| selection.matches(&e.title)));
    }

    #[test]
    fn filtering_preserves_relative_order(
        events in prop::collection::vec(arb_event(), 0..30),
        selected in prop::collection::btree_set(arb_title(), 0..5)
    ) {
        let selection: Selection = selected.into_iter().collect();
        let filtered = filter_courses(&events, &selection);
        let expected: Vec<_> = events
            .iter()
            .filter(|e| selection.matches(&e.title))
            .cloned()
            .collect();
        prop_assert_eq!(filtered, expected);
    }

    #[test]
    fn empty_selection_yields_nothing(events in prop::collection::vec(arb_event(), 0..30)) {
        prop_assert!(filter_courses(&events, &Selection::new()).is_empty());
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Serves one single-event feed per program after a fixed delay.
struct DelayedSource {
    delays: HashMap<String, u64>,
}

#[async_trait]
impl FeedSource for DelayedSource {
    fn name(&self) -> &str {
        "delayed"
    }

    async fn fetch(&self, code: &str, _window: &QueryWindow) -> Result<String> {
        let delay = self.delays.get(code).copied().unwrap_or_default();
        tokio::time::sleep(StdDuration::from_millis(delay)).await;

        let start = NaiveDate::from_ymd_opt(2024, 10, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Ok(feed_of(&[(code.to_string(), start, start + Duration::hours(2))]))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn aggregation_keeps_program_order(delays in prop::collection::vec(0u64..15, 1..6)) {
        let programs: Vec<_> = (0..delays.len())
            .map(|i| ProgramConfig {
                code: format!("P{}", i),
                name: format!("Programme {}", i),
                courses: Vec::new(),
            })
            .collect();
        let source = DelayedSource {
            delays: programs
                .iter()
                .map(|p| p.code.clone())
                .zip(delays.iter().copied())
                .collect(),
        };
        let aggregator = CourseAggregator::new(source, ParisNormalizer::new(), QueryWindow::default());

        let aggregation = tokio_test::block_on(aggregator.aggregate(&programs));

        let titles: Vec<_> = aggregation.events.iter().map(|e| e.title.clone()).collect();
        let codes: Vec<_> = programs.iter().map(|p| p.code.clone()).collect();
        prop_assert_eq!(titles, codes);
        prop_assert!(aggregation.warnings.is_empty());
    }
}
