//! Feed event extraction.
//!
//! Tokenizing (line unfolding, `NAME;PARAMS:VALUE` splitting) is delegated to
//! [`ical::PropertyParser`]; this module groups the resulting properties into
//! `VEVENT` blocks and turns each block into a typed [`BlockOutcome`]. A bad
//! block never stops the extraction of the blocks after it.

use chrono::NaiveDateTime;
use ical::{PropertyParser, property::Property};

use crate::types::{DISPLAY_TIMEZONE, LOCATION_NOT_SPECIFIED, RawCourseEvent};

/// Compact timestamp format used by normalized feeds.
pub const FEED_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// 跳过一个事件块的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    MissingStart,
    MissingEnd,
    /// The timestamp is not in `YYYYMMDDTHHMMSS` form.
    InvalidTimestamp(String),
    /// The timestamp carries a `TZID` other than the display timezone.
    ForeignTimezone(String),
    EndNotAfterStart,
    /// The feed ended (or a new `VEVENT` began) before `END:VEVENT`.
    Unterminated,
}

/// 单个事件块的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Event(RawCourseEvent),
    Skipped(SkipReason),
}

impl BlockOutcome {
    pub fn into_event(self) -> Option<RawCourseEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Skipped(reason) => {
                tracing::debug!(?reason, "Skipping feed block");
                None
            }
        }
    }
}

type Stamp = Result<NaiveDateTime, SkipReason>;

#[derive(Debug, Default)]
struct BlockBuilder {
    title: Option<String>,
    start: Option<Stamp>,
    end: Option<Stamp>,
    location: Option<String>,
    /// Depth of nested components (VALARM, …) inside the event.
    nested: usize,
}

impl BlockBuilder {
    fn accept(&mut self, name: &str, property: &Property) {
        let value = property.value.as_deref().unwrap_or("").trim();
        match name {
            "SUMMARY" => self.title = non_empty(unescape_text(value)),
            "LOCATION" => self.location = non_empty(unescape_text(value)),
            "DTSTART" => self.start = Some(parse_stamp(property, value)),
            "DTEND" => self.end = Some(parse_stamp(property, value)),
            _ => {}
        }
    }

    fn finish(self) -> BlockOutcome {
        match self.build() {
            Ok(event) => BlockOutcome::Event(event),
            Err(reason) => BlockOutcome::Skipped(reason),
        }
    }

    fn build(self) -> Result<RawCourseEvent, SkipReason> {
        let title = self.title.ok_or(SkipReason::MissingTitle)?;
        let start = self.start.ok_or(SkipReason::MissingStart)??;
        let end = self.end.ok_or(SkipReason::MissingEnd)??;

        if end <= start {
            return Err(SkipReason::EndNotAfterStart);
        }

        Ok(RawCourseEvent {
            title,
            start,
            end,
            location: self
                .location
                .unwrap_or_else(|| LOCATION_NOT_SPECIFIED.to_string()),
        })
    }
}

/// Lazy iterator over the `VEVENT` blocks of a feed.
pub struct FeedBlocks<'a> {
    properties: PropertyParser<&'a [u8]>,
    current: Option<BlockBuilder>,
}

impl<'a> FeedBlocks<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            properties: PropertyParser::from_reader(text.as_bytes()),
            current: None,
        }
    }
}

impl Iterator for FeedBlocks<'_> {
    type Item = BlockOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(property) = self.properties.next() {
            let property = match property {
                Ok(property) => property,
                Err(e) => {
                    tracing::trace!("Ignoring malformed feed line: {}", e);
                    continue;
                }
            };

            let name = property.name.trim().to_ascii_uppercase();
            let value = property.value.as_deref().unwrap_or("").trim();
            let is_vevent = value.eq_ignore_ascii_case("VEVENT");

            match self.current.as_mut() {
                None => {
                    if name == "BEGIN" && is_vevent {
                        self.current = Some(BlockBuilder::default());
                    }
                }
                Some(block) if block.nested > 0 => match name.as_str() {
                    "BEGIN" => block.nested += 1,
                    "END" => block.nested -= 1,
                    _ => {}
                },
                Some(block) => match name.as_str() {
                    "BEGIN" if is_vevent => {
                        // 上一个块没有 END:VEVENT
                        self.current = Some(BlockBuilder::default());
                        return Some(BlockOutcome::Skipped(SkipReason::Unterminated));
                    }
                    "BEGIN" => block.nested += 1,
                    "END" if is_vevent => {
                        let block = self.current.take()?;
                        return Some(block.finish());
                    }
                    "END" => {
                        // END:VCALENDAR inside an open event
                        self.current = None;
                        return Some(BlockOutcome::Skipped(SkipReason::Unterminated));
                    }
                    _ => block.accept(&name, &property),
                },
            }
        }

        self.current
            .take()
            .map(|_| BlockOutcome::Skipped(SkipReason::Unterminated))
    }
}

/// Lazy, non-restartable sequence of the well-formed events of a feed.
pub struct FeedEvents<'a> {
    blocks: FeedBlocks<'a>,
}

impl Iterator for FeedEvents<'_> {
    type Item = RawCourseEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocks.by_ref().find_map(BlockOutcome::into_event)
    }
}

/// Extract every well-formed course event from normalized feed text.
///
/// Malformed blocks are dropped silently; the remaining events keep their
/// source order.
pub fn extract_events(text: &str) -> FeedEvents<'_> {
    FeedEvents {
        blocks: FeedBlocks::new(text),
    }
}

fn parse_stamp(property: &Property, value: &str) -> Stamp {
    if let Some(tzid) = param_value(property, "TZID") {
        if tzid != DISPLAY_TIMEZONE.name() {
            return Err(SkipReason::ForeignTimezone(tzid.to_string()));
        }
    }

    NaiveDateTime::parse_from_str(value, FEED_TIMESTAMP_FORMAT)
        .map_err(|_| SkipReason::InvalidTimestamp(value.to_string()))
}

fn param_value<'p>(property: &'p Property, key: &str) -> Option<&'p str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .and_then(|(_, values)| values.first())
        .map(|value| value.trim().trim_matches('"'))
}

/// RFC 5545 TEXT 反转义
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
