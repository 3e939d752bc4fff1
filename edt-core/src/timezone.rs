use std::sync::LazyLock;

use chrono::{NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::{extract::FEED_TIMESTAMP_FORMAT, types::DISPLAY_TIMEZONE};

static STAMP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(DTSTART|DTEND)((?:;[^:]*)?):(\d{8}T\d{6})(Z?)$")
        .expect("timestamp line pattern is valid")
});

static TZID_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i);TZID="?([^;:"]+)"?"#).expect("TZID pattern is valid")
});

/// 时区规范化
///
/// Rewrites raw feed text so every timestamp can be read as wall-clock time
/// in [`DISPLAY_TIMEZONE`]. Returning `None` means the feed carried no usable
/// data for this program.
pub trait TimezoneNormalizer: Send + Sync {
    fn normalize(&self, raw: &str, code: &str) -> Option<String>;
}

/// Normalizer for ADE feeds, targeting `Europe/Paris`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParisNormalizer;

impl ParisNormalizer {
    pub const fn new() -> Self {
        Self
    }

    fn normalize_line(line: &str) -> String {
        let Some(caps) = STAMP_LINE.captures(line) else {
            return line.to_string();
        };

        let name = caps[1].to_ascii_uppercase();
        let params = &caps[2];
        let stamp = &caps[3];
        let is_utc = !caps[4].is_empty();

        let Ok(naive) = NaiveDateTime::parse_from_str(stamp, FEED_TIMESTAMP_FORMAT) else {
            return line.to_string();
        };

        let local = if is_utc {
            Utc.from_utc_datetime(&naive)
                .with_timezone(&DISPLAY_TIMEZONE)
                .naive_local()
        } else {
            match TZID_PARAM.captures(params) {
                Some(tz) if tz[1].trim() == DISPLAY_TIMEZONE.name() => naive,
                // 不处理其他时区
                Some(_) => return line.to_string(),
                None => naive,
            }
        };

        format!(
            "{};TZID={}:{}",
            name,
            DISPLAY_TIMEZONE.name(),
            local.format(FEED_TIMESTAMP_FORMAT)
        )
    }
}

impl TimezoneNormalizer for ParisNormalizer {
    fn normalize(&self, raw: &str, code: &str) -> Option<String> {
        let lines = unfold_lines(raw);

        if !lines
            .iter()
            .any(|line| line.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR"))
        {
            tracing::debug!("Feed for {} is not a calendar", code);
            return None;
        }

        let mut out = String::with_capacity(raw.len());
        for line in &lines {
            out.push_str(&Self::normalize_line(line));
            out.push_str("\r\n");
        }

        Some(out)
    }
}

/// 展开 RFC 5545 折行
fn unfold_lines(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        match (line.strip_prefix([' ', '\t']), lines.last_mut()) {
            (Some(continuation), Some(previous)) => previous.push_str(continuation),
            _ => lines.push(line.to_string()),
        }
    }

    lines
}
