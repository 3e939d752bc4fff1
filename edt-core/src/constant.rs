//! Constant events: user-declared weekly or one-time events layered over the
//! fetched courses.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    CalendarEvent, DatedEvent, Error, ExtendedProps, RecurringEvent, Result, types::Weekday,
};

/// Latest end time a weekly event may have; later ends are clamped to it.
pub const END_OF_DAY: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(time) => time,
    None => panic!("23:59:59 is a valid time"),
};

/// 常驻事件的时间安排
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConstantSchedule {
    /// Repeats every week on `day` (`Lundi` … `Vendredi`).
    #[serde(rename = "weekly")]
    Weekly { day: String },
    /// Happens once on `date` (`YYYY-MM-DD`).
    #[serde(rename = "one-time")]
    OneTime { date: String },
}

/// 用户声明的常驻事件，保存在配置文件中
///
/// Fields keep their persisted string form; they are validated when the
/// event is materialized so one bad entry cannot break the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantEventDef {
    #[serde(flatten)]
    pub schedule: ConstantSchedule,
    pub summary: String,
    #[serde(default)]
    pub room: String,
    /// Start time, `HH:MM`
    pub time: String,
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl ConstantEventDef {
    pub fn weekly(
        summary: impl Into<String>,
        day: Weekday,
        time: NaiveTime,
        duration_minutes: u32,
        room: impl Into<String>,
    ) -> Self {
        Self {
            schedule: ConstantSchedule::Weekly {
                day: day.french_name().to_string(),
            },
            summary: summary.into(),
            room: room.into(),
            time: time.format("%H:%M").to_string(),
            duration_minutes,
            enabled: true,
        }
    }

    pub fn one_time(
        summary: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: u32,
        room: impl Into<String>,
    ) -> Self {
        Self {
            schedule: ConstantSchedule::OneTime {
                date: date.format("%Y-%m-%d").to_string(),
            },
            summary: summary.into(),
            room: room.into(),
            time: time.format("%H:%M").to_string(),
            duration_minutes,
            enabled: true,
        }
    }

    /// 生成日历事件；未启用时返回 `None`
    pub fn materialize(&self) -> Result<Option<CalendarEvent>> {
        if !self.enabled {
            return Ok(None);
        }
        self.to_event().map(Some)
    }

    /// Build the calendar event regardless of the `enabled` flag.
    pub fn to_event(&self) -> Result<CalendarEvent> {
        let title = self.summary.trim();
        if title.is_empty() {
            return Err(Error::Config("Constant event has an empty summary".to_string()));
        }
        if self.duration_minutes == 0 {
            return Err(Error::Config(format!(
                "Constant event '{}' must last at least one minute",
                title
            )));
        }

        let start_time = parse_time(&self.time).ok_or_else(|| {
            Error::Config(format!(
                "Invalid time '{}' for constant event '{}', expected HH:MM",
                self.time, title
            ))
        })?;
        let length = Duration::minutes(i64::from(self.duration_minutes));
        let extended_props = ExtendedProps {
            location: self.room.clone(),
        };

        match &self.schedule {
            ConstantSchedule::Weekly { day } => {
                let weekday = Weekday::from_name(day).ok_or_else(|| {
                    Error::Config(format!(
                        "Invalid day '{}' for constant event '{}'",
                        day, title
                    ))
                })?;

                let (end_time, wrapped) = start_time.overflowing_add_signed(length);
                let end_time = if wrapped == 0 {
                    end_time
                } else {
                    tracing::warn!(
                        "Weekly event '{}' would end after midnight, clamping to {}",
                        title,
                        END_OF_DAY
                    );
                    END_OF_DAY
                };
                if end_time <= start_time {
                    return Err(Error::Config(format!(
                        "Weekly event '{}' starts too late to fit in the day",
                        title
                    )));
                }

                Ok(CalendarEvent::Recurring(RecurringEvent {
                    title: title.to_string(),
                    days_of_week: BTreeSet::from([weekday.index()]),
                    start_time,
                    end_time,
                    extended_props,
                }))
            }
            ConstantSchedule::OneTime { date } => {
                let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
                    Error::Config(format!(
                        "Invalid date '{}' for constant event '{}': {}",
                        date, title, e
                    ))
                })?;
                let start = date.and_time(start_time);

                Ok(CalendarEvent::Dated(DatedEvent {
                    title: title.to_string(),
                    start,
                    end: start + length,
                    extended_props,
                }))
            }
        }
    }

    /// 单行描述，例如 `Séminaire - Mercredi à 14:00 (90 min) - Salle 1`
    pub fn describe(&self) -> String {
        let when = match &self.schedule {
            ConstantSchedule::Weekly { day } => day,
            ConstantSchedule::OneTime { date } => date,
        };
        format!(
            "{} - {} à {} ({} min) - {}",
            self.summary, when, self.time, self.duration_minutes, self.room
        )
    }
}

/// 配置文件中的一条常驻事件记录
///
/// Entries that do not have the expected shape are kept verbatim so a save
/// writes them back untouched; they surface as errors at materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantEntry {
    Event(ConstantEventDef),
    Malformed(Value),
}

impl From<ConstantEventDef> for ConstantEntry {
    fn from(event: ConstantEventDef) -> Self {
        Self::Event(event)
    }
}

impl ConstantEntry {
    pub const fn as_event(&self) -> Option<&ConstantEventDef> {
        match self {
            Self::Event(event) => Some(event),
            Self::Malformed(_) => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Event(event) => event.enabled,
            Self::Malformed(raw) => raw.get("enabled").and_then(Value::as_bool).unwrap_or(true),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        match self {
            Self::Event(event) => event.enabled = enabled,
            Self::Malformed(Value::Object(fields)) => {
                fields.insert("enabled".to_string(), Value::Bool(enabled));
            }
            Self::Malformed(_) => {
                return Err(Error::Config(
                    "Constant event entry is not a JSON object".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::Event(event) => &event.summary,
            Self::Malformed(raw) => raw.get("summary").and_then(Value::as_str).unwrap_or("?"),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Event(event) => event.describe(),
            Self::Malformed(_) => format!("{} - entrée invalide", self.summary()),
        }
    }

    /// Like [`ConstantEventDef::materialize`]; an enabled malformed entry is an error.
    pub fn materialize(&self) -> Result<Option<CalendarEvent>> {
        match self {
            Self::Event(event) => event.materialize(),
            Self::Malformed(_) if !self.is_enabled() => Ok(None),
            Self::Malformed(raw) => {
                let reason = serde_json::from_value::<ConstantEventDef>(raw.clone())
                    .err()
                    .map_or_else(|| "unrecognized entry".to_string(), |e| e.to_string());
                Err(Error::Config(format!(
                    "Malformed constant event entry: {}",
                    reason
                )))
            }
        }
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Result of materializing a whole list of constant events.
#[derive(Debug, Default)]
pub struct Materialized {
    pub events: Vec<CalendarEvent>,
    /// `(index in the config list, error)` for every invalid enabled entry.
    pub errors: Vec<(usize, Error)>,
}

/// 逐条生成常驻事件，单条错误不影响其他条目
pub fn materialize_all(entries: &[ConstantEntry]) -> Materialized {
    let mut materialized = Materialized::default();

    for (index, entry) in entries.iter().enumerate() {
        match entry.materialize() {
            Ok(Some(event)) => materialized.events.push(event),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Constant event #{} is invalid: {}", index, e);
                materialized.errors.push((index, e));
            }
        }
    }

    materialized
}
