use std::collections::BTreeSet;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// 地点缺失时的占位文本
pub const LOCATION_NOT_SPECIFIED: &str = "Non spécifié";

/// 显示时区，所有时间戳都以该时区的本地时间表示
pub const DISPLAY_TIMEZONE: chrono_tz::Tz = chrono_tz::Europe::Paris;

/// 一个专业（master）的订阅源配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// ADE 资源代码
    pub code: String,
    /// 显示名称
    pub name: String,
    /// 该专业开设的课程标题
    #[serde(default)]
    pub courses: Vec<String>,
}

/// 工作日，固定映射 Mon→1 … Fri→5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    /// All weekdays in display order.
    pub const ALL: [Self; 5] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
    ];

    /// Parse a day name as written in the config file.
    ///
    /// French names are canonical (`Lundi` … `Vendredi`); English full and
    /// short names are accepted too. Matching ignores ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            "lundi" | "monday" | "mon" => Some(Self::Monday),
            "mardi" | "tuesday" | "tue" => Some(Self::Tuesday),
            "mercredi" | "wednesday" | "wed" => Some(Self::Wednesday),
            "jeudi" | "thursday" | "thu" => Some(Self::Thursday),
            "vendredi" | "friday" | "fri" => Some(Self::Friday),
            _ => None,
        }
    }

    /// Index used by the calendar widget's `daysOfWeek` (Monday = 1).
    pub const fn index(self) -> u32 {
        match self {
            Self::Monday => 1,
            Self::Tuesday => 2,
            Self::Wednesday => 3,
            Self::Thursday => 4,
            Self::Friday => 5,
        }
    }

    pub const fn french_name(self) -> &'static str {
        match self {
            Self::Monday => "Lundi",
            Self::Tuesday => "Mardi",
            Self::Wednesday => "Mercredi",
            Self::Thursday => "Jeudi",
            Self::Friday => "Vendredi",
        }
    }

    /// RFC 5545 `BYDAY` code.
    pub const fn ics_code(self) -> &'static str {
        match self {
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
        }
    }

    pub const fn to_chrono(self) -> chrono::Weekday {
        match self {
            Self::Monday => chrono::Weekday::Mon,
            Self::Tuesday => chrono::Weekday::Tue,
            Self::Wednesday => chrono::Weekday::Wed,
            Self::Thursday => chrono::Weekday::Thu,
            Self::Friday => chrono::Weekday::Fri,
        }
    }

    /// Inverse of [`Weekday::index`].
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|day| day.index() == index)
    }
}

/// 从订阅源中解析出的一节课
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCourseEvent {
    /// 课程标题 (SUMMARY)
    pub title: String,
    /// 开始时间（显示时区本地时间）
    pub start: NaiveDateTime,
    /// 结束时间（显示时区本地时间）
    pub end: NaiveDateTime,
    /// 上课地点
    pub location: String,
}

/// 事件附加属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProps {
    pub location: String,
}

/// 有具体日期的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatedEvent {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub extended_props: ExtendedProps,
}

/// 每周重复的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringEvent {
    pub title: String,
    pub days_of_week: BTreeSet<u32>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub extended_props: ExtendedProps,
}

/// 最终交给渲染端的日历事件
///
/// Serialized untagged, in the shape the calendar widget expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalendarEvent {
    Dated(DatedEvent),
    Recurring(RecurringEvent),
}

impl CalendarEvent {
    pub fn title(&self) -> &str {
        match self {
            Self::Dated(event) => &event.title,
            Self::Recurring(event) => &event.title,
        }
    }
}

impl From<RawCourseEvent> for CalendarEvent {
    fn from(event: RawCourseEvent) -> Self {
        Self::Dated(DatedEvent {
            title: event.title,
            start: event.start,
            end: event.end,
            extended_props: ExtendedProps {
                location: event.location,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn weekday_mapping_is_fixed() {
        let indices: Vec<u32> = Weekday::ALL.iter().map(|d| d.index()).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert_eq!(Weekday::from_name("Mercredi"), Some(Weekday::Wednesday));
        assert_eq!(Weekday::from_name("wed"), Some(Weekday::Wednesday));
        assert_eq!(Weekday::from_name("Samedi"), None);
        for day in Weekday::ALL {
            assert_eq!(Weekday::from_index(day.index()), Some(day));
            assert_eq!(Weekday::from_name(day.french_name()), Some(day));
        }
    }

    #[test]
    fn dated_event_uses_widget_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 5).unwrap();
        let event = CalendarEvent::from(RawCourseEvent {
            title: "Syntaxe".to_string(),
            start: date.and_hms_opt(14, 0, 0).unwrap(),
            end: date.and_hms_opt(15, 30, 0).unwrap(),
            location: "B101".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["title"], "Syntaxe");
        assert_eq!(json["start"], "2024-11-05T14:00:00");
        assert_eq!(json["end"], "2024-11-05T15:30:00");
        assert_eq!(json["extendedProps"]["location"], "B101");
    }

    #[test]
    fn recurring_event_round_trips_untagged() {
        let event = CalendarEvent::Recurring(RecurringEvent {
            title: "Séminaire".to_string(),
            days_of_week: BTreeSet::from([3]),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            extended_props: ExtendedProps {
                location: "Salle 1".to_string(),
            },
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"daysOfWeek\":[3]"));
        assert!(json.contains("\"startTime\":\"14:00:00\""));
        let back: CalendarEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
