use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CalendarEvent, DISPLAY_TIMEZONE, DatedEvent, Error, RecurringEvent, Result,
    constant::END_OF_DAY, extract::FEED_TIMESTAMP_FORMAT, types::Weekday, window::QueryWindow,
};


/// Europe/Paris 的夏令时/冬令时规则（欧盟 1996 年起的规则）
const PARIS_TIMEZONE_RULES: &str = "BEGIN:DAYLIGHT\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0200\r\n\
TZNAME:CEST\r\n\
DTSTART:19700329T020000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU\r\n\
END:DAYLIGHT\r\n\
BEGIN:STANDARD\r\n\
TZOFFSETFROM:+0200\r\n\
TZOFFSETTO:+0100\r\n\
TZNAME:CET\r\n\
DTSTART:19701025T030000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU\r\n\
END:STANDARD\r\n";

/// ICS生成选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcsOptions {
    /// 日历名称
    pub calendar_name: Option<String>,
    pub reminder_minutes: Option<u32>,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: Some("Calendrier M2 LOGOS".to_string()),
            reminder_minutes: None,
        }
    }
}

/// ICS日历生成器
pub struct IcsGenerator {
    options: IcsOptions,
    window: QueryWindow,
}

impl IcsGenerator {
    /// `window` bounds the weekly recurrences of constant events.
    pub const fn new(options: IcsOptions, window: QueryWindow) -> Self {
        Self { options, window }
    }

    /// 生成ICS日历内容
    pub fn generate(&self, events: &[CalendarEvent]) -> Result<String> {
        let mut ics_content = String::new();

        ics_content.push_str("BEGIN:VCALENDAR\r\n");
        ics_content.push_str("VERSION:2.0\r\n");
        ics_content.push_str("PRODID:-//EDT LOGOS//Unified Timetable//FR\r\n");
        ics_content.push_str("CALSCALE:GREGORIAN\r\n");
        ics_content.push_str("METHOD:PUBLISH\r\n");

        if let Some(ref name) = self.options.calendar_name {
            ics_content.push_str(&format!("X-WR-CALNAME:{}\r\n", escape_text(name)));
        }
        ics_content.push_str(&format!("X-WR-TIMEZONE:{}\r\n", DISPLAY_TIMEZONE.name()));

        // DTSTART;TZID 引用的时区必须在日历中定义
        ics_content.push_str("BEGIN:VTIMEZONE\r\n");
        ics_content.push_str(&format!("TZID:{}\r\n", DISPLAY_TIMEZONE.name()));
        ics_content.push_str(PARIS_TIMEZONE_RULES);
        ics_content.push_str("END:VTIMEZONE\r\n");

        for event in events {
            match event {
                CalendarEvent::Dated(event) => self.add_dated_event(&mut ics_content, event),
                CalendarEvent::Recurring(event) => {
                    self.add_recurring_event(&mut ics_content, event)?;
                }
            }
        }

        ics_content.push_str("END:VCALENDAR\r\n");

        Ok(ics_content)
    }

    fn add_dated_event(&self, ics_content: &mut String, event: &DatedEvent) {
        self.open_event(
            ics_content,
            &event.title,
            &event.extended_props.location,
            event.start,
            event.end,
        );
        ics_content.push_str("END:VEVENT\r\n");
    }

    fn add_recurring_event(&self, ics_content: &mut String, event: &RecurringEvent) -> Result<()> {
        let days = event
            .days_of_week
            .iter()
            .map(|&index| {
                Weekday::from_index(index).ok_or_else(|| {
                    Error::IcsGeneration(format!(
                        "Invalid weekday index {} in event '{}'",
                        index, event.title
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let Some(first_date) = days
            .iter()
            .filter_map(|&day| self.window.first_occurrence(day))
            .min()
        else {
            tracing::debug!("Weekly event '{}' never occurs in the window", event.title);
            return Ok(());
        };

        self.open_event(
            ics_content,
            &event.title,
            &event.extended_props.location,
            first_date.and_time(event.start_time),
            first_date.and_time(event.end_time),
        );
        self.add_recurrence_rule(ics_content, &days)?;
        ics_content.push_str("END:VEVENT\r\n");

        Ok(())
    }

    fn open_event(
        &self,
        ics_content: &mut String,
        title: &str,
        location: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) {
        let uid = Uuid::new_v4().to_string();
        let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let tz = DISPLAY_TIMEZONE.name();

        ics_content.push_str("BEGIN:VEVENT\r\n");
        ics_content.push_str(&format!("UID:{}\r\n", uid));
        ics_content.push_str(&format!("DTSTAMP:{}\r\n", dtstamp));
        ics_content.push_str(&format!(
            "DTSTART;TZID={}:{}\r\n",
            tz,
            start.format(FEED_TIMESTAMP_FORMAT)
        ));
        ics_content.push_str(&format!(
            "DTEND;TZID={}:{}\r\n",
            tz,
            end.format(FEED_TIMESTAMP_FORMAT)
        ));
        ics_content.push_str(&format!("SUMMARY:{}\r\n", escape_text(title)));
        if !location.is_empty() {
            ics_content.push_str(&format!("LOCATION:{}\r\n", escape_text(location)));
        }

        if let Some(reminder_minutes) = self.options.reminder_minutes {
            ics_content.push_str("BEGIN:VALARM\r\n");
            ics_content.push_str("ACTION:DISPLAY\r\n");
            ics_content.push_str(&format!("DESCRIPTION:{}\r\n", escape_text(title)));
            ics_content.push_str(&format!("TRIGGER:-PT{}M\r\n", reminder_minutes));
            ics_content.push_str("END:VALARM\r\n");
        }
    }

    /// 添加重复规则，UNTIL 为窗口最后一天结束时刻（UTC）
    fn add_recurrence_rule(&self, ics_content: &mut String, days: &[Weekday]) -> Result<()> {
        let last_moment = self.window.end.and_time(END_OF_DAY);
        let until = DISPLAY_TIMEZONE
            .from_local_datetime(&last_moment)
            .earliest()
            .ok_or_else(|| Error::IcsGeneration("Window end does not exist locally".to_string()))?
            .with_timezone(&Utc);

        let by_day: Vec<&str> = days.iter().map(|day| day.ics_code()).collect();
        ics_content.push_str(&format!(
            "RRULE:FREQ=WEEKLY;BYDAY={};UNTIL={}\r\n",
            by_day.join(","),
            until.format("%Y%m%dT%H%M%SZ")
        ));

        Ok(())
    }
}

impl Default for IcsGenerator {
    fn default() -> Self {
        Self::new(IcsOptions::default(), QueryWindow::default())
    }
}

/// 转义ICS文本内容
pub fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace(',', "\\,")
        .replace(';', "\\;")
}
