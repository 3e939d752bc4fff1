use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, types::Weekday};

/// 默认查询窗口起始日期
pub const DEFAULT_WINDOW_START: NaiveDate = match NaiveDate::from_ymd_opt(2024, 9, 16) {
    Some(date) => date,
    None => panic!("2024-09-16 is a valid date"),
};
/// 默认查询窗口结束日期
pub const DEFAULT_WINDOW_END: NaiveDate = match NaiveDate::from_ymd_opt(2025, 7, 17) {
    Some(date) => date,
    None => panic!("2025-07-17 is a valid date"),
};
/// ADE 学年标识
pub const DEFAULT_ACADEMIC_YEAR: u32 = 5;
/// ADE 模板 fiche 标识（原样透传）
pub const DEFAULT_TEMPLATE_SHEET: &str = "58598,";

/// 订阅源查询窗口
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub academic_year: u32,
    pub template_sheet: String,
}

impl QueryWindow {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        academic_year: u32,
        template_sheet: impl Into<String>,
    ) -> Result<Self> {
        if end < start {
            return Err(Error::Config(format!(
                "Query window ends ({end}) before it starts ({start})"
            )));
        }

        Ok(Self {
            start,
            end,
            academic_year,
            template_sheet: template_sheet.into(),
        })
    }

    /// Build a window from `YYYY-MM-DD` strings.
    pub fn from_date_strs(
        start: &str,
        end: &str,
        academic_year: u32,
        template_sheet: impl Into<String>,
    ) -> Result<Self> {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")?;
        Self::new(start, end, academic_year, template_sheet)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date)
    }

    /// 窗口内第一个落在 `day` 的日期
    pub fn first_occurrence(&self, day: Weekday) -> Option<NaiveDate> {
        let start_index = self.start.weekday().num_days_from_monday();
        let target_index = day.to_chrono().num_days_from_monday();
        let offset = (7 + target_index - start_index) % 7;
        let date = self.start + Duration::days(i64::from(offset));

        self.contains(date).then_some(date)
    }

    /// Start date in the form the ADE endpoint expects.
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self {
            start: DEFAULT_WINDOW_START,
            end: DEFAULT_WINDOW_END,
            academic_year: DEFAULT_ACADEMIC_YEAR,
            template_sheet: DEFAULT_TEMPLATE_SHEET.to_string(),
        }
    }
}
