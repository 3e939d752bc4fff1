use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ProgramConfig, RawCourseEvent};

/// 用户勾选的课程
///
/// Each entry is matched as a case-sensitive substring of an event title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(BTreeSet<String>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every course of every program: the "show everything" selection.
    pub fn all_courses(programs: &[ProgramConfig]) -> Self {
        Self::from_programs(programs, |_, _| true)
    }

    /// Build a selection from the config, keeping courses accepted by `keep`.
    pub fn from_programs<F>(programs: &[ProgramConfig], mut keep: F) -> Self
    where
        F: FnMut(&ProgramConfig, &str) -> bool,
    {
        programs
            .iter()
            .flat_map(|program| {
                program
                    .courses
                    .iter()
                    .map(move |course| (program, course.as_str()))
            })
            .filter(|&(program, course)| keep(program, course))
            .map(|(_, course)| course.to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether `title` contains at least one selected substring.
    pub fn matches(&self, title: &str) -> bool {
        self.0.iter().any(|selected| title.contains(selected.as_str()))
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// 按用户选择过滤课程
///
/// Order is preserved. An empty selection yields nothing: courses only show up
/// once the user opts in.
pub fn filter_courses(events: &[RawCourseEvent], selection: &Selection) -> Vec<RawCourseEvent> {
    events
        .iter()
        .filter(|event| selection.matches(&event.title))
        .cloned()
        .collect()
}
