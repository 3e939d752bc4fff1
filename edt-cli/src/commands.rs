use std::{fs, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveTime};
use edt_core::{
    compose::CalendarEngine,
    ics::{IcsGenerator, IcsOptions},
    prelude::*,
};

use crate::{EventKind, OutputFormat};

/// 生成日历命令参数
pub struct CalendarParams {
    pub config_path: String,
    pub select: Vec<String>,
    pub all: bool,
    pub feed_url: Option<String>,
    pub feed_dir: Option<String>,
    pub timeout: u64,
    pub from: Option<String>,
    pub to: Option<String>,
    pub format: OutputFormat,
    pub output: Option<String>,
}

/// 新常驻事件参数
pub struct NewEventParams {
    pub kind: EventKind,
    pub summary: String,
    pub day: Option<String>,
    pub date: Option<String>,
    pub time: String,
    pub duration: u32,
    pub room: String,
}

/// 生成日历命令
pub async fn calendar_command(params: CalendarParams) -> Result<()> {
    let (config, load_error) = CalendarConfig::load_or_empty(&params.config_path);
    if let Some(e) = load_error {
        eprintln!("⚠ Configuration ignorée: {}", e);
    }

    let selection = if params.all {
        Selection::all_courses(&config.masters)
    } else {
        params.select.into_iter().collect()
    };
    if selection.is_empty() {
        eprintln!("Aucun cours sélectionné: seuls les événements constants seront affichés.");
    }

    let source: Arc<dyn FeedSource> = match (params.feed_dir, params.feed_url) {
        (Some(dir), _) => Arc::new(DirectoryFeedSource::new(dir)),
        (None, Some(url)) => Arc::new(
            AdeFeedSourceBuilder::new(url)
                .with_timeout(params.timeout)
                .build()?,
        ),
        (None, None) => bail!("Aucune source de cours: utilisez --feed-url ou --feed-dir"),
    };

    let window = query_window(params.from.as_deref(), params.to.as_deref())?;
    tracing::info!(
        "Génération du calendrier: source={}, {} programme(s), fenêtre {}..{}",
        source.name(),
        config.masters.len(),
        window.start_param(),
        window.end_param()
    );

    let engine = CalendarEngine::new(CourseAggregator::new(
        source,
        ParisNormalizer::new(),
        window.clone(),
    ));
    let report = engine.build(&config, &selection).await;

    for warning in &report.warnings {
        eprintln!("⚠ {}", warning);
    }

    let content = match params.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report.view)?,
        OutputFormat::Ics => {
            IcsGenerator::new(IcsOptions::default(), window).generate(&report.view.events)?
        }
    };

    match params.output {
        Some(path) => {
            fs::write(&path, content)?;
            eprintln!(
                "✓ {} événement(s) enregistré(s) dans {}",
                report.view.events.len(),
                path
            );
        }
        None => println!("{}", content),
    }

    Ok(())
}

/// 列出专业命令
pub fn programs_command(config_path: &str) -> Result<()> {
    let config = CalendarConfig::load(config_path)?;

    if config.masters.is_empty() {
        println!("Aucun programme configuré.");
        return Ok(());
    }

    for program in &config.masters {
        println!("{} (code {})", program.name, program.code);
        for course in &program.courses {
            println!("  - {}", course);
        }
    }

    Ok(())
}

/// 列出常驻事件命令
pub fn events_list_command(config_path: &str) -> Result<()> {
    let config = CalendarConfig::load(config_path)?;

    if config.constant_events.is_empty() {
        println!("Aucun événement constant.");
        return Ok(());
    }

    println!("Événements constants:");
    for (index, entry) in config.constant_events.iter().enumerate() {
        let status = if entry.is_enabled() { "✓" } else { " " };
        println!("  [{}] #{} {}", status, index, entry.describe());
    }

    Ok(())
}

/// 添加常驻事件命令
pub fn events_add_command(config_path: &str, params: NewEventParams) -> Result<()> {
    let mut config = CalendarConfig::load_for_update(config_path)?;

    let event = build_event_def(params)?;
    let description = event.describe();
    let index = config.add_constant_event(event);
    config.save(config_path)?;

    println!("✓ Événement #{} ajouté: {}", index, description);
    Ok(())
}

/// 启用/停用常驻事件命令
pub fn events_toggle_command(config_path: &str, index: usize, enabled: bool) -> Result<()> {
    let mut config = CalendarConfig::load(config_path)?;
    config.set_enabled(index, enabled)?;
    config.save(config_path)?;

    let verb = if enabled { "activé" } else { "désactivé" };
    println!("✓ Événement #{} {}", index, verb);
    Ok(())
}

/// Default window, with either bound overridden by a `YYYY-MM-DD` argument.
fn query_window(from: Option<&str>, to: Option<&str>) -> Result<QueryWindow> {
    let default = QueryWindow::default();
    if from.is_none() && to.is_none() {
        return Ok(default);
    }

    let start = default.start_param();
    let end = default.end_param();
    let window = QueryWindow::from_date_strs(
        from.unwrap_or(&start),
        to.unwrap_or(&end),
        default.academic_year,
        default.template_sheet,
    )?;
    Ok(window)
}

/// Build a constant event and reject it right away if it would not materialize.
fn build_event_def(params: NewEventParams) -> Result<ConstantEventDef> {
    let time = NaiveTime::parse_from_str(&params.time, "%H:%M")
        .with_context(|| format!("Heure invalide '{}', format attendu HH:MM", params.time))?;

    let event = match params.kind {
        EventKind::Weekly => {
            let name = params.day.unwrap_or_default();
            let Some(day) = Weekday::from_name(&name) else {
                bail!("Jour invalide '{}', attendu Lundi … Vendredi", name);
            };
            ConstantEventDef::weekly(params.summary, day, time, params.duration, params.room)
        }
        EventKind::OneTime => {
            let raw = params.date.unwrap_or_default();
            let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .with_context(|| format!("Date invalide '{}', format attendu YYYY-MM-DD", raw))?;
            ConstantEventDef::one_time(params.summary, date, time, params.duration, params.room)
        }
    };
    event.to_event()?;

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(kind: EventKind) -> NewEventParams {
        NewEventParams {
            kind,
            summary: "Séminaire".to_string(),
            day: Some("Mercredi".to_string()),
            date: Some("2024-12-10".to_string()),
            time: "14:00".to_string(),
            duration: 90,
            room: "Salle 1".to_string(),
        }
    }

    #[test]
    fn test_build_weekly_event() {
        let event = build_event_def(params(EventKind::Weekly)).unwrap();
        assert_eq!(
            event.schedule,
            ConstantSchedule::Weekly {
                day: "Mercredi".to_string()
            }
        );
        assert_eq!(event.describe(), "Séminaire - Mercredi à 14:00 (90 min) - Salle 1");
    }

    #[test]
    fn test_day_name_is_normalized() {
        let mut english = params(EventKind::Weekly);
        english.day = Some("wed".to_string());
        let event = build_event_def(english).unwrap();
        assert_eq!(
            event.schedule,
            ConstantSchedule::Weekly {
                day: "Mercredi".to_string()
            }
        );
    }

    #[test]
    fn test_build_one_time_event() {
        let event = build_event_def(params(EventKind::OneTime)).unwrap();
        assert_eq!(
            event.schedule,
            ConstantSchedule::OneTime {
                date: "2024-12-10".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_event_is_rejected() {
        let mut bad_day = params(EventKind::Weekly);
        bad_day.day = Some("Dimanche".to_string());
        assert!(build_event_def(bad_day).is_err());

        let mut bad_time = params(EventKind::OneTime);
        bad_time.time = "25:00".to_string();
        assert!(build_event_def(bad_time).is_err());

        let mut no_duration = params(EventKind::Weekly);
        no_duration.duration = 0;
        assert!(build_event_def(no_duration).is_err());

        let mut bad_date = params(EventKind::OneTime);
        bad_date.date = Some("10/12/2024".to_string());
        assert!(build_event_def(bad_date).is_err());
    }

    #[test]
    fn test_query_window_overrides() {
        assert_eq!(query_window(None, None).unwrap(), QueryWindow::default());

        let window = query_window(Some("2025-01-06"), None).unwrap();
        assert_eq!(window.start_param(), "2025-01-06");
        assert_eq!(window.end, DEFAULT_WINDOW_END);

        assert!(query_window(None, Some("2024-01-01")).is_err());
        assert!(query_window(Some("janvier"), None).is_err());
    }

    #[test]
    fn test_add_and_toggle_persist() {
        let path = std::env::temp_dir().join(format!("edt-cli-{}.json", std::process::id()));
        let path_str = path.to_str().unwrap();
        let _ = fs::remove_file(&path);

        events_add_command(path_str, params(EventKind::Weekly)).unwrap();
        events_toggle_command(path_str, 0, false).unwrap();

        let config = CalendarConfig::load(&path).unwrap();
        assert_eq!(config.constant_events.len(), 1);
        assert!(!config.constant_events[0].is_enabled());
        assert!(events_toggle_command(path_str, 3, true).is_err());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_add_leaves_unreadable_config_alone() {
        let path = std::env::temp_dir().join(format!("edt-cli-broken-{}.json", std::process::id()));
        let path_str = path.to_str().unwrap();
        let broken = r#"{"masters": [{"code": "4521", "name": "LOGOS""#;
        fs::write(&path, broken).unwrap();

        assert!(events_add_command(path_str, params(EventKind::Weekly)).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), broken);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_add_creates_missing_config() {
        let path = std::env::temp_dir().join(format!("edt-cli-new-{}.json", std::process::id()));
        let path_str = path.to_str().unwrap();
        let _ = fs::remove_file(&path);

        events_add_command(path_str, params(EventKind::OneTime)).unwrap();

        let config = CalendarConfig::load(&path).unwrap();
        assert!(config.masters.is_empty());
        assert_eq!(config.constant_events.len(), 1);

        fs::remove_file(&path).unwrap();
    }
}
