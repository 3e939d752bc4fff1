use std::{path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use edt_core::{
    compose::CalendarEngine,
    ics::{IcsGenerator, IcsOptions},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// 服务端使用的日历引擎
pub type Engine = CalendarEngine<Arc<dyn FeedSource>, ParisNormalizer>;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// Where config edits are saved; `None` keeps them in memory only.
    pub config_path: Option<PathBuf>,
    pub config: Arc<RwLock<CalendarConfig>>,
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(config_path: Option<PathBuf>, config: CalendarConfig, engine: Engine) -> Self {
        Self {
            config_path,
            config: Arc::new(RwLock::new(config)),
            engine: Arc::new(engine),
        }
    }

    async fn persist(&self, config: &CalendarConfig) -> edt_core::Result<()> {
        if let Some(path) = &self.config_path {
            tokio::fs::write(path, config.to_json()?).await?;
            tracing::debug!("Configuration saved to {}", path.display());
        }
        Ok(())
    }
}

/// 健康检查响应
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// 错误响应
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// 日历请求体
#[derive(Deserialize)]
struct CalendarRequest {
    #[serde(default)]
    selected: Vec<String>,
    /// Select every course of every program, ignoring `selected`
    #[serde(default)]
    all: bool,
    format: Option<String>, // "json" or "ics"，默认为 "json"
}

/// 警告及其显示文本
#[derive(Serialize)]
struct WarningView {
    message: String,
    #[serde(flatten)]
    warning: Warning,
}

#[derive(Serialize)]
struct CalendarResponse {
    calendar: CalendarView,
    warnings: Vec<WarningView>,
}

#[derive(Serialize)]
struct ConstantEventView {
    index: usize,
    description: String,
    enabled: bool,
    entry: ConstantEntry,
}

impl ConstantEventView {
    fn new(index: usize, entry: &ConstantEntry) -> Self {
        Self {
            index,
            description: entry.describe(),
            enabled: entry.is_enabled(),
            entry: entry.clone(),
        }
    }
}

#[derive(Deserialize)]
struct EnabledRequest {
    enabled: bool,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/programs", get(list_programs_handler))
        .route(
            "/constant-events",
            get(list_constant_events_handler).post(add_constant_event_handler),
        )
        .route(
            "/constant-events/{index}/enabled",
            put(set_constant_event_enabled_handler),
        )
        .route("/calendar", post(calendar_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// 根路径处理器
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "EDT LOGOS Calendar Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Emploi du temps unifié du M2 LOGOS",
        "endpoints": {
            "health": "/health",
            "programs": "/programs",
            "constant_events": "/constant-events",
            "calendar": "/calendar"
        }
    }))
}

/// 健康检查处理器
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// 列出所有专业
async fn list_programs_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.read().await;
    Json(config.masters.clone())
}

/// 列出常驻事件
async fn list_constant_events_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.read().await;
    let events: Vec<_> = config
        .constant_events
        .iter()
        .enumerate()
        .map(|(index, entry)| ConstantEventView::new(index, entry))
        .collect();
    Json(events)
}

/// 添加常驻事件并保存配置
async fn add_constant_event_handler(
    State(state): State<AppState>,
    Json(event): Json<ConstantEventDef>,
) -> Result<impl IntoResponse, AppError> {
    event.to_event()?;

    let mut config = state.config.write().await;
    let index = config.add_constant_event(event);
    if let Err(e) = state.persist(&config).await {
        config.constant_events.pop();
        return Err(e.into());
    }

    let view = ConstantEventView::new(index, &config.constant_events[index]);
    tracing::info!("Constant event #{} added: {}", index, view.description);
    Ok((StatusCode::CREATED, Json(view)))
}

/// 启用/停用常驻事件
async fn set_constant_event_enabled_handler(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(body): Json<EnabledRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut config = state.config.write().await;
    let previous = config
        .constant_events
        .get(index)
        .map(ConstantEntry::is_enabled);
    config.set_enabled(index, body.enabled)?;

    if let Err(e) = state.persist(&config).await {
        if let Some(enabled) = previous {
            config.set_enabled(index, enabled)?;
        }
        return Err(e.into());
    }

    Ok(Json(ConstantEventView::new(
        index,
        &config.constant_events[index],
    )))
}

/// 生成日历处理器
async fn calendar_handler(
    State(state): State<AppState>,
    Json(request): Json<CalendarRequest>,
) -> Result<Response, AppError> {
    let config = state.config.read().await.clone();

    let selection = if request.all {
        Selection::all_courses(&config.masters)
    } else {
        request.selected.into_iter().collect()
    };

    tracing::info!(
        "Building calendar: {} selected course(s), {} program(s)",
        selection.len(),
        config.masters.len()
    );
    let report = state.engine.build(&config, &selection).await;

    // 根据格式参数返回不同内容，默认为 json
    match request.format.as_deref() {
        None | Some("json") => {
            let warnings = report
                .warnings
                .into_iter()
                .map(|warning| WarningView {
                    message: warning.to_string(),
                    warning,
                })
                .collect();

            Ok(Json(CalendarResponse {
                calendar: report.view,
                warnings,
            })
            .into_response())
        }
        Some("ics") => {
            for warning in &report.warnings {
                tracing::warn!("{}", warning);
            }

            let generator = IcsGenerator::new(
                IcsOptions::default(),
                state.engine.aggregator().window().clone(),
            );
            let ics_content = generator.generate(&report.view.events)?;

            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/calendar; charset=utf-8")],
                ics_content,
            )
                .into_response())
        }
        Some(other) => Err(AppError(edt_core::Error::Config(format!(
            "Unknown format '{}', expected 'json' or 'ics'",
            other
        )))),
    }
}

/// 应用错误类型
#[derive(Debug)]
pub struct AppError(edt_core::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self.0 {
            edt_core::Error::Config(_) => (StatusCode::BAD_REQUEST, "Configuration invalide"),
            edt_core::Error::Feed { .. } | edt_core::Error::Http(_) | edt_core::Error::NoData(_) => {
                (StatusCode::BAD_GATEWAY, "Erreur de la source ADE")
            }
            edt_core::Error::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Délai dépassé"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Erreur interne du serveur"),
        };

        if status.is_server_error() {
            tracing::error!("{}", self.0);
        }

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            message: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<edt_core::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
