use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    Error, ProgramConfig, Result,
    constant::{ConstantEntry, ConstantEventDef},
};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "m2_logos.json";

/// 会话配置：专业列表与常驻事件
///
/// Passed by reference into every engine call; nothing is kept in globals.
/// Constant events are read one entry at a time, so a malformed entry never
/// prevents the programs or the other entries from loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub masters: Vec<ProgramConfig>,
    #[serde(default)]
    pub constant_events: Vec<ConstantEntry>,
}

impl CalendarConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Configuration file {} could not be read: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            let problem = if e.is_data() {
                "does not have the expected layout"
            } else {
                "is not valid JSON"
            };
            Error::Config(format!(
                "Configuration file {} {}: {}",
                path.display(),
                problem,
                e
            ))
        })
    }

    /// 为修改而加载配置
    ///
    /// Only a missing file starts from an empty config; any other failure is
    /// returned so the caller never overwrites a file it could not read.
    pub fn load_for_update<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::metadata(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("{} does not exist yet, starting from scratch", path.display());
                Ok(Self::default())
            }
            _ => Self::load(path),
        }
    }

    /// Load the config, degrading to an empty one on any error.
    ///
    /// The error is logged and handed back so the caller can show it.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> (Self, Option<Error>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => {
                tracing::error!("{}", e);
                (Self::default(), Some(e))
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Append a constant event; returns its index.
    pub fn add_constant_event(&mut self, event: ConstantEventDef) -> usize {
        self.constant_events.push(event.into());
        self.constant_events.len() - 1
    }

    /// 启用或停用一个常驻事件
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let count = self.constant_events.len();
        let entry = self.constant_events.get_mut(index).ok_or_else(|| {
            Error::Config(format!(
                "No constant event #{} (there are {})",
                index, count
            ))
        })?;
        entry.set_enabled(enabled)
    }
}
