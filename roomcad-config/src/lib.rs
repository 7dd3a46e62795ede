use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub sketch: SketchConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，加载后校验取值范围。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `ROOMCAD_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("ROOMCAD_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_undo_steps == 0 {
            return Err(ConfigError::Invalid {
                field: "history.max_undo_steps",
                reason: "必须大于 0".to_string(),
            });
        }
        let tolerance = self.sketch.closure_tolerance;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "sketch.closure_tolerance",
                reason: format!("必须为正数，当前为 {tolerance}"),
            });
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 撤销历史配置。
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_max_undo_steps")]
    pub max_undo_steps: usize,
    /// 相邻的同目标字段编辑是否合并为一条历史。
    #[serde(default = "HistoryConfig::default_merge_field_edits")]
    pub merge_field_edits: bool,
}

impl HistoryConfig {
    fn default_max_undo_steps() -> usize {
        100
    }

    fn default_merge_field_edits() -> bool {
        true
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo_steps: Self::default_max_undo_steps(),
            merge_field_edits: Self::default_merge_field_edits(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SketchConfig {
    #[serde(default = "SketchConfig::default_closure_tolerance")]
    pub closure_tolerance: f64,
}

impl SketchConfig {
    fn default_closure_tolerance() -> f64 {
        1e-6
    }
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            closure_tolerance: Self::default_closure_tolerance(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置项 {field} 无效: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "{content}").expect("write config");
        file
    }

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.history.max_undo_steps, 100);
        assert!(cfg.history.merge_field_edits);
        assert!((cfg.sketch.closure_tolerance - 1e-6).abs() < f64::EPSILON);
    }

    #[test]
    fn load_from_temp_file() {
        let file = write_config(
            r#"
            [logging]
            level = "debug"

            [history]
            max_undo_steps = 20
            merge_field_edits = false

            [sketch]
            closure_tolerance = 0.001
            "#,
        );

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.history.max_undo_steps, 20);
        assert!(!cfg.history.merge_field_edits);
        assert!((cfg.sketch.closure_tolerance - 0.001).abs() < 1e-12);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let file = write_config(
            r#"
            [history]
            max_undo_steps = 5
            "#,
        );

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.history.max_undo_steps, 5);
        assert!(cfg.history.merge_field_edits);
    }

    #[test]
    fn zero_history_depth_is_rejected() {
        let file = write_config(
            r#"
            [history]
            max_undo_steps = 0
            "#,
        );

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "history.max_undo_steps",
                ..
            }
        ));
    }

    #[test]
    fn malformed_file_reports_path() {
        let file = write_config("[history\nmax_undo_steps = ");
        match AppConfig::from_file(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
