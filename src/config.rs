//! 守护进程配置模块
//!
//! 配置文件为 `key=value` 格式，每行一项，`#` 开头的行为注释。

use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "/etc/backupd/backupd.conf";

/// 守护进程配置，启动时加载一次，之后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// 源目录
    pub source_dir: PathBuf,
    /// 备份目录
    pub backup_dir: PathBuf,
    /// 日志文件（为空表示只输出到控制台）
    pub log_file: Option<PathBuf>,
    /// 备份间隔（秒）
    pub interval_seconds: u64,
    /// 最大并发复制数，0 表示不限制
    #[serde(default)]
    pub max_concurrent_copies: usize,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub log_level: String,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub log_max_size_mb: u32,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_max_size_mb() -> u32 {
    5 // 默认 5MB
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            backup_dir: PathBuf::new(),
            log_file: None,
            interval_seconds: 0,
            max_concurrent_copies: 0,
            log_level: default_level(),
            log_max_size_mb: default_max_size_mb(),
        }
    }
}

/// 解析时跳过的内容
///
/// 配置在日志初始化之前加载，这些问题由调用方在日志就绪后通过 [`ConfigNotes::log`] 记录。
#[derive(Debug, Default)]
pub struct ConfigNotes {
    /// 无法解析的配置行，对应字段保持原值
    pub malformed: Vec<BackupError>,
    /// 未知的键
    pub ignored_keys: Vec<String>,
}

impl ConfigNotes {
    pub fn log(&self) {
        for err in &self.malformed {
            tracing::error!("{}，已跳过该行", err);
        }
        for key in &self.ignored_keys {
            tracing::debug!("忽略未知配置项: {}", key);
        }
    }
}

/// 单个配置项的处理结果
enum KeyStatus {
    Applied,
    Unknown,
    Invalid,
}

impl DaemonConfig {
    /// 解析配置文本
    ///
    /// 每行先去掉全部空白字符；缺少 `=` 的行视为值为空；未知的键被忽略；
    /// 同一个键出现多次时以最后一次为准。某一行的值无法解析时只跳过这一行，
    /// 记为 [`BackupError::ConfigMalformed`]，其余各项照常生效。
    pub fn parse(content: &str) -> (Self, ConfigNotes) {
        let mut config = Self::default();
        let mut notes = ConfigNotes::default();

        for (index, raw) in content.lines().enumerate() {
            let line: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((k, v)) => (k, v),
                None => (line.as_str(), ""),
            };

            match config.set(key, value) {
                KeyStatus::Applied => {}
                KeyStatus::Unknown => notes.ignored_keys.push(key.to_string()),
                KeyStatus::Invalid => notes.malformed.push(BackupError::ConfigMalformed {
                    line: index + 1,
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            }
        }

        (config, notes)
    }

    fn set(&mut self, key: &str, value: &str) -> KeyStatus {
        match key {
            "source_directory" => self.source_dir = PathBuf::from(value),
            "destination_directory" => self.backup_dir = PathBuf::from(value),
            "log_file" => {
                self.log_file = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "backup_frequency" => match value.parse() {
                Ok(seconds) => self.interval_seconds = seconds,
                Err(_) => return KeyStatus::Invalid,
            },
            "max_concurrent_copies" => match value.parse() {
                Ok(limit) => self.max_concurrent_copies = limit,
                Err(_) => return KeyStatus::Invalid,
            },
            "log_level" => {
                let level = value.to_lowercase();
                let valid_levels = ["error", "warn", "info", "debug", "trace"];
                if !valid_levels.contains(&level.as_str()) {
                    return KeyStatus::Invalid;
                }
                self.log_level = level;
            }
            "log_max_size_mb" => match value.parse::<u32>() {
                // 限制范围 1-100 MB
                Ok(size) => self.log_max_size_mb = size.clamp(1, 100),
                Err(_) => return KeyStatus::Invalid,
            },
            _ => return KeyStatus::Unknown,
        }
        KeyStatus::Applied
    }

    /// 从文件加载配置
    ///
    /// 只有文件无法读取时返回错误；调用方记录错误并使用零值配置继续运行，
    /// 之后每一轮都会因源目录不可用而失败。
    pub fn load(path: &Path) -> Result<(Self, ConfigNotes)> {
        let content = fs::read_to_string(path).map_err(|source| BackupError::ConfigUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// 实际使用的轮询间隔，最少 1 秒
    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.log_level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}
