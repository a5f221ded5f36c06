//! 错误类型

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 备份守护进程的错误
#[derive(Error, Debug)]
pub enum BackupError {
    /// 配置文件不存在或无法读取
    #[error("无法读取配置文件 {path:?}: {source}")]
    ConfigUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 配置项的值无法解析
    #[error("配置第 {line} 行无效: {key}={value}")]
    ConfigMalformed {
        line: usize,
        key: String,
        value: String,
    },

    /// 源目录无法枚举，本轮放弃
    #[error("源目录不可用 {path:?}: {source}")]
    SourceDirUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 单个文件复制失败，不影响同轮其他文件
    #[error("复制失败 {source_path:?} -> {dest_path:?}: {source}")]
    Copy {
        source_path: PathBuf,
        dest_path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 信号处理注册失败
    #[error("信号处理器注册失败: {0}")]
    SignalHandler(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
