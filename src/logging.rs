//! 日志模块 - 控制台日志、文件日志和大小管理

use crate::config::DaemonConfig;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// 带大小限制的日志写入器
///
/// 超过上限时把当前文件重命名为 `<name>.old`，然后重新打开。
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    written: u64,
    writer: Option<BufWriter<File>>,
}

impl SizeRotatingWriter {
    pub fn new(file_path: &Path, max_size_mb: u32) -> io::Result<Self> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let max_size = u64::from(max_size_mb) * 1024 * 1024;
        let mut writer = Self {
            file_path: file_path.to_path_buf(),
            max_size,
            written: 0,
            writer: None,
        };
        writer.open_file()?;
        Ok(writer)
    }

    fn open_file(&mut self) -> io::Result<()> {
        // 检查现有文件大小，如果超过限制则轮转
        if let Ok(metadata) = fs::metadata(&self.file_path) {
            if metadata.len() > self.max_size {
                self.rotate_log()?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        self.written = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    /// 轮转日志文件
    fn rotate_log(&self) -> io::Result<()> {
        let backup_path = self.backup_path();

        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }

        fs::rename(&self.file_path, &backup_path)
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.file_path.as_os_str().to_os_string();
        name.push(".old");
        PathBuf::from(name)
    }

    /// 检查并轮转日志
    fn check_and_rotate(&mut self) -> io::Result<()> {
        if self.written <= self.max_size {
            return Ok(());
        }

        if let Some(mut w) = self.writer.take() {
            let _ = w.flush();
        }
        self.rotate_log()?;
        self.open_file()
    }
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Writer not available"))?;

        let n = writer.write(buf)?;
        writer.flush()?;
        self.written += n as u64;

        self.check_and_rotate()?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

/// 日志句柄，drop 时刷新并关闭文件日志
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LogGuard {
    /// 关闭日志输出
    pub fn close(self) {
        tracing::debug!("关闭日志输出");
        drop(self);
    }
}

/// 初始化日志系统
///
/// 控制台日志始终开启；配置了 `log_file` 时额外写入文件。
/// `level_override` 优先于配置中的日志级别。
pub fn init_logging(config: &DaemonConfig, level_override: Option<tracing::Level>) -> LogGuard {
    let level = level_override.unwrap_or_else(|| config.tracing_level());
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let file_writer = config.log_file.as_deref().and_then(|path| {
        SizeRotatingWriter::new(path, config.log_max_size_mb)
            .map_err(|e| eprintln!("无法打开日志文件 {}: {}", path.display(), e))
            .ok()
    });

    match file_writer {
        Some(writer) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(writer);

            // 文件日志层
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false);

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);

            LogGuard {
                _file_guard: Some(guard),
            }
        }
        None => {
            // 没有文件日志，只输出到控制台
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer);
            let _ = tracing::subscriber::set_global_default(subscriber);

            LogGuard { _file_guard: None }
        }
    }
}
