//! 单文件复制

use crate::core::comparator::{FileComparator, Freshness};
use crate::error::{BackupError, Result};
use filetime::FileTime;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// 单个文件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// 已复制
    Copied { bytes: u64, freshness: Freshness },
    /// 备份已是最新，跳过
    UpToDate,
    /// 不是普通文件（子目录等），跳过
    NotRegularFile,
}

/// 文件复制器
#[derive(Debug, Clone, Default)]
pub struct FileCopier {
    comparator: FileComparator,
}

impl FileCopier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把源文件整体复制到备份路径，并把备份的修改时间设为源文件复制前的修改时间
    ///
    /// 复制期间源文件再次被修改时，备份保留旧的时间戳，下一轮会判定为过期并重新复制。
    pub async fn copy(&self, source_path: &Path, dest_path: &Path) -> Result<CopyOutcome> {
        let copy_error = |source: io::Error| BackupError::Copy {
            source_path: source_path.to_path_buf(),
            dest_path: dest_path.to_path_buf(),
            source,
        };

        let metadata = tokio::fs::metadata(source_path).await.map_err(copy_error)?;
        if !metadata.is_file() {
            debug!("跳过非普通文件: {}", source_path.display());
            return Ok(CopyOutcome::NotRegularFile);
        }
        let source_mtime = FileTime::from_last_modification_time(&metadata);

        let freshness = self
            .comparator
            .check(source_mtime, dest_path)
            .await
            .map_err(copy_error)?;

        if !freshness.needs_copy() {
            debug!("文件未变化，跳过: {}", source_path.display());
            return Ok(CopyOutcome::UpToDate);
        }

        let bytes = tokio::fs::copy(source_path, dest_path)
            .await
            .map_err(copy_error)?;

        let dest = dest_path.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&dest, source_mtime))
            .await
            .map_err(|e| copy_error(io::Error::other(e)))?
            .map_err(copy_error)?;

        info!(
            "备份完成: {} -> {} ({}字节)",
            source_path.display(),
            dest_path.display(),
            bytes
        );

        Ok(CopyOutcome::Copied { bytes, freshness })
    }
}
