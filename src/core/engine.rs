use crate::config::DaemonConfig;
use crate::core::transfer::{CopyOutcome, FileCopier};
use crate::error::{BackupError, Result};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// 一轮备份的统计
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub round_id: Uuid,
    pub start_time: i64,
    pub end_time: i64,
    /// 派发的复制任务数（源目录中的条目数）
    pub attempted: u32,
    pub copied: u32,
    pub skipped: u32,
    pub failed: u32,
    pub bytes_copied: u64,
    pub errors: Vec<String>,
}

impl RoundSummary {
    /// 成功处理的文件数（复制或跳过）
    pub fn succeeded(&self) -> u32 {
        self.copied + self.skipped
    }

    fn record(&mut self, result: Result<CopyOutcome>) {
        match result {
            Ok(CopyOutcome::Copied { bytes, .. }) => {
                self.copied += 1;
                self.bytes_copied += bytes;
            }
            Ok(CopyOutcome::UpToDate) | Ok(CopyOutcome::NotRegularFile) => self.skipped += 1,
            Err(e) => {
                error!("{}", e);
                self.failed += 1;
                self.errors.push(e.to_string());
            }
        }
    }
}

/// 同步引擎，负责执行一轮备份
#[derive(Debug, Clone)]
pub struct SyncEngine {
    source_dir: PathBuf,
    backup_dir: PathBuf,
    /// None 表示不限制并发
    semaphore: Option<Arc<Semaphore>>,
    copier: FileCopier,
}

impl SyncEngine {
    pub fn new(config: &DaemonConfig) -> Self {
        let semaphore = (config.max_concurrent_copies > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent_copies)));

        Self {
            source_dir: config.source_dir.clone(),
            backup_dir: config.backup_dir.clone(),
            semaphore,
            copier: FileCopier::new(),
        }
    }

    /// 执行一轮备份
    ///
    /// 源目录中的每个条目（不递归）派发一个并发复制任务，等待全部任务结束后才返回。
    /// 单个文件失败只记录在统计里；源目录无法枚举时返回
    /// [`BackupError::SourceDirUnavailable`]，不派发任何任务。
    pub async fn run_round(&self) -> Result<RoundSummary> {
        let round_id = Uuid::new_v4();
        let span = info_span!("round", id = %round_id);

        self.run_round_inner(round_id)
            .instrument(span)
            .await
    }

    async fn run_round_inner(&self, round_id: Uuid) -> Result<RoundSummary> {
        let mut summary = RoundSummary {
            round_id,
            start_time: chrono::Utc::now().timestamp(),
            ..Default::default()
        };

        self.ensure_backup_dir().await;

        let entries = self.list_source_entries().await.map_err(|source| {
            let err = BackupError::SourceDirUnavailable {
                path: self.source_dir.clone(),
                source,
            };
            error!("{}", err);
            err
        })?;

        debug!("源目录共 {} 个条目", entries.len());

        let mut handles = Vec::with_capacity(entries.len());
        for source_path in entries {
            let Some(file_name) = source_path.file_name() else {
                continue;
            };
            let dest_path = self.backup_dir.join(file_name);

            // 限制并发时先拿许可再派发
            let permit = match &self.semaphore {
                Some(semaphore) => match semaphore.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        warn!("获取并发许可失败: {}", e);
                        None
                    }
                },
                None => None,
            };

            let copier = self.copier.clone();
            let handle = tokio::spawn(
                async move {
                    let result = copier.copy(&source_path, &dest_path).await;
                    drop(permit);
                    result
                }
                .in_current_span(),
            );

            handles.push(handle);
            summary.attempted += 1;
        }

        // 等待所有任务完成
        for handle in handles {
            match handle.await {
                Ok(result) => summary.record(result),
                Err(e) => {
                    error!("复制任务异常退出: {}", e);
                    summary.failed += 1;
                    summary.errors.push(e.to_string());
                }
            }
        }

        summary.end_time = chrono::Utc::now().timestamp();

        info!(
            "本轮备份完成: 条目 {}, 复制 {}, 跳过 {}, 失败 {}",
            summary.attempted, summary.copied, summary.skipped, summary.failed
        );

        Ok(summary)
    }

    /// 备份目录不存在时创建（只创建一级）
    async fn ensure_backup_dir(&self) {
        match tokio::fs::create_dir(&self.backup_dir).await {
            Ok(()) => info!("已创建备份目录: {}", self.backup_dir.display()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            // 复制阶段会逐个文件报告失败
            Err(e) => warn!("创建备份目录失败 {}: {}", self.backup_dir.display(), e),
        }
    }

    /// 列出源目录的直接条目
    async fn list_source_entries(&self) -> io::Result<Vec<PathBuf>> {
        let mut reader = tokio::fs::read_dir(&self.source_dir).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use std::path::Path;

    fn engine_for(source: &Path, backup: &Path, max_concurrent_copies: usize) -> SyncEngine {
        SyncEngine::new(&DaemonConfig {
            source_dir: source.to_path_buf(),
            backup_dir: backup.to_path_buf(),
            interval_seconds: 5,
            max_concurrent_copies,
            ..Default::default()
        })
    }

    fn write_with_mtime(path: &Path, contents: &[u8], secs: i64) {
        fs::write(path, contents).unwrap();
        set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[tokio::test]
    async fn empty_source_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        fs::create_dir(&source).unwrap();

        let summary = engine_for(&source, &dir.path().join("dst"), 0)
            .run_round()
            .await
            .unwrap();

        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.failed, 0);
        assert!(dir.path().join("dst").is_dir());
    }

    #[tokio::test]
    async fn missing_source_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();

        let err = engine_for(&dir.path().join("nope"), &dir.path().join("dst"), 0)
            .run_round()
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::SourceDirUnavailable { .. }));
    }

    #[tokio::test]
    async fn second_round_without_changes_copies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        fs::create_dir(&source).unwrap();
        write_with_mtime(&source.join("a.txt"), b"a", 100);
        write_with_mtime(&source.join("b.txt"), b"b", 200);
        let engine = engine_for(&source, &dir.path().join("dst"), 0);

        let first = engine.run_round().await.unwrap();
        assert_eq!(first.copied, 2);

        let second = engine.run_round().await.unwrap();
        assert_eq!(second.attempted, 2);
        assert_eq!(second.copied, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.succeeded(), 2);
    }

    #[tokio::test]
    async fn subdirectories_are_not_recursed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("nested").join("inner.txt"), b"inner").unwrap();
        fs::write(source.join("top.txt"), b"top").unwrap();
        let backup = dir.path().join("dst");

        let summary = engine_for(&source, &backup, 0).run_round().await.unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.skipped, 1);
        assert!(backup.join("top.txt").exists());
        assert!(!backup.join("nested").exists());
    }

    #[tokio::test]
    async fn bounded_pool_copies_everything() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        fs::create_dir(&source).unwrap();
        for i in 0..20 {
            write_with_mtime(&source.join(format!("f{i}.dat")), format!("{i}").as_bytes(), 1000 + i);
        }
        let backup = dir.path().join("dst");

        let summary = engine_for(&source, &backup, 3).run_round().await.unwrap();

        assert_eq!(summary.attempted, 20);
        assert_eq!(summary.copied, 20);
        for i in 0..20 {
            let dest = backup.join(format!("f{i}.dat"));
            assert_eq!(fs::read_to_string(&dest).unwrap(), format!("{i}"));
            let mtime = FileTime::from_last_modification_time(&fs::metadata(&dest).unwrap());
            assert_eq!(mtime, FileTime::from_unix_time(1000 + i, 0));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn one_failing_file_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        let backup = dir.path().join("dst");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&backup).unwrap();
        write_with_mtime(&source.join("good.txt"), b"good", 100);
        write_with_mtime(&source.join("bad.txt"), b"bad", 100);
        // 备份位置被目录占用，复制必然失败
        fs::create_dir(backup.join("bad.txt")).unwrap();

        let summary = engine_for(&source, &backup, 0).run_round().await.unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(fs::read(backup.join("good.txt")).unwrap(), b"good");
    }
}
