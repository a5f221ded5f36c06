use filetime::FileTime;
use std::io;
use std::path::Path;

/// 备份文件相对源文件的新鲜度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// 备份不存在
    Missing,
    /// 备份存在但修改时间与源文件不同
    Stale,
    /// 备份存在且修改时间相同
    Current,
}

impl Freshness {
    /// 是否需要复制
    pub fn needs_copy(self) -> bool {
        !matches!(self, Freshness::Current)
    }
}

/// 文件比较器
///
/// 只比较修改时间，且要求完全相等（纳秒精度，没有容差）。
/// 两边文件系统时间精度不同导致的误判属于已知限制。
#[derive(Debug, Clone, Copy, Default)]
pub struct FileComparator;

impl FileComparator {
    pub fn new() -> Self {
        Self
    }

    /// 根据源文件修改时间和备份文件修改时间（不存在为 None）判断新鲜度
    pub fn compare_mtime(&self, source: FileTime, dest: Option<FileTime>) -> Freshness {
        match dest {
            None => Freshness::Missing,
            Some(dest) if dest == source => Freshness::Current,
            Some(dest) => {
                tracing::debug!(
                    "文件时间不同: src_time={}, dst_time={}",
                    source,
                    dest
                );
                Freshness::Stale
            }
        }
    }

    /// 读取备份文件的元数据并判断新鲜度
    ///
    /// 备份不存在时返回 `Missing`，其他 I/O 错误原样返回。
    pub async fn check(&self, source_mtime: FileTime, dest_path: &Path) -> io::Result<Freshness> {
        let dest_mtime = match tokio::fs::metadata(dest_path).await {
            Ok(metadata) => Some(FileTime::from_last_modification_time(&metadata)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        Ok(self.compare_mtime(source_mtime, dest_mtime))
    }
}
