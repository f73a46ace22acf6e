use std::path::{Path, PathBuf};

use super::{AssetCategory, AssetId};

/// 磁盘持久层：固定目录约定（每类一个子目录，文件名由 [`AssetId`] 决定）。
///
/// 每个键写一次、读多次；写入通过临时文件 + rename 保证原子性，
/// 因此跨进程也无需加锁。
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &AssetId) -> PathBuf {
        self.root.join(id.relative_path())
    }

    /// 建好所有类别子目录（幂等）
    pub async fn ensure_layout(&self) -> std::io::Result<()> {
        for category in AssetCategory::ALL {
            tokio::fs::create_dir_all(self.root.join(category.dir_name())).await?;
        }
        Ok(())
    }

    /// 读取一个键；不存在返回 `None`，其余 I/O 错误上抛由调用方按未命中降级。
    pub async fn load(&self, id: &AssetId) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 原子写入一个键：写临时文件后 rename 到目标名。
    pub async fn save(&self, id: &AssetId, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.path_for(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await
    }
}
