pub mod cache;
pub mod fetcher;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;

use crate::features::scores::models::{Difficulty, Rank};

pub use cache::{AssetCache, PreloadReport};
pub use fetcher::{FetchPolicy, HttpOriginFetcher, OriginFetcher};
pub use store::AssetStore;

/// 资源类别（每个类别对应磁盘上的一个子目录）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Cover,
    DifficultyIcon,
    RankIcon,
    Fallback,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Cover,
        AssetCategory::DifficultyIcon,
        AssetCategory::RankIcon,
        AssetCategory::Fallback,
    ];

    /// 子目录名
    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetCategory::Cover => "covers",
            AssetCategory::DifficultyIcon => "difficulty",
            AssetCategory::RankIcon => "rank",
            AssetCategory::Fallback => "fallback",
        }
    }
}

/// 资源标识（封闭枚举：曲绘按歌曲 ID，图标为固定小集合）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetId {
    /// 歌曲封面
    Cover { song_id: u32 },
    /// 指定的回退封面（本身也是一个可下载资源）
    CoverFallback,
    /// 难度指示器图标
    DifficultyIcon(Difficulty),
    /// 评价等级徽章图标
    RankIcon(Rank),
}

impl AssetId {
    pub fn category(&self) -> AssetCategory {
        match self {
            AssetId::Cover { .. } => AssetCategory::Cover,
            AssetId::CoverFallback => AssetCategory::Fallback,
            AssetId::DifficultyIcon(_) => AssetCategory::DifficultyIcon,
            AssetId::RankIcon(_) => AssetCategory::RankIcon,
        }
    }

    /// 文件名（类别内唯一，扩展名固定：曲绘 webp、图标 png）
    pub fn file_name(&self) -> String {
        match self {
            AssetId::Cover { song_id } => format!("{song_id}.webp"),
            AssetId::CoverFallback => "cover.webp".to_string(),
            AssetId::DifficultyIcon(d) => format!("diff_{}.png", d.asset_name()),
            AssetId::RankIcon(r) => format!("rank_{}.png", r.asset_name()),
        }
    }

    /// 相对持久目录的路径：`{category}/{file_name}`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.category().dir_name()).join(self.file_name())
    }
}

/// 缓存层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// 进程内存（moka）
    Memory,
    /// 磁盘持久层
    Disk,
    /// 远端回源
    Origin,
    /// 进程内生成的兜底图（不进入缓存）
    Builtin,
}

/// 一条已解析的资源：解码后的位图 + 来源层级 + 取得时间。
///
/// 创建后不再修改；内存层内按值克隆（位图以 `Arc` 共享）。
#[derive(Debug, Clone)]
pub struct CachedAsset {
    pub id: AssetId,
    pub image: Arc<RgbaImage>,
    pub tier: CacheTier,
    pub fetched_at: DateTime<Utc>,
}

/// 生成的兜底封面：深灰纯色块（尺寸无关紧要，绘制时会按格子裁切）
static BUILTIN_COVER: Lazy<Arc<RgbaImage>> = Lazy::new(|| {
    Arc::new(RgbaImage::from_pixel(
        256,
        256,
        Rgba([0x18, 0x18, 0x18, 0xff]),
    ))
});

/// 图标类的兜底：全透明空白块
static BUILTIN_BLANK: Lazy<Arc<RgbaImage>> =
    Lazy::new(|| Arc::new(RgbaImage::from_pixel(116, 24, Rgba([0, 0, 0, 0]))));

impl CachedAsset {
    /// 兜底封面（所有获取途径都失败时的最终保证）
    pub fn builtin_cover(id: AssetId) -> Self {
        Self {
            id,
            image: Arc::clone(&BUILTIN_COVER),
            tier: CacheTier::Builtin,
            fetched_at: Utc::now(),
        }
    }

    /// 图标类兜底（透明空白）
    pub fn builtin_blank(id: AssetId) -> Self {
        Self {
            id,
            image: Arc::clone(&BUILTIN_BLANK),
            tier: CacheTier::Builtin,
            fetched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_paths_follow_category_layout() {
        assert_eq!(
            AssetId::Cover { song_id: 4210 }.relative_path(),
            PathBuf::from("covers/4210.webp")
        );
        assert_eq!(
            AssetId::CoverFallback.relative_path(),
            PathBuf::from("fallback/cover.webp")
        );
        assert_eq!(
            AssetId::DifficultyIcon(Difficulty::Master).relative_path(),
            PathBuf::from("difficulty/diff_master.png")
        );
        assert_eq!(
            AssetId::RankIcon(Rank::SssPlus).relative_path(),
            PathBuf::from("rank/rank_sssplus.png")
        );
    }

    #[test]
    fn builtin_placeholders_are_drawable() {
        let cover = CachedAsset::builtin_cover(AssetId::CoverFallback);
        assert_eq!(cover.tier, CacheTier::Builtin);
        assert!(cover.image.width() > 0 && cover.image.height() > 0);

        let blank = CachedAsset::builtin_blank(AssetId::RankIcon(Rank::D));
        // 图标兜底是全透明的：画上去不可见但不会失败
        assert!(blank.image.pixels().all(|p| p.0[3] == 0));
    }
}
