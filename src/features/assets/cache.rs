use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use image::RgbaImage;
use moka::future::Cache;

use crate::error::{AppError, FetchError};

use super::fetcher::OriginFetcher;
use super::store::AssetStore;
use super::{AssetId, CacheTier, CachedAsset};

/// 内存层容量（条目数）。一次渲染最多涉及几十个资源，远低于此值；
/// 上限只是防御长生命周期实例的无界增长。
const MEMORY_CAPACITY: u64 = 4096;

/// 预热结果统计（仅用于观测，不影响渲染正确性）
#[derive(Debug, Clone, Copy, Default)]
pub struct PreloadReport {
    /// 请求预热的资源总数
    pub requested: usize,
    /// 截止前成功解析的数量
    pub succeeded: usize,
    /// 截止前以失败告终的数量（绘制时将走回退）
    pub failed: usize,
    /// 未在截止前完成的数量（含已在内存中无需预热的；绘制时惰性解析）
    pub skipped: usize,
}

/// 分层资源缓存：内存（moka）→ 磁盘 → 回源。
///
/// - `resolve` 永不失败：所有获取途径耗尽后返回类别兜底图；
/// - 同一 [`AssetId`] 的并发解析只发出一次回源请求
///   （moka `try_get_with` 的合并语义）；
/// - 失败结果不会进入缓存，后续调用可以重试；
/// - 实例由一次渲染调用持有并以引用传给合成器，不做进程级单例。
pub struct AssetCache<F: OriginFetcher> {
    memory: Cache<AssetId, CachedAsset>,
    store: AssetStore,
    fetcher: F,
    preload_workers: usize,
}

impl<F: OriginFetcher> AssetCache<F> {
    pub fn new(store: AssetStore, fetcher: F, preload_workers: usize) -> Self {
        Self {
            memory: Cache::builder().max_capacity(MEMORY_CAPACITY).build(),
            store,
            fetcher,
            preload_workers: preload_workers.max(1),
        }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// 解析资源，保证返回可绘制内容。
    ///
    /// 获取失败时降级：曲绘 → 指定回退封面 → 生成的纯色块；
    /// 图标 → 透明空白。失败在 warning 级别记录一次。
    pub async fn resolve(&self, id: &AssetId) -> CachedAsset {
        match self.resolve_strict(id).await {
            Ok(asset) => asset,
            Err(e) => {
                tracing::warn!("资源解析失败，使用回退: id={id:?}, err={e}");
                self.fallback_for(id).await
            }
        }
    }

    /// 解析资源，失败时返回错误（预热统计与回退路径使用）。
    pub async fn resolve_strict(&self, id: &AssetId) -> Result<CachedAsset, Arc<AppError>> {
        self.memory
            .try_get_with_by_ref(id, self.load_uncached(id))
            .await
    }

    /// 内存未命中时的慢路径：磁盘 → 回源（成功后持久化）。
    ///
    /// 返回条目的 `tier` 记录首次物化来源；后续内存命中不改写它。
    async fn load_uncached(&self, id: &AssetId) -> Result<CachedAsset, AppError> {
        match self.store.load(id).await {
            Ok(Some(bytes)) => match decode_image(&bytes) {
                Ok(image) => {
                    return Ok(CachedAsset {
                        id: id.clone(),
                        image: Arc::new(image),
                        tier: CacheTier::Disk,
                        fetched_at: Utc::now(),
                    });
                }
                Err(e) => {
                    tracing::warn!("磁盘缓存损坏，按未命中回源: id={id:?}, err={e}");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("读取磁盘缓存失败，按未命中回源: id={id:?}, err={e}");
            }
        }

        let bytes = self.fetcher.fetch(id).await?;
        let image = decode_image(&bytes)?;

        // 持久化失败不阻断本次解析，仅损失下次的磁盘命中。
        if let Err(e) = self.store.save(id, &bytes).await {
            tracing::warn!("写入磁盘缓存失败: id={id:?}, err={e}");
        }

        Ok(CachedAsset {
            id: id.clone(),
            image: Arc::new(image),
            tier: CacheTier::Origin,
            fetched_at: Utc::now(),
        })
    }

    /// 类别兜底。曲绘的回退封面本身走一次严格解析（它也是资源），
    /// 仍失败才落到生成图，避免递归。
    async fn fallback_for(&self, id: &AssetId) -> CachedAsset {
        match id {
            AssetId::Cover { .. } => match self.resolve_strict(&AssetId::CoverFallback).await {
                Ok(fallback) => CachedAsset {
                    id: id.clone(),
                    ..fallback
                },
                Err(_) => CachedAsset::builtin_cover(id.clone()),
            },
            AssetId::CoverFallback => CachedAsset::builtin_cover(id.clone()),
            AssetId::DifficultyIcon(_) | AssetId::RankIcon(_) => {
                CachedAsset::builtin_blank(id.clone())
            }
        }
    }

    /// 批量预热：worker 池受限并发，整体受 `deadline` 约束。
    ///
    /// 截止后剩余抓取随流的丢弃而取消，已解析的条目不受影响；
    /// 未完成的槽位在绘制时惰性解析（回退或重新抓取）。
    /// 预热只是尽力而为的暖场，跳过它渲染依旧成立。
    pub async fn preload(&self, ids: &[AssetId], deadline: Duration) -> PreloadReport {
        let requested = ids.len();
        let mut already = 0usize;
        let mut pending = Vec::with_capacity(ids.len());
        for id in ids {
            if self.memory.contains_key(id) {
                already += 1;
            } else {
                pending.push(id.clone());
            }
        }

        let succeeded = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        let work = futures_util::stream::iter(pending.iter())
            .map(|id| {
                let succeeded = &succeeded;
                let failed = &failed;
                async move {
                    match self.resolve_strict(id).await {
                        Ok(_) => succeeded.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
            .buffer_unordered(self.preload_workers)
            .for_each(|()| async {});

        let timed_out = tokio::time::timeout(deadline, work).await.is_err();

        let succeeded = succeeded.load(Ordering::Relaxed);
        let failed = failed.load(Ordering::Relaxed);
        let report = PreloadReport {
            requested,
            succeeded,
            failed,
            skipped: already + pending.len() - succeeded - failed,
        };

        if timed_out {
            tracing::warn!(
                "资源预热达到截止时间: 请求={}, 成功={}, 失败={}, 跳过={}",
                report.requested,
                report.succeeded,
                report.failed,
                report.skipped
            );
        } else {
            tracing::info!(
                "资源预热完成: 请求={}, 成功={}, 失败={}, 跳过={}",
                report.requested,
                report.succeeded,
                report.failed,
                report.skipped
            );
        }
        report
    }
}

fn decode_image(bytes: &[u8]) -> Result<RgbaImage, FetchError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| FetchError::Decode(e.to_string()))
}
