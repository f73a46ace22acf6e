use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ongeki_gram::error::FetchError;
use ongeki_gram::features::assets::{
    AssetCache, AssetId, AssetStore, CacheTier, OriginFetcher,
};
use ongeki_gram::features::scores::models::Difficulty;

#[derive(Clone, Copy)]
enum Behavior {
    Ok,
    NotFound,
    Transient,
    /// 成功前挂起指定毫秒
    Slow(u64),
}

/// 测试桩：计数每次回源，按既定行为返回
struct MockFetcher {
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    bytes: Vec<u8>,
}

impl MockFetcher {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            bytes: tiny_png([10, 200, 30, 255]),
        }
    }

}

impl OriginFetcher for MockFetcher {
    async fn fetch(&self, _id: &AssetId) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Ok => Ok(self.bytes.clone()),
            Behavior::NotFound => Err(FetchError::NotFound("missing".into())),
            Behavior::Transient => Err(FetchError::Timeout),
            Behavior::Slow(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(self.bytes.clone())
            }
        }
    }
}

fn tiny_png(color: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(4, 4, image::Rgba(color));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

fn temp_store(tag: &str) -> AssetStore {
    let dir = std::env::temp_dir().join(format!(
        "ongeki-gram-cache-{tag}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    AssetStore::new(dir)
}

fn cache_with(tag: &str, behavior: Behavior) -> (AssetCache<MockFetcher>, Arc<AtomicUsize>) {
    let fetcher = MockFetcher::new(behavior);
    let calls = Arc::clone(&fetcher.calls);
    (AssetCache::new(temp_store(tag), fetcher, 4), calls)
}

#[tokio::test]
async fn sequential_resolves_fetch_origin_once() {
    let (cache, calls) = cache_with("idempotent", Behavior::Ok);
    let id = AssetId::Cover { song_id: 1 };

    let first = cache.resolve(&id).await;
    assert_eq!(first.tier, CacheTier::Origin);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 第二次命中内存：不再有网络活动，内容逐像素一致
    let second = cache.resolve(&id).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.image.as_raw(), second.image.as_raw());

    // 成功解析已持久化到磁盘层
    assert!(cache.store().path_for(&id).exists());
}

#[tokio::test]
async fn concurrent_resolves_share_one_flight() {
    let (cache, calls) = cache_with("singleflight", Behavior::Slow(100));
    let id = AssetId::Cover { song_id: 2 };

    let (a, b) = tokio::join!(cache.resolve(&id), cache.resolve(&id));
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "同一资源的并发解析必须合并为一次回源"
    );
    assert_eq!(a.image.as_raw(), b.image.as_raw());
}

#[tokio::test]
async fn permanent_failure_uses_fallback_without_retry() {
    let (cache, calls) = cache_with("permanent", Behavior::NotFound);
    let id = AssetId::Cover { song_id: 3 };

    let asset = cache.resolve(&id).await;
    // 曲绘失败 → 尝试指定回退封面（同样 404）→ 生成图兜底
    assert_eq!(asset.tier, CacheTier::Builtin);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(asset.image.width() > 0);

    // 失败不进缓存：再次解析允许重试
    let _ = cache.resolve(&id).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn transient_failure_uses_fallback() {
    let (cache, _calls) = cache_with("transient", Behavior::Transient);

    let cover = cache.resolve(&AssetId::Cover { song_id: 4 }).await;
    assert_eq!(cover.tier, CacheTier::Builtin);

    // 图标类失败兜底为全透明空白
    let icon = cache
        .resolve(&AssetId::DifficultyIcon(Difficulty::Master))
        .await;
    assert_eq!(icon.tier, CacheTier::Builtin);
    assert!(icon.image.pixels().all(|p| p.0[3] == 0));
}

#[tokio::test]
async fn disk_tier_serves_without_network() {
    let store = temp_store("disk");
    store.ensure_layout().await.unwrap();
    let id = AssetId::Cover { song_id: 5 };
    store.save(&id, &tiny_png([1, 2, 3, 255])).await.unwrap();

    let fetcher = MockFetcher::new(Behavior::NotFound);
    let calls = Arc::clone(&fetcher.calls);
    let cache = AssetCache::new(store, fetcher, 4);

    let asset = cache.resolve(&id).await;
    assert_eq!(asset.tier, CacheTier::Disk);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn disk_persistence_survives_cache_instances() {
    let id = AssetId::Cover { song_id: 6 };
    let root = {
        let (cache, _) = cache_with("persist", Behavior::Ok);
        cache.resolve(&id).await;
        cache.store().root().to_path_buf()
    };

    // 新实例 + 永久失败的回源：只能靠磁盘层命中
    let cache = AssetCache::new(AssetStore::new(root), MockFetcher::new(Behavior::NotFound), 4);
    let asset = cache.resolve(&id).await;
    assert_eq!(asset.tier, CacheTier::Disk);
}

#[tokio::test]
async fn preload_returns_within_deadline_and_render_path_survives() {
    let (cache, _calls) = cache_with("deadline", Behavior::Slow(2_000));
    let ids: Vec<AssetId> = (10..16).map(|song_id| AssetId::Cover { song_id }).collect();

    let started = Instant::now();
    let report = cache.preload(&ids, Duration::from_millis(300)).await;
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_millis(1_500),
        "预热应在截止窗口附近返回，实际 {elapsed:?}"
    );
    assert_eq!(report.requested, 6);
    assert!(report.skipped > 0, "截止应留下未完成的槽位: {report:?}");

    // 未预热成功的资源在绘制路径上仍可解析（此处为慢速成功）
    let asset = cache.resolve(&ids[0]).await;
    assert!(matches!(asset.tier, CacheTier::Origin | CacheTier::Disk));
}

#[tokio::test]
async fn preload_counts_completed_work() {
    let (cache, calls) = cache_with("preload-ok", Behavior::Ok);
    let ids: Vec<AssetId> = (20..24).map(|song_id| AssetId::Cover { song_id }).collect();

    let report = cache.preload(&ids, Duration::from_secs(5)).await;
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // 已在内存中的条目第二轮计入 skipped，且不再触发回源
    let report = cache.preload(&ids, Duration::from_secs(5)).await;
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.skipped, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
