use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use crate::config::{AppConfig, AssetsConfig, RenderConfig};
use crate::error::AppError;
use crate::features::assets::{
    AssetCache, AssetId, AssetStore, FetchPolicy, HttpOriginFetcher, OriginFetcher,
};
use crate::features::scores::models::{Difficulty, PlayerProfile, ScoreSheet, Section, SectionKind};

use super::compositor::Compositor;
use super::text::TextShaper;

/// 汇总图渲染入口。
///
/// 每个实例拥有自己的 [`AssetCache`]（渲染调用持有、合成器借用），
/// 不存在进程级单例；回源实现通过 [`OriginFetcher`] 注入，测试用桩即可。
pub struct GramRenderer<F: OriginFetcher> {
    render_cfg: RenderConfig,
    assets_cfg: AssetsConfig,
    cache: AssetCache<F>,
    shaper: TextShaper,
}

impl GramRenderer<HttpOriginFetcher> {
    /// 用配置中的回源基地址构建 HTTP 回源的渲染器
    pub fn with_http(config: &AppConfig) -> Result<Self, AppError> {
        let fetcher = HttpOriginFetcher::new(
            config.assets.origin_base_url.as_str(),
            FetchPolicy {
                max_retries: config.assets.max_retries,
                per_attempt_timeout: config.assets.per_attempt_timeout(),
            },
        );
        Self::new(config, fetcher)
    }
}

impl<F: OriginFetcher> GramRenderer<F> {
    pub fn new(config: &AppConfig, fetcher: F) -> Result<Self, AppError> {
        let shaper = TextShaper::new(
            config.render.fonts_dir.as_deref().map(Path::new),
            config.render.font_family.clone(),
        )?;
        let store = AssetStore::new(&config.assets.root_path);
        let cache = AssetCache::new(store, fetcher, config.assets.effective_preload_workers());
        Ok(Self {
            render_cfg: config.render.clone(),
            assets_cfg: config.assets.clone(),
            cache,
            shaper,
        })
    }

    pub fn cache(&self) -> &AssetCache<F> {
        &self.cache
    }

    /// 渲染一张汇总图，返回 PNG 字节。
    ///
    /// 流程：区段构建（定数标注）→ 资源预热（受全局截止约束）→
    /// 布局 → 合成 → 编码。预热只是暖场；未解析的资源在绘制时
    /// 惰性解析或回退，资源问题永远不会让渲染失败。
    pub async fn render(
        &self,
        sheet: &ScoreSheet,
        profile: Option<&PlayerProfile>,
    ) -> Result<Vec<u8>, AppError> {
        let t0 = Instant::now();

        let sections = sheet.to_sections();

        if let Err(e) = self.cache.store().ensure_layout().await {
            tracing::warn!("创建资源目录失败（磁盘层退化为只回源）: {e}");
        }

        let ids = collect_asset_ids(&sections);
        let report = self
            .cache
            .preload(&ids, self.assets_cfg.preload_deadline())
            .await;
        let t_preload = t0.elapsed();

        let counts: Vec<(SectionKind, usize)> = sections
            .iter()
            .map(|s| (s.kind, s.entries.len()))
            .collect();
        let layout = self.render_cfg.layout.compute(&counts, profile.is_some());

        let mut compositor = Compositor::new(
            &layout,
            &self.render_cfg.layout,
            &self.cache,
            &self.shaper,
            self.render_cfg.title_width_budget,
        );
        compositor.draw(&sections, profile, sheet.overall_rating()).await?;
        let t_draw = t0.elapsed();

        let png = compositor.into_png()?;

        tracing::info!(
            "渲染分段: 预热={:?}(成功{}/失败{}/跳过{}), 合成={:?}, 编码={:?}, 尺寸={}x{}",
            t_preload,
            report.succeeded,
            report.failed,
            report.skipped,
            t_draw - t_preload,
            t0.elapsed() - t_draw,
            layout.width,
            layout.height
        );

        Ok(png)
    }
}

/// 收集一次渲染涉及的全部资源：去重后的封面、用到的评价徽章、
/// 全套难度图标与回退封面（固定小集合，顺带预热）。
pub fn collect_asset_ids(sections: &[Section]) -> Vec<AssetId> {
    let mut ids = vec![AssetId::CoverFallback];
    for difficulty in Difficulty::ALL {
        ids.push(AssetId::DifficultyIcon(difficulty));
    }

    let mut seen_covers = HashSet::new();
    let mut seen_ranks = HashSet::new();
    for section in sections {
        for entry in &section.entries {
            if seen_covers.insert(entry.song_id) {
                ids.push(AssetId::Cover {
                    song_id: entry.song_id,
                });
            }
            let rank = entry.rank();
            if seen_ranks.insert(rank) {
                ids.push(AssetId::RankIcon(rank));
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::scores::models::RawScore;

    #[test]
    fn asset_ids_are_deduplicated() {
        let raw = |song_id: u32, score: u32| RawScore {
            song_id,
            title: "t".into(),
            difficulty: 3,
            score,
            rating: 1000,
        };
        let sections = vec![
            Section::build(
                SectionKind::Best,
                &[raw(1, 1_007_500), raw(1, 1_007_500), raw(2, 500_000)],
                1000,
            ),
            Section::build(SectionKind::New, &[raw(1, 1_007_500)], 1000),
            Section::build(SectionKind::Recent, &[], 0),
        ];

        let ids = collect_asset_ids(&sections);
        let covers = ids
            .iter()
            .filter(|id| matches!(id, AssetId::Cover { .. }))
            .count();
        let ranks = ids
            .iter()
            .filter(|id| matches!(id, AssetId::RankIcon(_)))
            .count();
        assert_eq!(covers, 2);
        // 1_007_500 -> SSS+，500_000 -> C
        assert_eq!(ranks, 2);
        assert!(ids.contains(&AssetId::CoverFallback));
        // 难度图标整套预热
        assert_eq!(
            ids.iter()
                .filter(|id| matches!(id, AssetId::DifficultyIcon(_)))
                .count(),
            5
        );
    }
}
