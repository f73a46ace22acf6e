use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;

use crate::error::FetchError;
use crate::http;

use super::AssetId;

/// 回源策略：重试上限与单次尝试超时。
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// 首次失败后的额外重试次数
    pub max_retries: u32,
    /// 单次尝试的超时
    pub per_attempt_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            per_attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// 回源抓取能力（黑盒协作方）：按 [`AssetId`] 取回图片字节或分类失败。
///
/// 重试/超时语义由实现负责；缓存层只关心最终结果。
pub trait OriginFetcher: Send + Sync {
    fn fetch(&self, id: &AssetId) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// 基于 HTTP GET 的回源实现：URL 由基地址 + [`AssetId`] 模板化而来。
#[derive(Debug, Clone)]
pub struct HttpOriginFetcher {
    base_url: String,
    policy: FetchPolicy,
}

impl HttpOriginFetcher {
    pub fn new(base_url: impl Into<String>, policy: FetchPolicy) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, policy }
    }

    /// 资源 URL 模板
    fn url_for(&self, id: &AssetId) -> String {
        let base = &self.base_url;
        match id {
            AssetId::Cover { song_id } => format!("{base}/cover/{song_id}.webp"),
            AssetId::CoverFallback => format!("{base}/img/musicjacket_fallback.webp"),
            AssetId::DifficultyIcon(d) => format!("{base}/img/diff_{}.png", d.asset_name()),
            AssetId::RankIcon(r) => format!("{base}/img/rank_{}.png", r.asset_name()),
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let client = http::client_default().map_err(|e| FetchError::Network(e.to_string()))?;
        let resp = client
            .get(url)
            .timeout(self.policy.per_attempt_timeout)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

impl OriginFetcher for HttpOriginFetcher {
    async fn fetch(&self, id: &AssetId) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(id);
        for attempt in 0..=self.policy.max_retries {
            match self.fetch_once(&url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_permanent() => return Err(e),
                Err(e) => {
                    if attempt < self.policy.max_retries {
                        tracing::warn!("回源失败（第 {} 次尝试），稍后重试: {e}", attempt + 1);
                        sleep(Duration::from_millis(250 * u64::from(attempt + 1))).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        Err(FetchError::Network("重试次数耗尽".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::scores::models::{Difficulty, Rank};

    #[test]
    fn urls_are_templated_from_asset_ids() {
        let f = HttpOriginFetcher::new("https://example.net/", FetchPolicy::default());
        assert_eq!(
            f.url_for(&AssetId::Cover { song_id: 4210 }),
            "https://example.net/cover/4210.webp"
        );
        assert_eq!(
            f.url_for(&AssetId::CoverFallback),
            "https://example.net/img/musicjacket_fallback.webp"
        );
        assert_eq!(
            f.url_for(&AssetId::DifficultyIcon(Difficulty::Lunatic)),
            "https://example.net/img/diff_lunatic.png"
        );
        assert_eq!(
            f.url_for(&AssetId::RankIcon(Rank::Aaa)),
            "https://example.net/img/rank_aaa.png"
        );
    }
}
