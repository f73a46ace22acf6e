/// 统一错误处理模块
pub mod error;

/// 配置模块
pub mod config;

/// 功能聚合模块
pub mod features;

/// HTTP Client 复用工具
pub mod http;

// 导出常用类型供外部使用
pub use config::{AppConfig, init_tracing};
pub use error::{AppError, FetchError};
pub use features::assets::{AssetCache, AssetId, CacheTier, CachedAsset, PreloadReport};
pub use features::gram::GramRenderer;
pub use features::scores::models::{PlayerProfile, RawScore, ScoreSheet};
