use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::features::gram::layout::LayoutSpec;

/// 资源获取配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// 持久资源根目录（covers/difficulty/rank/fallback 子目录在其下）
    pub root_path: String,
    /// 资源回源基地址（HTTP）
    pub origin_base_url: String,
    /// 回源失败后的额外重试次数
    pub max_retries: u32,
    /// 单次回源尝试的超时（秒）
    pub per_attempt_timeout_secs: u64,
    /// 预热 worker 数量（0 表示按 CPU 数自动推导）
    pub preload_workers: usize,
    /// 预热整体截止时间（秒）
    pub preload_deadline_secs: u64,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root_path: "assets".to_string(),
            origin_base_url: "https://u.otogame.net".to_string(),
            max_retries: 2,
            per_attempt_timeout_secs: 10,
            preload_workers: 0,
            preload_deadline_secs: 30,
        }
    }
}

impl AssetsConfig {
    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.per_attempt_timeout_secs.max(1))
    }

    pub fn preload_deadline(&self) -> Duration {
        Duration::from_secs(self.preload_deadline_secs.max(1))
    }

    /// 实际 worker 数：配置为 0 时按 CPU 数推导，并收敛到 1..=16。
    pub fn effective_preload_workers(&self) -> usize {
        let n = if self.preload_workers == 0 {
            num_cpus::get().min(8)
        } else {
            self.preload_workers
        };
        n.clamp(1, 16)
    }
}

/// 渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// 额外字体目录（ttf/otf）。目录存在但不可读视为致命配置错误。
    pub fonts_dir: Option<String>,
    /// 首选字体族
    pub font_family: String,
    /// 歌名显示宽度预算（unicode display width，超出截断加省略号）
    pub title_width_budget: usize,
    /// 布局常量（格子尺寸、列数、区段间距等）
    pub layout: LayoutSpec,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fonts_dir: None,
            font_family: "Noto Sans CJK SC".to_string(),
            title_width_budget: 20,
            layout: LayoutSpec::default(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 日志格式（pretty/compact）
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 应用配置
///
/// 与配置文件/环境变量一一对应；核心组件不读取全局单例，
/// 而是在构造时显式接收各自需要的部分。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub assets: AssetsConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    ///
    /// 查找顺序：`config.toml`（可选）→ `APP_*` 环境变量。
    /// 全部缺省时返回默认配置。
    pub fn load() -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::builder()
            .add_source(File::with_name("config").required(false))
            // 支持环境变量覆盖，例如：APP_ASSETS_ROOT_PATH
            .add_source(
                Environment::with_prefix("APP")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }
}

/// 初始化 tracing 订阅器（进程内只应调用一次）
pub fn init_tracing(cfg: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if cfg.format == "compact" {
        builder.compact().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing 订阅器已初始化，跳过重复设置");
    }
}
