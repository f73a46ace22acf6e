use thiserror::Error;

/// 应用统一错误类型
///
/// 约定：资源获取类失败（[`FetchError`]、缓存 I/O）不会让整次渲染失败，
/// 由调用方降级到回退资源；只有配置级错误（字体目录不可读、配置非法）
/// 才会中止渲染。
#[derive(Error, Debug)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 字体资源不可用
    #[error("字体资源不可用: {0}")]
    Font(String),

    /// 图像渲染错误
    #[error("图像渲染错误: {0}")]
    Render(String),

    /// 资源获取失败
    #[error("资源获取失败: {0}")]
    Fetch(#[from] FetchError),

    /// 本地缓存 I/O 错误（按缓存未命中处理，不致命）
    #[error("本地缓存 I/O 错误: {0}")]
    CacheIo(String),

    /// 参数校验错误
    #[error("参数校验错误: {0}")]
    Validation(String),
}

/// 远端资源获取错误分类
///
/// - `NotFound`/`Decode` 为永久失败：重试没有意义，直接使用回退资源；
/// - 其余均视为瞬时失败，按策略重试后再回退。
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// 资源不存在（HTTP 404，不重试）
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 上游返回异常状态码
    #[error("上游响应异常: HTTP {0}")]
    Status(u16),

    /// 请求超时（含 connect/read 等阶段）
    #[error("请求超时")]
    Timeout,

    /// 网络传输错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 响应体不是可解码的图片
    #[error("图片解码失败: {0}")]
    Decode(String),
}

impl FetchError {
    /// 永久失败不参与重试
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::NotFound(_) | FetchError::Decode(_))
    }
}

// =============== Error conversions for common external errors ===============

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::CacheIo(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Render(err.to_string())
    }
}
