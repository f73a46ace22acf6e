use once_cell::sync::OnceCell;
use reqwest::Client;

/// 全局复用的 HTTP Client（统一连接池/Keep-Alive），避免每次请求重复创建。
///
/// 说明：
/// - 单次尝试的超时由调用方按请求设置（见 `HttpOriginFetcher`），
///   因此这里不在 Client 维度设置 timeout；
/// - `Client` 本身是线程安全的，适合全局复用。
static CLIENT_DEFAULT: OnceCell<Client> = OnceCell::new();

/// 默认配置的 HTTP Client
pub fn client_default() -> Result<&'static Client, reqwest::Error> {
    CLIENT_DEFAULT.get_or_try_init(|| Client::builder().build())
}
