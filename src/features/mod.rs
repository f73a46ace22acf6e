/// 定数推算引擎
pub mod rating;

/// 成绩与档案数据模型
pub mod scores;

/// 分层资源缓存（内存 → 磁盘 → 回源）
pub mod assets;

/// 汇总图渲染（布局 / 合成 / 文字）
pub mod gram;
