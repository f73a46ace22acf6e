use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::features::rating;

/// 谱面难度（封闭枚举）
///
/// 上游以数字编码（0/1/2/3/10）传递；未知编码不落入任何成员，
/// 由调用方显式走灰色回退分支。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Basic,
    Advanced,
    Expert,
    Master,
    Lunatic,
}

impl Difficulty {
    /// 全部成员（用于图标预热等固定集合场景）
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Basic,
        Difficulty::Advanced,
        Difficulty::Expert,
        Difficulty::Master,
        Difficulty::Lunatic,
    ];

    /// 由上游数字编码解码
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Difficulty::Basic),
            1 => Some(Difficulty::Advanced),
            2 => Some(Difficulty::Expert),
            3 => Some(Difficulty::Master),
            10 => Some(Difficulty::Lunatic),
            _ => None,
        }
    }

    /// 资源文件名片段（`diff_{name}.png`）
    pub fn asset_name(&self) -> &'static str {
        match self {
            Difficulty::Basic => "basic",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
            Difficulty::Master => "master",
            Difficulty::Lunatic => "lunatic",
        }
    }

    /// 难度色条颜色（RGBA）
    pub fn color(&self) -> [u8; 4] {
        match self {
            Difficulty::Basic => [0x41, 0xa1, 0x47, 0xff],
            Difficulty::Advanced => [0xf5, 0xc4, 0x21, 0xff],
            Difficulty::Expert => [0xf5, 0x45, 0x21, 0xff],
            Difficulty::Master => [0x90, 0x21, 0xf5, 0xff],
            Difficulty::Lunatic => [0xff, 0xff, 0xff, 0xff],
        }
    }
}

/// 未知难度使用的中性灰
pub const UNKNOWN_DIFFICULTY_COLOR: [u8; 4] = [0x88, 0x88, 0x88, 0xff];

/// 评价等级（按分数阈值划分的封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    SssPlus,
    Sss,
    Ss,
    S,
    Aaa,
    Aa,
    A,
    Bbb,
    Bb,
    B,
    C,
    D,
}

/// 评价阈值表：降序扫描，取首个 `score >= 阈值` 的档位。
///
/// 恰好等于阈值的分数归入该档而非下一档。
const RANK_THRESHOLDS: &[(u32, Rank)] = &[
    (1_007_500, Rank::SssPlus),
    (1_000_000, Rank::Sss),
    (990_000, Rank::Ss),
    (970_000, Rank::S),
    (940_000, Rank::Aaa),
    (900_000, Rank::Aa),
    (850_000, Rank::A),
    (800_000, Rank::Bbb),
    (750_000, Rank::Bb),
    (700_000, Rank::B),
    (500_000, Rank::C),
    (0, Rank::D),
];

impl Rank {
    /// 全部成员（按阈值降序）
    pub const ALL: [Rank; 12] = [
        Rank::SssPlus,
        Rank::Sss,
        Rank::Ss,
        Rank::S,
        Rank::Aaa,
        Rank::Aa,
        Rank::A,
        Rank::Bbb,
        Rank::Bb,
        Rank::B,
        Rank::C,
        Rank::D,
    ];

    pub fn from_score(score: u32) -> Rank {
        for &(threshold, rank) in RANK_THRESHOLDS {
            if score >= threshold {
                return rank;
            }
        }
        Rank::D
    }

    /// 资源文件名片段（`rank_{name}.png`）
    pub fn asset_name(&self) -> &'static str {
        match self {
            Rank::SssPlus => "sssplus",
            Rank::Sss => "sss",
            Rank::Ss => "ss",
            Rank::S => "s",
            Rank::Aaa => "aaa",
            Rank::Aa => "aa",
            Rank::A => "a",
            Rank::Bbb => "bbb",
            Rank::Bb => "bb",
            Rank::B => "b",
            Rank::C => "c",
            Rank::D => "d",
        }
    }
}

/// 上游成绩记录（三张列表的元素）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScore {
    /// 歌曲 ID（曲绘按此键取）
    pub song_id: u32,
    /// 曲名
    pub title: String,
    /// 难度编码（0/1/2/3/10，未知编码渲染为灰色）
    pub difficulty: i32,
    /// 技术分
    pub score: u32,
    /// 单曲 rating（定点 ×100）
    pub rating: i32,
}

/// 上游成绩集：三张命名列表 + 各自与总体的聚合 rating（定点 ×100）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreSheet {
    /// 总 rating
    pub rating: i32,
    /// 最佳列表聚合 rating
    pub best_rating: i32,
    /// 新曲列表聚合 rating
    pub new_rating: i32,
    /// 最近列表聚合 rating
    pub recent_rating: i32,
    pub best: Vec<RawScore>,
    pub new: Vec<RawScore>,
    pub recent: Vec<RawScore>,
}

/// 玩家档案
///
/// 头像来自会话侧协作方给出的本地路径；缺失或不可读时
/// 使用生成的默认头像。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub display_name: String,
    pub level: u32,
    /// 玩家总 rating（定点 ×100）
    pub rating: i32,
    #[serde(default)]
    pub avatar_path: Option<PathBuf>,
}

/// 带定数标注的成绩条目（构造后不可变）
#[derive(Debug, Clone)]
pub struct ScoreEntry {
    pub song_id: u32,
    pub title: String,
    pub difficulty: Option<Difficulty>,
    pub score: u32,
    /// 单曲 rating（定点 ×100）
    pub rating: i32,
    /// 推算出的谱面定数
    pub constant: f64,
}

impl ScoreEntry {
    pub fn from_raw(raw: &RawScore) -> Self {
        Self {
            song_id: raw.song_id,
            title: raw.title.clone(),
            difficulty: Difficulty::from_code(raw.difficulty),
            score: raw.score,
            rating: raw.rating,
            constant: rating::chart_constant(raw.score, raw.rating),
        }
    }

    pub fn rank(&self) -> Rank {
        Rank::from_score(self.score)
    }
}

/// 区段种类（绘制顺序固定：最佳 → 新曲 → 最近）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Best,
    New,
    Recent,
}

impl SectionKind {
    pub const ORDERED: [SectionKind; 3] = [SectionKind::Best, SectionKind::New, SectionKind::Recent];

    /// 区段标题
    pub fn label(&self) -> &'static str {
        match self {
            SectionKind::Best => "RATING对象曲（最佳）",
            SectionKind::New => "RATING对象曲（新曲）",
            SectionKind::Recent => "RATING对象曲（最近）",
        }
    }

    /// 截断上限（30/15/10）
    pub fn max_entries(&self) -> usize {
        match self {
            SectionKind::Best => 30,
            SectionKind::New => 15,
            SectionKind::Recent => 10,
        }
    }
}

/// 一个渲染区段：有序成绩（rating 降序）+ 聚合 rating
#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    pub entries: Vec<ScoreEntry>,
    pub aggregate_rating: f64,
}

impl Section {
    /// 由上游列表构建：先剔除 `rating <= 0`，再按 rating 降序排序并截断。
    pub fn build(kind: SectionKind, raw: &[RawScore], aggregate_x100: i32) -> Self {
        let mut entries: Vec<ScoreEntry> = raw
            .iter()
            .filter(|s| s.rating > 0)
            .map(ScoreEntry::from_raw)
            .collect();
        entries.sort_by(|a, b| b.rating.cmp(&a.rating));
        entries.truncate(kind.max_entries());
        Self {
            kind,
            entries,
            aggregate_rating: f64::from(aggregate_x100) / 100.0,
        }
    }
}

impl ScoreSheet {
    /// 拆成固定顺序的三个区段
    pub fn to_sections(&self) -> Vec<Section> {
        vec![
            Section::build(SectionKind::Best, &self.best, self.best_rating),
            Section::build(SectionKind::New, &self.new, self.new_rating),
            Section::build(SectionKind::Recent, &self.recent, self.recent_rating),
        ]
    }

    /// 总 rating（小数）
    pub fn overall_rating(&self) -> f64 {
        f64::from(self.rating) / 100.0
    }
}
