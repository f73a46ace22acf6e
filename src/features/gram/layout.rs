use serde::{Deserialize, Serialize};

use crate::features::scores::models::SectionKind;

/// 布局常量（可由配置覆盖）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSpec {
    pub cell_width: u32,
    pub cell_height: u32,
    /// 每行格子数
    pub columns: u32,
    /// 区段之间与页面上方的留白
    pub section_padding: u32,
    /// 区段标题带高度
    pub title_height: u32,
    /// 顶部玩家信息带高度
    pub profile_height: u32,
    /// 页脚留白
    pub footer_margin: u32,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self {
            cell_width: 200,
            cell_height: 100,
            columns: 5,
            section_padding: 30,
            title_height: 34,
            profile_height: 120,
            footer_margin: 30,
        }
    }
}

/// 单个区段在画布上的位置
#[derive(Debug, Clone)]
pub struct SectionFrame {
    pub kind: SectionKind,
    /// 标题带顶部 y
    pub title_y: u32,
    /// 格子网格顶部 y
    pub grid_y: u32,
    pub rows: u32,
    pub count: usize,
}

/// 整张图的几何结果（纯计算，不依赖资源与画布）
#[derive(Debug, Clone)]
pub struct GramLayout {
    pub width: u32,
    pub height: u32,
    /// 含玩家信息带时为其高度
    pub profile_height: Option<u32>,
    pub sections: Vec<SectionFrame>,
    /// 页脚文本带顶部 y
    pub footer_y: u32,
}

impl LayoutSpec {
    /// 区段行数：`ceil(count / columns)`
    pub fn rows(&self, count: usize) -> u32 {
        (count as u32).div_ceil(self.columns.max(1))
    }

    /// 画布固定宽度
    pub fn canvas_width(&self) -> u32 {
        self.cell_width * self.columns
    }

    /// 区段内第 `index` 个格子的左上角坐标
    pub fn cell_origin(&self, grid_y: u32, index: usize) -> (u32, u32) {
        let i = index as u32;
        (
            (i % self.columns) * self.cell_width,
            grid_y + (i / self.columns) * self.cell_height,
        )
    }

    /// 由三个区段的（截断后）条目数计算整图几何。
    ///
    /// 高度闭式：`[profile] + padding + Σ(title + rows*cell + padding) + footer`。
    /// 区段自上而下固定顺序排列；玩家信息带仅在有档案时占据顶部。
    pub fn compute(&self, counts: &[(SectionKind, usize)], with_profile: bool) -> GramLayout {
        let mut cursor = if with_profile { self.profile_height } else { 0 };
        cursor += self.section_padding;

        let mut sections = Vec::with_capacity(counts.len());
        for &(kind, count) in counts {
            let rows = self.rows(count);
            let title_y = cursor;
            let grid_y = title_y + self.title_height;
            cursor = grid_y + rows * self.cell_height + self.section_padding;
            sections.push(SectionFrame {
                kind,
                title_y,
                grid_y,
                rows,
                count,
            });
        }

        GramLayout {
            width: self.canvas_width(),
            height: cursor + self.footer_margin,
            profile_height: with_profile.then_some(self.profile_height),
            sections,
            footer_y: cursor,
        }
    }
}
