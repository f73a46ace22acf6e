use chrono::{FixedOffset, Utc};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::error::AppError;
use crate::features::assets::{AssetCache, AssetId, OriginFetcher};
use crate::features::scores::models::{
    PlayerProfile, ScoreEntry, Section, UNKNOWN_DIFFICULTY_COLOR,
};

use super::gradient_text::{GradientTextRenderer, RatingTier};
use super::layout::{GramLayout, LayoutSpec, SectionFrame};
use super::text::{TextShaper, composite_pixmap, truncate_with_ellipsis};

// 画布与格子内部的固定尺度（沿用原版视觉参数）
const CANVAS_BG: Rgba<u8> = Rgba([32, 32, 32, 255]);
const CELL_OVERLAY: Rgba<u8> = Rgba([0, 0, 0, 128]);
const COVER_BLUR_SIGMA: f32 = 4.0;
const COLOR_BAR_WIDTH: u32 = 5;
const CELL_TEXT_X: u32 = 16;
const DIFF_ICON_OFFSET: (u32, u32) = (16, 5);
const RANK_BADGE_HEIGHT: u32 = 24;
const RANK_BADGE_MARGIN: u32 = 6;
const TITLE_X: u32 = 10;
/// 聚合 rating 相对标题起点的固定列偏移（非按内容测量）
const AGGREGATE_OFFSET_X: u32 = 620;

// 玩家信息带
const PROFILE_GRADIENT: ([u8; 4], [u8; 4]) = ([255, 240, 100, 255], [255, 214, 94, 255]);
const PROFILE_TEXT_FILL: &str = "#323232";
const AVATAR_SIZE: u32 = 100;
const AVATAR_ORIGIN: (u32, u32) = (20, 10);
const RATING_READOUT_SIZE: (u32, u32) = (220, 60);

/// 合成器：持有画布，按布局逐格绘制。
///
/// 画布变更严格串行；仅资源解析（`cache.resolve`）可能挂起。
/// 单元格级的问题只降级该格（占位 + 警告日志），不会中断整图。
pub struct Compositor<'a, F: OriginFetcher> {
    canvas: RgbaImage,
    layout: &'a GramLayout,
    spec: &'a LayoutSpec,
    cache: &'a AssetCache<F>,
    shaper: &'a TextShaper,
    title_width_budget: usize,
}

impl<'a, F: OriginFetcher> Compositor<'a, F> {
    pub fn new(
        layout: &'a GramLayout,
        spec: &'a LayoutSpec,
        cache: &'a AssetCache<F>,
        shaper: &'a TextShaper,
        title_width_budget: usize,
    ) -> Self {
        let canvas = RgbaImage::from_pixel(layout.width, layout.height, CANVAS_BG);
        Self {
            canvas,
            layout,
            spec,
            cache,
            shaper,
            title_width_budget,
        }
    }

    /// 绘制整张图：信息带 → 各区段（标题 + 网格，行主序） → 页脚。
    pub async fn draw(
        &mut self,
        sections: &[Section],
        profile: Option<&PlayerProfile>,
        overall_rating: f64,
    ) -> Result<(), AppError> {
        if self.layout.profile_height.is_some()
            && let Some(profile) = profile
        {
            self.draw_profile(profile)?;
        }

        let frames: Vec<SectionFrame> = self.layout.sections.clone();
        for frame in &frames {
            let Some(section) = sections.iter().find(|s| s.kind == frame.kind) else {
                continue;
            };
            self.draw_section_title(frame, section)?;
            for (index, entry) in section.entries.iter().enumerate() {
                let (x, y) = self.spec.cell_origin(frame.grid_y, index);
                if let Err(e) = self.draw_cell(x, y, entry).await {
                    tracing::warn!(
                        "单元格绘制失败，降级为占位: song_id={}, err={e}",
                        entry.song_id
                    );
                    self.draw_cell_placeholder(x, y)?;
                }
            }
        }

        self.draw_footer(overall_rating)?;
        Ok(())
    }

    /// 单元格绘制约定（顺序固定）：
    /// 封面铺满裁切 → 模糊 + 压暗 → 难度色条 → 难度图标 →
    /// 曲名（截断） → 分数（千分组） → 定数 -> rating → 评价徽章。
    async fn draw_cell(&mut self, x: u32, y: u32, entry: &ScoreEntry) -> Result<(), AppError> {
        let cw = self.spec.cell_width;
        let ch = self.spec.cell_height;

        // 封面按 cover 语义缩放：以较大的需求边缩放后居中裁掉溢出
        let cover = self.cache.resolve(&AssetId::Cover {
            song_id: entry.song_id,
        })
        .await;
        let scaled = DynamicImage::ImageRgba8((*cover.image).clone())
            .resize_to_fill(cw, ch, FilterType::Triangle)
            .to_rgba8();
        let blurred = imageops::blur(&scaled, COVER_BLUR_SIGMA);
        imageops::replace(&mut self.canvas, &blurred, i64::from(x), i64::from(y));

        // 半透明压暗层保证文字可读
        let overlay = RgbaImage::from_pixel(cw, ch, CELL_OVERLAY);
        imageops::overlay(&mut self.canvas, &overlay, i64::from(x), i64::from(y));

        // 难度色条；未知难度显式走中性灰
        let bar_color = entry
            .difficulty
            .map(|d| d.color())
            .unwrap_or(UNKNOWN_DIFFICULTY_COLOR);
        self.fill_rect(x, y, COLOR_BAR_WIDTH, ch, Rgba(bar_color));

        // 难度图标：避开色条放在左上；未知难度无图标
        if let Some(difficulty) = entry.difficulty {
            let icon = self.cache.resolve(&AssetId::DifficultyIcon(difficulty)).await;
            imageops::overlay(
                &mut self.canvas,
                &*icon.image,
                i64::from(x + DIFF_ICON_OFFSET.0),
                i64::from(y + DIFF_ICON_OFFSET.1),
            );
        }

        // 文本块整体下移，给难度图标留出空间
        let title = if entry.title.trim().is_empty() {
            "Unknown".to_string()
        } else {
            truncate_with_ellipsis(&entry.title, self.title_width_budget)
        };
        self.draw_text(&title, 14.0, "#ffffff", x + CELL_TEXT_X, y + 25)?;
        self.draw_text(
            &format_thousands(entry.score),
            14.0,
            "#ffffff",
            x + CELL_TEXT_X,
            y + 45,
        )?;
        let rating_line = format!(
            "{:.1} -> {:.2}",
            entry.constant,
            f64::from(entry.rating) / 100.0
        );
        self.draw_text(&rating_line, 14.0, "#ffffff", x + CELL_TEXT_X, y + 65)?;

        // 评价徽章：阈值表降序扫描的结果，贴右下角
        let badge = self.cache.resolve(&AssetId::RankIcon(entry.rank())).await;
        let badge_w = (badge.image.width() * RANK_BADGE_HEIGHT
            / badge.image.height().max(1))
        .max(1);
        let badge_img = imageops::resize(
            &*badge.image,
            badge_w,
            RANK_BADGE_HEIGHT,
            FilterType::Triangle,
        );
        let bx = (x + cw).saturating_sub(badge_w + RANK_BADGE_MARGIN);
        let by = (y + ch).saturating_sub(RANK_BADGE_HEIGHT + RANK_BADGE_MARGIN);
        imageops::overlay(&mut self.canvas, &badge_img, i64::from(bx), i64::from(by));

        Ok(())
    }

    /// 记录不可用时的占位格：暗底 + 灰条 + "Unknown"
    fn draw_cell_placeholder(&mut self, x: u32, y: u32) -> Result<(), AppError> {
        let cw = self.spec.cell_width;
        let ch = self.spec.cell_height;
        self.fill_rect(x, y, cw, ch, Rgba([24, 24, 24, 255]));
        self.fill_rect(x, y, COLOR_BAR_WIDTH, ch, Rgba(UNKNOWN_DIFFICULTY_COLOR));
        self.draw_text("Unknown", 14.0, "#ffffff", x + CELL_TEXT_X, y + 25)
    }

    /// 区段标题：标题左对齐，聚合 rating 固定列偏移（简单定列，不测宽）
    fn draw_section_title(&mut self, frame: &SectionFrame, section: &Section) -> Result<(), AppError> {
        self.draw_text(
            section.kind.label(),
            24.0,
            "#ffffff",
            TITLE_X,
            frame.title_y,
        )?;
        self.draw_text(
            &format!("Rating: {:.2}", section.aggregate_rating),
            14.0,
            "#ffffff",
            TITLE_X + AGGREGATE_OFFSET_X,
            frame.title_y + 10,
        )
    }

    /// 玩家信息带：双色横向渐变底 + 圆形头像 + 名字/等级 + rating 读数
    fn draw_profile(&mut self, profile: &PlayerProfile) -> Result<(), AppError> {
        let width = self.spec.canvas_width();
        let height = self.spec.profile_height;
        self.fill_horizontal_gradient(0, 0, width, height, PROFILE_GRADIENT.0, PROFILE_GRADIENT.1);

        let avatar = load_avatar(profile);
        let avatar = imageops::resize(&avatar, AVATAR_SIZE, AVATAR_SIZE, FilterType::Triangle);
        let avatar = circular_mask(avatar);
        imageops::overlay(
            &mut self.canvas,
            &avatar,
            i64::from(AVATAR_ORIGIN.0),
            i64::from(AVATAR_ORIGIN.1),
        );

        let name = if profile.display_name.trim().is_empty() {
            "未知玩家"
        } else {
            profile.display_name.as_str()
        };
        self.draw_text(&format!("Lv.{}", profile.level), 20.0, PROFILE_TEXT_FILL, 140, 25)?;
        self.draw_text(name, 20.0, PROFILE_TEXT_FILL, 140, 55)?;

        // rating 读数：档位着色（最高档为竖向渐变）交给专用文字渲染器
        let rating = f64::from(profile.rating) / 100.0;
        self.draw_text("RATING", 20.0, PROFILE_TEXT_FILL, 500, 30)?;
        let tier = RatingTier::from_rating(rating);
        let layer = GradientTextRenderer::new(self.shaper).render(
            &format!("{rating:.2}"),
            36.0,
            tier,
            RATING_READOUT_SIZE.0,
            RATING_READOUT_SIZE.1,
        )?;
        composite_pixmap(&mut self.canvas, &layer, 500, 55);
        Ok(())
    }

    /// 页脚：总 rating + 生成时间（UTC+8）
    fn draw_footer(&mut self, overall_rating: f64) -> Result<(), AppError> {
        let y = self.layout.footer_y;
        self.draw_text(
            &format!("总Rating: {overall_rating:.2}"),
            14.0,
            "#ffffff",
            TITLE_X,
            y + 4,
        )?;

        let offset = FixedOffset::east_opt(8 * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset"));
        let generated = format!(
            "Generated at {} UTC+8",
            Utc::now().with_timezone(&offset).format("%Y/%m/%d %H:%M:%S")
        );
        let est = self.shaper.estimate_width(&generated, 12.0).ceil() as u32;
        let x = self.layout.width.saturating_sub(est + 16);
        self.draw_text(&generated, 12.0, "#bbbbbb", x, y + 6)
    }

    /// 单行文本：成形为小图层后按 alpha 合成到 (x, y)
    fn draw_text(&mut self, text: &str, px: f64, fill: &str, x: u32, y: u32) -> Result<(), AppError> {
        let layer = self.shaper.shape_line(text, px, fill)?;
        composite_pixmap(&mut self.canvas, &layer, i64::from(x), i64::from(y));
        Ok(())
    }

    fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
        let (cw, ch) = self.canvas.dimensions();
        for yy in y..(y + h).min(ch) {
            for xx in x..(x + w).min(cw) {
                self.canvas.put_pixel(xx, yy, color);
            }
        }
    }

    /// 双色横向渐变（逐列线性插值）
    fn fill_horizontal_gradient(
        &mut self,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        from: [u8; 4],
        to: [u8; 4],
    ) {
        let (cw, ch) = self.canvas.dimensions();
        let span = w.saturating_sub(1).max(1) as f64;
        for xx in x..(x + w).min(cw) {
            let t = f64::from(xx - x) / span;
            let mut color = [0u8; 4];
            for (i, c) in color.iter_mut().enumerate() {
                *c = (f64::from(from[i]) + (f64::from(to[i]) - f64::from(from[i])) * t)
                    .round() as u8;
            }
            for yy in y..(y + h).min(ch) {
                self.canvas.put_pixel(xx, yy, Rgba(color));
            }
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// 编码为 PNG 字节
    pub fn into_png(self) -> Result<Vec<u8>, AppError> {
        let (width, height) = self.canvas.dimensions();
        let mut out = Vec::with_capacity((width * height / 2) as usize);
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(png::Compression::Default);
            encoder.set_filter(png::FilterType::Paeth);
            let mut writer = encoder
                .write_header()
                .map_err(|e| AppError::Render(format!("PNG write_header error: {e}")))?;
            writer
                .write_image_data(self.canvas.as_raw())
                .map_err(|e| AppError::Render(format!("PNG write_image_data error: {e}")))?;
            writer
                .finish()
                .map_err(|e| AppError::Render(format!("PNG finish error: {e}")))?;
        }
        Ok(out)
    }
}

/// 分数千分组格式化（1007500 -> "1,007,500"）
pub fn format_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// 头像加载：本地路径 → 生成的默认头像（浅灰底 + 实心圆）
fn load_avatar(profile: &PlayerProfile) -> RgbaImage {
    if let Some(path) = &profile.avatar_path {
        match image::open(path) {
            Ok(img) => return img.to_rgba8(),
            Err(e) => {
                tracing::warn!("头像加载失败，使用默认头像: '{}': {e}", path.display());
            }
        }
    }
    default_avatar()
}

fn default_avatar() -> RgbaImage {
    let mut img = RgbaImage::from_pixel(AVATAR_SIZE, AVATAR_SIZE, Rgba([200, 200, 200, 255]));
    let center = f64::from(AVATAR_SIZE) / 2.0;
    let radius = f64::from(AVATAR_SIZE) * 0.4;
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - center;
        let dy = f64::from(y) + 0.5 - center;
        if (dx * dx + dy * dy).sqrt() <= radius {
            *pixel = Rgba([150, 150, 150, 255]);
        }
    }
    img
}

/// 圆形蒙版：圆外像素置为全透明
fn circular_mask(mut img: RgbaImage) -> RgbaImage {
    let cx = f64::from(img.width()) / 2.0;
    let cy = f64::from(img.height()) / 2.0;
    let radius = cx.min(cy);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let dx = f64::from(x) + 0.5 - cx;
        let dy = f64::from(y) + 0.5 - cy;
        if (dx * dx + dy * dy).sqrt() > radius {
            pixel.0[3] = 0;
        }
    }
    img
}
