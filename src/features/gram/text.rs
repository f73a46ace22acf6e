use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use resvg::usvg::{self, Options as UsvgOptions, fontdb};
use resvg::{
    render,
    tiny_skia::{Pixmap, Transform},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::error::AppError;

/// 文本成形能力：字体库 + SVG 片段栅格化。
///
/// 字体作为注入依赖由调用方构造一次、整个渲染过程共享。
/// 指定的字体目录不可读是致命配置错误；系统中一个字体都找不到
/// 只降级告警（文字不可见，渲染照常完成）。
pub struct TextShaper {
    fontdb: Arc<fontdb::Database>,
    family: String,
}

impl TextShaper {
    pub fn new(fonts_dir: Option<&Path>, family: impl Into<String>) -> Result<Self, AppError> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        if let Some(dir) = fonts_dir {
            let entries = std::fs::read_dir(dir).map_err(|e| {
                AppError::Font(format!("字体目录不可读 '{}': {e}", dir.display()))
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file()
                    && (path.extension() == Some("ttf".as_ref())
                        || path.extension() == Some("otf".as_ref()))
                {
                    if let Err(e) = db.load_font_file(&path) {
                        tracing::error!("加载字体文件失败 '{}': {}", path.display(), e);
                    }
                }
            }
        }

        if db.len() == 0 {
            tracing::warn!("字体数据库为空，文字层将不可见（渲染继续）");
        }

        Ok(Self {
            fontdb: Arc::new(db),
            family: family.into(),
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// 将 SVG 片段栅格化为透明底图层
    pub fn render_svg(&self, svg: &str, width: u32, height: u32) -> Result<Pixmap, AppError> {
        let opts = UsvgOptions {
            fontdb: Arc::clone(&self.fontdb),
            font_family: self.family.clone(),
            languages: vec!["zh-CN".to_string(), "en".to_string()],
            ..Default::default()
        };

        let tree = usvg::Tree::from_data(svg.as_bytes(), &opts)
            .map_err(|e| AppError::Render(format!("SVG 解析失败: {e}")))?;
        let mut pixmap = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| AppError::Render("创建 Pixmap 失败".to_string()))?;
        render(&tree, Transform::default(), &mut pixmap.as_mut());
        Ok(pixmap)
    }

    /// 单行文本图层，左对齐；图层高约 1.5 倍字号。
    pub fn shape_line(&self, text: &str, px: f64, fill: &str) -> Result<Pixmap, AppError> {
        let width = (self.estimate_width(text, px) + px).ceil().max(1.0) as u32;
        let height = (px * 1.5).ceil() as u32;
        let baseline = px * 1.1;
        let svg = format!(
            r#"<svg width="{width}" height="{height}" xmlns="http://www.w3.org/2000/svg"><text x="0" y="{baseline:.1}" font-family="{family}" font-size="{px}" fill="{fill}">{content}</text></svg>"#,
            family = escape_xml(&self.family),
            content = escape_xml(text),
        );
        self.render_svg(&svg, width, height)
    }

    /// 估算渲染宽度：按 unicode display width（全角记 2），每半角单元约 0.55 字号。
    pub fn estimate_width(&self, text: &str, px: f64) -> f64 {
        let units: usize = text
            .chars()
            .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0).max(1))
            .sum();
        units as f64 * px * 0.55
    }
}

/// 把（预乘的）文字图层按 alpha 合成到画布上
pub fn composite_pixmap(canvas: &mut RgbaImage, layer: &Pixmap, x: i64, y: i64) {
    let mut rgba = RgbaImage::new(layer.width(), layer.height());
    for (dst, src) in rgba.pixels_mut().zip(layer.pixels().iter()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    image::imageops::overlay(canvas, &rgba, x, y);
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// 按 display width 截断并补省略号
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if text.width() <= max_width {
        return text.to_string();
    }
    // 预留省略号宽度（按 1 计）
    let target = max_width.saturating_sub(1);
    let mut acc = String::new();
    let mut w = 0usize;
    for ch in text.chars() {
        let ch_w = UnicodeWidthChar::width(ch).unwrap_or(0).max(1);
        if w + ch_w > target {
            break;
        }
        acc.push(ch);
        w += ch_w;
    }
    acc.push('…');
    acc
}
