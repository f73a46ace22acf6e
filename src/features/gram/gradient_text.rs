use std::fmt::Write as _;

use resvg::tiny_skia::Pixmap;

use crate::error::AppError;

use super::text::{TextShaper, escape_xml};

/// Rating 档位（封闭枚举，降序阈值表）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTier {
    /// ≥15.00：三段竖向渐变
    Rainbow,
    Platinum,
    Gold,
    Silver,
    Bronze,
    Purple,
    Red,
    Orange,
    Green,
    Cyan,
}

const TIER_THRESHOLDS: &[(f64, RatingTier)] = &[
    (15.00, RatingTier::Rainbow),
    (14.50, RatingTier::Platinum),
    (14.00, RatingTier::Gold),
    (13.00, RatingTier::Silver),
    (12.00, RatingTier::Bronze),
    (10.00, RatingTier::Purple),
    (7.00, RatingTier::Red),
    (4.00, RatingTier::Orange),
    (2.00, RatingTier::Green),
];

/// 档位填充：单色或竖向多段渐变（偏移百分比 + 颜色）
pub enum TierFill {
    Flat(&'static str),
    Gradient(&'static [(u32, &'static str)]),
}

const RAINBOW_STOPS: &[(u32, &str)] = &[(0, "#ff5e5e"), (50, "#ffd75e"), (100, "#5ee0ff")];

impl RatingTier {
    /// 由（小数形式的）rating 查档
    pub fn from_rating(rating: f64) -> Self {
        for &(threshold, tier) in TIER_THRESHOLDS {
            if rating >= threshold {
                return tier;
            }
        }
        RatingTier::Cyan
    }

    pub fn fill(&self) -> TierFill {
        match self {
            RatingTier::Rainbow => TierFill::Gradient(RAINBOW_STOPS),
            RatingTier::Platinum => TierFill::Flat("#e5e4e2"),
            RatingTier::Gold => TierFill::Flat("#ffd700"),
            RatingTier::Silver => TierFill::Flat("#c0c0c0"),
            RatingTier::Bronze => TierFill::Flat("#cd7f32"),
            RatingTier::Purple => TierFill::Flat("#9021f5"),
            RatingTier::Red => TierFill::Flat("#f54521"),
            RatingTier::Orange => TierFill::Flat("#ff8c21"),
            RatingTier::Green => TierFill::Flat("#41a147"),
            RatingTier::Cyan => TierFill::Flat("#21c3f5"),
        }
    }
}

/// 描边颜色与八方向 1px 偏移
const OUTLINE_FILL: &str = "#1a1a1a";
const OUTLINE_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// 档位文字渲染：八方向描边垫底 + 按档位着色的填充层，整体在画布内居中。
pub struct GradientTextRenderer<'a> {
    shaper: &'a TextShaper,
}

impl<'a> GradientTextRenderer<'a> {
    pub fn new(shaper: &'a TextShaper) -> Self {
        Self { shaper }
    }

    pub fn render(
        &self,
        text: &str,
        px: f64,
        tier: RatingTier,
        width: u32,
        height: u32,
    ) -> Result<Pixmap, AppError> {
        let svg = build_svg(self.shaper.family(), text, px, tier, width, height);
        self.shaper.render_svg(&svg, width, height)
    }
}

/// 生成文字层 SVG：先描边后填充，`text-anchor=middle` 保证水平居中，
/// 基线按字号微调实现竖直居中。
fn build_svg(family: &str, text: &str, px: f64, tier: RatingTier, width: u32, height: u32) -> String {
    let cx = f64::from(width) / 2.0;
    let cy = f64::from(height) / 2.0 + px * 0.35;
    let family = escape_xml(family);
    let content = escape_xml(text);

    let mut svg = String::with_capacity(2048);
    let _ = write!(
        svg,
        r#"<svg width="{width}" height="{height}" xmlns="http://www.w3.org/2000/svg">"#
    );

    let fill_ref = match tier.fill() {
        TierFill::Flat(color) => color.to_string(),
        TierFill::Gradient(stops) => {
            let _ = write!(
                svg,
                r#"<defs><linearGradient id="tier-fill" x1="0%" y1="0%" x2="0%" y2="100%">"#
            );
            for (offset, color) in stops {
                let _ = write!(
                    svg,
                    r#"<stop offset="{offset}%" style="stop-color:{color}" />"#
                );
            }
            let _ = write!(svg, r#"</linearGradient></defs>"#);
            "url(#tier-fill)".to_string()
        }
    };

    for (dx, dy) in OUTLINE_OFFSETS {
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="middle" font-family="{family}" font-size="{px}" font-weight="700" fill="{OUTLINE_FILL}">{content}</text>"#,
            x = cx + f64::from(dx),
            y = cy + f64::from(dy),
        );
    }
    let _ = write!(
        svg,
        r#"<text x="{cx:.1}" y="{cy:.1}" text-anchor="middle" font-family="{family}" font-size="{px}" font-weight="700" fill="{fill_ref}">{content}</text>"#
    );
    let _ = write!(svg, "</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds_are_inclusive() {
        assert_eq!(RatingTier::from_rating(15.00), RatingTier::Rainbow);
        assert_eq!(RatingTier::from_rating(14.99), RatingTier::Platinum);
        assert_eq!(RatingTier::from_rating(14.50), RatingTier::Platinum);
        assert_eq!(RatingTier::from_rating(14.00), RatingTier::Gold);
        assert_eq!(RatingTier::from_rating(13.00), RatingTier::Silver);
        assert_eq!(RatingTier::from_rating(12.00), RatingTier::Bronze);
        assert_eq!(RatingTier::from_rating(10.00), RatingTier::Purple);
        assert_eq!(RatingTier::from_rating(7.00), RatingTier::Red);
        assert_eq!(RatingTier::from_rating(4.00), RatingTier::Orange);
        assert_eq!(RatingTier::from_rating(2.00), RatingTier::Green);
        assert_eq!(RatingTier::from_rating(1.99), RatingTier::Cyan);
        assert_eq!(RatingTier::from_rating(0.0), RatingTier::Cyan);
    }

    #[test]
    fn svg_has_outline_under_fill() {
        let svg = build_svg("sans", "16.25", 36.0, RatingTier::Rainbow, 200, 60);
        // 八个描边节点 + 一个填充节点
        assert_eq!(svg.matches("<text ").count(), 9);
        assert!(svg.contains("linearGradient"));
        assert!(svg.contains(r#"fill="url(#tier-fill)""#));
        // 描边出现在填充之前
        let outline_pos = svg.find(OUTLINE_FILL).unwrap();
        let fill_pos = svg.find("url(#tier-fill)").unwrap();
        assert!(outline_pos < fill_pos);
    }

    #[test]
    fn flat_tier_has_no_gradient_defs() {
        let svg = build_svg("sans", "14.21", 36.0, RatingTier::Gold, 200, 60);
        assert!(!svg.contains("linearGradient"));
        assert!(svg.contains(r##"fill="#ffd700""##));
        assert!(svg.contains(r#"text-anchor="middle""#));
    }
}
