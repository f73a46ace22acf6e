//! 由分数与单曲 Rating 反推谱面定数。
//!
//! 游戏侧的关系是 `rating = 定数 + 技术分加成`，加成随分数分段线性；
//! 因此 `定数 = rating - 加成`。低分段的加成为负值，此时定数高于 rating。

/// 分段加成表：`(分段下界, 下界处加成, 分段跨度, 加成增量)`。
///
/// 按分数降序排列；`score >= 1_007_500` 时加成封顶 2.00，
/// `score < 800_000` 时加成为 0（定数即 rating）。
const BONUS_BANDS: &[(u32, f64, f64, f64)] = &[
    (1_000_000, 1.50, 7_500.0, 0.50),
    (990_000, 1.00, 10_000.0, 0.50),
    (970_000, 0.00, 20_000.0, 1.00),
    (900_000, -4.00, 70_000.0, 4.00),
    (800_000, -6.00, 100_000.0, 2.00),
];

/// 技术分对应的 rating 加成（分段线性内插）
pub fn score_bonus(score: u32) -> f64 {
    if score >= 1_007_500 {
        return 2.00;
    }
    for &(floor, base, span, delta) in BONUS_BANDS {
        if score >= floor {
            let position = f64::from(score - floor) / span;
            return base + position * delta;
        }
    }
    0.0
}

/// 根据分数和单曲 rating（定点 ×100）计算定数。
///
/// 对任意 `score`/`rating_x100` 都有定义。结果舍入到最近的 0.1；
/// 恰好落在 0.05 上时远离零舍入（`f64::round` 语义，区别于
/// Python `round` 的银行家舍入，见 DESIGN.md）。
pub fn chart_constant(score: u32, rating_x100: i32) -> f64 {
    let rating = f64::from(rating_x100) / 100.0;
    let constant = rating - score_bonus(score);
    (constant * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn reference_values() {
        // SSS+ 封顶：15.00 - 2.00
        assert_eq!(chart_constant(1_007_500, 1500), 13.0);
        // SSS 下界：15.00 - 1.50
        assert_eq!(chart_constant(1_000_000, 1500), 13.5);
        // S 下界加成为 0
        assert_eq!(chart_constant(970_000, 1400), 14.0);
        // 80 万以下加成为 0，定数即 rating
        assert_eq!(chart_constant(500_000, 1000), 10.0);
        // 低分段加成为负，定数高于 rating（10.00 - (-6.00)）
        assert_eq!(chart_constant(800_000, 1000), 16.0);
        // 区段中点内插：99.5 万 → 1.00 + 0.5*0.50 = 1.25
        assert_eq!(chart_constant(995_000, 1355), 12.3);
    }

    #[test]
    fn interpolated_band_boundaries_are_continuous() {
        // 内插分段的边界处，从上下两侧代入公式必须得到同一个加成值。
        // 800_000 不在此列：其下方加成定义为 0，是一个真实的台阶。
        for &boundary in &[1_007_500u32, 1_000_000, 990_000, 970_000, 900_000] {
            let below = score_bonus(boundary - 1);
            let at = score_bonus(boundary);
            assert!(
                (at - below).abs() < 1e-3,
                "分段边界 {boundary} 不连续: below={below}, at={at}"
            );
        }
    }

    #[test]
    fn bonus_steps_at_lowest_band_and_rises_above_it() {
        // 80 万以下加成为 0；80 万起从 -6 开始单调爬升到封顶 2。
        assert_eq!(score_bonus(799_999), 0.0);
        assert_eq!(score_bonus(800_000), -6.0);

        let mut prev = score_bonus(800_000);
        for score in (800_000..=1_010_000).step_by(250) {
            let b = score_bonus(score);
            assert!(
                b + 1e-12 >= prev,
                "加成应随分数单调不减: score={score}, prev={prev}, b={b}"
            );
            prev = b;
        }
    }

    #[test]
    fn results_are_multiples_of_a_tenth() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(20250807);
        for _ in 0..5_000 {
            let score = rng.gen_range(0..=1_010_000);
            let rating = rng.gen_range(0..=1_800);
            let c = chart_constant(score, rating);
            let scaled = c * 10.0;
            assert!(
                (scaled - scaled.round()).abs() < 1e-9,
                "结果应为 0.1 的整数倍: score={score}, rating={rating}, c={c}"
            );
        }
    }

    #[test]
    fn half_tenth_rounds_away_from_zero() {
        // 990_000 处加成恰为 1.00：10.05 - 1.00 = 9.05，落在 0.05 档上，
        // 远离零舍入得 9.1。该用例钉死文档化的舍入规则。
        assert_eq!(chart_constant(990_000, 1005), 9.1);
    }
}
