//! keepScore: desirability ranking inside an eviction cohort
//!
//! The score (0-100) is the sum of four components:
//!
//! | Component | Range | Source |
//! |-----------|-------|--------|
//! | brand     | 0-35  | popularity table, else brand tier |
//! | price     | 0-30  | price rank within the cohort |
//! | grade     | 0-25  | condition grade |
//! | freshness | 0-10  | days since the lifecycle date |
//!
//! Scores only compare items of the same cohort and are recomputed on every
//! pass; nothing here is cached.

pub mod brands;

use resale_common::{ConditionGrade, Item};
use serde::Serialize;

/// Ages beyond this no longer reduce the freshness component further
pub const FRESHNESS_HORIZON_DAYS: i64 = 180;

/// Sorted price list of one cohort, built once per cohort
#[derive(Debug, Clone)]
pub struct CohortPrices {
    sorted: Vec<i64>,
}

impl CohortPrices {
    pub fn from_prices(prices: impl IntoIterator<Item = i64>) -> Self {
        let mut sorted: Vec<i64> = prices.into_iter().collect();
        sorted.sort_unstable();
        Self { sorted }
    }

    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        Self::from_prices(items.into_iter().map(|item| item.sell_price))
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Index of the first cohort price equal to `price`
    pub fn rank(&self, price: i64) -> usize {
        self.sorted.partition_point(|p| *p < price)
    }

    /// Price component (0-30)
    pub fn price_points(&self, price: i64) -> u32 {
        let n = self.sorted.len();
        if n <= 1 {
            return 15;
        }
        let ratio = self.rank(price) as f64 / (n - 1) as f64;
        (ratio * 30.0).round() as u32
    }
}

/// Grade component (0-25)
pub fn grade_points(grade: ConditionGrade) -> u32 {
    match grade {
        ConditionGrade::V => 25,
        ConditionGrade::S => 19,
        ConditionGrade::A => 12,
        ConditionGrade::B => 5,
        ConditionGrade::Unknown => 0,
    }
}

/// Freshness component (0-10)
pub fn freshness_points(days_since: i64) -> u32 {
    let capped = days_since.clamp(0, FRESHNESS_HORIZON_DAYS) as f64;
    let points = (1.0 - capped / FRESHNESS_HORIZON_DAYS as f64) * 10.0;
    points.round().max(0.0) as u32
}

/// Per-component breakdown of a keepScore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeepScore {
    pub brand: u32,
    pub price: u32,
    pub grade: u32,
    pub freshness: u32,
}

impl KeepScore {
    pub fn total(&self) -> u32 {
        self.brand + self.price + self.grade + self.freshness
    }
}

/// Score one cohort member
pub fn keep_score(item: &Item, days_since: i64, cohort: &CohortPrices) -> KeepScore {
    KeepScore {
        brand: brands::brand_points(brands::scoring_brand(&item.brand, &item.name), item.brand_tier),
        price: cohort.price_points(item.sell_price),
        grade: grade_points(item.grade),
        freshness: freshness_points(days_since),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resale_common::BrandTier;

    #[test]
    fn test_price_rank_uses_first_equal_price() {
        let cohort = CohortPrices::from_prices([30_000, 10_000, 20_000, 20_000, 50_000]);
        assert_eq!(cohort.rank(10_000), 0);
        assert_eq!(cohort.rank(20_000), 1);
        assert_eq!(cohort.rank(30_000), 3);
        assert_eq!(cohort.rank(50_000), 4);

        // round(1/4 * 30) = 8, round(3/4 * 30) = 23
        assert_eq!(cohort.price_points(10_000), 0);
        assert_eq!(cohort.price_points(20_000), 8);
        assert_eq!(cohort.price_points(30_000), 23);
        assert_eq!(cohort.price_points(50_000), 30);
    }

    #[test]
    fn test_single_item_cohort_gets_midpoint() {
        let cohort = CohortPrices::from_prices([99_000]);
        assert_eq!(cohort.price_points(99_000), 15);
    }

    #[test]
    fn test_price_component_is_monotonic() {
        let cohort = CohortPrices::from_prices([5, 1, 9, 3, 3, 7, 2, 8]);
        let mut prices = vec![5, 1, 9, 3, 3, 7, 2, 8];
        prices.sort();
        let points: Vec<u32> = prices.iter().map(|p| cohort.price_points(*p)).collect();
        assert!(points.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_freshness_points() {
        assert_eq!(freshness_points(0), 10);
        assert_eq!(freshness_points(18), 9);
        assert_eq!(freshness_points(90), 5);
        assert_eq!(freshness_points(180), 0);
        assert_eq!(freshness_points(400), 0);
    }

    #[test]
    fn test_grade_points() {
        assert_eq!(grade_points(ConditionGrade::V), 25);
        assert_eq!(grade_points(ConditionGrade::S), 19);
        assert_eq!(grade_points(ConditionGrade::A), 12);
        assert_eq!(grade_points(ConditionGrade::B), 5);
        assert_eq!(grade_points(ConditionGrade::Unknown), 0);
    }

    #[test]
    fn test_keep_score_sums_components() {
        let mut item = Item::new(1, "BARBOUR 왁스 자켓", "Barbour", 120_000);
        item.grade = ConditionGrade::S;
        item.brand_tier = Some(BrandTier::Mid);
        let cohort = CohortPrices::from_items([&item]);

        let score = keep_score(&item, 0, &cohort);
        assert_eq!(score.brand, 35);
        assert_eq!(score.price, 15);
        assert_eq!(score.grade, 19);
        assert_eq!(score.freshness, 10);
        assert_eq!(score.total(), 79);
    }
}
