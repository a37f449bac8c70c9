//! Lifecycle stage classification
//!
//! Maps an item's age to the tier it would occupy if nothing else decided
//! its placement. Pure: `now` is always passed in.

use chrono::{DateTime, Utc};
use resale_common::time::days_since;
use resale_common::{Error, Result, Tier};
use serde::{Deserialize, Serialize};

/// Upper day bounds (inclusive) of the NEW, CURATED and ARCHIVE stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleThresholds {
    pub new_days: i64,
    pub curated_days: i64,
    pub archive_days: i64,
}

impl Default for LifecycleThresholds {
    fn default() -> Self {
        Self {
            new_days: 30,
            curated_days: 60,
            archive_days: 150,
        }
    }
}

impl LifecycleThresholds {
    /// Build thresholds, rejecting non-increasing or negative bounds
    pub fn new(new_days: i64, curated_days: i64, archive_days: i64) -> Result<Self> {
        let thresholds = Self {
            new_days,
            curated_days,
            archive_days,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.new_days < 0 || !(self.new_days < self.curated_days && self.curated_days < self.archive_days) {
            return Err(Error::Config(format!(
                "Lifecycle thresholds must be strictly increasing: new={} curated={} archive={}",
                self.new_days, self.curated_days, self.archive_days
            )));
        }
        Ok(())
    }
}

/// Discount percentage applied per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRates {
    pub new_pct: u8,
    pub curated_pct: u8,
    pub archive_pct: u8,
    pub clearance_pct: u8,
    pub clearance_dispose_pct: u8,
}

impl Default for DiscountRates {
    fn default() -> Self {
        Self {
            new_pct: 0,
            curated_pct: 20,
            archive_pct: 20,
            clearance_pct: 20,
            clearance_dispose_pct: 20,
        }
    }
}

impl DiscountRates {
    pub fn for_tier(&self, tier: Tier) -> u8 {
        match tier {
            Tier::New => self.new_pct,
            Tier::Curated => self.curated_pct,
            Tier::Archive => self.archive_pct,
            Tier::Clearance => self.clearance_pct,
            Tier::ClearanceDispose => self.clearance_dispose_pct,
        }
    }
}

/// Lifecycle classifier configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub thresholds: LifecycleThresholds,
    pub discounts: DiscountRates,
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub stage: Tier,
    pub days_since: i64,
    pub discount_rate: u8,
    pub reason: String,
}

/// Classify an item by the date its lifecycle is measured from
pub fn classify(date: Option<DateTime<Utc>>, config: &LifecycleConfig, now: DateTime<Utc>) -> Lifecycle {
    let Some(date) = date else {
        return Lifecycle {
            stage: Tier::New,
            days_since: 0,
            discount_rate: config.discounts.for_tier(Tier::New),
            reason: "no registration date".to_string(),
        };
    };

    let days = days_since(date, now);
    let t = &config.thresholds;
    let (stage, reason) = if days <= t.new_days {
        (Tier::New, format!("{} days <= {} (new)", days, t.new_days))
    } else if days <= t.curated_days {
        (Tier::Curated, format!("{} days <= {} (curated)", days, t.curated_days))
    } else if days <= t.archive_days {
        (Tier::Archive, format!("{} days <= {} (archive)", days, t.archive_days))
    } else {
        (Tier::Clearance, format!("{} days > {} (clearance)", days, t.archive_days))
    };

    Lifecycle {
        stage,
        days_since: days,
        discount_rate: config.discounts.for_tier(stage),
        reason,
    }
}
