//! Domain models shared across the tier manager
//!
//! Tiers, condition grades, catalog items and the value types exchanged
//! between planning, mutation and audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Marketplace product number
pub type ItemId = i64;

/// Display tier, in aging order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    New,
    Curated,
    Archive,
    Clearance,
    ClearanceDispose,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::New,
        Tier::Curated,
        Tier::Archive,
        Tier::Clearance,
        Tier::ClearanceDispose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::New => "NEW",
            Tier::Curated => "CURATED",
            Tier::Archive => "ARCHIVE",
            Tier::Clearance => "CLEARANCE",
            Tier::ClearanceDispose => "CLEARANCE_DISPOSE",
        }
    }

    /// Tier an evicted item moves to; `None` for the terminal tier
    pub fn successor(&self) -> Option<Tier> {
        match self {
            Tier::New => Some(Tier::Curated),
            Tier::Curated => Some(Tier::Archive),
            Tier::Archive => Some(Tier::Clearance),
            Tier::Clearance => Some(Tier::ClearanceDispose),
            Tier::ClearanceDispose => None,
        }
    }

    /// CLEARANCE_DISPOSE is uncapped and never evicted from
    pub fn is_terminal(&self) -> bool {
        matches!(self, Tier::ClearanceDispose)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(Tier::New),
            "CURATED" => Ok(Tier::Curated),
            "ARCHIVE" => Ok(Tier::Archive),
            "CLEARANCE" => Ok(Tier::Clearance),
            "CLEARANCE_DISPOSE" => Ok(Tier::ClearanceDispose),
            other => Err(Error::InvalidInput(format!("Unknown tier: {}", other))),
        }
    }
}

/// Effective (tier, subtier) of an item
///
/// `subtier` is only ever set for [`Tier::Archive`]; an ARCHIVE placement
/// without a subtier is the unassigned pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub tier: Tier,
    pub subtier: Option<String>,
}

impl Placement {
    pub fn new(tier: Tier, subtier: Option<String>) -> Self {
        let subtier = if tier == Tier::Archive { subtier } else { None };
        Self { tier, subtier }
    }

    pub fn tier(tier: Tier) -> Self {
        Self { tier, subtier: None }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subtier {
            Some(sub) => write!(f, "{}/{}", self.tier, sub),
            None => write!(f, "{}", self.tier),
        }
    }
}

/// Named subdivision of ARCHIVE, owned by the archive settings store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSubtier {
    pub id: String,
    pub display_name: String,
}

/// Physical condition grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionGrade {
    V,
    S,
    A,
    B,
    Unknown,
}

impl ConditionGrade {
    /// Parse a stored grade; accepts the bare letter or the letter followed
    /// by the Korean grade suffix ("S급"). Anything else is `Unknown`.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return ConditionGrade::Unknown;
        };
        let letter = value.trim().trim_end_matches('급').trim().to_ascii_uppercase();
        match letter.as_str() {
            "V" => ConditionGrade::V,
            "S" => ConditionGrade::S,
            "A" => ConditionGrade::A,
            "B" => ConditionGrade::B,
            _ => ConditionGrade::Unknown,
        }
    }

    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            ConditionGrade::V => Some("V"),
            ConditionGrade::S => Some("S"),
            ConditionGrade::A => Some("A"),
            ConditionGrade::B => Some("B"),
            ConditionGrade::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ConditionGrade::Unknown)
    }
}

/// Brand market tier assigned by the external classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrandTier {
    Luxury,
    Premium,
    Mid,
    Basic,
    Other,
}

impl BrandTier {
    pub fn parse(value: Option<&str>) -> Option<Self> {
        match value?.trim().to_ascii_uppercase().as_str() {
            "LUXURY" => Some(BrandTier::Luxury),
            "PREMIUM" => Some(BrandTier::Premium),
            "MID" => Some(BrandTier::Mid),
            "BASIC" => Some(BrandTier::Basic),
            "OTHER" => Some(BrandTier::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrandTier::Luxury => "LUXURY",
            BrandTier::Premium => "PREMIUM",
            BrandTier::Mid => "MID",
            BrandTier::Basic => "BASIC",
            BrandTier::Other => "OTHER",
        }
    }
}

/// Mirror of the marketplace detail page for a listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDetail {
    pub name: String,
    pub image_url: Option<String>,
    /// Raw detail HTML
    pub content: String,
}

/// A catalog listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub brand: String,
    pub brand_tier: Option<BrandTier>,
    pub sell_price: i64,
    pub grade: ConditionGrade,
    pub registration_date: Option<DateTime<Utc>>,
    /// Operator-set date that replaces the registration date for aging
    pub lifecycle_anchor: Option<DateTime<Utc>>,
    pub thumbnail_url: Option<String>,
    /// Durable placement; `None` means the lifecycle stage decides
    pub stored_tier: Option<Tier>,
    pub stored_subtier: Option<String>,
    pub manual_override: bool,
    /// ARCHIVE subtier suggested by the external classifier
    pub suggested_subtier: Option<String>,
    /// Classifier confidence, 0-100
    pub suggestion_confidence: Option<u8>,
    pub detail: Option<ListingDetail>,
}

impl Item {
    /// Minimal item used by ingestion and tests
    pub fn new(id: ItemId, name: impl Into<String>, brand: impl Into<String>, sell_price: i64) -> Self {
        Self {
            id,
            name: name.into(),
            brand: brand.into(),
            brand_tier: None,
            sell_price,
            grade: ConditionGrade::Unknown,
            registration_date: None,
            lifecycle_anchor: None,
            thumbnail_url: None,
            stored_tier: None,
            stored_subtier: None,
            manual_override: false,
            suggested_subtier: None,
            suggestion_confidence: None,
            detail: None,
        }
    }

    /// Date the lifecycle is measured from
    pub fn lifecycle_date(&self) -> Option<DateTime<Utc>> {
        self.lifecycle_anchor.or(self.registration_date)
    }
}

/// Why a move was planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveReason {
    /// Evicted from an over-capacity cohort
    Capacity,
    /// Aged past the clearance dispose threshold
    Age,
}

/// A planned tier change; inert until applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveDirective {
    pub item_id: ItemId,
    pub from: Placement,
    pub to: Placement,
    pub reason: MoveReason,
    /// keepScore at planning time (capacity moves only)
    pub keep_score: Option<u32>,
}

impl MoveDirective {
    /// "FROM → TO" label used in rebalance summaries
    pub fn route(&self) -> String {
        format!("{} → {}", self.from, self.to)
    }
}

/// Structural problem detected by the audit scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditIssue {
    NoThumbnail,
    PriceZero,
    NoDetail,
    NameMismatch,
    ImageMismatch,
    NoGrade,
    ImageBroken,
    ScanError,
}

impl AuditIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditIssue::NoThumbnail => "NO_THUMBNAIL",
            AuditIssue::PriceZero => "PRICE_ZERO",
            AuditIssue::NoDetail => "NO_DETAIL",
            AuditIssue::NameMismatch => "NAME_MISMATCH",
            AuditIssue::ImageMismatch => "IMAGE_MISMATCH",
            AuditIssue::NoGrade => "NO_GRADE",
            AuditIssue::ImageBroken => "IMAGE_BROKEN",
            AuditIssue::ScanError => "SCAN_ERROR",
        }
    }
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded audit result for one item with at least one issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub item_id: ItemId,
    pub issues: BTreeSet<AuditIssue>,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_succession() {
        assert_eq!(Tier::New.successor(), Some(Tier::Curated));
        assert_eq!(Tier::Curated.successor(), Some(Tier::Archive));
        assert_eq!(Tier::Archive.successor(), Some(Tier::Clearance));
        assert_eq!(Tier::Clearance.successor(), Some(Tier::ClearanceDispose));
        assert_eq!(Tier::ClearanceDispose.successor(), None);
        assert!(Tier::New < Tier::Clearance);
    }

    #[test]
    fn test_tier_parse_roundtrip() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), tier);
        }
        assert_eq!("curated".parse::<Tier>().unwrap(), Tier::Curated);
        assert!("KIDS".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_serde_names() {
        let json = serde_json::to_string(&Tier::ClearanceDispose).unwrap();
        assert_eq!(json, "\"CLEARANCE_DISPOSE\"");
    }

    #[test]
    fn test_grade_parse() {
        assert_eq!(ConditionGrade::parse(Some("V")), ConditionGrade::V);
        assert_eq!(ConditionGrade::parse(Some("s급")), ConditionGrade::S);
        assert_eq!(ConditionGrade::parse(Some(" A ")), ConditionGrade::A);
        assert_eq!(ConditionGrade::parse(Some("C")), ConditionGrade::Unknown);
        assert_eq!(ConditionGrade::parse(None), ConditionGrade::Unknown);
    }

    #[test]
    fn test_placement_drops_subtier_outside_archive() {
        let p = Placement::new(Tier::Clearance, Some("military".to_string()));
        assert_eq!(p.subtier, None);
        let p = Placement::new(Tier::Archive, Some("military".to_string()));
        assert_eq!(p.to_string(), "ARCHIVE/military");
    }
}
