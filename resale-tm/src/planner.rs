//! Capacity eviction planning
//!
//! Given one cohort (all items sharing an effective tier/subtier) and its
//! capacity, pick the lowest-keepScore items to demote. Planning is pure: it
//! returns [`MoveDirective`]s and touches nothing.

use resale_common::{Item, ItemId, MoveDirective, MoveReason, Placement, Tier};
use std::collections::{HashMap, HashSet};

use crate::scoring::{keep_score, CohortPrices};

/// One cohort member with its age at planning time
#[derive(Debug, Clone, Copy)]
pub struct Member<'a> {
    pub item: &'a Item,
    pub days_since: i64,
}

/// Items sharing one effective placement
#[derive(Debug, Clone)]
pub struct Cohort<'a> {
    pub placement: Placement,
    pub members: Vec<Member<'a>>,
}

impl<'a> Cohort<'a> {
    pub fn new(placement: Placement) -> Self {
        Self {
            placement,
            members: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Count by which the cohort exceeds `capacity`
    pub fn overflow(&self, capacity: usize) -> usize {
        self.members.len().saturating_sub(capacity)
    }
}

/// Where evicted items go
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    /// Subtier ids currently defined by the archive settings
    pub known_subtiers: HashSet<String>,
    /// Minimum classifier confidence for a CURATED eviction to land in the
    /// suggested subtier instead of the unassigned pool
    pub suggestion_min_confidence: u8,
}

impl EvictionPolicy {
    /// Destination for an item evicted from `from`; `None` for the terminal tier
    pub fn target_for(&self, from: &Placement, item: &Item) -> Option<Placement> {
        match from.tier {
            Tier::Curated => Some(Placement::new(Tier::Archive, self.suggested_subtier(item))),
            tier => tier.successor().map(Placement::tier),
        }
    }

    fn suggested_subtier(&self, item: &Item) -> Option<String> {
        let subtier = item.suggested_subtier.as_deref()?;
        let confidence = item.suggestion_confidence?;
        if confidence >= self.suggestion_min_confidence && self.known_subtiers.contains(subtier) {
            Some(subtier.to_string())
        } else {
            None
        }
    }
}

/// A member ranked by keepScore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranked {
    pub item_id: ItemId,
    pub score: u32,
}

/// Rank a cohort ascending by (keepScore, item id)
pub fn rank(cohort: &Cohort<'_>) -> Vec<Ranked> {
    let prices = CohortPrices::from_items(cohort.members.iter().map(|m| m.item));
    let mut ranked: Vec<Ranked> = cohort
        .members
        .iter()
        .map(|m| Ranked {
            item_id: m.item.id,
            score: keep_score(m.item, m.days_since, &prices).total(),
        })
        .collect();
    ranked.sort_by_key(|r| (r.score, r.item_id));
    ranked
}

/// Plan capacity evictions for one cohort
///
/// Returns exactly `max(0, len - capacity)` directives, lowest score first.
/// Terminal cohorts never evict.
pub fn plan_evictions(cohort: &Cohort<'_>, capacity: usize, policy: &EvictionPolicy) -> Vec<MoveDirective> {
    let overflow = cohort.overflow(capacity);
    if overflow == 0 || cohort.placement.tier.is_terminal() {
        return Vec::new();
    }

    let by_id: HashMap<ItemId, &Item> = cohort.members.iter().map(|m| (m.item.id, m.item)).collect();
    let ranked = rank(cohort);
    ranked
        .iter()
        .take(overflow)
        .filter_map(|r| {
            let item = by_id.get(&r.item_id)?;
            let to = policy.target_for(&cohort.placement, item)?;
            Some(MoveDirective {
                item_id: r.item_id,
                from: cohort.placement.clone(),
                to,
                reason: MoveReason::Capacity,
                keep_score: Some(r.score),
            })
        })
        .collect()
}

/// Plan age-triggered moves from CLEARANCE to CLEARANCE_DISPOSE
pub fn plan_disposals(clearance: &Cohort<'_>, dispose_after_days: i64) -> Vec<MoveDirective> {
    let mut aged: Vec<&Member<'_>> = clearance
        .members
        .iter()
        .filter(|m| m.days_since > dispose_after_days)
        .collect();
    aged.sort_by_key(|m| m.item.id);

    aged.into_iter()
        .map(|m| MoveDirective {
            item_id: m.item.id,
            from: clearance.placement.clone(),
            to: Placement::tier(Tier::ClearanceDispose),
            reason: MoveReason::Age,
            keep_score: None,
        })
        .collect()
}
