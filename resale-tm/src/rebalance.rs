//! Rebalance orchestration
//!
//! One pass snapshots the catalog once, groups items into cohorts by
//! effective placement, plans evictions for every capped cohort plus the
//! CLEARANCE age rule, and applies the result. Every cohort is built from the
//! pre-move snapshot: an item demoted in this pass is only counted in its new
//! tier on the next pass.

use chrono::{DateTime, Utc};
use resale_common::events::{CatalogEvent, EventBus};
use resale_common::{Item, MoveDirective, Placement, Result, Tier};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{error, info};

use crate::catalog::{effective_placement, Catalog};
use crate::db::settings::{load_rebalance_settings, RebalanceSettings};
use crate::mutation::CategoryMutationService;
use crate::planner::{plan_disposals, plan_evictions, Cohort, EvictionPolicy, Member};

/// Outcome of one rebalance pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebalanceSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Items in the snapshot
    pub total: usize,
    pub moved: usize,
    /// Items in the terminal tier, never evaluated
    pub skipped: usize,
    /// Effective tier counts before the pass
    pub before: BTreeMap<String, usize>,
    pub moves_by_target: BTreeMap<String, usize>,
    /// Keyed "FROM → TO"
    pub moves_by_route: BTreeMap<String, usize>,
    pub directives: Vec<MoveDirective>,
}

impl RebalanceSummary {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Directives and counts planned from one snapshot
#[derive(Debug, Clone, Default)]
pub struct PassPlan {
    pub total: usize,
    pub skipped: usize,
    pub before: BTreeMap<String, usize>,
    pub directives: Vec<MoveDirective>,
}

/// Plan a full pass over `items` (pure)
pub fn plan_pass(items: &[Item], settings: &RebalanceSettings, now: DateTime<Utc>) -> PassPlan {
    let known: HashSet<String> = settings.subtiers.iter().map(|s| s.id.clone()).collect();
    let mut cohorts: HashMap<Placement, Cohort<'_>> = HashMap::new();
    let mut before: BTreeMap<String, usize> = Tier::ALL.iter().map(|t| (t.as_str().to_string(), 0)).collect();
    let mut skipped = 0;

    for item in items {
        let (placement, lifecycle) = effective_placement(item, &settings.lifecycle, &known, now);

        *before.entry(placement.tier.as_str().to_string()).or_default() += 1;
        if placement.tier.is_terminal() {
            skipped += 1;
            continue;
        }

        cohorts
            .entry(placement.clone())
            .or_insert_with(|| Cohort::new(placement))
            .members
            .push(Member {
                item,
                days_since: lifecycle.days_since,
            });
    }

    let policy = EvictionPolicy {
        known_subtiers: known,
        suggestion_min_confidence: settings.suggestion_min_confidence,
    };

    let mut order = vec![Placement::tier(Tier::New), Placement::tier(Tier::Curated)];
    order.extend(
        settings
            .subtiers
            .iter()
            .map(|s| Placement::new(Tier::Archive, Some(s.id.clone()))),
    );
    order.push(Placement::tier(Tier::Archive));

    let mut directives = Vec::new();
    for placement in &order {
        let (Some(cohort), Some(capacity)) = (cohorts.get(placement), settings.capacity(placement)) else {
            continue;
        };
        let moves = plan_evictions(cohort, capacity, &policy);
        if !moves.is_empty() {
            info!(cohort = %placement, size = cohort.len(), capacity, evicted = moves.len(), "Cohort over capacity");
        }
        directives.extend(moves);
    }

    if let Some(clearance) = cohorts.get(&Placement::tier(Tier::Clearance)) {
        directives.extend(plan_disposals(clearance, settings.dispose_after_days));
    }

    PassPlan {
        total: items.len(),
        skipped,
        before,
        directives,
    }
}

/// Runs rebalance passes against the live catalog
#[derive(Clone)]
pub struct RebalanceOrchestrator {
    db: SqlitePool,
    catalog: Catalog,
    mutation: CategoryMutationService,
    event_bus: EventBus,
}

impl RebalanceOrchestrator {
    pub fn new(db: SqlitePool, catalog: Catalog, mutation: CategoryMutationService, event_bus: EventBus) -> Self {
        Self {
            db,
            catalog,
            mutation,
            event_bus,
        }
    }

    /// Run one full pass
    ///
    /// Unreadable settings abort before anything is written.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RebalanceSummary> {
        let settings = match load_rebalance_settings(&self.db).await {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %e, "Rebalance aborted: settings unusable");
                return Err(e);
            }
        };

        let snapshot = self.catalog.refresh().await?;
        let plan = plan_pass(&snapshot, &settings, now);

        info!(
            total = plan.total,
            planned = plan.directives.len(),
            skipped = plan.skipped,
            "Rebalance pass planned"
        );

        let moved = self.mutation.apply_moves(&plan.directives).await?;

        let mut moves_by_target: BTreeMap<String, usize> = BTreeMap::new();
        let mut moves_by_route: BTreeMap<String, usize> = BTreeMap::new();
        for directive in &plan.directives {
            *moves_by_target.entry(directive.to.to_string()).or_default() += 1;
            *moves_by_route.entry(directive.route()).or_default() += 1;
        }

        self.event_bus.emit_lossy(CatalogEvent::RebalanceCompleted {
            moved,
            moves_by_target: moves_by_target.clone(),
            timestamp: resale_common::time::now(),
        });

        info!(moved, "Rebalance pass complete");

        Ok(RebalanceSummary {
            success: true,
            error: None,
            total: plan.total,
            moved,
            skipped: plan.skipped,
            before: plan.before,
            moves_by_target,
            moves_by_route,
            directives: plan.directives,
        })
    }
}
