// ⚖️ Period Reconciliation Engine
//
// Turns a snapshot of observations into "as-of" counts for a date range:
//
//   pending_from + resurfaced + new - resolved = pending_to
//
// pending_to is never queried; it is derived, so the identity holds by
// construction for every module, every group, and the grand total.
// Group rows are sums of their module rows; the grand total is the sum of
// the group rows. Only Vital observations take part in the counts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use tracing::debug;

use crate::catalog::Catalog;
use crate::observation::{Observation, Status};
use crate::period::ReportPeriod;
use crate::report::{DetailEntry, GroupReport, ModuleRow, PeriodDetails, PeriodReport};

/// Default cap for the identified / resolved narrative lists
pub const DEFAULT_DETAIL_LIMIT: usize = 20;

// ============================================================================
// PERIOD COUNTS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCounts {
    pub pending_from: i64,
    pub resurfaced: i64,
    pub new: i64,
    pub resolved: i64,
    pub pending_to: i64,
}

impl PeriodCounts {
    pub fn from_buckets(pending_from: i64, resurfaced: i64, new: i64, resolved: i64) -> Self {
        PeriodCounts {
            pending_from,
            resurfaced,
            new,
            resolved,
            pending_to: pending_from + resurfaced + new - resolved,
        }
    }

    /// pending_to == pending_from + resurfaced + new - resolved
    pub fn is_reconciled(&self) -> bool {
        self.pending_to == self.pending_from + self.resurfaced + self.new - self.resolved
    }

    /// Contribution of a single observation to each bucket
    pub fn of(observation: &Observation, period: &ReportPeriod) -> Self {
        let flag = |b: bool| i64::from(b);

        PeriodCounts::from_buckets(
            flag(observation.was_open_at(period.from_start())),
            flag(period.contains_opt(observation.reopened_at())),
            flag(period.contains(observation.created_at)),
            flag(period.contains_opt(observation.closed_at)),
        )
    }
}

impl Add for PeriodCounts {
    type Output = PeriodCounts;

    fn add(mut self, other: PeriodCounts) -> PeriodCounts {
        self += other;
        self
    }
}

impl AddAssign for PeriodCounts {
    fn add_assign(&mut self, other: PeriodCounts) {
        self.pending_from += other.pending_from;
        self.resurfaced += other.resurfaced;
        self.new += other.new;
        self.resolved += other.resolved;
        self.pending_to += other.pending_to;
    }
}

impl Sum for PeriodCounts {
    fn sum<I: Iterator<Item = PeriodCounts>>(iter: I) -> Self {
        iter.fold(PeriodCounts::default(), Add::add)
    }
}

impl<'a> Sum<&'a PeriodCounts> for PeriodCounts {
    fn sum<I: Iterator<Item = &'a PeriodCounts>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    /// Maximum entries in each of the identified / resolved lists
    pub detail_limit: usize,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            detail_limit: DEFAULT_DETAIL_LIMIT,
        }
    }

    pub fn with_detail_limit(detail_limit: usize) -> Self {
        ReconciliationEngine { detail_limit }
    }

    /// Build the full report for `period` from one snapshot of observations.
    ///
    /// Every catalog module gets a row, including modules with no activity.
    pub fn reconcile(
        &self,
        catalog: &Catalog,
        observations: &[Observation],
        period: &ReportPeriod,
    ) -> PeriodReport {
        let by_module = self.module_counts(observations, period);

        let groups: Vec<GroupReport> = catalog
            .groups()
            .iter()
            .map(|group| {
                let modules: Vec<ModuleRow> = catalog
                    .modules_in(group.id)
                    .map(|module| ModuleRow {
                        module_id: module.id,
                        module_name: module.name.clone(),
                        counts: by_module.get(&module.id).copied().unwrap_or_default(),
                    })
                    .collect();

                GroupReport {
                    group_id: group.id,
                    group_name: group.name.clone(),
                    counts: modules.iter().map(|m| &m.counts).sum(),
                    modules,
                    areas_of_concern: self.areas_of_concern(catalog, observations, group.id),
                }
            })
            .collect();

        let grand_total = groups.iter().map(|g| &g.counts).sum();

        PeriodReport {
            period: *period,
            groups,
            grand_total,
            details: self.period_details(catalog, observations, period),
            under_development: catalog
                .under_development()
                .iter()
                .map(|m| m.name.clone())
                .collect(),
        }
    }

    /// Per-module counts over the Vital observations of the snapshot
    pub fn module_counts(
        &self,
        observations: &[Observation],
        period: &ReportPeriod,
    ) -> HashMap<i64, PeriodCounts> {
        let mut by_module: HashMap<i64, PeriodCounts> = HashMap::new();

        for observation in observations.iter().filter(|o| o.is_vital()) {
            *by_module.entry(observation.module_id).or_default() +=
                PeriodCounts::of(observation, period);
        }

        debug!(
            modules = by_module.len(),
            period = %period.label(),
            "module counts computed"
        );
        by_module
    }

    /// Vital observations identified (created or resurfaced, still open) and
    /// resolved (closed, still closed) within the period, newest first.
    pub fn period_details(
        &self,
        catalog: &Catalog,
        observations: &[Observation],
        period: &ReportPeriod,
    ) -> PeriodDetails {
        let mut identified: Vec<DetailEntry> = observations
            .iter()
            .filter(|o| o.is_vital() && o.status.is_open_like())
            .filter_map(|o| {
                let date = match o.reopened_at() {
                    Some(at) if period.contains(at) => at,
                    _ if period.contains(o.created_at) => o.created_at,
                    _ => return None,
                };
                Some(DetailEntry::new(catalog, o, date))
            })
            .collect();

        let mut resolved: Vec<DetailEntry> = observations
            .iter()
            .filter(|o| o.is_vital() && o.status == Status::Closed)
            .filter_map(|o| {
                o.closed_at
                    .filter(|at| period.contains(*at))
                    .map(|at| DetailEntry::new(catalog, o, at))
            })
            .collect();

        for list in [&mut identified, &mut resolved] {
            list.sort_by(|a, b| {
                b.date
                    .cmp(&a.date)
                    .then(b.observation_id.cmp(&a.observation_id))
            });
            list.truncate(self.detail_limit);
        }

        PeriodDetails {
            identified,
            resolved,
        }
    }

    /// Vital observations of one group still OPEN or RESURFACED, newest first
    pub fn areas_of_concern(
        &self,
        catalog: &Catalog,
        observations: &[Observation],
        group_id: i64,
    ) -> Vec<DetailEntry> {
        let mut entries: Vec<DetailEntry> = observations
            .iter()
            .filter(|o| o.is_vital() && o.status.is_open_like())
            .filter(|o| catalog.module(o.module_id).map(|m| m.group_id) == Some(group_id))
            .map(|o| DetailEntry::new(catalog, o, o.created_at))
            .collect();

        entries.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.observation_id.cmp(&a.observation_id))
        });
        entries
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Criticality;
    use crate::period::parse_timestamp;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    const MODULE_A: i64 = 1; // Salary & Wages Module (SWM), HR Modules
    const MODULE_B: i64 = 5; // Defect List (DL), Refit Modules

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    fn period(from: &str, to: &str) -> ReportPeriod {
        ReportPeriod::parse(Some(from), Some(to)).unwrap()
    }

    fn vital(id: i64, module_id: i64, created: &str) -> Observation {
        Observation {
            id,
            text: format!("observation {}", id),
            module_id,
            criticality: Criticality::Vital,
            status: Status::Open,
            created_at: ts(created),
            closed_at: None,
            resurfaced_at: None,
        }
    }

    fn module_row<'a>(report: &'a PeriodReport, module_id: i64) -> &'a ModuleRow {
        report
            .groups
            .iter()
            .flat_map(|g| g.modules.iter())
            .find(|m| m.module_id == module_id)
            .unwrap()
    }

    #[test]
    fn test_created_within_period_is_new_not_pending() {
        let catalog = Catalog::default_seed();
        let obs = vec![vital(1, MODULE_A, "2025-01-01 09:30:00")];

        let report = ReconciliationEngine::new().reconcile(
            &catalog,
            &obs,
            &period("2025-01-01", "2025-01-01"),
        );

        let row = module_row(&report, MODULE_A).counts;
        assert_eq!(row.new, 1);
        assert_eq!(row.pending_from, 0);
        assert_eq!(row.pending_to, 1);
    }

    #[test]
    fn test_closed_within_period_is_resolved() {
        let catalog = Catalog::default_seed();
        let mut obs = vital(1, MODULE_A, "2025-01-01 09:30:00");
        obs.status = Status::Closed;
        obs.closed_at = Some(ts("2025-01-05 14:00:00"));

        let report = ReconciliationEngine::new().reconcile(
            &catalog,
            &[obs],
            &period("2025-01-02", "2025-01-10"),
        );

        let row = module_row(&report, MODULE_A).counts;
        assert_eq!(row.pending_from, 1);
        assert_eq!(row.resolved, 1);
        assert_eq!(row.new, 0);
        assert_eq!(row.pending_to, 0);
    }

    #[test]
    fn test_resurfaced_after_close_is_not_pending_at_start() {
        let catalog = Catalog::default_seed();
        let mut obs = vital(1, MODULE_A, "2025-01-01 09:30:00");
        obs.status = Status::Resurfaced;
        obs.closed_at = Some(ts("2025-01-05 14:00:00"));
        obs.resurfaced_at = Some(ts("2025-01-12 08:00:00"));

        let report = ReconciliationEngine::new().reconcile(
            &catalog,
            &[obs],
            &period("2025-01-11", "2025-01-15"),
        );

        let row = module_row(&report, MODULE_A).counts;
        assert_eq!(row.pending_from, 0);
        assert_eq!(row.resurfaced, 1);
        assert_eq!(row.resolved, 0);
        assert_eq!(row.pending_to, 1);
    }

    #[test]
    fn test_resurfacing_an_open_observation_counts_once() {
        let catalog = Catalog::default_seed();
        let mut obs = vital(1, MODULE_A, "2025-01-01 09:30:00");
        obs.status = Status::Resurfaced;
        obs.resurfaced_at = Some(ts("2025-01-12 08:00:00"));

        let engine = ReconciliationEngine::new();
        let p = period("2025-01-10", "2025-01-15");
        let report = engine.reconcile(&catalog, std::slice::from_ref(&obs), &p);

        let row = module_row(&report, MODULE_A).counts;
        assert_eq!(row, PeriodCounts::from_buckets(1, 0, 0, 0));
        assert!(engine.period_details(&catalog, &[obs], &p).identified.is_empty());
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let catalog = Catalog::default_seed();
        let p = period("2025-02-01", "2025-02-28");
        let at_start = vital(1, MODULE_A, "2025-02-01 00:00:00");
        let at_end = vital(2, MODULE_B, "2025-02-28 23:59:59");
        let after_end = vital(3, MODULE_B, "2025-03-01 00:00:00");

        let report = ReconciliationEngine::new().reconcile(&catalog, &[at_start, at_end, after_end], &p);

        assert_eq!(module_row(&report, MODULE_A).counts.pending_from, 1);
        assert_eq!(module_row(&report, MODULE_B).counts.new, 1);
        assert_eq!(module_row(&report, MODULE_B).counts.pending_from, 0);
    }

    #[test]
    fn test_close_at_period_start_is_resolved_in_period() {
        let catalog = Catalog::default_seed();
        let mut obs = vital(1, MODULE_A, "2025-01-20 09:00:00");
        obs.status = Status::Closed;
        obs.closed_at = Some(ts("2025-02-01 00:00:00"));

        let report = ReconciliationEngine::new().reconcile(&catalog, &[obs], &period("2025-02-01", "2025-02-28"));
        assert_eq!(module_row(&report, MODULE_A).counts, PeriodCounts::from_buckets(1, 0, 0, 1));
    }

    #[test]
    fn test_non_vital_never_counted() {
        let catalog = Catalog::default_seed();
        let mut essential = vital(1, MODULE_A, "2025-01-01 09:00:00");
        essential.criticality = Criticality::Essential;
        let mut desirable = vital(2, MODULE_A, "2025-01-03 09:00:00");
        desirable.criticality = Criticality::Desirable;
        desirable.status = Status::Closed;
        desirable.closed_at = Some(ts("2025-01-04 09:00:00"));

        let engine = ReconciliationEngine::new();
        let report = engine.reconcile(
            &catalog,
            &[essential, desirable],
            &period("2025-01-01", "2025-01-31"),
        );

        assert_eq!(report.grand_total, PeriodCounts::default());
        assert!(report.details.identified.is_empty());
        assert!(report.details.resolved.is_empty());
        assert!(report.groups.iter().all(|g| g.areas_of_concern.is_empty()));
    }

    #[test]
    fn test_every_module_has_a_row() {
        let catalog = Catalog::default_seed();
        let report = ReconciliationEngine::new().reconcile(&catalog, &[], &period("2025-01-01", "2025-01-31"));

        let rows: usize = report.groups.iter().map(|g| g.modules.len()).sum();
        assert_eq!(rows, catalog.modules().len());
        assert_eq!(report.groups.len(), 4);
        assert_eq!(report.under_development.len(), 4);
    }

    #[test]
    fn test_group_and_grand_totals_sum() {
        let catalog = Catalog::default_seed();
        let obs = vec![
            vital(1, 4, "2025-01-01 09:00:00"),
            vital(2, 5, "2025-01-02 09:00:00"),
            vital(3, 5, "2024-12-02 09:00:00"),
            vital(4, 1, "2025-01-03 09:00:00"),
        ];

        let report = ReconciliationEngine::new().reconcile(&catalog, &obs, &period("2025-01-01", "2025-01-31"));

        let refit = report.groups.iter().find(|g| g.group_name == "Refit Modules").unwrap();
        assert_eq!(refit.counts.new, 2);
        assert_eq!(refit.counts.pending_from, 1);
        assert_eq!(refit.counts.pending_to, 3);

        assert_eq!(report.grand_total.new, 3);
        assert_eq!(report.grand_total.pending_to, 4);
        assert!(report.verify().is_empty());
    }

    #[test]
    fn test_period_details_identified_and_resolved() {
        let catalog = Catalog::default_seed();
        let p = period("2025-01-10", "2025-01-20");

        let new_open = vital(1, MODULE_A, "2025-01-11 09:00:00");
        let mut resurfaced = vital(2, MODULE_B, "2024-12-01 09:00:00");
        resurfaced.status = Status::Resurfaced;
        resurfaced.closed_at = Some(ts("2024-12-15 09:00:00"));
        resurfaced.resurfaced_at = Some(ts("2025-01-15 09:00:00"));
        let mut new_then_closed = vital(3, MODULE_A, "2025-01-12 09:00:00");
        new_then_closed.status = Status::Closed;
        new_then_closed.closed_at = Some(ts("2025-01-13 09:00:00"));
        let old_open = vital(4, MODULE_A, "2024-11-01 09:00:00");

        let details = ReconciliationEngine::new().period_details(
            &catalog,
            &[new_open, resurfaced, new_then_closed, old_open],
            &p,
        );

        let identified: Vec<i64> = details.identified.iter().map(|d| d.observation_id).collect();
        assert_eq!(identified, vec![2, 1], "newest first, closed ones excluded");
        assert_eq!(details.identified[0].date, ts("2025-01-15 09:00:00"));
        assert_eq!(details.identified[0].module_name, "Defect List (DL)");

        let resolved: Vec<i64> = details.resolved.iter().map(|d| d.observation_id).collect();
        assert_eq!(resolved, vec![3]);
    }

    #[test]
    fn test_period_details_are_capped() {
        let catalog = Catalog::default_seed();
        let base = ts("2025-01-01 00:00:00");
        let obs: Vec<Observation> = (1..=30)
            .map(|i| {
                let mut o = vital(i, MODULE_A, "2025-01-01 00:00:00");
                o.created_at = base + Duration::hours(i);
                o
            })
            .collect();

        let engine = ReconciliationEngine::with_detail_limit(20);
        let details = engine.period_details(&catalog, &obs, &period("2025-01-01", "2025-01-31"));

        assert_eq!(details.identified.len(), 20);
        assert_eq!(details.identified[0].observation_id, 30);
        assert_eq!(details.identified[19].observation_id, 11);
    }

    #[test]
    fn test_areas_of_concern_per_group() {
        let catalog = Catalog::default_seed();
        let mut closed = vital(3, MODULE_A, "2025-01-03 09:00:00");
        closed.status = Status::Closed;
        closed.closed_at = Some(ts("2025-01-04 09:00:00"));
        let obs = vec![
            vital(1, MODULE_A, "2025-01-01 09:00:00"),
            vital(2, MODULE_A, "2025-01-02 09:00:00"),
            closed,
            vital(4, MODULE_B, "2025-01-02 09:00:00"),
        ];

        let engine = ReconciliationEngine::new();
        let hr = engine.areas_of_concern(&catalog, &obs, 1);
        let ids: Vec<i64> = hr.iter().map(|e| e.observation_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let catalog = Catalog::default_seed();
        let obs = vec![
            vital(1, MODULE_A, "2025-01-01 09:00:00"),
            vital(2, MODULE_B, "2025-01-05 09:00:00"),
        ];
        let p = period("2025-01-01", "2025-01-31");
        let engine = ReconciliationEngine::new();

        assert_eq!(engine.reconcile(&catalog, &obs, &p), engine.reconcile(&catalog, &obs, &p));
    }

    // ------------------------------------------------------------------------
    // Property tests: identity and summation over random snapshots
    // ------------------------------------------------------------------------

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    prop_compose! {
        fn arb_observation()(
            module_id in 1i64..=25,
            criticality in prop::sample::select(Criticality::ALL.to_vec()),
            created_hours in 0i64..(90 * 24),
            close_after in prop::option::of(0i64..(30 * 24)),
            resurface_after in prop::option::of(0i64..(30 * 24)),
        ) -> Observation {
            let created_at = base_time() + Duration::hours(created_hours);
            let closed_at = close_after.map(|h| created_at + Duration::hours(h));
            let resurfaced_at = resurface_after.map(|h| created_at + Duration::hours(h));
            let status = match (closed_at, resurfaced_at) {
                (None, None) => Status::Open,
                (Some(_), None) => Status::Closed,
                (None, Some(_)) => Status::Resurfaced,
                (Some(c), Some(r)) if r > c => Status::Resurfaced,
                _ => Status::Closed,
            };

            Observation {
                id: 0,
                text: "generated".to_string(),
                module_id,
                criticality,
                status,
                created_at,
                closed_at,
                resurfaced_at,
            }
        }
    }

    fn arb_snapshot() -> impl Strategy<Value = Vec<Observation>> {
        prop::collection::vec(arb_observation(), 0..80).prop_map(|mut obs| {
            for (index, o) in obs.iter_mut().enumerate() {
                o.id = index as i64 + 1;
            }
            obs
        })
    }

    fn arb_period() -> impl Strategy<Value = ReportPeriod> {
        (0i64..120, 0i64..45).prop_map(|(start, len)| {
            let from = base_time().date() + Duration::days(start);
            ReportPeriod::new(from, from + Duration::days(len)).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_reconciliation_identity_holds(obs in arb_snapshot(), p in arb_period()) {
            let report = ReconciliationEngine::new().reconcile(&Catalog::default_seed(), &obs, &p);

            prop_assert!(report.grand_total.is_reconciled());
            for group in &report.groups {
                prop_assert!(group.counts.is_reconciled());
                for module in &group.modules {
                    prop_assert!(module.counts.is_reconciled());
                }
            }
        }

        #[test]
        fn prop_rows_sum_to_totals(obs in arb_snapshot(), p in arb_period()) {
            let report = ReconciliationEngine::new().reconcile(&Catalog::default_seed(), &obs, &p);

            for group in &report.groups {
                let module_sum: PeriodCounts = group.modules.iter().map(|m| &m.counts).sum();
                prop_assert_eq!(module_sum, group.counts);
            }
            let group_sum: PeriodCounts = report.groups.iter().map(|g| &g.counts).sum();
            prop_assert_eq!(group_sum, report.grand_total);
            prop_assert!(report.verify().is_empty());
        }

        #[test]
        fn prop_only_vital_observations_count(obs in arb_snapshot(), p in arb_period()) {
            let engine = ReconciliationEngine::new();
            let catalog = Catalog::default_seed();
            let vital_only: Vec<Observation> =
                obs.iter().filter(|o| o.is_vital()).cloned().collect();

            prop_assert_eq!(
                engine.reconcile(&catalog, &obs, &p),
                engine.reconcile(&catalog, &vital_only, &p)
            );
        }

        #[test]
        fn prop_details_respect_limit(obs in arb_snapshot(), p in arb_period(), limit in 0usize..25) {
            let details = ReconciliationEngine::with_detail_limit(limit)
                .period_details(&Catalog::default_seed(), &obs, &p);
            prop_assert!(details.identified.len() <= limit);
            prop_assert!(details.resolved.len() <= limit);
            prop_assert!(details.identified.windows(2).all(|w| w[0].date >= w[1].date));
            prop_assert!(details.resolved.windows(2).all(|w| w[0].date >= w[1].date));
        }
    }
}
