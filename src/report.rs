// 📊 Period Report - the output of one reconciliation run
//
// A PeriodReport is built once and then handed, unchanged, to every
// renderer (JSON, text, TUI, PDF). Renderers never recompute numbers.
//
// generate_report() reads its whole input inside one read transaction so a
// concurrent close or resurface cannot show up in only part of a report.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::db;
use crate::error::Result;
use crate::observation::{Observation, Status};
use crate::period::ReportPeriod;
use crate::reconciliation::{PeriodCounts, ReconciliationEngine};

// ============================================================================
// REPORT ROWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRow {
    pub module_id: i64,
    pub module_name: String,
    pub counts: PeriodCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group_id: i64,
    pub group_name: String,

    /// Field-wise sum of `modules`
    pub counts: PeriodCounts,

    /// Every module of the group, by name
    pub modules: Vec<ModuleRow>,

    /// Vital observations of the group still OPEN or RESURFACED
    pub areas_of_concern: Vec<DetailEntry>,
}

/// One line of narrative: "<module>: <text> (Date: ..., Status: ...)"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailEntry {
    pub observation_id: i64,
    pub module_name: String,
    #[serde(rename = "observation")]
    pub text: String,
    pub status: Status,
    pub date: NaiveDateTime,
}

impl DetailEntry {
    pub fn new(catalog: &Catalog, observation: &Observation, date: NaiveDateTime) -> Self {
        DetailEntry {
            observation_id: observation.id,
            module_name: catalog
                .module(observation.module_id)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| format!("Module {}", observation.module_id)),
            text: observation.text.clone(),
            status: observation.status,
            date,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodDetails {
    pub identified: Vec<DetailEntry>,
    pub resolved: Vec<DetailEntry>,
}

// ============================================================================
// PERIOD REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub period: ReportPeriod,

    /// By group name
    pub groups: Vec<GroupReport>,

    /// Field-wise sum of `groups`
    pub grand_total: PeriodCounts,

    pub details: PeriodDetails,

    /// Names of modules flagged as under development
    pub under_development: Vec<String>,
}

impl PeriodReport {
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRow> + '_ {
        self.groups.iter().flat_map(|g| g.modules.iter())
    }

    pub fn group(&self, name: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group_name == name)
    }

    pub fn is_consistent(&self) -> bool {
        self.verify().is_empty()
    }

    /// Check the reconciliation identity on every row and that rows sum up.
    pub fn verify(&self) -> Vec<Discrepancy> {
        let mut discrepancies = Vec::new();

        for group in &self.groups {
            for module in &group.modules {
                if !module.counts.is_reconciled() {
                    discrepancies.push(Discrepancy::identity(&module.module_name, &module.counts));
                }
            }

            if !group.counts.is_reconciled() {
                discrepancies.push(Discrepancy::identity(&group.group_name, &group.counts));
            }

            let module_sum: PeriodCounts = group.modules.iter().map(|m| &m.counts).sum();
            if module_sum != group.counts {
                discrepancies.push(Discrepancy::sum(&group.group_name, &module_sum, &group.counts));
            }
        }

        if !self.grand_total.is_reconciled() {
            discrepancies.push(Discrepancy::identity("GRAND TOTAL", &self.grand_total));
        }

        let group_sum: PeriodCounts = self.groups.iter().map(|g| &g.counts).sum();
        if group_sum != self.grand_total {
            discrepancies.push(Discrepancy::sum("GRAND TOTAL", &group_sum, &self.grand_total));
        }

        discrepancies
    }

    pub fn summary(&self) -> String {
        format!(
            "Vital observations {}: {} pending at start, {} resurfaced, {} new, {} resolved, {} pending at end",
            self.period.label(),
            self.grand_total.pending_from,
            self.grand_total.resurfaced,
            self.grand_total.new,
            self.grand_total.resolved,
            self.grand_total.pending_to
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Module, group, or "GRAND TOTAL"
    pub scope: String,
    pub description: String,
    pub category: DiscrepancyCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscrepancyCategory {
    /// pending_from + resurfaced + new - resolved != pending_to
    IdentityBroken,
    /// Child rows do not add up to the parent row
    SumMismatch,
}

impl Discrepancy {
    fn identity(scope: &str, counts: &PeriodCounts) -> Self {
        Discrepancy {
            scope: scope.to_string(),
            description: format!(
                "{} + {} + {} - {} != {}",
                counts.pending_from, counts.resurfaced, counts.new, counts.resolved, counts.pending_to
            ),
            category: DiscrepancyCategory::IdentityBroken,
        }
    }

    fn sum(scope: &str, summed: &PeriodCounts, reported: &PeriodCounts) -> Self {
        Discrepancy {
            scope: scope.to_string(),
            description: format!("rows sum to {:?}, reported {:?}", summed, reported),
            category: DiscrepancyCategory::SumMismatch,
        }
    }
}

// ============================================================================
// CONSISTENT-READ BUILDER
// ============================================================================

/// Reconcile `period` against the store.
///
/// Read-only: the transaction is dropped (rolled back) once the snapshot is in
/// memory.
pub fn generate_report(
    conn: &Connection,
    catalog: &Catalog,
    engine: &ReconciliationEngine,
    period: &ReportPeriod,
) -> Result<PeriodReport> {
    let observations = {
        let tx = conn.unchecked_transaction()?;
        let snapshot = db::load_vital_snapshot(&tx, period.to_end())?;
        drop(tx);
        snapshot
    };

    let report = engine.reconcile(catalog, &observations, period);

    for discrepancy in report.verify() {
        warn!(scope = %discrepancy.scope, "{}", discrepancy.description);
    }

    info!(
        period = %period.label(),
        observations = observations.len(),
        pending_to = report.grand_total.pending_to,
        "report generated"
    );
    Ok(report)
}
