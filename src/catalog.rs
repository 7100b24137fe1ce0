// 🗂️ Module Catalog - immutable reference data
//
// Module groups and modules are seeded once and never change during normal
// operation. The catalog is loaded at process start and shared read-only.
//
// Every module belongs to exactly one group; construction rejects anything else.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ObservationError, Result};

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGroup {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub name: String,
    pub group_id: i64,

    /// Listed under "modules under development" in reports
    #[serde(default)]
    pub under_development: bool,
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Sorted by name
    groups: Vec<ModuleGroup>,

    /// Sorted by name
    modules: Vec<Module>,
}

impl Catalog {
    /// Build a catalog, checking ids are unique and every module's group exists
    pub fn new(groups: Vec<ModuleGroup>, modules: Vec<Module>) -> Result<Self> {
        let mut group_ids = HashSet::new();
        for group in &groups {
            if !group_ids.insert(group.id) {
                return Err(ObservationError::validation(format!(
                    "Duplicate module group id: {}",
                    group.id
                )));
            }
        }

        let mut module_ids = HashSet::new();
        for module in &modules {
            if !module_ids.insert(module.id) {
                return Err(ObservationError::validation(format!(
                    "Duplicate module id: {}",
                    module.id
                )));
            }
            if !group_ids.contains(&module.group_id) {
                return Err(ObservationError::validation(format!(
                    "Module '{}' references unknown group {}",
                    module.name, module.group_id
                )));
            }
        }

        Ok(Catalog::sorted(groups, modules))
    }

    fn sorted(mut groups: Vec<ModuleGroup>, mut modules: Vec<Module>) -> Self {
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        Catalog { groups, modules }
    }

    /// The facility's module list as originally rolled out
    pub fn default_seed() -> Self {
        let groups = [
            (1, "HR Modules"),
            (2, "Refit Modules"),
            (3, "Commercial Modules"),
            (4, "Services Modules"),
        ]
        .into_iter()
        .map(|(id, name)| ModuleGroup {
            id,
            name: name.to_string(),
        })
        .collect();

        let modules = DEFAULT_MODULES
            .iter()
            .enumerate()
            .map(|(index, (name, group_id, under_development))| Module {
                id: index as i64 + 1,
                name: name.to_string(),
                group_id: *group_id,
                under_development: *under_development,
            })
            .collect();

        Catalog::sorted(groups, modules)
    }

    pub fn groups(&self) -> &[ModuleGroup] {
        &self.groups
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn group(&self, id: i64) -> Option<&ModuleGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn module(&self, id: i64) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Modules of one group, by name
    pub fn modules_in(&self, group_id: i64) -> impl Iterator<Item = &Module> + '_ {
        self.modules.iter().filter(move |m| m.group_id == group_id)
    }

    pub fn group_of(&self, module_id: i64) -> Option<&ModuleGroup> {
        self.module(module_id).and_then(|m| self.group(m.group_id))
    }

    pub fn under_development(&self) -> Vec<&Module> {
        self.modules.iter().filter(|m| m.under_development).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// (name, group id, under development)
const DEFAULT_MODULES: &[(&str, i64, bool)] = &[
    ("Salary & Wages Module (SWM)", 1, false),
    ("Time Keeping System (TKS)", 1, false),
    ("Personnel Information Management System (PIMS)", 1, false),
    ("Refit Planning Process (RPP)", 2, false),
    ("Defect List (DL)", 2, false),
    ("Shop Floor Management Module (SFMM)", 2, false),
    ("Operational Defect Management (OPDEF)", 2, false),
    ("Operational Assistance (OPRA)", 2, false),
    ("Refit Monitoring Module (RMM)", 2, false),
    ("Operational Repair Monitoring (ORM)", 2, false),
    ("Quality Control Management System (QCMS)", 2, false),
    ("Manpower Booking (MPB)", 2, false),
    ("Dry Docking Module (DRY DOCK)", 2, false),
    ("Berthing Module (BERTHING)", 2, false),
    (
        "Financial Management Module (FMS), Budget Management Module (BMS), Local Procurement (LP) Module",
        3,
        false,
    ),
    ("Vendor Management System (VMS)", 3, false),
    ("Yard Utility Services (YUS)", 4, false),
    ("Yard Security Module (YSM)", 4, false),
    ("Quality Assurance Module (QAM)", 4, false),
    ("Management Information Systems (MIS)", 4, false),
    ("E-Seva", 4, false),
    ("E-Samagri", 4, true),
    ("Medical & Health Management System (MHMS)", 4, true),
    ("Coster", 4, true),
    ("Yard Asset Management (YAMS)", 4, true),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seed() {
        let catalog = Catalog::default_seed();

        assert_eq!(catalog.groups().len(), 4);
        assert_eq!(catalog.modules().len(), 25);

        let names: Vec<&str> = catalog.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Commercial Modules",
                "HR Modules",
                "Refit Modules",
                "Services Modules"
            ]
        );

        assert_eq!(catalog.modules_in(1).count(), 3);
        assert_eq!(catalog.modules_in(2).count(), 11);
        assert_eq!(catalog.modules_in(3).count(), 2);
        assert_eq!(catalog.modules_in(4).count(), 9);
    }

    #[test]
    fn test_modules_in_group_sorted_by_name() {
        let catalog = Catalog::default_seed();
        let names: Vec<&str> = catalog.modules_in(1).map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Personnel Information Management System (PIMS)",
                "Salary & Wages Module (SWM)",
                "Time Keeping System (TKS)"
            ]
        );
    }

    #[test]
    fn test_lookup() {
        let catalog = Catalog::default_seed();

        let swm = catalog.module(1).unwrap();
        assert_eq!(swm.name, "Salary & Wages Module (SWM)");
        assert_eq!(catalog.group_of(1).unwrap().name, "HR Modules");
        assert!(catalog.module(0).is_none());
        assert!(catalog.group(99).is_none());
    }

    #[test]
    fn test_under_development() {
        let catalog = Catalog::default_seed();
        let names: Vec<&str> = catalog
            .under_development()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names.len(), 4);
        assert!(names.contains(&"Coster"));
        assert!(names.contains(&"E-Samagri"));
    }

    #[test]
    fn test_rejects_module_without_group() {
        let result = Catalog::new(
            vec![ModuleGroup {
                id: 1,
                name: "HR Modules".to_string(),
            }],
            vec![Module {
                id: 1,
                name: "Orphan".to_string(),
                group_id: 7,
                under_development: false,
            }],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let group = ModuleGroup {
            id: 1,
            name: "A".to_string(),
        };
        assert!(Catalog::new(vec![group.clone(), group], vec![]).is_err());
    }
}
