// ERP Observation Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod config;
pub mod observation;
pub mod lifecycle;
pub mod catalog;
pub mod period;
pub mod db;
pub mod reconciliation; // Period Reconciliation Engine
pub mod report;
pub mod trends;
pub mod render;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{ObservationError, Result};
pub use config::{init_tracing, AppConfig};
pub use observation::{Criticality, NewObservation, Observation, Status};
pub use lifecycle::{transition, Transition, TransitionTarget};
pub use catalog::{Catalog, Module, ModuleGroup};
pub use period::{now_utc, ReportPeriod};
pub use db::{
    Event, ListedObservation,
    open_database, setup_database, seed_catalog, load_catalog,
    insert_observation, transition_observations, get_observation,
    load_vital_snapshot, pending_count, closed_for_module, open_or_resurfaced_for_module,
    observations_in_range, insert_event, events_for_observation,
};
pub use reconciliation::{PeriodCounts, ReconciliationEngine, DEFAULT_DETAIL_LIMIT};
pub use report::{
    generate_report, DetailEntry, Discrepancy, DiscrepancyCategory, GroupReport, ModuleRow,
    PeriodDetails, PeriodReport,
};
pub use trends::{criticality_trend, vital_module_trend, CriticalityTrend, VitalModuleTrend};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
