// 📈 Trend series - per-day counts for the last week
//
// Two series, both over a 7-day window ending today (inclusive), with every
// day of the window present and zero-filled:
//   - criticality trend: observations created per day, per criticality
//   - Vital module trend: Vital observations created per day, per module

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::db;
use crate::error::Result;
use crate::observation::Criticality;
use crate::period::DATE_FORMAT;

pub const TREND_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalityTrend {
    pub labels: Vec<String>,
    pub vital: Vec<i64>,
    pub essential: Vec<i64>,
    pub desirable: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSeries {
    pub label: String,
    pub data: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalModuleTrend {
    pub labels: Vec<String>,
    pub datasets: Vec<ModuleSeries>,
}

/// The days of the window ending at `today`, oldest first
pub fn window(today: NaiveDate) -> Vec<NaiveDate> {
    (0..TREND_DAYS)
        .rev()
        .map(|back| today - Duration::days(back))
        .collect()
}

fn labels(days: &[NaiveDate]) -> Vec<String> {
    days.iter().map(|d| d.format(DATE_FORMAT).to_string()).collect()
}

pub fn criticality_trend(conn: &Connection, today: NaiveDate) -> Result<CriticalityTrend> {
    let days = window(today);
    let rows = db::daily_criticality_counts(conn, days[0])?;

    let counts: HashMap<(NaiveDate, Criticality), i64> = rows
        .into_iter()
        .map(|(day, criticality, count)| ((day, criticality), count))
        .collect();
    let series = |criticality: Criticality| -> Vec<i64> {
        days.iter()
            .map(|day| counts.get(&(*day, criticality)).copied().unwrap_or(0))
            .collect()
    };

    Ok(CriticalityTrend {
        labels: labels(&days),
        vital: series(Criticality::Vital),
        essential: series(Criticality::Essential),
        desirable: series(Criticality::Desirable),
    })
}

/// One dataset per module with at least one Vital observation in the window
pub fn vital_module_trend(conn: &Connection, today: NaiveDate) -> Result<VitalModuleTrend> {
    let days = window(today);
    let index: HashMap<NaiveDate, usize> = days.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    let mut modules: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for (day, module_name, count) in db::daily_vital_module_counts(conn, days[0])? {
        // Rows dated after `today` fall outside the window
        let Some(&slot) = index.get(&day) else {
            continue;
        };
        modules.entry(module_name).or_insert_with(|| vec![0; days.len()])[slot] = count;
    }

    Ok(VitalModuleTrend {
        labels: labels(&days),
        datasets: modules
            .into_iter()
            .map(|(label, data)| ModuleSeries { label, data })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::db::{insert_observation, seed_catalog, setup_database};
    use crate::observation::NewObservation;
    use crate::period::parse_timestamp;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_catalog(&conn, &Catalog::default_seed()).unwrap();
        conn
    }

    fn add(conn: &Connection, module_id: i64, criticality: Criticality, at: &str) {
        let new = NewObservation {
            text: "trend sample".to_string(),
            module_id,
            criticality,
        };
        insert_observation(conn, &new, parse_timestamp(at).unwrap(), "test").unwrap();
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn test_window_covers_seven_days_ending_today() {
        let days = window(today());
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(days[6], today());
    }

    #[test]
    fn test_criticality_trend_zero_fills() {
        let conn = test_db();
        add(&conn, 1, Criticality::Vital, "2025-03-04 08:00:00");
        add(&conn, 1, Criticality::Vital, "2025-03-10 08:00:00");
        add(&conn, 2, Criticality::Vital, "2025-03-10 09:00:00");
        add(&conn, 2, Criticality::Desirable, "2025-03-08 09:00:00");
        add(&conn, 2, Criticality::Essential, "2025-03-03 23:59:59"); // before window

        let trend = criticality_trend(&conn, today()).unwrap();

        assert_eq!(trend.labels.first().map(String::as_str), Some("2025-03-04"));
        assert_eq!(trend.vital, vec![1, 0, 0, 0, 0, 0, 2]);
        assert_eq!(trend.essential, vec![0; 7]);
        assert_eq!(trend.desirable, vec![0, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_vital_module_trend_ignores_other_criticalities() {
        let conn = test_db();
        add(&conn, 1, Criticality::Vital, "2025-03-05 08:00:00");
        add(&conn, 1, Criticality::Vital, "2025-03-05 09:00:00");
        add(&conn, 5, Criticality::Vital, "2025-03-09 09:00:00");
        add(&conn, 6, Criticality::Essential, "2025-03-09 09:00:00");

        let trend = vital_module_trend(&conn, today()).unwrap();

        assert_eq!(trend.labels.len(), 7);
        assert_eq!(trend.datasets.len(), 2);
        assert_eq!(trend.datasets[0].label, "Defect List (DL)");
        assert_eq!(trend.datasets[0].data, vec![0, 0, 0, 0, 0, 1, 0]);
        assert_eq!(trend.datasets[1].label, "Salary & Wages Module (SWM)");
        assert_eq!(trend.datasets[1].data, vec![0, 2, 0, 0, 0, 0, 0]);
    }
}
