// 🗄️ Event Store - SQLite persistence for observations
//
// Tables:
//   module_groups / modules  - immutable reference data (seeded once)
//   observations             - current lifecycle projection per observation
//   observation_events       - append-only audit trail of every change
//
// All timestamps are "YYYY-MM-DD HH:MM:SS" UTC text (see period.rs).

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Module, ModuleGroup};
use crate::error::{ObservationError, Result};
use crate::lifecycle::{self, Transition, TransitionTarget};
use crate::observation::{Criticality, NewObservation, Observation, Status};
use crate::period::{format_timestamp, parse_timestamp, ReportPeriod, DATE_FORMAT};

// ============================================================================
// EVENT (audit trail)
// ============================================================================

/// Every change is an event: creations and transitions are appended here and
/// never updated or deleted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub observation_id: i64,
    pub event_type: String,
    pub occurred_at: NaiveDateTime,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        observation_id: i64,
        data: serde_json::Value,
        occurred_at: NaiveDateTime,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            observation_id,
            event_type: event_type.to_string(),
            occurred_at,
            data,
            actor: actor.to_string(),
        }
    }

    pub fn created(observation_id: i64, new: &NewObservation, at: NaiveDateTime, actor: &str) -> Self {
        Self::new(
            "observation_created",
            observation_id,
            serde_json::json!({
                "module_id": new.module_id,
                "criticality": new.criticality.as_str(),
                "to": Status::Open.as_str(),
            }),
            at,
            actor,
        )
    }

    pub fn transitioned(
        observation_id: i64,
        target: TransitionTarget,
        transition: Transition,
        at: NaiveDateTime,
        actor: &str,
    ) -> Self {
        Self::new(
            target.event_type(),
            observation_id,
            serde_json::json!({
                "from": transition.from.as_str(),
                "to": transition.to.as_str(),
                "effective": transition.is_effective(),
            }),
            at,
            actor,
        )
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    info!(path = %path.display(), "database opened");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL gives readers a stable snapshot while a writer is active
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS module_groups (
            group_id INTEGER PRIMARY KEY,
            group_name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS modules (
            module_id INTEGER PRIMARY KEY,
            module_name TEXT UNIQUE NOT NULL,
            group_id INTEGER NOT NULL REFERENCES module_groups(group_id),
            under_development INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            observation TEXT NOT NULL,
            module_id INTEGER NOT NULL REFERENCES modules(module_id),
            criticality TEXT NOT NULL
                CHECK (criticality IN ('Vital', 'Essential', 'Desirable')),
            status TEXT NOT NULL DEFAULT 'OPEN'
                CHECK (status IN ('OPEN', 'RESURFACED', 'CLOSED')),
            created_at TEXT NOT NULL,
            closed_at TEXT,
            resurfaced_at TEXT
        );

        CREATE TABLE IF NOT EXISTS observation_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            observation_id INTEGER NOT NULL REFERENCES observations(id),
            event_type TEXT NOT NULL,
            occurred_at TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_observations_module ON observations(module_id);
        CREATE INDEX IF NOT EXISTS idx_observations_status ON observations(status);
        CREATE INDEX IF NOT EXISTS idx_observations_created ON observations(created_at);
        CREATE INDEX IF NOT EXISTS idx_events_observation ON observation_events(observation_id);",
    )?;

    Ok(())
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

/// Insert groups and modules that are not present yet. Safe to run on every start.
pub fn seed_catalog(conn: &Connection, catalog: &Catalog) -> Result<usize> {
    let mut inserted = 0;

    for group in catalog.groups() {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO module_groups (group_id, group_name) VALUES (?1, ?2)",
            params![group.id, group.name],
        )?;
    }

    for module in catalog.modules() {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO modules (module_id, module_name, group_id, under_development)
             VALUES (?1, ?2, ?3, ?4)",
            params![module.id, module.name, module.group_id, module.under_development],
        )?;
    }

    if inserted > 0 {
        info!(rows = inserted, "reference catalog seeded");
    }

    Ok(inserted)
}

pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn.prepare("SELECT group_id, group_name FROM module_groups")?;
    let groups = stmt
        .query_map([], |row| {
            Ok(ModuleGroup {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT module_id, module_name, group_id, under_development FROM modules")?;
    let modules = stmt
        .query_map([], |row| {
            Ok(Module {
                id: row.get(0)?,
                name: row.get(1)?,
                group_id: row.get(2)?,
                under_development: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Catalog::new(groups, modules)
}

// ============================================================================
// OBSERVATIONS - writes
// ============================================================================

/// Insert a new observation with status OPEN, logging an audit event
pub fn insert_observation(
    conn: &Connection,
    new: &NewObservation,
    at: NaiveDateTime,
    actor: &str,
) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO observations (observation, module_id, criticality, status, created_at)
         VALUES (?1, ?2, ?3, 'OPEN', ?4)",
        params![
            new.text,
            new.module_id,
            new.criticality.as_str(),
            format_timestamp(at)
        ],
    )?;
    let id = tx.last_insert_rowid();

    insert_event(&tx, &Event::created(id, new, at, actor))?;
    tx.commit()?;

    info!(
        id,
        module_id = new.module_id,
        criticality = %new.criticality,
        "observation recorded"
    );

    Ok(id)
}

/// Move every listed observation to the target status.
///
/// Prior status is not validated and nothing is rejected. A transition that
/// keeps the observation on the same side of open/closed (re-closing, or
/// resurfacing something still open) is logged as an event but leaves the row
/// and its timestamps untouched. Unknown ids are skipped. The whole batch runs
/// in one transaction: either every existing id is handled and logged, or
/// nothing changes.
pub fn transition_observations(
    conn: &mut Connection,
    ids: &[i64],
    target: TransitionTarget,
    at: NaiveDateTime,
    actor: &str,
) -> Result<usize> {
    if ids.is_empty() {
        return Err(ObservationError::validation("No observation ids given"));
    }

    let unique: BTreeSet<i64> = ids.iter().copied().collect();
    let at_str = format_timestamp(at);
    let tx = conn.transaction()?;
    let mut updated = 0;

    {
        let mut select = tx.prepare("SELECT status FROM observations WHERE id = ?1")?;
        let update_sql = format!(
            "UPDATE observations SET status = ?1, {} = ?2 WHERE id = ?3",
            target.timestamp_column()
        );
        let mut update = tx.prepare(&update_sql)?;

        for id in unique {
            let current: Option<String> = select.query_row([id], |row| row.get(0)).optional()?;
            let Some(current) = current else {
                debug!(id, "transition skipped: unknown observation");
                continue;
            };

            let transition = lifecycle::transition(current.parse::<Status>()?, target);
            if transition.is_effective() {
                update.execute(params![transition.to.as_str(), at_str, id])?;
            } else {
                warn!(
                    id,
                    from = %transition.from,
                    to = %transition.to,
                    "transition does not change open/closed state, row left as is"
                );
            }

            insert_event(&tx, &Event::transitioned(id, target, transition, at, actor))?;
            updated += 1;
        }
    }

    tx.commit()?;
    info!(requested = ids.len(), updated, target = ?target, "observations transitioned");

    Ok(updated)
}

// ============================================================================
// OBSERVATIONS - reads
// ============================================================================

const OBSERVATION_COLUMNS: &str =
    "o.id, o.observation, o.module_id, o.criticality, o.status, o.created_at, o.closed_at, o.resurfaced_at";

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

fn timestamp_at(row: &Row, index: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(index)?;
    parse_timestamp(&raw).ok_or_else(|| conversion_error(index, format!("bad timestamp: {}", raw)))
}

fn optional_timestamp_at(row: &Row, index: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|s| parse_timestamp(&s).ok_or_else(|| conversion_error(index, format!("bad timestamp: {}", s))))
        .transpose()
}

fn parsed_at<T: std::str::FromStr>(row: &Row, index: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    raw.parse::<T>()
        .map_err(|_| conversion_error(index, format!("unexpected value: {}", raw)))
}

/// Map a row selected with OBSERVATION_COLUMNS
fn row_to_observation(row: &Row) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: row.get(0)?,
        text: row.get(1)?,
        module_id: row.get(2)?,
        criticality: parsed_at::<Criticality>(row, 3)?,
        status: parsed_at::<Status>(row, 4)?,
        created_at: timestamp_at(row, 5)?,
        closed_at: optional_timestamp_at(row, 6)?,
        resurfaced_at: optional_timestamp_at(row, 7)?,
    })
}

pub fn get_observation(conn: &Connection, id: i64) -> Result<Option<Observation>> {
    let sql = format!("SELECT {} FROM observations o WHERE o.id = ?1", OBSERVATION_COLUMNS);
    Ok(conn.query_row(&sql, [id], row_to_observation).optional()?)
}

/// Vital observations created at or before `up_to` - the input of one report.
///
/// A single SELECT reads one consistent snapshot of the table.
pub fn load_vital_snapshot(conn: &Connection, up_to: NaiveDateTime) -> Result<Vec<Observation>> {
    let sql = format!(
        "SELECT {} FROM observations o
         WHERE o.criticality = 'Vital' AND o.created_at <= ?1
         ORDER BY o.id",
        OBSERVATION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let observations = stmt
        .query_map([format_timestamp(up_to)], row_to_observation)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(count = observations.len(), "vital snapshot loaded");
    Ok(observations)
}

/// Count of observations still needing attention (all criticalities)
pub fn pending_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM observations WHERE status IN ('OPEN', 'RESURFACED')",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn observations_for_module(
    conn: &Connection,
    module_id: i64,
    statuses: &str,
) -> Result<Vec<Observation>> {
    let sql = format!(
        "SELECT {} FROM observations o
         WHERE o.module_id = ?1 AND o.status IN ({})
         ORDER BY o.created_at DESC, o.id DESC",
        OBSERVATION_COLUMNS, statuses
    );
    let mut stmt = conn.prepare(&sql)?;
    let observations = stmt
        .query_map([module_id], row_to_observation)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(observations)
}

pub fn closed_for_module(conn: &Connection, module_id: i64) -> Result<Vec<Observation>> {
    observations_for_module(conn, module_id, "'CLOSED'")
}

pub fn open_or_resurfaced_for_module(conn: &Connection, module_id: i64) -> Result<Vec<Observation>> {
    observations_for_module(conn, module_id, "'OPEN', 'RESURFACED'")
}

/// One line of the raw observation listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedObservation {
    pub id: i64,
    pub observation: String,
    pub group_name: String,
    pub module_name: String,
    pub criticality: Criticality,
    pub status: Status,
    pub created_at: NaiveDateTime,

    /// Current OPEN + RESURFACED count of the observation's module
    pub module_pending: i64,
}

/// Every observation (any criticality) created within the period.
///
/// Busiest groups first, then busiest modules, then newest observations.
pub fn observations_in_range(conn: &Connection, period: &ReportPeriod) -> Result<Vec<ListedObservation>> {
    let mut stmt = conn.prepare(
        "WITH pending_counts AS (
            SELECT m.group_id, m.module_id, COUNT(o.id) AS pending_count
            FROM observations o
            JOIN modules m ON o.module_id = m.module_id
            WHERE o.status IN ('OPEN', 'RESURFACED')
            GROUP BY m.group_id, m.module_id
        )
        SELECT o.id, o.observation, g.group_name, m.module_name,
               o.criticality, o.status, o.created_at,
               IFNULL(pc.pending_count, 0) AS module_pending
        FROM observations o
        JOIN modules m ON o.module_id = m.module_id
        JOIN module_groups g ON m.group_id = g.group_id
        LEFT JOIN pending_counts pc ON pc.module_id = m.module_id
        WHERE date(o.created_at) BETWEEN ?1 AND ?2
        ORDER BY
            IFNULL((SELECT SUM(pending_count) FROM pending_counts WHERE group_id = g.group_id), 0) DESC,
            module_pending DESC,
            o.created_at DESC,
            o.id DESC",
    )?;

    let rows = stmt
        .query_map(
            params![
                period.from.format(DATE_FORMAT).to_string(),
                period.to.format(DATE_FORMAT).to_string()
            ],
            |row| {
                Ok(ListedObservation {
                    id: row.get(0)?,
                    observation: row.get(1)?,
                    group_name: row.get(2)?,
                    module_name: row.get(3)?,
                    criticality: parsed_at::<Criticality>(row, 4)?,
                    status: parsed_at::<Status>(row, 5)?,
                    created_at: timestamp_at(row, 6)?,
                    module_pending: row.get(7)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = event.data.to_string();

    conn.execute(
        "INSERT INTO observation_events (
            event_id, observation_id, event_type, occurred_at, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.observation_id,
            event.event_type,
            format_timestamp(event.occurred_at),
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Audit trail for one observation, newest first
pub fn events_for_observation(conn: &Connection, observation_id: i64) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, observation_id, event_type, occurred_at, data, actor
         FROM observation_events
         WHERE observation_id = ?1
         ORDER BY occurred_at DESC, id DESC",
    )?;

    let events = stmt
        .query_map([observation_id], |row| {
            let data_json: String = row.get(4)?;
            Ok(Event {
                event_id: row.get(0)?,
                observation_id: row.get(1)?,
                event_type: row.get(2)?,
                occurred_at: timestamp_at(row, 3)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| conversion_error(4, e.to_string()))?,
                actor: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// TREND QUERIES
// ============================================================================

fn parse_day(row: &Row, index: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(index)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|_| conversion_error(index, format!("bad date: {}", raw)))
}

/// (day, criticality, count) for observations created on or after `since`
pub fn daily_criticality_counts(
    conn: &Connection,
    since: NaiveDate,
) -> Result<Vec<(NaiveDate, Criticality, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT date(created_at) AS obs_date, criticality, COUNT(*)
         FROM observations
         WHERE date(created_at) >= ?1
         GROUP BY obs_date, criticality
         ORDER BY obs_date",
    )?;

    let rows = stmt
        .query_map([since.format(DATE_FORMAT).to_string()], |row| {
            Ok((parse_day(row, 0)?, parsed_at::<Criticality>(row, 1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// (day, module name, count) of Vital observations created on or after `since`
pub fn daily_vital_module_counts(
    conn: &Connection,
    since: NaiveDate,
) -> Result<Vec<(NaiveDate, String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT date(o.created_at) AS obs_date, m.module_name, COUNT(*)
         FROM observations o
         JOIN modules m ON o.module_id = m.module_id
         WHERE o.criticality = 'Vital' AND date(o.created_at) >= ?1
         GROUP BY obs_date, m.module_name
         ORDER BY obs_date, m.module_name",
    )?;

    let rows = stmt
        .query_map([since.format(DATE_FORMAT).to_string()], |row| {
            Ok((parse_day(row, 0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_catalog(&conn, &Catalog::default_seed()).unwrap();
        conn
    }

    fn new_obs(text: &str, module_id: i64, criticality: Criticality) -> NewObservation {
        NewObservation {
            text: text.to_string(),
            module_id,
            criticality,
        }
    }

    #[test]
    fn test_open_database_on_disk_uses_wal_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.db");

        let id = {
            let conn = open_database(&path).unwrap();
            seed_catalog(&conn, &Catalog::default_seed()).unwrap();
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .unwrap();
            assert_eq!(mode.to_lowercase(), "wal");
            insert_observation(
                &conn,
                &new_obs("Stock mismatch", 1, Criticality::Vital),
                ts("2025-01-05 09:00:00"),
                "test",
            )
            .unwrap()
        };

        let conn = open_database(&path).unwrap();
        let observation = get_observation(&conn, id).unwrap().unwrap();
        assert_eq!(observation.text, "Stock mismatch");
        assert_eq!(events_for_observation(&conn, id).unwrap().len(), 1);
    }

    #[test]
    fn test_setup_and_seed_are_idempotent() {
        let conn = test_db();
        setup_database(&conn).unwrap();

        let again = seed_catalog(&conn, &Catalog::default_seed()).unwrap();
        assert_eq!(again, 0, "second seed inserts nothing");

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog, Catalog::default_seed());
    }

    #[test]
    fn test_insert_and_get_observation() {
        let conn = test_db();
        let id = insert_observation(
            &conn,
            &new_obs("Wage slip totals mismatch", 1, Criticality::Vital),
            ts("2025-01-01 09:15:00"),
            "test",
        )
        .unwrap();

        let obs = get_observation(&conn, id).unwrap().unwrap();
        assert_eq!(obs.text, "Wage slip totals mismatch");
        assert_eq!(obs.status, Status::Open);
        assert_eq!(obs.created_at, ts("2025-01-01 09:15:00"));
        assert_eq!(obs.closed_at, None);
        assert_eq!(obs.resurfaced_at, None);

        assert!(get_observation(&conn, id + 100).unwrap().is_none());
    }

    #[test]
    fn test_insert_rejects_unknown_module_at_store_level() {
        let conn = test_db();
        let result = insert_observation(
            &conn,
            &new_obs("orphan", 999, Criticality::Vital),
            ts("2025-01-01 09:00:00"),
            "test",
        );
        assert!(matches!(result, Err(ObservationError::Store(_))));
        assert_eq!(pending_count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_transition_sets_timestamps_and_logs_events() {
        let mut conn = test_db();
        let id = insert_observation(
            &conn,
            &new_obs("Defect list export empty", 5, Criticality::Vital),
            ts("2025-01-01 09:00:00"),
            "test",
        )
        .unwrap();

        let n = transition_observations(
            &mut conn,
            &[id],
            TransitionTarget::Close,
            ts("2025-01-05 10:00:00"),
            "test",
        )
        .unwrap();
        assert_eq!(n, 1);

        let n = transition_observations(
            &mut conn,
            &[id],
            TransitionTarget::Resurface,
            ts("2025-01-12 11:00:00"),
            "test",
        )
        .unwrap();
        assert_eq!(n, 1);

        let obs = get_observation(&conn, id).unwrap().unwrap();
        assert_eq!(obs.status, Status::Resurfaced);
        assert_eq!(obs.closed_at, Some(ts("2025-01-05 10:00:00")));
        assert_eq!(obs.resurfaced_at, Some(ts("2025-01-12 11:00:00")));

        let events = events_for_observation(&conn, id).unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["observation_resurfaced", "observation_closed", "observation_created"]
        );
        assert_eq!(events[0].data["from"], "CLOSED");
        assert_eq!(events[0].data["to"], "RESURFACED");
    }

    #[test]
    fn test_repeated_close_keeps_first_closed_at() {
        let mut conn = test_db();
        let id = insert_observation(
            &conn,
            &new_obs("Gate pass not printing", 18, Criticality::Vital),
            ts("2025-01-01 09:00:00"),
            "test",
        )
        .unwrap();

        for at in ["2025-01-03 10:00:00", "2025-01-04 10:00:00"] {
            let n = transition_observations(&mut conn, &[id], TransitionTarget::Close, ts(at), "test")
                .unwrap();
            assert_eq!(n, 1);
        }

        let obs = get_observation(&conn, id).unwrap().unwrap();
        assert_eq!(obs.status, Status::Closed);
        assert_eq!(obs.closed_at, Some(ts("2025-01-03 10:00:00")));

        let events = events_for_observation(&conn, id).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].data["effective"], false);
        assert_eq!(events[1].data["effective"], true);
    }

    #[test]
    fn test_resurfacing_an_open_observation_leaves_row_untouched() {
        let mut conn = test_db();
        let id = insert_observation(
            &conn,
            &new_obs("Crane telemetry gaps", 7, Criticality::Vital),
            ts("2025-01-01 09:00:00"),
            "test",
        )
        .unwrap();

        transition_observations(
            &mut conn,
            &[id],
            TransitionTarget::Resurface,
            ts("2025-01-12 08:00:00"),
            "test",
        )
        .unwrap();

        let obs = get_observation(&conn, id).unwrap().unwrap();
        assert_eq!(obs.status, Status::Open);
        assert_eq!(obs.resurfaced_at, None);
        assert_eq!(pending_count(&conn).unwrap(), 1);

        let events = events_for_observation(&conn, id).unwrap();
        assert_eq!(events[0].event_type, "observation_resurfaced");
        assert_eq!(events[0].data["effective"], false);
    }

    #[test]
    fn test_transition_empty_ids_is_validation_error() {
        let mut conn = test_db();
        let result = transition_observations(
            &mut conn,
            &[],
            TransitionTarget::Close,
            ts("2025-01-05 10:00:00"),
            "test",
        );
        assert!(matches!(result, Err(ObservationError::Validation(_))));
    }

    #[test]
    fn test_transition_skips_unknown_and_duplicate_ids() {
        let mut conn = test_db();
        let id = insert_observation(
            &conn,
            &new_obs("Booking screen freeze", 12, Criticality::Essential),
            ts("2025-01-01 09:00:00"),
            "test",
        )
        .unwrap();

        let n = transition_observations(
            &mut conn,
            &[id, id, 4242],
            TransitionTarget::Close,
            ts("2025-01-02 09:00:00"),
            "test",
        )
        .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_transition_batch_is_atomic() {
        let mut conn = test_db();
        let at = ts("2025-01-01 09:00:00");
        let first = insert_observation(&conn, &new_obs("first", 1, Criticality::Vital), at, "test")
            .unwrap();
        let second = insert_observation(&conn, &new_obs("second", 1, Criticality::Vital), at, "test")
            .unwrap();

        // Fail the batch on the second row
        conn.execute_batch(&format!(
            "CREATE TRIGGER block_second BEFORE UPDATE ON observations
             WHEN OLD.id = {}
             BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
            second
        ))
        .unwrap();

        let result = transition_observations(
            &mut conn,
            &[first, second],
            TransitionTarget::Close,
            ts("2025-01-02 09:00:00"),
            "test",
        );
        assert!(matches!(result, Err(ObservationError::Store(_))));

        let obs = get_observation(&conn, first).unwrap().unwrap();
        assert_eq!(obs.status, Status::Open, "first row rolled back");
        assert_eq!(events_for_observation(&conn, first).unwrap().len(), 1);
    }

    #[test]
    fn test_pending_count_and_module_listings() {
        let mut conn = test_db();
        let at = ts("2025-01-01 09:00:00");
        let a = insert_observation(&conn, &new_obs("a", 2, Criticality::Vital), at, "test").unwrap();
        let b = insert_observation(&conn, &new_obs("b", 2, Criticality::Desirable), ts("2025-01-02 09:00:00"), "test").unwrap();
        let c = insert_observation(&conn, &new_obs("c", 2, Criticality::Essential), at, "test").unwrap();

        transition_observations(&mut conn, &[c], TransitionTarget::Close, ts("2025-01-03 09:00:00"), "test")
            .unwrap();

        assert_eq!(pending_count(&conn).unwrap(), 2);

        let open: Vec<i64> = open_or_resurfaced_for_module(&conn, 2)
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(open, vec![b, a], "newest first");

        let closed: Vec<i64> = closed_for_module(&conn, 2).unwrap().iter().map(|o| o.id).collect();
        assert_eq!(closed, vec![c]);
    }

    #[test]
    fn test_vital_snapshot_filters_criticality_and_time() {
        let conn = test_db();
        insert_observation(&conn, &new_obs("v1", 1, Criticality::Vital), ts("2025-01-01 09:00:00"), "test").unwrap();
        insert_observation(&conn, &new_obs("e1", 1, Criticality::Essential), ts("2025-01-01 09:00:00"), "test").unwrap();
        insert_observation(&conn, &new_obs("v2", 1, Criticality::Vital), ts("2025-02-01 09:00:00"), "test").unwrap();

        let snapshot = load_vital_snapshot(&conn, ts("2025-01-31 23:59:59")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text, "v1");
    }

    #[test]
    fn test_observations_in_range_ordering() {
        let conn = test_db();
        let day = ts("2025-03-10 08:00:00");
        // HR (group 1): one pending in SWM (module 1)
        insert_observation(&conn, &new_obs("hr-1", 1, Criticality::Desirable), day, "test").unwrap();
        // Refit (group 2): two pending in DL (module 5), one in RPP (module 4)
        insert_observation(&conn, &new_obs("dl-1", 5, Criticality::Vital), day, "test").unwrap();
        insert_observation(&conn, &new_obs("dl-2", 5, Criticality::Essential), ts("2025-03-11 08:00:00"), "test").unwrap();
        insert_observation(&conn, &new_obs("rpp-1", 4, Criticality::Vital), day, "test").unwrap();
        // Outside range
        insert_observation(&conn, &new_obs("old", 1, Criticality::Vital), ts("2025-02-01 08:00:00"), "test").unwrap();

        let period = ReportPeriod::parse(Some("2025-03-01"), Some("2025-03-31")).unwrap();
        let listed = observations_in_range(&conn, &period).unwrap();
        let texts: Vec<&str> = listed.iter().map(|o| o.observation.as_str()).collect();

        assert_eq!(texts, vec!["dl-2", "dl-1", "rpp-1", "hr-1"]);
        assert_eq!(listed[0].module_pending, 2);
        assert_eq!(listed[0].group_name, "Refit Modules");
        assert_eq!(listed[3].module_pending, 2, "SWM counts the out-of-range pending one too");
    }

    #[test]
    fn test_daily_counts() {
        let conn = test_db();
        insert_observation(&conn, &new_obs("a", 1, Criticality::Vital), ts("2025-01-01 09:00:00"), "test").unwrap();
        insert_observation(&conn, &new_obs("b", 1, Criticality::Vital), ts("2025-01-01 10:00:00"), "test").unwrap();
        insert_observation(&conn, &new_obs("c", 2, Criticality::Desirable), ts("2025-01-02 10:00:00"), "test").unwrap();
        insert_observation(&conn, &new_obs("d", 2, Criticality::Vital), ts("2024-12-01 10:00:00"), "test").unwrap();

        let since = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let by_crit = daily_criticality_counts(&conn, since).unwrap();
        assert_eq!(by_crit.len(), 2);
        assert_eq!(by_crit[0], (since, Criticality::Vital, 2));

        let by_module = daily_vital_module_counts(&conn, since).unwrap();
        assert_eq!(by_module, vec![(since, "Salary & Wages Module (SWM)".to_string(), 2)]);
    }
}
