use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub mod export;
pub mod models;
use models::*;

use crate::pipeline::{MetricResult, ResultsSummary};

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Runs ──────────────────────────────────────────────────────────────────

    /// Insert a run and return its id
    pub fn insert_run(&self, run: &RunRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO runs (
                started_at, finished_at, data_source, window_secs,
                matches, failed_matches, events, players_with_baseline
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                run.started_at,
                run.finished_at,
                run.data_source,
                run.window_secs,
                run.matches,
                run.failed_matches,
                run.events,
                run.players_with_baseline,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent run, if any
    pub fn latest_run(&self) -> Result<Option<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, data_source, window_secs,
                        matches, failed_matches, events, players_with_baseline
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                map_run,
            )
            .optional()?;
        Ok(run)
    }

    /// List runs, newest first
    pub fn list_runs(&self, limit: i64) -> Result<Vec<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, data_source, window_secs,
                    matches, failed_matches, events, players_with_baseline
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit], map_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    // ── Metric results ────────────────────────────────────────────────────────

    /// Insert all results of a run in one transaction
    pub fn insert_results(&self, run_id: i64, results: &[MetricResult]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO metric_results (
                    run_id, event_id, match_id, match_name, category, weight,
                    timestamp, period, player_id, player_name, team_id, team_name,
                    is_home, window_secs, crt, tsi, giri
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
            )?;
            for r in results {
                stmt.execute(params![
                    run_id,
                    r.event_id,
                    r.match_id,
                    r.match_name,
                    r.category.as_str(),
                    r.weight,
                    r.timestamp,
                    r.period,
                    r.player_id,
                    r.player_name,
                    r.team_id,
                    r.team_name,
                    r.is_home,
                    r.window_secs,
                    r.crt,
                    r.tsi,
                    r.giri,
                ])?;
            }
        }
        tx.commit()?;
        Ok(results.len())
    }

    /// List a run's results in evaluation order (paginated, optionally by category).
    /// A negative `limit` returns every row.
    pub fn list_results(
        &self,
        run_id: i64,
        limit: i64,
        offset: i64,
        category: Option<&str>,
    ) -> Result<Vec<MetricResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT event_id, match_id, match_name, category, weight,
                    timestamp, period, player_id, player_name, team_id, team_name,
                    is_home, window_secs, crt, tsi, giri
             FROM metric_results
             WHERE run_id = ?1 AND (?2 IS NULL OR category = ?2)
             ORDER BY id LIMIT ?3 OFFSET ?4",
        )?;
        let results = stmt
            .query_map(params![run_id, category, limit, offset], map_result)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    /// Results summary recomputed from a stored run
    pub fn run_summary(&self, run_id: i64) -> Result<ResultsSummary> {
        let results = self.list_results(run_id, -1, 0, None)?;
        Ok(ResultsSummary::from_results(&results))
    }

    /// Per-player event counts and mean metrics for a run, most events first
    pub fn player_aggregates(&self, run_id: i64) -> Result<Vec<PlayerAggregate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT player_id, MAX(player_name), MAX(team_name), COUNT(*),
                    COALESCE(SUM(weight), 0), AVG(crt), AVG(tsi), AVG(giri)
             FROM metric_results
             WHERE run_id = ?1 AND player_id IS NOT NULL
             GROUP BY player_id
             ORDER BY COUNT(*) DESC, player_id",
        )?;
        let players = stmt
            .query_map(params![run_id], |row| {
                Ok(PlayerAggregate {
                    player_id: row.get(0)?,
                    player_name: row.get(1)?,
                    team_name: row.get(2)?,
                    events: row.get(3)?,
                    total_weight: row.get(4)?,
                    mean_crt: row.get(5)?,
                    mean_tsi: row.get(6)?,
                    mean_giri: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_run(row: &rusqlite::Row) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        data_source: row.get(3)?,
        window_secs: row.get(4)?,
        matches: row.get(5)?,
        failed_matches: row.get(6)?,
        events: row.get(7)?,
        players_with_baseline: row.get(8)?,
    })
}

fn map_result(row: &rusqlite::Row) -> rusqlite::Result<MetricResult> {
    let category: String = row.get(3)?;
    let category = category.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(MetricResult {
        event_id: row.get(0)?,
        match_id: row.get(1)?,
        match_name: row.get(2)?,
        category,
        weight: row.get(4)?,
        timestamp: row.get(5)?,
        period: row.get(6)?,
        player_id: row.get(7)?,
        player_name: row.get(8)?,
        team_id: row.get(9)?,
        team_name: row.get(10)?,
        is_home: row.get(11)?,
        window_secs: row.get(12)?,
        crt: row.get(13)?,
        tsi: row.get(14)?,
        giri: row.get(15)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at            TEXT    NOT NULL,
    finished_at           TEXT    NOT NULL,
    data_source           TEXT    NOT NULL,
    window_secs           REAL    NOT NULL,
    matches               INTEGER NOT NULL,
    failed_matches        INTEGER NOT NULL DEFAULT 0,
    events                INTEGER NOT NULL,
    players_with_baseline INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS metric_results (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id      INTEGER NOT NULL,
    event_id    TEXT    NOT NULL,
    match_id    TEXT    NOT NULL,
    match_name  TEXT    NOT NULL,
    category    TEXT    NOT NULL,
    weight      REAL    NOT NULL,
    timestamp   REAL    NOT NULL,
    period      INTEGER,
    player_id   INTEGER,
    player_name TEXT,
    team_id     INTEGER,
    team_name   TEXT,
    is_home     INTEGER NOT NULL,
    window_secs REAL    NOT NULL,
    crt         REAL,
    tsi         REAL,
    giri        REAL,
    FOREIGN KEY (run_id) REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_metric_results_run ON metric_results(run_id);
CREATE INDEX IF NOT EXISTS idx_metric_results_category ON metric_results(run_id, category);
CREATE INDEX IF NOT EXISTS idx_metric_results_player ON metric_results(run_id, player_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EventCategory;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r3act.db");
        let db = Database::open(path.to_str().unwrap()).unwrap();
        (dir, db)
    }

    fn run(events: i64) -> RunRecord {
        RunRecord {
            id: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            data_source: "local".into(),
            window_secs: 300.0,
            matches: 2,
            failed_matches: 1,
            events,
            players_with_baseline: 40,
        }
    }

    fn result(event_id: &str, player: Option<i64>, category: EventCategory, crt: Option<f64>) -> MetricResult {
        MetricResult {
            event_id: event_id.into(),
            match_id: "1886347".into(),
            match_name: "Auckland FC vs Newcastle Jets".into(),
            category,
            weight: 0.1,
            timestamp: 61.5,
            period: Some(1),
            player_id: player,
            player_name: player.map(|p| format!("P{}", p)),
            team_id: Some(4177),
            team_name: Some("Auckland FC".into()),
            is_home: true,
            window_secs: 300.0,
            crt,
            tsi: Some(0.25),
            giri: None,
        }
    }

    #[test]
    fn results_round_trip_in_order() {
        let (_dir, db) = open_temp();
        let run_id = db.insert_run(&run(3)).unwrap();
        let results = vec![
            result("3", Some(7), EventCategory::GoalScored, Some(12.0)),
            result("1", Some(7), EventCategory::FailedPassOffside, None),
            result("2", None, EventCategory::GoalScored, Some(30.0)),
        ];
        assert_eq!(db.insert_results(run_id, &results).unwrap(), 3);

        assert_eq!(db.list_results(run_id, -1, 0, None).unwrap(), results);
        let page = db.list_results(run_id, 1, 1, None).unwrap();
        assert_eq!(page[0].event_id, "1");
        let goals = db.list_results(run_id, 50, 0, Some("goal_scored")).unwrap();
        assert_eq!(goals.len(), 2);
        assert!(db.list_results(run_id + 1, 50, 0, None).unwrap().is_empty());
    }

    #[test]
    fn latest_run_and_listing() {
        let (_dir, db) = open_temp();
        assert!(db.latest_run().unwrap().is_none());
        db.insert_run(&run(1)).unwrap();
        let second = db.insert_run(&run(5)).unwrap();
        let latest = db.latest_run().unwrap().unwrap();
        assert_eq!(latest.id, Some(second));
        assert_eq!(latest.events, 5);
        assert_eq!(db.list_runs(10).unwrap().len(), 2);
    }

    #[test]
    fn player_aggregates_ignore_nulls() {
        let (_dir, db) = open_temp();
        let run_id = db.insert_run(&run(3)).unwrap();
        db.insert_results(
            run_id,
            &[
                result("1", Some(7), EventCategory::GoalScored, Some(10.0)),
                result("2", Some(7), EventCategory::GoalScored, None),
                result("3", Some(8), EventCategory::GoalConceded, None),
                result("4", None, EventCategory::GoalConceded, Some(1.0)),
            ],
        )
        .unwrap();
        let players = db.player_aggregates(run_id).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].player_id, 7);
        assert_eq!(players[0].events, 2);
        assert_relative_eq!(players[0].total_weight, 0.2, epsilon = 1e-12);
        assert_relative_eq!(players[0].mean_crt.unwrap(), 10.0);
        assert_eq!(players[1].mean_crt, None);

        let summary = db.run_summary(run_id).unwrap();
        assert_eq!(summary.total_events, 4);
        assert_eq!(summary.crt.unwrap().count, 2);
    }
}
