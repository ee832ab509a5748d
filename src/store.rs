//! Durable market registry backed by SQLite.
//!
//! Markets are created by the API/CLI and consumed by the resolution worker.
//! `resolved` is terminal: [`MarketStore::mark_resolved`] only flips a
//! pending row, so a market can never be resolved twice and a restart never
//! replays a settled market.

use crate::models::{Market, MarketStatus, MetricType};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::sync::Arc;
use tracing::{debug, info};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS markets (
    market_id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    deadline INTEGER NOT NULL,
    threshold REAL NOT NULL,
    metric_type TEXT NOT NULL DEFAULT 'eth_staking_rate',
    status TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_markets_status
    ON markets(status, deadline);
"#;

const MARKET_COLUMNS: &str =
    "market_id, title, description, deadline, threshold, metric_type, status, created_at";

pub struct MarketStore {
    conn: Arc<Mutex<Connection>>,
}

impl MarketStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize market schema")?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM markets", [], |row| row.get(0))
            .unwrap_or(0);

        info!("📦 Market store ready at {} ({} markets)", db_path, count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Upsert a market. Terms (deadline, threshold, metric) may be amended
    /// while the market is pending; status is left untouched on conflict so a
    /// re-registered market can never drop back from `resolved`.
    pub fn add_market(&self, market: &Market) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO markets (market_id, title, description, deadline, threshold, metric_type, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(market_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                deadline = excluded.deadline,
                threshold = excluded.threshold,
                metric_type = excluded.metric_type",
            params![
                &market.market_id,
                &market.title,
                &market.description,
                market.deadline,
                market.threshold,
                market.metric_type.as_str(),
                market.status.as_str(),
                market.created_at,
            ],
        )?;
        debug!(
            "📝 Market {} registered (metric: {})",
            market.market_id,
            market.metric_type.as_str()
        );
        Ok(())
    }

    pub fn list_pending(&self) -> Result<Vec<Market>> {
        self.list_by_status(MarketStatus::Pending)
    }

    pub fn list_by_status(&self, status: MarketStatus) -> Result<Vec<Market>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MARKET_COLUMNS} FROM markets WHERE status = ?1 ORDER BY deadline"
        ))?;

        let markets = stmt
            .query_map([status.as_str()], Self::row_to_market)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(markets)
    }

    pub fn list_all(&self) -> Result<Vec<Market>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MARKET_COLUMNS} FROM markets ORDER BY deadline"
        ))?;

        let markets = stmt
            .query_map([], Self::row_to_market)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(markets)
    }

    pub fn get(&self, market_id: &str) -> Result<Option<Market>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MARKET_COLUMNS} FROM markets WHERE market_id = ?1"
        ))?;

        let mut rows = stmt.query([market_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        Ok(Some(Self::row_to_market(row)?))
    }

    /// Transition a market to `resolved`. Returns `false` when the market was
    /// missing or already resolved; the transition happens at most once.
    pub fn mark_resolved(&self, market_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE markets SET status = 'resolved' WHERE market_id = ?1 AND status = 'pending'",
            params![market_id],
        )?;
        if changed > 0 {
            info!("✅ Market {} marked as resolved", market_id);
        }
        Ok(changed > 0)
    }

    fn row_to_market(row: &rusqlite::Row) -> rusqlite::Result<Market> {
        let metric_type: String = row.get(5)?;
        let status: String = row.get(6)?;

        Ok(Market {
            market_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            deadline: row.get(3)?,
            threshold: row.get(4)?,
            // Unknown tags settle manually rather than failing the whole scan.
            metric_type: MetricType::parse(&metric_type).unwrap_or(MetricType::Generic),
            status: MarketStatus::parse(&status).unwrap_or(MarketStatus::Pending),
            created_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_market(id: &str, deadline: i64) -> Market {
        Market::new(id.to_string(), deadline, 30.0, MetricType::EthStakingRate)
            .with_title(format!("market {id}"))
    }

    #[test]
    fn add_and_list_pending() {
        let store = MarketStore::new(":memory:").unwrap();
        store.add_market(&test_market("1field", 100)).unwrap();
        store.add_market(&test_market("2field", 50)).unwrap();

        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 2);
        // Ordered by deadline.
        assert_eq!(pending[0].market_id, "2field");
        assert_eq!(pending[1].market_id, "1field");
    }

    #[test]
    fn upsert_amends_terms_without_touching_status() {
        let store = MarketStore::new(":memory:").unwrap();
        store.add_market(&test_market("1field", 100)).unwrap();
        assert!(store.mark_resolved("1field").unwrap());

        let mut amended = test_market("1field", 200);
        amended.threshold = 42.0;
        store.add_market(&amended).unwrap();

        let market = store.get("1field").unwrap().unwrap();
        assert_eq!(market.status, MarketStatus::Resolved);
        assert_eq!(market.deadline, 200);
        assert_eq!(market.threshold, 42.0);
    }

    #[test]
    fn mark_resolved_is_terminal_and_at_most_once() {
        let store = MarketStore::new(":memory:").unwrap();
        store.add_market(&test_market("1field", 100)).unwrap();

        assert!(store.mark_resolved("1field").unwrap());
        assert!(!store.mark_resolved("1field").unwrap());
        assert!(!store.mark_resolved("missingfield").unwrap());

        assert!(store.list_pending().unwrap().is_empty());
        let resolved = store.list_by_status(MarketStatus::Resolved).unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn unknown_metric_tag_falls_back_to_generic() {
        let store = MarketStore::new(":memory:").unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO markets (market_id, deadline, threshold, metric_type, status, created_at)
                 VALUES ('9field', 10, 1.0, 'moon_phase', 'pending', 0)",
                [],
            )
            .unwrap();
        }

        let market = store.get("9field").unwrap().unwrap();
        assert_eq!(market.metric_type, MetricType::Generic);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markets.db");
        let path = path.to_str().unwrap();

        {
            let store = MarketStore::new(path).unwrap();
            store.add_market(&test_market("1field", 100)).unwrap();
            store.mark_resolved("1field").unwrap();
        }

        let store = MarketStore::new(path).unwrap();
        let market = store.get("1field").unwrap().unwrap();
        assert_eq!(market.status, MarketStatus::Resolved);
        assert!(store.list_pending().unwrap().is_empty());
    }
}
