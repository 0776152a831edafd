use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use rusqlite::{Connection, OptionalExtension as _, params};

use super::{SwapRecord, SwapStatus};

/// Key-value store of swap records for one direction, keyed by swap id.
pub trait SwapStorage: Send {
    /// Inserts or replaces the record with the same swap id.
    fn save(&mut self, record: &SwapRecord) -> Result<()>;

    fn get(&self, swap_id: &str) -> Result<Option<SwapRecord>>;

    fn update_status(&mut self, swap_id: &str, status: SwapStatus) -> Result<()>;

    /// All records in insertion order.
    fn list(&self) -> Result<Vec<SwapRecord>>;
}

/// SQLite-backed store. Several namespaces (one per direction) can share one database file.
#[derive(Debug)]
pub struct SqliteSwapStore {
    conn: Connection,
    path: PathBuf,
    namespace: String,
}

impl SqliteSwapStore {
    pub fn open(path: PathBuf, namespace: &str) -> Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create swap store dir {}", dir.display()))?;
        }

        let conn =
            Connection::open(&path).with_context(|| format!("open sqlite {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set sqlite busy_timeout")?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("configure sqlite pragmas")?;

        migrate(&conn).context("migrate sqlite schema")?;

        Ok(Self {
            conn,
            path,
            namespace: namespace.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl SwapStorage for SqliteSwapStore {
    fn save(&mut self, record: &SwapRecord) -> Result<()> {
        let json = serde_json::to_string(record)
            .with_context(|| format!("encode swap {}", record.swap_id))?;
        self.conn
            .execute(
                r#"
INSERT INTO swaps (namespace, swap_id, status, record_json)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(namespace, swap_id) DO UPDATE SET
  status = excluded.status,
  record_json = excluded.record_json
"#,
                params![
                    &self.namespace,
                    &record.swap_id,
                    record.status.as_str(),
                    json,
                ],
            )
            .with_context(|| format!("save swap {}", record.swap_id))?;
        Ok(())
    }

    fn get(&self, swap_id: &str) -> Result<Option<SwapRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT status, record_json FROM swaps WHERE namespace = ?1 AND swap_id = ?2",
                params![&self.namespace, swap_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .with_context(|| format!("get swap {swap_id}"))?;

        row.map(|(status, json)| decode_row(&status, &json)).transpose()
    }

    fn update_status(&mut self, swap_id: &str, status: SwapStatus) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE swaps SET status = ?3 WHERE namespace = ?1 AND swap_id = ?2",
                params![&self.namespace, swap_id, status.as_str()],
            )
            .with_context(|| format!("update swap status {swap_id}"))?;
        anyhow::ensure!(rows == 1, "swap not found: {swap_id}");
        Ok(())
    }

    fn list(&self) -> Result<Vec<SwapRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT status, record_json FROM swaps WHERE namespace = ?1 ORDER BY rowid",
            )
            .context("prepare list swaps")?;

        let rows = stmt
            .query_map(params![&self.namespace], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("query list swaps")?;

        let mut out = Vec::new();
        for row in rows {
            let (status, json) = row.context("read swap row")?;
            out.push(decode_row(&status, &json)?);
        }
        Ok(out)
    }
}

/// The status column is authoritative; `update_status` does not rewrite the JSON.
fn decode_row(status: &str, json: &str) -> Result<SwapRecord> {
    let mut record: SwapRecord = serde_json::from_str(json).context("decode swap record")?;
    record.status = status_from_str(status)?;
    Ok(record)
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS swaps (
  namespace TEXT NOT NULL,
  swap_id TEXT NOT NULL,
  status TEXT NOT NULL,
  record_json TEXT NOT NULL,
  PRIMARY KEY (namespace, swap_id)
);
CREATE INDEX IF NOT EXISTS swaps_status_idx ON swaps(namespace, status);
"#,
    )
    .context("create tables")?;
    Ok(())
}

fn status_from_str(s: &str) -> Result<SwapStatus> {
    match s {
        "created" => Ok(SwapStatus::Created),
        "locked" => Ok(SwapStatus::Locked),
        "claimed" => Ok(SwapStatus::Claimed),
        "refundable" => Ok(SwapStatus::Refundable),
        "refunded" => Ok(SwapStatus::Refunded),
        "failed" => Ok(SwapStatus::Failed),
        other => anyhow::bail!("unknown swap status: {other}"),
    }
}

/// Process-local store; records are lost on restart.
#[derive(Debug, Default)]
pub struct MemorySwapStore {
    records: Vec<SwapRecord>,
}

impl MemorySwapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SwapStorage for MemorySwapStore {
    fn save(&mut self, record: &SwapRecord) -> Result<()> {
        match self.records.iter_mut().find(|r| r.swap_id == record.swap_id) {
            Some(existing) => *existing = record.clone(),
            None => self.records.push(record.clone()),
        }
        Ok(())
    }

    fn get(&self, swap_id: &str) -> Result<Option<SwapRecord>> {
        Ok(self.records.iter().find(|r| r.swap_id == swap_id).cloned())
    }

    fn update_status(&mut self, swap_id: &str, status: SwapStatus) -> Result<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.swap_id == swap_id)
            .with_context(|| format!("swap not found: {swap_id}"))?;
        record.status = status;
        Ok(())
    }

    fn list(&self) -> Result<Vec<SwapRecord>> {
        Ok(self.records.clone())
    }
}
