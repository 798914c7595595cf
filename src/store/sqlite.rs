//! SQLite 存储实现
//!
//! 单连接 + Mutex；捐赠表以 (campaign_id, donor, amount, timestamp) 唯一键
//! 承接重复插入（映射为 StoreError::Duplicate），analytics 表以 campaign_id
//! 为主键做 ON CONFLICT 覆盖。时间戳以 RFC3339 文本落库。

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};

use crate::core::StoreError;
use crate::model::{
    ActionLogEntry, AnalyticsRecord, Campaign, CampaignStatus, Donation, FraudFlag, Severity,
};
use crate::store::Store;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS campaigns (
    id            INTEGER PRIMARY KEY,
    creator       TEXT NOT NULL,
    title         TEXT NOT NULL,
    target_amount INTEGER NOT NULL,
    total_donated INTEGER NOT NULL,
    status        TEXT NOT NULL,
    end_time      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS donations (
    campaign_id INTEGER NOT NULL,
    donor       TEXT NOT NULL,
    amount      INTEGER NOT NULL,
    timestamp   INTEGER NOT NULL,
    UNIQUE (campaign_id, donor, amount, timestamp)
);
CREATE TABLE IF NOT EXISTS agent_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_name  TEXT NOT NULL,
    action_taken TEXT NOT NULL,
    campaign_id INTEGER,
    metadata    TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS fraud_flags (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    wallet     TEXT NOT NULL,
    reason     TEXT NOT NULL,
    severity   TEXT NOT NULL,
    resolved   INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS analytics (
    campaign_id         INTEGER PRIMARY KEY,
    health_score        INTEGER NOT NULL,
    trending_score      INTEGER NOT NULL,
    top_donor           TEXT,
    top_donation_amount INTEGER NOT NULL,
    total_donors        INTEGER NOT NULL,
    avg_donation        INTEGER NOT NULL
);
";

/// SQLite 持久化存储
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// 打开（必要时创建）数据库文件并建表
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(map_err)?;
        conn.execute_batch(SCHEMA).map_err(map_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 内存数据库（测试用，与文件版走同一套 SQL）
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_err)?;
        conn.execute_batch(SCHEMA).map_err(map_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// 唯一键冲突映射为 Duplicate，其余归为 Backend
fn map_err(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == ErrorCode::ConstraintViolation {
            return StoreError::Duplicate(e.to_string());
        }
    }
    StoreError::Backend(e.to_string())
}

fn parse_created_at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        _ => Severity::Medium,
    }
}

impl Store for SqliteStore {
    fn upsert_campaign(&self, c: &Campaign) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO campaigns (id, creator, title, target_amount, total_donated, status, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 creator = excluded.creator,
                 title = excluded.title,
                 target_amount = excluded.target_amount,
                 total_donated = excluded.total_donated,
                 status = excluded.status,
                 end_time = excluded.end_time",
            params![
                c.id,
                c.creator,
                c.title,
                c.target_amount,
                c.total_donated,
                c.status.as_str(),
                c.end_time
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn update_campaign_status(&self, id: u64, status: CampaignStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE campaigns SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn insert_donation(&self, d: &Donation) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO donations (campaign_id, donor, amount, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![d.campaign_id, d.donor, d.amount, d.timestamp],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn append_action_log(&self, entry: &ActionLogEntry) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_logs (agent_name, action_taken, campaign_id, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.agent_name,
                entry.action_taken,
                entry.campaign_id,
                metadata,
                entry.created_at.to_rfc3339()
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn append_fraud_flag(&self, flag: &FraudFlag) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO fraud_flags (wallet, reason, severity, resolved, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                flag.wallet,
                flag.reason,
                flag.severity.as_str(),
                flag.resolved as i64,
                flag.created_at.to_rfc3339()
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn upsert_analytics(&self, r: &AnalyticsRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO analytics (campaign_id, health_score, trending_score, top_donor,
                                    top_donation_amount, total_donors, avg_donation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(campaign_id) DO UPDATE SET
                 health_score = excluded.health_score,
                 trending_score = excluded.trending_score,
                 top_donor = excluded.top_donor,
                 top_donation_amount = excluded.top_donation_amount,
                 total_donors = excluded.total_donors,
                 avg_donation = excluded.avg_donation",
            params![
                r.campaign_id,
                r.health_score,
                r.trending_score,
                r.top_donor,
                r.top_donation_amount,
                r.total_donors as i64,
                r.avg_donation
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    fn list_campaigns(&self) -> Result<Vec<Campaign>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, creator, title, target_amount, total_donated, status, end_time
                 FROM campaigns ORDER BY id",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Campaign {
                    id: row.get(0)?,
                    creator: row.get(1)?,
                    title: row.get(2)?,
                    target_amount: row.get(3)?,
                    total_donated: row.get(4)?,
                    status: CampaignStatus::parse(&row.get::<_, String>(5)?),
                    end_time: row.get(6)?,
                })
            })
            .map_err(map_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_err)
    }

    fn list_donations(&self, campaign_id: u64) -> Result<Vec<Donation>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT donor, campaign_id, amount, timestamp FROM donations
                 WHERE campaign_id = ?1 ORDER BY timestamp",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map([campaign_id], |row| {
                Ok(Donation {
                    donor: row.get(0)?,
                    campaign_id: row.get(1)?,
                    amount: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            })
            .map_err(map_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_err)
    }

    fn list_all_donations(&self) -> Result<Vec<Donation>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT donor, campaign_id, amount, timestamp FROM donations ORDER BY timestamp")
            .map_err(map_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Donation {
                    donor: row.get(0)?,
                    campaign_id: row.get(1)?,
                    amount: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            })
            .map_err(map_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_err)
    }

    fn recent_action_logs(&self, limit: usize) -> Result<Vec<ActionLogEntry>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT agent_name, action_taken, campaign_id, metadata, created_at
                 FROM agent_logs ORDER BY id DESC LIMIT ?1",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                let metadata: String = row.get(3)?;
                let created_at: String = row.get(4)?;
                Ok(ActionLogEntry {
                    agent_name: row.get(0)?,
                    action_taken: row.get(1)?,
                    campaign_id: row.get(2)?,
                    metadata: serde_json::from_str(&metadata)
                        .unwrap_or(serde_json::Value::Null),
                    created_at: parse_created_at(&created_at),
                })
            })
            .map_err(map_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_err)
    }

    fn unresolved_fraud_flags(&self) -> Result<Vec<FraudFlag>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT wallet, reason, severity, resolved, created_at
                 FROM fraud_flags WHERE resolved = 0 ORDER BY id",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map([], |row| {
                let severity: String = row.get(2)?;
                let created_at: String = row.get(4)?;
                Ok(FraudFlag {
                    wallet: row.get(0)?,
                    reason: row.get(1)?,
                    severity: parse_severity(&severity),
                    resolved: row.get::<_, i64>(3)? != 0,
                    created_at: parse_created_at(&created_at),
                })
            })
            .map_err(map_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_err)
    }

    fn analytics_for(&self, campaign_id: u64) -> Result<Option<AnalyticsRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT campaign_id, health_score, trending_score, top_donor,
                        top_donation_amount, total_donors, avg_donation
                 FROM analytics WHERE campaign_id = ?1",
            )
            .map_err(map_err)?;
        let mut rows = stmt
            .query_map([campaign_id], |row| {
                Ok(AnalyticsRecord {
                    campaign_id: row.get(0)?,
                    health_score: row.get(1)?,
                    trending_score: row.get(2)?,
                    top_donor: row.get(3)?,
                    top_donation_amount: row.get(4)?,
                    total_donors: row.get::<_, i64>(5)? as usize,
                    avg_donation: row.get(6)?,
                })
            })
            .map_err(map_err)?;
        match rows.next() {
            Some(r) => Ok(Some(r.map_err(map_err)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn donation() -> Donation {
        Donation {
            donor: "GA".into(),
            campaign_id: 1,
            amount: 100,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_duplicate_donation_maps_to_duplicate() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_donation(&donation()).unwrap();
        let err = store.insert_donation(&donation()).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn test_campaign_upsert_and_status_update() {
        let store = SqliteStore::open_in_memory().unwrap();
        let c = Campaign {
            id: 3,
            creator: "G".into(),
            title: "t".into(),
            target_amount: 100,
            total_donated: 100,
            status: CampaignStatus::Open,
            end_time: 0,
        };
        store.upsert_campaign(&c).unwrap();
        store.upsert_campaign(&c).unwrap(); // 二次 upsert 不冲突
        store
            .update_campaign_status(3, CampaignStatus::Funded)
            .unwrap();

        let all = store.list_campaigns().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, CampaignStatus::Funded);
    }

    #[test]
    fn test_action_log_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let entry = ActionLogEntry::new(
            "Analytics",
            "analytics_updated",
            Some(9),
            json!({ "health_score": 70 }),
        );
        store.append_action_log(&entry).unwrap();

        let logs = store.recent_action_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_taken, "analytics_updated");
        assert_eq!(logs[0].campaign_id, Some(9));
        assert_eq!(logs[0].metadata["health_score"], 70);
    }

    #[test]
    fn test_fraud_flag_defaults_unresolved() {
        let store = SqliteStore::open_in_memory().unwrap();
        let flag = FraudFlag::new("GWALLET", "Rapid-fire donations".into(), Severity::Medium);
        store.append_fraud_flag(&flag).unwrap();

        let flags = store.unresolved_fraud_flags().unwrap();
        assert_eq!(flags.len(), 1);
        assert!(!flags[0].resolved);
        assert_eq!(flags[0].severity, Severity::Medium);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");
        let store = SqliteStore::open(&path).unwrap();
        store.insert_donation(&donation()).unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.list_all_donations().unwrap().len(), 1);
    }
}
