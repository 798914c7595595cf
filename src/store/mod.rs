//! 持久化存储抽象层
//!
//! 定义统一的存储契约 Store，支持内存与 SQLite 两种实现；
//! 未配置数据库路径时回退到内存存储（掉电即失，仅适合开发与测试）。

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::StoreSection;
use crate::core::StoreError;
use crate::model::{
    ActionLogEntry, AnalyticsRecord, Campaign, CampaignStatus, Donation, FraudFlag,
};

/// 存储契约：活动/捐赠/行动日志/欺诈标记/分析结果
///
/// 所有写操作是阻塞单次调用；insert_donation 以 StoreError::Duplicate
/// 拒绝重复键（(campaign_id, donor, amount, timestamp) 唯一）。
pub trait Store: Send + Sync {
    /// 按活动 id upsert（存在则更新，不存在则插入）
    fn upsert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError>;

    fn update_campaign_status(&self, id: u64, status: CampaignStatus) -> Result<(), StoreError>;

    fn insert_donation(&self, donation: &Donation) -> Result<(), StoreError>;

    fn append_action_log(&self, entry: &ActionLogEntry) -> Result<(), StoreError>;

    fn append_fraud_flag(&self, flag: &FraudFlag) -> Result<(), StoreError>;

    /// 按 campaign_id upsert，后写覆盖
    fn upsert_analytics(&self, record: &AnalyticsRecord) -> Result<(), StoreError>;

    fn list_campaigns(&self) -> Result<Vec<Campaign>, StoreError>;

    fn list_donations(&self, campaign_id: u64) -> Result<Vec<Donation>, StoreError>;

    fn list_all_donations(&self) -> Result<Vec<Donation>, StoreError>;

    // 以下回读查询供外围 HTTP 层使用

    fn recent_action_logs(&self, limit: usize) -> Result<Vec<ActionLogEntry>, StoreError>;

    fn unresolved_fraud_flags(&self) -> Result<Vec<FraudFlag>, StoreError>;

    fn analytics_for(&self, campaign_id: u64) -> Result<Option<AnalyticsRecord>, StoreError>;
}

/// 按配置打开存储：有 sqlite_path 走 SQLite，否则回退内存
pub fn open_store(cfg: &StoreSection) -> anyhow::Result<Arc<dyn Store>> {
    match &cfg.sqlite_path {
        Some(path) => {
            let store = SqliteStore::open(path)?;
            tracing::info!("SQLite store opened at {}", path.display());
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("No sqlite_path configured, using in-memory fallback storage");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
