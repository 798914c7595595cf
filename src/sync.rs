//! 同步器：把账本镜像快照刷入存储
//!
//! 活动按 id upsert；捐赠先过进程内指纹集再插入，重复（指纹命中或存储唯一键
//! 拒绝）静默跳过。单个活动的捐赠抓取/落库失败只记日志、不影响其它活动；
//! 镜像整体抓取失败才让本次同步失败。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::core::{LedgerError, StoreError};
use crate::ledger::LedgerMirror;
use crate::model::{Donation, SyncReport};
use crate::store::Store;

/// 捐赠去重指纹：(campaign_id, donor, amount, timestamp)
type Fingerprint = (u64, String, i64, i64);

fn fingerprint(d: &Donation) -> Fingerprint {
    (d.campaign_id, d.donor.clone(), d.amount, d.timestamp)
}

/// 账本 -> 存储 同步器
///
/// 指纹集仅存活于进程生命周期；重启后由存储的唯一键兜底，不会重复入库。
pub struct Synchronizer {
    ledger: Arc<dyn LedgerMirror>,
    store: Arc<dyn Store>,
    seen: Mutex<HashSet<Fingerprint>>,
}

impl Synchronizer {
    pub fn new(ledger: Arc<dyn LedgerMirror>, store: Arc<dyn Store>) -> Self {
        Self {
            ledger,
            store,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// 全量同步：活动 + 各活动的新捐赠，返回计数
    pub fn sync_all(&self) -> Result<SyncReport, LedgerError> {
        let campaigns = self.ledger.list_campaigns()?;
        let mut report = SyncReport::default();

        for campaign in &campaigns {
            if let Err(e) = self.store.upsert_campaign(campaign) {
                tracing::warn!("Campaign sync error for campaign {}: {}", campaign.id, e);
                continue;
            }
            report.campaigns_synced += 1;
        }

        for campaign in &campaigns {
            match self.sync_donations(campaign.id) {
                Ok(n) => report.new_donations_synced += n,
                Err(e) => {
                    tracing::warn!("Donation sync error for campaign {}: {}", campaign.id, e);
                }
            }
        }

        tracing::info!(
            "Full sync complete: {} campaigns, {} new donations",
            report.campaigns_synced,
            report.new_donations_synced
        );
        Ok(report)
    }

    /// 同步单个活动的捐赠，返回新入库条数
    fn sync_donations(&self, campaign_id: u64) -> Result<usize, LedgerError> {
        let donations = self.ledger.list_donations(campaign_id)?;
        let mut inserted = 0;

        for donation in donations {
            let key = fingerprint(&donation);
            if self.seen.lock().unwrap().contains(&key) {
                continue;
            }
            match self.store.insert_donation(&donation) {
                Ok(()) => {
                    self.seen.lock().unwrap().insert(key);
                    inserted += 1;
                }
                // 存储端判重：视为已同步，记指纹后跳过
                Err(StoreError::Duplicate(_)) => {
                    self.seen.lock().unwrap().insert(key);
                }
                Err(e) => {
                    tracing::warn!(
                        "Donation insert error for campaign {}: {}",
                        campaign_id,
                        e
                    );
                }
            }
        }
        Ok(inserted)
    }
}
