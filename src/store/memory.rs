//! 内存存储：未配置数据库时的回退实现
//!
//! 所有表放在一把 RwLock 后面；写路径短，无阻塞 IO，锁竞争可忽略。

use std::sync::RwLock;

use crate::core::StoreError;
use crate::model::{
    ActionLogEntry, AnalyticsRecord, Campaign, CampaignStatus, Donation, FraudFlag,
};
use crate::store::Store;

#[derive(Default)]
struct Tables {
    campaigns: Vec<Campaign>,
    donations: Vec<Donation>,
    action_logs: Vec<ActionLogEntry>,
    fraud_flags: Vec<FraudFlag>,
    analytics: Vec<AnalyticsRecord>,
}

/// 进程内存储；进程退出即丢失
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn upsert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let mut t = self.tables.write().unwrap();
        match t.campaigns.iter_mut().find(|c| c.id == campaign.id) {
            Some(existing) => *existing = campaign.clone(),
            None => t.campaigns.push(campaign.clone()),
        }
        Ok(())
    }

    fn update_campaign_status(&self, id: u64, status: CampaignStatus) -> Result<(), StoreError> {
        let mut t = self.tables.write().unwrap();
        if let Some(c) = t.campaigns.iter_mut().find(|c| c.id == id) {
            c.status = status;
        }
        Ok(())
    }

    fn insert_donation(&self, donation: &Donation) -> Result<(), StoreError> {
        let mut t = self.tables.write().unwrap();
        let exists = t.donations.iter().any(|d| {
            d.campaign_id == donation.campaign_id
                && d.donor == donation.donor
                && d.amount == donation.amount
                && d.timestamp == donation.timestamp
        });
        if exists {
            return Err(StoreError::Duplicate(format!(
                "donation {}-{}-{}-{}",
                donation.campaign_id, donation.donor, donation.amount, donation.timestamp
            )));
        }
        t.donations.push(donation.clone());
        Ok(())
    }

    fn append_action_log(&self, entry: &ActionLogEntry) -> Result<(), StoreError> {
        self.tables.write().unwrap().action_logs.push(entry.clone());
        Ok(())
    }

    fn append_fraud_flag(&self, flag: &FraudFlag) -> Result<(), StoreError> {
        self.tables.write().unwrap().fraud_flags.push(flag.clone());
        Ok(())
    }

    fn upsert_analytics(&self, record: &AnalyticsRecord) -> Result<(), StoreError> {
        let mut t = self.tables.write().unwrap();
        match t
            .analytics
            .iter_mut()
            .find(|r| r.campaign_id == record.campaign_id)
        {
            Some(existing) => *existing = record.clone(),
            None => t.analytics.push(record.clone()),
        }
        Ok(())
    }

    fn list_campaigns(&self) -> Result<Vec<Campaign>, StoreError> {
        Ok(self.tables.read().unwrap().campaigns.clone())
    }

    fn list_donations(&self, campaign_id: u64) -> Result<Vec<Donation>, StoreError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .donations
            .iter()
            .filter(|d| d.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    fn list_all_donations(&self) -> Result<Vec<Donation>, StoreError> {
        Ok(self.tables.read().unwrap().donations.clone())
    }

    fn recent_action_logs(&self, limit: usize) -> Result<Vec<ActionLogEntry>, StoreError> {
        let t = self.tables.read().unwrap();
        Ok(t.action_logs.iter().rev().take(limit).cloned().collect())
    }

    fn unresolved_fraud_flags(&self) -> Result<Vec<FraudFlag>, StoreError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .fraud_flags
            .iter()
            .filter(|f| !f.resolved)
            .cloned()
            .collect())
    }

    fn analytics_for(&self, campaign_id: u64) -> Result<Option<AnalyticsRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .unwrap()
            .analytics
            .iter()
            .find(|r| r.campaign_id == campaign_id)
            .cloned())
    }
}
