//! 账本镜像：只读快照源
//!
//! 真实链上查询客户端不在本引擎范围内；这里定义消费契约 LedgerMirror，
//! 并提供 InMemoryLedger（可播种，测试与演示共用）。镜像给出的是快照，
//! 引擎自身从不向镜像写入。

use std::sync::RwLock;

use crate::core::LedgerError;
use crate::model::{Campaign, Donation};

/// 账本镜像契约：列出活动、列出某活动的捐赠
///
/// 两个操作都是阻塞单次调用；失败以 LedgerError 上抛，空结果是合法的。
pub trait LedgerMirror: Send + Sync {
    fn list_campaigns(&self) -> Result<Vec<Campaign>, LedgerError>;

    fn list_donations(&self, campaign_id: u64) -> Result<Vec<Donation>, LedgerError>;
}

/// 内存镜像：持有一份可替换的快照
#[derive(Default)]
pub struct InMemoryLedger {
    campaigns: RwLock<Vec<Campaign>>,
    donations: RwLock<Vec<Donation>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换活动快照（保留既有捐赠）
    pub fn set_campaigns(&self, campaigns: Vec<Campaign>) {
        *self.campaigns.write().unwrap() = campaigns;
    }

    /// 追加一笔捐赠到快照
    pub fn push_donation(&self, donation: Donation) {
        self.donations.write().unwrap().push(donation);
    }
}

impl LedgerMirror for InMemoryLedger {
    fn list_campaigns(&self) -> Result<Vec<Campaign>, LedgerError> {
        Ok(self.campaigns.read().unwrap().clone())
    }

    fn list_donations(&self, campaign_id: u64) -> Result<Vec<Donation>, LedgerError> {
        Ok(self
            .donations
            .read()
            .unwrap()
            .iter()
            .filter(|d| d.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}
