//! 生命周期守卫：Open 活动的状态迁移
//!
//! 达标（total_donated >= target_amount 且目标 > 0）置 Funded，
//! 否则过期（end_time > 0 且已过）置 Expired；达标检查优先，
//! 每个活动每轮至多一次迁移。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::agents::Agent;
use crate::core::AgentError;
use crate::model::{ActionLogEntry, CampaignStatus, RunResult};
use crate::store::Store;

pub const AGENT_NAME: &str = "CampaignGuardian";

pub struct LifecycleGuardian {
    store: Arc<dyn Store>,
}

impl LifecycleGuardian {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Agent for LifecycleGuardian {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    async fn run(&self) -> Result<RunResult, AgentError> {
        let campaigns = self.store.list_campaigns()?;
        let now = Utc::now().timestamp();
        let mut actions = Vec::new();

        for campaign in campaigns {
            if campaign.status != CampaignStatus::Open {
                continue;
            }

            let raised = campaign.total_donated;
            let goal = campaign.target_amount;

            if raised >= goal && goal > 0 {
                let entry = ActionLogEntry::new(
                    AGENT_NAME,
                    "marked_funded",
                    Some(campaign.id),
                    json!({
                        "title": campaign.title,
                        "raised": raised,
                        "goal": goal,
                        "progress": format!("{:.2}%", campaign.progress_percent()),
                    }),
                );
                match self.transition(campaign.id, CampaignStatus::Funded, &entry) {
                    Ok(()) => {
                        tracing::info!(
                            "Guardian: campaign {} \"{}\" marked as Funded",
                            campaign.id,
                            campaign.title
                        );
                        actions.push(entry);
                    }
                    Err(e) => {
                        tracing::warn!("Guardian error (funded) for campaign {}: {}", campaign.id, e);
                    }
                }
            } else if campaign.end_time > 0 && now > campaign.end_time {
                let entry = ActionLogEntry::new(
                    AGENT_NAME,
                    "marked_expired",
                    Some(campaign.id),
                    json!({
                        "title": campaign.title,
                        "end_time": campaign.end_time,
                        "current_time": now,
                        "seconds_overdue": now - campaign.end_time,
                    }),
                );
                match self.transition(campaign.id, CampaignStatus::Expired, &entry) {
                    Ok(()) => {
                        tracing::info!(
                            "Guardian: campaign {} \"{}\" marked as Expired",
                            campaign.id,
                            campaign.title
                        );
                        actions.push(entry);
                    }
                    Err(e) => {
                        tracing::warn!("Guardian error (expired) for campaign {}: {}", campaign.id, e);
                    }
                }
            }
        }

        Ok(RunResult::new(AGENT_NAME, actions))
    }
}

impl LifecycleGuardian {
    /// 状态迁移 + 行动日志，任一失败都放弃该活动（下轮重试）
    fn transition(
        &self,
        campaign_id: u64,
        status: CampaignStatus,
        entry: &ActionLogEntry,
    ) -> Result<(), AgentError> {
        self.store.update_campaign_status(campaign_id, status)?;
        self.store.append_action_log(entry)?;
        Ok(())
    }
}
