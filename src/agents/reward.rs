//! 奖励优化：早期捐赠人加成
//!
//! 对进度 <= 15% 的活动逐笔重算加成：当前进度 <= 5% 记 2 倍（super_early），
//! <= 10% 记 1.5 倍（early）。按活动的*当前*进度评级，不是捐赠发生时的进度。
//!
//! 与其它三个代理不同，本代理没有去重指纹，同一笔捐赠每个周期都会重新记录
//! 一次加成——这是沿袭上游的行为，疑似缺陷而非特性，保留待产品侧确认。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::Agent;
use crate::core::AgentError;
use crate::model::{ActionLogEntry, RunResult, UNIT_DIVISOR};
use crate::store::Store;

pub const AGENT_NAME: &str = "RewardOptimization";

/// 进度超过该阈值的活动不再分析
const EARLY_PROGRESS_CUTOFF: f64 = 15.0;

pub struct RewardOptimizer {
    store: Arc<dyn Store>,
}

impl RewardOptimizer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

/// 按当前进度定档：(倍率, 动作标签)；超过 10% 不给加成
fn bonus_tier(progress_percent: f64) -> Option<(f64, &'static str)> {
    if progress_percent <= 5.0 {
        Some((2.0, "super_early_donor_bonus_2x"))
    } else if progress_percent <= 10.0 {
        Some((1.5, "early_donor_bonus_1.5x"))
    } else {
        None
    }
}

/// 加成额（基础货币）：floor(金额/除数 × 10 × (倍率 - 1))
fn bonus_reward(amount: i64, multiplier: f64) -> i64 {
    ((amount as f64 / UNIT_DIVISOR as f64) * 10.0 * (multiplier - 1.0)).floor() as i64
}

#[async_trait]
impl Agent for RewardOptimizer {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    async fn run(&self) -> Result<RunResult, AgentError> {
        let campaigns = self.store.list_campaigns()?;
        let mut actions = Vec::new();

        for campaign in campaigns {
            if campaign.target_amount <= 0 {
                continue;
            }
            let progress = campaign.progress_percent();
            if progress > EARLY_PROGRESS_CUTOFF {
                continue;
            }

            let donations = match self.store.list_donations(campaign.id) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Reward: donations unavailable for campaign {}: {}", campaign.id, e);
                    continue;
                }
            };

            let Some((multiplier, reason)) = bonus_tier(progress) else {
                continue;
            };

            for donation in donations {
                let bonus = bonus_reward(donation.amount, multiplier);
                let entry = ActionLogEntry::new(
                    AGENT_NAME,
                    reason,
                    Some(campaign.id),
                    json!({
                        "donor": donation.donor,
                        "donation_amount": donation.amount,
                        "campaign_progress": format!("{progress:.2}%"),
                        "multiplier": multiplier,
                        "bonus_reward": bonus,
                        "campaign_title": campaign.title,
                    }),
                );
                if let Err(e) = self.store.append_action_log(&entry) {
                    tracing::warn!("Reward log error for campaign {}: {}", campaign.id, e);
                    continue;
                }
                actions.push(entry);
            }
        }

        Ok(RunResult::new(AGENT_NAME, actions))
    }
}
