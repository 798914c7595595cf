//! 分析评分：每活动一行健康分 / 趋势分 / 捐赠画像
//!
//! 健康分 = 募集(0-40) + 剩余时间(0-30，按约 30 天窗口折算) + 捐赠人数(0-30)；
//! 趋势分 = 10×近 24h 笔数 + 近 24h 金额/除数 + 5×历史捐赠人数，无上界。
//! 结果按 campaign_id upsert，后写覆盖，不留历史。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::agents::Agent;
use crate::core::AgentError;
use crate::model::{
    ActionLogEntry, AnalyticsRecord, Campaign, Donation, RunResult, UNIT_DIVISOR,
};
use crate::store::Store;

pub const AGENT_NAME: &str = "Analytics";

/// 时间分的折算窗口：约 30 天
const TIME_WINDOW_SECS: i64 = 30 * 86_400;
/// 趋势分的「近期」窗口：24 小时
const RECENT_SECS: i64 = 86_400;

pub struct AnalyticsScorer {
    store: Arc<dyn Store>,
}

impl AnalyticsScorer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

fn unique_donors(donations: &[Donation]) -> usize {
    donations
        .iter()
        .map(|d| d.donor.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len()
}

/// 健康分 [0, 100]
pub fn health_score(campaign: &Campaign, donations: &[Donation], now: i64) -> i64 {
    // 募集进度 0-40
    let funding_ratio = if campaign.target_amount > 0 {
        (campaign.total_donated as f64 / campaign.target_amount as f64).min(1.0)
    } else {
        0.0
    };
    let funding_score = funding_ratio * 40.0;

    // 剩余时间 0-30；无截止给 0
    let mut time_score = 0.0;
    if campaign.end_time > 0 {
        let remaining = (campaign.end_time - now).max(0);
        time_score = (remaining as f64 / TIME_WINDOW_SECS as f64 * 30.0).min(30.0);
    }

    // 捐赠人数 0-30，6 人封顶
    let donor_score = (unique_donors(donations) as f64 * 5.0).min(30.0);

    (funding_score + time_score + donor_score).round() as i64
}

/// 趋势分（非负，无上界）
pub fn trending_score(donations: &[Donation], now: i64) -> i64 {
    let one_day_ago = now - RECENT_SECS;
    let recent: Vec<&Donation> = donations
        .iter()
        .filter(|d| d.timestamp > one_day_ago)
        .collect();
    let recent_amount: i64 = recent.iter().map(|d| d.amount).sum();

    let velocity = recent.len() as f64 * 10.0;
    let amount = recent_amount as f64 / UNIT_DIVISOR as f64;
    let diversity = unique_donors(donations) as f64 * 5.0;

    (velocity + amount + diversity).round() as i64
}

/// 累计捐得最多的钱包（并列取先遇到的）；无捐赠时 None
fn top_donor(donations: &[Donation]) -> (Option<String>, i64) {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for d in donations {
        if !totals.contains_key(d.donor.as_str()) {
            order.push(d.donor.as_str());
        }
        *totals.entry(d.donor.as_str()).or_insert(0) += d.amount;
    }

    let mut best: Option<&str> = None;
    let mut best_amount = 0;
    for donor in order {
        let total = totals[donor];
        if total > best_amount {
            best = Some(donor);
            best_amount = total;
        }
    }
    (best.map(String::from), best_amount)
}

/// 日志元数据里的捐赠人标识做截断脱敏（库表里存完整值）
fn truncate_donor(donor: &Option<String>) -> String {
    match donor {
        Some(d) => format!("{}...", d.chars().take(10).collect::<String>()),
        None => "none".to_string(),
    }
}

#[async_trait]
impl Agent for AnalyticsScorer {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    async fn run(&self) -> Result<RunResult, AgentError> {
        let campaigns = self.store.list_campaigns()?;
        let now = Utc::now().timestamp();
        let mut actions = Vec::new();

        for campaign in campaigns {
            match self.score_campaign(&campaign, now) {
                Ok(entry) => actions.push(entry),
                Err(e) => {
                    tracing::warn!("Analytics error for campaign {}: {}", campaign.id, e);
                }
            }
        }

        Ok(RunResult::new(AGENT_NAME, actions))
    }
}

impl AnalyticsScorer {
    fn score_campaign(&self, campaign: &Campaign, now: i64) -> Result<ActionLogEntry, AgentError> {
        let donations = self.store.list_donations(campaign.id)?;

        let health = health_score(campaign, &donations, now);
        let trending = trending_score(&donations, now);
        let (donor, top_amount) = top_donor(&donations);
        let donors = unique_donors(&donations);
        let avg = if donations.is_empty() {
            0
        } else {
            (donations.iter().map(|d| d.amount).sum::<i64>() as f64 / donations.len() as f64)
                .round() as i64
        };

        self.store.upsert_analytics(&AnalyticsRecord {
            campaign_id: campaign.id,
            health_score: health,
            trending_score: trending,
            top_donor: donor.clone(),
            top_donation_amount: top_amount,
            total_donors: donors,
            avg_donation: avg,
        })?;

        let entry = ActionLogEntry::new(
            AGENT_NAME,
            "analytics_updated",
            Some(campaign.id),
            json!({
                "campaign_title": campaign.title,
                "health_score": health,
                "trending_score": trending,
                "top_donor": truncate_donor(&donor),
                "total_donors": donors,
            }),
        );
        self.store.append_action_log(&entry)?;
        Ok(entry)
    }
}
