//! 领域模型：活动、捐赠、行动日志、欺诈标记、分析记录
//!
//! 金额统一使用最小货币单位（整数）；换算到基础货币除以 `UNIT_DIVISOR`。
//! 链上时间为 epoch 秒（i64），审计字段（created_at 等）用 chrono UTC。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 最小货币单位 -> 基础货币 的固定除数
pub const UNIT_DIVISOR: i64 = 10_000_000;

/// 活动生命周期状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Open,
    Funded,
    Expired,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Open => "Open",
            CampaignStatus::Funded => "Funded",
            CampaignStatus::Expired => "Expired",
        }
    }

    /// 从存储的字符串解析；未知值按 Open 处理（镜像端只会给出这三种）
    pub fn parse(s: &str) -> Self {
        match s {
            "Funded" => CampaignStatus::Funded,
            "Expired" => CampaignStatus::Expired,
            _ => CampaignStatus::Open,
        }
    }
}

/// 众筹活动快照
///
/// 只有 Synchronizer（金额/标题刷新）与 Lifecycle Guardian（状态迁移）会修改；
/// 正常运行期间从不删除。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Campaign {
    pub id: u64,
    pub creator: String,
    pub title: String,
    /// 目标金额（最小单位）
    pub target_amount: i64,
    /// 已募集金额（最小单位）
    pub total_donated: i64,
    pub status: CampaignStatus,
    /// 截止时间（epoch 秒），0 表示无截止
    pub end_time: i64,
}

impl Campaign {
    /// 募集进度百分比；目标 <= 0 时为 0
    pub fn progress_percent(&self) -> f64 {
        if self.target_amount <= 0 {
            return 0.0;
        }
        self.total_donated as f64 / self.target_amount as f64 * 100.0
    }
}

/// 单笔捐赠；同步入库后不可变，只追加
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Donation {
    pub donor: String,
    pub campaign_id: u64,
    /// 金额（最小单位）
    pub amount: i64,
    /// epoch 秒
    pub timestamp: i64,
}

/// 代理做出的一条决策记录，只追加，从不修改
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub agent_name: String,
    /// 动作类型标签（如 marked_funded / flagged_abnormal_spike）
    pub action_taken: String,
    pub campaign_id: Option<u64>,
    /// 自由格式元数据（JSON 对象）
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl ActionLogEntry {
    pub fn new(
        agent_name: &str,
        action_taken: &str,
        campaign_id: Option<u64>,
        metadata: Value,
    ) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            action_taken: action_taken.to_string(),
            campaign_id,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// 欺诈标记严重级别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// 可疑钱包的持久化标记；resolved 由外部运营操作修改，不在本引擎内
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FraudFlag {
    pub wallet: String,
    pub reason: String,
    pub severity: Severity,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl FraudFlag {
    pub fn new(wallet: &str, reason: String, severity: Severity) -> Self {
        Self {
            wallet: wallet.to_string(),
            reason,
            severity,
            resolved: false,
            created_at: Utc::now(),
        }
    }
}

/// 每个活动一行的分析结果，按 campaign_id upsert，后写覆盖
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub campaign_id: u64,
    /// 健康分 [0, 100]
    pub health_score: i64,
    /// 趋势分（非负，无上界）
    pub trending_score: i64,
    pub top_donor: Option<String>,
    pub top_donation_amount: i64,
    pub total_donors: usize,
    pub avg_donation: i64,
}

/// 单次代理运行的产物；仅通过其中的日志条目持久化
#[derive(Clone, Debug)]
pub struct RunResult {
    pub agent: String,
    pub actions: Vec<ActionLogEntry>,
    pub actions_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl RunResult {
    pub fn new(agent: &str, actions: Vec<ActionLogEntry>) -> Self {
        Self {
            agent: agent.to_string(),
            actions_count: actions.len(),
            actions,
            timestamp: Utc::now(),
        }
    }

    /// 代理运行失败时的零动作占位结果
    pub fn empty(agent: &str) -> Self {
        Self::new(agent, Vec::new())
    }
}

/// 一次全量同步的计数
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub campaigns_synced: usize,
    pub new_donations_synced: usize,
}
