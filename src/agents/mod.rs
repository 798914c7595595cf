//! 代理箱：四个分析/执法代理
//!
//! 所有代理实现 Agent trait（name / run），由调度器按固定注册顺序依次调用：
//! CampaignGuardian -> RewardOptimization -> FraudDetection -> Analytics。
//! 顺序有意义：Guardian 的状态迁移写回存储后，同一周期内的后续代理能看到。

pub mod analytics;
pub mod fraud;
pub mod guardian;
pub mod reward;

use async_trait::async_trait;

pub use analytics::AnalyticsScorer;
pub use fraud::FraudDetector;
pub use guardian::LifecycleGuardian;
pub use reward::RewardOptimizer;

use crate::core::AgentError;
use crate::model::RunResult;

/// 代理 trait：每个周期对当前数据快照执行一次分析/执法
///
/// run 必须可重复调用：代理自身无跨周期业务状态（去重指纹除外），
/// 每次运行重新读取存储中的活动与捐赠。
#[async_trait]
pub trait Agent: Send + Sync {
    /// 代理名称（注册与手动触发用）
    fn name(&self) -> &str;

    /// 执行一轮分析，返回本轮做出的全部动作
    async fn run(&self) -> Result<RunResult, AgentError>;
}
