//! Warden - 众筹账本自治代理引擎
//!
//! 模块划分：
//! - **agents**: 四个分析/执法代理（生命周期守卫、奖励优化、欺诈检测、分析评分）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、健康状态、周期调度
//! - **ledger**: 账本镜像契约与内存实现
//! - **model**: 领域模型（活动、捐赠、行动日志、欺诈标记、分析记录）
//! - **store**: 存储契约、内存回退与 SQLite 实现
//! - **sync**: 账本 -> 存储 同步器（捐赠去重指纹）

pub mod agents;
pub mod config;
pub mod core;
pub mod ledger;
pub mod model;
pub mod observability;
pub mod store;
pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use crate::agents::{Agent, AnalyticsScorer, FraudDetector, LifecycleGuardian, RewardOptimizer};
use crate::core::AgentScheduler;
use crate::ledger::LedgerMirror;
use crate::store::Store;
use crate::sync::Synchronizer;

/// 按固定注册顺序装配四个代理的调度器
///
/// 顺序即周期内的执行顺序：Guardian 的状态迁移写回存储后，
/// 同一周期的 Reward / Fraud / Analytics 能读到。
pub fn build_scheduler(
    ledger: Arc<dyn LedgerMirror>,
    store: Arc<dyn Store>,
    interval: Duration,
) -> Arc<AgentScheduler> {
    let sync = Synchronizer::new(ledger, store.clone());
    let agents: Vec<Arc<dyn Agent>> = vec![
        Arc::new(LifecycleGuardian::new(store.clone())),
        Arc::new(RewardOptimizer::new(store.clone())),
        Arc::new(FraudDetector::new(store.clone())),
        Arc::new(AnalyticsScorer::new(store)),
    ];
    Arc::new(AgentScheduler::new(sync, agents, interval))
}
