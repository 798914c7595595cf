//! 错误分类
//!
//! 与调度器配合：LedgerError / StoreError 属于可容忍的瞬态失败（记日志、跳过继续），
//! AgentError::Execution 由调度路径吞掉、手动触发路径原样上抛；本引擎没有进程级致命错误。

use thiserror::Error;

/// 账本镜像暂不可用（抓取失败）
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// 持久化存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    /// 唯一键冲突（重复捐赠插入）；Synchronizer 视为正常情况静默吸收
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// 代理运行期错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("ledger fetch failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    /// 请求了未注册的代理名（手动触发路径，开始任何工作前拒绝）
    #[error("agent \"{0}\" not found")]
    UnknownAgent(String),

    #[error("agent execution failed: {0}")]
    Execution(String),
}
