//! 调度器状态：每代理健康簿记与只读快照
//!
//! AgentHealth 仅存活于进程内存，进程启动时为每个注册代理建一份，
//! 每次运行后更新，从不持久化。getStatus 返回的都是拷贝，避免与
//! 运行中的周期争用。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 单个代理的运行簿记
#[derive(Clone, Debug, Serialize)]
pub struct AgentHealth {
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_run_duration_ms: Option<u64>,
    pub last_actions_count: usize,
    pub total_actions_count: usize,
    pub last_error: Option<String>,
    pub healthy: bool,
    pub run_count: u64,
}

impl Default for AgentHealth {
    fn default() -> Self {
        Self {
            last_run_time: None,
            last_run_duration_ms: None,
            last_actions_count: 0,
            total_actions_count: 0,
            last_error: None,
            healthy: true,
            run_count: 0,
        }
    }
}

impl AgentHealth {
    /// 一次成功运行后的更新
    pub fn record_success(&mut self, duration_ms: u64, actions_count: usize) {
        self.last_run_time = Some(Utc::now());
        self.last_run_duration_ms = Some(duration_ms);
        self.last_actions_count = actions_count;
        self.total_actions_count += actions_count;
        self.last_error = None;
        self.healthy = true;
        self.run_count += 1;
    }

    /// 调度路径的失败更新（计入 run_count，周期继续）
    pub fn record_failure(&mut self, duration_ms: u64, error: String) {
        self.last_run_time = Some(Utc::now());
        self.last_run_duration_ms = Some(duration_ms);
        self.last_error = Some(error);
        self.healthy = false;
        self.run_count += 1;
    }

    /// 手动触发路径的失败更新：只记错误与健康位，错误由调用方处理
    pub fn record_manual_failure(&mut self, error: String) {
        self.last_error = Some(error);
        self.healthy = false;
    }
}

/// 调度器整体状态的不可变快照（供外围 HTTP/CLI 层序列化）
#[derive(Clone, Debug, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub cycle_count: u64,
    pub agents: HashMap<String, AgentHealth>,
}
