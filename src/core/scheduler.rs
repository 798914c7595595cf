//! 代理调度器：注册表、周期驱动与健康簿记
//!
//! 每个周期：先同步（失败只记日志，周期照常），再按注册顺序依次运行各代理。
//! 单个代理失败被捕获并记入健康状态，不影响后续代理；手动触发路径则把
//! 错误原样交给调用方。周期之间由异步锁做 single-flight，绝不并行两个周期。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::agents::Agent;
use crate::core::{AgentError, AgentHealth, SchedulerStatus};
use crate::model::RunResult;
use crate::sync::Synchronizer;

/// 默认调度间隔
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// 代理调度器；所有可变状态显式归属于实例，可在测试中起多份互不干扰
pub struct AgentScheduler {
    sync: Synchronizer,
    /// 固定注册顺序，周期内按序执行
    agents: Vec<Arc<dyn Agent>>,
    interval: Duration,
    health: Mutex<HashMap<String, AgentHealth>>,
    cycle_count: AtomicU64,
    running: AtomicBool,
    /// 周期 single-flight 锁
    cycle_lock: tokio::sync::Mutex<()>,
    /// stop() 取消周期定时任务
    timer_token: Mutex<Option<CancellationToken>>,
}

impl AgentScheduler {
    pub fn new(sync: Synchronizer, agents: Vec<Arc<dyn Agent>>, interval: Duration) -> Self {
        let health = agents
            .iter()
            .map(|a| (a.name().to_string(), AgentHealth::default()))
            .collect();
        Self {
            sync,
            agents,
            interval,
            health: Mutex::new(health),
            cycle_count: AtomicU64::new(0),
            running: AtomicBool::new(false),
            cycle_lock: tokio::sync::Mutex::new(()),
            timer_token: Mutex::new(None),
        }
    }

    /// 注册顺序的代理名列表
    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    /// 跑一个完整周期：同步 + 全部代理，返回每个代理的运行结果
    pub async fn run_all(&self) -> Vec<RunResult> {
        let _guard = self.cycle_lock.lock().await;
        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Agent cycle #{cycle} starting");

        if let Err(e) = self.sync.sync_all() {
            tracing::error!("Event sync failed: {e}");
        }

        let mut results = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            results.push(self.run_wrapped(agent.as_ref()).await);
        }

        tracing::info!("Agent cycle #{cycle} complete");
        results
    }

    /// 包装一次代理调用：成败都更新健康状态；失败合成零动作结果
    async fn run_wrapped(&self, agent: &dyn Agent) -> RunResult {
        let start = Instant::now();
        match agent.run().await {
            Ok(result) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                self.with_health(agent.name(), |h| {
                    h.record_success(duration_ms, result.actions_count)
                });
                tracing::info!(
                    "{}: {} actions ({duration_ms}ms)",
                    agent.name(),
                    result.actions_count
                );
                result
            }
            Err(e) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                self.with_health(agent.name(), |h| {
                    h.record_failure(duration_ms, e.to_string())
                });
                tracing::error!("{}: {e}", agent.name());
                RunResult::empty(agent.name())
            }
        }
    }

    /// 手动触发单个代理；未知名字在任何工作开始前拒绝，失败原样上抛
    pub async fn run_agent(&self, name: &str) -> Result<RunResult, AgentError> {
        let agent = self
            .agents
            .iter()
            .find(|a| a.name() == name)
            .ok_or_else(|| AgentError::UnknownAgent(name.to_string()))?
            .clone();

        let start = Instant::now();
        match agent.run().await {
            Ok(result) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                self.with_health(name, |h| {
                    h.record_success(duration_ms, result.actions_count)
                });
                Ok(result)
            }
            Err(e) => {
                self.with_health(name, |h| h.record_manual_failure(e.to_string()));
                Err(e)
            }
        }
    }

    /// 启动周期调度：幂等；立刻跑一轮，之后每 interval 一轮，直到 stop()
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::info!("Agent scheduler already running");
            return;
        }

        let token = CancellationToken::new();
        *self.timer_token.lock().unwrap() = Some(token.clone());
        tracing::info!("Agent scheduler started (interval: {:?})", self.interval);

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            // interval 的首个 tick 立即返回，即启动时的立即一轮
            let mut interval = tokio::time::interval(scheduler.interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        scheduler.run_all().await;
                    }
                }
            }
        });
    }

    /// 停止周期调度；已停止时调用是安全的空操作。周期计数保留，重启后续接
    pub fn stop(&self) {
        if let Some(token) = self.timer_token.lock().unwrap().take() {
            token.cancel();
        }
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Agent scheduler stopped");
        }
    }

    /// 不可变状态快照：运行位、间隔、周期数与每代理健康状态的拷贝
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            interval_secs: self.interval.as_secs(),
            cycle_count: self.cycle_count.load(Ordering::SeqCst),
            agents: self.health.lock().unwrap().clone(),
        }
    }

    fn with_health(&self, name: &str, f: impl FnOnce(&mut AgentHealth)) {
        let mut health = self.health.lock().unwrap();
        if let Some(h) = health.get_mut(name) {
            f(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    use crate::ledger::InMemoryLedger;
    use crate::store::MemoryStore;

    struct CountingAgent {
        name: &'static str,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Agent for CountingAgent {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> Result<RunResult, AgentError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(RunResult::empty(self.name))
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        fn name(&self) -> &str {
            "Failing"
        }

        async fn run(&self) -> Result<RunResult, AgentError> {
            Err(AgentError::Execution("boom".into()))
        }
    }

    fn scheduler_with(agents: Vec<Arc<dyn Agent>>) -> AgentScheduler {
        let sync = Synchronizer::new(Arc::new(InMemoryLedger::new()), Arc::new(MemoryStore::new()));
        AgentScheduler::new(sync, agents, Duration::from_secs(60))
    }

    /// 轮询直到条件成立；带截止时间，避免依赖固定 sleep 在高负载下抖动
    async fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_failure_marks_unhealthy_and_cycle_continues() {
        let counting = Arc::new(CountingAgent {
            name: "Counting",
            runs: AtomicUsize::new(0),
        });
        let scheduler = scheduler_with(vec![Arc::new(FailingAgent), counting.clone()]);

        let results = scheduler.run_all().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].actions_count, 0); // 失败代理的零动作占位
        assert_eq!(counting.runs.load(Ordering::SeqCst), 1); // 后续代理照常运行

        let status = scheduler.status();
        let failing = &status.agents["Failing"];
        assert!(!failing.healthy);
        assert_eq!(failing.last_error.as_deref(), Some("agent execution failed: boom"));
        assert_eq!(failing.run_count, 1);
        assert!(status.agents["Counting"].healthy);
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        struct FlakyAgent {
            fail_first: AtomicBool,
        }

        #[async_trait]
        impl Agent for FlakyAgent {
            fn name(&self) -> &str {
                "Flaky"
            }

            async fn run(&self) -> Result<RunResult, AgentError> {
                if self.fail_first.swap(false, Ordering::SeqCst) {
                    Err(AgentError::Execution("first run".into()))
                } else {
                    Ok(RunResult::empty("Flaky"))
                }
            }
        }

        let scheduler = scheduler_with(vec![Arc::new(FlakyAgent {
            fail_first: AtomicBool::new(true),
        })]);

        scheduler.run_all().await;
        assert!(!scheduler.status().agents["Flaky"].healthy);

        scheduler.run_all().await;
        let health = &scheduler.status().agents["Flaky"];
        assert!(health.healthy);
        assert_eq!(health.last_error, None);
        assert_eq!(health.run_count, 2);
    }

    #[tokio::test]
    async fn test_unknown_agent_rejected() {
        let scheduler = scheduler_with(vec![]);
        let err = scheduler.run_agent("Nope").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownAgent(_)));
    }

    #[tokio::test]
    async fn test_manual_failure_surfaces_error_without_run_count() {
        let scheduler = scheduler_with(vec![Arc::new(FailingAgent)]);
        assert!(scheduler.run_agent("Failing").await.is_err());

        let health = &scheduler.status().agents["Failing"];
        assert!(!health.healthy);
        // 手动路径不更新运行计数（与调度路径不同）
        assert_eq!(health.run_count, 0);
    }

    #[tokio::test]
    async fn test_cycle_counter_increments() {
        let scheduler = scheduler_with(vec![]);
        scheduler.run_all().await;
        scheduler.run_all().await;
        assert_eq!(scheduler.status().cycle_count, 2);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_safe() {
        let counting = Arc::new(CountingAgent {
            name: "Counting",
            runs: AtomicUsize::new(0),
        });
        let scheduler = Arc::new(scheduler_with(vec![counting.clone()]));

        scheduler.start();
        scheduler.start(); // 第二次是空操作
        wait_until(|| counting.runs.load(Ordering::SeqCst) >= 1).await;
        assert!(scheduler.status().running);
        // 只有一个定时任务：立即一轮之后，60s 间隔内不会再来第二轮；
        // 留一个宽限窗口，若重复 start 起了第二个任务会在此暴露
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counting.runs.load(Ordering::SeqCst), 1);

        scheduler.stop();
        scheduler.stop(); // 已停止时安全
        assert!(!scheduler.status().running);
    }

    /// stop 后 start：周期编号续接，并只多出预期中的一轮立即运行
    #[tokio::test]
    async fn test_restart_continues_cycle_numbering() {
        let scheduler = Arc::new(scheduler_with(vec![]));

        scheduler.start();
        wait_until(|| scheduler.status().cycle_count >= 1).await;
        scheduler.stop();
        let after_first = scheduler.status().cycle_count;
        assert_eq!(after_first, 1);

        scheduler.start();
        wait_until(|| scheduler.status().cycle_count >= 2).await;
        scheduler.stop();
        assert_eq!(scheduler.status().cycle_count, after_first + 1);
    }
}
