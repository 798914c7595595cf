//! 欺诈检测：快速连发与金额异常两项独立检查
//!
//! 1. rapid-fire：同一钱包 5 分钟窗口内超过 3 笔即标记（>5 笔升 high），
//!    每轮每钱包至多一个标记，(钱包, 窗口起点) 指纹抑制跨轮重复标记。
//! 2. spike：单笔超过全体均值 5 倍标 high、10 倍标 critical，
//!    (钱包, 活动, 时间戳) 指纹，逐笔独立、不提前退出。
//!
//! 指纹集只存活于进程生命周期，重启后同一窗口可能被再次标记（已知取舍，
//! 存储端没有欺诈标记的唯一键兜底）。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use crate::agents::Agent;
use crate::core::AgentError;
use crate::model::{ActionLogEntry, Donation, FraudFlag, RunResult, Severity};
use crate::store::Store;

pub const AGENT_NAME: &str = "FraudDetection";

/// rapid-fire 观察窗口（秒）
const WINDOW_SECS: i64 = 300;
/// 窗口内超过该笔数即标记
const WINDOW_COUNT_THRESHOLD: usize = 3;
/// 超过该笔数升级为 high
const WINDOW_HIGH_THRESHOLD: usize = 5;
/// 均值倍数阈值：high / critical
const SPIKE_HIGH_RATIO: f64 = 5.0;
const SPIKE_CRITICAL_RATIO: f64 = 10.0;

pub struct FraudDetector {
    store: Arc<dyn Store>,
    /// 已标记指纹（"rapid_.." / "spike_.."），进程生命周期内有效
    flagged: Mutex<HashSet<String>>,
}

impl FraudDetector {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            flagged: Mutex::new(HashSet::new()),
        }
    }

    /// 落一个标记 + 镜像一条行动日志
    fn flag(
        &self,
        flag: FraudFlag,
        entry: ActionLogEntry,
        key: String,
        actions: &mut Vec<ActionLogEntry>,
    ) -> Result<(), AgentError> {
        self.store.append_fraud_flag(&flag)?;
        self.store.append_action_log(&entry)?;
        self.flagged.lock().unwrap().insert(key);
        actions.push(entry);
        Ok(())
    }
}

#[async_trait]
impl Agent for FraudDetector {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    async fn run(&self) -> Result<RunResult, AgentError> {
        let donations = self.store.list_all_donations()?;
        if donations.is_empty() {
            return Ok(RunResult::empty(AGENT_NAME));
        }

        let mut actions = Vec::new();

        // ── 检查 1：rapid-fire ──
        let mut by_wallet: HashMap<&str, Vec<&Donation>> = HashMap::new();
        for d in &donations {
            by_wallet.entry(d.donor.as_str()).or_default().push(d);
        }

        for (wallet, mut wallet_donations) in by_wallet {
            wallet_donations.sort_by_key(|d| d.timestamp);

            for start in &wallet_donations {
                let window_end = start.timestamp + WINDOW_SECS;
                let in_window: Vec<&&Donation> = wallet_donations
                    .iter()
                    .filter(|d| d.timestamp >= start.timestamp && d.timestamp <= window_end)
                    .collect();

                if in_window.len() <= WINDOW_COUNT_THRESHOLD {
                    continue;
                }

                let key = format!("rapid_{}_{}", wallet, start.timestamp);
                if self.flagged.lock().unwrap().contains(&key) {
                    continue;
                }

                let severity = if in_window.len() > WINDOW_HIGH_THRESHOLD {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let flag = FraudFlag::new(
                    wallet,
                    format!(
                        "Rapid-fire donations: {} donations within 5 minutes",
                        in_window.len()
                    ),
                    severity,
                );
                let entry = ActionLogEntry::new(
                    AGENT_NAME,
                    "flagged_rapid_donations",
                    Some(in_window[0].campaign_id),
                    json!({
                        "wallet": wallet,
                        "donation_count": in_window.len(),
                        "window_seconds": WINDOW_SECS,
                        "total_amount": in_window.iter().map(|d| d.amount).sum::<i64>(),
                    }),
                );
                tracing::info!(
                    "Fraud: wallet {} flagged for rapid-fire ({} donations)",
                    wallet,
                    in_window.len()
                );
                self.flag(flag, entry, key, &mut actions)?;
                break; // 每轮每钱包至多一个标记
            }
        }

        // ── 检查 2：金额异常 spike ──
        let mean =
            donations.iter().map(|d| d.amount).sum::<i64>() as f64 / donations.len() as f64;

        for d in &donations {
            if mean <= 0.0 || (d.amount as f64) <= mean * SPIKE_HIGH_RATIO {
                continue;
            }

            let key = format!("spike_{}_{}_{}", d.donor, d.campaign_id, d.timestamp);
            if self.flagged.lock().unwrap().contains(&key) {
                continue;
            }

            let ratio = d.amount as f64 / mean;
            let severity = if (d.amount as f64) > mean * SPIKE_CRITICAL_RATIO {
                Severity::Critical
            } else {
                Severity::High
            };
            let flag = FraudFlag::new(
                &d.donor,
                format!(
                    "Abnormal donation spike: {} is {:.1}x the average ({})",
                    d.amount,
                    ratio,
                    mean.round() as i64
                ),
                severity,
            );
            let entry = ActionLogEntry::new(
                AGENT_NAME,
                "flagged_abnormal_spike",
                Some(d.campaign_id),
                json!({
                    "wallet": d.donor,
                    "donation_amount": d.amount,
                    "average_donation": mean.round() as i64,
                    "spike_ratio": format!("{ratio:.1}"),
                }),
            );
            tracing::info!(
                "Fraud: wallet {} flagged for spike ({:.1}x average)",
                d.donor,
                ratio
            );
            self.flag(flag, entry, key, &mut actions)?;
        }

        Ok(RunResult::new(AGENT_NAME, actions))
    }
}
