//! 引擎端到端测试：同步 + 四代理完整周期

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use warden::build_scheduler;
use warden::ledger::InMemoryLedger;
use warden::model::{Campaign, CampaignStatus, Donation};
use warden::store::{MemoryStore, Store};

fn campaign(id: u64, goal: i64, raised: i64, end_time: i64) -> Campaign {
    Campaign {
        id,
        creator: "GCREATOR".into(),
        title: format!("campaign {id}"),
        target_amount: goal,
        total_donated: raised,
        status: CampaignStatus::Open,
        end_time,
    }
}

fn donation(campaign_id: u64, donor: &str, amount: i64, ts: i64) -> Donation {
    Donation {
        donor: donor.into(),
        campaign_id,
        amount,
        timestamp: ts,
    }
}

/// 2% 进度活动的完整周期：同步入库、奖励两笔 super_early、分析画像落表
#[tokio::test]
async fn test_full_cycle_on_early_campaign() {
    let now = Utc::now().timestamp();
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_campaigns(vec![campaign(1, 1000, 50, 0)]);
    ledger.push_donation(donation(1, "A", 30, now - 100));
    ledger.push_donation(donation(1, "B", 20, now - 50));

    let store = Arc::new(MemoryStore::new());
    let scheduler = build_scheduler(ledger, store.clone(), Duration::from_secs(60));

    let results = scheduler.run_all().await;
    assert_eq!(results.len(), 4);
    assert_eq!(
        results.iter().map(|r| r.agent.clone()).collect::<Vec<_>>(),
        vec!["CampaignGuardian", "RewardOptimization", "FraudDetection", "Analytics"]
    );

    // 同步入库
    assert_eq!(store.list_campaigns().unwrap().len(), 1);
    assert_eq!(store.list_all_donations().unwrap().len(), 2);

    // Guardian：未达标未过期，无动作
    assert_eq!(results[0].actions_count, 0);

    // Reward：5% 进度，两笔 super_early ×2.0
    assert_eq!(results[1].actions_count, 2);
    for action in &results[1].actions {
        assert_eq!(action.action_taken, "super_early_donor_bonus_2x");
        assert_eq!(action.metadata["multiplier"], 2.0);
    }

    // Analytics：均值 25、2 人、top donor A
    let record = store.analytics_for(1).unwrap().unwrap();
    assert_eq!(record.avg_donation, 25);
    assert_eq!(record.total_donors, 2);
    assert_eq!(record.top_donor.as_deref(), Some("A"));

    // 健康状态全绿
    let status = scheduler.status();
    assert_eq!(status.cycle_count, 1);
    for (_, health) in &status.agents {
        assert!(health.healthy);
        assert_eq!(health.run_count, 1);
    }
}

/// Guardian 的状态迁移在同一周期内对后续代理可见
#[tokio::test]
async fn test_guardian_transition_visible_within_cycle() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_campaigns(vec![campaign(1, 1000, 1200, 0)]);

    let store = Arc::new(MemoryStore::new());
    let scheduler = build_scheduler(ledger, store.clone(), Duration::from_secs(60));
    let results = scheduler.run_all().await;

    // Guardian 置 Funded
    assert_eq!(results[0].actions[0].action_taken, "marked_funded");
    assert_eq!(
        store.list_campaigns().unwrap()[0].status,
        CampaignStatus::Funded
    );

    // Reward 读到的进度为 120%，不再分析该活动
    assert_eq!(results[1].actions_count, 0);

    // Analytics 仍然为其评分（40 资助 + 0 时间 + 0 捐赠人）
    let record = store.analytics_for(1).unwrap().unwrap();
    assert_eq!(record.health_score, 40);
}

/// 两个周期之间：同步幂等，欺诈指纹抑制重复标记
#[tokio::test]
async fn test_second_cycle_is_deduplicated() {
    let now = Utc::now().timestamp();
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_campaigns(vec![campaign(1, 1_000_000, 40, 0)]);
    for i in 0..4 {
        ledger.push_donation(donation(1, "GRAPID", 10, now - 400 + i * 60));
    }

    let store = Arc::new(MemoryStore::new());
    let scheduler = build_scheduler(ledger, store.clone(), Duration::from_secs(60));

    scheduler.run_all().await;
    assert_eq!(store.list_all_donations().unwrap().len(), 4);
    assert_eq!(store.unresolved_fraud_flags().unwrap().len(), 1);

    scheduler.run_all().await;
    // 捐赠不重复入库，钱包不重复标记
    assert_eq!(store.list_all_donations().unwrap().len(), 4);
    assert_eq!(store.unresolved_fraud_flags().unwrap().len(), 1);
    assert_eq!(scheduler.status().cycle_count, 2);
}

/// 手动触发未知代理名：开始任何工作前被拒绝
#[tokio::test]
async fn test_manual_trigger_unknown_agent() {
    let scheduler = build_scheduler(
        Arc::new(InMemoryLedger::new()),
        Arc::new(MemoryStore::new()),
        Duration::from_secs(60),
    );
    assert!(scheduler.run_agent("NoSuchAgent").await.is_err());
    assert!(scheduler.run_agent("Analytics").await.is_ok());
}

/// 轮询直到条件成立；带截止时间，避免依赖固定 sleep 在高负载下抖动
async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            std::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// stop 后 start：周期编号续接，不归零
#[tokio::test]
async fn test_stop_start_resumes_cycle_numbering() {
    let scheduler = build_scheduler(
        Arc::new(InMemoryLedger::new()),
        Arc::new(MemoryStore::new()),
        Duration::from_secs(60),
    );

    scheduler.start();
    wait_until(|| scheduler.status().cycle_count >= 1).await;
    scheduler.stop();
    assert_eq!(scheduler.status().cycle_count, 1);
    assert!(!scheduler.status().running);

    scheduler.start();
    wait_until(|| scheduler.status().cycle_count >= 2).await;
    assert!(scheduler.status().running);
    assert_eq!(scheduler.status().cycle_count, 2);
    scheduler.stop();
}
