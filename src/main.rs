//! Warden - 众筹账本自治代理引擎
//!
//! 入口：初始化日志、加载配置、装配存储与账本镜像、启动周期调度，
//! Ctrl+C 优雅停止。真实链上客户端不在本引擎内，演示用内存镜像播种。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use warden::config::load_config;
use warden::ledger::InMemoryLedger;
use warden::model::{Campaign, CampaignStatus, Donation};
use warden::store::open_store;
use warden::{build_scheduler, observability};

/// 演示数据：一个早期活动与两笔捐赠
fn seeded_ledger() -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_campaigns(vec![Campaign {
        id: 1,
        creator: "GCREATOR".into(),
        title: "Community well".into(),
        target_amount: 1_000_000_000,
        total_donated: 50_000_000,
        status: CampaignStatus::Open,
        end_time: chrono::Utc::now().timestamp() + 14 * 86_400,
    }]);
    let now = chrono::Utc::now().timestamp();
    ledger.push_donation(Donation {
        donor: "GDONORA".into(),
        campaign_id: 1,
        amount: 30_000_000,
        timestamp: now - 600,
    });
    ledger.push_donation(Donation {
        donor: "GDONORB".into(),
        campaign_id: 1,
        amount: 20_000_000,
        timestamp: now - 300,
    });
    ledger
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        warden::config::AppConfig::default()
    });

    let store = open_store(&cfg.store).context("Failed to open store")?;
    let scheduler = build_scheduler(
        seeded_ledger(),
        store,
        Duration::from_secs(cfg.scheduler.interval_secs),
    );

    scheduler.start();
    tracing::info!("Agents registered: {:?}", scheduler.agent_names());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Received Ctrl+C, shutting down");
    scheduler.stop();

    Ok(())
}
