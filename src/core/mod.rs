//! 核心编排层：错误分类、健康状态、周期调度

pub mod error;
pub mod scheduler;
pub mod state;

pub use error::{AgentError, LedgerError, StoreError};
pub use scheduler::{AgentScheduler, DEFAULT_INTERVAL};
pub use state::{AgentHealth, SchedulerStatus};
