//! 定期スイープとバックグラウンド処理
//!
//! ```text
//! Scheduler (毎時0分)            POST /api/subscribe
//!     │                               │
//!     └─► Sweeper::run_sweep()        └─► WorkQueue::submit(ProcessLocation)
//!             │                               │
//!             └─► 勤務地ごとに順番に ◄─────────┘ (ワーカー1つで順番に)
//!                 NotificationEngine::process_location()
//! ```

mod queue;
mod sweep;

pub use queue::{spawn_worker, Task, WorkQueue};
pub use sweep::{start_scheduler, SweepReport, Sweeper};
