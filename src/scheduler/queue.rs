use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::notify::NotificationEngine;

/// バックグラウンドで処理するタスク
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    ProcessLocation(String),
}

/// タスク投入口（HTTPハンドラーから使う）
#[derive(Debug, Clone)]
pub struct WorkQueue {
    sender: mpsc::Sender<Task>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Task>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// 待たずに投入する。満杯・停止中なら捨てて false を返す
    ///
    /// 捨てた勤務地は次の定期スイープで処理される。
    pub fn submit(&self, task: Task) -> bool {
        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                warn!("Work queue full, dropping {:?}", task);
                false
            }
            Err(TrySendError::Closed(task)) => {
                error!("Work queue closed, dropping {:?}", task);
                false
            }
        }
    }
}

/// タスクを1件ずつ処理するワーカーを起動する
///
/// 失敗はログに残すだけで、投入元には返さない。
pub fn spawn_worker(
    engine: NotificationEngine,
    mut receiver: mpsc::Receiver<Task>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(task) = receiver.recv().await {
            match task {
                Task::ProcessLocation(location) => {
                    if let Err(e) = engine.process_location(&location).await {
                        error!(location = %location, error = %e, "Background processing failed");
                    }
                }
            }
        }
        info!("Work queue closed, worker exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_drops_when_full() {
        let (queue, mut receiver) = WorkQueue::new(1);

        assert!(queue.submit(Task::ProcessLocation("a".into())));
        assert!(!queue.submit(Task::ProcessLocation("b".into())));

        assert_eq!(
            receiver.recv().await,
            Some(Task::ProcessLocation("a".into()))
        );
    }

    #[tokio::test]
    async fn test_submit_after_close() {
        let (queue, receiver) = WorkQueue::new(4);
        drop(receiver);

        assert!(!queue.submit(Task::ProcessLocation("a".into())));
    }
}
