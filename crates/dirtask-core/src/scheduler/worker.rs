//! WorkerGroup - スケジューラからタスクを受け取って実行するワーカー
//!
//! 本体はブロックする処理なので `spawn_blocking` で実行し、
//! 終わるたびに完了通知を送ります。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::InMemoryScheduler;
use crate::domain::{LogMessage, TaskState};

/// Worker group handle.
/// - `request_shutdown()` で新しいタスクの受け取りを止める
/// - `shutdown_and_join()` で実行中のタスクに停止を頼み、全ワーカーの終了を待つ
pub struct WorkerGroup {
    scheduler: Arc<InMemoryScheduler>,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, scheduler: Arc<InMemoryScheduler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let scheduler = Arc::clone(&scheduler);
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, scheduler, &mut rx).await;
            }));
        }

        Self {
            scheduler,
            shutdown_tx,
            joins,
        }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// 新しいタスクを受け取らないようにする（実行中の本体は止めない）
    pub fn request_shutdown(&self) {
        // receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// 実行中のタスクに STOPPED_BY_SHUTDOWN での停止を頼み、全ワーカーの終了を待つ
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let interrupted = self.scheduler.interrupt_running(
            TaskState::StoppedByShutdown,
            &LogMessage::raw("The directory server is shutting down"),
        );
        if interrupted > 0 {
            info!(interrupted, "asked running tasks to stop for shutdown");
        }
        for join in self.joins {
            if let Err(err) = join.await {
                error!(error = %err, "worker terminated abnormally");
            }
        }
        // 最後のタスクの分
        self.scheduler.send_pending_notifications().await;
    }
}

async fn worker_loop(
    worker_id: usize,
    scheduler: Arc<InMemoryScheduler>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    debug!(worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let Some(task) = scheduler.next_ready() else {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = scheduler.wait_for_work() => {}
            }
            continue;
        };

        let task_id = task.task_id().clone();
        debug!(worker_id, %task_id, "running task");

        // 本体はブロックするので専用スレッドで。スケジューラロックはここでは持っていない
        let runner = Arc::clone(&scheduler);
        match tokio::task::spawn_blocking(move || runner.run_task(&task)).await {
            Ok(final_state) => debug!(worker_id, %task_id, state = %final_state, "task done"),
            Err(err) => error!(worker_id, %task_id, error = %err, "task runner failed"),
        }

        scheduler.send_pending_notifications().await;
    }
    debug!(worker_id, "worker stopped");
}
