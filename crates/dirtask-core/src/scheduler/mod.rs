//! InMemoryScheduler - タスクの受け付け、実行順の決定、完了の記録
//!
//! # 役割
//! - entry を受け取り、クラス名から本体を作ってタスクとして登録する
//! - 待機状態（WAITING_ON_START_TIME / WAITING_ON_DEPENDENCY）を導出する
//! - 依存先の失敗に `FailedDependencyAction` を適用する
//! - 実行可能なタスクを順序どおりに 1 件ずつ渡す
//! - 終わったタスクの最終状態と完了時刻を、スケジューラロックの下で記録する
//!
//! # ロック
//! 全ての状態は `SchedulerLock` の中にあります。タスクにはロックの保持者情報だけを持つ
//! façade を渡すので、スケジューラロックの下でのタスクへの書き込みは entry ロックを取りません。
//! 本体の実行中（`run_task` の中）はスケジューラロックを持ちません。

pub mod status;
pub mod worker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::context::ServerContext;
use crate::domain::{Dn, FailedDependencyAction, LogMessage, Severity, TaskId, TaskState};
use crate::entry::{self, Entry};
use crate::error::SchedulerError;
use crate::lock::{EntryLock, LockOwner, LockTable, SchedulerLock};
use crate::ports::TaskScheduler;
use crate::registry::TaskClassRegistry;
use crate::task::Task;
use crate::task::ordering::sort_tasks;

pub use self::status::StateCounts;
pub use self::worker::WorkerGroup;

/// タスクから見えるスケジューラ（データ本体は持たない）
struct SchedulerFacade {
    owner: Arc<LockOwner>,
    entry_locks: Arc<LockTable>,
    sender: String,
    state_writes: AtomicU64,
}

impl TaskScheduler for SchedulerFacade {
    fn holds_scheduler_lock(&self) -> bool {
        self.owner.held_by_current_thread()
    }

    fn write_lock_entry(&self, dn: &Dn) -> EntryLock {
        self.entry_locks.write_lock(dn)
    }

    fn write_state(&self) {
        let writes = self.state_writes.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(writes, "scheduler state flushed");
    }

    fn notification_sender_address(&self) -> String {
        self.sender.clone()
    }
}

#[derive(Default)]
struct SchedulerState {
    /// 全タスク（single source of truth）
    tasks: HashMap<TaskId, Arc<Task>>,
    /// `next_ready` で渡したが、まだ `run_task` が終わっていないもの
    claimed: HashSet<TaskId>,
    /// 完了通知がまだのもの
    finished: Vec<Arc<Task>>,
}

enum DependencyCheck {
    Satisfied,
    Waiting,
    Failed { dependency: TaskId, state: TaskState },
}

/// `cancel` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// 開始前だったので CANCELED_BEFORE_STARTING になった
    Canceled,
    /// 実行中の本体が停止要求を受け付けた（終わるのは本体が戻ったとき）
    InterruptRequested,
}

pub struct InMemoryScheduler {
    state: SchedulerLock<SchedulerState>,
    facade: Arc<SchedulerFacade>,
    context: ServerContext,
    registry: Arc<TaskClassRegistry>,
    poll_interval: Duration,
    notify: Notify,
}

impl InMemoryScheduler {
    pub fn new(
        config: &SchedulerConfig,
        context: ServerContext,
        registry: Arc<TaskClassRegistry>,
    ) -> Self {
        let state = SchedulerLock::new(SchedulerState::default());
        let facade = Arc::new(SchedulerFacade {
            owner: state.owner(),
            entry_locks: LockTable::new(),
            sender: config.notification_sender.clone(),
            state_writes: AtomicU64::new(0),
        });
        Self {
            state,
            facade,
            context,
            registry,
            poll_interval: config.poll_interval(),
            notify: Notify::new(),
        }
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// `write_state` が呼ばれた回数
    pub fn state_writes(&self) -> u64 {
        self.facade.state_writes.load(Ordering::Relaxed)
    }

    /// entry をタスクとして登録する
    ///
    /// 読み込み・本体の初期化・重複チェック・依存先の存在チェックのどれかに失敗したら
    /// entry は変更されない。
    pub fn schedule_entry(&self, entry: Entry) -> Result<TaskId, SchedulerError> {
        let body = self.registry.instantiate(&entry)?;
        let facade: Arc<dyn TaskScheduler> = self.facade.clone();
        let task = Arc::new(Task::initialize(
            entry::shared(entry),
            self.context.clone(),
            facade,
            body,
        )?);
        let task_id = task.task_id().clone();

        {
            let now = self.context.clock().now_millis();
            let mut state = self.state.lock();
            if state.tasks.contains_key(&task_id) {
                return Err(SchedulerError::DuplicateTask(task_id));
            }
            if let Some(missing) = task
                .dependency_ids()
                .iter()
                .find(|dep| !state.tasks.contains_key(*dep))
            {
                return Err(SchedulerError::UnknownDependency {
                    task_id,
                    dependency: missing.clone(),
                });
            }
            Self::admit(&mut state, &task, now);
            state.tasks.insert(task_id.clone(), Arc::clone(&task));
        }

        info!(
            %task_id,
            dn = %task.dn(),
            state = %task.state(),
            display_name = task.display_name().as_deref().unwrap_or(""),
            "task scheduled"
        );
        self.notify.notify_one();
        Ok(task_id)
    }

    /// 登録時の状態を決める（スケジューラロック下）
    fn admit(state: &mut SchedulerState, task: &Arc<Task>, now: i64) {
        let current = task.state();
        if current.is_running() {
            // 実行中のまま保存されていたタスクは前回の停止で中断されたもの
            warn!(task_id = %task.task_id(), "task was running when the server stopped");
            if task.mark_completed(TaskState::StoppedByShutdown, now) {
                state.finished.push(Arc::clone(task));
            }
            return;
        }
        if !current.is_pending() {
            return;
        }
        let waiting = match Self::check_dependencies(state, task) {
            DependencyCheck::Waiting => Some(TaskState::WaitingOnDependency),
            _ if task.scheduled_start_time() > now => Some(TaskState::WaitingOnStartTime),
            _ => None,
        };
        if let Some(waiting) = waiting
            && waiting != current
        {
            task.set_state(waiting);
        }
    }

    fn check_dependencies(state: &SchedulerState, task: &Task) -> DependencyCheck {
        let mut result = DependencyCheck::Satisfied;
        for dep_id in task.dependency_ids() {
            let Some(dep) = state.tasks.get(dep_id) else {
                continue;
            };
            let dep_state = dep.state();
            if !dep_state.is_done() {
                return DependencyCheck::Waiting;
            }
            if !dep_state.is_successful() && matches!(result, DependencyCheck::Satisfied) {
                result = DependencyCheck::Failed {
                    dependency: dep_id.clone(),
                    state: dep_state,
                };
            }
        }
        result
    }

    /// 次に実行すべきタスクを 1 件渡す。無ければ `None`
    ///
    /// 候補は順序どおりに調べ、途中で待機状態の更新や依存失敗の処理も行う。
    /// 渡したタスクは `run_task` が終わるまで他の呼び出しには渡さない。
    pub fn next_ready(&self) -> Option<Arc<Task>> {
        let now = self.context.clock().now_millis();
        let mut state = self.state.lock();

        let mut candidates: Vec<Arc<Task>> = state
            .tasks
            .values()
            .filter(|task| task.state().is_pending() && !state.claimed.contains(task.task_id()))
            .cloned()
            .collect();
        sort_tasks(&mut candidates);

        for task in candidates {
            match Self::check_dependencies(&state, &task) {
                DependencyCheck::Waiting => {
                    if task.state() != TaskState::WaitingOnDependency {
                        task.set_state(TaskState::WaitingOnDependency);
                    }
                    continue;
                }
                DependencyCheck::Failed { dependency, state: dep_state } => {
                    let action = task.failed_dependency_action();
                    let resolved = match action {
                        FailedDependencyAction::Process => None,
                        FailedDependencyAction::Cancel => Some(TaskState::CanceledBeforeStarting),
                        FailedDependencyAction::Disable => Some(TaskState::Disabled),
                    };
                    if let Some(final_state) = resolved {
                        let reason = LogMessage::raw(format!(
                            "Dependency {dependency} finished in state {dep_state}; \
                             failed dependency action is {action}"
                        ));
                        Self::finish_unstarted(&mut state, &task, final_state, now, &reason);
                        continue;
                    }
                }
                DependencyCheck::Satisfied => {}
            }

            if task.scheduled_start_time() > now {
                if task.state() != TaskState::WaitingOnStartTime {
                    task.set_state(TaskState::WaitingOnStartTime);
                }
                continue;
            }

            state.claimed.insert(task.task_id().clone());
            debug!(task_id = %task.task_id(), "task handed out for execution");
            return Some(task);
        }
        None
    }

    fn finish_unstarted(
        state: &mut SchedulerState,
        task: &Arc<Task>,
        final_state: TaskState,
        now: i64,
        reason: &LogMessage,
    ) {
        task.add_log_message(Severity::Information, reason, None);
        if task.mark_completed(final_state, now) {
            info!(task_id = %task.task_id(), state = %final_state, reason = %reason, "task finished without running");
            state.finished.push(Arc::clone(task));
        }
    }

    /// タスクを実行し、最終状態と完了時刻を記録する（ブロックする）
    ///
    /// 通常は `next_ready` が渡したタスクに対して呼ぶ。
    pub fn run_task(&self, task: &Arc<Task>) -> TaskState {
        let final_state = task.execute();
        let now = self.context.clock().now_millis();
        {
            let mut state = self.state.lock();
            task.mark_completed(final_state, now);
            state.claimed.remove(task.task_id());
            state.finished.push(Arc::clone(task));
        }
        self.facade.write_state();
        info!(task_id = %task.task_id(), state = %final_state, "task finished");
        // 依存していたタスクが動けるようになったかもしれない
        self.notify.notify_waiters();
        final_state
    }

    /// 開始前のタスクをキャンセルする。実行中なら本体に停止を要求する
    pub fn cancel(&self, task_id: &TaskId, reason: &LogMessage) -> Result<CancelOutcome, SchedulerError> {
        let now = self.context.clock().now_millis();
        let task = {
            let mut state = self.state.lock();
            let task = state
                .tasks
                .get(task_id)
                .cloned()
                .ok_or_else(|| SchedulerError::TaskNotFound(task_id.clone()))?;
            let current = task.state();
            if current.is_pending() && !state.claimed.contains(task_id) {
                Self::finish_unstarted(&mut state, &task, TaskState::CanceledBeforeStarting, now, reason);
                return Ok(CancelOutcome::Canceled);
            }
            if current.is_done() {
                return Err(SchedulerError::NotInterruptable {
                    task_id: task_id.clone(),
                    state: current,
                });
            }
            task
        };

        // 本体の interrupt はスケジューラロックの外で呼ぶ
        if task.interrupt(TaskState::StoppedByAdministrator, reason) {
            task.add_log_message(Severity::Information, reason, None);
            info!(%task_id, "interrupt requested");
            Ok(CancelOutcome::InterruptRequested)
        } else {
            Err(SchedulerError::NotInterruptable {
                task_id: task_id.clone(),
                state: task.state(),
            })
        }
    }

    /// 実行中の全タスクに停止を要求する。受け付けられた数を返す
    pub fn interrupt_running(&self, state: TaskState, reason: &LogMessage) -> usize {
        let running: Vec<Arc<Task>> = {
            let guard = self.state.lock();
            guard
                .claimed
                .iter()
                .filter_map(|id| guard.tasks.get(id).cloned())
                .collect()
        };
        running
            .iter()
            .filter(|task| task.interrupt(state, reason))
            .count()
    }

    pub fn get(&self, task_id: &TaskId) -> Option<Arc<Task>> {
        self.state.lock().tasks.get(task_id).cloned()
    }

    /// 全タスクを順序どおりに返す
    pub fn list(&self) -> Vec<Arc<Task>> {
        let mut tasks: Vec<Arc<Task>> = self.state.lock().tasks.values().cloned().collect();
        sort_tasks(&mut tasks);
        tasks
    }

    pub fn counts_by_state(&self) -> StateCounts {
        StateCounts::tally(self.state.lock().tasks.values().map(|task| task.state()))
    }

    /// 実行中または実行待ちのタスクがあるか
    pub fn has_unfinished(&self) -> bool {
        self.state
            .lock()
            .tasks
            .values()
            .any(|task| !task.state().is_done())
    }

    /// 完了通知がまだのタスクを取り出す
    pub fn take_finished(&self) -> Vec<Arc<Task>> {
        std::mem::take(&mut self.state.lock().finished)
    }

    /// 終わったタスクの完了通知を送る。送った数を返す
    ///
    /// 送信に失敗してもタスクの結果は変わらない（警告を出すだけ）。
    pub async fn send_pending_notifications(&self) -> usize {
        let finished = self.take_finished();
        let mut sent = 0;
        for task in finished {
            match task.send_completion_notification().await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(task_id = %task.task_id(), error = %err, "completion notification failed");
                }
            }
        }
        sent
    }

    /// 新しい仕事の合図か、poll 間隔のどちらか早い方まで待つ
    pub async fn wait_for_work(&self) {
        tokio::select! {
            _ = self.notify.notified() => {}
            _ = tokio::time::sleep(self.poll_interval) => {}
        }
    }
}
