//! Task - entry を背後に持つ管理タスク
//!
//! - `TaskRecord`: entry から読み込んだフィールドと、entry への書き込み（Locking Façade 経由）
//! - `TaskBody`: タスク種別ごとの処理（バックアップ、インデックス再構築など）
//! - `Task`: 上の 2 つを束ね、実行ラッパー `execute()` と割り込みを提供する
//!
//! # 書き込みの規約
//! 永続化されるフィールド（state / 時刻 / ログ）を変更するときは、
//! スケジューラロックを持っていればそのまま、持っていなければ entry ロックを取ってから書く。
//! どちらも持たずに書くことはない。

pub mod log;
pub mod notify;
pub mod ordering;

use std::any::Any;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::context::ServerContext;
use crate::domain::{Dn, FailedDependencyAction, LogMessage, RecurringTaskId, TaskId, TaskState};
use crate::entry::accessor::{get_list, get_scalar, get_timestamp};
use crate::entry::time::format_utc;
use crate::entry::{self, Entry, SharedEntry};
use crate::error::{InitializationError, TaskError};
use crate::ports::TaskScheduler;

pub use self::log::TaskLog;
pub use self::ordering::OrderKey;

/// タスク種別ごとの処理
///
/// 表示名の解決なども全てここで行う（名前による動的呼び出しはしない）。
pub trait TaskBody: Send + Sync {
    /// 管理画面などに出す名前
    fn display_name(&self) -> Option<String> {
        None
    }

    /// タスク固有 attribute の表示名
    fn attribute_display_name(&self, _name: &str) -> Option<String> {
        None
    }

    /// フィールド読み込み後、スケジュール前に呼ばれる
    fn initialize(&self, _task: &TaskRecord) -> Result<(), TaskError> {
        Ok(())
    }

    /// タスク本体。長時間ブロックしてよい
    ///
    /// 返す状態は割り込み要求があればそちらで上書きされる（`resolve_final_state`）。
    fn run(&self, task: &TaskRecord) -> Result<TaskState, TaskError>;

    /// 割り込み要求。受け付ける場合は戻る前に `task.set_interrupt_state()` を呼ぶこと。
    /// ブロックしてはいけない。
    fn interrupt(&self, _task: &TaskRecord, _state: TaskState, _reason: &LogMessage) {}

    /// `interrupt` を実装している種別だけ true を返す
    fn is_interruptable(&self) -> bool {
        false
    }
}

/// entry から読み込んだタスクの状態と、entry への書き込み口
pub struct TaskRecord {
    dn: Dn,
    entry: SharedEntry,
    context: ServerContext,
    scheduler: Arc<dyn TaskScheduler>,

    task_id: TaskId,
    recurring_task_id: Option<RecurringTaskId>,
    state: Mutex<TaskState>,
    interrupt_state: Mutex<Option<TaskState>>,

    scheduled_start_time: i64,
    actual_start_time: AtomicI64,
    completion_time: AtomicI64,

    dependency_ids: Vec<TaskId>,
    failed_dependency_action: FailedDependencyAction,
    notify_on_completion: Vec<String>,
    notify_on_error: Vec<String>,

    log: Mutex<TaskLog>,
}

impl TaskRecord {
    /// entry からフィールドを読み込む
    ///
    /// 失敗した場合 entry は変更されず、TaskRecord も作られない。
    pub fn load(
        entry: SharedEntry,
        context: ServerContext,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Result<Self, InitializationError> {
        let fields = LoadedFields::read(&entry.read(), &context)?;
        let LoadedFields {
            dn,
            task_id,
            recurring_task_id,
            state,
            scheduled_start_time,
            actual_start_time,
            completion_time,
            dependency_ids,
            failed_dependency_action,
            notify_on_completion,
            notify_on_error,
            log_messages,
        } = fields;

        if completion_time > 0 && !state.is_done() {
            warn!(%dn, %state, completion_time, "task entry has a completion time but is not done");
        }

        Ok(Self {
            dn,
            entry,
            context,
            scheduler,
            task_id,
            recurring_task_id,
            state: Mutex::new(state),
            interrupt_state: Mutex::new(None),
            scheduled_start_time,
            actual_start_time: AtomicI64::new(actual_start_time),
            completion_time: AtomicI64::new(completion_time),
            dependency_ids,
            failed_dependency_action,
            notify_on_completion,
            notify_on_error,
            log: Mutex::new(TaskLog::resume(log_messages)),
        })
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// 背後の entry（管理クエリはここから読む）
    pub fn entry(&self) -> &SharedEntry {
        &self.entry
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn recurring_task_id(&self) -> Option<&RecurringTaskId> {
        self.recurring_task_id.as_ref()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring_task_id.is_some()
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub fn interrupt_state(&self) -> Option<TaskState> {
        *self.interrupt_state.lock()
    }

    /// 割り込みを受け付けたことを記録する（state 自体は変えない）
    ///
    /// 終端状態しか受け付けない。それ以外は記録せず false を返す。
    pub fn set_interrupt_state(&self, state: TaskState) -> bool {
        if !state.is_done() {
            warn!(task_id = %self.task_id, %state, "interrupt state must be terminal");
            return false;
        }
        *self.interrupt_state.lock() = Some(state);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.interrupt_state().is_some_and(TaskState::is_cancelled)
    }

    /// 本体が自分で状態を決めないときの最終状態
    pub fn final_task_state(&self) -> TaskState {
        self.resolve_final_state(TaskState::CompletedSuccessfully)
    }

    /// 本体が報告した状態と割り込み要求から最終状態を決める。割り込み要求が常に優先
    pub fn resolve_final_state(&self, reported: TaskState) -> TaskState {
        self.interrupt_state().unwrap_or(reported)
    }

    pub fn scheduled_start_time(&self) -> i64 {
        self.scheduled_start_time
    }

    pub fn actual_start_time(&self) -> i64 {
        self.actual_start_time.load(Ordering::Acquire)
    }

    pub fn completion_time(&self) -> i64 {
        self.completion_time.load(Ordering::Acquire)
    }

    pub fn dependency_ids(&self) -> &[TaskId] {
        &self.dependency_ids
    }

    pub fn failed_dependency_action(&self) -> FailedDependencyAction {
        self.failed_dependency_action
    }

    pub fn notify_on_completion(&self) -> &[String] {
        &self.notify_on_completion
    }

    pub fn notify_on_error(&self) -> &[String] {
        &self.notify_on_error
    }

    /// ログ行のコピー
    pub fn log_messages(&self) -> Vec<String> {
        self.log.lock().messages().to_vec()
    }

    /// ordering 用のスナップショット
    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            completion_time: self.completion_time(),
            actual_start_time: self.actual_start_time(),
            scheduled_start_time: self.scheduled_start_time,
            task_id: self.task_id.clone(),
        }
    }

    /// Locking Façade: 必要なら entry ロックを取り、entry を書き換える
    ///
    /// ロックは `f` がどう終わっても（panic を含む）スコープを抜けた時点で解放される。
    fn mutate<R>(&self, f: impl FnOnce(&mut Entry) -> R) -> R {
        let _entry_lock = if self.scheduler.holds_scheduler_lock() {
            None
        } else {
            Some(self.scheduler.write_lock_entry(&self.dn))
        };
        let mut entry = self.entry.write();
        f(&mut entry)
    }

    /// 状態を変更して entry に保存する。終端状態からの遷移は拒否して false
    pub fn set_state(&self, new_state: TaskState) -> bool {
        self.mutate(|stored| {
            let mut state = self.state.lock();
            if state.is_done() && *state != new_state {
                warn!(task_id = %self.task_id, from = %*state, to = %new_state, "refusing to leave a terminal state");
                return false;
            }
            debug!(task_id = %self.task_id, from = %*state, to = %new_state, "task state change");
            *state = new_state;
            stored.replace_attribute(entry::ATTR_TASK_STATE, new_state.as_str());
            true
        })
    }

    pub(crate) fn set_actual_start_time(&self, millis: i64) {
        self.mutate(|stored| {
            self.actual_start_time.store(millis, Ordering::Release);
            stored.replace_attribute(entry::ATTR_TASK_ACTUAL_START_TIME, format_utc(millis));
        });
    }

    /// 完了時刻を記録する。終端状態でなければ記録しない
    pub fn set_completion_time(&self, millis: i64) -> bool {
        self.mutate(|stored| {
            let state = *self.state.lock();
            if !state.is_done() {
                warn!(task_id = %self.task_id, %state, "completion time requires a terminal state");
                return false;
            }
            self.completion_time.store(millis, Ordering::Release);
            stored.replace_attribute(entry::ATTR_TASK_COMPLETION_TIME, format_utc(millis));
            true
        })
    }

    /// 終端状態と完了時刻を同じロック区間で記録する
    pub fn mark_completed(&self, final_state: TaskState, millis: i64) -> bool {
        if !final_state.is_done() {
            warn!(task_id = %self.task_id, state = %final_state, "cannot complete with a non-terminal state");
            return false;
        }
        self.mutate(|stored| {
            let mut state = self.state.lock();
            if state.is_done() && *state != final_state {
                warn!(task_id = %self.task_id, from = %*state, to = %final_state, "task already finished");
                return false;
            }
            *state = final_state;
            stored.replace_attribute(entry::ATTR_TASK_STATE, final_state.as_str());
            self.completion_time.store(millis, Ordering::Release);
            stored.replace_attribute(entry::ATTR_TASK_COMPLETION_TIME, format_utc(millis));
            true
        })
    }

    /// タスク固有 attribute の値を置き換える（進捗の記録など）
    pub fn replace_attribute_value(&self, name: &str, value: &str) {
        self.mutate(|stored| stored.replace_attribute(name, value));
    }
}

/// entry から読み取った値（まだ TaskRecord になっていない）
struct LoadedFields {
    dn: Dn,
    task_id: TaskId,
    recurring_task_id: Option<RecurringTaskId>,
    state: TaskState,
    scheduled_start_time: i64,
    actual_start_time: i64,
    completion_time: i64,
    dependency_ids: Vec<TaskId>,
    failed_dependency_action: FailedDependencyAction,
    notify_on_completion: Vec<String>,
    notify_on_error: Vec<String>,
    log_messages: Vec<String>,
}

impl LoadedFields {
    fn read(entry: &Entry, context: &ServerContext) -> Result<Self, InitializationError> {
        let dn = entry.dn().clone();

        // task id と recurring task id の少なくとも一方が必要。
        // recurring のインスタンスで id が無ければここで生成する。
        let task_id = get_scalar(entry, entry::ATTR_TASK_ID, false)?;
        let recurring_task_id =
            get_scalar(entry, entry::ATTR_RECURRING_TASK_ID, false)?.map(RecurringTaskId::new);
        let task_id = match (task_id, &recurring_task_id) {
            (Some(id), _) => TaskId::new(id),
            (None, Some(_)) => context.ids().generate_task_id(),
            (None, None) => {
                return Err(InitializationError::MissingAttribute {
                    dn,
                    attribute: entry::ATTR_TASK_ID.to_string(),
                });
            }
        };

        let state = match get_scalar(entry, entry::ATTR_TASK_STATE, false)? {
            None => TaskState::Unscheduled,
            Some(value) => value
                .parse()
                .map_err(|_| InitializationError::InvalidState {
                    dn: dn.clone(),
                    value,
                })?,
        };

        let scheduled_start_time = get_timestamp(entry, entry::ATTR_TASK_SCHEDULED_START_TIME)?;
        let actual_start_time = get_timestamp(entry, entry::ATTR_TASK_ACTUAL_START_TIME)?;
        let completion_time = get_timestamp(entry, entry::ATTR_TASK_COMPLETION_TIME)?;

        let dependency_ids = get_list(entry, entry::ATTR_TASK_DEPENDENCY_IDS)?
            .into_iter()
            .map(TaskId::new)
            .collect();
        let failed_dependency_action =
            get_scalar(entry, entry::ATTR_TASK_FAILED_DEPENDENCY_ACTION, false)?
                .map(|value| FailedDependencyAction::parse_or_default(&value))
                .unwrap_or_default();

        Ok(Self {
            dn,
            task_id,
            recurring_task_id,
            state,
            scheduled_start_time,
            actual_start_time,
            completion_time,
            dependency_ids,
            failed_dependency_action,
            notify_on_completion: get_list(entry, entry::ATTR_TASK_NOTIFY_ON_COMPLETION)?,
            notify_on_error: get_list(entry, entry::ATTR_TASK_NOTIFY_ON_ERROR)?,
            log_messages: get_list(entry, entry::ATTR_TASK_LOG_MESSAGES)?,
        })
    }
}

/// 読み込み済みのタスクと、その種別の処理
pub struct Task {
    record: TaskRecord,
    body: Box<dyn TaskBody>,
}

impl Task {
    /// entry を読み込み、本体の `initialize` まで済ませる
    pub fn initialize(
        entry: SharedEntry,
        context: ServerContext,
        scheduler: Arc<dyn TaskScheduler>,
        body: Box<dyn TaskBody>,
    ) -> Result<Self, InitializationError> {
        let record = TaskRecord::load(entry, context, scheduler)?;
        body.initialize(&record)
            .map_err(|source| InitializationError::Body {
                task_id: record.task_id.clone(),
                source,
            })?;
        Ok(Self { record, body })
    }

    pub fn record(&self) -> &TaskRecord {
        &self.record
    }

    pub fn display_name(&self) -> Option<String> {
        self.body.display_name()
    }

    pub fn attribute_display_name(&self, name: &str) -> Option<String> {
        self.body.attribute_display_name(name)
    }

    pub fn is_interruptable(&self) -> bool {
        self.body.is_interruptable()
    }

    /// 実行ラッパー
    ///
    /// 開始時刻と RUNNING を記録してから本体を呼ぶ。本体のエラーや panic は
    /// ここで STOPPED_BY_ERROR に変換され、呼び出し側には伝わらない。
    /// 本体が終端でない状態を返した場合も STOPPED_BY_ERROR になる。
    /// 最終状態の entry への記録はスケジューラが行う。
    pub fn execute(&self) -> TaskState {
        let record = &self.record;
        record.set_actual_start_time(record.context.clock().now_millis());
        record.set_state(TaskState::Running);
        record.scheduler.write_state();

        match panic::catch_unwind(AssertUnwindSafe(|| self.body.run(record))) {
            Ok(Ok(reported)) => {
                let resolved = record.resolve_final_state(reported);
                if resolved.is_done() {
                    resolved
                } else {
                    error!(task_id = %record.task_id, dn = %record.dn, state = %resolved, "task reported a non-terminal final state");
                    TaskState::StoppedByError
                }
            }
            Ok(Err(err)) => {
                error!(task_id = %record.task_id, dn = %record.dn, error = %err, "task execution failed");
                TaskState::StoppedByError
            }
            Err(payload) => {
                let err = TaskError::Panicked(panic_message(payload.as_ref()));
                error!(task_id = %record.task_id, dn = %record.dn, error = %err, "task execution failed");
                TaskState::StoppedByError
            }
        }
    }

    /// 割り込みを要求する。受け付けられたら true
    ///
    /// 割り込みは協調的で、本体が `interrupt_state()` を見て自分で終わる。
    pub fn interrupt(&self, state: TaskState, reason: &LogMessage) -> bool {
        if !self.body.is_interruptable() {
            debug!(task_id = %self.record.task_id, "task type is not interruptable");
            return false;
        }
        self.body.interrupt(&self.record, state, reason);
        self.record.interrupt_state().is_some()
    }
}

impl Deref for Task {
    type Target = TaskRecord;

    fn deref(&self) -> &TaskRecord {
        &self.record
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::ports::IdGenerator;

    #[test]
    fn load_reads_every_field() {
        let entry = task_entry("t1")
            .with(entry::ATTR_TASK_STATE, &["waiting_on_dependency"])
            .with(entry::ATTR_TASK_SCHEDULED_START_TIME, &["20240101000000Z"])
            .with(entry::ATTR_TASK_DEPENDENCY_IDS, &["t0", "t-1"])
            .with(entry::ATTR_TASK_FAILED_DEPENDENCY_ACTION, &["disable"])
            .with(entry::ATTR_TASK_NOTIFY_ON_COMPLETION, &["a@example.com"])
            .with(entry::ATTR_TASK_NOTIFY_ON_ERROR, &["b@example.com"]);
        let record = load(entry, StubScheduler::new(false));

        assert_eq!(record.task_id().as_str(), "t1");
        assert!(!record.is_recurring());
        assert_eq!(record.state(), TaskState::WaitingOnDependency);
        assert!(record.scheduled_start_time() > 0);
        assert_eq!(record.actual_start_time(), -1);
        assert_eq!(record.completion_time(), -1);
        assert_eq!(
            record.dependency_ids(),
            [TaskId::new("t0"), TaskId::new("t-1")]
        );
        assert_eq!(record.failed_dependency_action(), FailedDependencyAction::Disable);
        assert_eq!(record.notify_on_completion(), ["a@example.com"]);
        assert_eq!(record.notify_on_error(), ["b@example.com"]);
    }

    #[test]
    fn missing_state_means_unscheduled() {
        let record = load(task_entry("t1"), StubScheduler::new(false));
        assert_eq!(record.state(), TaskState::Unscheduled);
        assert_eq!(record.failed_dependency_action(), FailedDependencyAction::Cancel);
    }

    #[test]
    fn unknown_failed_dependency_action_uses_default() {
        let entry = task_entry("t1").with(entry::ATTR_TASK_FAILED_DEPENDENCY_ACTION, &["ignore"]);
        let record = load(entry, StubScheduler::new(false));
        assert_eq!(record.failed_dependency_action(), FailedDependencyAction::Cancel);
    }

    #[test]
    fn recurring_instance_without_id_gets_generated_id() {
        let entry = Entry::new(Dn::new("cn=instance,cn=tasks"))
            .with(entry::ATTR_RECURRING_TASK_ID, &["nightly-backup"]);
        let record = load(entry, StubScheduler::new(false));
        assert!(record.is_recurring());
        assert_eq!(record.recurring_task_id().unwrap().as_str(), "nightly-backup");
        assert_eq!(record.task_id().as_str().len(), 26);
    }

    #[test]
    fn entry_without_any_id_is_rejected_untouched() {
        let entry = Entry::new(Dn::new("cn=orphan,cn=tasks"))
            .with(entry::ATTR_TASK_STATE, &["RUNNING"]);
        let shared = entry::shared(entry.clone());
        let result = TaskRecord::load(
            Arc::clone(&shared),
            context_at(0),
            StubScheduler::new(false),
        );

        assert!(matches!(
            result,
            Err(InitializationError::MissingAttribute { ref attribute, .. }) if attribute == entry::ATTR_TASK_ID
        ));
        assert_eq!(*shared.read(), entry);
    }

    #[test]
    fn unrecognized_state_is_rejected_with_value() {
        let entry = task_entry("t1").with(entry::ATTR_TASK_STATE, &["SLEEPING"]);
        let result = TaskRecord::load(entry::shared(entry), context_at(0), StubScheduler::new(false));
        let err = result.err().unwrap();
        assert!(matches!(err, InitializationError::InvalidState { .. }));
        assert!(err.to_string().contains("SLEEPING"));
    }

    #[test]
    fn malformed_time_is_rejected() {
        let entry = task_entry("t1").with(entry::ATTR_TASK_COMPLETION_TIME, &["soon"]);
        let result = TaskRecord::load(entry::shared(entry), context_at(0), StubScheduler::new(false));
        assert!(matches!(
            result,
            Err(InitializationError::MalformedTimestamp { .. })
        ));
    }

    #[test]
    fn set_state_takes_entry_lock_without_scheduler_lock() {
        let scheduler = StubScheduler::new(false);
        let record = load(task_entry("t1"), Arc::clone(&scheduler));

        assert!(record.set_state(TaskState::WaitingOnStartTime));

        assert_eq!(scheduler.entry_locks_taken.load(Ordering::SeqCst), 1);
        assert!(!scheduler.table.is_locked(record.dn()));
        assert_eq!(
            record.entry().read().values(entry::ATTR_TASK_STATE),
            ["WAITING_ON_START_TIME"]
        );
    }

    #[test]
    fn set_state_skips_entry_lock_under_scheduler_lock() {
        let scheduler = StubScheduler::new(true);
        let record = load(task_entry("t1"), Arc::clone(&scheduler));

        // entry ロックが他で保持されていても、スケジューラロック下なら待たない
        let _held = scheduler.table.write_lock(record.dn());
        assert!(record.set_state(TaskState::Running));
        assert_eq!(scheduler.entry_locks_taken.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn terminal_state_is_final() {
        let record = load(task_entry("t1"), StubScheduler::new(false));
        assert!(record.mark_completed(TaskState::StoppedByError, 5_000));
        assert!(!record.set_state(TaskState::Running));
        assert_eq!(record.state(), TaskState::StoppedByError);
        assert_eq!(record.completion_time(), 5_000);
    }

    #[test]
    fn completion_time_requires_terminal_state() {
        let record = load(task_entry("t1"), StubScheduler::new(false));
        assert!(!record.set_completion_time(5_000));
        assert_eq!(record.completion_time(), -1);
        assert!(record.entry().read().values(entry::ATTR_TASK_COMPLETION_TIME).is_empty());

        record.set_state(TaskState::CompletedSuccessfully);
        assert!(record.set_completion_time(5_000));
        assert_eq!(record.completion_time(), 5_000);
    }

    #[test]
    fn replace_attribute_value_goes_through_the_facade() {
        let scheduler = StubScheduler::new(false);
        let record = load(task_entry("t1"), Arc::clone(&scheduler));
        record.replace_attribute_value("ds-task-backup-progress", "50%");
        assert_eq!(
            record.entry().read().values("ds-task-backup-progress"),
            ["50%"]
        );
        assert_eq!(scheduler.entry_locks_taken.load(Ordering::SeqCst), 1);
    }

    fn initialize(body: Box<dyn TaskBody>, scheduler: Arc<StubScheduler>) -> Task {
        Task::initialize(
            entry::shared(task_entry("t1")),
            context_at(42_000),
            scheduler,
            body,
        )
        .unwrap()
    }

    #[test]
    fn execute_records_start_and_running_before_body() {
        fn observe() -> Result<TaskState, TaskError> {
            Ok(TaskState::CompletedWithErrors)
        }
        let scheduler = StubScheduler::new(false);
        let task = initialize(ScriptedBody::returning(observe), Arc::clone(&scheduler));

        let final_state = task.execute();

        assert_eq!(final_state, TaskState::CompletedWithErrors);
        assert_eq!(task.actual_start_time(), 42_000);
        assert_eq!(task.state(), TaskState::Running);
        assert_eq!(scheduler.state_writes.load(Ordering::SeqCst), 1);
        assert_eq!(task.display_name().as_deref(), Some("Scripted"));
    }

    #[test]
    fn execute_maps_body_error_to_stopped_by_error() {
        fn fail() -> Result<TaskState, TaskError> {
            Err(TaskError::failed("disk full"))
        }
        let task = initialize(ScriptedBody::returning(fail), StubScheduler::new(false));
        assert_eq!(task.execute(), TaskState::StoppedByError);
    }

    #[test]
    fn execute_contains_panics() {
        fn explode() -> Result<TaskState, TaskError> {
            panic!("index corrupted")
        }
        let task = initialize(ScriptedBody::returning(explode), StubScheduler::new(false));
        assert_eq!(task.execute(), TaskState::StoppedByError);
    }

    #[test]
    fn default_body_is_not_interruptable() {
        fn ok() -> Result<TaskState, TaskError> {
            Ok(TaskState::CompletedSuccessfully)
        }
        let task = initialize(ScriptedBody::returning(ok), StubScheduler::new(false));
        let accepted = task.interrupt(TaskState::StoppedByAdministrator, &LogMessage::raw("stop"));
        assert!(!accepted);
        assert_eq!(task.interrupt_state(), None);
        assert!(!task.is_cancelled());
    }

    #[test]
    fn interrupt_request_wins_over_reported_state() {
        fn report_errors() -> Result<TaskState, TaskError> {
            Ok(TaskState::CompletedWithErrors)
        }
        let body = Box::new(ScriptedBody {
            outcome: report_errors,
            interruptable: true,
        });
        let task = initialize(body, StubScheduler::new(false));

        assert!(task.interrupt(TaskState::StoppedByAdministrator, &LogMessage::raw("stop")));
        // 割り込みは state を変えない
        assert_eq!(task.state(), TaskState::Unscheduled);
        assert!(task.is_cancelled());
        assert_eq!(task.execute(), TaskState::StoppedByAdministrator);
        assert_eq!(task.final_task_state(), TaskState::StoppedByAdministrator);
    }

    #[test]
    fn body_error_stays_stopped_by_error_even_when_interrupted() {
        fn fail() -> Result<TaskState, TaskError> {
            Err(TaskError::failed("aborted midway"))
        }
        let body = Box::new(ScriptedBody {
            outcome: fail,
            interruptable: true,
        });
        let task = initialize(body, StubScheduler::new(false));
        task.interrupt(TaskState::StoppedByAdministrator, &LogMessage::raw("stop"));
        assert_eq!(task.execute(), TaskState::StoppedByError);
    }

    #[test]
    fn execute_never_returns_a_non_terminal_state() {
        fn still_running() -> Result<TaskState, TaskError> {
            Ok(TaskState::Running)
        }
        let task = initialize(ScriptedBody::returning(still_running), StubScheduler::new(false));
        let final_state = task.execute();
        assert_eq!(final_state, TaskState::StoppedByError);
        assert!(final_state.is_done());
    }

    #[test]
    fn interrupt_state_must_be_terminal() {
        let record = load(task_entry("t1"), StubScheduler::new(false));
        assert!(!record.set_interrupt_state(TaskState::WaitingOnDependency));
        assert_eq!(record.interrupt_state(), None);
        assert!(record.set_interrupt_state(TaskState::StoppedByAdministrator));
        assert_eq!(record.interrupt_state(), Some(TaskState::StoppedByAdministrator));
    }

    #[test]
    fn non_terminal_interrupt_does_not_leak_into_execute() {
        fn ok() -> Result<TaskState, TaskError> {
            Ok(TaskState::CompletedSuccessfully)
        }
        let body = Box::new(ScriptedBody {
            outcome: ok,
            interruptable: true,
        });
        let task = initialize(body, StubScheduler::new(false));
        assert!(!task.interrupt(TaskState::Running, &LogMessage::raw("stop")));
        assert_eq!(task.execute(), TaskState::CompletedSuccessfully);
    }

    #[test]
    fn mark_completed_refuses_non_terminal_state() {
        let record = load(task_entry("t1"), StubScheduler::new(false));
        record.set_state(TaskState::Running);
        assert!(!record.mark_completed(TaskState::WaitingOnStartTime, 5));
        assert_eq!(record.state(), TaskState::Running);
        assert_eq!(record.completion_time(), -1);
        assert!(record.entry().read().values(entry::ATTR_TASK_COMPLETION_TIME).is_empty());
    }

    #[test]
    fn final_state_defaults_to_success() {
        let record = load(task_entry("t1"), StubScheduler::new(false));
        assert_eq!(record.final_task_state(), TaskState::CompletedSuccessfully);
    }

    #[test]
    fn body_initialize_failure_is_an_initialization_error() {
        struct Picky;
        impl TaskBody for Picky {
            fn initialize(&self, _task: &TaskRecord) -> Result<(), TaskError> {
                Err(TaskError::failed("backend id is required"))
            }
            fn run(&self, _task: &TaskRecord) -> Result<TaskState, TaskError> {
                unreachable!()
            }
        }
        let result = Task::initialize(
            entry::shared(task_entry("t1")),
            context_at(0),
            StubScheduler::new(false),
            Box::new(Picky),
        );
        let err = result.err().unwrap();
        assert!(matches!(err, InitializationError::Body { .. }));
        assert!(err.to_string().contains("t1"));
    }

    #[test]
    fn generated_ids_come_from_context() {
        struct Fixed;
        impl IdGenerator for Fixed {
            fn generate_task_id(&self) -> TaskId {
                TaskId::new("generated-1")
            }
        }
        let context = context_at(0).with_ids(Arc::new(Fixed));
        let entry = Entry::new(Dn::new("cn=instance,cn=tasks"))
            .with(entry::ATTR_RECURRING_TASK_ID, &["weekly"]);
        let record =
            TaskRecord::load(entry::shared(entry), context, StubScheduler::new(false)).unwrap();
        assert_eq!(record.task_id().as_str(), "generated-1");
    }
}
