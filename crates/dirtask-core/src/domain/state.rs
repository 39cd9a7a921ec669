//! State - タスクの状態
//!
//! entry には `COMPLETED_SUCCESSFULLY` のような名前で保存されます。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TaskState はタスクのライフサイクル上の状態
///
/// # 状態遷移
/// - UNSCHEDULED -> WAITING_ON_START_TIME / WAITING_ON_DEPENDENCY -> RUNNING
/// - RUNNING -> COMPLETED_SUCCESSFULLY / COMPLETED_WITH_ERRORS / STOPPED_BY_*
/// - 開始前のキャンセル: -> CANCELED_BEFORE_STARTING
/// - 依存失敗（DISABLE ポリシー）: -> DISABLED
///
/// 終端状態（`is_done`）からの遷移はありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// 状態がまだ保存されていない新規タスク
    Unscheduled,
    Disabled,
    WaitingOnStartTime,
    WaitingOnDependency,
    Running,
    CompletedSuccessfully,
    CompletedWithErrors,
    StoppedByShutdown,
    StoppedByError,
    StoppedByAdministrator,
    CanceledBeforeStarting,
}

impl TaskState {
    pub const ALL: [TaskState; 11] = [
        TaskState::Unscheduled,
        TaskState::Disabled,
        TaskState::WaitingOnStartTime,
        TaskState::WaitingOnDependency,
        TaskState::Running,
        TaskState::CompletedSuccessfully,
        TaskState::CompletedWithErrors,
        TaskState::StoppedByShutdown,
        TaskState::StoppedByError,
        TaskState::StoppedByAdministrator,
        TaskState::CanceledBeforeStarting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Unscheduled => "UNSCHEDULED",
            TaskState::Disabled => "DISABLED",
            TaskState::WaitingOnStartTime => "WAITING_ON_START_TIME",
            TaskState::WaitingOnDependency => "WAITING_ON_DEPENDENCY",
            TaskState::Running => "RUNNING",
            TaskState::CompletedSuccessfully => "COMPLETED_SUCCESSFULLY",
            TaskState::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            TaskState::StoppedByShutdown => "STOPPED_BY_SHUTDOWN",
            TaskState::StoppedByError => "STOPPED_BY_ERROR",
            TaskState::StoppedByAdministrator => "STOPPED_BY_ADMINISTRATOR",
            TaskState::CanceledBeforeStarting => "CANCELED_BEFORE_STARTING",
        }
    }

    /// まだ実行されていない（実行待ち）か
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            TaskState::Unscheduled
                | TaskState::WaitingOnStartTime
                | TaskState::WaitingOnDependency
        )
    }

    pub fn is_running(self) -> bool {
        self == TaskState::Running
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_done(self) -> bool {
        matches!(
            self,
            TaskState::Disabled
                | TaskState::CompletedSuccessfully
                | TaskState::CompletedWithErrors
                | TaskState::StoppedByShutdown
                | TaskState::StoppedByError
                | TaskState::StoppedByAdministrator
                | TaskState::CanceledBeforeStarting
        )
    }

    /// エラー通知の対象にならない状態か
    ///
    /// 実行中・待機中も「成功ではない」扱いです。
    pub fn is_successful(self) -> bool {
        !matches!(
            self,
            TaskState::WaitingOnStartTime
                | TaskState::WaitingOnDependency
                | TaskState::Running
                | TaskState::StoppedByError
                | TaskState::CompletedWithErrors
        )
    }

    /// 管理者によるキャンセル（実行前・実行中）か
    pub fn is_cancelled(self) -> bool {
        matches!(
            self,
            TaskState::StoppedByAdministrator | TaskState::CanceledBeforeStarting
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 認識できない状態文字列
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized task state {0:?}")]
pub struct UnknownTaskState(pub String);

impl FromStr for TaskState {
    type Err = UnknownTaskState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTaskState(s.to_string()))
    }
}
