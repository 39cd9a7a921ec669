use thiserror::Error;

use crate::domain::{Dn, TaskId, TaskState};

/// entry からタスクを読み込めなかった（スケジュール要求は拒否される）
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("task entry {dn} is missing required attribute {attribute}")]
    MissingAttribute { dn: Dn, attribute: String },

    #[error("attribute {attribute} of task entry {dn} has no values")]
    NoValues { dn: Dn, attribute: String },

    #[error("task entry {dn} contains multiple attributes of type {attribute}")]
    MultipleAttributes { dn: Dn, attribute: String },

    #[error("attribute {attribute} of task entry {dn} has multiple values")]
    MultipleValues { dn: Dn, attribute: String },

    #[error("cannot parse {attribute} value {value:?} of task entry {dn}: {reason}")]
    MalformedTimestamp {
        dn: Dn,
        attribute: String,
        value: String,
        reason: String,
    },

    #[error("task entry {dn} has invalid state {value:?}")]
    InvalidState { dn: Dn, value: String },

    #[error("task entry {dn} names unknown task class {class:?}")]
    UnknownTaskClass { dn: Dn, class: String },

    #[error("task {task_id} failed to initialize: {source}")]
    Body {
        task_id: TaskId,
        #[source]
        source: TaskError,
    },
}

/// タスク本体の実行エラー。実行ラッパーで STOPPED_BY_ERROR に変換される
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("task body panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

/// 完了通知メールの送信エラー（タスクの結果には影響しない）
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("mail transport rejected message for {recipients:?}: {reason}")]
    Send {
        recipients: Vec<String>,
        reason: String,
    },
}

/// スケジューラ側のエラー
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error("task {0} is already scheduled")]
    DuplicateTask(TaskId),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task {task_id} depends on unknown task {dependency}")]
    UnknownDependency { task_id: TaskId, dependency: TaskId },

    #[error("duplicate body factory for task class {0:?}")]
    DuplicateTaskClass(String),

    #[error("task {task_id} cannot be interrupted in state {state}")]
    NotInterruptable {
        task_id: TaskId,
        state: TaskState,
    },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
