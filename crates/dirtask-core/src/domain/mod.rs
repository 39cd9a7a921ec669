//! Domain model (ids, states, dependency policy, log messages).
//!
//! どのモジュールも entry やロックを知りません（純粋な値型のみ）。

pub mod dependency;
pub mod ids;
pub mod message;
pub mod state;

pub use dependency::FailedDependencyAction;
pub use ids::{Dn, RecurringTaskId, TaskId};
pub use message::{LogMessage, Severity};
pub use state::{TaskState, UnknownTaskState};
