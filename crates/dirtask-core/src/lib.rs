//! dirtask-core
//!
//! Core building blocks for directory server administrative tasks.
//!
//! # モジュール構成
//! - **domain**: 値型（ids, state, dependency policy, log message）
//! - **entry**: attribute を持つ entry と、型付きの読み出し・時刻の形式
//! - **ports**: 抽象化レイヤー（TaskScheduler, MailTransport, SchemaProvider, Clock, IdGenerator）
//! - **impls**: ports の開発用・テスト用の実装
//! - **lock**: スケジューラロックと entry ロック
//! - **task**: TaskRecord / TaskBody / Task（実行ラッパー、ログ、通知、順序）
//! - **registry**: タスククラス名から本体を作る表
//! - **scheduler**: InMemoryScheduler と WorkerGroup
//! - **config**: SchedulerConfig
//! - **error**: エラー型

pub mod config;
pub mod context;
pub mod domain;
pub mod entry;
pub mod error;
pub mod impls;
pub mod lock;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod task;

pub use config::SchedulerConfig;
pub use context::ServerContext;
pub use registry::TaskClassRegistry;
pub use scheduler::{CancelOutcome, InMemoryScheduler, StateCounts, WorkerGroup};
pub use task::{Task, TaskBody, TaskRecord};
