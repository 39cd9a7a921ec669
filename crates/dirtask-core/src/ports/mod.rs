//! Ports - 抽象化レイヤー
//!
//! このモジュールはタスク実行コアが依存する外部システム
//! （スケジューラ、メール、schema、時刻、ID 生成）のインターフェースを定義します。
//! グローバルな状態は持たず、必要なものは `ServerContext` として明示的に渡します。

pub mod clock;
pub mod id_generator;
pub mod mail;
pub mod schema;
pub mod scheduler;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::mail::{EmailMessage, MailTransport};
pub use self::schema::{AttributeType, SchemaProvider};
pub use self::scheduler::TaskScheduler;
