//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **DisabledMailTransport**: メールサーバー未設定
//! - **LoggingMailTransport**: 送信の代わりに tracing に出す（CLI デモ用）
//! - **MemoryMailTransport**: 送信内容を記録する（テスト用）
//! - **StaticSchema**: 固定の attribute type 集合

pub mod mail;
pub mod schema;

pub use self::mail::{DisabledMailTransport, LoggingMailTransport, MemoryMailTransport};
pub use self::schema::StaticSchema;
