//! TaskScheduler port - タスクが必要とするスケジューラ側の機能
//!
//! タスクは entry を書き換える前に必ず `holds_scheduler_lock()` を確認します。
//! - true: スケジューラ全体のロックを既に持っているので、そのまま書く
//! - false: `write_lock_entry()` で entry 単位のロックを取ってから書く
//!
//! 自分のスレッドが持っているスケジューラロックの下で entry ロックを待つと
//! 自己デッドロックになり得るため、この順序を守ります。

use crate::domain::Dn;
use crate::lock::EntryLock;

pub trait TaskScheduler: Send + Sync {
    /// 現在のスレッドがスケジューラ全体のロックを保持しているか
    fn holds_scheduler_lock(&self) -> bool;

    /// entry 単位の排他ロックを取得する（取れるまでブロック）
    ///
    /// 返された `EntryLock` を drop すると解放される。
    fn write_lock_entry(&self, dn: &Dn) -> EntryLock;

    /// 状態を今すぐ永続化してほしいという合図
    fn write_state(&self);

    /// 完了通知メールの送信元アドレス
    fn notification_sender_address(&self) -> String;
}
