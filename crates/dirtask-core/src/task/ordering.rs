//! Task ordering - 一覧表示と実行順のための全順序
//!
//! 比較は次の順に段階的に行う:
//! 1. 完了時刻（片方だけ完了なら完了している方が先、両方完了なら早い方が先で同時刻は ID 順）
//! 2. 実際の開始時刻（同上）
//! 3. 予定開始時刻の昇順（未設定は「すぐ実行可能」として先頭）、同時刻は ID 順
//!
//! 時刻が 0 以下のものは「未設定」として扱う。

use std::cmp::Ordering;

use super::{Task, TaskRecord};
use crate::domain::TaskId;

/// 比較に使う値のスナップショット
///
/// タスクの時刻は実行中に変わるので、ソート中に比較結果が揺れないよう
/// 先にスナップショットを取ってから並べる。
#[derive(Debug, Clone)]
pub struct OrderKey {
    pub completion_time: i64,
    pub actual_start_time: i64,
    pub scheduled_start_time: i64,
    pub task_id: TaskId,
}

/// 片方でも到達していればその段で決着する。両方未到達なら `None`
fn milestone(a: i64, b: i64, by_id: impl FnOnce() -> Ordering) -> Option<Ordering> {
    match (a > 0, b > 0) {
        (true, true) => Some(a.cmp(&b).then_with(by_id)),
        (true, false) => Some(Ordering::Less),
        (false, true) => Some(Ordering::Greater),
        (false, false) => None,
    }
}

impl OrderKey {
    fn by_id(&self, other: &Self) -> Ordering {
        self.task_id.cmp(&other.task_id)
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_id = || self.by_id(other);
        milestone(self.completion_time, other.completion_time, by_id)
            .or_else(|| milestone(self.actual_start_time, other.actual_start_time, by_id))
            .unwrap_or_else(|| {
                self.scheduled_start_time
                    .max(0)
                    .cmp(&other.scheduled_start_time.max(0))
                    .then_with(by_id)
            })
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// 未設定の時刻は値に関わらず同じ扱いなので、フィールド単位の比較ではなく cmp に合わせる
impl PartialEq for OrderKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderKey {}

impl TaskRecord {
    pub fn compare(&self, other: &TaskRecord) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

/// タスクを順序どおりに並べる（キーは 1 回だけ取る）
pub fn sort_tasks<T: AsRef<Task>>(tasks: &mut [T]) {
    tasks.sort_by_cached_key(|task| task.as_ref().order_key());
}

impl AsRef<Task> for Task {
    fn as_ref(&self) -> &Task {
        self
    }
}
