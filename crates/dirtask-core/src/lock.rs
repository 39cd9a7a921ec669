//! Two-level locking: スケジューラ全体のロックと entry 単位のロック
//!
//! - `SchedulerLock<T>`: スケジューラの状態を守る粗いロック。
//!   どのスレッドが保持しているかを記録し、`held_by_current_thread()` で問い合わせできる。
//! - `LockTable`: DN ごとの排他ロック。`EntryLock` を drop すると必ず解放される。
//!
//! どちらも再入不可です。スケジューラロックを持っているスレッドは entry ロックを取らずに書きます。

use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::domain::Dn;

/// スケジューラロックの現在の保持スレッド
#[derive(Debug, Default)]
pub struct LockOwner {
    owner: Mutex<Option<ThreadId>>,
}

impl LockOwner {
    pub fn held_by_current_thread(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    fn set(&self, owner: Option<ThreadId>) {
        *self.owner.lock() = owner;
    }
}

/// 保持スレッドを追跡する Mutex
pub struct SchedulerLock<T> {
    data: Mutex<T>,
    owner: Arc<LockOwner>,
}

impl<T> SchedulerLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            data: Mutex::new(data),
            owner: Arc::new(LockOwner::default()),
        }
    }

    /// タスク側の façade と共有するための保持者情報
    pub fn owner(&self) -> Arc<LockOwner> {
        Arc::clone(&self.owner)
    }

    pub fn held_by_current_thread(&self) -> bool {
        self.owner.held_by_current_thread()
    }

    pub fn lock(&self) -> SchedulerGuard<'_, T> {
        let guard = self.data.lock();
        self.owner.set(Some(thread::current().id()));
        SchedulerGuard {
            guard,
            owner: &self.owner,
        }
    }
}

pub struct SchedulerGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    owner: &'a LockOwner,
}

impl<T> Deref for SchedulerGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SchedulerGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for SchedulerGuard<'_, T> {
    fn drop(&mut self) {
        // mutex を手放す前に保持者を消す
        self.owner.set(None);
    }
}

/// DN 単位の排他ロック表
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<Dn>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `dn` の書き込みロックを取得する。他のスレッドが持っていれば解放まで待つ
    pub fn write_lock(self: &Arc<Self>, dn: &Dn) -> EntryLock {
        let mut held = self.held.lock();
        while held.contains(dn) {
            self.released.wait(&mut held);
        }
        held.insert(dn.clone());
        EntryLock {
            table: Arc::clone(self),
            dn: dn.clone(),
        }
    }

    pub fn is_locked(&self, dn: &Dn) -> bool {
        self.held.lock().contains(dn)
    }
}

/// entry 単位のロック。drop（早期 return やエラー経路も含む）で解放される
#[derive(Debug)]
#[must_use = "the entry is unlocked as soon as the guard is dropped"]
pub struct EntryLock {
    table: Arc<LockTable>,
    dn: Dn,
}

impl EntryLock {
    pub fn dn(&self) -> &Dn {
        &self.dn
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        self.table.held.lock().remove(&self.dn);
        self.table.released.notify_all();
    }
}
