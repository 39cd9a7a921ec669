//! Entry - タスクを保存する attribute ベースのレコード
//!
//! entry はストレージ層が所有し、タスクは `SharedEntry` 越しに読み書きします。
//! 書き込みは必ず Locking Façade（`task::Task` の各 setter）を通ります。

pub mod accessor;
pub mod time;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::domain::Dn;

pub const ATTR_TASK_ID: &str = "ds-task-id";
pub const ATTR_RECURRING_TASK_ID: &str = "ds-recurring-task-id";
pub const ATTR_TASK_CLASS: &str = "ds-task-class-name";
pub const ATTR_TASK_STATE: &str = "ds-task-state";
pub const ATTR_TASK_SCHEDULED_START_TIME: &str = "ds-task-scheduled-start-time";
pub const ATTR_TASK_ACTUAL_START_TIME: &str = "ds-task-actual-start-time";
pub const ATTR_TASK_COMPLETION_TIME: &str = "ds-task-completion-time";
pub const ATTR_TASK_DEPENDENCY_IDS: &str = "ds-task-dependency-id";
pub const ATTR_TASK_FAILED_DEPENDENCY_ACTION: &str = "ds-task-failed-dependency-action";
pub const ATTR_TASK_NOTIFY_ON_COMPLETION: &str = "ds-task-notify-on-completion";
pub const ATTR_TASK_NOTIFY_ON_ERROR: &str = "ds-task-notify-on-error";
pub const ATTR_TASK_LOG_MESSAGES: &str = "ds-task-log-message";

/// 1 つの attribute（名前 + オプション + 値）
///
/// `description` は `ds-task-id;lang-en` のようにオプション込みの表記です。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    description: String,
    values: Vec<String>,
}

impl Attribute {
    pub fn new(description: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            description: description.into(),
            values,
        }
    }

    pub fn single(description: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(description, vec![value.into()])
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// オプションを除いた attribute 名
    pub fn base_name(&self) -> &str {
        self.description
            .split(';')
            .next()
            .unwrap_or(&self.description)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.base_name().eq_ignore_ascii_case(name)
    }
}

/// Directory entry（DN + attribute のリスト）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    dn: Dn,
    attributes: Vec<Attribute>,
}

impl Entry {
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attributes: Vec::new(),
        }
    }

    /// Builder 風に attribute を追加する（テストや投入用）
    pub fn with(mut self, description: &str, values: &[&str]) -> Self {
        self.attributes.push(Attribute::new(
            description,
            values.iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// 名前が一致する attribute を全て返す（オプション違いも含む）
    pub fn all_attributes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attribute> + 'a {
        self.attributes.iter().filter(move |a| a.is_named(name))
    }

    /// 最初に見つかった attribute の値
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|a| a.is_named(name))
            .map(Attribute::values)
            .unwrap_or_default()
    }

    /// 同じ名前の attribute を全て置き換える
    pub fn put_attribute(&mut self, name: &str, values: Vec<String>) {
        self.remove_attribute(name);
        self.attributes.push(Attribute::new(name, values));
    }

    /// REPLACE modification（単一値）
    pub fn replace_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.put_attribute(name, vec![value.into()]);
    }

    /// 既存の値を残したまま 1 つ追加する
    pub fn add_value(&mut self, name: &str, value: impl Into<String>) {
        match self.attributes.iter_mut().find(|a| a.is_named(name)) {
            Some(attr) => attr.values.push(value.into()),
            None => self.attributes.push(Attribute::single(name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|a| !a.is_named(name));
    }
}

/// 複数スレッド（worker / scheduler / 管理クエリ）から共有される entry
pub type SharedEntry = Arc<RwLock<Entry>>;

pub fn shared(entry: Entry) -> SharedEntry {
    Arc::new(RwLock::new(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        Entry::new(Dn::new("ds-task-id=t1,cn=Scheduled Tasks,cn=tasks"))
            .with(ATTR_TASK_ID, &["t1"])
            .with("ds-task-notify-on-error;x-opt", &["a@example.com"])
    }

    #[test]
    fn attribute_names_ignore_case_and_options() {
        let entry = entry();
        assert_eq!(entry.all_attributes("DS-TASK-ID").count(), 1);
        assert_eq!(entry.all_attributes(ATTR_TASK_NOTIFY_ON_ERROR).count(), 1);
        assert_eq!(entry.values(ATTR_TASK_NOTIFY_ON_ERROR), ["a@example.com"]);
    }

    #[test]
    fn put_attribute_replaces_every_variant() {
        let mut entry = entry();
        entry.put_attribute(ATTR_TASK_NOTIFY_ON_ERROR, vec!["b@example.com".into()]);
        let attrs: Vec<_> = entry.all_attributes(ATTR_TASK_NOTIFY_ON_ERROR).collect();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].description(), ATTR_TASK_NOTIFY_ON_ERROR);
        assert_eq!(attrs[0].values(), ["b@example.com"]);
    }

    #[test]
    fn add_value_appends_in_order() {
        let mut entry = entry();
        entry.add_value(ATTR_TASK_LOG_MESSAGES, "first");
        entry.add_value(ATTR_TASK_LOG_MESSAGES, "second");
        assert_eq!(entry.values(ATTR_TASK_LOG_MESSAGES), ["first", "second"]);
    }

    #[test]
    fn missing_attribute_has_no_values() {
        assert!(entry().values(ATTR_TASK_STATE).is_empty());
    }
}
