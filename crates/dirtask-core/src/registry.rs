//! TaskClassRegistry - `ds-task-class-name` から本体を作るファクトリの表
//!
//! 起動時に組み立て（mutable）、実行中は読むだけ（immutable）。
//! 実行中にロックが要らないよう、スケジューラには `Arc` で渡します。

use std::collections::HashMap;
use std::sync::Arc;

use crate::entry::{self, Entry, accessor::get_scalar};
use crate::error::{InitializationError, SchedulerError};
use crate::task::TaskBody;

/// タスク 1 件ごとに新しい本体を作る
pub type BodyFactory = Arc<dyn Fn() -> Box<dyn TaskBody> + Send + Sync>;

#[derive(Default)]
pub struct TaskClassRegistry {
    factories: HashMap<String, BodyFactory>,
}

impl TaskClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// クラス名に本体ファクトリを登録する。同じ名前の二重登録はエラー
    pub fn register<F>(&mut self, class_name: impl Into<String>, factory: F) -> Result<(), SchedulerError>
    where
        F: Fn() -> Box<dyn TaskBody> + Send + Sync + 'static,
    {
        let class_name = class_name.into();
        if self.factories.contains_key(&class_name) {
            return Err(SchedulerError::DuplicateTaskClass(class_name));
        }
        self.factories.insert(class_name, Arc::new(factory));
        Ok(())
    }

    /// entry のクラス名に対応する本体を作る
    pub fn instantiate(&self, entry: &Entry) -> Result<Box<dyn TaskBody>, InitializationError> {
        let class = get_scalar(entry, entry::ATTR_TASK_CLASS, true)?.unwrap_or_default();
        let factory = self
            .factories
            .get(&class)
            .ok_or_else(|| InitializationError::UnknownTaskClass {
                dn: entry.dn().clone(),
                class,
            })?;
        Ok(factory())
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dn, TaskState};
    use crate::error::TaskError;
    use crate::task::TaskRecord;

    struct Noop;

    impl TaskBody for Noop {
        fn display_name(&self) -> Option<String> {
            Some("No-op".to_string())
        }

        fn run(&self, _task: &TaskRecord) -> Result<TaskState, TaskError> {
            Ok(TaskState::CompletedSuccessfully)
        }
    }

    fn entry_of_class(class: &str) -> Entry {
        Entry::new(Dn::new("ds-task-id=t1,cn=tasks"))
            .with(entry::ATTR_TASK_ID, &["t1"])
            .with(entry::ATTR_TASK_CLASS, &[class])
    }

    #[test]
    fn registered_class_is_instantiated() {
        let mut registry = TaskClassRegistry::new();
        registry.register("org.example.Noop", || Box::new(Noop)).unwrap();

        let body = registry.instantiate(&entry_of_class("org.example.Noop")).unwrap();
        assert_eq!(body.display_name().as_deref(), Some("No-op"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = TaskClassRegistry::new();
        registry.register("noop", || Box::new(Noop)).unwrap();
        let err = registry.register("noop", || Box::new(Noop)).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateTaskClass(ref name) if name == "noop"));
    }

    #[test]
    fn class_names_are_sorted() {
        let mut registry = TaskClassRegistry::new();
        registry.register("org.example.Reindex", || Box::new(Noop)).unwrap();
        registry.register("org.example.Backup", || Box::new(Noop)).unwrap();
        assert_eq!(registry.class_names(), ["org.example.Backup", "org.example.Reindex"]);
    }

    #[test]
    fn unknown_class_is_an_initialization_error() {
        let registry = TaskClassRegistry::new();
        let err = registry.instantiate(&entry_of_class("missing")).err().unwrap();
        assert!(matches!(err, InitializationError::UnknownTaskClass { ref class, .. } if class == "missing"));
    }

    #[test]
    fn class_name_is_required() {
        let registry = TaskClassRegistry::new();
        let entry = Entry::new(Dn::new("ds-task-id=t1,cn=tasks")).with(entry::ATTR_TASK_ID, &["t1"]);
        let err = registry.instantiate(&entry).err().unwrap();
        assert!(matches!(err, InitializationError::MissingAttribute { .. }));
    }
}
