//! StaticSchema - 固定の attribute type 集合を持つ SchemaProvider

use std::collections::HashMap;

use crate::entry;
use crate::ports::{AttributeType, SchemaProvider};

#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    // key は小文字化した名前
    types: HashMap<String, AttributeType>,
}

impl StaticSchema {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let types = names
            .into_iter()
            .map(|name| (name.to_ascii_lowercase(), AttributeType::new(name)))
            .collect();
        Self { types }
    }

    /// タスク entry が使う attribute を全て含む schema
    pub fn task_schema() -> Self {
        Self::new([
            entry::ATTR_TASK_ID,
            entry::ATTR_RECURRING_TASK_ID,
            entry::ATTR_TASK_CLASS,
            entry::ATTR_TASK_STATE,
            entry::ATTR_TASK_SCHEDULED_START_TIME,
            entry::ATTR_TASK_ACTUAL_START_TIME,
            entry::ATTR_TASK_COMPLETION_TIME,
            entry::ATTR_TASK_DEPENDENCY_IDS,
            entry::ATTR_TASK_FAILED_DEPENDENCY_ACTION,
            entry::ATTR_TASK_NOTIFY_ON_COMPLETION,
            entry::ATTR_TASK_NOTIFY_ON_ERROR,
            entry::ATTR_TASK_LOG_MESSAGES,
        ])
    }
}

impl SchemaProvider for StaticSchema {
    fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.types.get(&name.to_ascii_lowercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let schema = StaticSchema::task_schema();
        let ty = schema.attribute_type("DS-TASK-LOG-MESSAGE").unwrap();
        assert_eq!(ty.name(), entry::ATTR_TASK_LOG_MESSAGES);
        assert!(schema.attribute_type("cn").is_none());
    }
}
