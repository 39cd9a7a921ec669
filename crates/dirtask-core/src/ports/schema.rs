//! SchemaProvider port - attribute type の解決
//!
//! サーバーの再起動途中などでは schema が存在しないことがあります。
//! その間のタスクログ書き込みは何もしません（タスクは止めない）。

/// 解決済みの attribute type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeType {
    name: String,
}

impl AttributeType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// schema 上の正式な名前
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub trait SchemaProvider: Send + Sync {
    fn attribute_type(&self, name: &str) -> Option<AttributeType>;
}
