//! Log message model: severity + stable message identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// タスクログの重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Information,
    Notice,
    Warning,
    Error,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Information => "INFORMATION",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// LogMessage は「どのメッセージか」（namespace + ordinal）と本文を持つ
///
/// namespace と ordinal の組は翻訳や検索で使う安定 ID です。
/// 例: `backend-413 message="Beginning backup"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub namespace: String,
    pub ordinal: i32,
    pub text: String,
}

impl LogMessage {
    pub fn new(namespace: impl Into<String>, ordinal: i32, text: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ordinal,
            text: text.into(),
        }
    }

    /// ID を持たないメッセージ（ordinal = -1）
    pub fn raw(text: impl Into<String>) -> Self {
        Self::new("raw", -1, text)
    }

    /// `namespace-ordinal` 形式の ID
    pub fn id(&self) -> String {
        format!("{}-{}", self.namespace, self.ordinal)
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.text.fmt(f)
    }
}
