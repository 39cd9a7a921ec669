//! Failed-dependency policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 依存タスクが失敗したとき、このタスクをどう扱うか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailedDependencyAction {
    /// 依存の失敗を無視して実行する
    Process,
    /// CANCELED_BEFORE_STARTING にする
    #[default]
    Cancel,
    /// DISABLED にする
    Disable,
}

impl FailedDependencyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FailedDependencyAction::Process => "PROCESS",
            FailedDependencyAction::Cancel => "CANCEL",
            FailedDependencyAction::Disable => "DISABLE",
        }
    }

    /// 保存値を解釈する。認識できない値は `None`
    pub fn parse(s: &str) -> Option<Self> {
        [Self::Process, Self::Cancel, Self::Disable]
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// 保存値を解釈し、認識できなければデフォルト（CANCEL）に戻す
    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl fmt::Display for FailedDependencyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_cancel() {
        assert_eq!(FailedDependencyAction::default(), FailedDependencyAction::Cancel);
    }

    #[test]
    fn parse_accepts_any_case() {
        assert_eq!(
            FailedDependencyAction::parse("disable"),
            Some(FailedDependencyAction::Disable)
        );
        assert_eq!(
            FailedDependencyAction::parse("Process"),
            Some(FailedDependencyAction::Process)
        );
    }

    #[test]
    fn unknown_value_falls_back_to_default() {
        assert_eq!(FailedDependencyAction::parse("retry"), None);
        assert_eq!(
            FailedDependencyAction::parse_or_default("retry"),
            FailedDependencyAction::Cancel
        );
    }
}
