//! Status views - 状態ごとのタスク数

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::TaskState;

/// 状態ごとの件数（0 件の状態は含まない）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub by_state: BTreeMap<TaskState, usize>,
}

impl StateCounts {
    pub fn tally(states: impl IntoIterator<Item = TaskState>) -> Self {
        let mut by_state = BTreeMap::new();
        for state in states {
            *by_state.entry(state).or_insert(0) += 1;
        }
        Self { by_state }
    }

    pub fn get(&self, state: TaskState) -> usize {
        self.by_state.get(&state).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.by_state.values().sum()
    }

    pub fn pending(&self) -> usize {
        self.count_where(TaskState::is_pending)
    }

    pub fn running(&self) -> usize {
        self.get(TaskState::Running)
    }

    pub fn done(&self) -> usize {
        self.count_where(TaskState::is_done)
    }

    fn count_where(&self, pred: impl Fn(TaskState) -> bool) -> usize {
        self.by_state
            .iter()
            .filter(|(state, _)| pred(**state))
            .map(|(_, n)| n)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_groups_by_state() {
        let counts = StateCounts::tally([
            TaskState::Running,
            TaskState::WaitingOnDependency,
            TaskState::Unscheduled,
            TaskState::CompletedSuccessfully,
            TaskState::Disabled,
        ]);
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.pending(), 2);
        assert_eq!(counts.running(), 1);
        assert_eq!(counts.done(), 2);
        assert_eq!(counts.get(TaskState::StoppedByError), 0);
    }

    #[test]
    fn serializes_with_entry_state_names() {
        let counts = StateCounts::tally([TaskState::StoppedByError, TaskState::StoppedByError]);
        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json, serde_json::json!({ "by_state": { "STOPPED_BY_ERROR": 2 } }));
    }
}
