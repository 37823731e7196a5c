/*
[INPUT]:  Task ids picked by the user, project tasks, contribution mode
[OUTPUT]: Ordered, duplicate-free selection and its compatibility with the mode
[POS]:    Workflow domain logic - selection model
[UPDATE]: When selection rules change
*/

use std::collections::BTreeMap;

use tasking_manager_adapter::{ContributionMode, Task, ValidationPermission, is_available_for};

/// Ordered set of selected task ids (insertion order, no duplicates)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<u64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `task_id`; false when it was already selected
    pub fn insert(&mut self, task_id: u64) -> bool {
        if self.contains(task_id) {
            return false;
        }
        self.ids.push(task_id);
        true
    }

    /// Make `task_id` the only selected task
    pub fn replace(&mut self, task_id: u64) {
        self.ids.clear();
        self.ids.push(task_id);
    }

    pub fn remove(&mut self, task_id: u64) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| *id != task_id);
        self.ids.len() != before
    }

    /// Keep only the ids for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(u64) -> bool) {
        self.ids.retain(|id| keep(*id));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, task_id: u64) -> bool {
        self.ids.contains(&task_id)
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Selected ids whose task cannot be locked in `mode`, in selection order.
///
/// Ids missing from `tasks` and tasks with an unknown status count as incompatible.
pub fn incompatible_ids(
    selection: &Selection,
    tasks: &BTreeMap<u64, Task>,
    mode: ContributionMode,
    permission: ValidationPermission,
) -> Vec<u64> {
    selection
        .ids()
        .iter()
        .copied()
        .filter(|id| {
            !tasks
                .get(id)
                .is_some_and(|task| is_available_for(&task.task_status, mode, permission))
        })
        .collect()
}

/// Ids of every task that can be locked in `mode`, ascending
pub fn workable_ids(
    tasks: &BTreeMap<u64, Task>,
    mode: ContributionMode,
    permission: ValidationPermission,
) -> Vec<u64> {
    tasks
        .values()
        .filter(|task| is_available_for(&task.task_status, mode, permission))
        .map(|task| task.task_id)
        .collect()
}
