/*
[INPUT]:  Selection, project tasks, own locked tasks, contribution mode
[OUTPUT]: The primary action offered to the contributor
[POS]:    Workflow domain logic - contribute button computation
[UPDATE]: When the set of offered actions changes
*/

use std::collections::BTreeMap;
use std::fmt;

use tasking_manager_adapter::{ContributionMode, LockedTasks, Task, ValidationPermission};

use crate::selection::{Selection, incompatible_ids, workable_ids};

/// What the contribute button does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributeAction {
    /// Nothing left to work on in this project
    SelectAnotherProject,
    /// Pick a task automatically and lock it for mapping
    MapATask,
    MapSelectedTask,
    ValidateATask,
    ValidateSelectedTask,
    ResumeMapping,
    ResumeValidation,
    /// The user holds locks in another project
    ResumeInOtherProject { project_id: u64 },
    /// Selection contains tasks that do not fit the mode
    SelectCompatibleTasks,
}

impl fmt::Display for ContributeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributeAction::SelectAnotherProject => f.write_str("Select another project"),
            ContributeAction::MapATask => f.write_str("Map a task"),
            ContributeAction::MapSelectedTask => f.write_str("Map selected task"),
            ContributeAction::ValidateATask => f.write_str("Validate a task"),
            ContributeAction::ValidateSelectedTask => f.write_str("Validate selected tasks"),
            ContributeAction::ResumeMapping => f.write_str("Resume mapping"),
            ContributeAction::ResumeValidation => f.write_str("Resume validation"),
            ContributeAction::ResumeInOtherProject { project_id } => {
                write!(f, "Resume work in project #{project_id}")
            }
            ContributeAction::SelectCompatibleTasks => f.write_str("Select compatible tasks"),
        }
    }
}

/// Inputs for `next_action`
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub project_id: u64,
    pub mode: ContributionMode,
    pub permission: ValidationPermission,
    pub selection: &'a Selection,
    pub tasks: &'a BTreeMap<u64, Task>,
    pub locked: &'a LockedTasks,
}

/// Own locks take priority, then the selection, then the project's workable tasks.
pub fn next_action(ctx: &ActionContext<'_>) -> ContributeAction {
    if !ctx.locked.is_empty() {
        match ctx.locked.project_id {
            Some(project_id) if project_id != ctx.project_id => {
                return ContributeAction::ResumeInOtherProject { project_id };
            }
            _ => {
                return match ctx.locked.mode() {
                    Some(ContributionMode::Validation) => ContributeAction::ResumeValidation,
                    _ => ContributeAction::ResumeMapping,
                };
            }
        }
    }

    if !ctx.selection.is_empty() {
        if !incompatible_ids(ctx.selection, ctx.tasks, ctx.mode, ctx.permission).is_empty() {
            return ContributeAction::SelectCompatibleTasks;
        }
        return match ctx.mode {
            ContributionMode::Mapping => ContributeAction::MapSelectedTask,
            ContributionMode::Validation => ContributeAction::ValidateSelectedTask,
        };
    }

    if workable_ids(ctx.tasks, ctx.mode, ctx.permission).is_empty() {
        return ContributeAction::SelectAnotherProject;
    }
    match ctx.mode {
        ContributionMode::Mapping => ContributeAction::MapATask,
        ContributionMode::Validation => ContributeAction::ValidateATask,
    }
}

/// Task picked when contributing without a selection: the lowest workable id
pub fn pick_task(
    tasks: &BTreeMap<u64, Task>,
    mode: ContributionMode,
    permission: ValidationPermission,
) -> Option<u64> {
    workable_ids(tasks, mode, permission).into_iter().next()
}
