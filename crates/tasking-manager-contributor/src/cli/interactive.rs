/*
[INPUT]:  TaskActionController and user input via terminal prompts
[OUTPUT]: Interactive lock -> edit -> submit session
[POS]:    CLI interactive flow
[UPDATE]: When controller operations or dialog actions change
*/

use std::collections::HashMap;

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Input, MultiSelect, Select, theme::ColorfulTheme};
use tasking_manager_adapter::{ContributionMode, MappingOutcome, TaskCategory, ValidationOutcome};
use tasking_manager_contributor::{
    ActionState, DialogAction, ErrorDialog, ErrorKind, SessionDialog, SessionDialogKind,
    SessionPhase, TaskActionController, WorkflowError,
};

pub async fn run_contribute(controller: &TaskActionController, preselected: &[u64]) -> Result<()> {
    let theme = ColorfulTheme::default();
    let settings = controller.settings();
    let project = controller.project().await;
    let name = project
        .as_ref()
        .and_then(|p| p.name())
        .unwrap_or("untitled project");
    println!(
        "{}",
        style(format!("Project #{} | {} | {}", settings.project_id, name, settings.mode))
            .bold()
            .cyan()
    );

    for &task_id in preselected {
        report(controller.select(task_id).await);
    }

    loop {
        if let Some(dialog) = controller.session_dialog().await {
            handle_session_dialog(controller, &dialog, &theme).await?;
            continue;
        }
        if let Some(dialog) = controller.error_dialog().await {
            handle_error_dialog(controller, &dialog, &theme).await?;
            continue;
        }

        let keep_going = match controller.state().await {
            ActionState::NoSelection | ActionState::ReadyToLock => {
                choose_next(controller, &theme).await?
            }
            ActionState::EditingExternally => editing_menu(controller, &theme).await?,
            ActionState::ReadyToSubmit => submit_menu(controller, &theme).await?,
            ActionState::Complete => Confirm::with_theme(&theme)
                .with_prompt("Continue contributing to this project?")
                .default(true)
                .interact()?,
            ActionState::Error(_) => {
                report(controller.dismiss_error().await);
                true
            }
            ActionState::Locking | ActionState::Submitting => true,
        };

        if !keep_going {
            break;
        }
    }

    let held = controller.locked_task_ids().await;
    controller.teardown().await;
    if !held.is_empty() {
        println!(
            "{}",
            style(format!(
                "Tasks {held:?} stay locked until the session expires; run contribute again to resume."
            ))
            .yellow()
        );
    }
    Ok(())
}

async fn choose_next(controller: &TaskActionController, theme: &ColorfulTheme) -> Result<bool> {
    let action = controller.next_action().await;
    let selection = controller.selection().await;
    if !selection.is_empty() {
        println!("Selected tasks: {}", style(format!("{selection:?}")).bold());
    }

    let items = [action.to_string(), "Select tasks".to_string(), "Quit".to_string()];
    let choice = Select::with_theme(theme)
        .with_prompt("What next?")
        .items(&items)
        .default(0)
        .interact()?;
    match choice {
        0 => report(controller.contribute().await),
        1 => select_tasks(controller, theme).await?,
        _ => return Ok(false),
    }
    Ok(true)
}

async fn select_tasks(controller: &TaskActionController, theme: &ColorfulTheme) -> Result<()> {
    let settings = controller.settings();
    let categorized = controller.categorized_tasks().await;
    let held = categorized
        .iter()
        .filter(|(_, category)| *category == Some(TaskCategory::LockedByMe))
        .count();
    if held > 0 {
        println!("You hold {held} lock(s) in this project; contribute to resume them.");
    }
    let tasks: Vec<_> = categorized
        .into_iter()
        .filter(|(_, category)| *category == Some(TaskCategory::Ready))
        .map(|(task, _)| task)
        .collect();
    if tasks.is_empty() {
        println!("{}", style("No tasks available in this mode.").yellow());
        return Ok(());
    }

    let items: Vec<String> = tasks
        .iter()
        .map(|task| {
            format!("#{} | {} | {}", task.task_id, task.task_status, TaskCategory::Ready)
        })
        .collect();
    report(controller.clear_selection().await);
    match settings.mode {
        ContributionMode::Mapping => {
            let index = Select::with_theme(theme)
                .with_prompt("Task to map")
                .items(&items)
                .default(0)
                .interact()?;
            report(controller.select(tasks[index].task_id).await);
        }
        ContributionMode::Validation => {
            let indexes = MultiSelect::with_theme(theme)
                .with_prompt("Tasks to validate")
                .items(&items)
                .interact()?;
            for index in indexes {
                report(controller.select(tasks[index].task_id).await);
            }
        }
    }
    Ok(())
}

async fn editing_menu(controller: &TaskActionController, theme: &ColorfulTheme) -> Result<bool> {
    let items = ["Done editing", "Extend session", "Stop editing", "Quit (keep locks)"];
    let choice = prompt(controller, move || {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Editing")
            .items(&items)
            .default(0)
            .interact()
    })
    .await?;
    match choice {
        0 => report(controller.finish_editing().await),
        1 => report(controller.extend_session().await),
        2 => stop(controller, theme).await?,
        _ => return Ok(false),
    }
    Ok(true)
}

async fn submit_menu(controller: &TaskActionController, theme: &ColorfulTheme) -> Result<bool> {
    let mode = controller.settings().mode;
    let mut items: Vec<&str> = match mode {
        ContributionMode::Mapping => vec![
            "Submit: completely mapped",
            "Submit: bad imagery",
            "Submit: not finished",
            "Split task",
        ],
        ContributionMode::Validation => vec!["Submit: all valid", "Submit: needs more mapping"],
    };
    let fixed = items.len();
    items.extend(["Reopen editor", "Extend session", "Stop editing", "Quit (keep locks)"]);

    let choice = prompt(controller, move || {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Submit")
            .items(&items)
            .default(0)
            .interact()
    })
    .await?;

    if choice < fixed {
        match mode {
            ContributionMode::Mapping if choice == 3 => {
                if Confirm::with_theme(theme)
                    .with_prompt("Split this task into smaller tasks?")
                    .default(false)
                    .interact()?
                {
                    report(controller.split().await);
                }
            }
            ContributionMode::Mapping => {
                let outcome = [
                    MappingOutcome::Mapped,
                    MappingOutcome::BadImagery,
                    MappingOutcome::NotFinished,
                ][choice];
                let comment = ask_comment(theme)?;
                report(controller.submit_mapping(outcome, comment.as_deref()).await);
            }
            ContributionMode::Validation => {
                let verdict = if choice == 0 {
                    ValidationOutcome::Validated
                } else {
                    ValidationOutcome::Invalidated
                };
                let outcomes: HashMap<u64, ValidationOutcome> = controller
                    .locked_task_ids()
                    .await
                    .into_iter()
                    .map(|task_id| (task_id, verdict))
                    .collect();
                let comment = ask_comment(theme)?;
                report(controller.submit_validation(&outcomes, comment.as_deref()).await);
            }
        }
        return Ok(true);
    }

    match choice - fixed {
        0 => report(controller.reopen_editor().await),
        1 => report(controller.extend_session().await),
        2 => stop(controller, theme).await?,
        _ => return Ok(false),
    }
    Ok(true)
}

async fn stop(controller: &TaskActionController, theme: &ColorfulTheme) -> Result<()> {
    let comment = ask_comment(theme)?;
    report(controller.stop(comment.as_deref()).await);
    Ok(())
}

async fn handle_session_dialog(
    controller: &TaskActionController,
    dialog: &SessionDialog,
    theme: &ColorfulTheme,
) -> Result<()> {
    println!("{}", style(&dialog.title).yellow().bold());
    println!("{}", dialog.message);
    match dialog.kind {
        SessionDialogKind::Warning => {
            let extend = Confirm::with_theme(theme)
                .with_prompt(DialogAction::Extend.to_string())
                .default(true)
                .interact()?;
            if extend {
                report(controller.extend_session().await);
            } else {
                controller.dismiss_session_dialog().await;
            }
        }
        SessionDialogKind::Expired => {
            controller.dismiss_session_dialog().await;
        }
    }
    Ok(())
}

async fn handle_error_dialog(
    controller: &TaskActionController,
    dialog: &ErrorDialog,
    theme: &ColorfulTheme,
) -> Result<()> {
    println!("{}", style(&dialog.title).red().bold());
    println!("{}", dialog.message);
    let labels: Vec<String> = dialog.actions.iter().map(ToString::to_string).collect();
    let index = Select::with_theme(theme)
        .items(&labels)
        .default(0)
        .interact()?;

    match dialog.actions[index] {
        DialogAction::Retry if dialog.kind == ErrorKind::Lock => {
            report(controller.contribute().await)
        }
        DialogAction::SelectOtherTasks => {
            report(controller.dismiss_error().await);
            select_tasks(controller, theme).await?;
        }
        DialogAction::StopEditing => {
            report(controller.dismiss_error().await);
            stop(controller, theme).await?;
        }
        _ => report(controller.dismiss_error().await),
    }
    Ok(())
}

/// Wait for a blocking prompt off the runtime thread.
///
/// Session timers keep running meanwhile; a warning or expiry is printed as
/// soon as it happens rather than after the answer.
async fn prompt<T, F>(controller: &TaskActionController, ask: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    let mut phases = controller.watch_session().await;
    phases.mark_unchanged();
    let mut answer = tokio::task::spawn_blocking(ask);

    loop {
        tokio::select! {
            joined = &mut answer => return Ok(joined??),
            changed = phases.changed() => {
                if changed.is_err() {
                    return Ok(answer.await??);
                }
                let phase = *phases.borrow_and_update();
                announce(phase);
            }
        }
    }
}

fn announce(phase: SessionPhase) {
    let dialog = match phase {
        SessionPhase::Warning => SessionDialog::warning(),
        SessionPhase::Expired => SessionDialog::expired(),
        SessionPhase::Active | SessionPhase::Cancelled => return,
    };
    println!();
    println!("{}", style(&dialog.title).yellow().bold());
    println!("{}", dialog.message);
    if dialog.kind == SessionDialogKind::Warning {
        println!("Choose \"Extend session\" to keep your locks.");
    }
}

fn ask_comment(theme: &ColorfulTheme) -> Result<Option<String>> {
    let comment: String = Input::with_theme(theme)
        .with_prompt("Comment (optional)")
        .allow_empty(true)
        .interact_text()?;
    let comment = comment.trim();
    Ok((!comment.is_empty()).then(|| comment.to_string()))
}

/// Print operation failures; dialogs for them are shown on the next turn.
fn report<T>(result: std::result::Result<T, WorkflowError>) {
    if let Err(err) = result
        && err.kind().is_none()
    {
        println!("{}", style(err).red());
    }
}
