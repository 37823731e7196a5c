/*
[INPUT]:  Routing decisions and user-facing notices from the controller
[OUTPUT]: Route paths, navigation and notification collaborator traits
[POS]:    Workflow boundary - outbound calls to the presenting surface
[UPDATE]: When adding routes or notification levels
*/

use std::fmt;

use tasking_manager_adapter::{ContributionMode, Editor};
use tracing::{error, info, warn};
use url::Url;

/// Destinations the workflow sends the user to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Mapping page with the editor embedded or controlled
    Map { project_id: u64, editor: Editor },
    Validate { project_id: u64, editor: Editor },
    /// Project discovery, used when a project has nothing left to do
    Explore,
    /// Task selection of a project
    ProjectTasks { project_id: u64 },
}

impl Route {
    /// Editing route for `mode`
    pub fn editing(mode: ContributionMode, project_id: u64, editor: Editor) -> Self {
        match mode {
            ContributionMode::Mapping => Route::Map { project_id, editor },
            ContributionMode::Validation => Route::Validate { project_id, editor },
        }
    }

    pub fn to_path(&self) -> String {
        match self {
            Route::Map { project_id, editor } => {
                format!("/projects/{project_id}/map/?editor={}", editor.key())
            }
            Route::Validate { project_id, editor } => {
                format!("/projects/{project_id}/validate/?editor={}", editor.key())
            }
            Route::Explore => "/explore/".to_string(),
            Route::ProjectTasks { project_id } => format!("/projects/{project_id}/tasks/"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

/// Moves the presenting surface to a route or opens a new browsing context
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &Route);

    fn open_window(&self, url: &Url);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Toast-style notices for the user
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Navigator that only records the decision in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &Route) {
        info!(route = %route, "navigate");
    }

    fn open_window(&self, url: &Url) {
        info!(%url, "open window");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => info!(message, "notice"),
            NoticeLevel::Warning => warn!(message, "notice"),
            NoticeLevel::Error => error!(message, "notice"),
        }
    }
}
