/*
[INPUT]:  Chosen editor, project summary and the locked tasks
[OUTPUT]: The editing surface to present (embedded, remote-controlled, or new window)
[POS]:    Editor layer - handoff from the lock flow to an external editing tool
[UPDATE]: When adding an editor or changing how an editor is opened
*/

pub mod josm;
pub mod template;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::{Client, Url};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{BoundingBox, ProjectSummary, Task};

pub use josm::{ProtocolVersion, RemoteControl, DEFAULT_REMOTE_CONTROL_URL};
pub use template::{TemplateParams, expand_template};

const POTLATCH_TEMPLATE: &str =
    "https://www.openstreetmap.org/edit?editor=potlatch2#map={zoom}/{lat}/{lon}";
const FIELD_PAPERS_TEMPLATE: &str = "https://fieldpapers.org/compose#{zoom}/{lat}/{lon}";

/// Editors the contribution flow can hand tasks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Editor {
    /// iD, embedded in the task page
    Id,
    /// RapiD, embedded in the task page
    Rapid,
    /// JOSM, driven through its loopback remote control
    Josm,
    Potlatch2,
    FieldPapers,
    /// Project-supplied URL template
    Custom,
}

/// How an editor is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorSurface {
    InBrowser,
    RemoteControl,
    ExternalUrl,
}

impl Editor {
    pub const ALL: [Editor; 6] = [
        Editor::Id,
        Editor::Rapid,
        Editor::Josm,
        Editor::Potlatch2,
        Editor::FieldPapers,
        Editor::Custom,
    ];

    /// Key used by the API and in the `editor` route parameter
    pub fn key(&self) -> &'static str {
        match self {
            Editor::Id => "ID",
            Editor::Rapid => "RAPID",
            Editor::Josm => "JOSM",
            Editor::Potlatch2 => "POTLATCH_2",
            Editor::FieldPapers => "FIELD_PAPERS",
            Editor::Custom => "CUSTOM",
        }
    }

    pub fn surface(&self) -> EditorSurface {
        match self {
            Editor::Id | Editor::Rapid => EditorSurface::InBrowser,
            Editor::Josm => EditorSurface::RemoteControl,
            Editor::Potlatch2 | Editor::FieldPapers | Editor::Custom => EditorSurface::ExternalUrl,
        }
    }
}

impl fmt::Display for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Editor {
    type Err = EditorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        Editor::ALL
            .into_iter()
            .find(|editor| editor.key() == normalized)
            .ok_or_else(|| EditorError::UnknownEditor(raw.to_string()))
    }
}

/// Pick the editor to open.
///
/// The preferred editor wins when the project allows it; otherwise the first
/// allowed editor is used. Unknown keys in `allowed` are skipped. With no usable
/// allowed editor the preference stands, falling back to iD.
pub fn resolve_editor<S: AsRef<str>>(preferred: &str, allowed: &[S]) -> Editor {
    let allowed: Vec<Editor> = allowed
        .iter()
        .filter_map(|key| key.as_ref().parse().ok())
        .collect();
    let preferred = preferred.parse::<Editor>().ok();

    match (preferred, allowed.first()) {
        (Some(editor), _) if allowed.contains(&editor) => editor,
        (_, Some(first)) => *first,
        (Some(editor), None) => editor,
        (None, None) => Editor::Id,
    }
}

/// Errors from opening an editor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("editor is unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("invalid editor URL template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("locked tasks carry no geometry to open in the editor")]
    MissingGeometry,

    #[error("unknown editor: {0}")]
    UnknownEditor(String),
}

/// What the caller must present after a successful open
#[derive(Debug, Clone, PartialEq)]
pub enum EditorOutcome {
    /// The task page hosts the editor itself
    Embedded { editor: Editor },
    /// The desktop editor accepted the load commands
    RemoteControlled {
        editor: Editor,
        version: ProtocolVersion,
    },
    /// Open `url` in a new browsing context
    OpenWindow { editor: Editor, url: Url },
}

impl EditorOutcome {
    pub fn editor(&self) -> Editor {
        match self {
            EditorOutcome::Embedded { editor }
            | EditorOutcome::RemoteControlled { editor, .. }
            | EditorOutcome::OpenWindow { editor, .. } => *editor,
        }
    }
}

/// Opens locked tasks in the chosen editor
#[derive(Debug, Clone)]
pub struct EditorDispatcher {
    remote_control: RemoteControl,
    changeset_source: String,
}

impl EditorDispatcher {
    /// Dispatcher talking to JOSM on the default loopback port
    pub fn new() -> Result<Self, EditorError> {
        Self::with_remote_control_url(DEFAULT_REMOTE_CONTROL_URL, Duration::from_secs(5))
    }

    pub fn with_remote_control_url(base_url: &str, timeout: Duration) -> Result<Self, EditorError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EditorError::Unreachable {
                reason: err.to_string(),
            })?;
        Ok(Self {
            remote_control: RemoteControl::new(http, base_url)?,
            changeset_source: "Bing".to_string(),
        })
    }

    /// Source tag written on JOSM changesets
    pub fn with_changeset_source(mut self, source: impl Into<String>) -> Self {
        self.changeset_source = source.into();
        self
    }

    pub fn remote_control(&self) -> &RemoteControl {
        &self.remote_control
    }

    pub async fn open(
        &self,
        editor: Editor,
        project: &ProjectSummary,
        tasks: &[Task],
    ) -> Result<EditorOutcome, EditorError> {
        debug!(%editor, project_id = project.project_id, tasks = tasks.len(), "opening editor");
        match editor.surface() {
            EditorSurface::InBrowser => Ok(EditorOutcome::Embedded { editor }),
            EditorSurface::RemoteControl => {
                let version = self.open_remote(project, tasks).await?;
                Ok(EditorOutcome::RemoteControlled { editor, version })
            }
            EditorSurface::ExternalUrl => {
                let template = match editor {
                    Editor::Potlatch2 => POTLATCH_TEMPLATE.to_string(),
                    Editor::FieldPapers => FIELD_PAPERS_TEMPLATE.to_string(),
                    _ => custom_template(project)?,
                };
                let bbox = tasks_bbox(tasks).ok_or(EditorError::MissingGeometry)?;
                let params = TemplateParams::new(project, tasks, bbox);
                let url = expand_template(&template, &params)?;
                info!(%editor, %url, "opening editor in a new window");
                Ok(EditorOutcome::OpenWindow { editor, url })
            }
        }
    }

    async fn open_remote(
        &self,
        project: &ProjectSummary,
        tasks: &[Task],
    ) -> Result<ProtocolVersion, EditorError> {
        let version = self.remote_control.handshake().await?;
        let bbox = tasks_bbox(tasks).ok_or(EditorError::MissingGeometry)?;

        let layer_name = format!(
            "Boundary for task(s): {} Project #{}",
            join_ids(tasks),
            project.project_id
        );
        self.remote_control
            .load_data(&layer_name, &josm::boundary_osm_xml(tasks))
            .await?;

        let comment = project.changeset_comment.clone().unwrap_or_default();
        self.remote_control
            .load_and_zoom(&bbox, &comment, &self.changeset_source)
            .await?;

        if let Some(imagery) = project.imagery.as_deref().filter(|url| url.starts_with("http")) {
            self.remote_control.import(imagery, "Project imagery").await?;
        }

        info!(project_id = project.project_id, ?version, "JOSM loaded locked tasks");
        Ok(version)
    }
}

fn custom_template(project: &ProjectSummary) -> Result<String, EditorError> {
    match &project.custom_editor {
        Some(custom) if custom.enabled => Ok(custom.url.clone()),
        _ => Err(EditorError::InvalidTemplate {
            template: String::new(),
            reason: "project has no enabled custom editor".to_string(),
        }),
    }
}

/// Union of the outlines of `tasks`
pub fn tasks_bbox(tasks: &[Task]) -> Option<BoundingBox> {
    tasks
        .iter()
        .filter_map(|task| task.geometry.as_ref().and_then(|g| g.bbox()))
        .reduce(BoundingBox::union)
}

pub(crate) fn join_ids(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|task| task.task_id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
