/*
[INPUT]:  Editor URL template, project summary, locked tasks and their bbox
[OUTPUT]: Concrete editor URL for a new browsing context
[POS]:    Editor layer - URL-template based editors
[UPDATE]: When supporting new placeholders
*/

use reqwest::Url;
use url::form_urlencoded::byte_serialize;

use crate::types::{BoundingBox, ProjectSummary, Task};

use super::{EditorError, join_ids};

/// Values substituted into an editor URL template
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParams {
    pub bbox: BoundingBox,
    pub project_id: u64,
    pub task_ids: String,
    pub changeset_comment: String,
}

impl TemplateParams {
    pub fn new(project: &ProjectSummary, tasks: &[Task], bbox: BoundingBox) -> Self {
        Self {
            bbox,
            project_id: project.project_id,
            task_ids: join_ids(tasks),
            changeset_comment: project.changeset_comment.clone().unwrap_or_default(),
        }
    }
}

/// Substitute placeholders into `template`.
///
/// Supported: `{bbox}`, `{centroid}` (`lon,lat`), `{lat}`, `{lon}`, `{zoom}`,
/// `{project_id}`, `{task_ids}`, `{changeset_comment}`. The template must
/// locate the area with `{bbox}`, `{centroid}` or both `{lat}` and `{lon}`.
pub fn expand_template(template: &str, params: &TemplateParams) -> Result<Url, EditorError> {
    let invalid = |reason: &str| EditorError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    let locates_area = template.contains("{bbox}")
        || template.contains("{centroid}")
        || (template.contains("{lat}") && template.contains("{lon}"));
    if !locates_area {
        return Err(invalid("missing {bbox}, {centroid} or {lat}/{lon} placeholder"));
    }

    let (lon, lat) = params.bbox.centroid();
    let comment: String = byte_serialize(params.changeset_comment.as_bytes()).collect();
    let expanded = template
        .replace("{bbox}", &params.bbox.to_param())
        .replace("{centroid}", &format!("{lon:.6},{lat:.6}"))
        .replace("{lat}", &format!("{lat:.6}"))
        .replace("{lon}", &format!("{lon:.6}"))
        .replace("{zoom}", &params.bbox.zoom().to_string())
        .replace("{project_id}", &params.project_id.to_string())
        .replace("{task_ids}", &params.task_ids)
        .replace("{changeset_comment}", &comment);

    if let Some(start) = expanded.find('{') {
        let rest = &expanded[start..];
        let end = rest.find('}').map_or(rest.len(), |i| i + 1);
        return Err(invalid(&format!("unknown placeholder {}", &rest[..end])));
    }

    Url::parse(&expanded).map_err(|err| invalid(&err.to_string()))
}
