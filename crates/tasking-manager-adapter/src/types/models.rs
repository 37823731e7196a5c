/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::enums::{ContributionMode, TaskStatus};
use super::status::UnknownStatus;

/// A unit of work inside a project.
///
/// `task_status` is kept as the raw wire string so that an unrecognised value
/// never fails deserialization of the whole record; use [`Task::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: u64,
    #[serde(default)]
    pub project_id: u64,
    pub task_status: String,
    #[serde(default, alias = "lockedBy", skip_serializing_if = "Option::is_none")]
    pub lock_holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_unlock_seconds: Option<u64>,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, rename = "taskHistory")]
    pub history: Vec<TaskHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_task_instructions: Option<String>,
    /// Outline, present when the task came from the project feature collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<TaskGeometry>,
}

impl Task {
    /// Parse the raw status string.
    pub fn status(&self) -> Result<TaskStatus, UnknownStatus> {
        self.task_status.parse()
    }

    /// Returns true when the task is locked and `username` holds it.
    pub fn is_locked_by(&self, username: &str) -> bool {
        let locked = self.status().map(|s| s.is_locked()).unwrap_or(false);
        locked && self.lock_holder.as_deref() == Some(username)
    }
}

/// One entry of a task's ordered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistoryEntry {
    #[serde(default)]
    pub history_id: Option<u64>,
    pub action: String,
    #[serde(default)]
    pub action_text: Option<String>,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_optional_timestamp"
    )]
    pub action_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub action_by: Option<String>,
}

/// GeoJSON geometry of a task outline.
///
/// Positions are `[lon, lat, ..]` arrays; extra dimensions are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum TaskGeometry {
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

impl TaskGeometry {
    /// Outer and inner rings, flattened across polygons.
    pub fn rings(&self) -> Vec<&Vec<Vec<f64>>> {
        match self {
            TaskGeometry::Polygon(rings) => rings.iter().collect(),
            TaskGeometry::MultiPolygon(polygons) => polygons.iter().flatten().collect(),
        }
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        for ring in self.rings() {
            for position in ring {
                let (Some(&lon), Some(&lat)) = (position.first(), position.get(1)) else {
                    continue;
                };
                bbox = Some(match bbox {
                    Some(existing) => existing.extend(lon, lat),
                    None => BoundingBox::point(lon, lat),
                });
            }
        }
        bbox
    }
}

/// Axis-aligned WGS84 bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn point(lon: f64, lat: f64) -> Self {
        Self {
            min_lon: lon,
            min_lat: lat,
            max_lon: lon,
            max_lat: lat,
        }
    }

    pub fn extend(self, lon: f64, lat: f64) -> Self {
        Self {
            min_lon: self.min_lon.min(lon),
            min_lat: self.min_lat.min(lat),
            max_lon: self.max_lon.max(lon),
            max_lat: self.max_lat.max(lat),
        }
    }

    pub fn union(self, other: BoundingBox) -> Self {
        self.extend(other.min_lon, other.min_lat)
            .extend(other.max_lon, other.max_lat)
    }

    /// `(lon, lat)` of the box centre.
    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Web-map zoom level that roughly fits the box.
    pub fn zoom(&self) -> u8 {
        let span = (self.max_lon - self.min_lon).max((self.max_lat - self.min_lat) * 2.0);
        if span <= 0.0 {
            return 19;
        }
        (360.0 / span).log2().floor().clamp(1.0, 19.0) as u8
    }

    /// `min_lon,min_lat,max_lon,max_lat`
    pub fn to_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Feature of a project's task collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFeature {
    #[serde(default)]
    pub geometry: Option<TaskGeometry>,
    pub properties: Task,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFeatureCollection {
    #[serde(default)]
    pub features: Vec<TaskFeature>,
}

impl TaskFeatureCollection {
    /// Tasks carried by the features, stamped with `project_id` and their outline.
    pub fn into_tasks(self, project_id: u64) -> Vec<Task> {
        self.features
            .into_iter()
            .map(|feature| {
                let mut task = feature.properties;
                task.project_id = project_id;
                task.geometry = feature.geometry.or(task.geometry);
                task
            })
            .collect()
    }
}

/// Subset of a project record the contribution flow needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project_id: u64,
    #[serde(default)]
    pub project_info: Option<ProjectInfo>,
    #[serde(default)]
    pub mapping_editors: Vec<String>,
    #[serde(default)]
    pub validation_editors: Vec<String>,
    #[serde(default)]
    pub custom_editor: Option<CustomEditor>,
    #[serde(default)]
    pub changeset_comment: Option<String>,
    #[serde(default)]
    pub imagery: Option<String>,
}

impl ProjectSummary {
    pub fn name(&self) -> Option<&str> {
        self.project_info.as_ref().map(|info| info.name.as_str())
    }

    /// Editor keys the project allows for `mode`, in project order.
    pub fn editors_for(&self, mode: ContributionMode) -> &[String] {
        match mode {
            ContributionMode::Mapping => &self.mapping_editors,
            ContributionMode::Validation => &self.validation_editors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: String,
}

/// Project-supplied editor, opened from a URL template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEditor {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Tasks the current user holds locks on, as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedTasks {
    #[serde(default)]
    pub locked_tasks: Vec<u64>,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub task_status: Option<String>,
}

impl LockedTasks {
    pub fn is_empty(&self) -> bool {
        self.locked_tasks.is_empty()
    }

    pub fn mode(&self) -> Option<ContributionMode> {
        self.task_status
            .as_deref()
            .and_then(|raw| raw.parse::<TaskStatus>().ok())
            .and_then(ContributionMode::from_locked_status)
    }
}

mod serde_helpers {
    use super::*;

    /// Accepts RFC 3339 and the naive `YYYY-MM-DDTHH:MM:SS.ffffff` form.
    pub fn deserialize_optional_timestamp<'de, D>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(parsed.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}
