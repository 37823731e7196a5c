/*
[INPUT]:  Loopback remote-control endpoint of a running JOSM, task outlines, bbox
[OUTPUT]: Version handshake and load/zoom/import commands
[POS]:    Editor layer - remote-controlled desktop editor protocol
[UPDATE]: When the remote-control protocol version or command set changes
*/

use std::fmt::Write as _;

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::types::{BoundingBox, Task};

use super::EditorError;

/// JOSM listens here when remote control is enabled
pub const DEFAULT_REMOTE_CONTROL_URL: &str = "http://127.0.0.1:8111/";

const SUPPORTED_PROTOCOL_MAJOR: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(rename = "protocolversion")]
    protocol_version: ProtocolVersion,
    #[serde(default)]
    application: Option<String>,
}

/// Client for the remote-control HTTP protocol
#[derive(Debug, Clone)]
pub struct RemoteControl {
    http: Client,
    base_url: Url,
}

impl RemoteControl {
    pub fn new(http: Client, base_url: &str) -> Result<Self, EditorError> {
        let base_url = Url::parse(base_url).map_err(|err| EditorError::Unreachable {
            reason: format!("invalid remote control URL {base_url:?}: {err}"),
        })?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET /version, must answer with a supported protocol version
    pub async fn handshake(&self) -> Result<ProtocolVersion, EditorError> {
        let body = self.get("version", &[]).await?;
        let response: VersionResponse =
            serde_json::from_str(&body).map_err(|err| EditorError::Unreachable {
                reason: format!("unrecognised version response: {err}"),
            })?;

        let version = response.protocol_version;
        if version.major != SUPPORTED_PROTOCOL_MAJOR {
            return Err(EditorError::Unreachable {
                reason: format!(
                    "remote control protocol {}.{} is not supported",
                    version.major, version.minor
                ),
            });
        }
        debug!(?version, application = ?response.application, "remote control handshake ok");
        Ok(version)
    }

    /// GET /load_data, adds an OSM XML layer
    pub async fn load_data(&self, layer_name: &str, osm_xml: &str) -> Result<(), EditorError> {
        self.get(
            "load_data",
            &[
                ("new_layer", "true"),
                ("layer_name", layer_name),
                ("layer_locked", "true"),
                ("upload", "never"),
                ("data", osm_xml),
            ],
        )
        .await
        .map(|_| ())
    }

    /// GET /load_and_zoom, downloads OSM data for the box and zooms there
    pub async fn load_and_zoom(
        &self,
        bbox: &BoundingBox,
        changeset_comment: &str,
        changeset_source: &str,
    ) -> Result<(), EditorError> {
        let left = bbox.min_lon.to_string();
        let right = bbox.max_lon.to_string();
        let top = bbox.max_lat.to_string();
        let bottom = bbox.min_lat.to_string();
        self.get(
            "load_and_zoom",
            &[
                ("left", left.as_str()),
                ("right", right.as_str()),
                ("top", top.as_str()),
                ("bottom", bottom.as_str()),
                ("new_layer", "true"),
                ("changeset_comment", changeset_comment),
                ("changeset_source", changeset_source),
            ],
        )
        .await
        .map(|_| ())
    }

    /// GET /import, loads data from a URL
    pub async fn import(&self, url: &str, layer_name: &str) -> Result<(), EditorError> {
        self.get(
            "import",
            &[("new_layer", "true"), ("layer_name", layer_name), ("url", url)],
        )
        .await
        .map(|_| ())
    }

    async fn get(&self, command: &str, params: &[(&str, &str)]) -> Result<String, EditorError> {
        let mut url = self.base_url.join(command).map_err(|err| EditorError::Unreachable {
            reason: err.to_string(),
        })?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| EditorError::Unreachable {
                reason: format!("{command}: {err}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EditorError::Unreachable {
                reason: format!("{command}: remote control answered {status}"),
            });
        }
        response.text().await.map_err(|err| EditorError::Unreachable {
            reason: format!("{command}: {err}"),
        })
    }
}

/// Task outlines as a locked OSM XML layer, one closed way per ring.
pub fn boundary_osm_xml(tasks: &[Task]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><osm version=\"0.6\" generator=\"tasking-manager-adapter\">",
    );
    let mut ways = String::new();
    let mut next_id: i64 = -1;

    for task in tasks {
        let Some(geometry) = &task.geometry else {
            continue;
        };
        for ring in geometry.rings() {
            let mut refs = Vec::with_capacity(ring.len());
            let closed = ring.len() > 1 && ring.first() == ring.last();
            let points = if closed { &ring[..ring.len() - 1] } else { &ring[..] };
            for position in points {
                let (Some(lon), Some(lat)) = (position.first(), position.get(1)) else {
                    continue;
                };
                let _ = write!(xml, "<node id=\"{next_id}\" lat=\"{lat}\" lon=\"{lon}\"/>");
                refs.push(next_id);
                next_id -= 1;
            }
            if refs.is_empty() {
                continue;
            }
            let _ = write!(ways, "<way id=\"{next_id}\">");
            next_id -= 1;
            for node in refs.iter().chain(refs.first()) {
                let _ = write!(ways, "<nd ref=\"{node}\"/>");
            }
            let _ = write!(
                ways,
                "<tag k=\"name\" v=\"Task {}\"/><tag k=\"area\" v=\"yes\"/></way>",
                task.task_id
            );
        }
    }

    xml.push_str(&ways);
    xml.push_str("</osm>");
    xml
}
