//! Request router for the roadmap HTTP surface.
//!
//! Transport-agnostic: a request is a method, a path (optionally carrying a
//! query string), query parameters, a JSON body and the caller's user
//! reference as resolved by the host. The `serve` command feeds these in as
//! JSON lines on stdin and writes one response per line on stdout.
//!
//! | Route                           | Success |
//! |---------------------------------|---------|
//! | `POST /votes/{id}`              | 200 `{voteAdded, voteCount}` |
//! | `GET /votes/{id}/count`         | 200 integer |
//! | `GET /votes/counts?ids=1,2`     | 200 `{id: count}` |
//! | `GET /votes/{id}/user`          | 200 bool |
//! | `GET /votes/user/batch?ids=1,2` | 200 `{id: bool}` |
//! | `POST /features`                | 201 feature |
//! | `GET /features`                 | 200 features |
//! | `GET /features/board`           | 200 columns |
//! | `GET /features/{id}`            | 200 feature |
//! | `PUT /features/{id}/status`     | 200 feature (admin) |
//! | `DELETE /features/{id}`         | 204 (admin) |
//! | `POST /comments`                | 201 comment |
//! | `GET /comments?featureId=`      | 200 comments |
//! | `GET /permissions/check-admin`  | 200 bool |
//! | `GET /health`                   | 200 `{status}` |

use crate::app::RoadmapApp;
use crate::core::error::RoadmapError;
use crate::services::comments::NewComment;
use crate::services::features::{FeatureId, FeatureStatus, NewFeature, parse_feature_ids};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiRequest {
    /// Correlation id echoed in the response
    #[serde(default = "default_request_id")]
    pub id: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
    /// User entity reference of the authenticated caller, if any
    #[serde(default)]
    pub caller: Option<String>,
}

pub fn default_request_id() -> String {
    ulid::Ulid::new().to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiResponse {
    pub id: String,
    pub status: u16,
    pub body: Value,
}

impl ApiRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            id: default_request_id(),
            method: method.to_string(),
            path: path.to_string(),
            query: BTreeMap::new(),
            body: Value::Null,
            caller: None,
        }
    }

    pub fn caller(mut self, caller: &str) -> Self {
        self.caller = Some(caller.to_string());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

pub fn error_body(err: &RoadmapError) -> Value {
    json!({ "error": err.kind(), "message": err.to_string() })
}

/// Routes one request. Never panics and never returns `Err`: every failure is
/// mapped to a status code and an error body.
pub fn handle(app: &RoadmapApp, req: &ApiRequest) -> ApiResponse {
    let (path, inline_query) = match req.path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (req.path.as_str(), None),
    };
    let mut query = inline_query.map(parse_query).unwrap_or_default();
    for (k, v) in &req.query {
        query.insert(k.clone(), v.clone());
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let method = req.method.to_ascii_uppercase();

    let (status, body) = match route(app, &method, &segments, &query, &req.body, req.caller.as_deref()) {
        Ok(Some(out)) => out,
        Ok(None) if is_known_path(&segments) => (
            405,
            json!({ "error": "method_not_allowed", "message": format!("{} not allowed on {}", method, path) }),
        ),
        Ok(None) => (
            404,
            json!({ "error": "not_found", "message": format!("no route for {} {}", method, path) }),
        ),
        Err(e) => (e.status_code(), error_body(&e)),
    };

    ApiResponse {
        id: req.id.clone(),
        status,
        body,
    }
}

fn ok<T: Serialize>(status: u16, value: T) -> Result<Option<(u16, Value)>, RoadmapError> {
    Ok(Some((status, serde_json::to_value(value)?)))
}

fn route(
    app: &RoadmapApp,
    method: &str,
    segments: &[&str],
    query: &BTreeMap<String, String>,
    body: &Value,
    caller: Option<&str>,
) -> Result<Option<(u16, Value)>, RoadmapError> {
    match (method, segments) {
        ("GET", ["health"]) => ok(200, json!({ "status": "ok" })),

        ("GET", ["features"]) => ok(200, app.features()?),
        ("POST", ["features"]) => {
            let feature: NewFeature = parse_body(body)?;
            ok(201, app.suggest_feature(caller, &feature)?)
        }
        ("GET", ["features", "board"]) => ok(200, app.board()?),
        ("GET", ["features", id]) => ok(200, app.feature(id.parse()?)?),
        ("DELETE", ["features", id]) => {
            app.delete_feature(caller, id.parse()?)?;
            Ok(Some((204, Value::Null)))
        }
        ("PUT", ["features", id, "status"]) => {
            let id: FeatureId = id.parse()?;
            let status = status_from_body(body)?;
            ok(200, app.set_feature_status(caller, id, status)?)
        }

        ("POST", ["comments"]) => {
            let comment = comment_from_body(body)?;
            ok(201, app.add_comment(caller, &comment)?)
        }
        ("GET", ["comments"]) => {
            let id = query
                .get("featureId")
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| RoadmapError::InputError("featureId is required".to_string()))?
                .parse()?;
            ok(200, app.comments(id)?)
        }

        ("GET", ["votes", "counts"]) => {
            let ids = ids_param(query)?;
            ok(200, keyed_by_id(app.vote_counts(&ids)?))
        }
        ("GET", ["votes", "user", "batch"]) => {
            let ids = ids_param(query)?;
            ok(200, keyed_by_id(app.has_voted_batch(caller, &ids)?))
        }
        ("POST", ["votes", id]) => ok(200, app.toggle_vote(caller, id.parse()?)?),
        ("GET", ["votes", id, "count"]) => ok(200, app.vote_count(id.parse()?)?),
        ("GET", ["votes", id, "user"]) => ok(200, app.has_voted(caller, id.parse()?)?),

        ("GET", ["permissions", "check-admin"]) => ok(200, app.check_admin(caller)?),

        _ => Ok(None),
    }
}

fn is_known_path(segments: &[&str]) -> bool {
    matches!(
        segments,
        ["health"]
            | ["features"]
            | ["features", _]
            | ["features", _, "status"]
            | ["comments"]
            | ["votes", _]
            | ["votes", _, "count"]
            | ["votes", _, "user"]
            | ["votes", "user", "batch"]
            | ["permissions", "check-admin"]
    )
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, RoadmapError> {
    serde_json::from_value(body.clone())
        .map_err(|e| RoadmapError::InputError(format!("invalid request body: {}", e)))
}

fn status_from_body(body: &Value) -> Result<FeatureStatus, RoadmapError> {
    body.get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| RoadmapError::InputError("status is required".to_string()))?
        .parse()
}

// featureId arrives as a number from typed clients and as a string from forms.
fn comment_from_body(body: &Value) -> Result<NewComment, RoadmapError> {
    let feature_id: FeatureId = match body.get("featureId") {
        Some(Value::Number(n)) => n.to_string().parse()?,
        Some(Value::String(s)) => s.parse()?,
        _ => return Err(RoadmapError::InputError("featureId is required".to_string())),
    };
    let text = body
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(NewComment { feature_id, text })
}

/// Missing or blank `ids` is an empty list, not an error.
fn ids_param(query: &BTreeMap<String, String>) -> Result<Vec<FeatureId>, RoadmapError> {
    match query.get("ids") {
        Some(raw) => parse_feature_ids(raw),
        None => Ok(Vec::new()),
    }
}

fn keyed_by_id<V: Serialize>(map: BTreeMap<FeatureId, V>) -> BTreeMap<String, V> {
    map.into_iter().map(|(id, v)| (id.to_string(), v)).collect()
}

fn parse_query(raw: &str) -> BTreeMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
