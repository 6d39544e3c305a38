// Turns a raw response into node data: existence, the entity payload, inline collections as
// nested nodes, collection elements as result nodes, and the continuation link.

use crate::node::RequestNode;
use bytes::Bytes;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use sprest_core::envelope::{
    self, app_web_metadata_uri, inline_results, is_deferred, next_link, DATA_KEY, ERROR_KEY,
    EXISTS_KEY, JSON_STRING_PROPERTIES, METADATA_KEY, RESULTS_KEY,
};
use sprest_core::{normalize_type_name, RequestType};
use sprest_transport::RawResponse;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub(crate) struct NodeData {
    pub exists: bool,
    pub status: Option<u16>,
    pub payload: Value,
    pub nested: IndexMap<String, RequestNode>,
    pub deferred: Vec<String>,
    pub results: Vec<RequestNode>,
    pub buffer: Option<Bytes>,
    pub entity_type: Option<String>,
    pub next: Option<String>,
}

impl NodeData {
    pub fn missing(status: Option<u16>) -> Self {
        Self {
            exists: false,
            status,
            ..Default::default()
        }
    }
}

/// Decode a JSON body; empty or malformed bodies read as `{}`.
pub(crate) fn decode(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(body).unwrap_or_else(|err| {
        warn!("Treating malformed response body as empty: {}", err);
        Value::Object(Map::new())
    })
}

pub(crate) fn from_response(node: &RequestNode, raw: &RawResponse) -> NodeData {
    if !raw.is_success() {
        debug!("{} does not exist (status {})", node.id(), raw.status);
        return NodeData::missing(Some(raw.status));
    }

    if node.request_type() == RequestType::GetBuffer {
        return NodeData {
            exists: true,
            status: Some(raw.status),
            buffer: Some(raw.body_bytes()),
            ..Default::default()
        };
    }

    let root = decode(&raw.body_text());
    let no_error = root.get(ERROR_KEY).is_none();
    let mut data = match root.get(DATA_KEY) {
        Some(entity) => {
            let mut data = expand(node, entity.clone());
            data.exists = entity
                .get(EXISTS_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(no_error);
            data
        }
        None => NodeData {
            exists: no_error,
            ..Default::default()
        },
    };
    data.status = Some(raw.status);
    data
}

/// Materialize one entity object owned by `owner`.
pub(crate) fn expand(owner: &RequestNode, mut entity: Value) -> NodeData {
    rewrite_metadata_uri(owner, &mut entity);

    let mut data = NodeData {
        exists: true,
        ..Default::default()
    };

    if let Value::Object(map) = &mut entity {
        for (key, value) in map.iter_mut() {
            if key == METADATA_KEY || key == RESULTS_KEY {
                continue;
            }
            if is_deferred(value) {
                data.deferred.push(key.clone());
                continue;
            }
            if JSON_STRING_PROPERTIES.contains(&key.as_str()) {
                if let Some(parsed) = value.as_str().and_then(|s| serde_json::from_str(s).ok()) {
                    *value = parsed;
                }
            }
            if let Some(results) = inline_results(value) {
                let collection = owner.nested_collection(key, results.clone());
                data.nested.insert(key.clone(), collection);
            }
        }
    }

    data.entity_type = Some(entity_type(owner, &entity));
    if let Some(results) = entity.get(RESULTS_KEY).and_then(Value::as_array) {
        data.results = results
            .iter()
            .map(|result| owner.result_node(result.clone()))
            .collect();
    }
    data.next = next_link(&entity).map(str::to_string);
    data.payload = entity;
    data
}

// Type of a collection comes from its first element, pluralized.
fn entity_type(owner: &RequestNode, entity: &Value) -> String {
    let first = entity
        .get(RESULTS_KEY)
        .and_then(Value::as_array)
        .and_then(|results| results.first());
    let source = first.unwrap_or(entity);

    let raw = envelope::metadata_type(source)
        .map(str::to_string)
        .unwrap_or_else(|| owner.endpoint().to_string());
    normalize_type_name(&raw, first.is_some())
}

fn rewrite_metadata_uri(owner: &RequestNode, entity: &mut Value) {
    let Some(uri) = envelope::metadata_uri(entity) else {
        return;
    };
    let rewritten = app_web_metadata_uri(
        owner.client().context(),
        uri,
        owner.target().url.as_deref(),
    );
    if let Some(rewritten) = rewritten {
        if let Some(metadata) = entity.get_mut(METADATA_KEY) {
            metadata["uri"] = Value::String(rewritten);
        }
    }
}
