// Accessors over the verbose OData envelope:
// `{ "d": { "__metadata": { "type", "uri" }, "results": [...], "__next": "...", ... } }`.

use crate::context::AmbientContext;
use serde_json::Value;

pub const DATA_KEY: &str = "d";
pub const METADATA_KEY: &str = "__metadata";
pub const RESULTS_KEY: &str = "results";
pub const NEXT_KEY: &str = "__next";
pub const DEFERRED_KEY: &str = "__deferred";
pub const ERROR_KEY: &str = "error";
pub const EXISTS_KEY: &str = "Exists";

/// Properties whose string value is itself a JSON document.
pub const JSON_STRING_PROPERTIES: &[&str] =
    &["ClientPeoplePickerResolveUser", "ClientPeoplePickerSearchUser"];

/// `__metadata.type` of an entity object.
pub fn metadata_type(entity: &Value) -> Option<&str> {
    entity.get(METADATA_KEY)?.get("type")?.as_str()
}

/// `__metadata.uri` of an entity object.
pub fn metadata_uri(entity: &Value) -> Option<&str> {
    entity.get(METADATA_KEY)?.get("uri")?.as_str()
}

/// Continuation URL of a collection page.
pub fn next_link(entity: &Value) -> Option<&str> {
    entity.get(NEXT_KEY)?.as_str().filter(|next| !next.is_empty())
}

/// Whether a property value is a `{ "__deferred": { "uri": ... } }` placeholder.
pub fn is_deferred(value: &Value) -> bool {
    value
        .get(DEFERRED_KEY)
        .and_then(|deferred| deferred.get("uri"))
        .is_some()
}

/// The `results` array of a collection-valued property, when its elements are objects.
pub fn inline_results(value: &Value) -> Option<&Vec<Value>> {
    let results = value.get(RESULTS_KEY)?.as_array()?;
    match results.first() {
        None | Some(Value::Object(_)) => Some(results),
        Some(_) => None,
    }
}

/// Route metadata URIs of known misreported types to their addressable collection.
pub fn fix_metadata_uri(uri: &str, metadata_type: Option<&str>) -> String {
    let Some(type_name) = metadata_type else {
        return uri.to_string();
    };

    if is_field_type(type_name) {
        uri.replacen("AvailableFields", "fields", 1)
    } else if type_name.contains("SP.EventReceiverDefinition") {
        uri.replacen("/EventReceiver/", "/EventReceivers/", 1)
    } else {
        uri.to_string()
    }
}

fn is_field_type(type_name: &str) -> bool {
    type_name.starts_with("SP.Field")
        || (type_name.starts_with("SP.") && type_name.ends_with("Field"))
}

/// Inside an app web, point a metadata URI at the target web instead of the app web.
///
/// Returns `None` when no rewrite applies.
pub fn app_web_metadata_uri(
    ctx: &AmbientContext,
    uri: &str,
    target_url: Option<&str>,
) -> Option<String> {
    if !ctx.is_app_web || ctx.web_url.is_empty() {
        return None;
    }
    let host = ctx.web_url.to_lowercase();
    let target = target_url?.to_lowercase();
    if target.starts_with(&host) {
        return None;
    }

    Some(uri.to_lowercase().replacen(&host, &target, 1))
}
