// Method descriptors and their resolution into concrete request fragments.
// A descriptor is pure configuration; `MethodInfo::resolve` applies call arguments to it.

use crate::error::SpRestError;
use crate::odata::ODataQuery;
use crate::target::HttpMethod;
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Characters left alone by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// How a method's arguments and result travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RequestType {
    Custom,
    Delete,
    Merge,
    OData,
    #[default]
    Get,
    GetBuffer,
    GetWithArgs,
    GetWithArgsInBody,
    GetWithArgsInQS,
    GetWithArgsValueOnly,
    GetReplace,
    Post,
    PostWithArgs,
    PostWithArgsInBody,
    PostWithArgsInQS,
    PostWithArgsValueOnly,
    PostReplace,
}

impl RequestType {
    pub fn is_post(&self) -> bool {
        matches!(
            self,
            RequestType::Post
                | RequestType::PostWithArgs
                | RequestType::PostWithArgsInBody
                | RequestType::PostWithArgsInQS
                | RequestType::PostWithArgsValueOnly
                | RequestType::PostReplace
        )
    }

    pub fn replaces_endpoint(&self) -> bool {
        matches!(self, RequestType::GetReplace | RequestType::PostReplace)
    }

    pub fn args_in_body(&self) -> bool {
        matches!(
            self,
            RequestType::GetWithArgsInBody | RequestType::PostWithArgsInBody
        )
    }

    pub fn args_in_query(&self) -> bool {
        matches!(
            self,
            RequestType::GetWithArgsInQS | RequestType::PostWithArgsInQS
        )
    }

    pub fn value_only(&self) -> bool {
        matches!(
            self,
            RequestType::GetWithArgsValueOnly | RequestType::PostWithArgsValueOnly
        )
    }

    pub fn default_method(&self) -> HttpMethod {
        match self {
            RequestType::Delete => HttpMethod::Delete,
            RequestType::Merge => HttpMethod::Merge,
            t if t.is_post() => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }

    // Delete and merge act on the entity itself rather than a named sub-path.
    fn targets_self(&self) -> bool {
        matches!(self, RequestType::Delete | RequestType::Merge)
    }
}

/// Declarative description of one REST method on an entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodDescriptor {
    pub arg_names: Vec<String>,
    /// URL template; `[[arg]]` tokens are substituted. Defaults to the method name.
    pub name: Option<String>,
    pub request_type: RequestType,
    pub metadata_type: Option<String>,
    pub request_method: Option<HttpMethod>,
    /// Entity type of the node the call produces.
    pub return_type: Option<String>,
    /// Take the body metadata type from the calling entity.
    pub inherit_metadata_type: bool,
}

impl MethodDescriptor {
    pub fn new(request_type: RequestType) -> Self {
        Self {
            request_type,
            ..Default::default()
        }
    }

    pub fn args(mut self, names: &[&str]) -> Self {
        self.arg_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn metadata_type(mut self, metadata_type: impl Into<String>) -> Self {
        self.metadata_type = Some(metadata_type.into());
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.request_method = Some(method);
        self
    }

    pub fn returns(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn inherit_metadata_type(mut self) -> Self {
        self.inherit_metadata_type = true;
        self
    }
}

/// A descriptor applied to concrete arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Endpoint fragment: appended to, or replacing, the caller's endpoint.
    pub url: String,
    pub body: Option<Value>,
    pub method: HttpMethod,
    pub replace_endpoint: bool,
    pub get_all_items: bool,
    pub buffer: bool,
}

enum Params {
    Named(IndexMap<String, Value>),
    Positional(Vec<Value>),
}

impl Params {
    fn build(descriptor: &MethodDescriptor, args: &[Value]) -> Self {
        if !descriptor.arg_names.is_empty() {
            let named = descriptor
                .arg_names
                .iter()
                .zip(args.iter())
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            return Params::Named(named);
        }

        match args {
            [Value::Object(map)] => Params::Named(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            _ => Params::Positional(args.to_vec()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Params::Named(map) => map.is_empty(),
            Params::Positional(values) => values.is_empty(),
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Params::Named(map) => map.get(name),
            Params::Positional(_) => None,
        }
    }
}

impl MethodInfo {
    /// Resolve `descriptor` for a call to `method_name` with positional `args`.
    pub fn resolve(
        method_name: &str,
        descriptor: &MethodDescriptor,
        args: &[Value],
    ) -> Result<Self, SpRestError> {
        let request_type = descriptor.request_type;
        let template = match &descriptor.name {
            Some(name) => name.clone(),
            None if request_type.targets_self() => String::new(),
            None => method_name.to_string(),
        };
        let params = Params::build(descriptor, args);
        let mut get_all_items = false;

        let url = if request_type.replaces_endpoint() {
            substitute(&template, &params)?
        } else if request_type == RequestType::OData {
            let query = odata_argument(args)?;
            get_all_items = query.get_all_items;
            let qs = query.query_string();
            if qs.is_empty() {
                String::new()
            } else {
                format!("?{}", qs)
            }
        } else if request_type.args_in_query() {
            if params.is_empty() {
                template
            } else {
                let value = params_value(&params);
                format!(
                    "{}(@v)?@v={}",
                    template,
                    utf8_percent_encode(&value.to_string(), COMPONENT)
                )
            }
        } else if request_type.args_in_body() || params.is_empty() {
            template
        } else {
            format!("{}({})", template, render_arguments(&params, request_type.value_only()))
        };

        let body = if request_type.args_in_body() {
            build_body(descriptor, &params)
        } else {
            None
        };

        Ok(MethodInfo {
            url,
            body,
            method: descriptor
                .request_method
                .unwrap_or_else(|| request_type.default_method()),
            replace_endpoint: request_type.replaces_endpoint(),
            get_all_items,
            buffer: request_type == RequestType::GetBuffer,
        })
    }
}

fn odata_argument(args: &[Value]) -> Result<ODataQuery, SpRestError> {
    match args.first() {
        None | Some(Value::Null) => Ok(ODataQuery::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
            SpRestError::MalformedTemplate {
                template: "oData".to_string(),
                reason: err.to_string(),
            }
        }),
    }
}

/// Replace every `[[name]]` token with the percent-encoded argument value.
fn substitute(template: &str, params: &Params) -> Result<String, SpRestError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("[[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("]]").ok_or_else(|| SpRestError::MalformedTemplate {
            template: template.to_string(),
            reason: "unterminated '[[' placeholder".to_string(),
        })?;
        let name = &after[..end];
        if name.is_empty() || name.contains("[[") {
            return Err(SpRestError::MalformedTemplate {
                template: template.to_string(),
                reason: format!("invalid placeholder '{}'", name),
            });
        }
        let value = params.get(name).ok_or_else(|| SpRestError::UnknownArgument {
            template: template.to_string(),
            name: name.to_string(),
        })?;
        out.push_str(&utf8_percent_encode(&plain_text(value), COMPONENT).to_string());
        rest = &after[end + 2..];
    }

    if rest.contains("]]") {
        return Err(SpRestError::MalformedTemplate {
            template: template.to_string(),
            reason: "']]' without matching '[['".to_string(),
        });
    }
    out.push_str(rest);
    Ok(out)
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quoted(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

fn render_arguments(params: &Params, value_only: bool) -> String {
    match params {
        Params::Named(map) => map
            .iter()
            .map(|(key, value)| {
                if value_only {
                    quoted(value)
                } else {
                    format!("{}={}", key, quoted(value))
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        Params::Positional(values) => values.iter().map(quoted).collect::<Vec<_>>().join(", "),
    }
}

fn params_value(params: &Params) -> Value {
    match params {
        Params::Named(map) => Value::Object(map.clone().into_iter().collect()),
        Params::Positional(values) if values.len() == 1 => values[0].clone(),
        Params::Positional(values) => Value::Array(values.clone()),
    }
}

fn build_body(descriptor: &MethodDescriptor, params: &Params) -> Option<Value> {
    let mut body = match params {
        Params::Named(map) if map.is_empty() && descriptor.metadata_type.is_none() => return None,
        Params::Positional(values) if values.is_empty() && descriptor.metadata_type.is_none() => {
            return None
        }
        other => params_value(other),
    };

    if let Some(metadata_type) = &descriptor.metadata_type {
        let metadata = json!({ "type": metadata_type });
        if matches!(&body, Value::Array(values) if values.is_empty()) {
            body = json!({ "__metadata": metadata });
        } else {
            // With declared argument names the metadata belongs to the first argument's object.
            let holder = match descriptor.arg_names.first() {
                Some(first) => body.get_mut(first.as_str()),
                None => Some(&mut body),
            };
            if let Some(Value::Object(map)) = holder {
                map.insert("__metadata".to_string(), metadata);
            }
        }
    }

    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_substitutes_and_encodes() {
        let descriptor = MethodDescriptor::new(RequestType::GetReplace)
            .args(&["name"])
            .name("fields?$filter=InternalName eq '[[name]]'");

        let info = MethodInfo::resolve("getFieldByInternalName", &descriptor, &[json!("My Field&Co")])
            .unwrap();

        assert!(info.replace_endpoint);
        assert_eq!(info.method, HttpMethod::Get);
        assert_eq!(info.url, "fields?$filter=InternalName eq 'My%20Field%26Co'");
        assert_eq!(info.body, None);
    }

    #[test]
    fn test_replace_rejects_malformed_templates() {
        let descriptor = MethodDescriptor::new(RequestType::GetReplace)
            .args(&["name"])
            .name("fields('[[name')");
        assert!(matches!(
            MethodInfo::resolve("x", &descriptor, &[json!("a")]),
            Err(SpRestError::MalformedTemplate { .. })
        ));

        let descriptor = MethodDescriptor::new(RequestType::GetReplace)
            .args(&["name"])
            .name("fields('[[title]]')");
        assert!(matches!(
            MethodInfo::resolve("x", &descriptor, &[json!("a")]),
            Err(SpRestError::UnknownArgument { .. })
        ));
    }

    #[test]
    fn test_value_only_arguments() {
        let descriptor = MethodDescriptor::new(RequestType::GetWithArgsValueOnly).args(&["id"]);
        let info = MethodInfo::resolve("getById", &descriptor, &[json!(5)]).unwrap();
        assert_eq!(info.url, "getById(5)");
        assert_eq!(info.body, None);

        let descriptor = MethodDescriptor::new(RequestType::GetWithArgsValueOnly).args(&["title"]);
        let info = MethodInfo::resolve("getByTitle", &descriptor, &[json!("Tasks")]).unwrap();
        assert_eq!(info.url, "getByTitle('Tasks')");
    }

    #[test]
    fn test_named_arguments() {
        let descriptor = MethodDescriptor::new(RequestType::PostWithArgs).args(&["loginName", "id"]);
        let info =
            MethodInfo::resolve("ensureUser", &descriptor, &[json!("i:0#.f|me"), json!(3)]).unwrap();

        assert_eq!(info.method, HttpMethod::Post);
        assert_eq!(info.url, "ensureUser(loginName='i:0#.f|me', id=3)");
    }

    #[test]
    fn test_body_with_metadata() {
        let descriptor =
            MethodDescriptor::new(RequestType::PostWithArgsInBody).metadata_type("SP.ListItem");
        let info = MethodInfo::resolve("add", &descriptor, &[json!({"Title": "New"})]).unwrap();

        assert_eq!(info.url, "add");
        assert_eq!(
            info.body,
            Some(json!({"__metadata": {"type": "SP.ListItem"}, "Title": "New"}))
        );
    }

    #[test]
    fn test_body_metadata_on_first_named_argument() {
        let descriptor = MethodDescriptor::new(RequestType::PostWithArgsInBody)
            .args(&["properties"])
            .name("")
            .metadata_type("SP.Utilities.EmailProperties");
        let info =
            MethodInfo::resolve("send", &descriptor, &[json!({"Subject": "Hi"})]).unwrap();

        assert_eq!(info.url, "");
        assert_eq!(
            info.body,
            Some(json!({"properties": {"__metadata": {"type": "SP.Utilities.EmailProperties"}, "Subject": "Hi"}}))
        );
    }

    #[test]
    fn test_merge_update_targets_entity() {
        let descriptor = MethodDescriptor::new(RequestType::PostWithArgsInBody)
            .name("")
            .method(HttpMethod::Merge)
            .metadata_type("SP.ContentType");
        let info = MethodInfo::resolve("update", &descriptor, &[json!({"Name": "X"})]).unwrap();
        assert_eq!(info.url, "");
        assert_eq!(info.method, HttpMethod::Merge);

        let delete = MethodDescriptor::new(RequestType::Delete);
        let info = MethodInfo::resolve("delete", &delete, &[]).unwrap();
        assert_eq!(info.url, "");
        assert_eq!(info.method, HttpMethod::Delete);
        assert_eq!(info.body, None);
    }

    #[test]
    fn test_args_in_query_string() {
        let descriptor = MethodDescriptor::new(RequestType::PostWithArgsInQS).args(&["url"]);
        let info = MethodInfo::resolve("getFileByServerRelativeUrl", &descriptor, &[json!("/a b")])
            .unwrap();
        assert_eq!(
            info.url,
            "getFileByServerRelativeUrl(@v)?@v=%7B%22url%22%3A%22%2Fa%20b%22%7D"
        );
    }

    #[test]
    fn test_odata_request() {
        let descriptor = MethodDescriptor::new(RequestType::OData).args(&["oData"]);
        let info = MethodInfo::resolve(
            "query",
            &descriptor,
            &[json!({"Select": ["Title"], "Top": 5000, "GetAllItems": true})],
        )
        .unwrap();

        assert_eq!(info.url, "?$select=Title&$top=5000");
        assert!(info.get_all_items);
        assert!(!info.replace_endpoint);
    }

    #[test]
    fn test_buffer_and_no_args() {
        let descriptor = MethodDescriptor::new(RequestType::GetBuffer).name("$value");
        let info = MethodInfo::resolve("content", &descriptor, &[]).unwrap();
        assert!(info.buffer);
        assert_eq!(info.url, "$value");

        let descriptor = MethodDescriptor::new(RequestType::PostWithArgsValueOnly);
        let info = MethodInfo::resolve("createPersonalSiteEnque", &descriptor, &[json!(true)]).unwrap();
        assert_eq!(info.url, "createPersonalSiteEnque(true)");
        assert_eq!(info.method, HttpMethod::Post);
    }

    #[test]
    fn test_descriptor_deserialize() {
        let descriptor: MethodDescriptor = serde_json::from_value(json!({
            "argNames": ["id"],
            "requestType": "GetWithArgsValueOnly",
            "returnType": "listitem"
        }))
        .unwrap();

        assert_eq!(descriptor.arg_names, vec!["id".to_string()]);
        assert_eq!(descriptor.return_type.as_deref(), Some("listitem"));
        assert_eq!(descriptor.request_method, None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn replace_inserts_alphanumeric_values_verbatim(value in "[a-zA-Z0-9]{1,20}") {
                let descriptor = MethodDescriptor::new(RequestType::GetReplace)
                    .args(&["title"])
                    .name("items?$filter=Title eq '[[title]]'");
                let info = MethodInfo::resolve("getByTitle", &descriptor, &[json!(value.clone())]).unwrap();
                prop_assert_eq!(info.url, format!("items?$filter=Title eq '{}'", value));
                prop_assert!(info.replace_endpoint);
            }

            #[test]
            fn replaced_values_never_leak_reserved_characters(value in "\\PC{0,24}") {
                let descriptor = MethodDescriptor::new(RequestType::PostReplace)
                    .args(&["name"])
                    .name("[[name]]");
                let info = MethodInfo::resolve("rename", &descriptor, &[json!(value)]).unwrap();
                prop_assert!(!info.url.contains(' '));
                prop_assert!(!info.url.contains('&'));
                prop_assert!(!info.url.contains('?'));
                prop_assert!(!info.url.contains('/'));
            }
        }
    }
}
