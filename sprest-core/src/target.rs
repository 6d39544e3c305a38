// Target descriptor: where a request goes and what it carries.
// Turns a base url + endpoint fragment into the final `_api` request url.

use crate::context::AmbientContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

const API_SEGMENT: &str = "/_api/";
const APP_CONTEXT_SITE: &str = "SP.AppContextSite(@target)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Merge,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Merge => "MERGE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "MERGE" => Ok(HttpMethod::Merge),
            "PATCH" => Ok(HttpMethod::Patch),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unknown HTTP method '{}'", other)),
        }
    }
}

/// Prototype of a request: every node carries one and derives children's from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// Explicit web/site URL, or a fully qualified `_api` URL.
    pub url: Option<String>,
    /// Path below `_api/`.
    pub endpoint: String,
    pub method: HttpMethod,
    /// JSON body.
    pub data: Option<Value>,
    /// `Some(false)` targets the current site instead of the current web.
    pub default_to_web: Option<bool>,
    /// Read the response as raw bytes.
    pub buffer: bool,
    /// Form digest for write requests.
    pub request_digest: Option<String>,
}

/// Everything the transport needs for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub url: String,
    pub method: HttpMethod,
    pub data: Option<Value>,
    pub buffer: bool,
    pub request_digest: Option<String>,
}

impl TargetInfo {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_default_to_web(mut self, default_to_web: bool) -> Self {
        self.default_to_web = Some(default_to_web);
        self
    }

    /// Copy for a follow-up GET: same location, no verb or body carried over.
    pub fn for_get(&self) -> Self {
        Self {
            method: HttpMethod::Get,
            data: None,
            buffer: false,
            ..self.clone()
        }
    }

    /// Endpoint without its query string.
    pub fn endpoint_path(&self) -> &str {
        self.endpoint.split('?').next().unwrap_or_default()
    }

    /// Append `segment` to the endpoint with a `/` separator.
    pub fn push_segment(&mut self, segment: &str) {
        if segment.is_empty() {
            return;
        }
        if self.endpoint.is_empty() {
            self.endpoint = segment.to_string();
        } else {
            self.endpoint = format!("{}/{}", self.endpoint, segment);
        }
    }

    /// Build the final request URL against `ctx`.
    pub fn request_url(&self, ctx: &AmbientContext) -> String {
        let mut url = self.url.clone();

        if url.is_none() && ctx.is_app_web && ctx.default_request_to_host {
            url = ctx.host_url();
        }

        let url = match url {
            Some(url) => {
                if let Some(index) = find_api_segment(&url) {
                    return Self::qualified_url(ctx, &url, index, &self.endpoint);
                }
                url
            }
            None if self.default_to_web == Some(false) => ctx.site_url.clone(),
            None => ctx.web_url.clone(),
        };

        let url = if url.starts_with("http") {
            url
        } else {
            format!("{}{}", ctx.domain_url(), url)
        };

        if ctx.is_app_web && !same_url(&url, &ctx.web_url) {
            let separator = if self.endpoint.contains('?') { '&' } else { '?' };
            format!(
                "{}/_api/{}/{}{}@target='{}'",
                ctx.web_url, APP_CONTEXT_SITE, self.endpoint, separator, url
            )
        } else {
            format!("{}/_api/{}", url, self.endpoint)
        }
    }

    // The url already contains `_api`: the endpoint is folded in before any rewrite.
    fn qualified_url(ctx: &AmbientContext, url: &str, index: usize, endpoint: &str) -> String {
        let root = &url[..index];
        let mut path = url[index + API_SEGMENT.len()..].to_string();
        if let Some(query) = endpoint.strip_prefix('?') {
            let separator = if path.contains('?') { '&' } else { '?' };
            path = format!("{}{}{}", path, separator, query);
        } else if !endpoint.is_empty() {
            if path.is_empty() {
                path = endpoint.to_string();
            } else {
                path = format!("{}/{}", path, endpoint);
            }
        }

        if ctx.is_app_web && !same_url(root, &ctx.web_url) {
            let separator = if path.contains('?') { '&' } else { '?' };
            format!(
                "{}/_api/{}/{}{}@target='{}'",
                ctx.web_url, APP_CONTEXT_SITE, path, separator, root
            )
        } else {
            format!("{}{}{}", root, API_SEGMENT, path)
        }
    }

    pub fn request_info(&self, ctx: &AmbientContext) -> RequestInfo {
        RequestInfo {
            url: self.request_url(ctx),
            method: self.method,
            data: self.data.clone(),
            buffer: self.buffer,
            request_digest: self.request_digest.clone(),
        }
    }
}

fn find_api_segment(url: &str) -> Option<usize> {
    url.to_ascii_lowercase().find(API_SEGMENT)
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/')
        .eq_ignore_ascii_case(b.trim_end_matches('/'))
}
