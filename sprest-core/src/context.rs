use serde::{Deserialize, Serialize};
use url::Url;

/// Query-string key carrying the host web URL when hosted inside an app web.
pub const HOST_URL_KEY: &str = "SPHostUrl";

/// Read-only description of the page the client runs against.
///
/// Every URL construction takes this explicitly; nothing reads process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmbientContext {
    /// Absolute URL of the current site collection.
    pub site_url: String,
    /// Absolute URL of the current web.
    pub web_url: String,
    /// Full URL of the hosting page, including its query string.
    pub page_url: String,
    /// Running inside an app web that is cross-site from its host web.
    pub is_app_web: bool,
    /// In an app web, send requests without an explicit URL to the host web.
    pub default_request_to_host: bool,
}

impl Default for AmbientContext {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            web_url: String::new(),
            page_url: String::new(),
            is_app_web: false,
            default_request_to_host: true,
        }
    }
}

impl AmbientContext {
    /// Context for a plain (non app web) page living on `web_url`.
    pub fn for_web(web_url: impl Into<String>) -> Self {
        let web_url = web_url.into();
        Self {
            site_url: web_url.clone(),
            page_url: web_url.clone(),
            web_url,
            ..Default::default()
        }
    }

    /// Context for an app web page at `page_url`, whose query string carries `SPHostUrl`.
    pub fn for_app_web(web_url: impl Into<String>, page_url: impl Into<String>) -> Self {
        let web_url = web_url.into();
        Self {
            site_url: web_url.clone(),
            web_url,
            page_url: page_url.into(),
            is_app_web: true,
            default_request_to_host: true,
        }
    }

    /// Decoded value of a query-string parameter of the hosting page.
    pub fn query_value(&self, key: &str) -> Option<String> {
        let page = Url::parse(&self.page_url).ok()?;
        page.query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }

    /// The host web URL handed to an app web page.
    pub fn host_url(&self) -> Option<String> {
        self.query_value(HOST_URL_KEY)
    }

    /// Scheme and host of the page (or of the host web, inside an app web).
    pub fn domain_url(&self) -> String {
        let source = if self.is_app_web {
            self.host_url().unwrap_or_default()
        } else {
            self.page_url.clone()
        };

        let parts: Vec<&str> = source.split('/').collect();
        if parts.len() >= 3 {
            format!("{}//{}", parts[0], parts[2])
        } else {
            source
        }
    }
}
