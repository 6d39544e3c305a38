// Entry points mirroring the top-level SharePoint objects.

use crate::client::Client;
use crate::node::RequestNode;
use serde_json::{json, Value};
use sprest_core::{SpRestError, TargetInfo};

/// Endpoint of the e-mail utility.
pub const SEND_EMAIL_ENDPOINT: &str = "SP.Utilities.Utility.SendEmail";

impl Client {
    /// The current web.
    pub fn web(&self) -> RequestNode {
        RequestNode::root(
            self,
            TargetInfo::new("web").with_default_to_web(true),
            Some("web"),
        )
    }

    /// The web at `url`, which may be relative to the page's host.
    pub fn web_at(&self, url: &str) -> RequestNode {
        RequestNode::root(
            self,
            TargetInfo::new("web")
                .with_url(url)
                .with_default_to_web(true),
            Some("web"),
        )
    }

    /// The current site collection.
    pub fn site(&self) -> RequestNode {
        RequestNode::root(
            self,
            TargetInfo::new("site").with_default_to_web(false),
            Some("site"),
        )
    }

    /// A list of the current web, by title.
    pub fn list(&self, title: &str) -> RequestNode {
        RequestNode::root(
            self,
            TargetInfo::new(list_endpoint(title)).with_default_to_web(true),
            Some("list"),
        )
    }

    /// The item collection of a list, by list title.
    pub fn items(&self, list_title: &str) -> RequestNode {
        RequestNode::root(
            self,
            TargetInfo::new(format!("{}/items", list_endpoint(list_title))).with_default_to_web(true),
            Some("items"),
        )
    }

    /// Content types of the current web, or of a list when `list_title` is given.
    pub fn content_types(&self, list_title: Option<&str>) -> RequestNode {
        let endpoint = match list_title {
            Some(title) => format!("{}/contenttypes", list_endpoint(title)),
            None => "web/contenttypes".to_string(),
        };
        RequestNode::root(
            self,
            TargetInfo::new(endpoint).with_default_to_web(true),
            Some("contenttypes"),
        )
    }

    /// The e-mail utility; send with [`Client::send_email`].
    pub fn email(&self) -> RequestNode {
        RequestNode::root(
            self,
            TargetInfo::new(SEND_EMAIL_ENDPOINT).with_default_to_web(true),
            Some("email"),
        )
    }

    /// Build the send-mail request for `properties` (`To`, `CC`, `BCC`, `Subject`, `Body`, ...).
    pub fn send_email(&self, properties: Value) -> Result<RequestNode, SpRestError> {
        self.email()
            .call("send", &[normalize_email_properties(properties)])
    }
}

fn list_endpoint(title: &str) -> String {
    format!("web/lists/getByTitle('{}')", title)
}

/// Wrap recipient fields as `{ "results": [...] }`, accepting a single address or a list.
pub fn normalize_email_properties(mut properties: Value) -> Value {
    for key in ["To", "CC", "BCC"] {
        let Some(value) = properties.get_mut(key) else {
            continue;
        };
        let wrapped = match value.take() {
            Value::Null => Value::Null,
            Value::String(address) => json!({ "results": [address] }),
            Value::Array(addresses) => json!({ "results": addresses }),
            other => other,
        };
        *value = wrapped;
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientConfig;
    use sprest_core::HttpMethod;
    use sprest_transport::MockTransport;
    use std::sync::Arc;

    fn client() -> Client {
        let mut config = ClientConfig::for_web("https://a/web");
        config.context.site_url = "https://a".to_string();
        Client::with_transport(config, Arc::new(MockTransport::new()))
    }

    #[test]
    fn test_entry_point_urls() {
        let client = client();
        assert_eq!(client.web().request_info().url, "https://a/web/_api/web");
        assert_eq!(client.site().request_info().url, "https://a/_api/site");
        assert_eq!(
            client.items("Tasks").request_info().url,
            "https://a/web/_api/web/lists/getByTitle('Tasks')/items"
        );
        assert_eq!(
            client.content_types(None).request_info().url,
            "https://a/web/_api/web/contenttypes"
        );
        assert_eq!(
            client.content_types(Some("Docs")).request_info().url,
            "https://a/web/_api/web/lists/getByTitle('Docs')/contenttypes"
        );
        assert_eq!(
            client.web_at("/sites/other").request_info().url,
            "https://a/sites/other/_api/web"
        );
    }

    #[test]
    fn test_normalize_email_properties() {
        let properties = normalize_email_properties(json!({
            "To": "a@x.com",
            "CC": ["b@x.com", "c@x.com"],
            "Subject": "Hi"
        }));

        assert_eq!(properties["To"], json!({"results": ["a@x.com"]}));
        assert_eq!(properties["CC"], json!({"results": ["b@x.com", "c@x.com"]}));
        assert!(properties.get("BCC").is_none());
        assert_eq!(properties["Subject"], "Hi");
    }

    #[test]
    fn test_send_email_request() {
        let client = client();
        let send = client
            .send_email(json!({"To": "a@x.com", "Subject": "Hi", "Body": "Hello"}))
            .unwrap();
        let info = send.request_info();

        assert_eq!(info.url, "https://a/web/_api/SP.Utilities.Utility.SendEmail");
        assert_eq!(info.method, HttpMethod::Post);
        assert_eq!(
            info.data,
            Some(json!({
                "properties": {
                    "__metadata": { "type": "SP.Utilities.EmailProperties" },
                    "To": { "results": ["a@x.com"] },
                    "Subject": "Hi",
                    "Body": "Hello"
                }
            }))
        );
    }
}
