use crate::{RawResponse, Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Method};
use sprest_core::{HttpMethod, RequestInfo};
use std::time::Duration;
use tracing::{debug, trace};

/// Media type of the verbose OData format.
pub const ODATA_VERBOSE: &str = "application/json;odata=verbose";

/// Transport backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client, e.g. one carrying authentication cookies.
    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }

    fn headers(request: &RequestInfo) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ODATA_VERBOSE));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ODATA_VERBOSE));

        if request.method.is_get() {
            return headers;
        }

        if let Some(digest) = request
            .request_digest
            .as_deref()
            .and_then(|d| HeaderValue::from_str(d).ok())
        {
            headers.insert("X-RequestDigest", digest);
        }

        // MERGE and DELETE tunnel through POST.
        if matches!(request.method, HttpMethod::Merge | HttpMethod::Delete) {
            headers.insert("IF-MATCH", HeaderValue::from_static("*"));
            headers.insert(
                "X-HTTP-Method",
                HeaderValue::from_static(request.method.as_str()),
            );
        }
        headers
    }

    fn wire_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Post | HttpMethod::Merge | HttpMethod::Delete => Method::POST,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &RequestInfo) -> Result<RawResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|_| TransportError::InvalidUrl(request.url.clone()))?;

        debug!("Sending {} request to {}", request.method, request.url);

        let mut builder = self
            .client
            .request(Self::wire_method(request.method), url)
            .headers(Self::headers(request));
        if let Some(data) = &request.data {
            let body = serde_json::to_string(data).map_err(|e| TransportError::Body(e.to_string()))?;
            trace!("Request body:\n{}", body);
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let status = response.status().as_u16();

        let raw = if request.buffer {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;
            RawResponse::binary(status, bytes)
        } else {
            let text = response
                .text()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;
            trace!("Response body:\n{}", text);
            RawResponse::text(status, text)
        };

        debug!("Received {} from {}", raw, request.url);
        Ok(raw)
    }
}
