// SharePoint REST client
// Owns the ambient context, the transport, the method table and the synchronization groups
// shared by every request node created from it.

use crate::group::GroupRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sprest_core::{
    builtin_table, AmbientContext, GroupId, MethodTable, NodeId, NodeIdAllocator, RequestInfo,
    TargetInfo,
};
use sprest_transport::{HttpTransport, Transport};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Page context every request URL is built against
    pub context: AmbientContext,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Form digest sent with write requests
    pub request_digest: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            context: AmbientContext::default(),
            timeout_ms: 30000,
            request_digest: None,
        }
    }
}

impl ClientConfig {
    pub fn for_web(web_url: impl Into<String>) -> Self {
        Self {
            context: AmbientContext::for_web(web_url),
            ..Default::default()
        }
    }
}

pub(crate) struct ClientInner {
    pub config: ClientConfig,
    pub transport: Arc<dyn Transport>,
    pub table: Arc<dyn MethodTable>,
    pub ids: NodeIdAllocator,
    pub groups: GroupRegistry,
}

/// Entry point for building request nodes.
///
/// Cheap to clone; clones share transport, method table and groups.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("transport", &self.inner.transport)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client talking HTTP with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_millis(config.timeout_ms))
            .context("Failed to build HTTP transport")?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client for a plain page living on `web_url`
    pub fn new_with_url(web_url: &str) -> Result<Self> {
        Self::new(ClientConfig::for_web(web_url))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_parts(config, transport, Arc::new(builtin_table()))
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        table: Arc<dyn MethodTable>,
    ) -> Self {
        debug!(
            "Creating client for {} (app web: {})",
            config.context.web_url, config.context.is_app_web
        );
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                table,
                ids: NodeIdAllocator::new(),
                groups: GroupRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn context(&self) -> &AmbientContext {
        &self.inner.config.context
    }

    pub fn method_table(&self) -> &dyn MethodTable {
        self.inner.table.as_ref()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn groups(&self) -> &GroupRegistry {
        &self.inner.groups
    }

    pub(crate) fn next_node_id(&self) -> NodeId {
        self.inner.ids.allocate()
    }

    /// A group no node leads, for a node's nested work while its callback runs.
    pub(crate) fn scratch_group(&self) -> GroupId {
        GroupId::new(self.inner.ids.allocate().as_u64())
    }

    /// Request description for `target`, with the configured digest on write requests.
    pub fn request_info(&self, target: &TargetInfo) -> RequestInfo {
        let mut info = target.request_info(self.context());
        if info.request_digest.is_none() && !info.method.is_get() {
            info.request_digest = self.inner.config.request_digest.clone();
        }
        info
    }

    /// Number of nodes currently registered in `group`.
    pub fn group_len(&self, group: GroupId) -> usize {
        self.inner.groups.len(group)
    }

    /// Number of groups holding registered nodes or waiters.
    pub fn active_group_count(&self) -> usize {
        self.inner.groups.active()
    }

    /// Wait flags of `group`, parallel to its registration order.
    pub fn group_wait_flags(&self, group: GroupId) -> Vec<bool> {
        self.inner.groups.wait_flags(group)
    }
}
