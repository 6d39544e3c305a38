// Request nodes: one deferred or in-flight REST call and, once completed, its materialized data.
//
// A node is created unfired. `execute*` registers it in its current synchronization group and
// fires the transport call on the runtime; `settle`/`done` wait for the whole group and drain it.
// Children derived from a node inherit its current group, so a chain of calls built from one
// anchor is drained together.

use crate::client::Client;
use crate::group::Slot;
use crate::materialize::{self, NodeData};
use bytes::Bytes;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use sprest_core::envelope::{self, fix_metadata_uri, RESULTS_KEY};
use sprest_core::{
    Deferred, GroupId, MethodDescriptor, MethodInfo, NodeId, ODataQuery, PropertyDecl,
    RequestInfo, RequestType, SpRestError, TargetInfo,
};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

struct NodeInner {
    id: NodeId,
    client: Client,
    target: TargetInfo,
    request_type: RequestType,
    get_all_items: bool,
    declared_type: Option<String>,
    parent: Option<Weak<NodeInner>>,
    // Raw `GroupId`; zero means the node anchors its own group.
    group: AtomicU64,
    slot: Mutex<Option<Slot>>,
    data: OnceCell<Arc<NodeData>>,
}

/// Handle to one REST call in a call tree.
///
/// Clones share the same node. Executing a node spawns onto the current Tokio runtime.
#[derive(Clone)]
pub struct RequestNode {
    inner: Arc<NodeInner>,
}

impl fmt::Debug for RequestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestNode")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.target.endpoint)
            .field("group", &self.group())
            .field("exists", &self.exists())
            .finish()
    }
}

impl RequestNode {
    pub(crate) fn root(client: &Client, target: TargetInfo, declared_type: Option<&str>) -> Self {
        Self::build(
            client.clone(),
            target,
            RequestType::Get,
            false,
            declared_type.map(str::to_string),
            None,
            None,
        )
    }

    fn build(
        client: Client,
        target: TargetInfo,
        request_type: RequestType,
        get_all_items: bool,
        declared_type: Option<String>,
        parent: Option<&RequestNode>,
        group: Option<GroupId>,
    ) -> Self {
        let id = client.next_node_id();
        Self {
            inner: Arc::new(NodeInner {
                id,
                client,
                target,
                request_type,
                get_all_items,
                declared_type,
                parent: parent.map(|p| Arc::downgrade(&p.inner)),
                group: AtomicU64::new(group.map(|g| g.as_u64()).unwrap_or(0)),
                slot: Mutex::new(None),
                data: OnceCell::new(),
            }),
        }
    }

    /// A node derived from this one: parented here and joined to this node's current group.
    fn child(
        &self,
        target: TargetInfo,
        request_type: RequestType,
        get_all_items: bool,
        declared_type: Option<String>,
    ) -> Self {
        Self::build(
            self.inner.client.clone(),
            target,
            request_type,
            get_all_items,
            declared_type,
            Some(self),
            Some(self.group()),
        )
    }

    /// Child that is completed from inline data and never fired.
    pub(crate) fn inline_child(&self, target: TargetInfo, entity: Value) -> Self {
        let child = self.child(target, RequestType::Get, false, None);
        let data = materialize::expand(&child, entity);
        // A fresh node has no data yet; `set` cannot fail here.
        let _ = child.inner.data.set(Arc::new(data));
        child
    }

    /// Element of this node's `results`, sharing this node's target.
    pub(crate) fn result_node(&self, entity: Value) -> Self {
        self.inline_child(self.inner.target.clone(), entity)
    }

    /// Collection-valued property returned inline under `key`.
    pub(crate) fn nested_collection(&self, key: &str, results: Vec<Value>) -> Self {
        // An empty collection carries no element metadata; its type is the property name.
        let entity = if results.is_empty() {
            json!({ "results": [], "__metadata": { "type": key } })
        } else {
            json!({ "results": results })
        };
        self.inline_property(key, entity)
    }

    /// Property `key` returned inline, addressed below this node's endpoint.
    fn inline_property(&self, key: &str, entity: Value) -> Self {
        let mut target = self.inner.target.clone();
        target.endpoint = self.inner.target.endpoint_path().to_string();
        target.push_segment(key);
        self.inline_child(target, entity)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    pub fn target(&self) -> &TargetInfo {
        &self.inner.target
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.target.endpoint
    }

    pub fn request_type(&self) -> RequestType {
        self.inner.request_type
    }

    pub fn get_all_items(&self) -> bool {
        self.inner.get_all_items
    }

    /// The group this node currently registers into.
    pub fn group(&self) -> GroupId {
        match self.inner.group.load(Ordering::Acquire) {
            0 => GroupId::led_by(self.inner.id),
            raw => GroupId::new(raw),
        }
    }

    fn set_group(&self, group: GroupId) {
        self.inner.group.store(group.as_u64(), Ordering::Release);
    }

    /// Rank within the group generation this node last registered into.
    pub fn response_index(&self) -> Option<usize> {
        self.slot().map(|s| s.index)
    }

    pub fn slot(&self) -> Option<Slot> {
        *lock(&self.inner.slot)
    }

    pub fn parent(&self) -> Option<RequestNode> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| RequestNode { inner })
    }

    /// What this node sends (or sent) to the transport.
    pub fn request_info(&self) -> RequestInfo {
        self.inner.client.request_info(&self.inner.target)
    }

    fn data(&self) -> Option<&Arc<NodeData>> {
        self.inner.data.get()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.data.initialized()
    }

    /// `None` until a response has been parsed.
    pub fn exists(&self) -> Option<bool> {
        self.data().map(|d| d.exists)
    }

    pub fn status(&self) -> Option<u16> {
        self.data().and_then(|d| d.status)
    }

    /// The entity object (`d`) of the response.
    pub fn payload(&self) -> Option<Value> {
        self.data()
            .map(|d| d.payload.clone())
            .filter(|payload| !payload.is_null())
    }

    /// Inline property value of the parsed entity.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data()?.payload.get(key).cloned()
    }

    /// Collection property that came back inline, as its own node.
    pub fn nested(&self, key: &str) -> Option<RequestNode> {
        self.data()?.nested.get(key).cloned()
    }

    /// Names of properties the server deferred; fetch them with [`RequestNode::collection`].
    pub fn deferred_properties(&self) -> Vec<String> {
        self.data().map(|d| d.deferred.clone()).unwrap_or_default()
    }

    pub fn results(&self) -> Vec<RequestNode> {
        self.data().map(|d| d.results.clone()).unwrap_or_default()
    }

    /// Raw body of a buffer request.
    pub fn buffer(&self) -> Option<Bytes> {
        self.data()?.buffer.clone()
    }

    /// Normalized entity type, from the response when available, else as declared.
    pub fn entity_type(&self) -> Option<String> {
        self.data()
            .and_then(|d| d.entity_type.clone())
            .or_else(|| self.inner.declared_type.clone())
    }

    pub fn has_next(&self) -> bool {
        self.data().is_some_and(|d| d.next.is_some())
    }

    fn metadata_uri(&self) -> Option<String> {
        envelope::metadata_uri(&self.data()?.payload).map(str::to_string)
    }

    fn metadata_type(&self) -> Option<String> {
        envelope::metadata_type(&self.data()?.payload).map(str::to_string)
    }

    // ------------------------------------------------------------------
    // Method table dispatch
    // ------------------------------------------------------------------

    fn type_candidates(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(2);
        if let Some(resolved) = self.data().and_then(|d| d.entity_type.clone()) {
            names.push(resolved);
        }
        if let Some(declared) = &self.inner.declared_type {
            if !names.contains(declared) {
                names.push(declared.clone());
            }
        }
        names
    }

    fn find_method(&self, name: &str) -> Option<MethodDescriptor> {
        let table = self.inner.client.method_table();
        self.type_candidates()
            .iter()
            .filter_map(|t| table.lookup(t))
            .find_map(|entry| entry.method(name).cloned())
    }

    fn find_property(&self, name: &str) -> Option<PropertyDecl> {
        let table = self.inner.client.method_table();
        self.type_candidates()
            .iter()
            .filter_map(|t| table.lookup(t))
            .find_map(|entry| entry.property(name).cloned())
    }

    /// Method names available on this node.
    pub fn methods(&self) -> Vec<String> {
        let table = self.inner.client.method_table();
        let mut names: Vec<String> = Vec::new();
        for entry in self.type_candidates().iter().filter_map(|t| table.lookup(t)) {
            for name in entry.methods.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Lazy property names available on this node.
    pub fn properties(&self) -> Vec<String> {
        let table = self.inner.client.method_table();
        let mut names: Vec<String> = Vec::new();
        for entry in self.type_candidates().iter().filter_map(|t| table.lookup(t)) {
            for decl in &entry.properties {
                if !names.contains(&decl.name) {
                    names.push(decl.name.clone());
                }
            }
        }
        names
    }

    fn unknown_entity(&self) -> String {
        self.entity_type()
            .unwrap_or_else(|| self.inner.target.endpoint_path().to_string())
    }

    /// Build the node for calling `method` from this node's method table entry.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<RequestNode, SpRestError> {
        let descriptor = self
            .find_method(method)
            .ok_or_else(|| SpRestError::MethodNotFound {
                entity: self.unknown_entity(),
                method: method.to_string(),
            })?;
        self.execute_method(method, descriptor, args)
    }

    /// Build the node for an explicit descriptor, bypassing the method table.
    pub fn execute_method(
        &self,
        method: &str,
        mut descriptor: MethodDescriptor,
        args: &[Value],
    ) -> Result<RequestNode, SpRestError> {
        let mut target = match self.metadata_uri() {
            Some(uri) => {
                let metadata_type = self.metadata_type();
                if descriptor.inherit_metadata_type && metadata_type.is_some() {
                    descriptor.metadata_type = metadata_type.clone();
                }
                TargetInfo::new("").with_url(fix_metadata_uri(&uri, metadata_type.as_deref()))
            }
            None => self.inner.target.clone(),
        };

        let info = MethodInfo::resolve(method, &descriptor, args)?;
        target.buffer = info.buffer;
        target.data = info.body;
        target.method = info.method;
        if info.replace_endpoint {
            target.endpoint = info.url;
        } else if let Some(query) = info.url.strip_prefix('?') {
            let separator = if target.endpoint.contains('?') { '&' } else { '?' };
            target.endpoint = format!("{}{}{}", target.endpoint, separator, query);
        } else {
            target.push_segment(&info.url);
        }

        let child = self.child(
            target,
            descriptor.request_type,
            info.get_all_items,
            descriptor.return_type.clone(),
        );
        trace!("{} -> {}.{}() as {}", self.id(), self.unknown_entity(), method, child.id());
        Ok(child)
    }

    /// Lazy property declared in the method table, optionally addressed by `argument`.
    ///
    /// Without an argument, a value the server already returned inline comes back as a
    /// completed node; only deferred or missing values become a new request.
    pub fn property(&self, name: &str, argument: Option<&str>) -> Result<RequestNode, SpRestError> {
        let decl = self
            .find_property(name)
            .ok_or_else(|| SpRestError::PropertyNotFound {
                entity: self.unknown_entity(),
                property: name.to_string(),
            })?;
        if argument.is_none() {
            if let Some(inline) = self.expanded(name) {
                return Ok(inline);
            }
        }
        let (path, return_type) = decl.resolve(argument);
        Ok(self.sub_request(&path, return_type))
    }

    fn expanded(&self, name: &str) -> Option<RequestNode> {
        if let Some(collection) = self.nested(name) {
            return Some(collection);
        }
        let value = self.get(name)?;
        if envelope::is_deferred(&value) || envelope::metadata_type(&value).is_none() {
            return None;
        }
        trace!("{} returns inline {}", self.id(), name);
        Some(self.inline_property(name, value))
    }

    /// GET of the named sub-resource, typically a deferred property.
    pub fn collection(&self, name: &str) -> RequestNode {
        self.sub_request(name, None)
    }

    fn sub_request(&self, path: &str, return_type: Option<String>) -> RequestNode {
        let mut target = self.inner.target.for_get();
        match self.metadata_uri() {
            Some(uri) => {
                target.url = Some(fix_metadata_uri(&uri, self.metadata_type().as_deref()));
                target.endpoint = path.to_string();
            }
            None => target.push_segment(path),
        }
        self.child(target, RequestType::Get, false, return_type)
    }

    /// OData query against this node's endpoint.
    pub fn query(&self, query: &ODataQuery) -> RequestNode {
        let descriptor = MethodDescriptor {
            return_type: self.entity_type(),
            ..MethodDescriptor::new(RequestType::OData)
        };
        let args = [serde_json::to_value(query).unwrap_or(Value::Null)];
        match self.execute_method("query", descriptor, &args) {
            Ok(node) => node,
            // Only reachable if the query fails to round-trip through serde.
            Err(err) => {
                warn!("Dropping OData options for {}: {}", self.id(), err);
                self.child(self.inner.target.for_get(), RequestType::Get, false, self.entity_type())
            }
        }
    }

    /// Unfired node for the continuation page, when the server reported one.
    pub fn next(&self) -> Option<RequestNode> {
        let next = self.data()?.next.clone()?;
        let mut target = self.inner.target.for_get();
        target.url = Some(next);
        target.endpoint = String::new();
        Some(self.child(target, RequestType::Get, false, self.inner.declared_type.clone()))
    }

    /// Fetch the continuation page, if any.
    pub async fn next_page(&self) -> Option<RequestNode> {
        let next = self.next()?;
        Some(next.execute_and_wait().await)
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    fn register(&self) -> Slot {
        let group = self.group();
        let mut current = lock(&self.inner.slot);
        let slot = self.inner.client.groups().register(group, self, *current);
        *current = Some(slot);
        slot
    }

    /// Fire without a callback.
    pub fn execute(&self) -> RequestNode {
        self.execute_with(|_| std::future::ready(()), false)
    }

    /// Register in the current group and fire.
    ///
    /// With `wait`, the transport call is held until every earlier node in the group has
    /// completed and set its wait flag. This node's flag is set once `callback`'s future is done;
    /// while it runs, nodes derived from this one go to a private group.
    pub fn execute_with<F, Fut>(&self, callback: F, wait: bool) -> RequestNode
    where
        F: FnOnce(RequestNode) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let slot = self.register();
        let node = self.clone();
        tokio::spawn(async move {
            node.run(slot, callback, wait).await;
        });
        self.clone()
    }

    async fn run<F, Fut>(self, slot: Slot, callback: F, wait: bool)
    where
        F: FnOnce(RequestNode) -> Fut,
        Fut: Future<Output = ()>,
    {
        let groups = self.inner.client.groups();
        if wait {
            trace!("{} waiting on {} below index {}", self.id(), slot.group, slot.index);
            groups.wait_settled(slot.group, Some(slot)).await;
        }

        self.fire(true).await;

        if wait {
            let scratch = self.inner.client.scratch_group();
            self.set_group(scratch);
            callback(self.clone()).await;
            self.set_group(slot.group);
            groups.discard(scratch);
        } else {
            callback(self.clone()).await;
        }

        groups.set_wait_flag(slot);
    }

    /// Fire without registering in a group and without chasing continuation pages.
    pub async fn execute_and_wait(&self) -> RequestNode {
        self.fire(false).await;
        self.clone()
    }

    /// Register, fire and resolve to this node, or to `NotFound` when it does not exist.
    ///
    /// A node that anchors its own group and is still alone in it leaves the group once
    /// resolved; nobody else could drain it.
    pub async fn fetch(&self) -> Result<RequestNode, SpRestError> {
        let slot = self.register();
        let data = self.fire(true).await;
        let groups = self.inner.client.groups();
        groups.set_wait_flag(slot);
        if slot.group.leader() == self.id() {
            groups.release(slot);
        }

        if data.exists {
            Ok(self.clone())
        } else {
            Err(SpRestError::NotFound {
                url: self.request_info().url,
                status: data.status,
            })
        }
    }

    /// Wait for every node in this node's group, then drain the group.
    pub async fn settle(&self) -> Vec<RequestNode> {
        self.inner
            .client
            .groups()
            .drain_when_settled(self.group())
            .await
    }

    /// Run `callback` with the group's responses once all of them have settled.
    pub fn done<F>(&self, callback: F) -> Deferred<Vec<RequestNode>>
    where
        F: FnOnce(Vec<RequestNode>) + Send + 'static,
    {
        let deferred = Deferred::new();
        deferred.attach(callback);

        let node = self.clone();
        let resolver = deferred.clone();
        tokio::spawn(async move {
            let responses = node.settle().await;
            resolver.resolve(responses);
        });
        deferred
    }

    async fn fire(&self, chase_pages: bool) -> Arc<NodeData> {
        self.inner
            .data
            .get_or_init(|| self.dispatch(chase_pages))
            .await
            .clone()
    }

    async fn dispatch(&self, chase_pages: bool) -> Arc<NodeData> {
        let info = self.request_info();
        debug!("Executing {} {} for {}", info.method, info.url, self.id());

        let mut data = match self.inner.client.transport().execute(&info).await {
            Ok(raw) => {
                debug!("Received {} for {}", raw, self.id());
                materialize::from_response(self, &raw)
            }
            Err(err) => {
                warn!("Request to {} failed: {}", info.url, err);
                NodeData::missing(None)
            }
        };

        if chase_pages && self.inner.get_all_items {
            self.chase_pages(&mut data).await;
        }
        Arc::new(data)
    }

    async fn chase_pages(&self, data: &mut NodeData) {
        while let Some(next) = data.next.take() {
            let mut target = self.inner.target.for_get();
            target.url = Some(next.clone());
            target.endpoint = String::new();
            let info = self.inner.client.request_info(&target);
            debug!("Fetching continuation page {} for {}", info.url, self.id());

            let page = match self.inner.client.transport().execute(&info).await {
                Ok(raw) if raw.is_success() => materialize::decode(&raw.body_text()),
                Ok(raw) => {
                    warn!("Continuation page {} returned {}", info.url, raw.status);
                    data.next = Some(next);
                    break;
                }
                Err(err) => {
                    warn!("Continuation page {} failed: {}", info.url, err);
                    data.next = Some(next);
                    break;
                }
            };

            let Some(d) = page.get(envelope::DATA_KEY) else {
                break;
            };
            let page_data = materialize::expand(self, d.clone());
            data.results.extend(page_data.results);
            if let (Some(Value::Array(acc)), Some(Value::Array(more))) =
                (data.payload.get_mut(RESULTS_KEY), d.get(RESULTS_KEY))
            {
                acc.extend(more.iter().cloned());
            }
            data.next = page_data.next;
        }
    }
}

impl IntoFuture for RequestNode {
    type Output = Result<RequestNode, SpRestError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.fetch().await })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
