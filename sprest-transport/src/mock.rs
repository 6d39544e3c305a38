// Scripted transport for tests.
// Responses are queued per request URL; gated URLs hold their response until released.

use crate::{RawResponse, Transport, TransportError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use sprest_core::RequestInfo;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};
use tracing::trace;

#[derive(Debug, Clone)]
enum Reply {
    Response(RawResponse),
    Failure(String),
}

/// In-memory `Transport` answering from a script.
///
/// Each URL owns a FIFO of replies; the last reply of a FIFO is sticky so repeated requests
/// keep getting it. Unscripted URLs get the fallback, or a 404 `error` envelope.
#[derive(Debug)]
pub struct MockTransport {
    routes: DashMap<String, VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    gates: DashMap<String, Arc<Notify>>,
    requests: Mutex<Vec<RequestInfo>>,
    arrivals: watch::Sender<usize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (arrivals, _) = watch::channel(0);
        Self {
            routes: DashMap::new(),
            fallback: Mutex::new(None),
            gates: DashMap::new(),
            requests: Mutex::new(Vec::new()),
            arrivals,
        }
    }

    fn push(&self, url: &str, reply: Reply) -> &Self {
        self.routes.entry(url.to_string()).or_default().push_back(reply);
        self
    }

    /// Queue a JSON response for `url`.
    pub fn respond(&self, url: &str, status: u16, body: Value) -> &Self {
        self.push(url, Reply::Response(RawResponse::json(status, &body)))
    }

    /// Queue a raw response for `url`.
    pub fn respond_raw(&self, url: &str, response: RawResponse) -> &Self {
        self.push(url, Reply::Response(response))
    }

    /// Queue a connection failure for `url`.
    pub fn fail(&self, url: &str, message: &str) -> &Self {
        self.push(url, Reply::Failure(message.to_string()))
    }

    /// Response for every URL without a script.
    pub fn fallback(&self, status: u16, body: Value) -> &Self {
        *lock(&self.fallback) = Some(Reply::Response(RawResponse::json(status, &body)));
        self
    }

    /// Hold responses for `url` until the returned handle is notified, once per request.
    pub fn gate(&self, url: &str) -> Arc<Notify> {
        self.gates
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RequestInfo> {
        lock(&self.requests).clone()
    }

    pub fn request_urls(&self) -> Vec<String> {
        lock(&self.requests).iter().map(|r| r.url.clone()).collect()
    }

    pub fn request_count(&self, url: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.url == url).count()
    }

    /// Wait until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut rx = self.arrivals.subscribe();
        // The sender lives in `self`, so `wait_for` only returns once the count is reached.
        let _ = rx.wait_for(|arrived| *arrived >= count).await;
    }

    fn next_reply(&self, url: &str) -> Reply {
        if let Some(mut queue) = self.routes.get_mut(url) {
            if queue.len() > 1 {
                if let Some(reply) = queue.pop_front() {
                    return reply;
                }
            }
            if let Some(reply) = queue.front() {
                return reply.clone();
            }
        }

        lock(&self.fallback).clone().unwrap_or_else(|| {
            Reply::Response(RawResponse::json(
                404,
                &json!({ "error": { "code": "-1", "message": { "value": format!("no script for {}", url) } } }),
            ))
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &RequestInfo) -> Result<RawResponse, TransportError> {
        trace!("Mock transport received {} {}", request.method, request.url);
        let reply = self.next_reply(&request.url);
        let gate = self.gates.get(&request.url).map(|g| Arc::clone(g.value()));

        lock(&self.requests).push(request.clone());
        self.arrivals.send_modify(|arrived| *arrived += 1);

        if let Some(gate) = gate {
            gate.notified().await;
        }

        match reply {
            Reply::Response(response) => Ok(response),
            Reply::Failure(message) => Err(TransportError::Connection(message)),
        }
    }
}
