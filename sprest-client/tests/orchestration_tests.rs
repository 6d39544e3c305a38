// Orchestration Tests
// Group registration, wait ordering, draining and failure handling against a scripted transport

use serde_json::json;
use sprest_client::{Client, ClientConfig, SpRestError};
use sprest_transport::MockTransport;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Notify};

const WEB_URL: &str = "https://a/web/_api/web";
const LISTS_URL: &str = "https://a/web/_api/web/Lists";
const TASKS_URL: &str = "https://a/web/_api/web/lists/getByTitle('Tasks')";
const OFFLINE_URL: &str = "https://a/web/_api/web/lists/getByTitle('Offline')";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (Arc<MockTransport>, Client) {
    init_tracing();
    let mock = Arc::new(MockTransport::new());
    mock.respond(
        WEB_URL,
        200,
        json!({"d": {"__metadata": {"type": "SP.Web"}, "Title": "Home"}}),
    );
    mock.respond(LISTS_URL, 200, json!({"d": {"results": []}}));
    mock.respond(
        TASKS_URL,
        200,
        json!({"d": {"__metadata": {"type": "SP.List"}, "Title": "Tasks"}}),
    );
    let client = Client::with_transport(ClientConfig::for_web("https://a/web"), mock.clone());
    (mock, client)
}

async fn settle_runtime() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_execute_and_settle() {
    let (mock, client) = setup();
    let web = client.web();

    web.execute();
    let responses = web.settle().await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id(), web.id());
    assert_eq!(web.exists(), Some(true));
    assert_eq!(web.get("Title"), Some(json!("Home")));
    assert_eq!(web.entity_type().as_deref(), Some("web"));
    assert_eq!(mock.request_urls(), vec![WEB_URL.to_string()]);
}

#[tokio::test]
async fn test_children_register_in_parent_group_in_order() {
    let (_mock, client) = setup();
    let web = client.web();

    web.execute();
    let lists = web.collection("Lists").execute();
    let tasks = web.property("Lists", Some("Tasks")).unwrap();
    assert_eq!(tasks.endpoint(), "web/Lists/getByTitle('Tasks')");
    let tasks = tasks.execute();

    assert_eq!(web.response_index(), Some(0));
    assert_eq!(lists.response_index(), Some(1));
    assert_eq!(tasks.response_index(), Some(2));
    assert_eq!(lists.group(), web.group());
    assert_eq!(lists.parent().map(|p| p.id()), Some(web.id()));

    let responses = web.settle().await;
    let ids: Vec<_> = responses.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![web.id(), lists.id(), tasks.id()]);

    // Indices stay where they were assigned.
    assert_eq!(lists.response_index(), Some(1));
    assert_eq!(tasks.response_index(), Some(2));
}

#[tokio::test]
async fn test_done_twice_does_not_redeliver() {
    let (_mock, client) = setup();
    let web = client.web();
    web.execute();

    let (tx, rx) = oneshot::channel();
    let first = web.done(move |responses| {
        let _ = tx.send(responses.len());
    });
    assert_eq!(rx.await.unwrap(), 1);
    assert!(first.is_resolved());

    let second = web.done(|_| {}).wait().await;
    assert!(second.is_empty());
    assert_eq!(client.group_len(web.group()), 0);
}

#[tokio::test]
async fn test_done_attaches_after_resolution() {
    let (_mock, client) = setup();
    let web = client.web();
    web.execute();

    let deferred = web.done(|_| {});
    let responses = deferred.wait().await;
    assert_eq!(responses.len(), 1);

    let seen = Arc::new(Mutex::new(0));
    let counter = seen.clone();
    deferred.attach(move |responses| {
        *counter.lock().unwrap() = responses.len();
    });
    assert_eq!(*seen.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_wait_node_holds_until_predecessor_callback_finishes() {
    let (mock, client) = setup();
    let web = client.web();
    let release = Arc::new(Notify::new());

    let gate = release.clone();
    web.execute_with(
        move |_| async move {
            gate.notified().await;
        },
        false,
    );
    let lists = web.collection("Lists").execute_with(|_| async {}, true);

    mock.wait_for_requests(1).await;
    settle_runtime().await;
    assert_eq!(mock.request_urls(), vec![WEB_URL.to_string()]);
    assert!(web.is_completed());
    assert!(!lists.is_completed());
    assert_eq!(client.group_wait_flags(web.group()), vec![false, false]);

    release.notify_one();
    let responses = web.settle().await;

    assert_eq!(responses.len(), 2);
    assert_eq!(
        mock.request_urls(),
        vec![WEB_URL.to_string(), LISTS_URL.to_string()]
    );
    assert_eq!(lists.exists(), Some(true));
}

#[tokio::test]
async fn test_wait_node_waits_for_slow_transport() {
    let (mock, client) = setup();
    let gate = mock.gate(WEB_URL);
    let web = client.web();

    web.execute();
    let lists = web.collection("Lists").execute_with(|_| async {}, true);
    let tasks = web.property("Lists", Some("Tasks")).unwrap().execute();

    // The independent node fires while the first one is still in flight.
    mock.wait_for_requests(2).await;
    settle_runtime().await;
    assert_eq!(mock.request_count(LISTS_URL), 0);
    assert!(!lists.is_completed());

    gate.notify_one();
    let responses = web.settle().await;
    assert_eq!(responses.len(), 3);
    assert!(tasks.is_completed());
    assert_eq!(mock.request_count(LISTS_URL), 1);
}

#[tokio::test]
async fn test_wait_callback_work_goes_to_private_group() {
    let (mock, client) = setup();
    mock.fallback(200, json!({"d": {"results": []}}));
    let web = client.web();
    let inner_count = Arc::new(Mutex::new(None));

    web.execute();
    let recorded = inner_count.clone();
    let lists = web.collection("Lists").execute_with(
        move |node| async move {
            let fields = node.collection("Fields").execute();
            assert_ne!(fields.group(), node.slot().map(|s| s.group).unwrap());
            let inner = node.settle().await;
            *recorded.lock().unwrap() = Some(inner.len());
        },
        true,
    );

    let outer = web.settle().await;

    assert_eq!(outer.len(), 2);
    assert_eq!(*inner_count.lock().unwrap(), Some(1));
    assert_eq!(lists.group(), web.group());
    assert_eq!(mock.request_count("https://a/web/_api/web/Lists/Fields"), 1);
}

#[tokio::test]
async fn test_execute_twice_fires_once() {
    let (mock, client) = setup();
    let web = client.web();

    web.execute();
    web.execute();
    let responses = web.settle().await;

    assert_eq!(responses.len(), 1);
    assert_eq!(mock.request_count(WEB_URL), 1);
}

#[tokio::test]
async fn test_failed_status_reports_missing_and_done_still_fires() {
    let (mock, client) = setup();
    mock.respond(
        "https://a/web/_api/web/lists/getByTitle('Missing')/items",
        500,
        json!({"error": {"code": "-1"}}),
    );
    let items = client.items("Missing");

    items.execute();
    let responses = items.done(|_| {}).wait().await;

    assert_eq!(responses.len(), 1);
    assert_eq!(items.exists(), Some(false));
    assert_eq!(items.status(), Some(500));
    assert!(items.results().is_empty());
    assert!(items.payload().is_none());
}

#[tokio::test]
async fn test_transport_failure_reports_missing() {
    let (mock, client) = setup();
    mock.fail(OFFLINE_URL, "connection reset");
    let list = client.list("Offline");

    list.execute();
    let responses = list.settle().await;

    assert_eq!(responses.len(), 1);
    assert_eq!(list.exists(), Some(false));
    assert_eq!(list.status(), None);
    assert!(list.payload().is_none());
    assert_eq!(mock.request_urls(), vec![OFFLINE_URL.to_string()]);
}

#[tokio::test]
async fn test_fetch_and_into_future() {
    let (mock, client) = setup();
    mock.respond(
        "https://a/web/_api/web/lists/getByTitle('Gone')",
        404,
        json!({"error": {"code": "-2130575322"}}),
    );

    let list = client.list("Tasks").await.unwrap();
    assert_eq!(list.get("Title"), Some(json!("Tasks")));

    let err = client.list("Gone").fetch().await.unwrap_err();
    assert_eq!(
        err,
        SpRestError::NotFound {
            url: "https://a/web/_api/web/lists/getByTitle('Gone')".to_string(),
            status: Some(404),
        }
    );
}

#[tokio::test]
async fn test_execute_and_wait_skips_group() {
    let (mock, client) = setup();
    let web = client.web();

    let completed = web.execute_and_wait().await;

    assert_eq!(completed.exists(), Some(true));
    assert_eq!(web.response_index(), None);
    assert!(web.settle().await.is_empty());
    assert_eq!(mock.request_count(WEB_URL), 1);
}

#[tokio::test]
async fn test_awaited_fetches_do_not_accumulate() {
    let (mock, client) = setup();
    let mut groups = Vec::new();

    for _ in 0..100 {
        let list = client.list("Tasks").await.unwrap();
        groups.push(list.group());
    }
    let missing = client.list("Gone").fetch().await;

    assert!(missing.is_err());
    assert_eq!(groups.iter().map(|g| client.group_len(*g)).sum::<usize>(), 0);
    assert_eq!(client.active_group_count(), 0);
    assert_eq!(mock.request_count(TASKS_URL), 100);
}

#[tokio::test]
async fn test_fetch_with_pending_siblings_stays_in_group() {
    let (_mock, client) = setup();
    let web = client.web();
    web.collection("Lists").execute();

    let fetched = web.fetch().await.unwrap();
    assert_eq!(fetched.response_index(), Some(1));
    assert_eq!(client.group_len(web.group()), 2);

    assert_eq!(web.settle().await.len(), 2);
    assert_eq!(client.active_group_count(), 0);
}

#[tokio::test]
async fn test_settled_groups_are_forgotten() {
    let (_mock, client) = setup();
    let web = client.web();

    assert!(web.settle().await.is_empty());
    assert_eq!(client.active_group_count(), 0);

    web.execute();
    web.collection("Lists").execute();
    assert_eq!(client.active_group_count(), 1);
    assert_eq!(web.done(|_| {}).wait().await.len(), 2);
    assert_eq!(client.active_group_count(), 0);
}
