// Pagination Tests
// Continuation links, get-all-items chasing and manual paging

use serde_json::json;
use sprest_client::{Client, ClientConfig, ODataQuery};
use sprest_transport::MockTransport;
use std::sync::Arc;

const PAGE_1: &str = "https://a/web/_api/web/lists/getByTitle('Tasks')/items?$top=2";
const PAGE_2: &str =
    "https://a/web/_api/web/lists/getByTitle('Tasks')/items?%24skiptoken=Paged%3dTRUE%26p_ID%3d2&$top=2";

fn item(id: u32) -> serde_json::Value {
    json!({ "__metadata": { "type": "SP.Data.TasksListItem" }, "Id": id })
}

fn setup() -> (Arc<MockTransport>, Client) {
    let (mock, client) = setup_first_page();
    mock.respond(PAGE_2, 200, json!({"d": {"results": [item(3)]}}));
    (mock, client)
}

fn setup_first_page() -> (Arc<MockTransport>, Client) {
    let mock = Arc::new(MockTransport::new());
    mock.respond(
        PAGE_1,
        200,
        json!({"d": {"results": [item(1), item(2)], "__next": PAGE_2}}),
    );
    let client = Client::with_transport(ClientConfig::for_web("https://a/web"), mock.clone());
    (mock, client)
}

fn ids(nodes: &[sprest_client::RequestNode]) -> Vec<serde_json::Value> {
    nodes.iter().filter_map(|n| n.get("Id")).collect()
}

#[tokio::test]
async fn test_get_all_items_concatenates_pages() {
    let (mock, client) = setup();
    let items = client.items("Tasks");
    let query = items.query(&ODataQuery::new().top(2).get_all_items(true));
    assert!(query.get_all_items());

    query.execute();
    let responses = items.settle().await;

    assert_eq!(responses.len(), 1);
    assert_eq!(ids(&query.results()), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(query.payload().unwrap()["results"].as_array().unwrap().len(), 3);
    assert!(!query.has_next());
    assert_eq!(query.entity_type().as_deref(), Some("items"));
    assert_eq!(
        mock.request_urls(),
        vec![PAGE_1.to_string(), PAGE_2.to_string()]
    );
}

#[tokio::test]
async fn test_done_resolves_after_last_page() {
    let (mock, client) = setup();
    let gate = mock.gate(PAGE_2);
    let items = client.items("Tasks");

    items
        .query(&ODataQuery::new().top(2).get_all_items(true))
        .execute();
    let deferred = items.done(|_| {});

    mock.wait_for_requests(2).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert!(!deferred.is_resolved());

    gate.notify_one();
    let responses = deferred.wait().await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].results().len(), 3);
}

#[tokio::test]
async fn test_failed_continuation_keeps_first_page() {
    let (mock, client) = setup_first_page();
    mock.respond(PAGE_2, 503, json!({}));
    let items = client.items("Tasks");

    let query = items
        .query(&ODataQuery::new().top(2).get_all_items(true))
        .execute();
    items.settle().await;

    assert_eq!(query.exists(), Some(true));
    assert_eq!(query.results().len(), 2);
    assert!(query.has_next());
}

#[tokio::test]
async fn test_manual_paging() {
    let (mock, client) = setup();
    let page = client
        .items("Tasks")
        .query(&ODataQuery::new().top(2))
        .execute_and_wait()
        .await;

    assert_eq!(ids(&page.results()), vec![json!(1), json!(2)]);
    assert!(page.has_next());
    assert_eq!(page.next().unwrap().request_info().url, PAGE_2);

    let next = page.next_page().await.unwrap();
    assert_eq!(ids(&next.results()), vec![json!(3)]);
    assert!(!next.has_next());
    assert!(next.next().is_none());
    assert!(next.next_page().await.is_none());
    assert_eq!(mock.request_count(PAGE_2), 1);
}

#[tokio::test]
async fn test_execute_and_wait_does_not_chase() {
    let (mock, client) = setup();
    let page = client
        .items("Tasks")
        .query(&ODataQuery::new().top(2).get_all_items(true))
        .execute_and_wait()
        .await;

    assert_eq!(page.results().len(), 2);
    assert!(page.has_next());
    assert_eq!(mock.request_count(PAGE_2), 0);
}
