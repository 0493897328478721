//! Dataset pagination against a local stand-in for the Apify items endpoint.

use std::sync::{Arc, Mutex};

use apify_client::ApifyClient;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct PageQuery {
    offset: usize,
    limit: usize,
}

#[derive(Clone, Default)]
struct Dataset {
    items: Arc<Vec<Value>>,
    /// `(offset, limit)` of every page request, in order.
    requests: Arc<Mutex<Vec<(usize, usize)>>>,
}

async fn items(
    State(dataset): State<Dataset>,
    Path(_dataset_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Json<Vec<Value>> {
    dataset
        .requests
        .lock()
        .unwrap()
        .push((page.offset, page.limit));
    Json(
        dataset
            .items
            .iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect(),
    )
}

async fn serve(count: usize) -> (ApifyClient, Dataset) {
    let dataset = Dataset {
        items: Arc::new(
            (0..count)
                .map(|i| json!({ "placeId": format!("p{i}") }))
                .collect(),
        ),
        requests: Arc::default(),
    };
    let app = Router::new()
        .route("/v2/datasets/{dataset_id}/items", get(items))
        .with_state(dataset.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (ApifyClient::with_base_url(&format!("http://{addr}/v2")), dataset)
}

fn ids(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| item["placeId"].as_str().unwrap().to_string())
        .collect()
}

fn requests(dataset: &Dataset) -> Vec<(usize, usize)> {
    dataset.requests.lock().unwrap().clone()
}

#[tokio::test]
async fn short_last_page_ends_the_walk() {
    let (client, dataset) = serve(5).await;

    let items: Vec<Value> = client.get_dataset_items("tok", "ds-1", 2).await.unwrap();

    assert_eq!(ids(&items), vec!["p0", "p1", "p2", "p3", "p4"]);
    assert_eq!(requests(&dataset), vec![(0, 2), (2, 2), (4, 2)]);
}

#[tokio::test]
async fn exactly_full_last_page_is_followed_by_an_empty_one() {
    let (client, dataset) = serve(4).await;

    let items: Vec<Value> = client.get_dataset_items("tok", "ds-1", 2).await.unwrap();

    assert_eq!(ids(&items), vec!["p0", "p1", "p2", "p3"]);
    assert_eq!(requests(&dataset), vec![(0, 2), (2, 2), (4, 2)]);
}

#[tokio::test]
async fn empty_dataset_takes_one_request() {
    let (client, dataset) = serve(0).await;

    let items: Vec<Value> = client.get_dataset_items("tok", "ds-1", 100).await.unwrap();

    assert!(items.is_empty());
    assert_eq!(requests(&dataset), vec![(0, 100)]);
}

#[tokio::test]
async fn zero_page_size_still_makes_progress() {
    let (client, dataset) = serve(3).await;

    let items: Vec<Value> = client.get_dataset_items("tok", "ds-1", 0).await.unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(requests(&dataset), vec![(0, 1), (1, 1), (2, 1), (3, 1)]);
}
