//! Exercises `SurfTransport` end to end against a local axum server.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use fetch_cache::{
    Callbacks, ClientConfig, FetchContext, FetchError, FetchOptions, FetchPolicy, Registration, RequestDescriptor,
    ResponseData,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

type Hits = Arc<AtomicUsize>;

fn app(hits: Hits) -> Router {
    Router::new()
        .route("/posts/{id}", get(get_post))
        .route("/boom", get(boom))
        .with_state(hits)
}

async fn get_post(State(hits): State<Hits>, Path(id): Path<u32>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    Json(json!({ "id": id, "title": format!("post {id}") }))
}

async fn boom() -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "boom" })))
}

async fn start_server() -> (String, Hits) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Hits::default();
    let router = app(hits.clone());
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    (format!("http://{addr}"), hits)
}

fn surf_context(base_url: String) -> FetchContext {
    let _ = env_logger::builder().is_test(true).try_init();
    FetchContext::with_surf(ClientConfig {
        base_url: Some(base_url),
        ..Default::default()
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn fetches_and_caches_over_http() {
    let (base_url, hits) = start_server().await;
    let ctx = surf_context(base_url);

    let fetch = ctx.request(FetchOptions::get("/posts/1"));
    fetch.subscribe(|_| {});
    let state = fetch.settled().await;

    assert!(!state.has_error(), "{:?}", state.error);
    let response = state.response.unwrap();
    assert_eq!(response.status, 200);
    assert!(response.headers.contains_key("content-type"));
    assert_eq!(
        state.data,
        Some(ResponseData::Json(json!({ "id": 1, "title": "post 1" })))
    );

    let again = ctx.request(FetchOptions::get("/posts/1"));
    again.subscribe(|_| {});
    again.settled().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_requests_hit_the_server_once() {
    let (base_url, hits) = start_server().await;
    let ctx = surf_context(base_url);

    let first = ctx.execute(RequestDescriptor::get("/posts/2"), FetchPolicy::NetworkOnly, Callbacks::new());
    let second = ctx.execute(RequestDescriptor::get("/posts/2"), FetchPolicy::NetworkOnly, Callbacks::new());
    assert_eq!(second.registration(), Some(Registration::Joined));

    let (a, b) = tokio::join!(first.settled(), second.settled());
    let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());
    assert_eq!(a, b);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_a_response() {
    let (base_url, _) = start_server().await;
    let ctx = surf_context(base_url);

    let outcome = ctx
        .execute(RequestDescriptor::get("/boom"), FetchPolicy::NetworkOnly, Callbacks::new())
        .settled()
        .await
        .unwrap();
    let response = outcome.unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(response.data, ResponseData::Json(json!({ "message": "boom" })));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let ctx = surf_context(format!("http://{addr}"));

    let outcome = ctx
        .execute(RequestDescriptor::get("/posts/1"), FetchPolicy::NetworkOnly, Callbacks::new())
        .settled()
        .await
        .unwrap();
    assert!(matches!(outcome, Err(FetchError::Network(_))));
}
