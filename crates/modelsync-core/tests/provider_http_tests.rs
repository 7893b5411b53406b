//! Provider client tests against a local axum fixture server.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use modelsync_core::catalog::{ModelKind, RelatedQuery};
use modelsync_core::providers::ProviderHttpOptions;
use modelsync_core::{CatalogModel, CatalogProvider, CivitaiClient, HuggingFaceClient, Provider};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KNOWN_HASH: &str = "A1B2C3D4E5F60718293A4B5C6D7E8F90A1B2C3D4E5F60718293A4B5C6D7E8F90";

#[derive(Default)]
struct Fixture {
    civitai_hits: AtomicUsize,
    hf_hits: AtomicUsize,
    hf_authorized_hits: AtomicUsize,
    last_query: Mutex<HashMap<String, String>>,
}

fn civitai_model_json() -> Value {
    json!({
        "id": 42,
        "name": "CyberRealistic",
        "type": "Checkpoint",
        "stats": {"downloadCount": 120000, "rating": 4.9},
        "modelVersions": [{
            "id": 4200,
            "name": "v4.0",
            "baseModel": "SD 1.5",
            "files": [{
                "name": "cyberrealistic_v40.safetensors",
                "hashes": {"SHA256": KNOWN_HASH, "AutoV2": &KNOWN_HASH[..10]}
            }]
        }]
    })
}

async fn civitai_search(
    State(fixture): State<Arc<Fixture>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    fixture.civitai_hits.fetch_add(1, Ordering::SeqCst);
    *fixture.last_query.lock().unwrap() = params;
    Json(json!({"items": [civitai_model_json()], "metadata": {"totalItems": 1}}))
}

async fn civitai_model(
    State(fixture): State<Arc<Fixture>>,
    Path(id): Path<u64>,
) -> Response {
    fixture.civitai_hits.fetch_add(1, Ordering::SeqCst);
    if id == 42 {
        Json(civitai_model_json()).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "No model"}))).into_response()
    }
}

async fn civitai_by_hash(
    State(fixture): State<Arc<Fixture>>,
    Path(hash): Path<String>,
) -> Response {
    fixture.civitai_hits.fetch_add(1, Ordering::SeqCst);
    if hash.eq_ignore_ascii_case(KNOWN_HASH) {
        Json(json!({
            "id": 4200,
            "modelId": 42,
            "name": "v4.0",
            "baseModel": "SD 1.5",
            "files": [{"name": "cyberrealistic_v40.safetensors", "hashes": {"SHA256": KNOWN_HASH}}]
        }))
        .into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "Model not found"}))).into_response()
    }
}

async fn hf_search(
    State(fixture): State<Arc<Fixture>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fixture.hf_hits.fetch_add(1, Ordering::SeqCst);
    if headers.contains_key("authorization") {
        fixture.hf_authorized_hits.fetch_add(1, Ordering::SeqCst);
        return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();
    }
    *fixture.last_query.lock().unwrap() = params;
    Json(json!([{
        "id": "someone/xl-detail-lora",
        "downloads": 900,
        "likes": 12,
        "tags": ["lora", "base_model:adapter:stabilityai/stable-diffusion-xl-base-1.0"],
        "pipeline_tag": "text-to-image",
        "siblings": [{"rfilename": "xl_detail_lora.safetensors"}]
    }]))
    .into_response()
}

async fn hf_model(
    State(fixture): State<Arc<Fixture>>,
    Path((owner, name)): Path<(String, String)>,
) -> Response {
    fixture.hf_hits.fetch_add(1, Ordering::SeqCst);
    if owner == "stabilityai" && name == "stable-diffusion-xl-base-1.0" {
        Json(json!({
            "id": "stabilityai/stable-diffusion-xl-base-1.0",
            "downloads": 2000000,
            "likes": 6000,
            "pipeline_tag": "text-to-image",
            "library_name": "diffusers",
            "siblings": [{"rfilename": "sd_xl_base_1.0.safetensors"}]
        }))
        .into_response()
    } else {
        (StatusCode::NOT_FOUND, "Repository not found").into_response()
    }
}

async fn spawn_fixture() -> (SocketAddr, Arc<Fixture>) {
    let fixture = Arc::new(Fixture::default());
    let app = Router::new()
        .route("/civitai/models", get(civitai_search))
        .route("/civitai/models/:id", get(civitai_model))
        .route("/civitai/model-versions/by-hash/:hash", get(civitai_by_hash))
        .route("/hf/models", get(hf_search))
        .route("/hf/models/:owner/:name", get(hf_model))
        .with_state(fixture.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server error");
    });
    (addr, fixture)
}

fn options(provider: Provider, base_url: String, token: Option<&str>) -> ProviderHttpOptions {
    ProviderHttpOptions {
        provider,
        base_url,
        min_request_interval: Duration::ZERO,
        cache_ttl: Duration::from_secs(3600),
        cache_capacity: 64,
        token: token.map(str::to_string),
    }
}

fn civitai_client(addr: SocketAddr) -> CivitaiClient {
    CivitaiClient::new(
        options(Provider::Civitai, format!("http://{addr}/civitai"), None),
        10,
    )
    .unwrap()
}

fn hf_client(addr: SocketAddr, token: Option<&str>) -> HuggingFaceClient {
    HuggingFaceClient::new(
        options(Provider::HuggingFace, format!("http://{addr}/hf"), token),
        10,
    )
    .unwrap()
}

#[tokio::test]
async fn test_civitai_search_by_name_sends_query_and_limit() {
    let (addr, fixture) = spawn_fixture().await;
    let client = civitai_client(addr);

    let results = client.search_by_name("cyberrealistic v40").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name(), "CyberRealistic");

    let query = fixture.last_query.lock().unwrap().clone();
    assert_eq!(query.get("query").map(String::as_str), Some("cyberrealistic v40"));
    assert_eq!(query.get("limit").map(String::as_str), Some("10"));
}

#[tokio::test]
async fn test_civitai_hash_lookup_fetches_parent_model() {
    let (addr, fixture) = spawn_fixture().await;
    let client = civitai_client(addr);

    let results = client.search_by_hash(KNOWN_HASH).await.unwrap();
    assert_eq!(results.len(), 1);
    let model = results[0].as_civitai().unwrap();
    assert_eq!(model.id, 42);
    assert!(model.version(4200).is_some());
    // by-hash plus the model page
    assert_eq!(fixture.civitai_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_civitai_unknown_hash_is_empty_not_error() {
    let (addr, _fixture) = spawn_fixture().await;
    let client = civitai_client(addr);

    let results = client.search_by_hash("0000000000").await.unwrap();
    assert!(results.is_empty());
    assert!(client.get_by_id("7").await.unwrap().is_none());
    assert!(client.get_by_id("not-a-number").await.unwrap().is_none());
}

#[tokio::test]
async fn test_civitai_related_query_parameters() {
    let (addr, fixture) = spawn_fixture().await;
    let client = civitai_client(addr);

    let query = RelatedQuery {
        kind: ModelKind::Lora,
        family: "SD 1.5".into(),
        limit: 5,
    };
    client.search_related(&query).await.unwrap();

    let sent = fixture.last_query.lock().unwrap().clone();
    assert_eq!(sent.get("types").map(String::as_str), Some("LORA"));
    assert_eq!(sent.get("baseModels").map(String::as_str), Some("SD 1.5"));
    assert_eq!(sent.get("sort").map(String::as_str), Some("Most Downloaded"));
    assert_eq!(sent.get("limit").map(String::as_str), Some("5"));
}

#[tokio::test]
async fn test_responses_are_memoized() {
    let (addr, fixture) = spawn_fixture().await;
    let client = civitai_client(addr);

    client.search_by_name("cyberrealistic").await.unwrap();
    client.search_by_name("cyberrealistic").await.unwrap();
    assert_eq!(fixture.civitai_hits.load(Ordering::SeqCst), 1);
    assert_eq!(client.http().requests_sent(), 1);

    client.clear_cache();
    client.search_by_name("cyberrealistic").await.unwrap();
    assert_eq!(fixture.civitai_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_hf_unauthorized_retries_without_credentials() {
    let (addr, fixture) = spawn_fixture().await;
    let client = hf_client(addr, Some("hf_expired"));

    let results = client.search_by_name("xl detail lora").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(fixture.hf_authorized_hits.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.hf_hits.load(Ordering::SeqCst), 2);

    let query = fixture.last_query.lock().unwrap().clone();
    assert_eq!(query.get("sort").map(String::as_str), Some("downloads"));
    assert_eq!(query.get("direction").map(String::as_str), Some("-1"));
}

#[tokio::test]
async fn test_hf_lookup_by_id() {
    let (addr, _fixture) = spawn_fixture().await;
    let client = hf_client(addr, None);

    let missing = client.get_model_info("someone/missing").await.unwrap();
    assert!(missing.is_none());

    let found = client
        .get_by_id("stabilityai/stable-diffusion-xl-base-1.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.kind(), ModelKind::Checkpoint);
}

#[tokio::test]
async fn test_hf_related_uses_filter_and_family_term() {
    let (addr, fixture) = spawn_fixture().await;
    let client = hf_client(addr, None);

    let query = RelatedQuery {
        kind: ModelKind::Lora,
        family: "SDXL 1.0".into(),
        limit: 20,
    };
    let results = client.search_related(&query).await.unwrap();
    assert_eq!(results.len(), 1);

    let sent = fixture.last_query.lock().unwrap().clone();
    assert_eq!(sent.get("filter").map(String::as_str), Some("lora"));
    assert_eq!(sent.get("search").map(String::as_str), Some("stable-diffusion-xl"));
}

#[tokio::test]
async fn test_server_error_surfaces_status() {
    let (addr, _fixture) = spawn_fixture().await;
    let client = CivitaiClient::new(
        options(Provider::Civitai, format!("http://{addr}/nowhere"), None),
        10,
    )
    .unwrap();

    let err = client.search_by_name("anything").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}
