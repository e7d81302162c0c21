//! Hosted embedding providers against in-process stub servers.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use common::spawn_stub;
use neerniti::config::EmbeddingConfig;
use neerniti::embedding::{
    embed_batched, embed_query, CohereProvider, EmbeddingProvider, InputType, OpenAIProvider,
};
use serde_json::{json, Value};

fn config(provider: &str, url: String) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: provider.to_string(),
        model: Some("embed-multilingual-v3.0".to_string()),
        url: Some(url),
        batch_size: 2,
        max_retries: 1,
        timeout_secs: 5,
    }
}

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<Value>>>,
}

#[tokio::test]
async fn cohere_sends_input_type_and_parses_float_embeddings() {
    let seen = Seen::default();
    let router = Router::new()
        .route(
            "/embed",
            post(|State(seen): State<Seen>, Json(body): Json<Value>| async move {
                let n = body["texts"].as_array().map(Vec::len).unwrap_or(0);
                seen.bodies.lock().unwrap().push(body);
                let rows: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, 1.0]).collect();
                Json(json!({ "id": "x", "embeddings": { "float": rows } }))
            }),
        )
        .with_state(seen.clone());
    let base = spawn_stub(router).await;

    let provider =
        CohereProvider::with_api_key(&config("cohere", format!("{}/embed", base)), "k".into())
            .unwrap();
    assert_eq!(provider.model_name(), "embed-multilingual-v3.0");

    let texts: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let vectors = embed_batched(&provider, &texts, 2, InputType::SearchDocument)
        .await
        .unwrap();
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[1], vec![1.0, 1.0]);
    // second batch restarts its own numbering
    assert_eq!(vectors[2], vec![0.0, 1.0]);

    let query = embed_query(&provider, "rain in dang").await.unwrap();
    assert_eq!(query, vec![0.0, 1.0]);

    let bodies = seen.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[0]["input_type"], "search_document");
    assert_eq!(bodies[0]["model"], "embed-multilingual-v3.0");
    assert_eq!(bodies[2]["input_type"], "search_query");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/v1/embeddings",
            post(|State(attempts): State<Arc<AtomicUsize>>| async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
                }
                Json(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }))
                .into_response()
            }),
        )
        .with_state(attempts.clone());
    let base = spawn_stub(router).await;

    let provider = OpenAIProvider::with_api_key(
        &config("openai", format!("{}/v1/embeddings", base)),
        "k".into(),
    )
    .unwrap();
    let texts = vec!["first".to_string(), "second".to_string()];
    let vectors = provider
        .embed(&texts, InputType::SearchDocument)
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/embed",
            post(|State(attempts): State<Arc<AtomicUsize>>| async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                (StatusCode::UNAUTHORIZED, "bad key")
            }),
        )
        .with_state(attempts.clone());
    let base = spawn_stub(router).await;

    let provider =
        CohereProvider::with_api_key(&config("cohere", format!("{}/embed", base)), "k".into())
            .unwrap();
    let err = embed_query(&provider, "x").await.unwrap_err();
    assert!(err.to_string().contains("401"));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
