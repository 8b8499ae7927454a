//! Shared helpers for integration tests

#![allow(dead_code)]

use axum::body::Bytes;
use axum::http::{StatusCode, Uri};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use acars_common::db::{init_memory_database, MessageStore};

pub async fn memory_store() -> MessageStore {
    MessageStore::new(init_memory_database().await.unwrap())
}

/// A request captured by [`http_sink`]
#[derive(Debug, Clone)]
pub struct Captured {
    pub path: String,
    pub body: String,
}

/// Local HTTP endpoint that records every request and answers 204
pub async fn http_sink() -> (String, Arc<Mutex<Vec<Captured>>>) {
    let log: Arc<Mutex<Vec<Captured>>> = Arc::default();
    let seen = log.clone();
    let router = Router::new().fallback(move |uri: Uri, body: Bytes| {
        let seen = seen.clone();
        async move {
            seen.lock().unwrap().push(Captured {
                path: uri.path().to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
            StatusCode::NO_CONTENT
        }
    });
    (serve(router).await, log)
}

/// Local HTTP endpoint that answers every request with 500; returns (base url, hit count)
pub async fn failing_server() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    });
    (serve(router).await, hits)
}

/// tar1090 stand-in serving a fixed `aircraft.json`; returns (base url, hit log)
pub async fn tar1090(aircraft: serde_json::Value) -> (String, Arc<Mutex<Vec<String>>>) {
    let hits: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen = hits.clone();
    let router = Router::new().route(
        "/data/aircraft.json",
        get(move |uri: Uri| {
            let seen = seen.clone();
            let body = serde_json::json!({ "now": 1700000000.0, "aircraft": aircraft.clone() });
            async move {
                seen.lock().unwrap().push(uri.to_string());
                Json(body)
            }
        }),
    );
    (serve(router).await, hits)
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
