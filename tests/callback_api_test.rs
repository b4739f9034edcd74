//! Integration tests for the callback listener and GET /api/callbacks

mod common;

use axum::body::Body;
use common::{cancelled_callback, mpesa_config, success_callback, TestApp};
use futures::future::join_all;
use std::collections::HashSet;
use http::{Request, StatusCode};
use serde_json::json;

fn ack() -> serde_json::Value {
    json!({"ResultCode": 0, "ResultDesc": "Accepted"})
}

#[tokio::test]
async fn test_success_callback_is_recorded_and_listed_first() {
    let app = TestApp::new("http://127.0.0.1:1");

    app.post_json("/mpesa/callback", success_callback("OLD0000001", 254700000001, 10))
        .await;
    let (status, body) = app
        .post_json("/mpesa/callback", success_callback("NLJ7RT61SV", 254708374149, 100))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ack());

    let (status, rows) = app.get("/api/callbacks").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["mpesa_receipt"], "NLJ7RT61SV");
    assert_eq!(rows[0]["phone"], "254708374149");
    assert_eq!(rows[0]["status"], "success");
    assert_eq!(rows[0]["result_code"], 0);
    assert_eq!(
        rows[0]["payload"]["Body"]["stkCallback"]["CheckoutRequestID"],
        "ws_CO_191220191020363925"
    );
    assert_eq!(app.notifier.count(), 2);
}

#[tokio::test]
async fn test_failed_callback_is_recorded_without_notification() {
    let app = TestApp::new("http://127.0.0.1:1");

    let (status, body) = app.post_json("/mpesa/callback", cancelled_callback()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ack());

    let (_, rows) = app.get("/api/callbacks").await;
    assert_eq!(rows[0]["status"], "failed");
    assert_eq!(rows[0]["result_code"], 1032);
    assert_eq!(rows[0]["result_desc"], "Request cancelled by user");
    assert_eq!(app.notifier.count(), 0);
}

#[tokio::test]
async fn test_malformed_callback_is_acknowledged_and_kept() {
    let app = TestApp::new("http://127.0.0.1:1");

    let (status, body) = app.post_raw("/mpesa/callback", "{not json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ack());

    let (status, body) = app.post_json("/mpesa/callback", json!({"Body": {}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ack());

    let (_, rows) = app.get("/api/callbacks").await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["status"], "unparsed");
    assert_eq!(rows[1]["payload"], "{not json");
    assert_eq!(rows[0]["payload"], json!({"Body": {}}));
    assert!(rows[0]["processing_error"].is_string());
    assert_eq!(app.notifier.count(), 0);
}

#[tokio::test]
async fn test_non_utf8_callback_is_stored_verbatim() {
    let app = TestApp::new("http://127.0.0.1:1");

    let request = Request::builder()
        .method("POST")
        .uri("/mpesa/callback")
        .body(Body::from(vec![0x7b, 0xff, 0xfe]))
        .unwrap();
    let (status, _, body) = app.request(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ack());

    let (_, rows) = app.get("/api/callbacks").await;
    assert_eq!(rows[0]["status"], "unparsed");
    assert_eq!(rows[0]["payload"], json!({"base64": "e//+"}));
}

#[tokio::test]
async fn test_concurrent_callbacks_each_get_one_record() {
    let app = TestApp::new("http://127.0.0.1:1");

    let receipts: Vec<String> = (0..20).map(|i| format!("C{:03}", i)).collect();
    let acks = join_all(receipts.iter().map(|receipt| {
        app.post_json("/mpesa/callback", success_callback(receipt, 254700000001, 1))
    }))
    .await;
    assert!(acks.iter().all(|(status, body)| *status == StatusCode::OK && *body == ack()));

    let (_, rows) = app.get("/api/callbacks").await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 20);

    let ids: HashSet<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids.len(), 20);
    let stored: HashSet<&str> = rows
        .iter()
        .map(|r| r["mpesa_receipt"].as_str().unwrap())
        .collect();
    let expected: HashSet<&str> = receipts.iter().map(String::as_str).collect();
    assert_eq!(stored, expected);
    assert_eq!(app.notifier.count(), 20);
}

#[tokio::test]
async fn test_txn_filter_is_case_sensitive_substring() {
    let app = TestApp::new("http://127.0.0.1:1");

    for receipt in ["XXABCYY", "ABC123", "xxabcyy", "QRS999"] {
        app.post_json("/mpesa/callback", success_callback(receipt, 254700000001, 1))
            .await;
    }
    app.post_json("/mpesa/callback", cancelled_callback()).await;

    let (_, rows) = app.get("/api/callbacks?txn=ABC").await;
    let receipts: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["mpesa_receipt"].as_str().unwrap())
        .collect();
    assert_eq!(receipts, vec!["ABC123", "XXABCYY"]);
}

#[tokio::test]
async fn test_phone_filter_and_empty_filters() {
    let app = TestApp::new("http://127.0.0.1:1");

    app.post_json("/mpesa/callback", success_callback("AAA", 254711111111, 1))
        .await;
    app.post_json("/mpesa/callback", success_callback("BBB", 254722222222, 1))
        .await;

    let (_, rows) = app.get("/api/callbacks?phone=2547222").await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["mpesa_receipt"], "BBB");

    let (_, rows) = app.get("/api/callbacks?txn=&phone=").await;
    assert_eq!(rows.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_history_is_capped_at_fifty() {
    let app = TestApp::new("http://127.0.0.1:1");

    for i in 0..55 {
        app.post_json(
            "/mpesa/callback",
            success_callback(&format!("R{:04}", i), 254700000001, 1),
        )
        .await;
    }

    let (_, rows) = app.get("/api/callbacks").await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 50);
    assert_eq!(rows[0]["mpesa_receipt"], "R0054");

    let (_, rows) = app.get("/api/callbacks?limit=500").await;
    assert_eq!(rows.as_array().unwrap().len(), 50);

    let (_, rows) = app.get("/api/callbacks?limit=5").await;
    assert_eq!(rows.as_array().unwrap().len(), 5);
    assert_eq!(app.store.len().await, 55);
}

#[tokio::test]
async fn test_callback_path_is_configurable() {
    let mut config = mpesa_config("http://127.0.0.1:1");
    config.callback_path = "/hooks/mpesa-result".to_string();
    let app = TestApp::with_config(config);

    let (status, body) = app
        .post_json("/hooks/mpesa-result", cancelled_callback())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ack());

    let (status, _) = app.post_json("/mpesa/callback", cancelled_callback()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let app = TestApp::new("http://127.0.0.1:1");

    let request = Request::builder()
        .uri("/api/callbacks")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = app.request(request).await;
    assert_eq!(headers.get("x-request-id").unwrap(), "req-42");

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, headers, _) = app.request(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn test_health_reports_in_memory_store() {
    let app = TestApp::new("http://127.0.0.1:1");

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Degraded");
    assert_eq!(body["checks"]["database"]["status"], "Warning");
}
