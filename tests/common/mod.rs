//! Shared fixtures: a local stand-in for the Daraja API and an app wired on in-memory stores.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use http::Request;
use mpesa_stk_backend::api::{router, AppState};
use mpesa_stk_backend::config::{MpesaConfig, SubscriptionConfig};
use mpesa_stk_backend::database::memory::{InMemoryCallbackStore, InMemorySubscriptionStore};
use mpesa_stk_backend::health::HealthChecker;
use mpesa_stk_backend::payments::providers::MpesaProvider;
use mpesa_stk_backend::services::notification::NotifyError;
use mpesa_stk_backend::services::{
    CallbackService, PaymentAlert, PaymentIssuer, PaymentNotifier, SubscriptionService,
};
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub const SHORTCODE: &str = "174379";
pub const PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";
pub const STUB_TOKEN: &str = "stub-access-token";
pub const SUBSCRIPTION_PRICE: i64 = 100;

pub const ACCEPTED: &str = r#"{"MerchantRequestID":"29115-34620561-1","CheckoutRequestID":"ws_CO_191220191020363925","ResponseCode":"0","ResponseDescription":"Success. Request accepted for processing","CustomerMessage":"Success. Request accepted for processing"}"#;

pub fn mpesa_config(base_url: &str) -> MpesaConfig {
    MpesaConfig {
        consumer_key: "consumer-key".to_string(),
        consumer_secret: "consumer-secret".to_string(),
        shortcode: SHORTCODE.to_string(),
        passkey: PASSKEY.to_string(),
        callback_url: "https://example.com/mpesa/callback".to_string(),
        callback_path: "/mpesa/callback".to_string(),
        base_url: base_url.to_string(),
        transaction_type: "CustomerPayBillOnline".to_string(),
        account_reference: "TestRef".to_string(),
        transaction_desc: "Test Payment".to_string(),
        timeout_secs: 5,
    }
}

/// What the stub provider answers and what it saw.
pub struct StubState {
    pub token_status: u16,
    pub push_status: u16,
    pub push_body: String,
    pub token_calls: AtomicUsize,
    pub push_calls: AtomicUsize,
    pub last_push: Mutex<Option<JsonValue>>,
    pub last_bearer: Mutex<Option<String>>,
}

pub struct StubProvider {
    pub base_url: String,
    pub state: Arc<StubState>,
}

impl StubProvider {
    pub async fn start(token_status: u16, push_status: u16, push_body: &str) -> Self {
        let state = Arc::new(StubState {
            token_status,
            push_status,
            push_body: push_body.to_string(),
            token_calls: AtomicUsize::new(0),
            push_calls: AtomicUsize::new(0),
            last_push: Mutex::new(None),
            last_bearer: Mutex::new(None),
        });

        let app = Router::new()
            .route("/oauth/v1/generate", get(stub_token))
            .route("/mpesa/stkpush/v1/processrequest", post(stub_push))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub async fn accepting() -> Self {
        Self::start(200, 200, ACCEPTED).await
    }

    pub fn calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst) + self.state.push_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.state.push_calls.load(Ordering::SeqCst)
    }

    pub fn last_push(&self) -> Option<JsonValue> {
        self.state.last_push.lock().unwrap().clone()
    }
}

async fn stub_token(State(state): State<Arc<StubState>>, headers: HeaderMap) -> impl IntoResponse {
    state.token_calls.fetch_add(1, Ordering::SeqCst);

    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("consumer-key:consumer-secret")
    );
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());

    if state.token_status != 200 || !authorized {
        let status = StatusCode::from_u16(state.token_status)
            .ok()
            .filter(|s| !s.is_success())
            .unwrap_or(StatusCode::UNAUTHORIZED);
        return (status, Json(json!({"errorMessage": "Invalid credentials"}))).into_response();
    }

    Json(json!({"access_token": STUB_TOKEN, "expires_in": "3599"})).into_response()
}

async fn stub_push(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> impl IntoResponse {
    state.push_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_push.lock().unwrap() = Some(body);
    *state.last_bearer.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    (
        StatusCode::from_u16(state.push_status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        state.push_body.clone(),
    )
}

#[derive(Default)]
pub struct CountingNotifier {
    pub alerts: Mutex<Vec<PaymentAlert>>,
}

impl CountingNotifier {
    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentNotifier for CountingNotifier {
    async fn notify_payment(&self, alert: &PaymentAlert) -> Result<(), NotifyError> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryCallbackStore,
    pub notifier: Arc<CountingNotifier>,
}

impl TestApp {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(mpesa_config(base_url))
    }

    pub fn with_config(mpesa: MpesaConfig) -> Self {
        let store = InMemoryCallbackStore::new();
        let notifier = Arc::new(CountingNotifier::default());
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::new(InMemorySubscriptionStore::new()),
            SubscriptionConfig {
                price: SUBSCRIPTION_PRICE,
                days: 30,
            },
        ));
        let gateway = Arc::new(MpesaProvider::new(mpesa.clone()).unwrap());

        let state = AppState {
            issuer: Arc::new(PaymentIssuer::new(gateway, mpesa.clone())),
            callbacks: Arc::new(CallbackService::new(
                Arc::new(store.clone()),
                notifier.clone(),
                subscriptions.clone(),
            )),
            store: Arc::new(store.clone()),
            subscriptions,
            health_checker: HealthChecker::new(None, false),
        };

        Self {
            router: router(state, &mpesa.callback_path),
            store,
            notifier,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, HeaderMap, JsonValue) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, JsonValue) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.request(request).await;
        (status, body)
    }

    pub async fn post_json(&self, uri: &str, body: JsonValue) -> (StatusCode, JsonValue) {
        self.post_raw(uri, &body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, JsonValue) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = self.request(request).await;
        (status, body)
    }
}

pub fn success_callback(receipt: &str, phone: u64, amount: u64) -> JsonValue {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": amount},
                        {"Name": "MpesaReceiptNumber", "Value": receipt},
                        {"Name": "Balance"},
                        {"Name": "TransactionDate", "Value": 20191219102115u64},
                        {"Name": "PhoneNumber", "Value": phone}
                    ]
                }
            }
        }
    })
}

pub fn cancelled_callback() -> JsonValue {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "8555-67195-1",
                "CheckoutRequestID": "ws_CO_27072017151044001",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }
        }
    })
}
