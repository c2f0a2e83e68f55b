use super::*;
use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use serde_json::{json, Value};
use shared::error::AuthErrorCode;
use tokio::{net::TcpListener, sync::Mutex};

use crate::{auth::AnonymousTokens, error::AuthError};

const PROJECT: &str = "crm-test";
const COLLECTION_PATH: &str = "/v1/projects/crm-test/databases/(default)/documents/customers";
const STUB_PAGE_SIZE: usize = 2;

#[derive(Clone)]
struct StubState {
    documents: Arc<Mutex<BTreeMap<String, String>>>,
    next_id: Arc<Mutex<u32>>,
    fail_with: Arc<Mutex<Option<(StatusCode, Value)>>>,
    list_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    authorizations: Arc<Mutex<Vec<Option<String>>>>,
}

impl StubState {
    fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(0)),
            fail_with: Arc::new(Mutex::new(None)),
            list_queries: Arc::new(Mutex::new(Vec::new())),
            authorizations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn record_authorization(&self, headers: &HeaderMap) {
        let value = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.authorizations.lock().await.push(value);
    }

    async fn failure(&self) -> Option<(StatusCode, Json<Value>)> {
        self.fail_with
            .lock()
            .await
            .clone()
            .map(|(status, body)| (status, Json(body)))
    }
}

fn resource_name(id: &str) -> String {
    format!("projects/{PROJECT}/databases/(default)/documents/customers/{id}")
}

fn stored_document(id: &str, name: &str) -> Value {
    json!({
        "name": resource_name(id),
        "fields": {"name": {"stringValue": name}},
        "createTime": "2024-01-01T00:00:00.000000Z",
        "updateTime": "2024-01-01T00:00:00.000000Z"
    })
}

async fn list_documents(
    State(state): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.record_authorization(&headers).await;
    state.list_queries.lock().await.push(query.clone());
    if let Some(failure) = state.failure().await {
        return failure;
    }

    let offset = query
        .get("pageToken")
        .and_then(|token| token.parse::<usize>().ok())
        .unwrap_or(0);
    let documents = state.documents.lock().await;
    let page: Vec<Value> = documents
        .iter()
        .skip(offset)
        .take(STUB_PAGE_SIZE)
        .map(|(id, name)| stored_document(id, name))
        .collect();

    let mut body = json!({});
    if !page.is_empty() {
        body["documents"] = Value::Array(page);
    }
    if offset + STUB_PAGE_SIZE < documents.len() {
        body["nextPageToken"] = json!((offset + STUB_PAGE_SIZE).to_string());
    }
    (StatusCode::OK, Json(body))
}

async fn create_document(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(document): Json<FirestoreDocument>,
) -> (StatusCode, Json<Value>) {
    state.record_authorization(&headers).await;
    if let Some(failure) = state.failure().await {
        return failure;
    }

    let name = document
        .fields
        .get("name")
        .and_then(|value| value.string_value.clone())
        .unwrap_or_default();
    let id = {
        let mut next_id = state.next_id.lock().await;
        *next_id += 1;
        format!("doc{:03}", *next_id)
    };
    state.documents.lock().await.insert(id.clone(), name.clone());
    (StatusCode::OK, Json(stored_document(&id, &name)))
}

async fn delete_document(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.record_authorization(&headers).await;
    if let Some(failure) = state.failure().await {
        return failure;
    }
    state.documents.lock().await.remove(&id);
    (StatusCode::OK, Json(json!({})))
}

async fn spawn_firestore_server() -> (Url, StubState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = StubState::new();
    let app = Router::new()
        .route(COLLECTION_PATH, get(list_documents).post(create_document))
        .route(&format!("{COLLECTION_PATH}/:id"), delete(delete_document))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (
        Url::parse(&format!("http://{addr}/")).expect("url"),
        state,
    )
}

struct FixedToken(&'static str);

#[async_trait]
impl IdTokenSource for FixedToken {
    async fn id_token(&self) -> Result<Option<String>, AuthError> {
        Ok(Some(self.0.to_string()))
    }
}

/// Token source whose every lookup fails with the given error.
struct FailingToken(AuthError);

#[async_trait]
impl IdTokenSource for FailingToken {
    async fn id_token(&self) -> Result<Option<String>, AuthError> {
        Err(self.0.clone())
    }
}

fn record_store(base: &Url, tokens: Arc<dyn IdTokenSource>) -> FirestoreRecordStore {
    FirestoreRecordStore::new(base, PROJECT, "customers", tokens).expect("store")
}

#[test]
fn collection_url_points_at_default_database() {
    let base = Url::parse(DEFAULT_FIRESTORE_URL).expect("url");
    let store = record_store(&base, Arc::new(AnonymousTokens));
    assert_eq!(
        store.collection_url().as_str(),
        "https://firestore.googleapis.com/v1/projects/crm-test/databases/(default)/documents/customers"
    );
    assert_eq!(
        store
            .document_url(&CustomerId::from("abc"))
            .expect("url")
            .as_str(),
        "https://firestore.googleapis.com/v1/projects/crm-test/databases/(default)/documents/customers/abc"
    );
}

#[tokio::test]
async fn list_all_follows_page_tokens() {
    let (base, stub) = spawn_firestore_server().await;
    {
        let mut documents = stub.documents.lock().await;
        for (id, name) in [("a1", "Alice"), ("b2", "Bob"), ("c3", "Carol"), ("d4", "Dave"), ("e5", "Erin")] {
            documents.insert(id.to_string(), name.to_string());
        }
    }
    let store = record_store(&base, Arc::new(FixedToken("token-1")));

    let customers = store.list_all().await.expect("list");
    let names: Vec<_> = customers.iter().map(|customer| customer.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol", "Dave", "Erin"]);
    assert_eq!(customers[0].id, CustomerId::from("a1"));

    let queries = stub.list_queries.lock().await.clone();
    assert_eq!(queries.len(), 3);
    assert!(queries
        .iter()
        .all(|query| query.get("pageSize").map(String::as_str) == Some("300")));
    assert_eq!(queries[0].get("pageToken"), None);
    assert_eq!(queries[2].get("pageToken").map(String::as_str), Some("4"));

    let authorizations = stub.authorizations.lock().await.clone();
    assert!(authorizations
        .iter()
        .all(|value| value.as_deref() == Some("Bearer token-1")));
}

#[tokio::test]
async fn empty_collection_lists_nothing() {
    let (base, _stub) = spawn_firestore_server().await;
    let store = record_store(&base, Arc::new(FixedToken("token-1")));
    assert!(store.list_all().await.expect("list").is_empty());
}

#[tokio::test]
async fn insert_keeps_name_verbatim_and_returns_generated_id() {
    let (base, stub) = spawn_firestore_server().await;
    let store = record_store(&base, Arc::new(FixedToken("token-1")));

    let id = store
        .insert(NewCustomer::new(" Bob "))
        .await
        .expect("insert");
    assert_eq!(id, CustomerId::from("doc001"));
    assert_eq!(
        stub.documents.lock().await.get("doc001").map(String::as_str),
        Some(" Bob ")
    );

    let listed = store.list_all().await.expect("list");
    assert_eq!(listed[0].name, " Bob ");
}

#[tokio::test]
async fn delete_targets_document_resource() {
    let (base, stub) = spawn_firestore_server().await;
    let store = record_store(&base, Arc::new(FixedToken("token-1")));
    let keep = store.insert(NewCustomer::new("Keep")).await.expect("insert");
    let drop_id = store.insert(NewCustomer::new("Drop")).await.expect("insert");

    store.delete(&drop_id).await.expect("delete");
    let remaining: Vec<_> = stub.documents.lock().await.keys().cloned().collect();
    assert_eq!(remaining, vec![keep.to_string()]);
}

#[tokio::test]
async fn anonymous_requests_carry_no_bearer() {
    let (base, stub) = spawn_firestore_server().await;
    let store = record_store(&base, Arc::new(AnonymousTokens));
    store.list_all().await.expect("list");
    assert_eq!(stub.authorizations.lock().await.clone(), vec![None]);
}

#[tokio::test]
async fn forbidden_response_is_permission_denied() {
    let (base, stub) = spawn_firestore_server().await;
    *stub.fail_with.lock().await = Some((
        StatusCode::FORBIDDEN,
        json!({"error": {
            "code": 403,
            "message": "Missing or insufficient permissions.",
            "status": "PERMISSION_DENIED"
        }}),
    ));
    let store = record_store(&base, Arc::new(FixedToken("token-1")));

    let err = store.list_all().await.expect_err("denied");
    assert_eq!(
        err,
        DataError::PermissionDenied("Missing or insufficient permissions.".to_string())
    );
}

#[tokio::test]
async fn server_error_is_rejected_with_status() {
    let (base, stub) = spawn_firestore_server().await;
    *stub.fail_with.lock().await = Some((
        StatusCode::SERVICE_UNAVAILABLE,
        json!({"error": {"code": 503, "message": "The service is currently unavailable.", "status": "UNAVAILABLE"}}),
    ));
    let store = record_store(&base, Arc::new(FixedToken("token-1")));

    let err = store
        .insert(NewCustomer::new("Alice"))
        .await
        .expect_err("unavailable");
    assert!(matches!(err, DataError::Rejected { status: 503, .. }));
}

#[tokio::test]
async fn revoked_token_fails_before_request() {
    let (base, stub) = spawn_firestore_server().await;
    let store = record_store(
        &base,
        Arc::new(FailingToken(AuthError::from_code(AuthErrorCode::UserTokenExpired))),
    );

    let err = store.list_all().await.expect_err("revoked");
    assert!(matches!(err, DataError::PermissionDenied(_)));
    assert!(stub.list_queries.lock().await.is_empty());
}

#[tokio::test]
async fn offline_token_refresh_is_transport_failure() {
    let (base, stub) = spawn_firestore_server().await;
    let store = record_store(
        &base,
        Arc::new(FailingToken(AuthError::network("connection refused"))),
    );

    let err = store.list_all().await.expect_err("offline refresh");
    assert_eq!(
        err,
        DataError::Transport("Firebase: Error (auth/network-request-failed).".to_string())
    );
    assert!(err.to_string().starts_with("record store unreachable"));
    assert!(stub.list_queries.lock().await.is_empty());
}

#[tokio::test]
async fn undecodable_token_refresh_is_malformed() {
    let (base, _stub) = spawn_firestore_server().await;
    let store = record_store(
        &base,
        Arc::new(FailingToken(AuthError::from_code(AuthErrorCode::InternalError))),
    );

    let err = store
        .insert(NewCustomer::new("Alice"))
        .await
        .expect_err("internal");
    assert!(matches!(err, DataError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_store_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let base = Url::parse(&format!("http://{addr}/")).expect("url");
    let store = record_store(&base, Arc::new(AnonymousTokens));

    let err = store.list_all().await.expect_err("offline");
    assert!(matches!(err, DataError::Transport(_)));
}
