use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use shared::{domain::CustomerId, error::AuthErrorCode};

use crate::{
    ActionOutcome, AuthError, ControllerError, CrmController, DataError, InMemoryAuthProvider,
    InMemoryRecordStore, Notice, NoticeContext, NoticeKind, SessionView, UserPrompt,
};

struct RecordingPrompt {
    answer: AtomicBool,
    alerts: Mutex<Vec<String>>,
    questions: Mutex<Vec<String>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingPrompt {
    fn answering(answer: bool) -> Self {
        Self {
            answer: AtomicBool::new(answer),
            alerts: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        }
    }

    fn alerts(&self) -> Vec<String> {
        self.alerts.lock().expect("alerts lock").clone()
    }

    fn questions(&self) -> Vec<String> {
        self.questions.lock().expect("questions lock").clone()
    }

    fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices lock").clone()
    }
}

#[async_trait]
impl UserPrompt for RecordingPrompt {
    async fn alert(&self, message: &str) {
        self.alerts
            .lock()
            .expect("alerts lock")
            .push(message.to_string());
    }

    async fn confirm(&self, question: &str) -> bool {
        self.questions
            .lock()
            .expect("questions lock")
            .push(question.to_string());
        self.answer.load(Ordering::SeqCst)
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notices lock").push(notice);
    }
}

struct Harness {
    auth: Arc<InMemoryAuthProvider>,
    records: Arc<InMemoryRecordStore>,
    prompt: Arc<RecordingPrompt>,
    controller: CrmController,
}

/// Started controller that has consumed the initial signed-out notification.
async fn harness() -> Harness {
    let auth = Arc::new(InMemoryAuthProvider::new());
    let records = Arc::new(InMemoryRecordStore::new());
    let prompt = Arc::new(RecordingPrompt::answering(true));
    let mut controller = CrmController::new(auth.clone(), records.clone(), prompt.clone());
    controller.start();
    controller
        .sync_session()
        .await
        .expect("initial notification")
        .expect("initial state applied");
    Harness {
        auth,
        records,
        prompt,
        controller,
    }
}

async fn signed_in_harness() -> Harness {
    let mut h = harness().await;
    h.auth.seed_account("alice@example.com", "secret123").await;
    h.controller.set_email("alice@example.com");
    h.controller.set_password("secret123");
    h.controller.sign_in().await.expect("sign in");
    h.controller
        .sync_session()
        .await
        .expect("notification")
        .expect("session applied");
    h
}

#[tokio::test]
async fn starts_signed_out_until_first_notification() {
    let auth = Arc::new(InMemoryAuthProvider::new());
    let records = Arc::new(InMemoryRecordStore::new());
    let prompt = Arc::new(RecordingPrompt::answering(true));
    let mut controller = CrmController::new(auth.clone(), records.clone(), prompt);

    assert_eq!(controller.view(), SessionView::SignedOut);
    assert!(controller.next_session_change().await.is_none());

    controller.start();
    let first = controller.next_session_change().await.expect("first notification");
    assert!(first.is_none());
    controller
        .apply_session_change(first)
        .await
        .expect("apply signed out");
    assert_eq!(controller.view(), SessionView::SignedOut);
    assert_eq!(records.list_calls(), 0);
}

#[tokio::test]
async fn restored_session_is_reported_by_first_notification() {
    let auth = Arc::new(InMemoryAuthProvider::new());
    let records = Arc::new(InMemoryRecordStore::new());
    records.insert_external("Existing").await;
    let identity = auth.seed_account("bob@example.com", "hunter22").await;
    auth.restore_session(identity.clone());

    let prompt = Arc::new(RecordingPrompt::answering(true));
    let mut controller = CrmController::new(auth, records.clone(), prompt);
    controller.start();
    controller
        .sync_session()
        .await
        .expect("notification")
        .expect("applied");

    assert_eq!(controller.view(), SessionView::SignedIn(&identity));
    assert_eq!(records.list_calls(), 1);
    assert_eq!(controller.customers().len(), 1);
}

#[tokio::test]
async fn sign_up_clears_buffers_and_waits_for_notification() {
    let mut h = harness().await;
    h.controller.set_email("new@example.com");
    h.controller.set_password("longenough");

    let outcome = h.controller.sign_up().await.expect("sign up");
    assert_eq!(outcome, ActionOutcome::Completed);
    assert_eq!(h.controller.email(), "");
    assert_eq!(h.controller.password(), "");
    // The view only changes once the provider's notification is applied.
    assert_eq!(h.controller.view(), SessionView::SignedOut);
    assert_eq!(h.records.list_calls(), 0);

    h.controller
        .sync_session()
        .await
        .expect("notification")
        .expect("applied");
    let identity = h.controller.identity().expect("signed in");
    assert_eq!(identity.email, "new@example.com");
    assert_eq!(h.records.list_calls(), 1);
    assert!(h.prompt.alerts().is_empty());
}

#[tokio::test]
async fn sign_in_failure_alerts_and_keeps_buffers() {
    let mut h = harness().await;
    h.auth.seed_account("alice@example.com", "secret123").await;
    h.controller.set_email("alice@example.com");
    h.controller.set_password("wrong-password");

    let err = h.controller.sign_in().await.expect_err("bad password");
    match err {
        ControllerError::Auth(auth) => assert_eq!(auth.code, AuthErrorCode::InvalidCredential),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        h.prompt.alerts(),
        vec!["Firebase: Error (auth/invalid-credential).".to_string()]
    );
    assert_eq!(h.controller.email(), "alice@example.com");
    assert_eq!(h.controller.password(), "wrong-password");
    assert_eq!(h.controller.view(), SessionView::SignedOut);
}

#[tokio::test]
async fn sign_up_failures_surface_provider_messages() {
    let mut h = harness().await;
    h.controller.set_email("weak@example.com");
    h.controller.set_password("123");

    let err = h.controller.sign_up().await.expect_err("weak password");
    assert!(err.is_auth());
    assert_eq!(
        h.prompt.alerts(),
        vec!["Firebase: Password should be at least 6 characters (auth/weak-password).".to_string()]
    );
    assert_eq!(h.controller.password(), "123");

    h.auth.seed_account("taken@example.com", "secret123").await;
    h.controller.set_email("taken@example.com");
    h.controller.set_password("secret123");
    h.controller.sign_up().await.expect_err("duplicate account");
    assert_eq!(
        h.prompt.alerts().last().map(String::as_str),
        Some("Firebase: Error (auth/email-already-in-use).")
    );
    assert_eq!(h.controller.email(), "taken@example.com");
}

#[tokio::test]
async fn transport_failure_during_sign_in_is_alerted() {
    let mut h = harness().await;
    h.auth
        .fail_next(AuthError::from_code(AuthErrorCode::NetworkRequestFailed))
        .await;
    h.controller.set_email("alice@example.com");
    h.controller.set_password("secret123");

    h.controller.sign_in().await.expect_err("network failure");
    assert_eq!(
        h.prompt.alerts(),
        vec!["Firebase: Error (auth/network-request-failed).".to_string()]
    );
    assert_eq!(h.controller.email(), "alice@example.com");
}

#[tokio::test]
async fn blank_customer_name_is_declined_without_insert() {
    let mut h = signed_in_harness().await;
    h.records.insert_external("Existing").await;
    h.controller.refresh().await.expect("refresh");
    let before = h.controller.customers().to_vec();

    for blank in ["", "   ", "\t\n"] {
        h.controller.set_customer_name(blank);
        let outcome = h.controller.add_customer().await.expect("declined");
        assert_eq!(outcome, ActionOutcome::Skipped);
    }

    assert_eq!(h.records.insert_calls(), 0);
    assert_eq!(h.controller.customers(), before.as_slice());
    assert!(h.prompt.notices().is_empty());
}

#[tokio::test]
async fn add_then_confirmed_delete_tracks_store_contents() {
    let mut h = signed_in_harness().await;
    let lists_before = h.records.list_calls();

    h.controller.set_customer_name("Alice");
    let outcome = h.controller.add_customer().await.expect("add");
    assert_eq!(outcome, ActionOutcome::Completed);
    assert_eq!(h.controller.customer_name(), "");
    assert_eq!(h.records.list_calls(), lists_before + 1);

    let customers = h.controller.customers().to_vec();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].name, "Alice");
    assert!(!customers[0].id.as_str().is_empty());

    let outcome = h
        .controller
        .delete_customer(&customers[0].id)
        .await
        .expect("delete");
    assert_eq!(outcome, ActionOutcome::Completed);
    assert_eq!(h.prompt.questions(), vec!["Delete Alice?".to_string()]);
    assert!(h.controller.customers().is_empty());
    assert!(h.records.is_empty().await);
}

#[tokio::test]
async fn declined_delete_changes_nothing() {
    let mut h = signed_in_harness().await;
    h.controller.set_customer_name("Carol");
    h.controller.add_customer().await.expect("add");
    let before = h.controller.customers().to_vec();
    let lists_before = h.records.list_calls();

    h.prompt.answer.store(false, Ordering::SeqCst);
    let outcome = h
        .controller
        .delete_customer(&before[0].id)
        .await
        .expect("declined");

    assert_eq!(outcome, ActionOutcome::Skipped);
    assert_eq!(h.prompt.questions(), vec!["Delete Carol?".to_string()]);
    assert_eq!(h.records.delete_calls(), 0);
    assert_eq!(h.records.list_calls(), lists_before);
    assert_eq!(h.records.len().await, 1);
    assert_eq!(h.controller.customers(), before.as_slice());
}

#[tokio::test]
async fn customer_name_whitespace_survives_round_trip() {
    let mut h = signed_in_harness().await;
    h.controller.set_customer_name(" Bob ");
    h.controller.add_customer().await.expect("add");

    h.controller.refresh().await.expect("refresh");
    assert_eq!(h.controller.customers().len(), 1);
    assert_eq!(h.controller.customers()[0].name, " Bob ");
}

#[tokio::test]
async fn refresh_replaces_cache_with_full_snapshot() {
    let mut h = signed_in_harness().await;
    h.controller.set_customer_name("Dave");
    h.controller.add_customer().await.expect("add");

    // Writes from other clients only show up on the next full fetch.
    let other = h.records.insert_external("Erin").await;
    assert_eq!(h.controller.customers().len(), 1);

    h.controller.refresh().await.expect("refresh");
    let names: Vec<_> = h
        .controller
        .customers()
        .iter()
        .map(|customer| customer.name.as_str())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Dave"));
    assert!(names.contains(&"Erin"));
    assert!(h
        .controller
        .customers()
        .iter()
        .any(|customer| customer.id == other));
}

#[tokio::test]
async fn fetch_failure_is_returned_and_noticed() {
    let mut h = signed_in_harness().await;
    h.controller.set_customer_name("Frank");
    h.controller.add_customer().await.expect("add");
    let before = h.controller.customers().to_vec();

    h.records.set_unavailable(true);
    let err = h.controller.refresh().await.expect_err("store offline");
    assert!(matches!(err, ControllerError::Data(DataError::Transport(_))));
    assert_eq!(h.controller.customers(), before.as_slice());

    let notices = h.prompt.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].context, NoticeContext::Refresh);
    assert_eq!(notices[0].kind, NoticeKind::Unreachable);
    assert!(notices[0].message.contains("offline"));
    assert!(h.prompt.alerts().is_empty());
}

#[tokio::test]
async fn failed_insert_keeps_name_buffer() {
    let mut h = signed_in_harness().await;
    h.records.set_unavailable(true);
    h.controller.set_customer_name("Grace");

    let err = h.controller.add_customer().await.expect_err("insert fails");
    assert!(matches!(err, ControllerError::Data(_)));
    assert_eq!(h.controller.customer_name(), "Grace");
    assert_eq!(h.prompt.notices()[0].context, NoticeContext::AddCustomer);
}

#[tokio::test]
async fn failed_delete_is_noticed_and_cache_kept() {
    let mut h = signed_in_harness().await;
    h.controller.set_customer_name("Heidi");
    h.controller.add_customer().await.expect("add");
    let id = h.controller.customers()[0].id.clone();

    h.records.set_unavailable(true);
    h.controller
        .delete_customer(&id)
        .await
        .expect_err("delete fails");
    assert_eq!(h.controller.customers().len(), 1);
    assert_eq!(h.prompt.notices()[0].context, NoticeContext::DeleteCustomer);
}

#[tokio::test]
async fn delete_of_uncached_id_names_the_id() {
    let mut h = signed_in_harness().await;
    h.prompt.answer.store(false, Ordering::SeqCst);
    h.controller
        .delete_customer(&CustomerId::from("ghost-id"))
        .await
        .expect("declined");
    assert_eq!(h.prompt.questions(), vec!["Delete ghost-id?".to_string()]);
}

#[tokio::test]
async fn sign_out_clears_cache_before_absent_notification() {
    let mut h = signed_in_harness().await;
    h.controller.set_customer_name("Ivan");
    h.controller.add_customer().await.expect("add");
    let lists_before = h.records.list_calls();

    h.controller.sign_out().await.expect("sign out");
    assert!(h.controller.customers().is_empty());

    h.controller
        .sync_session()
        .await
        .expect("notification")
        .expect("applied");
    assert_eq!(h.controller.view(), SessionView::SignedOut);
    assert!(h.controller.customers().is_empty());
    assert!(!h.controller.cache_is_stale());
    assert_eq!(h.records.list_calls(), lists_before);
}

#[tokio::test]
async fn external_session_loss_keeps_stale_cache() {
    let mut h = signed_in_harness().await;
    h.controller.set_customer_name("Judy");
    h.controller.add_customer().await.expect("add");
    let lists_before = h.records.list_calls();

    h.auth.expire_session();
    h.controller
        .sync_session()
        .await
        .expect("notification")
        .expect("applied");

    assert_eq!(h.controller.view(), SessionView::SignedOut);
    assert_eq!(h.controller.customers().len(), 1);
    assert!(h.controller.cache_is_stale());
    assert!(h.controller.snapshot().cache_is_stale);
    assert_eq!(h.records.list_calls(), lists_before);
}

#[tokio::test]
async fn failed_sign_out_keeps_cache() {
    let mut h = signed_in_harness().await;
    h.controller.set_customer_name("Mallory");
    h.controller.add_customer().await.expect("add");

    h.auth
        .fail_next(AuthError::from_code(AuthErrorCode::NetworkRequestFailed))
        .await;
    let err = h.controller.sign_out().await.expect_err("sign out fails");
    assert!(err.is_auth());
    assert_eq!(h.controller.customers().len(), 1);
    let notices = h.prompt.notices();
    assert_eq!(notices[0].context, NoticeContext::SignOut);
    assert_eq!(notices[0].kind, NoticeKind::Unreachable);
}

#[tokio::test]
async fn shutdown_releases_session_observer() {
    let h = harness().await;
    assert_eq!(h.auth.hub().active_subscriptions(), 1);
    assert!(h.controller.is_subscribed());

    h.controller.shutdown();
    assert_eq!(h.auth.hub().active_subscriptions(), 0);
}

#[tokio::test]
async fn dropping_controller_releases_session_observer() {
    let h = harness().await;
    let auth = h.auth.clone();
    assert_eq!(auth.hub().active_subscriptions(), 1);

    drop(h);
    assert_eq!(auth.hub().active_subscriptions(), 0);
}

#[tokio::test]
async fn snapshot_debug_redacts_password() {
    let mut h = harness().await;
    h.controller.set_email("alice@example.com");
    h.controller.set_password("top-secret");

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.password, "top-secret");
    let rendered = format!("{snapshot:?}");
    assert!(rendered.contains("alice@example.com"));
    assert!(!rendered.contains("top-secret"));
}
