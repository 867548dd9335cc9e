//! Integration tests for the portal client against a fake backend.
//!
//! Each test wires a real `HttpPortalAdapter` and `FileSessionStore` to a
//! wiremock server and a temporary session file.

use chrono::{TimeDelta, Utc};
use portal_core::domain::{AuthState, SubmitOutcome, UserProfile, VoucherStatus};
use portal_core::ports::{PortError, PortalApi, SessionStore};
use portal_core::session::{TOKEN_KEY, USER_KEY};
use portal_core::SessionContext;
use portal_lib::adapters::{FileSessionStore, HttpPortalAdapter};
use portal_lib::{ClientError, Config, Portal};
use reqwest::Url;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

struct Harness {
    _dir: TempDir,
    state_path: PathBuf,
    session: Arc<SessionContext>,
    api: Arc<HttpPortalAdapter>,
    portal: Portal,
}

fn config(api_url: &str, state_path: PathBuf) -> Config {
    Config {
        api_url: Url::parse(api_url).unwrap(),
        request_timeout: Duration::from_secs(2),
        log_level: tracing::Level::INFO,
        state_path,
        course_url: Url::parse("https://courses.example.com/").unwrap(),
        exam_url: Url::parse("https://exams.example.com/").unwrap(),
        default_identity: UserProfile::new("Guest Learner", "guest@portal.local"),
    }
}

/// Builds a portal against `api_url`, optionally with a session already on disk.
async fn harness(api_url: &str, stored: Option<(&str, UserProfile)>) -> Harness {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("session.json");
    let store = Arc::new(FileSessionStore::new(state_path.clone()));
    if let Some((token, user)) = stored {
        store.set(TOKEN_KEY, token).await.unwrap();
        store
            .set(USER_KEY, &serde_json::to_string(&user).unwrap())
            .await
            .unwrap();
    }

    let config = Arc::new(config(api_url, state_path.clone()));
    let session = Arc::new(SessionContext::new(store, config.default_identity.clone()));
    session.init().await;
    let api = Arc::new(HttpPortalAdapter::new(&config, session.clone()).unwrap());
    let portal = Portal::from_parts(config, session.clone(), api.clone());

    Harness {
        _dir: dir,
        state_path,
        session,
        api,
        portal,
    }
}

fn ada() -> UserProfile {
    UserProfile::new("Ada Lovelace", "ada@example.com")
}

async fn stored(state_path: &PathBuf, key: &str) -> Option<String> {
    FileSessionStore::new(state_path.clone()).get(key).await.unwrap()
}

#[tokio::test]
async fn login_persists_token_and_profile() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "ada@example.com", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-123",
            "user": {"name": "Ada Lovelace", "email": "ada@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), None).await;
    assert_eq!(h.session.state(), AuthState::Unauthenticated);

    let session = h.portal.login(" ada@example.com ", "hunter2").await.unwrap();

    assert_eq!(session.token, "tok-123");
    assert_eq!(h.session.state(), AuthState::Authenticated);
    assert_eq!(stored(&h.state_path, TOKEN_KEY).await.as_deref(), Some("tok-123"));
    assert_eq!(h.portal.profile().await, ada());
}

#[tokio::test]
async fn rejected_login_keeps_session_closed() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), None).await;
    let err = h.portal.login("ada@example.com", "wrong").await.unwrap_err();

    match err {
        ClientError::Port(e) => assert_eq!(e.backend_message(), Some("Invalid credentials")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.session.state(), AuthState::Unauthenticated);
    assert_eq!(stored(&h.state_path, TOKEN_KEY).await, None);
}

#[tokio::test]
async fn requests_carry_the_bearer_token() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/docs"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [
                {"_id": "d1", "title": "Syllabus", "filename": "syllabus.pdf",
                 "uploadDate": "2025-01-15T09:30:00.000Z"},
                {"originalname": "week-1.pdf", "filename": "f2.pdf"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri(), Some(("tok-123", ada()))).await;
    let docs = h.portal.documents().await.unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].title, "Syllabus");
    assert_eq!(docs[0].upload_date_label(), "2025-01-15");
    assert_eq!(docs[1].title, "week-1.pdf");
    assert_eq!(docs[1].id, "f2.pdf");
}

#[tokio::test]
async fn unauthorized_response_clears_session_exactly_once() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/docs"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let h = harness(&server.uri(), Some(("stale", ada()))).await;
    let mut changes = h.session.subscribe();

    let err = h.portal.documents().await.unwrap_err();
    assert!(matches!(err, ClientError::Port(PortError::Unauthorized(_))));
    assert_eq!(h.session.state(), AuthState::Unauthenticated);
    assert_eq!(stored(&h.state_path, TOKEN_KEY).await, None);
    assert_eq!(stored(&h.state_path, USER_KEY).await, None);
    assert!(changes.has_changed().unwrap());
    changes.borrow_and_update();

    // A second 401 finds nothing to tear down.
    let err = h.api.list_documents().await.unwrap_err();
    assert!(matches!(err, PortError::Unauthorized(_)));
    assert!(!changes.has_changed().unwrap());

    // The gate now routes to login without touching the network.
    assert!(matches!(
        h.portal.documents().await,
        Err(ClientError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn unverified_voucher_leaves_local_record_unset() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/voucher/submit"))
        .and(body_json(json!({"email": "ada@example.com", "code": "NOPE"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"verified": false})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("tok", ada()))).await;
    let outcome = h.portal.submit_voucher("  NOPE  ").await.unwrap();

    assert_eq!(outcome, SubmitOutcome::NotVerified);
    assert!(h.portal.voucher().record().is_none());
    assert_eq!(h.portal.voucher().status(), VoucherStatus::NotSubmitted);
}

#[tokio::test]
async fn verified_voucher_is_refetched_and_derives_pending() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/voucher/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"verified": true})))
        .expect(1)
        .mount(&server)
        .await;
    let submitted_at = (Utc::now() - TimeDelta::seconds(90)).to_rfc3339();
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Submitted",
            "email": "ada@example.com",
            "code": "GOOD",
            "submittedAt": submitted_at,
            "verified": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("tok", ada()))).await;
    let outcome = h.portal.submit_voucher("GOOD").await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Accepted);
    assert_eq!(h.portal.voucher().status(), VoucherStatus::Pending);
    assert_eq!(h.portal.voucher().active_courses(), 1);
}

#[tokio::test]
async fn blank_voucher_code_never_reaches_the_backend() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/voucher/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"verified": true})))
        .expect(0)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("tok", ada()))).await;
    let err = h.portal.submit_voucher("   ").await.unwrap_err();

    assert_eq!(err.user_message(), "Please enter voucher code");
}

#[tokio::test]
async fn dashboard_tolerates_a_failing_document_list() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/docs"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "Not submitted"})),
        )
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("tok", ada()))).await;
    let snapshot = h.portal.dashboard().await.unwrap();

    assert_eq!(snapshot.user, ada());
    assert!(snapshot.documents.is_empty());
    assert!(snapshot.voucher.is_none());
    assert_eq!(snapshot.status, VoucherStatus::NotSubmitted);
    assert_eq!(snapshot.active_courses, 0);
}

#[tokio::test]
async fn download_writes_the_document_bytes() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/docs/file/week-1.pdf"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri(), Some(("tok", ada()))).await;
    let out_dir = TempDir::new().unwrap();
    let target = out_dir.path().join("copy.pdf");

    let written = h.portal.download("week-1.pdf", Some(&target)).await.unwrap();

    assert_eq!(written, target);
    assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    // Reserve a port, then free it so nothing is listening there.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let h = harness(&format!("http://127.0.0.1:{port}"), Some(("tok", ada()))).await;

    let err = h.portal.documents().await.unwrap_err();

    assert!(matches!(err, ClientError::Port(PortError::Network(_))));
    assert_eq!(h.session.state(), AuthState::Authenticated);
}

#[tokio::test]
async fn dashboard_fails_when_the_backend_rejects_the_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/docs"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "Not submitted"})),
        )
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("stale", ada()))).await;
    let err = h.portal.dashboard().await.unwrap_err();

    assert!(matches!(err, ClientError::Port(PortError::Unauthorized(_))));
    assert_eq!(h.session.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn error_statuses_keep_their_class_and_the_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/docs"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "No access"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/voucher/submit"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/docs/file/notes.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), Some(("tok", ada()))).await;

    assert_eq!(
        h.api.list_documents().await.unwrap_err(),
        PortError::Forbidden(Some("No access".to_string()))
    );
    assert!(matches!(
        h.api.voucher_status("ada@example.com").await.unwrap_err(),
        PortError::NotFound(_)
    ));
    assert_eq!(
        h.api.submit_voucher("ada@example.com", "CODE").await.unwrap_err(),
        PortError::Rejected {
            status: 500,
            message: Some("boom".to_string())
        }
    );
    assert_eq!(
        h.api.download_document("notes.pdf").await.unwrap_err(),
        PortError::Rejected {
            status: 503,
            message: None
        }
    );
    assert_eq!(h.session.state(), AuthState::Authenticated);
    assert_eq!(stored(&h.state_path, TOKEN_KEY).await.as_deref(), Some("tok"));
}

#[tokio::test]
async fn watch_stops_once_the_voucher_reads_verified() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let submitted_at = (Utc::now() - TimeDelta::seconds(150)).to_rfc3339();
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Submitted",
            "code": "GOOD",
            "submittedAt": submitted_at
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("tok", ada()))).await;
    let mut seen = Vec::new();
    let status = h
        .portal
        .watch_voucher(Duration::from_millis(50), CancellationToken::new(), |status| {
            seen.push(status)
        })
        .await
        .unwrap();

    assert_eq!(status, VoucherStatus::Verified);
    assert_eq!(seen, vec![VoucherStatus::Verified]);
}

#[tokio::test]
async fn watch_ends_when_the_backend_rejects_the_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("stale", ada()))).await;
    let err = h
        .portal
        .watch_voucher(Duration::from_millis(50), CancellationToken::new(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Port(PortError::Unauthorized(_))));
    assert_eq!(h.session.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn watch_cancels_while_a_request_is_in_flight() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "Not submitted"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("tok", ada()))).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let mut updates = 0;
    let status = h
        .portal
        .watch_voucher(Duration::from_millis(50), cancel, |_| updates += 1)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(status, VoucherStatus::NotSubmitted);
    assert_eq!(updates, 0);
}

#[tokio::test]
async fn watch_ends_when_the_session_is_closed_elsewhere() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/voucher/status/ada@example.com"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "Not submitted"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut h = harness(&server.uri(), Some(("tok", ada()))).await;
    let session = h.session.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.logout().await.unwrap();
    });

    let started = Instant::now();
    let err = h
        .portal
        .watch_voucher(Duration::from_millis(50), CancellationToken::new(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotLoggedIn));
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn logout_clears_the_stored_session() {
    let mut h = harness("http://127.0.0.1:9", Some(("tok", ada()))).await;
    assert_eq!(h.session.state(), AuthState::Authenticated);

    h.portal.logout().await.unwrap();

    assert_eq!(h.session.state(), AuthState::Unauthenticated);
    assert_eq!(stored(&h.state_path, TOKEN_KEY).await, None);
    assert_eq!(stored(&h.state_path, USER_KEY).await, None);
    assert_eq!(h.portal.profile().await.name, "Guest Learner");
}
