use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use rti_api::{AppState, ServerConfig, router};
use rti_chain::{GatewayCall, InMemoryGateway, OnChainState};
use rti_store::{DiskAttachments, RtiStore};
use serde_json::{Value, json};
use tower::ServiceExt;

const CITIZEN: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const OFFICER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
const ADMIN: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";
const BOUNDARY: &str = "rti-test-boundary";

struct Harness {
    app: Router,
    chain: Arc<InMemoryGateway>,
}

fn harness() -> Harness {
    let store = Arc::new(RtiStore::open().unwrap());
    let attachments = Arc::new(store.blob_attachments().unwrap());
    let chain = Arc::new(InMemoryGateway::new());
    let state = AppState::new(store, attachments, chain.clone());
    Harness {
        app: router(state, &ServerConfig::default()),
        chain,
    }
}

struct Upload<'a> {
    name: &'a str,
    content_type: &'a str,
    data: &'a [u8],
}

fn multipart(fields: &[(&str, &str)], file: Option<Upload<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                 Content-Type: {}\r\n\r\n",
                file.name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn form_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn create_form(deadline_days: &str) -> Vec<u8> {
    multipart(
        &[
            ("citizen_address", CITIZEN),
            ("title", "Water supply"),
            ("description", "How much water was supplied in Jan 2024?"),
            ("bounty", "1.5"),
            ("deadline_days", deadline_days),
        ],
        None,
    )
}

async fn create(app: &Router, deadline_days: &str) -> i64 {
    let (status, body) = send(app, form_request("/rtis", create_form(deadline_days))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["rti_id"].as_i64().unwrap()
}

async fn respond(app: &Router, id: i64, officer: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/respond",
            json!({ "rti_id": id, "response_text": "answer", "officer_address": officer }),
        ),
    )
    .await
}

async fn status_of(app: &Router, id: i64) -> String {
    let (_, body) = send(app, get(&format!("/rtis/{id}"))).await;
    body["status"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn list_create_list_reflects_attachment() {
    let h = harness();
    let (status, body) = send(&h.app, get("/rtis")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, created) = send(&h.app, form_request("/rtis", create_form("7"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["success"], true);
    assert_eq!(created["message"], "RTI created successfully");
    assert_eq!(created["blockchain_id"], 0);
    assert!(created["tx_hash"].as_str().unwrap().starts_with("0x"));

    let with_file = multipart(
        &[
            ("citizen_address", CITIZEN),
            ("title", "Road budget"),
            ("description", "Road repair spending 2023"),
            ("bounty", "0.5"),
        ],
        Some(Upload {
            name: "budget.pdf",
            content_type: "application/pdf",
            data: b"%PDF-1.7 budget",
        }),
    );
    let (status, _) = send(&h.app, form_request("/rtis", with_file)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, list) = send(&h.app, get("/rtis")).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["title"], "Water supply");
    assert_eq!(list[0]["has_file"], false);
    assert_eq!(list[0]["status"], "Pending");
    assert_eq!(list[1]["has_file"], true);
    assert_eq!(list[1]["blockchain_id"], 1);
    assert!(list[1].get("file_data").is_none());
}

#[tokio::test]
async fn deadline_is_now_plus_days() {
    let h = harness();
    let before = Utc::now();
    let id = create(&h.app, "7").await;

    let (_, rti) = send(&h.app, get(&format!("/rtis/{id}"))).await;
    let deadline: DateTime<Utc> = rti["deadline"].as_str().unwrap().parse().unwrap();
    let expected = before + Duration::days(7);
    assert!((deadline - expected).num_seconds().abs() <= 5, "{deadline} vs {expected}");
    assert_eq!(rti["citizen_address"], CITIZEN);
    assert_eq!(rti["bounty"], 1.5);
}

#[tokio::test]
async fn default_deadline_is_thirty_days() {
    let h = harness();
    let form = multipart(
        &[
            ("citizen_address", CITIZEN),
            ("title", "Hospital beds"),
            ("description", "Number of beds"),
            ("bounty", "0.1"),
        ],
        None,
    );
    let (_, created) = send(&h.app, form_request("/rtis", form)).await;
    let (_, rti) = send(&h.app, get(&format!("/rtis/{}", created["rti_id"]))).await;
    let deadline: DateTime<Utc> = rti["deadline"].as_str().unwrap().parse().unwrap();
    let created_at: DateTime<Utc> = rti["created_at"].as_str().unwrap().parse().unwrap();
    assert_eq!(deadline - created_at, Duration::days(30));
}

#[tokio::test]
async fn refund_before_deadline_is_refused() {
    let h = harness();
    let id = create(&h.app, "7").await;
    let (status, body) = send(&h.app, json_request("POST", "/refund", json!({ "rti_id": id }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Deadline not yet passed" }));
    assert_eq!(status_of(&h.app, id).await, "Pending");
}

#[tokio::test]
async fn refund_after_deadline_succeeds() {
    let h = harness();
    let id = create(&h.app, "0").await;
    let (status, body) = send(&h.app, json_request("POST", "/refund", json!({ "rti_id": id }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Bounty refunded");
    assert_eq!(status_of(&h.app, id).await, "Refunded");
    assert_eq!(h.chain.request(0).unwrap().state, OnChainState::Refunded);

    // Terminal: a second refund or a response is a conflict.
    let (status, body) = send(&h.app, json_request("POST", "/refund", json!({ "rti_id": id }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot refund this RTI");
    let (status, body) = respond(&h.app, id, OFFICER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "RTI is already Refunded");
}

#[tokio::test]
async fn refund_of_responded_request_is_refused() {
    let h = harness();
    let id = create(&h.app, "0").await;
    respond(&h.app, id, OFFICER).await;
    let (status, body) = send(&h.app, json_request("POST", "/refund", json!({ "rti_id": id }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot refund this RTI");
}

#[tokio::test]
async fn verify_requires_a_response() {
    let h = harness();
    let id = create(&h.app, "7").await;
    let verify = json!({ "rti_id": id, "admin_address": ADMIN });

    let (status, body) = send(&h.app, json_request("POST", "/verify", verify.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "RTI not in Responded state");

    let (status, body) = respond(&h.app, id, OFFICER).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Response submitted");

    let (status, body) = send(&h.app, json_request("POST", "/verify", verify.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "RTI verified and bounty released");
    assert_eq!(status_of(&h.app, id).await, "Verified");

    let (status, _) = send(&h.app, json_request("POST", "/verify", verify)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn respond_with_bad_officer_address_keeps_local_write() {
    let h = harness();
    let id = create(&h.app, "7").await;

    let (status, body) = respond(&h.app, id, "0xabc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, rti) = send(&h.app, get(&format!("/rtis/{id}"))).await;
    assert_eq!(rti["status"], "Responded");
    assert_eq!(rti["response_text"], "answer");
    assert_eq!(rti["officer_address"], "0xabc");
    assert_eq!(rti["chain_synced"], false);
    assert!(rti["sync_error"].as_str().unwrap().contains("0xabc"));
}

#[tokio::test]
async fn resync_after_gateway_outage() {
    let h = harness();
    let id = create(&h.app, "7").await;

    h.chain.fail_with("connection refused");
    let (status, body) = respond(&h.app, id, OFFICER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
    let (_, list) = send(&h.app, get("/rtis")).await;
    assert_eq!(list[0]["status"], "Responded");
    assert_eq!(list[0]["chain_synced"], false);

    h.chain.recover();
    let (status, body) = send(&h.app, json_request("POST", &format!("/rtis/{id}/resync"), json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["tx_hash"].as_str().is_some());

    let (_, rti) = send(&h.app, get(&format!("/rtis/{id}"))).await;
    assert_eq!(rti["chain_synced"], true);
    assert_eq!(rti["sync_error"], Value::Null);
    assert_eq!(h.chain.request(0).unwrap().state, OnChainState::Responded);

    let (status, body) = send(&h.app, json_request("POST", &format!("/rtis/{id}/resync"), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "RTI is already in sync with the chain");
}

#[tokio::test]
async fn failed_create_leaves_no_row() {
    let h = harness();
    h.chain.fail_with("node down");

    let form = multipart(
        &[
            ("citizen_address", CITIZEN),
            ("title", "Water supply"),
            ("description", "Jan 2024"),
            ("bounty", "1"),
        ],
        Some(Upload {
            name: "notes.txt",
            content_type: "text/plain",
            data: b"notes",
        }),
    );
    let (status, body) = send(&h.app, form_request("/rtis", form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, list) = send(&h.app, get("/rtis")).await;
    assert_eq!(list, json!([]));
    let (_, health) = send(&h.app, get("/health")).await;
    assert_eq!(health, json!({ "status": "ok", "records": 0 }));
    assert_eq!(h.chain.rti_count(), 0);
}

#[tokio::test]
async fn failed_create_removes_attachment_from_disk() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = Arc::new(RtiStore::open().unwrap());
    let attachments = Arc::new(DiskAttachments::open(tmp.path()).await.unwrap());
    let chain = Arc::new(InMemoryGateway::new());
    chain.fail_with("node down");
    let app = router(
        AppState::new(store, attachments, chain.clone()),
        &ServerConfig::default(),
    );

    let form = multipart(
        &[
            ("citizen_address", CITIZEN),
            ("title", "Water supply"),
            ("description", "Jan 2024"),
            ("bounty", "1"),
        ],
        Some(Upload {
            name: "notes.txt",
            content_type: "text/plain",
            data: b"notes",
        }),
    );
    let (status, _) = send(&app, form_request("/rtis", form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn invalid_form_is_rejected_without_chain_call() {
    let h = harness();
    let form = multipart(
        &[("citizen_address", CITIZEN), ("description", "x"), ("bounty", "1")],
        None,
    );
    let (status, body) = send(&h.app, form_request("/rtis", form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing field: title");
    assert!(h.chain.calls().is_empty());
}

#[tokio::test]
async fn gateway_failure_leaves_verify_and_refund_state_alone() {
    let h = harness();
    let responded = create(&h.app, "7").await;
    respond(&h.app, responded, OFFICER).await;
    let overdue = create(&h.app, "0").await;

    h.chain.fail_with("node down");
    let (status, _) = send(
        &h.app,
        json_request("POST", "/verify", json!({ "rti_id": responded, "admin_address": ADMIN })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(status_of(&h.app, responded).await, "Responded");

    let (status, _) = send(&h.app, json_request("POST", "/refund", json!({ "rti_id": overdue }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(status_of(&h.app, overdue).await, "Pending");

    assert!(matches!(
        h.chain.calls().last(),
        Some(GatewayCall::Refund { blockchain_id: 1, .. })
    ));
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let h = harness();
    let (status, body) = respond(&h.app, 42, OFFICER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "success": false, "error": "RTI not found" }));

    let (status, _) = send(&h.app, get("/rtis/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&h.app, get("/download/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");
}

#[tokio::test]
async fn respond_accepts_string_ids_and_requires_fields() {
    let h = harness();
    let id = create(&h.app, "7").await;

    let (status, body) = send(
        &h.app,
        json_request("POST", "/respond", json!({ "rti_id": id.to_string(), "officer_address": OFFICER })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing field: response_text");

    let (status, body) = send(&h.app, json_request("POST", "/refund", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing field: rti_id");
}

#[tokio::test]
async fn download_serves_bytes_with_original_name() {
    let h = harness();
    let form = multipart(
        &[
            ("citizen_address", CITIZEN),
            ("title", "Road budget"),
            ("description", "2023"),
            ("bounty", "0.5"),
        ],
        Some(Upload {
            name: "Budget Report.pdf",
            content_type: "application/pdf",
            data: b"%PDF-1.7 budget",
        }),
    );
    let (_, created) = send(&h.app, form_request("/rtis", form)).await;
    let id = created["rti_id"].as_i64().unwrap();

    let resp = h
        .app
        .clone()
        .oneshot(get(&format!("/download/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Budget_Report.pdf\""
    );
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.7 budget");

    let plain = create(&h.app, "7").await;
    let (status, body) = send(&h.app, get(&format!("/download/{plain}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");
}

#[tokio::test]
async fn patch_rejects_then_refund_is_allowed() {
    let h = harness();
    let id = create(&h.app, "0").await;
    let uri = format!("/rtis/{id}");

    let (status, body) = send(&h.app, json_request("PATCH", &uri, json!({ "status": "Rejected" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "a rejection reason is required");

    let (status, body) = send(&h.app, json_request("PATCH", &uri, json!({ "status": "Verified" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "status cannot change from Pending to Verified");

    let (status, body) = send(
        &h.app,
        json_request("PATCH", &uri, json!({ "status": "rejected", "rejection_reason": "out of scope" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({ "success": true, "message": "RTI updated" }));

    let (_, rti) = send(&h.app, get(&uri)).await;
    assert_eq!(rti["status"], "Rejected");
    assert_eq!(rti["rejection_reason"], "out of scope");

    let (status, _) = send(&h.app, json_request("POST", "/refund", json!({ "rti_id": id }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_of(&h.app, id).await, "Refunded");
}

#[tokio::test]
async fn patch_without_changes_is_refused() {
    let h = harness();
    let id = create(&h.app, "7").await;
    let (status, body) = send(&h.app, json_request("PATCH", &format!("/rtis/{id}"), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no fields to update");
}

#[tokio::test]
async fn upload_and_fetch_document() {
    let h = harness();
    let form = multipart(
        &[],
        Some(Upload {
            name: "scan.png",
            content_type: "image/png",
            data: b"\x89PNG",
        }),
    );
    let (status, body) = send(&h.app, form_request("/upload", form)).await;
    assert_eq!(status, StatusCode::OK);
    let handle = body["ipfs_hash"].as_str().unwrap().to_string();

    let resp = h
        .app
        .clone()
        .oneshot(get(&format!("/ipfs/{handle}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");

    let (status, _) = send(&h.app, get("/ipfs/..secret")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_without_file_is_refused() {
    let h = harness();
    let (status, body) = send(&h.app, form_request("/upload", multipart(&[("note", "x")], None))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file part");

    let empty_name = multipart(
        &[],
        Some(Upload {
            name: "",
            content_type: "application/octet-stream",
            data: b"",
        }),
    );
    let (status, body) = send(&h.app, form_request("/upload", empty_name)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No selected file");
}

#[tokio::test]
async fn document_mocks() {
    let h = harness();
    let (status, body) = send(&h.app, json_request("POST", "/verify-doc", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["message"], "Document verified successfully");

    let (_, body) = send(&h.app, json_request("POST", "/esign", json!({}))).await;
    assert_eq!(body, json!({ "signed": true, "signature": "mock_signature_123" }));
}

#[tokio::test]
async fn health_counts_records() {
    let h = harness();
    create(&h.app, "7").await;
    create(&h.app, "7").await;
    let (status, body) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "records": 2 }));
}

#[tokio::test]
async fn second_response_to_synced_request_is_refused() {
    let h = harness();
    let id = create(&h.app, "7").await;
    let (status, _) = respond(&h.app, id, OFFICER).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h.app,
        json_request(
            "POST",
            "/respond",
            json!({ "rti_id": id, "response_text": "changed", "officer_address": OFFICER }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "RTI is Responded; only Pending requests can be responded to"
    );

    let (_, rti) = send(&h.app, get(&format!("/rtis/{id}"))).await;
    assert_eq!(rti["response_text"], "answer");
    assert_eq!(rti["chain_synced"], true);
    assert_eq!(h.chain.request(0).unwrap().response.as_deref(), Some("answer"));
    let responds = h
        .chain
        .calls()
        .iter()
        .filter(|call| matches!(call, GatewayCall::Respond { .. }))
        .count();
    assert_eq!(responds, 1);
}

#[tokio::test]
async fn rejected_request_cannot_be_responded_to() {
    let h = harness();
    let id = create(&h.app, "0").await;
    let (status, _) = send(
        &h.app,
        json_request(
            "PATCH",
            &format!("/rtis/{id}"),
            json!({ "status": "Rejected", "rejection_reason": "duplicate" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = respond(&h.app, id, OFFICER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "RTI is Rejected; only Pending requests can be responded to"
    );
    assert_eq!(status_of(&h.app, id).await, "Rejected");

    // Still refundable once the deadline has passed.
    let (status, _) = send(&h.app, json_request("POST", "/refund", json!({ "rti_id": id }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unsynced_response_can_be_corrected() {
    let h = harness();
    let id = create(&h.app, "7").await;
    let (status, _) = respond(&h.app, id, "0xabc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = respond(&h.app, id, OFFICER).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, rti) = send(&h.app, get(&format!("/rtis/{id}"))).await;
    assert_eq!(rti["officer_address"], OFFICER);
    assert_eq!(rti["chain_synced"], true);
    assert_eq!(h.chain.request(0).unwrap().state, OnChainState::Responded);
}

#[tokio::test]
async fn oversized_upload_is_refused_without_leftovers() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = Arc::new(RtiStore::open().unwrap());
    let attachments = Arc::new(DiskAttachments::open(tmp.path()).await.unwrap());
    let chain = Arc::new(InMemoryGateway::new());
    let app = router(
        AppState::new(store, attachments, chain.clone()),
        &ServerConfig::new(1024),
    );

    let big = vec![b'x'; 4096];
    let form = multipart(
        &[
            ("citizen_address", CITIZEN),
            ("title", "Water supply"),
            ("description", "Jan 2024"),
            ("bounty", "1"),
        ],
        Some(Upload {
            name: "scan.pdf",
            content_type: "application/pdf",
            data: &big,
        }),
    );
    let (status, body) = send(&app, form_request("/rtis", form)).await;
    assert!(status.is_client_error(), "{status}");
    assert_eq!(body["success"], false);

    let upload = multipart(
        &[],
        Some(Upload {
            name: "scan.pdf",
            content_type: "application/pdf",
            data: &big,
        }),
    );
    let (status, body) = send(&app, form_request("/upload", upload)).await;
    assert!(status.is_client_error(), "{status}");
    assert_eq!(body["success"], false);

    let (_, list) = send(&app, get("/rtis")).await;
    assert_eq!(list, json!([]));
    assert!(chain.calls().is_empty());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);

    // Under the cap the same route still works.
    let small = multipart(
        &[],
        Some(Upload {
            name: "note.txt",
            content_type: "text/plain",
            data: b"ok",
        }),
    );
    let (status, _) = send(&app, form_request("/upload", small)).await;
    assert_eq!(status, StatusCode::OK);
}
