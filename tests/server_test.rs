use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use docpipe::config::SectionGroups;
use docpipe::server::build_router;
use docpipe::store::DocumentStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use tower::ServiceExt;

fn store() -> (TempDir, Router) {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("access_policy.yml"),
        "title: Access Policy\npurpose:\n- Protect assets.\nscope:\n- Staff\n",
    )
    .unwrap();
    fs::write(temp.path().join("incident.json"), r#"{"title": "Incident"}"#).unwrap();
    fs::write(temp.path().join("broken.yml"), "title: [unterminated\n").unwrap();
    fs::write(
        temp.path().join("sop.yml"),
        "document_type: SOP\ndocument_no: SOP-001\ndocument_rev: '1.10'\ntitle: Backups\n\
         purpose:\n- Keep data\nrevision_history:\n- rev_no: '1'\n",
    )
    .unwrap();
    let mut groups = SectionGroups::new();
    groups.insert(
        "metadata".to_string(),
        ["document_type", "document_no", "document_rev", "title"].map(String::from).to_vec(),
    );
    groups.insert(
        "document_control".to_string(),
        ["revision_history", "document_review_and_approval"].map(String::from).to_vec(),
    );
    groups.insert("purpose".to_string(), vec!["title".to_string()]);
    let router = build_router(DocumentStore::new(temp.path()), groups);
    (temp, router)
}

async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn test_root() {
    let (_temp, router) = store();
    let (status, body) = get(router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("docpipe"));
}

#[tokio::test]
async fn test_v1_redirects_to_documents() {
    let (_temp, router) = store();
    let response = router
        .oneshot(Request::builder().uri("/v1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "/v1/documents");
}

#[tokio::test]
async fn test_list_documents() {
    let (_temp, router) = store();
    let (status, body) = get(router, "/v1/documents").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["access_policy", "broken", "incident", "sop"]));
}

#[tokio::test]
async fn test_get_document_keeps_key_order() {
    let (_temp, router) = store();
    let (status, body) = get(router, "/v1/documents/access_policy").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"title": "Access Policy", "purpose": ["Protect assets."], "scope": ["Staff"]})
    );
    let keys: Vec<_> = body.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["title", "purpose", "scope"]);
}

#[tokio::test]
async fn test_json_documents_are_served() {
    let (_temp, router) = store();
    let (status, body) = get(router, "/v1/documents/incident").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"title": "Incident"}));
}

#[tokio::test]
async fn test_sections() {
    let (_temp, router) = store();
    let (status, body) = get(router.clone(), "/v1/documents/access_policy/sections").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["title", "purpose", "scope", "metadata"]));

    let (status, body) = get(router, "/v1/documents/access_policy/sections/scope").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["Staff"]));
}

#[tokio::test]
async fn test_unknown_document_is_404() {
    let (_temp, router) = store();
    let (status, body) = get(router.clone(), "/v1/documents/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));
    assert_eq!(body["error"]["message"], json!("Document 'missing' not found."));

    let (status, _) = get(router, "/v1/documents/..%2Fsecret").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_section_is_404() {
    let (_temp, router) = store();
    let (status, body) = get(router, "/v1/documents/access_policy/sections/owner").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));
}

#[tokio::test]
async fn test_malformed_document_is_500() {
    let (_temp, router) = store();
    let (status, body) = get(router, "/v1/documents/broken").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], json!("internal_error"));
}

#[tokio::test]
async fn test_document_changes_are_visible_without_restart() {
    let (temp, router) = store();
    fs::write(temp.path().join("incident.json"), r#"{"title": "Incident v2"}"#).unwrap();
    let (_, body) = get(router, "/v1/documents/incident").await;
    assert_eq!(body, json!({"title": "Incident v2"}));
}

#[tokio::test]
async fn test_section_groups() {
    let (_temp, router) = store();
    let (status, body) = get(router.clone(), "/v1/documents/sop/sections").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            "document_type",
            "document_no",
            "document_rev",
            "title",
            "purpose",
            "revision_history",
            "metadata",
            "document_control"
        ])
    );

    let (status, body) = get(router.clone(), "/v1/documents/sop/sections/metadata").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "document_type": "SOP",
            "document_no": "SOP-001",
            "document_rev": "1.10",
            "title": "Backups"
        })
    );

    let (status, body) = get(router.clone(), "/v1/documents/sop/sections/document_control").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"revision_history": [{"rev_no": "1"}]}));

    let (_, body) = get(router.clone(), "/v1/documents/sop/sections/purpose").await;
    assert_eq!(body, json!(["Keep data"]));

    let (status, _) = get(router, "/v1/documents/incident/sections/document_control").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
