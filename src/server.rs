//! Read-only HTTP API over the data store.
//!
//! Every request reads its document fresh from disk on the blocking pool,
//! so handlers share no mutable state and always see the last completed
//! conversion.
//!
//! Besides its own keys, a document exposes the configured section groups:
//! a group is listed when the document holds at least one of its keys, and
//! serves those keys as one object. A real key shadows a group of the same
//! name.

use crate::config::SectionGroups;
use crate::error::{Error, Result};
use crate::http::{log_responses, serve_router, socket_addr, ApiResult};
use crate::store::{DocumentStore, StructuredDocument};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub store: DocumentStore,
    pub section_groups: Arc<SectionGroups>,
}

pub fn build_router(store: DocumentStore, section_groups: SectionGroups) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/v1", get(api_info))
        .route("/v1/documents", get(list_documents))
        .route("/v1/documents/{document}", get(get_document))
        .route("/v1/documents/{document}/sections", get(list_sections))
        .route("/v1/documents/{document}/sections/{section}", get(get_section))
        .with_state(ApiState { store, section_groups: Arc::new(section_groups) })
        .layer(middleware::from_fn(log_responses))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "docpipe", "version": env!("CARGO_PKG_VERSION") }))
}

async fn api_info() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/v1/documents")])
}

async fn list_documents(State(state): State<ApiState>) -> ApiResult<Json<Vec<String>>> {
    let ids = tokio::task::spawn_blocking(move || state.store.list()).await??;
    Ok(Json(ids))
}

async fn get_document(
    State(state): State<ApiState>,
    Path(document): Path<String>,
) -> ApiResult<Json<Value>> {
    let content = tokio::task::spawn_blocking(move || state.store.read(&document)).await??;
    Ok(Json(Value::Object(content)))
}

async fn list_sections(
    State(state): State<ApiState>,
    Path(document): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    let content = tokio::task::spawn_blocking(move || state.store.read(&document)).await??;
    let mut sections: Vec<String> = content.keys().cloned().collect();
    for (group, members) in state.section_groups.iter() {
        if !content.contains_key(group) && members.iter().any(|key| content.contains_key(key)) {
            sections.push(group.clone());
        }
    }
    Ok(Json(sections))
}

/// The keys of `group` present in `content`, in group order.
fn group_section(content: &StructuredDocument, members: &[String]) -> Option<Value> {
    let section: Map<String, Value> = members
        .iter()
        .filter_map(|key| Some((key.clone(), content.get(key)?.clone())))
        .collect();
    (!section.is_empty()).then_some(Value::Object(section))
}

async fn get_section(
    State(state): State<ApiState>,
    Path((document, section)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let id = document.clone();
    let content = tokio::task::spawn_blocking(move || state.store.read(&id)).await??;
    content
        .get(&section)
        .cloned()
        .or_else(|| {
            let members = state.section_groups.get(&section)?;
            group_section(&content, members)
        })
        .map(Json)
        .ok_or_else(|| Error::NotFoundError(format!("{document}/{section}")).into())
}

/// Serves the document API on `host:port` until Ctrl-C.
pub async fn serve(
    store: DocumentStore,
    section_groups: SectionGroups,
    host: &str,
    port: u16,
) -> Result<()> {
    let addr = socket_addr(host, port)?;
    serve_router(build_router(store, section_groups), addr).await
}
