//! Read-only JSON API backing the dashboard: sessions, usage, messages,
//! summaries, personas, memories, the monitor tree and the scheduler's
//! cron/heartbeat registry. Every route requires a bearer token except
//! `/health`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;

use skynet_telegram::BridgeContext;

use crate::app::AppState;
use crate::dashboard_auth::check_auth;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{name}", get(get_session))
        .route("/api/usage", get(usage_totals))
        .route("/api/usage/records", get(usage_records))
        .route("/api/usage/{session}", get(usage_for_session))
        .route("/api/messages/recent", get(recent_messages))
        .route("/api/messages/{session}", get(messages_for_session))
        .route("/api/summaries", get(summaries))
        .route("/api/personas", get(list_personas))
        .route("/api/personas/{name}", get(get_persona))
        .route("/api/memories", get(list_memories))
        .route("/api/monitor/topics", get(monitor_topics))
        .route("/api/monitor/entities", get(monitor_entities))
        .route("/api/monitor/resources", get(monitor_resources))
        .route("/api/monitor/digests", get(monitor_digests))
        .route("/api/monitor/report", get(monitor_report))
        .route("/api/cron-jobs", get(cron_jobs))
        .route("/api/heartbeat-checks", get(heartbeat_checks))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

fn limit_param(params: &HashMap<String, String>, default: usize) -> usize {
    params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(default)
}

async fn list_sessions(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    Json(state.sessions.list_all()).into_response()
}

async fn get_session(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(name): Path<String>) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    match state.sessions.get(&name) {
        Some(session) => Json(session).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn usage_totals(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    match state.usage_summary(None) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e).into_response(),
    }
}

async fn usage_for_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session): Path<String>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    match state.usage_summary(Some(&session)) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e).into_response(),
    }
}

async fn usage_records(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let limit = limit_param(&params, 50);
    let session = params.get("session").map(String::as_str);
    match state.memory.usage_records(session, limit) {
        Ok(records) => Json(records).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn recent_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let Some(session) = params.get("session") else {
        return (StatusCode::UNPROCESSABLE_ENTITY, "missing required query parameter: session").into_response();
    };
    let limit = limit_param(&params, 20);
    match state.memory.recent_messages(session, limit) {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn messages_for_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let limit = limit_param(&params, 20);
    match state.memory.recent_messages(&session, limit) {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn summaries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let Some(session) = params.get("session") else {
        return (StatusCode::UNPROCESSABLE_ENTITY, "missing required query parameter: session").into_response();
    };
    let limit = limit_param(&params, 10);
    match state.memory.recent_summaries(session, limit) {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn list_personas(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    match state.memory.list_personas() {
        Ok(personas) => Json(personas).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn get_persona(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(name): Path<String>) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    match state.memory.get_persona(&name) {
        Ok(Some(persona)) => Json(persona).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn list_memories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let limit = limit_param(&params, 50);
    match state.memory.list_memories(None, limit) {
        Ok(memories) => Json(memories).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn monitor_topics(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    match state.monitor.list_topics() {
        Ok(topics) => Json(topics).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn monitor_entities(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let topic = params.get("topic").map(String::as_str);
    match state.monitor.list_entities(topic) {
        Ok(entities) => Json(entities).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn monitor_resources(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let topic = params.get("topic").map(String::as_str);
    let entity = params.get("entity").map(String::as_str);
    let enabled_only = params.get("enabled_only").map(|v| v == "true").unwrap_or(false);
    match state.monitor.list_resources(topic, entity, enabled_only) {
        Ok(resources) => Json(resources).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

/// A digest row joined with the entity/resource names and URLs the
/// dashboard needs to render without a second round trip.
#[derive(serde::Serialize)]
struct EnrichedDigest {
    id: i64,
    topic_id: i64,
    entity_id: i64,
    resource_id: i64,
    snapshot_id: i64,
    summary: String,
    change_type: String,
    created_at: String,
    entity_name: String,
    entity_url: String,
    resource_name: String,
    resource_type: String,
    resource_url: String,
}

async fn monitor_digests(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let topic = params.get("topic").map(String::as_str);
    let entity = params.get("entity").map(String::as_str);
    let limit = limit_param(&params, 20);
    let digests = match state.monitor.list_digests(topic, entity, limit) {
        Ok(digests) => digests,
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    };

    // Load-all-then-map: one full entity/resource fetch feeds a lookup map,
    // rather than a query per digest row.
    let entity_info: HashMap<i64, (String, String)> = match state.monitor.list_entities(None) {
        Ok(entities) => entities.into_iter().map(|e| (e.id, (e.name, e.url))).collect(),
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    };
    let resource_info: HashMap<i64, (String, String, String)> = match state.monitor.list_resources(None, None, false) {
        Ok(resources) => resources
            .into_iter()
            .map(|r| (r.id, (r.name, r.resource_type.as_str().to_string(), r.url)))
            .collect(),
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    };

    let enriched: Vec<EnrichedDigest> = digests
        .into_iter()
        .map(|d| {
            let (entity_name, entity_url) = entity_info.get(&d.entity_id).cloned().unwrap_or_default();
            let (resource_name, resource_type, resource_url) = resource_info.get(&d.resource_id).cloned().unwrap_or_default();
            EnrichedDigest {
                id: d.id,
                topic_id: d.topic_id,
                entity_id: d.entity_id,
                resource_id: d.resource_id,
                snapshot_id: d.snapshot_id,
                summary: d.summary,
                change_type: d.change_type.as_str().to_string(),
                created_at: d.created_at,
                entity_name,
                entity_url,
                resource_name,
                resource_type,
                resource_url,
            }
        })
        .collect();
    Json(enriched).into_response()
}

async fn monitor_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    let topic = params.get("topic").map(String::as_str);
    match state.monitor.generate_report(topic).await {
        Ok(report) => ([("content-type", "text/plain; charset=utf-8")], report).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn cron_jobs(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    match state.scheduler.list_cron_jobs() {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}

async fn heartbeat_checks(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(code) = check_auth(&state, &headers) {
        return code.into_response();
    }
    match state.scheduler.list_heartbeat_checks() {
        Ok(checks) => Json(checks).into_response(),
        Err(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    }
}
