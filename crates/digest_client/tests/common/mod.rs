//! In-process stand-in for the digest backend.
//!
//! Serves a small fixed data set over real HTTP on an ephemeral port and
//! records every request so tests can assert on what the client sent.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use digest_client::{ApiClient, ClientConfig};
use serde_json::{Value, json};

pub type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Default)]
pub struct MockState {
    pub bots: Vec<Value>,
    pub channels: HashMap<i64, Vec<Value>>,
    pub bot_categories: HashMap<i64, Vec<Value>>,
    pub categories: Vec<Value>,
    pub ai_results: Vec<Value>,
    /// Bot ids whose channels endpoint answers 500.
    pub failing_channels: HashSet<i64>,
    /// Category ids whose priority update answers 500.
    pub failing_priorities: HashSet<i64>,
    pub priority_writes: Vec<(i64, i64, Value)>,
    pub attach_bodies: Vec<Value>,
    pub log: Vec<String>,
}

pub type Shared = Arc<Mutex<MockState>>;

pub struct Backend {
    pub client: ApiClient,
    pub state: Shared,
}

impl Backend {
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

pub fn seeded() -> MockState {
    let mut state = MockState {
        bots: vec![
            json!({"id": 1, "name": "Morning digest", "status": "active", "max_posts_per_digest": 10}),
            json!({"id": 2, "name": "Tech weekly", "status": "paused"}),
        ],
        categories: vec![
            json!({"id": 3, "category_name": "Economy", "description": null}),
            json!({"id": 4, "category_name": "Science"}),
            json!({"id": 7, "category_name": "News"}),
            json!({"id": 8, "category_name": "Sport"}),
        ],
        ai_results: vec![
            json!({"id": 100, "post_id": 10, "public_bot_id": 1, "summary": "Rates up", "importance": 0.8, "processed_at": "2025-01-15T10:30:00"}),
            json!({"id": 101, "post_id": 11, "public_bot_id": 2, "summary": "New chip"}),
        ],
        ..MockState::default()
    };
    state.channels.insert(
        1,
        vec![json!({
            "id": 11,
            "telegram_id": -1001,
            "title": "Markets",
            "username": "markets",
            "is_active": true,
            "categories": [{"id": 3, "category_name": "Economy"}]
        })],
    );
    state.bot_categories.insert(
        1,
        vec![
            json!({"id": 7, "category_name": "News", "priority": 1}),
            json!({"id": 8, "category_name": "Sport", "priority": 1}),
        ],
    );
    state
}

pub async fn spawn_backend(state: MockState) -> Backend {
    let state: Shared = Arc::new(Mutex::new(state));
    let router = Router::new()
        .route("/api/public-bots", get(list_bots))
        .route("/api/public-bots/{id}", get(get_bot))
        .route("/api/public-bots/{id}/toggle", post(toggle_bot))
        .route("/api/public-bots/{id}/channels", get(bot_channels))
        .route(
            "/api/public-bots/{id}/categories",
            get(bot_categories).post(attach_categories),
        )
        .route(
            "/api/public-bots/{id}/categories/{category_id}",
            axum::routing::delete(detach_category),
        )
        .route(
            "/api/public-bots/{id}/categories/{category_id}/priority",
            put(update_priority),
        )
        .route("/api/categories", get(list_categories))
        .route("/api/ai/results", get(ai_results))
        .route("/api/channels/validate/{username}", get(validate_channel))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = ApiClient::new(&ClientConfig::with_base_url(format!("http://{addr}/api"))).unwrap();
    Backend { client, state }
}

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": format!("{what} not found")})),
    )
}

fn record(state: &Shared, line: String) {
    state.lock().unwrap().log.push(line);
}

async fn list_bots(State(state): State<Shared>) -> Json<Value> {
    record(&state, "GET /public-bots".to_string());
    Json(Value::Array(state.lock().unwrap().bots.clone()))
}

async fn get_bot(State(state): State<Shared>, Path(id): Path<i64>) -> Reply {
    record(&state, format!("GET /public-bots/{id}"));
    let guard = state.lock().unwrap();
    guard
        .bots
        .iter()
        .find(|bot| bot["id"] == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found("Bot"))
}

async fn toggle_bot(State(state): State<Shared>, Path(id): Path<i64>) -> Reply {
    record(&state, format!("POST /public-bots/{id}/toggle"));
    let mut guard = state.lock().unwrap();
    let bot = guard
        .bots
        .iter_mut()
        .find(|bot| bot["id"] == id)
        .ok_or_else(|| not_found("Bot"))?;
    let next = if bot["status"] == "active" { "paused" } else { "active" };
    bot["status"] = json!(next);
    Ok(Json(bot.clone()))
}

async fn bot_channels(State(state): State<Shared>, Path(id): Path<i64>) -> Reply {
    record(&state, format!("GET /public-bots/{id}/channels"));
    let guard = state.lock().unwrap();
    if guard.failing_channels.contains(&id) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "telegram lookup failed"})),
        ));
    }
    Ok(Json(Value::Array(
        guard.channels.get(&id).cloned().unwrap_or_default(),
    )))
}

async fn bot_categories(State(state): State<Shared>, Path(id): Path<i64>) -> Json<Value> {
    record(&state, format!("GET /public-bots/{id}/categories"));
    let guard = state.lock().unwrap();
    Json(Value::Array(
        guard.bot_categories.get(&id).cloned().unwrap_or_default(),
    ))
}

async fn attach_categories(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    record(&state, format!("POST /public-bots/{id}/categories"));
    let mut guard = state.lock().unwrap();
    guard.attach_bodies.push(body.clone());

    let ids = body["category_ids"].as_array().cloned().unwrap_or_default();
    let priorities = body["priorities"].as_array().cloned().unwrap_or_default();
    let mut attached = Vec::new();
    for (idx, category_id) in ids.iter().enumerate() {
        let Some(category) = guard.categories.iter().find(|c| c["id"] == *category_id) else {
            return Err(not_found("Category"));
        };
        let mut category = category.clone();
        category["priority"] = priorities.get(idx).cloned().unwrap_or(json!(0));
        attached.push(category);
    }
    guard.bot_categories.entry(id).or_default().extend(attached);
    Ok(Json(json!({"message": "ok"})))
}

async fn detach_category(
    State(state): State<Shared>,
    Path((id, category_id)): Path<(i64, i64)>,
) -> StatusCode {
    record(&state, format!("DELETE /public-bots/{id}/categories/{category_id}"));
    let mut guard = state.lock().unwrap();
    if let Some(list) = guard.bot_categories.get_mut(&id) {
        list.retain(|c| c["id"] != category_id);
    }
    StatusCode::NO_CONTENT
}

async fn update_priority(
    State(state): State<Shared>,
    Path((id, category_id)): Path<(i64, i64)>,
    Json(body): Json<Value>,
) -> Reply {
    record(
        &state,
        format!("PUT /public-bots/{id}/categories/{category_id}/priority"),
    );
    let mut guard = state.lock().unwrap();
    if guard.failing_priorities.contains(&category_id) {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))));
    }
    guard
        .priority_writes
        .push((id, category_id, body["priority"].clone()));
    if let Some(category) = guard
        .bot_categories
        .get_mut(&id)
        .and_then(|list| list.iter_mut().find(|c| c["id"] == category_id))
    {
        category["priority"] = body["priority"].clone();
    }
    Ok(Json(json!({"message": "ok"})))
}

async fn list_categories(State(state): State<Shared>) -> Json<Value> {
    record(&state, "GET /categories".to_string());
    Json(Value::Array(state.lock().unwrap().categories.clone()))
}

async fn ai_results(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    record(&state, "GET /ai/results".to_string());
    let bot_id: Option<i64> = params.get("bot_id").and_then(|raw| raw.parse().ok());
    let guard = state.lock().unwrap();
    let results = guard
        .ai_results
        .iter()
        .filter(|result| bot_id.is_none_or(|id| result["public_bot_id"] == id))
        .cloned()
        .collect();
    Json(Value::Array(results))
}

async fn validate_channel(State(state): State<Shared>, Path(username): Path<String>) -> Reply {
    record(&state, format!("GET /channels/validate/{username}"));
    if username == "markets" {
        return Ok(Json(json!({
            "telegram_id": -1001,
            "title": "Markets",
            "username": "markets",
            "subscribers": 1200
        })));
    }
    Err((
        StatusCode::BAD_REQUEST,
        Json(json!({"detail": "Channel not accessible"})),
    ))
}
