//! HTTP + WebSocket surface: submit tasks, poll them, watch them live.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::types::{TaskStatus, WireEvent};

/// Ping interval on an idle live stream.
const KEEPALIVE: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
}

pub fn router(agent: Agent, cors_origin: &str) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let api = Router::new()
        .route("/task", post(create_task))
        .route("/task/{id}", get(get_task))
        .route("/task/{id}/ws", get(task_ws));

    Ok(Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(agent))
}

/// Bind and serve until the process stops.
pub async fn serve(router: Router, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_task(
    State(agent): State<Agent>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(payload)) = payload else {
        return error(StatusCode::BAD_REQUEST, "invalid request body");
    };
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return error(StatusCode::BAD_REQUEST, "prompt is required");
    }

    let task_id = agent.submit(prompt);
    (
        StatusCode::CREATED,
        Json(CreateTaskResponse {
            task_id,
            status: TaskStatus::Pending,
        }),
    )
        .into_response()
}

async fn get_task(State(agent): State<Agent>, Path(id): Path<String>) -> Response {
    match agent.get(&id) {
        Some(mut task) => {
            // Screenshots are large; they only travel over the live stream.
            task.strip_screenshots();
            Json(task).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "task not found"),
    }
}

async fn task_ws(
    ws: WebSocketUpgrade,
    State(agent): State<Agent>,
    Path(id): Path<String>,
) -> Response {
    if !agent.contains(&id) {
        return error(StatusCode::NOT_FOUND, "task not found");
    }
    ws.on_upgrade(move |socket| stream_events(socket, agent, id))
}

async fn stream_events(mut socket: WebSocket, agent: Agent, task_id: String) {
    let subscription = agent.subscribe(&task_id);
    let subscriber = subscription.id;
    let mut events = ReceiverStream::new(subscription.events);
    let mut keepalive = tokio::time::interval(KEEPALIVE);
    keepalive.tick().await;

    debug!(task_id = %task_id, "live stream opened");
    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&WireEvent { task_id: &task_id, event: &event }) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(task_id = %task_id, "cannot encode event: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
                keepalive.reset();
            }
            _ = keepalive.tick() => {
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    agent.unsubscribe(&task_id, subscriber);
    debug!(task_id = %task_id, "live stream closed");
}
