//! HTTP and WebSocket surface of the task feed.
//!
//! Routes:
//! - `GET /ws/tasks` — one-shot dump: every stored task as a binary
//!   [`FeedMessage::Task`] frame, then a normal close.
//! - `GET /ws/tasks/live` — live feed: replay of the store, then every task
//!   created afterwards; inbound [`FeedMessage::Submit`] frames create and
//!   broadcast tasks.
//! - `GET/POST /tasks`, `GET/DELETE /tasks/{name}`,
//!   `GET /tasks/priority/{priority}` — plain JSON CRUD over the same store.
//!
//! Each live connection runs a reader and a writer task. The writer drains
//! the session's delivery queue onto the socket; the reader decodes
//! submissions. When either side ends, the other is aborted and the session
//! is unsubscribed.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use taskcast_proto::feed::{FeedMessage, decode, encode};
use taskcast_proto::task::{Priority, Task};
use tokio::sync::mpsc;

use crate::broadcast::{FeedError, SharedFeed, Subscription};
use crate::sessions::SessionId;
use crate::store::StoreError;

/// Builds the application router over a shared feed.
#[must_use]
pub fn router(feed: SharedFeed) -> Router {
    Router::new()
        .route("/ws/tasks", get(dump_handler))
        .route("/ws/tasks/live", get(live_handler))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/priority/{priority}", get(tasks_by_priority))
        .route("/tasks/{name}", get(task_by_name).delete(delete_task))
        .with_state(feed)
}

/// Starts the server on the given address with a fresh, empty feed.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(crate::broadcast::TaskFeed::new())).await
}

/// Starts the server on the given address with a pre-configured feed and
/// returns the bound address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    feed: SharedFeed,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(feed);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "task feed server error");
        }
    });

    Ok((bound_addr, handle))
}

// ---------------------------------------------------------------------------
// WebSocket endpoints
// ---------------------------------------------------------------------------

async fn dump_handler(
    ws: WebSocketUpgrade,
    State(feed): State<SharedFeed>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| dump_socket(socket, feed))
}

async fn live_handler(
    ws: WebSocketUpgrade,
    State(feed): State<SharedFeed>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| live_socket(socket, feed))
}

/// Sends every stored task as one frame each, then closes normally.
async fn dump_socket(mut socket: WebSocket, feed: SharedFeed) {
    for task in feed.all_tasks().await {
        match encode(&FeedMessage::Task(task)) {
            Ok(bytes) => {
                if socket.send(Message::Binary(bytes.into())).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to encode task frame");
                return;
            }
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}

/// Handles one live feed connection for its whole lifetime.
///
/// The connection lifecycle:
/// 1. Subscribe: the session is registered and its replay enqueued.
/// 2. A writer task drains the delivery queue onto the socket.
/// 3. A reader task decodes `Submit` frames into task creations.
/// 4. When either side finishes, the other is aborted and the session is
///    unsubscribed.
async fn live_socket(socket: WebSocket, feed: SharedFeed) {
    let Subscription {
        handle,
        mut receiver,
    } = feed.subscribe().await;
    let session_id = handle.id();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Transport-level side channel for per-session error frames. The
    // delivery queue itself only ever carries tasks.
    let (err_tx, mut err_rx) = mpsc::channel::<String>(8);

    let writer_err_tx = err_tx.clone();
    let mut write_task = tokio::spawn(async move {
        // Held so the error arm keeps pending reasons deliverable even
        // after the reader half drops its sender.
        let _err_tx = writer_err_tx;
        loop {
            let frame = tokio::select! {
                task = receiver.recv() => match task {
                    Some(task) => FeedMessage::Task(task),
                    // Queue closed: the session was dropped server-side.
                    None => break,
                },
                reason = err_rx.recv() => match reason {
                    Some(reason) => FeedMessage::Error { reason },
                    None => break,
                },
            };
            match encode(&frame) {
                Ok(bytes) => {
                    if ws_sender.send(Message::Binary(bytes.into())).await.is_err() {
                        tracing::warn!(session_id = %session_id, "websocket write failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "failed to encode feed frame");
                }
            }
        }
    });

    let reader_feed = Arc::clone(&feed);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_inbound(session_id, &data, &reader_feed, &err_tx).await;
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    feed.unsubscribe(session_id).await;
}

/// Handles one binary frame from a live subscriber.
///
/// Undecodable frames and unexpected message types are logged and dropped;
/// the session stays alive. A rejected submission sends an error frame back
/// to this session only.
async fn handle_inbound(
    session_id: SessionId,
    data: &[u8],
    feed: &SharedFeed,
    errors: &mpsc::Sender<String>,
) {
    let msg = match decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "dropping undecodable frame");
            return;
        }
    };

    match msg {
        FeedMessage::Submit(task) => {
            let name = task.name.clone();
            if let Err(e) = feed.create(task).await {
                tracing::debug!(
                    session_id = %session_id,
                    task = %name,
                    error = %e,
                    "submission rejected"
                );
                let _ = errors.try_send(e.to_string());
            }
        }
        other => {
            tracing::warn!(
                session_id = %session_id,
                msg = ?other,
                "unexpected message type from subscriber"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// JSON endpoints
// ---------------------------------------------------------------------------

async fn list_tasks(State(feed): State<SharedFeed>) -> Json<Vec<Task>> {
    Json(feed.all_tasks().await)
}

async fn task_by_name(
    State(feed): State<SharedFeed>,
    Path(name): Path<String>,
) -> Result<Json<Task>, StatusCode> {
    feed.task_by_name(&name)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn tasks_by_priority(
    State(feed): State<SharedFeed>,
    Path(priority): Path<String>,
) -> Result<Json<Vec<Task>>, StatusCode> {
    let priority: Priority = priority.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let tasks = feed.tasks_by_priority(priority).await;
    if tasks.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(tasks))
}

async fn create_task(State(feed): State<SharedFeed>, Json(task): Json<Task>) -> StatusCode {
    match feed.create(task).await {
        Ok(()) => StatusCode::CREATED,
        Err(FeedError::Store(StoreError::DuplicateName(_))) => StatusCode::CONFLICT,
        Err(FeedError::InvalidTask(_)) => StatusCode::BAD_REQUEST,
    }
}

async fn delete_task(State(feed): State<SharedFeed>, Path(name): Path<String>) -> StatusCode {
    if feed.remove_task(&name).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
