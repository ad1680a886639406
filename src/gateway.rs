//! The deck gateway: HTTP surface plus the `/ws` observer endpoint.
//!
//! Routing is glue; the interesting contracts live in the registry,
//! dispatcher, and hub. The HTTP boundary maps pipeline failures to
//! distinct status codes: unknown tool 404, unavailable 409, unauthorized
//! 403, execution failure 500 with the original message in the body.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use warp::http::StatusCode;
use warp::{Filter, Reply};
use warp::ws::{Message as WsMessage, WebSocket};

use crate::analytics::MemorySink;
use crate::chat::{ChatBackend, ChatState};
use crate::config::{ChatConfigPatch, Config};
use crate::dispatcher::ExecutionDispatcher;
use crate::error::DispatchError;
use crate::events::{BroadcastEvent, Message};
use crate::hub::BroadcastHub;
use crate::permissions::{PermissionPolicy, PolicyAction, RolePolicy};
use crate::tools::{EchoTool, FileSystemTool, SystemControlTool, ToolRegistry};

/// Everything the routes need, constructor-injected so tests can stand up
/// as many independent decks as they like.
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub dispatcher: Arc<ExecutionDispatcher>,
    pub hub: Arc<BroadcastHub>,
    pub chat: Arc<ChatState>,
    pub backend: Arc<dyn ChatBackend>,
    pub policy: Arc<dyn PermissionPolicy>,
    pub executions: Arc<MemorySink>,
}

impl AppState {
    /// Build the deck from configuration: built-in tools, role policy, an
    /// in-process execution log, and the broadcast hub.
    pub fn new(config: &Config, backend: Arc<dyn ChatBackend>) -> Result<Arc<Self>> {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(Arc::new(FileSystemTool::new(&config.workspace_dir)))
            .context("Failed to register fileSystem tool")?;
        registry
            .register(Arc::new(SystemControlTool))
            .context("Failed to register systemControl tool")?;
        registry
            .register(Arc::new(EchoTool))
            .context("Failed to register echo tool")?;

        let policy: Arc<dyn PermissionPolicy> =
            Arc::new(RolePolicy::new(config.policy.roles.clone()));
        let executions = Arc::new(MemorySink::new(100));
        let hub = Arc::new(BroadcastHub::new());
        let dispatcher = Arc::new(ExecutionDispatcher::new(
            registry.clone(),
            policy.clone(),
            executions.clone(),
            hub.clone(),
        ));

        Ok(Arc::new(Self {
            registry,
            dispatcher,
            hub,
            chat: Arc::new(ChatState::new(config.chat.clone())),
            backend,
            policy,
            executions,
        }))
    }
}

// ── Request bodies ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

// ── Routes ──────────────────────────────────────────────────────────────────

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Role header consulted by the execute and toggle endpoints. The socket
/// itself is unauthenticated; authorization is per call.
fn role_header() -> impl Filter<Extract = (Option<String>,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("x-role")
}

/// The full route tree for one deck instance.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let list_tools = warp::path!("api" / "tools")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| warp::reply::json(&state.registry.list()));

    let toggle_tool = warp::path!("api" / "tools" / String)
        .and(warp::patch())
        .and(warp::body::json())
        .and(role_header())
        .and(with_state(state.clone()))
        .and_then(handle_toggle);

    let execute_tool = warp::path!("api" / "tools" / String / "execute")
        .and(warp::post())
        .and(warp::body::json())
        .and(role_header())
        .and(with_state(state.clone()))
        .and_then(handle_execute);

    let get_config = warp::path!("api" / "config")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| warp::reply::json(&state.chat.config()));

    let patch_config = warp::path!("api" / "config")
        .and(warp::patch())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .map(|patch: ChatConfigPatch, state: Arc<AppState>| {
            warp::reply::json(&state.chat.patch_config(patch))
        });

    let post_chat = warp::path!("api" / "chat")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_chat);

    let get_messages = warp::path!("api" / "messages")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| warp::reply::json(&state.chat.history()));

    let get_executions = warp::path!("api" / "executions")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<AppState>| warp::reply::json(&state.executions.recent()));

    // A plain GET without the upgrade header lands in the second branch and
    // gets 426 Upgrade Required.
    let hub = state.hub.clone();
    let websocket = warp::path!("ws").and(
        warp::ws()
            .map(move |ws: warp::ws::Ws| {
                let hub = hub.clone();
                ws.on_upgrade(move |socket| observer_connected(socket, hub))
                    .into_response()
            })
            .or(warp::any().map(|| {
                warp::reply::with_status("Upgrade Required", StatusCode::UPGRADE_REQUIRED)
                    .into_response()
            })),
    );

    list_tools
        .or(toggle_tool)
        .or(execute_tool)
        .or(get_config)
        .or(patch_config)
        .or(post_chat)
        .or(get_messages)
        .or(get_executions)
        .or(websocket)
}

async fn handle_toggle(
    name: String,
    body: ToggleRequest,
    role: Option<String>,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Infallible> {
    let role = role.unwrap_or_else(|| "admin".to_string());
    if !state
        .policy
        .check(&name, &role, PolicyAction::Configure)
        .await
    {
        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": "Not permitted to configure tools" })),
            StatusCode::FORBIDDEN,
        ));
    }

    match state.registry.set_enabled(&name, body.enabled) {
        Ok(descriptor) => Ok(warp::reply::with_status(
            warp::reply::json(&descriptor),
            StatusCode::OK,
        )),
        Err(err) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": err.to_string() })),
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn handle_execute(
    name: String,
    body: ExecuteRequest,
    role: Option<String>,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Infallible> {
    let role = role.unwrap_or_else(|| "user".to_string());
    let args = if body.args.is_null() {
        json!({})
    } else {
        body.args
    };

    match state.dispatcher.execute(&name, args, &role).await {
        Ok(result) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "result": result })),
            StatusCode::OK,
        )),
        Err(err) => {
            let status = match &err {
                DispatchError::ToolUnavailable(_) => StatusCode::CONFLICT,
                DispatchError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                DispatchError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "error": err.to_string() })),
                status,
            ))
        }
    }
}

async fn handle_chat(
    body: ChatRequest,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Infallible> {
    let user_message = Message::new("user", body.message);
    state.chat.push(user_message.clone());
    state
        .hub
        .publish(&BroadcastEvent::message(user_message));

    let history = state.chat.history();
    let config = state.chat.config();
    match state.backend.reply(&history, &config).await {
        Ok(reply) => {
            state.chat.push(reply.clone());
            state.hub.publish(&BroadcastEvent::message(reply.clone()));
            Ok(warp::reply::with_status(
                warp::reply::json(&reply),
                StatusCode::OK,
            ))
        }
        Err(err) => {
            error!(error = %err, "chat backend failed");
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "error": "Failed to process message" })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

// ── Observer connections ────────────────────────────────────────────────────

/// One upgraded observer socket: register with the hub, drain the outbound
/// queue into the socket, unregister on close. Observers are read-only;
/// inbound frames other than close are ignored.
async fn observer_connected(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = hub.register(tx);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(WsMessage::text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) if msg.is_close() => break,
            Ok(_) => {}
            Err(err) => {
                debug!(connection = id, error = %err, "observer socket error");
                break;
            }
        }
    }

    hub.unregister(id);
    writer.abort();
}

// ── Server lifecycle ────────────────────────────────────────────────────────

/// Bind the gateway and return the bound address plus the serving future.
/// The future completes when `cancel` fires.
pub fn bind_server(
    state: Arc<AppState>,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<(SocketAddr, impl Future<Output = ()>)> {
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async move { cancel.cancelled().await })
        .with_context(|| format!("Failed to bind gateway to {addr}"))?;
    Ok((bound, server))
}

/// Run the gateway until cancelled.
pub async fn run_server(
    state: Arc<AppState>,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<()> {
    let (bound, server) = bind_server(state, addr, cancel)?;
    info!(address = %bound, "hostdeck gateway listening");
    server.await;
    info!("hostdeck gateway stopped");
    Ok(())
}

// ── Startup seeding ─────────────────────────────────────────────────────────

/// Run a fixed set of representative tool calls through the dispatcher so
/// the execution history and broadcast stream have content at boot.
/// Individual failures are expected (two of the seeds exercise error
/// paths) and never abort startup.
pub async fn seed_executions(dispatcher: &ExecutionDispatcher) {
    let operations: Vec<(&str, Value)> = vec![
        ("echo", json!({ "text": "hostdeck online" })),
        ("fileSystem", json!({ "operation": "list", "path": "." })),
        ("fileSystem", json!({ "operation": "read", "path": "/nonexistent" })),
        ("systemControl", json!({ "command": "invalid" })),
    ];

    info!("seeding tool executions");
    for (name, args) in operations {
        match dispatcher.execute(name, args, "admin").await {
            Ok(_) => debug!(tool = name, "seed execution succeeded"),
            Err(err) => warn!(tool = name, error = %err, "seed execution failed"),
        }
    }
    info!("tool execution seeding completed");
}
