use crate::control::{Command, Controller, Transition};
use crate::error::HarnessError;
use crate::telemetry::{SnapshotSource, run_session};
use crate::types::TelemetrySettings;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
struct AppState {
    controller: Arc<Controller>,
    source: SnapshotSource,
    settings: TelemetrySettings,
}

/// Operator endpoints plus the observer socket.
pub fn router(
    controller: Arc<Controller>,
    source: SnapshotSource,
    settings: TelemetrySettings,
) -> Router {
    let state = AppState {
        controller,
        source,
        settings,
    };

    Router::new()
        .route("/launch", get(launch))
        .route("/begin", get(begin))
        .route("/end", get(end))
        .route("/socket", get(socket))
        .with_state(state)
}

pub async fn bind(addr: &str) -> Result<TcpListener, HarnessError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| HarnessError::Bind {
            addr: addr.to_string(),
            source,
        })
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<(), HarnessError> {
    axum::serve(listener, app).await?;
    Ok(())
}

async fn launch(State(state): State<AppState>) -> Response {
    command_response(&state, Command::Launch)
}

async fn begin(State(state): State<AppState>) -> Response {
    command_response(&state, Command::Begin)
}

async fn end(State(state): State<AppState>) -> Response {
    command_response(&state, Command::End)
}

fn command_response(state: &AppState, command: Command) -> Response {
    let cors = [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")];

    match state.controller.apply(command) {
        Transition::Applied | Transition::AlreadyApplied => (StatusCode::OK, cors).into_response(),
        Transition::OutOfOrder { current } => (
            StatusCode::CONFLICT,
            cors,
            format!("{} rejected: phase is '{}'\n", command.as_str(), current),
        )
            .into_response(),
    }
}

async fn socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let end = state.controller.gates().end.clone();
    ws.on_upgrade(move |socket| async move {
        run_session(socket, state.source, state.settings, end).await;
    })
}
