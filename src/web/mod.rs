use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{broadcast, Mutex},
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{debug, error, info};

use crate::game::{Frame, Game, TileView, Tool, ToolOutcome};

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub frame: Frame,
}

pub struct AppState {
    game: Mutex<Game>,
    broadcaster: broadcast::Sender<String>,
    scenario_name: String,
}

impl AppState {
    pub fn new(game: Game, scenario_name: impl Into<String>) -> Self {
        let (broadcaster, _) = broadcast::channel::<String>(512);
        Self {
            game: Mutex::new(game),
            broadcaster,
            scenario_name: scenario_name.into(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcaster.subscribe()
    }

    fn publish(&self, frame: &Frame) {
        if let Ok(payload) = serde_json::to_string(frame) {
            // No subscribers is fine.
            let _ = self.broadcaster.send(payload);
        }
    }

    /// Advances the game by one tick and publishes the result.
    pub async fn tick(&self) -> Option<Frame> {
        let mut game = self.game.lock().await;
        game.tick()?;
        let frame = game.frame();
        drop(game);
        self.publish(&frame);
        Some(frame)
    }
}

pub struct WebServerConfig {
    pub game: Game,
    pub scenario_name: String,
    pub tick_interval: Duration,
    pub host: String,
    pub port: u16,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/tiles", get(tiles))
        .route("/api/tool", post(apply_tool))
        .route("/api/pause", post(pause))
        .route("/api/save", post(save))
        .route("/api/load", post(load))
        .route("/api/events", get(stream_events))
        .with_state(state)
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        game,
        scenario_name,
        tick_interval,
        host,
        port,
    } = config;

    let state = Arc::new(AppState::new(game, scenario_name));

    let ticker = state.clone();
    let tick_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Some(frame) = ticker.tick().await {
                debug!(tick = frame.tick, revenue = frame.revenue, "tick published");
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "city server listening (Ctrl+C to stop)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tick_handle.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
    }
    info!("shutting down city server");
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    let frame = state.game.lock().await.snapshot();
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        frame,
    })
}

pub async fn tiles(State(state): State<Arc<AppState>>) -> Json<Vec<TileView>> {
    Json(state.game.lock().await.tiles())
}

#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Serialize)]
pub struct ToolResponse {
    pub outcome: ToolOutcome,
    pub frame: Frame,
}

pub async fn apply_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ToolRequest>,
) -> Result<Json<ToolResponse>, ApiError> {
    let tool: Tool = request
        .tool
        .parse()
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, format!("{err}")))?;
    let (outcome, frame) = {
        let mut game = state.game.lock().await;
        let outcome = game.apply_tool(tool, request.x, request.y);
        (outcome, game.frame())
    };
    state.publish(&frame);
    Ok(Json(ToolResponse { outcome, frame }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PauseRequest {
    /// Toggles when omitted.
    #[serde(default)]
    pub paused: Option<bool>,
}

pub async fn pause(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PauseRequest>,
) -> Json<Frame> {
    let frame = {
        let mut game = state.game.lock().await;
        let paused = request.paused.unwrap_or(!game.is_paused());
        game.set_paused(paused);
        game.frame()
    };
    state.publish(&frame);
    Json(frame)
}

#[derive(Serialize)]
pub struct SaveSummary {
    pub timestamp: DateTime<Utc>,
    pub tiles: usize,
}

pub async fn save(State(state): State<Arc<AppState>>) -> Result<Json<SaveSummary>, ApiError> {
    let record = state
        .game
        .lock()
        .await
        .save()
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(SaveSummary {
        timestamp: record.timestamp,
        tiles: record.tiles.len(),
    }))
}

#[derive(Serialize)]
pub struct LoadSummary {
    pub failed_tiles: usize,
    pub frame: Frame,
}

pub async fn load(State(state): State<Arc<AppState>>) -> Result<Json<LoadSummary>, ApiError> {
    let (failures, frame) = {
        let mut game = state.game.lock().await;
        let failures = game
            .load()
            .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no valid saved game"))?;
        (failures, game.frame())
    };
    state.publish(&frame);
    Ok(Json(LoadSummary {
        failed_tiles: failures.len(),
        frame,
    }))
}

pub async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
