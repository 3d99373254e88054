//! WebSocket handler: one story session per connection.
//!
//! DESIGN
//! ======
//! On upgrade, spawns a session actor for the caller and enters a `select!`
//! loop over three sources:
//! - Incoming client frames → parse, dispatch by syscall prefix, reply
//! - Session state changes → push `session:state`, new notifications, and
//!   any viewport correction the transform controller decides on
//! - The transform debounce deadline → commit the coalesced gesture
//!
//! Handlers translate frames into `SessionAction`s and return an `Outcome`;
//! they never write to the socket. Results of remote requests (fetch, save,
//! list) arrive later as state pushes, not as replies.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `user_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Close → drop the session, aborting its actor and epics

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::canvas::block::new_block_id;
use crate::canvas::{Action, BlockPayload, BlockState, PanZoomWidget, PartialBlock, Point, TransformController, TransformState};
use crate::frame::{Data, Frame, Status, to_data};
use crate::services::story::{TOUR_FLAG_KEY, new_story_id};
use crate::session::{
    HistoryCommand, IconAction, NotifyAction, Session, SessionAction, SessionError, SessionHandle, SessionState,
    StoryAction, spawn_session,
};
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions.
enum Outcome {
    /// Send done+data to the client.
    Reply(Data),
    /// Send empty done to the client.
    Done,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(user_id) = params
        .get("user_id")
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
    else {
        return (StatusCode::UNAUTHORIZED, "user_id required").into_response();
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user_id))
}

// =============================================================================
// CLIENT VIEWPORT
// =============================================================================

/// The client's pan/zoom surface as the server sees it: the last transform
/// the client showed, plus `transform:apply` frames queued to drive it.
#[derive(Debug, Default)]
pub(crate) struct ClientViewport {
    shown: TransformState,
    outbox: Vec<Frame>,
}

impl ClientViewport {
    fn observe(&mut self, transform: TransformState) {
        self.shown = transform;
    }

    fn drain(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.outbox)
    }
}

impl PanZoomWidget for ClientViewport {
    fn transform(&self) -> TransformState {
        self.shown
    }

    fn apply(&mut self, transform: TransformState) {
        self.shown = transform;
        self.outbox.push(Frame::request("transform:apply", to_data(&transform)));
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: String) {
    let mut conn = Connection::new(state, user_id);
    let mut updates = conn.handle.watch();

    let welcome = Frame::request("session:connected", Data::new()).with_data("user_id", conn.user_id.clone());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(user_id = %conn.user_id, "ws: client connected");

    loop {
        let deadline = conn.viewport.deadline();
        let frames = tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => conn.process_inbound_text(&text).await,
                    Message::Close(_) => break,
                    _ => continue,
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                conn.on_state(&snapshot)
            }
            () = sleep_until_deadline(deadline) => {
                if let Err(e) = conn.commit_transform(Instant::now()).await {
                    debug!(user_id = %conn.user_id, error = %e, "ws: transform commit rejected");
                }
                continue;
            }
        };

        if send_all(&mut socket, &frames).await.is_err() {
            break;
        }
    }

    info!(user_id = %conn.user_id, "ws: client disconnected");
}

/// Per-socket state: the session, its handle, and the viewport bridge.
pub(crate) struct Connection {
    _session: Session,
    handle: SessionHandle,
    app: AppState,
    user_id: String,
    viewport: TransformController<ClientViewport>,
    /// Highest notification id already pushed to the client.
    notified: u64,
}

impl Connection {
    pub(crate) fn new(app: AppState, user_id: String) -> Self {
        let session = spawn_session(user_id.clone(), app.session_deps(), app.session);
        let handle = session.handle();
        let viewport = TransformController::new(ClientViewport::default(), app.session.transform_debounce);
        Self { _session: session, handle, app, user_id, viewport, notified: 0 }
    }

    /// Parse and process one inbound text frame and return frames for the
    /// client.
    pub(crate) async fn process_inbound_text(&mut self, text: &str) -> Vec<Frame> {
        let mut req: Frame = match serde_json::from_str(text) {
            Ok(r) => r,
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "ws: invalid inbound frame");
                let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
                return vec![err];
            }
        };

        // Stamp the caller as `from`.
        req.from = Some(self.user_id.clone());
        info!(user_id = %self.user_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

        let result = match req.prefix() {
            "block" => self.handle_block(&req).await,
            "transform" => self.handle_transform(&req).await,
            "history" => self.handle_history(&req).await,
            "story" => self.handle_story(&req).await,
            "tour" => self.handle_tour(&req).await,
            "icon" => self.handle_icon(&req).await,
            "notify" => self.handle_notify(&req).await,
            prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
        };

        match result {
            Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
            Ok(Outcome::Done) => vec![req.done()],
            Err(err_frame) => vec![err_frame],
        }
    }

    /// Frames to push after the session state changed.
    pub(crate) fn on_state(&mut self, snapshot: &SessionState) -> Vec<Frame> {
        let mut push = Frame::request("session:state", to_data(snapshot));
        if let Some(story_id) = snapshot.story_id() {
            push = push.with_story_id(story_id);
        }
        let mut frames = vec![push];

        let seen = self.notified;
        for notification in snapshot.notifications.iter().filter(|n| n.id > seen) {
            frames.push(Frame::request("notify:error", to_data(notification)));
            self.notified = notification.id;
        }

        self.viewport.sync_from_state(snapshot.canvas.transform);
        frames.extend(self.viewport.widget_mut().drain());
        frames
    }

    /// Commit the debounced gesture if its window has elapsed.
    pub(crate) async fn commit_transform(&mut self, now: Instant) -> Result<Option<TransformState>, SessionError> {
        let Some(transform) = self.viewport.poll_commit(now) else {
            return Ok(None);
        };
        self.handle.send(Action::TransformSet(transform)).await?;
        Ok(Some(transform))
    }

    async fn apply(&self, req: &Frame, action: impl Into<SessionAction>) -> Result<Outcome, Frame> {
        self.handle
            .send(action)
            .await
            .map(|()| Outcome::Done)
            .map_err(|e| req.error_from(&e))
    }

    // =========================================================================
    // BLOCK HANDLERS
    // =========================================================================

    async fn handle_block(&self, req: &Frame) -> Result<Outcome, Frame> {
        match req.op() {
            "create" => {
                let draft: BlockDraft = decode(req)?;
                let block = BlockState {
                    id: draft.id.unwrap_or_else(new_block_id),
                    top: draft.top,
                    left: draft.left,
                    width: draft.width,
                    height: draft.height,
                    payload: draft.payload,
                };
                self.create_block(req, block).await
            }
            "drop" => {
                let dropped: DropPayload = decode(req)?;
                let transform = self.handle.state().canvas.transform;
                let world = transform.screen_to_world(Point::new(dropped.x, dropped.y));
                let block = BlockState {
                    id: new_block_id(),
                    top: world.y,
                    left: world.x,
                    width: dropped.width,
                    height: dropped.height,
                    payload: dropped.payload,
                };
                self.create_block(req, block).await
            }
            "update" => {
                let partial: PartialBlock = decode(req)?;
                self.apply(req, Action::Update(partial)).await
            }
            "delete" => {
                let IdPayload { id } = decode(req)?;
                self.apply(req, Action::Delete { id }).await
            }
            "focus" => {
                let FocusPayload { id } = decode(req)?;
                self.apply(req, Action::Focus { id }).await
            }
            op => Err(req.error(format!("unknown block op: {op}"))),
        }
    }

    async fn create_block(&self, req: &Frame, block: BlockState) -> Result<Outcome, Frame> {
        block.validate().map_err(|e| req.error_from(&e))?;
        let id = block.id.clone();
        self.apply(req, Action::Create(block)).await?;

        let mut data = Data::new();
        data.insert("id".into(), serde_json::json!(id));
        Ok(Outcome::Reply(data))
    }

    // =========================================================================
    // TRANSFORM HANDLERS
    // =========================================================================

    async fn handle_transform(&mut self, req: &Frame) -> Result<Outcome, Frame> {
        match req.op() {
            "scale" => {
                let ScalePayload { scale } = decode(req)?;
                self.apply(req, Action::TransformScale { scale }).await
            }
            "position" => {
                let Point { x, y } = decode(req)?;
                self.apply(req, Action::TransformPosition { x, y }).await
            }
            "set" => {
                let transform: TransformState = decode(req)?;
                self.apply(req, Action::TransformSet(transform)).await
            }
            "gesture" => {
                let transform: TransformState = decode(req)?;
                if self.viewport.on_widget_event(transform, Instant::now()) {
                    self.viewport.widget_mut().observe(transform);
                } else {
                    debug!(user_id = %self.user_id, shown = ?self.viewport.widget().transform(), "ws: transform echo dropped");
                }
                Ok(Outcome::Done)
            }
            op => Err(req.error(format!("unknown transform op: {op}"))),
        }
    }

    // =========================================================================
    // HISTORY HANDLERS
    // =========================================================================

    async fn handle_history(&self, req: &Frame) -> Result<Outcome, Frame> {
        let cmd = match req.op() {
            "jump" => {
                let IndexPayload { index } = decode(req)?;
                HistoryCommand::Jump { index }
            }
            "rewind" => HistoryCommand::Rewind,
            "resume" => HistoryCommand::Resume,
            "reorder" => {
                let ReorderPayload { from, to } = decode(req)?;
                HistoryCommand::Reorder { from, to }
            }
            "toggle" => {
                let IndexPayload { index } = decode(req)?;
                HistoryCommand::ToggleSkip { index }
            }
            "reset" => HistoryCommand::Reset,
            "play" => HistoryCommand::Play,
            "stop" => HistoryCommand::Stop,
            op => return Err(req.error(format!("unknown history op: {op}"))),
        };
        self.apply(req, cmd).await
    }

    // =========================================================================
    // STORY HANDLERS
    // =========================================================================

    async fn handle_story(&self, req: &Frame) -> Result<Outcome, Frame> {
        let action = match req.op() {
            "new" => {
                let NewStoryPayload { id, name } = decode(req)?;
                let id = id.unwrap_or_else(new_story_id);
                self.apply(req, StoryAction::New { id: id.clone(), name }).await?;

                let mut data = Data::new();
                data.insert("id".into(), serde_json::json!(id));
                return Ok(Outcome::Reply(data));
            }
            "fetch" | "open" => {
                let IdPayload { id } = decode(req)?;
                StoryAction::FetchRequested { id }
            }
            "close" => StoryAction::Close,
            "save" => StoryAction::SaveRequested,
            "list" => StoryAction::ListRequested,
            "delete" => {
                let IdPayload { id } = decode(req)?;
                StoryAction::DeleteRequested { id }
            }
            "subscribe" => StoryAction::Subscribe,
            "unsubscribe" => StoryAction::Unsubscribe,
            "rename" => {
                let RenamePayload { name } = decode(req)?;
                StoryAction::Rename { name }
            }
            "visibility" => {
                let VisibilityPayload { is_public } = decode(req)?;
                StoryAction::SetPublic { is_public }
            }
            "audio" => {
                let AudioPayload { audio_id, audio_src } = decode(req)?;
                StoryAction::SetAudio { audio_id, audio_src }
            }
            op => return Err(req.error(format!("unknown story op: {op}"))),
        };
        self.apply(req, action).await
    }

    // =========================================================================
    // TOUR / ICON / NOTIFY HANDLERS
    // =========================================================================

    async fn handle_tour(&self, req: &Frame) -> Result<Outcome, Frame> {
        let store = self.app.store.as_ref();
        let seen = match req.op() {
            "status" => store.tour_seen(&self.user_id).await,
            "complete" => store.set_tour_seen(&self.user_id, true).await.map(|()| true),
            "reset" => store.set_tour_seen(&self.user_id, false).await.map(|()| false),
            op => return Err(req.error(format!("unknown tour op: {op}"))),
        }
        .map_err(|e| req.error_from(&e))?;

        let mut data = Data::new();
        data.insert("key".into(), serde_json::json!(TOUR_FLAG_KEY));
        data.insert("seen".into(), serde_json::json!(seen));
        Ok(Outcome::Reply(data))
    }

    async fn handle_icon(&self, req: &Frame) -> Result<Outcome, Frame> {
        match req.op() {
            "token" => self.apply(req, IconAction::TokenRequested).await,
            op => Err(req.error(format!("unknown icon op: {op}"))),
        }
    }

    async fn handle_notify(&self, req: &Frame) -> Result<Outcome, Frame> {
        match req.op() {
            "dismiss" => {
                let DismissPayload { id } = decode(req)?;
                self.apply(req, SessionAction::Notify(NotifyAction::Dismiss { id })).await
            }
            op => Err(req.error(format!("unknown notify op: {op}"))),
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Deserialize)]
struct BlockDraft {
    #[serde(default)]
    id: Option<String>,
    top: f64,
    left: f64,
    width: f64,
    height: f64,
    #[serde(flatten)]
    payload: BlockPayload,
}

/// A block dropped at a screen position.
#[derive(Deserialize)]
struct DropPayload {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[serde(flatten)]
    payload: BlockPayload,
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

#[derive(Deserialize)]
struct FocusPayload {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct ScalePayload {
    scale: f64,
}

#[derive(Deserialize)]
struct IndexPayload {
    index: usize,
}

#[derive(Deserialize)]
struct ReorderPayload {
    from: usize,
    to: usize,
}

#[derive(Deserialize)]
struct NewStoryPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct RenamePayload {
    name: String,
}

#[derive(Deserialize)]
struct VisibilityPayload {
    is_public: bool,
}

#[derive(Deserialize)]
struct AudioPayload {
    #[serde(default)]
    audio_id: Option<String>,
    #[serde(default)]
    audio_src: Option<String>,
}

#[derive(Deserialize)]
struct DismissPayload {
    id: u64,
}

fn decode<T: DeserializeOwned>(req: &Frame) -> Result<T, Frame> {
    req.decode()
        .map_err(|e| req.error(format!("invalid {} payload: {e}", req.syscall)))
}

// =============================================================================
// HELPERS
// =============================================================================

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

async fn send_all(socket: &mut WebSocket, frames: &[Frame]) -> Result<(), ()> {
    for frame in frames {
        send_frame(socket, frame).await?;
    }
    Ok(())
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
