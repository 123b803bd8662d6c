//! `GET /api/sessions/:id/sse` — the live event stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use pipeline::{FanoutRegistry, PipelineEvent};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::state::AppState;

fn to_sse_event(event: &PipelineEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().data(data)
}

/// Releases the fan-out connection slot and decrements the SSE gauge when
/// the stream this guard is bound to is dropped, which axum does as soon as
/// the client disconnects — there is no explicit "on disconnect" callback,
/// so `Drop` is the only reliable hook.
struct ConnectionGuard {
    registry: Arc<FanoutRegistry>,
    metrics: Arc<Metrics>,
    session_id: String,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.release_connection(&self.session_id);
        self.metrics.sse_connection_closed();
    }
}

/// Admits the connection against the session's fan-out caps, replays the
/// buffered backlog as a single `session_restore` event, then forwards the
/// session's live broadcast stream until the client disconnects.
pub async fn stream_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let loaded = state.store.load(&session_id).await.map_err(ApiError::from)?;
    match loaded {
        Some(s) if s.user_id == user_id => {}
        _ => return Err(ApiError::NotFoundOrForbidden),
    }

    let bus = state
        .fanout
        .admit_connection(&session_id)
        .map_err(ApiError::from)?;
    state.metrics.sse_connection_opened();

    let guard = ConnectionGuard {
        registry: state.fanout.clone(),
        metrics: state.metrics.clone(),
        session_id: session_id.clone(),
    };

    let restore = PipelineEvent::SessionRestore {
        events: bus.replay_snapshot(),
    };
    let restore_stream = stream::once(async move { Ok::<_, Infallible>(to_sse_event(&restore)) });

    let live = BroadcastStream::new(bus.subscribe()).filter_map(|item| async move {
        match item {
            Ok(event) => Some(Ok::<_, Infallible>(to_sse_event(&event))),
            Err(_lagged) => None,
        }
    });

    let body = restore_stream.chain(live).map(move |item| {
        let _keep_alive = &guard;
        item
    });

    Ok(Sse::new(body).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(20))
            .text("heartbeat"),
    ))
}
