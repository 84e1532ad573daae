//! Embedded development server with live reload support

use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tower_http::services::ServeDir;

/// Path of the server-sent events endpoint.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Live reload message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMessage {
    /// Full page reload.
    Reload,
    /// Only stylesheets changed; swap them in place.
    CssReload,
}

impl ReloadMessage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::CssReload => "css-reload",
        }
    }
}

/// Server state containing the reload broadcaster.
#[derive(Clone)]
pub struct ServerState {
    /// Broadcast channel for live reload events.
    pub reload_tx: broadcast::Sender<ReloadMessage>,
}

impl ServerState {
    /// Create a new server state.
    pub fn new() -> Self {
        let (reload_tx, _) = broadcast::channel(16);
        Self { reload_tx }
    }

    /// Send a reload notification to all connected clients.
    pub fn notify(&self, message: ReloadMessage) {
        // No connected browser is not an error.
        let receivers = self.reload_tx.send(message).unwrap_or(0);
        tracing::debug!(?message, receivers, "sent live reload");
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the development server router.
pub fn create_router(output_dir: &Path, state: Arc<ServerState>) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload_handler))
        .fallback_service(ServeDir::new(output_dir).append_index_html_on_directories(true))
        .with_state(state)
}

/// Server-Sent Events handler for live reload.
async fn livereload_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.reload_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(message) => Some(Ok(Event::default().data(message.as_str()))),
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// JavaScript snippet injected before `</body>` of every page in serve mode.
pub const LIVERELOAD_SCRIPT: &str = r#"<script>
(function() {
    const source = new EventSource('/__livereload');
    source.onmessage = function(event) {
        if (event.data === 'reload') {
            window.location.reload();
        } else if (event.data === 'css-reload') {
            document.querySelectorAll('link[rel="stylesheet"]').forEach(function(link) {
                const href = link.href.split('?')[0];
                link.href = href + '?v=' + Date.now();
            });
        }
    };
    source.onerror = function() {
        console.log('[livereload] Connection lost, retrying...');
    };
})();
</script>
"#;
