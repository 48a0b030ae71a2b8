use lib_tlestream::TleEngine;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared by every request handler and WebSocket session.
pub struct AppState<S> {
    pub engine: Arc<TleEngine<S>>,
    // Ends open WebSocket sessions on shutdown.
    pub shutdown: CancellationToken,
}

impl<S> AppState<S> {
    pub fn new(engine: Arc<TleEngine<S>>, shutdown: CancellationToken) -> Self {
        Self { engine, shutdown }
    }
}

// Manual impl: a derive would demand `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            shutdown: self.shutdown.clone(),
        }
    }
}
