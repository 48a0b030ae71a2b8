use crate::tle_logic::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::SecondsFormat;
use futures_util::{Sink, SinkExt, StreamExt};
use lib_tlestream::cache::Record;
use lib_tlestream::retrieve::{CatalogSource, RecordSource};
use lib_tlestream::TleError;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long one frame may take to reach a WebSocket client.
const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub fn router<S>(state: AppState<S>) -> Router
where
    S: CatalogSource + RecordSource,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler::<S>))
        .route("/ids", get(ids_handler::<S>))
        .route("/satcat.csv", get(catalog_handler::<S>))
        .route("/poke/{id}", post(poke_handler::<S>))
        .route("/ws", get(ws_handler::<S>))
        // `/{id}.tle`; static routes above win over this catch-all segment.
        .route("/{file}", get(record_handler::<S>))
        .with_state(state)
}

/// Serves until `shutdown` fires. A bind or serve failure cancels `shutdown`
/// so the rest of the process winds down too.
pub async fn run<S>(addr: String, state: AppState<S>, shutdown: CancellationToken) -> anyhow::Result<()>
where
    S: CatalogSource + RecordSource,
{
    let result = serve(&addr, state, shutdown.clone()).await;
    if let Err(e) = &result {
        log::error!("Downstream server on {} failed: {}", addr, e);
        shutdown.cancel();
    }
    result
}

async fn serve<S>(addr: &str, state: AppState<S>, shutdown: CancellationToken) -> anyhow::Result<()>
where
    S: CatalogSource + RecordSource,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Downstream server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            log::info!("Downstream server shutting down.");
        })
        .await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn status_handler<S>(State(state): State<AppState<S>>) -> impl IntoResponse
where
    S: CatalogSource + RecordSource,
{
    let engine = &state.engine;
    let snapshot = engine.catalog().snapshot();
    Json(json!({
        "subscribers": engine.registry().subscriber_count(),
        "knownRecords": engine.list_known_ids().len(),
        "catalogLoaded": snapshot.is_some(),
        "catalogFetchedAt": snapshot
            .as_ref()
            .map(|s| s.fetched_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        "liveObjects": snapshot.map_or(0, |s| s.live_object_ids().len()),
    }))
}

async fn ids_handler<S>(State(state): State<AppState<S>>) -> Json<Vec<u32>>
where
    S: CatalogSource + RecordSource,
{
    Json(state.engine.list_known_ids())
}

async fn catalog_handler<S>(State(state): State<AppState<S>>) -> Response
where
    S: CatalogSource + RecordSource,
{
    match state.engine.catalog_snapshot() {
        Some(raw) => ([(header::CONTENT_TYPE, "text/csv")], raw).into_response(),
        None => (StatusCode::NOT_FOUND, "Catalog not loaded yet").into_response(),
    }
}

async fn record_handler<S>(Path(file): Path<String>, State(state): State<AppState<S>>) -> Response
where
    S: CatalogSource + RecordSource,
{
    let Some(object_id) = file.strip_suffix(".tle").and_then(|id| id.parse::<u32>().ok()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.engine.get_record(object_id) {
        Ok(lines) => text_response(StatusCode::OK, object_id, lines),
        Err(e) => error_response(e),
    }
}

async fn poke_handler<S>(Path(object_id): Path<u32>, State(state): State<AppState<S>>) -> Response
where
    S: CatalogSource + RecordSource,
{
    match state.engine.force_refresh(object_id).await {
        Ok(lines) => text_response(StatusCode::OK, object_id, lines),
        Err(e) => {
            log::warn!("Manual refresh of {} failed: {}", object_id, e);
            error_response(e)
        }
    }
}

fn text_response(status: StatusCode, object_id: u32, lines: Vec<String>) -> Response {
    let body = Record { object_id, lines }.to_text();
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

fn error_response(error: TleError) -> Response {
    let status = match &error {
        TleError::NotFound(_) => StatusCode::NOT_FOUND,
        TleError::TransientFetch { .. } => StatusCode::BAD_GATEWAY,
        TleError::EmptyCatalog => StatusCode::SERVICE_UNAVAILABLE,
        TleError::CatalogParse(_) | TleError::CacheWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string()).into_response()
}

async fn ws_handler<S>(ws: WebSocketUpgrade, State(state): State<AppState<S>>) -> impl IntoResponse
where
    S: CatalogSource + RecordSource,
{
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket<S>(socket: WebSocket, state: AppState<S>)
where
    S: CatalogSource + RecordSource,
{
    let mut subscription = state.engine.subscribe();
    let client_id = subscription.id();
    log::info!("Client {} connected", client_id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                send_with_timeout(&mut sender, Message::Close(None), WS_SEND_TIMEOUT).await;
                break;
            }
            // Handle incoming messages from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    // client disconnected
                    Some(Err(_)) => break,
                    // Pings are answered by axum; nothing else is expected.
                    Some(Ok(_)) => {}
                }
            }
            // Handle change events from the registry
            event = subscription.recv() => {
                // `None`: the registry dropped us as unresponsive.
                let Some(event) = event else { break };
                let json_str = match event.to_json() {
                    Ok(json_str) => json_str,
                    Err(e) => {
                        log::error!("Failed to encode change event for {}: {}", event.object_id, e);
                        continue;
                    }
                };
                if !send_with_timeout(&mut sender, Message::Text(json_str.into()), WS_SEND_TIMEOUT).await {
                    log::warn!("Client {} stopped accepting frames", client_id);
                    break;
                }
            }
        }
    }

    state.engine.unsubscribe(subscription);
    log::info!("Client {} disconnected", client_id);
}

/// `false` when the frame could not be written within `limit`.
async fn send_with_timeout<K>(sender: &mut K, message: Message, limit: Duration) -> bool
where
    K: Sink<Message> + Unpin,
{
    matches!(tokio::time::timeout(limit, sender.send(message)).await, Ok(Ok(())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_tlestream::configs::EngineConfig;
    use lib_tlestream::{TleEngine, TleResult};
    use std::collections::HashMap;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    /// Upstream stand-in that serves whatever the test put in it.
    #[derive(Default)]
    struct StaticSource {
        catalog: Mutex<Option<Vec<u8>>>,
        records: Mutex<HashMap<u32, Vec<String>>>,
    }

    impl CatalogSource for StaticSource {
        async fn fetch_catalog(&self) -> TleResult<Vec<u8>> {
            self.catalog
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| TleError::fetch("static://satcat.csv", "offline"))
        }
    }

    impl RecordSource for StaticSource {
        async fn fetch_record(&self, object_id: u32) -> TleResult<Vec<String>> {
            self.records
                .lock()
                .unwrap()
                .get(&object_id)
                .cloned()
                .ok_or_else(|| TleError::fetch(format!("static://{object_id}"), "offline"))
        }
    }

    struct TestServer {
        base: String,
        state: AppState<StaticSource>,
        shutdown: CancellationToken,
        _dir: tempfile::TempDir,
    }

    async fn start() -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            datastore_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let engine = Arc::new(TleEngine::open(config, StaticSource::default()).unwrap());
        let shutdown = CancellationToken::new();
        let state = AppState::new(engine, shutdown.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = router(state.clone());
        let token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .unwrap();
        });

        TestServer {
            base,
            state,
            shutdown,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn read_endpoints_report_missing_data_as_404() {
        let server = start().await;
        let client = reqwest::Client::new();

        let health = client.get(format!("{}/health", server.base)).send().await.unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);
        assert_eq!(health.text().await.unwrap(), "OK");

        let ids: Vec<u32> = client.get(format!("{}/ids", server.base)).send().await.unwrap().json().await.unwrap();
        assert!(ids.is_empty());

        for path in ["/25544.tle", "/satcat.csv", "/not-a-record"] {
            let resp = client.get(format!("{}{}", server.base, path)).send().await.unwrap();
            assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND, "{path}");
        }

        server.shutdown.cancel();
    }

    #[tokio::test]
    async fn poke_fetches_and_serves_the_record() {
        let server = start().await;
        let client = reqwest::Client::new();

        let failed = client.post(format!("{}/poke/7", server.base)).send().await.unwrap();
        assert_eq!(failed.status(), reqwest::StatusCode::BAD_GATEWAY);

        server
            .state
            .engine
            .source()
            .records
            .lock()
            .unwrap()
            .insert(7, vec!["SAT".into(), "1 00007U".into()]);

        let poked = client.post(format!("{}/poke/7", server.base)).send().await.unwrap();
        assert_eq!(poked.status(), reqwest::StatusCode::OK);
        assert_eq!(poked.text().await.unwrap(), "SAT\n1 00007U\n");

        let record = client.get(format!("{}/7.tle", server.base)).send().await.unwrap();
        assert_eq!(record.text().await.unwrap(), "SAT\n1 00007U\n");

        let ids: Vec<u32> = client.get(format!("{}/ids", server.base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(ids, vec![7]);

        server.shutdown.cancel();
    }

    #[tokio::test]
    async fn empty_records_are_served_as_empty_bodies() {
        let server = start().await;
        let client = reqwest::Client::new();
        server.state.engine.source().records.lock().unwrap().insert(5, Vec::new());

        let poked = client.post(format!("{}/poke/5", server.base)).send().await.unwrap();
        assert_eq!(poked.status(), reqwest::StatusCode::OK);
        assert_eq!(poked.text().await.unwrap(), "");

        let record = client.get(format!("{}/5.tle", server.base)).send().await.unwrap();
        assert_eq!(record.status(), reqwest::StatusCode::OK);
        assert!(record.bytes().await.unwrap().is_empty());

        server.shutdown.cancel();
    }

    #[tokio::test]
    async fn status_reports_when_the_catalog_was_fetched() {
        let server = start().await;
        let client = reqwest::Client::new();

        let before: serde_json::Value = client.get(format!("{}/status", server.base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(before["catalogLoaded"], false);
        assert!(before["catalogFetchedAt"].is_null());

        *server.state.engine.source().catalog.lock().unwrap() = Some(b"NORAD_CAT_ID,DECAY_DATE\n1,\n2,\n".to_vec());
        server.state.engine.catalog_refresher().refresh().await.unwrap();

        let after: serde_json::Value = client.get(format!("{}/status", server.base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(after["catalogLoaded"], true);
        assert_eq!(after["liveObjects"], 2);
        let fetched_at = after["catalogFetchedAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(fetched_at).is_ok());

        server.shutdown.cancel();
    }

    /// A sink whose peer never reads.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = axum::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn stalled_clients_time_out_instead_of_hanging() {
        let mut sink = StalledSink;
        let sent = tokio::time::timeout(
            Duration::from_secs(2),
            send_with_timeout(&mut sink, Message::Text("{}".into()), Duration::from_millis(50)),
        )
        .await
        .expect("send gives up on its own");
        assert!(!sent);

        let mut drain = futures_util::sink::drain();
        assert!(send_with_timeout(&mut drain, Message::Text("{}".into()), Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn websocket_clients_receive_change_events() {
        let server = start().await;
        let ws_url = format!("{}/ws", server.base.replacen("http", "ws", 1));
        let (mut ws, _) = tokio_tungstenite::connect_async(ws_url).await.unwrap();

        // The session registers once the upgrade completes server-side.
        let registry = Arc::clone(server.state.engine.registry());
        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.subscriber_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        server.state.engine.source().records.lock().unwrap().insert(9, vec!["NINE".into()]);
        server.state.engine.force_refresh(9).await.unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(value["objectId"], 9);
        assert_eq!(value["lines"], json!(["NINE"]));

        // Closing the socket removes the subscriber.
        ws.close(None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.subscriber_count() != 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        server.shutdown.cancel();
    }
}
