//! HTTP server for the EcoTrack API.
//!
//! # API Endpoints
//!
//! | Method | Path                            | Description                     |
//! |--------|---------------------------------|---------------------------------|
//! | GET    | `/health`                       | Health check                    |
//! | GET    | `/api/emissions/`               | List records (search, ordering) |
//! | POST   | `/api/emissions/`               | Create a record                 |
//! | GET    | `/api/emissions/{id}/`          | Record detail                   |
//! | PUT    | `/api/emissions/{id}/`          | Replace a record                |
//! | PATCH  | `/api/emissions/{id}/`          | Partial update                  |
//! | DELETE | `/api/emissions/{id}/`          | Delete a record                 |
//! | POST   | `/api/emissions/import_csv/`    | Import a CSV upload             |
//! | GET    | `/api/emissions/stats/`         | Dashboard aggregates            |
//! | GET    | `/api/logs`                     | SSE stream of import logs       |

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::logs::LOG_BROADCASTER;
use super::records;
use crate::config::Config;
use crate::db::Database;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Build the application router. `body_limit` caps request bodies in bytes.
pub fn router(state: AppState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/logs", get(sse_logs))
        .route(
            "/api/emissions/",
            get(records::list_records).post(records::create_record),
        )
        .route("/api/emissions/import_csv/", post(records::import_csv))
        .route("/api/emissions/stats/", get(records::stats))
        .route(
            "/api/emissions/{id}/",
            get(records::get_record)
                .put(records::replace_record)
                .patch(records::patch_record)
                .delete(records::delete_record),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Open the database and serve until the process is stopped.
pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.db_path)?;
    let app = router(AppState { db }, config.max_upload_bytes);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 EcoTrack server running on http://{}", listener.local_addr()?);
    info!("   POST /api/emissions/import_csv/ - Import CSV file");
    info!("   GET  /api/emissions/stats/      - Dashboard aggregates");
    info!("   GET  /api/logs                  - SSE log stream");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ecotrack",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "emissions": "/api/emissions/",
            "import": "POST /api/emissions/import_csv/",
            "stats": "GET /api/emissions/stats/",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
