//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        Html, IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use std::convert::Infallible;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::handlers::{self, ApiError};
use super::models::{ApiResponse, TranscriptionResponse};
use crate::pipeline::TranscriptionPipeline;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranscriptionPipeline>,
}

/// Build the router with every route and middleware layer
pub fn build_router(pipeline: Arc<TranscriptionPipeline>) -> Router {
    let config = pipeline.config();
    let body_limit = usize::try_from(config.ingress.max_upload_bytes).unwrap_or(usize::MAX);
    let enable_cors = config.server.enable_cors;

    let app = Router::new()
        // Health check endpoints (both paths for compatibility)
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .route("/api/transcribe", post(transcribe_handler))
        .route("/api/transcribe/download", post(download_handler))
        .route("/api/transcribe/stream", post(stream_handler))
        .route("/", get(serve_ui))
        .with_state(AppState { pipeline })
        .layer(DefaultBodyLimit::max(body_limit));

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);

        app.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
    } else {
        app.layer(TraceLayer::new_for_http())
    }
}

/// Configure and start the HTTP server
pub async fn start_http_server(
    pipeline: Arc<TranscriptionPipeline>,
    host: &str,
    port: u16,
) -> Result<()> {
    info!("🚀 Starting HTTP server on {}:{}", host, port);

    let app = build_router(pipeline);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("🌐 Upload page available at http://{}:{}/", host, port);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(handlers::health_check().await))
}

async fn serve_ui() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Transcribe and return the result as JSON
async fn transcribe_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<TranscriptionResponse>>, ApiError> {
    let request = handlers::read_upload(multipart).await?;
    let file_name = request.file_name.clone();
    let transcript = handlers::transcribe(&state.pipeline, request).await?;

    info!("📤 Returning transcript for {:?}", file_name);
    Ok(Json(ApiResponse::success(transcript.into())))
}

/// Transcribe and return `transcription.txt` as an attachment
async fn download_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request = handlers::read_upload(multipart).await?;
    let transcript = handlers::transcribe(&state.pipeline, request).await?;
    let artifact = transcript.artifact();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type()),
            (header::CONTENT_DISPOSITION, artifact.content_disposition()),
        ],
        artifact.content,
    )
        .into_response())
}

/// Transcribe while streaming stage updates as server-sent events.
///
/// Upload problems that never reach the pipeline are plain JSON errors; every
/// later outcome arrives as the final `result` or `error` event.
async fn stream_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request = handlers::read_upload(multipart).await?;
    info!("📡 Streaming transcription of {:?}", request.file_name);

    let mut events = handlers::spawn_run(state.pipeline.clone(), request);
    let stream = async_stream::stream! {
        while let Some(event) = events.recv().await {
            yield Ok::<_, Infallible>(event.to_sse());
        }
    };

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}
