use crate::server::AppContext;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use magnetcast_content::InfoHash;
use tokio_util::io::ReaderStream;

pub fn swarm_routes() -> Router<AppContext> {
    Router::new()
        .route("/swarm/:info_hash/info", get(info_handler))
        .route("/swarm/:info_hash/data", get(data_handler))
}

fn not_seeded() -> Response {
    (StatusCode::NOT_FOUND, "artifact is not being seeded").into_response()
}

/// Bencoded info dictionary of a seeded artifact.
async fn info_handler(
    State(ctx): State<AppContext>,
    Path(info_hash): Path<String>,
) -> Response {
    let Ok(hash) = info_hash.parse::<InfoHash>() else {
        return (StatusCode::BAD_REQUEST, "malformed info hash").into_response();
    };

    match ctx.swarm.info(&hash) {
        Some(info) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/x-bittorrent")],
            info,
        )
            .into_response(),
        None => not_seeded(),
    }
}

/// Payload of a seeded artifact, streamed from its source file.
async fn data_handler(
    State(ctx): State<AppContext>,
    Path(info_hash): Path<String>,
) -> Response {
    let Ok(hash) = info_hash.parse::<InfoHash>() else {
        return (StatusCode::BAD_REQUEST, "malformed info hash").into_response();
    };

    let Some(seeded) = ctx.swarm.get(&hash) else {
        return not_seeded();
    };

    let file = match tokio::fs::File::open(&seeded.source).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(info_hash = %hash, "Seeded source unavailable: {}", e);
            return not_seeded();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, seeded.length.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}
