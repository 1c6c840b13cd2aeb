use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use crate::app::Aggregator;
use crate::archive::ArchiveClient;
use crate::domain::DatasetCode;
use crate::error::AggregatorError;
use crate::upstream::CatalogClient;

pub async fn serve<C, A>(
    addr: SocketAddr,
    aggregator: Arc<Aggregator<C, A>>,
) -> Result<(), AggregatorError>
where
    C: CatalogClient + 'static,
    A: ArchiveClient + 'static,
{
    let app = router(aggregator);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AggregatorError::Server(format!("bind {addr}: {err}")))?;
    info!("aggregation server listening on http://{addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|err| AggregatorError::Server(err.to_string()))
}

pub fn router<C, A>(aggregator: Arc<Aggregator<C, A>>) -> Router
where
    C: CatalogClient + 'static,
    A: ArchiveClient + 'static,
{
    Router::new()
        .route("/", get(get_catalog::<C, A>))
        .route("/dataset/{code}", get(get_dataset::<C, A>))
        .with_state(aggregator)
}

async fn get_catalog<C, A>(
    State(aggregator): State<Arc<Aggregator<C, A>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response
where
    C: CatalogClient + 'static,
    A: ArchiveClient + 'static,
{
    match aggregator.load_catalog() {
        Ok(catalog) => {
            info!(client = %peer, "served dataset list");
            Json(catalog).into_response()
        }
        Err(err) => {
            error!(client = %peer, "failed to serve dataset list: {err}");
            error_response(&err)
        }
    }
}

async fn get_dataset<C, A>(
    State(aggregator): State<Arc<Aggregator<C, A>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(code): Path<String>,
) -> Response
where
    C: CatalogClient + 'static,
    A: ArchiveClient + 'static,
{
    info!(client = %peer, code = %code, "dataset requested");
    let code: DatasetCode = match code.parse() {
        Ok(code) => code,
        Err(err) => {
            error!(client = %peer, code = %code, "rejected dataset request: {err}");
            return error_response(&err);
        }
    };

    let csv = match aggregator.dataset_csv(&code).await {
        Ok(csv) => csv,
        Err(err) => {
            error!(client = %peer, code = %code, "failed dataset request: {err}");
            return error_response(&err);
        }
    };

    // Normalized CSVs run to hundreds of megabytes; the body is streamed
    // straight off disk instead of buffered.
    let file = match tokio::fs::File::open(csv.path.as_std_path()).await {
        Ok(file) => file,
        Err(err) => {
            let err = AggregatorError::Filesystem(format!("{}: {err}", csv.path));
            error!(client = %peer, code = %code, "failed dataset request: {err}");
            return error_response(&err);
        }
    };

    info!(
        client = %peer,
        code = %code,
        cached = csv.cached,
        "dataset sent"
    );
    (
        [(header::CONTENT_TYPE, content_type_for(csv.path.as_str()))],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: u16,
    message: String,
    timestamp: String,
}

fn error_response(err: &AggregatorError) -> Response {
    let (status, message) = match err {
        AggregatorError::DatasetNotFound(_) | AggregatorError::InvalidDatasetCode(_) => {
            (StatusCode::NOT_FOUND, "Dataset not found")
        }
        AggregatorError::CsvNotFound(_) => (StatusCode::NOT_FOUND, "Dataset CSV was not found"),
        AggregatorError::CatalogMissing => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Dataset list has not been initialized",
        ),
        AggregatorError::ArchiveHttp(_) | AggregatorError::ArchiveStatus { .. } => {
            (StatusCode::BAD_GATEWAY, "Failed to fetch dataset archive")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    };
    let body = ErrorBody {
        error: ErrorDetail {
            code: status.as_u16(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    };
    (status, Json(body)).into_response()
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
