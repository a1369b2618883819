use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdf_chat_core::{
    ChatModel, Embedder, IngestError, IngestPipeline, ObjectStore, QueryAnswerer, QueryError,
    VectorIndex,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub type SharedStore = Arc<dyn ObjectStore>;
pub type SharedEmbedder = Arc<dyn Embedder>;
pub type SharedIndex = Arc<dyn VectorIndex>;
pub type SharedChat = Arc<dyn ChatModel>;

pub type ServerPipeline = IngestPipeline<SharedStore, SharedEmbedder, SharedIndex>;
pub type ServerAnswerer = QueryAnswerer<SharedEmbedder, SharedIndex, SharedChat>;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<ServerPipeline>,
    answerer: Arc<ServerAnswerer>,
}

pub async fn run(
    bind: &str,
    pipeline: ServerPipeline,
    answerer: ServerAnswerer,
) -> anyhow::Result<()> {
    let state = AppState {
        pipeline: Arc::new(pipeline),
        answerer: Arc::new(answerer),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_page))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/query", post(query))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    info!(%bind, "http server listening");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn map_ingest_error(error: IngestError) -> ApiError {
    match error {
        IngestError::InvalidDocument(details) => ApiError::bad_request(details),
        other => {
            error!(%other, "upload failed");
            ApiError::internal(format!("upload failed: {other}"))
        }
    }
}

async fn index_page() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::bad_request(format!("unreadable multipart body: {error}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload.pdf").to_string();
            let bytes = field.bytes().await.map_err(|error| {
                ApiError::bad_request(format!("unreadable file field: {error}"))
            })?;
            file = Some((filename, bytes));
            break;
        }
    }

    let Some((filename, bytes)) = file else {
        return Err(ApiError::bad_request("no file provided"));
    };

    let receipt = state
        .pipeline
        .ingest(&filename, &bytes)
        .await
        .map_err(map_ingest_error)?;

    Ok(Json(UploadResponse {
        message: receipt.message,
        link: receipt.link,
    }))
}

#[derive(Deserialize)]
struct QueryRequest {
    question: Option<String>,
    #[serde(default)]
    chat_history: Vec<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let question = request.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(ApiError::bad_request("no question provided"));
    }

    match state.answerer.answer(&question, &request.chat_history).await {
        Ok(answer) => Ok(Json(QueryResponse { answer })),
        Err(QueryError::EmptyQuestion) => Err(ApiError::bad_request("no question provided")),
        Err(QueryError::RateLimited(details)) => {
            error!(%details, "generation rate limited");
            Err(ApiError {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: "The assistant has hit its request quota; please try again in a moment."
                    .to_string(),
            })
        }
        Err(other) => {
            error!(%other, "query failed");
            Err(ApiError::internal(format!("query failed: {other}")))
        }
    }
}
