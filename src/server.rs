//! HTTP server: PDF upload page and the cooking assistant API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | HTML page with upload form and chat box |
//! | `POST` | `/upload` | Multipart field `file`: store the PDF, summarize it, render the page |
//! | `POST` | `/api/cooking/chat` | `{message}` → `{response, status}` |
//! | `GET`  | `/api/cooking/recipes` | `?ingredients=a,b&cuisine=any` → recipe matches |
//! | `POST` | `/api/cooking/extract-ingredients` | `{recipe_text}` → ingredient phrases |
//! | `GET`  | `/api/cooking/history` | Conversation so far |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Message cannot be empty", "status": "error" }
//! ```
//!
//! Input problems are `400` and are rejected before any external service is
//! called. An upload over `[server] max_upload_bytes` is `413`. A chat turn
//! that runs past `[chat] timeout_secs` is `504`.
//! Everything else is `500`, with the full error chain logged.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::{AgentCell, TIMEOUT_REPLY};
use crate::chat::ChatMessage;
use crate::config::Config;
use crate::document::{process_document, DocumentModel, GeminiClient, PDF_MIME_TYPE};
use crate::error::ChefError;
use crate::ingredients::{extract_ingredients_with, KeywordMatch};
use crate::page::render_index;
use crate::recipes::{parse_ingredient_list, search_recipes};
use crate::storage::{AzureBlobStore, BlobStore};
use crate::traits::{ToolContext, ToolRegistry};

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    ctx: ToolContext,
    /// `None` when no storage connection string is configured.
    blobs: Option<Arc<dyn BlobStore>>,
    documents: Arc<dyn DocumentModel>,
    agent: Arc<AgentCell>,
}

impl AppState {
    /// State backed by Azure Blob Storage, Gemini, and the OpenAI-compatible
    /// chat endpoint, all as configured.
    ///
    /// A missing storage connection string only disables uploads; a malformed
    /// one is an error.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let tools = Arc::new(ToolRegistry::with_builtins());
        let ctx = ToolContext::builtin()
            .with_keyword_match(KeywordMatch::from_whole_token(config.ingredients.whole_token));

        let blobs: Option<Arc<dyn BlobStore>> =
            match AzureBlobStore::from_env(&config.storage.connection_env) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) if matches!(
                    e.downcast_ref::<ChefError>(),
                    Some(ChefError::MissingCredential { .. })
                ) =>
                {
                    tracing::warn!(
                        var = %config.storage.connection_env,
                        "no storage connection string, uploads will fail"
                    );
                    None
                }
                Err(e) => return Err(e),
            };

        let documents = Arc::new(GeminiClient::from_config(&config.extraction)?);
        let agent = Arc::new(AgentCell::from_config(config.chat.clone(), tools, ctx.clone()));

        Ok(Self {
            config: Arc::new(config),
            ctx,
            blobs,
            documents,
            agent,
        })
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn with_document_model(mut self, documents: Arc<dyn DocumentModel>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_agent(mut self, agent: AgentCell) -> Self {
        self.agent = Arc::new(agent);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Build the router with all routes, CORS, and request tracing.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config().server.max_upload_bytes;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/cooking/chat", post(handle_chat))
        .route("/api/cooking/recipes", get(handle_recipes))
        .route("/api/cooking/extract-ingredients", post(handle_extract_ingredients))
        .route("/api/cooking/history", get(handle_history))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server with the configured backends.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with(AppState::from_config(config.clone())?).await
}

/// Starts the HTTP server with a prepared [`AppState`].
///
/// # Example
///
/// ```rust,no_run
/// use chefdesk::config::Config;
/// use chefdesk::server::{run_server_with, AppState};
/// use chefdesk::storage::AzureBlobStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = AzureBlobStore::from_connection_string("UseDevelopmentStorage=true")?;
/// let state = AppState::from_config(Config::minimal())?.with_blob_store(Arc::new(store));
/// run_server_with(state).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "chefdesk listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message, "status": "error" });
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// Keeps the extractor's own status, so an oversized body stays `413`.
fn multipart_error(err: MultipartError) -> AppError {
    AppError {
        status: err.status(),
        message: err.body_text(),
    }
}

fn gateway_timeout(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::GATEWAY_TIMEOUT,
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", err),
        }
    }
}

impl From<ChefError> for AppError {
    fn from(err: ChefError) -> Self {
        anyhow::Error::from(err).into()
    }
}

// ============ GET / ============

async fn handle_index() -> Html<String> {
    Html(render_index(None))
}

// ============ POST /upload ============

/// Store the uploaded file, then summarize it.
///
/// The blob is written before the model is called, so a failed extraction
/// still leaves the file in storage.
async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, AppError> {
    let mut multipart = multipart.map_err(|e| AppError {
        status: e.status(),
        message: e.body_text(),
    })?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or(PDF_MIME_TYPE).to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, content_type, bytes));
        break;
    }

    let (filename, content_type, bytes) = match upload {
        Some(u) if !u.0.is_empty() => u,
        _ => return Err(bad_request("No file provided")),
    };
    tracing::info!(file = %filename, bytes = bytes.len(), "received upload");

    let blobs = state.blobs.as_ref().ok_or_else(|| ChefError::MissingCredential {
        var: state.config.storage.connection_env.clone(),
    })?;
    blobs
        .upload(
            &state.config.storage.container,
            &filename,
            bytes.to_vec(),
            &content_type,
        )
        .await?;

    let doc = process_document(state.documents.as_ref(), &bytes).await?;
    let doc = doc.with_filename(filename);

    Ok(Html(render_index(Some(&doc))))
}

// ============ POST /api/cooking/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    if req.message.trim().is_empty() {
        return Err(bad_request("Message cannot be empty"));
    }

    let agent = state.agent.get_or_init().await?;
    let limit = state.config.chat.timeout();

    match tokio::time::timeout(limit, agent.chat(&req.message)).await {
        Ok(response) => Ok(Json(json!({ "response": response, "status": "success" }))),
        Err(_) => {
            tracing::warn!(timeout_secs = limit.as_secs(), "chat turn timed out");
            Err(gateway_timeout(TIMEOUT_REPLY))
        }
    }
}

// ============ GET /api/cooking/recipes ============

#[derive(Deserialize)]
struct RecipesQuery {
    #[serde(default)]
    ingredients: String,
    #[serde(default = "default_cuisine")]
    cuisine: String,
}

fn default_cuisine() -> String {
    crate::catalog::ANY_CUISINE.to_string()
}

#[derive(Serialize)]
struct RecipesResponse {
    recipes: String,
    ingredients: Vec<String>,
    cuisine: String,
    status: &'static str,
}

async fn handle_recipes(
    State(state): State<AppState>,
    query: Result<Query<RecipesQuery>, QueryRejection>,
) -> Result<Json<RecipesResponse>, AppError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let ingredients = parse_ingredient_list(&query.ingredients);
    if ingredients.is_empty() {
        return Err(bad_request("Please provide at least one ingredient"));
    }

    let result = search_recipes(state.ctx.recipes(), &ingredients, &query.cuisine);
    Ok(Json(RecipesResponse {
        recipes: result.to_string(),
        ingredients,
        cuisine: query.cuisine,
        status: "success",
    }))
}

// ============ POST /api/cooking/extract-ingredients ============

#[derive(Deserialize)]
struct ExtractRequest {
    #[serde(default)]
    recipe_text: String,
}

async fn handle_extract_ingredients(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    if req.recipe_text.trim().is_empty() {
        return Err(bad_request("Recipe text cannot be empty"));
    }

    let result = extract_ingredients_with(&req.recipe_text, state.ctx.keyword_match());
    Ok(Json(json!({ "ingredients": result.to_string(), "status": "success" })))
}

// ============ GET /api/cooking/history ============

#[derive(Serialize)]
struct HistoryResponse {
    thread_id: Option<String>,
    messages: Vec<ChatMessage>,
    status: &'static str,
}

/// The agent's conversation. Does not create the agent if it does not exist yet.
async fn handle_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let (thread_id, messages) = match state.agent.get() {
        Some(agent) => {
            let thread = agent.history().await;
            (Some(thread.id.to_string()), thread.messages)
        }
        None => (None, Vec::new()),
    };
    Json(HistoryResponse {
        thread_id,
        messages,
        status: "success",
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
