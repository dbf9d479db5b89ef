use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use tsdash_core::config::{Config, StoreBackend};
use tsdash_core::{
    CollectionSchema, CollectionUpdate, ConnectionForm, CreateKeyRequest, ExportParams,
    FileStore, ImportAction, MultiSearchRequest, PortInput, RequestResult, SearchParams,
    StoreError,
};
use tsdash_rs::{test_connection, ClientError, ClientProvider, ErrorKind, RequestOptions};

use crate::session::Session;

/// Where the active connection lives
pub enum ConnectionBackend {
    /// Per-browser cookie; `secure` marks it HTTPS-only
    Cookie { secure: bool },
    /// One connection shared by every browser
    Shared(Arc<ClientProvider>),
}

/// Shared application state
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub options: RequestOptions,
    pub backend: ConnectionBackend,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StoreError> {
        let http = reqwest::Client::new();
        let options = RequestOptions::from(&config.request);
        let backend = match config.connection_store {
            StoreBackend::Cookie => ConnectionBackend::Cookie {
                secure: config.production,
            },
            StoreBackend::File => {
                let store = FileStore::in_dir(&config.data_dir)?;
                tracing::info!(path = %store.path().display(), "Using file connection store");
                ConnectionBackend::Shared(Arc::new(ClientProvider::with_options(
                    Arc::new(store),
                    http.clone(),
                    options.clone(),
                )))
            }
        };

        Ok(Self {
            config: Arc::new(config),
            http,
            options,
            backend,
        })
    }
}

/// Error returned from a handler, rendered as `{ok: false, error}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Malformed browser input that never reaches Typesense
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Client(ClientError::Jsonl { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Client(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotConnected => StatusCode::CONFLICT,
                ErrorKind::Status(status) if (400..500).contains(&status) => {
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                ErrorKind::Status(_) | ErrorKind::Transport | ErrorKind::Parse => {
                    StatusCode::BAD_GATEWAY
                }
                ErrorKind::Logic | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            tracing::warn!(status = status.as_u16(), "Request rejected: {}", self);
        }
        HttpResponse::build(status).json(RequestResult::<()>::Err(self.to_string()))
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult {
    Ok(HttpResponse::Ok().json(RequestResult::Ok(data)))
}

/// Connection as shown to the browser; the API key never leaves the server
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub host: String,
    pub port: PortInput,
    pub protocol: String,
}

impl From<ConnectionForm> for ConnectionStatus {
    fn from(form: ConnectionForm) -> Self {
        Self {
            connected: !form.is_empty(),
            host: form.host,
            port: form.port,
            protocol: form.protocol,
        }
    }
}

/// Body of `POST /api/collections/import`
#[derive(Debug, Deserialize)]
pub struct ImportCollectionRequest {
    pub schema: CollectionSchema,
    /// Newline-delimited JSON documents
    pub jsonl: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteParams {
    #[serde(default)]
    pub action: Option<ImportAction>,
}

/// Root redirect: dashboard when connected, setup otherwise
/// GET /
pub async fn index(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let session = Session::new(&req, &state);
    let target = if session.is_connected()? { "/metrics" } else { "/setup" };
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, target))
        .finish())
}

/// Dashboard liveness
/// GET /health
pub async fn health() -> ApiResult {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now()
    })))
}

/// GET /api/connection
pub async fn get_connection(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let session = Session::new(&req, &state);
    ok(ConnectionStatus::from(session.load()?))
}

/// Validate, test and persist a connection
/// POST /api/connection
#[tracing::instrument(skip(req, form, state))]
pub async fn save_connection(
    req: HttpRequest,
    form: web::Json<ConnectionForm>,
    state: web::Data<AppState>,
) -> ApiResult {
    let config = form.validate().map_err(ClientError::from)?;
    tracing::debug!(host = %config.host, port = config.port, "Saving connection");

    let health = test_connection(&state.http, &config).await?;
    if !health.ok {
        return Err(ApiError::Upstream(format!(
            "{} reported itself unhealthy",
            config.base_url()
        )));
    }

    let session = Session::new(&req, &state);
    session.save(&config).await?;
    tracing::info!(host = %config.host, port = config.port, "Connection saved");

    let status = ConnectionStatus::from(config.to_form());
    session.finish(HttpResponse::Ok().json(RequestResult::Ok(status)))
}

/// Check a candidate connection without saving it
/// POST /api/connection/test
#[tracing::instrument(skip(form, state))]
pub async fn check_connection(
    form: web::Json<ConnectionForm>,
    state: web::Data<AppState>,
) -> ApiResult {
    let config = form.validate().map_err(ClientError::from)?;
    ok(test_connection(&state.http, &config).await?)
}

/// Disconnect
/// DELETE /api/connection
pub async fn delete_connection(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let session = Session::new(&req, &state);
    session.clear().await?;
    tracing::info!("Connection cleared");
    session.finish(HttpResponse::Ok().json(RequestResult::Ok(ConnectionStatus::from(
        ConnectionForm::default(),
    ))))
}

/// GET /api/server/health
pub async fn server_health(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    ok(client.health().await?)
}

/// GET /api/server/metrics
pub async fn server_metrics(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    ok(client.metrics().await?)
}

/// GET /api/server/stats
pub async fn server_stats(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    ok(client.stats().await?)
}

/// GET /api/collections
pub async fn list_collections(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    ok(client.list_collections().await?)
}

/// POST /api/collections
#[tracing::instrument(skip(req, schema, state), fields(collection = %schema.name))]
pub async fn create_collection(
    req: HttpRequest,
    schema: web::Json<CollectionSchema>,
    state: web::Data<AppState>,
) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    let collection = client.create_collection(&schema).await?;
    tracing::info!("Collection created");
    Ok(HttpResponse::Created().json(RequestResult::Ok(collection)))
}

/// Create a collection and import a JSONL payload into it
/// POST /api/collections/import
#[tracing::instrument(skip(req, body, state), fields(collection = %body.schema.name))]
pub async fn import_collection(
    req: HttpRequest,
    body: web::Json<ImportCollectionRequest>,
    state: web::Data<AppState>,
) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    let outcome = client
        .create_collection_with_jsonl(&body.schema, &body.jsonl)
        .await?;
    tracing::info!(
        succeeded = outcome.import.succeeded,
        failed = outcome.import.failed,
        "Collection imported"
    );
    Ok(HttpResponse::Created().json(RequestResult::Ok(outcome)))
}

/// GET /api/collections/{name}
pub async fn get_collection(
    path: web::Path<String>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let name = path.into_inner();
    let client = Session::new(&req, &state).client().await?;
    ok(client.get_collection(&name).await?)
}

/// PATCH /api/collections/{name}
pub async fn update_collection(
    path: web::Path<String>,
    update: web::Json<CollectionUpdate>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let name = path.into_inner();
    let client = Session::new(&req, &state).client().await?;
    ok(client.update_collection(&name, &update).await?)
}

/// DELETE /api/collections/{name}
pub async fn delete_collection(
    path: web::Path<String>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let name = path.into_inner();
    tracing::debug!(collection = %name, "Deleting collection");
    let client = Session::new(&req, &state).client().await?;
    let deleted = client.delete_collection(&name).await?;
    tracing::info!(collection = %name, "Collection deleted");
    ok(deleted)
}

/// GET /api/collections/{name}/search
pub async fn search(
    path: web::Path<String>,
    params: web::Query<SearchParams>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let name = path.into_inner();
    tracing::debug!(
        collection = %name,
        query_len = params.q.len(),
        query_by = %params.query_by,
        "Searching documents"
    );
    let client = Session::new(&req, &state).client().await?;
    ok(client.search(&name, &params).await?)
}

/// POST /api/multi_search
pub async fn multi_search(
    body: web::Json<MultiSearchRequest>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    ok(client.multi_search(&body).await?)
}

/// GET /api/collections/{name}/export
pub async fn export_documents(
    path: web::Path<String>,
    params: web::Query<ExportParams>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let name = path.into_inner();
    let client = Session::new(&req, &state).client().await?;
    ok(client.export_documents(&name, &params).await?)
}

/// Index a document, or upsert it with `?action=upsert`
/// POST /api/collections/{name}/documents
pub async fn write_document(
    path: web::Path<String>,
    params: web::Query<WriteParams>,
    document: web::Json<Value>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let name = path.into_inner();
    let client = Session::new(&req, &state).client().await?;
    let stored = match params.action.unwrap_or_default() {
        ImportAction::Create => client.index_document(&name, &document).await?,
        ImportAction::Upsert => client.upsert_document(&name, &document).await?,
        other => {
            return Err(ApiError::BadRequest(format!(
                "action {} is only supported for imports",
                other.as_str()
            )))
        }
    };
    Ok(HttpResponse::Created().json(RequestResult::Ok(stored)))
}

/// GET /api/collections/{name}/documents/{id}
pub async fn get_document(
    path: web::Path<(String, String)>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let (name, id) = path.into_inner();
    let client = Session::new(&req, &state).client().await?;
    ok(client.get_document(&name, &id).await?)
}

/// PATCH /api/collections/{name}/documents/{id}
pub async fn update_document(
    path: web::Path<(String, String)>,
    fields: web::Json<Value>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let (name, id) = path.into_inner();
    let client = Session::new(&req, &state).client().await?;
    ok(client.update_document(&name, &id, &fields).await?)
}

/// DELETE /api/collections/{name}/documents/{id}
pub async fn delete_document(
    path: web::Path<(String, String)>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let (name, id) = path.into_inner();
    tracing::debug!(collection = %name, doc_id = %id, "Deleting document");
    let client = Session::new(&req, &state).client().await?;
    ok(client.delete_document(&name, &id).await?)
}

/// GET /api/keys
pub async fn list_keys(req: HttpRequest, state: web::Data<AppState>) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    ok(client.list_keys().await?)
}

/// POST /api/keys
pub async fn create_key(
    body: web::Json<CreateKeyRequest>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let client = Session::new(&req, &state).client().await?;
    let key = client.create_key(&body).await?;
    tracing::info!(id = ?key.id, description = %key.description, "API key created");
    Ok(HttpResponse::Created().json(RequestResult::Ok(key)))
}

/// DELETE /api/keys/{id}
pub async fn delete_key(
    path: web::Path<u64>,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ApiResult {
    let id = path.into_inner();
    let client = Session::new(&req, &state).client().await?;
    let deleted = client.delete_key(id).await?;
    tracing::info!(id, "API key deleted");
    ok(deleted)
}

fn rejected(err: impl std::fmt::Display) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}

/// Configure routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .service(
            web::scope("/api")
                // Extractor failures answer with the same envelope as handlers
                .app_data(web::JsonConfig::default().error_handler(|err, _| rejected(err)))
                .app_data(web::QueryConfig::default().error_handler(|err, _| rejected(err)))
                .app_data(web::PathConfig::default().error_handler(|err, _| rejected(err)))
                .route("/connection", web::get().to(get_connection))
                .route("/connection", web::post().to(save_connection))
                .route("/connection", web::delete().to(delete_connection))
                .route("/connection/test", web::post().to(check_connection))
                .route("/server/health", web::get().to(server_health))
                .route("/server/metrics", web::get().to(server_metrics))
                .route("/server/stats", web::get().to(server_stats))
                .route("/multi_search", web::post().to(multi_search))
                .route("/keys", web::get().to(list_keys))
                .route("/keys", web::post().to(create_key))
                .route("/keys/{id}", web::delete().to(delete_key))
                // Named collection routes MUST come before /collections/{name}
                .route("/collections", web::get().to(list_collections))
                .route("/collections", web::post().to(create_collection))
                .route("/collections/import", web::post().to(import_collection))
                .route("/collections/{name}/search", web::get().to(search))
                .route("/collections/{name}/export", web::get().to(export_documents))
                .route("/collections/{name}/documents", web::post().to(write_document))
                .route(
                    "/collections/{name}/documents/{id}",
                    web::get().to(get_document),
                )
                .route(
                    "/collections/{name}/documents/{id}",
                    web::patch().to(update_document),
                )
                .route(
                    "/collections/{name}/documents/{id}",
                    web::delete().to(delete_document),
                )
                .route("/collections/{name}", web::get().to(get_collection))
                .route("/collections/{name}", web::patch().to(update_collection))
                .route("/collections/{name}", web::delete().to(delete_collection)),
        );
}
